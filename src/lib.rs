//! Terminal choropleth of Canadian provinces and territories.
//!
//! A small map engine (`engine`) renders GeoJSON fill layers onto a braille
//! canvas; the `controller` wires pointer and UI events to it.

pub mod app;
pub mod braille;
pub mod config;
pub mod controller;
pub mod data;
pub mod engine;
pub mod event;
pub mod geo;
pub mod map;
pub mod panel;
pub mod style;
pub mod ui;
