//! Side panel holding the boundary dropdown and the layer checkbox.
//!
//! The panel only tracks what the user picked; every change is handed to the
//! controller as a `Change` event on the element's id.

use crate::controller::{ALL_BOUNDARIES, BOUNDARY_FIELDSET, LAYER_CHECK};
use crate::event::MapEvent;

/// Row of the first dropdown entry; row 0 is the heading
const FIRST_OPTION_ROW: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelItem {
    Option(usize),
    Checkbox,
}

#[derive(Debug, Clone)]
pub struct ControlPanel {
    options: Vec<String>,
    selected: usize,
    layer_checked: bool,
}

impl ControlPanel {
    /// "All" always comes first and starts selected
    pub fn new(boundary_options: &[String]) -> Self {
        let rest = boundary_options.iter().filter(|o| *o != ALL_BOUNDARIES);
        let options = std::iter::once(ALL_BOUNDARIES.to_string())
            .chain(rest.cloned())
            .collect();
        Self {
            options,
            selected: 0,
            layer_checked: true,
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_value(&self) -> &str {
        &self.options[self.selected]
    }

    pub fn layer_checked(&self) -> bool {
        self.layer_checked
    }

    /// Pick an entry; no event when it is already selected
    pub fn select(&mut self, index: usize) -> Option<MapEvent> {
        if index >= self.options.len() || index == self.selected {
            return None;
        }
        self.selected = index;
        Some(MapEvent::selected(BOUNDARY_FIELDSET, self.selected_value()))
    }

    pub fn select_next(&mut self) -> Option<MapEvent> {
        self.select(self.selected + 1)
    }

    pub fn select_previous(&mut self) -> Option<MapEvent> {
        self.selected.checked_sub(1).and_then(|i| self.select(i))
    }

    pub fn toggle_layer(&mut self) -> MapEvent {
        self.layer_checked = !self.layer_checked;
        MapEvent::checked(LAYER_CHECK, self.layer_checked)
    }

    /// Row of the checkbox, one blank row below the last option
    pub fn checkbox_row(&self) -> usize {
        FIRST_OPTION_ROW + self.options.len() + 1
    }

    /// Total rows needed to draw the panel contents
    pub fn height(&self) -> usize {
        self.checkbox_row() + 1
    }

    pub fn item_at(&self, row: usize) -> Option<PanelItem> {
        if row == self.checkbox_row() {
            return Some(PanelItem::Checkbox);
        }
        let index = row.checked_sub(FIRST_OPTION_ROW)?;
        (index < self.options.len()).then_some(PanelItem::Option(index))
    }

    /// Click on a panel row
    pub fn click(&mut self, row: usize) -> Option<MapEvent> {
        match self.item_at(row)? {
            PanelItem::Option(index) => self.select(index),
            PanelItem::Checkbox => Some(self.toggle_layer()),
        }
    }
}
