use ratatui::layout::{Constraint, Direction, Layout, Margin, Rect};
use tracing::debug;

use crate::config::AppConfig;
use crate::controller::MapController;
use crate::engine::{SourceSlot, TerminalEngine};
use crate::event::MapEvent;
use crate::map::{Basemap, Lod};
use crate::panel::ControlPanel;
use crate::ui;

/// Width of the side panel in terminal columns, borders included
pub const PANEL_WIDTH: u16 = 30;

/// Screen areas: bordered map, bordered side panel, status bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub map: Rect,
    pub panel: Rect,
    pub status: Rect,
}

impl Screen {
    pub fn split(area: Rect) -> Self {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(10), Constraint::Length(PANEL_WIDTH)])
            .split(rows[0]);
        Self {
            map: cols[0],
            panel: cols[1],
            status: rows[1],
        }
    }

    /// Map area inside its border
    pub fn map_inner(&self) -> Rect {
        self.map.inner(Margin::new(1, 1))
    }

    pub fn panel_inner(&self) -> Rect {
        self.panel.inner(Margin::new(1, 1))
    }
}

fn contains(rect: Rect, col: u16, row: u16) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// Application state
pub struct App {
    pub engine: TerminalEngine,
    pub controller: MapController,
    pub panel: ControlPanel,
    pub should_quit: bool,
    screen: Screen,
    /// Last mouse position for drag tracking
    last_mouse: Option<(u16, u16)>,
    dragged: bool,
    /// Current mouse position for cursor marker
    mouse_pos: Option<(u16, u16)>,
}

impl App {
    pub fn new(config: &AppConfig, basemap: Basemap, width: u16, height: u16) -> Self {
        let screen = Screen::split(Rect::new(0, 0, width, height));
        let inner = screen.map_inner();
        let mut controller = MapController::new(config.controller_settings());
        // Braille gives 2x4 resolution per character
        let mut engine = TerminalEngine::new(
            controller.map_view(),
            basemap,
            inner.width as usize * 2,
            inner.height as usize * 4,
        );
        controller.initialize(&mut engine);

        Self {
            engine,
            controller,
            panel: ControlPanel::new(&config.ui.boundary_options),
            should_quit: false,
            screen,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: u16, height: u16) {
        self.screen = Screen::split(Rect::new(0, 0, width, height));
        let inner = self.screen.map_inner();
        let (width, height) = (inner.width as usize * 2, inner.height as usize * 4);
        self.engine.resize(width, height);
        self.refresh_pointer();
    }

    /// Install finished loads and run the handlers for everything the
    /// engine produced since the last frame
    pub fn tick(&mut self) {
        self.engine.poll_sources();
        for event in self.engine.drain_events() {
            self.controller.dispatch(&mut self.engine, &event);
        }
    }

    fn dispatch(&mut self, event: Option<MapEvent>) {
        if let Some(event) = event {
            self.controller.dispatch(&mut self.engine, &event);
        }
    }

    /// Braille pixel at the center of the map cell under (col, row)
    fn map_pixel(&self, col: u16, row: u16) -> Option<(i32, i32)> {
        let inner = self.screen.map_inner();
        if !contains(inner, col, row) {
            return None;
        }
        let px = (col - inner.x) as i32 * 2 + 1;
        let py = (row - inner.y) as i32 * 4 + 2;
        Some((px, py))
    }

    fn panel_row(&self, col: u16, row: u16) -> Option<usize> {
        let inner = self.screen.panel_inner();
        contains(inner, col, row).then(|| (row - inner.y) as usize)
    }

    /// Map cell of the mouse, relative to the map area
    pub fn mouse_cell(&self) -> Option<(u16, u16)> {
        let inner = self.screen.map_inner();
        self.mouse_pos
            .filter(|&(col, row)| contains(inner, col, row))
            .map(|(col, row)| (col - inner.x, row - inner.y))
    }

    /// Re-run hit testing at the last mouse position after the view changed
    fn refresh_pointer(&mut self) {
        let pixel = self.mouse_pos.and_then(|(c, r)| self.map_pixel(c, r));
        match pixel {
            Some((px, py)) => self.engine.pointer_moved(px, py),
            None => self.engine.pointer_left(),
        }
    }

    pub fn mouse_moved(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        self.refresh_pointer();
    }

    pub fn mouse_down(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Handle mouse drag
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - col as i32;
            let dy = last_y as i32 - row as i32;
            if dx != 0 || dy != 0 {
                self.dragged = true;
                // Whole cells, so a drag moves the map by what the mouse crossed
                self.pan(dx * 2, dy * 4);
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Button released: a press without a drag is a click
    pub fn mouse_up(&mut self, col: u16, row: u16) {
        let was_drag = self.dragged;
        self.last_mouse = None;
        self.dragged = false;
        if !was_drag {
            self.click(col, row);
        }
    }

    /// Whether (col, row) falls on the drawn popup box
    fn on_popup(&self, col: u16, row: u16) -> bool {
        let Some(popup) = self.engine.popup() else {
            return false;
        };
        let inner = self.screen.map_inner();
        let rect = ui::popup_rect(popup, self.engine.viewport(), inner);
        rect.is_some_and(|rect| contains(rect, col, row))
    }

    /// Clicks on the popup stay with the popup and never reach the map
    pub fn click(&mut self, col: u16, row: u16) {
        if self.on_popup(col, row) {
            return;
        }
        if let Some((px, py)) = self.map_pixel(col, row) {
            self.engine.click(px, py);
            self.refresh_pointer();
        } else if let Some(panel_row) = self.panel_row(col, row) {
            let event = self.panel.click(panel_row);
            self.dispatch(event);
            self.refresh_pointer();
        }
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.engine.pan(dx, dy);
        self.refresh_pointer();
    }

    pub fn zoom_in(&mut self) {
        self.engine.zoom_in();
        self.refresh_pointer();
    }

    pub fn zoom_out(&mut self) {
        self.engine.zoom_out();
        self.refresh_pointer();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        if let Some((px, py)) = self.map_pixel(col, row) {
            self.engine.zoom_in_at(px, py);
            self.refresh_pointer();
        }
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        if let Some((px, py)) = self.map_pixel(col, row) {
            self.engine.zoom_out_at(px, py);
            self.refresh_pointer();
        }
    }

    pub fn reset_view(&mut self) {
        self.engine.reset_view();
        self.refresh_pointer();
    }

    pub fn select_next_boundary(&mut self) {
        let event = self.panel.select_next();
        self.dispatch(event);
        self.refresh_pointer();
    }

    pub fn select_previous_boundary(&mut self) {
        let event = self.panel.select_previous();
        self.dispatch(event);
        self.refresh_pointer();
    }

    pub fn toggle_layer(&mut self) {
        let event = self.panel.toggle_layer();
        self.dispatch(Some(event));
        self.refresh_pointer();
    }

    /// Esc closes an open popup first, then quits
    pub fn escape(&mut self) {
        if !self.engine.close_popup() {
            self.quit();
        }
    }

    pub fn quit(&mut self) {
        debug!("quit requested");
        self.should_quit = true;
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("z{:.1}", self.engine.viewport().zoom)
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        let center = self.engine.viewport().center;
        format!(
            "{:.1}°{}, {:.1}°{}",
            center.lat.abs(),
            if center.lat >= 0.0 { "N" } else { "S" },
            center.lng.abs(),
            if center.lng >= 0.0 { "E" } else { "W" }
        )
    }

    /// Get current basemap LOD as a string
    pub fn lod_level(&self) -> &'static str {
        match Lod::from_zoom(self.engine.viewport().zoom) {
            Lod::Low => "110m",
            Lod::Medium => "50m",
            Lod::High => "10m",
        }
    }

    pub fn source_status(&self) -> String {
        let id = &self.controller.settings().source_id;
        match self.engine.source(id) {
            None => "waiting for map".to_string(),
            Some(SourceSlot::Loading) => "loading data…".to_string(),
            Some(SourceSlot::Ready(source)) => format!("{} features", source.features().len()),
            Some(SourceSlot::Failed(reason)) => format!("data failed: {reason}"),
        }
    }

    /// Name of the feature currently highlighted, if any
    pub fn hovered_name(&self) -> Option<String> {
        let settings = self.controller.settings();
        let id = self.controller.hovered()?;
        let source = self.engine.source(&settings.source_id)?.ready()?;
        let feature = source.features().iter().find(|f| f.id == Some(id))?;
        feature
            .properties
            .get(&settings.name_property)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{self, SOURCE};
    use crate::engine::MapEngine;
    use crate::geo::LngLat;
    use crate::style::Visibility;
    use std::path::PathBuf;

    struct TempData(PathBuf);

    impl Drop for TempData {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn app(name: &str) -> (App, TempData) {
        let dir = std::env::temp_dir().join(format!("provmap-app-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("provinces.geojson");
        std::fs::write(&path, fixtures::PROVINCES_GEOJSON).unwrap();

        let mut config = AppConfig::default();
        config.source.data = path.to_string_lossy().into_owned();
        let mut app = App::new(&config, Basemap::new(), 120, 40);
        for _ in 0..200 {
            app.tick();
            if matches!(app.engine.source(SOURCE), Some(SourceSlot::Ready(_))) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        (app, TempData(dir))
    }

    fn hover_flag(app: &App, id: u64) -> bool {
        let state = app.engine.feature_state(SOURCE, id);
        state.get("hover") == Some(&serde_json::json!(true))
    }

    fn cell_of(app: &App, p: LngLat) -> (u16, u16) {
        let (px, py) = app.engine.viewport().project(p);
        let inner = app.screen().map_inner();
        (inner.x + (px / 2) as u16, inner.y + (py / 4) as u16)
    }

    #[test]
    fn test_layout_sizes_viewport() {
        let (mut app, _tmp) = app("layout");
        let inner = app.screen().map_inner();
        assert_eq!(inner, Rect::new(1, 1, 88, 37));
        assert_eq!(app.engine.viewport().width, 176);
        assert_eq!(app.engine.viewport().height, 148);

        app.resize(80, 30);
        assert_eq!(
            app.engine.viewport().width,
            (80 - PANEL_WIDTH as usize - 2) * 2
        );
        assert_eq!(app.engine.viewport().height, 27 * 4);
    }

    #[test]
    fn test_source_loads_after_map_load() {
        let (app, _tmp) = app("load");
        assert_eq!(app.source_status(), "4 features");
        assert!(app.engine.layer(fixtures::LAYER).is_some());
    }

    #[test]
    fn test_hover_follows_mouse() {
        let (mut app, _tmp) = app("hover");
        let (col, row) = cell_of(&app, fixtures::ALBERTA);
        app.mouse_moved(col, row);
        app.tick();
        assert_eq!(app.hovered_name().as_deref(), Some("Alberta"));
        assert!(hover_flag(&app, 0));

        let (col, row) = cell_of(&app, fixtures::YUKON);
        app.mouse_moved(col, row);
        app.tick();
        assert_eq!(app.hovered_name().as_deref(), Some("Yukon"));
        assert!(!hover_flag(&app, 0));

        // Status bar row is outside the map
        app.mouse_moved(0, 39);
        app.tick();
        assert_eq!(app.controller.hovered(), None);
        assert!(!hover_flag(&app, 3));
    }

    #[test]
    fn test_click_opens_popup_and_escape_closes_it() {
        let (mut app, _tmp) = app("popup");
        let (col, row) = cell_of(&app, fixtures::ONTARIO);
        app.mouse_down(col, row);
        app.mouse_up(col, row);
        app.tick();
        let popup = app.engine.popup().expect("popup after click");
        assert_eq!(
            popup.text(),
            "Province/Territory: Ontario Population: 14223942"
        );

        app.escape();
        assert!(app.engine.popup().is_none());
        assert!(!app.should_quit);
        app.escape();
        assert!(app.should_quit);
    }

    #[test]
    fn test_click_on_popup_stays_with_popup() {
        let (mut app, _tmp) = app("popup-click");
        let (col, row) = cell_of(&app, fixtures::ONTARIO);
        app.click(col, row);
        app.tick();
        let first = app.engine.popup().cloned().expect("popup after click");
        let inner = app.screen().map_inner();
        let rect = ui::popup_rect(&first, app.engine.viewport(), inner).unwrap();

        app.click(rect.x + 1, rect.y + 1);
        app.tick();
        assert_eq!(app.engine.popup(), Some(&first));

        // Outside the box the map gets the click and closes it
        let (col, row) = cell_of(&app, fixtures::OUTSIDE);
        app.click(col, row);
        assert!(app.engine.popup().is_none());
    }

    #[test]
    fn test_resize_refreshes_hover() {
        let (mut app, _tmp) = app("resize");
        let (col, row) = cell_of(&app, fixtures::ALBERTA);
        app.mouse_moved(col, row);
        app.tick();
        assert!(hover_flag(&app, 0));

        // The map shrinks away from under the mouse
        app.resize(120, 5);
        app.tick();
        assert_eq!(app.controller.hovered(), None);
        assert!(!hover_flag(&app, 0));
    }

    #[test]
    fn test_drag_pans_without_clicking() {
        let (mut app, _tmp) = app("drag");
        let before = app.engine.viewport().center;
        let (col, row) = cell_of(&app, fixtures::ONTARIO);
        app.mouse_down(col, row);
        app.handle_drag(col + 4, row);
        app.mouse_up(col + 4, row);
        app.tick();
        assert!(app.engine.viewport().center.lng < before.lng);
        assert!(app.engine.popup().is_none());
    }

    #[test]
    fn test_panel_drives_filter_and_visibility() {
        let (mut app, _tmp) = app("panel");
        let inner = app.screen().panel_inner();

        // Row 0 is the heading, row 1 "All", row 6 Ontario
        app.click(inner.x + 2, inner.y + 6);
        assert_eq!(app.panel.selected_value(), "Ontario");
        let (col, row) = cell_of(&app, fixtures::ALBERTA);
        app.mouse_moved(col, row);
        app.tick();
        assert_eq!(app.controller.hovered(), None);

        app.toggle_layer();
        let layer = app.engine.layer(fixtures::LAYER).unwrap();
        assert_eq!(layer.layout.visibility, Visibility::None);

        app.select_previous_boundary();
        assert_eq!(app.panel.selected_value(), "Manitoba");
    }
}
