use crate::app::App;
use crate::controller::legend;
use crate::engine::{Cursor, MapFrame, NavButton, Popup};
use crate::map::Viewport;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};

const POPUP_MAX_WIDTH: u16 = 32;

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let screen = app.screen();
    render_map(frame, app, screen.map);
    render_panel(frame, app, screen.panel);
    render_status_bar(frame, app, screen.status);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    // Create a block with border
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Canada: Population by Province/Territory ",
            bold(Color::Cyan),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let map_widget = MapWidget {
        map: app.engine.render(),
        nav: app.engine.navigation_layout(),
        cursor: app.mouse_cell().map(|pos| (pos, app.engine.cursor())),
    };
    frame.render_widget(map_widget, inner);

    if let Some(popup) = app.engine.popup() {
        if let Some(rect) = popup_rect(popup, app.engine.viewport(), inner) {
            frame.render_widget(Clear, rect);
            frame.render_widget(
                Paragraph::new(popup.text())
                    .wrap(Wrap { trim: true })
                    .style(Style::default().fg(Color::Black).bg(Color::White))
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(Color::DarkGray).bg(Color::White)),
                    ),
                rect,
            );
        }
    }
}

fn bold(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Box above the anchor, centered on it and kept inside the map
pub fn popup_rect(popup: &Popup, viewport: &Viewport, area: Rect) -> Option<Rect> {
    let (px, py) = viewport.project(popup.lng_lat);
    if !viewport.is_visible(px, py) {
        return None;
    }
    let text = popup.text();
    let text_len = text.chars().count() as u16;
    let width = (text_len + 2).min(POPUP_MAX_WIDTH).min(area.width);
    let lines = wrapped_lines(&text, width.saturating_sub(2) as usize) as u16;
    let height = (lines + 2).min(area.height);

    let ax = area.x + (px / 2) as u16;
    let ay = area.y + (py / 4) as u16;
    let max_x = area.x + area.width - width;
    let x = ax.saturating_sub(width / 2).clamp(area.x, max_x);
    let y = if ay >= area.y + height {
        ay - height
    } else {
        (ay + 1).min(area.y + area.height - height)
    };
    Some(Rect::new(x, y, width, height))
}

/// Lines `text` takes when word-wrapped to `width` columns. Words wider
/// than a line are broken across lines.
fn wrapped_lines(text: &str, width: usize) -> usize {
    let width = width.max(1);
    let mut lines = 1;
    let mut used = 0;
    for word in text.split_whitespace() {
        let len = word.chars().count();
        if used > 0 && used + 1 + len <= width {
            used += 1 + len;
            continue;
        }
        if used > 0 {
            lines += 1;
        }
        lines += (len - 1) / width;
        used = (len - 1) % width + 1;
    }
    lines
}

/// Colored cells with braille strokes, navigation buttons and the cursor marker
struct MapWidget {
    map: MapFrame,
    nav: Vec<(usize, usize, NavButton)>,
    cursor: Option<((u16, u16), Cursor)>,
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = self.map.rows().min(area.height as usize);
        let cols = self.map.cols().min(area.width as usize);

        for cy in 0..rows {
            for cx in 0..cols {
                let cell = &mut buf[(area.x + cx as u16, area.y + cy as u16)];
                if let Some(bg) = self.map.fill(cx, cy) {
                    cell.set_bg(bg.into());
                }
                if let Some((ch, fg)) = self.map.stroke(cx, cy) {
                    cell.set_char(ch).set_fg(fg.into());
                }
            }
        }

        let button_style = Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD);
        for (cx, cy, button) in self.nav {
            if cx < cols && cy < rows {
                buf[(area.x + cx as u16, area.y + cy as u16)]
                    .set_char(button.glyph())
                    .set_style(button_style);
            }
        }

        // Render cursor marker
        if let Some(((cx, cy), cursor)) = self.cursor {
            if (cx as usize) < cols && (cy as usize) < rows {
                let (glyph, color) = match cursor {
                    Cursor::Default => ('╋', Color::DarkGray),
                    Cursor::Pointer => ('☚', Color::Black),
                };
                buf[(area.x + cx, area.y + cy)]
                    .set_char(glyph)
                    .set_fg(color);
            }
        }
    }
}

fn render_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Layers ", bold(Color::Cyan)));

    let panel = &app.panel;
    let mut lines = Vec::with_capacity(panel.height() + 8);
    lines.push(Line::from(Span::styled("Boundary [ ]", bold(Color::Gray))));
    for (i, option) in panel.options().iter().enumerate() {
        let selected = i == panel.selected();
        let style = if selected {
            bold(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        let marker = if selected { "(•) " } else { "( ) " };
        lines.push(Line::from(Span::styled(format!("{marker}{option}"), style)));
    }
    lines.push(Line::default());
    let check = if panel.layer_checked() { "[x]" } else { "[ ]" };
    lines.push(Line::from(vec![
        Span::styled(check, Style::default().fg(Color::Green)),
        Span::styled(" Show provinces (space)", Style::default().fg(Color::White)),
    ]));

    lines.push(Line::default());
    let legend_title = Span::styled("Population 2021", bold(Color::Gray));
    lines.push(Line::from(legend_title));
    for (color, label) in legend() {
        lines.push(Line::from(vec![
            Span::styled("██ ", Style::default().fg(color.into())),
            Span::styled(label, Style::default().fg(Color::White)),
        ]));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" (", Style::default().fg(Color::DarkGray)),
        Span::styled(app.lod_level(), Style::default().fg(Color::Magenta)),
        Span::styled(") | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.source_status(), Style::default().fg(Color::Green)),
    ];
    if let Some(name) = app.hovered_name() {
        spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(name, bold(Color::White)));
    }
    spans.push(Span::styled(
        " | hjkl:pan +/-:zoom [/]:boundary space:layer r:reset q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LngLat;

    fn viewport() -> Viewport {
        Viewport::new(LngLat::new(-105.0, 58.0), 3.0, 160, 80)
    }

    #[test]
    fn test_popup_sits_above_anchor() {
        let area = Rect::new(1, 1, 80, 20);
        let popup = Popup::new(
            LngLat::new(-105.0, 58.0),
            "Province/Territory: Alberta Population: 4262635",
        );
        let rect = popup_rect(&popup, &viewport(), area).unwrap();
        assert_eq!(rect.width, POPUP_MAX_WIDTH);
        // Two wrapped lines plus the border
        assert_eq!(rect.height, 4);
        // Anchor is the map center: row 1 + 10
        assert!(rect.y + rect.height <= 11);
        assert!(rect.x >= area.x);
        assert!(rect.x + rect.width <= area.x + area.width);
    }

    #[test]
    fn test_popup_near_top_goes_below() {
        let area = Rect::new(1, 1, 80, 20);
        let vp = viewport();
        let anchor = vp.unproject(80, 2);
        let popup = Popup::new(anchor, "Yukon: 40232");
        let rect = popup_rect(&popup, &vp, area).unwrap();
        assert_eq!(rect.y, 2);
        assert_eq!(rect.width, 14);
        assert_eq!(rect.height, 3);
    }

    #[test]
    fn test_offscreen_popup_hidden() {
        let popup = Popup::new(LngLat::new(100.0, 0.0), "far away");
        let area = Rect::new(0, 0, 80, 20);
        assert!(popup_rect(&popup, &viewport(), area).is_none());
    }

    #[test]
    fn test_wrapped_lines_follow_word_breaks() {
        assert_eq!(wrapped_lines("", 10), 1);
        assert_eq!(wrapped_lines("Yukon: 40232", 12), 1);
        // 11 characters would fit two 6-wide lines, but the words need three
        assert_eq!(wrapped_lines("aaa bbbb cc", 6), 3);
        assert_eq!(wrapped_lines("abcdefghijkl x", 5), 3);
    }
}
