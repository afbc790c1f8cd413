//! UI rendering module.
//!
//! Contains all the widget rendering logic (View).

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
};

use crate::app::{App, InputMode, LogEntry, Tab};
use qrscan_core::{LogLevel, SessionStatus};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header/tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Footer/status bar
        ])
        .split(area);

    draw_header(frame, chunks[0], app);

    match app.current_tab {
        Tab::Main => draw_main_view(frame, chunks[1], app),
        Tab::Logs => draw_logs_view(frame, chunks[1], app),
        Tab::Help => draw_help_view(frame, chunks[1]),
    }

    draw_footer(frame, chunks[2], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let titles = vec!["Scanner", "Logs (F2)", "Help (F1)"];
    let selected = match app.current_tab {
        Tab::Main => 0,
        Tab::Logs => 1,
        Tab::Help => 2,
    };

    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" QRScan ")
                .title_style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
        )
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .divider(symbols::DOT);

    frame.render_widget(tabs, area);
}

fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::CameraActive => Color::Green,
        SessionStatus::ImageScanning => Color::Cyan,
        SessionStatus::Error => Color::Red,
        SessionStatus::Idle => Color::DarkGray,
        _ => Color::Yellow,
    }
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let line = match &app.mode {
        InputMode::PathPrompt(path) => Line::from(vec![
            Span::styled(" Image path: ", Style::default().fg(Color::Cyan)),
            Span::styled(path.clone(), Style::default().fg(Color::White)),
            Span::styled("▏", Style::default().fg(Color::Yellow)),
            Span::styled(
                "  Enter: Scan | Esc: Cancel ",
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        InputMode::Normal => {
            let camera = match &app.active_device {
                Some(id) => Span::styled(format!(" ● {} ", id), Style::default().fg(Color::Green)),
                None => Span::styled(" ○ No camera ", Style::default().fg(Color::Red)),
            };
            let status = Span::styled(
                format!(" {} ", app.status),
                Style::default().fg(status_color(app.status)),
            );
            let help = Span::styled(
                " s: Start | x: Stop | n: Switch | i: Image | Enter: Select | Esc: Quit ",
                Style::default().fg(Color::DarkGray),
            );
            Line::from(vec![camera, status, help])
        }
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    frame.render_widget(footer, area);
}

fn draw_main_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(35), // Devices + status
            Constraint::Percentage(65), // Results + logs
        ])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(6)])
        .split(chunks[0]);

    draw_devices(frame, left[0], app);
    draw_status(frame, left[1], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // Error slot
            Constraint::Percentage(50), // Results
            Constraint::Min(5),         // Recent logs
        ])
        .split(chunks[1]);

    draw_error_slot(frame, right[0], app);
    draw_results(frame, right[1], app);
    draw_recent_logs(frame, right[2], app);
}

fn draw_devices(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = if app.devices.is_empty() {
        vec![ListItem::new(Span::styled(
            "No cameras listed (press s)",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        app.devices
            .iter()
            .enumerate()
            .map(|(i, device)| {
                let active = app.active_device.as_deref() == Some(device.id.as_str());
                let marker = if active { "● " } else { "  " };
                let mut style = Style::default().fg(if active { Color::Green } else { Color::White });
                if i == app.device_cursor {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                ListItem::new(Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Green)),
                    Span::styled(device.display_label(i), style),
                ]))
            })
            .collect()
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Cameras "),
    );

    frame.render_widget(list, area);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &App) {
    let content = vec![
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Cyan)),
            Span::styled(
                app.status.to_string(),
                Style::default().fg(status_color(app.status)),
            ),
        ]),
        Line::from(vec![
            Span::styled("Scanned: ", Style::default().fg(Color::Cyan)),
            Span::styled(app.results.len().to_string(), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Misses: ", Style::default().fg(Color::Cyan)),
            Span::styled(app.misses.to_string(), Style::default().fg(Color::DarkGray)),
        ]),
    ];

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Session "),
    );
    frame.render_widget(paragraph, area);
}

fn draw_error_slot(frame: &mut Frame, area: Rect, app: &App) {
    let (text, color) = match &app.error {
        Some(message) => (message.as_str(), Color::Red),
        None => ("", Color::DarkGray),
    };

    let paragraph = Paragraph::new(Span::styled(text, Style::default().fg(color)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(" Error "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_results(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .results
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|entry| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{} ", entry.timestamp),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(entry.text.clone(), Style::default().fg(Color::Green)),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(format!(" Results ({}) ", app.results.len())),
    );

    frame.render_widget(list, area);
}

fn draw_recent_logs(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .logs
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|entry| log_to_list_item(entry, area.width))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Recent Logs "),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(list, area);
}

fn draw_logs_view(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .logs
        .iter()
        .skip(app.log_scroll)
        .take(area.height.saturating_sub(2) as usize)
        .map(|entry| log_to_list_item(entry, area.width))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(format!(
                    " Logs ({}/{}) ",
                    app.log_scroll + 1,
                    app.logs.len().max(1)
                )),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(list, area);
}

fn draw_help_view(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        "",
        "  QRScan TUI - QR code scanner",
        "",
        "  KEYBOARD SHORTCUTS:",
        "",
        "  Ctrl+Q, Ctrl+C, Esc    Quit application",
        "  F1                     Show this help",
        "  F2                     View full logs",
        "  s                      Start scanning (retries permission)",
        "  x                      Stop the camera",
        "  n                      Switch to the next camera",
        "  Up/Down, Enter         Pick a camera from the list",
        "  i                      Scan an image file",
        "",
        "  IN LOGS VIEW:",
        "",
        "  j/k, Up/Down           Scroll logs",
        "  Page Up/Down           Scroll by page",
        "  Home/End               Go to start/end",
        "",
        "  Each code is reported once per session.",
        "",
        "  Press any key to return...",
    ];

    let text: Vec<Line> = help_text.iter().map(|s| Line::from(*s)).collect();

    let help = Paragraph::new(Text::from(text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help "),
        )
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });

    frame.render_widget(help, area);
}

fn log_to_list_item(entry: &LogEntry, width: u16) -> ListItem<'static> {
    let (icon, color) = match entry.level {
        LogLevel::Error => ("✗", Color::Red),
        LogLevel::Warn => ("⚠", Color::Yellow),
        LogLevel::Info => ("●", Color::Green),
        LogLevel::Debug => ("○", Color::Blue),
        LogLevel::Trace => ("·", Color::DarkGray),
    };

    let prefix = vec![
        Span::styled(
            format!("{} ", entry.timestamp),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("{} ", icon), Style::default().fg(color)),
    ];
    let indent = entry.timestamp.chars().count() + 3;
    let msg_width = (width as usize).saturating_sub(indent + 4).max(1);

    let chars: Vec<char> = entry.message.chars().collect();
    let mut chunks = chars.chunks(msg_width).map(|c| c.iter().collect::<String>());

    let mut first = prefix;
    first.push(Span::styled(
        chunks.next().unwrap_or_default(),
        Style::default().fg(Color::White),
    ));
    let mut lines = vec![Line::from(first)];
    for rest in chunks {
        lines.push(Line::from(vec![
            Span::raw(" ".repeat(indent)),
            Span::styled(rest, Style::default().fg(Color::White)),
        ]));
    }
    ListItem::new(Text::from(lines))
}
