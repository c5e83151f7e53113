//! Rendering: transport bar, beat indicator, help line.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use woodshed::engine::Snapshot;
use woodshed::timing::is_sounding_measure;

pub fn render(frame: &mut Frame, snapshot: &Snapshot, status: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport bar
            Constraint::Length(5), // Beat indicator
            Constraint::Min(0),    // Spacer
            Constraint::Length(1), // Help bar
        ])
        .split(frame.area());

    render_transport(frame, chunks[0], snapshot, status);
    render_beats(frame, chunks[1], snapshot);
    render_help(frame, chunks[3]);
}

fn render_transport(frame: &mut Frame, area: Rect, snapshot: &Snapshot, status: Option<&str>) {
    let block = Block::default().title(" woodshed ").borders(Borders::ALL);

    let params = snapshot.params;
    let play_symbol = if snapshot.is_playing { "▶" } else { "⏸" };
    let play_state = if snapshot.is_playing { "Playing" } else { "Stopped" };

    let mut spans = vec![
        Span::styled(
            format!(" BPM: {}  ", params.bpm),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("{play_symbol} {play_state}  "),
            Style::default().fg(if snapshot.is_playing {
                Color::Green
            } else {
                Color::Yellow
            }),
        ),
        Span::styled(
            format!("{}/4 time  ", params.beats_per_measure),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Play every {}  ", params.play_every_n),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Count-in: {}  ", params.count_in_measures),
            Style::default().fg(Color::White),
        ),
    ];
    if let Some(status) = status {
        spans.push(Span::styled(
            status.to_string(),
            Style::default().fg(Color::Red),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_beats(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let params = snapshot.params;
    let sounding = is_sounding_measure(snapshot.current_measure, params.play_every_n);

    let (label, color) = if !snapshot.is_playing {
        ("", Color::DarkGray)
    } else if snapshot.is_counting_in {
        ("(Count-in)", Color::Yellow)
    } else if sounding {
        ("(Playing)", Color::Green)
    } else {
        ("(Silent)", Color::DarkGray)
    };

    let measure_label = if snapshot.is_counting_in {
        "Count-in"
    } else {
        "Measure"
    };

    let mut cells = vec![Span::raw(" ")];
    for beat in 1..=params.beats_per_measure {
        let active = snapshot.is_playing && snapshot.current_beat == beat;
        let symbol = if active { "●" } else { "○" };
        let style = if active {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        cells.push(Span::styled(format!("{symbol} "), style));
    }

    let lines = vec![
        Line::from(cells),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!(" {measure_label} {}  ", snapshot.current_measure),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("Beat {}  ", snapshot.current_beat),
                Style::default().fg(Color::White),
            ),
            Span::styled(label, Style::default().fg(color)),
        ]),
    ];

    let block = Block::default().title(" Beat ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        " [Space] Start/Stop  [↑↓←→] BPM  [b/B] Beats  [n/N] Play every  [c/C] Count-in  [Q] Quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}
