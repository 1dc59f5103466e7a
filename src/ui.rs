//! Terminal User Interface for pyromon.
//!
//! This module provides a real-time dashboard using `ratatui` that displays:
//!
//! - Status bar with host, heartbeat, latency and call counters
//! - Error banner while the endpoint is failing
//! - Ten rolling charts fed by the poll loop
//! - Detail panels with the latest scalar values
//!
//! # Controls
//!
//! - `q`, `Esc` or `Ctrl+C`: Quit

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, BorderType, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph},
    Frame, Terminal,
};

use crate::charts::{ChartId, Series};
use crate::display::Display;
use crate::handlers::Dashboard;
use crate::poll::{Fetch, Poller};

/// Longest time the loop blocks waiting for input.
const INPUT_TICK: Duration = Duration::from_millis(100);

/// Run the TUI event loop.
///
/// This takes ownership of the poller and terminal, running until the
/// user presses `q` or `Esc`, or the `running` flag is set to false.
///
/// # Arguments
///
/// * `poller` - Poll loop for the configured endpoint
/// * `running` - Atomic flag to signal shutdown
/// * `window` - Time span shown on the chart x-axis
pub fn run<F: Fetch>(
    mut poller: Poller<F>,
    running: Arc<AtomicBool>,
    window: Duration,
) -> std::io::Result<()> {
    enable_raw_mode()?;
    if let Err(e) = std::io::stdout().execute(EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e);
    }

    let result = run_tui_loop(&mut poller, &running, window);
    poller.shutdown();

    // Always clean up terminal state
    let _ = disable_raw_mode();
    let _ = std::io::stdout().execute(LeaveAlternateScreen);

    result
}

/// Inner TUI loop - separated to ensure cleanup happens on any exit path.
fn run_tui_loop<F: Fetch>(
    poller: &mut Poller<F>,
    running: &Arc<AtomicBool>,
    window: Duration,
) -> std::io::Result<()> {
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;

    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if poller.fire_due(now) {
            poller.start(now);
            // Show the lit heartbeat while the request blocks
            terminal.draw(|f| draw_ui(f, poller.dashboard(), window))?;
            let outcome = poller.fetch();
            let wall = Utc::now();
            let dispatch = poller.dispatch(outcome, wall);
            poller.complete(dispatch, Instant::now(), wall);
        }

        terminal.draw(|f| draw_ui(f, poller.dashboard(), window))?;

        let timeout = poller
            .scheduler()
            .next_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(INPUT_TICK)
            .min(INPUT_TICK);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            running.store(false, Ordering::Relaxed);
                        }
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            running.store(false, Ordering::Relaxed);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(())
}

/// Main UI drawing function.
fn draw_ui(f: &mut Frame, dash: &Dashboard, window: Duration) {
    let size = f.area();
    let banner = dash.display.error_banner();

    let mut constraints = vec![Constraint::Length(3)];
    if banner.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(16));
    constraints.push(Constraint::Length(9));

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(size);

    let mut chunk_idx = 0;

    draw_status_bar(f, &dash.display, main_chunks[chunk_idx]);
    chunk_idx += 1;

    if let Some(text) = banner {
        draw_error_banner(f, text, main_chunks[chunk_idx]);
        chunk_idx += 1;
    }

    draw_charts(f, dash, window, main_chunks[chunk_idx]);
    chunk_idx += 1;

    draw_details(f, &dash.display, main_chunks[chunk_idx]);
}

/// Draw the top status bar.
fn draw_status_bar(f: &mut Frame, display: &Display, area: Rect) {
    let (beat, beat_style) = if display.heartbeat() {
        ("●", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
    } else {
        ("○", Style::default().fg(Color::Gray))
    };

    let status_text = format!(
        " {} | Latency: {} | Calls: {} | Errors: {} | Updated: {} | [q]uit",
        display.page_title(),
        display.text_or_dash("latency"),
        display.text_or_dash("calls"),
        display.text_or_dash("errors"),
        display.text_or_dash("last_updated"),
    );

    let status = Paragraph::new(ratatui::text::Line::from(vec![
        Span::styled(format!(" {}", beat), beat_style),
        Span::raw(status_text),
    ]))
    .style(Style::default().fg(Color::White).bg(Color::DarkGray))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title("Status"),
    );

    f.render_widget(status, area);
}

/// Draw the banner naming the failing endpoint.
fn draw_error_banner(f: &mut Frame, text: &str, area: Rect) {
    let paragraph = Paragraph::new(text.to_string())
        .style(Style::default().fg(Color::White).bg(Color::Red))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("⚠ OFFLINE")
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(paragraph, area);
}

/// Draw the 2x5 grid of charts.
fn draw_charts(f: &mut Frame, dash: &Dashboard, window: Duration, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(area);

    let columns = [Constraint::Ratio(1, 5); 5];
    let cells: Vec<Rect> = rows
        .iter()
        .flat_map(|row| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints(columns)
                .split(*row)
                .to_vec()
        })
        .collect();

    for (id, cell) in ChartId::ALL.into_iter().zip(cells) {
        draw_line_chart(f, dash.charts.series(id), id, window, cell);
    }
}

/// Chart color per row: system metrics cyan, transfer rates yellow.
fn chart_color(id: ChartId) -> Color {
    match id {
        ChartId::Latency => Color::Magenta,
        ChartId::CpuUsage | ChartId::RamUsage | ChartId::SwapUsage => Color::Cyan,
        ChartId::DiskRead | ChartId::DiskWrite => Color::Green,
        ChartId::NetRead | ChartId::NetWrite => Color::LightBlue,
        ChartId::EngineDown | ChartId::EngineUp => Color::Yellow,
    }
}

/// Draw a single rolling line chart.
///
/// The x-axis is seconds relative to the newest point, spanning `window`.
fn draw_line_chart(f: &mut Frame, series: &Series, id: ChartId, window: Duration, area: Rect) {
    let title = id.label();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(Span::styled(title, Style::default().fg(Color::White)));

    let Some((newest, _)) = series.latest() else {
        let waiting = Paragraph::new("Waiting for data...").block(block);
        f.render_widget(waiting, area);
        return;
    };

    let span = window.as_secs_f64().max(1.0);
    let data: Vec<(f64, f64)> = series
        .points()
        .iter()
        .map(|(ts, value)| ((ts - newest) / 1000.0, *value))
        .filter(|(x, _)| *x >= -span)
        .collect();

    let y_range = if id.is_percentage() {
        (0.0, 100.0)
    } else {
        let max_y = data.iter().map(|(_, y)| *y).fold(0.0, f64::max);
        if max_y < 0.001 {
            (0.0, 1.0)
        } else {
            (0.0, max_y * 1.05)
        }
    };

    let datasets = vec![Dataset::default()
        .name(title)
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(chart_color(id)))
        .data(&data)];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([-span, 0.0]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels(vec![
                    Span::raw(format!("{:.0}", y_range.0)),
                    Span::raw(format!("{:.1}", y_range.1)),
                ])
                .bounds([y_range.0, y_range.1]),
        );

    f.render_widget(chart, area);
}

/// A `label: value` row, with the element's detail appended when set.
fn detail_item(display: &Display, label: &str, id: &str) -> ListItem<'static> {
    let text = match display.title(id) {
        Some(title) => format!("{:<10}{} ({})", label, display.text_or_dash(id), title),
        None => format!("{:<10}{}", label, display.text_or_dash(id)),
    };
    ListItem::new(text)
}

fn panel(items: Vec<ListItem<'static>>, title: &'static str) -> List<'static> {
    List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(title),
    )
}

/// Draw the bottom detail panels.
fn draw_details(f: &mut Frame, display: &Display, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    // Column 1: Engine
    let mut engine_items = vec![
        detail_item(display, "Engine:", "engine_id"),
        detail_item(display, "Up:", "engine_uptime"),
        detail_item(display, "rTorrent:", "rt_version"),
        detail_item(display, "libtorrent:", "lt_version"),
        detail_item(display, "Down:", "rtrs"),
        detail_item(display, "Up rate:", "rtws"),
    ];
    for (id, text) in display.texts_with_prefix("v_") {
        engine_items.push(ListItem::new(format!("{:<10}{}", &id[2..], text)));
    }
    f.render_widget(panel(engine_items, "Engine"), cols[0]);

    // Column 2: System
    let sys_items = vec![
        detail_item(display, "Uptime:", "uptime"),
        detail_item(display, "CPU:", "cpu_usage"),
        detail_item(display, "RAM:", "ram_usage"),
        detail_item(display, "Swap:", "swap_usage"),
        detail_item(display, "Latency:", "latency"),
    ];
    f.render_widget(panel(sys_items, "System"), cols[1]);

    // Column 3: Disk
    let mut disk_items = vec![
        ListItem::new(format!(
            "Used:     {} / {} ({})",
            display.text_or_dash("disku"),
            display.text_or_dash("diskt"),
            display.text_or_dash("diskp"),
        )),
        detail_item(display, "Read:", "diskr"),
        detail_item(display, "Written:", "diskw"),
        detail_item(display, "Read/s:", "diskrs"),
        detail_item(display, "Write/s:", "diskws"),
    ];
    disk_items.extend(volume_lines(display).into_iter().map(ListItem::new));
    f.render_widget(panel(disk_items, "Disk"), cols[2]);

    // Column 4: Network
    let net_items = vec![
        detail_item(display, "Received:", "netr"),
        detail_item(display, "Sent:", "netw"),
        detail_item(display, "In/s:", "netrs"),
        detail_item(display, "Out/s:", "netws"),
    ];
    f.render_widget(panel(net_items, "Network"), cols[3]);
}

/// Per-volume usage lines in volume order, stopping at the first gap.
pub fn volume_lines(display: &Display) -> Vec<String> {
    (0..)
        .map_while(|n| display.text(&format!("diskp_{}", n)).map(|pct| (n, pct)))
        .map(|(n, pct)| {
            format!(
                "Vol {}:    {} / {} ({})",
                n,
                display.text_or_dash(&format!("disku_{}", n)),
                display.text_or_dash(&format!("diskt_{}", n)),
                pct,
            )
        })
        .collect()
}

/// One line summarizing the dashboard, for headless mode.
pub fn summary_line(display: &Display) -> String {
    match display.error_banner() {
        Some(banner) => format!(
            "[{}] OFFLINE: {} | Calls: {} | Errors: {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            banner,
            display.text_or_dash("calls"),
            display.text_or_dash("errors"),
        ),
        None => format!(
            "[{}] {} | Latency: {} | CPU: {} | RAM: {} | Disk R/W: {} {} | Net In/Out: {} {} | Engine Down/Up: {} {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            display.page_title(),
            display.text_or_dash("latency"),
            display.text_or_dash("cpu_usage"),
            display.text_or_dash("ram_usage"),
            display.text_or_dash("diskrs"),
            display.text_or_dash("diskws"),
            display.text_or_dash("netrs"),
            display.text_or_dash("netws"),
            display.text_or_dash("rtrs"),
            display.text_or_dash("rtws"),
        ),
    }
}

/// Run in headless mode (no TUI, one line per poll on stdout).
///
/// # Arguments
///
/// * `poller` - Poll loop for the configured endpoint
/// * `running` - Atomic flag to signal shutdown
pub fn run_headless<F: Fetch>(mut poller: Poller<F>, running: Arc<AtomicBool>) -> std::io::Result<()> {
    println!("pyromon - PyroScope Monitoring");
    println!("==============================");
    println!("Polling: {}", poller.url());
    println!("Press Ctrl+C to stop.\n");

    while running.load(Ordering::Relaxed) {
        if poller.fire_due(Instant::now()) {
            poller.poll_now();
            println!("{}", summary_line(&poller.dashboard().display));
        }

        let sleep = poller
            .scheduler()
            .next_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(INPUT_TICK)
            .min(INPUT_TICK);
        std::thread::sleep(sleep);
    }

    poller.shutdown();
    println!("\nStopped after {} calls.", poller.session().calls);
    Ok(())
}
