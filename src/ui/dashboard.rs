use std::io::Stdout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Bar, BarChart, BarGroup, Block, Borders, Gauge, Paragraph,
    },
    Frame, Terminal,
};

use crate::chart::{AxisLabel, ScaleModel};
use crate::config::ColorDepth;
use crate::format::{readable_time, Units};
use crate::monitor::{Monitor, RenderTarget, TapMonitor, TapReport};

const AXIS_WIDTH: u16 = 8;
const CURVE_AVERAGE_WIDTH: u16 = 6;
const BAR_RESOLUTION: f64 = 100.0;
// half the width of a rendered caption such as "1.95 KiB/s"
const PEAK_LABEL_OFFSET: usize = 4;
const POLL_SLICE: Duration = Duration::from_millis(200);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    pub bar: Color,
    pub peak: Color,
    pub guide: Color,
    pub text: Color,
}

impl Palette {
    pub fn for_depth(depth: ColorDepth) -> Self {
        match depth {
            ColorDepth::Mono => Self {
                bar: Color::Reset,
                peak: Color::Reset,
                guide: Color::Reset,
                text: Color::Reset,
            },
            ColorDepth::Basic => Self {
                bar: Color::Blue,
                peak: Color::Yellow,
                guide: Color::DarkGray,
                text: Color::White,
            },
            ColorDepth::Extended => Self {
                bar: Color::Indexed(23),
                peak: Color::Indexed(76),
                guide: Color::Indexed(81),
                text: Color::Indexed(86),
            },
            ColorDepth::Full => Self {
                bar: Color::Indexed(33),
                peak: Color::Indexed(220),
                guide: Color::Indexed(238),
                text: Color::Indexed(252),
            },
        }
    }
}

/// Full-screen chart of every tap, one panel each.
pub struct Dashboard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    palette: Palette,
    units: Units,
    stop: Arc<AtomicBool>,
}

impl Dashboard {
    pub fn new(colors: ColorDepth, units: Units, stop: Arc<AtomicBool>) -> Result<Self> {
        enable_raw_mode()?;
        let terminal = restore_on_error(open_terminal(), || {
            execute!(std::io::stdout(), LeaveAlternateScreen).ok();
            disable_raw_mode().ok();
        })?;
        Ok(Self {
            terminal,
            palette: Palette::for_depth(colors),
            units,
            stop,
        })
    }
}

fn open_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

/// Run `restore` if `result` failed, so a half set up terminal is put back.
fn restore_on_error<T>(result: Result<T>, restore: impl FnOnce()) -> Result<T> {
    if result.is_err() {
        restore();
    }
    result
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        disable_raw_mode().ok();
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen).ok();
        self.terminal.show_cursor().ok();
    }
}

impl RenderTarget for Dashboard {
    fn render(&mut self, monitor: &Monitor) -> Result<()> {
        let (palette, units) = (self.palette, self.units);
        self.terminal.draw(|f| draw(f, monitor, palette, units))?;
        Ok(())
    }

    fn wait(&mut self, wait: Duration) -> Result<bool> {
        let deadline = Instant::now() + wait;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(false);
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if event::poll(left.min(POLL_SLICE))? {
                if let Event::Key(key) = event::read()? {
                    let quit = matches!(key.code, KeyCode::Char('q' | 'Q') | KeyCode::Esc)
                        || (key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL));
                    if quit && key.kind != KeyEventKind::Release {
                        self.stop.store(true, Ordering::Relaxed);
                        return Ok(false);
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(true);
            }
        }
    }
}

pub fn draw(f: &mut Frame, monitor: &Monitor, palette: Palette, units: Units) {
    let taps = monitor.taps();
    if taps.is_empty() {
        return;
    }
    let panels = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, taps.len() as u32); taps.len()])
        .split(f.size());
    for (tap, area) in taps.iter().zip(panels.iter()) {
        draw_tap(f, *area, tap, monitor.scale(), palette, units);
    }
}

fn draw_tap(
    f: &mut Frame,
    area: Rect,
    tap: &TapMonitor,
    scale: &ScaleModel,
    palette: Palette,
    units: Units,
) {
    let block = Block::default()
        .title(tap.description().to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.guide));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let report = tap.report();
    let mut rows = vec![Constraint::Min(1), Constraint::Length(1)];
    if report.progress.is_some() {
        rows.push(Constraint::Length(1));
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(rows)
        .split(inner);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(AXIS_WIDTH),
            Constraint::Min(1),
            Constraint::Length(CURVE_AVERAGE_WIDTH),
        ])
        .split(rows[0]);

    let axis = axis_rows(scale.labels(), scale.range(), cols[0].height as usize).join("\n");
    f.render_widget(
        Paragraph::new(axis).style(Style::default().fg(palette.text)),
        cols[0],
    );
    draw_chart(f, cols[1], tap, scale, palette, units);
    draw_curve_average(f, cols[2], &report, scale, palette);

    let readout = Line::from(vec![
        Span::styled(
            units.readable_speed(report.current),
            Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  c:"),
        Span::raw(units.readable_speed(Some(report.curve))),
        Span::raw("  A:"),
        Span::raw(units.readable_speed(report.average)),
    ]);
    f.render_widget(Paragraph::new(readout), rows[1]);

    if let Some(progress) = report.progress {
        let eta = match readable_time(report.eta, Some(20)) {
            t if t.is_empty() && !progress.is_complete() => "--".to_string(),
            t => t,
        };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(palette.bar))
            .ratio(progress.fraction())
            .label(format!("{:.1}%  {eta}", progress.fraction() * 100.0));
        f.render_widget(gauge, rows[2]);
    }
}

fn draw_chart(
    f: &mut Frame,
    area: Rect,
    tap: &TapMonitor,
    scale: &ScaleModel,
    palette: Palette,
    units: Units,
) {
    let width = area.width as usize;
    let columns = tap.series().visible(width);
    let peaks = tap.series().peaks(width);
    let range = scale.range();

    let canvas = Canvas::default()
        .marker(Marker::Block)
        .x_bounds([0.0, width as f64])
        .y_bounds([0.0, range])
        .paint(|ctx| {
            for label in scale.labels() {
                ctx.draw(&CanvasLine {
                    x1: 0.0,
                    y1: label.position,
                    x2: width as f64,
                    y2: label.position,
                    color: palette.guide,
                });
            }
            ctx.layer();
            for (col, &pos) in columns.iter().enumerate() {
                if pos <= 0.0 {
                    continue;
                }
                let x = col as f64 + 0.5;
                ctx.draw(&CanvasLine { x1: x, y1: 0.0, x2: x, y2: pos, color: palette.bar });
            }
            ctx.layer();
            for peak in &peaks {
                let caption = units.readable_speed(Some(peak.rate)).trim().to_string();
                ctx.print(
                    peak_label_x(peak.column),
                    peak.position.min(range),
                    Span::styled(caption, Style::default().fg(palette.peak)),
                );
            }
        });
    f.render_widget(canvas, area);
}

/// Side bars for the curved and average rates, on the chart's scale.
fn draw_curve_average(
    f: &mut Frame,
    area: Rect,
    report: &TapReport,
    scale: &ScaleModel,
    palette: Palette,
) {
    let (curve, average) = curve_average_heights(report, scale);
    let bar = |label: &'static str, value: u64, color: Color| {
        Bar::default()
            .label(label.into())
            .value(value)
            .text_value(String::new())
            .style(Style::default().fg(color))
    };
    let chart = BarChart::default()
        .bar_width(2)
        .bar_gap(1)
        .max(bar_height(scale.range()))
        .data(BarGroup::default().bars(&[
            bar("c", curve, palette.bar),
            bar("A", average, palette.peak),
        ]));
    f.render_widget(chart, area);
}

fn bar_height(position: f64) -> u64 {
    (position.max(0.0) * BAR_RESOLUTION).round() as u64
}

/// Bar values for the curved and average rates, scaled so the chart
/// range maps to `bar_height(range)`.
fn curve_average_heights(report: &TapReport, scale: &ScaleModel) -> (u64, u64) {
    (
        bar_height(scale.position(Some(report.curve))),
        bar_height(scale.position(report.average)),
    )
}

/// Canvas x for a peak caption: centred over the bar it annotates.
fn peak_label_x(column: usize) -> f64 {
    column.saturating_sub(PEAK_LABEL_OFFSET) as f64
}

/// Axis captions for a column `height` rows tall, top row first. A label
/// landing on a row that already has one is dropped.
pub fn axis_rows(labels: &[AxisLabel], range: f64, height: usize) -> Vec<String> {
    let blank = " ".repeat(AXIS_WIDTH as usize);
    let mut rows = vec![blank; height];
    let mut taken = vec![false; height];
    if height == 0 {
        return rows;
    }
    let bottom = (height - 1) as f64;
    for label in labels {
        let fraction = if range > 0.0 { label.position / range } else { 0.0 };
        let row = ((1.0 - fraction.clamp(0.0, 1.0)) * bottom).round() as usize;
        if taken[row] {
            continue;
        }
        taken[row] = true;
        rows[row] = format!("{:<width$}", label.caption, width = AXIS_WIDTH as usize);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ScaleConfig;
    use crate::clock::{Clock, SimulatedClock};
    use crate::feed::ReplayFeed;
    use crate::tap::Tap;
    use ratatui::backend::TestBackend;

    fn label(position: f64, caption: &str) -> AxisLabel {
        AxisLabel { value: 0, position, caption: caption.into() }
    }

    #[test]
    fn axis_rows_place_labels_by_position() {
        let labels = [label(10.0, "top"), label(5.0, "mid"), label(0.0, "low")];
        let rows = axis_rows(&labels, 10.0, 11);
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0].trim_end(), "top");
        assert_eq!(rows[5].trim_end(), "mid");
        assert_eq!(rows[10].trim_end(), "low");
        assert!(rows[1].trim().is_empty());
    }

    #[test]
    fn axis_rows_drop_colliding_labels() {
        let labels = [label(10.0, "a"), label(9.9, "b")];
        let rows = axis_rows(&labels, 10.0, 3);
        assert_eq!(rows[0].trim_end(), "a");
        assert!(rows.iter().all(|r| !r.contains('b')));
        assert!(axis_rows(&labels, 10.0, 0).is_empty());
    }

    #[test]
    fn curve_and_average_bars_follow_the_scale() {
        let scale = ScaleModel::new(ScaleConfig::default());
        let report = TapReport {
            description: "x".into(),
            at: Some(1.0),
            bytes: Some(1 << 20),
            current: Some(1 << 20),
            curve: 1 << 20,
            average: Some(1 << 10),
            progress: None,
            eta: None,
        };
        // log2 positions above the 32 B/s floor, in hundredths
        assert_eq!(curve_average_heights(&report, &scale), (1500, 500));
        assert_eq!(bar_height(scale.range()), 2700);

        let idle = TapReport { curve: 0, average: None, ..report };
        assert_eq!(curve_average_heights(&idle, &scale), (0, 0));
    }

    #[test]
    fn peak_captions_are_centred_on_their_bar() {
        assert_eq!(peak_label_x(20), 16.0);
        assert_eq!(peak_label_x(2), 0.0);
    }

    #[test]
    fn failed_setup_restores_the_terminal() {
        let mut restored = false;
        let res: Result<()> = restore_on_error(Err(anyhow::anyhow!("no tty")), || restored = true);
        assert!(res.is_err());
        assert!(restored);

        let mut restored = false;
        assert_eq!(restore_on_error(Ok(3), || restored = true).unwrap(), 3);
        assert!(!restored);
    }

    #[test]
    fn mono_palette_has_no_colors() {
        let p = Palette::for_depth(ColorDepth::Mono);
        assert_eq!(p.bar, Color::Reset);
        assert_ne!(Palette::for_depth(ColorDepth::Full).bar, Color::Reset);
    }

    #[test]
    fn draws_every_tap_panel() {
        let clock: Arc<dyn Clock> = Arc::new(SimulatedClock::new(0.0));
        let taps = vec![
            Tap::new("RX: eth0", Box::new(ReplayFeed::from_deltas(&[4096, 8192]))),
            Tap::new("FILE: big.iso", Box::new(ReplayFeed::from_deltas(&[50, 50])))
                .with_expected_size(Some(200)),
        ];
        let mut monitor = Monitor::new(taps, ScaleModel::new(ScaleConfig::default()), clock);
        for _ in 0..3 {
            monitor.sample();
            monitor.clock().advance(Duration::from_secs(1));
        }

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| draw(f, &monitor, Palette::for_depth(ColorDepth::Basic), Units::Bytes))
            .unwrap();
        let screen: String =
            terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect();
        assert!(screen.contains("RX: eth0"));
        assert!(screen.contains("FILE: big.iso"));
        assert!(screen.contains("8.00 KiB/s"));
        assert!(screen.contains("50.0%"));
    }
}
