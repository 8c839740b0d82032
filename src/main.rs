// SPDX-License-Identifier: MIT
//
// ttx: terminal multiplexer driver.
//
// Wires the render core to the real terminal and runs a small compositor:
// two panes side by side, split by a border, with a status line underneath.
//
//   ┌──────────────┬──────────────┐
//   │ log pane     │ meter pane   │  ← rows - 1
//   ├──────────────┴──────────────┤
//   │ status line (REVERSE)       │  ← 1 row
//   └─────────────────────────────┘
//
// The main thread is the only producer. Every tick it composes a fresh Grid,
// wraps it in a Snapshot and submits it; the render thread decides what
// actually reaches the terminal. Logs go to a file because stdout is the
// screen being drawn.
//
// Usage: ttx [config.toml]   (press q or Ctrl-C to quit early)

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ttx_render::terminal::Terminal;
use ttx_render::{
    Attr, Capabilities, Cell, Color, Cursor, CursorShape, Error, Grid, RenderConfig,
    RenderThread, Report, Snapshot, Style,
};

/// Compositor tick. The render thread paces the actual frames.
const TICK: Duration = Duration::from_millis(20);

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DriverConfig {
    /// How long to run before exiting on its own.
    duration_secs: u64,
    log_file: PathBuf,
    /// Default filter directive; `RUST_LOG` overrides it.
    log_level: String,
    /// Raw `[render]` table, parsed by the render core.
    render: Option<toml::Table>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            log_file: PathBuf::from("ttx.log"),
            log_level: "info".into(),
            render: None,
        }
    }
}

impl DriverConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// The render settings. Capabilities come from the environment unless
    /// the `[render]` table spells them out.
    fn render_config(&self) -> Result<RenderConfig> {
        let detected = Capabilities::detect_from_env();
        let Some(table) = &self.render else {
            return Ok(RenderConfig::default().with_capabilities(detected));
        };
        let config = RenderConfig::from_toml_str(&toml::to_string(table)?)
            .context("invalid [render] table")?;
        if table.contains_key("capabilities") {
            Ok(config)
        } else {
            Ok(config.with_capabilities(detected))
        }
    }
}

fn init_logging(config: &DriverConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ttx={0},ttx_render={0}", config.log_level)));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("opening log file {}", config.log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

// ─── Panes ──────────────────────────────────────────────────────────────────

/// A scrolling log of fake shell output.
struct LogPane {
    lines: VecDeque<(String, Style)>,
    next: u64,
}

impl LogPane {
    const WORDS: [&'static str; 8] = [
        "compiling", "linking", "fetching", "resolving", "ok", "warning", "中文", "done",
    ];

    fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            next: 0,
        }
    }

    fn tick(&mut self, height: u16) {
        let n = self.next;
        self.next += 1;
        let word = Self::WORDS[usize::try_from(n % 8).unwrap_or(0)];
        let style = match word {
            "warning" => Style::DEFAULT.with_fg(Color::Indexed(3)).with_attrs(Attr::BOLD),
            "ok" | "done" => Style::DEFAULT.with_fg(Color::Indexed(2)),
            _ => Style::DEFAULT,
        };
        self.lines.push_back((format!("[{n:>5}] {word} crate-{}", n % 13), style));
        while self.lines.len() > usize::from(height) {
            self.lines.pop_front();
        }
    }

    fn draw(&self, rows: u16, cols: u16) -> Grid {
        let mut grid = Grid::new(rows, cols);
        for (row, (line, style)) in (0..rows).zip(&self.lines) {
            grid.put_str(row, 0, line, *style);
        }
        grid
    }
}

/// Horizontal bars that drift up and down.
struct MeterPane {
    phase: f32,
}

impl MeterPane {
    fn tick(&mut self) {
        self.phase += 0.15;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn draw(&self, rows: u16, cols: u16) -> Grid {
        let mut grid = Grid::new(rows, cols);
        let width = cols.saturating_sub(8);
        for row in 0..rows {
            let level = ((self.phase + f32::from(row) * 0.7).sin() + 1.0) / 2.0;
            let filled = (level * f32::from(width)) as u16;
            let hue = (level * 255.0) as u8;
            let bar = Style::DEFAULT.with_bg(Color::rgb(hue, 255 - hue, 96));

            grid.put_str(row, 0, &format!("cpu{row:<2}"), Style::DEFAULT.with_attrs(Attr::FAINT));
            for col in 0..filled {
                grid.set(row, 6 + col, Cell::blank(bar));
            }
            grid.put_str(row, 7 + width, &format!("{:>3}%", (level * 100.0) as u8), Style::DEFAULT);
        }
        grid
    }
}

// ─── Compositor ─────────────────────────────────────────────────────────────

struct Compositor {
    log: LogPane,
    meter: MeterPane,
    committed: u64,
    started: Instant,
}

impl Compositor {
    fn compose(&mut self, rows: u16, cols: u16) -> Grid {
        let body = rows.saturating_sub(1);
        let left = cols / 2;
        let right = cols.saturating_sub(left + 1);

        self.log.tick(body);
        self.meter.tick();

        let mut grid = Grid::new(rows, cols);
        grid.blit(&self.log.draw(body, left), 0, 0);
        let border = Style::DEFAULT.with_fg(Color::Indexed(8));
        for row in 0..body {
            grid.set(row, left, Cell::styled("│", border));
        }
        grid.blit(&self.meter.draw(body, right), 0, left + 1);

        let status = Style::DEFAULT.with_attrs(Attr::REVERSE);
        let mut line = format!(
            " ttx  {}x{}  frames {}  up {:.1}s  q: quit",
            cols,
            rows,
            self.committed,
            self.started.elapsed().as_secs_f32()
        );
        line.extend(std::iter::repeat_n(' ', usize::from(cols)));
        grid.put_str(body, 0, &line, status);

        let last = self.log.lines.len().min(usize::from(body));
        let cursor_row = u16::try_from(last).unwrap_or(body).saturating_sub(1);
        grid.set_cursor(Cursor::at(cursor_row, 0).with_shape(CursorShape::SteadyBar));
        grid
    }
}

// ─── Input ──────────────────────────────────────────────────────────────────

/// Watch stdin for `q` or Ctrl-C. Raw mode disables the signal keys, so
/// this is the only way out before the timer.
fn spawn_quit_watcher(quit: Arc<AtomicBool>) -> io::Result<()> {
    thread::Builder::new().name("stdin-quit".into()).spawn(move || {
        let mut byte = [0u8; 1];
        let mut stdin = io::stdin();
        while let Ok(1) = stdin.read(&mut byte) {
            if matches!(byte[0], b'q' | 0x03) {
                quit.store(true, Ordering::Relaxed);
                break;
            }
        }
    })?;
    Ok(())
}

// ─── Main loop ──────────────────────────────────────────────────────────────

/// Drain reports. Returns the first write failure; the screen is in an
/// unknown state after one, so the caller tears down instead of retrying.
fn handle_reports(reports: &Receiver<Report>, compositor: &mut Compositor) -> Option<Error> {
    while let Ok(report) = reports.try_recv() {
        match report {
            Report::Committed { seq, stats } => {
                compositor.committed += 1;
                debug!(seq, bytes = stats.bytes_written, "frame on screen");
            }
            Report::Rejected { seq, error } => warn!(seq, %error, "compositor produced a bad frame"),
            Report::Failed(error) => {
                error!(%error, "terminal write failed, stopping");
                return Some(error);
            }
        }
    }
    None
}

fn run(config: &DriverConfig) -> Result<()> {
    let render_config = config.render_config()?;
    info!(?render_config, "starting");

    let mut term = Terminal::new();
    term.enter().context("entering raw mode")?;

    let (render, reports) =
        RenderThread::spawn(io::stdout(), render_config).context("spawning render thread")?;
    let handle = render.handle();

    let quit = Arc::new(AtomicBool::new(false));
    spawn_quit_watcher(Arc::clone(&quit)).context("spawning input thread")?;

    let deadline = Instant::now() + Duration::from_secs(config.duration_secs);
    let mut compositor = Compositor {
        log: LogPane::new(),
        meter: MeterPane { phase: 0.0 },
        committed: 0,
        started: Instant::now(),
    };
    let mut size = term.size();
    handle.resize(size.rows, size.cols)?;

    let mut seq = 0;
    let mut failure = None;
    while Instant::now() < deadline && !quit.load(Ordering::Relaxed) {
        if let Some(new) = term.poll_resize() {
            info!(rows = new.rows, cols = new.cols, "terminal resized");
            size = new;
            handle.resize(size.rows, size.cols)?;
        }

        seq += 1;
        let grid = compositor.compose(size.rows, size.cols);
        match handle.submit(Snapshot::new(seq, grid)) {
            Ok(()) | Err(Error::Failed) => {}
            Err(e) if e.is_benign() => {}
            Err(e) => return Err(e).context("submitting frame"),
        }

        if let Some(error) = handle_reports(&reports, &mut compositor) {
            failure = Some(error);
            break;
        }
        thread::sleep(TICK);
    }

    info!(frames = compositor.committed, submitted = seq, "shutting down");
    render.shutdown().context("stopping render thread")?;
    term.leave().context("restoring terminal")?;
    match failure {
        Some(error) => Err(error).context("writing to the terminal"),
        None => Ok(()),
    }
}

fn main() -> Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DriverConfig::load(path.as_deref())?;
    init_logging(&config)?;

    let result = run(&config);
    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

// ─── Tests ──────────────────────────────────────────────────────────────────
