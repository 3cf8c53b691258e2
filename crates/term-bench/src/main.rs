use std::io;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::{Parser, ValueEnum};
use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Rect, Size},
    style::{Color, Modifier, Style},
};
use term_desk::drivers::console::{ConsoleInputDriver, ConsoleOutputDriver};
use term_desk::drivers::headless::{HeadlessScreen, ScriptedInput};
use term_desk::drivers::keyboard::KeyRepeat;
use term_desk::drivers::{InputDriver, OutputDriver};
use term_desk::{
    Cell, CellBuffer, Control, ControlError, DeskConfig, DirtyGranularity, Session, Window,
    WindowId,
};

const GLYPHS: [&str; 10] = [".", ",", ":", "-", ";", "+", "*", "x", "#", "@"];

#[derive(Parser, Debug)]
#[command(
    name = "term-bench",
    version = env!("CARGO_PKG_VERSION"),
    about = "Compositor benchmark: animated windows drifting over each other"
)]
struct BenchCli {
    /// How long to run the benchmark.
    #[arg(
        short = 'd',
        long = "duration",
        value_name = "SECONDS",
        default_value_t = 10.0
    )]
    duration_seconds: f64,

    /// Target frames per second. Ignored when rendering headless.
    #[arg(short = 'f', long = "fps", value_name = "FPS", default_value_t = 60.0)]
    target_fps: f64,

    /// Number of animated windows.
    #[arg(short = 'w', long = "windows", default_value_t = 6)]
    windows: u16,

    /// How finely dirty regions are tracked.
    #[arg(short = 'g', long = "granularity", value_enum, default_value_t = Granularity::Line)]
    granularity: Granularity,

    /// Render into memory instead of the terminal, as fast as possible.
    #[arg(long = "headless")]
    headless: bool,

    /// Desktop size for headless runs, as COLSxROWS.
    #[arg(long = "size", value_name = "COLSxROWS", default_value = "160x48")]
    size: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Granularity {
    Full,
    Line,
    Cell,
}

impl From<Granularity> for DirtyGranularity {
    fn from(value: Granularity) -> Self {
        match value {
            Granularity::Full => DirtyGranularity::Full,
            Granularity::Line => DirtyGranularity::Line,
            Granularity::Cell => DirtyGranularity::Cell,
        }
    }
}

impl BenchCli {
    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds)
    }

    fn frame_budget(&self) -> Duration {
        if self.headless {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / self.target_fps)
        }
    }
}

struct BenchConfig {
    duration: Duration,
    target_fps: f64,
    frame_budget: Duration,
    windows: u16,
    headless_size: Option<Size>,
    desk: DeskConfig,
}

impl TryFrom<&BenchCli> for BenchConfig {
    type Error = String;

    fn try_from(cli: &BenchCli) -> Result<Self, Self::Error> {
        if !(0.5..=600.0).contains(&cli.duration_seconds) {
            return Err("duration must be between 0.5 and 600 seconds".to_string());
        }
        if !(1.0..=240.0).contains(&cli.target_fps) {
            return Err("fps must be between 1 and 240".to_string());
        }
        if !(1..=64).contains(&cli.windows) {
            return Err("windows must be between 1 and 64".to_string());
        }
        let headless_size = if cli.headless {
            Some(parse_size(&cli.size)?)
        } else {
            None
        };
        Ok(Self {
            duration: cli.duration(),
            target_fps: cli.target_fps,
            frame_budget: cli.frame_budget(),
            windows: cli.windows,
            headless_size,
            desk: DeskConfig::default().with_granularity(cli.granularity.into()),
        })
    }
}

fn parse_size(text: &str) -> Result<Size, String> {
    let (cols, rows) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("size `{text}` is not COLSxROWS"))?;
    let cols: u16 = cols
        .trim()
        .parse()
        .map_err(|_| format!("bad column count in `{text}`"))?;
    let rows: u16 = rows
        .trim()
        .parse()
        .map_err(|_| format!("bad row count in `{text}`"))?;
    if cols < 20 || rows < 10 {
        return Err("size must be at least 20x10".to_string());
    }
    Ok(Size::new(cols, rows))
}

fn main() -> io::Result<()> {
    let args = BenchCli::parse();
    let config = BenchConfig::try_from(&args)
        .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))?;

    let stats = match config.headless_size {
        Some(size) => {
            let mut input = ScriptedInput::new();
            let mut output = HeadlessScreen::new(size);
            run_benchmark(&mut input, &mut output, &config)?
        }
        None => {
            let mut input = ConsoleInputDriver::new().with_key_repeat(KeyRepeat::Drop);
            let mut output = ConsoleOutputDriver::new()?;
            output.enter()?;
            input.set_mouse_capture(true)?;
            let result = run_benchmark(&mut input, &mut output, &config);
            input.set_mouse_capture(false)?;
            output.exit()?;
            result?
        }
    };
    println!("{}", stats.final_report(&config));

    Ok(())
}

fn run_benchmark<I, O>(input: &mut I, output: &mut O, config: &BenchConfig) -> io::Result<BenchStats>
where
    I: InputDriver,
    O: OutputDriver,
{
    let desktop = output.size()?;
    let mut session = Session::new(config.desk.clone(), desktop)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    let mut seed = clock_seed();
    let drifters: Vec<Drifter> = (0..config.windows)
        .map(|index| Drifter::spawn(&mut session, index, seed_next(&mut seed)))
        .collect();

    let mut stats = BenchStats::new();
    let mut tick: u64 = 0;
    let mut exit_reason = ExitReason::Completed;

    loop {
        let frame_start = Instant::now();
        for drifter in &drifters {
            drifter.step(&mut session, tick);
        }
        let report = session
            .tick(&mut *output)
            .map_err(|err| io::Error::other(err.to_string()))?;
        let draw_time = frame_start.elapsed();
        if let Some(report) = report {
            stats.record_frame(report.writes as u64, draw_time);
        }

        if stats.elapsed() >= config.duration {
            break;
        }

        if poll_for_exit(input, config.frame_budget.saturating_sub(draw_time))? {
            exit_reason = ExitReason::UserAbort;
            break;
        }

        tick = tick.wrapping_add(1);
    }

    if let Some(metrics) = session.compositor().metrics() {
        stats.smoothed_fps = metrics.fps();
    }
    stats.exit_reason = exit_reason;
    stats.mark_completed();
    Ok(stats)
}

/// A window bouncing around the desktop with an animated body.
struct Drifter {
    id: WindowId,
    dx: i32,
    dy: i32,
}

impl Drifter {
    fn spawn(session: &mut Session, index: u16, seed: u64) -> Self {
        let desktop = session.desktop_size();
        let width = (desktop.width / 3).max(12);
        let height = (desktop.height / 3).max(6);
        let x = (index * 7) % desktop.width.saturating_sub(width).max(1);
        let y = (index * 3) % desktop.height.saturating_sub(height).max(1);
        let window = Window::new(format!("drifter {index}"), Rect::new(x, y, width, height))
            .with_control(Noise::new(seed));
        let id = session.add_window(window);
        Self {
            id,
            dx: if index % 2 == 0 { 1 } else { -1 },
            dy: if index % 3 == 0 { 1 } else { -1 },
        }
    }

    fn step(&self, session: &mut Session, tick: u64) {
        // Windows move every other frame so some frames are content-only.
        if tick % 2 == 1 {
            return;
        }
        let desktop = session.desktop_size();
        let Some(rect) = session.windows().window(self.id).map(Window::rect) else {
            return;
        };
        let max_x = i32::from(desktop.width.saturating_sub(rect.width));
        let max_y = i32::from(desktop.height.saturating_sub(rect.height));
        let phase = (tick / 2) as i32;
        let x = bounce(phase * self.dx, max_x);
        let y = bounce(phase * self.dy, max_y);
        session
            .windows_mut()
            .move_window(self.id, x as u16, y as u16);
    }
}

/// Triangle wave over `0..=max`.
fn bounce(position: i32, max: i32) -> i32 {
    if max <= 0 {
        return 0;
    }
    let period = max * 2;
    let p = position.rem_euclid(period);
    if p > max { period - p } else { p }
}

struct Noise {
    state: u64,
    tick: u64,
}

impl Noise {
    fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0xA5A5_A5A5_1234_5678,
            tick: 0,
        }
    }

    fn next(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }
}

impl Control for Noise {
    fn render(&mut self, width: u16, height: u16) -> Result<CellBuffer, ControlError> {
        self.tick = self.tick.wrapping_add(1);
        let tick = self.tick;
        let mut buffer = CellBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let glyph = GLYPHS[(self.next() as usize) % GLYPHS.len()];
                let base = ((x as u32 * 5 + y as u32 * 3 + tick as u32) & 0xFF) as u8;
                let color = Color::Rgb(
                    base,
                    base.wrapping_add(((tick >> 1) as u8).wrapping_mul(3)),
                    base.wrapping_add(((tick >> 2) as u8).wrapping_mul(5)),
                );
                let modifier = if (self.next() & 0x2) == 0 {
                    Modifier::empty()
                } else {
                    Modifier::BOLD
                };
                buffer.set(
                    x,
                    y,
                    Cell::new(glyph).with_style(
                        Style::default()
                            .fg(color)
                            .bg(Color::Black)
                            .add_modifier(modifier),
                    ),
                );
            }
        }
        Ok(buffer)
    }

    fn needs_redraw(&self) -> bool {
        true
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn seed_next(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *seed
}

struct BenchStats {
    start: Instant,
    completed_at: Option<Instant>,
    frame_count: u64,
    cell_writes: u64,
    total_draw_time: Duration,
    fastest_frame: Duration,
    slowest_frame: Duration,
    smoothed_fps: f64,
    exit_reason: ExitReason,
}

impl BenchStats {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            completed_at: None,
            frame_count: 0,
            cell_writes: 0,
            total_draw_time: Duration::ZERO,
            fastest_frame: Duration::MAX,
            slowest_frame: Duration::ZERO,
            smoothed_fps: 0.0,
            exit_reason: ExitReason::Completed,
        }
    }

    fn elapsed(&self) -> Duration {
        match self.completed_at {
            Some(done) => done.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    fn mark_completed(&mut self) {
        self.completed_at = Some(Instant::now());
    }

    fn record_frame(&mut self, writes: u64, draw_time: Duration) {
        self.frame_count = self.frame_count.saturating_add(1);
        self.cell_writes = self.cell_writes.saturating_add(writes);
        self.total_draw_time += draw_time;
        if draw_time < self.fastest_frame {
            self.fastest_frame = draw_time;
        }
        if draw_time > self.slowest_frame {
            self.slowest_frame = draw_time;
        }
    }

    fn average_frame_ms(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        (self.total_draw_time.as_secs_f64() / self.frame_count as f64) * 1_000.0
    }

    fn fastest_frame_ms(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        self.fastest_frame.as_secs_f64() * 1_000.0
    }

    fn slowest_frame_ms(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        self.slowest_frame.as_secs_f64() * 1_000.0
    }

    fn writes_per_frame(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        self.cell_writes as f64 / self.frame_count as f64
    }

    fn final_report(&self, config: &BenchConfig) -> String {
        let elapsed = self.elapsed().as_secs_f64();
        let fps_avg = if elapsed > 0.0 {
            self.frame_count as f64 / elapsed
        } else {
            0.0
        };
        let mode = if config.headless_size.is_some() {
            "headless"
        } else {
            "terminal"
        };

        indoc::formatdoc!(
            r#"
            Compositor bench {status} ({mode}, {windows} windows, {granularity:?} tracking).
            Duration: {elapsed:.2}s (target {target:.2}s)
            Frames: {frames} | Avg FPS: {fps:.1} (smoothed {smoothed:.1}, target {target_fps:.1})
            Avg frame: {avg:.2} ms | Best: {best:.2} ms | Worst: {worst:.2} ms
            Cell writes: {writes} total (~{per_frame:.0}/frame)
            "#,
            status = self.exit_reason.describe(),
            mode = mode,
            windows = config.windows,
            granularity = config.desk.granularity,
            elapsed = elapsed,
            target = config.duration.as_secs_f64(),
            frames = self.frame_count,
            fps = fps_avg,
            smoothed = self.smoothed_fps,
            target_fps = config.target_fps,
            avg = self.average_frame_ms(),
            best = self.fastest_frame_ms(),
            worst = self.slowest_frame_ms(),
            writes = self.cell_writes,
            per_frame = self.writes_per_frame(),
        )
    }
}

#[derive(Copy, Clone)]
enum ExitReason {
    Completed,
    UserAbort,
}

impl ExitReason {
    fn describe(self) -> &'static str {
        match self {
            ExitReason::Completed => "completed full duration",
            ExitReason::UserAbort => "stopped by user",
        }
    }
}

fn poll_for_exit<I: InputDriver>(input: &mut I, wait: Duration) -> io::Result<bool> {
    if !input.poll(wait)? {
        return Ok(false);
    }
    loop {
        if let Event::Key(key) = input.read()?
            && key.kind == KeyEventKind::Press
        {
            if matches!(
                key.code,
                KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc
            ) {
                return Ok(true);
            }
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(true);
            }
        }
        if !input.poll(Duration::ZERO)? {
            break;
        }
    }
    Ok(false)
}
