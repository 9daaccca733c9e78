/// Terminal host for the scroll-synchronized viewer
///
/// The terminal has no page to scroll, so a virtual page several screens tall
/// is driven from the keyboard and fed to the viewer as its scroll signal.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal,
};
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawn;
use scroll3d_core::{
    AssetSource, ConfigError, FrameOutcome, LoadState, ScrollSource, Surface, ViewerConfig,
    ViewerController, ViewerError, VirtualScroll,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

pub mod renderer;
pub mod source;
pub mod surface;

pub use renderer::AsciiRenderer;
pub use source::FileAssetSource;
pub use surface::TerminalSurface;

/// Height of the virtual page, in screens
const PAGE_SCREENS: f64 = 4.0;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// A keyboard request against the virtual page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAction {
    Lines(f64),
    Screens(f64),
    Top,
    Bottom,
    Quit,
}

pub fn key_action(code: KeyCode) -> Option<ScrollAction> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(ScrollAction::Quit),
        KeyCode::Down | KeyCode::Char('j') => Some(ScrollAction::Lines(1.0)),
        KeyCode::Up | KeyCode::Char('k') => Some(ScrollAction::Lines(-1.0)),
        KeyCode::PageDown | KeyCode::Char(' ') => Some(ScrollAction::Screens(1.0)),
        KeyCode::PageUp => Some(ScrollAction::Screens(-1.0)),
        KeyCode::Home | KeyCode::Char('g') => Some(ScrollAction::Top),
        KeyCode::End | KeyCode::Char('G') => Some(ScrollAction::Bottom),
        _ => None,
    }
}

/// Virtual page for a screen `rows` tall
pub fn virtual_page(rows: u16) -> VirtualScroll {
    let screen = rows.max(1) as f64;
    VirtualScroll::new(screen * PAGE_SCREENS, screen)
}

pub fn apply_action(scroll: &VirtualScroll, action: ScrollAction) {
    let screen = scroll.metrics().viewport_height;
    match action {
        ScrollAction::Lines(n) => scroll.scroll_by(n),
        ScrollAction::Screens(n) => scroll.scroll_by(n * screen),
        ScrollAction::Top => scroll.scroll_to(0.0),
        ScrollAction::Bottom => scroll.scroll_to(f64::MAX),
        ScrollAction::Quit => {}
    }
}

/// Status line text
pub fn status_text(asset: &str, progress: f32, load: &LoadState, load_progress: f32, fps: f32) -> String {
    let load = match load {
        LoadState::Idle => "idle".to_string(),
        LoadState::Loading => format!("loading {:.0}%", load_progress * 100.0),
        LoadState::Loaded => "loaded".to_string(),
        LoadState::Failed(e) => format!("failed: {}", e),
    };
    format!(
        "scroll3d | {} | scroll {:>3.0}% | {} | FPS: {:.1} | j/k PgUp/PgDn Home/End q=quit",
        asset,
        progress * 100.0,
        load,
        fps
    )
}

/// Activate on `surface`. A failed activation is deactivated straight away,
/// leaving the controller inactive instead of in `Error`.
pub fn activate_or_reset<S, Src, Sc, Sp>(
    controller: &mut ViewerController<S, Src, Sc, Sp>,
    surface: S,
) -> Result<(), ViewerError>
where
    S: Surface,
    Src: AssetSource,
    Sc: ScrollSource,
    Sp: LocalSpawn,
{
    if let Err(e) = controller.activate(surface) {
        controller.deactivate();
        return Err(e);
    }
    Ok(())
}

type TerminalController = ViewerController<TerminalSurface, FileAssetSource, VirtualScroll, LocalSpawner>;

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    controller: TerminalController,
    pool: LocalPool,
    scroll: VirtualScroll,
    cols: u16,
    rows: u16,
    running: bool,
    last_second: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// Assets resolve relative to `root`
    pub fn new(config: ViewerConfig, root: impl Into<PathBuf>) -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        let pool = LocalPool::new();
        let scroll = virtual_page(rows);
        let controller = ViewerController::new(
            config,
            FileAssetSource::new(root),
            scroll.clone(),
            pool.spawner(),
        );

        Ok(Self {
            controller,
            pool,
            scroll,
            cols,
            rows,
            running: true,
            last_second: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn run(&mut self) -> Result<(), AppError> {
        activate_or_reset(&mut self.controller, TerminalSurface::new())?;
        let result = self.main_loop();
        self.controller.deactivate();
        self.drain_events();
        result
    }

    fn main_loop(&mut self) -> Result<(), AppError> {
        let fps = self.controller.config().target_fps.max(1);
        let target_frame_time = Duration::from_secs_f64(1.0 / fps as f64);
        let started = Instant::now();

        while self.running {
            let frame_start = Instant::now();

            while event::poll(Duration::ZERO)? {
                self.handle_event(event::read()?);
            }

            // Drive the asset load between frames
            self.pool.run_until_stalled();

            let timestamp = started.elapsed().as_secs_f64() * 1000.0;
            if let FrameOutcome::Drawn(_) = self.controller.on_frame(timestamp)? {
                self.frame_count += 1;
            }
            self.drain_events();
            self.draw_status()?;

            let now = Instant::now();
            if (now - self.last_second).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_second).as_secs_f32();
                self.frame_count = 0;
                self.last_second = now;
            }

            // Late frames are not made up
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent { code, kind, .. }) if kind != KeyEventKind::Release => {
                match key_action(code) {
                    Some(ScrollAction::Quit) => self.running = false,
                    Some(action) => apply_action(&self.scroll, action),
                    None => {}
                }
            }
            Event::Resize(cols, rows) => {
                self.cols = cols;
                self.rows = rows;
                let screen = rows.max(1) as f64;
                self.scroll.set_page(screen * PAGE_SCREENS, screen);
                let viewport = surface::viewport_for(cols, rows);
                self.controller.resize(viewport.width, viewport.height);
            }
            _ => {}
        }
    }

    /// The controller has already logged each event; the status line shows
    /// the load outcome.
    fn drain_events(&mut self) {
        for event in self.controller.drain_events() {
            log::trace!("viewer event: {:?}", event);
        }
    }

    fn draw_status(&self) -> io::Result<()> {
        let load_progress = self
            .controller
            .session()
            .map_or(0.0, |session| session.load_progress());
        let text = status_text(
            self.controller.config().asset.file_name(),
            self.controller.scroll().sample(),
            &self.controller.load_state(),
            load_progress,
            self.fps,
        );
        surface::draw_status(&mut stdout(), self.cols, self.rows, &text)
    }
}
