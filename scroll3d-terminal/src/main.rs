/// scroll3d terminal viewer
///
/// Controls:
///   - j / Down, k / Up: Scroll one line
///   - PageDown / PageUp: Scroll one screen
///   - Home / End: Jump to top or bottom
///   - Q/ESC: Quit
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use scroll3d_core::ViewerConfig;
use scroll3d_terminal::{AppError, TerminalApp};

/// The terminal owns the screen while the viewer runs, so logs go to a file
const DEFAULT_LOG_FILE: &str = "scroll3d-terminal.log";

#[derive(Parser, Debug)]
#[command(name = "scroll3d-terminal")]
#[command(about = "Scroll-synchronized 3D viewer for the terminal", long_about = None)]
struct Args {
    /// GLB or STL asset, resolved against the working directory
    asset: Option<String>,

    /// Viewer configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log file (default: scroll3d-terminal.log in the temp directory)
    #[arg(long)]
    log: Option<PathBuf>,
}

impl Args {
    fn log_path(&self) -> PathBuf {
        self.log
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_FILE))
    }
}

fn init_logging(path: &Path) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match File::create(path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            // Nothing is logged rather than drawn over the viewer
            eprintln!("cannot open log file {}: {}", path.display(), e);
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

fn run(args: Args) -> Result<(), AppError> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_path(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(asset) = args.asset {
        config = config.with_asset(asset);
    }

    let root = std::env::current_dir()?;
    log::info!("viewing {} from {}", config.asset, root.display());
    TerminalApp::new(config, root)?.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_path());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("scroll3d-terminal: {}", e);
            ExitCode::FAILURE
        }
    }
}
