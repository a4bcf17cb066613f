//! gcfocus daemon entrypoint

#[cfg(not(feature = "camera"))]
compile_error!("gcfocus requires the `camera` feature");

use clap::Parser;
use clap::error::ErrorKind;
use gcfocus::camera::{self, FocusDevice};
use gcfocus::error::EXIT_USAGE;
use gcfocus::{
    Camera, FocusController, FollowOptions, Follower, GcfocusConfig, LogWatcher, Result, logging,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "gcfocus",
    version,
    about = "Focus 3D printer or CNC machine camera based on X-axis position.",
    after_help = "See calibration.md for instructions how to find constants a, b, and c."
)]
struct Cli {
    /// Device path to V4L2 compliant camera. Required.
    #[arg(short = 'd', long, value_name = "PATH")]
    device: Option<PathBuf>,

    /// OctoPrint serial log file to read. Required.
    #[arg(short = 'f', long = "log", value_name = "PATH")]
    log: Option<PathBuf>,

    /// Truncate input log periodically to save space
    #[arg(short = 't', long)]
    truncate: bool,

    /// Calibration constant a. Required.
    #[arg(short = 'a', long = "cal-a", value_name = "NUMBER", allow_negative_numbers = true)]
    a: Option<f64>,

    /// Calibration constant b. Required.
    #[arg(short = 'b', long = "cal-b", value_name = "NUMBER", allow_negative_numbers = true)]
    b: Option<f64>,

    /// Calibration constant c. Required.
    #[arg(short = 'c', long = "cal-c", value_name = "NUMBER", allow_negative_numbers = true)]
    c: Option<f64>,

    /// Verbose output. Report conversions and camera operations.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Optional configuration file (toml/yaml). Defaults to gcfocus.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Exit instead of reopening the log when it is rotated or deleted
    #[arg(long)]
    no_reopen: bool,

    /// List detected cameras and exit
    #[arg(long)]
    list_cameras: bool,
}

impl Cli {
    fn apply(&self, config: &mut GcfocusConfig) {
        if let Some(device) = &self.device {
            config.camera.device = Some(device.clone());
        }
        if let Some(log) = &self.log {
            config.source.log = Some(log.clone());
        }
        if self.truncate {
            config.source.truncate = true;
        }
        if self.no_reopen {
            config.source.reopen_on_rotation = false;
        }
        if self.a.is_some() {
            config.calibration.a = self.a;
        }
        if self.b.is_some() {
            config.calibration.b = self.b;
        }
        if self.c.is_some() {
            config.calibration.c = self.c;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if tracing::dispatcher::has_been_set() {
                error!("{err}");
            } else {
                eprintln!("gcfocus: {err}");
            }
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.list_cameras {
        return list_cameras();
    }

    let mut config = GcfocusConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    let settings = config.resolve()?;

    logging::init(&config.logging, cli.verbose)?;

    info!(
        device = %settings.device.display(),
        log = %settings.log.display(),
        truncate = settings.truncate,
        formula = %settings.formula,
        "Starting gcfocus"
    );

    let mut camera = Camera::open(&settings.device)?;
    camera.set_manual_focus_mode()?;

    let watcher = LogWatcher::open(&settings.log)?;
    let controller = FocusController::new(settings.formula, camera);
    let mut follower = Follower::new(
        watcher,
        controller,
        settings.line_capacity,
        FollowOptions::from(&settings),
    );

    follower.run().await
}

fn list_cameras() -> Result<()> {
    let devices = camera::list_devices()?;
    if devices.is_empty() {
        println!("No V4L2 cameras detected");
        return Ok(());
    }

    println!("Discovered cameras:");
    for dev in devices {
        let focus = match dev.focus {
            Some(range) => format!(
                "focus {}..={} step {} (default {})",
                range.minimum, range.maximum, range.step, range.default
            ),
            None => "no absolute focus control".to_string(),
        };
        println!("  [{}] {} ({}) - {focus}", dev.index, dev.name, dev.path);
    }
    Ok(())
}
