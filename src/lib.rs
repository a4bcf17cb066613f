//! gcfocus - keep a camera focused on a moving 3D printer or CNC toolhead
//!
//! The toolhead X position is scraped from the OctoPrint serial log, which is
//! followed like `tail -f` (including across log rotation). Each position is
//! converted to a lens focus value with a calibrated formula and written to a
//! V4L2 camera whenever it changes.
//!
//! # Example
//!
//! ```no_run
//! use gcfocus::camera::FocusDevice;
//! use gcfocus::{Camera, FocusController, FocusFormula, Follower, FollowOptions, LogWatcher};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> gcfocus::Result<()> {
//!     let mut camera = Camera::open("/dev/video0")?;
//!     camera.set_manual_focus_mode()?;
//!
//!     let controller = FocusController::new(FocusFormula::new(3500.0, -12.5, 40.0), camera);
//!     let watcher = LogWatcher::open("/home/pi/.octoprint/logs/serial.log")?;
//!     let mut follower = Follower::new(watcher, controller, 256, FollowOptions::default());
//!     follower.run().await
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod camera;
pub mod config;
pub mod error;
pub mod focus;
pub mod follow;
pub mod gcode;
pub mod log_reader;
pub mod logging;

// Re-exports for convenience
pub use error::{Error, Result};

#[cfg(feature = "camera")]
pub use camera::Camera;

pub use config::{GcfocusConfig, LogRotation, LoggingOptions, Settings};
pub use focus::{FocusController, FocusFormula, FocusUpdate};
pub use follow::{DrainReport, FollowOptions, Follower};
pub use gcode::GcodeState;
pub use log_reader::{LineBuffer, LogWatcher, Signal};
