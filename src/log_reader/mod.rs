//! Incremental reading of a growing, possibly rotated log file
//!
//! [`LogWatcher`] owns the open file and its change subscription,
//! [`LineBuffer`] turns the bytes appended to it into lines.

mod line_buffer;
mod watcher;

pub use line_buffer::{DEFAULT_LINE_CAPACITY, LineBuffer};
pub use watcher::{LogWatcher, Signal};
