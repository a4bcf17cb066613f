//! The daemon loop: read new log lines, track the toolhead, refocus, wait.

use crate::camera::FocusDevice;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::focus::{FocusController, FocusUpdate};
use crate::gcode::GcodeState;
use crate::log_reader::{LineBuffer, LogWatcher, Signal};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Behaviour of the loop around rotation and truncation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowOptions {
    /// Truncate the log once `truncate_threshold` bytes were consumed
    pub truncate: bool,
    /// Bytes consumed between truncations
    pub truncate_threshold: u64,
    /// Reopen the log after rotation instead of failing
    pub reopen_on_rotation: bool,
    /// Delay before reopening, giving the producer time to create the new file
    pub rotation_grace: Duration,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            truncate: false,
            truncate_threshold: 1024 * 1024,
            reopen_on_rotation: true,
            rotation_grace: Duration::from_secs(3),
        }
    }
}

impl From<&Settings> for FollowOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            truncate: settings.truncate,
            truncate_threshold: settings.truncate_threshold,
            reopen_on_rotation: settings.reopen_on_rotation,
            rotation_grace: settings.rotation_grace,
        }
    }
}

/// Counts from one [`Follower::drain`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Complete lines read
    pub lines: usize,
    /// Lines the gcode parser did not recognize
    pub garbage: usize,
    /// Raw bytes read from the log, discarded oversized lines included
    pub bytes: u64,
    /// Whether the log was truncated after reading
    pub truncated: bool,
}

/// Follows the serial log and keeps the camera focused on the toolhead
pub struct Follower<D> {
    watcher: LogWatcher,
    buffer: LineBuffer,
    state: GcodeState,
    controller: FocusController<D>,
    options: FollowOptions,
    consumed: u64,
    reopens: usize,
}

impl<D: FocusDevice> Follower<D> {
    /// Build a follower reading lines of at most `line_capacity - 1` bytes
    pub fn new(
        watcher: LogWatcher,
        controller: FocusController<D>,
        line_capacity: usize,
        options: FollowOptions,
    ) -> Self {
        Self {
            watcher,
            buffer: LineBuffer::new(line_capacity),
            state: GcodeState::new(),
            controller,
            options,
            consumed: 0,
            reopens: 0,
        }
    }

    /// Current positioning state
    pub fn state(&self) -> &GcodeState {
        &self.state
    }

    /// Focus controller and its device
    pub fn controller(&self) -> &FocusController<D> {
        &self.controller
    }

    /// Number of times the log was reopened after rotation
    pub fn reopens(&self) -> usize {
        self.reopens
    }

    /// Feed every complete line currently in the log to the gcode parser
    pub fn drain(&mut self) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        while let Some(line) = self.watcher.next_line(&mut self.buffer)? {
            report.lines += 1;
            if !self.state.parse_line(&line) {
                report.garbage += 1;
                debug!(line = %line, "Skipping garbage");
            }
        }
        report.bytes = self.buffer.take_consumed();
        self.consumed += report.bytes;

        if self.options.truncate
            && self.consumed >= self.options.truncate_threshold
            && self.buffer.is_at_boundary()
        {
            if !self.watcher.truncate()? {
                debug!("Serial log grew while draining, truncating later");
                return Ok(report);
            }
            info!(
                path = %self.watcher.path().display(),
                bytes = self.consumed,
                "Truncated serial log"
            );
            self.consumed = 0;
            report.truncated = true;
        }

        Ok(report)
    }

    /// Refocus the camera for the current X position if needed
    pub fn adjust(&mut self) -> Result<FocusUpdate> {
        debug!(
            x = ?self.state.x_pos,
            absolute = self.state.is_absolute,
            "Coordinates"
        );

        let update = self.controller.update(self.state.x_pos)?;
        match update {
            FocusUpdate::Unknown => debug!("Still confused about current coordinates"),
            FocusUpdate::Applied(focus) => debug!(focus, "Adjusted focus"),
            FocusUpdate::Unchanged(_) => {}
        }
        Ok(update)
    }

    /// Reopen the log after it was rotated or deleted
    pub async fn handle_rotation(&mut self) -> Result<()> {
        let path = self.watcher.path().display().to_string();
        if !self.options.reopen_on_rotation {
            return Err(Error::Rotation(path));
        }

        warn!(path = %path, "Log file was rotated or deleted, reopening");
        tokio::time::sleep(self.options.rotation_grace).await;

        self.watcher.reopen()?;
        self.buffer.reset();
        self.consumed = 0;
        self.reopens += 1;
        Ok(())
    }

    /// One iteration: drain, refocus, then wait for the next change
    pub async fn step(&mut self) -> Result<Signal> {
        self.drain()?;
        self.adjust()?;

        let signal = self.watcher.wait().await?;
        if signal == Signal::Gone {
            self.handle_rotation().await?;
        }
        Ok(signal)
    }

    /// Follow the log forever; returns only on a fatal error
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.step().await?;
        }
    }
}
