//! Change notifications for a single log file

use crate::error::{Error, Result};
use crate::log_reader::LineBuffer;
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Outcome of waiting on the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// New bytes were written to the file
    Changed,
    /// The file was deleted, moved away or replaced
    Gone,
}

/// Device and inode pair identifying the file behind an open handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    fn of(metadata: &std::fs::Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }
}

/// Open file plus the notify subscription watching it
struct Subscription {
    reader: BufReader<File>,
    identity: FileIdentity,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    // Dropping the watcher releases the inotify watch.
    _watcher: RecommendedWatcher,
}

impl Subscription {
    fn establish(path: &Path) -> Result<Self> {
        // Open before subscribing so the file's own creation is not reported.
        let file = File::open(path)
            .map_err(|e| Error::Watch(format!("Unable to open {}: {e}", path.display())))?;
        let identity = FileIdentity::of(&file.metadata()?);

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| Error::Watch(format!("Unable to initialize file watcher: {e}")))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(format!("Unable to watch {}: {e}", path.display())))?;

        Ok(Self {
            reader: BufReader::new(file),
            identity,
            events,
            _watcher: watcher,
        })
    }

    /// True when `path` no longer names the file this subscription holds open
    fn is_replaced(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(metadata) => FileIdentity::of(&metadata) != self.identity,
            Err(_) => true,
        }
    }
}

enum Relevance {
    Signal(Signal),
    Metadata,
    Ignored,
}

fn classify(event: &Event) -> Result<Relevance> {
    if event.need_rescan() {
        return Ok(Relevance::Signal(Signal::Changed));
    }

    match event.kind {
        EventKind::Any
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Other) => Ok(Relevance::Signal(Signal::Changed)),
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Remove(_) => {
            Ok(Relevance::Signal(Signal::Gone))
        }
        // Unlinking an open file only changes its link count until the last handle closes.
        EventKind::Modify(ModifyKind::Metadata(_)) => Ok(Relevance::Metadata),
        EventKind::Access(_) | EventKind::Create(_) => Ok(Relevance::Ignored),
        EventKind::Other => Err(Error::Watch(format!(
            "File watcher gave inconsistent event {event:?}"
        ))),
    }
}

/// Follows a single log file, distinguishing appends from rotation.
pub struct LogWatcher {
    path: PathBuf,
    subscription: Option<Subscription>,
}

impl LogWatcher {
    /// Open `path` for reading and subscribe to its change notifications
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let subscription = Subscription::establish(&path)?;
        tracing::debug!(path = %path.display(), "Watching log file");
        Ok(Self {
            path,
            subscription: Some(subscription),
        })
    }

    /// Path of the watched file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn subscription(&mut self) -> Result<&mut Subscription> {
        let path = &self.path;
        self.subscription
            .as_mut()
            .ok_or_else(|| Error::Watch(format!("{} is not open", path.display())))
    }

    /// Suspend until the file is modified or disappears
    pub async fn wait(&mut self) -> Result<Signal> {
        let path = self.path.clone();
        let subscription = self.subscription()?;

        loop {
            let event = subscription
                .events
                .recv()
                .await
                .ok_or_else(|| Error::Watch("file watcher stopped delivering events".into()))??;

            match classify(&event)? {
                Relevance::Signal(signal) => {
                    tracing::trace!(?signal, kind = ?event.kind, "Log file event");
                    return Ok(signal);
                }
                Relevance::Metadata if subscription.is_replaced(&path) => {
                    tracing::trace!(kind = ?event.kind, "Log file unlinked");
                    return Ok(Signal::Gone);
                }
                Relevance::Metadata | Relevance::Ignored => {}
            }
        }
    }

    /// Release the current subscription and file, then open the path again
    pub fn reopen(&mut self) -> Result<()> {
        self.subscription = None;
        self.subscription = Some(Subscription::establish(&self.path)?);
        tracing::debug!(path = %self.path.display(), "Reopened log file");
        Ok(())
    }

    /// Pull the next complete line out of the file into `buffer`
    pub fn next_line(&mut self, buffer: &mut LineBuffer) -> Result<Option<String>> {
        let subscription = self.subscription()?;
        buffer.try_get_line(&mut subscription.reader)
    }

    /// Empty the file on disk and rewind the reader to its start.
    ///
    /// Returns `false` and leaves the file alone when it holds bytes not read yet.
    pub fn truncate(&mut self) -> Result<bool> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        let subscription = self.subscription()?;

        let metadata = file.metadata()?;
        let position = subscription.reader.stream_position()?;
        if FileIdentity::of(&metadata) != subscription.identity || metadata.len() != position {
            return Ok(false);
        }

        file.set_len(0)?;
        subscription.reader.seek(SeekFrom::Start(0))?;
        Ok(true)
    }
}
