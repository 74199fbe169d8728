//! A [`Geolocation`] that replays a recorded feed of fixes.
//!
//! The feed is JSON lines, one [`RawPosition`] per line:
//!
//! ```text
//! {"latitude":51.5,"longitude":-0.12,"accuracy":8,"heading":90,"speed":1.4,"timestamp":1700000000000}
//! ```

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::position::{
    Geolocation, PositionCallback, PositionError, PositionErrorCode, RawPosition, WatchId,
    WatchOptions,
};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad fix on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub struct ReplayGeolocation {
    fixes: Arc<Vec<RawPosition>>,
    interval: Duration,
    last: Arc<Mutex<Option<RawPosition>>>,
    // dropping a sender stops its replay thread
    watches: HashMap<WatchId, Sender<()>>,
    next_id: u64,
}

impl ReplayGeolocation {
    #[must_use]
    pub fn new(fixes: Vec<RawPosition>, interval: Duration) -> Self {
        Self {
            fixes: Arc::new(fixes),
            interval,
            last: Arc::default(),
            watches: HashMap::new(),
            next_id: 0,
        }
    }

    /// # Errors
    /// when the reader fails or a non-blank line isn't a fix
    pub fn from_reader<R: BufRead>(reader: R, interval: Duration) -> Result<Self, ReplayError> {
        let mut fixes = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fix = serde_json::from_str(&line)
                .map_err(|source| ReplayError::Parse { line: i + 1, source })?;
            fixes.push(fix);
        }
        Ok(Self::new(fixes, interval))
    }

    /// # Errors
    /// see [`from_reader`](Self::from_reader)
    pub fn open(path: impl AsRef<Path>, interval: Duration) -> Result<Self, ReplayError> {
        Self::from_reader(BufReader::new(File::open(path)?), interval)
    }

    fn latest(&self) -> Option<RawPosition> {
        let last = self.last.lock().ok().and_then(|last| *last);
        last.or_else(|| self.fixes.first().copied())
    }
}

impl Geolocation for ReplayGeolocation {
    fn watch_position(&mut self, options: &WatchOptions, mut callback: PositionCallback) -> WatchId {
        let id = WatchId(self.next_id);
        self.next_id += 1;

        let (cancel, cancelled) = crossbeam_channel::bounded::<()>(0);
        self.watches.insert(id, cancel);
        let fixes = Arc::clone(&self.fixes);
        let last = Arc::clone(&self.last);
        let interval = self.interval;
        let timeout = options.timeout();

        thread::spawn(move || {
            for fix in fixes.iter() {
                if let Ok(mut last) = last.lock() {
                    *last = Some(*fix);
                }
                callback(Ok(*fix));
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => return,
                }
            }
            // the feed ran dry, so no fix will arrive within the timeout
            if matches!(cancelled.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
                callback(Err(PositionError::new(
                    PositionErrorCode::Timeout,
                    "Timeout expired",
                )));
            }
        });
        id
    }

    fn clear_watch(&mut self, id: WatchId) {
        self.watches.remove(&id);
    }

    fn get_current_position(&mut self, _options: &WatchOptions, mut callback: PositionCallback) {
        callback(
            self.latest()
                .ok_or_else(|| PositionError::unavailable("Position unavailable")),
        );
    }
}

/// For when no position source is configured: every request fails.
#[derive(Debug, Default)]
pub struct NoGeolocation {
    next_id: u64,
}

impl Geolocation for NoGeolocation {
    fn watch_position(&mut self, _options: &WatchOptions, mut callback: PositionCallback) -> WatchId {
        callback(Err(PositionError::unavailable("no position source configured")));
        self.next_id += 1;
        WatchId(self.next_id)
    }

    fn clear_watch(&mut self, _id: WatchId) {}

    fn get_current_position(&mut self, _options: &WatchOptions, mut callback: PositionCallback) {
        callback(Err(PositionError::unavailable("no position source configured")));
    }
}
