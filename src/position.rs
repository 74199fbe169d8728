//! Position watching and normalization of raw fixes into [`LocationSample`]s.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::communication::{Event, Outbox};

/// A fix as the platform reports it, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub altitude: Option<f64>,
    pub altitude_accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    #[serde(default = "now_millis")]
    pub timestamp: i64,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Altitude {
    pub value: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Movement {
    #[serde(serialize_with = "crate::communication::tagged_unit")]
    Static,
    Moving {
        speed: f64,
        #[serde(rename = "degreesFromNorth")]
        degrees_from_north: f64,
    },
}

/// One normalized device location reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub altitude: Option<Altitude>,
    pub movement: Option<Movement>,
    pub timestamp: i64,
}

impl From<RawPosition> for LocationSample {
    #[allow(clippy::float_cmp)]
    fn from(raw: RawPosition) -> Self {
        let altitude = match (raw.altitude, raw.altitude_accuracy) {
            (Some(value), Some(accuracy)) => Some(Altitude { value, accuracy }),
            _ => None,
        };
        let movement = match (raw.heading, raw.speed) {
            (Some(_), Some(speed)) if speed == 0.0 => Some(Movement::Static),
            (Some(heading), Some(speed)) => Some(Movement::Moving {
                speed,
                degrees_from_north: heading,
            }),
            _ => None,
        };
        Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            accuracy: raw.accuracy,
            altitude,
            movement,
            timestamp: raw.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionErrorCode {
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

impl fmt::Display for PositionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Failure reported by the platform position source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("ERROR({code}): {message}")]
pub struct PositionError {
    pub code: PositionErrorCode,
    pub message: String,
}

impl PositionError {
    pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(PositionErrorCode::PositionUnavailable, message)
    }
}

/// What the rule engine gets to see of a [`PositionError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationError {
    pub message: String,
}

impl From<PositionError> for LocationError {
    fn from(error: PositionError) -> Self {
        Self {
            message: error.message,
        }
    }
}

impl From<Result<LocationSample, LocationError>> for Event {
    fn from(result: Result<LocationSample, LocationError>) -> Self {
        match result {
            Ok(sample) => Self::LocationUpdate(sample),
            Err(error) => Self::LocationUpdateError(error.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub timeout_millis: u64,
    pub max_cached_age_millis: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: false,
            timeout_millis: 5000,
            max_cached_age_millis: 0,
        }
    }
}

impl WatchOptions {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    #[must_use]
    pub const fn max_cached_age(&self) -> Duration {
        Duration::from_millis(self.max_cached_age_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

pub type PositionCallback = Box<dyn FnMut(Result<RawPosition, PositionError>) + Send>;

/// The platform position source.
///
/// Implementations deliver results for one watch one at a time, in the order
/// they are produced.
pub trait Geolocation {
    fn watch_position(&mut self, options: &WatchOptions, callback: PositionCallback) -> WatchId;
    /// After this returns no further results are delivered for `id`.
    fn clear_watch(&mut self, id: WatchId);
    fn get_current_position(&mut self, options: &WatchOptions, callback: PositionCallback);
}

impl<G: Geolocation + ?Sized> Geolocation for Box<G> {
    fn watch_position(&mut self, options: &WatchOptions, callback: PositionCallback) -> WatchId {
        (**self).watch_position(options, callback)
    }

    fn clear_watch(&mut self, id: WatchId) {
        (**self).clear_watch(id);
    }

    fn get_current_position(&mut self, options: &WatchOptions, callback: PositionCallback) {
        (**self).get_current_position(options, callback);
    }
}

/// A running watch. Keeps delivering until handed to [`PositionWatcher::cancel`].
#[derive(Debug)]
pub struct Subscription {
    id: WatchId,
    active: Arc<AtomicBool>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> WatchId {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Forwards normalized fixes and errors from a [`Geolocation`] to the message port.
pub struct PositionWatcher<G> {
    geolocation: G,
    events: Outbox,
}

impl<G: Geolocation> PositionWatcher<G> {
    pub const fn new(geolocation: G, events: Outbox) -> Self {
        Self {
            geolocation,
            events,
        }
    }

    pub fn watch(&mut self, options: &WatchOptions) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let callback = forward(self.events.clone(), Some(Arc::clone(&active)));
        let id = self.geolocation.watch_position(options, callback);
        log::info!("watching position ({options:?}) as {id:?}");
        Subscription { id, active }
    }

    pub fn current_position(&mut self, options: &WatchOptions) {
        let callback = forward(self.events.clone(), None);
        self.geolocation.get_current_position(options, callback);
    }

    pub fn cancel(&mut self, subscription: Subscription) {
        subscription.active.store(false, Ordering::SeqCst);
        self.geolocation.clear_watch(subscription.id);
        log::info!("stopped watching position {:?}", subscription.id);
    }

    pub const fn geolocation(&self) -> &G {
        &self.geolocation
    }
}

fn forward(events: Outbox, active: Option<Arc<AtomicBool>>) -> PositionCallback {
    Box::new(move |result| {
        if active.as_ref().is_some_and(|a| !a.load(Ordering::SeqCst)) {
            return;
        }
        let result = result.map(LocationSample::from).map_err(|error| {
            log::warn!("{error}");
            LocationError::from(error)
        });
        events.emit(result.into());
    })
}
