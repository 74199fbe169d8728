//! Fakes for the platform seams, shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex},
};

use crate::{
    alarm::Audio,
    notification::{
        Interaction, InteractionHandler, Notification, NotificationError, NotificationFactory,
        Permission, Permissions,
    },
    position::{Geolocation, PositionCallback, PositionError, RawPosition, WatchId, WatchOptions},
};

#[derive(Debug, Default)]
struct AudioLog {
    playing: bool,
    started: usize,
}

#[derive(Debug, Default, Clone)]
pub struct FakeAudio {
    log: Arc<Mutex<AudioLog>>,
}

impl FakeAudio {
    /// How many times the audio went from silent to sounding.
    pub fn times_started(&self) -> usize {
        self.log.lock().unwrap().started
    }
}

impl Audio for FakeAudio {
    fn play(&mut self) {
        let mut log = self.log.lock().unwrap();
        if !log.playing {
            log.started += 1;
        }
        log.playing = true;
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.log.lock().unwrap().playing
    }
}

struct Shown {
    title: String,
    open: bool,
    handler: Option<InteractionHandler>,
}

impl fmt::Debug for Shown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shown")
            .field("title", &self.title)
            .field("open", &self.open)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct Board {
    permission: Permission,
    answer: Permission,
    requests: usize,
    constructible: bool,
    shown: Vec<Shown>,
}

/// Permission source and direct notification factory in one.
#[derive(Debug, Clone)]
pub struct FakeNotifications {
    board: Arc<Mutex<Board>>,
}

impl FakeNotifications {
    pub fn with_permission(permission: Permission) -> Self {
        Self {
            board: Arc::new(Mutex::new(Board {
                permission,
                answer: permission,
                requests: 0,
                constructible: true,
                shown: Vec::new(),
            })),
        }
    }

    pub fn granted() -> Self {
        Self::with_permission(Permission::Granted)
    }

    /// What a permission request resolves to.
    pub fn answering(self, answer: Permission) -> Self {
        self.board.lock().unwrap().answer = answer;
        self
    }

    pub fn without_construction(self) -> Self {
        self.board.lock().unwrap().constructible = false;
        self
    }

    pub fn requests(&self) -> usize {
        self.board.lock().unwrap().requests
    }

    /// Notifications constructed so far, open or not.
    pub fn shown(&self) -> usize {
        self.board.lock().unwrap().shown.len()
    }

    pub fn open_titles(&self) -> Vec<String> {
        self.board
            .lock()
            .unwrap()
            .shown
            .iter()
            .filter(|s| s.open)
            .map(|s| s.title.clone())
            .collect()
    }

    pub fn has_handler(&self, id: usize) -> bool {
        self.board.lock().unwrap().shown[id].handler.is_some()
    }

    /// The user interacting with notification `id`.
    pub fn fire(&self, id: usize, interaction: Interaction) {
        let handler = self.board.lock().unwrap().shown[id].handler.clone();
        if let Some(handler) = handler {
            handler(interaction);
        }
    }
}

impl Permissions for FakeNotifications {
    fn permission(&self) -> Permission {
        self.board.lock().unwrap().permission
    }

    fn request_permission(&mut self) -> Permission {
        let mut board = self.board.lock().unwrap();
        board.requests += 1;
        board.permission = board.answer;
        board.permission
    }
}

impl NotificationFactory for FakeNotifications {
    fn can_construct(&self) -> bool {
        self.board.lock().unwrap().constructible
    }

    fn construct(
        &mut self,
        title: &str,
        _require_interaction: bool,
    ) -> Result<Box<dyn Notification>, NotificationError> {
        let mut board = self.board.lock().unwrap();
        if !board.constructible {
            return Err(NotificationError::Unsupported);
        }
        board.shown.push(Shown {
            title: title.to_string(),
            open: true,
            handler: None,
        });
        Ok(Box::new(FakeNotification {
            id: board.shown.len() - 1,
            board: Arc::clone(&self.board),
        }))
    }
}

#[derive(Debug)]
struct FakeNotification {
    id: usize,
    board: Arc<Mutex<Board>>,
}

impl Notification for FakeNotification {
    fn on_interaction(&mut self, handler: InteractionHandler) {
        self.board.lock().unwrap().shown[self.id].handler = Some(handler);
    }

    fn close(&mut self) {
        self.board.lock().unwrap().shown[self.id].open = false;
    }
}

#[derive(Default)]
struct Watches {
    next: u64,
    callbacks: HashMap<WatchId, PositionCallback>,
    cleared: HashSet<WatchId>,
    current: Option<Result<RawPosition, PositionError>>,
}

/// A position source the test pushes fixes through by hand.
#[derive(Default, Clone)]
pub struct FakeGeolocation {
    watches: Arc<Mutex<Watches>>,
}

impl FakeGeolocation {
    /// Delivers to every watch that hasn't been cleared.
    pub fn deliver(&self, result: Result<RawPosition, PositionError>) {
        let mut watches = self.watches.lock().unwrap();
        let Watches {
            callbacks, cleared, ..
        } = &mut *watches;
        for (id, callback) in callbacks.iter_mut() {
            if !cleared.contains(id) {
                callback(result.clone());
            }
        }
    }

    /// Delivers to every watch ever made, like a platform that fires late.
    pub fn deliver_to_all(&self, result: Result<RawPosition, PositionError>) {
        for callback in self.watches.lock().unwrap().callbacks.values_mut() {
            callback(result.clone());
        }
    }

    pub fn is_cleared(&self, id: WatchId) -> bool {
        self.watches.lock().unwrap().cleared.contains(&id)
    }

    pub fn active_watches(&self) -> usize {
        let watches = self.watches.lock().unwrap();
        watches
            .callbacks
            .keys()
            .filter(|id| !watches.cleared.contains(*id))
            .count()
    }

    pub fn set_current(&self, result: Result<RawPosition, PositionError>) {
        self.watches.lock().unwrap().current = Some(result);
    }
}

impl Geolocation for FakeGeolocation {
    fn watch_position(&mut self, _options: &WatchOptions, callback: PositionCallback) -> WatchId {
        let mut watches = self.watches.lock().unwrap();
        let id = WatchId(watches.next);
        watches.next += 1;
        watches.callbacks.insert(id, callback);
        id
    }

    fn clear_watch(&mut self, id: WatchId) {
        self.watches.lock().unwrap().cleared.insert(id);
    }

    fn get_current_position(&mut self, _options: &WatchOptions, mut callback: PositionCallback) {
        let current = self.watches.lock().unwrap().current.clone();
        callback(current.unwrap_or_else(|| Err(PositionError::unavailable("no fix yet"))));
    }
}
