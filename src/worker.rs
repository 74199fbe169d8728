//! An in-process worker context.
//!
//! The worker holds the notifications shown through its registration.
//! Click and close interactions on those are delivered to the worker rather
//! than to any window, which is why they go through the [`Relay`].

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use crate::{
    notification::{Interaction, InteractionHandler, Notification, NotificationError, Registration},
    relay::{Clients, NotificationEvent, Relay},
};

struct Shown {
    id: u64,
    tag: String,
    title: String,
    handler: Option<InteractionHandler>,
}

impl fmt::Debug for Shown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shown")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerRegistration {
    shown: Arc<Mutex<Vec<Shown>>>,
    next_id: Arc<AtomicU64>,
}

impl WorkerRegistration {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<Shown>>, NotificationError> {
        self.shown
            .lock()
            .map_err(|_| NotificationError::Platform("worker registration poisoned".into()))
    }

    #[must_use]
    pub fn open_ids(&self) -> Vec<u64> {
        self.lock()
            .map(|shown| shown.iter().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    /// Open notifications shown under `tag`.
    #[must_use]
    pub fn tagged(&self, tag: &str) -> Vec<u64> {
        self.lock()
            .map(|shown| {
                shown
                    .iter()
                    .filter(|s| s.tag == tag)
                    .map(|s| s.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_handler(&self, id: u64) -> bool {
        self.handler(id).is_some()
    }

    fn handler(&self, id: u64) -> Option<InteractionHandler> {
        self.lock()
            .ok()?
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.handler.clone())
    }

    fn set_handler(&self, id: u64, handler: InteractionHandler) {
        if let Ok(mut shown) = self.lock() {
            if let Some(s) = shown.iter_mut().find(|s| s.id == id) {
                s.handler = Some(handler);
            }
        }
    }

    fn remove(&self, id: u64) {
        if let Ok(mut shown) = self.lock() {
            shown.retain(|s| s.id != id);
        }
    }
}

impl Registration for WorkerRegistration {
    fn show_notification(&mut self, title: &str, tag: &str) -> Result<(), NotificationError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock()?.push(Shown {
            id,
            tag: tag.to_string(),
            title: title.to_string(),
            handler: None,
        });
        log::warn!("{title}");
        Ok(())
    }

    fn notifications(&mut self, tag: &str) -> Vec<Box<dyn Notification>> {
        self.tagged(tag)
            .into_iter()
            .map(|id| {
                Box::new(WorkerNotification {
                    id,
                    registration: self.clone(),
                }) as Box<dyn Notification>
            })
            .collect()
    }
}

/// A window's view of a notification the worker shows.
#[derive(Debug)]
pub struct WorkerNotification {
    id: u64,
    registration: WorkerRegistration,
}

impl Notification for WorkerNotification {
    fn on_interaction(&mut self, handler: InteractionHandler) {
        self.registration.set_handler(self.id, handler);
    }

    fn close(&mut self) {
        self.registration.remove(self.id);
    }
}

pub struct Worker<C> {
    registration: WorkerRegistration,
    relay: Relay<C>,
}

impl<C: Clients> Worker<C> {
    pub const fn new(registration: WorkerRegistration, relay: Relay<C>) -> Self {
        Self {
            registration,
            relay,
        }
    }

    pub const fn registration(&self) -> &WorkerRegistration {
        &self.registration
    }

    /// The user interacting with notification `id`.
    pub fn interact(&self, id: u64, interaction: Interaction) {
        match interaction {
            Interaction::Click => self.relay.handle(NotificationEvent::Click),
            Interaction::Close => {
                self.registration.remove(id);
                self.relay.handle(NotificationEvent::Close);
            }
            Interaction::Error => {
                let handler = self.registration.handler(id);
                self.registration.remove(id);
                if let Some(handler) = handler {
                    handler(Interaction::Error);
                }
            }
        }
    }
}
