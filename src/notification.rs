//! Notification permission, handles and the two ways of showing one.
//!
//! Some environments can construct a notification directly, others can only
//! ask the worker registration to show it. Which one applies is decided once,
//! up front, by [`select_presenter`] probing [`NotificationFactory::can_construct`].

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// not asked yet
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Granted => "granted",
            Self::Denied => "denied",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Click,
    Close,
    Error,
}

pub type InteractionHandler = Arc<dyn Fn(Interaction) + Send + Sync>;

/// A shown notification.
pub trait Notification: Send + fmt::Debug {
    /// Wires the click, close and error events to `handler`.
    fn on_interaction(&mut self, handler: InteractionHandler);
    /// Dismisses the notification. Never invokes the interaction handler.
    fn close(&mut self);
}

pub trait Permissions {
    fn permission(&self) -> Permission;
    fn request_permission(&mut self) -> Permission;
}

impl<P: Permissions + ?Sized> Permissions for Box<P> {
    fn permission(&self) -> Permission {
        (**self).permission()
    }

    fn request_permission(&mut self) -> Permission {
        (**self).request_permission()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notifications can't be constructed directly here")]
    Unsupported,
    #[error("no worker registration to show notifications through")]
    NoRegistration,
    #[error("couldn't show notification: {0}")]
    Platform(String),
}

/// Direct construction of notifications.
pub trait NotificationFactory {
    /// Capability probe: whether [`construct`](Self::construct) works in this environment.
    fn can_construct(&self) -> bool;
    /// # Errors
    /// when the platform refuses to show the notification
    fn construct(
        &mut self,
        title: &str,
        require_interaction: bool,
    ) -> Result<Box<dyn Notification>, NotificationError>;
}

/// The worker registration, which shows notifications on the windows' behalf.
///
/// Registrations are shared by every window, so each notification carries the
/// tag of the window that asked for it.
pub trait Registration {
    /// # Errors
    /// when the registration is gone or the platform refuses
    fn show_notification(&mut self, title: &str, tag: &str) -> Result<(), NotificationError>;
    /// The notifications currently open under `tag`.
    fn notifications(&mut self, tag: &str) -> Vec<Box<dyn Notification>>;
}

/// A way of getting a notification in front of the user.
pub trait Presenter {
    /// Shows a notification with `handler` wired to every handle involved.
    /// Returns the handle to keep track of, if this path yields one.
    ///
    /// # Errors
    /// when the platform refuses to show the notification
    fn show(
        &mut self,
        title: &str,
        handler: &InteractionHandler,
    ) -> Result<Option<Box<dyn Notification>>, NotificationError>;
    /// Closes the notifications this path showed without handing out a handle.
    fn close_untracked(&mut self);
}

#[derive(Debug)]
pub struct DirectPresenter<F> {
    factory: F,
}

impl<F> DirectPresenter<F> {
    pub const fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F: NotificationFactory> Presenter for DirectPresenter<F> {
    fn show(
        &mut self,
        title: &str,
        handler: &InteractionHandler,
    ) -> Result<Option<Box<dyn Notification>>, NotificationError> {
        let mut notification = self.factory.construct(title, true)?;
        notification.on_interaction(Arc::clone(handler));
        Ok(Some(notification))
    }

    // directly constructed notifications are always tracked
    fn close_untracked(&mut self) {}
}

/// Shows notifications through the shared registration, under one window's tag.
#[derive(Debug)]
pub struct WorkerPresenter<R> {
    registration: R,
    tag: String,
}

impl<R> WorkerPresenter<R> {
    pub fn new(registration: R, tag: impl Into<String>) -> Self {
        Self {
            registration,
            tag: tag.into(),
        }
    }
}

impl<R: Registration> Presenter for WorkerPresenter<R> {
    fn show(
        &mut self,
        title: &str,
        handler: &InteractionHandler,
    ) -> Result<Option<Box<dyn Notification>>, NotificationError> {
        self.registration.show_notification(title, &self.tag)?;
        for mut notification in self.registration.notifications(&self.tag) {
            notification.on_interaction(Arc::clone(handler));
        }
        Ok(None)
    }

    fn close_untracked(&mut self) {
        for mut notification in self.registration.notifications(&self.tag) {
            notification.close();
        }
    }
}

/// Picks the presenter for this environment. `tag` names the window the
/// worker path shows notifications for.
pub fn select_presenter<F, R>(factory: F, registration: R, tag: &str) -> Box<dyn Presenter>
where
    F: NotificationFactory + 'static,
    R: Registration + 'static,
{
    if factory.can_construct() {
        log::debug!("notifications are constructed directly");
        Box::new(DirectPresenter::new(factory))
    } else {
        log::info!("direct notifications unsupported, showing them through the worker");
        Box::new(WorkerPresenter::new(registration, tag))
    }
}
