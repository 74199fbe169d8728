//! Notifications shown on the controlling terminal.

use std::io::{self, IsTerminal, Write};

use crate::notification::{
    InteractionHandler, Notification, NotificationError, NotificationFactory, Permission,
    Permissions,
};

/// Permission fixed by configuration.
///
/// Asking while the permission is still `default` grants it: whoever started
/// the alarm runtime asked for alarms.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPermissions {
    permission: Permission,
}

impl StaticPermissions {
    #[must_use]
    pub const fn new(permission: Permission) -> Self {
        Self { permission }
    }
}

impl Permissions for StaticPermissions {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        if self.permission == Permission::Default {
            self.permission = Permission::Granted;
        }
        self.permission
    }
}

/// Writes notifications to stderr, ringing the terminal bell.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl NotificationFactory for TerminalNotifier {
    fn can_construct(&self) -> bool {
        io::stderr().is_terminal()
    }

    fn construct(
        &mut self,
        title: &str,
        _require_interaction: bool,
    ) -> Result<Box<dyn Notification>, NotificationError> {
        if !self.can_construct() {
            return Err(NotificationError::Unsupported);
        }
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "\x07{title}").map_err(|e| NotificationError::Platform(e.to_string()))?;
        Ok(Box::new(TerminalNotification {
            title: title.to_string(),
            handler: None,
        }))
    }
}

pub struct TerminalNotification {
    title: String,
    // never fires, a terminal line can't be clicked
    handler: Option<InteractionHandler>,
}

impl std::fmt::Debug for TerminalNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalNotification")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl Notification for TerminalNotification {
    fn on_interaction(&mut self, handler: InteractionHandler) {
        self.handler = Some(handler);
    }

    fn close(&mut self) {
        if self.handler.take().is_some() {
            log::debug!("dismissed `{}`", self.title);
        }
    }
}
