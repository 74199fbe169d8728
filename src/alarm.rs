use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::{
    communication::{Command, Event, Outbox},
    notification::{InteractionHandler, Notification, Permission, Permissions, Presenter},
};

pub const DEFAULT_TITLE: &str = "Proximity alert!";

/// Something that can sound the alarm.
pub trait Audio {
    /// Starts (or keeps) playing. Calling it while already playing changes nothing.
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
}

impl<A: Audio + ?Sized> Audio for Box<A> {
    fn play(&mut self) {
        (**self).play();
    }

    fn pause(&mut self) {
        (**self).pause();
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }
}

/// represents the alarm of one window
/// whether it's sounding and the notification it put up, if we hold on to one
#[derive(Debug, Default)]
pub struct AlarmState {
    audio_playing: bool,
    active_notification: Option<Box<dyn Notification>>,
}

impl AlarmState {
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.audio_playing
    }

    #[must_use]
    pub const fn has_notification(&self) -> bool {
        self.active_notification.is_some()
    }
}

/// Handler for notification interactions that asks the window owning
/// `commands` to stop its alarm.
pub fn stop_on_interaction(commands: Sender<Command>) -> InteractionHandler {
    Arc::new(move |interaction| {
        log::debug!("notification {interaction:?}, stopping alarm");
        if commands.send(Command::StopAlarm).is_err() {
            log::warn!("window is gone, can't stop its alarm");
        }
    })
}

pub struct AlarmController<A> {
    audio: A,
    permissions: Box<dyn Permissions>,
    presenter: Box<dyn Presenter>,
    state: AlarmState,
    title: String,
    on_interaction: InteractionHandler,
    events: Outbox,
}

impl<A: Audio> AlarmController<A> {
    pub fn new(
        audio: A,
        permissions: Box<dyn Permissions>,
        presenter: Box<dyn Presenter>,
        on_interaction: InteractionHandler,
        events: Outbox,
    ) -> Self {
        Self {
            audio,
            permissions,
            presenter,
            state: AlarmState::default(),
            title: DEFAULT_TITLE.to_string(),
            on_interaction,
            events,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub const fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn start(&mut self) {
        log::info!("alarm started");
        self.audio.play();
        self.state.audio_playing = true;

        let permission = match self.permissions.permission() {
            Permission::Default => self.permissions.request_permission(),
            permission => permission,
        };
        if permission != Permission::Granted {
            log::info!("notification permission is {permission}, alarm is audio only");
            return;
        }

        // replace, never abandon, whatever is still showing
        self.dismiss();
        match self.presenter.show(&self.title, &self.on_interaction) {
            Ok(notification) => self.state.active_notification = notification,
            Err(e) => log::warn!("{e}"),
        }
    }

    pub fn stop(&mut self) {
        log::info!("alarm stopped");
        self.audio.pause();
        self.state.audio_playing = false;
        self.dismiss();
        self.events.emit(Event::AlarmWasStopped);
    }

    fn dismiss(&mut self) {
        if let Some(mut notification) = self.state.active_notification.take() {
            notification.close();
        } else {
            self.presenter.close_untracked();
        }
    }
}
