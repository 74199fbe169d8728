use crossbeam_channel::{select, Receiver};

use crate::{
    alarm::{AlarmController, Audio},
    communication::{Command, Event, Outbox},
    position::{Geolocation, PositionWatcher, Subscription, WatchOptions},
    storage::{KeyValueStore, Storage},
};

/// One window: takes commands off the message port and hands them to the
/// component that carries them out.
pub struct App<A, G, S> {
    watcher: PositionWatcher<G>,
    alarm: AlarmController<A>,
    storage: Storage<S>,
    events: Outbox,
    options: WatchOptions,
    subscription: Option<Subscription>,
}

impl<A: Audio, G: Geolocation, S: KeyValueStore> App<A, G, S> {
    pub const fn new(
        watcher: PositionWatcher<G>,
        alarm: AlarmController<A>,
        storage: Storage<S>,
        events: Outbox,
        options: WatchOptions,
    ) -> Self {
        Self {
            watcher,
            alarm,
            storage,
            events,
            options,
            subscription: None,
        }
    }

    /// Starts the continuous position watch, if it isn't running yet.
    pub fn watch(&mut self) {
        if self.subscription.is_none() {
            self.subscription = Some(self.watcher.watch(&self.options));
        }
    }

    pub fn unwatch(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.watcher.cancel(subscription);
        }
    }

    pub const fn alarm(&self) -> &AlarmController<A> {
        &self.alarm
    }

    pub fn handle(&mut self, command: Command) {
        log::debug!("{command:?}");
        match command {
            Command::GetCurrentPosition => self.watcher.current_position(&self.options),
            Command::StartAlarm => self.alarm.start(),
            Command::StopAlarm => self.alarm.stop(),
            Command::SaveData(key, value) => {
                if let Err(e) = self.storage.save(&key, &value) {
                    log::error!("couldn't save `{key}`: {e}");
                }
            }
            Command::GetData(key) => {
                let value = self.storage.get(&key).unwrap_or_else(|e| {
                    log::warn!("couldn't read `{key}`: {e}");
                    None
                });
                self.events.emit(Event::ReceiveData(key, value));
            }
        }
    }

    /// Watches the position and processes commands until `port` closes.
    ///
    /// `internal` carries commands raised inside the window (notification
    /// handlers, the relay); it may close at any time.
    pub fn run(&mut self, port: &Receiver<Command>, internal: &Receiver<Command>) {
        self.watch();
        let mut internal = internal.clone();
        loop {
            let mut internal_closed = false;
            let running = select! {
                recv(port) -> command => match command {
                    Ok(command) => {
                        self.handle(command);
                        true
                    }
                    Err(_) => false,
                },
                recv(internal) -> command => {
                    match command {
                        Ok(command) => self.handle(command),
                        Err(_) => internal_closed = true,
                    }
                    true
                },
            };
            if !running {
                break;
            }
            if internal_closed {
                internal = crossbeam_channel::never();
            }
        }
        self.unwatch();
        log::info!("message port closed");
    }
}
