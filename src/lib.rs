#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Watches the device position for a rule engine and raises a proximity
//! alarm (sound plus a notification) when the engine asks for one.
//!
//! The engine talks to the [`app::App`] over a message port of JSON lines,
//! see [`communication`].

pub mod alarm;
pub mod app;
pub mod audio;
pub mod communication;
pub mod config;
pub mod host;
pub mod notification;
pub mod position;
/// fan out of notification interactions to every open window
pub mod relay;
pub mod replay;
pub mod storage;
pub mod terminal;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
