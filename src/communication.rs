use std::io::{self, BufRead, Write};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::position::LocationSample;

/// A command sent in by the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    GetCurrentPosition,
    StartAlarm,
    StopAlarm,
    SaveData(String, Value),
    GetData(String),
}

/// An event sent back out to the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    LocationUpdate(LocationSample),
    LocationUpdateError(String),
    // value is `None` for a missing (or unreadable) key
    ReceiveData(String, Option<Value>),
    #[serde(serialize_with = "tagged_unit")]
    AlarmWasStopped,
}

/// Writes a payloadless variant as `{"Variant": null}` instead of a bare
/// string, the only form the rule engine reads.
pub(crate) fn tagged_unit<S: Serializer>(serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_unit()
}

/// The outbound half of the message port.
///
/// Cloned into everything that produces events (position callbacks run on
/// other threads). A closed port only drops the event.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: Sender<Event>,
}

impl Outbox {
    #[must_use]
    pub const fn new(sender: Sender<Event>) -> Self {
        Self { sender }
    }

    pub fn emit(&self, event: Event) {
        if let Err(e) = self.sender.send(event) {
            log::warn!("message port closed, dropping {:?}", e.into_inner());
        }
    }
}

/// Creates the outbound port: the [`Outbox`] to emit on and the receiving end.
#[must_use]
pub fn port() -> (Outbox, Receiver<Event>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (Outbox::new(sender), receiver)
}

/// Parses one line of the inbound stream.
///
/// # Errors
/// when the line isn't a JSON encoded [`Command`]
pub fn decode_command(line: &str) -> serde_json::Result<Command> {
    serde_json::from_str(line.trim())
}

/// Writes one event as a single JSON line and flushes.
///
/// # Errors
/// when the writer fails
pub fn write_event<W: Write + ?Sized>(writer: &mut W, event: &Event) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, event)?;
    writeln!(writer)?;
    writer.flush()
}

/// Reads commands line by line until the reader ends, forwarding them into
/// `commands`. Lines that don't decode, UTF-8 included, are logged and skipped.
pub fn forward_commands<R: BufRead>(mut reader: R, commands: &Sender<Command>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!("couldn't read from message port: {e}");
                break;
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("ignoring command that isn't UTF-8: {e}");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match decode_command(line) {
            Ok(command) => {
                if commands.send(command).is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("ignoring malformed command `{}`: {e}", line.trim_end()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::position::Movement;

    #[test]
    fn unit_commands_decode_in_both_forms() {
        assert_eq!(decode_command(r#""StartAlarm""#).unwrap(), Command::StartAlarm);
        assert_eq!(
            decode_command(r#"{"StopAlarm": null}"#).unwrap(),
            Command::StopAlarm
        );
        assert_eq!(
            decode_command(r#"{"GetCurrentPosition":null}"#).unwrap(),
            Command::GetCurrentPosition
        );
    }

    #[test]
    fn data_commands_carry_key_and_value() {
        assert_eq!(
            decode_command(r#"{"SaveData": ["target", {"lat": 1.5, "radius": 200}]}"#).unwrap(),
            Command::SaveData("target".into(), json!({"lat": 1.5, "radius": 200}))
        );
        assert_eq!(
            decode_command(r#"{"GetData": "target"}"#).unwrap(),
            Command::GetData("target".into())
        );
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(decode_command(r#"{"Explode": null}"#).is_err());
        assert!(decode_command("not json").is_err());
    }

    #[test]
    fn events_are_written_as_json_lines() {
        let mut out = Vec::new();
        write_event(&mut out, &Event::ReceiveData("missing".into(), None)).unwrap();
        write_event(&mut out, &Event::AlarmWasStopped).unwrap();
        write_event(
            &mut out,
            &Event::LocationUpdate(LocationSample {
                latitude: 1.0,
                longitude: 2.0,
                accuracy: 5.0,
                altitude: None,
                movement: Some(Movement::Moving {
                    speed: 3.5,
                    degrees_from_north: 90.0,
                }),
                timestamp: 1000,
            }),
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0], json!({"ReceiveData": ["missing", null]}));
        assert_eq!(lines[1], json!({"AlarmWasStopped": null}));
        assert_eq!(
            lines[2],
            json!({"LocationUpdate": {
                "latitude": 1.0,
                "longitude": 2.0,
                "accuracy": 5.0,
                "altitude": null,
                "movement": {"Moving": {"speed": 3.5, "degreesFromNorth": 90.0}},
                "timestamp": 1000
            }})
        );
    }

    #[test]
    fn forwarding_skips_bad_lines() {
        let input = "\"StartAlarm\"\n\ngarbage\n{\"GetData\": \"k\"}\n";
        let (tx, rx) = crossbeam_channel::unbounded();
        forward_commands(input.as_bytes(), &tx);
        drop(tx);
        let got: Vec<Command> = rx.iter().collect();
        assert_eq!(got, vec![Command::StartAlarm, Command::GetData("k".into())]);
    }

    #[test]
    fn forwarding_survives_invalid_utf8() {
        let input: &[u8] = b"\"StartAlarm\"\n\xff\xfe\n\"StopAlarm\"\n";
        let (tx, rx) = crossbeam_channel::unbounded();
        forward_commands(input, &tx);
        drop(tx);
        let got: Vec<Command> = rx.iter().collect();
        assert_eq!(got, vec![Command::StartAlarm, Command::StopAlarm]);
    }

    #[test]
    fn last_line_needs_no_newline() {
        let (tx, rx) = crossbeam_channel::unbounded();
        forward_commands("\"StopAlarm\"".as_bytes(), &tx);
        drop(tx);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![Command::StopAlarm]);
    }

    #[test]
    fn unit_events_are_tagged_objects_and_read_back_either_way() {
        let mut out = Vec::new();
        write_event(&mut out, &Event::AlarmWasStopped).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"AlarmWasStopped\":null}\n");
        for text in [r#"{"AlarmWasStopped":null}"#, r#""AlarmWasStopped""#] {
            assert_eq!(
                serde_json::from_str::<Event>(text).unwrap(),
                Event::AlarmWasStopped
            );
        }
    }

    #[test]
    fn emitting_on_a_closed_port_is_harmless() {
        let (outbox, receiver) = port();
        drop(receiver);
        outbox.emit(Event::AlarmWasStopped);
    }
}
