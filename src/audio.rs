use std::{fs::File, io::BufReader, path::PathBuf};

use rodio::{Decoder, OutputStream, Sink, Source};

use crate::alarm::Audio;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("couldn't open audio output: {0}")]
    Output(#[from] rodio::StreamError),
    #[error("couldn't open sound file: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't decode sound file: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
}

/// Plays the alarm sound on repeat through the default output device.
pub struct RodioAudio {
    // the sink goes quiet once the stream is dropped
    _stream: OutputStream,
    sink: Sink,
    sound: PathBuf,
}

impl RodioAudio {
    /// `volume` is in percent.
    ///
    /// # Errors
    /// when there is no usable output device
    pub fn open(sound: impl Into<PathBuf>, volume: f32) -> Result<Self, AudioError> {
        let stream = rodio::OutputStreamBuilder::open_default_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.set_volume(volume / 100.0);
        Ok(Self {
            _stream: stream,
            sink,
            sound: sound.into(),
        })
    }

    fn load(&self) -> Result<(), AudioError> {
        let file = BufReader::new(File::open(&self.sound)?);
        // create source that repeatedly plays the sound
        let source = Decoder::new(file)?.repeat_infinite();
        self.sink.append(source);
        Ok(())
    }
}

impl Audio for RodioAudio {
    fn play(&mut self) {
        if self.sink.empty() {
            if let Err(e) = self.load() {
                log::error!("{} ({})", e, self.sound.display());
                return;
            }
        }
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn is_playing(&self) -> bool {
        !self.sink.empty() && !self.sink.is_paused()
    }
}

/// Stand-in when there is no output device: keeps the state, makes no sound.
#[derive(Debug, Default)]
pub struct Silence {
    playing: bool,
}

impl Audio for Silence {
    fn play(&mut self) {
        if !self.playing {
            log::warn!("alarm is sounding, but there is no audio output");
        }
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
