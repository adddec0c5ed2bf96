//! Ambient audio for scenes.
//!
//! Scenes own an [`AudioPlayer`] created from the shared [`AudioDevice`] and
//! drive it from their lifecycle hooks. The render loop never touches audio.
//!
//! [`SilentAudio`] is always available. With the `audio` feature enabled,
//! [`RodioAudio`] plays `<root>/<name>.mp3` through the default output.

/// One playback channel.
pub trait AudioPlayer {
    /// Start `name` from the beginning, replacing whatever was playing.
    fn play(&mut self, name: &str, looping: bool);
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    /// Volume in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);
}

/// Factory for players.
pub trait AudioDevice: Send + Sync {
    fn create_player(&self) -> Box<dyn AudioPlayer>;
}

/// Discards all playback requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioDevice for SilentAudio {
    fn create_player(&self) -> Box<dyn AudioPlayer> {
        Box::new(SilentAudio)
    }
}

impl AudioPlayer for SilentAudio {
    fn play(&mut self, name: &str, looping: bool) {
        log::debug!("audio disabled, not playing '{}' (loop: {})", name, looping);
    }

    fn stop(&mut self) {}

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn set_volume(&mut self, _volume: f32) {}
}

#[cfg(feature = "audio")]
pub use rodio_backend::RodioAudio;

#[cfg(feature = "audio")]
mod rodio_backend {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::PathBuf;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use super::{AudioDevice, AudioPlayer};

    /// Plays mp3 files from an asset directory.
    #[derive(Debug, Clone)]
    pub struct RodioAudio {
        root: PathBuf,
    }

    impl RodioAudio {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }
    }

    impl AudioDevice for RodioAudio {
        fn create_player(&self) -> Box<dyn AudioPlayer> {
            Box::new(RodioPlayer {
                root: self.root.clone(),
                output: None,
                sink: None,
                volume: 1.0,
            })
        }
    }

    struct RodioPlayer {
        root: PathBuf,
        // The stream must outlive the sink.
        output: Option<(OutputStream, OutputStreamHandle)>,
        sink: Option<Sink>,
        volume: f32,
    }

    impl RodioPlayer {
        fn handle(&mut self) -> Option<&OutputStreamHandle> {
            if self.output.is_none() {
                match OutputStream::try_default() {
                    Ok(output) => self.output = Some(output),
                    Err(e) => {
                        log::warn!("No audio output available: {}", e);
                        return None;
                    }
                }
            }
            self.output.as_ref().map(|(_, handle)| handle)
        }
    }

    impl AudioPlayer for RodioPlayer {
        fn play(&mut self, name: &str, looping: bool) {
            self.stop();

            let path = self.root.join(format!("{name}.mp3"));
            let file = match File::open(&path) {
                Ok(file) => BufReader::new(file),
                Err(e) => {
                    log::warn!("Could not find audio file {}: {}", path.display(), e);
                    return;
                }
            };
            let volume = self.volume;
            let Some(handle) = self.handle() else { return };
            let sink = match Sink::try_new(handle) {
                Ok(sink) => sink,
                Err(e) => {
                    log::warn!("Could not create audio sink: {}", e);
                    return;
                }
            };

            let appended = if looping {
                Decoder::new_looped(file).map(|source| sink.append(source))
            } else {
                Decoder::new(file).map(|source| sink.append(source))
            };
            if let Err(e) = appended {
                log::warn!("Could not decode {}: {}", path.display(), e);
                return;
            }

            sink.set_volume(volume);
            sink.play();
            self.sink = Some(sink);
        }

        fn stop(&mut self) {
            if let Some(sink) = self.sink.take() {
                sink.stop();
            }
        }

        fn pause(&mut self) {
            if let Some(sink) = &self.sink {
                sink.pause();
            }
        }

        fn resume(&mut self) {
            if let Some(sink) = &self.sink {
                sink.play();
            }
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume.clamp(0.0, 1.0);
            if let Some(sink) = &self.sink {
                sink.set_volume(self.volume);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_player_accepts_everything() {
        let mut player = SilentAudio.create_player();
        player.play("anything", true);
        player.set_volume(0.5);
        player.pause();
        player.resume();
        player.stop();
    }
}
