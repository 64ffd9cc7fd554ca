use std::{
    io::Cursor,
    sync::{mpsc, Arc},
    thread,
};

use rodio::{Decoder, OutputStream, Sink};
use thiserror::Error;
use tracing::debug;

/// One returned audio payload. Clones share the underlying bytes; dropping
/// the last clone releases them, which is how a superseded result is
/// reclaimed.
#[derive(Debug, Clone)]
pub struct AudioClip {
    data: Arc<Vec<u8>>,
    content_type: Option<String>,
}

impl AudioClip {
    pub fn new(data: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            data: Arc::new(data),
            content_type,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output available: {0}")]
    Output(String),
    #[error("returned audio could not be decoded: {0}")]
    Decode(String),
}

/// Playback seam. Starting a new clip stops whatever the player is
/// currently playing; the latest clip always wins.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, clip: &AudioClip) -> Result<(), PlaybackError>;
}

/// Discards every clip. For headless runs and tests that do not observe
/// playback.
pub struct NullPlayer;

impl AudioPlayer for NullPlayer {
    fn play(&self, clip: &AudioClip) -> Result<(), PlaybackError> {
        debug!(bytes = clip.len(), "discarding clip, no playback backend");
        Ok(())
    }
}

type DecodedClip = Decoder<Cursor<Vec<u8>>>;

/// Speaker output through rodio. The output stream is not `Send`, so a
/// dedicated thread owns it and receives decoded clips over a channel.
pub struct RodioPlayer {
    sender: mpsc::Sender<DecodedClip>,
}

impl RodioPlayer {
    pub fn try_default() -> Result<Self, PlaybackError> {
        let (sender, receiver) = mpsc::channel::<DecodedClip>();
        let (ready_sender, ready_receiver) = mpsc::channel();

        thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(output) => output,
                    Err(err) => {
                        let _ = ready_sender.send(Err(PlaybackError::Output(err.to_string())));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(err) => {
                        let _ = ready_sender.send(Err(PlaybackError::Output(err.to_string())));
                        return;
                    }
                };
                let _ = ready_sender.send(Ok(()));

                // The stream must outlive the sink or playback goes silent.
                let _stream = stream;
                while let Ok(source) = receiver.recv() {
                    sink.stop();
                    sink.append(source);
                    sink.play();
                }
            })
            .map_err(|err| PlaybackError::Output(err.to_string()))?;

        ready_receiver
            .recv()
            .map_err(|_| PlaybackError::Output("playback thread exited during setup".to_string()))??;

        Ok(Self { sender })
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(&self, clip: &AudioClip) -> Result<(), PlaybackError> {
        let source = Decoder::new(Cursor::new(clip.data().to_vec()))
            .map_err(|err| PlaybackError::Decode(err.to_string()))?;
        self.sender
            .send(source)
            .map_err(|_| PlaybackError::Output("playback thread terminated".to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_clones_share_bytes() {
        let clip = AudioClip::new(vec![1, 2, 3], Some("audio/wav".to_string()));
        let copy = clip.clone();
        assert_eq!(copy.data(), clip.data());
        assert_eq!(copy.content_type(), Some("audio/wav"));
        assert_eq!(copy.len(), 3);
        assert!(!copy.is_empty());
    }

    #[test]
    fn null_player_accepts_any_clip() {
        let player = NullPlayer;
        let clip = AudioClip::new(vec![0; 16], None);
        player.play(&clip).expect("null player never fails");
    }
}
