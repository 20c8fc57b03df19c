//! Session recording: taps decoded playback buffers and renders them into a
//! WAV file on demand.

use studyhall_live_utils::wav;

use crate::playback::PLAYBACK_SAMPLE_RATE;

/// Accumulates tutor speech while active. Records what the model says, not
/// the user's microphone, so it is independent of mute state.
#[derive(Default)]
pub struct SessionRecorder {
    recording: bool,
    chunks: Vec<Vec<f32>>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Flips the recording flag; starting a new pass discards anything left
    /// over from a previous one. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.recording = !self.recording;
        if self.recording {
            self.chunks.clear();
        }
        self.recording
    }

    /// Copies a decoded playback buffer into the recording. The samples are
    /// owned copies; the scheduler is free to reuse its buffers.
    pub fn observe(&mut self, samples: &[f32]) {
        if self.recording {
            self.chunks.push(samples.to_vec());
        }
    }

    /// Renders the accumulated chunks into a WAV file. Consuming: the buffer
    /// is cleared and the recording flag reset, so a second call returns
    /// `None` until a new pass accumulates audio. Usable after recording has
    /// stopped.
    pub fn take_wav(&mut self) -> Option<Vec<u8>> {
        self.recording = false;
        if self.chunks.is_empty() {
            return None;
        }
        let chunks = std::mem::take(&mut self.chunks);
        match wav::render_wav_pcm16(PLAYBACK_SAMPLE_RATE, &chunks) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("failed to render recording: {:?}", e);
                None
            }
        }
    }

    /// Teardown path: drop everything without rendering.
    pub fn clear(&mut self) {
        self.recording = false;
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_recorder_ignores_buffers() {
        let mut recorder = SessionRecorder::new();
        recorder.observe(&[0.1; 100]);
        assert!(recorder.take_wav().is_none());
    }

    #[test]
    fn wav_length_matches_accumulated_chunks() {
        let mut recorder = SessionRecorder::new();
        assert!(recorder.toggle());
        recorder.observe(&[0.1; 100]);
        recorder.observe(&[0.2; 200]);
        recorder.observe(&[0.3; 300]);

        let bytes = recorder.take_wav().unwrap();
        assert_eq!(bytes.len(), 44 + 2 * (100 + 200 + 300));
    }

    #[test]
    fn extraction_is_consuming() {
        let mut recorder = SessionRecorder::new();
        recorder.toggle();
        recorder.observe(&[0.1; 50]);

        assert!(recorder.take_wav().is_some());
        assert!(recorder.take_wav().is_none());
        assert!(!recorder.is_recording());
    }

    #[test]
    fn extraction_works_after_recording_stopped() {
        let mut recorder = SessionRecorder::new();
        recorder.toggle();
        recorder.observe(&[0.1; 50]);
        assert!(!recorder.toggle());

        assert!(recorder.take_wav().is_some());
    }

    #[test]
    fn restarting_recording_discards_previous_pass() {
        let mut recorder = SessionRecorder::new();
        recorder.toggle();
        recorder.observe(&[0.1; 50]);
        recorder.toggle();
        recorder.toggle();

        assert!(recorder.take_wav().is_none());
    }
}
