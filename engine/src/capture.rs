//! Microphone capture tap: per-frame energy metering, wire encoding and
//! forwarding, with a mute that disconnects the tap instead of gating it.

use studyhall_live_types::Blob;
use studyhall_live_utils::audio;
use tokio::sync::{mpsc, watch};

/// Sample rate contract for captured audio.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
/// Fixed frame size tapped from the capture stream.
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

/// Tap between raw capture frames and the transport.
///
/// While muted the forwarding sender is physically taken out of the pipeline,
/// so no energy metering, encoding or forwarding runs at all; a frame arriving
/// while muted dies at the first line of `ingest_frame`. Sessions start muted.
pub struct CapturePipeline {
    wired: Option<mpsc::Sender<Blob>>,
    parked: Option<mpsc::Sender<Blob>>,
    level_tx: watch::Sender<f32>,
}

impl CapturePipeline {
    /// Builds the tap in the muted state. Returns the pipeline and a watch
    /// receiver publishing per-frame RMS for the speaking indicator.
    pub fn new(frames: mpsc::Sender<Blob>) -> (Self, watch::Receiver<f32>) {
        let (level_tx, level_rx) = watch::channel(0.0);
        (
            Self {
                wired: None,
                parked: Some(frames),
                level_tx,
            },
            level_rx,
        )
    }

    pub fn is_muted(&self) -> bool {
        self.wired.is_none()
    }

    /// Disconnects the tap. Idempotent.
    pub fn mute(&mut self) {
        if let Some(tx) = self.wired.take() {
            self.parked = Some(tx);
        }
    }

    /// Reconnects the tap; forwarding resumes from the next frame boundary.
    /// Idempotent.
    pub fn unmute(&mut self) {
        if let Some(tx) = self.parked.take() {
            self.wired = Some(tx);
        }
    }

    /// Called for every raw capture frame. Must stay O(frame size): RMS and
    /// encode only, no blocking.
    pub fn ingest_frame(&mut self, frame: &[f32]) {
        let Some(tx) = self.wired.as_ref() else {
            return;
        };
        self.level_tx.send_replace(audio::rms(frame));
        let chunk = Blob::audio_input(audio::encode(frame));
        if let Err(e) = tx.try_send(chunk) {
            tracing::warn!("failed to forward capture frame: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> (CapturePipeline, mpsc::Receiver<Blob>, watch::Receiver<f32>) {
        let (tx, rx) = mpsc::channel(64);
        let (pipeline, level_rx) = CapturePipeline::new(tx);
        (pipeline, rx, level_rx)
    }

    #[test]
    fn starts_muted_and_drops_frames() {
        let (mut pipeline, mut rx, level_rx) = pipeline();
        assert!(pipeline.is_muted());
        for _ in 0..10 {
            pipeline.ingest_frame(&[0.5; 128]);
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(*level_rx.borrow(), 0.0);
    }

    #[test]
    fn unmute_resumes_forwarding_from_next_frame() {
        let (mut pipeline, mut rx, _level) = pipeline();
        pipeline.ingest_frame(&[0.5; 128]);
        pipeline.unmute();
        pipeline.ingest_frame(&[0.5; 128]);
        pipeline.ingest_frame(&[0.5; 128]);

        let mut forwarded = 0;
        while rx.try_recv().is_ok() {
            forwarded += 1;
        }
        assert_eq!(forwarded, 2);
    }

    #[test]
    fn mute_after_unmute_stops_forwarding_again() {
        let (mut pipeline, mut rx, _level) = pipeline();
        pipeline.unmute();
        pipeline.ingest_frame(&[0.1; 64]);
        pipeline.mute();
        for _ in 0..10 {
            pipeline.ingest_frame(&[0.1; 64]);
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn mute_and_unmute_are_idempotent() {
        let (mut pipeline, mut rx, _level) = pipeline();
        pipeline.mute();
        pipeline.mute();
        pipeline.unmute();
        pipeline.unmute();
        assert!(!pipeline.is_muted());
        pipeline.ingest_frame(&[0.2; 64]);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn frames_carry_the_input_mime_and_level_updates() {
        let (mut pipeline, mut rx, level_rx) = pipeline();
        pipeline.unmute();
        pipeline.ingest_frame(&[0.5; 256]);

        let blob = rx.try_recv().unwrap();
        assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
        assert!(!blob.data.is_empty());
        assert!((*level_rx.borrow() - 0.5).abs() < 1e-3);
    }
}
