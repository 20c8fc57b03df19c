/// Wire-level counters for a single connection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    media_frames_sent: u64,
    audio_chunks_received: u64,
    turns_completed: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self {
            media_frames_sent: 0,
            audio_chunks_received: 0,
            turns_completed: 0,
        }
    }

    pub(crate) fn record_media_sent(&mut self, frames: u64) {
        self.media_frames_sent += frames;
    }

    pub(crate) fn record_audio_received(&mut self, chunks: u64) {
        self.audio_chunks_received += chunks;
    }

    pub(crate) fn record_turn_completed(&mut self) {
        self.turns_completed += 1;
    }

    pub fn media_frames_sent(&self) -> u64 {
        self.media_frames_sent
    }

    pub fn audio_chunks_received(&self) -> u64 {
        self.audio_chunks_received
    }

    pub fn turns_completed(&self) -> u64 {
        self.turns_completed
    }
}
