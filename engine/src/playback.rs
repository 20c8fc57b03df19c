//! Gapless playback scheduling for model speech audio.
//!
//! Decoded chunks arrive sequentially but their arrival times drift against
//! the output clock. Each chunk is scheduled to begin exactly where the
//! previous one ends, or immediately if the timeline has fallen behind the
//! clock, so playback never overlaps and never gaps beyond decode latency.

/// Sample rate contract for model speech audio.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

pub type SourceId = u64;

/// The output side of the audio stack, as the scheduler sees it.
pub trait AudioOut: Send {
    /// Current time in seconds on the output clock.
    fn now(&self) -> f64;

    /// Begins playing `samples` at `when` seconds on the output clock.
    fn start_at(&mut self, samples: Vec<f32>, when: f64) -> SourceId;

    /// Forcibly halts a source previously returned by `start_at`.
    fn stop(&mut self, id: SourceId);
}

pub struct PlaybackScheduler<O: AudioOut> {
    out: O,
    /// Earliest time newly decoded audio may begin. Monotonically
    /// non-decreasing; reset only by full session teardown.
    cursor: f64,
    /// In-flight sources as (id, end time) pairs.
    active: Vec<(SourceId, f64)>,
}

impl<O: AudioOut> PlaybackScheduler<O> {
    pub fn new(out: O) -> Self {
        Self {
            out,
            cursor: 0.0,
            active: Vec::new(),
        }
    }

    /// Schedules a decoded buffer to play right after everything already
    /// scheduled. Returns the start time it was given.
    pub fn schedule_next(&mut self, samples: Vec<f32>) -> f64 {
        if samples.is_empty() {
            return self.cursor;
        }
        let now = self.out.now();
        self.active.retain(|&(_, end)| end > now);

        let start = now.max(self.cursor);
        let duration = samples.len() as f64 / PLAYBACK_SAMPLE_RATE as f64;
        let id = self.out.start_at(samples, start);
        self.cursor = start + duration;
        self.active.push((id, self.cursor));
        start
    }

    /// Halts every in-flight source and resets the timeline. Teardown only.
    pub fn stop_all(&mut self) {
        for (id, _) in self.active.drain(..) {
            self.out.stop(id);
        }
        self.cursor = 0.0;
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
