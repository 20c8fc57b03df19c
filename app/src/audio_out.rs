//! Bridges the playback scheduler onto a cpal output stream.
//!
//! The scheduler hands buffers in timeline order; a ring buffer preserves
//! that order and the device callback provides the actual timing. The
//! callback side increments a shared sample counter, which is the output
//! clock the scheduler reads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use rubato::Resampler;
use studyhall_engine::playback::{AudioOut, SourceId};
use studyhall_live_utils::audio;

use crate::config::OUTPUT_CHUNK_SIZE;

pub struct RingOut {
    producer: HeapProd<f32>,
    resampler: rubato::FastFixedIn<f32>,
    played: Arc<AtomicU64>,
    halt: Arc<AtomicBool>,
    device_sample_rate: f64,
    next_id: SourceId,
}

impl RingOut {
    pub fn new(
        producer: HeapProd<f32>,
        device_sample_rate: f64,
        played: Arc<AtomicU64>,
        halt: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let resampler = audio::create_resampler(
            audio::PLAYBACK_SAMPLE_RATE,
            device_sample_rate,
            OUTPUT_CHUNK_SIZE,
        )?;
        Ok(Self {
            producer,
            resampler,
            played,
            halt,
            device_sample_rate,
            next_id: 0,
        })
    }
}

impl AudioOut for RingOut {
    fn now(&self) -> f64 {
        self.played.load(Ordering::Relaxed) as f64 / self.device_sample_rate
    }

    fn start_at(&mut self, samples: Vec<f32>, _when: f64) -> SourceId {
        for chunk in audio::split_for_chunks(&samples, self.resampler.input_frames_next()) {
            if let Ok(resampled) = self.resampler.process(&[chunk.as_slice()], None) {
                if let Some(resampled) = resampled.first() {
                    for sample in resampled {
                        if self.producer.try_push(*sample).is_err() {
                            tracing::warn!("output buffer full, dropping playback samples");
                            break;
                        }
                    }
                }
            }
        }
        self.next_id += 1;
        self.next_id
    }

    fn stop(&mut self, _id: SourceId) {
        // One flag serves every source: stop only happens at teardown and
        // the device callback drains whatever is still queued.
        self.halt.store(true, Ordering::Release);
    }
}
