use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Renders accumulated f32 sample chunks into a mono 16-bit PCM WAV file.
///
/// The output is the standard 44-byte RIFF/WAVE header followed by the raw
/// samples, so the byte length is always `44 + 2 * total_samples`.
pub fn render_wav_pcm16(sample_rate: u32, chunks: &[Vec<f32>]) -> anyhow::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for chunk in chunks {
        for &sample in chunk {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer.write_sample(v)?;
        }
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}
