mod audio_out;
mod config;
mod room_file;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Split};
use rubato::Resampler;
use studyhall_engine::capture::CAPTURE_FRAME_SAMPLES;
use studyhall_engine::transport::WsConnector;
use studyhall_engine::{RoomSession, RoomSettings, SessionStatus, UiEvent};
use studyhall_live_utils::{audio, device};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::audio_out::RingOut;
use crate::config::{Config, INPUT_CHUNK_SIZE, OUTPUT_CHUNK_SIZE, OUTPUT_LATENCY_MS};

#[derive(Parser)]
struct Cli {
    /// Path to the room definition JSON (tutor roster and study material)
    room: PathBuf,
    /// Override the prebuilt voice name
    #[arg(long)]
    voice: Option<String>,
    /// Use a casual conversational register
    #[arg(long)]
    casual: bool,
    /// Input device name; defaults to the system default microphone
    #[arg(long)]
    input_device: Option<String>,
    /// Output device name; defaults to the system default speakers
    #[arg(long)]
    output_device: Option<String>,
    /// Directory where transcripts and recordings are written
    #[arg(long, default_value = "sessions")]
    out_dir: PathBuf,
}

/// Maps one console line to a UI event. `None` means "print the help line".
fn parse_command(line: &str) -> Option<UiEvent> {
    let mut words = line.split_whitespace();
    match words.next()? {
        "mute" => Some(UiEvent::ToggleMute),
        "record" => Some(UiEvent::ToggleRecording),
        "continue" | "c" => Some(UiEvent::ContinueNudge),
        "dialogue" => {
            let first = words.next()?.to_string();
            let second = words.next()?.to_string();
            Some(UiEvent::EnterDialogue(first, second))
        }
        "regroup" => Some(UiEvent::ExitDialogue),
        "hand" => Some(UiEvent::RaiseHand),
        "lower" => Some(UiEvent::LowerHand),
        "say" => {
            let rest = line.trim_start().strip_prefix("say")?.trim();
            if rest.is_empty() {
                None
            } else {
                Some(UiEvent::SendText(rest.to_string()))
            }
        }
        "end" | "quit" => Some(UiEvent::End),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();
    let room = room_file::load_room(&args.room)?;
    tracing::info!(
        "Loaded room: {} tutors, material \"{}\"",
        room.tutors.len(),
        room.material.name
    );

    // Raw device frames land here before resampling.
    let (mic_raw_tx, mut mic_raw_rx) = tokio::sync::mpsc::channel::<Vec<f32>>(1024);
    // 16kHz frames of CAPTURE_FRAME_SAMPLES for the session.
    let (mic_tx, mic_rx) = tokio::sync::mpsc::channel::<Vec<f32>>(64);
    let (ui_tx, ui_rx) = tokio::sync::mpsc::channel::<UiEvent>(32);

    // --- Input device ---
    let input = device::get_or_default_input(args.input_device.clone())
        .context("Failed to get audio input device")?;
    tracing::info!("Using input device: {:?}", input.name()?);

    let input_config = input
        .default_input_config()
        .context("Failed to get default input config")?;
    let input_config = StreamConfig {
        channels: input_config.channels(),
        sample_rate: input_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let input_channel_count = input_config.channels as usize;
    let input_sample_rate = input_config.sample_rate.0 as f64;
    tracing::info!("Input stream config: {:?}", &input_config);

    // Mixes down to mono and hands the frame off the audio thread.
    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        let frame = if input_channel_count > 1 {
            data.chunks(input_channel_count)
                .map(|c| c.iter().sum::<f32>() / input_channel_count as f32)
                .collect::<Vec<f32>>()
        } else {
            data.to_vec()
        };
        if let Err(e) = mic_raw_tx.try_send(frame) {
            tracing::warn!("Failed to send audio data to buffer: {:?}", e);
        }
    };
    let input_stream = input.build_input_stream(
        &input_config,
        input_data_fn,
        move |err| tracing::error!("An error occurred on input stream: {}", err),
        None,
    )?;
    input_stream.play()?;

    // --- Output device ---
    let output = device::get_or_default_output(args.output_device.clone())
        .context("Failed to get audio output device")?;
    tracing::info!("Using output device: {:?}", output.name()?);

    let output_config = output
        .default_output_config()
        .context("Failed to get default output config")?;
    let output_config = StreamConfig {
        channels: output_config.channels(),
        sample_rate: output_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let output_channel_count = output_config.channels as usize;
    let output_sample_rate = output_config.sample_rate.0 as f64;
    tracing::info!("Output stream config: {:?}", &output_config);

    let buffer_capacity = output_sample_rate as usize * OUTPUT_LATENCY_MS / 1000;
    let (audio_out_tx, mut audio_out_rx) = audio::shared_buffer(buffer_capacity).split();
    let played = Arc::new(AtomicU64::new(0));
    let halt = Arc::new(AtomicBool::new(false));

    let played_cb = played.clone();
    let halt_cb = halt.clone();
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        if halt_cb.swap(false, Ordering::AcqRel) {
            while audio_out_rx.try_pop().is_some() {}
        }
        let mut sample_index = 0;
        while sample_index < data.len() {
            let sample = audio_out_rx.try_pop().unwrap_or(0.0);
            data[sample_index] = sample;
            sample_index += 1;
            if output_channel_count > 1 && sample_index < data.len() {
                data[sample_index] = sample;
                sample_index += 1;
            }
            sample_index += output_channel_count.saturating_sub(2);
        }
        played_cb.fetch_add((data.len() / output_channel_count) as u64, Ordering::Relaxed);
    };
    let output_stream = output.build_output_stream(
        &output_config,
        output_data_fn,
        move |err| tracing::error!("An error occurred on output stream: {}", err),
        None,
    )?;
    output_stream.play()?;

    let ring_out = RingOut::new(audio_out_tx, output_sample_rate, played, halt)
        .context("Failed to create playback bridge")?;

    // --- Session ---
    let voice = args.voice.unwrap_or(config.voice);
    let mut settings = RoomSettings::new(room.tutors, room.material, voice);
    settings.casual = args.casual;
    let mut session = RoomSession::new(settings, ring_out);

    // Resamples raw device frames to 16kHz and regroups them into the fixed
    // capture frame size before they reach the session.
    let mut in_resampler = audio::create_resampler(
        input_sample_rate,
        audio::CAPTURE_SAMPLE_RATE,
        INPUT_CHUNK_SIZE,
    )?;
    tokio::spawn(async move {
        let mut pending: VecDeque<f32> = VecDeque::with_capacity(INPUT_CHUNK_SIZE * 2);
        let mut frame: Vec<f32> = Vec::with_capacity(CAPTURE_FRAME_SAMPLES);
        while let Some(raw) = mic_raw_rx.recv().await {
            pending.extend(raw);
            while pending.len() >= INPUT_CHUNK_SIZE {
                let chunk: Vec<f32> = pending.drain(..INPUT_CHUNK_SIZE).collect();
                if let Ok(resampled) = in_resampler.process(&[chunk.as_slice()], None) {
                    if let Some(resampled) = resampled.first() {
                        frame.extend(resampled.iter().copied());
                    }
                }
            }
            while frame.len() >= CAPTURE_FRAME_SAMPLES {
                let ready: Vec<f32> = frame.drain(..CAPTURE_FRAME_SAMPLES).collect();
                if mic_tx.send(ready).await.is_err() {
                    return;
                }
            }
        }
    });

    // Console command surface.
    let ui_tx_stdin = ui_tx.clone();
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(event) => {
                    let end = matches!(event, UiEvent::End);
                    if ui_tx_stdin.send(event).await.is_err() || end {
                        break;
                    }
                }
                None => tracing::info!(
                    "commands: mute | record | continue | dialogue <a> <b> | regroup | hand | lower | say <text> | end"
                ),
            }
        }
    });

    let ui_tx_signal = ui_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, shutting down...");
            let _ = ui_tx_signal.send(UiEvent::End).await;
        }
    });

    let connector = WsConnector::new(studyhall_live::Config::default());
    session.start_session(&connector).await;
    if session.status() == SessionStatus::Error {
        anyhow::bail!("Failed to start session: {:?}", session.error());
    }

    // Sessions come up muted; the console session opens the mic right away.
    session.toggle_mute();
    tracing::info!("Session live. Type 'end' to finish, anything else for help.");

    let summary = session.run(mic_rx, ui_rx).await;

    // --- Persist the session ---
    tracing::info!("Session over after {}s", summary.elapsed_secs);
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output directory {:?}", args.out_dir))?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");

    if summary.transcript.is_empty() {
        tracing::info!("No transcript to save");
    } else {
        let path = args.out_dir.join(format!("session-{}.txt", stamp));
        std::fs::write(&path, &summary.transcript)
            .with_context(|| format!("Failed to write transcript {:?}", path))?;
        tracing::info!("Transcript saved to {:?}", path);
    }

    if let Some(wav) = summary.recording {
        let path = args.out_dir.join(format!("session-{}.wav", stamp));
        std::fs::write(&path, &wav)
            .with_context(|| format!("Failed to write recording {:?}", path))?;
        tracing::info!("Recording saved to {:?}", path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_ui_events() {
        assert!(matches!(parse_command("mute"), Some(UiEvent::ToggleMute)));
        assert!(matches!(parse_command("c"), Some(UiEvent::ContinueNudge)));
        assert!(matches!(parse_command("hand"), Some(UiEvent::RaiseHand)));
        assert!(matches!(parse_command("end"), Some(UiEvent::End)));
        assert!(matches!(parse_command("quit"), Some(UiEvent::End)));
    }

    #[test]
    fn dialogue_needs_two_names() {
        match parse_command("dialogue Clara Rex") {
            Some(UiEvent::EnterDialogue(a, b)) => {
                assert_eq!(a, "Clara");
                assert_eq!(b, "Rex");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
        assert!(parse_command("dialogue Clara").is_none());
    }

    #[test]
    fn say_carries_the_rest_of_the_line() {
        match parse_command("say can we slow down?") {
            Some(UiEvent::SendText(text)) => assert_eq!(text, "can we slow down?"),
            other => panic!("unexpected parse: {:?}", other),
        }
        assert!(parse_command("say").is_none());
    }

    #[test]
    fn unknown_input_asks_for_help() {
        assert!(parse_command("dance").is_none());
        assert!(parse_command("").is_none());
    }
}
