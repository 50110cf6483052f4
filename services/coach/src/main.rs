use clap::Parser;
use coach_core::capture::MicGate;
use coach_core::coach::GroqClient;
use coach_core::lifecycle::{SessionFinisher, SummaryError, SummaryGate};
use coach_core::mode::CoachingMode;
use coach_core::session::{SessionController, SessionEvent};
use coach_core::speech::SpeechGate;
use coach_core::store::{CoachStore, ConvexStore};
use coach_core::{Command, SessionTuning};
use rubato::Resampler;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

mod audio;
mod config;
mod device;
mod synth;

use config::{Config, INPUT_CHUNK_SIZE, TRANSCRIBE_CHUNK_MS, TRANSCRIBE_SAMPLE_RATE};
use synth::AuraSynth;

#[derive(Debug, Parser)]
#[command(name = "coach", version, about = "Real-time AI voice coaching sessions")]
struct Args {
    /// Topic of the coaching session.
    #[arg(long, required_unless_present_any = ["list_devices", "room_id", "history"])]
    topic: Option<String>,

    /// Coaching mode, e.g. "Topic Base Lecture" or "Mockup Interview".
    #[arg(long, default_value = "Topic Base Lecture")]
    mode: String,

    /// Expert persona to speak as.
    #[arg(long, default_value = "Joanna")]
    expert: String,

    /// Store id of the user whose credits this session draws on.
    #[arg(long)]
    user_id: Option<String>,

    /// Look the user up by name and email instead of id, creating them on
    /// first use. Requires --user-email.
    #[arg(long, requires = "user_email")]
    user_name: Option<String>,

    #[arg(long, requires = "user_name")]
    user_email: Option<String>,

    /// Resume an existing room; topic, mode, and expert come from the record.
    #[arg(long)]
    room_id: Option<String>,

    /// List the user's past sessions and exit.
    #[arg(long)]
    history: bool,

    /// Capture device name; host default when omitted.
    #[arg(long)]
    input_device: Option<String>,

    /// Playback device name; host default when omitted.
    #[arg(long)]
    output_device: Option<String>,

    /// List audio devices and exit.
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list_devices {
        println!("input devices:\n{}", device::list_inputs()?);
        println!("output devices:\n{}", device::list_outputs()?);
        return Ok(());
    }

    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // Store bootstrap. Without a store URL the session still runs, it just
    // keeps nothing and charges nobody.
    let store = config.convex_url.clone().map(ConvexStore::new);

    let mut user = None;
    if let Some(store) = &store {
        let user_id = match (&args.user_id, &args.user_name, &args.user_email) {
            (Some(uid), _, _) => Some(uid.clone()),
            // Idempotent by email: returns the existing id on repeat runs.
            (None, Some(name), Some(email)) => match store.create_user(name, email).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!("failed to create user: {e}");
                    None
                }
            },
            _ => None,
        };
        if let Some(uid) = user_id {
            match store.get_user_by_id(&uid).await {
                Ok(record) => {
                    tracing::info!("user {}: {} credits", record.name, record.credits);
                    if record.credits == 0 {
                        tracing::warn!("credit balance exhausted");
                    }
                    user = Some(record);
                }
                Err(e) => tracing::warn!("failed to load user {uid}: {e}"),
            }
        }
    }

    if args.history {
        let (Some(store), Some(user)) = (&store, &user) else {
            anyhow::bail!("--history needs CONVEX_URL and a resolvable user");
        };
        for room in store.list_rooms_for_user(&user.id).await? {
            let summarized = if room.summary.is_some() { ", summarized" } else { "" };
            println!(
                "{}  {} [{}] with {} ({} turns{summarized})",
                room.id,
                room.topic,
                room.mode,
                room.expert_name,
                room.conversation.len(),
            );
        }
        return Ok(());
    }

    // Session parameters: either a resumed room record or the CLI flags.
    let (topic, mode, expert, mut room_id) = match (&store, &args.room_id) {
        (Some(store), Some(id)) => {
            let room = store.get_room(id).await?;
            tracing::info!("resuming room {id}: {} [{}]", room.topic, room.mode);
            (room.topic, room.mode, room.expert_name, Some(id.clone()))
        }
        (None, Some(_)) => anyhow::bail!("--room-id needs CONVEX_URL"),
        _ => {
            let topic = args
                .topic
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--topic is required"))?;
            let mode: CoachingMode =
                args.mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            (topic, mode, args.expert.clone(), None)
        }
    };
    tracing::info!("session: mode={mode}, topic={topic:?}, expert={expert}");

    if room_id.is_none() {
        if let (Some(store), Some(user)) = (&store, &user) {
            match store.create_room(&topic, mode, &expert, &user.id).await {
                Ok(id) => {
                    tracing::info!("room created: {id}");
                    room_id = Some(id);
                }
                Err(e) => tracing::warn!("failed to create room: {e}"),
            }
        }
    }

    // Audio pipeline: gated capture in, ring-buffered playback out.
    let mic = Arc::new(MicGate::new());
    let (mut capture, mut input_rx) = audio::open_input(args.input_device, mic.clone())?;
    let input_sample_rate = capture.sample_rate;

    let (_output_stream, output_sink) = audio::open_output(args.output_device)?;
    let synth = AuraSynth::new(config.deepgram_api_key.clone(), output_sink)?;
    let speech = SpeechGate::new(synth, mic.clone());

    // Transcription stream.
    let dg_config = deepgram_realtime::Config::builder()
        .with_api_key(&config.deepgram_api_key)
        .with_sample_rate(TRANSCRIBE_SAMPLE_RATE)
        .build();
    let mut transcriber = deepgram_realtime::connect_with_config(1024, dg_config).await?;
    let mut transcripts = transcriber.server_events()?;

    // Pump: microphone chunks, resampled and PCM16-encoded, into the stream.
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let mut in_resampler = audio::create_resampler(
        input_sample_rate,
        TRANSCRIBE_SAMPLE_RATE as f64,
        INPUT_CHUNK_SIZE,
    )?;
    let pump = tokio::spawn(async move {
        let mut buffer: VecDeque<f32> = VecDeque::with_capacity(INPUT_CHUNK_SIZE * 2);
        let frame_size = TRANSCRIBE_SAMPLE_RATE as usize * TRANSCRIBE_CHUNK_MS / 1000;
        let mut batcher = audio::FrameBatcher::new(frame_size);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                chunk = input_rx.recv() => {
                    let Some(chunk) = chunk else { break };
                    buffer.extend(chunk);
                    while buffer.len() >= INPUT_CHUNK_SIZE {
                        let audio_chunk: Vec<f32> = buffer.drain(..INPUT_CHUNK_SIZE).collect();
                        if let Ok(out) = in_resampler.process(&[audio_chunk.as_slice()], None) {
                            if let Some(out) = out.first() {
                                batcher.push(out);
                            }
                        }
                    }
                    while let Some(frame) = batcher.next_frame() {
                        if let Err(e) = transcriber.send_audio(audio::encode_pcm16(&frame)).await {
                            tracing::error!("failed to send audio: {e}");
                        }
                    }
                }
            }
        }
        let tail = batcher.drain_remainder();
        if !tail.is_empty() {
            if let Err(e) = transcriber.send_audio(audio::encode_pcm16(&tail)).await {
                tracing::error!("failed to send audio: {e}");
            }
        }
        transcriber.disconnect().await;
    });

    // Bridge: transcript events plus the resettable silence timer, feeding
    // the one ordered event channel the controller consumes.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<SessionEvent>(256);
    let tuning = SessionTuning::default();
    let bridge = {
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            let mut deadline: Option<tokio::time::Instant> = None;
            loop {
                tokio::select! {
                    event = transcripts.recv() => {
                        use deepgram_realtime::types::ServerEvent;
                        use tokio::sync::broadcast::error::RecvError;
                        match event {
                            Ok(ServerEvent::Transcript { text, is_final }) => {
                                deadline =
                                    Some(tokio::time::Instant::now() + tuning.silence_timeout);
                                let event = if is_final {
                                    SessionEvent::TranscriptFinal(text)
                                } else {
                                    SessionEvent::TranscriptInterim(text)
                                };
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ServerEvent::Closed { reason }) => {
                                tracing::info!("transcription stream closed: {reason:?}");
                                break;
                            }
                            Err(RecvError::Lagged(n)) => {
                                tracing::warn!("transcript events lagged by {n}");
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                    _ = async {
                        match deadline {
                            Some(d) => tokio::time::sleep_until(d).await,
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        deadline = None;
                        if event_tx.send(SessionEvent::SilenceElapsed).await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    };

    // Dialogue loop. One turn at a time: the controller emits Speak
    // commands, playback completion feeds back in as SpeakingDone.
    let coach = GroqClient::new(config.groq_api_key.clone(), config.chat_model.clone());
    let mut controller = SessionController::new(mode, topic.clone(), expert);
    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::channel::<Command>(16);

    controller.send_greeting(&cmd_tx).await;

    loop {
        tokio::select! {
            Some(command) = cmd_rx.recv() => match command {
                Command::Speak(text) => {
                    let expert = controller.expert().to_string();
                    if let Err(e) = speech.speak(&text, &expert).await {
                        tracing::error!("playback failed: {e}");
                    }
                    controller
                        .handle_event(SessionEvent::SpeakingDone, &coach, &cmd_tx)
                        .await;
                }
            },
            Some(event) = event_rx.recv() => {
                if let SessionEvent::TranscriptInterim(_) = &event {
                    let (caption, _) = controller.live_caption();
                    tracing::debug!("caption: {caption}");
                }
                controller.handle_event(event, &coach, &cmd_tx).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl-C, shutting down");
                break;
            }
        }
    }

    // Teardown order: silence the output, stop feeding the transcriber,
    // cancel the silence timer, release the device, then persist and settle.
    speech.stop();
    let _ = shutdown_tx.send(true);
    let _ = pump.await;
    bridge.abort();
    capture.release();

    let finisher = SessionFinisher::new(controller.stop_handle());
    match (&store, &room_id) {
        (Some(store), Some(room_id)) => {
            let report = finisher
                .finish(
                    store,
                    room_id,
                    controller.transcript(),
                    controller.usage_total(),
                    user.as_mut(),
                )
                .await;
            tracing::info!(
                "session ended: saved={}, credits used={}, balance={:?}",
                report.transcript_saved,
                report.credits_used,
                report.new_balance
            );

            let gate = SummaryGate::new(controller.stop_handle());
            match gate
                .generate(
                    &coach,
                    store,
                    room_id,
                    controller.mode(),
                    &topic,
                    controller.transcript(),
                )
                .await
            {
                Ok(summary) => println!("\n{summary}"),
                Err(SummaryError::NothingToSummarize) => {
                    tracing::debug!("no exchanges beyond the greeting, skipping summary")
                }
                Err(e) => tracing::warn!("summary generation failed: {e}"),
            }
        }
        _ => {
            finisher.mark_stopped();
            tracing::info!(
                "session ended: {} turns, {} credits used (not persisted)",
                controller.transcript().len(),
                controller.usage_total()
            );
        }
    }

    Ok(())
}
