use crate::audio::{self, OutputSink};
use anyhow::Result;
use async_trait::async_trait;
use coach_core::speech::{SpeechRequest, SpeechSynth, VoiceInfo};
use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use rubato::{FastFixedIn, Resampler};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const AURA_SPEAK_URL: &str = "https://api.deepgram.com/v1/speak";

/// Sample rate requested from the synthesis endpoint, in Hz.
const SYNTH_SAMPLE_RATE: f64 = 24_000.0;
const RESAMPLE_CHUNK_SIZE: usize = 1024;

const DEFAULT_FEMALE_VOICE: &str = "aura-asteria-en";
const DEFAULT_MALE_VOICE: &str = "aura-orion-en";

/// Persona profiles carry host-engine voice names that an HTTP synthesis
/// backend does not know. An explicit engine voice wins; otherwise the pitch
/// hint picks the register of the default voice, since the engine has no
/// pitch control of its own.
fn model_for(voice: Option<&str>, pitch: f32) -> String {
    match voice {
        Some(v) if v.starts_with("aura-") => v.to_string(),
        _ if pitch < 1.0 => DEFAULT_MALE_VOICE.to_string(),
        _ => DEFAULT_FEMALE_VOICE.to_string(),
    }
}

struct PlaybackState {
    producer: HeapProd<f32>,
    resampler: FastFixedIn<f32>,
}

/// Text-to-speech over the Aura REST endpoint, played through the shared
/// output ring buffer.
///
/// `speak` resolves once the synthesized audio has had time to drain out of
/// the playback device; `cancel` invalidates the in-flight generation and
/// flushes whatever is still buffered.
pub struct AuraSynth {
    client: reqwest::Client,
    api_key: String,
    state: Mutex<PlaybackState>,
    flush: Arc<AtomicBool>,
    generation: AtomicU64,
    device_rate: f64,
}

impl AuraSynth {
    pub fn new(api_key: String, sink: OutputSink) -> Result<Self> {
        let resampler =
            audio::create_resampler(SYNTH_SAMPLE_RATE, sink.sample_rate, RESAMPLE_CHUNK_SIZE)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            state: Mutex::new(PlaybackState {
                producer: sink.producer,
                resampler,
            }),
            flush: sink.flush,
            generation: AtomicU64::new(0),
            device_rate: sink.sample_rate,
        })
    }

    async fn synthesize(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{AURA_SPEAK_URL}?model={model}&encoding=linear16&sample_rate={}",
            SYNTH_SAMPLE_RATE as u32
        );
        let resp = self
            .client
            .post(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.api_key),
            )
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("speech synthesis failed: {status}: {detail}"));
        }

        let bytes = resp.bytes().await?;
        Ok(audio::decode_pcm16(&bytes))
    }
}

#[async_trait]
impl SpeechSynth for AuraSynth {
    fn voices(&self) -> Vec<VoiceInfo> {
        // The fixed Aura catalogue; no host enumeration involved.
        [
            ("aura-asteria-en", "en-US"),
            ("aura-luna-en", "en-US"),
            ("aura-stella-en", "en-US"),
            ("aura-athena-en", "en-GB"),
            ("aura-hera-en", "en-US"),
            ("aura-orion-en", "en-US"),
            ("aura-arcas-en", "en-US"),
            ("aura-perseus-en", "en-US"),
            ("aura-angus-en", "en-IE"),
            ("aura-orpheus-en", "en-US"),
            ("aura-helios-en", "en-GB"),
            ("aura-zeus-en", "en-US"),
        ]
        .iter()
        .map(|(name, lang)| VoiceInfo {
            name: name.to_string(),
            lang: lang.to_string(),
        })
        .collect()
    }

    async fn speak(&self, request: SpeechRequest) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.flush.store(false, Ordering::SeqCst);

        let model = model_for(request.voice.as_deref(), request.pitch);
        let samples = self.synthesize(&request.text, &model).await?;
        if samples.is_empty() {
            return Ok(());
        }

        let volume = request.volume.clamp(0.0, 1.0);
        let started = Instant::now();
        let mut pushed: u64 = 0;

        let mut state = self.state.lock().await;
        let chunk_size = state.resampler.input_frames_next();
        for chunk in audio::split_for_chunks(&samples, chunk_size) {
            let resampled = state.resampler.process(&[chunk.as_slice()], None)?;
            let Some(resampled) = resampled.first() else {
                continue;
            };
            for &sample in resampled.iter() {
                loop {
                    if self.generation.load(Ordering::SeqCst) != generation {
                        return Ok(());
                    }
                    match state.producer.try_push(sample * volume) {
                        Ok(()) => break,
                        // Ring full; wait for the output callback to drain.
                        Err(_) => tokio::time::sleep(Duration::from_millis(5)).await,
                    }
                }
                pushed += 1;
            }
        }
        drop(state);

        // Everything is buffered; wait out the playback time that remains.
        let total = Duration::from_secs_f64(pushed as f64 / self.device_rate);
        while started.elapsed() < total {
            if self.generation.load(Ordering::SeqCst) != generation {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        Ok(())
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.flush.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_engine_voice_wins() {
        assert_eq!(model_for(Some("aura-zeus-en"), 1.1), "aura-zeus-en");
    }

    #[test]
    fn pitch_hint_picks_the_default_register() {
        // Host-engine voice names mean nothing here and fall through.
        assert_eq!(model_for(Some("Samantha"), 1.1), DEFAULT_FEMALE_VOICE);
        assert_eq!(model_for(Some("Alex"), 0.9), DEFAULT_MALE_VOICE);
        assert_eq!(model_for(None, 1.0), DEFAULT_FEMALE_VOICE);
        assert_eq!(model_for(None, 0.9), DEFAULT_MALE_VOICE);
    }
}
