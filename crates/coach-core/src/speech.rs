use crate::capture::MicGate;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use std::time::Duration;

/// A voice offered by the synthesis engine.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceInfo {
    pub name: String,
    pub lang: String,
}

/// One playback request handed to the synthesis engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Per-persona voice preferences. Which of the preferred names exists varies
/// by host, so this is an ordered fallback policy rather than a guarantee.
#[derive(Debug)]
pub struct VoiceProfile {
    pub preferred: &'static [&'static str],
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

static JOANNA: VoiceProfile = VoiceProfile {
    preferred: &["Samantha", "Victoria", "Karen", "Moira", "Fiona", "Veena"],
    rate: 0.95,
    pitch: 1.1,
    volume: 1.0,
};

static SALLIE: VoiceProfile = VoiceProfile {
    preferred: &["Samantha", "Victoria", "Karen", "Moira", "Veena"],
    rate: 0.9,
    pitch: 1.05,
    volume: 1.0,
};

static MATTHEW: VoiceProfile = VoiceProfile {
    preferred: &["Alex", "Daniel", "Thomas", "Ravi"],
    rate: 0.9,
    pitch: 0.9,
    volume: 1.0,
};

/// Profile for a named expert persona; unknown names fall back to the
/// default male profile.
pub fn profile_for(expert: &str) -> &'static VoiceProfile {
    match expert {
        "Joanna" => &JOANNA,
        "Sallie" => &SALLIE,
        _ => &MATTHEW,
    }
}

/// Pick a voice: first preferred-name substring match in preference order,
/// then the regional default, then any voice for the language.
pub fn select_voice<'a>(voices: &'a [VoiceInfo], profile: &VoiceProfile) -> Option<&'a VoiceInfo> {
    for preferred in profile.preferred {
        if let Some(voice) = voices.iter().find(|v| v.name.contains(preferred)) {
            return Some(voice);
        }
    }
    voices
        .iter()
        .find(|v| v.lang.contains("en-IN"))
        .or_else(|| voices.iter().find(|v| v.lang.starts_with("en")))
}

/// The synthesis engine seam. `speak` resolves when playback ends; `cancel`
/// aborts any in-progress playback immediately.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait SpeechSynth: Send + Sync {
    fn voices(&self) -> Vec<VoiceInfo>;

    async fn speak(&self, request: SpeechRequest) -> Result<()>;

    fn cancel(&self);
}

/// Drives text-to-speech while coordinating the microphone gate: muted for
/// the whole playback window plus a short grace interval, so the system's
/// own voice is never transcribed. At most one utterance plays at a time;
/// new requests preempt the old one.
pub struct SpeechGate<S: SpeechSynth> {
    synth: S,
    mic: Arc<MicGate>,
    grace: Duration,
}

impl<S: SpeechSynth> SpeechGate<S> {
    pub fn new(synth: S, mic: Arc<MicGate>) -> Self {
        Self {
            synth,
            mic,
            grace: crate::SessionTuning::default().unmute_grace,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Speak one assistant reply. Resolves exactly once, when playback has
    /// ended and the microphone is live again. Empty text is a no-op
    /// success. An error during playback still unmutes before surfacing.
    pub async fn speak(&self, text: &str, expert: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        self.mic.mute();
        self.synth.cancel();

        let profile = profile_for(expert);
        let voices = self.synth.voices();
        let voice = select_voice(&voices, profile).map(|v| v.name.clone());
        if let Some(ref name) = voice {
            tracing::debug!("speaking as {expert} with voice {name}");
        } else {
            tracing::debug!("speaking as {expert} with engine default voice");
        }

        let request = SpeechRequest {
            text: text.to_string(),
            voice,
            rate: profile.rate,
            pitch: profile.pitch,
            volume: profile.volume,
        };

        match self.synth.speak(request).await {
            Ok(()) => {
                // Let the audio tail die out before the mic goes live.
                tokio::time::sleep(self.grace).await;
                self.mic.unmute();
                Ok(())
            }
            Err(e) => {
                self.mic.unmute();
                Err(e)
            }
        }
    }

    /// Cancel any in-progress playback and unmute synchronously. Safe to
    /// call when nothing is playing.
    pub fn stop(&self) {
        self.synth.cancel();
        self.mic.unmute();
    }

    pub fn mic(&self) -> &Arc<MicGate> {
        &self.mic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices(entries: &[(&str, &str)]) -> Vec<VoiceInfo> {
        entries
            .iter()
            .map(|(name, lang)| VoiceInfo {
                name: name.to_string(),
                lang: lang.to_string(),
            })
            .collect()
    }

    #[test]
    fn prefers_named_voices_in_order() {
        let available = voices(&[
            ("Karen (Premium)", "en-AU"),
            ("Victoria", "en-US"),
            ("Alex", "en-US"),
        ]);
        // Victoria outranks Karen in Joanna's preference list.
        let picked = select_voice(&available, profile_for("Joanna")).unwrap();
        assert_eq!(picked.name, "Victoria");
    }

    #[test]
    fn falls_back_to_regional_then_any_english() {
        let available = voices(&[("Lekha", "hi-IN"), ("Rishi", "en-IN"), ("Serena", "en-GB")]);
        let picked = select_voice(&available, profile_for("Matthew")).unwrap();
        assert_eq!(picked.name, "Rishi");

        let available = voices(&[("Lekha", "hi-IN"), ("Serena", "en-GB")]);
        let picked = select_voice(&available, profile_for("Matthew")).unwrap();
        assert_eq!(picked.name, "Serena");

        let available = voices(&[("Lekha", "hi-IN")]);
        assert!(select_voice(&available, profile_for("Matthew")).is_none());
    }

    #[test]
    fn unknown_persona_uses_default_profile() {
        let profile = profile_for("Nobody");
        assert_eq!(profile.preferred, MATTHEW.preferred);
    }

    #[tokio::test]
    async fn mic_is_muted_for_playback_and_released_after() {
        let mic = Arc::new(MicGate::new());
        let mut synth = MockSpeechSynth::new();
        synth.expect_cancel().return_const(());
        synth.expect_voices().returning(Vec::new);

        let mic_probe = mic.clone();
        synth.expect_speak().returning(move |_| {
            // The gate must already be muted while playback runs.
            assert!(mic_probe.is_muted());
            Box::pin(async { Ok(()) })
        });

        let gate = SpeechGate::new(synth, mic.clone()).with_grace(Duration::from_millis(1));
        assert!(!mic.is_muted());
        gate.speak("hello there", "Matthew").await.unwrap();
        assert!(!mic.is_muted());
    }

    #[tokio::test]
    async fn playback_error_still_unmutes() {
        let mic = Arc::new(MicGate::new());
        let mut synth = MockSpeechSynth::new();
        synth.expect_cancel().return_const(());
        synth.expect_voices().returning(Vec::new);
        synth
            .expect_speak()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("engine died")) }));

        let gate = SpeechGate::new(synth, mic.clone()).with_grace(Duration::from_millis(1));
        let result = gate.speak("hello", "Joanna").await;
        assert!(result.is_err());
        assert!(!mic.is_muted());
    }

    #[tokio::test]
    async fn empty_text_is_a_noop_success() {
        let mic = Arc::new(MicGate::new());
        let mut synth = MockSpeechSynth::new();
        // Neither cancel nor speak may be called.
        synth.expect_cancel().never();
        synth.expect_speak().never();

        let gate = SpeechGate::new(synth, mic.clone());
        gate.speak("   ", "Sallie").await.unwrap();
        assert!(!mic.is_muted());
    }

    #[tokio::test]
    async fn stop_cancels_and_unmutes_synchronously() {
        let mic = Arc::new(MicGate::new());
        let mut synth = MockSpeechSynth::new();
        synth.expect_cancel().times(1).return_const(());

        mic.mute();
        let gate = SpeechGate::new(synth, mic.clone());
        gate.stop();
        assert!(!mic.is_muted());
    }
}
