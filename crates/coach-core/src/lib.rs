pub mod capture;
pub mod coach;
pub mod ledger;
pub mod lifecycle;
pub mod mode;
pub mod segment;
pub mod session;
pub mod speech;
pub mod store;

use serde::{Deserialize, Serialize};

/// Commands the session controller issues to the runtime.
///
/// The controller decides, the runtime executes the side effect; this is the
/// seam that keeps the turn state machine free of audio concerns.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Render the given assistant text as speech.
    Speak(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One finalized exchange unit in a conversation transcript. Interim
/// (still-updating) text never becomes a `Turn`; it only exists in the
/// segmenter's display view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Timing knobs for the session loop. These are tuning parameters, not
/// correctness contracts; the defaults match the original deployment.
#[derive(Debug, Clone, Copy)]
pub struct SessionTuning {
    /// Quiet period after the last confirmed fragment before the buffered
    /// utterance is considered complete.
    pub silence_timeout: std::time::Duration,
    /// Delay between playback end and unmuting the microphone, so the tail
    /// of the synthesized voice is not re-captured.
    pub unmute_grace: std::time::Duration,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            silence_timeout: std::time::Duration::from_millis(4000),
            unmute_grace: std::time::Duration::from_millis(300),
        }
    }
}
