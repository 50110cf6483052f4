//! Service configuration.
//!
//! Centralizes everything the coaching service reads from the environment,
//! plus the fixed audio pipeline constants.

use std::env;
use tracing::Level;

/// The size of each audio chunk pulled from the microphone input stream.
pub const INPUT_CHUNK_SIZE: usize = 1024;
/// The size of each audio chunk for the audio output stream.
pub const OUTPUT_CHUNK_SIZE: usize = 1024;
/// The latency for the output audio buffer in milliseconds.
pub const OUTPUT_LATENCY_MS: usize = 1000;
/// Sample rate the transcription stream expects, in Hz.
pub const TRANSCRIBE_SAMPLE_RATE: u32 = 16_000;
/// How much audio each transcription frame carries, in milliseconds.
pub const TRANSCRIBE_CHUNK_MS: usize = 250;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub deepgram_api_key: String,
    pub groq_api_key: String,
    pub convex_url: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `DEEPGRAM_API_KEY`: Key for the transcription and speech APIs. Required.
    // *   `GROQ_API_KEY`: Key for the chat completion API. Required.
    // *   `CONVEX_URL`: (Optional) Deployment URL of the reactive store. When
    //     absent the session runs without persistence or credit accounting.
    // *   `CHAT_MODEL`: (Optional) Completion model name.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Useful for local development, ignored if not present.
        dotenvy::dotenv().ok();

        let deepgram_api_key = env::var("DEEPGRAM_API_KEY")
            .map_err(|_| ConfigError::MissingVar("DEEPGRAM_API_KEY".to_string()))?;
        let groq_api_key = env::var("GROQ_API_KEY")
            .map_err(|_| ConfigError::MissingVar("GROQ_API_KEY".to_string()))?;

        let convex_url = env::var("CONVEX_URL").ok();

        let chat_model = env::var("CHAT_MODEL")
            .unwrap_or_else(|_| coach_core::coach::DEFAULT_CHAT_MODEL.to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            deepgram_api_key,
            groq_api_key,
            convex_url,
            chat_model,
            log_level,
        })
    }
}
