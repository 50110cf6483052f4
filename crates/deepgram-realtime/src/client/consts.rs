pub const DEEPGRAM_API_KEY: &str = "DEEPGRAM_API_KEY";

pub const BASE_URL: &str = "wss://api.deepgram.com/v1/listen";
pub const DEFAULT_MODEL: &str = "nova-2";
pub const DEFAULT_LANGUAGE: &str = "en-IN";
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_ENDPOINTING_MS: u32 = 500;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Heartbeat period while the connection is open.
pub const KEEP_ALIVE_PERIOD: std::time::Duration = std::time::Duration::from_secs(5);
