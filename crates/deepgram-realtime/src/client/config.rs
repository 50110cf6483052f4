use secrecy::SecretString;

use super::consts;

/// Connection-time configuration for a transcription stream. The protocol
/// parameters here are sent once in the connection URL and never
/// renegotiated mid-stream.
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
    language: String,
    sample_rate: u32,
    endpointing_ms: u32,
    punctuate: bool,
    smart_format: bool,
    interim_results: bool,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.config.language = language.to_string();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    pub fn with_endpointing_ms(mut self, endpointing_ms: u32) -> Self {
        self.config.endpointing_ms = endpointing_ms;
        self
    }

    pub fn with_interim_results(mut self, interim_results: bool) -> Self {
        self.config.interim_results = interim_results;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: consts::BASE_URL.to_string(),
            api_key: std::env::var(consts::DEEPGRAM_API_KEY)
                .unwrap_or_else(|_| "".to_string())
                .into(),
            model: consts::DEFAULT_MODEL.to_string(),
            language: consts::DEFAULT_LANGUAGE.to_string(),
            sample_rate: consts::DEFAULT_SAMPLE_RATE,
            endpointing_ms: consts::DEFAULT_ENDPOINTING_MS,
            punctuate: true,
            smart_format: true,
            interim_results: true,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn endpointing_ms(&self) -> u32 {
        self.endpointing_ms
    }

    pub fn punctuate(&self) -> bool {
        self.punctuate
    }

    pub fn smart_format(&self) -> bool {
        self.smart_format
    }

    pub fn interim_results(&self) -> bool {
        self.interim_results
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
