//! Provider configuration

/// Configuration for the `OpenAI` provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    /// API root; point at a gateway to proxy all calls through it
    pub base_url: String,
    pub chat_model: String,
    pub transcribe_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub realtime_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            transcribe_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: String| std::env::var(name).unwrap_or(default);
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: var("OPENAI_BASE_URL", defaults.base_url),
            chat_model: var("FOLIO_CHAT_MODEL", defaults.chat_model),
            transcribe_model: var("FOLIO_TRANSCRIBE_MODEL", defaults.transcribe_model),
            tts_model: var("FOLIO_TTS_MODEL", defaults.tts_model),
            tts_voice: var("FOLIO_TTS_VOICE", defaults.tts_voice),
            realtime_model: var("FOLIO_REALTIME_MODEL", defaults.realtime_model),
        }
    }
}
