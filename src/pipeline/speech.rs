use async_trait::async_trait;

use crate::config::ServiceConfig;

use super::{http_client, PipelineError};

pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub language: String,
    pub output_format: String,
}

impl SpeechRequest {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }

    pub fn with_voice(mut self, voice: &str, language: &str) -> Self {
        self.voice = voice.to_string();
        self.language = language.to_string();
        self
    }

    pub fn with_output_format(mut self, format: &str) -> Self {
        self.output_format = format.to_string();
        self
    }
}

/// Converts text to encoded audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, PipelineError>;
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// SSML document for one voice speaking the request text.
pub fn build_ssml(request: &SpeechRequest) -> String {
    format!(
        "<speak version='1.0' xml:lang='{lang}'><voice xml:lang='{lang}' name='{voice}'>{text}</voice></speak>",
        lang = escape_xml(&request.language),
        voice = escape_xml(&request.voice),
        text = escape_xml(&request.text),
    )
}

/// Azure Cognitive Services text-to-speech REST client.
pub struct AzureSpeechClient {
    endpoint: String,
    key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl AzureSpeechClient {
    pub fn new(region: &str, key: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        if region.trim().is_empty() {
            return Err(PipelineError::MissingConfig("RXGUARD_SPEECH_REGION".into()));
        }
        Self::with_endpoint(
            &format!("https://{}.tts.speech.microsoft.com", region.trim()),
            key,
            timeout_secs,
        )
    }

    /// Client against an explicit endpoint, e.g. a private deployment.
    pub fn with_endpoint(endpoint: &str, key: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        if key.trim().is_empty() {
            return Err(PipelineError::MissingConfig("RXGUARD_SPEECH_KEY".into()));
        }
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client: http_client(timeout_secs)?,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, PipelineError> {
        Self::new(
            config.speech_region.as_deref().unwrap_or_default(),
            config.speech_key.as_deref().unwrap_or_default(),
            config.request_timeout_secs,
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for AzureSpeechClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, PipelineError> {
        if request.text.trim().is_empty() {
            return Err(PipelineError::Service("No text to synthesize".into()));
        }

        let url = format!("{}/cognitiveservices/v1", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("X-Microsoft-OutputFormat", &request.output_format)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header(reqwest::header::USER_AGENT, crate::config::APP_NAME)
            .body(build_ssml(request))
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(&self.endpoint, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| PipelineError::ResponseParsing(e.to_string()))?;

        tracing::info!(
            voice = %request.voice,
            format = %request.output_format,
            bytes = audio.len(),
            "Speech synthesized"
        );
        Ok(audio.to_vec())
    }
}

/// Synthesizer stand-in returning the SSML bytes it would have sent.
pub struct MockSpeechSynthesizer;

#[async_trait]
impl SpeechSynthesizer for MockSpeechSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, PipelineError> {
        Ok(build_ssml(request).into_bytes())
    }
}
