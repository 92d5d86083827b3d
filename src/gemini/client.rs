use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::config::GeminiConfig;
use crate::error::ExtractError;
use crate::gemini::types::{
    GeminiFile, GenerateContentRequest, GenerateContentResponse, UploadFileResponse,
};
use crate::gemini::GenerativeModel;

/// HTTP client for the Gemini API.
///
/// Holds one long-lived `reqwest::Client` with the hard per-call timeout
/// baked in; safe for concurrent use across independent jobs and never
/// mutated after construction.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration.
    ///
    /// The API key is read from the config first, then from the
    /// GEMINI_API_KEY environment variable.
    pub fn new(config: &GeminiConfig) -> Result<Self, ExtractError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .ok_or_else(|| {
                ExtractError::InvalidRequest(
                    "GEMINI_API_KEY not found in config or environment".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(GeminiClient {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Default temperature for requests built against this client
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Default output token budget for requests built against this client
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ExtractError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ExtractError::ApiStatus {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ExtractError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        debug!("Sending generateContent request to model {}", self.model);

        let response = self.client.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<GenerateContentResponse>().await?)
    }

    async fn upload_file(
        &self,
        data: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<GeminiFile, ExtractError> {
        let url = format!(
            "{}/upload/v1beta/files?key={}",
            self.base_url, self.api_key
        );
        debug!(
            "Uploading {} bytes of {} as '{}'",
            data.len(),
            mime_type,
            display_name
        );

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("X-Goog-File-Name", display_name)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<UploadFileResponse>().await?.file)
    }

    async fn get_file(&self, name: &str) -> Result<GeminiFile, ExtractError> {
        // Accept both bare ids and full "files/..." resource names
        let resource = if name.starts_with("files/") {
            name.to_string()
        } else {
            format!("files/{name}")
        };
        let url = format!("{}/v1beta/{}?key={}", self.base_url, resource, self.api_key);

        let response = self.client.get(&url).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<GeminiFile>().await?)
    }
}
