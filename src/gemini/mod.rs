mod client;
pub mod response;
pub mod types;

pub use client::GeminiClient;

use async_trait::async_trait;

use crate::error::ExtractError;
use crate::gemini::types::{GeminiFile, GenerateContentRequest, GenerateContentResponse};

/// Seam between the orchestration layer and the model service.
///
/// Implemented by [`GeminiClient`] in production; tests substitute
/// scripted fakes so no component above this trait touches the network.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// One schema-constrained generation call
    async fn generate(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ExtractError>;

    /// Upload local media to the model's file store
    async fn upload_file(
        &self,
        data: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<GeminiFile, ExtractError>;

    /// Fetch current metadata (including processing state) for a file
    async fn get_file(&self, name: &str) -> Result<GeminiFile, ExtractError>;
}
