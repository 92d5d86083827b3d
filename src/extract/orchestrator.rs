use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info};
use serde::Deserialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::ExtractError;
use crate::extract::prompt::{build_extraction_prompt, extraction_response_schema};
use crate::fetch::{extract_page_content, SafeFetcher};
use crate::gemini::response::parse_typed;
use crate::gemini::types::{
    Content, FileState, GeminiFile, GenerateContentRequest, GenerationConfig, Part,
};
use crate::gemini::GenerativeModel;
use crate::model::{
    ExtractedRecipe, ExtractionOutcome, ExtractionRequest, ProgressFn, ProgressStage, SourceInput,
};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Wire shape of the extraction response. Folded into the
/// [`ExtractionOutcome`] sum type immediately after decoding so the
/// "populated recipe + rejected" state never escapes this module.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionEnvelope {
    #[serde(default)]
    not_a_recipe: bool,
    #[serde(default)]
    rejection_reason: String,
    #[serde(flatten)]
    recipe: ExtractedRecipe,
}

impl From<ExtractionEnvelope> for ExtractionOutcome {
    fn from(envelope: ExtractionEnvelope) -> Self {
        if envelope.not_a_recipe {
            let reason = if envelope.rejection_reason.trim().is_empty() {
                "the source does not contain a recipe".to_string()
            } else {
                envelope.rejection_reason
            };
            ExtractionOutcome::NotARecipe { reason }
        } else {
            ExtractionOutcome::Recipe(envelope.recipe)
        }
    }
}

/// Drives one extraction request from source to validated recipe.
///
/// Holds no per-request state; the model client and fetcher are shared,
/// immutable, and safe across concurrent jobs.
pub struct RecipeExtractor {
    model: Arc<dyn GenerativeModel>,
    fetcher: Arc<SafeFetcher>,
    config: AppConfig,
}

impl RecipeExtractor {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        fetcher: Arc<SafeFetcher>,
        config: AppConfig,
    ) -> Self {
        Self {
            model,
            fetcher,
            config,
        }
    }

    /// Extract a structured recipe from the request's source.
    ///
    /// Progress milestones are reported inline through `progress` with
    /// strictly increasing percentages. A source the model judges
    /// off-topic surfaces as [`ExtractError::NotARecipe`], never as an
    /// empty recipe.
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<ExtractedRecipe, ExtractError> {
        request.validate()?;
        let report = |stage: ProgressStage| {
            if let Some(callback) = progress {
                callback(stage, stage.percent());
            }
        };

        let mut page_image: Option<String> = None;
        let source_parts = match &request.source {
            SourceInput::VideoUrl(url) => {
                info!("Extracting from remote video {url}");
                vec![Part::file_data(None, url.clone())]
            }
            SourceInput::VideoFile(path) => {
                report(ProgressStage::Uploading);
                let file = self.upload_video(path).await?;
                report(ProgressStage::Processing);
                let file = self.await_file_active(file, cancel).await?;
                let uri = file.uri.unwrap_or(file.name);
                vec![Part::file_data(file.mime_type, uri)]
            }
            SourceInput::WebPage(url) => {
                report(ProgressStage::Processing);
                info!("Extracting from webpage {url}");
                let html = tokio::select! {
                    _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                    fetched = self.fetcher.fetch_html(url) => fetched?,
                };
                let content =
                    extract_page_content(&html, self.config.fetcher.max_content_chars);
                page_image = content.image_url;
                vec![Part::text(format!(
                    "Text content of the recipe page at {url}:\n\n{}",
                    content.text
                ))]
            }
            SourceInput::Image { data, mime } => {
                info!("Extracting from {mime} photo ({} bytes)", data.len());
                vec![Part::inline_data(mime.clone(), STANDARD.encode(data))]
            }
        };

        report(ProgressStage::Extracting);
        let generation = self.build_request(source_parts, request);
        let policy = RetryPolicy::from_config(&self.config.retry);
        let model = self.model.clone();
        let response = retry_with_backoff(&policy, cancel, || {
            let request = generation.clone();
            let model = model.clone();
            async move { model.generate(request).await }
        })
        .await?;

        let envelope: ExtractionEnvelope = parse_typed(&response)?;
        match ExtractionOutcome::from(envelope) {
            ExtractionOutcome::NotARecipe { reason } => Err(ExtractError::NotARecipe(reason)),
            ExtractionOutcome::Recipe(mut recipe) => {
                recipe.image_url = page_image;
                report(ProgressStage::Finalizing);
                info!(
                    "Extracted '{}' with {} ingredients and {} steps",
                    recipe.title,
                    recipe.ingredients.len(),
                    recipe.steps.len()
                );
                Ok(recipe)
            }
        }
    }

    fn build_request(
        &self,
        mut parts: Vec<Part>,
        request: &ExtractionRequest,
    ) -> GenerateContentRequest {
        parts.push(Part::text(
            "Extract the recipe from this source as a single JSON object.",
        ));
        GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: Some(Content::system(build_extraction_prompt(
                request.language.as_deref(),
                request.detail_level.as_deref(),
            ))),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.config.gemini.temperature),
                max_output_tokens: Some(self.config.gemini.max_output_tokens),
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(extraction_response_schema()),
            }),
        }
    }

    async fn upload_video(&self, path: &Path) -> Result<GeminiFile, ExtractError> {
        let data = tokio::fs::read(path).await?;
        let mime = video_mime_for(path);
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video")
            .to_string();
        self.model.upload_file(data, mime, &display_name).await
    }

    /// Poll the uploaded file until it leaves the processing state.
    ///
    /// Bounded by its own wall-clock deadline, independent of any parent
    /// deadline, so a misbehaving upstream cannot stall the job. A
    /// failed processing state is terminal and never retried.
    async fn await_file_active(
        &self,
        mut file: GeminiFile,
        cancel: &CancellationToken,
    ) -> Result<GeminiFile, ExtractError> {
        let interval = Duration::from_secs(self.config.gemini.upload_poll_interval_secs);
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.gemini.upload_deadline_secs);

        loop {
            match file.state {
                Some(FileState::Active) => return Ok(file),
                Some(FileState::Failed) => {
                    let message = file
                        .error
                        .map(|e| e.message)
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| format!("file {} failed processing", file.name));
                    return Err(ExtractError::FileProcessing(message));
                }
                _ => {}
            }

            if tokio::time::Instant::now() + interval > deadline {
                return Err(ExtractError::Timeout("video processing".to_string()));
            }
            debug!("File {} still processing, polling again", file.name);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                _ = sleep(interval) => {}
            }
            file = self.model.get_file(&file.name).await?;
        }
    }
}

fn video_mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        _ => "video/mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;
    use crate::gemini::types::{Candidate, GenerateContentResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fake model that records the request it was given
    struct CapturingModel {
        payload: String,
        last_request: Mutex<Option<GenerateContentRequest>>,
    }

    #[async_trait]
    impl GenerativeModel for CapturingModel {
        async fn generate(
            &self,
            request: GenerateContentRequest,
        ) -> Result<GenerateContentResponse, ExtractError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(GenerateContentResponse {
                candidates: vec![Candidate {
                    content: Some(Content {
                        role: Some("model".to_string()),
                        parts: vec![Part::text(self.payload.clone())],
                    }),
                    finish_reason: Some("STOP".to_string()),
                }],
                prompt_feedback: None,
            })
        }

        async fn upload_file(
            &self,
            _data: Vec<u8>,
            _mime_type: &str,
            _display_name: &str,
        ) -> Result<GeminiFile, ExtractError> {
            unimplemented!("not used by the webpage path")
        }

        async fn get_file(&self, _name: &str) -> Result<GeminiFile, ExtractError> {
            unimplemented!("not used by the webpage path")
        }
    }

    #[tokio::test]
    async fn test_webpage_extraction_feeds_page_text_and_keeps_image() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/tarte")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<html><head>
                <meta property="og:image" content="https://img.example/tarte.jpg">
                </head><body>
                <div class="recipe-content">Tarte Tatin. Caramelize the apples.</div>
                </body></html>"#,
            )
            .create_async()
            .await;

        let model = Arc::new(CapturingModel {
            payload: r#"{"notARecipe": false, "title": "Tarte Tatin"}"#.to_string(),
            last_request: Mutex::new(None),
        });
        let fetcher = Arc::new(SafeFetcher::unguarded(&FetcherConfig::default()).unwrap());
        let extractor =
            RecipeExtractor::new(model.clone(), fetcher, crate::config::AppConfig::default());

        let request = ExtractionRequest::new(SourceInput::WebPage(format!(
            "{}/tarte",
            server.url()
        )));
        let recipe = extractor
            .extract(&request, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recipe.title, "Tarte Tatin");
        // The page image is resolved in code, not by the model
        assert_eq!(recipe.image_url.as_deref(), Some("https://img.example/tarte.jpg"));

        let captured = model.last_request.lock().unwrap().take().unwrap();
        let prompt_text = captured.contents[0].parts[0].text.clone().unwrap();
        assert!(prompt_text.contains("Caramelize the apples."));
    }

    #[test]
    fn test_video_mime_for_known_extensions() {
        assert_eq!(video_mime_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(video_mime_for(Path::new("clip.WEBM")), "video/webm");
        assert_eq!(video_mime_for(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(video_mime_for(Path::new("clip")), "video/mp4");
    }

    #[test]
    fn test_envelope_rejection_takes_priority() {
        let envelope: ExtractionEnvelope = serde_json::from_str(
            r#"{"notARecipe": true, "rejectionReason": "gaming video", "title": "ignored"}"#,
        )
        .unwrap();
        match ExtractionOutcome::from(envelope) {
            ExtractionOutcome::NotARecipe { reason } => assert_eq!(reason, "gaming video"),
            ExtractionOutcome::Recipe(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_envelope_rejection_without_reason_gets_default() {
        let envelope: ExtractionEnvelope =
            serde_json::from_str(r#"{"notARecipe": true}"#).unwrap();
        match ExtractionOutcome::from(envelope) {
            ExtractionOutcome::NotARecipe { reason } => {
                assert!(reason.contains("not contain a recipe"))
            }
            ExtractionOutcome::Recipe(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_envelope_recipe_decodes() {
        let envelope: ExtractionEnvelope = serde_json::from_str(
            r#"{"notARecipe": false, "title": "Pho", "ingredients": [{"name": "star anise"}]}"#,
        )
        .unwrap();
        match ExtractionOutcome::from(envelope) {
            ExtractionOutcome::Recipe(recipe) => {
                assert_eq!(recipe.title, "Pho");
                assert_eq!(recipe.ingredients.len(), 1);
            }
            ExtractionOutcome::NotARecipe { .. } => panic!("expected recipe"),
        }
    }
}
