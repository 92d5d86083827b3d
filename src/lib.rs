pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod gemini;
pub mod model;
pub mod retry;
pub mod thermomix;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use config::AppConfig;
pub use error::ExtractError;
pub use extract::{refine_recipe, RecipeExtractor};
pub use fetch::SafeFetcher;
pub use gemini::{GeminiClient, GenerativeModel};
pub use model::{
    ExtractedRecipe, ExtractionOutcome, ExtractionRequest, ProgressFn, ProgressStage, SourceInput,
};
pub use retry::RetryPolicy;
pub use thermomix::{ThermomixCompiler, ThermomixConversionResult};

/// Extract a recipe using configuration from file/environment.
///
/// Convenience wrapper that wires the shared clients together; callers
/// that need progress reporting, cancellation, or fakes construct a
/// [`RecipeExtractor`] themselves.
pub async fn extract_recipe(request: ExtractionRequest) -> Result<ExtractedRecipe, ExtractError> {
    let config = AppConfig::load()?;
    let model = Arc::new(GeminiClient::new(&config.gemini)?);
    let fetcher = Arc::new(SafeFetcher::new(&config.fetcher)?);
    let extractor = RecipeExtractor::new(model, fetcher, config);
    extractor
        .extract(&request, None, &CancellationToken::new())
        .await
}

/// Extract a recipe and run the second-pass refinement over it.
pub async fn extract_and_refine(
    request: ExtractionRequest,
) -> Result<ExtractedRecipe, ExtractError> {
    let config = AppConfig::load()?;
    let model = Arc::new(GeminiClient::new(&config.gemini)?);
    let fetcher = Arc::new(SafeFetcher::new(&config.fetcher)?);
    let cancel = CancellationToken::new();

    let extractor = RecipeExtractor::new(model.clone(), fetcher, config.clone());
    let recipe = extractor.extract(&request, None, &cancel).await?;
    refine_recipe(model.as_ref(), &config, &recipe, &cancel).await
}

/// Compile an extracted recipe into a Thermomix program.
pub async fn convert_to_thermomix(
    recipe: &ExtractedRecipe,
    locale: &str,
) -> Result<ThermomixConversionResult, ExtractError> {
    let config = AppConfig::load()?;
    let model = Arc::new(GeminiClient::new(&config.gemini)?);
    let compiler = ThermomixCompiler::new(model, config);
    compiler
        .convert(recipe, locale, &CancellationToken::new())
        .await
}
