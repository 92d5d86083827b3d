use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::ExtractError;
use crate::gemini::response::parse_typed;
use crate::gemini::types::{Content, GenerateContentRequest, GenerationConfig, Part};
use crate::gemini::GenerativeModel;
use crate::model::{ExtractedRecipe, Ingredient};
use crate::retry::{retry_with_backoff, with_timeout, RetryPolicy};
use crate::thermomix::locale::{format_parameter_label, labels_for, ParamLabels};
use crate::thermomix::sanitize::sanitize_steps;
use crate::thermomix::{
    AnnotationKind, Automode, CompiledStep, DeviceModel, StepAnnotation, ThermomixConversionResult,
    ThermomixStep, HIGH_TEMPERATURE_LIMIT,
};

const COMPILE_PROMPT: &str = r#"You convert recipes into Thermomix cooking programs.

For every recipe step emit one program step with:
- "text": the instruction in plain language, mentioning the ingredients used.
- "automode": one of "knead", "turbo-chop", "gentle-rewarm", or "" when the step uses manual settings. Use "knead" for dough work, "turbo-chop" for short full-power chopping bursts, "gentle-rewarm" for careful reheating.
- "speed": the dial speed as a string ("0.5" to "10"), or "" when an automode is set or the step happens outside the machine.
- "duration": run time in whole seconds, 0 for steps without a machine action.
- "temperature": target temperature in °C as a plain number string, "" when unheated.
- "ingredientRefs": the ingredient mentions, copied character-for-character from "text".

Steps done entirely outside the machine (serving, resting, preheating an oven) keep their text but carry no speed, temperature, or automode."#;

/// Wire shape of one compiled step as the model emits it
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireStep {
    text: String,
    automode: String,
    speed: String,
    duration: u32,
    temperature: String,
    ingredient_refs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireConversion {
    #[serde(default)]
    steps: Vec<WireStep>,
}

fn conversion_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "steps": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": {"type": "STRING"},
                        "automode": {
                            "type": "STRING",
                            "enum": ["", "knead", "turbo-chop", "gentle-rewarm"]
                        },
                        "speed": {"type": "STRING"},
                        "duration": {"type": "INTEGER"},
                        "temperature": {"type": "STRING"},
                        "ingredientRefs": {"type": "ARRAY", "items": {"type": "STRING"}}
                    },
                    "required": ["text"]
                }
            }
        },
        "required": ["steps"]
    })
}

/// Compiles an extracted recipe into an annotated Thermomix program.
///
/// The model proposes steps; everything that reaches the result passes
/// the deterministic sanitizer first, so the device program never
/// depends on the model honoring its instructions.
pub struct ThermomixCompiler {
    model: Arc<dyn GenerativeModel>,
    config: AppConfig,
}

impl ThermomixCompiler {
    pub fn new(model: Arc<dyn GenerativeModel>, config: AppConfig) -> Self {
        Self { model, config }
    }

    /// Convert a recipe into a device program with display labels for
    /// the given locale.
    pub async fn convert(
        &self,
        recipe: &ExtractedRecipe,
        locale: &str,
        cancel: &CancellationToken,
    ) -> Result<ThermomixConversionResult, ExtractError> {
        let ingredients: Vec<String> =
            recipe.ingredients.iter().map(format_ingredient).collect();

        let request = self.build_request(recipe, &ingredients)?;
        let budget = Duration::from_secs(self.config.gemini.request_timeout_secs);
        let policy = RetryPolicy::compiler();
        let model = self.model.clone();
        let response = retry_with_backoff(&policy, cancel, || {
            let request = request.clone();
            let model = model.clone();
            async move {
                with_timeout("device compilation", budget, model.generate(request)).await
            }
        })
        .await?;

        let wire: WireConversion = parse_typed(&response)?;
        let mut steps: Vec<ThermomixStep> = wire.steps.into_iter().map(into_step).collect();
        sanitize_steps(&mut steps);

        let labels = labels_for(locale);
        let compatibility = compatibility_for(&steps);
        let compiled: Vec<CompiledStep> =
            steps.into_iter().map(|step| annotate(step, labels)).collect();

        info!(
            "Compiled '{}' into {} device steps for {:?}",
            recipe.title,
            compiled.len(),
            compatibility
        );
        Ok(ThermomixConversionResult {
            ingredients,
            steps: compiled,
            compatibility,
        })
    }

    fn build_request(
        &self,
        recipe: &ExtractedRecipe,
        ingredients: &[String],
    ) -> Result<GenerateContentRequest, ExtractError> {
        let steps: Vec<&str> = recipe.steps.iter().map(|s| s.instruction.as_str()).collect();
        let payload = serde_json::to_string_pretty(&json!({
            "title": recipe.title,
            "ingredients": ingredients,
            "steps": steps,
        }))
        .map_err(|e| ExtractError::Parse {
            message: e.to_string(),
            excerpt: String::new(),
        })?;

        Ok(GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(format!(
                "Convert this recipe into a Thermomix program:\n\n{payload}"
            ))])],
            system_instruction: Some(Content::system(COMPILE_PROMPT)),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.config.gemini.temperature),
                max_output_tokens: Some(self.config.gemini.max_output_tokens),
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(conversion_response_schema()),
            }),
        })
    }
}

fn into_step(wire: WireStep) -> ThermomixStep {
    ThermomixStep {
        automode: Automode::from_wire(&wire.automode),
        text: wire.text,
        speed: wire.speed,
        duration_secs: wire.duration,
        temperature: wire.temperature,
        ingredient_refs: wire.ingredient_refs,
    }
}

/// Build the annotation set for one sanitized step
fn annotate(step: ThermomixStep, labels: &ParamLabels) -> CompiledStep {
    let mut annotations: Vec<StepAnnotation> = Vec::new();

    if let Some(mode) = step.automode {
        annotations.push(StepAnnotation {
            kind: AnnotationKind::Automode,
            label: mode.as_str().to_string(),
            offset: None,
            len: None,
        });
    } else {
        let label =
            format_parameter_label(&step.speed, step.duration_secs, &step.temperature, labels);
        if !label.is_empty() {
            annotations.push(StepAnnotation {
                kind: AnnotationKind::Parameters,
                label,
                offset: None,
                len: None,
            });
        }
    }

    for reference in &step.ingredient_refs {
        // The sanitizer guarantees the reference occurs in the text
        if let Some((offset, len)) = char_offset_of(&step.text, reference) {
            annotations.push(StepAnnotation {
                kind: AnnotationKind::Ingredient,
                label: reference.clone(),
                offset: Some(offset),
                len: Some(len),
            });
        }
    }

    CompiledStep {
        text: step.text,
        automode: step.automode,
        speed: step.speed,
        duration_secs: step.duration_secs,
        temperature: step.temperature,
        ingredient_refs: step.ingredient_refs,
        annotations,
    }
}

/// Locate `needle` in `text`, returning its offset and length in
/// characters rather than bytes, so positions stay correct in
/// multi-byte scripts.
pub(crate) fn char_offset_of(text: &str, needle: &str) -> Option<(usize, usize)> {
    let byte_index = text.find(needle)?;
    let char_offset = text[..byte_index].chars().count();
    Some((char_offset, needle.chars().count()))
}

/// Broad compatibility by default; narrowed only when a feature
/// exclusive to the newer device generation is actually used.
fn compatibility_for(steps: &[ThermomixStep]) -> Vec<DeviceModel> {
    let exclusive = steps.iter().any(|step| {
        step.automode == Some(Automode::GentleRewarm)
            || parse_temperature(&step.temperature)
                .is_some_and(|t| t > HIGH_TEMPERATURE_LIMIT)
    });
    if exclusive {
        vec![DeviceModel::TM6, DeviceModel::TM7]
    } else {
        vec![DeviceModel::TM5, DeviceModel::TM6, DeviceModel::TM7]
    }
}

fn parse_temperature(value: &str) -> Option<f32> {
    let numeric: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().ok()
}

/// Display line for one ingredient: quantity, unit, name, then notes and
/// the optional marker in parentheses
fn format_ingredient(ingredient: &Ingredient) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !ingredient.quantity.is_empty() {
        parts.push(&ingredient.quantity);
    }
    if !ingredient.unit.is_empty() {
        parts.push(&ingredient.unit);
    }
    parts.push(&ingredient.name);
    let mut line = parts.join(" ");

    let mut extras: Vec<&str> = Vec::new();
    if !ingredient.notes.is_empty() {
        extras.push(&ingredient.notes);
    }
    if ingredient.optional {
        extras.push("optional");
    }
    if !extras.is_empty() {
        line.push_str(&format!(" ({})", extras.join(", ")));
    }
    line
}
