mod compiler;
pub mod locale;
mod sanitize;

pub use compiler::ThermomixCompiler;
pub use sanitize::sanitize_step;

use serde::{Deserialize, Serialize};

/// Default temperature for the gentle-rewarm preset when the model left
/// it blank
pub const REWARM_DEFAULT_TEMPERATURE: &str = "65";

/// Temperature above which a recipe needs the newer device generation
pub const HIGH_TEMPERATURE_LIMIT: f32 = 120.0;

/// Fixed device presets. An automode determines its own internal speed;
/// a speed value is never emitted alongside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Automode {
    /// Dough kneading program
    Knead,
    /// Short full-power chop burst
    TurboChop,
    /// Low-stir reheating program
    GentleRewarm,
}

impl Automode {
    /// Parse the model's wording for a preset, accepting the synonyms it
    /// tends to produce. Unknown names mean "no automode".
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "knead" | "dough" | "dough-mode" => Some(Automode::Knead),
            "turbo-chop" | "turbo" | "turbochop" => Some(Automode::TurboChop),
            "gentle-rewarm" | "rewarm" | "warm-up" | "warmup" => Some(Automode::GentleRewarm),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Automode::Knead => "knead",
            Automode::TurboChop => "turbo-chop",
            Automode::GentleRewarm => "gentle-rewarm",
        }
    }
}

/// One step of a device program, as produced by the model and cleaned by
/// the sanitizer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermomixStep {
    /// Plain-language instruction text
    pub text: String,
    pub automode: Option<Automode>,
    /// Dial speed, empty when unset
    pub speed: String,
    /// Run time in seconds, 0 when the step carries no machine action
    pub duration_secs: u32,
    /// Temperature value, empty when unset
    pub temperature: String,
    /// Ingredient mentions that must appear verbatim in `text`
    pub ingredient_refs: Vec<String>,
}

/// What an annotation marks inside a compiled step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Automode,
    Parameters,
    Ingredient,
}

/// A positioned or step-level annotation on a compiled step.
///
/// Offsets and lengths are measured in characters, not bytes, so
/// multi-byte scripts stay correctly positioned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepAnnotation {
    pub kind: AnnotationKind,
    pub label: String,
    /// Character offset into the step text; None for step-level
    /// annotations
    pub offset: Option<usize>,
    /// Length in characters of the annotated span
    pub len: Option<usize>,
}

/// A sanitized step together with its annotations
#[derive(Debug, Clone, Serialize)]
pub struct CompiledStep {
    pub text: String,
    pub automode: Option<Automode>,
    pub speed: String,
    pub duration_secs: u32,
    pub temperature: String,
    /// Each entry is guaranteed to be a literal substring of `text`
    pub ingredient_refs: Vec<String>,
    pub annotations: Vec<StepAnnotation>,
}

/// Device models a compiled recipe can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceModel {
    TM5,
    TM6,
    TM7,
}

/// Result of compiling a recipe into a device program
#[derive(Debug, Clone, Serialize)]
pub struct ThermomixConversionResult {
    /// Formatted ingredient display lines
    pub ingredients: Vec<String>,
    pub steps: Vec<CompiledStep>,
    /// Device models this program is valid for; broad by default,
    /// narrowed only when an exclusive feature is used
    pub compatibility: Vec<DeviceModel>,
}
