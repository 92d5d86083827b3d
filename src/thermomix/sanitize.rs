use std::collections::HashSet;

use log::debug;

use crate::thermomix::{Automode, ThermomixStep, REWARM_DEFAULT_TEMPERATURE};

/// Speed/time words the model mistranscribes into ingredient references,
/// across the languages the compiler is used with. Matched as whole
/// tokens only.
const PARAMETER_TOKENS: [&str; 30] = [
    // English
    "sec", "secs", "second", "seconds", "min", "mins", "minute", "minutes", "speed",
    // German
    "sek", "sekunde", "sekunden", "minuten", "stufe", "geschwindigkeit",
    // French
    "seconde", "secondes", "vitesse",
    // Italian
    "secondo", "secondi", "minuto", "minuti", "velocità", "vel",
    // Spanish
    "segundo", "segundos", "minutos", "velocidad",
    // shared abbreviations
    "s", "m",
];

/// Deterministic cleanup of one model-produced step.
///
/// Runs regardless of prompt quality; every invariant here is enforced
/// in code, never trusted to the model:
/// - "0"/"0.0" speed or temperature is an extraction artifact, cleared
/// - an automode fixes its own speed, so speed is cleared alongside one
/// - temperature only survives with no automode or with gentle-rewarm,
///   which defaults to 65° when left blank
/// - a step with no machine action carries no timer
/// - references that are mistranscribed parameter tokens, or that do not
///   appear verbatim in the text, are dropped; duplicates collapse to
///   the first occurrence
pub fn sanitize_step(step: &mut ThermomixStep) {
    if is_zero_sentinel(&step.speed) {
        step.speed.clear();
    }
    if is_zero_sentinel(&step.temperature) {
        step.temperature.clear();
    }

    if step.automode.is_some() {
        step.speed.clear();
    }
    match step.automode {
        Some(Automode::GentleRewarm) => {
            if step.temperature.is_empty() {
                step.temperature = REWARM_DEFAULT_TEMPERATURE.to_string();
            }
        }
        Some(_) => step.temperature.clear(),
        None => {}
    }

    if step.automode.is_none() && step.speed.is_empty() && step.temperature.is_empty() {
        step.duration_secs = 0;
    }

    let text = step.text.clone();
    let mut seen: HashSet<String> = HashSet::new();
    step.ingredient_refs.retain(|reference| {
        if is_parameter_artifact(reference) {
            debug!("Dropping parameter artifact reference '{reference}'");
            return false;
        }
        if !text.contains(reference.as_str()) {
            debug!("Dropping reference '{reference}' not found in step text");
            return false;
        }
        seen.insert(reference.clone())
    });
}

/// Sanitize every step of a compiled program in place
pub fn sanitize_steps(steps: &mut [ThermomixStep]) {
    for step in steps {
        sanitize_step(step);
    }
}

fn is_zero_sentinel(value: &str) -> bool {
    matches!(value.trim(), "0" | "0.0")
}

/// Whether a reference is a mistranscribed machine parameter rather than
/// an ingredient.
///
/// Tokenizes on non-alphanumeric boundaries and requires every token to
/// be a number or a known parameter word. Whole-token matching keeps
/// genuine ingredient names that merely contain such letter sequences
/// ("cumin", "minute steak") intact.
fn is_parameter_artifact(reference: &str) -> bool {
    let tokens: Vec<String> = reference
        .split(|c: char| !c.is_alphanumeric() && c != '.' && c != ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    if tokens.is_empty() {
        return true;
    }
    tokens.iter().all(|token| {
        is_numeric_token(token) || PARAMETER_TOKENS.contains(&token.as_str())
    })
}

fn is_numeric_token(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}
