use log::debug;
use serde::de::DeserializeOwned;

use crate::error::ExtractError;
use crate::gemini::types::{FinishReason, GenerateContentResponse};

/// Character cap on the raw-text excerpt carried by parse errors
const EXCERPT_CHARS: usize = 500;

/// Validate a model response and return its first text segment.
///
/// Fails distinctly for an empty response, a safety or recitation block,
/// a truncated completion, and any unrecognized finish signal. Only a
/// normal stop proceeds to text extraction.
pub fn validated_text(response: &GenerateContentResponse) -> Result<&str, ExtractError> {
    let candidate = match response.candidates.first() {
        Some(candidate) => candidate,
        None => {
            // A fully blocked prompt produces no candidates; surface the
            // block rather than a generic empty response when flagged.
            if let Some(feedback) = &response.prompt_feedback {
                if feedback.block_reason.is_some() {
                    return Err(ExtractError::SafetyBlocked);
                }
            }
            return Err(ExtractError::EmptyResponse);
        }
    };

    if let Some(raw) = &candidate.finish_reason {
        match FinishReason::from_wire(raw) {
            FinishReason::Stop => {}
            FinishReason::Safety => return Err(ExtractError::SafetyBlocked),
            FinishReason::Recitation => return Err(ExtractError::RecitationBlocked),
            FinishReason::MaxTokens => return Err(ExtractError::Truncated),
            FinishReason::Other(reason) => {
                return Err(ExtractError::UnexpectedFinish(reason))
            }
        }
    }

    let text = candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.iter().find_map(|part| part.text.as_deref()))
        .unwrap_or("");

    if text.trim().is_empty() {
        return Err(ExtractError::EmptyResponse);
    }
    Ok(text)
}

/// Validate a response and decode its text into the target shape.
///
/// This is the single parsing path for every model call in the crate, so
/// all call sites share identical failure semantics. A decode failure
/// carries a bounded excerpt of the offending text, never the full
/// payload.
pub fn parse_typed<T: DeserializeOwned>(
    response: &GenerateContentResponse,
) -> Result<T, ExtractError> {
    let text = validated_text(response)?;
    let stripped = strip_code_fences(text);
    debug!("Decoding {} characters of model output", stripped.len());

    serde_json::from_str(stripped).map_err(|e| ExtractError::Parse {
        message: e.to_string(),
        excerpt: excerpt(stripped),
    })
}

/// Strip markdown code-fence wrapping from model output.
///
/// Handles the common ```json ... ``` form; nested or malformed fences
/// fall back to simple prefix/suffix trimming so a decodable payload is
/// never lost to fence bookkeeping.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "JSON", ...) on the opening fence
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    match body.rfind("```") {
        Some(closing) => body[..closing].trim(),
        // Malformed fence without a closer: trim the prefix only
        None => body.trim(),
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
        out.push('…');
        out
    }
}
