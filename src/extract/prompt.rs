use serde_json::{json, Value};

/// The system prompt used for recipe extraction.
///
/// Instructs the model to emit the rejection discriminant instead of
/// inventing content when the source is not a recipe. Loaded from
/// `prompt.txt` at compile time so it can be edited without touching
/// Rust string syntax.
pub const EXTRACTION_PROMPT: &str = include_str!("prompt.txt");

/// Build the extraction system prompt, annotating the output language and
/// detail level when the caller supplied them.
///
/// Both values must already have passed the allow-list validation in
/// [`crate::model`]; they are interpolated verbatim.
pub fn build_extraction_prompt(language: Option<&str>, detail_level: Option<&str>) -> String {
    let mut prompt = EXTRACTION_PROMPT.to_string();

    if let Some(language) = language {
        prompt.push_str(&format!(
            "\nWrite every extracted field in {language}, keeping ingredient names as they are commonly written in that language.\n"
        ));
    }
    if let Some(detail) = detail_level {
        prompt.push_str(&format!(
            "\nThe caller asked for a {detail} level of step detail.\n"
        ));
    }
    prompt
}

/// Response schema for the schema-constrained generation call.
///
/// Mirrors the wire shape of the extraction envelope: either the
/// "notARecipe" discriminant with a reason, or the populated recipe
/// fields.
pub fn extraction_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "notARecipe": {"type": "BOOLEAN"},
            "rejectionReason": {"type": "STRING"},
            "title": {"type": "STRING"},
            "description": {"type": "STRING"},
            "servings": {"type": "INTEGER"},
            "prepTime": {"type": "INTEGER"},
            "cookTime": {"type": "INTEGER"},
            "difficulty": {"type": "STRING", "enum": ["easy", "medium", "hard"]},
            "cuisine": {"type": "STRING"},
            "ingredients": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": {"type": "STRING"},
                        "quantity": {"type": "STRING"},
                        "unit": {"type": "STRING"},
                        "category": {"type": "STRING"},
                        "optional": {"type": "BOOLEAN"},
                        "notes": {"type": "STRING"},
                        "timestamp": {"type": "STRING"}
                    },
                    "required": ["name"]
                }
            },
            "steps": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "number": {"type": "INTEGER"},
                        "instruction": {"type": "STRING"},
                        "duration": {"type": "INTEGER"},
                        "technique": {"type": "STRING"},
                        "temperature": {"type": "STRING"},
                        "startTimestamp": {"type": "STRING"},
                        "endTimestamp": {"type": "STRING"}
                    },
                    "required": ["number", "instruction"]
                }
            },
            "tags": {"type": "ARRAY", "items": {"type": "STRING"}}
        },
        "required": ["notARecipe"]
    })
}

/// Response schema for the refinement call: the recipe fields without
/// the rejection discriminant, which a refinement pass must never emit.
pub fn refinement_response_schema() -> Value {
    let mut schema = extraction_response_schema();
    if let Some(properties) = schema["properties"].as_object_mut() {
        properties.remove("notARecipe");
        properties.remove("rejectionReason");
    }
    schema["required"] = json!(["title", "ingredients", "steps"]);
    schema
}
