use html_escape::decode_html_entities;
use log::debug;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Marker appended when extracted text hits the character cap
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Elements that never carry recipe content
const SKIPPED_TAGS: [&str; 11] = [
    "script", "style", "nav", "header", "footer", "aside", "form", "noscript", "iframe", "svg",
    "button",
];

/// Class fragments used by common recipe plugins, tried when no
/// structured metadata block is present
const RECIPE_CONTAINER_CLASSES: [&str; 8] = [
    "wprm-recipe-container",
    "tasty-recipes",
    "mv-create-card",
    "recipe-card",
    "recipe-content",
    "recipe-instructions",
    "recipe-ingredients",
    "recipe",
];

/// Recipe text and representative image pulled from a fetched page
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub text: String,
    pub image_url: Option<String>,
    pub truncated: bool,
}

/// Extract recipe text and a representative image from an HTML page.
///
/// Preference order for text: JSON-LD Recipe metadata, known
/// recipe-container regions, whole-page text with non-content elements
/// stripped. Output is capped at `max_chars` characters with an explicit
/// truncation marker appended.
pub fn extract_page_content(html: &str, max_chars: usize) -> PageContent {
    let document = Html::parse_document(html);

    let raw = match recipe_text_from_json_ld(&document) {
        Some(text) => {
            debug!("Using JSON-LD recipe metadata");
            text
        }
        None => match recipe_text_from_containers(&document) {
            Some(text) => {
                debug!("Using recipe container regions");
                text
            }
            None => {
                debug!("Falling back to whole-page text");
                whole_page_text(&document)
            }
        },
    };

    let (text, truncated) = truncate_chars(raw, max_chars);
    PageContent {
        text,
        image_url: find_image_url(&document),
        truncated,
    }
}

/// Resolve a representative image URL with a fixed priority: social
/// preview large-image metadata, social preview fallback, structured-data
/// thumbnail/image fields. First match wins.
pub fn find_image_url(document: &Html) -> Option<String> {
    let og = Selector::parse(r#"meta[property="og:image"]"#).unwrap();
    if let Some(url) = document
        .select(&og)
        .find_map(|el| el.value().attr("content"))
        .filter(|url| !url.is_empty())
    {
        return Some(decode_html_entities(url).into_owned());
    }

    let twitter = Selector::parse(r#"meta[name="twitter:image"], meta[property="twitter:image"]"#)
        .unwrap();
    if let Some(url) = document
        .select(&twitter)
        .find_map(|el| el.value().attr("content"))
        .filter(|url| !url.is_empty())
    {
        return Some(decode_html_entities(url).into_owned());
    }

    for node in json_ld_recipe_nodes(document) {
        for key in ["thumbnailUrl", "image"] {
            if let Some(url) = image_field_url(&node[key]) {
                return Some(url);
            }
        }
    }
    None
}

/// An image field can be a string, a list, or a nested ImageObject
fn image_field_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(image_field_url),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn recipe_text_from_json_ld(document: &Html) -> Option<String> {
    let node = json_ld_recipe_nodes(document).into_iter().next()?;
    let mut lines: Vec<String> = Vec::new();

    if let Some(name) = node["name"].as_str() {
        lines.push(decode_html_entities(name).into_owned());
    }
    if let Some(description) = node["description"].as_str() {
        lines.push(decode_html_entities(description).into_owned());
    }

    if let Some(ingredients) = node["recipeIngredient"].as_array() {
        lines.push("Ingredients:".to_string());
        for ingredient in ingredients.iter().filter_map(Value::as_str) {
            lines.push(decode_html_entities(ingredient).into_owned());
        }
    }

    let mut instructions: Vec<String> = Vec::new();
    collect_instructions(&node["recipeInstructions"], &mut instructions);
    if !instructions.is_empty() {
        lines.push("Instructions:".to_string());
        lines.extend(instructions);
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// recipeInstructions come as a string, a list of strings, a list of
/// HowToStep objects, or HowToSection objects nesting more of the same
fn collect_instructions(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            out.push(decode_html_entities(s.trim()).into_owned())
        }
        Value::Array(items) => {
            for item in items {
                collect_instructions(item, out);
            }
        }
        Value::Object(obj) => {
            if let Some(text) = obj.get("text").and_then(Value::as_str) {
                out.push(decode_html_entities(text.trim()).into_owned());
            } else if let Some(nested) = obj.get("itemListElement") {
                collect_instructions(nested, out);
            }
        }
        _ => {}
    }
}

/// All JSON-LD nodes on the page whose @type is (or includes) Recipe
fn json_ld_recipe_nodes(document: &Html) -> Vec<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
    let mut nodes = Vec::new();

    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        collect_recipe_nodes(&value, &mut nodes);
    }
    nodes
}

fn collect_recipe_nodes(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Object(obj) => {
            if is_recipe_type(obj.get("@type")) {
                out.push(value.clone());
            }
            if let Some(graph) = obj.get("@graph") {
                collect_recipe_nodes(graph, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_recipe_nodes(item, out);
            }
        }
        _ => {}
    }
}

fn is_recipe_type(type_field: Option<&Value>) -> bool {
    match type_field {
        Some(Value::String(s)) => s.eq_ignore_ascii_case("recipe"),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.eq_ignore_ascii_case("recipe")),
        _ => false,
    }
}

fn recipe_text_from_containers(document: &Html) -> Option<String> {
    for class in RECIPE_CONTAINER_CLASSES {
        let selector = Selector::parse(&format!(r#"[class~="{class}"]"#)).unwrap();
        let fragments: Vec<String> = document
            .select(&selector)
            .map(|el| element_text(el))
            .filter(|text| !text.trim().is_empty())
            .collect();
        if !fragments.is_empty() {
            return Some(fragments.join("\n"));
        }
    }
    None
}

fn whole_page_text(document: &Html) -> String {
    let body = Selector::parse("body").unwrap();
    document
        .select(&body)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Collect an element's text while skipping non-content subtrees
fn element_text(element: ElementRef<'_>) -> String {
    let mut fragments: Vec<String> = Vec::new();
    collect_text(element, &mut fragments);
    fragments.join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    if SKIPPED_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push(decode_html_entities(trimmed).into_owned());
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, out);
        }
    }
}

/// Truncate at a character boundary, never a byte boundary
fn truncate_chars(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut truncated = text[..byte_index].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            (truncated, true)
        }
        None => (text, false),
    }
}
