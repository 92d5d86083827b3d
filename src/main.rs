use std::env;
use std::path::PathBuf;

use recipe_extract::{
    convert_to_thermomix, extract_recipe, ExtractionRequest, SourceInput,
};

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "webm", "mkv", "avi"];
const IMAGE_MIMES: [(&str, &str); 5] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let source_arg = args
        .get(1)
        .ok_or("Usage: recipe-extract <url|video|image> [--video-url] [--thermomix <locale>]")?;

    let source = source_for(source_arg, args.iter().any(|a| a == "--video-url")).await?;
    let request = ExtractionRequest::new(source);

    let recipe = extract_recipe(request).await?;

    if let Some(position) = args.iter().position(|a| a == "--thermomix") {
        let locale = args.get(position + 1).map(String::as_str).unwrap_or("en");
        let program = convert_to_thermomix(&recipe, locale).await?;
        println!("{}", serde_json::to_string_pretty(&program)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    }

    Ok(())
}

async fn source_for(arg: &str, video_url: bool) -> Result<SourceInput, Box<dyn std::error::Error>> {
    if arg.starts_with("http://") || arg.starts_with("https://") {
        return Ok(if video_url {
            SourceInput::VideoUrl(arg.to_string())
        } else {
            SourceInput::WebPage(arg.to_string())
        });
    }

    let path = PathBuf::from(arg);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(SourceInput::VideoFile(path));
    }
    if let Some((_, mime)) = IMAGE_MIMES.iter().find(|(ext, _)| *ext == extension) {
        let data = tokio::fs::read(&path).await?;
        return Ok(SourceInput::Image {
            data,
            mime: (*mime).to_string(),
        });
    }

    Err(format!("Cannot tell what kind of source '{arg}' is").into())
}
