mod client;
pub mod content;

pub use client::SafeFetcher;
pub use content::{extract_page_content, PageContent, TRUNCATION_MARKER};
