mod orchestrator;
pub mod prompt;
mod refine;

pub use orchestrator::RecipeExtractor;
pub use refine::{apply_loss_guard, refine_recipe};
