mod info;
mod variants;
mod verb;

pub use info::cmd_info;
pub use variants::cmd_variants;
pub use verb::{RecipeSource, cmd_verb};
