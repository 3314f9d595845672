//! Command handlers for the UniLink CLI.

pub mod ask;
pub mod prompts;
pub mod seed;
pub mod serve;

pub use ask::AskCommand;
pub use prompts::PromptsCommand;
pub use seed::SeedCommand;
pub use serve::ServeCommand;
