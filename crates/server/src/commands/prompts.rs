//! Prompts command handler.

use clap::Args;
use unilink_core::{config::AppConfig, AppResult};
use unilink_prompt::{list_prompts, load_prompt};

/// List the effective chat prompts
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the template of one prompt
    #[arg(long)]
    pub show: Option<String>,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let overrides = config.prompts_dir.as_deref();

        if let Some(ref id) = self.show {
            let prompt = load_prompt(overrides, id)?;
            println!("# {} ({})", prompt.title, prompt.id);
            println!("{}", prompt.template);
            return Ok(());
        }

        for (id, source) in list_prompts(overrides)? {
            println!("{:<16} {}", id, source);
        }
        Ok(())
    }
}
