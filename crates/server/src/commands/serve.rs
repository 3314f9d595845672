//! Serve command handler.

use crate::http::{router, serve, AppState};
use crate::pipeline::ChatPipeline;
use clap::Args;
use unilink_core::{config::AppConfig, AppResult};

/// Run the chat HTTP API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Bind host
    #[arg(long, env = "UNILINK_HOST")]
    pub host: Option<String>,

    /// Bind port
    #[arg(long, env = "UNILINK_PORT")]
    pub port: Option<u16>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let pipeline = ChatPipeline::from_config(config)?;
        let app = router(AppState::new(pipeline), &config.cors_origins);

        serve(app, &config.bind_addr()).await
    }
}
