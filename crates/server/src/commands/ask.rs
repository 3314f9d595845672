//! Ask command handler.
//!
//! Runs the chat pipeline once and streams the answer to stdout.

use crate::pipeline::ChatPipeline;
use crate::responder::AnswerStream;
use clap::Args;
use futures::StreamExt;
use std::io::Write;
use unilink_core::{config::AppConfig, AppResult, Question};

/// Ask the campus assistant a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Print the assembled grounding prompt instead of generating an answer
    #[arg(long)]
    pub show_prompt: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = ChatPipeline::from_config(config)?;

        if self.show_prompt {
            let question = Question::parse(&self.question)?;
            let prompt = pipeline.prepare(&question).await?;
            tracing::info!(
                domain = %prompt.domain(),
                evidence = prompt.evidence_count(),
                "Grounding prompt assembled"
            );
            println!("{}", prompt.text());
            return Ok(());
        }

        let answer = pipeline.answer(&self.question).await?;
        let mut stdout = std::io::stdout();
        let result = write_answer(answer, &mut stdout).await;

        // Terminate the line even when the stream was cut off
        writeln!(stdout)?;
        result
    }
}

/// Write each chunk as it arrives.
async fn write_answer<W: Write>(mut answer: AnswerStream, out: &mut W) -> AppResult<()> {
    while let Some(chunk) = answer.next().await {
        out.write_all(chunk?.as_bytes())?;
        out.flush()?;
    }
    tracing::debug!(state = ?answer.state(), chunks = answer.relayed_chunks(), "Answer written");
    Ok(())
}
