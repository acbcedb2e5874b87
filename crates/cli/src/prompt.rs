use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::Mutex;
use tracing::debug;

use courseplan_core::domain::course::Course;
use courseplan_core::sources::{ConflictResolver, Decision, SourceError};

/// Asks on stderr whether an incoming course should replace the one holding
/// its slot, reading answers line by line. End of input and unrecognized
/// answers keep the existing course.
pub struct PromptResolver<R> {
    lines: Mutex<Lines<R>>,
}

impl<R> PromptResolver<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { lines: Mutex::new(reader.lines()) }
    }
}

impl PromptResolver<tokio::io::BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()))
    }
}

pub fn parse_answer(answer: &str) -> Decision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "r" | "replace" | "y" | "yes" | "取代" => Decision::Replace,
        _ => Decision::Keep,
    }
}

#[async_trait]
impl<R> ConflictResolver for PromptResolver<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn resolve(&self, incoming: &Course, existing: &Course) -> Result<Decision, SourceError> {
        eprintln!(
            "{}-{} {} ({}) conflicts with {}-{} {} ({}). Replace? [r]eplace/[k]eep",
            incoming.code,
            incoming.serial,
            incoming.name,
            incoming.time_label(),
            existing.code,
            existing.serial,
            existing.name,
            existing.time_label(),
        );

        let mut lines = self.lines.lock().await;
        let answer = lines.next_line().await.map_err(|error| SourceError::Io(error.to_string()))?;
        let decision = answer.as_deref().map_or(Decision::Keep, parse_answer);
        debug!(
            event_name = "import.prompt_answered",
            incoming = %incoming.key(),
            existing = %existing.key(),
            decision = ?decision,
            "conflict decision read"
        );
        Ok(decision)
    }
}
