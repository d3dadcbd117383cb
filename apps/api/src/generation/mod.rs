//! Generation Service — produces the structured tailored-resume payload and
//! answers free-form chat turns.
//!
//! The workflow engine treats the tailored result as an opaque JSON payload;
//! this module only guarantees it is a JSON object before handing it over.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::llm_client::prompts::{fill_tailor_prompt, TAILOR_SYSTEM};
use crate::llm_client::{ApiMessage, LlmClient, LlmError};
use crate::models::chat::{ChatRole, ChatTranscript};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("unusable generation result: {0}")]
    Unusable(String),
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces the structured tailored-resume result for one candidate/job
    /// pair. Each call is a fresh external request; callers must not assume
    /// idempotence.
    async fn generate_tailored_result(
        &self,
        identity: &str,
        resume_text: &str,
        profile_text: &str,
        job_text: &str,
    ) -> Result<Value, GenerationError>;

    /// Answers the latest user turn given the full transcript so far.
    async fn answer_chat_turn(
        &self,
        transcript: &ChatTranscript,
    ) -> Result<String, GenerationError>;
}

pub struct ClaudeGenerator {
    llm: LlmClient,
}

impl ClaudeGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl GenerationService for ClaudeGenerator {
    async fn generate_tailored_result(
        &self,
        identity: &str,
        resume_text: &str,
        profile_text: &str,
        job_text: &str,
    ) -> Result<Value, GenerationError> {
        info!("Generating tailored resume for user {identity}");

        let prompt = fill_tailor_prompt(resume_text, profile_text, job_text);
        let result: Value = self.llm.call_json(&prompt, TAILOR_SYSTEM).await?;

        if !result.is_object() {
            return Err(GenerationError::Unusable(format!(
                "expected a JSON object, got {}",
                type_name(&result)
            )));
        }

        Ok(result)
    }

    async fn answer_chat_turn(
        &self,
        transcript: &ChatTranscript,
    ) -> Result<String, GenerationError> {
        let (system, messages) = split_transcript(transcript);
        let response = self.llm.call(system, &messages).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        Ok(text.to_string())
    }
}

/// Maps a transcript onto the Messages API shape: the system turn becomes the
/// system prompt, user/assistant turns become the message history in order.
fn split_transcript(transcript: &ChatTranscript) -> (&str, Vec<ApiMessage>) {
    let system = transcript
        .system_turn()
        .map(|t| t.content.as_str())
        .unwrap_or("");

    let messages = transcript
        .turns()
        .iter()
        .filter_map(|turn| match turn.role {
            ChatRole::System => None,
            ChatRole::User => Some(ApiMessage {
                role: "user",
                content: turn.content.clone(),
            }),
            ChatRole::Assistant => Some(ApiMessage {
                role: "assistant",
                content: turn.content.clone(),
            }),
        })
        .collect();

    (system, messages)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_transcript_separates_system_from_history() {
        let mut t = ChatTranscript::with_system("ground truth".to_string());
        t.push_user("How do I open?".to_string());
        t.push_assistant("Lead with impact.".to_string());
        t.push_user("And then?".to_string());

        let (system, messages) = split_transcript(&t);
        assert_eq!(system, "ground truth");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[2].content, "And then?");
    }

    #[test]
    fn test_type_name_labels_non_objects() {
        assert_eq!(type_name(&Value::Null), "null");
        assert_eq!(type_name(&serde_json::json!([1, 2])), "an array");
        assert_eq!(type_name(&serde_json::json!("cv")), "a string");
    }
}
