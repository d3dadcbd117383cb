//! Chat sub-workflow — active only within `job_exploration`.
//!
//! The transcript is loaded (or bootstrapped) lazily on first access. A chat
//! round-trip appends the user turn, obtains the assistant turn, and persists
//! the snapshot once per completed round-trip; the session only adopts the new
//! turns after persistence succeeds, so neither store nor session ever holds a
//! dangling unanswered user turn.

use serde::Serialize;
use tracing::info;

use crate::llm_client::prompts::fill_chat_system;
use crate::models::chat::ChatTranscript;
use crate::workflow::machine::Workflow;
use crate::workflow::session::SessionState;
use crate::workflow::stage::Stage;
use crate::workflow::WorkflowError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub assistant: String,
    pub transcript_len: usize,
}

impl Workflow {
    /// Loads the persisted transcript for `(identity, job_id)` on first entry,
    /// or constructs a fresh one whose system turn is built from the resume
    /// text, profile text, and selected job description.
    pub(crate) async fn ensure_transcript(
        &self,
        session: &mut SessionState,
    ) -> Result<(), WorkflowError> {
        if session.stage() != Stage::JobExploration {
            return Err(WorkflowError::InvalidTrigger {
                stage: session.stage(),
                action: "chat",
            });
        }
        if session.transcript.is_some() {
            return Ok(());
        }

        let identity = session
            .identity
            .clone()
            .ok_or_else(|| WorkflowError::Validation("No identity in this session.".to_string()))?;
        let job_id = session.job_id.ok_or_else(|| {
            WorkflowError::Validation("No job selected for this session.".to_string())
        })?;

        let stored = self
            .gateway
            .get_chat_history(&identity, job_id)
            .await
            .map_err(|e| WorkflowError::Persistence(e.to_string()))?;

        session.transcript = Some(match stored {
            Some(transcript) => {
                info!("Loaded persisted chat history for {identity}/job {job_id}");
                transcript
            }
            None => ChatTranscript::with_system(fill_chat_system(
                &session.resume_text,
                &session.profile_text,
                &session.job_text,
            )),
        });
        Ok(())
    }

    /// Returns the current transcript for display, loading it if needed.
    pub async fn transcript(
        &self,
        session: &mut SessionState,
    ) -> Result<ChatTranscript, WorkflowError> {
        self.ensure_transcript(session).await?;
        Ok(session
            .transcript
            .clone()
            .expect("ensure_transcript guarantees presence"))
    }

    /// One chat round-trip. The persisted snapshot is taken exactly once, after
    /// both the user's and the assistant's turns are appended; on any failure
    /// the session transcript is left as it was before the round-trip.
    pub async fn send_chat_turn(
        &self,
        session: &mut SessionState,
        text: &str,
    ) -> Result<ChatReply, WorkflowError> {
        self.ensure_transcript(session).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkflowError::Validation(
                "Enter a message to send.".to_string(),
            ));
        }

        let identity = session
            .identity
            .clone()
            .ok_or_else(|| WorkflowError::Validation("No identity in this session.".to_string()))?;
        let job_id = session.job_id.ok_or_else(|| {
            WorkflowError::Validation("No job selected for this session.".to_string())
        })?;

        // Work on a copy; the session adopts it only after the full round-trip
        // (generation + persistence) has succeeded.
        let mut updated = session
            .transcript
            .clone()
            .expect("ensure_transcript guarantees presence");
        updated.push_user(text.to_string());

        let assistant = self
            .generator
            .answer_chat_turn(&updated)
            .await
            .map_err(|e| WorkflowError::Generation(e.to_string()))?;
        updated.push_assistant(assistant.clone());

        self.gateway
            .save_chat_history(&identity, job_id, &updated)
            .await
            .map_err(|e| WorkflowError::Persistence(e.to_string()))?;

        let transcript_len = updated.len();
        session.transcript = Some(updated);
        Ok(ChatReply {
            assistant,
            transcript_len,
        })
    }
}
