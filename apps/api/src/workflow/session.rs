//! Per-session mutable state.
//!
//! One `SessionState` value is owned by one active session and passed by
//! mutable reference into the workflow engine; it is never shared across
//! sessions. The engine is the only writer of `stage`, and only after the
//! side effects owed by the current stage have succeeded.

use serde::Serialize;
use serde_json::Value;

use crate::models::chat::ChatTranscript;
use crate::workflow::stage::Stage;

/// Cached result of an identity lookup, keyed by the exact typed input.
/// A changed input invalidates the cache; an unchanged one answers without
/// another gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityCheck {
    pub input: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    stage: Stage,
    pub identity: Option<String>,
    pub resume_text: String,
    pub profile_text: String,
    pub job_id: Option<i64>,
    pub job_text: String,
    pub generated_result: Option<Value>,
    pub transcript: Option<ChatTranscript>,
    pub identity_check: Option<IdentityCheck>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Start,
            identity: None,
            resume_text: String::new(),
            profile_text: String::new(),
            job_id: None,
            job_text: String::new(),
            generated_result: None,
            transcript: None,
            identity_check: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Clears everything, including any cached identity check and unsent chat
    /// state, and returns the session to `start`.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Snapshot handed to the presentation layer.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            identity: self.identity.clone(),
            job_id: self.job_id,
            has_generated_result: self.generated_result.is_some(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub stage: Stage,
    pub identity: Option<String>,
    pub job_id: Option<i64>,
    pub has_generated_result: bool,
}
