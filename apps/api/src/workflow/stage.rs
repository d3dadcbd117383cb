//! The workflow stage graph.
//!
//! Stages are a closed enum so an unhandled stage is a compile error, and the
//! whole graph stays enumerable: four forward/reset edges in [`Stage::next`]
//! plus one declared recovery edge in [`Stage::on_failure`]. Any
//! (stage, trigger) pair outside the table is rejected with `None` — the
//! caller must not perform side effects or mutate session data for it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    WaitingJobDescription,
    ProcessingLlm,
    JobExploration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    SelectUser,
    JobDescriptionUploaded,
    Finished,
    Menu,
}

impl Stage {
    /// The transition table. `None` means the trigger is invalid for this
    /// stage and must be a no-op.
    pub fn next(self, trigger: Trigger) -> Option<Stage> {
        match (self, trigger) {
            (Stage::Start, Trigger::SelectUser) => Some(Stage::WaitingJobDescription),
            (Stage::WaitingJobDescription, Trigger::JobDescriptionUploaded) => {
                Some(Stage::ProcessingLlm)
            }
            (Stage::ProcessingLlm, Trigger::Finished) => Some(Stage::JobExploration),
            (Stage::JobExploration, Trigger::Menu) => Some(Stage::Start),
            _ => None,
        }
    }

    /// The declared recovery edge: a failed generation pipeline sends the
    /// session back to job selection so the whole pipeline can be retried from
    /// a known-good point. No other stage recovers automatically.
    pub fn on_failure(self) -> Option<Stage> {
        match self {
            Stage::ProcessingLlm => Some(Stage::WaitingJobDescription),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::WaitingJobDescription => "waiting_job_description",
            Stage::ProcessingLlm => "processing_llm",
            Stage::JobExploration => "job_exploration",
        }
    }
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::SelectUser => "select_user",
            Trigger::JobDescriptionUploaded => "job_description_uploaded",
            Trigger::Finished => "finished",
            Trigger::Menu => "menu",
        }
    }

    /// User-facing message emitted when this trigger's transition is granted.
    pub fn message(self) -> &'static str {
        match self {
            Trigger::SelectUser => "Profile loaded. Provide a job description to tailor against.",
            Trigger::JobDescriptionUploaded => {
                "Job description saved. Ready to generate your tailored resume."
            }
            Trigger::Finished => "Your tailored resume is ready. Download it or ask follow-ups.",
            Trigger::Menu => "Session cleared. Start again with an identity.",
        }
    }
}
