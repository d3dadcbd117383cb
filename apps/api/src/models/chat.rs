//! Chat transcript model for the job-exploration assistant.
//!
//! A transcript always starts with exactly one `system` turn, built once from
//! the candidate's resume text, profile text, and the selected job description.
//! The turn list is private: callers can only append `user`/`assistant` turns,
//! so the system turn cannot be edited or displaced after construction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatTranscript {
    turns: Vec<ChatTurn>,
}

impl ChatTranscript {
    /// Builds a fresh transcript whose single system turn carries the given
    /// grounding content.
    pub fn with_system(system_content: String) -> Self {
        Self {
            turns: vec![ChatTurn {
                role: ChatRole::System,
                content: system_content,
            }],
        }
    }

    pub fn push_user(&mut self, content: String) {
        self.turns.push(ChatTurn {
            role: ChatRole::User,
            content,
        });
    }

    pub fn push_assistant(&mut self, content: String) {
        self.turns.push(ChatTurn {
            role: ChatRole::Assistant,
            content,
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn system_turn(&self) -> Option<&ChatTurn> {
        self.turns.first().filter(|t| t.role == ChatRole::System)
    }
}
