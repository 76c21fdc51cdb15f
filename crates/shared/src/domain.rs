use serde::{Deserialize, Serialize};

use crate::protocol::AskResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Never mutated after it has been appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sections: None,
            follow_up: None,
            is_error: false,
        }
    }

    pub fn assistant(answer: AskResponse) -> Self {
        Self {
            role: Role::Assistant,
            content: answer.answer,
            sections: answer.relevant_sections,
            follow_up: answer.follow_up_questions,
            is_error: false,
        }
    }

    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sections: None,
            follow_up: None,
            is_error: true,
        }
    }

    pub fn sections(&self) -> &[String] {
        self.sections.as_deref().unwrap_or_default()
    }

    pub fn follow_ups(&self) -> &[String] {
        self.follow_up.as_deref().unwrap_or_default()
    }
}
