use serde::Serialize;

use crate::client::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    Tool,
    System,
}

/// One entry in a chat transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Unix seconds when the turn was appended
    pub at: i64,
    /// For `Role::Tool`: the call this turn answers
    pub call: Option<ToolCall>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), at: chrono::Utc::now().timestamp(), call: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn tool(call: ToolCall, content: impl Into<String>) -> Self {
        Self { call: Some(call), ..Self::new(Role::Tool, content) }
    }
}

/// Append-only transcript. Turns cannot be edited or removed once pushed.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Owned copy handed to background sends.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    #[cfg(test)]
    pub fn roles(&self) -> Vec<Role> {
        self.turns.iter().map(|t| t.role).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
