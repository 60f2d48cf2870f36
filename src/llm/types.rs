use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Model output, tagged once at the provider boundary. Providers that wrap
/// their text in a message envelope produce `Structured`; bare-completion
/// payloads produce `PlainText`. Downstream code only ever sees the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmReply {
    PlainText(String),
    Structured { content: String },
}

impl LlmReply {
    pub fn into_text(self) -> String {
        match self {
            LlmReply::PlainText(text) => text,
            LlmReply::Structured { content } => content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_collapses_to_text() {
        assert_eq!(LlmReply::PlainText("a".to_string()).into_text(), "a");
        assert_eq!(
            LlmReply::Structured {
                content: "b".to_string()
            }
            .into_text(),
            "b"
        );
    }
}
