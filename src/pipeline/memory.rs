//! Conversation memory formatting.

use crate::history::StoredMessage;

/// Formats a chronological message window as one `ROLE: content` line per
/// message. Pure and deterministic; an empty window yields an empty string.
pub fn build_memory_block(messages: &[StoredMessage]) -> String {
    let mut formatted = String::new();
    for message in messages {
        formatted.push_str(&message.role.to_uppercase());
        formatted.push_str(": ");
        formatted.push_str(&message.content);
        formatted.push('\n');
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: &str, content: &str) -> StoredMessage {
        StoredMessage {
            id: 0,
            session_id: "s1".to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: String::new(),
        }
    }

    #[test]
    fn preserves_order_and_uppercases_roles() {
        let block = build_memory_block(&[message("user", "a"), message("assistant", "b")]);
        assert_eq!(block, "USER: a\nASSISTANT: b\n");
    }

    #[test]
    fn empty_window_is_empty_string() {
        assert_eq!(build_memory_block(&[]), "");
    }
}
