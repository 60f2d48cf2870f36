//! The chat orchestration pipeline.
//!
//! A fixed linear sequence per request: persist the question, gate it,
//! classify it, gather context (memory, profile, promotion gap, semantic and
//! structured rule matches, audit findings), call the model, persist the
//! reply. No retries, no branching back. Context lookups degrade to absent
//! blocks on failure; the session/message writes and the model call are the
//! only steps allowed to fail the request.

mod memory;
mod prompt;

pub use memory::build_memory_block;
pub use prompt::{build_prompt, PromptContext, SYSTEM_GUARDRAIL};

use std::sync::Arc;

use crate::appraisal::{AppraisalStore, UserProfile};
use crate::core::errors::ApiError;
use crate::history::HistoryStore;
use crate::llm::provider::LlmProvider;
use crate::llm::types::ChatMessage;
use crate::rag::RuleIndex;

const ALLOWED_KEYWORDS: [&str; 8] = [
    "pbas",
    "score",
    "category",
    "promotion",
    "document",
    "upload",
    "points",
    "rule",
];

const ACTIVITY_KEYWORDS: [&str; 5] = [
    "conference",
    "journal",
    "seminar",
    "workshop",
    "publication",
];

const AUDIT_TRIGGER_KEYWORDS: [&str; 4] = ["why", "rejected", "flagged", "error"];

pub const REFUSAL_REPLY: &str =
    "I am the VERO Academic Assistant. I can only assist with appraisal and document queries.";

#[derive(Clone)]
pub struct PipelineConfig {
    pub chat_model: String,
    pub top_k: usize,
    pub memory_window: i64,
}

#[derive(Clone)]
pub struct ChatPipeline {
    history: HistoryStore,
    appraisal: AppraisalStore,
    rules: Arc<dyn RuleIndex>,
    llm: Arc<dyn LlmProvider>,
    config: PipelineConfig,
}

impl ChatPipeline {
    pub fn new(
        history: HistoryStore,
        appraisal: AppraisalStore,
        rules: Arc<dyn RuleIndex>,
        llm: Arc<dyn LlmProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            history,
            appraisal,
            rules,
            llm,
            config,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        user_id: i64,
        session_id: &str,
    ) -> Result<String, ApiError> {
        self.history.ensure_session(session_id, user_id).await?;
        self.history
            .append_message(session_id, "user", question, Some(user_id))
            .await?;

        if !question_is_allowed(question) {
            self.history
                .append_message(session_id, "assistant", REFUSAL_REPLY, Some(user_id))
                .await?;
            return Ok(REFUSAL_REPLY.to_string());
        }

        let lowered = question.to_lowercase();

        let category = detect_category(question);
        if !self
            .history
            .set_session_category(session_id, category)
            .await?
        {
            tracing::warn!("Category update touched no row for session {}", session_id);
        }

        let recent = self
            .history
            .recent_messages(session_id, self.config.memory_window)
            .await?;
        let memory = build_memory_block(&recent);

        let profile = match self.appraisal.user_profile(user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!("Profile lookup failed for user {}: {}", user_id, err);
                None
            }
        };

        let promotion_info = match &profile {
            Some(profile) if lowered.contains("promotion") => {
                self.promotion_analysis(profile).await
            }
            _ => String::new(),
        };

        let semantic_rules = match self.rules.top_k_similar(question, self.config.top_k).await {
            Ok(snippets) => snippets,
            Err(err) => {
                tracing::warn!("Semantic rule search failed: {}", err);
                Vec::new()
            }
        };

        let academic_level = profile.as_ref().and_then(|p| p.academic_level);
        let structured_rules = match (matched_activity_keyword(&lowered), academic_level) {
            (Some(keyword), Some(level)) => {
                match self.appraisal.search_rules(keyword, level).await {
                    Ok(rules) => rules,
                    Err(err) => {
                        tracing::warn!("Structured rule search for '{}' failed: {}", keyword, err);
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        let mut audit_context = String::new();
        if AUDIT_TRIGGER_KEYWORDS.iter().any(|w| lowered.contains(w)) {
            if let Some(submission_id) = first_numeric_token(question) {
                match self.appraisal.audit_metadata(submission_id).await {
                    Ok(Some(metadata)) => {
                        audit_context = format!("Audit Metadata Found: {}", metadata);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(
                            "Audit metadata lookup for {} failed: {}",
                            submission_id,
                            err
                        );
                    }
                }
            }
        }

        let ctx = PromptContext {
            profile,
            promotion_info,
            memory,
            semantic_rules,
            structured_rules,
            audit_context,
        };
        let prompt = build_prompt(question, &ctx);

        let reply = self
            .llm
            .chat(vec![ChatMessage::user(prompt)], &self.config.chat_model)
            .await?
            .into_text();

        self.history
            .append_message(session_id, "assistant", &reply, Some(user_id))
            .await?;

        Ok(reply)
    }

    /// Only meaningful when the user has a known rank; an unknown rank or a
    /// missing threshold row yields no analysis. The gap is reported as-is,
    /// negative when the threshold is already met.
    async fn promotion_analysis(&self, profile: &UserProfile) -> String {
        let Some(rank) = profile.rank.as_deref() else {
            return String::new();
        };

        let required = match self.appraisal.promotion_threshold(rank).await {
            Ok(required) => required,
            Err(err) => {
                tracing::warn!("Promotion threshold lookup for '{}' failed: {}", rank, err);
                None
            }
        };

        match required {
            Some(required) => {
                let remaining = required - profile.total_score;
                format!(
                    "The user currently has {} points and needs {} more points for promotion.",
                    profile.total_score, remaining
                )
            }
            None => String::new(),
        }
    }
}

fn question_is_allowed(question: &str) -> bool {
    let lowered = question.to_lowercase();
    ALLOWED_KEYWORDS.iter().any(|w| lowered.contains(w))
}

/// First matching rule wins; the order is the priority.
fn detect_category(question: &str) -> &'static str {
    let msg = question.to_lowercase();

    if msg.contains("upload") || msg.contains("certificate") || msg.contains("document") {
        return "upload_help";
    }
    if msg.contains("promotion") || msg.contains("eligible") {
        return "promotion";
    }
    if msg.contains("score") || msg.contains("points") || msg.contains("rule") {
        return "scoring";
    }
    "general"
}

fn matched_activity_keyword(lowered: &str) -> Option<&'static str> {
    ACTIVITY_KEYWORDS.iter().copied().find(|w| lowered.contains(w))
}

/// First whitespace-separated token made up purely of ASCII digits.
fn first_numeric_token(question: &str) -> Option<&str> {
    question
        .split_whitespace()
        .find(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
}
