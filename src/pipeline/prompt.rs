//! Prompt assembly: one fixed guardrail preamble plus every context block the
//! pipeline gathered, in a stable order the model can rely on.

use crate::appraisal::{Rule, UserProfile};

pub const SYSTEM_GUARDRAIL: &str = "You are VERO Academic Assistant.

STRICT RULES:
- Always cite PBAS Rule IDs when giving scores.
- Never guess points.
- Use USER PROFILE data for personalization.
- Explain document statuses in human-friendly language.
- If rule not found, say you cannot find it in PBAS documents.
- Only answer PBAS, promotion, appraisal, or document queries.";

/// Everything gathered ahead of the model call. Blocks left empty are still
/// rendered with their labels so the prompt shape stays fixed.
#[derive(Debug, Default)]
pub struct PromptContext {
    pub profile: Option<UserProfile>,
    pub promotion_info: String,
    pub memory: String,
    pub semantic_rules: Vec<String>,
    pub structured_rules: Vec<Rule>,
    pub audit_context: String,
}

pub fn build_prompt(question: &str, ctx: &PromptContext) -> String {
    let profile_block = match &ctx.profile {
        Some(profile) => format!(
            "user_id={} total_score={} rank={} academic_level={}",
            profile.user_id,
            profile.total_score,
            profile.rank.as_deref().unwrap_or("unknown"),
            profile
                .academic_level
                .map_or_else(|| "unknown".to_string(), |level| level.to_string()),
        ),
        None => "no profile on record".to_string(),
    };

    let semantic_block = ctx.semantic_rules.join("\n");
    let structured_block = ctx
        .structured_rules
        .iter()
        .map(|rule| {
            format!(
                "[rule {}] {}: {} points (max {})",
                rule.rule_id, rule.activity_name, rule.points, rule.max_points
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{guardrail}\n\n\
         USER PROFILE DATA: {profile}\n\
         PROMOTION ANALYSIS: {promotion}\n\
         RECENT CHAT MEMORY:\n{memory}\n\
         SEMANTIC RULE MATCHES:\n{semantic}\n\
         STRUCTURED RULE MATCHES:\n{structured}\n\
         AUDIT FINDINGS: {audit}\n\n\
         USER QUESTION: {question}\n\n\
         Provide a clear, human-friendly answer with proper PBAS rule citations.\n",
        guardrail = SYSTEM_GUARDRAIL,
        profile = profile_block,
        promotion = ctx.promotion_info,
        memory = ctx.memory,
        semantic = semantic_block,
        structured = structured_block,
        audit = ctx.audit_context,
        question = question,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_labels_even_when_context_is_empty() {
        let prompt = build_prompt("What is PBAS?", &PromptContext::default());

        assert!(prompt.starts_with("You are VERO Academic Assistant."));
        assert!(prompt.contains("USER PROFILE DATA: no profile on record"));
        assert!(prompt.contains("PROMOTION ANALYSIS:"));
        assert!(prompt.contains("AUDIT FINDINGS:"));
        assert!(prompt.contains("USER QUESTION: What is PBAS?"));
    }

    #[test]
    fn renders_profile_and_structured_rules() {
        let ctx = PromptContext {
            profile: Some(UserProfile {
                user_id: 7,
                total_score: 40,
                rank: Some("Lecturer".to_string()),
                academic_level: Some(2),
            }),
            structured_rules: vec![Rule {
                rule_id: 12,
                activity_name: "Conference presentation".to_string(),
                points: 10,
                max_points: 30,
            }],
            ..PromptContext::default()
        };

        let prompt = build_prompt("conference points?", &ctx);
        assert!(prompt.contains("user_id=7 total_score=40 rank=Lecturer academic_level=2"));
        assert!(prompt.contains("[rule 12] Conference presentation: 10 points (max 30)"));
    }
}
