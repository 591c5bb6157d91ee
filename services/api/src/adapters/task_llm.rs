//! services/api/src/adapters/task_llm.rs
//!
//! This module contains the adapter for the checklist-title-generating LLM.
//! It implements the `TaskGenerationService` port from the `core` crate.

const BASE_INSTRUCTIONS: &str = r#"You are a habit coach turning a user's goal into a weekly to-do checklist.

Rules:
- Output 2 to 3 task titles, one per line, and nothing else.
- Each title is one short imperative sentence (under 10 words) the user can do on any given day of the week.
- Write in the same language as the goal.
- No numbering, no bullets, no quotes, no explanations.
"#;

const HEALTH_GUIDANCE: &str =
    "Focus on small repeatable physical actions: movement, sleep, hydration, nutrition. \
     Prefer tasks that take under 30 minutes.";
const LEARNING_GUIDANCE: &str =
    "Focus on short daily practice: reading, exercises, review, spaced repetition. \
     Prefer tasks with a concrete unit (pages, problems, minutes).";
const WORK_GUIDANCE: &str =
    "Focus on professional routines: planning, deep-work blocks, follow-ups, skill practice. \
     Avoid tasks that depend on other people being available.";
const DEFAULT_GUIDANCE: &str =
    "Prefer concrete, same-every-day actions over vague intentions.";

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use habit_tracker_core::{
    domain::Goal,
    ports::{PortError, PortResult, TaskGenerationService},
};
use regex::Regex;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TaskGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiTaskAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTaskAdapter {
    /// Creates a new `OpenAiTaskAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Guidance template keyed on the goal's category role-tag.
    fn guidance_for(category: Option<&str>) -> &'static str {
        match category.map(|c| c.to_ascii_lowercase()).as_deref() {
            Some("health") | Some("fitness") => HEALTH_GUIDANCE,
            Some("learning") | Some("study") => LEARNING_GUIDANCE,
            Some("work") | Some("career") => WORK_GUIDANCE,
            _ => DEFAULT_GUIDANCE,
        }
    }

    /// Splits a completion into candidate titles, stripping any bullet or
    /// numbering prefix the model slipped in despite the instructions.
    fn parse_titles(text: &str) -> Vec<String> {
        let prefix = Regex::new(r"^\s*(?:[-*\u{2022}]|\d+[.)])\s*").expect("static regex");
        text.lines()
            .map(|line| prefix.replace(line, "").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

//=========================================================================================
// `TaskGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TaskGenerationService for OpenAiTaskAdapter {
    /// Generates 2-3 short checklist titles for a goal. The caller enforces
    /// the count bound; this adapter only shapes the request and parses the
    /// response.
    async fn generate_task_titles(&self, goal: &Goal) -> PortResult<Vec<String>> {
        let system = format!(
            "{}\nGuidance for this goal:\n{}",
            BASE_INSTRUCTIONS,
            Self::guidance_for(goal.category.as_deref())
        );

        let mut user_input = format!("GOAL: {}\nWHY: {}", goal.title, goal.rationale);
        if let Some(category) = &goal.category {
            user_input.push_str(&format!("\nCATEGORY: {category}"));
        }
        if let Some(target) = &goal.target {
            user_input.push_str(&format!("\nTARGET: {target}"));
        }

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Upstream(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(|e| PortError::Upstream(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Upstream(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Upstream(
                    "Task generation LLM response contained no text content.".to_string(),
                )
            })?;

        Ok(Self::parse_titles(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_bullets_numbering_and_blanks() {
        let text = "1. Run for 20 minutes\n- Stretch after waking up\n\n* Drink two liters of water\n";
        assert_eq!(
            OpenAiTaskAdapter::parse_titles(text),
            vec![
                "Run for 20 minutes",
                "Stretch after waking up",
                "Drink two liters of water",
            ]
        );
    }

    #[test]
    fn guidance_matches_category_tag() {
        assert_eq!(
            OpenAiTaskAdapter::guidance_for(Some("Health")),
            HEALTH_GUIDANCE
        );
        assert_eq!(
            OpenAiTaskAdapter::guidance_for(Some("gardening")),
            DEFAULT_GUIDANCE
        );
        assert_eq!(OpenAiTaskAdapter::guidance_for(None), DEFAULT_GUIDANCE);
    }
}
