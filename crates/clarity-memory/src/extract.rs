//! Model-driven extraction of durable facts from a transcript slice

use clarity_core::{format_transcript, Error, Message, Result};
use clarity_llm::{LlmMessage, LlmProvider, LlmRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EXTRACTION_MAX_TOKENS: u32 = 1000;

/// Validated extraction reply. All three keys are required and must be
/// arrays of strings; any other key (a guessed `user_profile`, say) is
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractedMemory {
    pub preferences: Vec<String>,
    pub work_in_progress: Vec<String>,
    pub open_loops: Vec<String>,
}

impl ExtractedMemory {
    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty() && self.work_in_progress.is_empty() && self.open_loops.is_empty()
    }

    fn cleaned(mut self) -> Self {
        for items in [
            &mut self.preferences,
            &mut self.work_in_progress,
            &mut self.open_loops,
        ] {
            *items = items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        self
    }
}

/// Validate a raw model reply against the extraction schema. The reply
/// must be a single JSON object, optionally wrapped in a ``` fence.
pub fn parse_extraction(raw: &str) -> Result<ExtractedMemory> {
    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        body = rest
            .trim_end()
            .strip_suffix("```")
            .ok_or_else(|| Error::parse("unterminated code fence in extraction reply"))?
            .trim();
    }

    let extracted: ExtractedMemory = serde_json::from_str(body)
        .map_err(|e| Error::parse(format!("extraction reply does not match schema: {}", e)))?;
    Ok(extracted.cleaned())
}

/// Calls the extraction model. Independent of the chat client: it has its
/// own provider handle, model and temperature.
pub struct Extractor {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
}

impl Extractor {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Instruction prompt for a transcript slice.
    pub fn prompt(slice: &[Message]) -> String {
        format!(
            "Read the conversation below and pick out what is worth remembering in \
             later sessions. Keep only facts likely to stay true for weeks: stable \
             preferences, ongoing projects and work items, and questions or tasks \
             left unresolved. Skip moods, small talk and anything one-off. Do not \
             describe who the user is; the profile is maintained separately.\n\n\
             Reply with one JSON object and nothing else, shaped exactly like:\n\
             {{\"preferences\": [\"...\"], \"work_in_progress\": [\"...\"], \"open_loops\": [\"...\"]}}\n\
             Use short phrases. Use an empty array when a category has nothing.\n\n\
             --- Conversation ---\n{}",
            format_transcript(slice)
        )
    }

    /// Ask the model for structured memory. Remote failures come back as
    /// `RemoteCall`, schema violations as `Parse`; the caller's record is
    /// never touched here.
    pub async fn extract(&self, slice: &[Message]) -> Result<ExtractedMemory> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![LlmMessage::user(Self::prompt(slice))],
            max_tokens: Some(EXTRACTION_MAX_TOKENS),
            temperature: Some(self.temperature),
            system: None,
        };

        debug!("Extracting memory from {} messages with {}", slice.len(), self.model);

        let completion = self.provider.complete(request).await.map_err(|e| {
            warn!("Memory extraction call failed: {}", e);
            Error::remote_call(self.provider.name(), e.to_string())
        })?;

        let extracted = match parse_extraction(&completion.text) {
            Ok(e) => e,
            Err(e) => {
                warn!("Discarding extraction reply: {}", e);
                return Err(e);
            }
        };
        if extracted.is_empty() {
            info!("Extraction found nothing to remember");
        } else {
            info!(
                "Extracted {} preferences, {} work items, {} open loops",
                extracted.preferences.len(),
                extracted.work_in_progress.len(),
                extracted.open_loops.len()
            );
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_parses() {
        let e = parse_extraction(
            r#"{"preferences": ["dark mode"], "work_in_progress": [], "open_loops": ["pick a DB"]}"#,
        )
        .unwrap();
        assert_eq!(e.preferences, vec!["dark mode"]);
        assert_eq!(e.open_loops, vec!["pick a DB"]);
    }

    #[test]
    fn fenced_json_parses() {
        let e = parse_extraction(
            "```json\n{\"preferences\": [], \"work_in_progress\": [\"API v2\"], \"open_loops\": []}\n```",
        )
        .unwrap();
        assert_eq!(e.work_in_progress, vec!["API v2"]);
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = parse_extraction(r#"{"preferences": []}"#).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn wrong_item_type_is_rejected() {
        let err = parse_extraction(
            r#"{"preferences": [1, 2], "work_in_progress": [], "open_loops": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn prose_around_json_is_rejected() {
        let err = parse_extraction(
            r#"Sure! {"preferences": [], "work_in_progress": [], "open_loops": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn blank_items_only_is_an_empty_extraction() {
        let extracted = parse_extraction(
            r#"{"preferences": ["  "], "work_in_progress": [""], "open_loops": []}"#,
        )
        .unwrap();
        assert!(extracted.is_empty());
        let extracted = parse_extraction(
            r#"{"preferences": [], "work_in_progress": [], "open_loops": ["ship v2?"]}"#,
        )
        .unwrap();
        assert!(!extracted.is_empty());
    }

    #[test]
    fn profile_key_is_ignored_and_blanks_dropped() {
        let e = parse_extraction(
            r#"{"user_profile": "a cat", "preferences": ["  tea ", ""], "work_in_progress": [], "open_loops": []}"#,
        )
        .unwrap();
        assert_eq!(e.preferences, vec!["tea"]);
    }

    #[test]
    fn prompt_contains_transcript_but_not_system() {
        let prompt = Extractor::prompt(&[
            Message::system("secret boot doc"),
            Message::user("I'm migrating the billing service"),
            Message::assistant("Good luck"),
        ]);
        assert!(prompt.contains("USER: I'm migrating the billing service"));
        assert!(prompt.contains("ASSISTANT: Good luck"));
        assert!(!prompt.contains("secret boot doc"));
    }
}
