//! Message/post classification through an external text-analysis API.
//!
//! The external call is best-effort: any failure collapses into a fixed
//! fallback analysis instead of an error, because the pipeline runs detached
//! from the request that created the content.

use serde::{Deserialize, Serialize};

mod client;
pub mod pipeline;

pub use client::{AnalysisClient, AnalysisError, AnalysisInput};

/// Upper bound on tags kept from a single analysis.
pub const MAX_TAGS: usize = 5;

/// How many prior messages are sent along as conversation context.
pub const RECENT_CONTEXT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    General,
    Question,
    Announcement,
    Event,
    Help,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "GENERAL",
            Category::Question => "QUESTION",
            Category::Announcement => "ANNOUNCEMENT",
            Category::Event => "EVENT",
            Category::Help => "HELP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Neutral => "NEUTRAL",
            Sentiment::Negative => "NEGATIVE",
        }
    }
}

/// Structured result of one analysis call.
///
/// Unknown or missing fields in the upstream JSON deserialize to the same
/// defaults the fallback uses, so a partially valid response still yields a
/// usable analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAnalysis {
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub action_required: bool,
    #[serde(default)]
    pub confidence: f64,
}

fn default_tags() -> Vec<String> {
    vec!["general".to_string()]
}

impl MessageAnalysis {
    /// The analysis substituted whenever the external call fails.
    pub fn fallback() -> Self {
        Self {
            tags: vec!["general".to_string()],
            summary: String::new(),
            priority: Priority::Normal,
            category: Category::General,
            sentiment: Sentiment::Neutral,
            action_required: false,
            confidence: 0.0,
        }
    }

    /// Keep at most [`MAX_TAGS`] tags, dropping empty ones.
    pub fn clamp_tags(mut self) -> Self {
        self.tags.retain(|t| !t.trim().is_empty());
        self.tags.truncate(MAX_TAGS);
        if self.tags.is_empty() {
            self.tags = default_tags();
        }
        self
    }

    /// Whether the secondary auto-reply step applies, before the confidence
    /// gate is consulted.
    pub fn wants_auto_reply(&self) -> bool {
        self.priority == Priority::Urgent || self.category == Category::Question
    }

    /// Whether the tertiary step notifies the other community members.
    pub fn should_fan_out(&self) -> bool {
        self.priority == Priority::Urgent || self.action_required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_matches_contract() {
        let a = MessageAnalysis::fallback();
        assert_eq!(a.tags, vec!["general"]);
        assert_eq!(a.priority, Priority::Normal);
        assert_eq!(a.category, Category::General);
        assert_eq!(a.sentiment, Sentiment::Neutral);
        assert!(!a.action_required);
        assert_eq!(a.confidence, 0.0);
    }

    #[test]
    fn fallback_triggers_neither_reply_nor_fan_out() {
        let a = MessageAnalysis::fallback();
        assert!(!a.wants_auto_reply());
        assert!(!a.should_fan_out());
    }

    #[test]
    fn urgent_or_question_wants_reply() {
        let mut a = MessageAnalysis::fallback();
        a.priority = Priority::Urgent;
        assert!(a.wants_auto_reply());

        let mut b = MessageAnalysis::fallback();
        b.category = Category::Question;
        assert!(b.wants_auto_reply());

        let mut c = MessageAnalysis::fallback();
        c.priority = Priority::High;
        assert!(!c.wants_auto_reply());
    }

    #[test]
    fn fan_out_on_urgent_or_action_required() {
        let mut a = MessageAnalysis::fallback();
        a.action_required = true;
        assert!(a.should_fan_out());

        let mut b = MessageAnalysis::fallback();
        b.priority = Priority::Urgent;
        assert!(b.should_fan_out());
    }

    #[test]
    fn tags_clamp_to_limit_and_never_empty() {
        let mut a = MessageAnalysis::fallback();
        a.tags = (0..8).map(|i| format!("tag{}", i)).collect();
        let a = a.clamp_tags();
        assert_eq!(a.tags.len(), MAX_TAGS);

        let mut b = MessageAnalysis::fallback();
        b.tags = vec!["  ".into(), String::new()];
        assert_eq!(b.clamp_tags().tags, vec!["general"]);
    }

    #[test]
    fn partial_json_deserializes_with_defaults() {
        let a: MessageAnalysis = serde_json::from_str(r#"{"priority":"URGENT"}"#).unwrap();
        assert_eq!(a.priority, Priority::Urgent);
        assert_eq!(a.category, Category::General);
        assert_eq!(a.tags, vec!["general"]);
    }
}
