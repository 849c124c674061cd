use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

use super::MessageAnalysis;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis endpoint not configured")]
    Disabled,
    #[error("analysis API error: {0}")]
    Api(String),
    #[error("analysis API returned status {0}")]
    UpstreamStatus(u16),
    #[error("malformed analysis response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::Api(err.to_string())
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Malformed(err.to_string())
    }
}

/// Everything the classifier gets to see for one message.
pub struct AnalysisInput<'a> {
    pub community_name: &'a str,
    pub community_description: &'a str,
    /// Oldest-first window of prior messages, already formatted as
    /// `nickname: content` lines. At most [`super::RECENT_CONTEXT_LIMIT`].
    pub recent: &'a [String],
    pub content: &'a str,
}

/// Client for an OpenAI-style chat-completions endpoint.
pub struct AnalysisClient {
    http: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl AnalysisClient {
    pub fn new(config: &Config) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            api_url: config.analysis_api_url.clone(),
            api_key: config.analysis_api_key.clone(),
            model: config.analysis_model.clone(),
        })
    }

    /// Classify a message. Never fails: any upstream problem is logged and
    /// replaced with [`MessageAnalysis::fallback`].
    pub async fn analyze(&self, input: &AnalysisInput<'_>) -> MessageAnalysis {
        match self.request_analysis(input).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Analysis call failed, using fallback: {}", e);
                MessageAnalysis::fallback()
            }
        }
    }

    async fn request_analysis(
        &self,
        input: &AnalysisInput<'_>,
    ) -> Result<MessageAnalysis, AnalysisError> {
        let system = "You classify messages posted in local community groups. \
             Respond with a single JSON object and nothing else, with keys: \
             tags (array of up to 5 short lowercase strings), \
             summary (one sentence), \
             priority (LOW, NORMAL, HIGH or URGENT), \
             category (GENERAL, QUESTION, ANNOUNCEMENT, EVENT or HELP), \
             sentiment (POSITIVE, NEUTRAL or NEGATIVE), \
             action_required (boolean), \
             confidence (number between 0 and 1).";

        let mut prompt = format!(
            "Community: {}\nAbout: {}\n",
            input.community_name, input.community_description
        );
        if !input.recent.is_empty() {
            prompt.push_str("Recent messages:\n");
            for line in input.recent {
                prompt.push_str(line);
                prompt.push('\n');
            }
        }
        prompt.push_str("New message:\n");
        prompt.push_str(input.content);

        let text = self.complete(system, &prompt, 300).await?;
        parse_analysis(&text)
    }

    /// Draft a short reply to a message the classifier flagged. Failures here
    /// are surfaced so the caller can substitute canned copy.
    pub async fn generate_reply(
        &self,
        community_name: &str,
        content: &str,
        analysis: &MessageAnalysis,
    ) -> Result<String, AnalysisError> {
        let system = "You are the assistant for a neighborhood community app. \
             Write a brief, friendly reply to the message below. Plain text, \
             at most three sentences, no preamble.";

        let prompt = format!(
            "Community: {}\nMessage ({}, {}): {}",
            community_name,
            analysis.priority.as_str(),
            analysis.category.as_str(),
            content
        );

        let text = self.complete(system, &prompt, 200).await?;
        let reply = text.trim();
        if reply.is_empty() {
            return Err(AnalysisError::Malformed("empty reply".into()));
        }
        Ok(reply.to_string())
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, AnalysisError> {
        let api_url = self.api_url.as_deref().ok_or(AnalysisError::Disabled)?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.2,
            "max_tokens": max_tokens,
        });

        let mut request = self.http.post(api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AnalysisError::UpstreamStatus(response.status().as_u16()));
        }

        let completion: CompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::Malformed("no choices in response".into()))?;

        Ok(choice.message.content)
    }
}

/// Models often wrap the JSON in prose or code fences; take the outermost
/// object and ignore the rest.
fn extract_json_object(text: &str) -> Result<&str, AnalysisError> {
    let start = text
        .find('{')
        .ok_or_else(|| AnalysisError::Malformed("no JSON object in response".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| AnalysisError::Malformed("no closing brace in response".into()))?;
    if end < start {
        return Err(AnalysisError::Malformed("unbalanced braces in response".into()));
    }
    Ok(&text[start..=end])
}

fn parse_analysis(text: &str) -> Result<MessageAnalysis, AnalysisError> {
    let json = extract_json_object(text)?;
    let analysis: MessageAnalysis = serde_json::from_str(json)?;
    Ok(analysis.clamp_tags())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Category, Priority, Sentiment};

    #[test]
    fn parses_json_wrapped_in_prose() {
        let text = r#"Sure! Here is the classification:
{"tags": ["water", "outage"], "summary": "A water outage is reported.",
 "priority": "URGENT", "category": "HELP", "sentiment": "NEGATIVE",
 "action_required": true, "confidence": 0.92}
Let me know if you need anything else."#;

        let a = parse_analysis(text).unwrap();
        assert_eq!(a.tags, vec!["water", "outage"]);
        assert_eq!(a.priority, Priority::Urgent);
        assert_eq!(a.category, Category::Help);
        assert_eq!(a.sentiment, Sentiment::Negative);
        assert!(a.action_required);
        assert!((a.confidence - 0.92).abs() < 1e-9);
    }

    #[test]
    fn response_without_json_is_malformed() {
        assert!(parse_analysis("I could not classify that message.").is_err());
        assert!(parse_analysis("").is_err());
    }

    #[test]
    fn invalid_enum_value_is_malformed() {
        let text = r#"{"priority": "CATASTROPHIC"}"#;
        assert!(parse_analysis(text).is_err());
    }

    #[test]
    fn excess_tags_are_clamped() {
        let text = r#"{"tags": ["a","b","c","d","e","f","g"], "confidence": 0.7}"#;
        let a = parse_analysis(text).unwrap();
        assert_eq!(a.tags.len(), crate::analysis::MAX_TAGS);
    }

    #[test]
    fn extract_handles_braces_inside_strings() {
        let text = r#"prefix {"summary": "use {brackets} carefully"} suffix"#;
        let json = extract_json_object(text).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(json).is_ok());
    }
}
