//! Detached post-persistence flow for new messages and posts: classify,
//! write the result back, maybe auto-reply, maybe notify the other members.
//!
//! Spawned with `tokio::spawn` from the create handlers; nothing here can
//! fail the request that created the content, so errors are logged and the
//! remaining steps still run.

use crate::AppState;
use crate::routes::community::model::Community;
use crate::routes::message::model::MessageInfo;
use crate::routes::notification::model::{Notification, kinds};
use crate::routes::post::model::PostInfo;

use super::{AnalysisInput, MessageAnalysis, Priority, RECENT_CONTEXT_LIMIT};

pub async fn process_message(state: AppState, message: MessageInfo) {
    // Assistant replies are inserted below; they are never analyzed in turn.
    if message.user_id == state.config.assistant_user_id {
        return;
    }

    let community =
        match Community::find_by_id(&state.pool, &state.redis, &message.community_id).await {
            Ok(Some(community)) => community,
            Ok(None) => {
                tracing::warn!(
                    "Community {} vanished before analysis of message {}",
                    message.community_id,
                    message.message_id
                );
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load community for analysis: {}", e);
                return;
            }
        };

    let recent = match MessageInfo::recent_context(
        &state.pool,
        &message.community_id,
        &message.message_id,
        RECENT_CONTEXT_LIMIT,
    )
    .await
    {
        Ok(recent) => recent,
        Err(e) => {
            tracing::warn!("Failed to load recent context, analyzing without: {}", e);
            Vec::new()
        }
    };

    let input = AnalysisInput {
        community_name: &community.name,
        community_description: &community.description,
        recent: &recent,
        content: &message.content,
    };
    let analysis = state.analyzer.analyze(&input).await;

    if let Err(e) = MessageInfo::store_analysis(&state.pool, &message.message_id, &analysis).await {
        tracing::error!(
            "Failed to store analysis for message {}: {}",
            message.message_id,
            e
        );
    }

    if analysis.wants_auto_reply()
        && analysis.confidence > state.config.analysis_confidence_threshold
    {
        let reply = match state
            .analyzer
            .generate_reply(&community.name, &message.content, &analysis)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Reply generation failed, using canned copy: {}", e);
                canned_reply(&analysis).to_string()
            }
        };

        if let Err(e) = MessageInfo::insert(
            &state.pool,
            &message.community_id,
            &state.config.assistant_user_id,
            &reply,
        )
        .await
        {
            tracing::error!("Failed to post assistant reply: {}", e);
        }
    }

    if analysis.should_fan_out() {
        fan_out_to_members(
            &state,
            &community,
            &message.user_id,
            kinds::URGENT_MESSAGE,
            &analysis,
            &message.content,
        )
        .await;
    }
}

pub async fn process_post(state: AppState, post: PostInfo) {
    let community =
        match Community::find_by_id(&state.pool, &state.redis, &post.community_id).await {
            Ok(Some(community)) => community,
            Ok(None) => {
                tracing::warn!(
                    "Community {} vanished before analysis of post {}",
                    post.community_id,
                    post.post_id
                );
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load community for analysis: {}", e);
                return;
            }
        };

    let content = format!("{}\n{}", post.title, post.content);
    let input = AnalysisInput {
        community_name: &community.name,
        community_description: &community.description,
        recent: &[],
        content: &content,
    };
    let analysis = state.analyzer.analyze(&input).await;

    if let Err(e) = PostInfo::store_analysis(&state.pool, &post.post_id, &analysis).await {
        tracing::error!("Failed to store analysis for post {}: {}", post.post_id, e);
    }

    // Posts have no reply surface; only the notification step applies.
    if analysis.should_fan_out() {
        fan_out_to_members(
            &state,
            &community,
            &post.user_id,
            kinds::URGENT_POST,
            &analysis,
            &content,
        )
        .await;
    }
}

async fn fan_out_to_members(
    state: &AppState,
    community: &Community,
    author_id: &str,
    kind: &str,
    analysis: &MessageAnalysis,
    content: &str,
) {
    let recipients = match Community::member_ids(&state.pool, &community.community_id).await {
        Ok(ids) => ids
            .into_iter()
            .filter(|id| id != author_id)
            .collect::<Vec<_>>(),
        Err(e) => {
            tracing::error!("Failed to load members for fan-out: {}", e);
            return;
        }
    };

    if recipients.is_empty() {
        return;
    }

    let title = format!("Urgent in {}", community.name);
    let body = if analysis.summary.trim().is_empty() {
        snippet(content)
    } else {
        analysis.summary.clone()
    };

    let delivered = Notification::fan_out(
        &state.pool,
        &recipients,
        kind,
        analysis.priority.as_str(),
        &title,
        &body,
        Some(&community.community_id),
    )
    .await;

    tracing::info!(
        "Notified {}/{} members of {}",
        delivered,
        recipients.len(),
        community.community_id
    );
}

/// Fixed reply copy used when generation fails. The urgent and question
/// branches carry distinct wording on purpose.
pub fn canned_reply(analysis: &MessageAnalysis) -> &'static str {
    if analysis.priority == Priority::Urgent {
        "Thanks for flagging this. A community moderator has been notified and will follow up as soon as possible."
    } else {
        "Thanks for your question! A community member should be able to help shortly."
    }
}

fn snippet(content: &str) -> String {
    const MAX_CHARS: usize = 140;
    if content.chars().count() <= MAX_CHARS {
        content.to_string()
    } else {
        let mut s: String = content.chars().take(MAX_CHARS).collect();
        s.push_str("...");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Category;

    #[test]
    fn canned_reply_distinguishes_urgent_from_question() {
        let mut urgent = MessageAnalysis::fallback();
        urgent.priority = Priority::Urgent;
        let mut question = MessageAnalysis::fallback();
        question.category = Category::Question;

        assert_ne!(canned_reply(&urgent), canned_reply(&question));
        assert!(canned_reply(&urgent).contains("moderator"));
    }

    #[test]
    fn urgent_copy_wins_for_urgent_questions() {
        let mut both = MessageAnalysis::fallback();
        both.priority = Priority::Urgent;
        both.category = Category::Question;
        assert!(canned_reply(&both).contains("moderator"));
    }

    #[test]
    fn snippet_truncates_long_content() {
        let short = snippet("hello");
        assert_eq!(short, "hello");

        let long_input: String = std::iter::repeat('x').take(300).collect();
        let long = snippet(&long_input);
        assert!(long.ends_with("..."));
        assert_eq!(long.chars().count(), 143);
    }
}
