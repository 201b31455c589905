//! Conversation turns, the structured model reply and transcript replay.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A source the model cites for its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SourceCitation {
    /// Name of the file providing the information.
    pub file_name: String,
    /// Last update date of the file, as given in the retrieved metadata.
    pub last_updated: String,
    /// Direct URL of the file, copied exactly from the retrieved metadata.
    pub url: String,
}

/// Reply every model invocation must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StructuredReply {
    /// The answer shown to the user.
    pub answer: String,
    /// Search query (at least 30 words) to look up relevant code in the
    /// repository. Omit it when no lookup is needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    /// Unique sources used in the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceCitation>>,
}

impl StructuredReply {
    /// The search query, if the model asked for a non-blank one.
    #[must_use]
    pub fn wants_retrieval(&self) -> Option<&str> {
        self.search_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// One entry of the conversation transcript.
///
/// Serializes as `{"role": "user" | "rag" | "ai", "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content")]
pub enum Turn {
    #[serde(rename = "user")]
    User(String),
    /// Retrieval context injected between the two model calls.
    #[serde(rename = "rag")]
    Context(String),
    #[serde(rename = "ai")]
    Model(StructuredReply),
}

/// The retrieval half of a two-step exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalStep {
    pub query: String,
    pub context: String,
    pub followup: StructuredReply,
}

/// A user question with everything the assistant produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub reply: StructuredReply,
    pub retrieval: Option<RetrievalStep>,
}

impl Exchange {
    /// The reply to show as the answer: the follow-up when retrieval ran.
    #[must_use]
    pub fn final_reply(&self) -> &StructuredReply {
        self.retrieval.as_ref().map_or(&self.reply, |r| &r.followup)
    }

    /// Turns this exchange contributes to the transcript, in order.
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        let mut turns = vec![
            Turn::User(self.question.clone()),
            Turn::Model(self.reply.clone()),
        ];
        if let Some(r) = &self.retrieval {
            turns.push(Turn::Context(r.context.clone()));
            turns.push(Turn::Model(r.followup.clone()));
        }
        turns
    }
}

/// Rebuild exchanges from a transcript by position.
///
/// A model turn asking for retrieval that is followed by a context turn and a
/// second model turn is folded into one exchange. Turns that fit no exchange
/// are skipped.
#[must_use]
pub fn replay(turns: &[Turn]) -> Vec<Exchange> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < turns.len() {
        let (Turn::User(question), Some(Turn::Model(reply))) = (&turns[i], turns.get(i + 1)) else {
            tracing::debug!(position = i, "skipping unpaired turn during replay");
            i += 1;
            continue;
        };
        i += 2;

        let mut retrieval = None;
        if let Some(query) = reply.wants_retrieval()
            && let (Some(Turn::Context(context)), Some(Turn::Model(followup))) =
                (turns.get(i), turns.get(i + 1))
        {
            retrieval = Some(RetrievalStep {
                query: query.to_owned(),
                context: context.clone(),
                followup: followup.clone(),
            });
            i += 2;
        }

        out.push(Exchange {
            question: question.clone(),
            reply: reply.clone(),
            retrieval,
        });
    }
    out
}
