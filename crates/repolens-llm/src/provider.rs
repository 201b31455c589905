use std::future::Future;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Chat-capable language model.
///
/// Implementations decode deterministically (temperature 0) so that the
/// same transcript yields the same reply against a fixed model.
pub trait LlmProvider: Send + Sync {
    /// Send messages to the model and return the raw assistant text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String>> + Send;

    /// Ask for a reply shaped like `T` and validate it strictly.
    ///
    /// The default appends the JSON schema of `T` as a trailing system
    /// instruction and parses the reply with `serde`. Backends with native
    /// schema support override this.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::StructuredParse`] when the reply does not match `T`.
    fn chat_typed<T>(&self, messages: &[Message]) -> impl Future<Output = Result<T>> + Send
    where
        T: DeserializeOwned + JsonSchema + Send,
        Self: Sized,
    {
        async move {
            let mut with_schema = messages.to_vec();
            with_schema.push(Message::system(schema_instruction::<T>()?));
            let raw = self.chat(&with_schema).await?;
            parse_structured::<T>(&raw)
        }
    }

    fn name(&self) -> &'static str;
}

/// Input type hint for embedding backends that embed documents and queries differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    Document,
    Query,
}

impl EmbedMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "search_document",
            Self::Query => "search_query",
        }
    }
}

pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    ///
    /// # Errors
    ///
    /// Returns an error on transport, credential or rate limit failure.
    fn embed(&self, text: &str, mode: EmbedMode) -> impl Future<Output = Result<Vec<f32>>> + Send;

    /// Embed several texts, preserving input order.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any text fails.
    fn embed_batch(
        &self,
        texts: &[String],
        mode: EmbedMode,
    ) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send {
        async move {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text, mode).await?);
            }
            Ok(out)
        }
    }

    fn name(&self) -> &'static str;
}

/// One entry of a rerank response: position in the submitted documents plus relevance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    pub relevance: f32,
}

pub trait RerankProvider: Send + Sync {
    /// Score `documents` against `query`, best first, at most `top_n` hits.
    ///
    /// # Errors
    ///
    /// Returns an error on transport, credential or rate limit failure.
    fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> impl Future<Output = Result<Vec<RerankHit>>> + Send;

    fn name(&self) -> &'static str;
}

/// JSON schema of `T` rendered as a pretty string.
///
/// # Errors
///
/// Returns [`LlmError::StructuredParse`] if the schema cannot be serialized.
pub fn schema_json<T: JsonSchema>() -> Result<serde_json::Value> {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(&schema).map_err(|e| LlmError::StructuredParse(e.to_string()))
}

fn schema_instruction<T: JsonSchema>() -> Result<String> {
    let schema = schema_json::<T>()?;
    let pretty =
        serde_json::to_string_pretty(&schema).map_err(|e| LlmError::StructuredParse(e.to_string()))?;
    Ok(format!(
        "Reply with exactly one JSON object that validates against this JSON schema. \
         No prose and no markdown fences.\n{pretty}"
    ))
}

/// Parse a model reply into `T`, tolerating a surrounding markdown fence.
///
/// # Errors
///
/// Returns [`LlmError::StructuredParse`] when the payload is not a valid `T`.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = strip_fence(raw.trim());
    serde_json::from_str::<T>(body).map_err(|e| LlmError::StructuredParse(e.to_string()))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Verdict {
        answer: String,
        #[serde(default)]
        query: Option<String>,
    }

    struct Canned(&'static str);

    impl LlmProvider for Canned {
        async fn chat(&self, messages: &[Message]) -> Result<String> {
            let last = messages.last().expect("schema instruction appended");
            assert_eq!(last.role, Role::System);
            assert!(last.content.contains("\"answer\""));
            Ok(self.0.to_owned())
        }

        fn name(&self) -> &'static str {
            "canned"
        }
    }

    #[tokio::test]
    async fn chat_typed_parses_valid_reply() {
        let p = Canned(r#"{"answer":"yes"}"#);
        let v: Verdict = p.chat_typed(&[Message::user("q")]).await.unwrap();
        assert_eq!(
            v,
            Verdict {
                answer: "yes".into(),
                query: None
            }
        );
    }

    #[tokio::test]
    async fn chat_typed_rejects_unknown_fields() {
        let p = Canned(r#"{"answer":"yes","mood":"happy"}"#);
        let err = p
            .chat_typed::<Verdict>(&[Message::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::StructuredParse(_)));
    }

    #[tokio::test]
    async fn chat_typed_rejects_missing_required() {
        let p = Canned(r#"{"query":"x"}"#);
        let err = p
            .chat_typed::<Verdict>(&[Message::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::StructuredParse(_)));
    }

    #[test]
    fn fenced_reply_is_accepted() {
        let v: Verdict = parse_structured("```json\n{\"answer\":\"ok\"}\n```").unwrap();
        assert_eq!(v.answer, "ok");
    }

    #[test]
    fn embed_mode_wire_names() {
        assert_eq!(EmbedMode::Document.as_str(), "search_document");
        assert_eq!(EmbedMode::Query.as_str(), "search_query");
    }

    #[test]
    fn message_constructors_set_role() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::assistant("a").role.as_str(), "assistant");
    }
}
