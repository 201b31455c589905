//! Two-step conversation turns: the model may ask for a repository search,
//! gets the retrieved context, and answers again.

use repolens_index::RepoSnapshot;
use repolens_llm::LlmProvider;
use repolens_llm::provider::Message;

use crate::error::{ChatError, Result};
use crate::prompt::system_prompt;
use crate::rag::{DeduplicatingSession, RetrievalSession, SeenNodes};
use crate::transcript::{Exchange, RetrievalStep, StructuredReply, Turn, replay};

/// Result of one submitted user message.
pub type TurnOutcome = Exchange;

/// Where a turn is inside `Orchestrator::submit`.
///
/// `submit` holds the session mutably for the whole turn and always returns it
/// to `Idle`, so callers only ever read `Idle`. The intermediate states show
/// up in the `session state` debug events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingModel,
    AwaitingRetrieval,
    AwaitingFollowupModel,
}

/// Conversation about one repository: transcript, seen-node set and state.
pub struct ConversationSession<S> {
    repo_id: String,
    system_prompt: String,
    transcript: Vec<Turn>,
    rag: DeduplicatingSession<S>,
    state: SessionState,
}

impl<S: RetrievalSession> ConversationSession<S> {
    /// Start a conversation about `snapshot`, with its structure baked into the system prompt.
    #[must_use]
    pub fn new(snapshot: &RepoSnapshot, retrieval: S) -> Self {
        Self::with_prompt(
            snapshot.id.clone(),
            system_prompt(&snapshot.structure),
            retrieval,
        )
    }

    #[must_use]
    pub fn with_prompt(repo_id: String, system_prompt: String, retrieval: S) -> Self {
        Self {
            repo_id,
            system_prompt,
            transcript: Vec::new(),
            rag: DeduplicatingSession::new(retrieval),
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    #[must_use]
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// `Idle` between turns, including after a failed one.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn seen(&self) -> &SeenNodes {
        self.rag.seen()
    }

    #[must_use]
    pub fn replay(&self) -> Vec<Exchange> {
        replay(&self.transcript)
    }

    /// Drop the transcript and forget which chunks were shown.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.rag.reset();
        self.state = SessionState::Idle;
        tracing::debug!(repo = %self.repo_id, "conversation cleared");
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(repo = %self.repo_id, from = ?self.state, to = ?state, "session state");
        self.state = state;
    }

    fn messages(&self, staged: &[Turn]) -> Result<Vec<Message>> {
        let mut messages = Vec::with_capacity(self.transcript.len() + staged.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        for turn in self.transcript.iter().chain(staged) {
            messages.push(match turn {
                Turn::User(text) | Turn::Context(text) => Message::user(text.clone()),
                Turn::Model(reply) => Message::assistant(serde_json::to_string(reply)?),
            });
        }
        Ok(messages)
    }
}

/// Drives conversation turns against a chat model.
pub struct Orchestrator<P> {
    provider: P,
}

impl<P: LlmProvider> Orchestrator<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run one user turn to completion.
    ///
    /// The transcript grows by two turns, or four when the model asked for a
    /// search. On any failure nothing is appended, the seen-node set is
    /// rolled back and the session returns to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns `ModelInvocation` if a model call fails or its reply does not
    /// match the schema, and `Retrieval` if the repository search fails.
    pub async fn submit<S: RetrievalSession>(
        &self,
        session: &mut ConversationSession<S>,
        text: &str,
    ) -> Result<TurnOutcome> {
        let checkpoint = session.rag.checkpoint();
        match self.run_turn(session, text).await {
            Ok(exchange) => {
                session.transcript.extend(exchange.turns());
                session.set_state(SessionState::Idle);
                tracing::info!(
                    repo = %session.repo_id,
                    retrieval = exchange.retrieval.is_some(),
                    turns = session.transcript.len(),
                    "turn completed"
                );
                Ok(exchange)
            }
            Err(e) => {
                session.rag.restore(checkpoint);
                session.set_state(SessionState::Idle);
                tracing::warn!(repo = %session.repo_id, "turn failed, discarded: {e}");
                Err(e)
            }
        }
    }

    async fn run_turn<S: RetrievalSession>(
        &self,
        session: &mut ConversationSession<S>,
        text: &str,
    ) -> Result<Exchange> {
        let mut staged = vec![Turn::User(text.to_owned())];

        session.set_state(SessionState::AwaitingModel);
        let reply = self.invoke(&session.messages(&staged)?).await?;

        let Some(query) = reply.wants_retrieval().map(str::to_owned) else {
            return Ok(Exchange {
                question: text.to_owned(),
                reply,
                retrieval: None,
            });
        };
        staged.push(Turn::Model(reply.clone()));

        session.set_state(SessionState::AwaitingRetrieval);
        tracing::debug!(repo = %session.repo_id, query = %query, "model requested retrieval");
        let context = session.rag.query(&query).await?;
        staged.push(Turn::Context(context.clone()));

        session.set_state(SessionState::AwaitingFollowupModel);
        let followup = self.invoke(&session.messages(&staged)?).await?;

        Ok(Exchange {
            question: text.to_owned(),
            reply,
            retrieval: Some(RetrievalStep {
                query,
                context,
                followup,
            }),
        })
    }

    async fn invoke(&self, messages: &[Message]) -> Result<StructuredReply> {
        self.provider
            .chat_typed::<StructuredReply>(messages)
            .await
            .map_err(ChatError::ModelInvocation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use repolens_index::IndexError;
    use repolens_index::store::{Candidate, ChunkMetadata};
    use repolens_llm::mock::MockProvider;
    use repolens_llm::provider::Role;
    use uuid::Uuid;

    use super::*;
    use crate::rag::ALL_SEEN;

    struct Fixed {
        candidates: Vec<Candidate>,
        fail: Mutex<bool>,
    }

    impl Fixed {
        fn new(ids: &[u128]) -> Self {
            let candidates = ids
                .iter()
                .map(|&n| Candidate {
                    id: Uuid::from_u128(n),
                    metadata: ChunkMetadata {
                        source: "main.cpp".into(),
                        source_url: "https://github.com/acme/widgets/blob/abc/main.cpp".into(),
                        source_last_updated: "2024-05-01 10:00:00".into(),
                        path: "main.cpp".into(),
                        language: "cpp".into(),
                        lines: (1, 20),
                    },
                    text: format!("// file name: main.cpp\nint part{n}();"),
                    score: 0.9,
                })
                .collect();
            Self {
                candidates,
                fail: Mutex::new(false),
            }
        }
    }

    impl RetrievalSession for Fixed {
        async fn retrieve(&self, _query: &str) -> std::result::Result<Vec<Candidate>, IndexError> {
            if *self.fail.lock().unwrap() {
                return Err(IndexError::IndexNotFound {
                    repo_id: "acme/widgets".into(),
                });
            }
            Ok(self.candidates.clone())
        }
    }

    fn session(ids: &[u128]) -> ConversationSession<Fixed> {
        session_over(Fixed::new(ids))
    }

    fn session_over(retrieval: Fixed) -> ConversationSession<Fixed> {
        let snapshot = RepoSnapshot {
            id: "acme/widgets".into(),
            url: "https://github.com/acme/widgets".into(),
            path: "repos/acme/widgets".into(),
            commit_hash: "abc".into(),
            last_updated: "2024-05-01 10:00:00".into(),
            structure: "├── widgets\n└── main.cpp".into(),
        };
        ConversationSession::new(&snapshot, retrieval)
    }

    const ASKS_SEARCH: &str =
        r#"{"answer":"Let me look.","search_query":"main function entry point in main.cpp"}"#;
    const FINAL: &str = r#"{"answer":"main() starts the app.","sources":[{"file_name":"main.cpp","last_updated":"2024-05-01 10:00:00","url":"https://github.com/acme/widgets/blob/abc/main.cpp"}]}"#;

    #[tokio::test]
    async fn direct_answer_adds_two_turns() {
        let orch = Orchestrator::new(MockProvider::with_responses(vec![
            r#"{"answer":"Hello!"}"#.into(),
        ]));
        let mut s = session(&[1]);
        let out = orch.submit(&mut s, "hi").await.unwrap();
        assert_eq!(out.final_reply().answer, "Hello!");
        assert!(out.retrieval.is_none());
        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.seen().is_empty());
    }

    #[tokio::test]
    async fn search_request_adds_four_turns() {
        let provider = MockProvider::with_responses(vec![ASKS_SEARCH.into(), FINAL.into()]);
        let orch = Orchestrator::new(provider.clone());
        let mut s = session(&[1, 2]);
        let out = orch.submit(&mut s, "what does main.cpp do?").await.unwrap();

        let step = out.retrieval.as_ref().unwrap();
        assert_eq!(step.query, "main function entry point in main.cpp");
        assert!(step.context.contains("1. {"));
        assert_eq!(out.final_reply().answer, "main() starts the app.");
        let sources = out.final_reply().sources.as_ref().unwrap();
        assert_eq!(sources[0].file_name, "main.cpp");

        assert_eq!(s.transcript().len(), 4);
        assert!(matches!(s.transcript()[2], Turn::Context(_)));
        assert_eq!(s.seen().len(), 2);
        assert_eq!(s.state(), SessionState::Idle);

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0].role, Role::System);
        assert!(calls[0][0].content.contains("└── main.cpp"));
        let second: Vec<_> = calls[1].iter().map(|m| m.content.as_str()).collect();
        assert!(second.iter().any(|c| c.starts_with("Use this as code context")));
    }

    #[tokio::test]
    async fn second_identical_search_gets_all_seen_context() {
        let provider = MockProvider::with_responses(vec![
            ASKS_SEARCH.into(),
            FINAL.into(),
            ASKS_SEARCH.into(),
            FINAL.into(),
        ]);
        let orch = Orchestrator::new(provider);
        let mut s = session(&[1]);
        orch.submit(&mut s, "what does main.cpp do?").await.unwrap();
        let out = orch.submit(&mut s, "and again?").await.unwrap();
        assert!(out.retrieval.unwrap().context.ends_with(ALL_SEEN));
        assert_eq!(s.transcript().len(), 8);
    }

    #[tokio::test]
    async fn model_failure_leaves_no_partial_turns() {
        let orch = Orchestrator::new(MockProvider::failing());
        let mut s = session(&[1]);
        let err = orch.submit(&mut s, "hi").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelInvocation(_)));
        assert!(s.transcript().is_empty());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn schema_violation_is_model_invocation_error() {
        let orch = Orchestrator::new(MockProvider::with_responses(vec![
            r#"{"reply":"wrong field"}"#.into(),
        ]));
        let mut s = session(&[1]);
        assert!(matches!(
            orch.submit(&mut s, "hi").await,
            Err(ChatError::ModelInvocation(_))
        ));
        assert!(s.transcript().is_empty());
    }

    #[tokio::test]
    async fn followup_failure_rolls_back_seen_nodes() {
        let orch = Orchestrator::new(MockProvider::with_responses(vec![
            ASKS_SEARCH.into(),
            "not json".into(),
        ]));
        let mut s = session(&[1, 2]);
        assert!(orch.submit(&mut s, "what does main.cpp do?").await.is_err());
        assert!(s.transcript().is_empty());
        assert!(s.seen().is_empty());
    }

    #[tokio::test]
    async fn retrieval_failure_surfaces() {
        let orch = Orchestrator::new(MockProvider::with_responses(vec![ASKS_SEARCH.into()]));
        let retrieval = Fixed::new(&[1]);
        *retrieval.fail.lock().unwrap() = true;
        let mut s = session_over(retrieval);
        assert!(matches!(
            orch.submit(&mut s, "q").await,
            Err(ChatError::Retrieval(IndexError::IndexNotFound { .. }))
        ));
        assert!(s.transcript().is_empty());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn clear_resets_transcript_and_seen() {
        let orch = Orchestrator::new(MockProvider::with_responses(vec![
            ASKS_SEARCH.into(),
            FINAL.into(),
            ASKS_SEARCH.into(),
            FINAL.into(),
        ]));
        let mut s = session(&[1]);
        orch.submit(&mut s, "q").await.unwrap();
        s.clear();
        assert!(s.transcript().is_empty());
        assert!(s.seen().is_empty());
        let out = orch.submit(&mut s, "q").await.unwrap();
        assert!(out.retrieval.unwrap().context.contains("1. {"));
    }

    #[tokio::test]
    async fn replay_matches_outcomes() {
        let orch = Orchestrator::new(MockProvider::with_responses(vec![
            r#"{"answer":"Hello!"}"#.into(),
            ASKS_SEARCH.into(),
            FINAL.into(),
        ]));
        let mut s = session(&[1]);
        let first = orch.submit(&mut s, "hi").await.unwrap();
        let second = orch.submit(&mut s, "main?").await.unwrap();
        assert_eq!(s.replay(), vec![first, second]);
    }
}
