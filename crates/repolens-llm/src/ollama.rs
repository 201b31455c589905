use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{EmbedMode, EmbeddingProvider, LlmProvider, Message, Role};

/// Local backend; needs no credential.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
        }
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client
            .list_local_models()
            .await
            .map_err(|e| LlmError::Other(format!("failed to connect to Ollama, is it running? {e}")))?;
        Ok(())
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages)
            .options(ModelOptions::default().temperature(0.0));

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama chat request failed: {e}")))?;

        if response.message.content.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "ollama" });
        }
        Ok(response.message.content)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

impl EmbeddingProvider for OllamaProvider {
    // Ollama embedding models take no input type hint.
    async fn embed(&self, text: &str, _mode: EmbedMode) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: "ollama" })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    match msg.role {
        Role::System => ChatMessage::system(msg.content.clone()),
        Role::User => ChatMessage::user(msg.content.clone()),
        Role::Assistant => ChatMessage::assistant(msg.content.clone()),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            return (url[..colon_pos].to_string(), port);
        }
    }
    (url.to_string(), 11434)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_explicit() {
        assert_eq!(
            parse_host_port("http://localhost:11434/"),
            ("http://localhost".into(), 11434)
        );
        assert_eq!(
            parse_host_port("http://10.0.0.7:8080"),
            ("http://10.0.0.7".into(), 8080)
        );
    }

    #[test]
    fn host_port_defaults_when_missing_or_invalid() {
        assert_eq!(
            parse_host_port("http://localhost"),
            ("http://localhost".into(), 11434)
        );
        assert_eq!(
            parse_host_port("http://localhost:99999"),
            ("http://localhost:99999".into(), 11434)
        );
    }

    #[test]
    fn roles_map_to_ollama_roles() {
        use ollama_rs::generation::chat::MessageRole;

        assert_eq!(
            convert_message(&Message::system("s")).role,
            MessageRole::System
        );
        assert_eq!(convert_message(&Message::user("u")).role, MessageRole::User);
        let a = convert_message(&Message::assistant("reply"));
        assert_eq!(a.role, MessageRole::Assistant);
        assert_eq!(a.content, "reply");
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let p = OllamaProvider::new("http://127.0.0.1:1", "m".into(), "e".into());
        assert!(p.chat(&[Message::user("hi")]).await.is_err());
        assert!(p.embed("hi", EmbedMode::Query).await.is_err());
        assert!(p.health_check().await.is_err());
    }
}
