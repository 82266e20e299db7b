//! Question answering over the scanned documents.
//!
//! Each question is sent with a system prompt listing the first documents of
//! the corpus and the tail of the persisted conversation. Unlike extraction
//! there is no fallback: completion errors surface to the caller.

use anyhow::{Context, Result};

use crate::analyze::{ChatMessage, ChatRequest, CompletionClient};
use crate::app::App;
use crate::config::ChatConfig;
use crate::models::Document;

const ASSISTANT_PROMPT: &str = "You are a document analysis assistant. Answer questions \
using the documents the user has scanned, and always name the documents you relied on.";

/// `[filename] title: summary` per document, blank-line separated.
pub fn document_context(documents: &[Document], limit: usize) -> String {
    let lines: Vec<String> = documents
        .iter()
        .take(limit)
        .map(|d| format!("[{}] {}: {}", d.filename, d.title, d.summary))
        .collect();
    if lines.is_empty() {
        "No documents have been scanned.".to_string()
    } else {
        lines.join("\n\n")
    }
}

pub fn build_request(
    config: &ChatConfig,
    documents: &[Document],
    history: &[ChatMessage],
    question: &str,
) -> ChatRequest {
    let system = format!(
        "{}\n\nScanned documents:\n{}",
        ASSISTANT_PROMPT,
        document_context(documents, config.context_documents)
    );

    let tail = history.len().saturating_sub(config.history_messages);
    let mut messages = Vec::with_capacity(history.len() - tail + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history[tail..].iter().cloned());
    messages.push(ChatMessage::user(question));

    ChatRequest {
        model: config.model.clone(),
        messages,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

impl App {
    pub async fn chat_history(&self) -> Result<Vec<ChatMessage>> {
        self.store.load_chat().await
    }

    /// Ask one question; on success both turns are appended to the history.
    pub async fn ask(&self, client: &dyn CompletionClient, question: &str) -> Result<String> {
        let mut history = self.chat_history().await?;
        let request = build_request(&self.config.chat, &self.documents, &history, question);

        let answer = client
            .complete(&request)
            .await
            .context("Chat request failed")?;

        history.push(ChatMessage::user(question));
        history.push(ChatMessage::assistant(answer.clone()));
        self.store.save_chat(&history).await?;
        tracing::debug!(messages = history.len(), "chat history saved");
        Ok(answer)
    }

    pub async fn reset_chat(&self) -> Result<()> {
        self.store.save_chat::<ChatMessage>(&[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::CompletionError;
    use crate::config::Config;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn doc(filename: &str, title: &str, summary: &str) -> Document {
        let mut d = Document::placeholder(filename);
        d.title = title.to_string();
        d.summary = summary.to_string();
        d
    }

    #[test]
    fn context_lists_the_first_documents() {
        let docs: Vec<Document> = (0..12)
            .map(|i| doc(&format!("{}.html", i), &format!("T{}", i), "S"))
            .collect();
        let ctx = document_context(&docs, 10);
        assert!(ctx.starts_with("[0.html] T0: S"));
        assert!(ctx.contains("[9.html] T9: S"));
        assert!(!ctx.contains("10.html"));
        assert_eq!(document_context(&[], 10), "No documents have been scanned.");
    }

    #[test]
    fn request_keeps_only_recent_history() {
        let config = ChatConfig::default();
        let history: Vec<ChatMessage> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{}", i))
                } else {
                    ChatMessage::assistant(format!("a{}", i))
                }
            })
            .collect();
        let request = build_request(&config, &[], &history, "latest?");
        // system + 6 history + question
        assert_eq!(request.messages.len(), 8);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].content, "q4");
        assert_eq!(request.messages[7], ChatMessage::user("latest?"));
        assert_eq!(request.max_tokens, 800);
    }

    struct Scripted {
        answer: Option<String>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl CompletionClient for Scripted {
        async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(request.clone());
            self.answer
                .clone()
                .ok_or_else(|| CompletionError::Transport("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn ask_appends_history_and_reset_clears_it() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.path = tmp.path().join("docscan.sqlite");
        let app = App::open(config).await.unwrap();

        let client = Scripted {
            answer: Some("42".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        assert_eq!(app.ask(&client, "meaning?").await.unwrap(), "42");
        app.ask(&client, "again?").await.unwrap();

        let history = app.chat_history().await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3], ChatMessage::assistant("42"));

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[1].messages.len(), 4);
        drop(seen);

        app.reset_chat().await.unwrap();
        assert!(app.chat_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_answers_are_not_recorded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.path = tmp.path().join("docscan.sqlite");
        let app = App::open(config).await.unwrap();

        let client = Scripted {
            answer: None,
            seen: Mutex::new(Vec::new()),
        };
        let err = app.ask(&client, "hello?").await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
        assert!(app.chat_history().await.unwrap().is_empty());
    }
}
