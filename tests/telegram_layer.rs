//! Drives the Telegram handlers against a local Bot API stand-in.

use async_trait::async_trait;
use pyobf_bot::bot::delivery::send_reply;
use pyobf_bot::bot::handlers::{handle_command, handle_file, Command};
use pyobf_bot::config::Settings;
use pyobf_bot::engine::{ObfuscationEngine, ObfuscationError, ObfuscationRequest};
use pyobf_bot::service::{ObfuscatorService, Reply, FILE_RECEIVED, ONLY_PY_FILES};
use pyobf_bot::session::InMemorySessionStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const UPLOAD: &str = "import os\nprint(os.getcwd())\n";

struct FixedEngine(String);

#[async_trait]
impl ObfuscationEngine for FixedEngine {
    async fn obfuscate(&self, _request: &ObfuscationRequest) -> Result<String, ObfuscationError> {
        Ok(self.0.clone())
    }
}

/// Temp directory handed to the handlers, removed with its contents on drop
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> std::io::Result<Self> {
        let dir = std::env::temp_dir().join(format!("pyobf-telegram-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }

    fn is_empty(&self) -> std::io::Result<bool> {
        Ok(std::fs::read_dir(&self.0)?.next().is_none())
    }

    fn settings(&self) -> Arc<Settings> {
        Arc::new(Settings {
            temp_dir: self.0.clone(),
            ..Settings::default()
        })
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn sent_message(chat_id: i64) -> Value {
    json!({
        "ok": true,
        "result": {
            "message_id": 11,
            "date": 1_700_000_000,
            "chat": {"id": chat_id, "type": "private", "first_name": "Ann"},
            "text": "ok"
        }
    })
}

/// Incoming private message from `user_id` with `content` merged in
fn incoming(user_id: i64, content: Value) -> anyhow::Result<Message> {
    let mut value = json!({
        "message_id": 10,
        "date": 1_700_000_000,
        "chat": {"id": user_id, "type": "private", "first_name": "Ann"},
        "from": {"id": user_id, "is_bot": false, "first_name": "Ann"}
    });
    if let (Some(base), Value::Object(extra)) = (value.as_object_mut(), content) {
        base.extend(extra);
    }
    Ok(serde_json::from_value(value)?)
}

fn document(user_id: i64, file_name: &str) -> anyhow::Result<Message> {
    incoming(
        user_id,
        json!({
            "document": {
                "file_id": "f1",
                "file_unique_id": "u1",
                "file_name": file_name,
                "file_size": UPLOAD.len()
            }
        }),
    )
}

async fn fake_api(chat_id: i64) -> anyhow::Result<(MockServer, Bot)> {
    let server = MockServer::start().await;

    for name in ["sendmessage", "senddocument"] {
        Mock::given(method("POST"))
            .and(path_regex(format!(r"(?i)/bot[^/]+/{name}$")))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message(chat_id)))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path_regex(r"(?i)/bot[^/]+/sendchataction$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"(?i)/bot[^/]+/getfile$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {
                "file_id": "f1",
                "file_unique_id": "u1",
                "file_size": UPLOAD.len(),
                "file_path": "documents/x.py"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/file/bot[^/]+/documents/x\.py$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(UPLOAD))
        .mount(&server)
        .await;

    let bot = Bot::new("1:x").set_api_url(reqwest::Url::parse(&server.uri())?);
    Ok((server, bot))
}

/// Requests the fake received for one Bot API method, matched case-insensitively
async fn calls_to(server: &MockServer, api_method: &str) -> Vec<Request> {
    let suffix = format!("/{}", api_method.to_lowercase());
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().to_lowercase().ends_with(&suffix))
        .collect()
}

fn body(request: &Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

fn service(result: &str) -> Arc<ObfuscatorService> {
    Arc::new(ObfuscatorService::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(FixedEngine(result.to_string())),
    ))
}

#[tokio::test]
async fn test_non_python_upload_rejected_without_download() -> anyhow::Result<()> {
    let (server, bot) = fake_api(42).await?;
    let scratch = ScratchDir::new()?;
    let service = service("unused");
    service.ingest_text(42, "keep = 1".to_string()).await;

    handle_file(bot, document(42, "notes.txt")?, service.clone(), scratch.settings()).await?;

    assert_eq!(service.sessions().get(42).await.code.as_deref(), Some("keep = 1"));
    assert!(calls_to(&server, "GetFile").await.is_empty());
    let replies = calls_to(&server, "SendMessage").await;
    assert_eq!(replies.len(), 1);
    assert!(body(&replies[0]).contains(ONLY_PY_FILES));
    assert!(scratch.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn test_python_upload_downloaded_into_session() -> anyhow::Result<()> {
    let (server, bot) = fake_api(42).await?;
    let scratch = ScratchDir::new()?;
    let service = service("unused");

    handle_file(bot, document(42, "x.py")?, service.clone(), scratch.settings()).await?;

    assert_eq!(service.sessions().get(42).await.pending_code(), Some(UPLOAD));
    assert_eq!(calls_to(&server, "GetFile").await.len(), 1);
    let replies = calls_to(&server, "SendMessage").await;
    assert_eq!(replies.len(), 1);
    assert!(body(&replies[0]).contains(FILE_RECEIVED));
    assert!(scratch.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn test_document_reply_uploaded_then_removed() -> anyhow::Result<()> {
    let (server, bot) = fake_api(42).await?;
    let scratch = ScratchDir::new()?;
    let content = "y = 2\n".repeat(800);
    let reply = Reply::Document {
        file_name: "obfuscated_42.py".to_string(),
        content: content.clone(),
    };

    send_reply(&bot, ChatId(42), reply, &scratch.0).await?;

    let uploads = calls_to(&server, "SendDocument").await;
    assert_eq!(uploads.len(), 1);
    let sent = body(&uploads[0]);
    assert!(sent.contains("filename=\"obfuscated_42.py\""));
    assert!(sent.contains(&content));
    assert!(scratch.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn test_code_reply_uses_markdown() -> anyhow::Result<()> {
    let (server, bot) = fake_api(42).await?;
    let scratch = ScratchDir::new()?;

    send_reply(&bot, ChatId(42), Reply::Code("print(1)".to_string()), &scratch.0).await?;

    let replies = calls_to(&server, "SendMessage").await;
    assert_eq!(replies.len(), 1);
    let sent = body(&replies[0]);
    assert!(sent.contains("MarkdownV2"));
    assert!(sent.contains("```python"));
    Ok(())
}

#[tokio::test]
async fn test_large_obfuscation_sent_as_document() -> anyhow::Result<()> {
    let (server, bot) = fake_api(7).await?;
    let scratch = ScratchDir::new()?;
    let big = "_".repeat(5000);
    let service = service(&big);
    service.ingest_text(7, "z = 3".to_string()).await;

    let msg = incoming(7, json!({"text": "/obfuscate"}))?;
    handle_command(bot, msg, Command::Obfuscate, service, scratch.settings()).await?;

    assert_eq!(calls_to(&server, "SendChatAction").await.len(), 1);
    assert!(calls_to(&server, "SendMessage").await.is_empty());
    let uploads = calls_to(&server, "SendDocument").await;
    assert_eq!(uploads.len(), 1);
    let sent = body(&uploads[0]);
    assert!(sent.contains("filename=\"obfuscated_7.py\""));
    assert!(sent.contains(&big));
    assert!(scratch.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn test_result_file_removed_when_upload_rejected() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"(?i)/bot[^/]+/senddocument$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: file is too big"
        })))
        .mount(&server)
        .await;
    let bot = Bot::new("1:x").set_api_url(reqwest::Url::parse(&server.uri())?);
    let scratch = ScratchDir::new()?;
    let reply = Reply::Document {
        file_name: "obfuscated_9.py".to_string(),
        content: "_".repeat(4500),
    };

    let result = send_reply(&bot, ChatId(9), reply, &scratch.0).await;

    assert!(result.is_err());
    assert_eq!(calls_to(&server, "SendDocument").await.len(), 1);
    assert!(scratch.is_empty()?);
    Ok(())
}
