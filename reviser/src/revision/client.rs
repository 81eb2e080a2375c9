//! HTTP client for the AI revision endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shared_types::Patch;

use super::{ModelReply, ModelRequest, RevisionError, RevisionModel};
use crate::config::AiEndpointConfig;

/// Response bodies quoted in errors are cut to this many chars
const MAX_ERROR_BODY_CHARS: usize = 500;

/// [`RevisionModel`] backed by the AI endpoint configured for the service.
pub struct HttpRevisionModel {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpRevisionModel {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, RevisionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RevisionError::Client(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &AiEndpointConfig) -> Result<Self, RevisionError> {
        let endpoint = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RevisionError::Client("no AI endpoint configured".to_string()))?;
        Self::new(
            endpoint,
            Duration::from_millis(config.timeout_ms),
            config.api_key(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RevisionModel for HttpRevisionModel {
    async fn propose(&self, request: &ModelRequest) -> Result<ModelReply, RevisionError> {
        let body = serde_json::json!({
            "mode": "patches",
            "excerpts": request.excerpts,
            "revisionPrompt": request.revision_prompt,
            "documentType": request.document_type,
            "originalPrompt": request.original_prompt,
            "requiresSignature": request.requires_signature,
        });

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RevisionError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RevisionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RevisionError::Transport(format!(
                "status {}: {}",
                status,
                truncate_body(&text)
            )));
        }

        let payload: Value = serde_json::from_str(&text).map_err(|_| {
            RevisionError::Transport(format!("response was not JSON: {}", truncate_body(&text)))
        })?;
        let reply = parse_reply(payload);
        tracing::debug!(
            endpoint = %self.endpoint,
            excerpts = request.excerpts.len(),
            reply = reply_kind(&reply),
            "AI revision endpoint replied"
        );
        Ok(reply)
    }
}

/// Interpret an endpoint payload: `{patches: [...]}` first, then the
/// legacy `{content: "..."}`.
pub fn parse_reply(payload: Value) -> ModelReply {
    if let Some(entries) = payload.get("patches").and_then(Value::as_array) {
        if !entries.is_empty() {
            let mut patches = Vec::with_capacity(entries.len());
            let mut malformed = Vec::new();
            for (index, entry) in entries.iter().enumerate() {
                match serde_json::from_value::<Patch>(entry.clone()) {
                    Ok(patch) => patches.push(patch),
                    Err(e) => malformed.push(format!("patch {index}: {e}")),
                }
            }
            return ModelReply::Patches { patches, malformed };
        }
    }

    match payload.get("content").and_then(Value::as_str) {
        Some(content) if !content.trim().is_empty() => ModelReply::Content(content.to_string()),
        _ => ModelReply::Empty,
    }
}

fn reply_kind(reply: &ModelReply) -> &'static str {
    match reply {
        ModelReply::Patches { .. } => "patches",
        ModelReply::Content(_) => "content",
        ModelReply::Empty => "empty",
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((offset, _)) => format!("{}…", &body[..offset]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_endpoint(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/revise")
    }

    fn request() -> ModelRequest {
        ModelRequest {
            excerpts: vec!["## Term\nThe term is 2 years.".to_string()],
            revision_prompt: "change the term to 5 years".to_string(),
            document_type: Some("agreement".to_string()),
            original_prompt: None,
            requires_signature: true,
        }
    }

    #[test]
    fn test_parse_reply_patches() {
        let reply = parse_reply(json!({
            "patches": [
                {"type": "replace_exact", "old_text": "2 years", "new_text": "5 years"},
                {"type": "rewrite_everything"}
            ]
        }));
        match reply {
            ModelReply::Patches { patches, malformed } => {
                assert_eq!(patches.len(), 1);
                assert_eq!(malformed.len(), 1);
                assert!(malformed[0].starts_with("patch 1:"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reply_content_and_empty() {
        assert_eq!(
            parse_reply(json!({"patches": [], "content": "Full text"})),
            ModelReply::Content("Full text".to_string())
        );
        assert_eq!(parse_reply(json!({"content": ""})), ModelReply::Empty);
        assert_eq!(parse_reply(json!({"other": 1})), ModelReply::Empty);
        assert_eq!(parse_reply(json!([1, 2])), ModelReply::Empty);
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 20);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 1);
        assert!(truncated.ends_with('…'));
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = AiEndpointConfig::default();
        assert!(matches!(
            HttpRevisionModel::from_config(&config),
            Err(RevisionError::Client(_))
        ));
    }

    #[tokio::test]
    async fn test_propose_sends_patch_mode_payload() {
        let app = Router::new().route(
            "/revise",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["mode"], "patches");
                assert_eq!(body["revisionPrompt"], "change the term to 5 years");
                assert_eq!(body["documentType"], "agreement");
                assert_eq!(body["requiresSignature"], true);
                assert_eq!(body["excerpts"].as_array().map(Vec::len), Some(1));
                Json(json!({
                    "patches": [{
                        "type": "replace_exact",
                        "old_text": "The term is 2 years.",
                        "new_text": "The term is 5 years."
                    }]
                }))
            }),
        );
        let endpoint = spawn_endpoint(app).await;
        let model = HttpRevisionModel::new(endpoint, Duration::from_secs(5), None).unwrap();

        let reply = model.propose(&request()).await.unwrap();
        assert_eq!(
            reply,
            ModelReply::Patches {
                patches: vec![Patch::ReplaceExact {
                    old_text: "The term is 2 years.".to_string(),
                    new_text: "The term is 5 years.".to_string(),
                }],
                malformed: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_propose_surfaces_error_status() {
        let app = Router::new().route(
            "/revise",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded") }),
        );
        let endpoint = spawn_endpoint(app).await;
        let model = HttpRevisionModel::new(endpoint, Duration::from_secs(5), None).unwrap();

        match model.propose(&request()).await {
            Err(RevisionError::Transport(message)) => {
                assert!(message.contains("500"));
                assert!(message.contains("model overloaded"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_propose_rejects_non_json() {
        let app = Router::new().route("/revise", post(|| async { "<html>oops</html>" }));
        let endpoint = spawn_endpoint(app).await;
        let model = HttpRevisionModel::new(endpoint, Duration::from_secs(5), None).unwrap();

        match model.propose(&request()).await {
            Err(RevisionError::Transport(message)) => {
                assert!(message.starts_with("response was not JSON"));
                assert!(message.contains("<html>oops</html>"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
