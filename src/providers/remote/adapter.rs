use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};

use super::models::{ChatMessageResponse, ErrorResponse, HealthResponse};
use crate::config::{AppConfig, CHAT_MESSAGE_PATH, HEALTH_PATH};
use crate::providers::traits::AssistantService;
use crate::providers::types::{
    AssistantReply, HealthStatus, OutboundFile, OutboundMessage, TransportError,
};

/// Talks to the assistant backend over HTTP.
pub struct HttpAssistant {
    client: Client,
    config: AppConfig,
}

impl HttpAssistant {
    pub fn new(config: AppConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: AppConfig) -> Self {
        Self { client, config }
    }

    fn build_form(request: OutboundMessage) -> Result<Form, TransportError> {
        let mut form = Form::new()
            .text("message", request.message)
            .text("conversation_id", request.conversation_id);

        for file in request.files {
            form = form.part("files", Self::build_file_part(file)?);
        }

        Ok(form)
    }

    fn build_file_part(file: OutboundFile) -> Result<Part, TransportError> {
        let length = file.data.len() as u64;
        Part::stream_with_length(file.data, length)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| {
                TransportError::InvalidRequest(format!(
                    "Bad media type {:?} for {}: {}",
                    file.media_type, file.name, e
                ))
            })
    }

    fn parse_error_message(body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
            return parsed.detail;
        }
        if body.trim().is_empty() {
            "Request failed".to_string()
        } else {
            body.trim().to_string()
        }
    }

    async fn check_status(response: Response) -> Result<Response, TransportError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status,
            body: Self::parse_error_message(&body),
        })
    }
}

#[async_trait]
impl AssistantService for HttpAssistant {
    async fn send_message(
        &self,
        request: OutboundMessage,
    ) -> Result<AssistantReply, TransportError> {
        let url = self.config.endpoint(CHAT_MESSAGE_PATH);
        let file_count = request.files.len();
        let form = Self::build_form(request)?;

        tracing::debug!("POST {} with {} file part(s)", url, file_count);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;

        let parsed: ChatMessageResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        Ok(AssistantReply {
            response: parsed.response,
            conversation_id: parsed.conversation_id,
        })
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        let url = self.config.endpoint(HEALTH_PATH);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to connect to {}: {}", url, e)))?;

        let response = Self::check_status(response).await?;

        let parsed: HealthResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        Ok(HealthStatus {
            status: parsed.status,
            environment: parsed.environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::Multipart;
    use axum::http::{header, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone)]
    struct FormField {
        name: String,
        file_name: Option<String>,
        content_type: Option<String>,
        data: Bytes,
    }

    impl FormField {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.data).to_string()
        }
    }

    #[derive(Debug, Clone)]
    struct Received {
        path: &'static str,
        fields: Vec<FormField>,
    }

    type ReceivedLog = Arc<Mutex<Vec<Received>>>;

    /// Serve both backend routes with a canned status and body, recording what arrives.
    async fn spawn_backend(status: StatusCode, body: &'static str) -> (String, ReceivedLog) {
        let received: ReceivedLog = Arc::default();
        let chat_log = received.clone();
        let health_log = received.clone();

        let app = Router::new()
            .route(
                CHAT_MESSAGE_PATH,
                post(move |mut multipart: Multipart| {
                    let log = chat_log.clone();
                    async move {
                        let mut fields = Vec::new();
                        while let Some(field) = multipart.next_field().await.unwrap() {
                            let name = field.name().unwrap_or_default().to_string();
                            let file_name = field.file_name().map(str::to_string);
                            let content_type = field.content_type().map(str::to_string);
                            let data = field.bytes().await.unwrap();
                            fields.push(FormField {
                                name,
                                file_name,
                                content_type,
                                data,
                            });
                        }
                        log.lock().unwrap().push(Received {
                            path: CHAT_MESSAGE_PATH,
                            fields,
                        });
                        (status, [(header::CONTENT_TYPE, "application/json")], body)
                    }
                }),
            )
            .route(
                HEALTH_PATH,
                get(move || {
                    let log = health_log.clone();
                    async move {
                        log.lock().unwrap().push(Received {
                            path: HEALTH_PATH,
                            fields: Vec::new(),
                        });
                        (status, [(header::CONTENT_TYPE, "application/json")], body)
                    }
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    fn only_request(received: &ReceivedLog) -> Received {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        received[0].clone()
    }

    fn assistant_for(base: &str) -> HttpAssistant {
        let config = AppConfig::from_lookup(|key| match key {
            "PARLOR_API_URL" => Some(base.to_string()),
            _ => None,
        })
        .unwrap();
        let client = Client::builder().no_proxy().build().unwrap();
        HttpAssistant::with_client(client, config)
    }

    fn text_only(message: &str, conversation_id: &str) -> OutboundMessage {
        OutboundMessage {
            message: message.to_string(),
            conversation_id: conversation_id.to_string(),
            files: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_send_message_posts_multipart_form() {
        let (base, received) = spawn_backend(
            StatusCode::OK,
            r#"{"response":"hi","conversation_id":"c1"}"#,
        )
        .await;
        let assistant = assistant_for(&base);

        let reply = assistant
            .send_message(OutboundMessage {
                message: "hello there".to_string(),
                conversation_id: String::new(),
                files: vec![
                    OutboundFile {
                        name: "a.txt".to_string(),
                        media_type: "text/plain".to_string(),
                        data: Bytes::from_static(b"alpha"),
                    },
                    OutboundFile {
                        name: "b.png".to_string(),
                        media_type: "image/png".to_string(),
                        data: Bytes::from_static(b"\x89PNG"),
                    },
                ],
            })
            .await
            .unwrap();

        assert_eq!(reply.response.as_deref(), Some("hi"));
        assert_eq!(reply.conversation_id.as_deref(), Some("c1"));

        let request = only_request(&received);
        assert_eq!(request.path, CHAT_MESSAGE_PATH);
        let names: Vec<&str> = request.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["message", "conversation_id", "files", "files"]);

        assert_eq!(request.fields[0].text(), "hello there");
        assert_eq!(request.fields[1].text(), "");

        let files = &request.fields[2..];
        assert_eq!(files[0].file_name.as_deref(), Some("a.txt"));
        assert_eq!(files[0].content_type.as_deref(), Some("text/plain"));
        assert_eq!(files[0].data, Bytes::from_static(b"alpha"));
        assert_eq!(files[1].file_name.as_deref(), Some("b.png"));
        assert_eq!(files[1].content_type.as_deref(), Some("image/png"));
        assert_eq!(files[1].data, Bytes::from_static(b"\x89PNG"));
    }

    #[tokio::test]
    async fn test_missing_fields_are_tolerated() {
        let (base, received) = spawn_backend(StatusCode::OK, "{}").await;
        let reply = assistant_for(&base)
            .send_message(text_only("x", "c9"))
            .await
            .unwrap();
        assert_eq!(reply, AssistantReply::default());

        let request = only_request(&received);
        assert_eq!(request.fields[1].name, "conversation_id");
        assert_eq!(request.fields[1].text(), "c9");
        assert_eq!(request.fields.len(), 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let (base, received) = spawn_backend(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail":"backend exploded"}"#,
        )
        .await;
        let err = assistant_for(&base)
            .send_message(text_only("x", ""))
            .await
            .unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "backend exploded");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
        only_request(&received);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_an_error() {
        let (base, _received) = spawn_backend(StatusCode::OK, "not json").await;
        let err = assistant_for(&base)
            .send_message(text_only("x", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health() {
        let (base, received) = spawn_backend(
            StatusCode::OK,
            r#"{"status":"running","environment":"development"}"#,
        )
        .await;
        let health = assistant_for(&base).health().await.unwrap();
        assert_eq!(health.status, "running");
        assert_eq!(health.environment.as_deref(), Some("development"));
        assert_eq!(only_request(&received).path, HEALTH_PATH);
    }

    #[test]
    fn test_error_body_falls_back_to_text() {
        assert_eq!(HttpAssistant::parse_error_message("  gateway down \n"), "gateway down");
        assert_eq!(HttpAssistant::parse_error_message(""), "Request failed");
    }

    #[test]
    fn test_bad_media_type_is_rejected() {
        let err = HttpAssistant::build_file_part(OutboundFile {
            name: "x".to_string(),
            media_type: "not a mime".to_string(),
            data: Bytes::new(),
        })
        .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
