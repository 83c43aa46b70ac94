use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::error::{truncate_text, AiError};

const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1200,
        }
    }
}

/// One request, one response. Implementations never retry.
pub trait ChatTransport: Send + Sync {
    fn complete(
        &self,
        messages: &[ChatMessage],
        config: &ProviderConfig,
        params: CompletionParams,
    ) -> Result<String, AiError>;
}

/// OpenAI-compatible `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    http: HttpClient,
}

impl HttpChatTransport {
    pub fn new() -> Result<Self, AiError> {
        let http = HttpClient::builder().build().map_err(AiError::transport)?;
        Ok(Self { http })
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AiError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(AiError::transport)?;
        Ok(Self { http })
    }
}

impl ChatTransport for HttpChatTransport {
    fn complete(
        &self,
        messages: &[ChatMessage],
        config: &ProviderConfig,
        params: CompletionParams,
    ) -> Result<String, AiError> {
        let payload = json!({
            "model": config.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let response = self
            .http
            .post(config.chat_endpoint())
            .bearer_auth(&config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .map_err(AiError::transport)?;

        let status = response.status();
        let body = response.text().map_err(AiError::transport)?;
        if !status.is_success() {
            return Err(AiError::HttpFailure {
                status: status.as_u16(),
                body: truncate_text(body.trim(), ERROR_BODY_MAX_CHARS),
            });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            AiError::transport_message(format!("provider returned invalid JSON payload: {err}"))
        })?;
        extract_message_content(&parsed).ok_or(AiError::NoContent)
    }
}

/// Content of the first choice, trimmed. Array content (text parts) is joined
/// with newlines.
pub fn extract_message_content(response: &Value) -> Option<String> {
    let content = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))?;

    let text = match content {
        Value::String(text) => text.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<&str>>()
            .join("\n"),
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use serde_json::json;

    use super::*;

    struct CapturedRequest {
        request_line: String,
        headers: Vec<String>,
        body: Value,
    }

    /// Serves exactly one HTTP response and hands back what the client sent.
    fn serve_once(
        status_line: &'static str,
        body: String,
    ) -> anyhow::Result<(String, thread::JoinHandle<anyhow::Result<CapturedRequest>>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}/v1", listener.local_addr()?);
        let handle = thread::spawn(move || -> anyhow::Result<CapturedRequest> {
            let (stream, _) = listener.accept()?;
            let mut reader = BufReader::new(stream.try_clone()?);
            let mut request_line = String::new();
            reader.read_line(&mut request_line)?;
            let mut headers = Vec::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line)?;
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse()?;
                    }
                }
                headers.push(line);
            }
            let mut raw_body = vec![0u8; content_length];
            reader.read_exact(&mut raw_body)?;

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )?;
            stream.flush()?;

            Ok(CapturedRequest {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: serde_json::from_slice(&raw_body)?,
            })
        });
        Ok((base_url, handle))
    }

    fn config_for(base_url: String) -> ProviderConfig {
        ProviderConfig {
            api_key: "sk-test".to_string(),
            base_url,
            model: "gpt-4o-mini".to_string(),
        }
    }

    fn join(
        handle: thread::JoinHandle<anyhow::Result<CapturedRequest>>,
    ) -> anyhow::Result<CapturedRequest> {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("test server panicked"))?
    }

    #[test]
    fn sends_openai_chat_request_and_trims_content() -> anyhow::Result<()> {
        let body = json!({"choices": [{"message": {"content": "  [1, 2]\n"}}]}).to_string();
        let (base_url, handle) = serve_once("200 OK", body)?;
        let transport = HttpChatTransport::new()?;

        let text = transport.complete(
            &[ChatMessage::system("be terse"), ChatMessage::user("hi")],
            &config_for(base_url),
            CompletionParams {
                temperature: 0.2,
                max_tokens: 400,
            },
        )?;
        assert_eq!(text, "[1, 2]");

        let captured = join(handle)?;
        assert_eq!(captured.request_line, "POST /v1/chat/completions HTTP/1.1");
        assert!(captured
            .headers
            .iter()
            .any(|line| line.eq_ignore_ascii_case("authorization: Bearer sk-test")));
        assert_eq!(captured.body["model"], json!("gpt-4o-mini"));
        assert_eq!(captured.body["max_tokens"], json!(400));
        assert_eq!(captured.body["messages"][0]["role"], json!("system"));
        assert_eq!(captured.body["messages"][1]["content"], json!("hi"));
        Ok(())
    }

    #[test]
    fn non_success_status_maps_to_http_failure() -> anyhow::Result<()> {
        let (base_url, handle) = serve_once("429 Too Many Requests", "rate limited".to_string())?;
        let transport = HttpChatTransport::new()?;

        let err = transport
            .complete(
                &[ChatMessage::user("hi")],
                &config_for(base_url),
                CompletionParams::default(),
            )
            .err();
        join(handle)?;

        match err {
            Some(AiError::HttpFailure { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected HttpFailure, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn empty_choice_maps_to_no_content() -> anyhow::Result<()> {
        let body = json!({"choices": [{"message": {"content": "   "}}]}).to_string();
        let (base_url, handle) = serve_once("200 OK", body)?;
        let transport = HttpChatTransport::new()?;

        let err = transport
            .complete(
                &[ChatMessage::user("hi")],
                &config_for(base_url),
                CompletionParams::default(),
            )
            .err();
        join(handle)?;
        assert!(matches!(err, Some(AiError::NoContent)));
        Ok(())
    }

    #[test]
    fn unreachable_host_maps_to_transport_error() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}/v1", listener.local_addr()?);
        drop(listener);

        let transport = HttpChatTransport::with_timeout(Duration::from_secs(5))?;
        let err = transport
            .complete(
                &[ChatMessage::user("hi")],
                &config_for(base_url),
                CompletionParams::default(),
            )
            .err();
        assert!(matches!(err, Some(AiError::Transport { .. })));
        Ok(())
    }

    #[test]
    fn extract_message_content_joins_text_parts() {
        let response = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "{\"a\":"},
            {"type": "text", "text": "1}"}
        ]}}]});
        assert_eq!(
            extract_message_content(&response),
            Some("{\"a\":\n1}".to_string())
        );
        assert_eq!(extract_message_content(&json!({"choices": []})), None);
        assert_eq!(
            extract_message_content(&json!({"choices": [{"message": {}}]})),
            None
        );
    }
}
