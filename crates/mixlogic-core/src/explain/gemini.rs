//! Gemini `generateContent` client
//!
//! Sends the prompt as a single user turn and returns the text of the first
//! candidate. Uses blocking ureq; [`explain_mix`](super::explain_mix) runs it
//! on the blocking pool.

use serde::Deserialize;

use crate::config::ExplainConfig;

use super::{ExplainError, MixExplainer, EXPLAIN_TIMEOUT};

/// Longest error body kept in an [`ExplainError::Request`]
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Text of the first candidate, with its parts joined
fn response_text(body: &str) -> Result<Option<String>, ExplainError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ExplainError::Request(format!("invalid response: {}", e)))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}

/// [`MixExplainer`] backed by the Gemini API
pub struct GeminiExplainer {
    url: String,
    api_key: String,
}

impl GeminiExplainer {
    pub fn new(config: &ExplainConfig, api_key: impl Into<String>) -> Self {
        let url = format!(
            "{}/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );
        Self {
            url,
            api_key: api_key.into(),
        }
    }

    /// Build from config, reading the key from `config.api_key_env`
    ///
    /// Returns `None` when the variable is unset or blank.
    pub fn from_env(config: &ExplainConfig) -> Option<Self> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Some(Self::new(config, key.trim())),
            _ => {
                log::info!("{} not set, mix explanations disabled", config.api_key_env);
                None
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for GeminiExplainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key stays out of logs
        f.debug_struct("GeminiExplainer").field("url", &self.url).finish()
    }
}

impl MixExplainer for GeminiExplainer {
    fn explain(&self, prompt: &str) -> Result<Option<String>, ExplainError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        log::debug!("Requesting explanation from {}", self.url);

        let response = ureq::post(&self.url)
            .set("Content-Type", "application/json")
            .set("x-goog-api-key", &self.api_key)
            .timeout(EXPLAIN_TIMEOUT)
            .send_string(&body.to_string());

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let mut detail = response.into_string().unwrap_or_default();
                detail.truncate(
                    detail
                        .char_indices()
                        .nth(MAX_ERROR_BODY)
                        .map_or(detail.len(), |(i, _)| i),
                );
                return Err(ExplainError::Request(format!("HTTP {}: {}", code, detail.trim())));
            }
            Err(ureq::Error::Transport(e)) => return Err(ExplainError::Unavailable(e.to_string())),
        };

        let text = response
            .into_string()
            .map_err(|e| ExplainError::Request(format!("failed to read response: {}", e)))?;
        response_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    const ANSWER: &str = r#"{
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": "Deck A is playing " }, { "text": "through a flat EQ." }]
            },
            "finishReason": "STOP"
        }]
    }"#;

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Serve one canned HTTP response; the thread returns the raw request
    fn serve_once(status: &'static str, body: &'static str) -> (ExplainConfig, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
            request
        });
        let config = ExplainConfig {
            endpoint: format!("http://127.0.0.1:{}/v1beta/", port),
            model: "test-model".to_string(),
            api_key_env: "UNUSED".to_string(),
        };
        (config, handle)
    }

    #[test]
    fn test_url_from_config() {
        let explainer = GeminiExplainer::new(&ExplainConfig::default(), "s3cret");
        assert_eq!(
            explainer.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(!format!("{:?}", explainer).contains("s3cret"));
    }

    #[test]
    fn test_response_text() {
        assert_eq!(
            response_text(ANSWER).unwrap().as_deref(),
            Some("Deck A is playing through a flat EQ.")
        );
        assert_eq!(response_text(r#"{"candidates": []}"#).unwrap(), None);
        assert_eq!(response_text(r#"{"promptFeedback": {}}"#).unwrap(), None);
        assert!(matches!(response_text("<html>"), Err(ExplainError::Request(_))));
    }

    #[test]
    fn test_explain_over_http() {
        let (config, server) = serve_once("200 OK", ANSWER);
        let explainer = GeminiExplainer::new(&config, "secret");

        let text = explainer.explain("Describe the mix").unwrap();
        assert_eq!(text.as_deref(), Some("Deck A is playing through a flat EQ."));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v1beta/models/test-model:generateContent "));
        assert!(request.to_ascii_lowercase().contains("x-goog-api-key: secret"));
        assert!(request.contains(r#"{"contents":[{"parts":[{"text":"Describe the mix"}]}]}"#));
    }

    #[test]
    fn test_error_status_is_request_error() {
        let (config, server) = serve_once("403 Forbidden", r#"{"error": {"message": "API key not valid"}}"#);
        let explainer = GeminiExplainer::new(&config, "bad");

        match explainer.explain("Describe the mix") {
            Err(ExplainError::Request(message)) => {
                assert!(message.contains("403"));
                assert!(message.contains("API key not valid"));
            }
            other => panic!("expected request error, got {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_service() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ExplainConfig {
            endpoint: format!("http://127.0.0.1:{}", port),
            ..ExplainConfig::default()
        };
        let result = GeminiExplainer::new(&config, "key").explain("Describe the mix");
        assert!(matches!(result, Err(ExplainError::Unavailable(_))));
    }

    #[test]
    fn test_missing_key_disables_explainer() {
        let config = ExplainConfig {
            api_key_env: "MIXLOGIC_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ExplainConfig::default()
        };
        assert!(GeminiExplainer::from_env(&config).is_none());
    }
}
