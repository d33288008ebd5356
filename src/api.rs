use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ColloquyError, Result};
use crate::thread::Message;

/// The API endpoint base URL used when none is given on the command line.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api";

/// The model used when none is given on the command line.
pub const DEFAULT_MODEL_ID: &str = "google/gemini-2.0-flash-exp:free";

// Fixed sampling temperature sent with every request.
const SAMPLING_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Deserialize, Clone)]
struct Response {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize, Clone)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize, Clone)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct ErrorResponse {
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize, Clone)]
struct ErrorResponseContainer {
    error: ErrorResponse,
}

/// `ApiClient` is responsible for interacting with an OpenAI compatible
/// chat completion API.
///
/// It sends the full ordered message history of a thread with every call,
/// along with the configured model and a fixed sampling temperature, and
/// returns the first choice of the response. No timeout is imposed beyond
/// whatever the transport defaults to.
pub struct ApiClient {
    api: String,
    api_key: String,
    model_id: String,
    debug: bool,
    client: Client,
}

impl ApiClient {
    pub fn new(
        api: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        debug: bool,
    ) -> Self {
        ApiClient {
            api: api.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            debug,
            client: Client::new(),
        }
    }

    /// Sends one chat completion request carrying `messages` and returns
    /// the content of the first returned choice, or `None` when the API
    /// answered successfully but with an empty choices array. Secondary
    /// choices are discarded.
    ///
    /// An HTTP-level failure, a non-success status, or an undecodable
    /// response body is returned as an error; the request is not retried.
    pub async fn complete(&self, messages: &[Message]) -> Result<Option<String>> {
        let url = format!("{}/v1/chat/completions", self.api);
        let body = self.build_request_body(messages)?;

        if self.debug {
            println!("request body: {}", body);
            println!("using API key: {}", redact(&self.api_key));
        }

        // post the request out to the API endpoint
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &response_text));
        }

        match serde_json::from_str::<Response>(&response_text) {
            Ok(api_result) => Ok(api_result
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content.unwrap_or_default())),
            // Some providers answer 200 with an error payload instead.
            Err(_) => Err(api_error(status.as_u16(), &response_text)),
        }
    }

    fn build_request_body(&self, messages: &[Message]) -> Result<serde_json::Value> {
        Ok(json!({
            "model": self.model_id,
            "messages": serde_json::to_value(messages)?,
            "temperature": SAMPLING_TEMPERATURE,
        }))
    }
}

fn api_error(status: u16, response_text: &str) -> ColloquyError {
    match serde_json::from_str::<ErrorResponseContainer>(response_text) {
        Ok(container) => ColloquyError::Api {
            status,
            message: match container.error.code {
                Some(code) => format!("[{}] {}", code, container.error.message),
                None => container.error.message,
            },
        },
        Err(_) => ColloquyError::Api {
            status,
            message: response_text.to_string(),
        },
    }
}

/// Everything but the last four characters of the key, masked.
pub fn redact(key: &str) -> String {
    let count = key.chars().count();
    let suffix: String = key.chars().skip(count.saturating_sub(4)).collect();
    format!("****{}", suffix)
}
