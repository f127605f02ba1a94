use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde_json::Value;

use crate::utils::storage::StorageError;

pub const FALLBACK_ERROR_MESSAGE: &str = "Request failed";
pub const ERROR_SNIPPET_LIMIT: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    #[default]
    Bearer,
    Token,
}

impl AuthScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthScheme::Bearer => "Bearer",
            AuthScheme::Token => "Token",
        }
    }

    pub fn alternate(self) -> Self {
        match self {
            AuthScheme::Bearer => AuthScheme::Token,
            AuthScheme::Token => AuthScheme::Bearer,
        }
    }

    pub fn header_value(self, token: &str) -> String {
        format!("{} {}", self.as_str(), token)
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(AuthScheme::Bearer),
            "token" => Ok(AuthScheme::Token),
            other => Err(format!("Unsupported auth scheme: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Post,
    Patch,
    Put,
}

impl WriteMethod {
    pub fn as_method(self) -> Method {
        match self {
            WriteMethod::Post => Method::POST,
            WriteMethod::Patch => Method::PATCH,
            WriteMethod::Put => Method::PUT,
        }
    }

    /// Verb used in the success toast.
    pub fn success_verb(self) -> &'static str {
        match self {
            WriteMethod::Post => "Created",
            WriteMethod::Patch | WriteMethod::Put => "Updated",
        }
    }
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Form fields and file uploads. Kept as plain data so the form can be
/// rebuilt for the auth retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    parts: Vec<MultipartPart>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: None,
            bytes: bytes.into(),
        });
        self
    }

    pub fn file_with_mime(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: Some(mime.into()),
            bytes: bytes.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form, ApiError> {
        use reqwest::multipart::{Form, Part};

        let mut form = Form::new();
        for part in &self.parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime)?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartPayload),
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<MultipartPayload> for Payload {
    fn from(form: MultipartPayload) -> Self {
        Payload::Multipart(form)
    }
}

/// Decoded response body. Text is kept when the body is not JSON.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub(crate) fn parse(text: String) -> Self {
        if text.trim().is_empty() {
            return ResponseBody::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        }
    }

    /// Mutation responses: anything that is not JSON reads as `null`.
    pub(crate) fn into_value(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Empty | ResponseBody::Text(_) => Value::Null,
        }
    }
}

/// Non-success HTTP response, after the auth retry path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub status: u16,
    pub message: String,
    pub body_snippet: Option<String>,
}

impl RequestError {
    pub(crate) fn from_body(status: u16, body: &ResponseBody) -> Self {
        match body {
            ResponseBody::Json(value) => Self {
                status,
                message: extract_error_message(value)
                    .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()),
                body_snippet: None,
            },
            ResponseBody::Text(raw) => Self {
                status,
                message: FALLBACK_ERROR_MESSAGE.to_string(),
                body_snippet: Some(body_snippet(raw)),
            },
            ResponseBody::Empty => Self {
                status,
                message: FALLBACK_ERROR_MESSAGE.to_string(),
                body_snippet: None,
            },
        }
    }

}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {})", self.message, self.status)
    }
}

impl std::error::Error for RequestError {}

/// Best-effort human message from the error payloads the API returns:
/// `message`, `detail`, `non_field_errors[0]`, then the first entry of any
/// other field error list, in the order the server sent the fields.
pub fn extract_error_message(body: &Value) -> Option<String> {
    fn first_text(value: &Value) -> Option<&str> {
        let text = match value {
            Value::String(text) => Some(text.as_str()),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        };
        text.map(str::trim).filter(|text| !text.is_empty())
    }

    let fields = match body {
        Value::Object(fields) => fields,
        other => return first_text(other).map(str::to_string),
    };

    for key in ["message", "detail"] {
        if let Some(text) = fields.get(key).and_then(Value::as_str) {
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }

    if let Some(text) = fields
        .get("non_field_errors")
        .filter(|v| v.is_array())
        .and_then(first_text)
    {
        return Some(text.to_string());
    }

    fields
        .values()
        .filter(|v| v.is_array())
        .find_map(first_text)
        .map(str::to_string)
}

pub fn body_snippet(raw: &str) -> String {
    raw.trim().chars().take(ERROR_SNIPPET_LIMIT).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("Failed to parse response: {0}")]
    Decode(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// HTTP status of a request failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request(err) => Some(err.status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    pub skip_confirm: bool,
    pub label: Option<String>,
}

impl RemoveOptions {
    pub fn skip_confirm() -> Self {
        Self {
            skip_confirm: true,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Deleted,
    /// The user declined the confirmation prompt; nothing was sent.
    Cancelled,
}

/// Credentials issued by `/admin_login/`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub admin: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_scheme_alternates_and_parses() {
        assert_eq!(AuthScheme::Bearer.alternate(), AuthScheme::Token);
        assert_eq!(AuthScheme::Token.alternate(), AuthScheme::Bearer);
        assert_eq!(AuthScheme::Token.header_value("abc"), "Token abc");
        assert_eq!("BEARER".parse::<AuthScheme>(), Ok(AuthScheme::Bearer));
        assert!("Basic".parse::<AuthScheme>().is_err());
    }

    #[test]
    fn write_method_success_verbs() {
        assert_eq!(WriteMethod::Post.success_verb(), "Created");
        assert_eq!(WriteMethod::Patch.success_verb(), "Updated");
        assert_eq!(WriteMethod::Put.success_verb(), "Updated");
        assert_eq!(WriteMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn error_message_prefers_message_then_detail() {
        let body = json!({ "detail": "Not found.", "message": "Gone" });
        assert_eq!(extract_error_message(&body).as_deref(), Some("Gone"));

        let body = json!({ "detail": "Authentication credentials were not provided." });
        assert_eq!(
            extract_error_message(&body).as_deref(),
            Some("Authentication credentials were not provided.")
        );
    }

    #[test]
    fn error_message_falls_back_to_field_errors() {
        let body = json!({ "non_field_errors": ["Invalid pair"], "image": ["Bad image"] });
        assert_eq!(extract_error_message(&body).as_deref(), Some("Invalid pair"));

        let body = json!({ "image": ["Upload a valid image."], "count": 3 });
        assert_eq!(
            extract_error_message(&body).as_deref(),
            Some("Upload a valid image.")
        );

        let body: Value =
            serde_json::from_str(r#"{ "title": ["Title is required."], "image": ["Bad image"] }"#)
                .unwrap();
        assert_eq!(
            extract_error_message(&body).as_deref(),
            Some("Title is required.")
        );

        assert_eq!(extract_error_message(&json!({ "ok": false })), None);
        assert_eq!(extract_error_message(&json!({ "message": "  " })), None);
    }

    #[test]
    fn request_error_from_text_body_keeps_bounded_snippet() {
        let raw = "<html>".to_string() + &"x".repeat(1000);
        let err = RequestError::from_body(502, &ResponseBody::parse(raw));
        assert_eq!(err.message, FALLBACK_ERROR_MESSAGE);
        let snippet = err.body_snippet.as_deref().expect("snippet");
        assert!(snippet.starts_with("<html>"));
        assert_eq!(snippet.chars().count(), ERROR_SNIPPET_LIMIT);
        assert_eq!(err.to_string(), "Request failed (HTTP 502)");
    }

    #[test]
    fn response_body_parse_distinguishes_shapes() {
        assert_eq!(ResponseBody::parse("  ".into()), ResponseBody::Empty);
        assert_eq!(
            ResponseBody::parse("[1]".into()),
            ResponseBody::Json(json!([1]))
        );
        assert_eq!(
            ResponseBody::parse("oops".into()),
            ResponseBody::Text("oops".into())
        );
        assert_eq!(ResponseBody::Text("oops".into()).into_value(), Value::Null);
    }

    #[test]
    fn multipart_payload_collects_parts() {
        let form = MultipartPayload::new()
            .text("title", "Summer")
            .file_with_mime("image", "banner.png", "image/png", vec![1, 2, 3]);
        assert_eq!(form.len(), 2);
        assert!(form.to_form().is_ok());
        assert!(MultipartPayload::new().is_empty());
    }

    #[test]
    fn api_error_status_reports_request_failures() {
        let err: ApiError = RequestError {
            status: 403,
            message: "Forbidden".into(),
            body_snippet: None,
        }
        .into();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "Forbidden (HTTP 403)");
        assert_eq!(ApiError::validation("bad").status(), None);
    }
}
