use reqwest::{header::AUTHORIZATION, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    client::DataClient,
    types::{AdminSession, ApiError, AuthScheme, Payload},
};

pub const LOGIN_ENDPOINT: &str = "/admin_login/";

const TOKEN_NOT_RECEIVED: &str = "Login failed: token not received";

/// Attaches `Authorization: <scheme> <token>` when a credential is present.
pub(crate) fn apply_auth(
    request: RequestBuilder,
    credential: Option<&str>,
    scheme: AuthScheme,
) -> RequestBuilder {
    match credential {
        Some(token) => request.header(AUTHORIZATION, scheme.header_value(token)),
        None => request,
    }
}

/// Same acceptance as `\S+@\S+\.\S+` searched anywhere in the input.
fn looks_like_email(email: &str) -> bool {
    email.split_whitespace().any(|word| {
        word.char_indices().any(|(at, c)| {
            if c != '@' || at == 0 {
                return false;
            }
            let domain = &word[at + 1..];
            domain
                .char_indices()
                .any(|(dot, c)| c == '.' && dot > 0 && dot + 1 < domain.len())
        })
    })
}

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if !looks_like_email(email) {
        return Err(ApiError::validation("Enter a valid email"));
    }
    if password.trim().is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginData {
    access: Option<String>,
    refresh: Option<String>,
    admin: Option<Value>,
    user: Option<Value>,
}

/// Login responses seen in the wild put the tokens either at the top level
/// or under `data`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginEnvelope {
    access_token: Option<String>,
    access: Option<String>,
    token: Option<String>,
    refresh_token: Option<String>,
    refresh: Option<String>,
    admin: Option<Value>,
    user: Option<Value>,
    data: Option<LoginData>,
    message: Option<String>,
}

impl LoginEnvelope {
    fn into_session(self) -> Result<AdminSession, ApiError> {
        let data = self.data.unwrap_or_default();
        let present = |value: &String| !value.trim().is_empty();

        let access_token = self
            .access_token
            .filter(present)
            .or(self.access.filter(present))
            .or(self.token.filter(present))
            .or(data.access.filter(present));
        let Some(access_token) = access_token else {
            let message = self
                .message
                .filter(present)
                .unwrap_or_else(|| TOKEN_NOT_RECEIVED.to_string());
            return Err(ApiError::Validation(message));
        };

        Ok(AdminSession {
            access_token,
            refresh_token: self
                .refresh_token
                .filter(present)
                .or(self.refresh.filter(present))
                .or(data.refresh.filter(present)),
            admin: self.admin.or(self.user).or(data.admin).or(data.user),
        })
    }
}

impl DataClient {
    /// Exchanges admin credentials for a session and persists it. Sent
    /// without any stored credential and without a toast.
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminSession, ApiError> {
        validate_credentials(email, password)?;

        let payload = Payload::Json(json!({ "email": email, "password": password }));
        let body = self
            .execute_with(Method::POST, LOGIN_ENDPOINT, &payload, None)
            .await?
            .into_value();
        let envelope = match body {
            Value::Null => LoginEnvelope::default(),
            body => serde_json::from_value::<LoginEnvelope>(body)
                .map_err(|e| ApiError::Decode(e.to_string()))?,
        };

        let session = envelope.into_session()?;
        self.session().persist(&session)?;
        tracing::info!(
            has_refresh_token = session.refresh_token.is_some(),
            "admin session established"
        );
        Ok(session)
    }

    /// Ends the session and tears down everything cached under it.
    pub fn logout(&self) -> Result<(), ApiError> {
        let floor = self.reset_fetch_state();
        self.store().clear(floor);
        self.session().clear()?;
        tracing::info!("admin session cleared");
        Ok(())
    }
}
