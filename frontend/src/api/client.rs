use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{
    cookie::{CookieStore, Jar},
    Client, Method, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;

use super::{
    auth::apply_auth,
    bulk::FetchRegistry,
    types::{
        body_snippet, ApiError, AuthScheme, Payload, RemoveOptions, RemoveOutcome, RequestError,
        ResponseBody, WriteMethod,
    },
};
use crate::{
    config::Config,
    notify::{ConfirmPrompt, Notifier, Toast},
    state::{SessionStore, SharedStore},
    utils::storage::KeyValueStorage,
};

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";
const DEFAULT_REMOVE_LABEL: &str = "Item";

/// Handle to the dashboard's data-access context. Cloning is cheap and every
/// clone shares the same session, store and fetch registries.
#[derive(Clone)]
pub struct DataClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Client,
    cookies: Arc<Jar>,
    base_url: String,
    auth_scheme: AuthScheme,
    fetch_cooldown: Duration,
    session: SessionStore,
    notifier: Arc<dyn Notifier>,
    store: SharedStore,
    registry: Mutex<FetchRegistry>,
}

impl DataClient {
    pub fn new(
        config: &Config,
        storage: Arc<dyn KeyValueStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let cookies = Arc::new(Jar::default());
        let mut builder = Client::builder().cookie_provider(cookies.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let session = SessionStore::open(storage)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                cookies,
                base_url: config.base_url().trim_end_matches('/').to_string(),
                auth_scheme: config.auth_scheme,
                fetch_cooldown: config.fetch_cooldown,
                session,
                notifier,
                store: SharedStore::new(),
                registry: Mutex::new(FetchRegistry::default()),
            }),
        })
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Cookies received from the API, sent back on every request.
    pub fn cookie_jar(&self) -> &Jar {
        &self.inner.cookies
    }

    pub fn is_authenticated(&self) -> Result<bool, ApiError> {
        Ok(self.inner.session.is_authenticated()?)
    }

    pub fn admin_profile(&self) -> Result<Option<Value>, ApiError> {
        Ok(self.inner.session.admin_profile()?)
    }

    pub(crate) fn fetch_cooldown(&self) -> Duration {
        self.inner.fetch_cooldown
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, FetchRegistry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let invalid = |reason: String| ApiError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };
        let path = endpoint
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(endpoint);
        if path.contains("://") {
            return Err(invalid("endpoint must be relative to the base URL".into()));
        }
        let joined = if endpoint.starts_with('/') {
            format!("{}{}", self.inner.base_url, endpoint)
        } else {
            format!("{}/{}", self.inner.base_url, endpoint)
        };
        Url::parse(&joined).map_err(|err| invalid(err.to_string()))
    }

    fn csrf_token(&self, url: &Url) -> Option<String> {
        let header = self.inner.cookies.cookies(url)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == CSRF_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
    }

    /// Sends with the stored credential, if any.
    pub(crate) async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        payload: &Payload,
    ) -> Result<ResponseBody, ApiError> {
        let credential = self.inner.session.credential();
        self.execute_with(method, endpoint, payload, credential)
            .await
    }

    /// Sends once under the preferred scheme and, when an authenticated
    /// request is rejected with 401/403, once more under the alternate one.
    pub(crate) async fn execute_with(
        &self,
        method: Method,
        endpoint: &str,
        payload: &Payload,
        credential: Option<String>,
    ) -> Result<ResponseBody, ApiError> {
        let url = self.url(endpoint)?;
        let span = tracing::debug_span!("api_request", %method, endpoint);

        async move {
            let scheme = self.inner.auth_scheme;
            let credential = credential.as_deref();
            let (mut status, mut body) = self
                .send_once(&method, &url, payload, credential, scheme)
                .await?;

            if is_auth_rejection(status) && credential.is_some() {
                let retry_scheme = scheme.alternate();
                tracing::debug!(
                    status = status.as_u16(),
                    %retry_scheme,
                    "retrying with alternate auth scheme"
                );
                (status, body) = self
                    .send_once(&method, &url, payload, credential, retry_scheme)
                    .await?;
            }

            if status.is_success() {
                Ok(body)
            } else {
                tracing::debug!(status = status.as_u16(), "request rejected");
                Err(RequestError::from_body(status.as_u16(), &body).into())
            }
        }
        .instrument(span)
        .await
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        payload: &Payload,
        credential: Option<&str>,
        scheme: AuthScheme,
    ) -> Result<(StatusCode, ResponseBody), ApiError> {
        let mut request = apply_auth(
            self.inner.http.request(method.clone(), url.clone()),
            credential,
            scheme,
        );
        if let Some(token) = self.csrf_token(url) {
            request = request.header(CSRF_HEADER, token);
        }
        request = match payload {
            Payload::Empty => request,
            Payload::Json(value) => request.json(value),
            Payload::Multipart(form) => request.multipart(form.to_form()?),
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, ResponseBody::parse(text)))
    }

    /// GET returning the decoded JSON body; an empty body reads as `null`.
    pub async fn read(&self, endpoint: &str) -> Result<Value, ApiError> {
        match self.execute(Method::GET, endpoint, &Payload::Empty).await? {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Empty => Ok(Value::Null),
            ResponseBody::Text(raw) => Err(ApiError::Decode(format!(
                "expected a JSON body, got: {}",
                body_snippet(&raw)
            ))),
        }
    }

    pub async fn read_as<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let value = self.read(endpoint).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Create or update, announcing success as `"<label> Created
    /// Successfully!"` or `"<label> Updated Successfully!"`.
    pub async fn write(
        &self,
        method: WriteMethod,
        endpoint: &str,
        payload: impl Into<Payload>,
        label: &str,
    ) -> Result<Value, ApiError> {
        self.write_payload(method, endpoint, &payload.into(), label)
            .await
    }

    pub(crate) async fn write_payload(
        &self,
        method: WriteMethod,
        endpoint: &str,
        payload: &Payload,
        label: &str,
    ) -> Result<Value, ApiError> {
        let body = self.execute(method.as_method(), endpoint, payload).await?;
        self.inner.notifier.notify(Toast::success(format!(
            "{} {} Successfully!",
            label,
            method.success_verb()
        )));
        Ok(body.into_value())
    }

    pub async fn post(
        &self,
        endpoint: &str,
        payload: impl Into<Payload>,
        label: &str,
    ) -> Result<Value, ApiError> {
        self.write(WriteMethod::Post, endpoint, payload, label).await
    }

    pub async fn patch(
        &self,
        endpoint: &str,
        payload: impl Into<Payload>,
        label: &str,
    ) -> Result<Value, ApiError> {
        self.write(WriteMethod::Patch, endpoint, payload, label).await
    }

    pub async fn put(
        &self,
        endpoint: &str,
        payload: impl Into<Payload>,
        label: &str,
    ) -> Result<Value, ApiError> {
        self.write(WriteMethod::Put, endpoint, payload, label).await
    }

    pub(crate) async fn confirm_delete(&self) -> bool {
        self.inner
            .notifier
            .confirm(ConfirmPrompt::delete())
            .await
            .is_confirmed()
    }

    /// DELETE behind a confirmation prompt. A declined prompt sends nothing.
    pub async fn remove(
        &self,
        endpoint: &str,
        options: RemoveOptions,
    ) -> Result<RemoveOutcome, ApiError> {
        if !options.skip_confirm && !self.confirm_delete().await {
            tracing::debug!(endpoint, "delete declined at confirmation prompt");
            return Ok(RemoveOutcome::Cancelled);
        }

        self.execute(Method::DELETE, endpoint, &Payload::Empty)
            .await?;

        let label = options.label.as_deref().unwrap_or(DEFAULT_REMOVE_LABEL);
        self.inner
            .notifier
            .notify(Toast::deleted(format!("{} removed.", label)));
        Ok(RemoveOutcome::Deleted)
    }
}

fn is_auth_rejection(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::TracingNotifier;
    use crate::utils::storage::MemoryStorage;

    fn client(base: &str) -> DataClient {
        DataClient::new(
            &Config::for_base_url(base),
            Arc::new(MemoryStorage::new()),
            Arc::new(TracingNotifier::default()),
        )
        .unwrap()
    }

    #[test]
    fn joins_endpoints_onto_trimmed_base() {
        let client = client("http://localhost:5173/api/");
        assert_eq!(client.base_url(), "http://localhost:5173/api");
        assert_eq!(
            client.url("/banners/").unwrap().as_str(),
            "http://localhost:5173/api/banners/"
        );
        assert_eq!(
            client.url("faqs/3/").unwrap().as_str(),
            "http://localhost:5173/api/faqs/3/"
        );
    }

    #[test]
    fn rejects_absolute_and_unparsable_endpoints() {
        let proxied = client("http://localhost:5173/api");
        assert!(matches!(
            proxied.url("https://elsewhere.example/x/"),
            Err(ApiError::InvalidEndpoint { .. })
        ));
        assert_eq!(
            proxied.url("/x/?next=http://a").unwrap().as_str(),
            "http://localhost:5173/api/x/?next=http://a"
        );
        assert!(matches!(
            client("not a url").url("/x/"),
            Err(ApiError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn csrf_token_comes_from_cookie_jar() {
        let client = client("http://localhost:5173/api");
        let url = client.url("/banners/").unwrap();
        assert_eq!(client.csrf_token(&url), None);

        client
            .cookie_jar()
            .add_cookie_str("csrftoken=abc123; Path=/", &url);
        client
            .cookie_jar()
            .add_cookie_str("sessionid=zzz; Path=/", &url);
        assert_eq!(client.csrf_token(&url).as_deref(), Some("abc123"));
    }

    #[test]
    fn only_401_and_403_trigger_the_retry() {
        assert!(is_auth_rejection(StatusCode::UNAUTHORIZED));
        assert!(is_auth_rejection(StatusCode::FORBIDDEN));
        assert!(!is_auth_rejection(StatusCode::NOT_FOUND));
    }
}
