use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::MockServer;

use crate::api::DataClient;
use crate::config::Config;
use crate::notify::{ConfirmPrompt, Confirmation, Notifier, Toast};
use crate::state::session::ACCESS_TOKEN_KEY;
use crate::utils::storage::{KeyValueStorage, MemoryStorage};

pub const TEST_TOKEN: &str = "tok";

/// Records every toast and prompt and answers prompts with a fixed decision.
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
    prompts: Mutex<Vec<ConfirmPrompt>>,
    answer: Confirmation,
}

impl RecordingNotifier {
    pub fn confirming() -> Arc<Self> {
        Arc::new(Self::answering(Confirmation::Confirmed))
    }

    pub fn declining() -> Arc<Self> {
        Arc::new(Self::answering(Confirmation::Declined))
    }

    fn answering(answer: Confirmation) -> Self {
        Self {
            toasts: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            answer,
        }
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }

    pub fn toast_texts(&self) -> Vec<String> {
        self.toasts().into_iter().map(|toast| toast.text).collect()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }

    async fn confirm(&self, prompt: ConfirmPrompt) -> Confirmation {
        self.prompts.lock().unwrap().push(prompt);
        self.answer
    }
}

pub struct TestClient {
    pub client: DataClient,
    pub storage: Arc<MemoryStorage>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn build_client(
    config: Config,
    token: Option<&str>,
    notifier: Arc<RecordingNotifier>,
) -> TestClient {
    let storage = Arc::new(MemoryStorage::new());
    if let Some(token) = token {
        storage.set_item(ACCESS_TOKEN_KEY, token).unwrap();
    }
    let client = DataClient::new(&config, storage.clone(), notifier.clone()).unwrap();
    TestClient {
        client,
        storage,
        notifier,
    }
}

/// Authenticated client with the default cooldown and a confirming notifier.
pub fn authed_client(server: &MockServer) -> TestClient {
    build_client(
        Config::for_base_url(server.base_url()),
        Some(TEST_TOKEN),
        RecordingNotifier::confirming(),
    )
}

pub fn anonymous_client(server: &MockServer) -> TestClient {
    build_client(
        Config::for_base_url(server.base_url()),
        None,
        RecordingNotifier::confirming(),
    )
}

pub fn client_with_cooldown(server: &MockServer, cooldown: Duration) -> TestClient {
    build_client(
        Config::for_base_url(server.base_url()).with_fetch_cooldown(cooldown),
        Some(TEST_TOKEN),
        RecordingNotifier::confirming(),
    )
}
