//! User-facing side effects of data operations: transient toasts and
//! blocking confirmation prompts.

use async_trait::async_trait;
use std::time::Duration;

pub const TOAST_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub text: String,
    pub auto_dismiss: Duration,
}

impl Toast {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            title: "Success!".to_string(),
            text: text.into(),
            auto_dismiss: TOAST_DURATION,
        }
    }

    pub fn deleted(text: impl Into<String>) -> Self {
        Self {
            title: "Deleted!".to_string(),
            text: text.into(),
            auto_dismiss: TOAST_DURATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub text: String,
    pub confirm_label: String,
    pub cancel_label: String,
    pub destructive: bool,
}

impl ConfirmPrompt {
    pub fn delete() -> Self {
        Self {
            title: "Delete?".to_string(),
            text: "This cannot be undone!".to_string(),
            confirm_label: "Yes, delete it!".to_string(),
            cancel_label: "Cancel".to_string(),
            destructive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

impl Confirmation {
    pub fn is_confirmed(self) -> bool {
        self == Confirmation::Confirmed
    }
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire-and-forget; must not wait on the user.
    fn notify(&self, toast: Toast);

    /// Suspends until the user answers.
    async fn confirm(&self, prompt: ConfirmPrompt) -> Confirmation;
}

/// Logs toasts and answers every prompt with a fixed decision. Suitable for
/// unattended use where nobody can answer a prompt.
#[derive(Debug, Clone, Copy)]
pub struct TracingNotifier {
    unattended_answer: Confirmation,
}

impl TracingNotifier {
    pub fn declining() -> Self {
        Self {
            unattended_answer: Confirmation::Declined,
        }
    }

    pub fn confirming() -> Self {
        Self {
            unattended_answer: Confirmation::Confirmed,
        }
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::declining()
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        tracing::info!(title = %toast.title, "{}", toast.text);
    }

    async fn confirm(&self, prompt: ConfirmPrompt) -> Confirmation {
        tracing::info!(
            title = %prompt.title,
            answer = ?self.unattended_answer,
            "answering confirmation prompt without user"
        );
        self.unattended_answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_notifier_answers_with_configured_decision() {
        assert_eq!(
            TracingNotifier::default()
                .confirm(ConfirmPrompt::delete())
                .await,
            Confirmation::Declined
        );
        assert!(TracingNotifier::confirming()
            .confirm(ConfirmPrompt::delete())
            .await
            .is_confirmed());
    }

    #[test]
    fn toasts_auto_dismiss() {
        let toast = Toast::success("Banner Created Successfully!");
        assert_eq!(toast.title, "Success!");
        assert_eq!(toast.auto_dismiss, TOAST_DURATION);
        assert_eq!(Toast::deleted("Banner removed.").title, "Deleted!");
        assert_eq!(Confirmation::from(false), Confirmation::Declined);
    }
}
