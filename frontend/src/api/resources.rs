use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use super::{
    client::DataClient,
    types::{ApiError, Payload, RemoveOptions, RemoveOutcome, WriteMethod},
};

/// Characters left untouched in an id path segment, same as
/// `encodeURIComponent`.
const ID_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Collections managed from the dashboard. Each one owns a collection
/// endpoint and a slot in the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Influencers,
    Banners,
    Categories,
    Users,
    AdminData,
    SponsoredContent,
    Reviews,
    Faqs,
    Services,
    Expertise,
    Withdrawals,
}

impl ResourceKey {
    pub const ALL: [ResourceKey; 11] = [
        ResourceKey::Influencers,
        ResourceKey::Banners,
        ResourceKey::Categories,
        ResourceKey::Users,
        ResourceKey::AdminData,
        ResourceKey::SponsoredContent,
        ResourceKey::Reviews,
        ResourceKey::Faqs,
        ResourceKey::Services,
        ResourceKey::Expertise,
        ResourceKey::Withdrawals,
    ];

    /// Store name, as page code refers to it.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKey::Influencers => "influencers",
            ResourceKey::Banners => "banners",
            ResourceKey::Categories => "categories",
            ResourceKey::Users => "users",
            ResourceKey::AdminData => "adminData",
            ResourceKey::SponsoredContent => "sponsoredContent",
            ResourceKey::Reviews => "reviews",
            ResourceKey::Faqs => "faqs",
            ResourceKey::Services => "services",
            ResourceKey::Expertise => "expertise",
            ResourceKey::Withdrawals => "withdrawals",
        }
    }

    pub fn collection_path(self) -> &'static str {
        match self {
            ResourceKey::Influencers => "/influencers/",
            ResourceKey::Banners => "/banners/",
            ResourceKey::Categories => "/category/",
            ResourceKey::Users => "/register/",
            ResourceKey::AdminData => "/admin_data/",
            ResourceKey::SponsoredContent => "/sponsored_content/",
            ResourceKey::Reviews => "/reviews/",
            ResourceKey::Faqs => "/faqs/",
            ResourceKey::Services => "/services/",
            ResourceKey::Expertise => "/expertise/",
            ResourceKey::Withdrawals => "/withdrawals/",
        }
    }

    pub fn item_path(self, id: &str) -> String {
        format!(
            "{}{}/",
            self.collection_path(),
            utf8_percent_encode(id.trim(), ID_SEGMENT)
        )
    }

    /// Singular label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKey::Influencers => "Influencer",
            ResourceKey::Banners => "Banner",
            ResourceKey::Categories => "Category",
            ResourceKey::Users => "User",
            ResourceKey::AdminData => "Admin Data",
            ResourceKey::SponsoredContent => "Sponsored Content",
            ResourceKey::Reviews => "Review",
            ResourceKey::Faqs => "FAQ",
            ResourceKey::Services => "Service",
            ResourceKey::Expertise => "Expertise",
            ResourceKey::Withdrawals => "Withdrawal",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim() {
            "influencers" => ResourceKey::Influencers,
            "banners" => ResourceKey::Banners,
            "categories" => ResourceKey::Categories,
            "users" => ResourceKey::Users,
            "adminData" | "admin_data" => ResourceKey::AdminData,
            "sponsoredContent" | "sponsored_content" => ResourceKey::SponsoredContent,
            "reviews" => ResourceKey::Reviews,
            "faqs" => ResourceKey::Faqs,
            "services" => ResourceKey::Services,
            "expertise" => ResourceKey::Expertise,
            "withdrawals" => ResourceKey::Withdrawals,
            other => return Err(format!("Unknown resource key: {}", other)),
        };
        Ok(key)
    }
}

impl DataClient {
    pub async fn create(
        &self,
        key: ResourceKey,
        payload: impl Into<Payload>,
        label: &str,
    ) -> Result<Value, ApiError> {
        self.write(WriteMethod::Post, key.collection_path(), payload, label)
            .await
    }

    pub async fn update(
        &self,
        key: ResourceKey,
        id: &str,
        payload: impl Into<Payload>,
        label: &str,
    ) -> Result<Value, ApiError> {
        self.write(WriteMethod::Patch, &key.item_path(id), payload, label)
            .await
    }

    pub async fn delete(
        &self,
        key: ResourceKey,
        id: &str,
        options: RemoveOptions,
    ) -> Result<RemoveOutcome, ApiError> {
        let options = RemoveOptions {
            label: options.label.or_else(|| Some(key.label().to_string())),
            ..options
        };
        self.remove(&key.item_path(id), options).await
    }

    /// Tries each `(method, endpoint)` in order and returns the first
    /// success, or the last failure.
    pub async fn write_with_fallback(
        &self,
        attempts: &[(WriteMethod, &str)],
        payload: impl Into<Payload>,
        label: &str,
    ) -> Result<Value, ApiError> {
        let payload = payload.into();
        let mut last_error = None;
        for (method, endpoint) in attempts {
            match self.write_payload(*method, endpoint, &payload, label).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::debug!(%method, endpoint, error = %err, "write attempt failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ApiError::validation("No write endpoints given")))
    }

    /// Confirms once, then deletes through the first endpoint that accepts
    /// the request.
    pub async fn remove_with_fallback(
        &self,
        endpoints: &[&str],
        options: RemoveOptions,
    ) -> Result<RemoveOutcome, ApiError> {
        if endpoints.is_empty() {
            return Err(ApiError::validation("No delete endpoints given"));
        }
        if !options.skip_confirm && !self.confirm_delete().await {
            return Ok(RemoveOutcome::Cancelled);
        }
        let confirmed = RemoveOptions {
            skip_confirm: true,
            ..options
        };
        let mut last_error = None;
        for endpoint in endpoints {
            match self.remove(endpoint, confirmed.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    tracing::debug!(endpoint, error = %err, "delete attempt failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ApiError::validation("No delete endpoints given")))
    }
}
