//! Edit-notification subscription toggles.
//!
//! The notification delivery itself lives in an external subsystem; the
//! pipeline only flips the per-user watch state and reports which way it
//! went.

use std::sync::Arc;

use crate::application::documents::map_repo;
use crate::application::error::AppError;
use crate::application::repos::SubscriptionsRepo;
use crate::domain::entities::DocumentBundle;

pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionsRepo>,
}

impl SubscriptionService {
    pub fn new(subscriptions: Arc<dyn SubscriptionsRepo>) -> Self {
        Self { subscriptions }
    }

    /// Toggle watching a single document. Returns `1` when the caller is now
    /// subscribed, `0` when the toggle unsubscribed them.
    pub async fn toggle_document(
        &self,
        username: &str,
        bundle: &DocumentBundle,
    ) -> Result<u8, AppError> {
        self.toggle(username, bundle, false).await
    }

    /// Toggle watching a document and everything beneath it.
    pub async fn toggle_tree(
        &self,
        username: &str,
        bundle: &DocumentBundle,
    ) -> Result<u8, AppError> {
        self.toggle(username, bundle, true).await
    }

    async fn toggle(
        &self,
        username: &str,
        bundle: &DocumentBundle,
        in_tree: bool,
    ) -> Result<u8, AppError> {
        let subscribed = self
            .subscriptions
            .toggle(username, bundle.document.id, in_tree)
            .await
            .map_err(map_repo)?;
        Ok(u8::from(subscribed))
    }
}
