// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content delivery: one publish attempt per fired action

use pb_adapters::{PlatformAdapter, Post};
use pb_core::{CredentialSet, DeliveryResult};
use std::any::Any;
use std::sync::Arc;

/// Publishes posts with the worker's resolved session.
///
/// `deliver` never fails: adapter errors and panics both come back as an
/// unsuccessful [`DeliveryResult`].
#[derive(Clone)]
pub struct DeliveryHandler<P> {
    platform: P,
    credentials: Arc<CredentialSet>,
}

impl<P: PlatformAdapter> DeliveryHandler<P> {
    pub fn new(platform: P, credentials: CredentialSet) -> Self {
        Self {
            platform,
            credentials: Arc::new(credentials),
        }
    }

    pub async fn deliver(&self, post: Post) -> DeliveryResult {
        let action_id = post.action_id.clone();
        let platform = self.platform.clone();
        let credentials = Arc::clone(&self.credentials);

        // Own task, so a panicking adapter surfaces as a JoinError
        let task = tokio::spawn(async move { platform.publish(&credentials, &post).await });

        match task.await {
            Ok(Ok(published)) => {
                tracing::info!(action_id = %action_id, post_id = %published.id, url = ?published.url, "post delivered");
                DeliveryResult::delivered(published)
            }
            Ok(Err(e)) => {
                tracing::error!(action_id = %action_id, error = %e, "delivery failed");
                DeliveryResult::failed(e.to_string())
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                tracing::error!(action_id = %action_id, panic = %message, "delivery panicked");
                DeliveryResult::failed(format!("publish panicked: {}", message))
            }
            Err(e) => {
                tracing::error!(action_id = %action_id, error = %e, "delivery task cancelled");
                DeliveryResult::failed(e.to_string())
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
