// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP platform adapter
//!
//! `ureq` is blocking, so every request runs on tokio's blocking pool.

use super::{PlatformAdapter, PlatformError, Post};
use async_trait::async_trait;
use pb_core::{
    CookieHeaderEncoder, CredentialEncoder, CredentialSet, LoginCredentials, PlatformConfig,
    PublishedPost,
};
use serde::Deserialize;
use std::sync::Arc;

/// Cookie the platform mirrors into the CSRF header
const CSRF_COOKIE: &str = "ct0";
const CSRF_HEADER: &str = "x-csrf-token";

/// Longest response body quoted back in an error
const MAX_ERROR_BODY: usize = 200;

/// Platform adapter speaking the session/publish HTTP API
#[derive(Clone)]
pub struct HttpPlatformAdapter {
    agent: ureq::Agent,
    base_url: String,
    encoder: Arc<dyn CredentialEncoder>,
}

impl HttpPlatformAdapter {
    pub fn new(config: &PlatformConfig) -> Self {
        Self::with_encoder(config, Arc::new(CookieHeaderEncoder))
    }

    pub fn with_encoder(config: &PlatformConfig, encoder: Arc<dyn CredentialEncoder>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            encoder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Session headers for an authenticated request
    fn session_headers(&self, credentials: &CredentialSet) -> Vec<(&'static str, String)> {
        let mut headers = vec![(self.encoder.header_name(), self.encoder.encode(credentials))];
        if let Some(csrf) = credentials.get(CSRF_COOKIE) {
            headers.push((CSRF_HEADER, csrf.value.clone()));
        }
        headers
    }
}

/// Status and body of a completed request
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_error(self) -> PlatformError {
        match self.status {
            401 | 403 => PlatformError::Unauthorized,
            429 => PlatformError::RateLimited,
            status => PlatformError::Rejected {
                status,
                message: self.body.chars().take(MAX_ERROR_BODY).collect(),
            },
        }
    }
}

enum Method {
    Get,
    Post(String),
}

async fn execute(
    agent: &ureq::Agent,
    url: String,
    headers: Vec<(&'static str, String)>,
    method: Method,
) -> Result<Reply, PlatformError> {
    let agent = agent.clone();
    tokio::task::spawn_blocking(move || {
        let result = match method {
            Method::Get => {
                let mut request = agent.get(&url);
                for (name, value) in &headers {
                    request = request.header(*name, value.as_str());
                }
                request.call()
            }
            Method::Post(body) => {
                let mut request = agent.post(&url).header("Content-Type", "application/json");
                for (name, value) in &headers {
                    request = request.header(*name, value.as_str());
                }
                request.send(body)
            }
        };
        let mut response = result.map_err(|e| PlatformError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| PlatformError::Transport(format!("failed to read response: {}", e)))?;
        Ok(Reply { status, body })
    })
    .await
    .map_err(|e| PlatformError::Transport(format!("request task failed: {}", e)))?
}

#[derive(Deserialize)]
struct PublishResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl PlatformAdapter for HttpPlatformAdapter {
    async fn verify_session(&self, credentials: &CredentialSet) -> Result<bool, PlatformError> {
        if credentials.is_empty() {
            return Ok(false);
        }
        let reply = execute(
            &self.agent,
            self.url("/api/session"),
            self.session_headers(credentials),
            Method::Get,
        )
        .await?;
        match reply.status {
            s if (200..300).contains(&s) => Ok(true),
            401 | 403 => Ok(false),
            _ => Err(reply.into_error()),
        }
    }

    async fn login(&self, login: &LoginCredentials) -> Result<CredentialSet, PlatformError> {
        let body = serde_json::json!({
            "username": login.username,
            "password": login.password,
        })
        .to_string();
        let reply = execute(&self.agent, self.url("/api/login"), Vec::new(), Method::Post(body))
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        CredentialSet::from_export_json(&reply.body)
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))
    }

    async fn publish(
        &self,
        credentials: &CredentialSet,
        post: &Post,
    ) -> Result<PublishedPost, PlatformError> {
        let body = serde_json::json!({ "text": post.text }).to_string();
        let reply = execute(
            &self.agent,
            self.url("/api/posts"),
            self.session_headers(credentials),
            Method::Post(body),
        )
        .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        let parsed: PublishResponse = serde_json::from_str(&reply.body)
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;
        Ok(PublishedPost {
            id: parsed.id,
            url: parsed.url,
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
