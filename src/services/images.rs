// SPDX-License-Identifier: MIT

//! Fire-and-forget tracker image generation.
//!
//! Image generation is cosmetic: it runs detached from the create-tracker
//! flow, and any failure is logged and swallowed. The primary flow never
//! observes it.

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub struct ImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    enabled: bool,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: String,
}

impl ImageClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.generation_base_url.clone(),
            api_key: config.generation_api_key.clone(),
            enabled: !config.generation_api_key.is_empty(),
        }
    }

    /// Disabled client for tests and keyless deployments; `spawn_for_tracker`
    /// becomes a no-op.
    pub fn disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: String::new(),
            api_key: String::new(),
            enabled: false,
        }
    }

    async fn generate(&self, name: &str) -> Result<String, AppError> {
        let body = json!({
            "prompt": format!(
                "A calm, minimal, friendly illustration representing \"{}\" for a personal health app. Soft colors, no text.",
                name
            ),
            "n": 1,
            "size": "512x512",
        });

        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Image request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Generation(format!(
                "Image provider returned {}",
                response.status()
            )));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Malformed image response: {}", e)))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.url)
            .ok_or_else(|| AppError::Generation("Image response had no data".to_string()))
    }

    /// Kick off image generation for a freshly created tracker and record the
    /// URL when it lands. Detached task; returns immediately.
    pub fn spawn_for_tracker(
        self: Arc<Self>,
        db: FirestoreDb,
        user_id: String,
        tracker_id: String,
        name: String,
    ) {
        if !self.enabled {
            return;
        }
        let client = self;
        tokio::spawn(async move {
            match client.generate(&name).await {
                Ok(url) => {
                    if let Err(e) = db.set_tracker_image(&user_id, &tracker_id, &url).await {
                        tracing::warn!(tracker_id, error = %e, "Failed to record tracker image URL");
                    } else {
                        tracing::info!(tracker_id, "Tracker image attached");
                    }
                }
                Err(e) => {
                    tracing::warn!(tracker_id, error = %e, "Tracker image generation failed");
                }
            }
        });
    }
}
