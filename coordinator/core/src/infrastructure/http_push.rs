// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// HTTP Model Push Adapter
//
// Posts the aggregated parameters as plain JSON to
// `{callback_address}{receive_path}`, the endpoint participants expose to
// receive the global model. Any non-2xx response is a delivery failure.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::distribution::{DeliveryError, ModelPush};
use crate::domain::model::GlobalModel;

pub struct HttpModelPush {
    client: reqwest::Client,
    receive_path: String,
}

impl HttpModelPush {
    pub fn new(receive_path: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            receive_path: receive_path.into(),
        })
    }

    fn endpoint(&self, address: &str) -> Result<String, DeliveryError> {
        let base = address.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(DeliveryError::InvalidAddress(address.to_string()));
        }
        Ok(format!("{}{}", base, self.receive_path))
    }
}

#[async_trait]
impl ModelPush for HttpModelPush {
    async fn push(&self, address: &str, model: &GlobalModel) -> Result<(), DeliveryError> {
        let url = self.endpoint(address)?;

        let response = self
            .client
            .post(&url)
            .json(&model.parameters)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push() -> HttpModelPush {
        HttpModelPush::new("/receive_model", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_receive_path() {
        assert_eq!(
            push().endpoint("http://10.0.0.7:8000/").unwrap(),
            "http://10.0.0.7:8000/receive_model"
        );
    }

    #[test]
    fn test_endpoint_requires_http_scheme() {
        assert_eq!(
            push().endpoint("10.0.0.7:8000"),
            Err(DeliveryError::InvalidAddress("10.0.0.7:8000".to_string()))
        );
    }
}
