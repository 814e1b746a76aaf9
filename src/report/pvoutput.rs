// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PVOutput add status uploader
//!
//! Reports are sent as a single `POST` to the add status service, the payload
//! travelling in the query string and the credentials in the
//! `X-Pvoutput-Apikey` and `X-Pvoutput-SystemId` headers. Failed requests are
//! not retried, the next window produces the next report.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};

use super::{ReportUploader, UploadPayload};
use crate::config::PvOutputConfig;
use crate::error::UploadError;

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-pvoutput-apikey");
const SYSTEM_ID_HEADER: HeaderName = HeaderName::from_static("x-pvoutput-systemid");

/// Uploader for the PVOutput add status service.
#[derive(Debug, Clone)]
pub struct PvOutputUploader {
    /// Service endpoint
    url: String,
    /// Credentials and fixed headers sent with every request
    headers: HeaderMap,
    /// HTTP client for making requests
    client: reqwest::Client,
    /// Timeout for HTTP requests
    timeout: Duration,
}

impl PvOutputUploader {
    /// Create an uploader for `url` with the given credentials.
    ///
    /// # Errors
    ///
    /// Fails when a credential cannot be used as an HTTP header value.
    pub fn new(
        url: impl Into<String>,
        api_key: &str,
        system_id: &str,
    ) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(api_key)
                .map_err(|_| UploadError::InvalidHeader("X-Pvoutput-Apikey"))?,
        );
        headers.insert(
            SYSTEM_ID_HEADER,
            HeaderValue::from_str(system_id)
                .map_err(|_| UploadError::InvalidHeader("X-Pvoutput-SystemId"))?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        Ok(Self {
            url: url.into(),
            headers,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        })
    }

    pub fn from_config(config: &PvOutputConfig) -> Result<Self, UploadError> {
        Ok(Self::new(&config.url, &config.api_key, &config.system_id)?
            .with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Set HTTP request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_secs(1));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReportUploader for PvOutputUploader {
    async fn upload(&self, payload: &UploadPayload) -> Result<(), UploadError> {
        debug!("Posting {:?} to {}", payload, self.url);
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .query(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UploadError::Request {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("Successfully posted to {}", self.url);
        Ok(())
    }
}
