//! Rotator delegating to an HTTP endpoint.
//!
//! The endpoint receives the full rotation context as JSON and answers
//! with a [`ProtocolResponse`]. A non-2xx status or `success=false` is a
//! rotation failure; everything the endpoint reports (reference, warnings,
//! metadata) surfaces into the result.

use std::time::Duration;

use async_trait::async_trait;
use dsops_core::{
    DsopsError, Result, RotationRequest, RotationResult, RotationStatus, RotationStatusInfo,
    SecretInfo, SecretReference, VerificationResult, VerificationTest,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};

use crate::protocol::{ProtocolRequest, ProtocolResponse};
use crate::rotator::Rotator;

/// Default HTTP timeout; a caller's shorter deadline always prevails
/// because dropping the rotate future aborts the in-flight request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const COMPONENT: &str = "webhook_rotator";

/// HTTP-delegating rotator
pub struct WebhookRotator {
    client: reqwest::Client,
}

impl Default for WebhookRotator {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookRotator {
    /// Rotator with the default 30 s client timeout
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// The endpoint for a request: `endpoint` in the request config wins,
    /// the legacy `webhook_url` metadata entry is the fallback.
    fn endpoint(request: &RotationRequest) -> Result<String> {
        request
            .config_str("endpoint")
            .or_else(|| request.secret.meta("webhook_url"))
            .map(str::to_string)
            .ok_or_else(|| {
                DsopsError::configuration(
                    "endpoint",
                    request.secret.key.clone(),
                    "neither `endpoint` config nor `webhook_url` metadata is set",
                )
            })
    }

    /// Authorization plus any freeform headers from the request config.
    ///
    /// `auth` in the config is preferred; `webhook_auth_header` metadata is
    /// the legacy spelling.
    fn headers(request: &RotationRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let auth = request
            .config_str("auth")
            .or_else(|| request.secret.meta("webhook_auth_header"));
        if let Some(auth) = auth {
            if let Ok(value) = HeaderValue::from_str(auth) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        if let Some(Value::Object(map)) = request.config.get("headers") {
            for (name, value) in map {
                let (Ok(name), Some(value)) = (name.parse::<HeaderName>(), value.as_str()) else {
                    continue;
                };
                if let Ok(value) = HeaderValue::from_str(value) {
                    headers.insert(name, value);
                }
            }
        }
        headers
    }

    async fn post(
        &self,
        request: &RotationRequest,
        payload: &ProtocolRequest,
    ) -> Result<ProtocolResponse> {
        let endpoint = Self::endpoint(request)?;
        let response = self
            .client
            .post(&endpoint)
            .headers(Self::headers(request))
            .json(payload)
            .send()
            .await
            .map_err(|e| DsopsError::Http {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DsopsError::Http {
                status: Some(status.as_u16()),
                message: format!("webhook returned status {status}: {body}"),
            });
        }

        response.json().await.map_err(|e| DsopsError::Http {
            status: Some(status.as_u16()),
            message: format!("webhook response is not valid JSON: {e}"),
        })
    }
}

#[async_trait]
impl Rotator for WebhookRotator {
    fn name(&self) -> &str {
        "webhook"
    }

    fn supports_secret(&self, secret: &SecretInfo) -> bool {
        secret.meta("webhook_url").is_some() || secret.meta("endpoint").is_some()
    }

    async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let mut result = RotationResult::new(request.secret.clone());
        result.audit(
            "rotation_started",
            COMPONENT,
            "started",
            format!("delegating rotation of `{}`", request.secret.key),
        );

        let payload = ProtocolRequest::for_action("rotate", request);
        let response = match self.post(request, &payload).await {
            Ok(response) => response,
            Err(e) => {
                result.audit("webhook_call", COMPONENT, "failed", e.to_string());
                result.fail(e.to_string());
                return Ok(result);
            }
        };

        if !response.success {
            result.audit("webhook_call", COMPONENT, "failed", response.failure_message());
            result.fail(response.failure_message());
            return Ok(result);
        }

        result.warnings.extend(response.warnings.clone());

        if request.dry_run {
            result.audit(
                "dry_run",
                COMPONENT,
                "completed",
                "endpoint acknowledged simulated rotation",
            );
            result.status = RotationStatus::Pending;
            return Ok(result);
        }

        let mut reference = response
            .new_secret_ref
            .unwrap_or_else(|| SecretReference::for_secret(&request.secret));
        reference.metadata.extend(response.metadata);
        result.complete(reference);
        result.audit(
            "rotation_completed",
            COMPONENT,
            "completed",
            response
                .message
                .unwrap_or_else(|| "endpoint completed rotation".to_string()),
        );
        Ok(result)
    }

    async fn verify(
        &self,
        secret: &SecretInfo,
        reference: &SecretReference,
        tests: &[VerificationTest],
    ) -> Result<Vec<VerificationResult>> {
        let mut request = RotationRequest::new(secret.clone());
        request.config.insert("tests".into(), json!(tests));
        request
            .config
            .insert("reference".into(), serde_json::to_value(reference)?);

        let payload = ProtocolRequest::for_action("verify", &request);
        let response = self.post(&request, &payload).await?;
        let message = if response.success {
            response
                .message
                .clone()
                .unwrap_or_else(|| "endpoint verified credential".to_string())
        } else {
            response.failure_message()
        };
        Ok(tests
            .iter()
            .map(|test| {
                if response.success {
                    VerificationResult::pass(test, message.clone())
                } else {
                    VerificationResult::fail(test, message.clone())
                }
            })
            .collect())
    }

    async fn rollback(&self, secret: &SecretInfo, previous: &SecretReference) -> Result<()> {
        let mut request = RotationRequest::new(secret.clone());
        request
            .config
            .insert("previous".into(), serde_json::to_value(previous)?);

        let payload = ProtocolRequest::for_action("rollback", &request);
        let response = self.post(&request, &payload).await?;
        if response.success {
            Ok(())
        } else {
            Err(DsopsError::Other(format!(
                "webhook rollback failed: {}",
                response.failure_message()
            )))
        }
    }

    async fn get_status(&self, _secret: &SecretInfo) -> Result<RotationStatusInfo> {
        Ok(RotationStatusInfo {
            status: RotationStatus::Pending,
            last_rotated: None,
            next_rotation: None,
            can_rotate: true,
            reason: "webhook endpoints do not expose rotation state".to_string(),
        })
    }
}
