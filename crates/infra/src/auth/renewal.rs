//! Renewal client for `POST /auth/refresh`
//!
//! The refresh call goes out on its own plain client: it never runs the
//! request pipeline's pre-flight step and is never recovered after a 401.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use novaio_core::{CredentialRenewer, CredentialStore, NotificationBus};
use novaio_domain::{
    AuthEvent, ClientConfig, CredentialPair, NovaError, RefreshFailure, RenewalError,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::errors::extract_server_message;
use crate::http::HttpClient;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchanges the stored refresh credential for a new pair over HTTP.
pub struct HttpRenewalClient {
    http: HttpClient,
    refresh_url: String,
    timeout: Duration,
    store: Arc<dyn CredentialStore>,
    bus: Arc<NotificationBus>,
}

impl HttpRenewalClient {
    /// # Errors
    /// Returns `NovaError` if the underlying HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn CredentialStore>,
        bus: Arc<NotificationBus>,
    ) -> Result<Self, NovaError> {
        let timeout = config.refresh_timeout();
        let http = HttpClient::builder().timeout(timeout).build()?;
        let refresh_url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            novaio_domain::constants::REFRESH_PATH
        );
        Ok(Self { http, refresh_url, timeout, store, bus })
    }

    async fn exchange(&self) -> Result<CredentialPair, RenewalError> {
        let refresh_token = match self.store.refresh_token() {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                debug!("no refresh token stored; skipping refresh call");
                return Err(RenewalError::no_refresh_token());
            }
            Err(err) => {
                return Err(RenewalError::transport(format!("credential store unavailable: {err}")))
            }
        };

        debug!(url = %self.refresh_url, refresh_len = refresh_token.len(), "requesting credential refresh");
        let request = self
            .http
            .request(Method::POST, self.refresh_url.as_str())
            .json(&RefreshRequest { refresh_token: &refresh_token });

        let exchange = async {
            let response = self.http.send(request).await?;
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Ok::<_, NovaError>((status, body))
        };
        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => return Err(RenewalError::transport(err.to_string())),
            Err(_) => {
                return Err(RenewalError::transport(format!(
                    "refresh timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        };

        if !status.is_success() {
            return Err(RenewalError::from_status(status.as_u16(), extract_server_message(&body)));
        }

        let parsed: RefreshResponse = serde_json::from_str(&body).unwrap_or_default();
        let (Some(access_token), Some(refresh_token)) = (
            parsed.access_token.filter(|token| !token.is_empty()),
            parsed.refresh_token.filter(|token| !token.is_empty()),
        ) else {
            return Err(RenewalError::bad_server_response(status.as_u16()));
        };

        let pair = CredentialPair::new(access_token, refresh_token);
        self.store.save_credentials(&pair).map_err(|err| {
            RenewalError::transport(format!("failed to persist renewed credentials: {err}"))
        })?;
        Ok(pair)
    }
}

#[async_trait]
impl CredentialRenewer for HttpRenewalClient {
    async fn renew(&self) -> Result<CredentialPair, RenewalError> {
        match self.exchange().await {
            Ok(pair) => {
                info!(
                    access_len = pair.access_token.len(),
                    refresh_len = pair.refresh_token.len(),
                    "credentials renewed"
                );
                self.bus.publish(&AuthEvent::CredentialsRotated {
                    access_token: pair.access_token.clone(),
                    refresh_token: pair.refresh_token.clone(),
                });
                Ok(pair)
            }
            Err(err) => {
                warn!(kind = %err.kind, status = ?err.http_status, "credential refresh failed");
                self.bus.publish(&AuthEvent::RefreshFailed(RefreshFailure::from(&err)));
                Err(err)
            }
        }
    }
}
