//! Authenticated API client
//!
//! Every request runs the same pipeline:
//!
//! 1. pre-flight: renew through the single-flight coordinator when the
//!    stored access credential is missing or near expiry and a refresh
//!    credential exists
//! 2. attach the stored access credential (read immediately before sending)
//! 3. on a 401 from a non-auth endpoint, renew (or join the renewal in
//!    flight) and resubmit the request exactly once

use std::sync::Arc;

use novaio_core::{
    now_epoch_ms, plan_preflight, should_recover, CredentialRenewer, CredentialStore,
    NotificationBus, PreflightAction, SingleFlight,
};
use novaio_domain::{ClientConfig, CredentialPair, PreflightFailurePolicy, RenewalError};
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::errors::ApiError;
use super::request::ApiRequest;
use crate::auth::HttpRenewalClient;
use crate::http::HttpClient;
use crate::storage::ConfiguredStore;

/// HTTP client that attaches, renews and recovers bearer credentials.
pub struct AuthenticatedClient {
    http: HttpClient,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    renewer: Arc<dyn CredentialRenewer>,
    flight: SingleFlight,
}

impl AuthenticatedClient {
    /// Create a client around an explicit renewer.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the configuration is invalid or the
    /// HTTP client cannot be created.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        renewer: Arc<dyn CredentialRenewer>,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        Url::parse(&config.base_url)
            .map_err(|e| ApiError::Config(format!("Invalid base_url {}: {}", config.base_url, e)))?;

        let http = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {}", e)))?;

        Ok(Self { http, config, store, renewer, flight: SingleFlight::new() })
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> AuthenticatedClientBuilder {
        AuthenticatedClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Absolute URL for `path`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send `request` through the pipeline and return the final response.
    ///
    /// Non-2xx responses are returned as-is, except that a 401 from a
    /// non-auth endpoint is answered by renewing and resubmitting once.
    ///
    /// # Errors
    /// - `ApiError::Renewal` when recovery after a 401 could not renew (or,
    ///   under [`PreflightFailurePolicy::Abort`], when pre-flight failed)
    /// - `ApiError::Transport` / `ApiError::Timeout` on transport failure
    /// - `ApiError::Store` when the credential store cannot be read
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ApiError> {
        self.preflight().await?;

        let sent_with = self.store.access_token()?;
        let response = self.dispatch(&request, sent_with.as_deref()).await?;

        let is_auth_endpoint = self.config.is_auth_path(&request.path);
        if !should_recover(response.status().as_u16(), is_auth_endpoint, request.is_retried()) {
            return Ok(response);
        }
        self.recover(request, sent_with).await
    }

    /// Run pre-flight and return the latest access credential.
    ///
    /// Unlike the pipeline's own pre-flight, a renewal failure is returned
    /// to the caller.
    ///
    /// # Errors
    /// `ApiError::Renewal` if renewal was needed and failed,
    /// `ApiError::NoAccessToken` if no credential is stored afterwards.
    pub async fn ensure_fresh_access_token(&self) -> Result<String, ApiError> {
        if self.plan()?.needs_renewal() {
            self.renew().await?;
        }
        self.store.access_token()?.filter(|token| !token.is_empty()).ok_or(ApiError::NoAccessToken)
    }

    /// Execute a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await
    }

    /// Execute a POST request
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    /// Execute a PUT request
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    /// Execute a PATCH request
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::patch(path).json(body)?).await
    }

    /// Execute a DELETE request
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Send `request` and deserialize a 2xx body; any other status becomes
    /// `ApiError::Status`.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        decode_response(&path, response).await
    }

    fn plan(&self) -> Result<PreflightAction, ApiError> {
        let access = self.store.access_token()?;
        let refresh = self.store.refresh_token()?;
        Ok(plan_preflight(
            access.as_deref(),
            refresh.as_deref(),
            self.config.expiry_skew_ms,
            now_epoch_ms(),
        ))
    }

    async fn renew(&self) -> Result<CredentialPair, RenewalError> {
        self.flight.coordinate(|| self.renewer.renew()).await
    }

    async fn preflight(&self) -> Result<(), ApiError> {
        let action = self.plan()?;
        if !action.needs_renewal() {
            return Ok(());
        }

        debug!(?action, "pre-flight renewal");
        match self.renew().await {
            Ok(_) => Ok(()),
            Err(err) => match self.config.preflight_failure {
                PreflightFailurePolicy::Proceed => {
                    warn!(kind = %err.kind, "pre-flight renewal failed; sending with stored credential");
                    Ok(())
                }
                PreflightFailurePolicy::Abort => Err(ApiError::Renewal(err)),
            },
        }
    }

    async fn recover(
        &self,
        mut request: ApiRequest,
        sent_with: Option<String>,
    ) -> Result<Response, ApiError> {
        request.mark_retried();
        debug!("401 received; recovering");

        // A credential rotated since this request departed is used directly.
        let stored = self.store.access_token()?.filter(|token| !token.is_empty());
        let access_token = match stored {
            Some(current) if sent_with.as_deref() != Some(current.as_str()) => {
                debug!("credential already rotated; retrying without renewal");
                current
            }
            _ => self.renew().await?.access_token,
        };

        debug!("resubmitting request");
        let response = self.dispatch(&request, Some(&access_token)).await?;
        info!(status = %response.status(), "request recovered after renewal");
        Ok(response)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.url_for(&request.path);
        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);

        let mut builder = self.http.request(request.method.clone(), url.as_str()).headers(headers);
        match access_token.filter(|token| !token.is_empty()) {
            Some(token) => {
                debug!(url = %url, retried = request.is_retried(), "sending with access token");
                builder = builder.bearer_auth(token);
            }
            None => debug!(url = %url, retried = request.is_retried(), "sending without access token"),
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let timeout = self.http.timeout();
        match tokio::time::timeout(timeout, self.http.send(builder)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(ApiError::from(err)),
            Err(_) => Err(ApiError::Timeout(timeout)),
        }
    }
}

async fn decode_response<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::status(status.as_u16(), path, body));
    }

    // 204/205 carry no body; `()` and `Option<_>` decode from null.
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
            ApiError::Decode(format!(
                "No content response ({}), but response type cannot be deserialized from empty body",
                status.as_u16()
            ))
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Transport(format!("Failed to read response: {}", e)))?;
    if bytes.is_empty() {
        return serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| ApiError::Decode(format!("Empty response body: {}", e)));
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(format!("Failed to parse response: {}", e)))
}

/// Builder for [`AuthenticatedClient`]
#[derive(Default)]
pub struct AuthenticatedClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn CredentialStore>>,
    renewer: Option<Arc<dyn CredentialRenewer>>,
    bus: Option<Arc<NotificationBus>>,
}

impl AuthenticatedClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the HTTP renewal client.
    pub fn renewer(mut self, renewer: Arc<dyn CredentialRenewer>) -> Self {
        self.renewer = Some(renewer);
        self
    }

    /// Bus the default renewal client publishes to; the process-wide bus if
    /// unset.
    pub fn bus(mut self, bus: Arc<NotificationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Build the client
    ///
    /// Without an explicit store, the one selected by the configuration is
    /// opened (see [`ConfiguredStore::open`]).
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or client creation fails
    pub fn build(self) -> Result<AuthenticatedClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let store = match self.store {
            Some(store) => store,
            None => ConfiguredStore::open(&config)?.store(),
        };
        let renewer = match self.renewer {
            Some(renewer) => renewer,
            None => {
                let bus = self.bus.unwrap_or_else(NotificationBus::global);
                Arc::new(HttpRenewalClient::new(&config, Arc::clone(&store), bus)?)
            }
        };

        AuthenticatedClient::new(config, store, renewer)
    }
}
