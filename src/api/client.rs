//! HTTP transport for the EduVista backend.
//!
//! `HttpClient` wraps a pooled `reqwest::Client` and applies the two session
//! hooks to every call: the outbound hook attaches the current credential as
//! a bearer header, the inbound hook runs session recovery when the server
//! answers 401. The client only knows the session through the narrow
//! `CredentialProvider` and `UnauthorizedHook` capabilities, never the full
//! store or navigator types.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::config::Config;

use super::ApiError;

/// Application status the backend's envelope uses for success
const SUCCESS_CODE: i64 = 200;

/// Read access to the current credential. Implemented by the session state;
/// the transport reads it fresh on every request and never caches a copy.
pub trait CredentialProvider: Send + Sync {
    fn current_credential(&self) -> Option<Credential>;
}

/// Recovery to run when the server rejects the session with 401.
/// Installed once after construction; fired once per failing call.
pub trait UnauthorizedHook: Send + Sync {
    fn on_unauthorized(&self);
}

/// Uniform response envelope every backend endpoint wraps its payload in.
/// `data` is null for operations that return nothing (e.g. registration).
/// No `default` attribute on `data`: serde already maps a missing or null
/// `Option` field to `None`, and the attribute would force `T: Default`
/// onto the derived impl.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

/// HTTP client for the EduVista backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    on_unauthorized: Arc<OnceLock<Box<dyn UnauthorizedHook>>>,
}

impl HttpClient {
    /// Build a client against the configured base URL and timeout.
    pub fn new(
        config: &Config,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            on_unauthorized: Arc::new(OnceLock::new()),
        })
    }

    /// Install the 401 recovery hook. The hook can only be installed once;
    /// later calls are ignored.
    pub fn install_unauthorized_hook(&self, hook: impl UnauthorizedHook + 'static) {
        if self.on_unauthorized.set(Box::new(hook)).is_err() {
            warn!("Unauthorized hook already installed, ignoring");
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let request = self.client.get(self.url(path));
        self.execute(request).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        let request = self.client.post(self.url(path)).json(body);
        self.execute(request).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        let request = self.client.put(self.url(path)).json(body);
        self.execute(request).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let request = self.client.delete(self.url(path));
        self.execute(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = self.outbound(request).send().await?;
        let response = self.inbound(response).await?;
        Self::decode(response).await
    }

    /// Outbound hook: attach the current credential, if any. Reads a fresh
    /// snapshot of the session per request and never mutates it.
    fn outbound(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.current_credential() {
            Some(credential) => request.bearer_auth(credential.as_str()),
            None => request,
        }
    }

    /// Inbound hook: run session recovery on 401, map other failing statuses,
    /// and pass successful responses through unmodified.
    async fn inbound(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.as_u16() == 401 {
            debug!("Server rejected credentials, running session recovery");
            if let Some(hook) = self.on_unauthorized.get() {
                hook.on_unauthorized();
            }
            // Recovery is a side effect; the caller still sees the failure.
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ApiError> {
        let body = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| ApiError::invalid_response(format!("Failed to parse envelope ({e})"), &body))?;

        if envelope.code != SUCCESS_CODE {
            return Err(ApiError::Rejected {
                code: envelope.code,
                message: envelope.message,
            });
        }
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parses_payload_and_null_data() {
        let with_data: Envelope<Vec<i64>> =
            serde_json::from_str(r#"{"code":200,"message":null,"data":[1,2]}"#).unwrap();
        assert_eq!(with_data.code, 200);
        assert_eq!(with_data.data, Some(vec![1, 2]));

        let without_data: Envelope<Vec<i64>> =
            serde_json::from_str(r#"{"code":200,"message":"ok"}"#).unwrap();
        assert_eq!(without_data.data, None);
        assert_eq!(without_data.message.as_deref(), Some("ok"));
    }

    #[test]
    fn test_envelope_works_without_default_on_payload_type() {
        // The login payload has no Default impl; the envelope must not
        // require one of its data type.
        #[derive(Debug, Deserialize)]
        struct Payload {
            token: String,
        }

        let env: Envelope<Payload> =
            serde_json::from_str(r#"{"code":200,"message":null,"data":{"token":"t"}}"#).unwrap();
        assert_eq!(env.data.unwrap().token, "t");

        let empty: Envelope<Payload> = serde_json::from_str(r#"{"code":200}"#).unwrap();
        assert!(empty.data.is_none());
    }

    #[test]
    fn test_url_joins_base_and_path() {
        struct NoCredential;
        impl CredentialProvider for NoCredential {
            fn current_credential(&self) -> Option<Credential> {
                None
            }
        }

        let config = Config {
            base_url: "http://localhost:8080/api/".to_string(),
            timeout_secs: 1,
        };
        let client = HttpClient::new(&config, Arc::new(NoCredential)).unwrap();
        assert_eq!(client.url("/auth/login"), "http://localhost:8080/api/auth/login");
    }
}
