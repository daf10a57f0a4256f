//! Binance spot REST client
//!
//! Unsigned and HMAC-SHA256 signed requests against the `/api` prefix.

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;

use super::ExchangeError;
use crate::config::ExchangeConfig;

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
/// Environment variable holding the API secret
pub const API_SECRET_ENV: &str = "BINANCE_API_SECRET";

/// API key pair
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    /// Read credentials from the environment, `None` if either is unset or empty
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())?;
        let api_secret = std::env::var(API_SECRET_ENV).ok().filter(|s| !s.is_empty())?;
        Some(Self {
            api_key,
            api_secret,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Hex HMAC-SHA256 of `query` under `secret`
pub fn sign(secret: &str, query: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| ExchangeError::Signer)?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Client for the Binance spot REST API
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
}

impl BinanceClient {
    /// Create a client from configuration and optional credentials
    pub fn new(config: &ExchangeConfig, credentials: Option<Credentials>) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            recv_window_ms: config.recv_window_ms,
        })
    }

    /// True when signed endpoints can be called
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Build the request URL, appending recvWindow, timestamp and signature when signed
    pub fn build_url(
        &self,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<Url, ExchangeError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ExchangeError::InvalidUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            if signed {
                pairs.append_pair("recvWindow", &self.recv_window_ms.to_string());
                pairs.append_pair("timestamp", &Utc::now().timestamp_millis().to_string());
            }
        }

        if signed {
            let creds = self
                .credentials
                .as_ref()
                .ok_or(ExchangeError::MissingCredentials)?;
            let signature = sign(&creds.api_secret, url.query().unwrap_or_default())?;
            url.query_pairs_mut().append_pair("signature", &signature);
        } else if params.is_empty() {
            url.set_query(None);
        }
        Ok(url)
    }

    /// Send a request and decode the JSON body
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T, ExchangeError> {
        let url = self.build_url(path, params, signed)?;
        let mut request = self.http.request(method.clone(), url);
        if signed {
            if let Some(creds) = &self.credentials {
                request = request.header("X-MBX-APIKEY", &creds.api_key);
            }
        }

        tracing::trace!(%method, path, "Binance request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() >= 400 {
            return Err(ExchangeError::Http {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T, ExchangeError> {
        self.request(Method::GET, path, params, signed).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T, ExchangeError> {
        self.request(Method::POST, path, params, signed).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T, ExchangeError> {
        self.request(Method::DELETE, path, params, signed).await
    }
}
