//! 服务账号令牌
//!
//! 每条消息获取一次短期令牌，本模块不做跨消息缓存；如需缓存应由令牌提供方自行实现。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mailer_shared::config::ServicesConfig;
use serde::Deserialize;
use tracing::debug;

use crate::error::DispatchError;
use crate::http::{ensure_success, transport_error};

const SERVICE: &str = "token-provider";

/// 服务账号令牌
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl ServiceToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn bearer(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

// 令牌不能出现在日志里
impl std::fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// 令牌提供方
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<ServiceToken, DispatchError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth2 client-credentials 令牌提供方
pub struct ClientCredentialsTokenProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsTokenProvider {
    pub fn new(client: reqwest::Client, config: &ServicesConfig) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn get_token(&self) -> Result<ServiceToken, DispatchError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let mut token = ServiceToken::new(body.access_token);
        if let Some(expires_at) = body.expires_in.and_then(expiry_after) {
            token = token.with_expiry(expires_at);
        }

        debug!(expires_at = ?token.expires_at(), "已获取服务账号令牌");
        Ok(token)
    }
}

/// 有效期换算为过期时刻，超出可表示范围时视为未知
fn expiry_after(seconds: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(seconds).and_then(|ttl| Utc::now().checked_add_signed(ttl))
}
