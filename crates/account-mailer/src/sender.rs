//! 通知发送器
//!
//! 通过 `NotificationSender` trait 抽象发送行为。生产实现调用通知服务接口，
//! 联调模式下使用只记录日志的实现，验证消费管道时无需外部依赖。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::http::{ensure_success, join_url, transport_error};
use crate::payload::NotificationPayload;
use crate::token::ServiceToken;

const SERVICE: &str = "notify-api";

/// 通知发送器 trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 投递载荷，失败时返回错误由调用方处理
    async fn send(
        &self,
        payload: &NotificationPayload,
        token: &ServiceToken,
    ) -> Result<(), DispatchError>;
}

// ---------------------------------------------------------------------------
// 通知服务发送器
// ---------------------------------------------------------------------------

/// 通知服务接口的请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotifyRequest<'a> {
    recipients: String,
    template_name: &'a str,
    subject: &'a str,
    context: &'a Map<String, Value>,
}

impl<'a> From<&'a NotificationPayload> for NotifyRequest<'a> {
    fn from(payload: &'a NotificationPayload) -> Self {
        Self {
            recipients: payload.recipients_joined(),
            template_name: &payload.template_name,
            subject: &payload.subject,
            context: &payload.context,
        }
    }
}

/// 调用通知服务发送邮件
pub struct NotifyApiSender {
    client: reqwest::Client,
    endpoint: String,
}

impl NotifyApiSender {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: join_url(base_url, "notify/"),
        }
    }
}

#[async_trait]
impl NotificationSender for NotifyApiSender {
    async fn send(
        &self,
        payload: &NotificationPayload,
        token: &ServiceToken,
    ) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token.bearer())
            .json(&NotifyRequest::from(payload))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        ensure_success(SERVICE, response).await?;

        debug!(
            template = %payload.template_name,
            recipients = payload.recipients.len(),
            "通知服务已受理"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 日志发送器
// ---------------------------------------------------------------------------

/// 模拟邮件发送器
///
/// 只记录日志，不产生任何外部调用
pub struct LoggingSender;

#[async_trait]
impl NotificationSender for LoggingSender {
    async fn send(
        &self,
        payload: &NotificationPayload,
        _token: &ServiceToken,
    ) -> Result<(), DispatchError> {
        let message_id = Uuid::now_v7().to_string();

        info!(
            channel = "EMAIL",
            message_id = %message_id,
            recipients = %payload.recipients_joined(),
            template = %payload.template_name,
            subject = %payload.subject,
            "模拟发送邮件通知"
        );

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn make_test_payload() -> NotificationPayload {
        let mut context = Map::new();
        context.insert("account_number".to_string(), json!("123"));
        NotificationPayload::new(
            BTreeSet::from(["b@x.com".to_string(), "a@x.com".to_string()]),
            "nsf_lock_account_email",
            "Your account has been suspended",
            context,
        )
    }

    #[tokio::test]
    async fn test_logging_sender_send() {
        let result = LoggingSender
            .send(&make_test_payload(), &ServiceToken::new("t"))
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_notify_request_body() {
        let payload = make_test_payload();
        let body = serde_json::to_value(NotifyRequest::from(&payload)).unwrap();

        assert_eq!(body["recipients"], json!("a@x.com,b@x.com"));
        assert_eq!(body["templateName"], json!("nsf_lock_account_email"));
        assert_eq!(body["subject"], json!("Your account has been suspended"));
        assert_eq!(body["context"]["account_number"], json!("123"));
    }

    #[test]
    fn test_notify_endpoint() {
        let sender = NotifyApiSender::new(reqwest::Client::new(), "http://notify/api/v1/");
        assert_eq!(sender.endpoint, "http://notify/api/v1/notify/");
    }
}
