//! 载荷构建器
//!
//! 每个事件族一个构建器，把事件体（必要时加上收件人查询）映射为通知载荷。
//! 返回 `Ok(None)` 表示该事件不需要发通知，属于正常终态；
//! 返回 `Err` 才是构建失败。构建器本身不记录错误日志。

pub mod common;
pub mod pad_confirmation;
pub mod payment_completed;
pub mod refund_requested;

use std::collections::BTreeSet;
use std::time::Duration;

use mailer_shared::config::MailerConfig;
use serde_json::{Map, Value};

use crate::context::bounded;
use crate::error::DispatchError;
use crate::payload::{NotificationPayload, Role};
use crate::resolver::RecipientResolver;
use crate::token::ServiceToken;

/// 构建结果
pub type BuildResult = Result<Option<NotificationPayload>, DispatchError>;

/// 构建器可用的资源，由执行作用域提供
pub struct BuildContext<'a> {
    resolver: &'a dyn RecipientResolver,
    token: &'a ServiceToken,
    mailer: &'a MailerConfig,
    call_timeout: Duration,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        resolver: &'a dyn RecipientResolver,
        token: &'a ServiceToken,
        mailer: &'a MailerConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            token,
            mailer,
            call_timeout,
        }
    }

    pub fn mailer(&self) -> &MailerConfig {
        self.mailer
    }

    /// 查询账户中持有指定角色的成员邮箱
    pub async fn member_emails(
        &self,
        account_id: &str,
        roles: &[Role],
    ) -> Result<BTreeSet<String>, DispatchError> {
        bounded(
            "recipient_resolver",
            self.call_timeout,
            self.resolver.resolve(self.token, account_id, roles),
        )
        .await
    }

    /// 账户类通知的公共模板上下文，缺少账户标识时 `account_number` 为 null
    pub fn account_context(&self, account_id: Option<&str>) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert(
            "account_number".to_string(),
            account_id.map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        if let Some(url) = &self.mailer.web_url {
            context.insert("web_url".to_string(), Value::String(url.clone()));
        }
        context
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::resolver::MockRecipientResolver;

    /// 默认测试配置：配置了站点链接和退款收件地址
    pub fn mailer_config() -> MailerConfig {
        MailerConfig {
            web_url: Some("https://www.example.com".to_string()),
            refund_request_recipients: vec!["refunds@example.com".to_string()],
            ..Default::default()
        }
    }

    /// 期望被调用一次、返回固定邮箱的解析器
    pub fn resolver_returning(
        account_id: &'static str,
        roles: &'static [Role],
        emails: &[&str],
    ) -> MockRecipientResolver {
        let emails: BTreeSet<String> = emails.iter().map(|e| e.to_string()).collect();
        let mut resolver = MockRecipientResolver::new();
        resolver
            .expect_resolve()
            .withf(move |_, id, r| id == account_id && r == roles)
            .times(1)
            .returning(move |_, _, _| Ok(emails.clone()));
        resolver
    }

    /// 不允许被调用的解析器
    pub fn resolver_unused() -> MockRecipientResolver {
        let mut resolver = MockRecipientResolver::new();
        resolver.expect_resolve().never();
        resolver
    }
}
