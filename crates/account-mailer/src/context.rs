//! 执行上下文
//!
//! `AppContext` 在启动时显式构造，持有只读配置与全部外部协作方；
//! 每条消息通过 `enter` 取得一个 `ContextScope`，所有协作调用都经由作用域发起，
//! 作用域在 drop 时记录退出，保证任意路径上都会释放。

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mailer_shared::config::{AppConfig, MailerConfig};
use mailer_shared::observability::metrics;
use tracing::{debug, info};

use crate::builders::BuildContext;
use crate::error::DispatchError;
use crate::payload::NotificationPayload;
use crate::resolver::RecipientResolver;
use crate::sender::NotificationSender;
use crate::token::{ServiceToken, TokenProvider};

/// 进程级执行上下文
pub struct AppContext {
    config: AppConfig,
    tokens: Arc<dyn TokenProvider>,
    resolver: Arc<dyn RecipientResolver>,
    sender: Arc<dyn NotificationSender>,
    open: AtomicBool,
}

impl AppContext {
    /// 构造后即处于可用状态
    pub fn new(
        config: AppConfig,
        tokens: Arc<dyn TokenProvider>,
        resolver: Arc<dyn RecipientResolver>,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            config,
            tokens,
            resolver,
            sender,
            open: AtomicBool::new(true),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// 关闭上下文，之后的 `enter` 都会失败
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("执行上下文已关闭");
        }
    }

    /// 进入单条消息的执行作用域
    pub fn enter(&self) -> Result<ContextScope<'_>, DispatchError> {
        if !self.is_open() {
            return Err(DispatchError::ContextUnavailable);
        }

        debug!("进入执行上下文");
        Ok(ContextScope {
            app: self,
            entered_at: Instant::now(),
        })
    }
}

/// 单条消息的执行作用域
pub struct ContextScope<'a> {
    app: &'a AppContext,
    entered_at: Instant,
}

impl<'a> ContextScope<'a> {
    fn call_timeout(&self) -> Duration {
        self.app.config.services.request_timeout()
    }

    pub fn mailer_config(&self) -> &'a MailerConfig {
        &self.app.config.mailer
    }

    /// 获取本条消息使用的服务账号令牌
    pub async fn acquire_token(&self) -> Result<ServiceToken, DispatchError> {
        bounded("token_provider", self.call_timeout(), self.app.tokens.get_token()).await
    }

    /// 构建器所需的资源视图
    pub fn build_context<'b>(&'b self, token: &'b ServiceToken) -> BuildContext<'b> {
        BuildContext::new(
            self.app.resolver.as_ref(),
            token,
            self.mailer_config(),
            self.call_timeout(),
        )
    }

    /// 交给发送器投递
    pub async fn send(
        &self,
        payload: &NotificationPayload,
        token: &ServiceToken,
    ) -> Result<(), DispatchError> {
        bounded(
            "notification_sender",
            self.call_timeout(),
            self.app.sender.send(payload, token),
        )
        .await
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        let elapsed = self.entered_at.elapsed();
        metrics::record_context_scope(elapsed.as_secs_f64());
        debug!(elapsed = ?elapsed, "退出执行上下文");
    }
}

/// 为外部调用加上时限，超时视为失败
pub(crate) async fn bounded<T, F>(
    call: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, DispatchError>
where
    F: Future<Output = Result<T, DispatchError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DispatchError::Timeout { call })?
}
