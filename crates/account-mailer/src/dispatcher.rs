//! 单条消息的分发
//!
//! 解码 → 进入执行上下文 → 获取令牌 → 路由 → 构建 → 发送。
//! 任一步骤失败都在 `dispatch` 这一处被收拢：记录且仅记录一条错误日志，
//! 返回终态，由消费循环照常确认消息。

use std::sync::Arc;
use std::time::Instant;

use mailer_shared::kafka::ConsumerMessage;
use mailer_shared::observability::metrics;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::DispatchError;
use crate::message::{EventMessage, MessageType};
use crate::router;

/// 未发送但属于正常终态的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 事件类型没有对应的路由
    UnknownEventType,
    /// 构建器判定该事件不需要通知
    NoPayload,
}

/// 被收拢的故障类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// 执行上下文不可用
    Configuration,
    /// 信封解码失败
    Decode,
    /// 获取服务账号令牌失败
    Credential,
    /// 构建载荷失败（含收件人查询）
    Builder,
    /// 发送失败
    Send,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Decode => "decode",
            Self::Credential => "credential",
            Self::Builder => "builder",
            Self::Send => "send",
        }
    }
}

/// 单条消息的终态，无论哪一种消息都会被确认
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { recipients: usize },
    Skipped(SkipReason),
    Contained(FaultKind),
}

impl DispatchOutcome {
    /// 指标标签
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::Skipped(SkipReason::UnknownEventType) => "unrouted",
            Self::Skipped(SkipReason::NoPayload) => "no_payload",
            Self::Contained(FaultKind::Configuration) => "configuration_error",
            Self::Contained(FaultKind::Decode) => "decode_error",
            Self::Contained(FaultKind::Credential) => "credential_error",
            Self::Contained(FaultKind::Builder) => "builder_error",
            Self::Contained(FaultKind::Send) => "send_error",
        }
    }

    pub fn is_contained(&self) -> bool {
        matches!(self, Self::Contained(_))
    }
}

/// 阶段失败：故障类别和原始错误
struct StageFailure {
    kind: FaultKind,
    error: DispatchError,
}

trait AtStage<T> {
    fn at(self, kind: FaultKind) -> Result<T, StageFailure>;
}

impl<T> AtStage<T> for Result<T, DispatchError> {
    fn at(self, kind: FaultKind) -> Result<T, StageFailure> {
        self.map_err(|error| StageFailure { kind, error })
    }
}

/// 消息分发器
#[derive(Clone)]
pub struct Dispatcher {
    app: Arc<AppContext>,
}

impl Dispatcher {
    pub fn new(app: Arc<AppContext>) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    /// 分发一条消息，永不返回错误
    pub async fn dispatch(&self, msg: &ConsumerMessage) -> DispatchOutcome {
        let dispatch_id = Uuid::now_v7();
        let span = info_span!(
            "dispatch",
            %dispatch_id,
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            key = msg.key.as_deref().unwrap_or("-"),
            timestamp = msg.timestamp,
        );

        let started = Instant::now();
        let (event_type, outcome) = self.dispatch_inner(msg).instrument(span).await;
        metrics::record_dispatch(event_type, outcome.as_str(), started.elapsed().as_secs_f64());

        outcome
    }

    /// 返回用于指标的事件类型标签和终态
    async fn dispatch_inner(&self, msg: &ConsumerMessage) -> (&'static str, DispatchOutcome) {
        let raw = msg.payload_lossy();

        let event = match EventMessage::decode(&msg.payload) {
            Ok(event) => event,
            Err(e) => {
                let failure = StageFailure {
                    kind: FaultKind::Decode,
                    error: e,
                };
                return ("undecodable", contain(failure, None, &raw));
            }
        };

        info!(event_type = %event.event_type, "收到事件消息");

        let label = MessageType::from_tag(&event.event_type)
            .map(|t| t.as_str())
            .unwrap_or("unknown");

        match self.process(&event).await {
            Ok(outcome) => (label, outcome),
            Err(failure) => (label, contain(failure, Some(event.event_type.as_str()), &raw)),
        }
    }

    async fn process(&self, event: &EventMessage) -> Result<DispatchOutcome, StageFailure> {
        let scope = self.app.enter().at(FaultKind::Configuration)?;
        let token = scope.acquire_token().await.at(FaultKind::Credential)?;

        let Some(routed) = router::route(&event.event_type) else {
            info!(event_type = %event.event_type, "未知事件类型，忽略该消息");
            return Ok(DispatchOutcome::Skipped(SkipReason::UnknownEventType));
        };

        let payload = {
            let ctx = scope.build_context(&token);
            routed
                .route
                .build(&ctx, event.body())
                .await
                .at(FaultKind::Builder)?
        };

        let Some(payload) = payload else {
            info!(
                message_type = %routed.message_type,
                "事件未生成通知载荷，跳过发送"
            );
            return Ok(DispatchOutcome::Skipped(SkipReason::NoPayload));
        };

        scope.send(&payload, &token).await.at(FaultKind::Send)?;

        let recipients = payload.recipients.len();
        info!(
            message_type = %routed.message_type,
            template = %payload.template_name,
            recipients,
            "通知已发送"
        );
        debug!(subject = %payload.subject, "通知主题");

        Ok(DispatchOutcome::Sent { recipients })
    }
}

/// 收拢边界：每个被收拢的故障恰好一条错误日志
fn contain(failure: StageFailure, event_type: Option<&str>, raw: &str) -> DispatchOutcome {
    error!(
        fault = failure.kind.as_str(),
        code = failure.error.code(),
        transient = failure.error.is_transient(),
        event_type = event_type.unwrap_or("-"),
        raw_message = %raw,
        error = %error_chain(&failure.error),
        "消息处理失败，已确认并丢弃"
    );
    DispatchOutcome::Contained(failure.kind)
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ADMIN_AND_COORDINATOR;
    use crate::resolver::MockRecipientResolver;
    use crate::sender::MockNotificationSender;
    use crate::templates::{subjects, template_names};
    use crate::token::{MockTokenProvider, ServiceToken};
    use mailer_shared::config::AppConfig;
    use mailer_shared::error::MailerError;
    use std::collections::BTreeSet;

    fn tokens_ok() -> MockTokenProvider {
        let mut tokens = MockTokenProvider::new();
        tokens
            .expect_get_token()
            .returning(|| Ok(ServiceToken::new("svc")));
        tokens
    }

    fn dispatcher(
        tokens: MockTokenProvider,
        resolver: MockRecipientResolver,
        sender: MockNotificationSender,
    ) -> Dispatcher {
        let app = AppContext::new(
            AppConfig::default(),
            Arc::new(tokens),
            Arc::new(resolver),
            Arc::new(sender),
        );
        Dispatcher::new(Arc::new(app))
    }

    fn msg(payload: &str) -> ConsumerMessage {
        ConsumerMessage::from_payload("account-mailer", 0, payload)
    }

    #[tokio::test]
    async fn test_nsf_lock_resolves_and_sends() {
        let mut resolver = MockRecipientResolver::new();
        resolver
            .expect_resolve()
            .withf(|_, id, roles| id == "123" && roles == ADMIN_AND_COORDINATOR)
            .times(1)
            .returning(|_, _, _| Ok(BTreeSet::from(["admin@x.com".to_string()])));

        let mut sender = MockNotificationSender::new();
        sender
            .expect_send()
            .withf(|payload, token| {
                payload.template_name == template_names::NSF_LOCK_ACCOUNT
                    && payload.subject == subjects::NSF_LOCK_ACCOUNT
                    && token.bearer() == "svc"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = dispatcher(tokens_ok(), resolver, sender)
            .dispatch(&msg(r#"{"type":"NSF_LOCK_ACCOUNT","data":{"accountId":"123"}}"#))
            .await;

        assert_eq!(outcome, DispatchOutcome::Sent { recipients: 1 });
    }

    #[tokio::test]
    async fn test_unknown_type_is_skipped_without_send() {
        let mut sender = MockNotificationSender::new();
        sender.expect_send().never();

        let outcome = dispatcher(tokens_ok(), MockRecipientResolver::new(), sender)
            .dispatch(&msg(r#"{"type":"UNKNOWN_TYPE","data":{}}"#))
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::UnknownEventType));
        assert!(!outcome.is_contained());
    }

    #[tokio::test]
    async fn test_empty_build_is_skipped() {
        let mut sender = MockNotificationSender::new();
        sender.expect_send().never();

        let outcome = dispatcher(tokens_ok(), MockRecipientResolver::new(), sender)
            .dispatch(&msg(r#"{"type":"TEAM_MODIFIED","data":{}}"#))
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NoPayload));
    }

    #[tokio::test]
    async fn test_decode_failure_is_contained() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_get_token().never();

        let outcome = dispatcher(tokens, MockRecipientResolver::new(), MockNotificationSender::new())
            .dispatch(&msg("not json at all"))
            .await;

        assert_eq!(outcome, DispatchOutcome::Contained(FaultKind::Decode));
        assert_eq!(outcome.as_str(), "decode_error");
    }

    #[tokio::test]
    async fn test_closed_context_is_configuration_fault() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_get_token().never();

        let dispatcher = dispatcher(tokens, MockRecipientResolver::new(), MockNotificationSender::new());
        dispatcher.app().close();

        let outcome = dispatcher
            .dispatch(&msg(r#"{"type":"NSF_LOCK_ACCOUNT","data":{"accountId":"1"}}"#))
            .await;

        assert_eq!(outcome, DispatchOutcome::Contained(FaultKind::Configuration));
    }

    #[tokio::test]
    async fn test_token_failure_is_credential_fault() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_get_token().times(1).returning(|| {
            Err(DispatchError::Shared(MailerError::Unauthorized {
                service: "token-provider".to_string(),
            }))
        });
        let mut resolver = MockRecipientResolver::new();
        resolver.expect_resolve().never();

        let outcome = dispatcher(tokens, resolver, MockNotificationSender::new())
            .dispatch(&msg(r#"{"type":"NSF_LOCK_ACCOUNT","data":{"accountId":"1"}}"#))
            .await;

        assert_eq!(outcome, DispatchOutcome::Contained(FaultKind::Credential));
    }

    #[tokio::test]
    async fn test_resolver_failure_is_builder_fault() {
        let mut resolver = MockRecipientResolver::new();
        resolver.expect_resolve().times(1).returning(|_, _, _| {
            Err(DispatchError::Shared(MailerError::ExternalService {
                service: "auth-api".to_string(),
                message: "connection reset".to_string(),
            }))
        });
        let mut sender = MockNotificationSender::new();
        sender.expect_send().never();

        let outcome = dispatcher(tokens_ok(), resolver, sender)
            .dispatch(&msg(r#"{"type":"PAD_INVOICE_CREATED","data":{"accountId":"1"}}"#))
            .await;

        assert_eq!(outcome, DispatchOutcome::Contained(FaultKind::Builder));
    }

    #[tokio::test]
    async fn test_send_failure_is_contained() {
        let mut sender = MockNotificationSender::new();
        sender.expect_send().times(1).returning(|_, _| {
            Err(DispatchError::Shared(MailerError::ExternalService {
                service: "notify-api".to_string(),
                message: "HTTP 500".to_string(),
            }))
        });

        let outcome = dispatcher(tokens_ok(), MockRecipientResolver::new(), sender)
            .dispatch(&msg(
                r#"{"type":"ADMIN_REMOVED","data":{"accountId":"1","recipientEmail":"a@b.com"}}"#,
            ))
            .await;

        assert_eq!(outcome, DispatchOutcome::Contained(FaultKind::Send));
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let cause = json_err.to_string();
        let err = DispatchError::Shared(MailerError::Serialization(json_err));

        let chain = error_chain(&err);
        assert!(chain.starts_with("序列化失败"));
        assert!(chain.contains(&cause));
    }
}
