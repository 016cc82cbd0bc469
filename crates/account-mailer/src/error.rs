//! 邮件分发错误类型
//!
//! 在共享库 MailerError 基础上定义分发链路特有的错误变体。
//! 所有错误最终都在分发器的单一边界被吞掉并记录，不会中断消费循环。

use mailer_shared::error::MailerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// 执行上下文已关闭或从未打开，属于配置类故障而非数据问题
    #[error("执行上下文不可用")]
    ContextUnavailable,

    /// 消息信封不符合入站格式
    #[error("消息解码失败: {0}")]
    Decode(String),

    /// 事件体字段存在但类型不符合预期
    #[error("事件字段无效: {field} - {reason}")]
    InvalidField { field: String, reason: String },

    /// 外部调用超过配置的时限
    #[error("外部调用超时: {call}")]
    Timeout { call: &'static str },

    /// 透传共享库错误（外部服务、序列化等）
    #[error(transparent)]
    Shared(#[from] MailerError),
}

impl DispatchError {
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// 错误码，写入收拢日志
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContextUnavailable => "CONTEXT_UNAVAILABLE",
            Self::Decode(_) => "DECODE_ERROR",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::Timeout { .. } => "CALL_TIMEOUT",
            Self::Shared(e) => e.code(),
        }
    }

    /// 是否为瞬时故障，仅供运维判断是否值得人工重放
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }
}
