//! 账户邮件服务
//!
//! 从 Kafka 消费账户与支付事件，按事件类型路由到载荷构建器，
//! 必要时查询账户成员作为收件人，再交给通知服务发送。
//! 每条消息的失败都在分发器内收拢，消费循环始终向前推进。

pub mod builders;
pub mod consumer;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod message;
pub mod payload;
pub mod resolver;
pub mod router;
pub mod sender;
pub mod templates;
pub mod token;
