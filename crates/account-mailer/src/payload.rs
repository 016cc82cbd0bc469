//! 通知载荷与收件角色
//!
//! 载荷由构建器产出，包含收件人、模板名、主题和模板上下文，
//! 交给发送器后即被丢弃，不跨消息保留。

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

/// 账户成员角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Coordinator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Coordinator => "COORDINATOR",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 仅管理员
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
/// 管理员与协调员
pub const ADMIN_AND_COORDINATOR: &[Role] = &[Role::Admin, Role::Coordinator];

/// 通知载荷
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub recipients: BTreeSet<String>,
    pub template_name: String,
    pub subject: String,
    pub context: Map<String, Value>,
}

impl NotificationPayload {
    pub fn new(
        recipients: BTreeSet<String>,
        template_name: impl Into<String>,
        subject: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            recipients,
            template_name: template_name.into(),
            subject: subject.into(),
            context,
        }
    }

    /// 逗号拼接的收件人列表，通知服务接口使用该格式
    pub fn recipients_joined(&self) -> String {
        self.recipients
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}
