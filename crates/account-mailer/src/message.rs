//! 事件消息模型
//!
//! 定义队列中的事件信封 `{type, data}`、封闭的事件类型枚举，
//! 以及从事件体中按字段提取数据的辅助方法。分发器对事件体除字段提取外不做任何解释。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// 事件类型枚举
///
/// 每个成员有两种等价的标签：规范名（与枚举名一致的大写下划线形式）
/// 和上游生产者使用的限定名。新增成员时必须同时在路由表中新增一项。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // 支付类事件
    PaymentCompleted,
    RefundRequest,
    PadAccountCreate,
    NsfLockAccount,
    NsfUnlockAccount,
    AccountConfirmationPeriodOver,
    PadInvoiceCreated,
    OnlineBankingOverPayment,
    OnlineBankingUnderPayment,
    OnlineBankingPayment,
    PadSetupFailed,

    // 团队成员类事件
    TeamModified,
    TeamMemberInvited,
    AdminRemoved,
}

impl MessageType {
    pub const ALL: [MessageType; 14] = [
        Self::PaymentCompleted,
        Self::RefundRequest,
        Self::PadAccountCreate,
        Self::NsfLockAccount,
        Self::NsfUnlockAccount,
        Self::AccountConfirmationPeriodOver,
        Self::PadInvoiceCreated,
        Self::OnlineBankingOverPayment,
        Self::OnlineBankingUnderPayment,
        Self::OnlineBankingPayment,
        Self::PadSetupFailed,
        Self::TeamModified,
        Self::TeamMemberInvited,
        Self::AdminRemoved,
    ];

    /// 规范名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentCompleted => "PAYMENT_COMPLETED",
            Self::RefundRequest => "REFUND_REQUEST",
            Self::PadAccountCreate => "PAD_ACCOUNT_CREATE",
            Self::NsfLockAccount => "NSF_LOCK_ACCOUNT",
            Self::NsfUnlockAccount => "NSF_UNLOCK_ACCOUNT",
            Self::AccountConfirmationPeriodOver => "ACCOUNT_CONFIRMATION_PERIOD_OVER",
            Self::PadInvoiceCreated => "PAD_INVOICE_CREATED",
            Self::OnlineBankingOverPayment => "ONLINE_BANKING_OVER_PAYMENT",
            Self::OnlineBankingUnderPayment => "ONLINE_BANKING_UNDER_PAYMENT",
            Self::OnlineBankingPayment => "ONLINE_BANKING_PAYMENT",
            Self::PadSetupFailed => "PAD_SETUP_FAILED",
            Self::TeamModified => "TEAM_MODIFIED",
            Self::TeamMemberInvited => "TEAM_MEMBER_INVITED",
            Self::AdminRemoved => "ADMIN_REMOVED",
        }
    }

    /// 上游生产者发布时使用的限定名
    pub fn qualified_tag(&self) -> &'static str {
        match self {
            Self::PaymentCompleted => "account.mailer",
            Self::RefundRequest => "bc.registry.payment.refundRequest",
            Self::PadAccountCreate => "bc.registry.payment.padAccountCreate",
            Self::NsfLockAccount => "bc.registry.payment.lockAccount",
            Self::NsfUnlockAccount => "bc.registry.payment.unlockAccount",
            Self::AccountConfirmationPeriodOver => "bc.registry.payment.confirmationPeriodOver",
            Self::PadInvoiceCreated => "bc.registry.payment.padInvoiceCreated",
            Self::OnlineBankingOverPayment => "bc.registry.payment.OverPaid",
            Self::OnlineBankingUnderPayment => "bc.registry.payment.UnderPaid",
            Self::OnlineBankingPayment => "bc.registry.payment.Payment",
            Self::PadSetupFailed => "bc.registry.payment.PadSetupFailed",
            Self::TeamModified => "bc.registry.auth.teamModified",
            Self::TeamMemberInvited => "bc.registry.auth.teamMemberInvited",
            Self::AdminRemoved => "bc.registry.auth.adminRemoved",
        }
    }

    /// 按标签识别事件类型，未知标签返回 None
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == tag || t.qualified_tag() == tag)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventMessage
// ---------------------------------------------------------------------------

/// 队列中的事件信封
///
/// `data` 可能是对象，也可能是字符串编码的 JSON；解码时统一还原为 JSON 值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl EventMessage {
    /// 从原始字节解码信封
    pub fn decode(raw: &[u8]) -> Result<Self, DispatchError> {
        let mut message: EventMessage =
            serde_json::from_slice(raw).map_err(|e| DispatchError::Decode(e.to_string()))?;

        if let Value::String(encoded) = &message.data {
            message.data = serde_json::from_str(encoded)
                .map_err(|e| DispatchError::Decode(format!("data 字段不是合法 JSON: {e}")))?;
        }

        Ok(message)
    }

    pub fn body(&self) -> EventBody<'_> {
        EventBody(&self.data)
    }
}

// ---------------------------------------------------------------------------
// EventBody
// ---------------------------------------------------------------------------

/// 事件体的只读视图
///
/// 缺失字段一律视为"无值"，由调用方决定是返回空载荷还是透传 null；
/// 字段存在但类型不符才返回错误。
#[derive(Debug, Clone, Copy)]
pub struct EventBody<'a>(&'a Value);

impl<'a> EventBody<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(value)
    }

    /// 字段原值，缺失时为 null
    pub fn field(&self, key: &str) -> Value {
        self.0.get(key).cloned().unwrap_or(Value::Null)
    }

    /// 账户标识，接受字符串或数字
    pub fn account_id(&self) -> Result<Option<String>, DispatchError> {
        match self.0.get("accountId") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(DispatchError::invalid_field(
                "accountId",
                format!("应为字符串或数字，实际为 {other}"),
            )),
        }
    }

    /// 可选字符串字段
    pub fn string_field(&self, key: &str) -> Result<Option<String>, DispatchError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(DispatchError::invalid_field(
                key,
                format!("应为字符串，实际为 {other}"),
            )),
        }
    }

    /// 收件人字段，接受逗号分隔的字符串或字符串数组
    pub fn recipients(&self, key: &str) -> Result<BTreeSet<String>, DispatchError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(BTreeSet::new()),
            Some(Value::String(s)) => Ok(split_addresses(s)),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(split_addresses(s)),
                    other => Err(DispatchError::invalid_field(
                        key,
                        format!("收件人应为字符串，实际为 {other}"),
                    )),
                })
                .try_fold(BTreeSet::new(), |mut acc, part| {
                    acc.extend(part?);
                    Ok(acc)
                }),
            Some(other) => Err(DispatchError::invalid_field(
                key,
                format!("应为字符串或数组，实际为 {other}"),
            )),
        }
    }

    /// 将事件体对象转为模板上下文，排除指定的路由字段
    ///
    /// 非对象事件体得到空上下文。
    pub fn to_context(&self, exclude: &[&str]) -> Map<String, Value> {
        match self.0 {
            Value::Object(map) => map
                .iter()
                .filter(|(k, _)| !exclude.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Map::new(),
        }
    }
}

fn split_addresses(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_tag_accepts_both_spellings() {
        assert_eq!(
            MessageType::from_tag("NSF_LOCK_ACCOUNT"),
            Some(MessageType::NsfLockAccount)
        );
        assert_eq!(
            MessageType::from_tag("bc.registry.payment.lockAccount"),
            Some(MessageType::NsfLockAccount)
        );
        assert_eq!(
            MessageType::from_tag("account.mailer"),
            Some(MessageType::PaymentCompleted)
        );
        assert_eq!(MessageType::from_tag("UNKNOWN_TYPE"), None);
        assert_eq!(MessageType::from_tag(""), None);
    }

    #[test]
    fn test_tags_are_unique() {
        let mut tags = std::collections::HashSet::new();
        for t in MessageType::ALL {
            assert!(tags.insert(t.as_str()), "重复的规范名: {t}");
            assert!(tags.insert(t.qualified_tag()), "重复的限定名: {t}");
        }
    }

    #[test]
    fn test_decode_object_data() {
        let raw = br#"{"type":"NSF_LOCK_ACCOUNT","data":{"accountId":"123"}}"#;
        let message = EventMessage::decode(raw).unwrap();
        assert_eq!(message.event_type, "NSF_LOCK_ACCOUNT");
        assert_eq!(message.body().account_id().unwrap().as_deref(), Some("123"));
    }

    #[test]
    fn test_decode_string_encoded_data() {
        let raw = br#"{"type":"account.mailer","data":"{\"recipients\":\"a@b.com\"}"}"#;
        let message = EventMessage::decode(raw).unwrap();
        assert_eq!(message.data, json!({"recipients": "a@b.com"}));
    }

    #[test]
    fn test_decode_missing_data_is_null() {
        let message = EventMessage::decode(br#"{"type":"TEAM_MODIFIED"}"#).unwrap();
        assert_eq!(message.data, Value::Null);
        assert_eq!(message.body().account_id().unwrap(), None);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(
            EventMessage::decode(b"not json"),
            Err(DispatchError::Decode(_))
        ));
        assert!(matches!(
            EventMessage::decode(br#"{"data":{}}"#),
            Err(DispatchError::Decode(_))
        ));
        assert!(matches!(
            EventMessage::decode(br#"{"type":"account.mailer","data":"{broken"}"#),
            Err(DispatchError::Decode(_))
        ));
    }

    #[test]
    fn test_account_id_variants() {
        let numeric = json!({"accountId": 42});
        assert_eq!(
            EventBody::new(&numeric).account_id().unwrap().as_deref(),
            Some("42")
        );

        let blank = json!({"accountId": "  "});
        assert_eq!(EventBody::new(&blank).account_id().unwrap(), None);

        let nested = json!({"accountId": {"id": 1}});
        assert!(matches!(
            EventBody::new(&nested).account_id(),
            Err(DispatchError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_recipients_from_string_and_array() {
        let body = json!({
            "joined": "a@b.com, c@d.com,,",
            "list": ["x@y.com", "a@b.com,z@y.com"],
            "bad": [1, 2]
        });
        let body = EventBody::new(&body);

        let joined: Vec<_> = body.recipients("joined").unwrap().into_iter().collect();
        assert_eq!(joined, vec!["a@b.com", "c@d.com"]);

        let list: Vec<_> = body.recipients("list").unwrap().into_iter().collect();
        assert_eq!(list, vec!["a@b.com", "x@y.com", "z@y.com"]);

        assert!(body.recipients("missing").unwrap().is_empty());
        assert!(body.recipients("bad").is_err());
    }

    #[test]
    fn test_to_context_excludes_routing_fields() {
        let body = json!({"recipients": "a@b.com", "amount": 10.5, "name": "ACME"});
        let context = EventBody::new(&body).to_context(&["recipients"]);

        assert_eq!(context.len(), 2);
        assert_eq!(context["amount"], json!(10.5));
        assert!(!context.contains_key("recipients"));

        let scalar = json!(7);
        assert!(EventBody::new(&scalar).to_context(&[]).is_empty());
    }

    #[test]
    fn test_field_absent_is_null() {
        let body = json!({"nsfFee": 30});
        let body = EventBody::new(&body);
        assert_eq!(body.field("nsfFee"), json!(30));
        assert_eq!(body.field("invoice_total"), Value::Null);
    }
}
