//! 退款申请通知
//!
//! 事件体未指定收件人时发往配置的退款处理邮箱。

use std::collections::BTreeSet;

use tracing::debug;

use super::{BuildContext, BuildResult};
use crate::message::EventBody;
use crate::payload::NotificationPayload;
use crate::templates::{subjects, template_names};

const RECIPIENTS: &str = "recipients";

pub async fn build(ctx: &BuildContext<'_>, body: EventBody<'_>) -> BuildResult {
    let mut recipients = body.recipients(RECIPIENTS)?;
    if recipients.is_empty() {
        recipients = ctx
            .mailer()
            .refund_request_recipients
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect::<BTreeSet<_>>();
    }
    if recipients.is_empty() {
        debug!("退款申请没有收件人且未配置退款处理邮箱，不生成通知");
        return Ok(None);
    }

    Ok(Some(NotificationPayload::new(
        recipients,
        template_names::REFUND_REQUEST,
        subjects::REFUND_REQUEST,
        body.to_context(&[RECIPIENTS]),
    )))
}
