//! 付款完成通知
//!
//! 收件人、模板和主题都由上游写在事件体里，不需要查询成员。

use tracing::debug;

use super::{BuildContext, BuildResult};
use crate::message::EventBody;
use crate::payload::NotificationPayload;
use crate::templates::{subjects, template_names};

const RECIPIENTS: &str = "recipients";
const TEMPLATE_NAME: &str = "templateName";
const SUBJECT: &str = "subject";

pub async fn build(_ctx: &BuildContext<'_>, body: EventBody<'_>) -> BuildResult {
    let recipients = body.recipients(RECIPIENTS)?;
    if recipients.is_empty() {
        debug!("付款完成事件未携带收件人，不生成通知");
        return Ok(None);
    }

    let template_name = body
        .string_field(TEMPLATE_NAME)?
        .unwrap_or_else(|| template_names::PAYMENT_COMPLETED.to_string());
    let subject = body
        .string_field(SUBJECT)?
        .unwrap_or_else(|| subjects::PAYMENT_COMPLETED.to_string());
    let context = body.to_context(&[RECIPIENTS, TEMPLATE_NAME, SUBJECT]);

    Ok(Some(NotificationPayload::new(
        recipients,
        template_name,
        subject,
        context,
    )))
}
