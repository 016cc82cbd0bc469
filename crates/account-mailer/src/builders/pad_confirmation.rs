//! PAD 开户确认通知

use tracing::debug;

use super::{BuildContext, BuildResult};
use crate::message::EventBody;
use crate::payload::{ADMIN_ONLY, NotificationPayload};
use crate::templates::{subjects, template_names};

pub async fn build(ctx: &BuildContext<'_>, body: EventBody<'_>) -> BuildResult {
    let Some(account_id) = body.account_id()? else {
        debug!("PAD 开户事件缺少 accountId，不生成通知");
        return Ok(None);
    };

    let recipients = ctx.member_emails(&account_id, ADMIN_ONLY).await?;
    if recipients.is_empty() {
        debug!(%account_id, "账户没有管理员邮箱，不生成 PAD 确认通知");
        return Ok(None);
    }

    // 银行账户等字段原样进入模板
    let mut context = body.to_context(&["accountId"]);
    context.extend(ctx.account_context(Some(account_id.as_str())));

    Ok(Some(NotificationPayload::new(
        recipients,
        template_names::PAD_CONFIRMATION,
        subjects::PAD_CONFIRMATION,
        context,
    )))
}
