//! 账户类通知的通用构建器
//!
//! 锁定/解锁、确认期结束、团队变更、管理员移除、PAD 账单、PAD 设置失败
//! 以及网银付款的三个变体共用这里的逻辑：取账户标识、确定收件人、拼装上下文。

use serde_json::Value;
use tracing::debug;

use super::{BuildContext, BuildResult};
use crate::message::EventBody;
use crate::payload::{ADMIN_ONLY, NotificationPayload};
use crate::router::{CommonRoute, OnlineBankingVariant, RecipientSource};
use crate::templates::subjects;

/// 按路由表参数构建通知
///
/// 收件人来自事件体时不依赖账户标识；按成员查询时缺少账户标识则不生成通知。
pub async fn build(ctx: &BuildContext<'_>, route: &CommonRoute, body: EventBody<'_>) -> BuildResult {
    let account_id = body.account_id()?;

    let recipients = match (route.recipients, account_id.as_deref()) {
        (RecipientSource::Members(roles), Some(id)) => ctx.member_emails(id, roles).await?,
        (RecipientSource::Members(_), None) => {
            debug!(template = route.template, "事件缺少 accountId，不生成通知");
            return Ok(None);
        }
        (RecipientSource::BodyField(field), _) => body.recipients(field)?,
    };
    if recipients.is_empty() {
        debug!(account_id = ?account_id, template = route.template, "没有可用的收件人，不生成通知");
        return Ok(None);
    }

    let mut context = ctx.account_context(account_id.as_deref());
    for (name, field) in route.fields {
        context.insert((*name).to_string(), body.field(field));
    }

    Ok(Some(NotificationPayload::new(
        recipients,
        route.template,
        route.subject,
        context,
    )))
}

/// 网银付款通知，模板由变体决定，主题和收件人一致
pub async fn build_online_banking(
    ctx: &BuildContext<'_>,
    variant: OnlineBankingVariant,
    body: EventBody<'_>,
) -> BuildResult {
    let Some(account_id) = body.account_id()? else {
        debug!(variant = ?variant, "网银付款事件缺少 accountId，不生成通知");
        return Ok(None);
    };

    let recipients = ctx.member_emails(&account_id, ADMIN_ONLY).await?;
    if recipients.is_empty() {
        debug!(%account_id, variant = ?variant, "没有可用的收件人，不生成通知");
        return Ok(None);
    }

    let subject = subjects::ONLINE_BANKING_PAYMENT;
    let mut context = ctx.account_context(Some(account_id.as_str()));
    context.insert("title".to_string(), Value::String(subject.to_string()));
    context.insert("paid_amount".to_string(), body.field("amount"));
    context.insert("credit_amount".to_string(), body.field("creditAmount"));

    Ok(Some(NotificationPayload::new(
        recipients,
        variant.template(),
        subject,
        context,
    )))
}
