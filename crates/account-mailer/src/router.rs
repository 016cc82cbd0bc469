//! 事件路由
//!
//! 事件类型到构建器的静态映射。`route_for` 对枚举做穷尽匹配，
//! 新增事件类型而不补充路由会直接编译失败。

use crate::builders::{self, BuildContext, BuildResult};
use crate::message::{EventBody, MessageType};
use crate::payload::{ADMIN_AND_COORDINATOR, ADMIN_ONLY, Role};
use crate::templates::{subjects, template_names};

/// 收件人来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientSource {
    /// 按角色查询账户成员
    Members(&'static [Role]),
    /// 事件体中的指定字段
    BodyField(&'static str),
}

/// 通用构建器的路由参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonRoute {
    pub template: &'static str,
    pub subject: &'static str,
    pub recipients: RecipientSource,
    /// (模板变量, 事件体字段)
    pub fields: &'static [(&'static str, &'static str)],
}

/// 网银付款变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineBankingVariant {
    OverPayment,
    UnderPayment,
    Exact,
}

impl OnlineBankingVariant {
    pub fn template(&self) -> &'static str {
        match self {
            Self::OverPayment => template_names::ONLINE_BANKING_OVER_PAYMENT,
            Self::UnderPayment => template_names::ONLINE_BANKING_UNDER_PAYMENT,
            Self::Exact => template_names::ONLINE_BANKING_PAYMENT,
        }
    }
}

/// 路由目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PaymentCompleted,
    RefundRequested,
    PadConfirmation,
    Common(CommonRoute),
    OnlineBanking(OnlineBankingVariant),
}

impl Route {
    /// 调用对应的构建器
    pub async fn build(&self, ctx: &BuildContext<'_>, body: EventBody<'_>) -> BuildResult {
        match self {
            Self::PaymentCompleted => builders::payment_completed::build(ctx, body).await,
            Self::RefundRequested => builders::refund_requested::build(ctx, body).await,
            Self::PadConfirmation => builders::pad_confirmation::build(ctx, body).await,
            Self::Common(route) => builders::common::build(ctx, route, body).await,
            Self::OnlineBanking(variant) => {
                builders::common::build_online_banking(ctx, *variant, body).await
            }
        }
    }
}

/// 路由命中结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routed {
    pub message_type: MessageType,
    pub route: Route,
}

const fn common(
    template: &'static str,
    subject: &'static str,
    recipients: RecipientSource,
    fields: &'static [(&'static str, &'static str)],
) -> Route {
    Route::Common(CommonRoute {
        template,
        subject,
        recipients,
        fields,
    })
}

/// 事件类型对应的路由
pub fn route_for(message_type: MessageType) -> Route {
    use RecipientSource::{BodyField, Members};

    match message_type {
        MessageType::PaymentCompleted => Route::PaymentCompleted,
        MessageType::RefundRequest => Route::RefundRequested,
        MessageType::PadAccountCreate => Route::PadConfirmation,
        MessageType::NsfLockAccount => common(
            template_names::NSF_LOCK_ACCOUNT,
            subjects::NSF_LOCK_ACCOUNT,
            Members(ADMIN_AND_COORDINATOR),
            &[],
        ),
        MessageType::NsfUnlockAccount => common(
            template_names::NSF_UNLOCK_ACCOUNT,
            subjects::NSF_UNLOCK_ACCOUNT,
            Members(ADMIN_AND_COORDINATOR),
            &[],
        ),
        MessageType::AccountConfirmationPeriodOver => common(
            template_names::ACCOUNT_CONF_OVER,
            subjects::ACCOUNT_CONF_OVER,
            Members(ADMIN_ONLY),
            &[("nsf_fee", "nsfFee")],
        ),
        MessageType::TeamModified | MessageType::TeamMemberInvited => common(
            template_names::TEAM_MODIFIED,
            subjects::TEAM_MODIFIED,
            Members(ADMIN_ONLY),
            &[],
        ),
        MessageType::AdminRemoved => common(
            template_names::ADMIN_REMOVED,
            subjects::ADMIN_REMOVED,
            BodyField("recipientEmail"),
            &[],
        ),
        MessageType::PadInvoiceCreated => common(
            template_names::PAD_INVOICE_CREATED,
            subjects::PAD_INVOICE_CREATED,
            Members(ADMIN_ONLY),
            &[("nsf_fee", "nsfFee"), ("invoice_total", "invoice_total")],
        ),
        MessageType::OnlineBankingOverPayment => {
            Route::OnlineBanking(OnlineBankingVariant::OverPayment)
        }
        MessageType::OnlineBankingUnderPayment => {
            Route::OnlineBanking(OnlineBankingVariant::UnderPayment)
        }
        MessageType::OnlineBankingPayment => Route::OnlineBanking(OnlineBankingVariant::Exact),
        MessageType::PadSetupFailed => common(
            template_names::PAD_SETUP_FAILED,
            subjects::PAD_SETUP_FAILED,
            Members(ADMIN_ONLY),
            &[("accountId", "accountId")],
        ),
    }
}

/// 按标签路由，未知标签返回 None
pub fn route(tag: &str) -> Option<Routed> {
    MessageType::from_tag(tag).map(|message_type| Routed {
        message_type,
        route: route_for(message_type),
    })
}
