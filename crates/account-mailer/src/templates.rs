//! 模板名与邮件主题
//!
//! 集中管理所有模板名与主题文案，防止字符串散落在路由表和构建器中导致拼写不一致。
//! 模板本身由通知服务渲染，这里只负责选择。

pub mod template_names {
    pub const PAYMENT_COMPLETED: &str = "payment_completed_email";
    pub const REFUND_REQUEST: &str = "refund_request_email";
    pub const PAD_CONFIRMATION: &str = "pad_confirmation_email";
    pub const NSF_LOCK_ACCOUNT: &str = "nsf_lock_account_email";
    pub const NSF_UNLOCK_ACCOUNT: &str = "nsf_unlock_account_email";
    pub const ACCOUNT_CONF_OVER: &str = "account_conf_over_email";
    pub const TEAM_MODIFIED: &str = "team_modified_email";
    pub const ADMIN_REMOVED: &str = "admin_removed_email";
    pub const PAD_INVOICE_CREATED: &str = "pad_invoice_created";
    pub const ONLINE_BANKING_OVER_PAYMENT: &str = "online_banking_over_payment";
    pub const ONLINE_BANKING_UNDER_PAYMENT: &str = "online_banking_under_payment";
    pub const ONLINE_BANKING_PAYMENT: &str = "online_banking_payment";
    pub const PAD_SETUP_FAILED: &str = "pad_setup_failed";
}

pub mod subjects {
    pub const PAYMENT_COMPLETED: &str = "Payment Completed";
    pub const REFUND_REQUEST: &str = "Refund Request";
    pub const PAD_CONFIRMATION: &str = "Confirmation of Pre-Authorized Debit (PAD) Sign-up";
    pub const NSF_LOCK_ACCOUNT: &str = "Your account has been suspended";
    pub const NSF_UNLOCK_ACCOUNT: &str = "Your account has been reactivated";
    pub const ACCOUNT_CONF_OVER: &str = "Your account is now active";
    pub const TEAM_MODIFIED: &str = "Change to Team Members";
    pub const ADMIN_REMOVED: &str = "You have been removed as an administrator";
    pub const PAD_INVOICE_CREATED: &str = "Your Monthly PAD Statement is Ready";
    pub const ONLINE_BANKING_PAYMENT: &str = "Online Banking Payment Received";
    pub const PAD_SETUP_FAILED: &str = "Your Pre-Authorized Debit setup failed";
}
