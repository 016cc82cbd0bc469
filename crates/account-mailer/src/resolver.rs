//! 收件人解析
//!
//! 根据账户标识和角色集合查询账户成员的邮箱。解析器本身不做重试，
//! 查询失败向上传播，由分发器的统一边界处理。

use std::collections::BTreeSet;

use async_trait::async_trait;
use mailer_shared::error::MailerError;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::DispatchError;
use crate::http::{ensure_success, transport_error};
use crate::payload::Role;
use crate::token::ServiceToken;

const SERVICE: &str = "auth-api";

/// 收件人解析器
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    /// 返回账户中持有任一指定角色的成员邮箱
    async fn resolve(
        &self,
        token: &ServiceToken,
        account_id: &str,
        roles: &[Role],
    ) -> Result<BTreeSet<String>, DispatchError>;
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Member {
    membership_type_code: String,
    user: MemberUser,
}

#[derive(Debug, Deserialize)]
struct MemberUser {
    #[serde(default)]
    contacts: Vec<Contact>,
}

#[derive(Debug, Deserialize)]
struct Contact {
    email: Option<String>,
}

impl MembersResponse {
    /// 服务端已按角色过滤，这里再按角色校验一次，只收集非空邮箱
    fn emails_for(self, roles: &[Role]) -> BTreeSet<String> {
        self.members
            .into_iter()
            .filter(|m| roles.iter().any(|r| r.as_str() == m.membership_type_code))
            .flat_map(|m| m.user.contacts)
            .filter_map(|c| c.email)
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

/// 基于账户服务成员接口的解析器
pub struct MembershipClient {
    client: reqwest::Client,
    base_url: String,
}

impl MembershipClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// 成员接口地址，账户标识作为单个路径段编码
    fn members_url(&self, account_id: &str) -> Result<Url, DispatchError> {
        if matches!(account_id, "." | "..") {
            return Err(DispatchError::invalid_field("accountId", "不能作为路径段"));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MailerError::Internal(format!("成员服务地址无效: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| MailerError::Internal(format!("成员服务地址无法追加路径: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["orgs", account_id, "members"]);
        Ok(url)
    }
}

#[async_trait]
impl RecipientResolver for MembershipClient {
    async fn resolve(
        &self,
        token: &ServiceToken,
        account_id: &str,
        roles: &[Role],
    ) -> Result<BTreeSet<String>, DispatchError> {
        let url = self.members_url(account_id)?;
        let role_filter = roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(url)
            .bearer_auth(token.bearer())
            .query(&[("status", "ACTIVE"), ("roles", role_filter.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let members: MembersResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let emails = members.emails_for(roles);
        debug!(account_id, roles = %role_filter, count = emails.len(), "已解析收件人");
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails_for_filters_roles_and_blank_addresses() {
        let body = r#"{
            "members": [
                {"membershipTypeCode": "ADMIN", "user": {"contacts": [{"email": "admin@x.com"}]}},
                {"membershipTypeCode": "COORDINATOR", "user": {"contacts": [{"email": " coord@x.com "}]}},
                {"membershipTypeCode": "USER", "user": {"contacts": [{"email": "user@x.com"}]}},
                {"membershipTypeCode": "ADMIN", "user": {"contacts": [{"email": null}, {"email": ""}]}},
                {"membershipTypeCode": "ADMIN", "user": {}}
            ]
        }"#;

        let admins: MembersResponse = serde_json::from_str(body).unwrap();
        let emails: Vec<_> = admins.emails_for(&[Role::Admin]).into_iter().collect();
        assert_eq!(emails, vec!["admin@x.com"]);

        let both: MembersResponse = serde_json::from_str(body).unwrap();
        let emails: Vec<_> = both
            .emails_for(&[Role::Admin, Role::Coordinator])
            .into_iter()
            .collect();
        assert_eq!(emails, vec!["admin@x.com", "coord@x.com"]);
    }

    #[test]
    fn test_empty_members_response() {
        let body: MembersResponse = serde_json::from_str("{}").unwrap();
        assert!(body.emails_for(&[Role::Admin]).is_empty());
    }

    #[test]
    fn test_members_url_encodes_account_id_as_one_segment() {
        let client = MembershipClient::new(reqwest::Client::new(), "http://auth/api/v1/");
        assert_eq!(
            client.members_url("123").unwrap().as_str(),
            "http://auth/api/v1/orgs/123/members"
        );
        assert_eq!(
            client.members_url("a/b?c#d").unwrap().as_str(),
            "http://auth/api/v1/orgs/a%2Fb%3Fc%23d/members"
        );

        let no_slash = MembershipClient::new(reqwest::Client::new(), "http://auth/api/v1");
        assert_eq!(
            no_slash.members_url("9").unwrap().as_str(),
            "http://auth/api/v1/orgs/9/members"
        );
    }

    #[test]
    fn test_members_url_rejects_dot_segments() {
        let client = MembershipClient::new(reqwest::Client::new(), "http://auth/api/v1");
        assert!(matches!(
            client.members_url(".."),
            Err(DispatchError::InvalidField { .. })
        ));
    }
}
