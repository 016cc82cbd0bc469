//! 外部 HTTP 调用的公共部分
//!
//! 统一 reqwest 客户端构造与错误映射，三个协作服务（令牌、成员查询、通知发送）共用。

use mailer_shared::config::ServicesConfig;
use mailer_shared::error::MailerError;
use reqwest::{Response, StatusCode};

/// 构造共享的 HTTP 客户端
///
/// 客户端内部带连接池，clone 是廉价操作。
pub fn build_client(config: &ServicesConfig) -> Result<reqwest::Client, MailerError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| MailerError::Internal(format!("创建 HTTP 客户端失败: {e}")))
}

/// 将 reqwest 传输层错误映射为共享错误
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> MailerError {
    if err.is_timeout() {
        MailerError::ExternalServiceTimeout {
            service: service.to_string(),
        }
    } else {
        MailerError::ExternalService {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

/// 非 2xx 响应转为错误，响应体尽力读取后附在错误信息中
pub(crate) async fn ensure_success(service: &str, response: Response) -> Result<Response, MailerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(MailerError::Unauthorized {
            service: service.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(MailerError::ExternalService {
        service: service.to_string(),
        message: format!("HTTP {status}: {body}"),
    })
}

/// 去掉末尾斜杠后拼接路径
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
