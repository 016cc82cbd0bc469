//! 账户邮件服务入口

use std::sync::Arc;

use anyhow::Result;
use mailer_shared::{config::AppConfig, observability};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use account_mailer::{
    consumer::MailerConsumer,
    context::AppContext,
    dispatcher::Dispatcher,
    http::build_client,
    resolver::MembershipClient,
    sender::{LoggingSender, NotificationSender, NotifyApiSender},
    token::ClientCredentialsTokenProvider,
};

const SERVICE_NAME: &str = "account-mailer";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置，失败时退回默认值，待日志就绪后再告警
    let (config, load_error) = match AppConfig::load(SERVICE_NAME) {
        Ok(config) => (config, None),
        Err(e) => (
            AppConfig {
                service_name: SERVICE_NAME.to_string(),
                ..AppConfig::default()
            },
            Some(e),
        ),
    };

    // 2. 可观测性
    let _guard = observability::init(&config.service_name, &config.observability).await?;
    if let Some(e) = load_error {
        warn!(error = %e, "加载配置失败，使用默认配置");
    }

    info!(
        environment = %config.environment,
        topic = %config.mailer.topic,
        dry_run = config.mailer.dry_run,
        "Starting account-mailer..."
    );

    // 3. 外部协作方
    let client = build_client(&config.services)?;
    let tokens = Arc::new(ClientCredentialsTokenProvider::new(
        client.clone(),
        &config.services,
    ));
    let resolver = Arc::new(MembershipClient::new(
        client.clone(),
        &config.services.auth_api_url,
    ));
    let sender: Arc<dyn NotificationSender> = if config.mailer.dry_run {
        info!("dry_run 已开启，通知只写日志不发送");
        Arc::new(LoggingSender)
    } else {
        Arc::new(NotifyApiSender::new(client, &config.services.notify_api_url))
    };

    // 4. 执行上下文与消费者
    let app = Arc::new(AppContext::new(config.clone(), tokens, resolver, sender));
    let consumer = MailerConsumer::new(&config, Dispatcher::new(app.clone()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    let exited_early = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut consumer_task => Some(result),
    };

    // 消费循环在两条消息之间退出，正在处理的消息会先完成
    let _ = shutdown_tx.send(true);

    let result = match exited_early {
        Some(result) => {
            warn!("消费循环在收到关闭信号前退出");
            result
        }
        None => consumer_task.await,
    };

    match result {
        Ok(Ok(acked)) => info!(acked, "消费循环已退出"),
        Ok(Err(e)) => error!(error = %e, "消费循环异常退出"),
        Err(e) => error!(error = %e, "消费任务异常终止"),
    }

    app.close();
    info!("Service shutdown complete");
    Ok(())
}

/// 监听 Ctrl+C 和 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "无法监听 Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "无法监听 SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
