//! 账户邮件消费者
//!
//! 订阅邮件事件 topic，逐条交给分发器处理。分发器从不返回错误，
//! 因此每条消息都会在处理完成后被确认。

use mailer_shared::config::AppConfig;
use mailer_shared::kafka::KafkaConsumer;
use tokio::sync::watch;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;

pub struct MailerConsumer {
    consumer: KafkaConsumer,
    dispatcher: Dispatcher,
    topic: String,
}

impl MailerConsumer {
    pub fn new(config: &AppConfig, dispatcher: Dispatcher) -> Result<Self, DispatchError> {
        let consumer = KafkaConsumer::new(&config.kafka)?;
        Ok(Self {
            consumer,
            dispatcher,
            topic: config.mailer.topic.clone(),
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号，返回已确认的消息数
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<u64, DispatchError> {
        self.consumer.subscribe(&[self.topic.as_str()])?;

        info!(topic = %self.topic, "账户邮件消费者已启动");

        let dispatcher = &self.dispatcher;
        let acked = self
            .consumer
            .start(shutdown, |msg| async move {
                dispatcher.dispatch(&msg).await;
                Ok(())
            })
            .await;

        info!(acked, "账户邮件消费者已停止");
        Ok(acked)
    }
}
