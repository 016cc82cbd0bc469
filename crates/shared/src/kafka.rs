//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Consumer 抽象，
//! 统一消息所有权转换、错误映射、逐条确认和优雅关闭语义。
//!
//! 确认（ack）即存储消费位点：`enable.auto.offset.store` 关闭，
//! 只有当一条消息的 handler 执行完毕后才存储它的位点，再由自动提交刷到 broker。

use std::future::Future;

use futures::{Stream, StreamExt};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::MailerError;

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
}

/// 消息在分区中的位置，确认时使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let timestamp = msg.timestamp().to_millis();

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp,
        }
    }

    /// 仅含载荷的消息，用于测试或非 Kafka 来源的重放
    pub fn from_payload(topic: &str, offset: i64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key: None,
            payload: payload.into(),
            timestamp: None,
        }
    }

    /// 附带消息键，重放带键消息时使用
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn position(&self) -> MessagePosition {
        MessagePosition {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
        }
    }

    /// 负载的有损 UTF-8 表示，专供日志输出
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

// ---------------------------------------------------------------------------
// 顺序消费循环
// ---------------------------------------------------------------------------

/// 逐条处理消息流，直到流结束或收到关闭信号
///
/// 下一条消息只会在上一条的 handler 完成并执行 `ack` 之后才被拉取，
/// 因此任意两条消息的处理不会交错。handler 返回错误只记录日志，
/// 消息照常确认，坏消息不会阻塞后续消息。
///
/// 返回已确认的消息数量。
pub async fn run_sequential<S, E, F, Fut, A>(
    messages: S,
    mut shutdown: watch::Receiver<bool>,
    handler: F,
    mut ack: A,
) -> u64
where
    S: Stream<Item = Result<ConsumerMessage, E>>,
    E: std::fmt::Display,
    F: Fn(ConsumerMessage) -> Fut,
    Fut: Future<Output = Result<(), MailerError>>,
    A: FnMut(&MessagePosition),
{
    futures::pin_mut!(messages);

    let mut acked: u64 = 0;

    if *shutdown.borrow() {
        info!("启动前已收到关闭信号，消费循环不再启动");
        return acked;
    }

    loop {
        tokio::select! {
            // 偏向关闭信号，保证收到关闭时能尽快退出
            biased;

            changed = shutdown.changed() => {
                // 发送端被丢弃同样视为关闭，避免空转
                if changed.is_err() || *shutdown.borrow() {
                    info!("收到关闭信号，消费循环退出");
                    break;
                }
            }

            next = messages.next() => {
                let Some(next) = next else {
                    warn!("消息流已结束");
                    break;
                };

                match next {
                    Ok(msg) => {
                        let position = msg.position();
                        debug!(
                            topic = %position.topic,
                            partition = position.partition,
                            offset = position.offset,
                            "收到消息"
                        );

                        if let Err(e) = handler(msg).await {
                            error!(
                                error = %e,
                                topic = %position.topic,
                                partition = position.partition,
                                offset = position.offset,
                                "处理消息失败"
                            );
                        }

                        ack(&position);
                        acked += 1;
                    }
                    Err(e) => {
                        error!(error = %e, "接收消息出错");
                    }
                }
            }
        }
    }

    acked
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer` 并提供基于 `watch` channel 的优雅关闭语义，
/// 确保进程退出时不会丢失正在处理的消息。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者，消费组取自配置
    pub fn new(config: &KafkaConfig) -> Result<Self, MailerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .create()
            .map_err(|e| MailerError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), MailerError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| MailerError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动消费循环
    ///
    /// 消息逐条交给 handler，handler 完成后存储该消息的下一位点作为确认。
    pub async fn start<F, Fut>(self, shutdown: watch::Receiver<bool>, handler: F) -> u64
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: Future<Output = Result<(), MailerError>>,
    {
        let consumer = &self.consumer;
        let stream = consumer
            .stream()
            .map(|result| result.map(|borrowed| ConsumerMessage::from_borrowed(&borrowed)));

        info!("Kafka 消费循环已启动");

        run_sequential(stream, shutdown, handler, |position| {
            // Kafka 位点语义是"下一条待消费"，因此 +1
            if let Err(e) =
                consumer.store_offset(&position.topic, position.partition, position.offset + 1)
            {
                warn!(
                    error = %e,
                    topic = %position.topic,
                    partition = position.partition,
                    offset = position.offset,
                    "存储消费位点失败，重启后该消息可能被重复投递"
                );
            }
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------
