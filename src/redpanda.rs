//! Kafka/Redpanda subscription that feeds raw readings into the ingest queue.

use crate::config::RedpandaConfig;
use crate::error::AppError;
use crate::ingest::Ingestor;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub type RedpandaConsumer = StreamConsumer;

pub fn create_consumer(cfg: &RedpandaConfig) -> Result<RedpandaConsumer, AppError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &cfg.brokers)
        .set("group.id", &cfg.group_id)
        .set("auto.offset.reset", &cfg.auto_offset_reset)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "30000")
        .set("enable.auto.commit", "true")
        .set("auto.commit.interval.ms", "5000")
        .create()
        .map_err(|e| AppError::Kafka(format!("Failed to create consumer: {}", e)))?;

    consumer
        .subscribe(&[cfg.topic.as_str()])
        .map_err(|e| AppError::Kafka(format!("Failed to subscribe to topic: {}", e)))?;
    debug!(topic = %cfg.topic, "subscribed to topic");

    Ok(consumer)
}

/// Receive one payload, or None if nothing arrived within a second.
async fn receive_payload(consumer: &RedpandaConsumer) -> Result<Option<Vec<u8>>, AppError> {
    match tokio::time::timeout(Duration::from_secs(1), consumer.recv()).await {
        Ok(Ok(message)) => match message.payload() {
            Some(p) => Ok(Some(p.to_vec())),
            None => {
                warn!(
                    topic = %message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "message has no payload"
                );
                Ok(None)
            }
        },
        Ok(Err(e)) => Err(AppError::Kafka(format!("Consumer error: {}", e))),
        Err(_) => Ok(None),
    }
}

/// Forward every message on the topic to the ingest queue until shutdown.
pub async fn run(consumer: RedpandaConsumer, ingestor: Ingestor, mut shutdown: watch::Receiver<bool>) {
    info!("redpanda ingress started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            res = receive_payload(&consumer) => match res {
                Ok(Some(payload)) => {
                    if let Err(e) = ingestor.handle_message(&payload).await {
                        warn!(error = %e, "discarding unusable reading message");
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    error!("redpanda error: {e}; continuing after short delay");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
    info!("redpanda ingress stopped");
}
