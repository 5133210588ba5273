// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! Work-queue worker for plain-text messages.
//!
//! Takes an optional worker name as its first argument and consumes the
//! configured work queue indefinitely, printing each received message.
//! Processing is simulated with a fixed delay.

use async_trait::async_trait;
use lapin::message::Delivery;
use mensageria::{
    channel::{new_amqp_channel, shutdown},
    configs::Configs,
    consumer::{consume, ConsumeOptions, DeliveryHandler},
    errors::AmqpError,
    queue::QueueDefinition,
    topology::declare_queue,
};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

struct PrintHandler {
    worker_name: String,
}

#[async_trait]
impl DeliveryHandler for PrintHandler {
    async fn exec(&self, delivery: &Delivery) -> Result<(), AmqpError> {
        let body = String::from_utf8_lossy(&delivery.data);
        info!("[{}] recebeu: {}", self.worker_name, body);

        // simulated processing
        tokio::time::sleep(Duration::from_secs(2)).await;

        info!("[{}] processou: {}", self.worker_name, body);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    tracing_subscriber::fmt().with_target(false).init();

    let worker_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("Worker-{}", Uuid::new_v4().simple()));
    let cfg = Configs::from_env();

    info!("iniciando {}...", worker_name);
    let (conn, channel) = new_amqp_channel(&cfg).await?;
    declare_queue(&channel, &QueueDefinition::new(&cfg.queue).durable()).await?;

    info!("{} aguardando mensagens...", worker_name);
    let handler = PrintHandler { worker_name };
    let consume_opts = ConsumeOptions::default();
    tokio::select! {
        result = consume(&channel, &cfg.queue, &consume_opts, &handler) => result?,
        _ = tokio::signal::ctrl_c() => info!("encerrando worker"),
    }

    shutdown(&channel, &conn).await;
    Ok(())
}
