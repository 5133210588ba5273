// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! Fan-out subscriber.
//!
//! Takes a consumer name as its first argument, declares an exclusive
//! broker-named queue bound to the `eventos` exchange and consumes it
//! indefinitely. Every subscriber receives a copy of every published
//! message; what each one does with it is simulated per consumer name.

use async_trait::async_trait;
use lapin::message::Delivery;
use mensageria::{
    channel::{new_amqp_channel, shutdown},
    configs::Configs,
    consumer::{consume, ConsumeOptions, DeliveryHandler},
    errors::AmqpError,
    exchange::{ExchangeDefinition, EVENTOS_EXCHANGE},
    queue::QueueDefinition,
    topology::{bind_queue, declare_exchange, declare_queue},
};
use std::time::Duration;
use tracing::info;

struct SubscriberHandler {
    consumer_name: String,
}

#[async_trait]
impl DeliveryHandler for SubscriberHandler {
    async fn exec(&self, delivery: &Delivery) -> Result<(), AmqpError> {
        let message = String::from_utf8_lossy(&delivery.data);
        info!("[{}] recebeu: {}", self.consumer_name, message);

        // each subscriber reacts to the same broadcast in its own way
        match self.consumer_name.as_str() {
            "EmailService" => info!("[{}] enviando email: {}", self.consumer_name, message),
            "SMSService" => info!("[{}] enviando SMS: {}", self.consumer_name, message),
            "Analytics" => info!(
                "[{}] registrando analytics: {}",
                self.consumer_name, message
            ),
            _ => info!("[{}] processando: {}", self.consumer_name, message),
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        info!("[{}] processado!", self.consumer_name);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    tracing_subscriber::fmt().with_target(false).init();

    let Some(consumer_name) = std::env::args().nth(1) else {
        eprintln!("uso: subscribe <nome>");
        std::process::exit(2);
    };
    let cfg = Configs::from_env();

    info!("iniciando consumidor: {}", consumer_name);
    let (conn, channel) = new_amqp_channel(&cfg).await?;

    declare_exchange(
        &channel,
        &ExchangeDefinition::new(EVENTOS_EXCHANGE).fanout(),
    )
    .await?;

    // temporary queue owned by this subscriber, named by the broker
    let queue_name = declare_queue(
        &channel,
        &QueueDefinition::server_named().exclusive().delete(),
    )
    .await?;
    bind_queue(&channel, &queue_name, EVENTOS_EXCHANGE, "").await?;

    info!("{} inscrito e aguardando mensagens...", consumer_name);
    let handler = SubscriberHandler { consumer_name };
    let consume_opts = ConsumeOptions::default();
    tokio::select! {
        result = consume(&channel, &queue_name, &consume_opts, &handler) => result?,
        _ = tokio::signal::ctrl_c() => info!("encerrando consumidor"),
    }

    shutdown(&channel, &conn).await;
    Ok(())
}
