// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! Publishes one message to every pub/sub subscriber.
//!
//! Takes the message as its first argument and broadcasts it through the
//! `eventos` fanout exchange.

use mensageria::{
    channel::{new_amqp_channel, shutdown},
    configs::Configs,
    errors::AmqpError,
    exchange::{ExchangeDefinition, EVENTOS_EXCHANGE},
    publisher::AmqpPublisher,
    topology::declare_exchange,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    tracing_subscriber::fmt().with_target(false).init();

    let Some(message) = std::env::args().nth(1) else {
        eprintln!("uso: publish <mensagem>");
        std::process::exit(2);
    };
    let cfg = Configs::from_env();

    info!("publicando mensagem para TODOS os consumidores...");
    let (conn, channel) = new_amqp_channel(&cfg).await?;
    declare_exchange(
        &channel,
        &ExchangeDefinition::new(EVENTOS_EXCHANGE).fanout(),
    )
    .await?;

    let publisher = AmqpPublisher::new(channel.clone(), &cfg);
    publisher.broadcast(EVENTOS_EXCHANGE, &message).await?;
    info!("mensagem enviada: {}", message);

    shutdown(&channel, &conn).await;
    Ok(())
}
