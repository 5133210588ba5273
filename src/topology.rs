// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Topology Management
//!
//! This module declares the broker-side entities the two messaging patterns
//! rely on: the durable work queue, the fanout exchange and the bindings
//! between queues and exchanges.
//!
//! Declarations are idempotent from the caller's point of view: repeating
//! one with identical parameters against the same broker state succeeds
//! without side effect. They must run once per channel before any publish
//! or consume.

use crate::{
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Declares a single queue and returns its broker-confirmed name.
///
/// For a server-named definition (empty name, see
/// [`QueueDefinition::server_named`]) the broker generates a unique name;
/// it is carried back to the caller in the returned `String` so the queue
/// can be bound and consumed from.
pub async fn declare_queue(channel: &Channel, def: &QueueDefinition) -> Result<String, AmqpError> {
    debug!("creating queue: {}", def.name);

    match channel
        .queue_declare(
            &def.name,
            QueueDeclareOptions {
                passive: def.passive,
                durable: def.durable,
                exclusive: def.exclusive,
                auto_delete: def.delete,
                nowait: def.no_wait,
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(queue) => {
            let name = queue.name().as_str().to_owned();
            debug!("queue: {} was created", name);
            Ok(name)
        }
        Err(err) => {
            error!(
                error = err.to_string(),
                name = def.name.as_str(),
                "error to declare the queue"
            );
            Err(AmqpError::DeclareQueueError(def.name.clone()))
        }
    }
}

/// Declares a single exchange.
pub async fn declare_exchange(
    channel: &Channel,
    def: &ExchangeDefinition,
) -> Result<(), AmqpError> {
    debug!("creating exchange: {}", def.name);

    match channel
        .exchange_declare(
            &def.name,
            def.kind.clone().into(),
            ExchangeDeclareOptions {
                passive: def.passive,
                durable: def.durable,
                auto_delete: def.delete,
                internal: def.internal,
                nowait: def.no_wait,
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(_) => {
            debug!("exchange: {} was created", def.name);
            Ok(())
        }
        Err(err) => {
            error!(
                error = err.to_string(),
                name = def.name.as_str(),
                "error to declare the exchange"
            );
            Err(AmqpError::DeclareExchangeError(def.name.clone()))
        }
    }
}

/// Binds a queue to an exchange.
///
/// Fanout bindings pass an empty routing key.
pub async fn bind_queue(
    channel: &Channel,
    queue: &str,
    exchange: &str,
    routing_key: &str,
) -> Result<(), AmqpError> {
    debug!(
        "binding queue: {} to the exchange: {} with the key: {}",
        queue, exchange, routing_key
    );

    match channel
        .queue_bind(
            queue,
            exchange,
            routing_key,
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(error = err.to_string(), "error to bind queue to exchange");
            Err(AmqpError::BindingExchangeToQueueError(
                queue.to_owned(),
                exchange.to_owned(),
            ))
        }
    }
}

/// Trait defining the interface for topology management.
///
/// Accumulate exchange, queue and binding definitions, then install the
/// whole topology to the broker in one call.
#[async_trait]
pub trait Topology {
    /// Adds an exchange definition to the topology.
    fn exchange(self, def: ExchangeDefinition) -> Self;

    /// Adds a queue definition to the topology.
    fn queue(self, def: QueueDefinition) -> Self;

    /// Adds a queue-to-exchange binding to the topology.
    fn queue_binding(self, binding: QueueBinding) -> Self;

    /// Installs the topology to the broker: exchanges first, then queues,
    /// then bindings.
    async fn install(&self) -> Result<(), AmqpError>;
}

/// Broker implementation of the [`Topology`] trait.
pub struct AmqpTopology {
    channel: Arc<Channel>,
    pub(crate) queues: Vec<QueueDefinition>,
    pub(crate) exchanges: Vec<ExchangeDefinition>,
    pub(crate) queues_binding: Vec<QueueBinding>,
}

impl AmqpTopology {
    /// Creates an empty topology bound to the given channel.
    pub fn new(channel: Arc<Channel>) -> AmqpTopology {
        AmqpTopology {
            channel,
            queues: vec![],
            exchanges: vec![],
            queues_binding: vec![],
        }
    }
}

#[async_trait]
impl Topology for AmqpTopology {
    fn exchange(mut self, def: ExchangeDefinition) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    fn queue_binding(mut self, binding: QueueBinding) -> Self {
        self.queues_binding.push(binding);
        self
    }

    async fn install(&self) -> Result<(), AmqpError> {
        for def in &self.exchanges {
            declare_exchange(&self.channel, def).await?;
        }

        for def in &self.queues {
            declare_queue(&self.channel, def).await?;
        }

        for binding in &self.queues_binding {
            bind_queue(
                &self.channel,
                &binding.queue_name,
                &binding.exchange_name,
                &binding.routing_key,
            )
            .await?;
        }

        debug!("topology installed");

        Ok(())
    }
}
