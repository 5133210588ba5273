// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! This module provides the types used to describe broker queues and their
//! bindings. Two queue shapes matter here: the named, durable, shared work
//! queue, and the anonymous exclusive queue a fan-out subscriber asks the
//! broker to name on its behalf.

/// Definition of a queue with its configuration parameters.
///
/// This struct implements the builder pattern to create and configure
/// queue definitions before they are declared on a channel.
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) passive: bool,
    pub(crate) no_wait: bool,
}

impl QueueDefinition {
    /// Creates a new queue definition with the given name.
    ///
    /// By default the queue is non-durable, non-exclusive and not
    /// auto-deleted.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..QueueDefinition::default()
        }
    }

    /// Creates a definition with an empty name, asking the broker to
    /// generate a unique one at declaration time.
    ///
    /// The generated name is returned by
    /// [`declare_queue`](crate::topology::declare_queue). Combine with
    /// [`exclusive`](Self::exclusive) and [`delete`](Self::delete) for the
    /// per-subscriber queue used by fan-out subscription.
    pub fn server_named() -> QueueDefinition {
        QueueDefinition::default()
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    ///
    /// Exclusive queues are reclaimed by the broker when the connection
    /// closes.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

/// Configuration for binding a queue to an exchange.
///
/// For a fanout exchange the routing key is irrelevant and stays empty.
pub struct QueueBinding {
    pub(crate) queue_name: String,
    pub(crate) exchange_name: String,
    pub(crate) routing_key: String,
}

impl QueueBinding {
    /// Creates a new binding for the given queue, with an empty exchange
    /// name and routing key to be filled in via the builder methods.
    pub fn new(queue: &str) -> QueueBinding {
        QueueBinding {
            queue_name: queue.to_owned(),
            exchange_name: String::new(),
            routing_key: String::new(),
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange_name = exchange.to_owned();
        self
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_definition_defaults_to_a_plain_queue() {
        let def = QueueDefinition::new("fila_teste");

        assert_eq!(def.name, "fila_teste");
        assert!(!def.durable);
        assert!(!def.delete);
        assert!(!def.exclusive);
        assert!(!def.passive);
        assert!(!def.no_wait);
    }

    #[test]
    fn builder_flags_accumulate() {
        let def = QueueDefinition::new("fila_teste").durable();
        assert!(def.durable);

        let def = QueueDefinition::server_named().exclusive().delete();
        assert!(def.name.is_empty());
        assert!(def.exclusive);
        assert!(def.delete);
        assert!(!def.durable);
    }

    #[test]
    fn binding_builder_fills_exchange_and_key() {
        let binding = QueueBinding::new("fila_teste")
            .exchange("eventos")
            .routing_key("");

        assert_eq!(binding.queue_name, "fila_teste");
        assert_eq!(binding.exchange_name, "eventos");
        assert_eq!(binding.routing_key, "");
    }
}
