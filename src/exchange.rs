// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions
//!
//! This module provides the types used to describe broker exchanges. The
//! pub/sub side of this crate revolves around a single fanout exchange
//! ([`EVENTOS_EXCHANGE`]) that copies every published message to all bound
//! queues.

/// Name of the fixed fanout exchange used for pub/sub broadcasting.
pub const EVENTOS_EXCHANGE: &str = "eventos";

/// Represents the types of exchanges available on the broker.
///
/// - Direct: routes messages to queues on an exact routing-key match
/// - Fanout: broadcasts messages to all bound queues, ignoring routing keys
/// - Topic: routes messages on wildcard routing-key patterns
/// - Headers: routes on message header values instead of routing keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> lapin::ExchangeKind {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
        }
    }
}

/// Definition of an exchange with its configuration parameters.
///
/// This struct implements the builder pattern to create and configure
/// exchange definitions before they are declared on a channel.
#[derive(Debug, Clone)]
pub struct ExchangeDefinition {
    pub(crate) name: String,
    pub(crate) kind: ExchangeKind,
    pub(crate) delete: bool,
    pub(crate) durable: bool,
    pub(crate) passive: bool,
    pub(crate) internal: bool,
    pub(crate) no_wait: bool,
}

impl ExchangeDefinition {
    /// Creates a new exchange definition with the given name.
    ///
    /// By default the exchange is a non-durable Direct exchange.
    pub fn new(name: &str) -> ExchangeDefinition {
        ExchangeDefinition {
            name: name.to_owned(),
            kind: ExchangeKind::Direct,
            delete: false,
            durable: false,
            passive: false,
            internal: false,
            no_wait: false,
        }
    }

    /// Sets the exchange type.
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the exchange type to Direct.
    pub fn direct(mut self) -> Self {
        self.kind = ExchangeKind::Direct;
        self
    }

    /// Sets the exchange type to Fanout.
    pub fn fanout(mut self) -> Self {
        self.kind = ExchangeKind::Fanout;
        self
    }

    /// Sets the exchange to auto-delete when no longer used.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Makes the declaration passive, checking for existence without
    /// creating the exchange.
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Makes the exchange internal, preventing direct publishing.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Sets the no_wait flag, making the declaration non-blocking.
    pub fn no_wait(mut self) -> Self {
        self.no_wait = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_definition_defaults_to_direct_and_transient() {
        let def = ExchangeDefinition::new(EVENTOS_EXCHANGE);

        assert_eq!(def.name, "eventos");
        assert_eq!(def.kind, ExchangeKind::Direct);
        assert!(!def.durable);
        assert!(!def.delete);
    }

    #[test]
    fn fanout_builder_switches_the_kind() {
        let def = ExchangeDefinition::new(EVENTOS_EXCHANGE).fanout();

        assert_eq!(def.kind, ExchangeKind::Fanout);
    }

    #[test]
    fn kind_converts_to_the_lapin_equivalent() {
        assert!(matches!(
            lapin::ExchangeKind::from(ExchangeKind::Fanout),
            lapin::ExchangeKind::Fanout
        ));
        assert!(matches!(
            lapin::ExchangeKind::from(ExchangeKind::Direct),
            lapin::ExchangeKind::Direct
        ));
    }
}
