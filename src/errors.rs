// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Error Types for the Messaging Layer
//!
//! This module provides the error taxonomy for all broker operations.
//! The `AmqpError` enum covers connection and channel lifecycle, topology
//! declaration, publishing, payload decoding and consumer handling.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Setup errors (connect, declare, bind) are fatal and propagate to the
/// caller; steady-state consumption errors are contained within the consume
/// loop and logged. A per-iteration wait timeout is never represented here:
/// it is an expected condition handled inside the loop, not an error.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the broker
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{0}` to exchange `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error registering a consumer on a queue
    #[error("consumer declaration error")]
    ConsumerDeclarationError,

    /// Error while consuming or handling a message
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error encoding or decoding a message payload
    #[error("failure to parse payload")]
    ParsePayloadError,

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,
}
