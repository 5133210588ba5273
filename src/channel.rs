// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation and teardown of AMQP connections and
//! channels. It provides functionality to establish a connection to the
//! broker, create a communication channel on it, and release both handles
//! explicitly when the process is done with them.

use crate::{configs::Configs, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Creates a new AMQP channel for communication with the broker.
///
/// This function establishes a connection using the parameters in `cfg`,
/// then creates a channel on that connection. Both handles are wrapped in
/// `Arc` for thread-safe sharing.
///
/// # Parameters
/// * `cfg` - Configuration containing the broker host, port and credentials
///
/// # Returns
/// * `Result<(Arc<Connection>, Arc<Channel>), AmqpError>` -
///   A tuple containing the connection and channel on success, or an error
///   on an unreachable host, auth failure or protocol negotiation failure.
pub async fn new_amqp_channel(cfg: &Configs) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app_name.clone()));

    let uri = cfg.amqp_uri();

    let conn = match Connection::connect(&uri, options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError {})
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError {})
        }
    }
}

/// Closes a channel if it is still live.
///
/// Idempotent and safe to call on an already-closed handle: liveness is
/// checked first and close-time errors are swallowed, since correctness
/// does not depend on a clean shutdown.
pub async fn close_channel(channel: &Channel) {
    if !channel.status().connected() {
        return;
    }

    if let Err(err) = channel.close(200, "bye").await {
        debug!(error = err.to_string(), "ignoring channel close failure");
    }
}

/// Closes a connection if it is still live. Same contract as
/// [`close_channel`].
pub async fn close_connection(conn: &Connection) {
    if !conn.status().connected() {
        return;
    }

    if let Err(err) = conn.close(200, "bye").await {
        debug!(error = err.to_string(), "ignoring connection close failure");
    }
}

/// Releases a channel/connection pair, channel first.
///
/// A channel must never outlive its owning connection, so teardown always
/// happens in this order.
pub async fn shutdown(channel: &Channel, conn: &Connection) {
    close_channel(channel).await;
    close_connection(conn).await;
    debug!("amqp handles released");
}
