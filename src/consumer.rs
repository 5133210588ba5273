// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Message Consumer
//!
//! This module provides the consume loop in its three shapes: continuous
//! subscription, bounded-time collection and single non-blocking fetch.
//!
//! The continuous loop waits for each delivery with a bounded per-iteration
//! timeout. A timeout with no message is not an error: the loop simply
//! iterates again, which is what lets a process be stopped cooperatively
//! between iterations. Any other error while waiting terminates the loop;
//! recovery is a process-level restart, not an in-loop retry.

use crate::{envelope, errors::AmqpError};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    message::{BasicGetMessage, Delivery},
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicGetOptions,
        BasicNackOptions,
    },
    types::FieldTable,
    Channel,
};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

#[cfg(test)]
use mockall::automock;

/// Acknowledgment strategy for the continuous consume loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckMode {
    /// The broker removes the message as soon as it is handed to the
    /// consumer. A message is lost if the handler fails afterwards; that
    /// at-most-once tradeoff is the baseline contract here.
    #[default]
    Auto,
    /// The message is acknowledged only after the handler returns Ok, and
    /// nacked (without requeue) when it fails.
    OnSuccess,
}

/// Options for the continuous consume loop.
#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    /// Upper bound on a single wait for the next delivery.
    pub wait_timeout: Duration,
    pub ack_mode: AckMode,
}

impl Default for ConsumeOptions {
    fn default() -> ConsumeOptions {
        ConsumeOptions {
            wait_timeout: Duration::from_secs(3),
            ack_mode: AckMode::Auto,
        }
    }
}

/// Callback for raw deliveries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn exec(&self, delivery: &Delivery) -> Result<(), AmqpError>;
}

/// Callback for decoded JSON deliveries.
///
/// The decoded value arrives with its `_metadata` field already attached;
/// the raw delivery handle comes along for acknowledgment control.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JsonHandler: Send + Sync {
    async fn exec(&self, data: Value, delivery: &Delivery) -> Result<(), AmqpError>;
}

/// Registers `handler` against `queue` and consumes deliveries until no
/// consumer registration remains on the channel or a non-timeout wait
/// error occurs.
///
/// Handler failures are logged and contained; they never stop the loop.
pub async fn consume(
    channel: &Channel,
    queue: &str,
    opts: &ConsumeOptions,
    handler: &dyn DeliveryHandler,
) -> Result<(), AmqpError> {
    let mut consumer = match channel
        .basic_consume(
            queue,
            "",
            BasicConsumeOptions {
                no_local: false,
                no_ack: opts.ack_mode == AckMode::Auto,
                exclusive: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(c) => c,
        Err(err) => {
            error!(error = err.to_string(), "error to create the consumer");
            return Err(AmqpError::ConsumerDeclarationError);
        }
    };

    debug!(queue = queue, "consumer registered, waiting for deliveries");

    loop {
        match tokio::time::timeout(opts.wait_timeout, consumer.next()).await {
            // nothing arrived within the bound, poll again
            Err(_) => continue,
            Ok(None) => {
                debug!("no active consumer left, stopping");
                break;
            }
            Ok(Some(Err(err))) => {
                error!(error = err.to_string(), "error while waiting for deliveries");
                break;
            }
            Ok(Some(Ok(delivery))) => {
                if let Err(err) = handle_delivery(&delivery, opts.ack_mode, handler).await {
                    error!(error = err.to_string(), "failure to settle delivery");
                }
            }
        }
    }

    Ok(())
}

async fn handle_delivery(
    delivery: &Delivery,
    ack_mode: AckMode,
    handler: &dyn DeliveryHandler,
) -> Result<(), AmqpError> {
    let result = handler.exec(delivery).await;

    if let Err(err) = &result {
        error!(error = err.to_string(), "handler failed for delivery");
    }

    if ack_mode == AckMode::Auto {
        return Ok(());
    }

    match result {
        Ok(()) => delivery
            .ack(BasicAckOptions { multiple: false })
            .await
            .map_err(|_| AmqpError::AckMessageError),
        Err(_) => delivery
            .nack(BasicNackOptions {
                multiple: false,
                requeue: false,
            })
            .await
            .map_err(|_| AmqpError::NackMessageError),
    }
}

struct JsonDecodeHandler<'h> {
    inner: &'h dyn JsonHandler,
}

#[async_trait]
impl DeliveryHandler for JsonDecodeHandler<'_> {
    async fn exec(&self, delivery: &Delivery) -> Result<(), AmqpError> {
        let mut data = match envelope::decode_json(&delivery.data) {
            Ok(data) => data,
            Err(err) => {
                // already auto-acked; a malformed body is dropped, never
                // redelivered
                warn!(
                    error = err.to_string(),
                    "discarding delivery with malformed json body"
                );
                return Ok(());
            }
        };

        envelope::attach_metadata(&mut data, delivery);

        self.inner.exec(data, delivery).await
    }
}

/// JSON-aware variant of [`consume`], layered on the generic loop.
///
/// Bodies are decoded before the handler runs; malformed JSON is logged and
/// skipped, and the loop keeps going.
pub async fn consume_json(
    channel: &Channel,
    queue: &str,
    opts: &ConsumeOptions,
    handler: &dyn JsonHandler,
) -> Result<(), AmqpError> {
    consume(channel, queue, opts, &JsonDecodeHandler { inner: handler }).await
}

/// Consumes `queue` for at most `timeout`, accumulating message bodies.
///
/// Waits in slices of up to one second so the deadline is honored to
/// roughly that granularity. On an empty queue this returns an empty vec
/// once the deadline passes, not instantly, and never an error. The
/// consumer registration is cancelled before returning.
pub async fn collect_messages(
    channel: &Channel,
    queue: &str,
    timeout: Duration,
) -> Result<Vec<String>, AmqpError> {
    let mut consumer = match channel
        .basic_consume(
            queue,
            "",
            BasicConsumeOptions {
                no_local: false,
                no_ack: true,
                exclusive: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Ok(c) => c,
        Err(err) => {
            error!(error = err.to_string(), "error to create the consumer");
            return Err(AmqpError::ConsumerDeclarationError);
        }
    };

    let tag = consumer.tag().as_str().to_owned();
    let deadline = Instant::now() + timeout;
    let mut bodies = vec![];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let wait = remaining.min(Duration::from_secs(1));
        match tokio::time::timeout(wait, consumer.next()).await {
            Err(_) => continue,
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                // return what was collected so far
                error!(error = err.to_string(), "error while collecting deliveries");
                break;
            }
            Ok(Some(Ok(delivery))) => {
                bodies.push(String::from_utf8_lossy(&delivery.data).into_owned());
            }
        }
    }

    if let Err(err) = channel
        .basic_cancel(&tag, BasicCancelOptions { nowait: false })
        .await
    {
        debug!(error = err.to_string(), "ignoring consumer cancel failure");
    }

    Ok(bodies)
}

/// Fetches a single message from `queue` without waiting.
///
/// The message is auto-acknowledged. An empty queue yields `Ok(None)`,
/// never an error.
pub async fn get_one(channel: &Channel, queue: &str) -> Result<Option<BasicGetMessage>, AmqpError> {
    match channel
        .basic_get(queue, BasicGetOptions { no_ack: true })
        .await
    {
        Ok(message) => Ok(message),
        Err(err) => {
            error!(error = err.to_string(), "failure to get message");
            Err(AmqpError::ConsumerError(err.to_string()))
        }
    }
}

/// Fetches a single message and decodes it as JSON, with `_metadata`
/// attached.
pub async fn get_json(channel: &Channel, queue: &str) -> Result<Option<Value>, AmqpError> {
    let Some(message) = get_one(channel, queue).await? else {
        return Ok(None);
    };

    let mut data = envelope::decode_json(&message.delivery.data)?;
    envelope::attach_metadata(&mut data, &message.delivery);

    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_bound_each_wait_at_three_seconds() {
        let opts = ConsumeOptions::default();

        assert_eq!(opts.wait_timeout, Duration::from_secs(3));
        assert_eq!(opts.ack_mode, AckMode::Auto);
    }
}
