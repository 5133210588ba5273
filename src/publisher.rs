// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! This module provides functionality for publishing messages to queues and
//! exchanges. A raw publish hands an already-serialized payload to the
//! channel with configurable properties; on top of that sit the
//! JSON-encoding operations and the task/event envelope builders.
//!
//! Delivery is fire-and-forget at the application layer: there are no
//! publisher confirms, and failures surface only as what the channel
//! reports.

use crate::{
    configs::Configs,
    envelope::{Event, Task},
    errors::AmqpError,
};
use chrono::Utc;
use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel,
};
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Configurable properties for an outgoing message.
///
/// Unset options take the broker defaults (non-persistent delivery, no
/// priority). Every message additionally carries a generated message id.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub(crate) content_type: Option<String>,
    pub(crate) persistent: Option<bool>,
    pub(crate) priority: Option<u8>,
    pub(crate) timestamp: Option<u64>,
    pub(crate) app_id: Option<String>,
    pub(crate) kind: Option<String>,
    pub(crate) headers: BTreeMap<ShortString, AMQPValue>,
}

impl PublishOptions {
    pub fn new() -> PublishOptions {
        PublishOptions::default()
    }

    /// Marks the message as `application/json`.
    pub fn json(self) -> Self {
        self.content_type(JSON_CONTENT_TYPE)
    }

    /// Sets the MIME content type.
    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_owned());
        self
    }

    /// Chooses between persistent (survives a broker restart on a durable
    /// queue) and transient delivery.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    /// Sets the message priority (0–9, 9 highest).
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the message timestamp, in epoch seconds.
    pub fn timestamp(mut self, epoch_seconds: u64) -> Self {
        self.timestamp = Some(epoch_seconds);
        self
    }

    /// Sets the publishing application id.
    pub fn app_id(mut self, app_id: &str) -> Self {
        self.app_id = Some(app_id.to_owned());
        self
    }

    /// Sets the AMQP `type` property.
    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_owned());
        self
    }

    /// Adds a custom header to the message.
    pub fn header(mut self, key: &str, value: AMQPValue) -> Self {
        self.headers.insert(ShortString::from(key), value);
        self
    }

    pub(crate) fn to_properties(&self) -> BasicProperties {
        let mut props = BasicProperties::default()
            .with_message_id(ShortString::from(Uuid::new_v4().to_string()));

        if let Some(content_type) = &self.content_type {
            props = props.with_content_type(ShortString::from(content_type.as_str()));
        }

        if let Some(persistent) = self.persistent {
            props = props.with_delivery_mode(if persistent { 2 } else { 1 });
        }

        if let Some(priority) = self.priority {
            props = props.with_priority(priority);
        }

        if let Some(timestamp) = self.timestamp {
            props = props.with_timestamp(timestamp);
        }

        if let Some(app_id) = &self.app_id {
            props = props.with_app_id(ShortString::from(app_id.as_str()));
        }

        if let Some(kind) = &self.kind {
            props = props.with_type(ShortString::from(kind.as_str()));
        }

        if !self.headers.is_empty() {
            props = props.with_headers(FieldTable::from(self.headers.clone()));
        }

        props
    }
}

/// Publisher for the two delivery patterns: direct work-queue delivery
/// (default exchange, routing key = queue name) and fan-out broadcasting
/// through an exchange.
pub struct AmqpPublisher {
    channel: Arc<Channel>,
    app_id: String,
}

impl AmqpPublisher {
    /// Creates a new publisher on the given channel.
    ///
    /// The configured application name becomes the `app_id` property on
    /// task and event envelopes.
    pub fn new(channel: Arc<Channel>, cfg: &Configs) -> Arc<AmqpPublisher> {
        Arc::new(AmqpPublisher {
            channel,
            app_id: cfg.app_name.clone(),
        })
    }

    /// Publishes an already-serialized payload.
    ///
    /// # Parameters
    /// * `exchange` - Exchange name; empty string for the default exchange
    /// * `routing_key` - Queue name for direct delivery, empty for fanout
    /// * `payload` - The serialized message body
    /// * `opts` - Message properties
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        opts: &PublishOptions,
    ) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                payload,
                opts.to_properties(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError)
            }
            _ => Ok(()),
        }
    }

    /// Delivers a payload to a single queue through the default exchange.
    pub async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        opts: &PublishOptions,
    ) -> Result<(), AmqpError> {
        self.publish("", queue, payload, opts).await
    }

    /// Broadcasts a plain-text message to every queue bound to `exchange`.
    pub async fn broadcast(&self, exchange: &str, message: &str) -> Result<(), AmqpError> {
        debug!(exchange = exchange, "broadcasting message");
        self.publish(exchange, "", message.as_bytes(), &PublishOptions::default())
            .await
    }

    /// JSON-encodes `data` and delivers it to `queue`.
    ///
    /// Non-ASCII characters are kept verbatim in the encoded payload.
    /// Where the caller left them unset, the options are completed with
    /// `content_type=application/json`, persistent delivery and the current
    /// timestamp; caller-provided values win.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        queue: &str,
        data: &T,
        opts: PublishOptions,
    ) -> Result<(), AmqpError> {
        let payload = serde_json::to_vec(data).map_err(|err| {
            error!(error = err.to_string(), "failure to encode payload");
            AmqpError::ParsePayloadError
        })?;

        self.send_to_queue(queue, &payload, &json_defaults(opts)).await
    }

    /// Wraps `dados` in a [`Task`] envelope and queues it with the given
    /// priority. Returns the envelope that went out.
    pub async fn send_task(
        &self,
        queue: &str,
        tipo: &str,
        dados: Value,
        prioridade: u8,
    ) -> Result<Task, AmqpError> {
        let task = Task::new(tipo, dados);

        debug!(tipo = tipo, id = task.id.as_str(), "queueing task");

        let opts = PublishOptions::new()
            .priority(prioridade)
            .app_id(&self.app_id);
        self.send_json(queue, &task, opts).await?;

        Ok(task)
    }

    /// Wraps `payload` in an [`Event`] envelope and queues it. Returns the
    /// envelope that went out.
    pub async fn send_event(
        &self,
        queue: &str,
        evento: &str,
        payload: Value,
    ) -> Result<Event, AmqpError> {
        let event = Event::new(evento, payload);

        debug!(evento = evento, id = event.id.as_str(), "queueing event");

        let opts = PublishOptions::new().kind("event").app_id(&self.app_id);
        self.send_json(queue, &event, opts).await?;

        Ok(event)
    }
}

fn json_defaults(mut opts: PublishOptions) -> PublishOptions {
    if opts.content_type.is_none() {
        opts.content_type = Some(JSON_CONTENT_TYPE.to_owned());
    }

    if opts.persistent.is_none() {
        opts.persistent = Some(true);
    }

    if opts.timestamp.is_none() {
        opts.timestamp = Some(Utc::now().timestamp() as u64);
    }

    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::LongString;

    #[test]
    fn options_map_onto_amqp_properties() {
        let opts = PublishOptions::new()
            .json()
            .persistent(true)
            .priority(8)
            .timestamp(1_700_000_000)
            .app_id("laravel-app")
            .kind("event")
            .header("x-origem", AMQPValue::LongString(LongString::from("api")));

        let props = opts.to_properties();

        assert_eq!(
            props.content_type(),
            &Some(ShortString::from(JSON_CONTENT_TYPE))
        );
        assert_eq!(*props.delivery_mode(), Some(2));
        assert_eq!(*props.priority(), Some(8));
        assert_eq!(*props.timestamp(), Some(1_700_000_000));
        assert_eq!(props.app_id(), &Some(ShortString::from("laravel-app")));
        assert_eq!(props.kind(), &Some(ShortString::from("event")));
        assert!(props.message_id().is_some());

        let headers = props.headers().as_ref().unwrap();
        assert_eq!(
            headers.inner().get("x-origem"),
            Some(&AMQPValue::LongString(LongString::from("api")))
        );
    }

    #[test]
    fn unset_options_leave_broker_defaults() {
        let props = PublishOptions::new().to_properties();

        assert_eq!(props.content_type(), &None);
        assert_eq!(*props.delivery_mode(), None);
        assert_eq!(*props.priority(), None);
        assert_eq!(*props.timestamp(), None);
        // the generated id is always present
        assert!(props.message_id().is_some());
    }

    #[test]
    fn transient_delivery_is_explicit() {
        let props = PublishOptions::new().persistent(false).to_properties();

        assert_eq!(*props.delivery_mode(), Some(1));
    }

    #[test]
    fn json_defaults_fill_only_the_unset_options() {
        let opts = json_defaults(PublishOptions::new());

        assert_eq!(opts.content_type.as_deref(), Some(JSON_CONTENT_TYPE));
        assert_eq!(opts.persistent, Some(true));
        assert!(opts.timestamp.is_some());
    }

    #[test]
    fn json_defaults_keep_caller_overrides() {
        let opts = json_defaults(
            PublishOptions::new()
                .content_type("text/plain")
                .persistent(false)
                .timestamp(123),
        );

        assert_eq!(opts.content_type.as_deref(), Some("text/plain"));
        assert_eq!(opts.persistent, Some(false));
        assert_eq!(opts.timestamp, Some(123));
    }
}
