// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Message Envelope Codec
//!
//! This module decodes raw message bodies into structured data and defines
//! the two envelope shapes carried over the JSON work queue: tasks
//! (`tipo`/`dados`) and events (`evento`/`payload`). Anything else is
//! treated as a generic user object.
//!
//! Decoded objects can be enriched with a `_metadata` field carrying the
//! broker-side message attributes (delivery tag, redelivery flag, content
//! type, timestamp, priority).

use crate::errors::AmqpError;
use chrono::{SecondsFormat, Utc};
use lapin::{message::Delivery, BasicProperties};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// A unit of background work, identified by its `tipo` discriminator.
///
/// `dados` is a free-form payload; `criado_em` is an ISO-8601 creation
/// timestamp. All fields but `tipo` are tolerated missing on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub tipo: String,
    #[serde(default)]
    pub dados: Value,
    #[serde(default)]
    pub criado_em: String,
    #[serde(default)]
    pub id: String,
}

impl Task {
    /// Wraps a payload in a new task envelope with a fresh id and the
    /// current timestamp.
    pub fn new(tipo: &str, dados: Value) -> Task {
        Task {
            tipo: tipo.to_owned(),
            dados,
            criado_em: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            id: format!("task_{}", Uuid::new_v4()),
        }
    }
}

/// A broadcast-style notification, identified by its `evento` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub evento: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub id: String,
}

impl Event {
    /// Wraps a payload in a new event envelope with a fresh id and the
    /// current timestamp.
    pub fn new(evento: &str, payload: Value) -> Event {
        Event {
            evento: evento.to_owned(),
            payload,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            id: format!("event_{}", Uuid::new_v4()),
        }
    }
}

/// The recognized top-level shapes of a decoded JSON body.
///
/// A body carrying a `tipo` key is a [`Task`], one carrying `evento` is an
/// [`Event`]. Everything else degrades to `Generic`, never to an error,
/// including bodies whose discriminator key is present but malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Task(Task),
    Event(Event),
    Generic(Value),
}

impl Inbound {
    /// Probes the discriminator keys and classifies a decoded body.
    pub fn classify(value: Value) -> Inbound {
        if value.get("tipo").is_some() {
            if let Ok(task) = serde_json::from_value::<Task>(value.clone()) {
                return Inbound::Task(task);
            }
        } else if value.get("evento").is_some() {
            if let Ok(event) = serde_json::from_value::<Event>(value.clone()) {
                return Inbound::Event(event);
            }
        }

        Inbound::Generic(value)
    }
}

/// Decodes a raw message body as JSON.
///
/// # Returns
/// The decoded value, or [`AmqpError::ParsePayloadError`] when the body is
/// not well-formed JSON. Consume-side callers log and skip the message;
/// one malformed body must never abort the consume loop.
pub fn decode_json(body: &[u8]) -> Result<Value, AmqpError> {
    serde_json::from_slice(body).map_err(|_| AmqpError::ParsePayloadError)
}

/// Merges a `_metadata` field into a decoded body.
///
/// The metadata carries the delivery tag, redelivery flag, content type,
/// timestamp and priority read from the message properties. Non-object
/// values are left untouched.
pub fn attach_metadata(value: &mut Value, delivery: &Delivery) {
    merge_metadata(
        value,
        metadata_from(
            &delivery.properties,
            delivery.delivery_tag,
            delivery.redelivered,
        ),
    );
}

fn metadata_from(props: &BasicProperties, delivery_tag: u64, redelivered: bool) -> Value {
    json!({
        "delivery_tag": delivery_tag,
        "redelivered": redelivered,
        "content_type": props.content_type().as_ref().map(|v| v.as_str()),
        "timestamp": props.timestamp(),
        "priority": props.priority(),
    })
}

fn merge_metadata(value: &mut Value, metadata: Value) {
    if let Some(map) = value.as_object_mut() {
        map.insert("_metadata".to_owned(), metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use lapin::types::ShortString;

    #[test]
    fn decode_json_round_trips_non_ascii_text() {
        let value = decode_json(r#"{"k": "promoção de verão à noite"}"#.as_bytes()).unwrap();

        assert_eq!(value["k"], "promoção de verão à noite");

        // re-encoding keeps the characters verbatim instead of \u-escaping
        let encoded = serde_json::to_string(&value).unwrap();
        assert!(encoded.contains("promoção de verão à noite"));
    }

    #[test]
    fn decode_json_rejects_malformed_bodies() {
        let err = decode_json(b"{\"tipo\": ").unwrap_err();

        assert_eq!(err, AmqpError::ParsePayloadError);
    }

    #[test]
    fn classify_recognizes_tasks() {
        let value = json!({
            "tipo": "enviar_email",
            "dados": {"destinatario": "ana@example.com", "assunto": "Bem-vindo!"},
            "criado_em": "2025-01-10T12:00:00Z",
            "id": "task_1"
        });

        let Inbound::Task(task) = Inbound::classify(value) else {
            panic!("expected a task");
        };
        assert_eq!(task.tipo, "enviar_email");
        assert_eq!(task.dados["destinatario"], "ana@example.com");
        assert_eq!(task.dados["assunto"], "Bem-vindo!");
    }

    #[test]
    fn classify_tolerates_missing_optional_task_fields() {
        let value = json!({"tipo": "gerar_relatorio"});

        let Inbound::Task(task) = Inbound::classify(value) else {
            panic!("expected a task");
        };
        assert_eq!(task.tipo, "gerar_relatorio");
        assert!(task.dados.is_null());
        assert!(task.id.is_empty());
    }

    #[test]
    fn classify_recognizes_events() {
        let value = json!({"evento": "pedido.criado", "payload": {"pedido_id": 42}});

        let Inbound::Event(event) = Inbound::classify(value) else {
            panic!("expected an event");
        };
        assert_eq!(event.evento, "pedido.criado");
        assert_eq!(event.payload["pedido_id"], 42);
    }

    #[test]
    fn classify_falls_back_to_generic() {
        // no discriminator at all
        assert!(matches!(
            Inbound::classify(json!({"mensagem": "oi"})),
            Inbound::Generic(_)
        ));

        // discriminator present but not a string
        assert!(matches!(
            Inbound::classify(json!({"tipo": 5})),
            Inbound::Generic(_)
        ));

        // non-object body
        assert!(matches!(
            Inbound::classify(json!("texto solto")),
            Inbound::Generic(_)
        ));
    }

    #[test]
    fn task_envelopes_carry_fresh_ids_and_timestamps() {
        let task = Task::new("processar_pedido", json!({"pedido_id": 42}));

        assert!(task.id.starts_with("task_"));
        assert!(DateTime::parse_from_rfc3339(&task.criado_em).is_ok());
        assert_eq!(task.dados["pedido_id"], 42);

        let event = Event::new("pedido.criado", json!({"pedido_id": 42}));
        assert!(event.id.starts_with("event_"));
        assert!(DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }

    #[test]
    fn metadata_reflects_the_message_properties() {
        let props = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_timestamp(1_700_000_000)
            .with_priority(8);

        let metadata = metadata_from(&props, 7, true);

        assert_eq!(metadata["delivery_tag"], 7);
        assert_eq!(metadata["redelivered"], true);
        assert_eq!(metadata["content_type"], "application/json");
        assert_eq!(metadata["timestamp"], 1_700_000_000u64);
        assert_eq!(metadata["priority"], 8);
    }

    #[test]
    fn metadata_fields_are_null_when_properties_are_unset() {
        let metadata = metadata_from(&BasicProperties::default(), 1, false);

        assert!(metadata["content_type"].is_null());
        assert!(metadata["timestamp"].is_null());
        assert!(metadata["priority"].is_null());
    }

    #[test]
    fn merge_metadata_only_touches_objects() {
        let mut body = json!({"tipo": "enviar_email"});
        merge_metadata(&mut body, json!({"delivery_tag": 1}));
        assert_eq!(body["_metadata"]["delivery_tag"], 1);

        let mut scalar = json!("texto solto");
        merge_metadata(&mut scalar, json!({"delivery_tag": 1}));
        assert_eq!(scalar, json!("texto solto"));
    }
}
