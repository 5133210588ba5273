// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! # Task and Event Router
//!
//! This module routes decoded messages to named handlers based on their
//! discriminator field. Discriminators are modeled as tagged unions with an
//! explicit carrier variant for unrecognized values, so routing is an
//! exhaustive match and the fallback path is visible in the type instead of
//! hidden in a runtime default branch.
//!
//! An unknown `tipo` is logged as a warning and processed by the generic
//! handler; it is never fatal.

use crate::{
    consumer::JsonHandler,
    envelope::{Inbound, Task},
    errors::AmqpError,
};
use async_trait::async_trait;
use lapin::message::Delivery;
use serde_json::Value;
use std::{fmt, sync::Arc};
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// The task types this system knows how to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    EnviarEmail,
    ProcessarPedido,
    GerarRelatorio,
    ProcessarImagem,
    /// Any other `tipo` value, carried verbatim.
    Unknown(String),
}

impl From<&str> for TaskKind {
    fn from(tipo: &str) -> TaskKind {
        match tipo {
            "enviar_email" => TaskKind::EnviarEmail,
            "processar_pedido" => TaskKind::ProcessarPedido,
            "gerar_relatorio" => TaskKind::GerarRelatorio,
            "processar_imagem" => TaskKind::ProcessarImagem,
            other => TaskKind::Unknown(other.to_owned()),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::EnviarEmail => write!(f, "enviar_email"),
            TaskKind::ProcessarPedido => write!(f, "processar_pedido"),
            TaskKind::GerarRelatorio => write!(f, "gerar_relatorio"),
            TaskKind::ProcessarImagem => write!(f, "processar_imagem"),
            TaskKind::Unknown(tipo) => write!(f, "{}", tipo),
        }
    }
}

/// The event names this system knows about.
///
/// Unlike tasks, events share one handler; the kind exists so that handler
/// can match on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PedidoCriado,
    UsuarioCadastrado,
    PagamentoAprovado,
    /// Any other `evento` value, carried verbatim.
    Outro(String),
}

impl From<&str> for EventKind {
    fn from(evento: &str) -> EventKind {
        match evento {
            "pedido.criado" => EventKind::PedidoCriado,
            "usuario.cadastrado" => EventKind::UsuarioCadastrado,
            "pagamento.aprovado" => EventKind::PagamentoAprovado,
            other => EventKind::Outro(other.to_owned()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::PedidoCriado => write!(f, "pedido.criado"),
            EventKind::UsuarioCadastrado => write!(f, "usuario.cadastrado"),
            EventKind::PagamentoAprovado => write!(f, "pagamento.aprovado"),
            EventKind::Outro(evento) => write!(f, "{}", evento),
        }
    }
}

/// Handler for a routed message.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, inbound: &Inbound) -> Result<(), AmqpError>;
}

/// Default handler that only logs what it received.
pub struct LogHandler;

#[async_trait]
impl ConsumerHandler for LogHandler {
    async fn exec(&self, inbound: &Inbound) -> Result<(), AmqpError> {
        debug!(?inbound, "no handler registered, logging only");
        Ok(())
    }
}

/// Which handler a message was routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    EnviarEmail,
    ProcessarPedido,
    GerarRelatorio,
    ProcessarImagem,
    Evento,
    Generico,
}

/// Routes classified messages to their handlers.
///
/// Every slot starts out as a [`LogHandler`]; register the real handlers
/// with the builder methods. The dispatcher implements
/// [`JsonHandler`], so it plugs directly into
/// [`consume_json`](crate::consumer::consume_json).
pub struct Dispatcher {
    enviar_email: Arc<dyn ConsumerHandler>,
    processar_pedido: Arc<dyn ConsumerHandler>,
    gerar_relatorio: Arc<dyn ConsumerHandler>,
    processar_imagem: Arc<dyn ConsumerHandler>,
    evento: Arc<dyn ConsumerHandler>,
    generico: Arc<dyn ConsumerHandler>,
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        let fallback: Arc<dyn ConsumerHandler> = Arc::new(LogHandler);

        Dispatcher {
            enviar_email: fallback.clone(),
            processar_pedido: fallback.clone(),
            gerar_relatorio: fallback.clone(),
            processar_imagem: fallback.clone(),
            evento: fallback.clone(),
            generico: fallback,
        }
    }

    pub fn with_enviar_email(mut self, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.enviar_email = handler;
        self
    }

    pub fn with_processar_pedido(mut self, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.processar_pedido = handler;
        self
    }

    pub fn with_gerar_relatorio(mut self, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.gerar_relatorio = handler;
        self
    }

    pub fn with_processar_imagem(mut self, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.processar_imagem = handler;
        self
    }

    pub fn with_evento(mut self, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.evento = handler;
        self
    }

    pub fn with_generico(mut self, handler: Arc<dyn ConsumerHandler>) -> Self {
        self.generico = handler;
        self
    }

    /// Routes a classified message and reports where it went.
    pub async fn dispatch(&self, inbound: &Inbound) -> Result<Route, AmqpError> {
        match inbound {
            Inbound::Task(task) => self.dispatch_task(task, inbound).await,
            Inbound::Event(event) => {
                debug!(evento = event.evento.as_str(), "processing event");
                self.evento.exec(inbound).await?;
                Ok(Route::Evento)
            }
            Inbound::Generic(_) => {
                self.generico.exec(inbound).await?;
                Ok(Route::Generico)
            }
        }
    }

    async fn dispatch_task(&self, task: &Task, inbound: &Inbound) -> Result<Route, AmqpError> {
        debug!(tipo = task.tipo.as_str(), "processing task");

        match TaskKind::from(task.tipo.as_str()) {
            TaskKind::EnviarEmail => {
                self.enviar_email.exec(inbound).await?;
                Ok(Route::EnviarEmail)
            }
            TaskKind::ProcessarPedido => {
                self.processar_pedido.exec(inbound).await?;
                Ok(Route::ProcessarPedido)
            }
            TaskKind::GerarRelatorio => {
                self.gerar_relatorio.exec(inbound).await?;
                Ok(Route::GerarRelatorio)
            }
            TaskKind::ProcessarImagem => {
                self.processar_imagem.exec(inbound).await?;
                Ok(Route::ProcessarImagem)
            }
            TaskKind::Unknown(tipo) => {
                warn!(tipo = tipo.as_str(), "unknown task type, taking the generic path");
                self.generico.exec(inbound).await?;
                Ok(Route::Generico)
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Dispatcher {
        Dispatcher::new()
    }
}

#[async_trait]
impl JsonHandler for Dispatcher {
    async fn exec(&self, data: Value, _delivery: &Delivery) -> Result<(), AmqpError> {
        let inbound = Inbound::classify(data);
        self.dispatch(&inbound).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Event;
    use serde_json::json;

    fn never() -> Arc<dyn ConsumerHandler> {
        let mut handler = MockConsumerHandler::new();
        handler.expect_exec().never();
        Arc::new(handler)
    }

    #[test]
    fn task_kinds_cover_the_known_discriminators() {
        assert_eq!(TaskKind::from("enviar_email"), TaskKind::EnviarEmail);
        assert_eq!(TaskKind::from("processar_pedido"), TaskKind::ProcessarPedido);
        assert_eq!(TaskKind::from("gerar_relatorio"), TaskKind::GerarRelatorio);
        assert_eq!(TaskKind::from("processar_imagem"), TaskKind::ProcessarImagem);
        assert_eq!(
            TaskKind::from("reindexar"),
            TaskKind::Unknown("reindexar".to_owned())
        );
        assert_eq!(TaskKind::from("reindexar").to_string(), "reindexar");
    }

    #[test]
    fn event_kinds_cover_the_known_names() {
        assert_eq!(EventKind::from("pedido.criado"), EventKind::PedidoCriado);
        assert_eq!(
            EventKind::from("usuario.cadastrado"),
            EventKind::UsuarioCadastrado
        );
        assert_eq!(
            EventKind::from("pagamento.aprovado"),
            EventKind::PagamentoAprovado
        );
        assert_eq!(
            EventKind::from("estoque.baixo"),
            EventKind::Outro("estoque.baixo".to_owned())
        );
    }

    #[tokio::test]
    async fn order_tasks_route_to_the_order_handler_only() {
        let mut pedido = MockConsumerHandler::new();
        pedido
            .expect_exec()
            .times(1)
            .withf(|inbound| {
                let Inbound::Task(task) = inbound else { return false };
                task.tipo == "processar_pedido" && task.dados["pedido_id"] == 42
            })
            .returning(|_| Ok(()));

        let dispatcher = Dispatcher::new()
            .with_processar_pedido(Arc::new(pedido))
            .with_evento(never())
            .with_generico(never());

        let task = Task::new(
            "processar_pedido",
            json!({"pedido_id": 42, "cliente": {"nome": "Ana"}, "total": 10.5}),
        );
        let route = dispatcher.dispatch(&Inbound::Task(task)).await.unwrap();

        assert_eq!(route, Route::ProcessarPedido);
    }

    #[tokio::test]
    async fn unknown_task_types_take_the_generic_path() {
        let mut generico = MockConsumerHandler::new();
        generico.expect_exec().times(1).returning(|_| Ok(()));

        let dispatcher = Dispatcher::new()
            .with_enviar_email(never())
            .with_processar_pedido(never())
            .with_generico(Arc::new(generico));

        let task = Task::new("reindexar", json!({}));
        let route = dispatcher.dispatch(&Inbound::Task(task)).await.unwrap();

        assert_eq!(route, Route::Generico);
    }

    #[tokio::test]
    async fn events_route_to_the_event_handler() {
        let mut evento = MockConsumerHandler::new();
        evento.expect_exec().times(1).returning(|_| Ok(()));

        let dispatcher = Dispatcher::new()
            .with_evento(Arc::new(evento))
            .with_generico(never());

        let event = Event::new("pedido.criado", json!({"pedido_id": 42}));
        let route = dispatcher.dispatch(&Inbound::Event(event)).await.unwrap();

        assert_eq!(route, Route::Evento);
    }

    #[tokio::test]
    async fn generic_bodies_route_to_the_generic_handler() {
        let mut generico = MockConsumerHandler::new();
        generico.expect_exec().times(1).returning(|_| Ok(()));

        let dispatcher = Dispatcher::new().with_generico(Arc::new(generico));

        let route = dispatcher
            .dispatch(&Inbound::Generic(json!({"mensagem": "oi"})))
            .await
            .unwrap();

        assert_eq!(route, Route::Generico);
    }

    #[tokio::test]
    async fn handler_errors_propagate_to_the_caller() {
        let mut email = MockConsumerHandler::new();
        email
            .expect_exec()
            .times(1)
            .returning(|_| Err(AmqpError::ConsumerError("smtp indisponível".to_owned())));

        let dispatcher = Dispatcher::new().with_enviar_email(Arc::new(email));

        let task = Task::new("enviar_email", json!({}));
        let err = dispatcher.dispatch(&Inbound::Task(task)).await.unwrap_err();

        assert_eq!(
            err,
            AmqpError::ConsumerError("smtp indisponível".to_owned())
        );
    }
}
