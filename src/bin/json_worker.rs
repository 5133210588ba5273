// Copyright (c) 2025, The Mensageria Authors
// MIT License
// All rights reserved.

//! Work-queue worker for JSON-structured messages.
//!
//! Takes an optional worker type as its first argument (used only in the
//! worker name) and consumes the configured work queue indefinitely. Each
//! decoded message is printed, classified and routed to a handler by its
//! discriminator; handler bodies simulate work with fixed delays.

use async_trait::async_trait;
use lapin::message::Delivery;
use mensageria::{
    channel::{new_amqp_channel, shutdown},
    configs::Configs,
    consumer::{consume_json, ConsumeOptions, JsonHandler},
    dispatcher::{ConsumerHandler, Dispatcher, EventKind},
    envelope::Inbound,
    errors::AmqpError,
    queue::QueueDefinition,
    topology::declare_queue,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use uuid::Uuid;

struct EmailHandler;

#[async_trait]
impl ConsumerHandler for EmailHandler {
    async fn exec(&self, inbound: &Inbound) -> Result<(), AmqpError> {
        let Inbound::Task(task) = inbound else { return Ok(()) };

        info!("enviando email para: {}", task.dados["destinatario"]);
        info!("assunto: {}", task.dados["assunto"]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        info!("email enviado!");
        Ok(())
    }
}

struct PedidoHandler;

#[async_trait]
impl ConsumerHandler for PedidoHandler {
    async fn exec(&self, inbound: &Inbound) -> Result<(), AmqpError> {
        let Inbound::Task(task) = inbound else { return Ok(()) };

        info!("processando pedido #{}", task.dados["pedido_id"]);
        info!("cliente: {}", task.dados["cliente"]["nome"]);
        info!("total: R$ {}", task.dados["total"]);
        tokio::time::sleep(Duration::from_secs(2)).await;
        info!("pedido processado!");
        Ok(())
    }
}

struct RelatorioHandler;

#[async_trait]
impl ConsumerHandler for RelatorioHandler {
    async fn exec(&self, inbound: &Inbound) -> Result<(), AmqpError> {
        let Inbound::Task(task) = inbound else { return Ok(()) };

        info!("gerando relatório: {}", task.dados["tipo"]);
        info!("período: {}", task.dados["periodo"]);
        tokio::time::sleep(Duration::from_secs(2)).await;
        info!("relatório gerado!");
        Ok(())
    }
}

struct ImagemHandler;

#[async_trait]
impl ConsumerHandler for ImagemHandler {
    async fn exec(&self, inbound: &Inbound) -> Result<(), AmqpError> {
        let Inbound::Task(task) = inbound else { return Ok(()) };

        info!("processando imagem: {}", task.dados["arquivo"]);
        info!("operação: {}", task.dados["operacao"]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        info!("imagem processada!");
        Ok(())
    }
}

struct EventoHandler;

#[async_trait]
impl ConsumerHandler for EventoHandler {
    async fn exec(&self, inbound: &Inbound) -> Result<(), AmqpError> {
        let Inbound::Event(event) = inbound else { return Ok(()) };

        match EventKind::from(event.evento.as_str()) {
            EventKind::PedidoCriado => {
                info!("novo pedido criado!");
                info!("pedido: #{}", event.payload["pedido_id"]);
                info!("cliente: {}", event.payload["cliente"]);
            }
            EventKind::UsuarioCadastrado => {
                info!("novo usuário cadastrado!");
                info!("nome: {}", event.payload["nome"]);
                info!("email: {}", event.payload["email"]);
            }
            EventKind::PagamentoAprovado => {
                info!("pagamento aprovado!");
                info!("valor: R$ {}", event.payload["valor"]);
            }
            EventKind::Outro(evento) => info!("evento: {}", evento),
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        info!("evento processado!");
        Ok(())
    }
}

struct GenericoHandler;

#[async_trait]
impl ConsumerHandler for GenericoHandler {
    async fn exec(&self, _inbound: &Inbound) -> Result<(), AmqpError> {
        info!("processando dados genéricos...");
        tokio::time::sleep(Duration::from_secs(1)).await;
        info!("processado!");
        Ok(())
    }
}

/// Prints every decoded message before handing it to the dispatcher, and
/// the route it took afterwards.
struct WorkerHandler {
    worker_name: String,
    dispatcher: Dispatcher,
}

#[async_trait]
impl JsonHandler for WorkerHandler {
    async fn exec(&self, data: Value, _delivery: &Delivery) -> Result<(), AmqpError> {
        info!("[{}] nova mensagem recebida!", self.worker_name);
        info!(
            "dados:\n{}",
            serde_json::to_string_pretty(&data).unwrap_or_default()
        );

        let inbound = Inbound::classify(data);
        match self.dispatcher.dispatch(&inbound).await {
            Ok(route) => info!("[{}] despachado para: {:?}", self.worker_name, route),
            Err(err) => warn!("[{}] falha no handler: {}", self.worker_name, err),
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), AmqpError> {
    tracing_subscriber::fmt().with_target(false).init();

    let tipo = std::env::args().nth(1).unwrap_or_else(|| "geral".to_owned());
    let worker_name = format!("JsonWorker-{}-{}", tipo, Uuid::new_v4().simple());
    let cfg = Configs::from_env();

    info!("iniciando {}...", worker_name);
    let (conn, channel) = new_amqp_channel(&cfg).await?;
    declare_queue(&channel, &QueueDefinition::new(&cfg.queue).durable()).await?;

    let dispatcher = Dispatcher::new()
        .with_enviar_email(Arc::new(EmailHandler))
        .with_processar_pedido(Arc::new(PedidoHandler))
        .with_gerar_relatorio(Arc::new(RelatorioHandler))
        .with_processar_imagem(Arc::new(ImagemHandler))
        .with_evento(Arc::new(EventoHandler))
        .with_generico(Arc::new(GenericoHandler));
    let handler = WorkerHandler {
        worker_name,
        dispatcher,
    };

    let consume_opts = ConsumeOptions::default();
    tokio::select! {
        result = consume_json(&channel, &cfg.queue, &consume_opts, &handler) => result?,
        _ = tokio::signal::ctrl_c() => info!("encerrando worker"),
    }

    shutdown(&channel, &conn).await;
    Ok(())
}
