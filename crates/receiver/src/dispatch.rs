//! Fan-out de eventos de slider para todos os assinantes.
//!
//! Cada assinante tem sua própria fila limitada. Se a fila está cheia, a
//! entrega espera até `delivery_timeout` e então descarta o evento só para
//! aquele assinante, sem travar a ingestão indefinidamente.
//!
//! Entregas são serializadas: a thread de leitura de uma conexão antiga,
//! ainda presa num assinante lento, termina seu lote antes que a conexão
//! nova entregue qualquer evento.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use slider_core::types::SliderMoveEvent;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Registro (só cresce) de assinantes de eventos.
#[derive(Debug)]
pub struct Dispatcher {
    consumers: Mutex<Vec<Sender<SliderMoveEvent>>>,
    /// Segurado durante todo o fan-out de um lote
    delivery: Mutex<()>,
    queue_capacity: usize,
    delivery_timeout: Duration,
}

impl Dispatcher {
    pub fn new(queue_capacity: usize, delivery_timeout: Duration) -> Self {
        Self {
            consumers: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
            queue_capacity: queue_capacity.max(1),
            delivery_timeout,
        }
    }

    /// Registra um novo assinante e devolve a ponta de leitura.
    pub fn subscribe(&self) -> Receiver<SliderMoveEvent> {
        let (tx, rx) = bounded(self.queue_capacity);
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Entrega os eventos de uma linha, em ordem, a cada assinante na
    /// ordem de registro.
    pub fn dispatch(&self, events: &[SliderMoveEvent]) {
        if events.is_empty() {
            return;
        }

        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);

        // Clona a lista: `subscribe` não espera entregas lentas
        let consumers = self
            .consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, consumer) in consumers.iter().enumerate() {
            for &event in events {
                match consumer.send_timeout(event, self.delivery_timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(event)) => {
                        warn!("Assinante {index} lento, descartando evento ({event})");
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {
                        debug!("Assinante {index} desconectado, ignorando");
                        break;
                    }
                }
            }
        }
    }
}
