//! Interface comum de I/O com o mixer e fábrica por tipo de interface.

use crate::network::NetworkIo;
use crate::transport::TransportError;
use crossbeam_channel::Receiver;
use slider_core::config::ConfigStore;
use slider_core::types::{InterfaceType, SliderMoveEvent};
use std::sync::Arc;
use tracing::debug;

/// Erros de controle da conexão.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("Conexão já ativa")]
    AlreadyActive,

    #[error("Falha ao abrir conexão com {addr}: {source}")]
    Connect {
        addr: String,
        source: TransportError,
    },

    #[error("Tipo de interface não suportado: {0}")]
    UnsupportedInterface(InterfaceType),

    #[error("Falha ao criar thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Capacidade exposta por qualquer transporte de sliders.
pub trait SliderIo: Send {
    /// Conecta ao dispositivo. Erro se já houver conexão ativa.
    fn start(&self) -> Result<(), IoError>;

    /// Fecha a conexão ativa, se houver.
    fn stop(&self);

    /// Nova fila que recebe todos os eventos a partir de agora.
    fn subscribe_to_slider_move_events(&self) -> Receiver<SliderMoveEvent>;
}

/// Cria a implementação de I/O escolhida em `interface_type`.
pub fn new_io(config: Arc<ConfigStore>) -> Result<Box<dyn SliderIo>, IoError> {
    let interface = config.with(|c| c.interface_type);
    debug!("Criando I/O para interface {interface}");

    match interface {
        InterfaceType::Network => Ok(Box::new(NetworkIo::new(config)?)),
        InterfaceType::Serial => Err(IoError::UnsupportedInterface(interface)),
    }
}
