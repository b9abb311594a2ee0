//! Definição de tipos compartilhados entre o receiver e o emulador.
//!
//! Eventos de slider, parâmetros de conexão e enums de seleção de transporte.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ──────────────────────────────────────────────
// Eventos
// ──────────────────────────────────────────────

/// Um slider mudou de posição de forma significativa.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderMoveEvent {
    /// Índice do slider (0-based, estável durante a sessão)
    pub slider_id: usize,
    /// Valor normalizado (0.0–1.0)
    pub percent_value: f32,
}

impl fmt::Display for SliderMoveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slider {} → {:.2}", self.slider_id, self.percent_value)
    }
}

// ──────────────────────────────────────────────
// Conexão
// ──────────────────────────────────────────────

/// Tipo de interface física com o dispositivo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Serial,
    #[default]
    #[serde(alias = "tcp")]
    Network,
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceType::Serial => f.write_str("serial"),
            InterfaceType::Network => f.write_str("network"),
        }
    }
}

/// Enquadramento usado sobre o socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Linhas cruas terminadas em CRLF direto no TCP
    #[default]
    Tcp,
    /// Uma linha por mensagem WebSocket
    #[serde(alias = "ws")]
    WebSocket,
}

/// Parâmetros capturados no momento da conexão.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub transport: TransportKind,
    /// Opções específicas do transporte (ex: `path` do WebSocket)
    pub options: BTreeMap<String, String>,
}

impl ConnectionParams {
    /// `true` se a mudança exige derrubar e refazer a conexão.
    ///
    /// Mudanças só em `options` não forçam reconexão.
    pub fn differs_from(&self, other: &ConnectionParams) -> bool {
        self.host != other.host || self.port != other.port || self.transport != other.transport
    }

    /// Endereço `host:port`, com colchetes para IPv6.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(host: &str, port: u16) -> ConnectionParams {
        ConnectionParams {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    #[test]
    fn host_or_port_change_is_a_difference() {
        let base = params("192.168.0.10", 8089);
        assert!(!base.differs_from(&base.clone()));
        assert!(base.differs_from(&params("192.168.0.11", 8089)));
        assert!(base.differs_from(&params("192.168.0.10", 8090)));
    }

    #[test]
    fn options_alone_do_not_force_reconnect() {
        let base = params("10.0.0.2", 8089);
        let mut other = base.clone();
        other.options.insert("path".into(), "/sliders".into());
        assert!(!base.differs_from(&other));
    }

    #[test]
    fn ipv6_address_is_bracketed() {
        assert_eq!(params("::1", 80).address(), "[::1]:80");
        assert_eq!(params("localhost", 80).address(), "localhost:80");
    }
}
