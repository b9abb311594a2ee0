//! # Slider Core
//!
//! Crate compartilhada que define o protocolo de linha do mixer, a
//! normalização das leituras, o estado por slider e a configuração TOML.
//!
//! ## Módulos
//! - [`types`] – Eventos de slider e parâmetros de conexão
//! - [`protocol`] – Gramática `f0|f1|...|fn\r\n` e parsing
//! - [`filter`] – Normalização 0.0–1.0, inversão e limiar de ruído
//! - [`tracker`] – Baseline por slider e detecção de contagem
//! - [`config`] – Configuração unificada via TOML + notificação de recarga

pub mod types;
pub mod protocol;
pub mod filter;
pub mod tracker;
pub mod config;

// Re-exports convenientes
pub use types::{ConnectionParams, InterfaceType, SliderMoveEvent, TransportKind};
pub use protocol::{LineError, MAX_RAW_READING, format_line, parse_line};
pub use filter::{FilterSettings, NoiseReduction};
pub use tracker::SliderTracker;
pub use config::{ConfigError, ConfigStore, SliderConfig};
