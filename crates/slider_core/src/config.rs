//! Configuração via TOML e notificação de recarga.
//!
//! Um único `config.toml` ao lado do executável. O [`ConfigStore`] guarda a
//! configuração ativa e avisa os interessados a cada recarga bem-sucedida.

use crate::filter::{FilterSettings, NoiseReduction};
use crate::types::{ConnectionParams, InterfaceType, TransportKind};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Erros de leitura/escrita da configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Erro ao parsear {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuração inválida: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Dados de conexão com o dispositivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// IP ou hostname do dispositivo
    pub host: String,
    /// Porta TCP
    pub port: u16,
    /// "tcp" ou "websocket"
    pub transport: TransportKind,
    /// Opções do transporte (ex: `path = "/"` para WebSocket)
    pub options: BTreeMap<String, String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.50".into(),
            port: 8089,
            transport: TransportKind::Tcp,
            options: BTreeMap::new(),
        }
    }
}

/// Configuração raiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderConfig {
    /// "serial" ou "network"
    pub interface_type: InterfaceType,
    /// Inverte todos os sliders (1.0 - valor)
    pub invert_sliders: bool,
    /// "low" | "default" | "high" ou limiar numérico
    pub noise_reduction: NoiseReduction,
    /// Loga cada movimento de slider
    pub verbose: bool,
    /// Timeout de conexão/handshake (ms)
    pub connect_timeout_ms: u64,
    /// Silêncio máximo do dispositivo antes de derrubar a conexão (ms, 0 = sem limite)
    pub idle_timeout_ms: u64,
    /// Capacidade da fila de cada assinante
    pub subscriber_queue: usize,
    /// Quanto tempo esperar um assinante lento antes de descartar o evento (ms)
    pub delivery_timeout_ms: u64,
    /// Dados do dispositivo
    pub connection: ConnectionConfig,
}

impl Default for SliderConfig {
    fn default() -> Self {
        Self {
            interface_type: InterfaceType::Network,
            invert_sliders: false,
            noise_reduction: NoiseReduction::default(),
            verbose: false,
            connect_timeout_ms: 2000,
            idle_timeout_ms: 0,
            subscriber_queue: 64,
            delivery_timeout_ms: 1000,
            connection: ConnectionConfig::default(),
        }
    }
}

impl SliderConfig {
    /// Carrega de um arquivo TOML, caindo para o padrão em caso de erro.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::try_load(path) {
                Ok(config) => return config,
                Err(e) => warn!("{e}"),
            }
        }

        info!("Usando configuração padrão");
        SliderConfig::default()
    }

    /// Carrega e valida um arquivo TOML.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SliderConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        info!("Configuração carregada de {}", path.display());
        Ok(config)
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.interface_type == InterfaceType::Network {
            if self.connection.host.trim().is_empty() {
                errors.push("Host de conexão não pode ser vazio".into());
            }
            if self.connection.port == 0 {
                errors.push("Porta de conexão não pode ser 0".into());
            }
        }
        if let NoiseReduction::Custom(value) = self.noise_reduction {
            if !(0.0..1.0).contains(&value) {
                errors.push(format!("Redução de ruído inválida: {value} (0.0–1.0)"));
            }
        }
        if self.subscriber_queue == 0 {
            errors.push("Fila de assinante precisa de capacidade ≥ 1".into());
        }
        if self.connect_timeout_ms == 0 {
            errors.push("Timeout de conexão não pode ser 0".into());
        }

        errors
    }

    /// Parâmetros de conexão atuais.
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.connection.host.clone(),
            port: self.connection.port,
            transport: self.connection.transport,
            options: self.connection.options.clone(),
        }
    }

    /// Timeout de ociosidade da leitura, se configurado.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    /// Parâmetros do filtro atuais.
    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            invert: self.invert_sliders,
            threshold: self.noise_reduction.threshold(),
        }
    }
}

// ──────────────────────────────────────────────
// Store compartilhado + notificação de mudança
// ──────────────────────────────────────────────

/// Configuração ativa compartilhada entre threads.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<SliderConfig>,
    subscribers: Mutex<Vec<Sender<()>>>,
}

impl ConfigStore {
    pub fn new(config: SliderConfig) -> Self {
        Self {
            current: RwLock::new(config),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Cópia da configuração ativa.
    pub fn snapshot(&self) -> SliderConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lê um campo sem clonar tudo.
    pub fn with<R>(&self, f: impl FnOnce(&SliderConfig) -> R) -> R {
        f(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Canal que recebe `()` após cada recarga.
    ///
    /// Capacidade 1: recargas seguidas antes do consumo viram um só aviso.
    pub fn subscribe_to_changes(&self) -> Receiver<()> {
        let (tx, rx) = bounded(1);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Troca a configuração ativa e notifica os assinantes.
    pub fn replace(&self, config: SliderConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config;
        self.notify();
    }

    /// Recarrega do disco. Em caso de erro mantém a configuração atual.
    pub fn reload_from(&self, path: &Path) -> Result<(), ConfigError> {
        let config = SliderConfig::try_load(path)?;
        self.replace(config);
        Ok(())
    }

    fn notify(&self) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => {
                debug!("Assinante de configuração desconectado, removendo");
                false
            }
        });
    }
}
