//! I/O de rede com o mixer.
//!
//! Um único mutex guarda estado da conexão, parâmetros capturados, geração
//! e baseline dos sliders. A thread de leitura e o supervisor de reconexão
//! passam sempre por ele. Cada conexão tem uma geração: uma thread de
//! leitura antiga nunca altera o estado de uma conexão mais nova.

use crate::dispatch::Dispatcher;
use crate::io::{IoError, SliderIo};
use crate::supervisor;
use crate::transport::{Link, LinkCloser, LinkTimeouts, TransportSignal};
use crossbeam_channel::{Receiver, Sender, bounded};
use slider_core::config::ConfigStore;
use slider_core::tracker::SliderTracker;
use slider_core::types::{ConnectionParams, SliderMoveEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pausa para a conexão fechar / o mapeamento externo recarregar.
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Estado da conexão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct Session {
    state: ConnectionState,
    params: Option<ConnectionParams>,
    generation: u64,
    closer: Option<LinkCloser>,
    tracker: SliderTracker,
}

/// Conexão + processamento de linhas, compartilhado com as threads.
pub struct Connector {
    config: Arc<ConfigStore>,
    session: Mutex<Session>,
    dispatcher: Dispatcher,
}

impl Connector {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        let (queue, timeout) = config.with(|c| {
            (
                c.subscriber_queue,
                Duration::from_millis(c.delivery_timeout_ms),
            )
        });

        Self {
            config,
            session: Mutex::new(Session {
                state: ConnectionState::Disconnected,
                params: None,
                generation: 0,
                closer: None,
                tracker: SliderTracker::new(),
            }),
            dispatcher: Dispatcher::new(queue, timeout),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.session().state
    }

    /// Parâmetros capturados no último `start`.
    pub fn captured_params(&self) -> Option<ConnectionParams> {
        self.session().params.clone()
    }

    pub fn subscribe(&self) -> Receiver<SliderMoveEvent> {
        self.dispatcher.subscribe()
    }

    /// Tenta conectar com os parâmetros atuais da configuração.
    pub fn start(self: &Arc<Self>) -> Result<(), IoError> {
        let (params, timeouts) = self.config.with(|c| {
            let timeouts = LinkTimeouts {
                connect: Duration::from_millis(c.connect_timeout_ms),
                idle: c.idle_timeout(),
            };
            (c.connection_params(), timeouts)
        });

        let generation = {
            let mut session = self.session();
            if session.state != ConnectionState::Disconnected {
                warn!("Já conectado, não é possível iniciar outra conexão sem fechar a atual");
                return Err(IoError::AlreadyActive);
            }
            session.state = ConnectionState::Connecting;
            session.params = Some(params.clone());
            session.tracker = SliderTracker::new();
            session.generation += 1;
            session.generation
        };

        let addr = params.address();
        debug!("Tentando conexão de rede com {addr}");

        let (link, closer) = match Link::connect(&params, timeouts)
            .and_then(|link| link.closer().map(|closer| (link, closer)))
        {
            Ok(pair) => pair,
            Err(source) => {
                warn!("Falha ao abrir conexão de rede com {addr}: {source}");
                self.teardown(generation);
                return Err(IoError::Connect { addr, source });
            }
        };

        {
            let mut session = self.session();
            session.state = ConnectionState::Connected;
            session.closer = Some(closer);
        }

        let connector = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name(format!("slider-link-{generation}"))
            .spawn(move || connector.read_loop(generation, link));
        if let Err(e) = spawned {
            self.teardown(generation);
            return Err(IoError::Spawn(e));
        }

        info!("Conectado em {addr} ({:?})", params.transport);
        Ok(())
    }

    /// Fecha a conexão ativa. Sem conexão, não faz nada.
    pub fn stop(&self) {
        let mut session = self.session();
        if session.state != ConnectionState::Connected {
            debug!("Não conectado, nada para parar");
            return;
        }

        debug!("Encerrando conexão de rede");
        session.generation += 1;
        session.state = ConnectionState::Disconnected;
        if let Some(closer) = session.closer.take() {
            closer.close();
        }
    }

    #[cfg(test)]
    pub fn slider_count(&self) -> usize {
        self.session().tracker.slider_count()
    }

    /// Esquece a contagem de sliders: a próxima linha reemite tudo.
    pub fn reset_slider_count(&self) {
        self.session().tracker.reset_count();
        debug!("Contagem de sliders zerada");
    }

    fn read_loop(&self, generation: u64, mut link: Link) {
        loop {
            match link.next_signal() {
                TransportSignal::Message(payload) => {
                    if !self.handle_line(generation, &payload) {
                        debug!("Conexão {generation} substituída, encerrando leitura");
                        return;
                    }
                }
                TransportSignal::Disconnected => {
                    if self.teardown(generation) {
                        info!("Dispositivo desconectou");
                    }
                    return;
                }
                TransportSignal::Error(e) => {
                    if self.teardown(generation) && self.config.with(|c| c.verbose) {
                        warn!("Erro no socket: {e}");
                    } else {
                        debug!("Erro no socket: {e}");
                    }
                    return;
                }
            }
        }
    }

    /// Processa uma linha. Retorna `false` se a conexão não é mais a atual.
    fn handle_line(&self, generation: u64, payload: &str) -> bool {
        let (settings, verbose) = self.config.with(|c| (c.filter_settings(), c.verbose));

        let events = {
            let mut session = self.session();
            if session.generation != generation || session.state != ConnectionState::Connected {
                return false;
            }
            match session.tracker.process_line(payload, &settings) {
                Ok(events) => events,
                Err(_) => return true,
            }
        };

        if verbose {
            for event in &events {
                debug!("Slider moveu: {event}");
            }
        }

        // Fora do lock: um assinante lento não trava o supervisor
        self.dispatcher.dispatch(&events);
        true
    }

    /// Volta para `Disconnected` se `generation` ainda é a atual.
    fn teardown(&self, generation: u64) -> bool {
        let mut session = self.session();
        if session.generation != generation {
            return false;
        }
        session.state = ConnectionState::Disconnected;
        if let Some(closer) = session.closer.take() {
            closer.close();
        }
        true
    }
}

// ──────────────────────────────────────────────
// Handle público
// ──────────────────────────────────────────────

/// Implementação de [`SliderIo`] sobre TCP/WebSocket.
///
/// Cria o supervisor de reconexão junto; ao ser destruída cancela o
/// supervisor (e seus timers pendentes) e fecha a conexão.
pub struct NetworkIo {
    connector: Arc<Connector>,
    shutdown: Option<Sender<()>>,
    supervisor: Option<JoinHandle<()>>,
}

impl NetworkIo {
    pub fn new(config: Arc<ConfigStore>) -> Result<Self, IoError> {
        let changes = config.subscribe_to_changes();
        let connector = Arc::new(Connector::new(config));

        let (shutdown_tx, shutdown_rx) = bounded(0);
        let supervisor = supervisor::spawn(Arc::clone(&connector), changes, shutdown_rx, SETTLE_DELAY)
            .map_err(IoError::Spawn)?;

        debug!("Instância de I/O de rede criada");
        Ok(Self {
            connector,
            shutdown: Some(shutdown_tx),
            supervisor: Some(supervisor),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.connector.state()
    }
}

impl SliderIo for NetworkIo {
    fn start(&self) -> Result<(), IoError> {
        self.connector.start()
    }

    fn stop(&self) {
        self.connector.stop();
    }

    fn subscribe_to_slider_move_events(&self) -> Receiver<SliderMoveEvent> {
        self.connector.subscribe()
    }
}

impl Drop for NetworkIo {
    fn drop(&mut self) {
        // Fechar o canal cancela o supervisor
        drop(self.shutdown.take());
        if let Some(handle) = self.supervisor.take() {
            if handle.join().is_err() {
                warn!("Supervisor de reconexão terminou com pânico");
            }
        }
        self.connector.stop();
    }
}
