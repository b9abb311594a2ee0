//! Supervisor de reconexão.
//!
//! Reage a recargas de configuração:
//! - Agenda, após `settle_delay`, o reset da contagem de sliders, para que
//!   o mapeamento externo termine de recarregar antes de receber eventos.
//! - Se host/porta/transporte mudaram, fecha a conexão agora e agenda
//!   uma nova tentativa após `settle_delay`.
//!
//! Os timers vivem dentro do loop do supervisor: fechar o canal de
//! shutdown cancela tudo que estiver pendente.

use crate::network::Connector;
use crossbeam_channel::{Receiver, after, never, select};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct Supervisor {
    connector: Arc<Connector>,
    changes: Receiver<()>,
    shutdown: Receiver<()>,
    settle_delay: Duration,
    pending_reset: Option<Instant>,
    pending_restart: Option<Instant>,
}

/// Inicia a thread do supervisor.
///
/// Termina quando o lado de envio de `shutdown` é descartado.
pub fn spawn(
    connector: Arc<Connector>,
    changes: Receiver<()>,
    shutdown: Receiver<()>,
    settle_delay: Duration,
) -> std::io::Result<JoinHandle<()>> {
    let supervisor = Supervisor {
        connector,
        changes,
        shutdown,
        settle_delay,
        pending_reset: None,
        pending_restart: None,
    };

    std::thread::Builder::new()
        .name("reconnect-supervisor".into())
        .spawn(move || supervisor.run())
}

impl Supervisor {
    fn run(mut self) {
        loop {
            let timer = match self.next_deadline() {
                Some(deadline) => after(deadline.saturating_duration_since(Instant::now())),
                None => never(),
            };
            let (shutdown, changes) = (self.shutdown.clone(), self.changes.clone());

            select! {
                recv(shutdown) -> _ => {
                    debug!("Supervisor de reconexão encerrado");
                    return;
                }
                recv(changes) -> msg => match msg {
                    Ok(()) => self.on_config_reload(Instant::now()),
                    Err(_) => {
                        debug!("Canal de configuração fechado");
                        self.changes = never();
                    }
                },
                recv(timer) -> _ => self.fire_due(Instant::now()),
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.pending_reset, self.pending_restart) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn on_config_reload(&mut self, now: Instant) {
        self.pending_reset = Some(now + self.settle_delay);

        let latest = self.connector.config().with(|c| c.connection_params());
        let changed = self
            .connector
            .captured_params()
            .is_some_and(|previous| previous.differs_from(&latest));

        if changed {
            info!("Mudança nos parâmetros de conexão detectada, renovando conexão");
            self.connector.stop();
            self.pending_restart = Some(now + self.settle_delay);
        }
    }

    fn fire_due(&mut self, now: Instant) {
        if self.pending_reset.is_some_and(|deadline| deadline <= now) {
            self.pending_reset = None;
            self.connector.reset_slider_count();
        }

        if self.pending_restart.is_some_and(|deadline| deadline <= now) {
            self.pending_restart = None;
            match self.connector.start() {
                Ok(()) => debug!("Conexão renovada com sucesso"),
                Err(e) => warn!("Falha ao renovar conexão após mudança de parâmetros: {e}"),
            }
        }
    }
}
