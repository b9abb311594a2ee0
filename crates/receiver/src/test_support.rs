//! Dispositivo falso em loopback e utilitários para os testes.

use crossbeam_channel::Receiver;
use slider_core::config::{ConfigStore, SliderConfig};
use slider_core::filter::NoiseReduction;
use slider_core::types::SliderMoveEvent;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Mixer falso escutando em `127.0.0.1`.
pub struct FakeDevice {
    listener: TcpListener,
    pub port: u16,
}

impl FakeDevice {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();
        Self { listener, port }
    }

    /// Porta que acabou de ser liberada (conexão recusada).
    pub fn unused_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    /// Aceita o próximo cliente, falhando após [`TIMEOUT`].
    pub fn accept(&self) -> TcpStream {
        self.try_accept(TIMEOUT).expect("nenhum cliente conectou")
    }

    /// Espera um cliente por até `timeout`.
    pub fn try_accept(&self, timeout: Duration) -> Option<TcpStream> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    stream.set_nonblocking(false).unwrap();
                    return Some(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => panic!("accept falhou: {e}"),
            }
        }
    }
}

/// Config apontando para a porta local, sem filtro de ruído.
pub fn store_for(port: u16) -> Arc<ConfigStore> {
    let mut config = SliderConfig::default();
    config.connection.host = "127.0.0.1".into();
    config.connection.port = port;
    config.noise_reduction = NoiseReduction::Custom(0.0);
    config.connect_timeout_ms = 500;
    Arc::new(ConfigStore::new(config))
}

/// Recebe exatamente `count` eventos ou falha.
pub fn recv_events(rx: &Receiver<SliderMoveEvent>, count: usize) -> Vec<SliderMoveEvent> {
    (0..count)
        .map(|i| {
            rx.recv_timeout(TIMEOUT)
                .unwrap_or_else(|e| panic!("evento {i} de {count} não chegou: {e}"))
        })
        .collect()
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
