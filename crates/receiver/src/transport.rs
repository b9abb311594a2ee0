//! Transporte com o dispositivo: TCP cru ou WebSocket sobre TCP.
//!
//! A thread de leitura consome [`TransportSignal`]s em ordem, um por
//! chamada de [`Link::next_signal`]. O [`LinkCloser`] permite que outra
//! thread derrube o socket e acorde a leitura bloqueada.

use slider_core::types::{ConnectionParams, TransportKind};
use socket2::{SockRef, TcpKeepalive};
use std::io::{BufRead, BufReader, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;
use tungstenite::{Message, WebSocket};

/// Maior linha aceita antes de ressincronizar no próximo `\n`.
pub const MAX_LINE_BYTES: usize = 4096;

/// Ociosidade antes do kernel começar a sondar o dispositivo.
pub const KEEPALIVE_TIME: Duration = Duration::from_secs(10);

/// Timeouts de uma conexão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimeouts {
    /// Conexão TCP + handshake WebSocket
    pub connect: Duration,
    /// Silêncio máximo do dispositivo antes de virar erro (`None` = sem limite)
    pub idle: Option<Duration>,
}

/// Erros ao estabelecer o transporte.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Não foi possível resolver {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    #[error("Nenhum endereço encontrado para {0}")]
    NoAddress(String),

    #[error("Falha ao conectar em {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("Handshake WebSocket falhou: {0}")]
    Handshake(String),

    #[error("Erro de socket: {0}")]
    Socket(#[from] std::io::Error),
}

/// Sinal entregue pela conexão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// Uma linha/mensagem completa, com terminador
    Message(String),
    /// O outro lado fechou
    Disconnected,
    /// Erro de leitura; a conexão deve ser descartada
    Error(String),
}

enum Framing {
    Lines {
        reader: BufReader<TcpStream>,
        resyncing: bool,
    },
    WebSocket(Box<WebSocket<TcpStream>>),
}

/// Conexão ativa com o dispositivo.
pub struct Link {
    framing: Framing,
    socket: TcpStream,
}

/// Handle para fechar a conexão a partir de outra thread.
#[derive(Debug)]
pub struct LinkCloser(TcpStream);

impl LinkCloser {
    pub fn close(&self) {
        if let Err(e) = self.0.shutdown(Shutdown::Both) {
            debug!("Shutdown do socket: {e}");
        }
    }
}

impl Link {
    /// Abre o socket e, se for o caso, faz o handshake WebSocket.
    pub fn connect(params: &ConnectionParams, timeouts: LinkTimeouts) -> Result<Self, TransportError> {
        let addr = params.address();
        let stream = connect_tcp(&addr, timeouts.connect)?;
        stream.set_nodelay(true)?;

        // Dispositivo que perde energia não manda FIN: o keepalive derruba a leitura
        SockRef::from(&stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_TIME))?;
        let socket = stream.try_clone()?;

        let framing = match params.transport {
            TransportKind::Tcp => {
                socket.set_read_timeout(timeouts.idle)?;
                Framing::Lines {
                    reader: BufReader::new(stream),
                    resyncing: false,
                }
            }
            TransportKind::WebSocket => {
                let path = params.options.get("path").map(String::as_str).unwrap_or("/");
                let url = format!("ws://{addr}{path}");

                // Handshake com o timeout de conexão; depois vale o de ociosidade
                socket.set_read_timeout(Some(timeouts.connect))?;
                let (ws, _response) = tungstenite::client(url.as_str(), stream)
                    .map_err(|e| TransportError::Handshake(e.to_string()))?;
                socket.set_read_timeout(timeouts.idle)?;
                Framing::WebSocket(Box::new(ws))
            }
        };

        Ok(Self { framing, socket })
    }

    /// Handle de fechamento independente da thread de leitura.
    pub fn closer(&self) -> Result<LinkCloser, TransportError> {
        Ok(LinkCloser(self.socket.try_clone()?))
    }

    /// Bloqueia até o próximo sinal da conexão.
    pub fn next_signal(&mut self) -> TransportSignal {
        match &mut self.framing {
            Framing::Lines { reader, resyncing } => next_line(reader, resyncing),
            Framing::WebSocket(ws) => next_ws_message(ws),
        }
    }
}

fn connect_tcp(addr: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let candidates = addr
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.to_string(),
            source,
        })?;

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Falha em {candidate}: {e}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(source) => Err(TransportError::Connect {
            addr: addr.to_string(),
            source,
        }),
        None => Err(TransportError::NoAddress(addr.to_string())),
    }
}

/// Lê até `\n` (mantendo o terminador), limitado a [`MAX_LINE_BYTES`].
///
/// Uma linha maior que o limite é descartada inteira, até o próximo `\n`.
fn next_line<R: BufRead>(reader: &mut R, resyncing: &mut bool) -> TransportSignal {
    let mut buf = Vec::with_capacity(64);
    loop {
        buf.clear();
        match reader.by_ref().take(MAX_LINE_BYTES as u64).read_until(b'\n', &mut buf) {
            Ok(0) => return TransportSignal::Disconnected,
            Ok(_) => {
                let complete = buf.last() == Some(&b'\n');
                if *resyncing {
                    *resyncing = !complete;
                    continue;
                }
                if !complete && buf.len() >= MAX_LINE_BYTES {
                    debug!("Linha excedeu {MAX_LINE_BYTES} bytes, ressincronizando");
                    *resyncing = true;
                    continue;
                }
                return TransportSignal::Message(String::from_utf8_lossy(&buf).into_owned());
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return TransportSignal::Error(e.to_string()),
        }
    }
}

fn next_ws_message(ws: &mut WebSocket<TcpStream>) -> TransportSignal {
    loop {
        match ws.read() {
            Ok(Message::Text(text)) => return TransportSignal::Message(text),
            Ok(Message::Binary(bytes)) => {
                return TransportSignal::Message(String::from_utf8_lossy(&bytes).into_owned());
            }
            Ok(Message::Close(_)) => return TransportSignal::Disconnected,
            Ok(_) => continue, // Ping/Pong/Frame
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return TransportSignal::Disconnected;
            }
            Err(e) => return TransportSignal::Error(e.to_string()),
        }
    }
}
