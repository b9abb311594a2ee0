//! # Slider Emulator
//!
//! Dispositivo falso para testar o receiver sem hardware: para cada
//! cliente TCP aceito, envia leituras aleatórias no formato do mixer
//! (`f0|f1|f2\r\n`) a cada intervalo.
//!
//! ## Uso
//! ```bash
//! slider_emulator 8089
//! slider_emulator 8089 --sliders 5 --interval-ms 250
//! ```

use clap::Parser;
use rand::Rng;
use slider_core::protocol::{MAX_RAW_READING, format_line};
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "slider_emulator", version, about = "Emula um mixer enviando leituras aleatórias")]
struct Args {
    /// Porta TCP para escutar
    port: u16,

    /// Quantidade de sliders por linha
    #[arg(long, default_value_t = 3)]
    sliders: usize,

    /// Intervalo entre linhas (ms)
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let interval = Duration::from_millis(args.interval_ms.max(1));
    let sliders = args.sliders.max(1);

    // ── Socket TCP ──
    let listener = match TcpListener::bind(("0.0.0.0", args.port)) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Falha ao escutar na porta {}: {e}", args.port);
            return ExitCode::FAILURE;
        }
    };
    info!("Emulador escutando em 0.0.0.0:{} – {sliders} sliders a cada {:?}", args.port, interval);

    // ── Loop de aceitação ──
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
                info!("Novo cliente conectado: {peer}");

                let spawned = std::thread::Builder::new()
                    .name(format!("emulator-{peer}"))
                    .spawn(move || serve_client(stream, peer, sliders, interval));
                if let Err(e) = spawned {
                    warn!("Falha ao criar thread para {peer}: {e}");
                }
            }
            Err(e) => {
                error!("Erro ao aceitar conexão: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Leituras aleatórias em `[0, MAX_RAW_READING)`.
fn random_readings(rng: &mut impl Rng, sliders: usize) -> Vec<u32> {
    (0..sliders).map(|_| rng.gen_range(0..MAX_RAW_READING)).collect()
}

/// Envia linhas até o cliente sumir.
fn serve_client(mut stream: TcpStream, peer: SocketAddr, sliders: usize, interval: Duration) {
    let mut rng = rand::thread_rng();

    loop {
        let cycle_start = Instant::now();

        let line = format_line(&random_readings(&mut rng, sliders));
        if let Err(e) = stream.write_all(line.as_bytes()) {
            info!("Cliente {peer} desconectou: {e}");
            return;
        }

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}
