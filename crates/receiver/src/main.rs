//! # Slider Receiver
//!
//! Conecta ao mixer (ESP8266) pela rede, lê as linhas `f0|f1|...|fn\r\n`
//! e emite eventos de movimento de slider para os consumidores.
//!
//! Recarregar o `config.toml` zera o baseline dos sliders e, se
//! host/porta mudaram, renova a conexão.
//!
//! ## Uso
//! ```bash
//! slider_receiver                          # config.toml ao lado do executável
//! slider_receiver --config ./mixer.toml
//! ```

mod dispatch;
mod io;
mod network;
mod supervisor;
mod transport;
mod watcher;

#[cfg(test)]
mod test_support;

use clap::Parser;
use crossbeam_channel::bounded;
use slider_core::config::{ConfigStore, SliderConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "slider_receiver", version, about = "Recebe leituras do mixer e emite eventos de slider")]
struct Args {
    /// Caminho do config.toml (padrão: ao lado do executável)
    #[arg(long)]
    config: Option<PathBuf>,
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

    // ── Config ──
    let config_path = args.config.unwrap_or_else(SliderConfig::default_path);
    let config = SliderConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let params = config.connection_params();
    let verbose = config.verbose;
    let store = Arc::new(ConfigStore::new(config));

    // ── I/O ──
    let slider_io = match io::new_io(Arc::clone(&store)) {
        Ok(slider_io) => slider_io,
        Err(e) => {
            error!("Não foi possível criar a interface com o mixer: {e}");
            return ExitCode::FAILURE;
        }
    };
    let events = slider_io.subscribe_to_slider_move_events();

    if let Err(e) = slider_io.start() {
        warn!("{e}. Aguardando mudança na configuração para tentar novamente.");
    }

    // ── Observador do config.toml ──
    let (_watch_stop, watch_stop_rx) = bounded::<()>(0);
    if let Err(e) = watcher::spawn(Arc::clone(&store), config_path.clone(), watch_stop_rx) {
        warn!("Falha ao observar {}: {e}", config_path.display());
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🎚  SLIDER RECEIVER – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Dispositivo: {} ({:?})", params.address(), params.transport);
    println!("  Config:      {}", config_path.display());
    println!("  Verbose:     {verbose}");
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    for event in events.iter() {
        info!("{event}");
    }

    ExitCode::SUCCESS
}
