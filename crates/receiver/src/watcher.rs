//! Observa o `config.toml` e recarrega o [`ConfigStore`] quando o arquivo muda.
//!
//! Observa o diretório pai (editores costumam salvar via rename, trocando o
//! inode do arquivo) e filtra pelo nome do arquivo. Rajadas de eventos de
//! um mesmo salvamento viram uma única recarga após [`DEBOUNCE`].

use crossbeam_channel::{Receiver, after, never, select, unbounded};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use slider_core::config::ConfigStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Espera por silêncio no arquivo antes de recarregar.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Erros ao iniciar a observação.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Observador de arquivos indisponível: {0}")]
    Notify(#[from] notify::Error),

    #[error("Falha ao criar thread do observador: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Inicia a thread de observação. Termina quando `shutdown` fecha.
pub fn spawn(
    store: Arc<ConfigStore>,
    path: PathBuf,
    shutdown: Receiver<()>,
) -> Result<JoinHandle<()>, WatchError> {
    let (fs_tx, fs_rx) = unbounded::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = fs_tx.send(res);
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    debug!("Observando {}", path.display());

    let handle = std::thread::Builder::new()
        .name("config-watcher".into())
        .spawn(move || watch_loop(watcher, &store, &path, &fs_rx, &shutdown))?;
    Ok(handle)
}

// O watcher vive na thread: ao sair do loop ele é descartado e para de notificar
fn watch_loop(
    _watcher: RecommendedWatcher,
    store: &ConfigStore,
    path: &Path,
    fs_events: &Receiver<notify::Result<Event>>,
    shutdown: &Receiver<()>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = match deadline {
            Some(at) => after(at.saturating_duration_since(Instant::now())),
            None => never(),
        };

        select! {
            recv(shutdown) -> _ => return,
            recv(fs_events) -> msg => match msg {
                Ok(Ok(event)) => {
                    if touches_config(&event, path) {
                        deadline = Some(Instant::now() + DEBOUNCE);
                    }
                }
                Ok(Err(e)) => warn!("Erro do observador de arquivos: {e}"),
                Err(_) => return,
            },
            recv(timer) -> _ => {
                deadline = None;
                reload(store, path);
            }
        }
    }
}

fn touches_config(event: &Event, path: &Path) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    );
    relevant && event.paths.iter().any(|p| p.file_name() == path.file_name())
}

fn reload(store: &ConfigStore, path: &Path) {
    if !path.exists() {
        debug!("{} removido, mantendo configuração atual", path.display());
        return;
    }
    match store.reload_from(path) {
        Ok(()) => info!("Configuração recarregada"),
        Err(e) => warn!("Recarga ignorada: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use slider_core::config::SliderConfig;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("slider_watch_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn only_writes_to_the_config_file_count() {
        let config = Path::new("/tmp/mixer/config.toml");
        let sibling = Path::new("/tmp/mixer/other.toml");

        assert!(touches_config(&event(EventKind::Modify(ModifyKind::Any), config), config));
        assert!(touches_config(&event(EventKind::Create(CreateKind::File), config), config));
        assert!(!touches_config(&event(EventKind::Modify(ModifyKind::Any), sibling), config));
        assert!(!touches_config(&event(EventKind::Remove(RemoveKind::File), config), config));
    }

    #[test]
    fn file_change_triggers_reload() {
        let dir = scratch_dir("reload");
        let path = dir.join("config.toml");
        std::fs::write(&path, "verbose = false\n").unwrap();

        let store = Arc::new(ConfigStore::new(SliderConfig::default()));
        let changes = store.subscribe_to_changes();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = spawn(Arc::clone(&store), path.clone(), stop_rx).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(&path, "verbose = true\ninvert_sliders = true\n").unwrap();

        assert!(changes.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(store.snapshot().invert_sliders);

        drop(stop_tx);
        handle.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn burst_of_writes_reloads_once() {
        let dir = scratch_dir("burst");
        let path = dir.join("config.toml");
        std::fs::write(&path, "verbose = false\n").unwrap();

        let store = Arc::new(ConfigStore::new(SliderConfig::default()));
        let changes = store.subscribe_to_changes();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = spawn(Arc::clone(&store), path.clone(), stop_rx).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        for port in [9001, 9002, 9003] {
            std::fs::write(&path, format!("[connection]\nport = {port}\n")).unwrap();
        }

        assert!(changes.recv_timeout(Duration::from_secs(2)).is_ok());
        assert_eq!(store.snapshot().connection.port, 9003);
        std::thread::sleep(DEBOUNCE * 3);
        assert!(changes.try_recv().is_err(), "rajada deveria gerar uma única recarga");

        drop(stop_tx);
        handle.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_file_keeps_current_config() {
        let dir = scratch_dir("invalid");
        let path = dir.join("config.toml");
        std::fs::write(&path, "verbose = false\n").unwrap();

        let store = Arc::new(ConfigStore::new(SliderConfig::default()));
        let changes = store.subscribe_to_changes();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = spawn(Arc::clone(&store), path.clone(), stop_rx).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        std::fs::write(&path, "noise_reduction = [\n").unwrap();
        std::thread::sleep(DEBOUNCE * 4);

        assert!(changes.try_recv().is_err());
        assert!(!store.snapshot().verbose);

        drop(stop_tx);
        handle.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
