//! `watch` entry point: build, serve, rebuild on change.
//!
//! Wires the filesystem watcher and the Ctrl+C handler to a [`Supervisor`]
//! running the real pipeline and a child `serve` process.

use crate::{
    build::SitePipeline,
    config::SiteConfig,
    log,
    supervisor::{ProcessLauncher, ServerProcess, ServerSlot, SharedSlot, Supervisor},
};
use anyhow::{Context, Result};
use notify::{RecursiveMode, Watcher};
use parking_lot::MutexGuard;
use std::{path::Path, process, sync::mpsc};

/// Run the watch loop until interrupted.
pub fn watch_site(config: &'static SiteConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, config)?;

    let launcher = ProcessLauncher::serve(config.get_root(), &config.config_path)
        .context("Failed to locate the current executable")?;
    let mut supervisor = Supervisor::new(
        SitePipeline::new(config),
        launcher,
        config.watch.on_busy,
        config.get_root(),
    );
    install_interrupt_handler(supervisor.slot())?;

    supervisor.run(&rx);
    Ok(())
}

/// On Ctrl+C: stop the current server, then exit cleanly.
fn install_interrupt_handler<P: ServerProcess + 'static>(slot: SharedSlot<P>) -> Result<()> {
    ctrlc::set_handler(move || {
        log!("watch"; "stopping...");
        // Exit with the lock held so a build finishing now cannot relaunch.
        let _guard = close_slot(&slot);
        process::exit(0);
    })
    .context("Failed to set Ctrl+C handler")
}

/// Stop the server and close the slot, returning the held lock.
fn close_slot<P: ServerProcess>(slot: &SharedSlot<P>) -> MutexGuard<'_, ServerSlot<P>> {
    let mut guard = slot.lock();
    if let Err(e) = guard.close() {
        log!("error"; "failed to stop server: {e}");
    }
    guard
}

/// Watch the source directories recursively and the config file itself.
fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let root = config.get_root();
    let build = &config.build;

    let targets = [
        (&build.content, RecursiveMode::Recursive),
        (&build.assets, RecursiveMode::Recursive),
        (&build.components, RecursiveMode::Recursive),
        (&config.config_path, RecursiveMode::NonRecursive),
    ];

    let mut watched = Vec::new();
    for (path, mode) in targets {
        if !path.exists() {
            continue;
        }
        watcher
            .watch(path, mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        watched.push(rel_display(path, root, path.is_dir()));
    }

    if watched.is_empty() {
        log!("watch"; "nothing to watch under {}", root.display());
    } else {
        log!("watch"; "watching {}", watched.join(", "));
    }
    Ok(())
}

/// Format path as relative to root, with trailing slash for directories.
fn rel_display(path: &Path, root: &Path, is_dir: bool) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let suffix = if is_dir { "/" } else { "" };
    format!("{}{}", rel.display(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::ServerLauncher;
    use std::{
        fs,
        path::PathBuf,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };
    use tempfile::TempDir;

    /// Records what was registered.
    #[derive(Default)]
    struct RecordingWatcher {
        watched: Vec<(PathBuf, RecursiveMode)>,
    }

    impl Watcher for RecordingWatcher {
        fn new<F: notify::EventHandler>(_: F, _: notify::Config) -> notify::Result<Self> {
            Ok(Self::default())
        }

        fn watch(&mut self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
            self.watched.push((path.to_path_buf(), mode));
            Ok(())
        }

        fn unwatch(&mut self, _: &Path) -> notify::Result<()> {
            Ok(())
        }

        fn kind() -> notify::WatcherKind {
            notify::WatcherKind::NullWatcher
        }
    }

    #[test]
    fn test_setup_watchers_skips_missing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("routes")).unwrap();
        fs::create_dir_all(root.join("components")).unwrap();
        fs::write(root.join("site.toml"), "").unwrap();

        let mut config = SiteConfig::default();
        config.set_root(root);
        config.config_path = root.join("site.toml");
        config.build.content = root.join("routes");
        config.build.assets = root.join("assets");
        config.build.components = root.join("components");

        let mut watcher = RecordingWatcher::default();
        setup_watchers(&mut watcher, &config).unwrap();

        assert_eq!(
            watcher.watched,
            vec![
                (root.join("routes"), RecursiveMode::Recursive),
                (root.join("components"), RecursiveMode::Recursive),
                (root.join("site.toml"), RecursiveMode::NonRecursive),
            ]
        );
    }

    struct Recorder(Arc<AtomicUsize>);

    impl ServerProcess for Recorder {
        fn terminate(&mut self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct RecorderLauncher(Arc<AtomicUsize>);

    impl ServerLauncher for RecorderLauncher {
        type Process = Recorder;

        fn launch(&self) -> Result<Recorder> {
            Ok(Recorder(Arc::clone(&self.0)))
        }
    }

    #[test]
    fn test_close_slot_stops_server_for_good() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let launcher = RecorderLauncher(Arc::clone(&stopped));
        let slot: SharedSlot<Recorder> = SharedSlot::default();
        slot.lock().replace(&launcher).unwrap();

        drop(close_slot(&slot));

        assert_eq!(stopped.load(Ordering::SeqCst), 1);
        let mut slot = slot.lock();
        assert!(!slot.is_occupied());
        assert!(slot.replace(&launcher).is_err());
    }

    #[test]
    fn test_rel_display() {
        let root = Path::new("/site");
        assert_eq!(rel_display(Path::new("/site/routes"), root, true), "routes/");
        assert_eq!(rel_display(Path::new("/site/site.toml"), root, false), "site.toml");
        assert_eq!(rel_display(Path::new("/elsewhere"), root, true), "/elsewhere/");
    }
}
