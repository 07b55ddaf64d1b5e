//! Mapping engine
//!
//! Owns the moving parts: the mapping file, the session directory, and the
//! resolved table. Frames from the transport are dispatched against an
//! immutable snapshot that a resolution pass swaps wholesale, so dispatch
//! never observes a half-rebuilt mapping.

use crate::config::{self, Settings};
use crate::dispatch::{VolumeDispatcher, MAX_READING};
use crate::mapping::{resolve, ResolvedMapping};
use crate::sessions::SessionDirectory;
use crate::transport::{SerialTransport, SliderFrame};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// How often the mapping is re-resolved while running.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// The mapping engine.
pub struct Engine {
    config_path: PathBuf,
    directory: Box<dyn SessionDirectory>,
    settings: Settings,
    mapping_tx: watch::Sender<Arc<ResolvedMapping>>,
    mapping_rx: watch::Receiver<Arc<ResolvedMapping>>,
}

impl Engine {
    /// Run the startup resolution pass. A broken mapping file or an
    /// unreachable session backend is fatal here.
    pub fn new(
        config_path: impl Into<PathBuf>,
        directory: Box<dyn SessionDirectory>,
    ) -> Result<Self> {
        let config_path = config_path.into();
        let config = config::load_config(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        let snapshot = directory
            .snapshot()
            .context("enumerating audio sessions")?;
        let mapping = Arc::new(resolve(&config, &snapshot));
        let (mapping_tx, mapping_rx) = watch::channel(mapping);

        Ok(Self {
            config_path,
            directory,
            settings: config.settings,
            mapping_tx,
            mapping_rx,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Latest resolved mapping snapshot.
    pub fn mapping(&self) -> Arc<ResolvedMapping> {
        self.mapping_rx.borrow().clone()
    }

    /// Observe mapping swaps, e.g. from another task.
    pub fn watch_mapping(&self) -> watch::Receiver<Arc<ResolvedMapping>> {
        self.mapping_rx.clone()
    }

    /// Re-run the resolution pass: reload the mapping file, take a fresh
    /// session snapshot, and swap in the new table.
    ///
    /// On failure the previous mapping stays in force; the caller decides
    /// whether that is fatal (startup) or just worth reporting (refresh).
    pub fn refresh(&mut self) -> Result<()> {
        let config = config::load_config(&self.config_path)
            .with_context(|| format!("reloading {}", self.config_path.display()))?;
        let snapshot = self
            .directory
            .snapshot()
            .context("enumerating audio sessions")?;
        let mapping = Arc::new(resolve(&config, &snapshot));

        self.settings = config.settings;
        self.mapping_tx.send_replace(mapping);
        Ok(())
    }

    /// Read frames until shutdown, dispatching each against the latest
    /// mapping and re-resolving periodically.
    pub async fn run(
        &mut self,
        transport: &mut SerialTransport,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut frames = transport.subscribe();
        transport.start()?;

        let mut refresh_timer = tokio::time::interval(REFRESH_INTERVAL);
        refresh_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; the startup pass covers it.
        refresh_timer.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = refresh_timer.tick() => {
                    if let Err(e) = self.refresh() {
                        eprintln!("Mapping refresh failed, keeping previous mapping: {e:#}");
                    }
                }
                frame = frames.recv() => match frame {
                    Ok(frame) => self.handle_frame(&frame),
                    // Sliders outpaced dispatch; readings are absolute, so
                    // skipped batches are safe to drop.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        transport.stop();
        Ok(())
    }

    fn handle_frame(&mut self, frame: &SliderFrame) {
        let dispatcher = VolumeDispatcher::new(MAX_READING, self.settings.inverted);
        let mapping = self.mapping();
        let report = dispatcher.dispatch(&frame.readings, &mapping);

        if !report.failures.is_empty() {
            for failure in &report.failures {
                eprintln!("Volume update skipped: {failure}");
            }
            // A dead session invalidates the snapshot; rebuild now rather
            // than waiting for the next interval.
            if let Err(e) = self.refresh() {
                eprintln!("Mapping refresh failed, keeping previous mapping: {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::MemoryDirectory;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::NamedTempFile;

    fn write_config(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_startup_resolution() {
        let file = write_config("0: master\n1: chrome.exe\n2: unmapped\nsliders: 3\n");
        let directory = Box::new(MemoryDirectory::new(&["chrome.exe"]));

        let engine = Engine::new(file.path(), directory).unwrap();

        assert_eq!(engine.settings().slider_count, 3);
        assert_eq!(engine.mapping().len(), 3);
    }

    #[test]
    fn test_startup_fails_on_broken_config() {
        let file = write_config("0: master\n");
        let directory = Box::new(MemoryDirectory::new(&[]));

        assert!(Engine::new(file.path(), directory).is_err());
    }

    #[test]
    fn test_refresh_picks_up_new_sessions() {
        let file = write_config("0: spotify.exe\nsliders: 1\n");
        let directory = std::sync::Arc::new(MemoryDirectory::new(&[]));
        let mut engine =
            Engine::new(file.path(), Box::new(std::sync::Arc::clone(&directory))).unwrap();
        assert!(engine.mapping().get(0).is_none());

        directory.add_session("spotify.exe");
        engine.refresh().unwrap();
        assert!(engine.mapping().get(0).is_some());
    }

    #[test]
    fn test_refresh_swaps_watched_snapshot() {
        let file = write_config("0: master\nsliders: 1\n");
        let directory = Box::new(MemoryDirectory::new(&[]));
        let mut engine = Engine::new(file.path(), directory).unwrap();

        let rx = engine.watch_mapping();
        let before = Arc::as_ptr(&rx.borrow().clone());

        engine.refresh().unwrap();

        let after = Arc::as_ptr(&rx.borrow().clone());
        assert_ne!(before, after, "refresh must swap in a fresh snapshot");
    }

    #[test]
    fn test_failed_refresh_keeps_previous_mapping() {
        let mut file = write_config("0: master\nsliders: 1\n");
        let directory = Box::new(MemoryDirectory::new(&[]));
        let mut engine = Engine::new(file.path(), directory).unwrap();
        assert_eq!(engine.mapping().len(), 1);

        // Replace the file contents with a config missing 'sliders'.
        let inner = file.as_file_mut();
        inner.set_len(0).unwrap();
        inner.seek(SeekFrom::Start(0)).unwrap();
        inner.write_all(b"0: master\n").unwrap();

        assert!(engine.refresh().is_err());
        assert_eq!(engine.mapping().len(), 1);
        assert_eq!(engine.settings().slider_count, 1);
    }
}
