// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background refresh thread for instance-based discovery.
//!
//! ```text
//! caller --- PollerCommand ---> [registry-sync-instances thread]
//!        <--- PollerEvent -----      InstanceWatcher::refresh_all()
//!                                    every poll_interval, or on PollNow
//! ```

use super::InstanceWatcher;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Events kept for a handle that is not reading; newer events are dropped.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Commands accepted by the poller thread.
#[derive(Debug)]
pub enum PollerCommand {
    /// Watch these applications (mapping event).
    Watch(Vec<String>),
    /// Refresh all watched applications now.
    PollNow,
    Shutdown,
}

/// Events emitted by the poller thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    Ready,
    /// A refresh cycle finished; `applications` refreshed successfully.
    Refreshed { applications: usize },
    Stopped,
}

/// Handle to a running poller.
#[derive(Clone)]
pub struct InstancePollerHandle {
    cmd_tx: Sender<PollerCommand>,
    event_rx: Arc<Mutex<Receiver<PollerEvent>>>,
    running: Arc<AtomicBool>,
}

impl InstancePollerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask the thread to watch `applications`.
    pub fn watch(&self, applications: Vec<String>) -> bool {
        self.cmd_tx.send(PollerCommand::Watch(applications)).is_ok()
    }

    /// Force an immediate refresh cycle.
    pub fn poll_now(&self) -> bool {
        self.cmd_tx.send(PollerCommand::PollNow).is_ok()
    }

    /// Wait for the next event (blocking with timeout).
    pub fn wait(&self, timeout: Duration) -> Option<PollerEvent> {
        self.event_rx.lock().recv_timeout(timeout).ok()
    }

    /// Request shutdown without waiting for the thread.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(PollerCommand::Shutdown);
    }
}

/// Instance refresh thread.
pub struct InstancePoller {
    handle: InstancePollerHandle,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl InstancePoller {
    /// Spawn the refresh thread.
    pub fn spawn(watcher: Arc<InstanceWatcher>, poll_interval: Duration) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = channel();
        let (event_tx, event_rx) = sync_channel(EVENT_QUEUE_DEPTH);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let thread_handle = thread::Builder::new()
            .name("registry-sync-instances".to_string())
            .spawn(move || {
                Self::run_loop(watcher, poll_interval, cmd_rx, event_tx, running_clone);
            })?;

        Ok(Self {
            handle: InstancePollerHandle {
                cmd_tx,
                event_rx: Arc::new(Mutex::new(event_rx)),
                running,
            },
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    pub fn handle(&self) -> InstancePollerHandle {
        self.handle.clone()
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn shutdown(&self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread_handle.lock().take() {
            if thread.join().is_err() {
                warn!("Instance poller thread panicked");
            }
        }
    }

    fn run_loop(
        watcher: Arc<InstanceWatcher>,
        poll_interval: Duration,
        cmd_rx: Receiver<PollerCommand>,
        event_tx: SyncSender<PollerEvent>,
        running: Arc<AtomicBool>,
    ) {
        Self::emit(&event_tx, PollerEvent::Ready);
        info!("Instance poller ready (interval {:?})", poll_interval);

        let mut next_poll = Instant::now() + poll_interval;
        while running.load(Ordering::Relaxed) {
            let timeout = next_poll.saturating_duration_since(Instant::now());
            let poll = match cmd_rx.recv_timeout(timeout) {
                Ok(PollerCommand::Watch(applications)) => {
                    let added = watcher.watch(applications);
                    debug!("Poller now watching {} new application(s)", added.len());
                    false
                }
                Ok(PollerCommand::PollNow) => true,
                Ok(PollerCommand::Shutdown) => {
                    info!("Instance poller shutdown requested");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => true,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Instance poller command channel disconnected");
                    break;
                }
            };

            if poll {
                let applications = watcher.refresh_all();
                next_poll = Instant::now() + poll_interval;
                Self::emit(&event_tx, PollerEvent::Refreshed { applications });
            }
        }

        running.store(false, Ordering::Relaxed);
        Self::emit(&event_tx, PollerEvent::Stopped);
        info!("Instance poller stopped");
    }

    /// Never blocks the refresh loop.
    fn emit(event_tx: &SyncSender<PollerEvent>, event: PollerEvent) {
        if event_tx.try_send(event).is_err() {
            trace!("Poller event queue full, event dropped");
        }
    }
}

impl Drop for InstancePoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
