//! Playback service — owns the engine and publishes typed change events.
//!
//! Architecture:
//!
//! ```text
//! UI Thread                     Event Thread ("engine-events")
//! ┌──────────────┐              ┌─────────────────────────┐
//! │ set_media()  │── command ──►│                         │
//! │ seek() ...   │   (engine)   │ engine.wait_event()     │
//! │              │              │  - translate            │
//! │ rx.try_recv()│◄─ Playback ──│  - update snapshot      │
//! │              │    Event     │  - fan out to senders   │
//! └──────────────┘              └─────────────────────────┘
//! ```
//!
//! Commands go straight to the engine (its client API is thread-safe). The
//! event thread is the only caller of `wait_event`; it exits once `close`
//! sets the shutdown flag and wakes it, or when the engine shuts down.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use lm_common::secs_to_millis;

use crate::engine::{EngineHandle, MediaEngine};
use crate::error::EngineError;
use crate::event::{
    EngineEvent, EngineLogLevel, ObservedProperty, PlaybackEvent, PlaybackSnapshot, PropertyValue,
};

/// Highest volume the UI exposes.
pub const MAX_VOLUME: u8 = 100;

/// State shared between the service handle and its event thread.
struct Shared {
    subscribers: Mutex<Vec<Sender<PlaybackEvent>>>,
    snapshot: Mutex<PlaybackSnapshot>,
    shutdown: AtomicBool,
}

impl Shared {
    fn publish(&self, event: PlaybackEvent) {
        let mut subscribers = self.subscribers.lock();
        // Receivers that were dropped are pruned here.
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Playback service driving one [`MediaEngine`].
pub struct PlaybackService<E: MediaEngine> {
    engine: Arc<E>,
    shared: Arc<Shared>,
    event_thread: Option<thread::JoinHandle<()>>,
}

impl<E: MediaEngine> std::fmt::Debug for PlaybackService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackService")
            .field("engine", &self.engine.handle())
            .field("running", &self.event_thread.is_some())
            .field("subscribers", &self.shared.subscribers.lock().len())
            .finish()
    }
}

impl<E: MediaEngine> PlaybackService<E> {
    /// Start observing the engine's properties and spawn the event thread.
    pub fn start(engine: Arc<E>) -> Result<Self, EngineError> {
        for property in ObservedProperty::ALL {
            engine.observe(property)?;
        }

        let shared = Arc::new(Shared {
            subscribers: Mutex::new(Vec::new()),
            snapshot: Mutex::new(PlaybackSnapshot::default()),
            shutdown: AtomicBool::new(false),
        });

        let thread_engine = Arc::clone(&engine);
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("engine-events".to_string())
            .spawn(move || event_loop(thread_engine, thread_shared))?;

        info!(engine = %engine.handle(), "Playback service started");

        Ok(Self {
            engine,
            shared,
            event_thread: Some(handle),
        })
    }

    /// Register a new subscriber. Every subsequent event is delivered to it.
    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Replace the current media and start playing it.
    pub fn set_media(&self, path: &Path) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.engine.load(path)?;
        self.engine.set_paused(false)?;

        let mut snapshot = self.shared.snapshot.lock();
        snapshot.media = Some(path.to_path_buf());
        snapshot.finished = false;
        snapshot.position_ms = 0;
        snapshot.duration_ms = 0;
        Ok(())
    }

    pub fn play(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.engine.set_paused(false)
    }

    pub fn pause(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.engine.set_paused(true)
    }

    /// Toggle based on the last reported pause state.
    pub fn toggle_pause(&self) -> Result<(), EngineError> {
        if self.snapshot().playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Seek to `position_ms`, clamped to the known duration.
    ///
    /// Returns the position actually requested.
    pub fn seek(&self, position_ms: u64) -> Result<u64, EngineError> {
        self.ensure_running()?;
        let duration = self.snapshot().duration_ms;
        let target = if duration > 0 {
            position_ms.min(duration)
        } else {
            position_ms
        };
        debug!(requested = position_ms, target, "Seek");
        self.engine.seek(target as f64 / 1000.0)?;
        Ok(target)
    }

    /// Seek relative to the last reported position.
    pub fn seek_by(&self, delta_ms: i64) -> Result<u64, EngineError> {
        let current = self.snapshot().position_ms;
        self.seek(current.saturating_add_signed(delta_ms))
    }

    /// Set the volume, clamped to `0..=MAX_VOLUME`.
    pub fn set_volume(&self, volume: u8) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.engine.set_volume(volume.min(MAX_VOLUME) as f64)
    }

    pub fn set_muted(&self, muted: bool) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.engine.set_muted(muted)
    }

    pub fn toggle_mute(&self) -> Result<(), EngineError> {
        let muted = self.snapshot().muted;
        self.set_muted(!muted)
    }

    /// Last known playback state.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.snapshot.lock().clone()
    }

    /// The engine, for components that need more than the opaque handle
    /// (the render bridge keeps it alive while a render context exists).
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn engine_handle(&self) -> EngineHandle {
        self.engine.handle()
    }

    pub fn is_running(&self) -> bool {
        self.event_thread.is_some()
    }

    /// Stop the event thread. Safe to call more than once.
    pub fn close(&mut self) {
        let Some(handle) = self.event_thread.take() else {
            return;
        };

        self.shared.shutdown.store(true, Ordering::Release);
        self.engine.wakeup();

        if handle.join().is_err() {
            error!("Engine event thread panicked");
        }
        self.shared.subscribers.lock().clear();
        info!(engine = %self.engine.handle(), "Playback service closed");
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.event_thread.is_some() {
            Ok(())
        } else {
            Err(EngineError::Closed)
        }
    }
}

impl<E: MediaEngine> Drop for PlaybackService<E> {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Event thread
// ---------------------------------------------------------------------------

fn event_loop<E: MediaEngine>(engine: Arc<E>, shared: Arc<Shared>) {
    debug!("Engine event loop running");

    while !shared.shutdown.load(Ordering::Acquire) {
        let Some(event) = engine.wait_event(None) else {
            continue;
        };

        match event {
            EngineEvent::Shutdown => {
                info!("Engine reported shutdown");
                break;
            }
            EngineEvent::Log {
                level,
                prefix,
                text,
            } => log_engine_message(level, &prefix, &text),
            other => {
                let published = {
                    let mut snapshot = shared.snapshot.lock();
                    translate(&other, &mut snapshot)
                };
                if let Some(event) = published {
                    trace!(?event, "Publishing");
                    shared.publish(event);
                }
            }
        }
    }

    debug!("Engine event loop exited");
}

/// Apply one engine event to `snapshot` and return the notification to
/// publish, if any. Unavailable property values are dropped.
fn translate(event: &EngineEvent, snapshot: &mut PlaybackSnapshot) -> Option<PlaybackEvent> {
    match *event {
        EngineEvent::PropertyChanged { property, value } => match (property, value) {
            (_, PropertyValue::Unavailable) => None,
            (ObservedProperty::Position, PropertyValue::Double(secs)) => {
                snapshot.position_ms = secs_to_millis(secs);
                Some(PlaybackEvent::Position(snapshot.position_ms))
            }
            (ObservedProperty::Duration, PropertyValue::Double(secs)) => {
                snapshot.duration_ms = secs_to_millis(secs);
                Some(PlaybackEvent::Duration(snapshot.duration_ms))
            }
            (ObservedProperty::Pause, PropertyValue::Flag(paused)) => {
                snapshot.playing = !paused;
                Some(PlaybackEvent::PlaybackState(snapshot.playing))
            }
            (ObservedProperty::Volume, PropertyValue::Double(volume)) => {
                snapshot.volume = volume.round().clamp(0.0, MAX_VOLUME as f64) as u8;
                Some(PlaybackEvent::Volume(snapshot.volume))
            }
            (ObservedProperty::Mute, PropertyValue::Flag(muted)) => {
                snapshot.muted = muted;
                Some(PlaybackEvent::Muted(muted))
            }
            (property, value) => {
                warn!(?property, ?value, "Property reported with unexpected format");
                None
            }
        },
        EngineEvent::FileLoaded => {
            snapshot.finished = false;
            Some(PlaybackEvent::FileLoaded)
        }
        EngineEvent::EndFile(reason) if reason.is_finish() => {
            info!(?reason, "Playback finished");
            snapshot.finished = true;
            snapshot.playing = false;
            Some(PlaybackEvent::Finished(reason))
        }
        EngineEvent::EndFile(reason) => {
            debug!(?reason, "File ended without finishing");
            None
        }
        EngineEvent::Other(id) => {
            trace!(id, "Ignoring engine event");
            None
        }
        EngineEvent::Log { .. } | EngineEvent::Shutdown => None,
    }
}

fn log_engine_message(level: EngineLogLevel, prefix: &str, text: &str) {
    match level {
        EngineLogLevel::Fatal | EngineLogLevel::Error => {
            error!(target: "mpv", prefix, "{text}")
        }
        EngineLogLevel::Warn => warn!(target: "mpv", prefix, "{text}"),
        EngineLogLevel::Info => info!(target: "mpv", prefix, "{text}"),
        EngineLogLevel::Verbose | EngineLogLevel::Debug => debug!(target: "mpv", prefix, "{text}"),
        EngineLogLevel::Trace => trace!(target: "mpv", prefix, "{text}"),
    }
}
