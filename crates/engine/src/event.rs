//! Engine-level events and the typed notifications the service publishes.

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Observed properties
// ---------------------------------------------------------------------------

/// Engine properties the playback service watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObservedProperty {
    /// Current position in seconds (`time-pos`).
    Position,
    /// Media duration in seconds.
    Duration,
    /// Pause flag.
    Pause,
    /// Volume, 0-100 (may exceed 100 when the engine allows boost).
    Volume,
    /// Mute flag.
    Mute,
}

/// How a property's value is transported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyFormat {
    Double,
    Flag,
}

impl ObservedProperty {
    pub const ALL: [ObservedProperty; 5] = [
        Self::Position,
        Self::Duration,
        Self::Pause,
        Self::Volume,
        Self::Mute,
    ];

    /// Engine-side property name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Position => "time-pos",
            Self::Duration => "duration",
            Self::Pause => "pause",
            Self::Volume => "volume",
            Self::Mute => "mute",
        }
    }

    pub fn format(self) -> PropertyFormat {
        match self {
            Self::Position | Self::Duration | Self::Volume => PropertyFormat::Double,
            Self::Pause | Self::Mute => PropertyFormat::Flag,
        }
    }

    /// Token echoed back by the engine with each change (never 0).
    pub fn userdata(self) -> u64 {
        match self {
            Self::Position => 1,
            Self::Duration => 2,
            Self::Pause => 3,
            Self::Volume => 4,
            Self::Mute => 5,
        }
    }

    pub fn from_userdata(token: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.userdata() == token)
    }
}

/// A property value as reported by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Double(f64),
    Flag(bool),
    /// The property currently has no value (e.g. no file loaded).
    Unavailable,
}

// ---------------------------------------------------------------------------
// End of file
// ---------------------------------------------------------------------------

/// Why the engine stopped playing a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// Reached the end of the stream.
    Eof,
    /// Stopped by a command, including replacing the file.
    Stop,
    /// The engine is quitting.
    Quit,
    /// Playback failed; holds the engine error code.
    Error(i32),
    /// The file was a playlist or redirect and was expanded.
    Redirect,
    Unknown(i32),
}

impl EndReason {
    /// Whether this end should be reported to the UI as "playback finished".
    pub fn is_finish(self) -> bool {
        matches!(self, Self::Eof | Self::Error(_))
    }
}

// ---------------------------------------------------------------------------
// Engine events
// ---------------------------------------------------------------------------

/// Severity of an engine log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EngineLogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Raw event produced by a [`MediaEngine`](crate::MediaEngine).
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    PropertyChanged {
        property: ObservedProperty,
        value: PropertyValue,
    },
    FileLoaded,
    EndFile(EndReason),
    Log {
        level: EngineLogLevel,
        prefix: String,
        text: String,
    },
    /// The engine is shutting down; no further events follow.
    Shutdown,
    /// Any event the service does not act on, by engine event id.
    Other(i32),
}

// ---------------------------------------------------------------------------
// Published notifications
// ---------------------------------------------------------------------------

/// Typed change notification published by the playback service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Playback position in milliseconds.
    Position(u64),
    /// Media duration in milliseconds.
    Duration(u64),
    /// `true` while playing, `false` while paused.
    PlaybackState(bool),
    /// Volume, 0-100.
    Volume(u8),
    Muted(bool),
    FileLoaded,
    /// Playback reached its end (or failed). The frame-ready callback should
    /// be disarmed on receipt.
    Finished(EndReason),
}

/// Last known playback state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub playing: bool,
    pub volume: u8,
    pub muted: bool,
    pub media: Option<PathBuf>,
    pub finished: bool,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            position_ms: 0,
            duration_ms: 0,
            playing: false,
            volume: 100,
            muted: false,
            media: None,
            finished: false,
        }
    }
}

impl PlaybackSnapshot {
    /// Whether a duration is known, i.e. transport controls make sense.
    pub fn has_duration(&self) -> bool {
        self.duration_ms > 0
    }
}
