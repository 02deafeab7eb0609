//! GL debug-channel and framebuffer-completeness diagnostics.
//!
//! Purely observational: nothing here changes what gets rendered. The GL
//! calls themselves live behind [`FramebufferQuery`] and [`DebugChannel`] so
//! the host can supply them from whatever GL binding it uses.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

pub const GL_FRAMEBUFFER_COMPLETE: u32 = 0x8CD5;
pub const GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT: u32 = 0x8CD6;
pub const GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT: u32 = 0x8CD7;
pub const GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER: u32 = 0x8CDB;
pub const GL_FRAMEBUFFER_INCOMPLETE_READ_BUFFER: u32 = 0x8CDC;
pub const GL_FRAMEBUFFER_UNSUPPORTED: u32 = 0x8CDD;
pub const GL_FRAMEBUFFER_UNDEFINED: u32 = 0x8219;
pub const GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE: u32 = 0x8D56;
pub const GL_FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS: u32 = 0x8DA8;

pub const GL_DEBUG_SEVERITY_HIGH: u32 = 0x9146;
pub const GL_DEBUG_SEVERITY_MEDIUM: u32 = 0x9147;
pub const GL_DEBUG_SEVERITY_LOW: u32 = 0x9148;
pub const GL_DEBUG_SEVERITY_NOTIFICATION: u32 = 0x826B;

/// Extension that provides the debug-message channel.
pub const KHR_DEBUG: &str = "GL_KHR_debug";

/// Symbolic name of a `glCheckFramebufferStatus` result.
pub fn framebuffer_status_name(status: u32) -> &'static str {
    match status {
        GL_FRAMEBUFFER_COMPLETE => "GL_FRAMEBUFFER_COMPLETE",
        GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT",
        GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT"
        }
        GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => "GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER",
        GL_FRAMEBUFFER_INCOMPLETE_READ_BUFFER => "GL_FRAMEBUFFER_INCOMPLETE_READ_BUFFER",
        GL_FRAMEBUFFER_UNSUPPORTED => "GL_FRAMEBUFFER_UNSUPPORTED",
        GL_FRAMEBUFFER_UNDEFINED => "GL_FRAMEBUFFER_UNDEFINED",
        GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE",
        GL_FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => "GL_FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS",
        _ => "unknown framebuffer status",
    }
}

// ---------------------------------------------------------------------------
// Debug messages
// ---------------------------------------------------------------------------

/// Severity of a GL debug message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugSeverity {
    Notification,
    Low,
    Medium,
    High,
}

impl DebugSeverity {
    pub fn from_gl(value: u32) -> Self {
        match value {
            GL_DEBUG_SEVERITY_HIGH => Self::High,
            GL_DEBUG_SEVERITY_MEDIUM => Self::Medium,
            GL_DEBUG_SEVERITY_LOW => Self::Low,
            _ => Self::Notification,
        }
    }
}

/// One message from the GL debug channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugMessage {
    /// `GL_DEBUG_SOURCE_*`.
    pub source: u32,
    /// `GL_DEBUG_TYPE_*`.
    pub category: u32,
    pub severity: DebugSeverity,
    pub id: u32,
    pub text: String,
}

/// Receives debug messages.
pub trait DebugSink: Send + Sync {
    fn message(&self, message: &DebugMessage);
}

/// Forwards messages to `tracing`, mapping severity to level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn message(&self, m: &DebugMessage) {
        match m.severity {
            DebugSeverity::High => {
                error!(target: "gl", source = m.source, category = m.category, id = m.id, "{}", m.text)
            }
            DebugSeverity::Medium => {
                warn!(target: "gl", source = m.source, category = m.category, id = m.id, "{}", m.text)
            }
            DebugSeverity::Low => {
                info!(target: "gl", source = m.source, category = m.category, id = m.id, "{}", m.text)
            }
            DebugSeverity::Notification => {
                debug!(target: "gl", source = m.source, category = m.category, id = m.id, "{}", m.text)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GL access
// ---------------------------------------------------------------------------

/// Framebuffer queries, answered in the current GL context.
pub trait FramebufferQuery {
    /// Name of the framebuffer bound to `GL_FRAMEBUFFER`.
    fn bound_framebuffer(&self) -> u32;

    /// `glCheckFramebufferStatus(GL_FRAMEBUFFER)`.
    fn framebuffer_status(&self) -> u32;
}

/// The GL debug-message channel.
pub trait DebugChannel {
    fn has_extension(&self, name: &str) -> bool;

    /// Route every debug message to `sink`, synchronously with the GL call
    /// that produced it.
    fn install(&mut self, sink: Arc<dyn DebugSink>);
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Result of one framebuffer check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramebufferReport {
    pub framebuffer: u32,
    pub status: u32,
    pub status_name: &'static str,
}

impl FramebufferReport {
    pub fn is_complete(&self) -> bool {
        self.status == GL_FRAMEBUFFER_COMPLETE
    }
}

/// Diagnostic hooks for the GL integration.
pub struct DebugProbe {
    sink: Arc<dyn DebugSink>,
    channel_attached: bool,
}

impl std::fmt::Debug for DebugProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugProbe")
            .field("channel_attached", &self.channel_attached)
            .finish()
    }
}

impl Default for DebugProbe {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl DebugProbe {
    pub fn new(sink: Arc<dyn DebugSink>) -> Self {
        Self {
            sink,
            channel_attached: false,
        }
    }

    /// Attach to the debug channel if the context supports `GL_KHR_debug`.
    ///
    /// Returns whether the channel is now attached.
    pub fn attach(&mut self, channel: &mut dyn DebugChannel) -> bool {
        if self.channel_attached {
            return true;
        }
        if !channel.has_extension(KHR_DEBUG) {
            info!("{KHR_DEBUG} not available; GL debug messages disabled");
            return false;
        }
        channel.install(Arc::clone(&self.sink));
        self.channel_attached = true;
        info!("GL debug messages enabled");
        true
    }

    pub fn is_attached(&self) -> bool {
        self.channel_attached
    }

    /// Inspect the bound framebuffer, warning when it is incomplete.
    pub fn check_framebuffer(&self, gl: &dyn FramebufferQuery, tag: &str) -> FramebufferReport {
        let framebuffer = gl.bound_framebuffer();
        let status = gl.framebuffer_status();
        let report = FramebufferReport {
            framebuffer,
            status,
            status_name: framebuffer_status_name(status),
        };

        if report.is_complete() {
            debug!(tag, framebuffer, "Framebuffer complete");
        } else {
            warn!(
                tag,
                framebuffer,
                status = format_args!("0x{status:04x}"),
                status_name = report.status_name,
                "Framebuffer incomplete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<DebugMessage>>);

    impl DebugSink for RecordingSink {
        fn message(&self, message: &DebugMessage) {
            self.0.lock().unwrap().push(message.clone());
        }
    }

    struct FakeChannel {
        khr_debug: bool,
        installed: Option<Arc<dyn DebugSink>>,
    }

    impl DebugChannel for FakeChannel {
        fn has_extension(&self, name: &str) -> bool {
            self.khr_debug && name == KHR_DEBUG
        }

        fn install(&mut self, sink: Arc<dyn DebugSink>) {
            self.installed = Some(sink);
        }
    }

    struct FakeFramebuffer {
        id: u32,
        status: u32,
    }

    impl FramebufferQuery for FakeFramebuffer {
        fn bound_framebuffer(&self) -> u32 {
            self.id
        }
        fn framebuffer_status(&self) -> u32 {
            self.status
        }
    }

    #[test]
    fn names_known_statuses() {
        assert_eq!(
            framebuffer_status_name(0x8CD6),
            "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT"
        );
        assert_eq!(framebuffer_status_name(0x8CDD), "GL_FRAMEBUFFER_UNSUPPORTED");
        assert_eq!(framebuffer_status_name(0x1234), "unknown framebuffer status");
    }

    #[test]
    fn reports_incomplete_framebuffer() {
        let probe = DebugProbe::default();
        let report = probe.check_framebuffer(
            &FakeFramebuffer {
                id: 7,
                status: GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT,
            },
            "before render",
        );
        assert_eq!(report.framebuffer, 7);
        assert!(!report.is_complete());
        assert_eq!(
            report.status_name,
            "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT"
        );
    }

    #[test]
    fn complete_framebuffer_is_complete() {
        let probe = DebugProbe::default();
        let report = probe.check_framebuffer(
            &FakeFramebuffer {
                id: 0,
                status: GL_FRAMEBUFFER_COMPLETE,
            },
            "after render",
        );
        assert!(report.is_complete());
    }

    #[test]
    fn attaches_only_with_khr_debug() {
        let mut probe = DebugProbe::default();
        let mut without = FakeChannel {
            khr_debug: false,
            installed: None,
        };
        assert!(!probe.attach(&mut without));
        assert!(without.installed.is_none());

        let mut with = FakeChannel {
            khr_debug: true,
            installed: None,
        };
        assert!(probe.attach(&mut with));
        assert!(probe.is_attached());
        assert!(with.installed.is_some());
    }

    #[test]
    fn installed_sink_receives_messages() {
        let sink = Arc::new(RecordingSink::default());
        let mut probe = DebugProbe::new(sink.clone());
        let mut channel = FakeChannel {
            khr_debug: true,
            installed: None,
        };
        probe.attach(&mut channel);

        let message = DebugMessage {
            source: 0x8246,
            category: 0x824C,
            severity: DebugSeverity::from_gl(GL_DEBUG_SEVERITY_HIGH),
            id: 1281,
            text: "GL_INVALID_VALUE in glViewport".to_string(),
        };
        channel.installed.as_ref().unwrap().message(&message);

        let received = sink.0.lock().unwrap();
        assert_eq!(received.as_slice(), &[message]);
        assert_eq!(received[0].severity, DebugSeverity::High);
    }

    #[test]
    fn unknown_severity_is_notification() {
        assert_eq!(DebugSeverity::from_gl(0), DebugSeverity::Notification);
        assert_eq!(
            DebugSeverity::from_gl(GL_DEBUG_SEVERITY_MEDIUM),
            DebugSeverity::Medium
        );
    }
}
