//! GL function-pointer resolution against the host's current context.
//!
//! The engine does not load GL bindings of its own; every entry point it
//! needs is looked up through the host window, and must come from the same
//! context the engine will later render with.

use std::ffi::CStr;

use tracing::{debug, error};

use crate::error::BridgeError;

/// Identity of a host GL context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlContextId(pub usize);

impl std::fmt::Display for GlContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gl#{:x}", self.0)
    }
}

/// The host window's GL loader.
pub trait GlHost {
    /// Context current on the calling thread, if any.
    fn current_context(&self) -> Option<GlContextId>;

    /// Address of `name` in the current context, 0 when absent.
    fn proc_address(&self, name: &CStr) -> usize;
}

/// Entry points resolved up front while binding a render context. A zero
/// result for any of them makes the context unusable.
pub const ESSENTIAL_GL_FUNCTIONS: &[&CStr] = &[
    c"glGetString",
    c"glGetIntegerv",
    c"glBindFramebuffer",
    c"glViewport",
    c"glBindTexture",
    c"glDrawArrays",
];

/// Resolves GL names for one bound context.
///
/// Bound to whatever context is current when created; refuses to resolve
/// once a different context has become current.
pub struct ProcAddressResolver<'h> {
    host: &'h dyn GlHost,
    bound: GlContextId,
    lookups: usize,
    misses: usize,
}

impl std::fmt::Debug for ProcAddressResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcAddressResolver")
            .field("bound", &self.bound)
            .field("lookups", &self.lookups)
            .field("misses", &self.misses)
            .finish()
    }
}

impl<'h> ProcAddressResolver<'h> {
    /// Bind to the host's current context.
    pub fn bind(host: &'h dyn GlHost) -> Result<Self, BridgeError> {
        let bound = host.current_context().ok_or(BridgeError::NoCurrentContext)?;
        debug!(context = %bound, "Proc-address resolver bound");
        Ok(Self {
            host,
            bound,
            lookups: 0,
            misses: 0,
        })
    }

    pub fn bound_context(&self) -> GlContextId {
        self.bound
    }

    /// Whether the bound context is still the current one.
    pub fn is_current(&self) -> bool {
        self.host.current_context() == Some(self.bound)
    }

    /// Address of `name`, or 0 when it is absent or the wrong context is
    /// current.
    pub fn resolve(&mut self, name: &CStr) -> usize {
        self.lookups += 1;

        let current = self.host.current_context();
        if current != Some(self.bound) {
            error!(
                function = ?name,
                bound = %self.bound,
                current = ?current,
                "GL lookup with a different context current"
            );
            self.misses += 1;
            return 0;
        }

        let address = self.host.proc_address(name);
        if address == 0 {
            self.misses += 1;
            debug!(function = ?name, "GL function not available");
        }
        address
    }

    /// Resolve every [`ESSENTIAL_GL_FUNCTIONS`] entry.
    pub fn resolve_essentials(&mut self) -> Result<(), BridgeError> {
        for name in ESSENTIAL_GL_FUNCTIONS {
            if self.resolve(name) == 0 {
                return Err(BridgeError::MissingGlFunction(
                    name.to_string_lossy().into_owned(),
                ));
            }
        }
        Ok(())
    }

    /// Number of `resolve` calls made so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    /// Number of lookups that returned 0.
    pub fn misses(&self) -> usize {
        self.misses
    }
}
