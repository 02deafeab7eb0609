//! Render-context lifecycle against an in-memory engine and GL host.

use std::cell::Cell;
use std::ffi::CStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lm_common::{LogicalSize, PhysicalSize};
use lm_engine::EngineHandle;
use lm_render_bridge::{
    BridgeError, BridgeState, FrameReadyCallback, FrameTarget, GlContextId, GlHost,
    ProcAddressResolver, RenderApi, RenderBackend, RenderContext, RenderOutcome, SkipReason,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeHost {
    current: Cell<Option<GlContextId>>,
    missing: Option<&'static str>,
}

impl FakeHost {
    fn current(id: usize) -> Self {
        Self {
            current: Cell::new(Some(GlContextId(id))),
            missing: None,
        }
    }

    fn make_current(&self, id: Option<usize>) {
        self.current.set(id.map(GlContextId));
    }
}

impl GlHost for FakeHost {
    fn current_context(&self) -> Option<GlContextId> {
        self.current.get()
    }

    fn proc_address(&self, name: &CStr) -> usize {
        match self.missing {
            Some(missing) if name.to_bytes() == missing.as_bytes() => 0,
            _ => 0x7f00_0000 + name.to_bytes().len(),
        }
    }
}

#[derive(Default)]
struct Ledger {
    /// Engine render contexts currently alive.
    live: usize,
    created: usize,
    renders: Vec<(u32, PhysicalSize, bool)>,
    callback: Option<FrameReadyCallback>,
    /// Whether the bound context was current at each engine lookup.
    lookups_in_bound_context: Vec<bool>,
}

#[derive(Clone)]
struct FakeBackend {
    ledger: Arc<Mutex<Ledger>>,
    engine: usize,
    has_frame: bool,
    fail_render: bool,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            engine: 0x1000,
            has_frame: true,
            fail_render: false,
        }
    }

    fn live(&self) -> usize {
        self.ledger.lock().live
    }

    fn render_calls(&self) -> Vec<(u32, PhysicalSize, bool)> {
        self.ledger.lock().renders.clone()
    }

    /// Fire the installed frame-ready callback the way an engine thread would.
    fn fire(&self) -> bool {
        let callback = self.ledger.lock().callback.clone();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

struct FakeApi {
    ledger: Arc<Mutex<Ledger>>,
    has_frame: bool,
    fail_render: bool,
}

impl RenderApi for FakeApi {
    fn render(&mut self, target: &FrameTarget, flip_y: bool) -> Result<RenderOutcome, BridgeError> {
        if !self.has_frame {
            return Ok(RenderOutcome::Skipped(SkipReason::NoFrame));
        }
        if self.fail_render {
            return Err(BridgeError::Render {
                code: -1,
                message: "error".to_string(),
            });
        }
        self.ledger
            .lock()
            .renders
            .push((target.target_id, target.size, flip_y));
        Ok(RenderOutcome::Rendered)
    }

    fn set_update_callback(&mut self, callback: Option<FrameReadyCallback>) {
        self.ledger.lock().callback = callback;
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        let mut ledger = self.ledger.lock();
        ledger.live -= 1;
        ledger.callback = None;
    }
}

impl RenderBackend for FakeBackend {
    type Api = FakeApi;

    fn engine_handle(&self) -> EngineHandle {
        EngineHandle::from_ptr(self.engine as *mut std::ffi::c_void)
    }

    fn create(&self, resolver: &mut ProcAddressResolver<'_>) -> Result<FakeApi, BridgeError> {
        // An engine resolves many names, repeatedly.
        for name in [c"glGenTextures", c"glTexImage2D", c"glUseProgram", c"glGenTextures"] {
            let current = resolver.is_current();
            self.ledger.lock().lookups_in_bound_context.push(current);
            if resolver.resolve(name) == 0 {
                return Err(BridgeError::MissingGlFunction(
                    name.to_string_lossy().into_owned(),
                ));
            }
        }

        let mut ledger = self.ledger.lock();
        ledger.live += 1;
        ledger.created += 1;
        Ok(FakeApi {
            ledger: Arc::clone(&self.ledger),
            has_frame: self.has_frame,
            fail_render: self.fail_render,
        })
    }
}

fn bound_context(host: &FakeHost, backend: &FakeBackend) -> RenderContext<FakeApi> {
    let mut resolver = ProcAddressResolver::bind(host).unwrap();
    let mut context = RenderContext::new();
    context.initialize(backend, &mut resolver).unwrap();
    context
}

fn counting_callback() -> (FrameReadyCallback, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    let callback: FrameReadyCallback = Arc::new(move || {
        inner.fetch_add(1, Ordering::SeqCst);
    });
    (callback, count)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn playback_to_end_of_stream_then_release() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();

    // Surface created at 400x300, ratio 1.0.
    let mut context = bound_context(&host, &backend);
    assert_eq!(context.state(), BridgeState::Bound);

    let (callback, repaints) = counting_callback();
    context.set_frame_ready_callback(Some(callback));
    assert!(backend.fire());
    assert_eq!(repaints.load(Ordering::SeqCst), 1);

    let target = FrameTarget::from_logical(7, LogicalSize::new(400.0, 300.0), 1.0);
    assert_eq!(context.render_frame(&target, true).unwrap(), RenderOutcome::Rendered);
    assert_eq!(
        backend.render_calls(),
        vec![(7, PhysicalSize::new(400, 300), true)]
    );

    // A repaint request already in flight when end of stream arrives.
    let in_flight = backend.ledger.lock().callback.clone().unwrap();

    // End of stream: disarm.
    context.set_frame_ready_callback(None);
    assert!(!context.is_callback_armed());
    assert!(!backend.fire());

    context.release();
    assert_eq!(context.state(), BridgeState::Released);
    assert_eq!(backend.live(), 0);

    in_flight();
    assert_eq!(repaints.load(Ordering::SeqCst), 1);

    // Stray render after release.
    assert_eq!(
        context.render_frame(&target, true).unwrap(),
        RenderOutcome::Skipped(SkipReason::NotBound)
    );
    assert_eq!(backend.render_calls().len(), 1);
}

#[test]
fn initialize_then_release_leaks_nothing() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();
    assert_eq!(backend.live(), 0);

    let mut context = bound_context(&host, &backend);
    assert_eq!(backend.live(), 1);
    context.release();
    assert_eq!(backend.live(), 0);
}

#[test]
fn render_before_initialize_is_noop() {
    let mut context: RenderContext<FakeApi> = RenderContext::new();
    let target = FrameTarget::new(1, PhysicalSize::new(640, 480), 1.0);
    assert_eq!(
        context.render_frame(&target, true).unwrap(),
        RenderOutcome::Skipped(SkipReason::NotBound)
    );
    assert_eq!(context.stats().skipped, 1);
}

#[test]
fn double_release_matches_single_release() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();

    let mut once = bound_context(&host, &backend);
    once.release();
    let after_once = (once.state(), once.stats(), backend.live());

    let mut twice = bound_context(&host, &backend);
    twice.release();
    twice.release();
    let after_twice = (twice.state(), twice.stats(), backend.live());

    assert_eq!(after_once, after_twice);
    assert_eq!(backend.ledger.lock().created, 2);
}

#[test]
fn dropping_a_bound_context_releases_it() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();
    {
        let _context = bound_context(&host, &backend);
        assert_eq!(backend.live(), 1);
    }
    assert_eq!(backend.live(), 0);
}

#[test]
fn render_uses_physical_dimensions() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();
    let mut context = bound_context(&host, &backend);

    let target = FrameTarget::from_logical(3, LogicalSize::new(400.0, 300.0), 2.0);
    context.render_frame(&target, true).unwrap();

    assert_eq!(
        backend.render_calls(),
        vec![(3, PhysicalSize::new(800, 600), true)]
    );
}

#[test]
fn empty_target_is_skipped() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();
    let mut context = bound_context(&host, &backend);

    let target = FrameTarget::from_logical(3, LogicalSize::new(400.0, 0.0), 1.0);
    assert_eq!(
        context.render_frame(&target, true).unwrap(),
        RenderOutcome::Skipped(SkipReason::EmptyTarget)
    );
    assert!(backend.render_calls().is_empty());
}

#[test]
fn no_frame_yet_is_a_skip() {
    let host = FakeHost::current(1);
    let backend = FakeBackend {
        has_frame: false,
        ..FakeBackend::new()
    };
    let mut context = bound_context(&host, &backend);

    let target = FrameTarget::new(0, PhysicalSize::new(320, 240), 1.0);
    assert_eq!(
        context.render_frame(&target, true).unwrap(),
        RenderOutcome::Skipped(SkipReason::NoFrame)
    );
    assert_eq!(context.stats().rendered, 0);
}

#[test]
fn engine_render_failure_is_reported() {
    let host = FakeHost::current(1);
    let backend = FakeBackend {
        fail_render: true,
        ..FakeBackend::new()
    };
    let mut context = bound_context(&host, &backend);

    let target = FrameTarget::new(0, PhysicalSize::new(320, 240), 1.0);
    assert!(matches!(
        context.render_frame(&target, true),
        Err(BridgeError::Render { .. })
    ));
    assert_eq!(context.stats().failed, 1);
    assert!(context.is_bound());
}

#[test]
fn engine_lookups_happen_in_bound_context() {
    let host = FakeHost::current(42);
    let backend = FakeBackend::new();
    let _context = bound_context(&host, &backend);

    let checks = backend.ledger.lock().lookups_in_bound_context.clone();
    assert_eq!(checks.len(), 4);
    assert!(checks.iter().all(|&current| current));
}

#[test]
fn initialize_fails_without_current_context() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();
    let mut resolver = ProcAddressResolver::bind(&host).unwrap();

    // Another context became current between binding and initializing.
    host.make_current(Some(2));
    let mut context = RenderContext::new();
    assert!(matches!(
        context.initialize(&backend, &mut resolver),
        Err(BridgeError::NoCurrentContext)
    ));
    assert_eq!(context.state(), BridgeState::Uninitialized);
    assert_eq!(backend.ledger.lock().created, 0);

    host.make_current(None);
    assert!(matches!(
        ProcAddressResolver::bind(&host),
        Err(BridgeError::NoCurrentContext)
    ));
}

#[test]
fn missing_essential_function_is_fatal() {
    let host = FakeHost {
        missing: Some("glViewport"),
        ..FakeHost::current(1)
    };
    let backend = FakeBackend::new();
    let mut resolver = ProcAddressResolver::bind(&host).unwrap();
    let mut context = RenderContext::new();

    match context.initialize(&backend, &mut resolver) {
        Err(BridgeError::MissingGlFunction(name)) => assert_eq!(name, "glViewport"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(backend.live(), 0);
    assert_eq!(context.state(), BridgeState::Uninitialized);
}

#[test]
fn second_initialize_is_rejected() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();
    let mut context = bound_context(&host, &backend);

    let mut resolver = ProcAddressResolver::bind(&host).unwrap();
    assert!(matches!(
        context.initialize(&backend, &mut resolver),
        Err(BridgeError::AlreadyInitialized)
    ));
    assert_eq!(backend.live(), 1);

    context.release();
    assert!(matches!(
        context.initialize(&backend, &mut resolver),
        Err(BridgeError::AlreadyInitialized)
    ));
}

#[test]
fn arming_before_initialize_is_ignored() {
    let mut context: RenderContext<FakeApi> = RenderContext::new();
    let (callback, _) = counting_callback();
    context.set_frame_ready_callback(Some(callback));
    assert!(!context.is_callback_armed());
}

#[test]
fn rebind_drains_old_context_first() {
    let host = FakeHost::current(1);
    let first = FakeBackend::new();
    let mut context = bound_context(&host, &first);

    let (callback, repaints) = counting_callback();
    context.set_frame_ready_callback(Some(callback));
    let stale = first.ledger.lock().callback.clone().unwrap();
    let old_liveness = context.liveness();

    let second = FakeBackend {
        engine: 0x2000,
        ..FakeBackend::new()
    };
    let mut resolver = ProcAddressResolver::bind(&host).unwrap();
    context.rebind(&second, &mut resolver).unwrap();

    assert_eq!(first.live(), 0);
    assert_eq!(second.live(), 1);
    assert!(!old_liveness.is_alive());
    assert!(context.liveness().is_alive());
    assert!(!context.is_callback_armed());
    assert_eq!(context.engine_handle(), Some(second.engine_handle()));

    // A repaint queued against the old binding does nothing.
    stale();
    assert_eq!(repaints.load(Ordering::SeqCst), 0);

    let target = FrameTarget::new(9, PhysicalSize::new(100, 50), 1.0);
    assert_eq!(context.render_frame(&target, true).unwrap(), RenderOutcome::Rendered);
    assert!(first.render_calls().is_empty());
    assert_eq!(second.render_calls().len(), 1);
}

#[test]
fn failed_rebind_leaves_context_released() {
    let host = FakeHost::current(1);
    let first = FakeBackend::new();
    let mut context = bound_context(&host, &first);
    let old_liveness = context.liveness();

    let broken = FakeHost {
        missing: Some("glViewport"),
        ..FakeHost::current(1)
    };
    let second = FakeBackend {
        engine: 0x2000,
        ..FakeBackend::new()
    };
    let mut resolver = ProcAddressResolver::bind(&broken).unwrap();
    let err = context.rebind(&second, &mut resolver).unwrap_err();
    assert!(matches!(err, BridgeError::MissingGlFunction(ref name) if name == "glViewport"));

    // The old binding is gone and nothing claims otherwise.
    assert_eq!(first.live(), 0);
    assert_eq!(second.live(), 0);
    assert!(!old_liveness.is_alive());
    assert_eq!(context.state(), BridgeState::Released);
    assert!(!context.is_bound());
    assert_eq!(context.engine_handle(), None);

    let target = FrameTarget::new(9, PhysicalSize::new(100, 50), 1.0);
    assert_eq!(
        context.render_frame(&target, true).unwrap(),
        RenderOutcome::Skipped(SkipReason::NotBound)
    );
}

#[test]
fn rebind_requires_a_bound_context() {
    let host = FakeHost::current(1);
    let backend = FakeBackend::new();

    // Released is terminal.
    let mut released = bound_context(&host, &backend);
    released.release();
    let mut resolver = ProcAddressResolver::bind(&host).unwrap();
    assert!(matches!(
        released.rebind(&backend, &mut resolver),
        Err(BridgeError::NotBound)
    ));
    assert_eq!(released.state(), BridgeState::Released);
    assert_eq!(backend.live(), 0);

    // Never initialized.
    let mut fresh: RenderContext<FakeApi> = RenderContext::new();
    assert!(matches!(
        fresh.rebind(&backend, &mut resolver),
        Err(BridgeError::NotBound)
    ));
    assert_eq!(fresh.state(), BridgeState::Uninitialized);
    assert_eq!(backend.ledger.lock().created, 1);
}
