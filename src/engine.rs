//! Process-wide binding state.
//!
//! The extension entry point initializes one [`Engine`] per process. It is
//! never torn down: [`deinitialize`] releases the values owned by the static
//! scope and closes the render queue, but the accessor keeps working so late
//! callers fail loudly instead of reading freed state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use gdbind_core::{
    BindingConfig, BindingError, BindingResult, Bridge, NativeApi, RenderDrain, RenderPoster, StaticLifetime,
    fatal, install_logger, render_queue,
};
use gdbind_core::lifetime::Arena;
use gdbind_sys::{GetProcAddressFn, InterfaceTable};
use parking_lot::Mutex;

static ENGINE: OnceLock<Engine> = OnceLock::new();

pub struct Engine {
    bridge: Bridge,
    statics: StaticLifetime,
    poster: Mutex<Option<RenderPoster>>,
    drain: RenderDrain,
    shut_down: AtomicBool,
}

impl Engine {
    fn new(api: Arc<dyn NativeApi>, config: BindingConfig) -> BindingResult<Self> {
        let statics = StaticLifetime::with_config(&config);
        let (poster, drain) = render_queue(config.render_queue_capacity());
        let bridge = Bridge::new(api, config)?;
        Ok(Self {
            bridge,
            statics,
            poster: Mutex::new(Some(poster)),
            drain,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Scope for values that live until the library is unloaded.
    pub fn statics(&self) -> &StaticLifetime {
        &self.statics
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Queues `task` for the render thread.
    pub fn call_on_render_thread<F>(&self, task: F) -> BindingResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match &*self.poster.lock() {
            Some(poster) => poster.post(task),
            None => Err(BindingError::RenderQueueClosed),
        }
    }

    /// Runs queued render-thread work. Call from the render thread only.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn drain_render_queue(&self) -> usize {
        self.drain.drain()
    }
}

/// Installs the process-wide engine. Fails if one is already installed.
pub fn init(api: Arc<dyn NativeApi>, config: BindingConfig) -> BindingResult<&'static Engine> {
    if ENGINE.get().is_some() {
        return Err(BindingError::AlreadyInitialized);
    }
    let logger_api = config.forward_logs_to_engine().then(|| api.clone());
    let engine = Engine::new(api, config)?;
    let mut fresh = false;
    let installed = ENGINE.get_or_init(|| {
        fresh = true;
        engine
    });
    if !fresh {
        return Err(BindingError::AlreadyInitialized);
    }
    // Logger last, so a failed init leaves nothing global behind.
    if let Some(api) = logger_api {
        install_logger(api, installed.bridge.config());
    }
    log::debug!("bindings initialized");
    Ok(installed)
}

/// Loads the interface table through `get_proc_address` and installs the
/// engine.
///
/// # Safety
///
/// `get_proc_address` must be the engine's own lookup function, and every
/// proc it returns must have the signature its name implies.
pub unsafe fn initialize_from_proc_address(
    get_proc_address: GetProcAddressFn,
    config: BindingConfig,
) -> BindingResult<&'static Engine> {
    let table = unsafe { InterfaceTable::load(get_proc_address) }?;
    init(Arc::new(table), config)
}

/// The installed engine, if any.
pub fn try_get() -> Option<&'static Engine> {
    ENGINE.get()
}

/// The installed engine. Calling this before [`init`] is fatal.
pub fn get() -> &'static Engine {
    try_get().unwrap_or_else(|| fatal(BindingError::NotInitialized))
}

/// Library teardown: closes the render queue and, unless configured
/// otherwise, releases the static scope. Later calls do nothing.
pub fn deinitialize() -> BindingResult<()> {
    let engine = try_get().ok_or(BindingError::NotInitialized)?;
    if engine.shut_down.swap(true, Ordering::AcqRel) {
        return Ok(());
    }
    engine.poster.lock().take();
    if engine.bridge.config().release_static_on_deinit() {
        engine.statics.release();
    } else {
        log::debug!("leaving {} static value(s) to the process", engine.statics.len());
    }
    Ok(())
}
