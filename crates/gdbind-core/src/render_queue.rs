//! Posting work to the thread that owns rendering.
//!
//! Some engine methods may only run on the render thread. Any thread can
//! [`post`](RenderPoster::post) a callback; the render thread runs everything
//! pending the next time it calls [`drain`](RenderDrain::drain). Nothing is
//! returned to the poster.

use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};

use crate::error::{BindingError, BindingResult};

pub type RenderTask = Box<dyn FnOnce() + Send + 'static>;

/// Creates a connected producer/consumer pair. `None` means unbounded.
pub fn render_queue(capacity: Option<usize>) -> (RenderPoster, RenderDrain) {
    let (tx, rx) = match capacity {
        Some(capacity) => channel::bounded(capacity),
        None => channel::unbounded(),
    };
    (
        RenderPoster { tx },
        RenderDrain {
            rx,
            owner: OnceLock::new(),
        },
    )
}

/// Producing side. Deliberately not `Clone`.
pub struct RenderPoster {
    tx: Sender<RenderTask>,
}

impl RenderPoster {
    pub fn post<F>(&self, task: F) -> BindingResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.tx.try_send(Box::new(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(BindingError::RenderQueueFull),
            Err(TrySendError::Disconnected(_)) => Err(BindingError::RenderQueueClosed),
        }
    }
}

/// Consuming side, bound to the first thread that drains it.
pub struct RenderDrain {
    rx: Receiver<RenderTask>,
    owner: OnceLock<ThreadId>,
}

impl RenderDrain {
    /// Number of tasks waiting.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.get().copied()
    }

    /// Runs the tasks that were pending when called and returns how many ran.
    ///
    /// Tasks posted while draining wait for the next call.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn drain(&self) -> usize {
        let current = thread::current().id();
        let owner = *self.owner.get_or_init(|| current);
        debug_assert_eq!(owner, current, "render queue drained from a second thread");

        let pending = self.rx.len();
        let mut ran = 0;
        while ran < pending {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if ran > 0 {
            log::trace!("ran {ran} render thread task(s)");
        }
        ran
    }
}
