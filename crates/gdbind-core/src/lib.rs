//! Marshalling core of the engine bindings.
//!
//! Four pieces sit between generated wrappers and the engine:
//!
//! - [`value`]: exact byte layouts of everything that crosses the boundary.
//! - [`lifetime`]: arenas that own engine-allocated values and release them
//!   exactly once.
//! - [`frame`]: the per-call argument buffer and return slot.
//! - [`bridge`]: method bind resolution and the native call itself.
//!
//! [`render_queue`] carries work over to the render thread. Everything talks
//! to the engine through the [`NativeApi`] trait.

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod frame;
pub mod lifetime;
pub mod logging;
pub mod object;
pub mod render_queue;
pub mod value;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use gdbind_sys as sys;

pub use api::NativeApi;
pub use bridge::{Bridge, LazyMethod, MethodBinding, MethodFlags, MethodKey};
pub use config::{BindingConfig, BindingProperty};
pub use error::{BindingError, BindingResult, fatal};
pub use frame::{CallFrame, FinishedFrame, RawReturnSlot, ReturnSlot};
pub use lifetime::{Arena, Handle, Lifetime, LifetimeId, Ownership, StaticLifetime};
pub use logging::{EngineLogger, install_logger};
pub use object::ObjectRef;
pub use render_queue::{RenderDrain, RenderPoster, RenderTask, render_queue};
pub use value::{Encode, Marshal, RawValue};
