//! Bindings to the engine's object and method surface.
//!
//! The marshalling core lives in [`gdbind_core`]; this crate adds the
//! process-wide [`engine`] state, the library entry points and the class
//! wrappers built on top of them.

pub mod classes;
pub mod engine;

pub use gdbind_core::{
    Arena, BindingConfig, BindingError, BindingProperty, BindingResult, Bridge, CallFrame, Handle, LazyMethod,
    Lifetime, MethodBinding, NativeApi, ObjectRef, Ownership, RawValue, StaticLifetime, value,
};
pub use gdbind_sys as sys;

pub use engine::Engine;

pub mod prelude {
    pub use crate::classes::*;
    pub use crate::engine::{self, Engine};
    pub use gdbind_core::lifetime::{Arena, Handle, Lifetime, Ownership, StaticLifetime};
    pub use gdbind_core::value::*;
    pub use gdbind_core::{BindingConfig, BindingError, BindingProperty, BindingResult, CallFrame, ObjectRef};
}
