//! Error types for the binding layer.
//!
//! Most of these never reach a caller as a value: ABI mismatches and
//! ownership violations go through [`fatal`]. The `Result`-returning entry
//! points exist for startup validation and for tests.

use gdbind_sys::{MissingProc, VariantType};
use thiserror::Error;

use crate::lifetime::LifetimeId;

/// Errors raised by the marshalling and ownership layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The engine does not export an interface function.
    #[error("ABI mismatch: {0}")]
    MissingProc(#[from] MissingProc),

    /// The engine has no method bind for this class, method and hash.
    #[error("ABI mismatch: no method bind for {class}::{method} (hash {hash})")]
    MissingMethod {
        class: String,
        method: String,
        hash: i64,
    },

    /// The engine returned no destructor for a reference type.
    #[error("ABI mismatch: no destructor for {ty:?}")]
    MissingDestructor { ty: VariantType },

    /// The engine returned no constructor for a type.
    #[error("ABI mismatch: no constructor #{index} for {ty:?}")]
    MissingConstructor { ty: VariantType, index: i32 },

    /// The engine returned no builtin method for a type.
    #[error("ABI mismatch: no builtin method {ty:?}::{method}")]
    MissingBuiltinMethod { ty: VariantType, method: &'static str },

    /// The engine has no variant conversion for a type.
    #[error("ABI mismatch: no variant conversion for {ty:?}")]
    MissingVariantConversion { ty: VariantType },

    /// A named singleton is not registered with the engine.
    #[error("singleton `{name}` is not registered")]
    MissingSingleton { name: String },

    /// A handle was read after its lifetime released it.
    #[error("use after release: value belongs to released lifetime {lifetime}")]
    UseAfterRelease { lifetime: LifetimeId },

    /// Ownership was requested from a handle that does not own its value.
    #[error("handle does not own its value")]
    NotOwned,

    /// A handle was passed to a lifetime other than the one owning it.
    #[error("value owned by lifetime {actual} was handed to lifetime {expected}")]
    ForeignLifetime {
        expected: LifetimeId,
        actual: LifetimeId,
    },

    /// Encoded bytes do not have the width the type requires.
    #[error("size mismatch for {ty:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        ty: VariantType,
        expected: usize,
        actual: usize,
    },

    /// A generic value carried a tag outside the known range.
    #[error("unknown variant type tag {0}")]
    UnknownVariantType(u32),

    /// A packed array was tagged with a type that is not a packed array.
    #[error("{0:?} is not a packed array type")]
    NotPackedArray(VariantType),

    /// A generic value holds a different type than requested.
    #[error("variant holds {actual:?}, expected {expected:?}")]
    VariantTypeMismatch {
        expected: VariantType,
        actual: VariantType,
    },

    /// Native string data was not valid UTF-8.
    #[error("invalid UTF-8 string data")]
    InvalidUtf8,

    /// The render-thread queue is at capacity.
    #[error("render thread queue is full")]
    RenderQueueFull,

    /// The consuming side of the render-thread queue is gone.
    #[error("render thread queue is closed")]
    RenderQueueClosed,

    #[error("engine bindings are already initialized")]
    AlreadyInitialized,

    #[error("engine bindings are not initialized")]
    NotInitialized,
}

impl BindingError {
    pub fn missing_method(class: &str, method: &str, hash: i64) -> Self {
        BindingError::MissingMethod {
            class: class.to_string(),
            method: method.to_string(),
            hash,
        }
    }

    /// Whether this error means the engine does not match the bindings.
    pub fn is_abi_mismatch(&self) -> bool {
        matches!(
            self,
            BindingError::MissingProc(_)
                | BindingError::MissingMethod { .. }
                | BindingError::MissingDestructor { .. }
                | BindingError::MissingConstructor { .. }
                | BindingError::MissingBuiltinMethod { .. }
                | BindingError::MissingVariantConversion { .. }
        )
    }
}

pub type BindingResult<T> = Result<T, BindingError>;

/// Reports an unrecoverable binding error and stops the current thread.
///
/// Continuing past an ABI mismatch or an ownership violation would corrupt
/// engine memory on the next call.
#[cold]
#[track_caller]
pub fn fatal(err: BindingError) -> ! {
    log::error!("{err}");
    panic!("{err}");
}
