//! Ownership arenas for values that cross the boundary inward.
//!
//! Every reference-typed value the engine hands over is attached to an
//! [`Arena`], which releases it exactly once when the arena ends. Two kinds
//! exist:
//!
//! - [`Lifetime`]: one logical unit of work on one thread. Released on drop.
//! - [`StaticLifetime`]: process-wide and internally synchronized. Released
//!   only when the library is torn down.
//!
//! Host code sees attached values through [`Handle`], which borrows its arena
//! and records its [`Ownership`].

mod bridging;
mod handle;
mod registry;
mod scope;

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use gdbind_sys::DestructorFn;

use crate::bridge::Bridge;
use crate::value::{Descriptor, PackedElement, PackedArrayRaw, StringNameRaw, StringRaw, VariantRaw, Marshal};

pub use handle::{Handle, Ownership};
pub use scope::{Lifetime, StaticLifetime};

pub(crate) use registry::Attachment;
pub use registry::Slot;

/// Process-unique identity of an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LifetimeId(NonZeroU64);

impl LifetimeId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let id = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for LifetimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) mod private {
    use super::{Attachment, Slot};

    /// Slot access. Not nameable outside the crate, so only this crate's
    /// arenas exist.
    pub trait Storage {
        fn attach_entry(&self, attachment: Attachment) -> Slot;
        fn detach_entry(&self, slot: Slot) -> Option<Attachment>;
        fn is_attached(&self, slot: Slot) -> bool;
        fn checks_ownership(&self) -> bool;
    }
}

/// A scope that owns native values and releases each of them exactly once.
pub trait Arena: private::Storage {
    fn id(&self) -> LifetimeId;

    /// Number of values currently waiting for release.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_released(&self) -> bool;

    /// Frees every attached value, most recent first, and invalidates the
    /// arena. Later calls free nothing.
    fn release(&self);

    /// Registers a native-owned descriptor for release by `release_fn`.
    fn attach<D: Descriptor>(&self, raw: D, release_fn: DestructorFn) -> Handle<'_, D>
    where
        Self: Sized,
    {
        let slot = self.attach_entry(Attachment::new(raw, release_fn));
        Handle::owned(raw, self, slot)
    }

    /// Takes ownership of a value a native call just returned.
    fn transfer_in<D: Descriptor>(&self, bridge: &Bridge, raw: D) -> Handle<'_, D>
    where
        Self: Sized,
    {
        self.attach(raw, bridge.destructor(D::VARIANT_TYPE))
    }

    /// Releases one value ahead of the arena. The handle must belong here.
    fn free<D: Descriptor>(&self, handle: Handle<'_, D>)
    where
        Self: Sized,
    {
        handle.free_in(self)
    }

    /// Builds an engine `String` owned by this arena.
    fn new_string(&self, bridge: &Bridge, text: &str) -> Handle<'_, StringRaw>
    where
        Self: Sized,
    {
        let raw = bridging::new_string(bridge, text);
        self.transfer_in(bridge, raw)
    }

    /// Builds an engine `StringName` owned by this arena.
    fn new_string_name(&self, bridge: &Bridge, text: &str) -> Handle<'_, StringNameRaw>
    where
        Self: Sized,
    {
        let raw = bridging::new_string_name(bridge, text);
        self.transfer_in(bridge, raw)
    }

    /// Builds a packed array holding a copy of `items`.
    fn new_packed<E: PackedElement>(&self, bridge: &Bridge, items: &[E]) -> Handle<'_, PackedArrayRaw<E>>
    where
        Self: Sized,
    {
        let raw = bridging::new_packed(bridge, items);
        self.transfer_in(bridge, raw)
    }

    /// Builds a packed string array holding copies of `items`.
    fn new_packed_strings(&self, bridge: &Bridge, items: &[&str]) -> Handle<'_, PackedArrayRaw<StringRaw>>
    where
        Self: Sized,
    {
        let raw = bridging::new_packed_strings(bridge, items);
        self.transfer_in(bridge, raw)
    }

    /// Wraps a value in the engine's generic value.
    fn new_variant<T: Marshal>(&self, bridge: &Bridge, value: &T) -> Handle<'_, VariantRaw>
    where
        Self: Sized,
    {
        let raw = bridging::new_variant(bridge, value);
        self.transfer_in(bridge, raw)
    }
}
