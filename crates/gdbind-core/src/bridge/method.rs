//! Method identity, resolved bindings and their caches.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use gdbind_sys::MethodBindPtr;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::xxh64;

use super::Bridge;

mod key_constants {
    /// Domain marker for the owning class.
    pub const CLASS: u64 = 0x6c8e9cf570932bd5;
    /// Domain marker for the method name.
    pub const METHOD: u64 = 0x2d358dccaa6c78a5;
    /// Multiplier that makes (class, method) order significant.
    pub const SEP: u64 = 0x9e3779b97f4a7c15;
}

/// Deterministic identity of a (class, method, signature hash) triple.
///
/// The same triple always produces the same key, so a key can be computed
/// before the method is ever resolved.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MethodKey(pub u64);

impl MethodKey {
    #[inline]
    pub fn new(class: &str, method: &str, hash: i64) -> Self {
        let class_hash = key_constants::CLASS ^ xxh64(class.as_bytes(), 0);
        let method_hash = key_constants::METHOD ^ xxh64(method.as_bytes(), 0);
        MethodKey(
            class_hash
                .wrapping_mul(key_constants::SEP)
                .wrapping_add(method_hash)
                .wrapping_mul(key_constants::SEP)
                .wrapping_add(hash as u64),
        )
    }
}

impl fmt::Debug for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodKey({:#018x})", self.0)
    }
}

bitflags! {
    /// Method properties as recorded in the engine's class database.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u32 {
        const NORMAL = 1 << 0;
        const EDITOR = 1 << 1;
        const CONST = 1 << 2;
        const VIRTUAL = 1 << 3;
        const VARARG = 1 << 4;
        const STATIC = 1 << 5;
    }
}

impl Default for MethodFlags {
    fn default() -> Self {
        MethodFlags::NORMAL
    }
}

/// A resolved native method: stable for the rest of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodBinding {
    pub ptr: MethodBindPtr,
    pub key: MethodKey,
    pub flags: MethodFlags,
}

impl MethodBinding {
    pub fn with_flags(self, flags: MethodFlags) -> Self {
        Self { flags, ..self }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }
}

type Slot = Arc<OnceLock<Option<MethodBinding>>>;

/// Process-wide registry of resolved bindings.
///
/// Each key owns a run-once cell, so concurrent first resolutions of the
/// same method perform one engine lookup between them.
#[derive(Default)]
pub(crate) struct MethodCache {
    slots: RwLock<FxHashMap<MethodKey, Slot>>,
}

impl MethodCache {
    pub(crate) fn slot(&self, key: MethodKey) -> Slot {
        if let Some(slot) = self.slots.read().get(&key) {
            return slot.clone();
        }
        self.slots.write().entry(key).or_default().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.read().len()
    }
}

/// Call-site cache for one method, usable as a `static`.
///
/// After the first call the binding is read with a single atomic load and no
/// lock. A `LazyMethod` remembers the first bridge it resolved against, so it
/// is meant for the one process-wide bridge.
///
/// ```
/// use gdbind_core::bridge::{LazyMethod, MethodFlags};
///
/// static GET_FRAMES_DRAWN: LazyMethod =
///     LazyMethod::new("Engine", "get_frames_drawn", 3905245786).with_flags(MethodFlags::CONST);
/// assert_eq!(GET_FRAMES_DRAWN.method(), "get_frames_drawn");
/// ```
pub struct LazyMethod {
    class: &'static str,
    method: &'static str,
    hash: i64,
    flags: MethodFlags,
    cell: OnceLock<MethodBinding>,
}

impl LazyMethod {
    pub const fn new(class: &'static str, method: &'static str, hash: i64) -> Self {
        Self {
            class,
            method,
            hash,
            flags: MethodFlags::NORMAL,
            cell: OnceLock::new(),
        }
    }

    pub const fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn class(&self) -> &'static str {
        self.class
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Resolves on first use; fatal when the engine lacks the method.
    #[inline]
    pub fn get(&self, bridge: &Bridge) -> MethodBinding {
        *self
            .cell
            .get_or_init(|| bridge.resolve(self.class, self.method, self.hash).with_flags(self.flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BindingConfig;
    use crate::mock::MockEngine;

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(
            MethodKey::new("RenderingServer", "free_rid", 2722037293),
            MethodKey::new("RenderingServer", "free_rid", 2722037293)
        );
    }

    #[test]
    fn keys_separate_every_component() {
        let base = MethodKey::new("A", "b", 1);
        assert_ne!(base, MethodKey::new("B", "b", 1));
        assert_ne!(base, MethodKey::new("A", "c", 1));
        assert_ne!(base, MethodKey::new("A", "b", 2));
        assert_ne!(MethodKey::new("ab", "c", 0), MethodKey::new("a", "bc", 0));
    }

    #[test]
    fn flags_default_to_normal() {
        let binding = MethodBinding {
            ptr: MethodBindPtr::NULL,
            key: MethodKey(0),
            flags: MethodFlags::default(),
        };
        assert!(!binding.is_static());
        assert!(binding.with_flags(MethodFlags::STATIC).is_static());
    }

    #[test]
    fn lazy_method_reads_without_the_cache_lock() {
        let engine = Arc::new(MockEngine::new());
        engine.define("Time", "get_ticks_usec", 11, |_, _, _| {});
        let bridge = Bridge::new(engine, BindingConfig::default()).unwrap();
        let lazy = LazyMethod::new("Time", "get_ticks_usec", 11);
        let first = lazy.get(&bridge);

        // parking_lot locks are not reentrant: a read here would deadlock.
        let _held = bridge.methods.slots.write();
        assert_eq!(lazy.get(&bridge), first);
    }

    #[test]
    fn cache_hands_out_one_slot_per_key() {
        let cache = MethodCache::default();
        let a = cache.slot(MethodKey(1));
        let b = cache.slot(MethodKey(1));
        assert!(Arc::ptr_eq(&a, &b));
        cache.slot(MethodKey(2));
        assert_eq!(cache.len(), 2);
    }
}
