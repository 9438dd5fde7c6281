use std::cell::RefCell;

use parking_lot::Mutex;

use super::registry::{Attachment, Registry, Slot};
use super::{Arena, LifetimeId, private::Storage};
use crate::config::BindingConfig;
use crate::error::{BindingError, fatal};

fn release_pending(id: LifetimeId, pending: Option<Vec<Attachment>>, explicit: bool) {
    match pending {
        Some(pending) => {
            log::debug!("releasing lifetime {id}: {} value(s)", pending.len());
            for attachment in pending {
                attachment.run();
            }
        }
        None if explicit => log::warn!("lifetime {id} released more than once"),
        None => {}
    }
}

/// Transient arena for one unit of work on one thread.
///
/// Values attached here are released when [`Arena::release`] is called or
/// when the `Lifetime` is dropped, whichever comes first.
///
/// ```
/// # use gdbind_core::lifetime::{Arena, Lifetime};
/// let tmp = Lifetime::new();
/// assert!(tmp.is_empty());
/// tmp.release();
/// assert!(tmp.is_released());
/// ```
///
/// Handles borrow their lifetime, so they cannot escape it:
///
/// ```compile_fail
/// # use gdbind_core::lifetime::{Arena, Handle, Lifetime};
/// # use gdbind_core::value::StringRaw;
/// # unsafe extern "C" fn noop(_: gdbind_sys::TypePtr) {}
/// let escaped: Handle<'static, StringRaw> = {
///     let tmp = Lifetime::new();
///     tmp.attach(StringRaw([1]), noop)
/// };
/// ```
pub struct Lifetime {
    id: LifetimeId,
    registry: RefCell<Registry>,
    check_ownership: bool,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::with_checks(cfg!(debug_assertions))
    }

    pub fn with_config(config: &BindingConfig) -> Self {
        Self::with_checks(config.check_ownership())
    }

    fn with_checks(check_ownership: bool) -> Self {
        Self {
            id: LifetimeId::next(),
            registry: RefCell::new(Registry::default()),
            check_ownership,
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for Lifetime {
    fn attach_entry(&self, attachment: Attachment) -> Slot {
        let slot = self.registry.borrow_mut().attach(attachment);
        slot.unwrap_or_else(|| fatal(BindingError::UseAfterRelease { lifetime: self.id }))
    }

    fn detach_entry(&self, slot: Slot) -> Option<Attachment> {
        self.registry.borrow_mut().detach(slot)
    }

    fn is_attached(&self, slot: Slot) -> bool {
        self.registry.borrow().is_attached(slot)
    }

    fn checks_ownership(&self) -> bool {
        self.check_ownership
    }
}

impl Arena for Lifetime {
    fn id(&self) -> LifetimeId {
        self.id
    }

    fn len(&self) -> usize {
        self.registry.borrow().live()
    }

    fn is_released(&self) -> bool {
        self.registry.borrow().is_released()
    }

    fn release(&self) {
        // The borrow ends before any destructor runs.
        let pending = self.registry.borrow_mut().drain();
        release_pending(self.id, pending, true);
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        let pending = self.registry.get_mut().drain();
        release_pending(self.id, pending, false);
    }
}

/// Process-wide arena for values that outlive any single call.
///
/// Shared between threads, so every operation takes an internal lock. It is
/// never released on drop; the library releases it once at teardown.
pub struct StaticLifetime {
    id: LifetimeId,
    registry: Mutex<Registry>,
    check_ownership: bool,
}

impl StaticLifetime {
    pub fn new() -> Self {
        Self::with_checks(cfg!(debug_assertions))
    }

    pub fn with_config(config: &BindingConfig) -> Self {
        Self::with_checks(config.check_ownership())
    }

    fn with_checks(check_ownership: bool) -> Self {
        Self {
            id: LifetimeId::next(),
            registry: Mutex::new(Registry::default()),
            check_ownership,
        }
    }
}

impl Default for StaticLifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for StaticLifetime {
    fn attach_entry(&self, attachment: Attachment) -> Slot {
        let slot = self.registry.lock().attach(attachment);
        slot.unwrap_or_else(|| fatal(BindingError::UseAfterRelease { lifetime: self.id }))
    }

    fn detach_entry(&self, slot: Slot) -> Option<Attachment> {
        self.registry.lock().detach(slot)
    }

    fn is_attached(&self, slot: Slot) -> bool {
        self.registry.lock().is_attached(slot)
    }

    fn checks_ownership(&self) -> bool {
        self.check_ownership
    }
}

impl Arena for StaticLifetime {
    fn id(&self) -> LifetimeId {
        self.id
    }

    fn len(&self) -> usize {
        self.registry.lock().live()
    }

    fn is_released(&self) -> bool {
        self.registry.lock().is_released()
    }

    fn release(&self) {
        let pending = self.registry.lock().drain();
        release_pending(self.id, pending, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ArrayRaw, StringRaw};
    use gdbind_sys::TypePtr;
    use std::cell::RefCell;

    thread_local! {
        static FREED: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn record_free(value: TypePtr) {
        let word = unsafe { *(value.0 as *const u64) };
        FREED.with(|freed| freed.borrow_mut().push(word));
    }

    fn freed() -> Vec<u64> {
        FREED.with(|freed| freed.borrow_mut().drain(..).collect())
    }

    #[test]
    fn release_frees_each_value_once_in_reverse() {
        let tmp = Lifetime::new();
        tmp.attach(StringRaw([10]), record_free);
        tmp.attach(ArrayRaw([20]), record_free);
        assert_eq!(tmp.len(), 2);

        tmp.release();
        assert_eq!(freed(), vec![20, 10]);
        assert!(tmp.is_released());
        assert_eq!(tmp.len(), 0);

        tmp.release();
        drop(tmp);
        assert!(freed().is_empty());
    }

    #[test]
    fn drop_releases() {
        {
            let tmp = Lifetime::new();
            tmp.attach(StringRaw([5]), record_free);
        }
        assert_eq!(freed(), vec![5]);
    }

    #[test]
    fn lifetimes_have_distinct_ids() {
        let a = Lifetime::new();
        let b = Lifetime::new();
        let c = StaticLifetime::new();
        assert_ne!(a.id(), b.id());
        assert_ne!(b.id(), c.id());
    }

    #[test]
    #[should_panic(expected = "use after release")]
    fn attaching_to_released_lifetime_is_fatal() {
        let tmp = Lifetime::new();
        tmp.release();
        tmp.attach(StringRaw([1]), record_free);
    }

    #[test]
    fn static_lifetime_reuses_slots_of_freed_values() {
        let global = StaticLifetime::new();
        let keep = global.attach(StringRaw([1]), record_free);
        for word in 0..10_000 {
            let handle = global.attach(ArrayRaw([word]), record_free);
            global.free(handle);
        }
        assert_eq!(freed().len(), 10_000);
        assert_eq!(global.len(), 1);
        assert_eq!(global.registry.lock().capacity(), 2);
        assert!(keep.is_live());

        global.release();
        assert_eq!(freed(), vec![1]);
    }

    #[test]
    fn promoted_then_detached_values_leave_no_slot_behind() {
        let global = StaticLifetime::new();
        for word in 0..100 {
            let tmp = Lifetime::new();
            let promoted = tmp.attach(StringRaw([word]), record_free).promote(&global).unwrap();
            assert_eq!(promoted.transfer_out(), Ok(StringRaw([word])));
        }
        assert!(global.is_empty());
        assert_eq!(global.registry.lock().capacity(), 1);
        assert!(freed().is_empty());
    }

    #[test]
    fn static_lifetime_is_shared_across_threads() {
        let shared = std::sync::Arc::new(StaticLifetime::new());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared.attach(StringRaw([i]), record_free);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(shared.len(), 4);
        shared.release();
        assert!(shared.is_released());
        assert!(shared.is_empty());
    }
}
