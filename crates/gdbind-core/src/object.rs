//! Engine object references.
//!
//! Objects are never reference counted by the binding layer. A reference
//! obtained from the engine either belongs to the engine (singletons, nodes
//! in a tree) or must be destroyed manually.

use gdbind_sys::{ConstTypePtr, ObjectPtr};

use crate::bridge::Bridge;
use crate::error::{BindingError, BindingResult};
use crate::lifetime::Arena;
use crate::value::StringNameRaw;

/// A non-null engine object pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectRef(ObjectPtr);

impl ObjectRef {
    /// Wraps `ptr`, or `None` when it is null.
    pub fn new(ptr: ObjectPtr) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr))
    }

    pub fn as_ptr(self) -> ObjectPtr {
        self.0
    }

    /// Looks up an engine singleton by class name.
    pub fn singleton(bridge: &Bridge, name: &str) -> BindingResult<Self> {
        let tmp = bridge.lifetime();
        let name_raw: StringNameRaw = tmp.new_string_name(bridge, name).raw();
        // SAFETY: `name_raw` stays attached to `tmp` for the call.
        let ptr = unsafe { bridge.api().global_singleton(ConstTypePtr(std::ptr::from_ref(&name_raw).cast())) };
        Self::new(ptr).ok_or_else(|| BindingError::MissingSingleton { name: name.to_string() })
    }

    /// Frees a manually managed object.
    ///
    /// # Safety
    ///
    /// The object must be alive and not owned by the engine (not a singleton,
    /// not reference counted, not inside a scene tree). No copy of this
    /// reference may be used afterwards.
    pub unsafe fn destroy(self, bridge: &Bridge) {
        log::debug!("destroying object {:p}", self.0.0);
        unsafe { bridge.api().object_destroy(self.0) }
    }
}

impl From<ObjectRef> for ObjectPtr {
    fn from(object: ObjectRef) -> Self {
        object.0
    }
}
