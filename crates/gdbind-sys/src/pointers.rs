//! Opaque pointer kinds and function signatures of the native interface.

use std::ffi::{c_char, c_void};

macro_rules! opaque_ptr {
    ($(#[$meta:meta])* $name:ident($inner:ty) = $null:expr) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub $inner);

        impl $name {
            /// The null pointer of this kind.
            pub const NULL: Self = Self($null);

            #[inline]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }
    };
}

opaque_ptr!(
    /// Engine object instance. Null for static method calls.
    ObjectPtr(*mut c_void) = std::ptr::null_mut()
);
opaque_ptr!(
    /// Resolved method bind. Stable for the lifetime of the process.
    MethodBindPtr(*const c_void) = std::ptr::null()
);
opaque_ptr!(
    /// Mutable pointer to a value laid out per its variant type.
    TypePtr(*mut c_void) = std::ptr::null_mut()
);
opaque_ptr!(
    /// Read-only pointer to a value laid out per its variant type.
    ConstTypePtr(*const c_void) = std::ptr::null()
);

// Method binds are immutable engine data shared by every thread.
unsafe impl Send for MethodBindPtr {}
unsafe impl Sync for MethodBindPtr {}

// Object pointers are never dereferenced on the host side; thread affinity is
// the engine's concern.
unsafe impl Send for ObjectPtr {}
unsafe impl Sync for ObjectPtr {}

impl TypePtr {
    #[inline]
    pub fn as_const(self) -> ConstTypePtr {
        ConstTypePtr(self.0)
    }
}

/// Untyped entry point returned by `get_proc_address`.
pub type InterfaceFn = unsafe extern "C" fn();

pub type ClassdbGetMethodBindFn =
    unsafe extern "C" fn(class: ConstTypePtr, method: ConstTypePtr, hash: i64) -> MethodBindPtr;
pub type MethodBindPtrcallFn = unsafe extern "C" fn(
    method: MethodBindPtr,
    instance: ObjectPtr,
    args: *const ConstTypePtr,
    ret: TypePtr,
);

pub type DestructorFn = unsafe extern "C" fn(value: TypePtr);
pub type ConstructorFn = unsafe extern "C" fn(base: TypePtr, args: *const ConstTypePtr);
pub type BuiltinMethodFn =
    unsafe extern "C" fn(base: TypePtr, args: *const ConstTypePtr, ret: TypePtr, arg_count: i32);
pub type VariantFromTypeFn = unsafe extern "C" fn(variant: TypePtr, value: TypePtr);
pub type VariantToTypeFn = unsafe extern "C" fn(value: TypePtr, variant: TypePtr);

pub type GetPtrDestructorFn = unsafe extern "C" fn(ty: u32) -> Option<DestructorFn>;
pub type GetPtrConstructorFn = unsafe extern "C" fn(ty: u32, index: i32) -> Option<ConstructorFn>;
pub type GetPtrBuiltinMethodFn =
    unsafe extern "C" fn(ty: u32, method: ConstTypePtr, hash: i64) -> Option<BuiltinMethodFn>;
pub type GetVariantFromTypeConstructorFn = unsafe extern "C" fn(ty: u32) -> Option<VariantFromTypeFn>;
pub type GetVariantToTypeConstructorFn = unsafe extern "C" fn(ty: u32) -> Option<VariantToTypeFn>;

pub type StringNewWithUtf8CharsAndLenFn =
    unsafe extern "C" fn(out: TypePtr, contents: *const c_char, len: i64);
pub type StringToUtf8CharsFn =
    unsafe extern "C" fn(value: ConstTypePtr, buf: *mut c_char, max_len: i64) -> i64;
pub type PackedOperatorIndexFn = unsafe extern "C" fn(array: TypePtr, index: i64) -> *mut c_void;

pub type GlobalGetSingletonFn = unsafe extern "C" fn(name: ConstTypePtr) -> ObjectPtr;
pub type ObjectDestroyFn = unsafe extern "C" fn(object: ObjectPtr);
pub type PrintErrorFn = unsafe extern "C" fn(
    description: *const c_char,
    function: *const c_char,
    file: *const c_char,
    line: i32,
    editor_notify: u8,
);
