//! The engine's function table, resolved by name at load time.

use std::ffi::c_char;

use thiserror::Error;

use crate::pointers::*;
use crate::variant_type::VariantType;

/// Lookup function handed to the library entry point by the engine.
pub type GetProcAddressFn = unsafe extern "C" fn(name: *const c_char) -> Option<InterfaceFn>;

/// An interface function the binding depends on is absent from the loaded
/// engine. The engine and the binding disagree on the ABI version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interface function `{name}` is not provided by the engine")]
pub struct MissingProc {
    pub name: &'static str,
}

/// Resolves one interface function and reinterprets it as `F`.
///
/// # Safety
///
/// `F` must be the exact function pointer type the engine exports under
/// `name`, and `name` must be NUL terminated.
unsafe fn load_proc<F: Copy>(get_proc_address: GetProcAddressFn, name: &'static str) -> Result<F, MissingProc> {
    debug_assert!(name.ends_with('\0'));
    debug_assert_eq!(size_of::<F>(), size_of::<InterfaceFn>());

    let proc = unsafe { get_proc_address(name.as_ptr().cast()) }.ok_or(MissingProc {
        name: name.trim_end_matches('\0'),
    })?;

    // SAFETY: caller guarantees `F` is the signature exported under `name`.
    Ok(unsafe { std::mem::transmute_copy::<InterfaceFn, F>(&proc) })
}

macro_rules! interface_table {
    ($($(#[$meta:meta])* $field:ident: $ty:ty = $name:literal,)*) => {
        /// Every interface function the binding calls, resolved once.
        #[derive(Clone, Copy)]
        pub struct InterfaceTable {
            $($(#[$meta])* pub $field: $ty,)*
        }

        impl InterfaceTable {
            /// Resolves every entry through `get_proc_address`.
            ///
            /// Fails on the first missing function.
            ///
            /// # Safety
            ///
            /// `get_proc_address` must be the lookup function the engine passed
            /// to the library entry point.
            pub unsafe fn load(get_proc_address: GetProcAddressFn) -> Result<Self, MissingProc> {
                Ok(Self {
                    $($field: unsafe { load_proc::<$ty>(get_proc_address, concat!($name, "\0"))? },)*
                })
            }
        }
    };
}

interface_table! {
    classdb_get_method_bind: ClassdbGetMethodBindFn = "classdb_get_method_bind",
    object_method_bind_ptrcall: MethodBindPtrcallFn = "object_method_bind_ptrcall",

    variant_get_ptr_destructor: GetPtrDestructorFn = "variant_get_ptr_destructor",
    /// Releases a generic value. The per-type table has no entry for `Nil`.
    variant_destroy: DestructorFn = "variant_destroy",
    variant_get_ptr_constructor: GetPtrConstructorFn = "variant_get_ptr_constructor",
    variant_get_ptr_builtin_method: GetPtrBuiltinMethodFn = "variant_get_ptr_builtin_method",
    get_variant_from_type_constructor: GetVariantFromTypeConstructorFn = "get_variant_from_type_constructor",
    get_variant_to_type_constructor: GetVariantToTypeConstructorFn = "get_variant_to_type_constructor",

    string_new_with_utf8_chars_and_len: StringNewWithUtf8CharsAndLenFn = "string_new_with_utf8_chars_and_len",
    string_name_new_with_utf8_chars_and_len: StringNewWithUtf8CharsAndLenFn = "string_name_new_with_utf8_chars_and_len",
    string_to_utf8_chars: StringToUtf8CharsFn = "string_to_utf8_chars",

    packed_byte_array_operator_index: PackedOperatorIndexFn = "packed_byte_array_operator_index",
    packed_int32_array_operator_index: PackedOperatorIndexFn = "packed_int32_array_operator_index",
    packed_int64_array_operator_index: PackedOperatorIndexFn = "packed_int64_array_operator_index",
    packed_float32_array_operator_index: PackedOperatorIndexFn = "packed_float32_array_operator_index",
    packed_float64_array_operator_index: PackedOperatorIndexFn = "packed_float64_array_operator_index",
    packed_string_array_operator_index: PackedOperatorIndexFn = "packed_string_array_operator_index",
    packed_vector2_array_operator_index: PackedOperatorIndexFn = "packed_vector2_array_operator_index",
    packed_vector3_array_operator_index: PackedOperatorIndexFn = "packed_vector3_array_operator_index",
    packed_color_array_operator_index: PackedOperatorIndexFn = "packed_color_array_operator_index",
    packed_vector4_array_operator_index: PackedOperatorIndexFn = "packed_vector4_array_operator_index",

    global_get_singleton: GlobalGetSingletonFn = "global_get_singleton",
    object_destroy: ObjectDestroyFn = "object_destroy",
    print_error: PrintErrorFn = "print_error",
    print_warning: PrintErrorFn = "print_warning",
}

impl InterfaceTable {
    /// Element accessor for a packed array type, `None` for anything else.
    pub fn packed_operator_index(&self, ty: VariantType) -> Option<PackedOperatorIndexFn> {
        use VariantType::*;
        Some(match ty {
            PackedByteArray => self.packed_byte_array_operator_index,
            PackedInt32Array => self.packed_int32_array_operator_index,
            PackedInt64Array => self.packed_int64_array_operator_index,
            PackedFloat32Array => self.packed_float32_array_operator_index,
            PackedFloat64Array => self.packed_float64_array_operator_index,
            PackedStringArray => self.packed_string_array_operator_index,
            PackedVector2Array => self.packed_vector2_array_operator_index,
            PackedVector3Array => self.packed_vector3_array_operator_index,
            PackedColorArray => self.packed_color_array_operator_index,
            PackedVector4Array => self.packed_vector4_array_operator_index,
            _ => return None,
        })
    }
}
