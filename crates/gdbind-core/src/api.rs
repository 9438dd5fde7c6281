//! The upstream interface as a trait.
//!
//! Everything above this module talks to the engine through [`NativeApi`],
//! so the same marshalling code runs against the loaded engine
//! ([`InterfaceTable`]) or an in-process fake.

use std::ffi::{CString, c_void};

use gdbind_sys::*;

/// The subset of the engine interface the binding layer calls.
///
/// Pointer arguments follow the engine's conventions: a `TypePtr` names
/// storage laid out for the given variant type, and output pointers name
/// uninitialized storage of the right size.
pub trait NativeApi: Send + Sync {
    /// Looks up the method bind of `class::method` with signature `hash`.
    /// Returns a null pointer when the engine has no such method.
    ///
    /// # Safety
    ///
    /// `class` and `method` must point at live string names.
    unsafe fn get_method_bind(&self, class: ConstTypePtr, method: ConstTypePtr, hash: i64) -> MethodBindPtr;

    /// Calls a method bind with a pointer-per-argument table.
    ///
    /// # Safety
    ///
    /// `args` must hold `arg_count` pointers, each to a value laid out as the
    /// method declares. `ret` must point at storage for the return type, or be
    /// null for methods returning nothing. `instance` must be null exactly for
    /// static methods.
    unsafe fn method_bind_ptrcall(
        &self,
        method: MethodBindPtr,
        instance: ObjectPtr,
        args: *const ConstTypePtr,
        arg_count: usize,
        ret: TypePtr,
    );

    /// Release function for values of `ty`. Generic values (`Nil`) are
    /// released by the engine's `variant_destroy`, everything else through the
    /// per-type destructor table.
    fn destructor(&self, ty: VariantType) -> Option<DestructorFn>;

    fn constructor(&self, ty: VariantType, index: i32) -> Option<ConstructorFn>;

    /// # Safety
    ///
    /// `method` must point at a live string name.
    unsafe fn builtin_method(&self, ty: VariantType, method: ConstTypePtr, hash: i64) -> Option<BuiltinMethodFn>;

    fn variant_from_type(&self, ty: VariantType) -> Option<VariantFromTypeFn>;

    fn variant_to_type(&self, ty: VariantType) -> Option<VariantToTypeFn>;

    /// # Safety
    ///
    /// `out` must point at uninitialized storage for one string.
    unsafe fn string_new(&self, out: TypePtr, contents: &str);

    /// # Safety
    ///
    /// `out` must point at uninitialized storage for one string name.
    unsafe fn string_name_new(&self, out: TypePtr, contents: &str);

    /// Copies up to `buf.len()` UTF-8 bytes of a string into `buf` and returns
    /// the full byte length of the string.
    ///
    /// # Safety
    ///
    /// `value` must point at a live string.
    unsafe fn string_to_utf8(&self, value: ConstTypePtr, buf: &mut [u8]) -> usize;

    /// Address of element `index` of a packed array.
    ///
    /// # Safety
    ///
    /// `array` must point at a live packed array of type `ty` and `index` must
    /// be in bounds.
    unsafe fn packed_index(&self, ty: VariantType, array: TypePtr, index: i64) -> *mut c_void;

    /// # Safety
    ///
    /// `name` must point at a live string name.
    unsafe fn global_singleton(&self, name: ConstTypePtr) -> ObjectPtr;

    /// # Safety
    ///
    /// `object` must be a live, manually managed engine object.
    unsafe fn object_destroy(&self, object: ObjectPtr);

    fn print_error(&self, message: &str, function: &str, file: &str, line: u32);

    fn print_warning(&self, message: &str, function: &str, file: &str, line: u32);
}

fn c_string(text: &str) -> CString {
    CString::new(text.replace('\0', " ")).unwrap_or_default()
}

impl NativeApi for InterfaceTable {
    unsafe fn get_method_bind(&self, class: ConstTypePtr, method: ConstTypePtr, hash: i64) -> MethodBindPtr {
        unsafe { (self.classdb_get_method_bind)(class, method, hash) }
    }

    unsafe fn method_bind_ptrcall(
        &self,
        method: MethodBindPtr,
        instance: ObjectPtr,
        args: *const ConstTypePtr,
        arg_count: usize,
        ret: TypePtr,
    ) {
        // Object ptrcalls carry no count; the bind knows its own arity.
        debug_assert!(arg_count == 0 || !args.is_null());
        unsafe { (self.object_method_bind_ptrcall)(method, instance, args, ret) }
    }

    fn destructor(&self, ty: VariantType) -> Option<DestructorFn> {
        if ty == VariantType::Nil {
            return Some(self.variant_destroy);
        }
        unsafe { (self.variant_get_ptr_destructor)(ty.into()) }
    }

    fn constructor(&self, ty: VariantType, index: i32) -> Option<ConstructorFn> {
        unsafe { (self.variant_get_ptr_constructor)(ty.into(), index) }
    }

    unsafe fn builtin_method(&self, ty: VariantType, method: ConstTypePtr, hash: i64) -> Option<BuiltinMethodFn> {
        unsafe { (self.variant_get_ptr_builtin_method)(ty.into(), method, hash) }
    }

    fn variant_from_type(&self, ty: VariantType) -> Option<VariantFromTypeFn> {
        unsafe { (self.get_variant_from_type_constructor)(ty.into()) }
    }

    fn variant_to_type(&self, ty: VariantType) -> Option<VariantToTypeFn> {
        unsafe { (self.get_variant_to_type_constructor)(ty.into()) }
    }

    unsafe fn string_new(&self, out: TypePtr, contents: &str) {
        unsafe { (self.string_new_with_utf8_chars_and_len)(out, contents.as_ptr().cast(), contents.len() as i64) }
    }

    unsafe fn string_name_new(&self, out: TypePtr, contents: &str) {
        unsafe { (self.string_name_new_with_utf8_chars_and_len)(out, contents.as_ptr().cast(), contents.len() as i64) }
    }

    unsafe fn string_to_utf8(&self, value: ConstTypePtr, buf: &mut [u8]) -> usize {
        let len = unsafe { (self.string_to_utf8_chars)(value, buf.as_mut_ptr().cast(), buf.len() as i64) };
        len.max(0) as usize
    }

    unsafe fn packed_index(&self, ty: VariantType, array: TypePtr, index: i64) -> *mut c_void {
        match self.packed_operator_index(ty) {
            Some(index_fn) => unsafe { index_fn(array, index) },
            None => std::ptr::null_mut(),
        }
    }

    unsafe fn global_singleton(&self, name: ConstTypePtr) -> ObjectPtr {
        unsafe { (self.global_get_singleton)(name) }
    }

    unsafe fn object_destroy(&self, object: ObjectPtr) {
        unsafe { (self.object_destroy)(object) }
    }

    fn print_error(&self, message: &str, function: &str, file: &str, line: u32) {
        let (message, function, file) = (c_string(message), c_string(function), c_string(file));
        unsafe { (self.print_error)(message.as_ptr(), function.as_ptr(), file.as_ptr(), line as i32, 0) }
    }

    fn print_warning(&self, message: &str, function: &str, file: &str, line: u32) {
        let (message, function, file) = (c_string(message), c_string(function), c_string(file));
        unsafe { (self.print_warning)(message.as_ptr(), function.as_ptr(), file.as_ptr(), line as i32, 0) }
    }
}
