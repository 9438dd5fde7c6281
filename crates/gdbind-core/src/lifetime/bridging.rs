//! Construction and inspection of engine strings, packed arrays and
//! generic values.

use std::ptr;

use gdbind_sys::{ConstTypePtr, TypePtr, VariantType};

use super::Handle;
use crate::bridge::Bridge;
use crate::error::{BindingError, BindingResult};
use crate::value::{Marshal, PackedArrayRaw, PackedElement, StringNameRaw, StringRaw, VariantRaw};

const PACKED_RESIZE_HASH: i64 = 848867239;
const PACKED_SIZE_HASH: i64 = 3173160232;

fn type_ptr<T>(value: &mut T) -> TypePtr {
    TypePtr(ptr::from_mut(value).cast())
}

fn const_type_ptr<T>(value: &T) -> ConstTypePtr {
    ConstTypePtr(ptr::from_ref(value).cast())
}

pub(super) fn new_string(bridge: &Bridge, text: &str) -> StringRaw {
    let mut raw = StringRaw::default();
    // SAFETY: `raw` is storage for exactly one string.
    unsafe { bridge.api().string_new(type_ptr(&mut raw), text) };
    raw
}

pub(super) fn new_string_name(bridge: &Bridge, text: &str) -> StringNameRaw {
    let mut raw = StringNameRaw::default();
    // SAFETY: `raw` is storage for exactly one string name.
    unsafe { bridge.api().string_name_new(type_ptr(&mut raw), text) };
    raw
}

fn read_string(bridge: &Bridge, value: ConstTypePtr) -> BindingResult<String> {
    // SAFETY: callers pass a pointer to a live string.
    let len = unsafe { bridge.api().string_to_utf8(value, &mut []) };
    let mut buf = vec![0u8; len];
    unsafe { bridge.api().string_to_utf8(value, &mut buf) };
    String::from_utf8(buf).map_err(|_| BindingError::InvalidUtf8)
}

fn packed_resize<E: PackedElement>(bridge: &Bridge, raw: &mut PackedArrayRaw<E>, len: usize) {
    let resize = bridge.builtin_method(E::PACKED_TYPE, "resize", PACKED_RESIZE_HASH);
    let new_len = len as i64;
    let args = [const_type_ptr(&new_len)];
    let mut status = 0i64;
    // SAFETY: `resize(int) -> int` on a live packed array of `E`.
    unsafe { resize(type_ptr(raw), args.as_ptr(), type_ptr(&mut status), 1) };
    if status != 0 {
        log::warn!("resizing {:?} to {len} returned error {status}", E::PACKED_TYPE);
    }
}

fn packed_len<E: PackedElement>(bridge: &Bridge, raw: &mut PackedArrayRaw<E>) -> usize {
    let size = bridge.builtin_method(E::PACKED_TYPE, "size", PACKED_SIZE_HASH);
    let mut len = 0i64;
    // SAFETY: `size() -> int` on a live packed array of `E`.
    unsafe { size(type_ptr(raw), ptr::null(), type_ptr(&mut len), 0) };
    len.max(0) as usize
}

fn packed_slot<E: PackedElement>(bridge: &Bridge, raw: &mut PackedArrayRaw<E>, index: usize) -> *mut E {
    // SAFETY: callers only pass indices below the array's length.
    unsafe { bridge.api().packed_index(E::PACKED_TYPE, type_ptr(raw), index as i64) }.cast()
}

fn new_empty_packed<E: PackedElement>(bridge: &Bridge) -> PackedArrayRaw<E> {
    let construct = bridge.constructor(E::PACKED_TYPE, 0);
    let mut raw = PackedArrayRaw::<E>::default();
    // SAFETY: constructor #0 is the default constructor and takes no arguments.
    unsafe { construct(type_ptr(&mut raw), ptr::null()) };
    raw
}

pub(super) fn new_packed<E: PackedElement>(bridge: &Bridge, items: &[E]) -> PackedArrayRaw<E> {
    let mut raw = new_empty_packed::<E>(bridge);
    if items.is_empty() {
        return raw;
    }
    packed_resize(bridge, &mut raw, items.len());
    for (index, item) in items.iter().enumerate() {
        // SAFETY: index is below the new length and elements are plain data.
        unsafe { packed_slot(bridge, &mut raw, index).write(*item) };
    }
    raw
}

pub(super) fn new_packed_strings(bridge: &Bridge, items: &[&str]) -> PackedArrayRaw<StringRaw> {
    let mut raw = new_empty_packed::<StringRaw>(bridge);
    if items.is_empty() {
        return raw;
    }
    packed_resize(bridge, &mut raw, items.len());
    let destroy = bridge.destructor(VariantType::String);
    for (index, item) in items.iter().enumerate() {
        let slot = TypePtr(packed_slot(bridge, &mut raw, index).cast());
        // SAFETY: the slot holds the empty string `resize` created.
        unsafe {
            destroy(slot);
            bridge.api().string_new(slot, item);
        }
    }
    raw
}

pub(super) fn new_variant<T: Marshal>(bridge: &Bridge, value: &T) -> VariantRaw {
    let from_type = bridge.variant_from_type(T::VARIANT_TYPE);
    let mut copy = *value;
    let mut raw = VariantRaw::default();
    // SAFETY: `copy` is laid out as `T::VARIANT_TYPE`; the engine copies it.
    unsafe { from_type(type_ptr(&mut raw), type_ptr(&mut copy)) };
    raw
}

impl Handle<'_, StringRaw> {
    /// Copies the engine string into a host `String`.
    pub fn to_string(&self, bridge: &Bridge) -> BindingResult<String> {
        let raw = self.raw();
        read_string(bridge, const_type_ptr(&raw))
    }
}

impl<E: PackedElement> Handle<'_, PackedArrayRaw<E>> {
    pub fn len(&self, bridge: &Bridge) -> usize {
        let mut raw = self.raw();
        packed_len(bridge, &mut raw)
    }

    pub fn is_empty(&self, bridge: &Bridge) -> bool {
        self.len(bridge) == 0
    }

    /// Copies the elements out. For string arrays the elements are borrowed
    /// descriptors; use [`Handle::to_strings`] instead.
    pub fn to_vec(&self, bridge: &Bridge) -> Vec<E> {
        let mut raw = self.raw();
        let len = packed_len(bridge, &mut raw);
        (0..len)
            // SAFETY: index is below the length just read.
            .map(|index| unsafe { packed_slot(bridge, &mut raw, index).read() })
            .collect()
    }
}

impl Handle<'_, PackedArrayRaw<StringRaw>> {
    pub fn to_strings(&self, bridge: &Bridge) -> BindingResult<Vec<String>> {
        let mut raw = self.raw();
        let len = packed_len(bridge, &mut raw);
        (0..len)
            .map(|index| {
                let slot = packed_slot(bridge, &mut raw, index);
                read_string(bridge, ConstTypePtr(slot.cast_const().cast()))
            })
            .collect()
    }
}

impl Handle<'_, VariantRaw> {
    pub fn variant_type(&self) -> BindingResult<VariantType> {
        self.raw().variant_type()
    }

    /// Extracts the held value.
    ///
    /// Reference types come back as fresh descriptors owned by the caller;
    /// pass them to [`Arena::transfer_in`](super::Arena::transfer_in).
    pub fn get<T: Marshal>(&self, bridge: &Bridge) -> BindingResult<T> {
        let actual = self.variant_type()?;
        if actual != T::VARIANT_TYPE {
            return Err(BindingError::VariantTypeMismatch {
                expected: T::VARIANT_TYPE,
                actual,
            });
        }
        let to_type = bridge.variant_to_type(T::VARIANT_TYPE);
        let mut raw = self.raw();
        let mut out = [0u64; 8];
        // SAFETY: `out` is 64 aligned bytes, enough for any value type.
        unsafe { to_type(TypePtr(out.as_mut_ptr().cast()), type_ptr(&mut raw)) };
        let bytes = unsafe { std::slice::from_raw_parts(out.as_ptr().cast::<u8>(), size_of_val(&out)) };
        Ok(T::decode(bytes))
    }
}
