//! In-process stand-in for the engine, for tests and benches.
//!
//! Reference-typed values are boxed [`MockObject`]s whose address is stored
//! in the descriptor's first word (the generic value keeps its payload from
//! the second word on). Every allocation and release is counted in a
//! per-thread ledger, so a test can assert that nothing leaked and nothing
//! was freed twice.

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

use gdbind_sys::*;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::api::NativeApi;
use crate::value::StringRaw;

/// Heap value behind a mock descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum MockObject {
    Text(String),
    Packed { element: usize, data: Vec<u8> },
}

#[derive(Default)]
struct Ledger {
    outstanding: isize,
    frees: Vec<(VariantType, u64)>,
    variant_destroys: usize,
}

thread_local! {
    static LEDGER: RefCell<Ledger> = RefCell::new(Ledger::default());
}

/// Allocations on this thread not yet released.
pub fn outstanding() -> isize {
    LEDGER.with(|ledger| ledger.borrow().outstanding)
}

/// Every destructor call on this thread as (type, first descriptor word).
pub fn frees() -> Vec<(VariantType, u64)> {
    LEDGER.with(|ledger| ledger.borrow().frees.clone())
}

/// Destructor calls on this thread for one type.
pub fn frees_of(ty: VariantType) -> Vec<u64> {
    frees().into_iter().filter(|(t, _)| *t == ty).map(|(_, word)| word).collect()
}

/// Generic values released on this thread through the engine's
/// `variant_destroy` entry.
pub fn variant_destroys() -> usize {
    LEDGER.with(|ledger| ledger.borrow().variant_destroys)
}

pub fn reset_ledger() {
    LEDGER.with(|ledger| *ledger.borrow_mut() = Ledger::default());
}

fn alloc(object: MockObject) -> u64 {
    LEDGER.with(|ledger| ledger.borrow_mut().outstanding += 1);
    Box::into_raw(Box::new(object)) as u64
}

/// # Safety
///
/// `word` must be zero or come from [`alloc`] and not have been freed.
unsafe fn object<'a>(word: u64) -> Option<&'a mut MockObject> {
    unsafe { (word as *mut MockObject).as_mut() }
}

/// Boxes a string as the engine would return it from a call.
pub fn new_string(text: &str) -> StringRaw {
    StringRaw([alloc(MockObject::Text(text.to_string()))])
}

/// Reads a mock string or string name through a pointer to its descriptor.
///
/// # Safety
///
/// `value` must point at a live mock string descriptor.
pub unsafe fn read_text(value: ConstTypePtr) -> String {
    let word = unsafe { *(value.0 as *const u64) };
    match unsafe { object(word) } {
        Some(MockObject::Text(text)) => text.clone(),
        _ => String::new(),
    }
}

/// Copies the elements of a mock packed array out through a pointer to its
/// descriptor.
///
/// # Safety
///
/// `value` must point at a live mock packed array whose elements are `E`.
pub unsafe fn read_packed<E: Copy>(value: ConstTypePtr) -> Vec<E> {
    let word = unsafe { *(value.0 as *const u64) };
    match unsafe { object(word) } {
        Some(MockObject::Packed { data, .. }) => data
            .chunks_exact(size_of::<E>())
            .map(|chunk| unsafe { chunk.as_ptr().cast::<E>().read_unaligned() })
            .collect(),
        _ => Vec::new(),
    }
}

/// Reads argument `index` as `T`.
///
/// # Safety
///
/// `args[index]` must point at a valid `T`.
pub unsafe fn arg<T: Copy>(args: &[ConstTypePtr], index: usize) -> T {
    unsafe { (args[index].0 as *const T).read_unaligned() }
}

/// Writes a method's return value.
///
/// # Safety
///
/// `ret` must point at storage for a `T`.
pub unsafe fn ret<T>(ret: TypePtr, value: T) {
    unsafe { (ret.0 as *mut T).write_unaligned(value) }
}

fn element_size(ty: VariantType) -> usize {
    use VariantType::*;
    match ty {
        PackedByteArray => 1,
        PackedInt32Array | PackedFloat32Array => 4,
        PackedInt64Array | PackedFloat64Array | PackedStringArray | PackedVector2Array => 8,
        PackedVector3Array => 12,
        PackedColorArray | PackedVector4Array => 16,
        _ => 0,
    }
}

fn tag(raw: u32) -> VariantType {
    VariantType::try_from(raw).unwrap_or_default()
}

/// Releases whatever `words` refers to, treating it as a value of `ty`.
unsafe fn destroy_words(ty: VariantType, words: *mut u64) {
    let word = unsafe { *words };
    LEDGER.with(|ledger| ledger.borrow_mut().frees.push((ty, word)));

    if ty == VariantType::Nil {
        let held = tag(word as u32);
        if held != VariantType::Nil && (held.is_reference() || boxed_in_variant(held)) {
            unsafe { destroy_payload(held, words.add(1)) };
        }
        return;
    }
    unsafe { destroy_payload(ty, words) };
}

unsafe fn destroy_payload(ty: VariantType, words: *mut u64) {
    let word = unsafe { *words };
    if word == 0 {
        return;
    }
    let boxed = unsafe { Box::from_raw(word as *mut MockObject) };
    LEDGER.with(|ledger| ledger.borrow_mut().outstanding -= 1);
    unsafe { *words = 0 };

    if ty == VariantType::PackedStringArray {
        if let MockObject::Packed { data, .. } = *boxed {
            for chunk in data.chunks_exact(8) {
                let mut element = u64::from_ne_bytes(chunk.try_into().unwrap_or_default());
                unsafe { destroy_words(VariantType::String, &mut element) };
            }
        }
    }
}

/// Deep copy of a payload, as the engine's copy constructors would do.
unsafe fn copy_payload(ty: VariantType, src: *const u8, dst: *mut u8) {
    let size = variant_size(ty);
    unsafe { std::ptr::copy_nonoverlapping(src, dst, size) };
    if !ty.is_reference() {
        return;
    }
    let word = unsafe { (src as *const u64).read_unaligned() };
    if let Some(source) = unsafe { object(word) } {
        let copy = alloc(source.clone());
        unsafe { (dst as *mut u64).write_unaligned(copy) };
    }
}

unsafe extern "C" fn mock_destroy<const TY: u32>(value: TypePtr) {
    unsafe { destroy_words(tag(TY), value.0.cast()) }
}

unsafe extern "C" fn mock_variant_destroy(value: TypePtr) {
    LEDGER.with(|ledger| ledger.borrow_mut().variant_destroys += 1);
    unsafe { destroy_words(VariantType::Nil, value.0.cast()) }
}

unsafe extern "C" fn mock_construct_packed<const TY: u32>(base: TypePtr, _args: *const ConstTypePtr) {
    let element = element_size(tag(TY));
    let word = alloc(MockObject::Packed {
        element,
        data: Vec::new(),
    });
    unsafe { (base.0 as *mut [u64; 2]).write([word, 0]) };
}

unsafe extern "C" fn mock_packed_resize<const TY: u32>(
    base: TypePtr,
    args: *const ConstTypePtr,
    ret: TypePtr,
    _arg_count: i32,
) {
    let new_len = unsafe { *((*args).0 as *const i64) }.max(0) as usize;
    let word = unsafe { *(base.0 as *const u64) };
    let Some(MockObject::Packed { element, data }) = (unsafe { object(word) }) else {
        unsafe { ret.0.cast::<i64>().write(1) };
        return;
    };
    let old_len = data.len() / *element;
    if tag(TY) == VariantType::PackedStringArray {
        for index in new_len..old_len {
            let start = index * 8;
            let mut element_word = u64::from_ne_bytes(data[start..start + 8].try_into().unwrap_or_default());
            unsafe { destroy_words(VariantType::String, &mut element_word) };
        }
        data.resize(new_len * 8, 0);
        for index in old_len..new_len {
            let fresh = alloc(MockObject::Text(String::new()));
            data[index * 8..index * 8 + 8].copy_from_slice(&fresh.to_ne_bytes());
        }
    } else {
        data.resize(new_len * *element, 0);
    }
    unsafe { ret.0.cast::<i64>().write(0) };
}

unsafe extern "C" fn mock_packed_size(base: TypePtr, _args: *const ConstTypePtr, ret: TypePtr, _arg_count: i32) {
    let word = unsafe { *(base.0 as *const u64) };
    let len = match unsafe { object(word) } {
        Some(MockObject::Packed { element, data }) if *element > 0 => data.len() / *element,
        _ => 0,
    };
    unsafe { ret.0.cast::<i64>().write(len as i64) };
}

/// Payloads wider than the two spare words of a generic value live on the heap.
fn boxed_in_variant(ty: VariantType) -> bool {
    variant_size(ty) > 16
}

unsafe extern "C" fn mock_variant_from<const TY: u32>(variant: TypePtr, value: TypePtr) {
    let ty = tag(TY);
    let words = variant.0 as *mut u64;
    unsafe {
        words.write_bytes(0, 3);
        words.write(TY as u64);
        if boxed_in_variant(ty) {
            let bytes = std::slice::from_raw_parts(value.0 as *const u8, variant_size(ty));
            words.add(1).write(alloc(MockObject::Packed {
                element: 1,
                data: bytes.to_vec(),
            }));
        } else {
            copy_payload(ty, value.0 as *const u8, words.add(1).cast());
        }
    }
}

unsafe extern "C" fn mock_variant_to<const TY: u32>(value: TypePtr, variant: TypePtr) {
    let ty = tag(TY);
    let words = variant.0 as *const u64;
    if boxed_in_variant(ty) {
        if let Some(MockObject::Packed { data, .. }) = unsafe { object(*words.add(1)) } {
            unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), value.0.cast(), data.len()) };
        }
        return;
    }
    unsafe { copy_payload(ty, words.add(1).cast(), value.0.cast()) };
}

macro_rules! per_type {
    ($ty:expr, $f:ident) => {{
        use VariantType::*;
        match $ty {
            Nil => $f::<{ Nil as u32 }>,
            Bool => $f::<{ Bool as u32 }>,
            Int => $f::<{ Int as u32 }>,
            Float => $f::<{ Float as u32 }>,
            String => $f::<{ String as u32 }>,
            Vector2 => $f::<{ Vector2 as u32 }>,
            Vector2i => $f::<{ Vector2i as u32 }>,
            Rect2 => $f::<{ Rect2 as u32 }>,
            Rect2i => $f::<{ Rect2i as u32 }>,
            Vector3 => $f::<{ Vector3 as u32 }>,
            Vector3i => $f::<{ Vector3i as u32 }>,
            Transform2D => $f::<{ Transform2D as u32 }>,
            Vector4 => $f::<{ Vector4 as u32 }>,
            Vector4i => $f::<{ Vector4i as u32 }>,
            Plane => $f::<{ Plane as u32 }>,
            Quaternion => $f::<{ Quaternion as u32 }>,
            Aabb => $f::<{ Aabb as u32 }>,
            Basis => $f::<{ Basis as u32 }>,
            Transform3D => $f::<{ Transform3D as u32 }>,
            Projection => $f::<{ Projection as u32 }>,
            Color => $f::<{ Color as u32 }>,
            StringName => $f::<{ StringName as u32 }>,
            NodePath => $f::<{ NodePath as u32 }>,
            Rid => $f::<{ Rid as u32 }>,
            Object => $f::<{ Object as u32 }>,
            Callable => $f::<{ Callable as u32 }>,
            Signal => $f::<{ Signal as u32 }>,
            Dictionary => $f::<{ Dictionary as u32 }>,
            Array => $f::<{ Array as u32 }>,
            PackedByteArray => $f::<{ PackedByteArray as u32 }>,
            PackedInt32Array => $f::<{ PackedInt32Array as u32 }>,
            PackedInt64Array => $f::<{ PackedInt64Array as u32 }>,
            PackedFloat32Array => $f::<{ PackedFloat32Array as u32 }>,
            PackedFloat64Array => $f::<{ PackedFloat64Array as u32 }>,
            PackedStringArray => $f::<{ PackedStringArray as u32 }>,
            PackedVector2Array => $f::<{ PackedVector2Array as u32 }>,
            PackedVector3Array => $f::<{ PackedVector3Array as u32 }>,
            PackedColorArray => $f::<{ PackedColorArray as u32 }>,
            PackedVector4Array => $f::<{ PackedVector4Array as u32 }>,
        }
    }};
}

type MockMethod = Box<dyn Fn(ObjectPtr, &[ConstTypePtr], TypePtr) + Send + Sync>;

/// Scriptable fake engine.
///
/// ```
/// use gdbind_core::mock::{self, MockEngine};
///
/// let engine = MockEngine::new();
/// engine.define("Engine", "get_frames_drawn", 0, |_, _, ret| unsafe { mock::ret(ret, 60i64) });
/// ```
#[derive(Default)]
pub struct MockEngine {
    methods: RwLock<Vec<MockMethod>>,
    binds: RwLock<FxHashMap<(String, String, i64), usize>>,
    lookups: AtomicUsize,
    calls: AtomicUsize,
    missing_destructors: Vec<VariantType>,
    singletons: RwLock<FxHashMap<String, ObjectPtr>>,
    destroyed: Mutex<Vec<ObjectPtr>>,
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `ty` from the per-type destructor table.
    pub fn without_destructor(mut self, ty: VariantType) -> Self {
        self.missing_destructors.push(ty);
        self
    }

    /// Registers a method bind. The closure receives the instance, the
    /// argument pointer table and the return pointer.
    pub fn define<F>(&self, class: &str, method: &str, hash: i64, body: F)
    where
        F: Fn(ObjectPtr, &[ConstTypePtr], TypePtr) + Send + Sync + 'static,
    {
        let mut methods = self.methods.write();
        methods.push(Box::new(body));
        self.binds
            .write()
            .insert((class.to_string(), method.to_string(), hash), methods.len());
    }

    /// What the engine's per-type destructor table holds for `ty`. Like the
    /// engine, there is never an entry for generic values.
    pub fn ptr_destructor(&self, ty: VariantType) -> Option<DestructorFn> {
        if ty == VariantType::Nil || !ty.is_reference() || self.missing_destructors.contains(&ty) {
            return None;
        }
        Some(per_type!(ty, mock_destroy))
    }

    pub fn register_singleton(&self, name: &str, object: ObjectPtr) {
        self.singletons.write().insert(name.to_string(), object);
    }

    /// Calls made to `get_method_bind`.
    pub fn method_lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Calls made to `method_bind_ptrcall`.
    pub fn method_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn destroyed_objects(&self) -> Vec<ObjectPtr> {
        self.destroyed.lock().clone()
    }

    pub fn printed_errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn printed_warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

impl NativeApi for MockEngine {
    unsafe fn get_method_bind(&self, class: ConstTypePtr, method: ConstTypePtr, hash: i64) -> MethodBindPtr {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let key = unsafe { (read_text(class), read_text(method), hash) };
        match self.binds.read().get(&key) {
            Some(index) => MethodBindPtr(*index as *const c_void),
            None => MethodBindPtr::NULL,
        }
    }

    unsafe fn method_bind_ptrcall(
        &self,
        method: MethodBindPtr,
        instance: ObjectPtr,
        args: *const ConstTypePtr,
        arg_count: usize,
        ret: TypePtr,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let args = if arg_count == 0 {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(args, arg_count) }
        };
        let methods = self.methods.read();
        if let Some(body) = methods.get((method.0 as usize).wrapping_sub(1)) {
            body(instance, args, ret);
        }
    }

    fn destructor(&self, ty: VariantType) -> Option<DestructorFn> {
        if ty == VariantType::Nil {
            return Some(mock_variant_destroy);
        }
        self.ptr_destructor(ty)
    }

    fn constructor(&self, ty: VariantType, index: i32) -> Option<ConstructorFn> {
        if !ty.is_packed_array() || index != 0 {
            return None;
        }
        Some(per_type!(ty, mock_construct_packed))
    }

    unsafe fn builtin_method(&self, ty: VariantType, method: ConstTypePtr, _hash: i64) -> Option<BuiltinMethodFn> {
        if !ty.is_packed_array() {
            return None;
        }
        match unsafe { read_text(method) }.as_str() {
            "resize" => Some(per_type!(ty, mock_packed_resize)),
            "size" => Some(mock_packed_size),
            _ => None,
        }
    }

    fn variant_from_type(&self, ty: VariantType) -> Option<VariantFromTypeFn> {
        (ty != VariantType::Nil).then(|| per_type!(ty, mock_variant_from))
    }

    fn variant_to_type(&self, ty: VariantType) -> Option<VariantToTypeFn> {
        (ty != VariantType::Nil).then(|| per_type!(ty, mock_variant_to))
    }

    unsafe fn string_new(&self, out: TypePtr, contents: &str) {
        unsafe { (out.0 as *mut u64).write(alloc(MockObject::Text(contents.to_string()))) }
    }

    unsafe fn string_name_new(&self, out: TypePtr, contents: &str) {
        unsafe { self.string_new(out, contents) }
    }

    unsafe fn string_to_utf8(&self, value: ConstTypePtr, buf: &mut [u8]) -> usize {
        let text = unsafe { read_text(value) };
        let copied = text.len().min(buf.len());
        buf[..copied].copy_from_slice(&text.as_bytes()[..copied]);
        text.len()
    }

    unsafe fn packed_index(&self, _ty: VariantType, array: TypePtr, index: i64) -> *mut c_void {
        let word = unsafe { *(array.0 as *const u64) };
        match unsafe { object(word) } {
            Some(MockObject::Packed { element, data }) => {
                let offset = index as usize * *element;
                if offset < data.len() {
                    unsafe { data.as_mut_ptr().add(offset).cast() }
                } else {
                    std::ptr::null_mut()
                }
            }
            _ => std::ptr::null_mut(),
        }
    }

    unsafe fn global_singleton(&self, name: ConstTypePtr) -> ObjectPtr {
        let name = unsafe { read_text(name) };
        self.singletons.read().get(&name).copied().unwrap_or(ObjectPtr::NULL)
    }

    unsafe fn object_destroy(&self, object: ObjectPtr) {
        self.destroyed.lock().push(object);
    }

    fn print_error(&self, message: &str, function: &str, file: &str, line: u32) {
        self.errors.lock().push(format!("{message} ({function} @ {file}:{line})"));
    }

    fn print_warning(&self, message: &str, function: &str, file: &str, line: u32) {
        self.warnings.lock().push(format!("{message} ({function} @ {file}:{line})"));
    }
}
