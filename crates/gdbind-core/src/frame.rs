//! Call frames: argument and return storage for one native call.

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use bumpalo::Bump;
use gdbind_sys::{ConstTypePtr, TypePtr, VariantType, variant_size};

use crate::error::BindingResult;
use crate::value::{Encode, Marshal, RawValue};

/// Words of argument storage kept inside the frame itself.
pub const INLINE_WORDS: usize = 32;

/// Arguments whose pointers fit the frame's own table.
pub const INLINE_ARGS: usize = 8;

const WORD: usize = size_of::<u64>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Word offset into the inline buffer.
    Inline(usize),
    /// Word-aligned block in the spill arena.
    Spilled(NonNull<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    region: Region,
    len: usize,
}

impl Slot {
    const EMPTY: Slot = Slot {
        region: Region::Inline(0),
        len: 0,
    };
}

/// Storage for exactly one native call.
///
/// Arguments are encoded in declaration order into word-aligned slots. Small
/// frames live entirely inside the `CallFrame` value; anything past
/// [`INLINE_WORDS`] spills into a bump arena owned by the frame. Slots never
/// overlap, and the return slot is separate from every argument.
///
/// Slots are recorded as offsets and turned into pointers only by
/// [`CallFrame::finish`], whose result mutably borrows the frame, so the frame
/// cannot move or change while the engine holds those pointers.
///
/// ```
/// use gdbind_core::frame::CallFrame;
///
/// let mut frame = CallFrame::new(2);
/// frame.arg(&1.5f64);
/// frame.arg(&true);
/// let ret = frame.ret::<i64>();
/// let finished = frame.finish();
/// assert_eq!(finished.arg_count, 2);
/// # let _ = ret;
/// ```
pub struct CallFrame {
    inline: [u64; INLINE_WORDS],
    used: usize,
    spill: Option<Bump>,
    slots: [Slot; INLINE_ARGS],
    extra_slots: Vec<Slot>,
    arg_count: usize,
    expected: usize,
    ret: Option<Slot>,
    table: [ConstTypePtr; INLINE_ARGS],
    extra_table: Vec<ConstTypePtr>,
}

/// The three values a native call needs, borrowed from a finished frame.
pub struct FinishedFrame<'f> {
    pub args: *const ConstTypePtr,
    pub arg_count: usize,
    pub ret: TypePtr,
    _frame: PhantomData<&'f mut CallFrame>,
}

impl FinishedFrame<'_> {
    pub fn into_parts(self) -> (*const ConstTypePtr, usize, TypePtr) {
        (self.args, self.arg_count, self.ret)
    }

    /// The argument pointer table.
    pub fn arg_table(&self) -> &[ConstTypePtr] {
        if self.arg_count == 0 {
            return &[];
        }
        // SAFETY: `finish` wrote `arg_count` pointers at `args`, and the frame
        // stays borrowed for as long as `self` lives.
        unsafe { std::slice::from_raw_parts(self.args, self.arg_count) }
    }
}

/// Typed handle to a frame's return storage.
pub struct ReturnSlot<T> {
    slot: Slot,
    _marker: PhantomData<fn() -> T>,
}

/// Return storage for a type known only at run time.
#[derive(Debug, Clone, Copy)]
pub struct RawReturnSlot {
    slot: Slot,
    ty: VariantType,
}

impl<T> fmt::Debug for ReturnSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnSlot").field("len", &self.slot.len).finish()
    }
}

impl CallFrame {
    /// A frame for a method taking `expected_arg_count` arguments.
    pub fn new(expected_arg_count: usize) -> Self {
        Self {
            inline: [0; INLINE_WORDS],
            used: 0,
            spill: None,
            slots: [Slot::EMPTY; INLINE_ARGS],
            extra_slots: if expected_arg_count > INLINE_ARGS {
                Vec::with_capacity(expected_arg_count - INLINE_ARGS)
            } else {
                Vec::new()
            },
            arg_count: 0,
            expected: expected_arg_count,
            ret: None,
            table: [ConstTypePtr::NULL; INLINE_ARGS],
            extra_table: Vec::new(),
        }
    }

    pub fn expected_arg_count(&self) -> usize {
        self.expected
    }

    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Whether any storage had to leave the frame.
    pub fn spilled(&self) -> bool {
        self.spill.is_some()
    }

    fn reserve(&mut self, len: usize) -> Slot {
        let words = len.div_ceil(WORD).max(1);
        if self.used + words <= INLINE_WORDS {
            let region = Region::Inline(self.used);
            self.used += words;
            return Slot { region, len };
        }
        let layout = Layout::from_size_align(words * WORD, WORD)
            .unwrap_or_else(|_| panic!("argument of {len} bytes cannot be laid out"));
        let block = self.spill.get_or_insert_with(Bump::new).alloc_layout(layout);
        // SAFETY: freshly allocated block of `words * WORD` bytes.
        unsafe { block.as_ptr().write_bytes(0, words * WORD) };
        Slot {
            region: Region::Spilled(block),
            len,
        }
    }

    fn bytes(&self, slot: Slot) -> &[u8] {
        match slot.region {
            Region::Inline(offset) => {
                let words = &self.inline[offset..offset + slot.len.div_ceil(WORD).max(1)];
                // SAFETY: reinterpreting initialized u64s as bytes.
                let bytes = unsafe { std::slice::from_raw_parts(words.as_ptr().cast::<u8>(), words.len() * WORD) };
                &bytes[..slot.len]
            }
            // SAFETY: the block is owned by `self.spill` and was zeroed on reserve.
            Region::Spilled(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), slot.len) },
        }
    }

    fn bytes_mut(&mut self, slot: Slot) -> &mut [u8] {
        match slot.region {
            Region::Inline(offset) => {
                let words = &mut self.inline[offset..offset + slot.len.div_ceil(WORD).max(1)];
                let len = words.len() * WORD;
                // SAFETY: as in `bytes`; every byte pattern is a valid u64.
                let bytes = unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<u8>(), len) };
                &mut bytes[..slot.len]
            }
            // SAFETY: as in `bytes`, and `&mut self` makes the access unique.
            Region::Spilled(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), slot.len) },
        }
    }

    fn address(&mut self, slot: Slot) -> *mut u8 {
        match slot.region {
            // SAFETY: `offset` is within `inline`, checked by `reserve`.
            Region::Inline(offset) => unsafe { self.inline.as_mut_ptr().add(offset).cast() },
            Region::Spilled(ptr) => ptr.as_ptr(),
        }
    }

    /// Appends the next argument.
    ///
    /// Arguments must come in the method's declared order with the declared
    /// types; nothing here can check that.
    pub fn arg<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        let slot = self.reserve(value.encoded_size());
        value.encode_into(self.bytes_mut(slot));
        match self.slots.get_mut(self.arg_count) {
            Some(entry) => *entry = slot,
            None => self.extra_slots.push(slot),
        }
        self.arg_count += 1;
        self
    }

    fn arg_slot(&self, index: usize) -> Option<Slot> {
        if index >= self.arg_count {
            return None;
        }
        match self.slots.get(index) {
            Some(slot) => Some(*slot),
            None => self.extra_slots.get(index - INLINE_ARGS).copied(),
        }
    }

    /// Encoded bytes of argument `index`.
    pub fn arg_bytes(&self, index: usize) -> Option<&[u8]> {
        self.arg_slot(index).map(|slot| self.bytes(slot))
    }

    /// Reserves zeroed return storage for `T`. One per frame.
    pub fn ret<T: Marshal>(&mut self) -> ReturnSlot<T> {
        ReturnSlot {
            slot: self.reserve_ret(T::SIZE),
            _marker: PhantomData,
        }
    }

    /// Reserves return storage for a value of `ty`.
    pub fn ret_raw(&mut self, ty: VariantType) -> RawReturnSlot {
        RawReturnSlot {
            slot: self.reserve_ret(variant_size(ty)),
            ty,
        }
    }

    fn reserve_ret(&mut self, len: usize) -> Slot {
        debug_assert!(self.ret.is_none(), "a frame has exactly one return slot");
        let slot = self.reserve(len);
        self.ret = Some(slot);
        slot
    }

    /// Decodes what the callee wrote into the return slot.
    pub fn read<T: Marshal>(&self, slot: &ReturnSlot<T>) -> T {
        debug_assert_eq!(self.ret, Some(slot.slot), "return slot belongs to another frame");
        T::decode(self.bytes(slot.slot))
    }

    pub fn read_raw(&self, slot: &RawReturnSlot) -> BindingResult<RawValue> {
        debug_assert_eq!(self.ret, Some(slot.slot), "return slot belongs to another frame");
        RawValue::decode(slot.ty, self.bytes(slot.slot))
    }

    /// Produces the argument table, argument count and return pointer.
    ///
    /// The return pointer is null when no return slot was reserved.
    pub fn finish(&mut self) -> FinishedFrame<'_> {
        debug_assert_eq!(
            self.arg_count, self.expected,
            "frame built with a different argument count than declared"
        );

        let count = self.arg_count;
        if count > INLINE_ARGS {
            self.extra_table.clear();
            self.extra_table.reserve(count);
        }
        for index in 0..count {
            let slot = match self.arg_slot(index) {
                Some(slot) => slot,
                None => break,
            };
            let ptr = ConstTypePtr(self.address(slot).cast_const().cast());
            if count > INLINE_ARGS {
                self.extra_table.push(ptr);
            } else {
                self.table[index] = ptr;
            }
        }

        let ret = match self.ret {
            Some(slot) => TypePtr(self.address(slot).cast()),
            None => TypePtr::NULL,
        };
        let args = if count > INLINE_ARGS {
            self.extra_table.as_ptr()
        } else {
            self.table.as_ptr()
        };

        FinishedFrame {
            args,
            arg_count: count,
            ret,
            _frame: PhantomData,
        }
    }
}

impl fmt::Debug for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFrame")
            .field("arg_count", &self.arg_count)
            .field("expected", &self.expected)
            .field("inline_words_used", &self.used)
            .field("spilled", &self.spilled())
            .field("has_return", &self.ret.is_some())
            .finish()
    }
}
