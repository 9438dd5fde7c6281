//! Opaque descriptors for reference-typed values.
//!
//! A descriptor is the engine's own in-place representation of a string,
//! array or generic value: one to three machine words the host never looks
//! inside. Whoever holds a descriptor must either hand it back to the engine
//! or release it exactly once through the type's destructor.

use std::fmt;
use std::marker::PhantomData;

use gdbind_sys::{VariantType, variant_size};

use super::{Color, Marshal, Vector2, Vector3, Vector4};
use crate::error::{BindingError, BindingResult};

/// Largest descriptor, in words. Sized for the generic value.
pub const MAX_DESCRIPTOR_WORDS: usize = 3;

/// Storage wide enough for any descriptor.
pub type RawWords = [u64; MAX_DESCRIPTOR_WORDS];

/// A reference-typed value's in-place representation.
///
/// # Safety
///
/// `SIZE` must not exceed `size_of::<RawWords>()`, and the value must own
/// native storage released by the destructor of `VARIANT_TYPE`.
pub unsafe trait Descriptor: Marshal {
    fn to_words(&self) -> RawWords {
        let mut words = RawWords::default();
        self.encode(words_as_bytes_mut(&mut words));
        words
    }

    fn from_words(words: &RawWords) -> Self {
        Self::decode(words_as_bytes(words))
    }
}

pub(crate) fn words_as_bytes(words: &RawWords) -> &[u8] {
    // SAFETY: u64 arrays have no padding and u8 has no alignment requirement.
    unsafe { std::slice::from_raw_parts(words.as_ptr().cast(), size_of::<RawWords>()) }
}

pub(crate) fn words_as_bytes_mut(words: &mut RawWords) -> &mut [u8] {
    // SAFETY: as above; every byte pattern is a valid u64.
    unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr().cast(), size_of::<RawWords>()) }
}

macro_rules! descriptor {
    ($($(#[$meta:meta])* $name:ident: $tag:ident[$words:literal];)*) => {
        $(
            $(#[$meta])*
            #[repr(transparent)]
            #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub [u64; $words]);

            unsafe impl Marshal for $name {
                const VARIANT_TYPE: VariantType = VariantType::$tag;
            }

            unsafe impl Descriptor for $name {}

            const _: () = assert!(<$name as Marshal>::SIZE == variant_size(VariantType::$tag));
        )*
    };
}

descriptor! {
    /// Engine `String`.
    StringRaw: String[1];
    /// Interned engine `StringName`.
    StringNameRaw: StringName[1];
    NodePathRaw: NodePath[1];
    ArrayRaw: Array[1];
    DictionaryRaw: Dictionary[1];
    CallableRaw: Callable[2];
    SignalRaw: Signal[2];
    /// The engine's generic value. The first four bytes hold its type tag.
    VariantRaw: Nil[3];
}

impl VariantRaw {
    /// Type currently held by the generic value.
    pub fn variant_type(&self) -> BindingResult<VariantType> {
        let bytes = self.0[0].to_ne_bytes();
        let tag = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        VariantType::try_from(tag).map_err(|_| BindingError::UnknownVariantType(tag))
    }
}

/// Element types that have a packed array counterpart.
///
/// # Safety
///
/// `Self` must match the engine's element layout for `PACKED_TYPE`.
pub unsafe trait PackedElement: Copy + 'static {
    const PACKED_TYPE: VariantType;
}

macro_rules! packed_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(unsafe impl PackedElement for $ty {
            const PACKED_TYPE: VariantType = VariantType::$tag;
        })*
    };
}

packed_element! {
    u8 => PackedByteArray,
    i32 => PackedInt32Array,
    i64 => PackedInt64Array,
    f32 => PackedFloat32Array,
    f64 => PackedFloat64Array,
    StringRaw => PackedStringArray,
    Vector2 => PackedVector2Array,
    Vector3 => PackedVector3Array,
    Color => PackedColorArray,
    Vector4 => PackedVector4Array,
}

/// Packed array of `E`: a copy-on-write pointer pair.
#[repr(transparent)]
pub struct PackedArrayRaw<E: PackedElement> {
    pub words: [u64; 2],
    _element: PhantomData<E>,
}

impl<E: PackedElement> PackedArrayRaw<E> {
    pub const fn new(words: [u64; 2]) -> Self {
        Self {
            words,
            _element: PhantomData,
        }
    }
}

impl<E: PackedElement> Clone for PackedArrayRaw<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: PackedElement> Copy for PackedArrayRaw<E> {}

impl<E: PackedElement> PartialEq for PackedArrayRaw<E> {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl<E: PackedElement> Eq for PackedArrayRaw<E> {}

impl<E: PackedElement> Default for PackedArrayRaw<E> {
    fn default() -> Self {
        Self::new([0; 2])
    }
}

impl<E: PackedElement> fmt::Debug for PackedArrayRaw<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedArrayRaw<{:?}>({:#x}, {:#x})", E::PACKED_TYPE, self.words[0], self.words[1])
    }
}

unsafe impl<E: PackedElement> Marshal for PackedArrayRaw<E> {
    const VARIANT_TYPE: VariantType = E::PACKED_TYPE;
}

unsafe impl<E: PackedElement> Descriptor for PackedArrayRaw<E> {}

pub type PackedByteArrayRaw = PackedArrayRaw<u8>;
pub type PackedInt32ArrayRaw = PackedArrayRaw<i32>;
pub type PackedInt64ArrayRaw = PackedArrayRaw<i64>;
pub type PackedFloat32ArrayRaw = PackedArrayRaw<f32>;
pub type PackedFloat64ArrayRaw = PackedArrayRaw<f64>;
pub type PackedStringArrayRaw = PackedArrayRaw<StringRaw>;
pub type PackedVector2ArrayRaw = PackedArrayRaw<Vector2>;
pub type PackedVector3ArrayRaw = PackedArrayRaw<Vector3>;
pub type PackedColorArrayRaw = PackedArrayRaw<Color>;
pub type PackedVector4ArrayRaw = PackedArrayRaw<Vector4>;
