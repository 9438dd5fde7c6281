//! Fixed-layout encodings of every value that crosses the boundary.
//!
//! Value types ([`math`]) travel by their natural bit pattern. Reference
//! types travel as opaque [`descriptor`]s whose referent is owned according
//! to the [`lifetime`](crate::lifetime) rules. [`RawValue`] is the dynamic
//! union over all of them.

pub mod descriptor;
pub mod math;
mod raw;

use std::ptr;

use gdbind_sys::{ObjectPtr, VariantType, variant_size};

pub use descriptor::*;
pub use math::*;
pub use raw::{PackedTag, RawValue};

/// Types with an exact, engine-defined byte layout.
///
/// `Marshal` is the static half of value encoding: every implementor knows
/// its variant tag and its width at compile time, so call frames can reserve
/// storage without inspecting the value.
///
/// # Encoding
///
/// `encode` writes exactly [`Marshal::SIZE`] bytes into the front of `out`,
/// and `decode` reads the same bytes back. Both are bounds-checked views over
/// the slice and panic when it is too short. No byte-order conversion takes
/// place: both sides of the boundary live in the same process.
///
/// # Examples
///
/// ```
/// use gdbind_core::value::{Marshal, Vector2};
///
/// let mut buf = [0u8; 8];
/// Vector2::new(1.5, -2.0).encode(&mut buf);
/// assert_eq!(Vector2::decode(&buf), Vector2::new(1.5, -2.0));
///
/// 42i64.encode(&mut buf);
/// assert_eq!(i64::decode(&buf), 42);
/// ```
///
/// # Safety
///
/// Implementors must be laid out exactly as the engine lays out
/// `VARIANT_TYPE`, and every `SIZE`-byte pattern the engine can produce must
/// be a valid value unless `decode` is overridden to validate it.
pub unsafe trait Marshal: Copy + 'static {
    const VARIANT_TYPE: VariantType;
    const SIZE: usize = size_of::<Self>();

    fn encode(&self, out: &mut [u8]) {
        let out = &mut out[..Self::SIZE];
        // SAFETY: `out` is exactly SIZE bytes and `Self` is plain data.
        unsafe { ptr::copy_nonoverlapping((self as *const Self).cast::<u8>(), out.as_mut_ptr(), Self::SIZE) }
    }

    fn decode(bytes: &[u8]) -> Self {
        let bytes = &bytes[..Self::SIZE];
        // SAFETY: trait contract, any SIZE-byte pattern is a valid `Self`.
        unsafe { ptr::read_unaligned(bytes.as_ptr().cast::<Self>()) }
    }
}

/// Anything that can be written into an argument slot.
///
/// Blanket-implemented for every [`Marshal`] type and implemented for the
/// dynamic [`RawValue`] and for lifetime-tracked handles.
pub trait Encode {
    fn variant_type(&self) -> VariantType;

    fn encoded_size(&self) -> usize;

    fn encode_into(&self, out: &mut [u8]);
}

impl<T: Marshal> Encode for T {
    #[inline]
    fn variant_type(&self) -> VariantType {
        T::VARIANT_TYPE
    }

    #[inline]
    fn encoded_size(&self) -> usize {
        T::SIZE
    }

    #[inline]
    fn encode_into(&self, out: &mut [u8]) {
        self.encode(out)
    }
}

macro_rules! marshal {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            unsafe impl Marshal for $ty {
                const VARIANT_TYPE: VariantType = VariantType::$tag;
            }

            const _: () = assert!(<$ty as Marshal>::SIZE == variant_size(VariantType::$tag));
        )*
    };
}

marshal! {
    i64 => Int,
    f64 => Float,
    ObjectPtr => Object,
    Rid => Rid,
    Vector2 => Vector2,
    Vector2i => Vector2i,
    Vector3 => Vector3,
    Vector3i => Vector3i,
    Vector4 => Vector4,
    Vector4i => Vector4i,
    Rect2 => Rect2,
    Rect2i => Rect2i,
    Transform2D => Transform2D,
    Transform3D => Transform3D,
    Basis => Basis,
    Color => Color,
    Quaternion => Quaternion,
    Plane => Plane,
    Aabb => Aabb,
    Projection => Projection,
}

unsafe impl Marshal for bool {
    const VARIANT_TYPE: VariantType = VariantType::Bool;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

const _: () = assert!(<bool as Marshal>::SIZE == variant_size(VariantType::Bool));
