//! The dynamic union over every encodable value.

use gdbind_sys::{ObjectPtr, VariantType, variant_size};

use super::*;
use crate::error::{BindingError, BindingResult};

/// Variant type of a packed array. Only packed array types can be named,
/// so every tagged payload is two words wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedTag(VariantType);

impl PackedTag {
    pub fn new(ty: VariantType) -> BindingResult<Self> {
        if ty.is_packed_array() {
            Ok(Self(ty))
        } else {
            Err(BindingError::NotPackedArray(ty))
        }
    }

    /// Tag of the packed array holding `E`.
    pub const fn of<E: PackedElement>() -> Self {
        Self(E::PACKED_TYPE)
    }

    pub fn variant_type(self) -> VariantType {
        self.0
    }
}

impl TryFrom<VariantType> for PackedTag {
    type Error = BindingError;

    fn try_from(ty: VariantType) -> BindingResult<Self> {
        Self::new(ty)
    }
}

/// A value of any boundary type, tagged with its variant type.
///
/// Reference-typed variants carry bare descriptors. A `RawValue` never owns
/// what its descriptor points at; wrap it in a lifetime handle for that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vector2(Vector2),
    Vector2i(Vector2i),
    Vector3(Vector3),
    Vector3i(Vector3i),
    Vector4(Vector4),
    Vector4i(Vector4i),
    Rect2(Rect2),
    Rect2i(Rect2i),
    Transform2D(Transform2D),
    Transform3D(Transform3D),
    Basis(Basis),
    Color(Color),
    Quaternion(Quaternion),
    Plane(Plane),
    Aabb(Aabb),
    Projection(Projection),
    Rid(Rid),
    Object(ObjectPtr),
    String(StringRaw),
    StringName(StringNameRaw),
    NodePath(NodePathRaw),
    Array(ArrayRaw),
    Dictionary(DictionaryRaw),
    Callable(CallableRaw),
    Signal(SignalRaw),
    /// Any packed array; the tag names the element type.
    Packed(PackedTag, [u64; 2]),
    Variant(VariantRaw),
}

macro_rules! dispatch {
    ($($variant:ident),* $(,)?) => {
        impl RawValue {
            pub fn variant_type(&self) -> VariantType {
                match self {
                    $(RawValue::$variant(v) => Encode::variant_type(v),)*
                    RawValue::Packed(tag, _) => tag.variant_type(),
                    RawValue::Variant(_) => VariantType::Nil,
                }
            }

            /// Writes the value's bytes to the front of `out`.
            pub fn encode(&self, out: &mut [u8]) {
                match self {
                    $(RawValue::$variant(v) => v.encode(out),)*
                    RawValue::Packed(_, words) => {
                        out[..8].copy_from_slice(&words[0].to_ne_bytes());
                        out[8..16].copy_from_slice(&words[1].to_ne_bytes());
                    }
                    RawValue::Variant(v) => v.encode(out),
                }
            }

            /// Reads a value of type `ty` from `bytes`.
            ///
            /// `Nil` decodes the generic value itself.
            pub fn decode(ty: VariantType, bytes: &[u8]) -> BindingResult<RawValue> {
                let expected = variant_size(ty);
                if bytes.len() < expected {
                    return Err(BindingError::SizeMismatch {
                        ty,
                        expected,
                        actual: bytes.len(),
                    });
                }
                if let Ok(tag) = PackedTag::new(ty) {
                    let mut words = [0u64; 2];
                    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
                        *word = u64::from_ne_bytes(chunk.try_into().unwrap_or_default());
                    }
                    return Ok(RawValue::Packed(tag, words));
                }
                Ok(match ty {
                    $(VariantType::$variant => RawValue::$variant(Marshal::decode(bytes)),)*
                    VariantType::Nil => RawValue::Variant(VariantRaw::decode(bytes)),
                    _ => unreachable!("packed arrays handled above"),
                })
            }
        }
    };
}

dispatch! {
    Bool, Int, Float, Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i,
    Rect2, Rect2i, Transform2D, Transform3D, Basis, Color, Quaternion, Plane,
    Aabb, Projection, Rid, Object, String, StringName, NodePath, Array,
    Dictionary, Callable, Signal,
}

impl RawValue {
    /// Encoded width in bytes.
    pub fn size(&self) -> usize {
        variant_size(self.variant_type())
    }
}

impl Encode for RawValue {
    fn variant_type(&self) -> VariantType {
        RawValue::variant_type(self)
    }

    fn encoded_size(&self) -> usize {
        self.size()
    }

    fn encode_into(&self, out: &mut [u8]) {
        self.encode(out)
    }
}
