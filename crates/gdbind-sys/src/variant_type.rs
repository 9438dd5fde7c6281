//! Variant type tags and their ABI sizes.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Type tag shared by the engine's generic value and every typed entry point.
///
/// Discriminants are part of the ABI and must never be reordered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum VariantType {
    #[default]
    Nil = 0,

    // atomic
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,

    // math
    Vector2 = 5,
    Vector2i = 6,
    Rect2 = 7,
    Rect2i = 8,
    Vector3 = 9,
    Vector3i = 10,
    Transform2D = 11,
    Vector4 = 12,
    Vector4i = 13,
    Plane = 14,
    Quaternion = 15,
    Aabb = 16,
    Basis = 17,
    Transform3D = 18,
    Projection = 19,

    // misc
    Color = 20,
    StringName = 21,
    NodePath = 22,
    Rid = 23,
    Object = 24,
    Callable = 25,
    Signal = 26,
    Dictionary = 27,
    Array = 28,

    // packed arrays
    PackedByteArray = 29,
    PackedInt32Array = 30,
    PackedInt64Array = 31,
    PackedFloat32Array = 32,
    PackedFloat64Array = 33,
    PackedStringArray = 34,
    PackedVector2Array = 35,
    PackedVector3Array = 36,
    PackedColorArray = 37,
    PackedVector4Array = 38,
}

impl VariantType {
    /// Number of distinct tags.
    pub const COUNT: u32 = 39;

    /// Reference types whose storage is owned and must be released through a
    /// per-type destructor.
    pub const REFERENCE_TYPES: [VariantType; 18] = [
        VariantType::String,
        VariantType::StringName,
        VariantType::NodePath,
        VariantType::Callable,
        VariantType::Signal,
        VariantType::Dictionary,
        VariantType::Array,
        VariantType::PackedByteArray,
        VariantType::PackedInt32Array,
        VariantType::PackedInt64Array,
        VariantType::PackedFloat32Array,
        VariantType::PackedFloat64Array,
        VariantType::PackedStringArray,
        VariantType::PackedVector2Array,
        VariantType::PackedVector3Array,
        VariantType::PackedColorArray,
        VariantType::PackedVector4Array,
        VariantType::Nil,
    ];

    /// Whether values of this type own native storage.
    ///
    /// `Nil` stands for the generic value itself here: a variant may hold
    /// any reference type, so it always needs its destructor.
    pub fn is_reference(self) -> bool {
        use VariantType::*;
        matches!(
            self,
            Nil | String
                | StringName
                | NodePath
                | Callable
                | Signal
                | Dictionary
                | Array
                | PackedByteArray
                | PackedInt32Array
                | PackedInt64Array
                | PackedFloat32Array
                | PackedFloat64Array
                | PackedStringArray
                | PackedVector2Array
                | PackedVector3Array
                | PackedColorArray
                | PackedVector4Array
        )
    }

    pub fn is_packed_array(self) -> bool {
        (self as u32) >= (VariantType::PackedByteArray as u32)
    }
}

/// Size in bytes of a value of `ty` when passed by pointer through a ptrcall.
///
/// Matches a 64-bit engine built with single precision reals. Integers are
/// always passed as 64-bit and floats as 64-bit doubles regardless of their
/// declared metadata. `Nil` reports the size of the generic value itself.
pub const fn variant_size(ty: VariantType) -> usize {
    use VariantType::*;
    match ty {
        Nil => 24,
        Bool => 1,
        Int | Float => 8,
        String | StringName | NodePath | Dictionary | Array => 8,
        Vector2 | Vector2i => 8,
        Rect2 | Rect2i => 16,
        Vector3 | Vector3i => 12,
        Transform2D => 24,
        Vector4 | Vector4i | Plane | Quaternion | Color => 16,
        Aabb => 24,
        Basis => 36,
        Transform3D => 48,
        Projection => 64,
        Rid | Object => 8,
        Callable | Signal => 16,
        PackedByteArray
        | PackedInt32Array
        | PackedInt64Array
        | PackedFloat32Array
        | PackedFloat64Array
        | PackedStringArray
        | PackedVector2Array
        | PackedVector3Array
        | PackedColorArray
        | PackedVector4Array => 16,
    }
}
