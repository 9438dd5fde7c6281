//! Value types laid out exactly as the engine's single-precision build.

macro_rules! vector {
    ($(#[$meta:meta])* $name:ident($scalar:ty) { $($field:ident),+ }) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Debug, Default, Clone, Copy, PartialEq)]
        pub struct $name {
            $(pub $field: $scalar,)+
        }

        impl $name {
            pub const ZERO: Self = Self { $($field: 0 as $scalar,)+ };

            #[inline]
            pub const fn new($($field: $scalar),+) -> Self {
                Self { $($field,)+ }
            }
        }
    };
}

vector!(Vector2(f32) { x, y });
vector!(Vector2i(i32) { x, y });
vector!(Vector3(f32) { x, y, z });
vector!(Vector3i(i32) { x, y, z });
vector!(Vector4(f32) { x, y, z, w });
vector!(Vector4i(i32) { x, y, z, w });

/// Engine resource identifier. Zero is the invalid RID.
///
/// RIDs are never tracked by a lifetime: the caller frees them explicitly
/// through the server that created them.
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid(pub u64);

impl Rid {
    pub const INVALID: Rid = Rid(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect2 {
    pub position: Vector2,
    pub size: Vector2,
}

impl Rect2 {
    pub const fn new(position: Vector2, size: Vector2) -> Self {
        Self { position, size }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect2i {
    pub position: Vector2i,
    pub size: Vector2i,
}

/// Column-major 2D affine transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub x: Vector2,
    pub y: Vector2,
    pub origin: Vector2,
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        x: Vector2::new(1.0, 0.0),
        y: Vector2::new(0.0, 1.0),
        origin: Vector2::ZERO,
    };
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Row-major 3x3 matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub rows: [Vector3; 3],
}

impl Basis {
    pub const IDENTITY: Self = Self {
        rows: [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ],
    };
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub basis: Basis,
    pub origin: Vector3,
}

impl Transform3D {
    pub const IDENTITY: Self = Self {
        basis: Basis::IDENTITY,
        origin: Vector3::ZERO,
    };

    pub const fn translated(self, offset: Vector3) -> Self {
        Self {
            basis: self.basis,
            origin: Vector3::new(
                self.origin.x + offset.x,
                self.origin.y + offset.y,
                self.origin.z + offset.z,
            ),
        }
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Opaque black, the engine's default-constructed color.
impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3,
    pub d: f32,
}

impl Plane {
    pub const fn new(normal: Vector3, d: f32) -> Self {
        Self { normal, d }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub position: Vector3,
    pub size: Vector3,
}

/// Column-major 4x4 matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub columns: [Vector4; 4],
}

impl Projection {
    pub const IDENTITY: Self = Self {
        columns: [
            Vector4::new(1.0, 0.0, 0.0, 0.0),
            Vector4::new(0.0, 1.0, 0.0, 0.0),
            Vector4::new(0.0, 0.0, 1.0, 0.0),
            Vector4::new(0.0, 0.0, 0.0, 1.0),
        ],
    };
}

impl Default for Projection {
    fn default() -> Self {
        Self::IDENTITY
    }
}
