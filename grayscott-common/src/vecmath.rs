use serde::{Deserialize, Serialize};

// Basic 2D vector type, used for grid-plane coordinates.
#[derive(Copy, Clone, Default, Debug, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline(always)]
    pub fn new(x: f32, y: f32) -> Self { Self { x, y } }
    #[inline(always)]
    pub fn length_squared(self) -> f32 { self.x * self.x + self.y * self.y }
    #[inline(always)]
    pub fn length(self) -> f32 { self.length_squared().sqrt() }
    #[inline(always)]
    pub fn add(self, other: Self) -> Self { Self::new(self.x + other.x, self.y + other.y) }
    #[inline(always)]
    pub fn scale(self, scalar: f32) -> Self { Self::new(self.x * scalar, self.y * scalar) }
    #[inline(always)]
    pub fn dot(self, other: Self) -> f32 { self.x * other.x + self.y * other.y }
}

// 3D vector type for surface normals and light directions in the relief
// projection.
#[derive(Copy, Clone, Default, Debug, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    #[inline(always)]
    pub fn new(x: f32, y: f32, z: f32) -> Self { Self { x, y, z } }
    #[inline(always)]
    pub fn length_squared(self) -> f32 { self.x * self.x + self.y * self.y + self.z * self.z }
    #[inline(always)]
    pub fn length(self) -> f32 { self.length_squared().sqrt() }
    #[inline(always)]
    pub fn scale(self, scalar: f32) -> Self { Self::new(self.x * scalar, self.y * scalar, self.z * scalar) }
    #[inline(always)]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline(always)]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Normalizes the vector, falling back to +Z for degenerate input.
    #[inline(always)]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 1e-9 { self.scale(1.0 / len) } else { Self::new(0.0, 0.0, 1.0) }
    }

    /// Component-wise linear blend: `self` at t = 0, `other` at t = 1.
    #[inline(always)]
    pub fn mix(self, other: Self, t: f32) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_of_axes_is_z() {
        let z = Vec3::new(1.0, 0.0, 0.0).cross(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!((z.x, z.y, z.z), (0.0, 0.0, 1.0));
    }

    #[test]
    fn normalize_is_unit_length() {
        let n = Vec3::new(3.0, 4.0, 12.0).normalize();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mix_endpoints() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(5.0, 6.0, 7.0);
        let mid = a.mix(b, 0.5);
        assert_eq!((mid.x, mid.y, mid.z), (3.0, 4.0, 5.0));
    }
}
