//! Axis-aligned bounding volumes
//!
//! [`BoundingBox`] is the full-precision box written into group and model
//! headers. [`LowResBox`] is the 16-bit variant stored in render batch
//! records; converting to it always rounds outward so the reduced box still
//! contains every original point.

use glam::Vec3;

/// Horizontal split axis used by spatial partitioning and collision trees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Component of `v` along this axis
    #[inline]
    pub fn of(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }
}

/// Full-precision axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Serialized size: min xyz + max xyz as f32
    pub const SIZE: usize = 24;

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Compute the box of a point set.
    ///
    /// An empty input yields a zero-size box at the origin.
    pub fn from_points(points: &[Vec3]) -> Self {
        Self::from_points_iter(points.iter().copied())
    }

    /// Same as [`from_points`](Self::from_points) for any point iterator
    pub fn from_points_iter<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };
        points.fold(Self::new(first, first), |b, p| {
            Self::new(b.min.min(p), b.max.max(p))
        })
    }

    /// Compute the box of a point set and grow it by `padding` on every axis
    pub fn from_points_with_padding(points: &[Vec3], padding: f32) -> Self {
        Self::from_points(points).padded(padding)
    }

    /// Grow the box symmetrically by `padding` on every axis
    pub fn padded(&self, padding: f32) -> Self {
        let pad = Vec3::splat(padding);
        Self::new(self.min - pad, self.max + pad)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Distance from the center to the farthest corner
    pub fn sphere_radius(&self) -> f32 {
        self.extent().length() * 0.5
    }

    /// Closed containment test
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Closed overlap test; touching boxes intersect
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// The longer of the X/Y extents (X wins ties)
    pub fn longer_horizontal_axis(&self) -> Axis {
        let extent = self.extent();
        if extent.x >= extent.y { Axis::X } else { Axis::Y }
    }

    /// Split at the midpoint of `axis`.
    ///
    /// Returns `(lower, upper, plane)`. The halves share the plane; use
    /// [`is_below`](Self::is_below) for a strict membership decision.
    pub fn split(&self, axis: Axis) -> (BoundingBox, BoundingBox, f32) {
        let plane = (axis.of(self.min) + axis.of(self.max)) * 0.5;
        let mut lower = *self;
        let mut upper = *self;
        match axis {
            Axis::X => {
                lower.max.x = plane;
                upper.min.x = plane;
            }
            Axis::Y => {
                lower.max.y = plane;
                upper.min.y = plane;
            }
        }
        (lower, upper, plane)
    }

    /// Half-open membership: points exactly on the plane belong to the upper half
    #[inline]
    pub fn is_below(point: Vec3, axis: Axis, plane: f32) -> bool {
        axis.of(point) < plane
    }

    /// Reduced-precision copy, rounded outward
    pub fn to_low_res(&self) -> LowResBox {
        LowResBox {
            min: [floor_i16(self.min.x), floor_i16(self.min.y), floor_i16(self.min.z)],
            max: [ceil_i16(self.max.x), ceil_i16(self.max.y), ceil_i16(self.max.z)],
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        for (i, v) in self.min.to_array().into_iter().chain(self.max.to_array()).enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        bytes
    }
}

// float -> int `as` casts saturate at the target range
fn floor_i16(v: f32) -> i16 {
    v.floor() as i16
}

fn ceil_i16(v: f32) -> i16 {
    v.ceil() as i16
}

/// 16-bit bounding box stored in render batch records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LowResBox {
    pub min: [i16; 3],
    pub max: [i16; 3],
}

impl LowResBox {
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        for (i, v) in self.min.iter().chain(self.max.iter()).enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// True if this box fully contains `other`
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        let min = Vec3::new(self.min[0] as f32, self.min[1] as f32, self.min[2] as f32);
        let max = Vec3::new(self.max[0] as f32, self.max[1] as f32, self.max[2] as f32);
        other.min.cmpge(min).all() && other.max.cmple(max).all()
    }
}
