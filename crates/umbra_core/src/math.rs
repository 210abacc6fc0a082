//! Math primitives shared by the render graph: bounds, viewports and view frustums.

use glam::{Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// An inverted box that acts as the identity for [`Aabb::union`].
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    #[must_use]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// The box enclosing a sphere.
    #[inline]
    #[must_use]
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self::from_center_half_extents(center, Vec3::splat(radius))
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the sphere circumscribing the box.
    #[inline]
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents().length()
    }

    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// The eight corners, ordered by the bit pattern `(x, y, z)` of `index`.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// Transforms the box and returns the axis-aligned box enclosing the result.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        self.corners()
            .into_iter()
            .map(|corner| matrix.transform_point3(corner))
            .fold(Aabb::EMPTY, |acc, p| Aabb {
                min: acc.min.min(p),
                max: acc.max.max(p),
            })
    }
}

/// A rectangle in framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    #[must_use]
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A viewport anchored at the origin.
    #[inline]
    #[must_use]
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same rectangle scaled by `1 / divisor`, rounded up and never empty.
    #[must_use]
    pub fn downscaled(&self, divisor: u32) -> Self {
        let divisor = divisor.max(1);
        Self {
            x: self.x / divisor as i32,
            y: self.y / divisor as i32,
            width: self.width.div_ceil(divisor).max(1),
            height: self.height.div_ceil(divisor).max(1),
        }
    }
}

/// Camera view volume: pose, projection and clip planes.
///
/// The view matrix maps world space to a right-handed view space looking
/// down `-Z`. Projections use the `[0, 1]` depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrustum {
    position: Vec3,
    orientation: Quat,
    projection: Mat4,
    near: f32,
    far: f32,
}

impl ViewFrustum {
    /// Perspective frustum with a vertical field of view in radians.
    #[must_use]
    pub fn perspective(
        position: Vec3,
        orientation: Quat,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            orientation,
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
            near,
            far,
        }
    }

    /// Orthographic frustum centered on the view axis.
    #[must_use]
    pub fn orthographic(
        position: Vec3,
        orientation: Quat,
        half_width: f32,
        half_height: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            orientation,
            projection: Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                near,
                far,
            ),
            near,
            far,
        }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    /// Unit vector the camera looks along.
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    #[inline]
    #[must_use]
    pub fn near_clip(&self) -> f32 {
        self.near
    }

    #[inline]
    #[must_use]
    pub fn far_clip(&self) -> f32 {
        self.far
    }

    #[inline]
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// World-to-view transform.
    #[inline]
    #[must_use]
    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    /// View-to-world transform.
    #[inline]
    #[must_use]
    pub fn view_inverse(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }

    /// Projection with a sub-pixel offset (in NDC units) applied after projection.
    #[must_use]
    pub fn jittered_projection(&self, jitter_ndc: glam::Vec2) -> Mat4 {
        Mat4::from_translation(jitter_ndc.extend(0.0)) * self.projection
    }

    /// The eight world-space corners: near plane first, then far plane,
    /// each in `(-x,-y) (+x,-y) (-x,+y) (+x,+y)` order.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let inverse = self.view_projection().inverse();
        std::array::from_fn(|i| {
            let ndc = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { 0.0 } else { 1.0 },
            );
            inverse.project_point3(ndc)
        })
    }

    /// Six normalized planes `(normal, d)` facing inward: left, right,
    /// bottom, top, near, far.
    #[must_use]
    pub fn planes(&self) -> [Vec4; 6] {
        let m = self.view_projection();
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[2],
            rows[3] - rows[2],
        ];
        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > f32::EPSILON {
                *plane /= length;
            }
        }
        planes
    }

    /// Conservative sphere test against the six planes.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes()
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}
