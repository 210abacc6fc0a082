//! Per-frame stages: lights, hazes and backgrounds staged by the zone jobs.
//!
//! Stages are cleared at the start of zone setup and refilled from the zones
//! and light items of the current frame. Only the haze parameter buffer
//! persists across frames.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::gpu::uniforms::HazeUniforms;
use crate::gpu::{BufferId, GpuContext, TextureId};
use umbra_core::errors::GpuError;
use umbra_core::math::Aabb;

// ─── Lights ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Sun,
    Point,
    /// Spot light with its half cone angle in radians.
    Spot { cutoff: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Influence radius of local lights.
    pub falloff_radius: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 1.0,
            falloff_radius: 10.0,
        }
    }
}

impl Light {
    #[must_use]
    pub fn sun(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Sun,
            direction: direction.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn point(position: Vec3, falloff_radius: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            falloff_radius,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn spot(position: Vec3, direction: Vec3, cutoff: f32, falloff_radius: f32) -> Self {
        Self {
            kind: LightKind::Spot { cutoff },
            position,
            direction: direction.normalize_or(Vec3::NEG_Y),
            falloff_radius,
            ..Self::default()
        }
    }

    /// Point and spot lights; they are clustered and drawn as volumes.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        !matches!(self.kind, LightKind::Sun)
    }

    /// Sphere enclosing the light's influence.
    ///
    /// Spot cones narrower than 90° are bounded by a sphere around the cone
    /// rather than around the apex.
    #[must_use]
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        match self.kind {
            LightKind::Sun => (self.position, f32::INFINITY),
            LightKind::Point => (self.position, self.falloff_radius),
            LightKind::Spot { cutoff } => {
                let cutoff = cutoff.clamp(0.0, std::f32::consts::PI);
                if cutoff >= std::f32::consts::FRAC_PI_4 {
                    return (self.position, self.falloff_radius);
                }
                let half_length = self.falloff_radius * 0.5;
                let base_radius = self.falloff_radius * cutoff.tan();
                let radius = half_length.hypot(base_radius);
                (self.position + self.direction * half_length, radius)
            }
        }
    }

    #[must_use]
    pub fn bound(&self) -> Aabb {
        let (center, radius) = self.bounding_sphere();
        Aabb::from_sphere(center, radius)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec3::splat(0.2),
            intensity: 1.0,
        }
    }
}

/// Lights visible this frame.
#[derive(Debug, Default)]
pub struct LightStage {
    lights: Vec<Light>,
    sun: Option<Light>,
    ambient: Option<AmbientLight>,
}

impl LightStage {
    pub fn clear(&mut self) {
        self.lights.clear();
        self.sun = None;
        self.ambient = None;
    }

    /// Adds a local light and returns its index in the frame.
    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn set_sun(&mut self, sun: Light) {
        self.sun = Some(sun);
    }

    pub fn set_ambient(&mut self, ambient: AmbientLight) {
        self.ambient = Some(ambient);
    }

    #[must_use]
    pub fn sun(&self) -> Option<&Light> {
        self.sun.as_ref()
    }

    #[must_use]
    pub fn ambient(&self) -> Option<&AmbientLight> {
        self.ambient.as_ref()
    }

    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }
}

// ─── Haze ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Haze {
    pub color: Vec3,
    pub range: f32,
    pub height: f32,
    pub base_level: f32,
    pub background_blend: f32,
}

impl Default for Haze {
    fn default() -> Self {
        Self {
            color: Vec3::new(0.5, 0.6, 0.7),
            range: 1000.0,
            height: 200.0,
            base_level: 0.0,
            background_blend: 0.0,
        }
    }
}

impl Haze {
    #[must_use]
    pub fn uniforms(&self) -> HazeUniforms {
        HazeUniforms {
            color: self.color.extend(1.0),
            params: Vec4::new(self.range, self.height, self.base_level, self.background_blend),
        }
    }
}

/// Hazes staged this frame plus the persistent haze parameter buffer.
#[derive(Debug, Default)]
pub struct HazeStage {
    hazes: Vec<Haze>,
    buffer: Option<BufferId>,
}

impl HazeStage {
    pub fn clear(&mut self) {
        self.hazes.clear();
    }

    pub fn add_haze(&mut self, haze: Haze) {
        self.hazes.push(haze);
    }

    /// The haze that applies to this frame (the first staged one).
    #[must_use]
    pub fn current(&self) -> Option<&Haze> {
        self.hazes.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hazes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hazes.is_empty()
    }

    /// Parameter buffer; present once the haze model has run.
    #[must_use]
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Uploads the current haze, allocating the buffer on first use.
    pub fn upload(&mut self, gpu: &mut GpuContext) -> Result<Option<BufferId>, GpuError> {
        let Some(haze) = self.current() else {
            return Ok(None);
        };
        let uniforms = haze.uniforms();
        let buffer = match self.buffer {
            Some(id) => {
                gpu.update_uniform(id, &uniforms)?;
                id
            }
            None => {
                let id = gpu.create_uniform_buffer("HazeParameters", &uniforms);
                self.buffer = Some(id);
                id
            }
        };
        Ok(Some(buffer))
    }
}

// ─── Background ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Skybox {
    pub color: Vec3,
    pub texture: Option<TextureId>,
}

/// Skyboxes staged this frame.
#[derive(Debug, Default)]
pub struct BackgroundStage {
    skyboxes: Vec<Skybox>,
}

impl BackgroundStage {
    pub fn clear(&mut self) {
        self.skyboxes.clear();
    }

    pub fn add_skybox(&mut self, skybox: Skybox) {
        self.skyboxes.push(skybox);
    }

    #[must_use]
    pub fn current(&self) -> Option<&Skybox> {
        self.skyboxes.first()
    }

    #[must_use]
    pub fn skyboxes(&self) -> &[Skybox] {
        &self.skyboxes
    }
}

// ─── Zones ─────────────────────────────────────────────────────────────────

/// A region that contributes sun, ambient, skybox and haze to the frame.
#[derive(Debug, Clone, Default)]
pub struct Zone {
    pub bound: Aabb,
    pub sun: Option<Light>,
    pub ambient: Option<AmbientLight>,
    pub skybox: Option<Skybox>,
    pub haze: Option<Haze>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_spot_sphere_is_smaller_than_range() {
        let spot = Light::spot(Vec3::ZERO, Vec3::NEG_Z, 0.2, 10.0);
        let (center, radius) = spot.bounding_sphere();
        assert!(radius < 10.0);
        assert!((center - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-4);
    }

    #[test]
    fn test_haze_buffer_persists() {
        let mut gpu = GpuContext::default();
        let mut stage = HazeStage::default();
        assert_eq!(stage.upload(&mut gpu).unwrap(), None);

        stage.add_haze(Haze::default());
        let first = stage.upload(&mut gpu).unwrap();
        stage.clear();
        stage.add_haze(Haze {
            range: 50.0,
            ..Haze::default()
        });
        let second = stage.upload(&mut gpu).unwrap();
        assert_eq!(first, second);

        let uniforms: HazeUniforms = gpu.read_uniform(second.unwrap()).unwrap();
        assert_eq!(uniforms.params.x, 50.0);
    }
}
