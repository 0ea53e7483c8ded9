//! Pose - blendable transform with a changed-mask
//!
//! The changed-mask lets the per-frame resolver merge only the fields an
//! upstream context actually touched, instead of copying the whole pose.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Which pose fields changed since the mask was last cleared
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PoseMask: u8 {
        const POSITION = 1 << 0;
        const ROTATION = 1 << 1;
        const SCALE    = 1 << 2;
    }
}

// Masks persist as raw bits, matching the flags bitset in entry state.
impl Serialize for PoseMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PoseMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(PoseMask::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

/// A blendable transform
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    changed: PoseMask,
}

impl Pose {
    /// The identity pose with no changed fields
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            changed: PoseMask::empty(),
        }
    }

    /// Get the position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Get the rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Get the scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set the position, marking it changed
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.changed |= PoseMask::POSITION;
    }

    /// Set the rotation, marking it changed
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.changed |= PoseMask::ROTATION;
    }

    /// Set the scale, marking it changed
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.changed |= PoseMask::SCALE;
    }

    /// Get the changed-mask
    pub fn changed(&self) -> PoseMask {
        self.changed
    }

    /// Clear the changed-mask
    pub fn clear_changed(&mut self) {
        self.changed = PoseMask::empty();
    }

    /// Copy every field and the changed-mask from `other`
    pub fn override_all(&mut self, other: &Pose) {
        *self = other.clone();
    }

    /// Copy only the fields `other` has flagged as changed; the local
    /// mask accumulates them.
    pub fn override_changed(&mut self, other: &Pose) {
        if other.changed.contains(PoseMask::POSITION) {
            self.position = other.position;
        }
        if other.changed.contains(PoseMask::ROTATION) {
            self.rotation = other.rotation;
        }
        if other.changed.contains(PoseMask::SCALE) {
            self.scale = other.scale;
        }
        self.changed |= other.changed;
    }

    /// Blend `top` onto this pose with the given weight
    pub fn blend_apply(&mut self, top: &Pose, alpha: f32) {
        self.position = self.position.lerp(top.position, alpha);
        self.rotation = self.rotation.slerp(top.rotation, alpha);
        self.scale = self.scale.lerp(top.scale, alpha);
        self.changed |= top.changed;
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}
