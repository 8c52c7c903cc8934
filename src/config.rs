// src/config.rs
//! Physics configuration, loaded from JSON.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision_matrix::{CollisionMatrix, MAX_LAYERS};
use crate::components::PhysicsMaterial;
use crate::error::{Error, Result};

/// Scene-wide physics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: [f32; 3],
    /// Seconds per fixed step.
    pub fixed_dt: f32,
    /// Catch-up limit for `PhysicsManager::update`.
    pub max_steps_per_frame: u32,
    /// Layer pairs that never collide.
    pub disabled_layer_pairs: Vec<[u32; 2]>,
    /// Used by colliders created without an explicit material.
    pub default_material: PhysicsMaterial,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            fixed_dt: 1.0 / 60.0,
            max_steps_per_frame: 5,
            disabled_layer_pairs: Vec::new(),
            default_material: PhysicsMaterial::default(),
        }
    }
}

impl PhysicsConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        log::info!("loaded physics config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(Error::invalid_config("gravity must be finite"));
        }
        if !(self.fixed_dt.is_finite() && self.fixed_dt > 0.0) {
            return Err(Error::invalid_config(format!(
                "fixed_dt must be positive, got {}",
                self.fixed_dt
            )));
        }
        if self.max_steps_per_frame == 0 {
            return Err(Error::invalid_config("max_steps_per_frame must be at least 1"));
        }
        if let Some([a, b]) = self
            .disabled_layer_pairs
            .iter()
            .find(|[a, b]| *a as usize >= MAX_LAYERS || *b as usize >= MAX_LAYERS)
        {
            return Err(Error::invalid_config(format!(
                "layer pair ({a}, {b}) out of range 0..{MAX_LAYERS}"
            )));
        }
        let m = &self.default_material;
        if m.friction < 0.0 || m.restitution < 0.0 || m.density < 0.0 {
            return Err(Error::invalid_config("default material values must be >= 0"));
        }
        Ok(())
    }

    #[inline]
    pub fn gravity_vec(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    /// Collision matrix with every configured pair disabled.
    pub fn collision_matrix(&self) -> CollisionMatrix {
        let mut matrix = CollisionMatrix::new();
        for [a, b] in &self.disabled_layer_pairs {
            matrix.set_can_collide(*a, *b, false);
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            PhysicsConfig::from_json_str(r#"{ "gravity": [0, 0, 0], "disabled_layer_pairs": [[1, 2]] }"#)
                .unwrap();
        assert_eq!(config.gravity_vec(), Vec3::ZERO);
        assert_eq!(config.fixed_dt, 1.0 / 60.0);
        let matrix = config.collision_matrix();
        assert!(!matrix.can_collide(2, 1));
        assert!(matrix.can_collide(1, 1));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PhysicsConfig::from_json_str(r#"{ "fixed_dt": 0.0 }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            PhysicsConfig::from_json_str(r#"{ "disabled_layer_pairs": [[3, 40]] }"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            PhysicsConfig::from_json_str("{ not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn round_trips_through_json() {
        let config = PhysicsConfig {
            max_steps_per_frame: 3,
            ..PhysicsConfig::default()
        };
        let text = config.to_json_string().unwrap();
        assert_eq!(PhysicsConfig::from_json_str(&text).unwrap(), config);
    }
}
