// src/collision_matrix.rs
//! Per-layer collide masks and the filter data derived from them.

use serde::{Deserialize, Serialize};

pub const MAX_LAYERS: usize = 32;

/// Filter words attached to a shape.
///
/// `membership` has exactly the shape's layer bit set, `collide_mask` holds every layer it may
/// touch. Two shapes interact when each one's membership is in the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub membership: u32,
    pub collide_mask: u32,
}

impl FilterData {
    pub const NONE: FilterData = FilterData {
        membership: 0,
        collide_mask: 0,
    };

    #[inline]
    pub fn interacts_with(&self, other: &FilterData) -> bool {
        (self.membership & other.collide_mask) != 0 && (other.membership & self.collide_mask) != 0
    }
}

/// Symmetric 32x32 layer collision table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionMatrix {
    masks: [u32; MAX_LAYERS],
}

impl Default for CollisionMatrix {
    fn default() -> Self {
        Self {
            masks: [u32::MAX; MAX_LAYERS],
        }
    }
}

/// Layers outside 0..32 are treated as layer 0.
#[inline]
fn layer_index(layer: u32) -> usize {
    if (layer as usize) < MAX_LAYERS {
        layer as usize
    } else {
        0
    }
}

impl CollisionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the table changed. Always updates both (a, b) and (b, a).
    pub fn set_can_collide(&mut self, a: u32, b: u32, enabled: bool) -> bool {
        if layer_index(a) as u32 != a || layer_index(b) as u32 != b {
            log::warn!("ignoring collision toggle for out-of-range layers ({a}, {b})");
            return false;
        }
        let before = self.clone();
        let (ia, ib) = (a as usize, b as usize);
        if enabled {
            self.masks[ia] |= 1 << ib;
            self.masks[ib] |= 1 << ia;
        } else {
            self.masks[ia] &= !(1 << ib);
            self.masks[ib] &= !(1 << ia);
        }
        *self != before
    }

    #[inline]
    pub fn can_collide(&self, a: u32, b: u32) -> bool {
        let (ia, ib) = (layer_index(a), layer_index(b));
        self.masks[ia] & (1 << ib) != 0
    }

    #[inline]
    pub fn mask(&self, layer: u32) -> u32 {
        self.masks[layer_index(layer)]
    }

    /// Filter used by the simulation (contacts and triggers).
    #[inline]
    pub fn make_sim_filter(&self, layer: u32) -> FilterData {
        let index = layer_index(layer);
        FilterData {
            membership: 1 << index,
            collide_mask: self.masks[index],
        }
    }

    /// Filter used by scene queries. A query with `layer_mask` hits the shape when the mask
    /// contains the shape's layer bit.
    #[inline]
    pub fn make_query_filter(&self, layer: u32) -> FilterData {
        FilterData {
            membership: 1 << layer_index(layer),
            collide_mask: u32::MAX,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
