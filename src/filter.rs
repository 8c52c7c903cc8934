// src/filter.rs
//! Layer filtering: maps `FilterData` + `ShapeMode` onto Rapier collision groups.
//!
//! Rapier tests `InteractionGroups` both ways before any narrow phase work, which is the same
//! rule `filter_pair` states in plain code.

use rapier3d::prelude::{ActiveCollisionTypes, ActiveEvents, Collider, Group, InteractionGroups};

use crate::collision_matrix::FilterData;
use crate::components::ShapeMode;

/// Outcome of the pair filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairBehavior {
    Suppress,
    Contact,
    Trigger,
}

/// Decides what two shapes do when their bounds overlap.
pub fn filter_pair(a: (FilterData, ShapeMode), b: (FilterData, ShapeMode)) -> PairBehavior {
    let (fa, ma) = a;
    let (fb, mb) = b;
    let simulated = |m: ShapeMode| matches!(m, ShapeMode::Simulation | ShapeMode::Trigger);
    if !simulated(ma) || !simulated(mb) || !fa.interacts_with(&fb) {
        return PairBehavior::Suppress;
    }
    if ma == ShapeMode::Trigger || mb == ShapeMode::Trigger {
        PairBehavior::Trigger
    } else {
        PairBehavior::Contact
    }
}

#[inline]
pub fn interaction_groups(filter: FilterData) -> InteractionGroups {
    InteractionGroups::new(
        Group::from_bits_truncate(filter.membership),
        Group::from_bits_truncate(filter.collide_mask),
    )
}

/// Writes simulation filter data and shape flags onto a collider.
pub fn configure_collider(collider: &mut Collider, sim: FilterData, mode: ShapeMode) {
    match mode {
        ShapeMode::Simulation => {
            collider.set_sensor(false);
            collider.set_collision_groups(interaction_groups(sim));
            collider.set_solver_groups(interaction_groups(sim));
            collider.set_active_collision_types(ActiveCollisionTypes::default());
        }
        ShapeMode::Trigger => {
            collider.set_sensor(true);
            collider.set_collision_groups(interaction_groups(sim));
            collider.set_solver_groups(interaction_groups(sim));
            // Trigger volumes on static bodies must still see kinematic movers.
            collider.set_active_collision_types(
                ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED,
            );
        }
        ShapeMode::QueryOnly | ShapeMode::Disabled => {
            collider.set_sensor(false);
            collider.set_collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(sim.membership),
                Group::empty(),
            ));
            collider.set_solver_groups(InteractionGroups::none());
        }
    }
    collider.set_active_events(ActiveEvents::COLLISION_EVENTS);
}

/// Scene-query visibility: disabled shapes and shapes with queries turned off never hit.
#[inline]
pub fn query_visible(query: FilterData, mode: ShapeMode, query_enabled: bool, layer_mask: u32) -> bool {
    query_enabled && mode != ShapeMode::Disabled && (query.membership & layer_mask) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision_matrix::CollisionMatrix;
    use rapier3d::prelude::{ColliderBuilder, SharedShape};

    #[test]
    fn pair_filter_follows_matrix_and_modes() {
        let mut matrix = CollisionMatrix::new();
        matrix.set_can_collide(1, 2, false);
        let l1 = matrix.make_sim_filter(1);
        let l2 = matrix.make_sim_filter(2);
        let l3 = matrix.make_sim_filter(3);

        assert_eq!(
            filter_pair((l1, ShapeMode::Simulation), (l2, ShapeMode::Simulation)),
            PairBehavior::Suppress
        );
        assert_eq!(
            filter_pair((l1, ShapeMode::Simulation), (l3, ShapeMode::Simulation)),
            PairBehavior::Contact
        );
        assert_eq!(
            filter_pair((l3, ShapeMode::Trigger), (l1, ShapeMode::Simulation)),
            PairBehavior::Trigger
        );
        assert_eq!(
            filter_pair((l3, ShapeMode::QueryOnly), (l1, ShapeMode::Simulation)),
            PairBehavior::Suppress
        );
    }

    #[test]
    fn configured_groups_agree_with_pair_filter() {
        let mut matrix = CollisionMatrix::new();
        matrix.set_can_collide(4, 5, false);
        let mut a = ColliderBuilder::new(SharedShape::ball(1.0)).build();
        let mut b = ColliderBuilder::new(SharedShape::ball(1.0)).build();
        configure_collider(&mut a, matrix.make_sim_filter(4), ShapeMode::Simulation);
        configure_collider(&mut b, matrix.make_sim_filter(5), ShapeMode::Simulation);
        assert!(!a.collision_groups().test(b.collision_groups()));

        configure_collider(&mut b, matrix.make_sim_filter(6), ShapeMode::Trigger);
        assert!(a.collision_groups().test(b.collision_groups()));
        assert!(b.is_sensor());

        configure_collider(&mut b, matrix.make_sim_filter(6), ShapeMode::Disabled);
        assert!(!a.collision_groups().test(b.collision_groups()));
        assert!(!b.is_sensor());
    }

    #[test]
    fn query_visibility_honors_mode_and_flag() {
        let matrix = CollisionMatrix::new();
        let q = matrix.make_query_filter(3);
        assert!(query_visible(q, ShapeMode::QueryOnly, true, 1 << 3));
        assert!(!query_visible(q, ShapeMode::Simulation, true, 1 << 2));
        assert!(!query_visible(q, ShapeMode::Disabled, true, u32::MAX));
        assert!(!query_visible(q, ShapeMode::Trigger, false, u32::MAX));
    }
}
