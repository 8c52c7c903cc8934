// src/command_buffer.rs
//! Deferred physics command queue.
//!
//! Gameplay code never touches the Rapier sets directly. Every object-graph mutation is queued
//! here and flushed by the fixed-step driver in three phases: type changes, pre-step
//! (register / attach / rebuild) and post-step (detach, then unregister).

use std::collections::HashSet;

use crate::components::{ColliderId, RigidId};

// ============================================================================
// 1. COMMANDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicsCommand {
    RegisterRigid(RigidId),
    UnregisterRigid(RigidId),
    AttachCollider { rigid: RigidId, collider: ColliderId },
    DetachCollider { rigid: RigidId, collider: ColliderId },
    RebuildCollider { rigid: RigidId, collider: ColliderId },
    ChangeRigidType(RigidId),
}

/// When a command is consumed during `step_fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPhase {
    TypeChange,
    PreStep,
    PostStep,
}

impl PhysicsCommand {
    #[inline]
    pub fn rigid(&self) -> RigidId {
        match *self {
            Self::RegisterRigid(rigid)
            | Self::UnregisterRigid(rigid)
            | Self::ChangeRigidType(rigid)
            | Self::AttachCollider { rigid, .. }
            | Self::DetachCollider { rigid, .. }
            | Self::RebuildCollider { rigid, .. } => rigid,
        }
    }

    #[inline]
    pub fn collider(&self) -> Option<ColliderId> {
        match *self {
            Self::AttachCollider { collider, .. }
            | Self::DetachCollider { collider, .. }
            | Self::RebuildCollider { collider, .. } => Some(collider),
            _ => None,
        }
    }

    #[inline]
    pub fn phase(&self) -> FlushPhase {
        match self {
            Self::ChangeRigidType(_) => FlushPhase::TypeChange,
            Self::RegisterRigid(_) | Self::AttachCollider { .. } | Self::RebuildCollider { .. } => {
                FlushPhase::PreStep
            }
            Self::DetachCollider { .. } | Self::UnregisterRigid(_) => FlushPhase::PostStep,
        }
    }
}

// ============================================================================
// 2. QUEUE
// ============================================================================

/// Counters for profiling the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: usize,
    /// Requests dropped or superseded by coalescing.
    pub coalesced: usize,
    pub flushed: usize,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<PhysicsCommand>,
    pending_unregister: HashSet<RigidId>,
    reapply_filters: bool,
    stats: QueueStats,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_pending_unregister(&self, rigid: RigidId) -> bool {
        self.pending_unregister.contains(&rigid)
    }

    fn push(&mut self, cmd: PhysicsCommand) {
        log::trace!("queue {:?}", cmd);
        self.commands.push(cmd);
        self.stats.enqueued += 1;
    }

    /// Removes every command matching `pred`; returns how many were removed.
    fn remove_where(&mut self, pred: impl Fn(&PhysicsCommand) -> bool) -> usize {
        let before = self.commands.len();
        self.commands.retain(|c| !pred(c));
        let removed = before - self.commands.len();
        self.stats.coalesced += removed;
        removed
    }

    /// At most one register entry per rigid; the latest request wins.
    pub fn request_register(&mut self, rigid: RigidId) -> bool {
        if self.is_pending_unregister(rigid) {
            self.stats.coalesced += 1;
            return false;
        }
        self.remove_where(|c| *c == PhysicsCommand::RegisterRigid(rigid));
        self.push(PhysicsCommand::RegisterRigid(rigid));
        true
    }

    /// Drops the register/attach/detach/type-change entries queued for `rigid` and marks it
    /// pending unregister. Rebuilds survive: they belong to the collider, which may move on.
    pub fn request_unregister(&mut self, rigid: RigidId) -> bool {
        if self.is_pending_unregister(rigid) {
            self.stats.coalesced += 1;
            return false;
        }
        self.remove_where(|c| {
            c.rigid() == rigid && !matches!(c, PhysicsCommand::RebuildCollider { .. })
        });
        self.pending_unregister.insert(rigid);
        self.push(PhysicsCommand::UnregisterRigid(rigid));
        true
    }

    /// A queued detach of the same pair is cancelled.
    pub fn request_attach(&mut self, rigid: RigidId, collider: ColliderId) -> bool {
        if self.is_pending_unregister(rigid) {
            self.stats.coalesced += 1;
            return false;
        }
        self.remove_where(|c| *c == PhysicsCommand::DetachCollider { rigid, collider });
        self.remove_where(|c| *c == PhysicsCommand::AttachCollider { rigid, collider });
        self.push(PhysicsCommand::AttachCollider { rigid, collider });
        true
    }

    /// A queued attach of the same pair cancels out with this detach; nothing is enqueued then.
    pub fn request_detach(&mut self, rigid: RigidId, collider: ColliderId) -> bool {
        if self.is_pending_unregister(rigid) {
            self.stats.coalesced += 1;
            return false;
        }
        if self.remove_where(|c| *c == PhysicsCommand::AttachCollider { rigid, collider }) > 0 {
            self.stats.coalesced += 1;
            return false;
        }
        self.remove_where(|c| *c == PhysicsCommand::DetachCollider { rigid, collider });
        self.push(PhysicsCommand::DetachCollider { rigid, collider });
        true
    }

    /// One rebuild per collider.
    pub fn request_rebuild(&mut self, rigid: RigidId, collider: ColliderId) -> bool {
        self.remove_where(|c| {
            matches!(c, PhysicsCommand::RebuildCollider { collider: queued, .. } if *queued == collider)
        });
        self.push(PhysicsCommand::RebuildCollider { rigid, collider });
        true
    }

    /// One type change per rigid.
    pub fn request_change_type(&mut self, rigid: RigidId) -> bool {
        if self.is_pending_unregister(rigid) {
            self.stats.coalesced += 1;
            return false;
        }
        self.remove_where(|c| *c == PhysicsCommand::ChangeRigidType(rigid));
        self.push(PhysicsCommand::ChangeRigidType(rigid));
        true
    }

    /// Coarse flag: every attached shape gets its filter data recomputed on the next step.
    #[inline]
    pub fn request_reapply_filters(&mut self) {
        self.reapply_filters = true;
    }

    #[inline]
    pub fn take_reapply_filters(&mut self) -> bool {
        std::mem::take(&mut self.reapply_filters)
    }

    // ------------------------------------------------------------------------
    // Flush
    // ------------------------------------------------------------------------

    fn take_phase(&mut self, phase: FlushPhase) -> Vec<PhysicsCommand> {
        let mut taken = Vec::new();
        self.commands.retain(|c| {
            if c.phase() == phase {
                taken.push(*c);
                false
            } else {
                true
            }
        });
        self.stats.flushed += taken.len();
        taken
    }

    /// Rigids with a queued type change, in request order.
    pub fn take_type_changes(&mut self) -> Vec<RigidId> {
        self.take_phase(FlushPhase::TypeChange)
            .into_iter()
            .map(|c| c.rigid())
            .collect()
    }

    /// Register / attach / rebuild commands in FIFO order.
    pub fn take_pre_step(&mut self) -> Vec<PhysicsCommand> {
        self.take_phase(FlushPhase::PreStep)
    }

    /// Every detach (FIFO) followed by every unregister (FIFO).
    pub fn take_post_step(&mut self) -> Vec<PhysicsCommand> {
        let (mut detaches, unregisters): (Vec<_>, Vec<_>) = self
            .take_phase(FlushPhase::PostStep)
            .into_iter()
            .partition(|c| matches!(c, PhysicsCommand::DetachCollider { .. }));
        detaches.extend(unregisters);
        detaches
    }

    /// Called once the unregister for `rigid` has been carried out.
    #[inline]
    pub fn clear_pending_unregister(&mut self, rigid: RigidId) {
        self.pending_unregister.remove(&rigid);
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.pending_unregister.clear();
        self.reapply_filters = false;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhysicsCommand> {
        self.commands.iter()
    }

    /// Number of queued commands referencing `rigid`.
    pub fn count_for(&self, rigid: RigidId) -> usize {
        self.commands.iter().filter(|c| c.rigid() == rigid).count()
    }

    #[inline]
    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

// ============================================================================
// 3. TESTS
// ============================================================================
