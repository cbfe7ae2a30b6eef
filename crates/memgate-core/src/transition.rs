//! Membership state machine
//!
//! Pure transition function for a pair. The target state depends only on
//! the decision; the role side effect depends only on the target state and
//! whether the role is currently applied. Re-applying a decision to its
//! own result therefore always yields the same state and no side effect.
//!
//! | current | decision | next | side effect |
//! |---|---|---|---|
//! | any | Active | Active | grant if not applied |
//! | any | Expired | Expired | revoke if applied |
//! | any | Indeterminate | Rejected | revoke if applied |

use crate::decision::Decision;
use crate::types::MembershipState;
use serde::{Deserialize, Serialize};

/// External role call required by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleEffect {
    /// Role already matches the target state
    None,
    /// Grant the role
    Grant,
    /// Revoke the role
    Revoke,
}

/// Result of applying a decision to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State before
    pub from: MembershipState,
    /// State after
    pub to: MembershipState,
    /// Role call needed to reach `to`
    pub effect: RoleEffect,
}

impl Transition {
    /// Whether the state changes
    #[inline]
    #[must_use]
    pub fn changes_state(&self) -> bool {
        self.from != self.to
    }
}

/// State a decision leads to
#[inline]
#[must_use]
pub const fn target_state(decision: &Decision) -> MembershipState {
    match decision {
        Decision::Active => MembershipState::Active,
        Decision::Expired => MembershipState::Expired,
        Decision::Indeterminate(_) => MembershipState::Rejected,
    }
}

/// Role call that reconciles `role_applied` with `target`
#[inline]
#[must_use]
pub const fn role_effect(target: MembershipState, role_applied: bool) -> RoleEffect {
    match (target.wants_role(), role_applied) {
        (true, false) => RoleEffect::Grant,
        (false, true) => RoleEffect::Revoke,
        _ => RoleEffect::None,
    }
}

/// Apply `decision` to a pair in `current` state
#[must_use]
pub fn transition(current: MembershipState, role_applied: bool, decision: &Decision) -> Transition {
    let to = target_state(decision);
    Transition {
        from: current,
        to,
        effect: role_effect(to, role_applied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::IndeterminateReason;

    const INDETERMINATE: Decision = Decision::Indeterminate(IndeterminateReason::NoDateFound);

    #[test]
    fn pending_to_active_grants() {
        let t = transition(MembershipState::Pending, false, &Decision::Active);
        assert_eq!(t.to, MembershipState::Active);
        assert_eq!(t.effect, RoleEffect::Grant);
    }

    #[test]
    fn active_recheck_is_noop() {
        let t = transition(MembershipState::Active, true, &Decision::Active);
        assert_eq!(t.to, MembershipState::Active);
        assert_eq!(t.effect, RoleEffect::None);
        assert!(!t.changes_state());
    }

    #[test]
    fn active_to_expired_revokes() {
        let t = transition(MembershipState::Active, true, &Decision::Expired);
        assert_eq!(t.to, MembershipState::Expired);
        assert_eq!(t.effect, RoleEffect::Revoke);
    }

    #[test]
    fn indeterminate_rejects_and_revokes_if_applied() {
        let t = transition(MembershipState::Active, true, &INDETERMINATE);
        assert_eq!(t.to, MembershipState::Rejected);
        assert_eq!(t.effect, RoleEffect::Revoke);

        let t = transition(MembershipState::Pending, false, &INDETERMINATE);
        assert_eq!(t.to, MembershipState::Rejected);
        assert_eq!(t.effect, RoleEffect::None);
    }

    #[test]
    fn expired_can_be_reactivated() {
        let t = transition(MembershipState::Expired, false, &Decision::Active);
        assert_eq!(t.to, MembershipState::Active);
        assert_eq!(t.effect, RoleEffect::Grant);
    }

    #[test]
    fn crash_after_grant_self_heals() {
        // Grant succeeded but the record still says Pending with role_applied=false:
        // re-running asks for the grant again, which the platform treats as a no-op.
        let t = transition(MembershipState::Pending, false, &Decision::Active);
        assert_eq!(t.effect, RoleEffect::Grant);
    }
}
