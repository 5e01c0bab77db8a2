//! Active-target state machine.
//!
//! # States
//! - Primary: traffic goes to the primary backend (initial state)
//! - Spare: traffic goes to the spare backend
//!
//! # State Transitions
//! ```text
//! Primary → Spare:   primary confirmed down by the failure detector
//! Spare   → Primary: explicit operator reset only (no automatic fail-back)
//! ```

use serde::Serialize;

use crate::backend::BackendId;

/// Record of the most recent switchover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRecord {
    pub at: u64,
    pub reason: String,
}

/// Owns the authoritative active target.
#[derive(Debug, Clone)]
pub struct FailoverMachine {
    active: BackendId,
    switchovers: u64,
    last_switch: Option<SwitchRecord>,
}

impl Default for FailoverMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FailoverMachine {
    pub fn new() -> Self {
        Self {
            active: BackendId::Primary,
            switchovers: 0,
            last_switch: None,
        }
    }

    pub fn active(&self) -> BackendId {
        self.active
    }

    pub fn switchovers(&self) -> u64 {
        self.switchovers
    }

    pub fn last_switch(&self) -> Option<&SwitchRecord> {
        self.last_switch.as_ref()
    }

    /// Move traffic to the spare. Returns false when the spare is already active.
    pub fn promote_spare(&mut self, reason: &str, now_ms: u64) -> bool {
        if self.active == BackendId::Spare {
            return false;
        }
        self.active = BackendId::Spare;
        self.switchovers += 1;
        self.last_switch = Some(SwitchRecord {
            at: now_ms,
            reason: reason.to_string(),
        });
        true
    }

    /// Return traffic to the primary. Returns the target that was active before.
    pub fn reset(&mut self) -> BackendId {
        std::mem::replace(&mut self.active, BackendId::Primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_on_primary() {
        let machine = FailoverMachine::new();
        assert_eq!(machine.active(), BackendId::Primary);
        assert_eq!(machine.switchovers(), 0);
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let mut machine = FailoverMachine::new();
        assert!(machine.promote_spare("primary down", 100));
        assert!(!machine.promote_spare("primary down again", 200));
        assert_eq!(machine.active(), BackendId::Spare);
        assert_eq!(machine.switchovers(), 1);
        assert_eq!(machine.last_switch().map(|s| s.at), Some(100));
    }

    #[test]
    fn test_reset_returns_to_primary() {
        let mut machine = FailoverMachine::new();
        machine.promote_spare("primary down", 100);
        assert_eq!(machine.reset(), BackendId::Spare);
        assert_eq!(machine.active(), BackendId::Primary);
        assert!(machine.promote_spare("primary down", 300));
        assert_eq!(machine.switchovers(), 2);
    }
}
