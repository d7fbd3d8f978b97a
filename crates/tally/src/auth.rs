//! Authorization gate for mutating entry points.
//!
//! Only a designated coordinator may initialize quorums or change
//! membership. The registry asks an [`Authorizer`] before every mutation and
//! never looks at callers itself.

use tally_types::CallerId;
use tracing::warn;

/// Decides whether a caller may mutate the registry.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, caller: &CallerId) -> bool;
}

/// Admits exactly one caller: the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorOnly {
    coordinator: CallerId,
}

impl CoordinatorOnly {
    pub fn new(coordinator: impl Into<CallerId>) -> Self {
        Self {
            coordinator: coordinator.into(),
        }
    }

    pub fn coordinator(&self) -> &CallerId {
        &self.coordinator
    }
}

impl Authorizer for CoordinatorOnly {
    fn authorize(&self, caller: &CallerId) -> bool {
        let allowed = *caller == self.coordinator;
        if !allowed {
            warn!(
                caller = %caller,
                coordinator = %self.coordinator,
                "registry mutation denied"
            );
        }
        allowed
    }
}

/// Admits every caller. For tests and offline tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _caller: &CallerId) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_only_admits_coordinator() {
        let gate = CoordinatorOnly::new("coordinator");
        assert!(gate.authorize(&CallerId::new("coordinator")));
        assert!(!gate.authorize(&CallerId::new("mallory")));
        assert_eq!(gate.coordinator().as_str(), "coordinator");
    }

    #[test]
    fn allow_all_admits_anyone() {
        assert!(AllowAll.authorize(&CallerId::new("anyone")));
    }
}
