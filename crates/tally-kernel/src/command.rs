//! Commands accepted by the kernel.
//!
//! Every command carries the timestamp it is applied at. The kernel never
//! reads a clock; the runtime stamps commands before submitting them.

use serde::{Deserialize, Serialize};
use tally_types::{MemberId, QuorumId, Timestamp};

/// A mutation of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Start tracking a quorum. Its count history begins at `(at, 0)`.
    InitQuorum { quorum: QuorumId, at: Timestamp },

    /// Give `member` the next free index in each listed quorum, in order.
    RegisterOperator {
        member: MemberId,
        quorums: Vec<QuorumId>,
        at: Timestamp,
    },

    /// Release `member`'s index in each listed quorum, in order, moving the
    /// last member of the quorum into the freed slot.
    DeregisterOperator {
        member: MemberId,
        quorums: Vec<QuorumId>,
        at: Timestamp,
    },
}

impl Command {
    pub fn init_quorum(quorum: QuorumId, at: Timestamp) -> Self {
        Command::InitQuorum { quorum, at }
    }

    pub fn register_operator(
        member: impl Into<MemberId>,
        quorums: Vec<QuorumId>,
        at: Timestamp,
    ) -> Self {
        Command::RegisterOperator {
            member: member.into(),
            quorums,
            at,
        }
    }

    pub fn deregister_operator(
        member: impl Into<MemberId>,
        quorums: Vec<QuorumId>,
        at: Timestamp,
    ) -> Self {
        Command::DeregisterOperator {
            member: member.into(),
            quorums,
            at,
        }
    }

    /// Returns the timestamp the command is applied at.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Command::InitQuorum { at, .. }
            | Command::RegisterOperator { at, .. }
            | Command::DeregisterOperator { at, .. } => *at,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::InitQuorum { .. } => "init_quorum",
            Command::RegisterOperator { .. } => "register_operator",
            Command::DeregisterOperator { .. } => "deregister_operator",
        }
    }
}
