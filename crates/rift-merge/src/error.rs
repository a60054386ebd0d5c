use std::fmt;

use rift_types::{BindingId, OwnerId};

/// Why a delegation edge was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The delegator and root are the same owner.
    SelfDelegation,
    /// The requested root already delegates to someone else.
    RootIsDependent,
    /// The delegator already delegates to a different root.
    AlreadyDelegating { existing: OwnerId },
    /// Other owners delegate to the delegator.
    DelegatorIsRoot,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfDelegation => write!(f, "an owner cannot delegate to themselves"),
            Self::RootIsDependent => write!(f, "the root is itself dependent"),
            Self::AlreadyDelegating { existing } => {
                write!(f, "already delegating to {existing}")
            }
            Self::DelegatorIsRoot => write!(f, "the delegator is a root for other owners"),
        }
    }
}

/// Errors from delegation graph operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("delegation {delegator} -> {root} rejected: {reason}")]
    DelegationCycleRejected {
        delegator: OwnerId,
        root: OwnerId,
        reason: RejectReason,
    },

    #[error("binding {0} is already bound to a different edge")]
    BindingConflict(BindingId),

    #[error("unknown binding: {0}")]
    UnknownBinding(BindingId),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
