//! Placement lifecycle.

use crewboard_id::{AllocationId, TempAllocationId};
use serde::Serialize;
use thiserror::Error;

/// Where a client-initiated placement stands.
///
/// ```text
/// Pending { temp_id } ──confirm──▶ Confirmed { id }
///         │
///         └──roll_back──▶ RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlacementState {
    Pending { temp_id: TempAllocationId },
    Confirmed { id: AllocationId },
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a placement in state {from:?}")]
pub struct InvalidTransition {
    pub from: PlacementState,
    pub action: &'static str,
}

impl PlacementState {
    pub fn pending() -> Self {
        Self::Pending {
            temp_id: TempAllocationId::new(),
        }
    }

    pub fn confirm(self, id: AllocationId) -> Result<Self, InvalidTransition> {
        match self {
            Self::Pending { .. } => Ok(Self::Confirmed { id }),
            from => Err(InvalidTransition {
                from,
                action: "confirm",
            }),
        }
    }

    pub fn roll_back(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Pending { .. } => Ok(Self::RolledBack),
            from => Err(InvalidTransition {
                from,
                action: "roll back",
            }),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Key under which the placement is addressed in the local view.
    pub fn key(&self) -> Option<LocalKey> {
        match *self {
            Self::Pending { temp_id } => Some(LocalKey::Temp(temp_id)),
            Self::Confirmed { id } => Some(LocalKey::Server(id)),
            Self::RolledBack => None,
        }
    }
}

/// Identifier of an entry in the local view: a temporary id while the
/// server has not answered, the server id afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum LocalKey {
    Temp(TempAllocationId),
    Server(AllocationId),
}

impl std::fmt::Display for LocalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temp(id) => write!(f, "{id}"),
            Self::Server(id) => write!(f, "{id}"),
        }
    }
}

impl From<AllocationId> for LocalKey {
    fn from(id: AllocationId) -> Self {
        Self::Server(id)
    }
}

impl From<TempAllocationId> for LocalKey {
    fn from(id: TempAllocationId) -> Self {
        Self::Temp(id)
    }
}
