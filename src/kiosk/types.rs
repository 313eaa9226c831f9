use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::types::{Host, HostId};

/// Operator tab identifier, carried in the private tab cookie.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct TabId(pub Ulid);

impl TabId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

/// Entry of the host dropdown.
#[derive(Debug, Clone, Serialize)]
pub struct HostOption {
    pub id: HostId,
    pub label: String,
}

impl From<&Host> for HostOption {
    fn from(host: &Host) -> Self {
        Self {
            id: host.id,
            label: host.label(),
        }
    }
}
