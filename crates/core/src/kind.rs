//! Closed catalog of aggregate kinds.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Every kind of aggregate the farm core persists.
///
/// The storage code (`as_str`) is what the ledger writes into its
/// `aggregate_type` column; it must never change for an existing kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Farm,
    Reservoir,
    Area,
    Material,
    Crop,
    Task,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 6] = [
        AggregateKind::Farm,
        AggregateKind::Reservoir,
        AggregateKind::Area,
        AggregateKind::Material,
        AggregateKind::Crop,
        AggregateKind::Task,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AggregateKind::Farm => "farm",
            AggregateKind::Reservoir => "reservoir",
            AggregateKind::Area => "area",
            AggregateKind::Material => "material",
            AggregateKind::Crop => "crop",
            AggregateKind::Task => "task",
        }
    }
}

impl core::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown aggregate kind: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_codes_parse_back() {
        for kind in AggregateKind::ALL {
            assert_eq!(kind.as_str().parse::<AggregateKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = "greenhouse".parse::<AggregateKind>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
