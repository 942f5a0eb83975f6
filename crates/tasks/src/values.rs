use serde::{Deserialize, Serialize};

use tania_core::{AggregateId, AggregateKind};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Urgent,
    Normal,
}

/// Lifecycle status. `is_due` is tracked separately and only meaningful while active.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Area,
    Cleaning,
    Crop,
    Finance,
    General,
    Harvesting,
    Inventory,
    Nutrient,
    PestControl,
    Reservoir,
    Safety,
    Sanitation,
}

/// Which part of the farm a task belongs to, with the details that domain carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum TaskDomain {
    Area {
        material_id: Option<AggregateId>,
    },
    Crop {
        material_id: Option<AggregateId>,
        area_id: Option<AggregateId>,
    },
    Finance,
    General,
    Inventory,
    Reservoir {
        material_id: Option<AggregateId>,
    },
}

/// Detail-free discriminant of [`TaskDomain`], used for filtering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDomainCode {
    Area,
    Crop,
    Finance,
    General,
    Inventory,
    Reservoir,
}

impl TaskDomain {
    pub fn code(&self) -> TaskDomainCode {
        match self {
            TaskDomain::Area { .. } => TaskDomainCode::Area,
            TaskDomain::Crop { .. } => TaskDomainCode::Crop,
            TaskDomain::Finance => TaskDomainCode::Finance,
            TaskDomain::General => TaskDomainCode::General,
            TaskDomain::Inventory => TaskDomainCode::Inventory,
            TaskDomain::Reservoir { .. } => TaskDomainCode::Reservoir,
        }
    }

    /// Kind of asset a task in this domain must be attached to, if any.
    pub fn asset_kind(&self) -> Option<AggregateKind> {
        match self {
            TaskDomain::Area { .. } => Some(AggregateKind::Area),
            TaskDomain::Crop { .. } => Some(AggregateKind::Crop),
            TaskDomain::Reservoir { .. } => Some(AggregateKind::Reservoir),
            TaskDomain::Finance | TaskDomain::General | TaskDomain::Inventory => None,
        }
    }

    pub fn material_id(&self) -> Option<AggregateId> {
        match self {
            TaskDomain::Area { material_id }
            | TaskDomain::Crop { material_id, .. }
            | TaskDomain::Reservoir { material_id } => *material_id,
            TaskDomain::Finance | TaskDomain::General | TaskDomain::Inventory => None,
        }
    }

    pub fn area_id(&self) -> Option<AggregateId> {
        match self {
            TaskDomain::Crop { area_id, .. } => *area_id,
            _ => None,
        }
    }
}
