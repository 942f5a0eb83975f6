use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::{Aggregate, AggregateId, AggregateKind, AggregateRoot, DomainError, typed_id};
use tania_events::{Command, Event, EventKind};

typed_id!(
    /// Crop batch identifier.
    CropId
);

/// Nursery batches sit in seeding areas; growing batches in growing areas.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropType {
    Nursery,
    Growing,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainerKind {
    Tray { cells: u32 },
    Pot,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropContainer {
    pub kind: ContainerKind,
    pub quantity: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestType {
    /// Every container in the area is cleared.
    All,
    /// Produce is picked; the containers stay.
    Partial,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducedUnit {
    Gram,
    Kilogram,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducedQuantity {
    pub value: f64,
    pub unit: ProducedUnit,
}

impl ProducedQuantity {
    pub fn in_grams(&self) -> f64 {
        match self.unit {
            ProducedUnit::Gram => self.value,
            ProducedUnit::Kilogram => self.value * 1000.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStatus {
    Active,
    Archived,
}

/// Aggregate root: Crop (batch).
#[derive(Debug, Clone, PartialEq)]
pub struct Crop {
    id: CropId,
    batch_id: String,
    farm_id: Option<AggregateId>,
    material_id: Option<AggregateId>,
    crop_type: CropType,
    /// Containers currently held, per area.
    holdings: BTreeMap<AggregateId, u32>,
    status: CropStatus,
    version: u64,
    created: bool,
}

impl Crop {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CropId) -> Self {
        Self {
            id,
            batch_id: String::new(),
            farm_id: None,
            material_id: None,
            crop_type: CropType::Nursery,
            holdings: BTreeMap::new(),
            status: CropStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn farm_id(&self) -> Option<AggregateId> {
        self.farm_id
    }

    pub fn status(&self) -> CropStatus {
        self.status
    }

    /// Containers held in `area_id` (0 when the batch is not there).
    pub fn quantity_in(&self, area_id: AggregateId) -> u32 {
        self.holdings.get(&area_id).copied().unwrap_or(0)
    }

    pub fn total_quantity(&self) -> u32 {
        self.holdings.values().sum()
    }
}

impl AggregateRoot for Crop {
    type Id = CropId;

    const KIND: AggregateKind = AggregateKind::Crop;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateCropBatch.
///
/// `crop_type` and `batch_id` are derived by the caller from the area type
/// and the material name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCropBatch {
    pub crop_id: CropId,
    pub batch_id: String,
    pub farm_id: AggregateId,
    pub area_id: AggregateId,
    pub material_id: AggregateId,
    pub crop_type: CropType,
    pub container: CropContainer,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MoveCropBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCropBatch {
    pub crop_id: CropId,
    pub src_area_id: AggregateId,
    pub dst_area_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: HarvestCropBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestCropBatch {
    pub crop_id: CropId,
    pub area_id: AggregateId,
    pub harvest_type: HarvestType,
    pub produced: ProducedQuantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DumpCropBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpCropBatch {
    pub crop_id: CropId,
    pub area_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WaterCropBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterCropBatch {
    pub crop_id: CropId,
    pub area_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveCropBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveCropBatch {
    pub crop_id: CropId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CropCommand {
    Create(CreateCropBatch),
    Move(MoveCropBatch),
    Harvest(HarvestCropBatch),
    Dump(DumpCropBatch),
    Water(WaterCropBatch),
    Archive(ArchiveCropBatch),
}

impl Command for CropCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        let id = match self {
            CropCommand::Create(c) => c.crop_id,
            CropCommand::Move(c) => c.crop_id,
            CropCommand::Harvest(c) => c.crop_id,
            CropCommand::Dump(c) => c.crop_id,
            CropCommand::Water(c) => c.crop_id,
            CropCommand::Archive(c) => c.crop_id,
        };
        id.aggregate_id()
    }
}

/// Event: CropBatchCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropBatchCreated {
    pub crop_id: CropId,
    pub batch_id: String,
    pub farm_id: AggregateId,
    pub area_id: AggregateId,
    pub material_id: AggregateId,
    pub crop_type: CropType,
    pub container: CropContainer,
    pub created_date: DateTime<Utc>,
}

/// Event: CropBatchMoved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropBatchMoved {
    pub crop_id: CropId,
    pub src_area_id: AggregateId,
    pub dst_area_id: AggregateId,
    pub quantity: u32,
    pub moved_date: DateTime<Utc>,
}

/// Event: CropBatchHarvested. `quantity` is the number of containers cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropBatchHarvested {
    pub crop_id: CropId,
    pub area_id: AggregateId,
    pub harvest_type: HarvestType,
    pub quantity: u32,
    pub produced: ProducedQuantity,
    pub harvest_date: DateTime<Utc>,
}

/// Event: CropBatchDumped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropBatchDumped {
    pub crop_id: CropId,
    pub area_id: AggregateId,
    pub quantity: u32,
    pub dump_date: DateTime<Utc>,
}

/// Event: CropBatchWatered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropBatchWatered {
    pub crop_id: CropId,
    pub area_id: AggregateId,
    pub watering_date: DateTime<Utc>,
}

/// Event: CropBatchArchived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropBatchArchived {
    pub crop_id: CropId,
    pub archived_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CropEvent {
    CropBatchCreated(CropBatchCreated),
    CropBatchMoved(CropBatchMoved),
    CropBatchHarvested(CropBatchHarvested),
    CropBatchDumped(CropBatchDumped),
    CropBatchWatered(CropBatchWatered),
    CropBatchArchived(CropBatchArchived),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CropEventKind {
    Created,
    Moved,
    Harvested,
    Dumped,
    Watered,
    Archived,
}

impl EventKind for CropEventKind {
    fn code(&self) -> &'static str {
        match self {
            CropEventKind::Created => "CropBatchCreated",
            CropEventKind::Moved => "CropBatchMoved",
            CropEventKind::Harvested => "CropBatchHarvested",
            CropEventKind::Dumped => "CropBatchDumped",
            CropEventKind::Watered => "CropBatchWatered",
            CropEventKind::Archived => "CropBatchArchived",
        }
    }

    fn all() -> &'static [Self] {
        &[
            CropEventKind::Created,
            CropEventKind::Moved,
            CropEventKind::Harvested,
            CropEventKind::Dumped,
            CropEventKind::Watered,
            CropEventKind::Archived,
        ]
    }
}

impl Event for CropEvent {
    type Kind = CropEventKind;

    fn kind(&self) -> CropEventKind {
        match self {
            CropEvent::CropBatchCreated(_) => CropEventKind::Created,
            CropEvent::CropBatchMoved(_) => CropEventKind::Moved,
            CropEvent::CropBatchHarvested(_) => CropEventKind::Harvested,
            CropEvent::CropBatchDumped(_) => CropEventKind::Dumped,
            CropEvent::CropBatchWatered(_) => CropEventKind::Watered,
            CropEvent::CropBatchArchived(_) => CropEventKind::Archived,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CropEvent::CropBatchCreated(e) => e.created_date,
            CropEvent::CropBatchMoved(e) => e.moved_date,
            CropEvent::CropBatchHarvested(e) => e.harvest_date,
            CropEvent::CropBatchDumped(e) => e.dump_date,
            CropEvent::CropBatchWatered(e) => e.watering_date,
            CropEvent::CropBatchArchived(e) => e.archived_date,
        }
    }
}

/// Remove `quantity` containers from `area_id`, dropping the entry when it empties.
fn take(holdings: &mut BTreeMap<AggregateId, u32>, area_id: AggregateId, quantity: u32) {
    if let Some(held) = holdings.get_mut(&area_id) {
        *held = held.saturating_sub(quantity);
        if *held == 0 {
            holdings.remove(&area_id);
        }
    }
}

impl Aggregate for Crop {
    type Command = CropCommand;
    type Event = CropEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CropEvent::CropBatchCreated(e) => {
                self.id = e.crop_id;
                self.batch_id = e.batch_id.clone();
                self.farm_id = Some(e.farm_id);
                self.material_id = Some(e.material_id);
                self.crop_type = e.crop_type;
                self.holdings.clear();
                self.holdings.insert(e.area_id, e.container.quantity);
                self.created = true;
            }
            CropEvent::CropBatchMoved(e) => {
                take(&mut self.holdings, e.src_area_id, e.quantity);
                *self.holdings.entry(e.dst_area_id).or_insert(0) += e.quantity;
            }
            CropEvent::CropBatchHarvested(e) => take(&mut self.holdings, e.area_id, e.quantity),
            CropEvent::CropBatchDumped(e) => take(&mut self.holdings, e.area_id, e.quantity),
            CropEvent::CropBatchWatered(_) => {}
            CropEvent::CropBatchArchived(_) => self.status = CropStatus::Archived,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CropCommand::Create(cmd) => self.handle_create(cmd),
            CropCommand::Move(cmd) => self.handle_move(cmd),
            CropCommand::Harvest(cmd) => self.handle_harvest(cmd),
            CropCommand::Dump(cmd) => self.handle_dump(cmd),
            CropCommand::Water(cmd) => {
                self.ensure_active(cmd.crop_id)?;
                self.ensure_holds(cmd.area_id)?;
                Ok(vec![CropEvent::CropBatchWatered(CropBatchWatered {
                    crop_id: cmd.crop_id,
                    area_id: cmd.area_id,
                    watering_date: cmd.occurred_at,
                })])
            }
            CropCommand::Archive(cmd) => {
                self.ensure_active(cmd.crop_id)?;
                Ok(vec![CropEvent::CropBatchArchived(CropBatchArchived {
                    crop_id: cmd.crop_id,
                    archived_date: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Crop {
    fn ensure_active(&self, crop_id: CropId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != crop_id {
            return Err(DomainError::invariant("crop_id mismatch"));
        }
        if self.status == CropStatus::Archived {
            return Err(DomainError::invariant("crop batch is archived"));
        }
        Ok(())
    }

    fn ensure_holds(&self, area_id: AggregateId) -> Result<u32, DomainError> {
        match self.quantity_in(area_id) {
            0 => Err(DomainError::validation(format!(
                "crop batch has no containers in area {area_id}"
            ))),
            held => Ok(held),
        }
    }

    /// Archive in the same command once the last container is gone.
    fn with_archive_if_emptied(
        &self,
        crop_id: CropId,
        removed: u32,
        at: DateTime<Utc>,
        mut events: Vec<CropEvent>,
    ) -> Vec<CropEvent> {
        if removed > 0 && self.total_quantity() == removed {
            events.push(CropEvent::CropBatchArchived(CropBatchArchived {
                crop_id,
                archived_date: at,
            }));
        }
        events
    }

    fn handle_create(&self, cmd: &CreateCropBatch) -> Result<Vec<CropEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("crop batch already exists"));
        }
        if cmd.batch_id.trim().is_empty() {
            return Err(DomainError::validation("batch id cannot be empty"));
        }
        if cmd.container.quantity == 0 {
            return Err(DomainError::validation("container quantity must be greater than zero"));
        }
        if let ContainerKind::Tray { cells: 0 } = cmd.container.kind {
            return Err(DomainError::validation("tray must have at least one cell"));
        }

        Ok(vec![CropEvent::CropBatchCreated(CropBatchCreated {
            crop_id: cmd.crop_id,
            batch_id: cmd.batch_id.clone(),
            farm_id: cmd.farm_id,
            area_id: cmd.area_id,
            material_id: cmd.material_id,
            crop_type: cmd.crop_type,
            container: cmd.container,
            created_date: cmd.occurred_at,
        })])
    }

    fn handle_move(&self, cmd: &MoveCropBatch) -> Result<Vec<CropEvent>, DomainError> {
        self.ensure_active(cmd.crop_id)?;
        if cmd.src_area_id == cmd.dst_area_id {
            return Err(DomainError::validation("source and destination area are the same"));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("move quantity must be greater than zero"));
        }
        let held = self.ensure_holds(cmd.src_area_id)?;
        if cmd.quantity > held {
            return Err(DomainError::validation(format!(
                "cannot move {} containers, only {held} in the source area",
                cmd.quantity
            )));
        }

        Ok(vec![CropEvent::CropBatchMoved(CropBatchMoved {
            crop_id: cmd.crop_id,
            src_area_id: cmd.src_area_id,
            dst_area_id: cmd.dst_area_id,
            quantity: cmd.quantity,
            moved_date: cmd.occurred_at,
        })])
    }

    fn handle_harvest(&self, cmd: &HarvestCropBatch) -> Result<Vec<CropEvent>, DomainError> {
        self.ensure_active(cmd.crop_id)?;
        let held = self.ensure_holds(cmd.area_id)?;
        if !cmd.produced.value.is_finite() || cmd.produced.value <= 0.0 {
            return Err(DomainError::validation("produced quantity must be greater than zero"));
        }
        let cleared = match cmd.harvest_type {
            HarvestType::All => held,
            HarvestType::Partial => 0,
        };

        let harvested = CropEvent::CropBatchHarvested(CropBatchHarvested {
            crop_id: cmd.crop_id,
            area_id: cmd.area_id,
            harvest_type: cmd.harvest_type,
            quantity: cleared,
            produced: cmd.produced,
            harvest_date: cmd.occurred_at,
        });
        Ok(self.with_archive_if_emptied(cmd.crop_id, cleared, cmd.occurred_at, vec![harvested]))
    }

    fn handle_dump(&self, cmd: &DumpCropBatch) -> Result<Vec<CropEvent>, DomainError> {
        self.ensure_active(cmd.crop_id)?;
        let held = self.ensure_holds(cmd.area_id)?;
        if cmd.quantity == 0 || cmd.quantity > held {
            return Err(DomainError::validation(format!(
                "dump quantity must be between 1 and {held}"
            )));
        }

        let dumped = CropEvent::CropBatchDumped(CropBatchDumped {
            crop_id: cmd.crop_id,
            area_id: cmd.area_id,
            quantity: cmd.quantity,
            dump_date: cmd.occurred_at,
        });
        Ok(self.with_archive_if_emptied(cmd.crop_id, cmd.quantity, cmd.occurred_at, vec![dumped]))
    }
}
