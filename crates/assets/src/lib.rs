//! Assets bounded context (event-sourced).
//!
//! Farms, their water reservoirs, the cultivation areas inside them and the
//! material inventory (seeds, plants, agrochemicals, containers). Every
//! aggregate here is pure deterministic domain logic; references between
//! aggregates (an area's farm, an area's reservoir) are checked by the
//! command handlers in `tania-infra` against the read side.

pub mod area;
pub mod farm;
pub mod material;
pub mod reservoir;

mod rules;

pub use area::{
    Area, AreaCommand, AreaCreated, AreaEvent, AreaEventKind, AreaId, AreaLocation,
    AreaLocationChanged, AreaNameChanged, AreaReservoirChanged, AreaSize, AreaSizeChanged,
    AreaType, AreaTypeChanged, AreaUnit, AssignAreaReservoir, ChangeAreaLocation,
    ChangeAreaType, CreateArea, RenameArea, ResizeArea,
};
pub use farm::{
    ChangeFarmGeolocation, ChangeFarmRegion, ChangeFarmType, CreateFarm, Farm, FarmCommand,
    FarmCreated, FarmEvent, FarmEventKind, FarmGeolocationChanged, FarmId, FarmNameChanged,
    FarmRegionChanged, FarmType, FarmTypeChanged, Geolocation, Region, RenameFarm,
};
pub use material::{
    ChangeMaterialExpiration, ChangeMaterialPrice, ChangeMaterialQuantity, ChemicalType,
    ContainerType, CreateMaterial, DeleteMaterial, Material, MaterialCommand, MaterialCreated,
    MaterialDeleted, MaterialEvent, MaterialEventKind, MaterialExpirationDateChanged,
    MaterialId, MaterialNameChanged, MaterialPriceChanged, MaterialQuantity,
    MaterialQuantityChanged, MaterialType, MaterialTypeCode, PlantType, PricePerUnit,
    QuantityUnit, RenameMaterial,
};
pub use reservoir::{
    ChangeWaterSource, CreateReservoir, RenameReservoir, Reservoir, ReservoirCommand,
    ReservoirCreated, ReservoirEvent, ReservoirEventKind, ReservoirId, ReservoirNameChanged,
    ReservoirWaterSourceChanged, WaterSource,
};
