//! Growth bounded context (event-sourced).
//!
//! A crop batch is a group of containers (trays or pots) of one material
//! sown on the same day. It starts in one area, can be split across areas by
//! moving containers, and ends archived once everything has been harvested or
//! dumped.

pub mod batch;
pub mod crop;

pub use batch::batch_id;
pub use crop::{
    ArchiveCropBatch, ContainerKind, CreateCropBatch, Crop, CropBatchArchived, CropBatchCreated,
    CropBatchDumped, CropBatchHarvested, CropBatchMoved, CropBatchWatered, CropCommand,
    CropContainer, CropEvent, CropEventKind, CropId, CropStatus, CropType, DumpCropBatch,
    HarvestCropBatch, HarvestType, MoveCropBatch, ProducedQuantity, ProducedUnit,
    WaterCropBatch,
};
