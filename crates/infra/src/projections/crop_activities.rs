use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::AggregateId;
use tania_events::{Event, EventEnvelope, Projection, ProjectionError, Queryable};
use tania_growth::{CropEvent, CropId, HarvestType};

use super::handler::ProjectionHandler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "activity", rename_all = "snake_case")]
pub enum ActivityDetail {
    Seeded {
        area_id: AggregateId,
        quantity: u32,
    },
    Moved {
        src_area_id: AggregateId,
        dst_area_id: AggregateId,
        quantity: u32,
    },
    Harvested {
        area_id: AggregateId,
        harvest_type: HarvestType,
        quantity: u32,
        produced_grams: f64,
    },
    Dumped {
        area_id: AggregateId,
        quantity: u32,
    },
    Watered {
        area_id: AggregateId,
    },
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropActivity {
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
    pub detail: ActivityDetail,
}

/// Chronological history of one crop batch, one entry per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropActivityLog {
    pub crop_id: CropId,
    pub batch_id: String,
    pub activities: Vec<CropActivity>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub batch_id: Option<String>,
}

fn detail(event: &CropEvent) -> ActivityDetail {
    match event {
        CropEvent::CropBatchCreated(e) => ActivityDetail::Seeded {
            area_id: e.area_id,
            quantity: e.container.quantity,
        },
        CropEvent::CropBatchMoved(e) => ActivityDetail::Moved {
            src_area_id: e.src_area_id,
            dst_area_id: e.dst_area_id,
            quantity: e.quantity,
        },
        CropEvent::CropBatchHarvested(e) => ActivityDetail::Harvested {
            area_id: e.area_id,
            harvest_type: e.harvest_type,
            quantity: e.quantity,
            produced_grams: e.produced.in_grams(),
        },
        CropEvent::CropBatchDumped(e) => ActivityDetail::Dumped {
            area_id: e.area_id,
            quantity: e.quantity,
        },
        CropEvent::CropBatchWatered(e) => ActivityDetail::Watered { area_id: e.area_id },
        CropEvent::CropBatchArchived(_) => ActivityDetail::Archived,
    }
}

impl Projection for CropActivityLog {
    type Ev = CropEvent;

    const NAME: &'static str = "crop_activities";

    fn fold(current: Option<Self>, envelope: &EventEnvelope<CropEvent>) -> Result<Self, ProjectionError> {
        let event = envelope.payload();
        let activity = CropActivity {
            sequence: envelope.sequence_number(),
            occurred_at: event.occurred_at(),
            detail: detail(event),
        };

        match (current, event) {
            (None, CropEvent::CropBatchCreated(e)) => Ok(Self {
                crop_id: e.crop_id,
                batch_id: e.batch_id.clone(),
                activities: vec![activity],
            }),
            (None, _) => Err(ProjectionError::missing_row(envelope)),
            (Some(_), CropEvent::CropBatchCreated(_)) => Err(ProjectionError::duplicate_create(envelope)),
            (Some(mut log), _) => {
                log.activities.push(activity);
                Ok(log)
            }
        }
    }
}

impl Queryable for CropActivityLog {
    type Filter = ActivityFilter;

    fn matches(&self, filter: &ActivityFilter) -> bool {
        filter
            .batch_id
            .as_deref()
            .is_none_or(|batch_id| batch_id == self.batch_id)
    }
}

pub type CropActivityProjection = ProjectionHandler<CropActivityLog>;

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use tania_core::AggregateKind;
    use tania_growth::{
        ContainerKind, CropBatchCreated, CropBatchWatered, CropContainer, CropType,
    };

    use super::*;

    fn envelope(crop_id: CropId, seq: u64, event: CropEvent) -> EventEnvelope<CropEvent> {
        EventEnvelope::new(Uuid::now_v7(), crop_id.aggregate_id(), AggregateKind::Crop, seq, event)
    }

    #[tokio::test]
    async fn activities_accumulate_in_sequence_order() {
        let handler = CropActivityProjection::in_memory();
        let crop_id = CropId::generate();
        let area_id = AggregateId::new();
        let sown = Utc.with_ymd_and_hms(2024, 4, 1, 6, 0, 0).unwrap();

        let created = CropEvent::CropBatchCreated(CropBatchCreated {
            crop_id,
            batch_id: "let-apr-01".to_string(),
            farm_id: AggregateId::new(),
            area_id,
            material_id: AggregateId::new(),
            crop_type: CropType::Nursery,
            container: CropContainer {
                kind: ContainerKind::Pot,
                quantity: 12,
            },
            created_date: sown,
        });
        let watered = CropEvent::CropBatchWatered(CropBatchWatered {
            crop_id,
            area_id,
            watering_date: sown + chrono::Duration::days(1),
        });

        handler.apply(&envelope(crop_id, 1, created)).await.unwrap();
        handler.apply(&envelope(crop_id, 2, watered)).await.unwrap();

        let log = handler.get(crop_id.aggregate_id()).await.unwrap();
        let sequences: Vec<u64> = log.activities.iter().map(|a| a.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(log.activities[1].detail, ActivityDetail::Watered { area_id });

        let by_batch = handler
            .query(&ActivityFilter {
                batch_id: Some("let-apr-01".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(by_batch.len(), 1);
    }
}
