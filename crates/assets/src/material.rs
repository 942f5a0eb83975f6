use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tania_core::{Aggregate, AggregateId, AggregateKind, AggregateRoot, DomainError, typed_id};
use tania_events::{Command, Event, EventKind};

use crate::rules;

typed_id!(
    /// Inventory material identifier.
    MaterialId
);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantType {
    Vegetable,
    Fruit,
    Herb,
    Flower,
    Tree,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChemicalType {
    Disinfectant,
    Fertilizer,
    Hormone,
    Manure,
    Pesticide,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Tray,
    Pot,
}

/// What a material is. Fixed at creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaterialType {
    Seed { plant_type: PlantType },
    Plant { plant_type: PlantType },
    Agrochemical { chemical_type: ChemicalType },
    GrowingMedium,
    SeedingContainer { container_type: ContainerType },
    Other,
}

/// Detail-free discriminant of [`MaterialType`], used for filtering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialTypeCode {
    Seed,
    Plant,
    Agrochemical,
    GrowingMedium,
    SeedingContainer,
    Other,
}

impl MaterialType {
    pub fn code(&self) -> MaterialTypeCode {
        match self {
            MaterialType::Seed { .. } => MaterialTypeCode::Seed,
            MaterialType::Plant { .. } => MaterialTypeCode::Plant,
            MaterialType::Agrochemical { .. } => MaterialTypeCode::Agrochemical,
            MaterialType::GrowingMedium => MaterialTypeCode::GrowingMedium,
            MaterialType::SeedingContainer { .. } => MaterialTypeCode::SeedingContainer,
            MaterialType::Other => MaterialTypeCode::Other,
        }
    }

    /// Only seeds and plants can start a crop batch.
    pub fn can_start_crop(&self) -> bool {
        matches!(self, MaterialType::Seed { .. } | MaterialType::Plant { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePerUnit {
    pub amount: f64,
    /// ISO 4217 code, e.g. `"EUR"`.
    pub currency: String,
}

impl PricePerUnit {
    fn validate(&self) -> Result<(), DomainError> {
        rules::non_negative("price", self.amount)?;
        let valid_currency =
            self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !valid_currency {
            return Err(DomainError::validation(
                "currency must be a three-letter upper-case code",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityUnit {
    Seeds,
    Packets,
    Gram,
    Kilogram,
    Litre,
    Bags,
    Bottles,
    Units,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialQuantity {
    pub value: f64,
    pub unit: QuantityUnit,
}

/// Aggregate root: Material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    id: MaterialId,
    name: String,
    material_type: MaterialType,
    price: PricePerUnit,
    quantity: MaterialQuantity,
    expiration_date: Option<NaiveDate>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Material {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: MaterialId) -> Self {
        Self {
            id,
            name: String::new(),
            material_type: MaterialType::Other,
            price: PricePerUnit {
                amount: 0.0,
                currency: String::new(),
            },
            quantity: MaterialQuantity {
                value: 0.0,
                unit: QuantityUnit::Units,
            },
            expiration_date: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material_type(&self) -> MaterialType {
        self.material_type
    }

    pub fn quantity(&self) -> MaterialQuantity {
        self.quantity
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Material {
    type Id = MaterialId;

    const KIND: AggregateKind = AggregateKind::Material;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateMaterial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMaterial {
    pub material_id: MaterialId,
    pub name: String,
    pub material_type: MaterialType,
    pub price_per_unit: PricePerUnit,
    pub quantity: MaterialQuantity,
    pub expiration_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub produced_by: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameMaterial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameMaterial {
    pub material_id: MaterialId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeMaterialPrice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMaterialPrice {
    pub material_id: MaterialId,
    pub price_per_unit: PricePerUnit,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeMaterialQuantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMaterialQuantity {
    pub material_id: MaterialId,
    pub quantity: MaterialQuantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeMaterialExpiration. `None` clears the date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMaterialExpiration {
    pub material_id: MaterialId,
    pub expiration_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteMaterial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMaterial {
    pub material_id: MaterialId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialCommand {
    Create(CreateMaterial),
    Rename(RenameMaterial),
    ChangePrice(ChangeMaterialPrice),
    ChangeQuantity(ChangeMaterialQuantity),
    ChangeExpiration(ChangeMaterialExpiration),
    Delete(DeleteMaterial),
}

impl Command for MaterialCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        let id = match self {
            MaterialCommand::Create(c) => c.material_id,
            MaterialCommand::Rename(c) => c.material_id,
            MaterialCommand::ChangePrice(c) => c.material_id,
            MaterialCommand::ChangeQuantity(c) => c.material_id,
            MaterialCommand::ChangeExpiration(c) => c.material_id,
            MaterialCommand::Delete(c) => c.material_id,
        };
        id.aggregate_id()
    }
}

/// Event: MaterialCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialCreated {
    pub material_id: MaterialId,
    pub name: String,
    pub material_type: MaterialType,
    pub price_per_unit: PricePerUnit,
    pub quantity: MaterialQuantity,
    pub expiration_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub produced_by: Option<String>,
    pub created_date: DateTime<Utc>,
}

/// Event: MaterialNameChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialNameChanged {
    pub material_id: MaterialId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialPriceChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPriceChanged {
    pub material_id: MaterialId,
    pub price_per_unit: PricePerUnit,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialQuantityChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialQuantityChanged {
    pub material_id: MaterialId,
    pub quantity: MaterialQuantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialExpirationDateChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialExpirationDateChanged {
    pub material_id: MaterialId,
    pub expiration_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialDeleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDeleted {
    pub material_id: MaterialId,
    pub deleted_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialEvent {
    MaterialCreated(MaterialCreated),
    MaterialNameChanged(MaterialNameChanged),
    MaterialPriceChanged(MaterialPriceChanged),
    MaterialQuantityChanged(MaterialQuantityChanged),
    MaterialExpirationDateChanged(MaterialExpirationDateChanged),
    MaterialDeleted(MaterialDeleted),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MaterialEventKind {
    Created,
    NameChanged,
    PriceChanged,
    QuantityChanged,
    ExpirationDateChanged,
    Deleted,
}

impl EventKind for MaterialEventKind {
    fn code(&self) -> &'static str {
        match self {
            MaterialEventKind::Created => "MaterialCreated",
            MaterialEventKind::NameChanged => "MaterialNameChanged",
            MaterialEventKind::PriceChanged => "MaterialPriceChanged",
            MaterialEventKind::QuantityChanged => "MaterialQuantityChanged",
            MaterialEventKind::ExpirationDateChanged => "MaterialExpirationDateChanged",
            MaterialEventKind::Deleted => "MaterialDeleted",
        }
    }

    fn all() -> &'static [Self] {
        &[
            MaterialEventKind::Created,
            MaterialEventKind::NameChanged,
            MaterialEventKind::PriceChanged,
            MaterialEventKind::QuantityChanged,
            MaterialEventKind::ExpirationDateChanged,
            MaterialEventKind::Deleted,
        ]
    }
}

impl Event for MaterialEvent {
    type Kind = MaterialEventKind;

    fn kind(&self) -> MaterialEventKind {
        match self {
            MaterialEvent::MaterialCreated(_) => MaterialEventKind::Created,
            MaterialEvent::MaterialNameChanged(_) => MaterialEventKind::NameChanged,
            MaterialEvent::MaterialPriceChanged(_) => MaterialEventKind::PriceChanged,
            MaterialEvent::MaterialQuantityChanged(_) => MaterialEventKind::QuantityChanged,
            MaterialEvent::MaterialExpirationDateChanged(_) => {
                MaterialEventKind::ExpirationDateChanged
            }
            MaterialEvent::MaterialDeleted(_) => MaterialEventKind::Deleted,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MaterialEvent::MaterialCreated(e) => e.created_date,
            MaterialEvent::MaterialNameChanged(e) => e.occurred_at,
            MaterialEvent::MaterialPriceChanged(e) => e.occurred_at,
            MaterialEvent::MaterialQuantityChanged(e) => e.occurred_at,
            MaterialEvent::MaterialExpirationDateChanged(e) => e.occurred_at,
            MaterialEvent::MaterialDeleted(e) => e.deleted_date,
        }
    }
}

impl Aggregate for Material {
    type Command = MaterialCommand;
    type Event = MaterialEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MaterialEvent::MaterialCreated(e) => {
                self.id = e.material_id;
                self.name = e.name.clone();
                self.material_type = e.material_type;
                self.price = e.price_per_unit.clone();
                self.quantity = e.quantity;
                self.expiration_date = e.expiration_date;
                self.created = true;
            }
            MaterialEvent::MaterialNameChanged(e) => self.name = e.name.clone(),
            MaterialEvent::MaterialPriceChanged(e) => self.price = e.price_per_unit.clone(),
            MaterialEvent::MaterialQuantityChanged(e) => self.quantity = e.quantity,
            MaterialEvent::MaterialExpirationDateChanged(e) => {
                self.expiration_date = e.expiration_date
            }
            MaterialEvent::MaterialDeleted(_) => self.deleted = true,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MaterialCommand::Create(cmd) => self.handle_create(cmd),
            MaterialCommand::Rename(cmd) => {
                self.ensure_live(cmd.material_id)?;
                Ok(vec![MaterialEvent::MaterialNameChanged(MaterialNameChanged {
                    material_id: cmd.material_id,
                    name: rules::name("material", &cmd.name)?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            MaterialCommand::ChangePrice(cmd) => {
                self.ensure_live(cmd.material_id)?;
                cmd.price_per_unit.validate()?;
                Ok(vec![MaterialEvent::MaterialPriceChanged(MaterialPriceChanged {
                    material_id: cmd.material_id,
                    price_per_unit: cmd.price_per_unit.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            MaterialCommand::ChangeQuantity(cmd) => {
                self.ensure_live(cmd.material_id)?;
                rules::non_negative("quantity", cmd.quantity.value)?;
                Ok(vec![MaterialEvent::MaterialQuantityChanged(
                    MaterialQuantityChanged {
                        material_id: cmd.material_id,
                        quantity: cmd.quantity,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
            MaterialCommand::ChangeExpiration(cmd) => {
                self.ensure_live(cmd.material_id)?;
                Ok(vec![MaterialEvent::MaterialExpirationDateChanged(
                    MaterialExpirationDateChanged {
                        material_id: cmd.material_id,
                        expiration_date: cmd.expiration_date,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
            MaterialCommand::Delete(cmd) => {
                self.ensure_live(cmd.material_id)?;
                Ok(vec![MaterialEvent::MaterialDeleted(MaterialDeleted {
                    material_id: cmd.material_id,
                    deleted_date: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Material {
    fn ensure_live(&self, material_id: MaterialId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != material_id {
            return Err(DomainError::invariant("material_id mismatch"));
        }
        if self.deleted {
            return Err(DomainError::invariant("material has been deleted"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateMaterial) -> Result<Vec<MaterialEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("material already exists"));
        }
        let name = rules::name("material", &cmd.name)?;
        cmd.price_per_unit.validate()?;
        rules::non_negative("quantity", cmd.quantity.value)?;

        Ok(vec![MaterialEvent::MaterialCreated(MaterialCreated {
            material_id: cmd.material_id,
            name,
            material_type: cmd.material_type,
            price_per_unit: cmd.price_per_unit.clone(),
            quantity: cmd.quantity,
            expiration_date: cmd.expiration_date,
            notes: cmd.notes.clone().filter(|n| !n.trim().is_empty()),
            produced_by: cmd.produced_by.clone().filter(|p| !p.trim().is_empty()),
            created_date: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tania_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap()
    }

    fn create(material_id: MaterialId) -> MaterialCommand {
        MaterialCommand::Create(CreateMaterial {
            material_id,
            name: "Romaine lettuce".into(),
            material_type: MaterialType::Seed {
                plant_type: PlantType::Vegetable,
            },
            price_per_unit: PricePerUnit {
                amount: 2.5,
                currency: "EUR".into(),
            },
            quantity: MaterialQuantity {
                value: 500.0,
                unit: QuantityUnit::Seeds,
            },
            expiration_date: NaiveDate::from_ymd_opt(2025, 6, 30),
            notes: Some(" ".into()),
            produced_by: Some("Seed Co".into()),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn blank_notes_are_dropped() {
        let id = MaterialId::generate();
        let events = Material::empty(id).handle(&create(id)).unwrap();
        match &events[0] {
            MaterialEvent::MaterialCreated(e) => {
                assert_eq!(e.notes, None);
                assert_eq!(e.produced_by.as_deref(), Some("Seed Co"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn lower_case_currency_is_rejected() {
        let id = MaterialId::generate();
        let mut material = Material::empty(id);
        execute(&mut material, &create(id)).unwrap();
        let err = material
            .handle(&MaterialCommand::ChangePrice(ChangeMaterialPrice {
                material_id: id,
                price_per_unit: PricePerUnit {
                    amount: 3.0,
                    currency: "eur".into(),
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deleted_material_is_terminal() {
        let id = MaterialId::generate();
        let mut material = Material::empty(id);
        execute(&mut material, &create(id)).unwrap();
        execute(
            &mut material,
            &MaterialCommand::Delete(DeleteMaterial {
                material_id: id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert!(material.is_deleted());

        let err = material
            .handle(&MaterialCommand::ChangeQuantity(ChangeMaterialQuantity {
                material_id: id,
                quantity: MaterialQuantity {
                    value: 10.0,
                    unit: QuantityUnit::Seeds,
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn only_seeds_and_plants_start_crops() {
        assert!(
            MaterialType::Plant {
                plant_type: PlantType::Herb
            }
            .can_start_crop()
        );
        assert!(!MaterialType::GrowingMedium.can_start_crop());
        assert_eq!(
            MaterialType::Agrochemical {
                chemical_type: ChemicalType::Fertilizer
            }
            .code(),
            MaterialTypeCode::Agrochemical
        );
    }
}
