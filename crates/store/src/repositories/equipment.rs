//! Equipment repository.

use common::{EquipmentStatus, KitchenError, StationType};

use crate::keys;
use crate::kv::KvBatch;
use crate::models::{Equipment, EquipmentQuery};
use crate::repositories::{from_json, to_json};
use crate::KvHandle;

/// Repository for equipment persistence.
#[derive(Clone)]
pub struct EquipmentRepository {
    kv: KvHandle,
}

impl EquipmentRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    pub async fn create(&self, equipment: &Equipment) -> Result<(), KitchenError> {
        let key = keys::equipment(&equipment.id);
        if self.kv.exists(&key).await? {
            return Err(KitchenError::Conflict(format!(
                "equipment {} already exists",
                equipment.id
            )));
        }

        let batch = KvBatch::new()
            .put(&key, to_json(equipment)?)
            .set_add(keys::EQUIPMENT_ALL, &equipment.id)
            .set_add(keys::equipment_by_type(equipment.station_type), &equipment.id)
            .set_add(keys::equipment_by_status(equipment.status), &equipment.id);
        self.kv.apply(batch).await?;
        tracing::debug!(equipment_id = %equipment.id, "equipment created");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Equipment, KitchenError> {
        match self.kv.get(&keys::equipment(id)).await? {
            Some(raw) => Ok(from_json(&raw)?),
            None => Err(KitchenError::NotFound(format!("equipment {id} not found"))),
        }
    }

    pub async fn update(&self, equipment: &Equipment) -> Result<(), KitchenError> {
        let previous = self.get(&equipment.id).await?;

        let mut batch = KvBatch::new().put(keys::equipment(&equipment.id), to_json(equipment)?);
        if previous.status != equipment.status {
            batch = batch
                .set_remove(keys::equipment_by_status(previous.status), &equipment.id)
                .set_add(keys::equipment_by_status(equipment.status), &equipment.id);
        }

        self.kv.apply(batch).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), KitchenError> {
        let equipment = self.get(id).await?;

        let batch = KvBatch::new()
            .delete(keys::equipment(id))
            .set_remove(keys::EQUIPMENT_ALL, id)
            .set_remove(keys::equipment_by_type(equipment.station_type), id)
            .set_remove(keys::equipment_by_status(equipment.status), id);
        self.kv.apply(batch).await?;
        Ok(())
    }

    async fn get_many(&self, ids: Vec<String>) -> Result<Vec<Equipment>, KitchenError> {
        let mut all = Vec::with_capacity(ids.len());
        for id in ids {
            match self.kv.get(&keys::equipment(&id)).await? {
                Some(raw) => all.push(from_json(&raw)?),
                None => tracing::warn!(equipment_id = %id, "index points at missing equipment"),
            }
        }
        Ok(all)
    }

    pub async fn list_all(&self) -> Result<Vec<Equipment>, KitchenError> {
        let ids = self.kv.set_members(keys::EQUIPMENT_ALL).await?;
        self.get_many(ids).await
    }

    pub async fn list_by_type(&self, station: StationType) -> Result<Vec<Equipment>, KitchenError> {
        let ids = self.kv.set_members(&keys::equipment_by_type(station)).await?;
        self.get_many(ids).await
    }

    pub async fn list_by_status(
        &self,
        status: EquipmentStatus,
    ) -> Result<Vec<Equipment>, KitchenError> {
        let ids = self
            .kv
            .set_members(&keys::equipment_by_status(status))
            .await?;
        self.get_many(ids).await
    }

    /// List with query filters applied, paged by limit/offset.
    pub async fn list(&self, query: &EquipmentQuery) -> Result<Vec<Equipment>, KitchenError> {
        let base = match (query.station_type, query.status) {
            (Some(station), _) => self.list_by_type(station).await?,
            (None, Some(status)) => self.list_by_status(status).await?,
            (None, None) => self.list_all().await?,
        };

        let filtered = base.into_iter().filter(|equipment| {
            query.status.is_none_or(|status| equipment.status == status)
                && (!query.available_only.unwrap_or(false)
                    || equipment.status == EquipmentStatus::Available)
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(50);
        Ok(filtered.skip(offset).take(limit).collect())
    }
}
