//! Staff repository.

use common::{KitchenError, StationType};

use crate::keys;
use crate::kv::KvBatch;
use crate::models::{Staff, StaffQuery};
use crate::repositories::{from_json, to_json};
use crate::KvHandle;

/// Repository for staff persistence.
#[derive(Clone)]
pub struct StaffRepository {
    kv: KvHandle,
}

impl StaffRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    fn availability_batch(staff: &Staff, batch: KvBatch) -> KvBatch {
        if staff.is_available {
            batch.set_add(keys::STAFF_AVAILABLE, &staff.id)
        } else {
            batch.set_remove(keys::STAFF_AVAILABLE, &staff.id)
        }
    }

    pub async fn create(&self, staff: &Staff) -> Result<(), KitchenError> {
        let key = keys::staff(&staff.id);
        if self.kv.exists(&key).await? {
            return Err(KitchenError::Conflict(format!(
                "staff {} already exists",
                staff.id
            )));
        }

        let mut batch = KvBatch::new()
            .put(&key, to_json(staff)?)
            .set_add(keys::STAFF_ALL, &staff.id);
        for station in &staff.specializations {
            batch = batch.set_add(keys::staff_by_specialization(*station), &staff.id);
        }
        batch = Self::availability_batch(staff, batch);

        self.kv.apply(batch).await?;
        tracing::debug!(staff_id = %staff.id, "staff created");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Staff, KitchenError> {
        match self.kv.get(&keys::staff(id)).await? {
            Some(raw) => Ok(from_json(&raw)?),
            None => Err(KitchenError::NotFound(format!("staff {id} not found"))),
        }
    }

    pub async fn update(&self, staff: &Staff) -> Result<(), KitchenError> {
        let previous = self.get(&staff.id).await?;

        let mut batch = KvBatch::new().put(keys::staff(&staff.id), to_json(staff)?);
        for station in previous.specializations.difference(&staff.specializations) {
            batch = batch.set_remove(keys::staff_by_specialization(*station), &staff.id);
        }
        for station in staff.specializations.difference(&previous.specializations) {
            batch = batch.set_add(keys::staff_by_specialization(*station), &staff.id);
        }
        batch = Self::availability_batch(staff, batch);

        self.kv.apply(batch).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), KitchenError> {
        let staff = self.get(id).await?;

        let mut batch = KvBatch::new()
            .delete(keys::staff(id))
            .set_remove(keys::STAFF_ALL, id)
            .set_remove(keys::STAFF_AVAILABLE, id);
        for station in &staff.specializations {
            batch = batch.set_remove(keys::staff_by_specialization(*station), id);
        }

        self.kv.apply(batch).await?;
        Ok(())
    }

    async fn get_many(&self, ids: Vec<String>) -> Result<Vec<Staff>, KitchenError> {
        let mut all = Vec::with_capacity(ids.len());
        for id in ids {
            match self.kv.get(&keys::staff(&id)).await? {
                Some(raw) => all.push(from_json(&raw)?),
                None => tracing::warn!(staff_id = %id, "index points at missing staff"),
            }
        }
        Ok(all)
    }

    pub async fn list_all(&self) -> Result<Vec<Staff>, KitchenError> {
        let ids = self.kv.set_members(keys::STAFF_ALL).await?;
        self.get_many(ids).await
    }

    pub async fn list_by_specialization(
        &self,
        station: StationType,
    ) -> Result<Vec<Staff>, KitchenError> {
        let ids = self
            .kv
            .set_members(&keys::staff_by_specialization(station))
            .await?;
        self.get_many(ids).await
    }

    pub async fn list_available(&self) -> Result<Vec<Staff>, KitchenError> {
        let ids = self.kv.set_members(keys::STAFF_AVAILABLE).await?;
        self.get_many(ids).await
    }

    /// List with query filters applied.
    pub async fn list(&self, query: &StaffQuery) -> Result<Vec<Staff>, KitchenError> {
        let base = match query.specialization {
            Some(station) => self.list_by_specialization(station).await?,
            None => self.list_all().await?,
        };

        Ok(base
            .into_iter()
            .filter(|staff| {
                (!query.available_only.unwrap_or(false) || staff.is_available)
                    && query.min_skill.is_none_or(|min| staff.skill_level >= min)
            })
            .collect())
    }
}
