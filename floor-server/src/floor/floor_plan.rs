//! Floor plan entity (snapshot)

use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use async_trait::async_trait;
use shared::EntityKey;
use shared::floor::{FloorPlanCreate, FloorPlanSnapshot, FloorPlanUpdate, FloorSection};
use shared::key::EntityKind;

pub struct FloorPlan {
    cell: SnapshotCell<FloorPlanSnapshot>,
}

#[async_trait]
impl Entity for FloorPlan {
    const KIND: EntityKind = EntityKind::FloorPlan;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }
}

impl FloorPlan {
    fn create(&mut self, input: FloorPlanCreate, ctx: &EntityContext) -> EntityResult<FloorPlanSnapshot> {
        if let Some(existing) = self.cell.peek() {
            return Ok(existing.clone());
        }
        let name = input.name.trim();
        if name.is_empty() {
            return Err(EntityError::validation("floor plan name is required"));
        }
        let now = ctx.now_millis();
        let plan = FloorPlanSnapshot {
            plan_id: ctx.key().id.clone(),
            name: name.to_string(),
            description: input.description,
            table_ids: Vec::new(),
            sections: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tracing::info!(key = %ctx.key(), name = %plan.name, "Floor plan created");
        Ok(self.cell.set(plan)?.clone())
    }

    fn mutate(
        &mut self,
        now: i64,
        f: impl FnOnce(&mut FloorPlanSnapshot) -> EntityResult<()>,
    ) -> EntityResult<FloorPlanSnapshot> {
        self.cell.update(|plan| {
            f(plan)?;
            plan.updated_at = now;
            Ok(plan.clone())
        })
    }
}

#[derive(Clone)]
pub struct FloorPlanHandle {
    inner: EntityRef<FloorPlan>,
}

impl FloorPlanHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str, plan_id: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::floor_plan(org, site, plan_id)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    async fn mutate<F>(&self, f: F) -> EntityResult<FloorPlanSnapshot>
    where
        F: FnOnce(&mut FloorPlanSnapshot) -> EntityResult<()> + Send + 'static,
    {
        self.inner
            .call(move |plan, ctx| Box::pin(async move { plan.mutate(ctx.now_millis(), f) }))
            .await
    }

    /// Idempotent: an existing plan is returned unchanged
    pub async fn create(&self, input: FloorPlanCreate) -> EntityResult<FloorPlanSnapshot> {
        self.inner
            .call(move |plan, ctx| Box::pin(async move { plan.create(input, ctx) }))
            .await
    }

    pub async fn update(&self, update: FloorPlanUpdate) -> EntityResult<FloorPlanSnapshot> {
        self.mutate(move |plan| {
            if let Some(name) = update.name {
                let name = name.trim();
                if name.is_empty() {
                    return Err(EntityError::validation("floor plan name is required"));
                }
                plan.name = name.to_string();
            }
            if let Some(description) = update.description {
                plan.description = Some(description).filter(|d| !d.is_empty());
            }
            Ok(())
        })
        .await
    }

    pub async fn add_table(&self, table_id: &str) -> EntityResult<FloorPlanSnapshot> {
        let table_id = table_id.to_string();
        self.mutate(move |plan| {
            if plan.table_ids.contains(&table_id) {
                return Err(EntityError::AlreadyExists(format!(
                    "table {table_id} in floor plan {}",
                    plan.plan_id
                )));
            }
            plan.table_ids.push(table_id);
            Ok(())
        })
        .await
    }

    pub async fn remove_table(&self, table_id: &str) -> EntityResult<FloorPlanSnapshot> {
        let table_id = table_id.to_string();
        self.mutate(move |plan| {
            let before = plan.table_ids.len();
            plan.table_ids.retain(|id| *id != table_id);
            if plan.table_ids.len() == before {
                return Err(EntityError::not_found(format!("table {table_id}")));
            }
            Ok(())
        })
        .await
    }

    pub async fn add_section(&self, section: FloorSection) -> EntityResult<FloorPlanSnapshot> {
        self.mutate(move |plan| {
            if section.section_id.is_empty() || section.name.trim().is_empty() {
                return Err(EntityError::validation("section id and name are required"));
            }
            if plan.sections.iter().any(|s| s.section_id == section.section_id) {
                return Err(EntityError::AlreadyExists(format!(
                    "section {}",
                    section.section_id
                )));
            }
            plan.sections.push(section);
            Ok(())
        })
        .await
    }

    pub async fn remove_section(&self, section_id: &str) -> EntityResult<FloorPlanSnapshot> {
        let section_id = section_id.to_string();
        self.mutate(move |plan| {
            let before = plan.sections.len();
            plan.sections.retain(|s| s.section_id != section_id);
            if plan.sections.len() == before {
                return Err(EntityError::not_found(format!("section {section_id}")));
            }
            Ok(())
        })
        .await
    }

    pub async fn activate(&self) -> EntityResult<FloorPlanSnapshot> {
        self.mutate(|plan| {
            plan.is_active = true;
            Ok(())
        })
        .await
    }

    pub async fn deactivate(&self) -> EntityResult<FloorPlanSnapshot> {
        self.mutate(|plan| {
            plan.is_active = false;
            Ok(())
        })
        .await
    }

    /// Drop the persisted plan; the key reads as never created afterwards
    pub async fn clear(&self) -> EntityResult<()> {
        self.inner
            .call(|plan, ctx| {
                Box::pin(async move {
                    plan.cell.get()?;
                    plan.cell.clear()?;
                    tracing::info!(key = %ctx.key(), "Floor plan cleared");
                    Ok::<_, EntityError>(())
                })
            })
            .await
    }

    pub async fn get_state(&self) -> EntityResult<FloorPlanSnapshot> {
        self.inner
            .call(|plan, _| Box::pin(async move { plan.cell.get().cloned() }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|plan, _| Box::pin(async move { Ok::<_, EntityError>(plan.cell.exists()) }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RedbStore;
    use std::sync::Arc;

    fn runtime() -> Runtime {
        let store = Arc::new(RedbStore::open_in_memory().unwrap());
        Runtime::builder(store).register::<FloorPlan>().build()
    }

    fn main_room() -> FloorPlanCreate {
        FloorPlanCreate {
            name: "Main room".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let rt = runtime();
        let plan = FloorPlanHandle::new(&rt, "acme", "s1", "main");
        assert!(matches!(
            plan.add_table("t1").await,
            Err(EntityError::NotInitialized(_))
        ));
        let created = plan.create(main_room()).await.unwrap();
        assert_eq!(created.plan_id, "main");
        let again = plan
            .create(FloorPlanCreate {
                name: "Other".into(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(again.name, "Main room");
    }

    #[tokio::test]
    async fn test_duplicate_table_rejected() {
        let rt = runtime();
        let plan = FloorPlanHandle::new(&rt, "acme", "s1", "main");
        plan.create(main_room()).await.unwrap();
        plan.add_table("t1").await.unwrap();
        assert!(matches!(
            plan.add_table("t1").await,
            Err(EntityError::AlreadyExists(_))
        ));
        assert_eq!(plan.get_state().await.unwrap().table_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_add_table_is_serialized() {
        let rt = runtime();
        let plan = FloorPlanHandle::new(&rt, "acme", "s1", "main");
        plan.create(main_room()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let plan = plan.clone();
            handles.push(tokio::spawn(async move { plan.add_table(&format!("t{i}")).await }));
        }
        // Same id from many callers: exactly one wins
        for _ in 0..10 {
            let plan = plan.clone();
            handles.push(tokio::spawn(async move { plan.add_table("shared").await }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 21);

        let state = plan.get_state().await.unwrap();
        assert_eq!(state.table_ids.len(), 21);
        let mut ids = state.table_ids.clone();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 21);
    }

    #[tokio::test]
    async fn test_sections_and_clear() {
        let rt = runtime();
        let plan = FloorPlanHandle::new(&rt, "acme", "s1", "main");
        plan.create(main_room()).await.unwrap();
        let section = FloorSection {
            section_id: "patio".into(),
            name: "Patio".into(),
            color: None,
        };
        plan.add_section(section.clone()).await.unwrap();
        assert!(plan.add_section(section).await.is_err());
        plan.remove_section("patio").await.unwrap();
        assert!(matches!(
            plan.remove_section("patio").await,
            Err(EntityError::NotFound(_))
        ));

        assert!(!plan.deactivate().await.unwrap().is_active);
        plan.clear().await.unwrap();
        assert!(!plan.exists().await.unwrap());
    }
}
