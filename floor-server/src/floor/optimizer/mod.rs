//! Table assignment optimizer (snapshot entity, one per site)
//!
//! Holds the site's seating inventory as [`OptimizableTable`]s plus server
//! sections, and answers ranked recommendations through [`scoring`].
//! Section membership is exclusive: upserting a section claims its tables
//! away from any other section.

pub mod scoring;

use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::EntityKey;
use shared::floor::{
    AssignmentRequest, AssignmentResult, OptimizableTable, OptimizerSnapshot, ServerSection,
    ServerWorkload, TableRecommendation,
};
use shared::key::EntityKind;

/// Partial table update (None = unchanged)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizableTableUpdate {
    pub number: Option<String>,
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub combinable: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub combinable_with: Option<Vec<String>>,
    pub max_combination_size: Option<u32>,
    pub is_active: Option<bool>,
}

fn validate_capacity(min: u32, max: u32) -> EntityResult<()> {
    if max == 0 || min > max {
        return Err(EntityError::validation(format!(
            "invalid capacity range {min}..={max}"
        )));
    }
    Ok(())
}

/// Section covers are the covers of their occupied member tables
fn recount_sections(s: &mut OptimizerSnapshot) {
    let tables = &s.tables;
    for section in &mut s.sections {
        section.current_covers = tables
            .iter()
            .filter(|t| t.is_occupied && section.table_ids.contains(&t.table_id))
            .map(|t| t.current_covers)
            .sum();
    }
}

pub struct TableOptimizer {
    cell: SnapshotCell<OptimizerSnapshot>,
}

#[async_trait]
impl Entity for TableOptimizer {
    const KIND: EntityKind = EntityKind::TableOptimizer;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        Ok(Self {
            cell: SnapshotCell::load(ctx)?,
        })
    }
}

impl TableOptimizer {
    fn initialize(&mut self, now: i64) -> EntityResult<OptimizerSnapshot> {
        if let Some(existing) = self.cell.peek() {
            return Ok(existing.clone());
        }
        let state = OptimizerSnapshot {
            created_at: now,
            updated_at: now,
            ..Default::default()
        };
        Ok(self.cell.set(state)?.clone())
    }

    /// Insert or replace; occupancy and section assignment survive a replace
    fn register_table(
        &mut self,
        mut table: OptimizableTable,
        now: i64,
    ) -> EntityResult<OptimizerSnapshot> {
        validate_capacity(table.min_capacity, table.max_capacity)?;
        if table.table_id.is_empty() {
            return Err(EntityError::validation("table_id is required"));
        }
        self.cell.update(|s| {
            match s.tables.iter_mut().find(|t| t.table_id == table.table_id) {
                Some(existing) => {
                    table.is_occupied = existing.is_occupied;
                    table.current_covers = existing.current_covers;
                    table.current_server_id = existing.current_server_id.clone();
                    *existing = table;
                }
                None => {
                    table.current_server_id =
                        s.section_of(&table.table_id).map(|sec| sec.server_id.clone());
                    s.tables.push(table);
                }
            }
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn update_table(
        &mut self,
        table_id: &str,
        update: OptimizableTableUpdate,
        now: i64,
    ) -> EntityResult<OptimizerSnapshot> {
        self.cell.update(|s| {
            let table = s
                .tables
                .iter_mut()
                .find(|t| t.table_id == table_id)
                .ok_or_else(|| EntityError::not_found(format!("table {table_id}")))?;
            if let Some(v) = update.number {
                table.number = v;
            }
            if let Some(v) = update.min_capacity {
                table.min_capacity = v;
            }
            if let Some(v) = update.max_capacity {
                table.max_capacity = v;
            }
            if let Some(v) = update.combinable {
                table.combinable = v;
            }
            if let Some(v) = update.tags {
                table.tags = v;
            }
            if let Some(v) = update.combinable_with {
                table.combinable_with = v;
            }
            if let Some(v) = update.max_combination_size {
                table.max_combination_size = v;
            }
            if let Some(v) = update.is_active {
                table.is_active = v;
            }
            validate_capacity(table.min_capacity, table.max_capacity)?;
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn remove_table(&mut self, table_id: &str, now: i64) -> EntityResult<OptimizerSnapshot> {
        self.cell.update(|s| {
            let before = s.tables.len();
            s.tables.retain(|t| t.table_id != table_id);
            if s.tables.len() == before {
                return Err(EntityError::not_found(format!("table {table_id}")));
            }
            for section in &mut s.sections {
                section.table_ids.retain(|id| id != table_id);
            }
            recount_sections(s);
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn upsert_section(
        &mut self,
        section: ServerSection,
        now: i64,
    ) -> EntityResult<OptimizerSnapshot> {
        if section.server_id.is_empty() {
            return Err(EntityError::validation("server_id is required"));
        }
        self.cell.update(|s| {
            for id in &section.table_ids {
                if s.table(id).is_none() {
                    return Err(EntityError::not_found(format!("table {id}")));
                }
            }
            // Claim tables away from other sections
            for other in s.sections.iter_mut().filter(|o| o.server_id != section.server_id) {
                other.table_ids.retain(|id| !section.table_ids.contains(id));
            }
            for table in &mut s.tables {
                if section.table_ids.contains(&table.table_id) {
                    table.current_server_id = Some(section.server_id.clone());
                } else if table.current_server_id.as_deref() == Some(section.server_id.as_str()) {
                    table.current_server_id = None;
                }
            }
            match s.sections.iter_mut().find(|o| o.server_id == section.server_id) {
                Some(existing) => *existing = section,
                None => s.sections.push(section),
            }
            recount_sections(s);
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn remove_section(&mut self, server_id: &str, now: i64) -> EntityResult<OptimizerSnapshot> {
        self.cell.update(|s| {
            let before = s.sections.len();
            s.sections.retain(|sec| sec.server_id != server_id);
            if s.sections.len() == before {
                return Err(EntityError::not_found(format!("section {server_id}")));
            }
            for table in &mut s.tables {
                if table.current_server_id.as_deref() == Some(server_id) {
                    table.current_server_id = None;
                }
            }
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn recommend(&self, request: &AssignmentRequest) -> EntityResult<AssignmentResult> {
        if request.party_size == 0 {
            return Err(EntityError::validation("party_size must be positive"));
        }
        Ok(scoring::recommend(self.cell.get()?, request))
    }

    fn record_usage(
        &mut self,
        table_id: &str,
        covers: u32,
        now: i64,
    ) -> EntityResult<OptimizerSnapshot> {
        self.cell.update(|s| {
            let table = s
                .tables
                .iter_mut()
                .find(|t| t.table_id == table_id)
                .ok_or_else(|| EntityError::not_found(format!("table {table_id}")))?;
            // Re-recording replaces the previous covers
            let previous = if table.is_occupied { table.current_covers } else { 0 };
            table.is_occupied = true;
            table.current_covers = covers;
            if let Some(section) = s
                .sections
                .iter_mut()
                .find(|sec| sec.table_ids.iter().any(|id| id == table_id))
            {
                section.current_covers = section.current_covers.saturating_sub(previous) + covers;
            }
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn clear_usage(&mut self, table_id: &str, now: i64) -> EntityResult<OptimizerSnapshot> {
        self.cell.update(|s| {
            let table = s
                .tables
                .iter_mut()
                .find(|t| t.table_id == table_id)
                .ok_or_else(|| EntityError::not_found(format!("table {table_id}")))?;
            let covers = table.current_covers;
            table.is_occupied = false;
            table.current_covers = 0;
            if let Some(section) = s
                .sections
                .iter_mut()
                .find(|sec| sec.table_ids.iter().any(|id| id == table_id))
            {
                section.current_covers = section.current_covers.saturating_sub(covers);
            }
            s.updated_at = now;
            Ok(s.clone())
        })
    }

    fn server_workloads(&self) -> EntityResult<Vec<ServerWorkload>> {
        Ok(self
            .cell
            .get()?
            .sections
            .iter()
            .map(|section| ServerWorkload {
                server_id: section.server_id.clone(),
                server_name: section.server_name.clone(),
                table_count: section.table_ids.len(),
                current_covers: section.current_covers,
                max_covers: section.max_covers,
                load_percent: section.load_percent(),
            })
            .collect())
    }
}

/// Typed handle for a site's optimizer
#[derive(Clone)]
pub struct OptimizerHandle {
    inner: EntityRef<TableOptimizer>,
}

impl OptimizerHandle {
    pub fn new(runtime: &Runtime, org: &str, site: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::table_optimizer(org, site)),
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    pub async fn initialize(&self) -> EntityResult<OptimizerSnapshot> {
        self.inner
            .call(|o, ctx| Box::pin(async move { o.initialize(ctx.now_millis()) }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|o, _| Box::pin(async move { Ok::<_, EntityError>(o.cell.exists()) }))
            .await
    }

    pub async fn get_state(&self) -> EntityResult<OptimizerSnapshot> {
        self.inner
            .call(|o, _| Box::pin(async move { o.cell.get().cloned() }))
            .await
    }

    pub async fn register_table(&self, table: OptimizableTable) -> EntityResult<OptimizerSnapshot> {
        self.inner
            .call(move |o, ctx| Box::pin(async move { o.register_table(table, ctx.now_millis()) }))
            .await
    }

    pub async fn update_table(
        &self,
        table_id: &str,
        update: OptimizableTableUpdate,
    ) -> EntityResult<OptimizerSnapshot> {
        let table_id = table_id.to_string();
        self.inner
            .call(move |o, ctx| {
                Box::pin(async move { o.update_table(&table_id, update, ctx.now_millis()) })
            })
            .await
    }

    pub async fn remove_table(&self, table_id: &str) -> EntityResult<OptimizerSnapshot> {
        let table_id = table_id.to_string();
        self.inner
            .call(move |o, ctx| Box::pin(async move { o.remove_table(&table_id, ctx.now_millis()) }))
            .await
    }

    pub async fn upsert_section(&self, section: ServerSection) -> EntityResult<OptimizerSnapshot> {
        self.inner
            .call(move |o, ctx| Box::pin(async move { o.upsert_section(section, ctx.now_millis()) }))
            .await
    }

    pub async fn remove_section(&self, server_id: &str) -> EntityResult<OptimizerSnapshot> {
        let server_id = server_id.to_string();
        self.inner
            .call(move |o, ctx| {
                Box::pin(async move { o.remove_section(&server_id, ctx.now_millis()) })
            })
            .await
    }

    pub async fn recommend(&self, request: AssignmentRequest) -> EntityResult<AssignmentResult> {
        self.inner
            .call(move |o, _| Box::pin(async move { o.recommend(&request) }))
            .await
    }

    /// Highest-scored recommendation, if any
    pub async fn auto_assign(
        &self,
        request: AssignmentRequest,
    ) -> EntityResult<Option<TableRecommendation>> {
        let result = self.recommend(request).await?;
        Ok(result.recommendations.into_iter().next())
    }

    pub async fn record_usage(&self, table_id: &str, covers: u32) -> EntityResult<OptimizerSnapshot> {
        let table_id = table_id.to_string();
        self.inner
            .call(move |o, ctx| {
                Box::pin(async move { o.record_usage(&table_id, covers, ctx.now_millis()) })
            })
            .await
    }

    pub async fn clear_usage(&self, table_id: &str) -> EntityResult<OptimizerSnapshot> {
        let table_id = table_id.to_string();
        self.inner
            .call(move |o, ctx| Box::pin(async move { o.clear_usage(&table_id, ctx.now_millis()) }))
            .await
    }

    pub async fn server_workloads(&self) -> EntityResult<Vec<ServerWorkload>> {
        self.inner
            .call(|o, _| Box::pin(async move { o.server_workloads() }))
            .await
    }
}
