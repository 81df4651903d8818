//! Device authorization (device-code flow)
//!
//! One snapshot entity per user code. A device calls `initiate`, shows the
//! user code to staff and polls with its device code until a staff member
//! authorizes or denies it on another screen.
//!
//! Expiry is enforced twice: an activation-scoped timer fires at the TTL,
//! and every poll re-checks `expires_at` so an evicted activation (timer
//! gone) still expires on time. Polling past `max_polls` also expires.

use crate::core::config::DeviceAuthConfig;
use crate::runtime::{
    Entity, EntityContext, EntityError, EntityRef, EntityResult, Runtime, SnapshotCell,
};
use async_trait::async_trait;
use shared::EntityKey;
use shared::key::EntityKind;
use shared::models::{
    DeviceAuthInitiate, DeviceAuthSnapshot, DeviceCodeGrant, DeviceCodeStatus, PollOutcome,
};
use shared::util::{device_code, user_code};

const EXPIRY_TIMER: &str = "expire";

/// Fresh user codes tried when a generated one is already taken
const ISSUE_ATTEMPTS: usize = 3;

pub struct DeviceAuth {
    cell: SnapshotCell<DeviceAuthSnapshot>,
}

#[async_trait]
impl Entity for DeviceAuth {
    const KIND: EntityKind = EntityKind::DeviceAuth;

    async fn activate(ctx: &EntityContext) -> EntityResult<Self> {
        let entity = Self {
            cell: SnapshotCell::load(ctx)?,
        };
        // Re-arm after reactivation; lazy expiry covers the gap
        if let Some(state) = entity.cell.peek()
            && state.status == DeviceCodeStatus::Pending
        {
            let left = (state.expires_at - ctx.now_millis()).max(0) as u64;
            ctx.register_timer(EXPIRY_TIMER, std::time::Duration::from_millis(left), None);
        }
        Ok(entity)
    }

    async fn receive_timer(&mut self, name: &str, ctx: &EntityContext) -> EntityResult<()> {
        if name != EXPIRY_TIMER {
            tracing::warn!(key = %ctx.key(), timer = name, "Unknown timer");
            return Ok(());
        }
        if self.cell.peek().is_some_and(|s| s.status == DeviceCodeStatus::Pending) {
            self.expire(ctx.now_millis())?;
            tracing::info!(key = %ctx.key(), "Device code expired");
        }
        Ok(())
    }
}

fn config(ctx: &EntityContext) -> DeviceAuthConfig {
    ctx.data::<DeviceAuthConfig>()
        .map(|c| c.as_ref().clone())
        .unwrap_or_default()
}

impl DeviceAuth {
    fn issue(&mut self, input: DeviceAuthInitiate, ctx: &EntityContext) -> EntityResult<DeviceCodeGrant> {
        if self.cell.exists() {
            return Err(EntityError::AlreadyExists(ctx.key().to_string()));
        }
        if input.client_id.trim().is_empty() {
            return Err(EntityError::validation("client_id is required"));
        }
        let cfg = config(ctx);
        let now = ctx.now_millis();
        let state = self.cell.set(DeviceAuthSnapshot {
            user_code: ctx.key().id.clone(),
            device_code: device_code(),
            client_id: input.client_id,
            device_name: input.device_name,
            scope: input.scope,
            status: DeviceCodeStatus::Pending,
            poll_count: 0,
            issued_at: now,
            expires_at: now + cfg.code_ttl.as_millis() as i64,
            authorized_by: None,
            site: None,
            resolved_at: None,
        })?;
        ctx.register_timer(EXPIRY_TIMER, cfg.code_ttl, None);
        tracing::info!(
            key = %ctx.key(),
            client_id = %state.client_id,
            expires_at = state.expires_at,
            "Device code issued"
        );
        Ok(DeviceCodeGrant {
            user_code: state.user_code.clone(),
            device_code: state.device_code.clone(),
            expires_at: state.expires_at,
            interval_secs: cfg.poll_interval_secs,
        })
    }

    fn expire(&mut self, now: i64) -> EntityResult<()> {
        self.cell.update(|s| {
            s.status = DeviceCodeStatus::Expired;
            s.resolved_at = Some(now);
            Ok(())
        })
    }

    /// Pending and past its deadline: expire now and report it
    fn lapse_if_due(&mut self, ctx: &EntityContext) -> EntityResult<bool> {
        let now = ctx.now_millis();
        let state = self.cell.get()?;
        if state.status == DeviceCodeStatus::Pending && now >= state.expires_at {
            self.expire(now)?;
            ctx.unregister_timer(EXPIRY_TIMER);
            tracing::info!(key = %ctx.key(), "Device code expired on access");
            return Ok(true);
        }
        Ok(false)
    }

    fn poll(&mut self, device_code: &str, ctx: &EntityContext) -> EntityResult<PollOutcome> {
        if self.cell.get()?.device_code != device_code {
            return Err(EntityError::not_found("device code"));
        }
        self.lapse_if_due(ctx)?;

        let max_polls = config(ctx).max_polls;
        let now = ctx.now_millis();
        let state = self.cell.update(|s| {
            if s.status == DeviceCodeStatus::Pending {
                s.poll_count += 1;
                if s.poll_count > max_polls {
                    s.status = DeviceCodeStatus::Expired;
                    s.resolved_at = Some(now);
                }
            }
            Ok(s.clone())
        })?;
        if state.status == DeviceCodeStatus::Expired && state.poll_count > max_polls {
            ctx.unregister_timer(EXPIRY_TIMER);
            tracing::warn!(key = %ctx.key(), polls = state.poll_count, "Device code poll limit reached");
        }

        Ok(match state.status {
            DeviceCodeStatus::Pending => PollOutcome::Pending,
            DeviceCodeStatus::Authorized => PollOutcome::Authorized {
                authorized_by: state.authorized_by.unwrap_or_default(),
                site: state.site,
            },
            DeviceCodeStatus::Denied => PollOutcome::Denied,
            DeviceCodeStatus::Expired => PollOutcome::Expired,
        })
    }

    fn resolve(
        &mut self,
        status: DeviceCodeStatus,
        by: String,
        site: Option<String>,
        ctx: &EntityContext,
    ) -> EntityResult<DeviceAuthSnapshot> {
        self.lapse_if_due(ctx)?;
        let now = ctx.now_millis();
        let state = self.cell.update(|s| {
            if s.status.is_resolved() {
                return Err(EntityError::invalid_transition(format!(
                    "device code is already {:?}",
                    s.status
                )));
            }
            s.status = status;
            s.authorized_by = Some(by);
            s.site = site;
            s.resolved_at = Some(now);
            Ok(s.clone())
        })?;
        ctx.unregister_timer(EXPIRY_TIMER);
        tracing::info!(key = %ctx.key(), status = ?state.status, by = ?state.authorized_by, "Device code resolved");
        Ok(state)
    }
}

#[derive(Clone)]
pub struct DeviceAuthHandle {
    inner: EntityRef<DeviceAuth>,
}

impl DeviceAuthHandle {
    pub fn new(runtime: &Runtime, org: &str, user_code: &str) -> Self {
        Self {
            inner: EntityRef::new(runtime, EntityKey::device_auth(org, user_code)),
        }
    }

    /// Start a device flow under a fresh user code
    pub async fn initiate(
        runtime: &Runtime,
        org: &str,
        input: DeviceAuthInitiate,
    ) -> EntityResult<DeviceCodeGrant> {
        let mut last = None;
        for _ in 0..ISSUE_ATTEMPTS {
            let handle = Self::new(runtime, org, &user_code());
            let input = input.clone();
            match handle
                .inner
                .call(move |d, ctx| Box::pin(async move { d.issue(input, ctx) }))
                .await
            {
                Err(EntityError::AlreadyExists(key)) => {
                    tracing::debug!(key = %key, "User code collision, retrying");
                    last = Some(EntityError::AlreadyExists(key));
                }
                other => return other,
            }
        }
        Err(last.unwrap_or_else(|| EntityError::Internal("no user code issued".into())))
    }

    pub fn key(&self) -> &EntityKey {
        self.inner.key()
    }

    pub async fn poll(&self, device_code: &str) -> EntityResult<PollOutcome> {
        let device_code = device_code.to_string();
        self.inner
            .call(move |d, ctx| Box::pin(async move { d.poll(&device_code, ctx) }))
            .await
    }

    pub async fn authorize(&self, authorized_by: &str, site: Option<String>) -> EntityResult<DeviceAuthSnapshot> {
        let by = authorized_by.to_string();
        self.inner
            .call(move |d, ctx| {
                Box::pin(async move { d.resolve(DeviceCodeStatus::Authorized, by, site, ctx) })
            })
            .await
    }

    pub async fn deny(&self, denied_by: &str) -> EntityResult<DeviceAuthSnapshot> {
        let by = denied_by.to_string();
        self.inner
            .call(move |d, ctx| {
                Box::pin(async move { d.resolve(DeviceCodeStatus::Denied, by, None, ctx) })
            })
            .await
    }

    pub async fn get_state(&self) -> EntityResult<DeviceAuthSnapshot> {
        self.inner
            .call(|d, _| Box::pin(async move { d.cell.get().cloned() }))
            .await
    }

    pub async fn exists(&self) -> EntityResult<bool> {
        self.inner
            .call(|d, _| Box::pin(async move { Ok::<_, EntityError>(d.cell.exists()) }))
            .await
    }
}
