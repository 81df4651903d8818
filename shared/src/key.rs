//! Entity addressing
//!
//! Every unit of state in the runtime is addressed by an [`EntityKey`]:
//!
//! ```text
//! {org}/{site}/{kind}/{id}[/{YYYY-MM-DD}]
//! ```
//!
//! Date-partitioned kinds (calendar, waitlist) carry the business date as the
//! last segment. Keys are never reused for a different logical entity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Site placeholder for org-level entities (device authorization)
pub const ORG_SCOPE: &str = "_";

/// Instance id used by per-site singletons (settings, optimizer, detector)
pub const SINGLETON_ID: &str = "default";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Key construction / parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key component '{0}' must not be empty")]
    EmptyComponent(&'static str),

    #[error("key component '{0}' must not contain '/'")]
    InvalidCharacter(&'static str),

    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("entity kind {0} requires a date")]
    MissingDate(EntityKind),

    #[error("entity kind {0} does not take a date")]
    UnexpectedDate(EntityKind),

    #[error("malformed key: {0}")]
    Malformed(String),
}

/// Closed set of entity kinds hosted by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Booking,
    BookingSettings,
    BookingCalendar,
    FloorPlan,
    Table,
    TableOptimizer,
    Waitlist,
    NoShowDetector,
    DeviceAuth,
    PrintJob,
    PrintQueue,
    OfflineSync,
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Booking,
        EntityKind::BookingSettings,
        EntityKind::BookingCalendar,
        EntityKind::FloorPlan,
        EntityKind::Table,
        EntityKind::TableOptimizer,
        EntityKind::Waitlist,
        EntityKind::NoShowDetector,
        EntityKind::DeviceAuth,
        EntityKind::PrintJob,
        EntityKind::PrintQueue,
        EntityKind::OfflineSync,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Booking => "booking",
            EntityKind::BookingSettings => "booking-settings",
            EntityKind::BookingCalendar => "booking-calendar",
            EntityKind::FloorPlan => "floor-plan",
            EntityKind::Table => "table",
            EntityKind::TableOptimizer => "table-optimizer",
            EntityKind::Waitlist => "waitlist",
            EntityKind::NoShowDetector => "no-show-detector",
            EntityKind::DeviceAuth => "device-auth",
            EntityKind::PrintJob => "print-job",
            EntityKind::PrintQueue => "print-queue",
            EntityKind::OfflineSync => "offline-sync",
        }
    }

    /// Kinds partitioned per business date
    pub const fn is_date_partitioned(&self) -> bool {
        matches!(self, EntityKind::BookingCalendar | EntityKind::Waitlist)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| KeyError::UnknownKind(s.to_string()))
    }
}

/// Composite, string-renderable entity identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub org: String,
    pub site: String,
    pub kind: EntityKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl EntityKey {
    pub fn new(
        org: impl Into<String>,
        site: impl Into<String>,
        kind: EntityKind,
        id: impl Into<String>,
    ) -> Self {
        Self {
            org: org.into(),
            site: site.into(),
            kind,
            id: id.into(),
            date: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// A key of another kind living at the same org/site
    pub fn sibling(&self, kind: EntityKind, id: impl Into<String>) -> Self {
        Self::new(self.org.clone(), self.site.clone(), kind, id)
    }

    /// Check component rules; the runtime refuses keys that fail here
    pub fn validate(&self) -> Result<(), KeyError> {
        for (name, value) in [("org", &self.org), ("site", &self.site), ("id", &self.id)] {
            if value.is_empty() {
                return Err(KeyError::EmptyComponent(name));
            }
            if value.contains('/') {
                return Err(KeyError::InvalidCharacter(name));
            }
        }
        match (self.kind.is_date_partitioned(), self.date) {
            (true, None) => Err(KeyError::MissingDate(self.kind)),
            (false, Some(_)) => Err(KeyError::UnexpectedDate(self.kind)),
            _ => Ok(()),
        }
    }

    // ========== Per-kind constructors ==========

    pub fn booking(org: &str, site: &str, booking_id: &str) -> Self {
        Self::new(org, site, EntityKind::Booking, booking_id)
    }

    pub fn booking_settings(org: &str, site: &str) -> Self {
        Self::new(org, site, EntityKind::BookingSettings, SINGLETON_ID)
    }

    pub fn booking_calendar(org: &str, site: &str, date: NaiveDate) -> Self {
        Self::new(org, site, EntityKind::BookingCalendar, SINGLETON_ID).with_date(date)
    }

    pub fn floor_plan(org: &str, site: &str, plan_id: &str) -> Self {
        Self::new(org, site, EntityKind::FloorPlan, plan_id)
    }

    pub fn table(org: &str, site: &str, table_id: &str) -> Self {
        Self::new(org, site, EntityKind::Table, table_id)
    }

    pub fn table_optimizer(org: &str, site: &str) -> Self {
        Self::new(org, site, EntityKind::TableOptimizer, SINGLETON_ID)
    }

    pub fn waitlist(org: &str, site: &str, date: NaiveDate) -> Self {
        Self::new(org, site, EntityKind::Waitlist, SINGLETON_ID).with_date(date)
    }

    pub fn no_show_detector(org: &str, site: &str) -> Self {
        Self::new(org, site, EntityKind::NoShowDetector, SINGLETON_ID)
    }

    /// Device authorization is org-scoped and addressed by user code
    pub fn device_auth(org: &str, user_code: &str) -> Self {
        Self::new(org, ORG_SCOPE, EntityKind::DeviceAuth, user_code)
    }

    pub fn print_job(org: &str, site: &str, job_id: &str) -> Self {
        Self::new(org, site, EntityKind::PrintJob, job_id)
    }

    pub fn print_queue(org: &str, site: &str, printer_id: &str) -> Self {
        Self::new(org, site, EntityKind::PrintQueue, printer_id)
    }

    pub fn offline_sync(org: &str, site: &str, device_id: &str) -> Self {
        Self::new(org, site, EntityKind::OfflineSync, device_id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.org, self.site, self.kind, self.id)?;
        if let Some(date) = self.date {
            write!(f, "/{}", date.format(DATE_FORMAT))?;
        }
        Ok(())
    }
}

impl FromStr for EntityKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let (org, site, kind, id, date) = match parts.as_slice() {
            [org, site, kind, id] => (*org, *site, *kind, *id, None),
            [org, site, kind, id, date] => {
                let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
                    .map_err(|_| KeyError::Malformed(s.to_string()))?;
                (*org, *site, *kind, *id, Some(date))
            }
            _ => return Err(KeyError::Malformed(s.to_string())),
        };
        let key = EntityKey {
            org: org.to_string(),
            site: site.to_string(),
            kind: kind.parse()?,
            id: id.to_string(),
            date,
        };
        key.validate()?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_parse() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let key = EntityKey::booking_calendar("acme", "downtown", date);
        let rendered = key.to_string();
        assert_eq!(rendered, "acme/downtown/booking-calendar/default/2026-03-14");
        assert_eq!(rendered.parse::<EntityKey>().unwrap(), key);

        let booking = EntityKey::booking("acme", "downtown", "b-1");
        assert_eq!(booking.to_string(), "acme/downtown/booking/b-1");
        assert_eq!(booking.to_string().parse::<EntityKey>().unwrap(), booking);
    }

    #[test]
    fn test_validate_rejects_bad_components() {
        let key = EntityKey::booking("acme", "", "b-1");
        assert_eq!(key.validate(), Err(KeyError::EmptyComponent("site")));

        let key = EntityKey::booking("acme", "site", "a/b");
        assert_eq!(key.validate(), Err(KeyError::InvalidCharacter("id")));
    }

    #[test]
    fn test_date_partitioning_enforced() {
        let key = EntityKey::new("acme", "s1", EntityKind::BookingCalendar, "default");
        assert_eq!(
            key.validate(),
            Err(KeyError::MissingDate(EntityKind::BookingCalendar))
        );

        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let key = EntityKey::booking("acme", "s1", "b").with_date(date);
        assert_eq!(key.validate(), Err(KeyError::UnexpectedDate(EntityKind::Booking)));
    }

    #[test]
    fn test_unknown_kind() {
        let err = "acme/s1/spaceship/1".parse::<EntityKey>().unwrap_err();
        assert_eq!(err, KeyError::UnknownKind("spaceship".to_string()));
    }

    #[test]
    fn test_sibling_keeps_site() {
        let booking = EntityKey::booking("acme", "s1", "b-1");
        let detector = booking.sibling(EntityKind::NoShowDetector, SINGLETON_ID);
        assert_eq!(detector, EntityKey::no_show_detector("acme", "s1"));
    }
}
