//! Event-sourced entity state
//!
//! ```text
//! command ─► validate(state) ─► events ─► append(expected_version) ─► fold ─► ack
//!                                               │
//!                                               └─ conflict/failure: state untouched
//! ```
//!
//! Activation replays the whole stream through [`Aggregate::transition`].

use super::entity::EntityContext;
use super::error::EntityResult;
use super::store::DurableStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// State derived from an event stream
///
/// `transition` must be pure and total: same state + same event gives the
/// same result, and no event is ever rejected.
pub trait Aggregate: Default + Clone + Send + Sync + 'static {
    type Event: Serialize + DeserializeOwned + Clone + Debug + Send + Sync;

    fn transition(&mut self, event: &Self::Event);

    /// Fold a sequence from the empty state
    fn replay<'a>(events: impl IntoIterator<Item = &'a Self::Event>) -> Self
    where
        Self::Event: 'a,
    {
        let mut state = Self::default();
        for event in events {
            state.transition(event);
        }
        state
    }
}

/// Stored form of one event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord<E> {
    pub version: u64,
    pub recorded_at: i64,
    pub event: E,
}

pub struct Journal<A: Aggregate> {
    stream: String,
    store: Arc<dyn DurableStore>,
    state: A,
    version: u64,
}

impl<A: Aggregate> Journal<A> {
    /// Replay the stream for the context's key
    pub fn load(ctx: &EntityContext) -> EntityResult<Self> {
        let store = ctx.store().clone();
        let stream = ctx.key_str().to_string();
        let mut state = A::default();
        let mut version = 0;
        for (_, bytes) in store.read_events(&stream)? {
            let record: EventRecord<A::Event> = serde_json::from_slice(&bytes)?;
            state.transition(&record.event);
            version = record.version;
        }
        if version > 0 {
            tracing::debug!(stream = %stream, version, "Stream replayed");
        }
        Ok(Self {
            stream,
            store,
            state,
            version,
        })
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// Number of events applied so far
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.version == 0
    }

    /// Append `events` at the current version, then fold them in
    pub fn raise(&mut self, events: Vec<A::Event>, now: i64) -> EntityResult<&A> {
        if events.is_empty() {
            return Ok(&self.state);
        }
        let mut payloads = Vec::with_capacity(events.len());
        for (i, event) in events.iter().enumerate() {
            let record = EventRecord {
                version: self.version + i as u64 + 1,
                recorded_at: now,
                event,
            };
            payloads.push(serde_json::to_vec(&record)?);
        }

        let new_version = self
            .store
            .append_events(&self.stream, self.version, &payloads)?;

        for event in &events {
            self.state.transition(event);
        }
        self.version = new_version;
        Ok(&self.state)
    }

    /// Full stored history
    pub fn history(&self) -> EntityResult<Vec<EventRecord<A::Event>>> {
        self.store
            .read_events(&self.stream)?
            .into_iter()
            .map(|(_, bytes)| Ok(serde_json::from_slice(&bytes)?))
            .collect()
    }

    /// Point-in-time reconstruction after `version` events
    pub fn state_at(&self, version: u64) -> EntityResult<A> {
        let history = self.history()?;
        Ok(A::replay(
            history
                .iter()
                .take_while(|r| r.version <= version)
                .map(|r| &r.event),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Tally {
        total: i64,
        seen: Vec<i64>,
    }

    impl Aggregate for Tally {
        type Event = i64;

        fn transition(&mut self, event: &i64) {
            self.total += event;
            self.seen.push(*event);
        }
    }

    #[test]
    fn test_prefix_replay_matches_incremental_fold() {
        let events = [3, -1, 7, 2];
        let mut live = Tally::default();
        for (i, event) in events.iter().enumerate() {
            live.transition(event);
            assert_eq!(Tally::replay(&events[..=i]), live);
        }
        assert_eq!(live.total, 11);
    }

    #[test]
    fn test_record_round_trips_as_json() {
        let record = EventRecord {
            version: 4,
            recorded_at: 1_700_000_000_000,
            event: 9_i64,
        };
        let bytes = serde_json::to_vec(&record).unwrap();
        let back: EventRecord<i64> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, record);
    }
}
