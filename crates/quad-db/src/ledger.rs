use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use quad_policy::rsvp::{self, Capacity};
use quad_types::models::{EventCounters, PostStatus, RsvpChoice, RsvpState};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::Database;
use crate::models::{fmt_ts, parse_id};

#[derive(Debug)]
pub enum RsvpOutcome {
    /// Committed; counters are read inside the same transaction.
    Committed {
        state: Option<RsvpState>,
        counters: EventCounters,
    },
    /// No event with that id (or it is an announcement).
    EventMissing,
    /// The event exists but is not accepting RSVPs.
    NotLive { status: PostStatus },
    /// The capacity rule refused the request; nothing was written.
    Refused(quad_policy::Error),
}

impl Database {
    /// Applies one RSVP request atomically.
    ///
    /// The ledger row change and the counter read run in a single IMMEDIATE
    /// transaction on the writer connection, so concurrent requests for the
    /// same event serialize and counters always equal the committed rows.
    pub fn set_rsvp(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        desired: RsvpChoice,
        enforce_capacity: bool,
        now: DateTime<Utc>,
    ) -> Result<RsvpOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let uid = user_id.to_string();
            let eid = event_id.to_string();

            let event: Option<(String, Option<i64>)> = tx
                .query_row(
                    "SELECT status, max_slots FROM posts WHERE id = ?1 AND kind = 'event'",
                    [&eid],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((status, max_slots)) = event else {
                return Ok(RsvpOutcome::EventMissing);
            };
            let status: PostStatus = status.parse()?;
            if !status.is_live() {
                return Ok(RsvpOutcome::NotLive { status });
            }

            let current = query_state(&tx, &uid, &eid)?;
            let next = rsvp::resolve(current, desired);

            let capacity = Capacity {
                max_slots: max_slots.map(u32::try_from).transpose()?,
                enforce: enforce_capacity,
            };
            if let Err(err) = capacity.check(current, next, query_counters(&tx, &eid)?) {
                return Ok(RsvpOutcome::Refused(err));
            }

            match next {
                None if current.is_some() => {
                    tx.execute(
                        "DELETE FROM rsvps WHERE user_id = ?1 AND event_id = ?2",
                        [&uid, &eid],
                    )?;
                }
                Some(state) if current != next => {
                    let ts = fmt_ts(now);
                    tx.execute(
                        "INSERT INTO rsvps (user_id, event_id, state, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)
                         ON CONFLICT(user_id, event_id)
                         DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
                        rusqlite::params![&uid, &eid, state.as_str(), ts],
                    )?;
                }
                _ => {}
            }

            let counters = query_counters(&tx, &eid)?;
            tx.commit()?;

            info!(
                "RSVP {} on {}: {:?} -> {:?} (going={}, interested={})",
                uid, eid, current, next, counters.going, counters.interested
            );
            Ok(RsvpOutcome::Committed {
                state: next,
                counters,
            })
        })
    }

    /// Live counters for a batch of events. Events with no RSVPs are absent.
    pub fn event_counters(&self, event_ids: &[Uuid]) -> Result<HashMap<Uuid, EventCounters>> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT event_id,
                        COALESCE(SUM(state = 'going'), 0),
                        COALESCE(SUM(state = 'interested'), 0)
                 FROM rsvps WHERE event_id IN ({})
                 GROUP BY event_id",
                placeholders(event_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(id_values(event_ids)), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut counters = HashMap::with_capacity(rows.len());
            for (event_id, going, interested) in rows {
                counters.insert(
                    parse_id(&event_id)?,
                    EventCounters {
                        going: u32::try_from(going)?,
                        interested: u32::try_from(interested)?,
                    },
                );
            }
            Ok(counters)
        })
    }

    /// The viewer's own RSVP on each of `event_ids`. Events without one are absent.
    pub fn rsvp_states(
        &self,
        user_id: Uuid,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, RsvpState>> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT event_id, state FROM rsvps WHERE user_id = ? AND event_id IN ({})",
                placeholders(event_ids.len())
            );

            let mut params = vec![Value::Text(user_id.to_string())];
            params.extend(id_values(event_ids));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut states = HashMap::with_capacity(rows.len());
            for (event_id, state) in rows {
                match (parse_id(&event_id), state.parse::<RsvpState>()) {
                    (Ok(id), Ok(state)) => {
                        states.insert(id, state);
                    }
                    _ => warn!("Skipping corrupt RSVP row ({}, {})", event_id, state),
                }
            }
            Ok(states)
        })
    }
}

fn query_state(conn: &Connection, user_id: &str, event_id: &str) -> Result<Option<RsvpState>> {
    let state: Option<String> = conn
        .query_row(
            "SELECT state FROM rsvps WHERE user_id = ?1 AND event_id = ?2",
            [user_id, event_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(state.as_deref().map(str::parse).transpose()?)
}

fn query_counters(conn: &Connection, event_id: &str) -> Result<EventCounters> {
    let (going, interested): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(state = 'going'), 0), COALESCE(SUM(state = 'interested'), 0)
         FROM rsvps WHERE event_id = ?1",
        [event_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(EventCounters {
        going: u32::try_from(going)?,
        interested: u32::try_from(interested)?,
    })
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn id_values(ids: &[Uuid]) -> impl Iterator<Item = Value> + '_ {
    ids.iter().map(|id| Value::Text(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use quad_types::models::Role;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn committed(outcome: RsvpOutcome) -> (Option<RsvpState>, EventCounters) {
        match outcome {
            RsvpOutcome::Committed { state, counters } => (state, counters),
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[test]
    fn repeating_a_choice_toggles_it_off() {
        let fx = Fixture::new();
        let event = fx.live_event(None);
        let user = fx.user(Role::Student);

        let (state, counters) =
            committed(fx.db.set_rsvp(user, event.id, RsvpChoice::Going, false, Utc::now()).unwrap());
        assert_eq!(state, Some(RsvpState::Going));
        assert_eq!(counters, EventCounters { going: 1, interested: 0 });

        let (state, counters) =
            committed(fx.db.set_rsvp(user, event.id, RsvpChoice::Going, false, Utc::now()).unwrap());
        assert_eq!(state, None);
        assert_eq!(counters, EventCounters::default());
    }

    #[test]
    fn switching_moves_one_count() {
        let fx = Fixture::new();
        let event = fx.live_event(None);
        let user = fx.user(Role::Student);

        fx.db.set_rsvp(user, event.id, RsvpChoice::Interested, false, Utc::now()).unwrap();
        let (state, counters) =
            committed(fx.db.set_rsvp(user, event.id, RsvpChoice::Going, false, Utc::now()).unwrap());
        assert_eq!(state, Some(RsvpState::Going));
        assert_eq!(counters, EventCounters { going: 1, interested: 0 });
    }

    #[test]
    fn enforced_capacity_refuses_without_writing() {
        let fx = Fixture::new();
        let event = fx.live_event(Some(1));
        let first = fx.user(Role::Student);
        let second = fx.user(Role::Student);

        committed(fx.db.set_rsvp(first, event.id, RsvpChoice::Going, true, Utc::now()).unwrap());

        let refused = fx.db.set_rsvp(second, event.id, RsvpChoice::Going, true, Utc::now()).unwrap();
        assert!(matches!(
            refused,
            RsvpOutcome::Refused(quad_policy::Error::CapacityExceeded { max_slots: 1 })
        ));
        assert!(fx.db.rsvp_states(second, &[event.id]).unwrap().is_empty());

        // Advisory mode lets the second attendee in
        let (_, counters) =
            committed(fx.db.set_rsvp(second, event.id, RsvpChoice::Going, false, Utc::now()).unwrap());
        assert_eq!(counters.going, 2);
    }

    #[test]
    fn rsvp_requires_a_live_event() {
        let fx = Fixture::new();
        let post = fx.post(
            quad_types::models::Visibility::Public,
            PostStatus::Published,
            Utc::now(),
        );
        fx.db.insert_post(&post, &[]).unwrap();
        let user = fx.user(Role::Student);

        // Announcements are not events
        assert!(matches!(
            fx.db.set_rsvp(user, post.id, RsvpChoice::Going, false, Utc::now()).unwrap(),
            RsvpOutcome::EventMissing
        ));

        let event = fx.live_event(None);
        fx.db
            .transition_post(
                event.id,
                PostStatus::Published,
                PostStatus::Hidden,
                event.origin,
                Utc::now(),
            )
            .unwrap();
        assert!(matches!(
            fx.db.set_rsvp(user, event.id, RsvpChoice::Going, false, Utc::now()).unwrap(),
            RsvpOutcome::NotLive { status: PostStatus::Hidden }
        ));
    }

    #[test]
    fn counters_match_ledger_after_random_sequences() {
        let fx = Fixture::new();
        let event = fx.live_event(None);
        let users: Vec<Uuid> = (0..8).map(|_| fx.user(Role::Student)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut expected: HashMap<Uuid, RsvpState> = HashMap::new();

        for _ in 0..300 {
            let user = users[rng.random_range(0..users.len())];
            let choice = match rng.random_range(0..3) {
                0 => RsvpChoice::Going,
                1 => RsvpChoice::Interested,
                _ => RsvpChoice::None,
            };

            let (state, counters) =
                committed(fx.db.set_rsvp(user, event.id, choice, false, Utc::now()).unwrap());

            match rsvp::resolve(expected.get(&user).copied(), choice) {
                Some(s) => expected.insert(user, s),
                None => expected.remove(&user),
            };
            assert_eq!(state, expected.get(&user).copied());

            let going = expected.values().filter(|s| **s == RsvpState::Going).count() as u32;
            let interested = expected.len() as u32 - going;
            assert_eq!(counters, EventCounters { going, interested });
        }

        let states = fx.db.rsvp_states(users[0], &[event.id]).unwrap();
        assert_eq!(states.get(&event.id).copied(), expected.get(&users[0]).copied());
    }

    #[test]
    fn concurrent_toggles_on_one_pair_settle_on_one_state() {
        let fx = Arc::new(Fixture::new());
        let event = fx.live_event(None);
        let user = fx.user(Role::Student);

        let handles: Vec<_> = [RsvpChoice::Going, RsvpChoice::Interested]
            .into_iter()
            .cycle()
            .take(16)
            .map(|choice| {
                let fx = fx.clone();
                std::thread::spawn(move || {
                    fx.db.set_rsvp(user, event.id, choice, false, Utc::now()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = fx.db.rsvp_states(user, &[event.id]).unwrap().get(&event.id).copied();
        let counters = fx.db.event_counters(&[event.id]).unwrap();
        let counters = counters.get(&event.id).copied().unwrap_or_default();
        let expected = match state {
            Some(RsvpState::Going) => EventCounters { going: 1, interested: 0 },
            Some(RsvpState::Interested) => EventCounters { going: 0, interested: 1 },
            None => EventCounters::default(),
        };
        assert_eq!(counters, expected);
    }

    #[test]
    fn concurrent_users_each_count_once() {
        let fx = Arc::new(Fixture::new());
        let event = fx.live_event(None);
        let users: Vec<Uuid> = (0..20).map(|_| fx.user(Role::Student)).collect();

        let handles: Vec<_> = users
            .iter()
            .copied()
            .map(|user| {
                let fx = fx.clone();
                std::thread::spawn(move || {
                    fx.db.set_rsvp(user, event.id, RsvpChoice::Going, false, Utc::now()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counters = fx.db.event_counters(&[event.id]).unwrap();
        assert_eq!(counters[&event.id], EventCounters { going: 20, interested: 0 });
    }
}
