use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use common::{Direction, Position, PositionState, Signal, WatchKey};

/// A lifecycle transition produced by one fresh price read.
///
/// TP events carry the price that touched the level; a stop-out carries the
/// stop level itself, which is what the alert reports.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Tp1Reached { key: WatchKey, price: f64 },
    Tp2Reached { key: WatchKey, price: f64 },
    Stopped { key: WatchKey, stop_price: f64 },
}

/// Live positions of one subscriber session, at most one per key.
///
/// A position is created from a fresh signal, flips Open -> Partial on the
/// first target, and is removed on the second target or the stop. Fully
/// exited positions are not retained.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: HashMap<WatchKey, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self, key: &WatchKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn get(&self, key: &WatchKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Keys with a live (Open or Partial) position, in stable order.
    pub fn live_keys(&self) -> Vec<WatchKey> {
        let mut keys: Vec<WatchKey> = self.positions.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn positions(&self) -> Vec<Position> {
        let mut all: Vec<Position> = self.positions.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Record a new position from a signal.
    ///
    /// Panics if a live position already exists for the key: the scheduler
    /// guards this, so a duplicate indicates a bug that must surface rather
    /// than silently double-track.
    pub fn open(&mut self, key: WatchKey, signal: &Signal) -> &Position {
        assert!(
            !self.positions.contains_key(&key),
            "live position already tracked for {key}"
        );
        info!(key = %key, direction = %signal.direction, entry = signal.entry_price, "position opened");
        self.positions.entry(key.clone()).or_insert(Position {
            key,
            direction: signal.direction,
            entry_price: signal.entry_price,
            stop_price: signal.stop_price,
            tp1_price: signal.tp1_price,
            tp2_price: signal.tp2_price,
            state: PositionState::Open,
            opened_at: Utc::now(),
        })
    }

    /// Feed one fresh price read to the position for `key`, if any.
    ///
    /// At most one transition fires per read. The stop is checked before
    /// either target: a read that satisfies both closes via the stop.
    pub fn apply_price(&mut self, key: &WatchKey, last: f64) -> Option<PositionEvent> {
        let position = self.positions.get_mut(key)?;

        let stop_hit = match position.direction {
            Direction::Long => last <= position.stop_price,
            Direction::Short => last >= position.stop_price,
        };
        if stop_hit {
            let stop_price = position.stop_price;
            info!(key = %key, price = last, stop = stop_price, "position stopped out");
            self.positions.remove(key);
            return Some(PositionEvent::Stopped {
                key: key.clone(),
                stop_price,
            });
        }

        let tp2_hit = match position.direction {
            Direction::Long => last >= position.tp2_price,
            Direction::Short => last <= position.tp2_price,
        };
        if tp2_hit {
            info!(key = %key, price = last, "second target reached, position closed");
            self.positions.remove(key);
            return Some(PositionEvent::Tp2Reached {
                key: key.clone(),
                price: last,
            });
        }

        if position.state == PositionState::Open {
            let tp1_hit = match position.direction {
                Direction::Long => last >= position.tp1_price,
                Direction::Short => last <= position.tp1_price,
            };
            if tp1_hit {
                info!(key = %key, price = last, "first target reached, running remainder");
                position.state = PositionState::Partial;
                return Some(PositionEvent::Tp1Reached {
                    key: key.clone(),
                    price: last,
                });
            }
        }

        None
    }
}
