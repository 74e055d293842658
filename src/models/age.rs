//! Ages a player advances through, and per-age containers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An age a player can advance to after the Dark Age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Age {
    Feudal,
    Castle,
    Imperial,
}

impl Age {
    /// All tracked ages in advancement order.
    pub const ALL: [Age; 3] = [Age::Feudal, Age::Castle, Age::Imperial];

    pub fn as_str(&self) -> &'static str {
        match self {
            Age::Feudal => "feudal",
            Age::Castle => "castle",
            Age::Imperial => "imperial",
        }
    }

    /// Ages that come after this one, nearest first.
    pub fn later(self) -> impl Iterator<Item = Age> {
        Age::ALL.into_iter().filter(move |a| *a > self)
    }

    /// Resolve an uptime key such as `"feudal_age"`, `"Castle Age"` or `"imperial"`.
    pub fn from_key(raw: &str) -> Option<Age> {
        match normalize_age_key(raw).as_str() {
            "feudal" => Some(Age::Feudal),
            "castle" => Some(Age::Castle),
            "imperial" => Some(Age::Imperial),
            _ => None,
        }
    }

    /// Resolve a queued research name that advances the age (`"Imperial Age"`).
    ///
    /// Unlike [`Age::from_key`], the "age" suffix is required so that a
    /// building named "Castle" is not mistaken for the age advance.
    pub fn from_advance_name(raw: &str) -> Option<Age> {
        let lower = raw.trim().to_lowercase();
        if !lower.ends_with("age") {
            return None;
        }
        Age::from_key(&lower)
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lower-case an age key and strip an `age` / `_age` / ` age` suffix.
pub fn normalize_age_key(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.strip_suffix("age") {
        Some(stem) => stem.trim_end_matches(['_', ' ', '-']).to_string(),
        None => lower,
    }
}

/// One value per tracked age.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerAge<T> {
    pub feudal: T,
    pub castle: T,
    pub imperial: T,
}

impl<T> PerAge<T> {
    pub fn get(&self, age: Age) -> &T {
        match age {
            Age::Feudal => &self.feudal,
            Age::Castle => &self.castle,
            Age::Imperial => &self.imperial,
        }
    }

    pub fn get_mut(&mut self, age: Age) -> &mut T {
        match age {
            Age::Feudal => &mut self.feudal,
            Age::Castle => &mut self.castle,
            Age::Imperial => &mut self.imperial,
        }
    }

    /// Build a value for each age.
    pub fn from_fn(mut f: impl FnMut(Age) -> T) -> Self {
        Self {
            feudal: f(Age::Feudal),
            castle: f(Age::Castle),
            imperial: f(Age::Imperial),
        }
    }
}

impl PerAge<Option<u32>> {
    /// Age whose interval `[age_up, next_recorded_age_up)` contains `time`.
    pub fn age_containing(&self, time: u32) -> Option<Age> {
        Age::ALL.into_iter().rev().find(|age| match self.get(*age) {
            Some(start) => {
                time >= *start
                    && self
                        .next_recorded_after(*age)
                        .map_or(true, |end| time < end)
            }
            None => false,
        })
    }

    /// Up-time of the nearest later age that was actually reached.
    pub fn next_recorded_after(&self, age: Age) -> Option<u32> {
        age.later().find_map(|later| *self.get(later))
    }
}
