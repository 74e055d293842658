//! Per-match analysis payload from the analysis service.
//!
//! Every field is optional on the wire; a missing datum is simply absent
//! from the aggregates rather than failing the match.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Analysis of one match: one record per player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(default, alias = "player", deserialize_with = "skip_null_entries")]
    pub players: Vec<PlayerAnalysis>,
}

/// One player's timeline within a match analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnalysis {
    #[serde(default, alias = "profile_id")]
    pub profile_id: Option<i64>,

    #[serde(default, alias = "civ", alias = "civName", alias = "civ_name")]
    pub civilization: Option<String>,

    /// Effective actions per minute
    #[serde(default)]
    pub eapm: Option<f64>,

    #[serde(default, alias = "prefer_random")]
    pub prefer_random: Option<bool>,

    /// Opening label; only one of the analysis formats carries it
    #[serde(default, alias = "strategy")]
    pub opening: Option<String>,

    #[serde(default, deserialize_with = "deserialize_uptimes")]
    pub uptimes: Vec<Uptime>,

    /// Completed researches and units, in completion order
    #[serde(
        default,
        alias = "queued",
        alias = "techs",
        deserialize_with = "skip_null_entries"
    )]
    pub queue: Vec<QueuedItem>,

    #[serde(
        default,
        alias = "market_transactions",
        alias = "marketTransactions",
        deserialize_with = "skip_null_entries"
    )]
    pub market: Vec<MarketTransaction>,
}

/// An age advance reported by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uptime {
    #[serde(default, alias = "name", deserialize_with = "null_as_default")]
    pub age: String,

    #[serde(default, alias = "time")]
    pub timestamp: Option<String>,
}

/// A completed research or unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedItem {
    #[serde(default, alias = "name", deserialize_with = "null_as_default")]
    pub unit: String,

    #[serde(default, alias = "time")]
    pub timestamp: Option<String>,
}

/// A market buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTransaction {
    /// `"buy"` or `"sell"`; anything else is ignored during aggregation
    #[serde(default, rename = "type", alias = "action", deserialize_with = "null_as_default")]
    pub kind: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub resource: String,

    /// Transactions without an amount are left out of the market averages
    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default, alias = "time")]
    pub timestamp: Option<String>,
}

/// Direction of a market transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketAction {
    Buy,
    Sell,
}

impl MarketAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "buy" => Some(MarketAction::Buy),
            "sell" => Some(MarketAction::Sell),
            _ => None,
        }
    }
}

/// Accept uptimes either as a list of `{age, timestamp}` records or as an
/// object keyed by age name.
fn deserialize_uptimes<'de, D>(deserializer: D) -> Result<Vec<Uptime>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<Option<Uptime>>),
        Map(IndexMap<String, Option<String>>),
    }

    let maybe: Option<Repr> = Option::deserialize(deserializer)?;
    Ok(match maybe {
        Some(Repr::List(list)) => list.into_iter().flatten().collect(),
        Some(Repr::Map(map)) => map
            .into_iter()
            .map(|(age, timestamp)| Uptime { age, timestamp })
            .collect(),
        None => Vec::new(),
    })
}

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A list that may itself be `null` or contain `null` entries.
fn skip_null_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let maybe: Option<Vec<Option<T>>> = Option::deserialize(deserializer)?;
    Ok(maybe.into_iter().flatten().flatten().collect())
}
