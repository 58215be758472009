use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Stored collection a member record lives in.
///
/// A member classified as `Both` has one record in `ChannelPartner` and one in
/// `Customer`. `LegacyUser` holds records from before the split and is only
/// read (and migrated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    ChannelPartner,
    Customer,
    #[serde(rename = "User")]
    LegacyUser,
}

impl Collection {
    pub const CURRENT: [Collection; 2] = [Collection::ChannelPartner, Collection::Customer];
    pub const ALL: [Collection; 3] = [
        Collection::ChannelPartner,
        Collection::Customer,
        Collection::LegacyUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ChannelPartner => "ChannelPartner",
            Collection::Customer => "Customer",
            Collection::LegacyUser => "User",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ChannelPartner" => Some(Collection::ChannelPartner),
            "Customer" => Some(Collection::Customer),
            "User" => Some(Collection::LegacyUser),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start of the current UTC day.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// First instant of the current UTC month.
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::Datelike;
    now.date_naive()
        .with_day(1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}
