//! Domain Models
//!
//! Workflow instances, notifications, and the principal/profile projections
//! the engine works with. Timestamps are stored as BSON dates.

pub mod workflow;
pub mod notification;
pub mod principal;

pub use workflow::*;
pub use notification::*;
pub use principal::*;

/// Serde adapter for `Option<DateTime<Utc>>` stored as a BSON date
pub(crate) mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|d| d.to_chrono()))
    }
}
