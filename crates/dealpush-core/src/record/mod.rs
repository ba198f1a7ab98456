//! Records to upsert.
//!
//! The dispatcher only cares about the identifier (upsert key) and the display
//! name (logging). Every other field is carried through untouched as part of
//! the JSON payload.

mod identity;
mod load;

pub use identity::{assign_missing_ids, derive_id, duplicate_ids};
pub use load::{load_records, parse_records};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of work: serialized as a flat JSON object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Upsert key. `0` means "not assigned yet".
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Stock-keeping code, preferred over `name` when deriving an id.
    #[serde(default, skip_serializing_if = "sku_is_blank")]
    pub sku: Option<String>,
    /// All other fields, opaque to the dispatcher.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

fn sku_is_blank(sku: &Option<String>) -> bool {
    sku.as_deref().map_or(true, str::is_empty)
}

impl Record {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sku: None,
            payload: Map::new(),
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}
