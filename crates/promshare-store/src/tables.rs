//! redb table definitions for [`RedbStore`](crate::RedbStore).
//!
//! Keys are the full storage keys built by the registry's label codec, so a
//! registry's records share a common string prefix and can be scanned or
//! wiped by prefix.

use redb::TableDefinition;

/// Numeric sample values keyed by storage key.
pub const SAMPLES: TableDefinition<&str, f64> = TableDefinition::new("samples");

/// JSON schema documents keyed by metadata key.
pub const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
