//! irx-schemas
//!
//! Entity-type configuration shared by every irx crate:
//! - [`EntitySchema`]: unique key, excluded fields, structured fields
//! - [`FieldKind`]: how a single field is compared and persisted
//! - [`SchemaRegistry`]: immutable entity type -> schema map
//! - [`canonical_json`]: key-order independent JSON text
//!
//! Pure data and pure functions. No IO, no parsing of config files (see `irx-config`).

mod canonical;
mod registry;
mod schema;

pub use canonical::canonical_json;
pub use registry::{is_valid_entity_type, SchemaRegistry};
pub use schema::{EntitySchema, FieldKind, SchemaError};
