pub mod resource;
pub mod unit;

pub use resource::{ARCHIVE_SUFFIX, EntryMetadata, EntryOrigin, ResourceEntry, ResourceType, UNIT_SUFFIX};
pub use unit::{ClassKind, Unit, UnitOrigin, UnitRef, UnitShape};
