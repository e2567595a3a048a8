// Schema layer: SID files, the type catalog, and the merged SID index.

pub mod catalog;
pub mod index;
pub mod path;
pub mod sid_file;

pub use catalog::{BitTable, Catalog, EnumTable, TypeDescriptor};
pub use index::{PathEntry, SchemaIndex, SchemaIndexBuilder};
pub use sid_file::{Namespace, SidFile, SidItem};
