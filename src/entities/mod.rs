// Entity Models
//
// Each entity has:
// - Identity assigned by the store (never by the import file)
// - Values that the importer may set on creation
// - For subjects only: values the importer may overwrite on update

pub mod subject;
pub mod group;
pub mod category;

pub use subject::{Subject, DEFAULT_AUTH, PROTECTED_FIELDS};
pub use group::{Group, NewGroup, DESCRIPTION_FORMAT_HTML, SYSTEM_CONTEXT_ID};
pub use category::{Category, parse_category_id};
