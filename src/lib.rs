// Roster Import - Core Library
// CSV subjects + group memberships reconciled against a record store

pub mod error;
pub mod config;
pub mod password;
pub mod reader;
pub mod projection;
pub mod entities;
pub mod store;
pub mod db;
pub mod reconciliation;
pub mod batch;

// Re-export commonly used types
pub use error::{HeaderError, ImportError, Result};
pub use config::ImportConfig;
pub use password::PasswordPolicy;
pub use reader::{CsvRowReader, HeaderSpec, Row, REQUIRED_COLUMNS};
pub use projection::{FieldProjector, Projection};
pub use entities::{Category, Group, NewGroup, Subject};
pub use store::{RecordStore, WritableFields};
pub use db::{setup_database, Event, SqliteStore};
pub use reconciliation::{
    GroupOutcome, GroupReconciler, MembershipLinker, MembershipOutcome, PersistPath,
    SubjectOutcome, SubjectReconciler,
};
pub use batch::{
    Admission, BatchPhase, BatchRunner, BatchSummary, RowFailure, RowFailurePolicy, Window,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
