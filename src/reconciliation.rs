// ⚖️ Reconciliation Engine - match incoming rows against stored entities
//
// subject    : upsert by the caller's matching field
// group      : look up or create by name (never updated)
// membership : idempotent subject <-> group link

pub mod subject;
pub mod group;
pub mod membership;

pub use subject::{PersistPath, SubjectOutcome, SubjectReconciler};
pub use group::{
    GroupOutcome, GroupReconciler, GROUP_CATEGORY_COLUMN, GROUP_DESCRIPTION_COLUMN,
    GROUP_IDNUMBER_COLUMN, GROUP_NAME_COLUMN,
};
pub use membership::{MembershipLinker, MembershipOutcome};
