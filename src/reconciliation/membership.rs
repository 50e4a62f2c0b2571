// 🔗 Membership Linker
//
// Linking is idempotent: a repeated link is not an error and is reported as
// AlreadyPresent.

use crate::error::Result;
use crate::store::RecordStore;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOutcome {
    Added,
    AlreadyPresent,
}

pub struct MembershipLinker<'s, S: RecordStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: RecordStore + ?Sized> MembershipLinker<'s, S> {
    pub fn new(store: &'s S) -> Self {
        MembershipLinker { store }
    }

    pub fn ensure(&self, subject_id: i64, group_id: i64) -> Result<MembershipOutcome> {
        if self.store.add_membership(group_id, subject_id)? {
            debug!("Subject {} added to group {}", subject_id, group_id);
            Ok(MembershipOutcome::Added)
        } else {
            Ok(MembershipOutcome::AlreadyPresent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::{NewGroup, Subject};
    use crate::error::ImportError;
    use chrono::Utc;

    #[test]
    fn test_ensure_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut subject = Subject::new_unsaved(1, Utc::now());
        subject.username = "alee".to_string();
        let subject_id = store.create_subject(&subject).unwrap();
        let group_id = store.create_group(&NewGroup::named("Class A")).unwrap();

        let linker = MembershipLinker::new(&store);

        assert_eq!(linker.ensure(subject_id, group_id).unwrap(), MembershipOutcome::Added);
        assert_eq!(
            linker.ensure(subject_id, group_id).unwrap(),
            MembershipOutcome::AlreadyPresent
        );
        assert_eq!(store.group_member_ids(group_id).unwrap(), vec![subject_id]);
    }

    #[test]
    fn test_ensure_rejects_unknown_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let linker = MembershipLinker::new(&store);

        let err = linker.ensure(41, 42).unwrap_err();
        assert!(matches!(
            err,
            ImportError::StoreWriteRejected { entity: "membership", .. }
        ));
    }
}
