// 🗃️ Record Store - the persistence collaborator the importer drives
//
// The importer never talks SQL. It goes through this trait, so the batch
// logic can be exercised against any backend that keeps these contracts.

use crate::entities::{Category, Group, NewGroup, Subject};
use crate::error::Result;
use crate::password::PasswordPolicy;
use std::collections::BTreeSet;

/// Subject columns the importer is allowed to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritableFields {
    fields: BTreeSet<String>,
}

impl WritableFields {
    /// Everything in `columns` except the protected system fields.
    pub fn from_columns<I, S>(columns: I, protected: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = columns
            .into_iter()
            .map(Into::<String>::into)
            .filter(|c| !protected.contains(&c.as_str()))
            .collect();

        WritableFields { fields }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub trait RecordStore {
    /// Subject schema minus protected fields.
    fn writable_subject_fields(&self) -> Result<WritableFields>;

    /// Whether `field` is a column the store can match subjects on.
    fn is_subject_column(&self, field: &str) -> Result<bool>;

    fn find_subject(&self, field: &str, value: &str) -> Result<Option<Subject>>;

    fn subject_by_id(&self, id: i64) -> Result<Option<Subject>>;

    /// Generic insert; values are stored exactly as given.
    fn create_subject(&self, subject: &Subject) -> Result<i64>;

    /// Domain create: applies auth defaults and password rules.
    fn create_user(&self, subject: &Subject, policy: &PasswordPolicy) -> Result<i64>;

    /// Generic update of every writable column.
    fn update_subject(&self, subject: &Subject) -> Result<()>;

    /// Domain update: hashes a newly supplied password.
    fn update_user(&self, subject: &Subject, policy: &PasswordPolicy) -> Result<()>;

    fn find_group(&self, name: &str) -> Result<Option<Group>>;

    fn create_group(&self, group: &NewGroup) -> Result<i64>;

    fn find_category(&self, id: i64) -> Result<Option<Category>>;

    /// Returns false when the link already existed.
    fn add_membership(&self, group_id: i64, subject_id: i64) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PROTECTED_FIELDS;

    #[test]
    fn test_writable_fields_drop_protected() {
        let writable = WritableFields::from_columns(
            ["id", "host_id", "username", "email", "created_at", "modified_at"],
            &PROTECTED_FIELDS,
        );

        assert_eq!(writable.len(), 2);
        assert!(writable.contains("username"));
        assert!(writable.contains("email"));
        assert!(!writable.contains("id"));
        assert!(!writable.contains("created_at"));

        let fields: Vec<&str> = writable.iter().collect();
        assert_eq!(fields, vec!["email", "username"]);
    }
}
