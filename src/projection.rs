// 🔍 Field Projection
//
// A row shares its columns between the subject and its group linkage
// (`cohort-*`). Only columns the subject schema can accept are projected.

use crate::entities::Subject;
use crate::error::Result;
use crate::reader::Row;
use crate::store::WritableFields;
use std::collections::BTreeMap;
use tracing::debug;

/// Writable attribute -> raw value, for one row.
pub type Projection = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct FieldProjector {
    writable: WritableFields,
}

impl FieldProjector {
    pub fn new(writable: WritableFields) -> Self {
        FieldProjector { writable }
    }

    pub fn writable(&self) -> &WritableFields {
        &self.writable
    }

    /// Keep only row columns that are also writable subject fields.
    pub fn project(&self, row: &Row) -> Projection {
        row.iter()
            .filter(|(column, _)| self.writable.contains(column))
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect()
    }

    /// Merge a projection into `subject`; the whole projection applies or the
    /// call fails before `subject` is touched.
    pub fn apply(&self, projection: &Projection, subject: &mut Subject) -> Result<()> {
        let mut merged = subject.clone();

        for (field, value) in projection {
            if !merged.set_attribute(field, value)? {
                debug!("Ignoring column {} with no subject attribute", field);
            }
        }

        *subject = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PROTECTED_FIELDS;
    use crate::error::ImportError;
    use crate::reader::CsvRowReader;

    fn projector() -> FieldProjector {
        FieldProjector::new(WritableFields::from_columns(
            [
                "id", "host_id", "username", "email", "firstname", "lastname", "idnumber",
                "suspended", "created_at", "modified_at",
            ],
            &PROTECTED_FIELDS,
        ))
    }

    fn first_row(data: &str) -> Row {
        CsvRowReader::from_reader(data.as_bytes(), b',')
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_project_drops_unknown_and_protected_columns() {
        let row = first_row(
            "id,idnumber,username,email,cohort-name,created_at,shoe_size\n\
             9,001,alee,ann@x.com,Class A,yesterday,42\n",
        );

        let projection = projector().project(&row);
        let keys: Vec<&str> = projection.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["email", "idnumber", "username"]);
        assert_eq!(projection["idnumber"], "001");
    }

    #[test]
    fn test_project_skips_absent_columns() {
        let row = first_row("username,email,firstname\nalee\n");
        let projection = projector().project(&row);

        assert_eq!(projection.len(), 1);
        assert!(!projection.contains_key("email"));
    }

    #[test]
    fn test_apply_leaves_unprojected_fields_alone() {
        let mut subject = Subject::default();
        subject.city = "Perth".to_string();
        subject.email = "old@x.com".to_string();

        let mut projection = Projection::new();
        projection.insert("email".to_string(), "new@x.com".to_string());

        projector().apply(&projection, &mut subject).unwrap();

        assert_eq!(subject.email, "new@x.com");
        assert_eq!(subject.city, "Perth");
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut subject = Subject::default();
        subject.email = "old@x.com".to_string();

        let mut projection = Projection::new();
        projection.insert("email".to_string(), "new@x.com".to_string());
        projection.insert("suspended".to_string(), "sometimes".to_string());

        let err = projector().apply(&projection, &mut subject).unwrap_err();

        assert!(matches!(err, ImportError::InvalidValue { .. }));
        assert_eq!(subject.email, "old@x.com");
    }
}
