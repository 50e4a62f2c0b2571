// 👤 Subject Reconciler
//
// One row in, one subject out. Exactly one create or update reaches the store
// per call, and only through the path PersistPath selects.

use crate::entities::Subject;
use crate::error::{ImportError, Result};
use crate::password::PasswordPolicy;
use crate::projection::FieldProjector;
use crate::reader::Row;
use crate::store::RecordStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectOutcome {
    Created,
    Updated,
    /// Matched, but updates were not requested
    Unchanged,
}

// ============================================================================
// PERSISTENCE STRATEGY
// ============================================================================

/// Which store path a subject write goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistPath {
    /// Store values verbatim (explicit, non-default authentication)
    Generic,
    /// Domain user path: auth defaults, password generation and hashing
    UserDomain,
}

impl PersistPath {
    pub fn for_subject(subject: &Subject) -> Self {
        if subject.uses_default_auth() {
            PersistPath::UserDomain
        } else {
            PersistPath::Generic
        }
    }

    pub fn create<S>(self, store: &S, subject: &Subject, policy: &PasswordPolicy) -> Result<i64>
    where
        S: RecordStore + ?Sized,
    {
        match self {
            PersistPath::Generic => store.create_subject(subject),
            PersistPath::UserDomain => store.create_user(subject, policy),
        }
    }

    pub fn update<S>(self, store: &S, subject: &Subject, policy: &PasswordPolicy) -> Result<()>
    where
        S: RecordStore + ?Sized,
    {
        match self {
            PersistPath::Generic => store.update_subject(subject),
            PersistPath::UserDomain => store.update_user(subject, policy),
        }
    }
}

// ============================================================================
// SUBJECT RECONCILER
// ============================================================================

pub struct SubjectReconciler<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    projector: FieldProjector,
    matching_field: String,
    update_existing: bool,
    host_id: i64,
    password_policy: PasswordPolicy,
}

impl<'s, S: RecordStore + ?Sized> SubjectReconciler<'s, S> {
    pub fn new(
        store: &'s S,
        projector: FieldProjector,
        matching_field: impl Into<String>,
        update_existing: bool,
    ) -> Self {
        SubjectReconciler {
            store,
            projector,
            matching_field: matching_field.into(),
            update_existing,
            host_id: 1,
            password_policy: PasswordPolicy::relaxed(),
        }
    }

    /// Builder: host new subjects are attached to
    pub fn with_host_id(mut self, host_id: i64) -> Self {
        self.host_id = host_id;
        self
    }

    /// Builder: policy handed to the domain user path
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    pub fn upsert(&self, row: &Row) -> Result<(Subject, SubjectOutcome)> {
        let matching_value =
            row.get(&self.matching_field)
                .ok_or_else(|| ImportError::IncompleteRow {
                    line: row.line(),
                    column: self.matching_field.clone(),
                })?;

        let projection = self.projector.project(row);
        let existing = self.store.find_subject(&self.matching_field, matching_value)?;

        match existing {
            None => {
                let mut subject = Subject::new_unsaved(self.host_id, Utc::now());
                self.projector.apply(&projection, &mut subject)?;

                let id = PersistPath::for_subject(&subject).create(
                    self.store,
                    &subject,
                    &self.password_policy,
                )?;
                debug!("Subject {} with email {} created", id, subject.email);

                let stored = self.reload(id)?;
                Ok((stored, SubjectOutcome::Created))
            }
            Some(subject) if !self.update_existing => Ok((subject, SubjectOutcome::Unchanged)),
            Some(mut subject) => {
                let id = subject.id.ok_or_else(|| {
                    ImportError::rejected("subject", "matched subject has no id")
                })?;
                subject.modified_at = Some(Utc::now());
                self.projector.apply(&projection, &mut subject)?;

                PersistPath::for_subject(&subject).update(
                    self.store,
                    &subject,
                    &self.password_policy,
                )?;
                debug!("Subject {} with email {} updated", id, subject.email);

                let stored = self.reload(id)?;
                Ok((stored, SubjectOutcome::Updated))
            }
        }
    }

    fn reload(&self, id: i64) -> Result<Subject> {
        self.store.subject_by_id(id)?.ok_or_else(|| {
            ImportError::rejected("subject", format!("subject {} vanished after write", id))
        })
    }
}
