// 👥 Group Reconciler
//
// Groups are matched by exact name. Existing groups are returned untouched,
// even when the row's other group columns disagree with the stored values.

use crate::entities::{parse_category_id, Group, NewGroup};
use crate::error::Result;
use crate::reader::Row;
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const GROUP_NAME_COLUMN: &str = "cohort-name";
pub const GROUP_IDNUMBER_COLUMN: &str = "cohort-idnumber";
pub const GROUP_DESCRIPTION_COLUMN: &str = "cohort-description";
pub const GROUP_CATEGORY_COLUMN: &str = "cohort-category";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOutcome {
    Created,
    Existing,
}

pub struct GroupReconciler<'s, S: RecordStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: RecordStore + ?Sized> GroupReconciler<'s, S> {
    pub fn new(store: &'s S) -> Self {
        GroupReconciler { store }
    }

    /// Group name carried by `row`, if any.
    pub fn group_name(row: &Row) -> Option<&str> {
        row.non_empty(GROUP_NAME_COLUMN)
    }

    /// Resolve the row's group; `None` when the row names no group.
    pub fn resolve(&self, row: &Row) -> Result<Option<(Group, GroupOutcome)>> {
        let Some(name) = Self::group_name(row) else {
            return Ok(None);
        };

        if let Some(group) = self.store.find_group(name)? {
            return Ok(Some((group, GroupOutcome::Existing)));
        }

        let mut new_group = NewGroup::named(name);
        if let Some(idnumber) = row.get(GROUP_IDNUMBER_COLUMN) {
            new_group = new_group.with_idnumber(idnumber);
        }
        if let Some(description) = row.get(GROUP_DESCRIPTION_COLUMN) {
            new_group = new_group.with_description(description);
        }
        if let Some(context_id) = self.category_context(row)? {
            new_group = new_group.in_context(context_id);
        }

        let id = self.store.create_group(&new_group)?;
        debug!("Group {} with name {} created", id, name);

        Ok(Some((new_group.into_group(id), GroupOutcome::Created)))
    }

    /// Context of the row's category; unresolvable categories fall back to
    /// the default context.
    fn category_context(&self, row: &Row) -> Result<Option<i64>> {
        let Some(raw) = row.non_empty(GROUP_CATEGORY_COLUMN) else {
            return Ok(None);
        };

        let category = match parse_category_id(raw) {
            Some(id) => self.store.find_category(id)?,
            None => None,
        };

        match category {
            Some(category) => Ok(Some(category.context_id)),
            None => {
                warn!(
                    "line {}: category {:?} not found, using default context",
                    row.line(),
                    raw
                );
                Ok(None)
            }
        }
    }
}
