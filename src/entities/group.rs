// 👥 Group Entity - named collection of subjects
//
// The group name is the only natural key. The external id falls back to the
// name when the source leaves it out.

use serde::{Deserialize, Serialize};

/// Context every group lands in unless a category supplies its own.
pub const SYSTEM_CONTEXT_ID: i64 = 1;

pub const DESCRIPTION_FORMAT_HTML: &str = "html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub idnumber: String,
    pub description: String,
    pub description_format: String,
    pub context_id: i64,
}

/// Group values before the store has assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub idnumber: String,
    pub description: String,
    pub description_format: String,
    pub context_id: i64,
}

impl NewGroup {
    /// Defaults: idnumber = name, empty description, system context.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        NewGroup {
            idnumber: name.clone(),
            name,
            description: String::new(),
            description_format: DESCRIPTION_FORMAT_HTML.to_string(),
            context_id: SYSTEM_CONTEXT_ID,
        }
    }

    pub fn with_idnumber(mut self, idnumber: impl Into<String>) -> Self {
        self.idnumber = idnumber.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_context(mut self, context_id: i64) -> Self {
        self.context_id = context_id;
        self
    }

    pub fn into_group(self, id: i64) -> Group {
        Group {
            id,
            name: self.name,
            idnumber: self.idnumber,
            description: self.description,
            description_format: self.description_format,
            context_id: self.context_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_group_defaults() {
        let group = NewGroup::named("Class of 2026");

        assert_eq!(group.idnumber, "Class of 2026");
        assert_eq!(group.description, "");
        assert_eq!(group.description_format, "html");
        assert_eq!(group.context_id, SYSTEM_CONTEXT_ID);
    }

    #[test]
    fn test_builders_and_into_group() {
        let group = NewGroup::named("A")
            .with_idnumber("grp-a")
            .with_description("First cohort")
            .in_context(9)
            .into_group(3);

        assert_eq!(group.id, 3);
        assert_eq!(group.name, "A");
        assert_eq!(group.idnumber, "grp-a");
        assert_eq!(group.description, "First cohort");
        assert_eq!(group.context_id, 9);
    }
}
