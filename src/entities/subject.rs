// 👤 Subject Entity - a person record reconciled by the importer
//
// "The store assigns identity; the import file only supplies values."
//
// Row columns never become attributes dynamically: every writable column maps
// onto a named field here, and names the record does not know are ignored.

use crate::error::{ImportError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication method served by the store's domain "create user" path.
pub const DEFAULT_AUTH: &str = "manual";

/// Columns the importer must never write, whatever the source carries.
pub const PROTECTED_FIELDS: [&str; 4] = ["id", "host_id", "created_at", "modified_at"];

// ============================================================================
// SUBJECT ENTITY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    // ========================================================================
    // IDENTITY (assigned by the store)
    // ========================================================================
    /// None until the record has been persisted
    pub id: Option<i64>,

    /// Host the record belongs to (local host for imported subjects)
    pub host_id: i64,

    // ========================================================================
    // WRITABLE ATTRIBUTES
    // ========================================================================
    pub auth: String,
    pub confirmed: bool,
    pub username: String,
    pub password: String,
    pub idnumber: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub institution: String,
    pub department: String,
    pub city: String,
    pub country: String,
    pub lang: String,
    pub timezone: String,
    pub description: String,
    pub suspended: bool,

    // ========================================================================
    // TIMESTAMPS
    // ========================================================================
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Subject {
    /// Fresh, unsaved subject: confirmed, stamped with `now`.
    pub fn new_unsaved(host_id: i64, now: DateTime<Utc>) -> Self {
        Subject {
            host_id,
            confirmed: true,
            created_at: Some(now),
            modified_at: Some(now),
            ..Default::default()
        }
    }

    /// Merge one projected value into the record.
    ///
    /// Returns `Ok(false)` for names the record does not model.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<bool> {
        let slot = match name {
            "auth" => &mut self.auth,
            "username" => &mut self.username,
            "password" => &mut self.password,
            "idnumber" => &mut self.idnumber,
            "firstname" => &mut self.firstname,
            "lastname" => &mut self.lastname,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "institution" => &mut self.institution,
            "department" => &mut self.department,
            "city" => &mut self.city,
            "country" => &mut self.country,
            "lang" => &mut self.lang,
            "timezone" => &mut self.timezone,
            "description" => &mut self.description,
            "confirmed" => {
                self.confirmed = parse_flag(name, value)?;
                return Ok(true);
            }
            "suspended" => {
                self.suspended = parse_flag(name, value)?;
                return Ok(true);
            }
            _ => return Ok(false),
        };

        *slot = value.to_string();
        Ok(true)
    }

    /// Read a field by its column name (used for matching-key lookups).
    pub fn attribute(&self, name: &str) -> Option<String> {
        let value = match name {
            "id" => return self.id.map(|id| id.to_string()),
            "host_id" => return Some(self.host_id.to_string()),
            "auth" => &self.auth,
            "username" => &self.username,
            "password" => &self.password,
            "idnumber" => &self.idnumber,
            "firstname" => &self.firstname,
            "lastname" => &self.lastname,
            "email" => &self.email,
            "phone" => &self.phone,
            "institution" => &self.institution,
            "department" => &self.department,
            "city" => &self.city,
            "country" => &self.country,
            "lang" => &self.lang,
            "timezone" => &self.timezone,
            "description" => &self.description,
            "confirmed" => return Some(flag_str(self.confirmed).to_string()),
            "suspended" => return Some(flag_str(self.suspended).to_string()),
            _ => return None,
        };

        Some(value.clone())
    }

    /// True when no explicit (non-default) authentication method is set.
    pub fn uses_default_auth(&self) -> bool {
        self.auth.is_empty() || self.auth == DEFAULT_AUTH
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ImportError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn flag_str(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}

// ============================================================================
// TESTS
// ============================================================================
