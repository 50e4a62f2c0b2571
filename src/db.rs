// 🗄️ SQLite Record Store
//
// Backs the RecordStore trait with rusqlite. Every write that changes an
// entity appends an audit Event inside the same SQLite transaction.

use crate::entities::{
    Category, Group, NewGroup, Subject, DEFAULT_AUTH, PROTECTED_FIELDS, SYSTEM_CONTEXT_ID,
};
use crate::error::{ImportError, Result};
use crate::password::{self, PasswordPolicy};
use crate::store::{RecordStore, WritableFields};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const ACTOR: &str = "csv_importer";

const SUBJECT_COLUMNS: &str = "id, host_id, auth, confirmed, username, password, idnumber, \
     firstname, lastname, email, phone, institution, department, city, country, lang, \
     timezone, description, suspended, created_at, modified_at";

const GROUP_COLUMNS: &str =
    "id, name, idnumber, description, description_format, context_id";

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" instead
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Contexts (system context is seeded with id 1)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contexts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            level TEXT NOT NULL,
            instance_id INTEGER NOT NULL,
            UNIQUE (level, instance_id)
        )",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO contexts (id, level, instance_id) VALUES (?1, 'system', 0)",
        params![SYSTEM_CONTEXT_ID],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Subjects
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER NOT NULL,
            auth TEXT NOT NULL DEFAULT 'manual',
            confirmed INTEGER NOT NULL DEFAULT 0,
            username TEXT NOT NULL UNIQUE CHECK (username <> ''),
            password TEXT NOT NULL DEFAULT '',
            idnumber TEXT NOT NULL DEFAULT '',
            firstname TEXT NOT NULL,
            lastname TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            institution TEXT NOT NULL DEFAULT '',
            department TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            lang TEXT NOT NULL DEFAULT '',
            timezone TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            suspended INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            modified_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Groups + memberships ("groups" is an SQL keyword)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            idnumber TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            description_format TEXT NOT NULL DEFAULT 'html',
            context_id INTEGER NOT NULL REFERENCES contexts(id),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS group_members (
            group_id INTEGER NOT NULL REFERENCES subject_groups(id),
            subject_id INTEGER NOT NULL REFERENCES subjects(id),
            added_at TEXT NOT NULL,
            PRIMARY KEY (group_id, subject_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_idnumber ON subjects(idnumber)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_email ON subjects(email)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
    subject_columns: Vec<String>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn new(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        let subject_columns = table_columns(&conn, "subjects")?;

        Ok(SqliteStore {
            conn,
            subject_columns,
        })
    }

    /// Register a category together with its own context.
    pub fn create_category(&self, name: &str) -> Result<Category> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO categories (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )
        .map_err(write_err("category"))?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO contexts (level, instance_id) VALUES ('category', ?1)",
            params![id],
        )
        .map_err(write_err("context"))?;
        let context_id = tx.last_insert_rowid();

        tx.commit()?;

        Ok(Category {
            id,
            name: name.to_string(),
            context_id,
        })
    }

    pub fn count_subjects(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_groups(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM subject_groups", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn group_member_ids(&self, group_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_id FROM group_members WHERE group_id = ?1 ORDER BY subject_id",
        )?;
        let ids = stmt
            .query_map(params![group_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    pub fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        Ok(get_events_for_entity(&self.conn, entity_type, entity_id)?)
    }

    fn insert_subject(&self, subject: &Subject) -> Result<i64> {
        let now = Utc::now();
        let created_at = subject.created_at.unwrap_or(now).to_rfc3339();
        let modified_at = subject.modified_at.unwrap_or(now).to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO subjects (
                host_id, auth, confirmed, username, password, idnumber,
                firstname, lastname, email, phone, institution, department,
                city, country, lang, timezone, description, suspended,
                created_at, modified_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                subject.host_id,
                subject.auth,
                subject.confirmed,
                subject.username,
                subject.password,
                subject.idnumber,
                subject.firstname,
                subject.lastname,
                subject.email,
                subject.phone,
                subject.institution,
                subject.department,
                subject.city,
                subject.country,
                subject.lang,
                subject.timezone,
                subject.description,
                subject.suspended,
                created_at,
                modified_at,
            ],
        )
        .map_err(write_err("subject"))?;
        let id = tx.last_insert_rowid();

        let event = Event::new(
            "subject_created",
            "subject",
            &id.to_string(),
            serde_json::json!({
                "username": subject.username,
                "email": subject.email,
                "auth": subject.auth,
            }),
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;

        Ok(id)
    }

    fn write_subject(&self, subject: &Subject) -> Result<()> {
        let id = subject
            .id
            .ok_or_else(|| ImportError::rejected("subject", "cannot update a subject without id"))?;
        let modified_at = subject.modified_at.unwrap_or_else(Utc::now).to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx
            .execute(
                "UPDATE subjects SET
                    auth = ?1, confirmed = ?2, username = ?3, password = ?4, idnumber = ?5,
                    firstname = ?6, lastname = ?7, email = ?8, phone = ?9, institution = ?10,
                    department = ?11, city = ?12, country = ?13, lang = ?14, timezone = ?15,
                    description = ?16, suspended = ?17, modified_at = ?18
                 WHERE id = ?19",
                params![
                    subject.auth,
                    subject.confirmed,
                    subject.username,
                    subject.password,
                    subject.idnumber,
                    subject.firstname,
                    subject.lastname,
                    subject.email,
                    subject.phone,
                    subject.institution,
                    subject.department,
                    subject.city,
                    subject.country,
                    subject.lang,
                    subject.timezone,
                    subject.description,
                    subject.suspended,
                    modified_at,
                    id,
                ],
            )
            .map_err(write_err("subject"))?;

        if changed == 0 {
            return Err(ImportError::rejected(
                "subject",
                format!("subject {} does not exist", id),
            ));
        }

        let event = Event::new(
            "subject_updated",
            "subject",
            &id.to_string(),
            serde_json::json!({ "email": subject.email }),
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;

        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn writable_subject_fields(&self) -> Result<WritableFields> {
        Ok(WritableFields::from_columns(
            self.subject_columns.iter().cloned(),
            &PROTECTED_FIELDS,
        ))
    }

    fn is_subject_column(&self, field: &str) -> Result<bool> {
        Ok(self.subject_columns.iter().any(|c| c == field))
    }

    fn find_subject(&self, field: &str, value: &str) -> Result<Option<Subject>> {
        if !self.is_subject_column(field)? {
            return Err(ImportError::InvalidConfig {
                reason: format!("{} is not a subject column", field),
            });
        }

        // Column name is checked against the live schema above
        let sql = format!(
            "SELECT {} FROM subjects WHERE \"{}\" = ?1 ORDER BY id LIMIT 1",
            SUBJECT_COLUMNS, field
        );
        let subject = self
            .conn
            .query_row(&sql, params![value], subject_from_row)
            .optional()?;

        Ok(subject)
    }

    fn subject_by_id(&self, id: i64) -> Result<Option<Subject>> {
        let sql = format!("SELECT {} FROM subjects WHERE id = ?1", SUBJECT_COLUMNS);
        let subject = self
            .conn
            .query_row(&sql, params![id], subject_from_row)
            .optional()?;

        Ok(subject)
    }

    fn create_subject(&self, subject: &Subject) -> Result<i64> {
        self.insert_subject(subject)
    }

    fn create_user(&self, subject: &Subject, policy: &PasswordPolicy) -> Result<i64> {
        let mut user = subject.clone();

        if user.auth.is_empty() {
            user.auth = DEFAULT_AUTH.to_string();
        }

        user.password = if user.password.is_empty() {
            debug!("Generating password for {}", user.username);
            password::hash_password(&password::generate_password())
        } else if password::is_hashed(&user.password) {
            user.password
        } else {
            policy
                .check(&user.password)
                .map_err(|reason| ImportError::rejected("subject", reason))?;
            password::hash_password(&user.password)
        };

        self.insert_subject(&user)
    }

    fn update_subject(&self, subject: &Subject) -> Result<()> {
        self.write_subject(subject)
    }

    fn update_user(&self, subject: &Subject, policy: &PasswordPolicy) -> Result<()> {
        let mut user = subject.clone();

        if user.auth.is_empty() {
            user.auth = DEFAULT_AUTH.to_string();
        }

        if !user.password.is_empty() && !password::is_hashed(&user.password) {
            policy
                .check(&user.password)
                .map_err(|reason| ImportError::rejected("subject", reason))?;
            user.password = password::hash_password(&user.password);
        }

        self.write_subject(&user)
    }

    fn find_group(&self, name: &str) -> Result<Option<Group>> {
        let sql = format!("SELECT {} FROM subject_groups WHERE name = ?1", GROUP_COLUMNS);
        let group = self
            .conn
            .query_row(&sql, params![name], group_from_row)
            .optional()?;

        Ok(group)
    }

    fn create_group(&self, group: &NewGroup) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO subject_groups (
                name, idnumber, description, description_format, context_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.name,
                group.idnumber,
                group.description,
                group.description_format,
                group.context_id,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(write_err("group"))?;
        let id = tx.last_insert_rowid();

        let event = Event::new(
            "group_created",
            "group",
            &id.to_string(),
            serde_json::json!({
                "name": group.name,
                "idnumber": group.idnumber,
                "context_id": group.context_id,
            }),
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;

        Ok(id)
    }

    fn find_category(&self, id: i64) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT c.id, c.name, x.id
                 FROM categories c
                 JOIN contexts x ON x.level = 'category' AND x.instance_id = c.id
                 WHERE c.id = ?1",
                params![id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        context_id: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(category)
    }

    fn add_membership(&self, group_id: i64, subject_id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let added = tx
            .execute(
                "INSERT OR IGNORE INTO group_members (group_id, subject_id, added_at)
                 VALUES (?1, ?2, ?3)",
                params![group_id, subject_id, Utc::now().to_rfc3339()],
            )
            .map_err(write_err("membership"))?
            == 1;

        if added {
            let event = Event::new(
                "membership_added",
                "group",
                &group_id.to_string(),
                serde_json::json!({ "subject_id": subject_id }),
                ACTOR,
            );
            insert_event(&tx, &event)?;
        }
        tx.commit()?;

        Ok(added)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: Some(row.get(0)?),
        host_id: row.get(1)?,
        auth: row.get(2)?,
        confirmed: row.get(3)?,
        username: row.get(4)?,
        password: row.get(5)?,
        idnumber: row.get(6)?,
        firstname: row.get(7)?,
        lastname: row.get(8)?,
        email: row.get(9)?,
        phone: row.get(10)?,
        institution: row.get(11)?,
        department: row.get(12)?,
        city: row.get(13)?,
        country: row.get(14)?,
        lang: row.get(15)?,
        timezone: row.get(16)?,
        description: row.get(17)?,
        suspended: row.get(18)?,
        created_at: parse_timestamp(row.get(19)?),
        modified_at: parse_timestamp(row.get(20)?),
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        idnumber: row.get(2)?,
        description: row.get(3)?,
        description_format: row.get(4)?,
        context_id: row.get(5)?,
    })
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Constraint violations are the store refusing the data; anything else is
/// a store failure.
fn write_err(entity: &'static str) -> impl Fn(rusqlite::Error) -> ImportError {
    move |err| {
        let constraint = matches!(
            &err,
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation
        );

        if constraint {
            ImportError::rejected(entity, err.to_string())
        } else {
            ImportError::Store(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_subject(username: &str, idnumber: &str) -> Subject {
        let mut subject = Subject::new_unsaved(1, Utc::now());
        subject.username = username.to_string();
        subject.idnumber = idnumber.to_string();
        subject.firstname = "Ann".to_string();
        subject.lastname = "Lee".to_string();
        subject.email = format!("{}@x.com", username);
        subject
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        let contexts: i64 = conn
            .query_row("SELECT COUNT(*) FROM contexts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(contexts, 1);
    }

    #[test]
    fn test_writable_fields_from_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        let writable = store.writable_subject_fields().unwrap();

        assert!(writable.contains("username"));
        assert!(writable.contains("idnumber"));
        assert!(writable.contains("auth"));
        for protected in PROTECTED_FIELDS {
            assert!(!writable.contains(protected), "{} must be protected", protected);
        }
    }

    #[test]
    fn test_create_user_hashes_and_defaults_auth() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut subject = sample_subject("alee", "001");
        subject.password = "plain".to_string();

        let id = store
            .create_user(&subject, &PasswordPolicy::relaxed())
            .unwrap();
        let stored = store.subject_by_id(id).unwrap().unwrap();

        assert_eq!(stored.auth, "manual");
        assert!(password::is_hashed(&stored.password));
        assert_eq!(stored.password, password::hash_password("plain"));
        assert!(stored.confirmed);
    }

    #[test]
    fn test_create_user_generates_missing_password() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .create_user(&sample_subject("bkim", "002"), &PasswordPolicy::strict())
            .unwrap();

        let stored = store.subject_by_id(id).unwrap().unwrap();
        assert!(password::is_hashed(&stored.password));
    }

    #[test]
    fn test_create_user_enforces_policy() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut subject = sample_subject("weak", "003");
        subject.password = "abc".to_string();

        let err = store
            .create_user(&subject, &PasswordPolicy::strict())
            .unwrap_err();
        assert!(matches!(err, ImportError::StoreWriteRejected { .. }));
        assert_eq!(store.count_subjects().unwrap(), 0);
    }

    #[test]
    fn test_generic_create_keeps_values_verbatim() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut subject = sample_subject("ldapuser", "004");
        subject.auth = "ldap".to_string();
        subject.password = "not cached".to_string();

        let id = store.create_subject(&subject).unwrap();
        let stored = store.subject_by_id(id).unwrap().unwrap();

        assert_eq!(stored.auth, "ldap");
        assert_eq!(stored.password, "not cached");
    }

    #[test]
    fn test_duplicate_username_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_subject(&sample_subject("alee", "001")).unwrap();

        let err = store
            .create_subject(&sample_subject("alee", "999"))
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::StoreWriteRejected { entity: "subject", .. }
        ));
        assert_eq!(store.count_subjects().unwrap(), 1);
    }

    #[test]
    fn test_find_subject_by_column() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.create_subject(&sample_subject("alee", "001")).unwrap();

        let found = store.find_subject("idnumber", "001").unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert!(store.find_subject("idnumber", "002").unwrap().is_none());

        let by_email = store.find_subject("email", "alee@x.com").unwrap();
        assert!(by_email.is_some());
    }

    #[test]
    fn test_find_subject_rejects_unknown_column() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .find_subject("idnumber\" OR 1=1 --", "x")
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidConfig { .. }));
    }

    #[test]
    fn test_update_subject_writes_event() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.create_subject(&sample_subject("alee", "001")).unwrap();

        let mut subject = store.subject_by_id(id).unwrap().unwrap();
        subject.city = "Perth".to_string();
        store.update_subject(&subject).unwrap();

        let stored = store.subject_by_id(id).unwrap().unwrap();
        assert_eq!(stored.city, "Perth");

        let events = store.events_for_entity("subject", &id.to_string()).unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["subject_created", "subject_updated"]);
        assert_eq!(events[0].actor, "csv_importer");
    }

    #[test]
    fn test_update_user_hashes_new_plaintext_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .create_user(&sample_subject("alee", "001"), &PasswordPolicy::relaxed())
            .unwrap();

        let mut subject = store.subject_by_id(id).unwrap().unwrap();
        subject.password = "fresh-secret".to_string();
        store.update_user(&subject, &PasswordPolicy::relaxed()).unwrap();

        let stored = store.subject_by_id(id).unwrap().unwrap();
        assert_eq!(stored.password, password::hash_password("fresh-secret"));

        // An already hashed value is written back untouched
        store.update_user(&stored, &PasswordPolicy::relaxed()).unwrap();
        let again = store.subject_by_id(id).unwrap().unwrap();
        assert_eq!(again.password, password::hash_password("fresh-secret"));
    }

    #[test]
    fn test_update_user_enforces_policy() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .create_user(&sample_subject("alee", "001"), &PasswordPolicy::relaxed())
            .unwrap();
        let before = store.subject_by_id(id).unwrap().unwrap();

        let mut subject = before.clone();
        subject.password = "abc".to_string();
        let err = store
            .update_user(&subject, &PasswordPolicy::strict())
            .unwrap_err();

        assert!(matches!(err, ImportError::StoreWriteRejected { .. }));
        assert_eq!(store.subject_by_id(id).unwrap().unwrap().password, before.password);
    }

    #[test]
    fn test_corrupt_event_rows_are_errors() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO events (event_id, timestamp, event_type, entity_type, entity_id, data, actor)
                 VALUES ('e1', 'yesterday', 'subject_created', 'subject', '1', '{}', 'csv_importer'),
                        ('e2', ?1, 'subject_created', 'subject', '2', '{not json', 'csv_importer')",
                params![Utc::now().to_rfc3339()],
            )
            .unwrap();

        assert!(store.events_for_entity("subject", "1").is_err());
        assert!(store.events_for_entity("subject", "2").is_err());
    }

    #[test]
    fn test_update_missing_subject_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ghost = sample_subject("ghost", "000");
        ghost.id = Some(77);

        let err = store.update_subject(&ghost).unwrap_err();
        assert!(matches!(err, ImportError::StoreWriteRejected { .. }));
    }

    #[test]
    fn test_groups_and_memberships() {
        let store = SqliteStore::open_in_memory().unwrap();
        let subject_id = store.create_subject(&sample_subject("alee", "001")).unwrap();

        let group_id = store.create_group(&NewGroup::named("Class A")).unwrap();
        let group = store.find_group("Class A").unwrap().unwrap();
        assert_eq!(group.id, group_id);
        assert_eq!(group.context_id, SYSTEM_CONTEXT_ID);
        assert!(store.find_group("class a").unwrap().is_none());

        assert!(store.add_membership(group_id, subject_id).unwrap());
        assert!(!store.add_membership(group_id, subject_id).unwrap());
        assert_eq!(store.group_member_ids(group_id).unwrap(), vec![subject_id]);

        let err = store.create_group(&NewGroup::named("Class A")).unwrap_err();
        assert!(matches!(err, ImportError::StoreWriteRejected { entity: "group", .. }));
    }

    #[test]
    fn test_category_owns_context() {
        let store = SqliteStore::open_in_memory().unwrap();
        let category = store.create_category("Science").unwrap();

        assert_ne!(category.context_id, SYSTEM_CONTEXT_ID);

        let found = store.find_category(category.id).unwrap().unwrap();
        assert_eq!(found, category);
        assert!(store.find_category(category.id + 100).unwrap().is_none());
    }
}
