// ⚙️ Import Configuration
//
// Everything is checked before the first row is read: a bad delimiter,
// matching field or window aborts the run with nothing written.

use crate::batch::{RowFailurePolicy, Window};
use crate::error::{ImportError, Result};
use crate::password::PasswordPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DELIMITER: &str = ",";
pub const DEFAULT_MATCHING_FIELD: &str = "idnumber";
pub const DEFAULT_HOST_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Single-character field separator (`\t` accepted for tab)
    pub delimiter: String,

    /// Column used to find existing subjects
    pub matching_field: String,

    /// Update matched subjects instead of leaving them as they are
    pub update_existing: bool,

    /// Data rows to skip before processing starts (>= 0)
    pub offset: i64,

    /// Maximum rows to process after the offset (-1 = unlimited)
    pub limit: i64,

    pub failure_policy: RowFailurePolicy,

    /// Passed to the store's user path instead of any global setting
    pub password_policy: PasswordPolicy,

    /// Host new subjects are attached to
    pub host_id: i64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            delimiter: DEFAULT_DELIMITER.to_string(),
            matching_field: DEFAULT_MATCHING_FIELD.to_string(),
            update_existing: false,
            offset: 0,
            limit: -1,
            failure_policy: RowFailurePolicy::default(),
            password_policy: PasswordPolicy::relaxed(),
            host_id: DEFAULT_HOST_ID,
        }
    }
}

impl ImportConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ImportError::InvalidConfig {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;

        serde_json::from_str(&text).map_err(|e| ImportError::InvalidConfig {
            reason: format!("cannot parse {}: {}", path.display(), e),
        })
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_str() {
            "\\t" | "\t" => Ok(b'\t'),
            d if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
            d => Err(ImportError::InvalidConfig {
                reason: format!("delimiter must be a single ASCII character, got {:?}", d),
            }),
        }
    }

    pub fn window(&self) -> Result<Window> {
        Window::from_options(self.offset, self.limit)
    }

    /// Validate every option; returns the parsed delimiter and window.
    pub fn validate(&self) -> Result<(u8, Window)> {
        let window = self.window()?;
        let delimiter = self.delimiter_byte()?;

        if self.matching_field.trim().is_empty() {
            return Err(ImportError::InvalidConfig {
                reason: "matching field must not be empty".to_string(),
            });
        }

        Ok((delimiter, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        let (delimiter, window) = config.validate().unwrap();

        assert_eq!(delimiter, b',');
        assert_eq!(window, Window::unbounded());
        assert_eq!(config.matching_field, "idnumber");
        assert_eq!(config.failure_policy, RowFailurePolicy::FailFast);
        assert!(!config.password_policy.enforced);
    }

    #[test]
    fn test_delimiters() {
        let mut config = ImportConfig::default();

        config.delimiter = ";".to_string();
        assert_eq!(config.delimiter_byte().unwrap(), b';');

        config.delimiter = "\\t".to_string();
        assert_eq!(config.delimiter_byte().unwrap(), b'\t');

        config.delimiter = "||".to_string();
        assert!(matches!(
            config.delimiter_byte(),
            Err(ImportError::InvalidConfig { .. })
        ));

        config.delimiter = "§".to_string();
        assert!(config.delimiter_byte().is_err());
    }

    #[test]
    fn test_bad_window_is_rejected() {
        let config = ImportConfig {
            offset: -1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ImportError::InvalidWindow { .. })
        ));

        let config = ImportConfig {
            limit: -2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ImportError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_empty_matching_field_is_rejected() {
        let config = ImportConfig {
            matching_field: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ImportError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_json_file_with_partial_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"matching_field": "email", "failure_policy": "skip_and_log",
                "password_policy": {{"enforced": true, "min_length": 12}}}}"#
        )
        .unwrap();

        let config = ImportConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.matching_field, "email");
        assert_eq!(config.failure_policy, RowFailurePolicy::SkipAndLog);
        assert!(config.password_policy.enforced);
        assert_eq!(config.password_policy.min_length, 12);
        assert_eq!(config.delimiter, ",");
        assert_eq!(config.limit, -1);
    }

    #[test]
    fn test_unreadable_json_file() {
        let err = ImportConfig::from_json_file(Path::new("/no/such/config.json")).unwrap_err();
        assert!(matches!(err, ImportError::InvalidConfig { .. }));
    }
}
