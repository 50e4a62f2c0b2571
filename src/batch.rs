// 🚚 Batch Runner - drives the import row by row
//
// Initializing -> Streaming -> Completed   (Failed on any fatal error)
//
// Rows are handled strictly in source order: a group created by one row must
// be visible to the next row naming it.

use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::projection::FieldProjector;
use crate::reader::{CsvRowReader, Row};
use crate::reconciliation::{
    GroupOutcome, GroupReconciler, MembershipLinker, SubjectOutcome, SubjectReconciler,
};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// WINDOW (offset / limit)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Still inside the offset window
    Skip,
    /// Limit exhausted; stop streaming
    Stop,
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    remaining_offset: u64,
    /// None = unlimited
    remaining_limit: Option<u64>,
}

impl Window {
    pub fn unbounded() -> Self {
        Window {
            remaining_offset: 0,
            remaining_limit: None,
        }
    }

    /// `offset >= 0`; `limit >= -1` where -1 means unlimited.
    pub fn from_options(offset: i64, limit: i64) -> Result<Self> {
        let remaining_offset = u64::try_from(offset).map_err(|_| ImportError::InvalidWindow {
            reason: format!("offset should be a positive number, got {}", offset),
        })?;

        let remaining_limit = match limit {
            -1 => None,
            l if l >= 0 => Some(l as u64),
            l => {
                return Err(ImportError::InvalidWindow {
                    reason: format!("limit should be a positive number or -1, got {}", l),
                })
            }
        };

        Ok(Window {
            remaining_offset,
            remaining_limit,
        })
    }

    /// Decide what to do with the next scanned row.
    pub fn admit(&mut self) -> Admission {
        if self.remaining_offset > 0 {
            self.remaining_offset -= 1;
            return Admission::Skip;
        }

        match self.remaining_limit.as_mut() {
            Some(0) => Admission::Stop,
            Some(remaining) => {
                *remaining -= 1;
                Admission::Process
            }
            None => Admission::Process,
        }
    }
}

// ============================================================================
// FAILURE POLICY + SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFailurePolicy {
    /// Any row failure halts the run
    #[default]
    FailFast,
    /// Row failures are logged, recorded and skipped
    SkipAndLog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub lines_scanned: u64,
    pub lines_processed: u64,
    pub subjects_created: u64,
    pub subjects_updated: u64,
    pub subjects_unchanged: u64,
    pub groups_created: u64,
    pub failures: Vec<RowFailure>,
}

impl BatchSummary {
    pub fn rows_failed(&self) -> usize {
        self.failures.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "scanned {}, processed {}, subjects created {}, updated {}, groups created {}, failed {}",
            self.lines_scanned,
            self.lines_processed,
            self.subjects_created,
            self.subjects_updated,
            self.groups_created,
            self.rows_failed()
        )
    }

    /// Counter lines printed at the end of a verbose run.
    pub fn report_lines(&self, update_existing: bool, skip_policy: bool) -> Vec<String> {
        let mut lines = vec![
            format!("Lines scanned:  \t{}", self.lines_scanned),
            format!("Lines processed:\t{}", self.lines_processed),
            format!("Subjects created:\t{}", self.subjects_created),
        ];
        if update_existing {
            lines.push(format!("Subjects updated:\t{}", self.subjects_updated));
        }
        lines.push(format!("Groups created: \t{}", self.groups_created));
        if skip_policy {
            lines.push(format!("Rows failed:    \t{}", self.rows_failed()));
        }
        lines
    }
}

// ============================================================================
// BATCH RUNNER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Initializing,
    Streaming,
    Completed,
    Failed,
}

pub struct BatchRunner<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    config: ImportConfig,
    phase: BatchPhase,
}

impl<'s, S: RecordStore + ?Sized> BatchRunner<'s, S> {
    pub fn new(store: &'s S, config: ImportConfig) -> Self {
        BatchRunner {
            store,
            config,
            phase: BatchPhase::Initializing,
        }
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn run_path(&mut self, path: &Path) -> Result<BatchSummary> {
        info!("Importing {}", path.display());
        self.run(|delimiter| CsvRowReader::open(path, delimiter))
    }

    pub fn run_reader<R: Read>(&mut self, reader: R) -> Result<BatchSummary> {
        self.run(|delimiter| CsvRowReader::from_reader(reader, delimiter))
    }

    fn run<R, F>(&mut self, open: F) -> Result<BatchSummary>
    where
        R: Read,
        F: FnOnce(u8) -> Result<CsvRowReader<R>>,
    {
        self.phase = BatchPhase::Initializing;

        let result = self.execute(open);
        self.phase = match &result {
            Ok(summary) => {
                info!("Import complete: {}", summary.summary());
                BatchPhase::Completed
            }
            Err(_) => BatchPhase::Failed,
        };

        result
    }

    fn execute<R, F>(&mut self, open: F) -> Result<BatchSummary>
    where
        R: Read,
        F: FnOnce(u8) -> Result<CsvRowReader<R>>,
    {
        // ====================================================================
        // Initializing: nothing below may write to the store
        // ====================================================================
        let (delimiter, mut window) = self.config.validate()?;
        let rows = open(delimiter)?;
        rows.header().validate(&self.config.matching_field)?;

        if !self.store.is_subject_column(&self.config.matching_field)? {
            return Err(ImportError::InvalidConfig {
                reason: format!(
                    "matching field {} is not a subject attribute",
                    self.config.matching_field
                ),
            });
        }

        let projector = FieldProjector::new(self.store.writable_subject_fields()?);
        debug!(
            "Writable subject fields: {}",
            projector.writable().iter().collect::<Vec<_>>().join(", ")
        );
        let subjects = SubjectReconciler::new(
            self.store,
            projector,
            self.config.matching_field.clone(),
            self.config.update_existing,
        )
        .with_host_id(self.config.host_id)
        .with_password_policy(self.config.password_policy.clone());
        let groups = GroupReconciler::new(self.store);
        let linker = MembershipLinker::new(self.store);

        // ====================================================================
        // Streaming
        // ====================================================================
        self.phase = BatchPhase::Streaming;
        debug!("Header: {:?}", rows.header().columns());

        let mut summary = BatchSummary::default();

        for item in rows {
            summary.lines_scanned += 1;
            let line = summary.lines_scanned;

            match window.admit() {
                Admission::Skip => continue,
                Admission::Stop => break,
                Admission::Process => {}
            }

            let result = item.and_then(|row| {
                process_row(&row, &subjects, &groups, &linker, &mut summary)
            });

            match result {
                Ok(()) => {
                    summary.lines_processed += 1;
                    debug!("Processed line {}", line);
                }
                Err(err)
                    if err.is_row_level()
                        && self.config.failure_policy == RowFailurePolicy::SkipAndLog =>
                {
                    warn!("Skipping line {}: {}", line, err);
                    summary.failures.push(RowFailure {
                        line,
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(summary)
    }
}

/// Reconcile one row. Counters move as each step succeeds, so a row that
/// fails halfway still reports the subject it created.
fn process_row<S: RecordStore + ?Sized>(
    row: &Row,
    subjects: &SubjectReconciler<'_, S>,
    groups: &GroupReconciler<'_, S>,
    linker: &MembershipLinker<'_, S>,
    summary: &mut BatchSummary,
) -> Result<()> {
    let (subject, outcome) = subjects.upsert(row)?;
    match outcome {
        SubjectOutcome::Created => summary.subjects_created += 1,
        SubjectOutcome::Updated => summary.subjects_updated += 1,
        SubjectOutcome::Unchanged => summary.subjects_unchanged += 1,
    }

    if let Some((group, group_outcome)) = groups.resolve(row)? {
        if group_outcome == GroupOutcome::Created {
            summary.groups_created += 1;
        }

        let subject_id = subject.id.ok_or_else(|| {
            ImportError::rejected("membership", format!("subject {} has no id", subject.username))
        })?;
        linker.ensure(subject_id, group.id)?;
    }

    Ok(())
}
