//! Sync result model and the builder that assembles it during a run.
//!
//! A `SyncResult` converts to and from a flat key/value record
//! (`serde_json::Map`). The record carries `schema_version`; every
//! optional field has an explicit default and unknown keys are rejected,
//! so a record written by a different schema fails loudly instead of
//! silently dropping data.

use crate::error::{RecordError, SyncError};
use crate::repo::RepoTarget;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const SCHEMA_VERSION: u64 = 1;

const SCHEMA_VERSION_KEY: &str = "schema_version";
const HAS_UPSTREAM_KEY: &str = "has_upstream";

/// Commits unique to the local branch (`ahead`) and to its upstream (`behind`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AheadBehind {
    #[serde(default)]
    pub ahead: u32,
    #[serde(default)]
    pub behind: u32,
}

impl AheadBehind {
    pub fn is_even(&self) -> bool {
        self.ahead == 0 && self.behind == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    #[default]
    Pending,
    Synced,
    Skipped,
    Error,
}

impl BranchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BranchStatus::Pending)
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BranchStatus::Pending => "pending",
            BranchStatus::Synced => "synced",
            BranchStatus::Skipped => "skipped",
            BranchStatus::Error => "error",
        };
        f.write_str(label)
    }
}

fn default_true() -> bool {
    true
}

/// One branch touched during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchDetail {
    pub name: String,
    #[serde(default)]
    pub status: BranchStatus,
    /// The branch was checked out when this detail was recorded. In
    /// multi-branch mode every branch that was switched to carries it, even
    /// though the entry branch is restored afterwards.
    #[serde(default)]
    pub is_current: bool,
    #[serde(default = "default_true")]
    pub exists_locally: bool,
    #[serde(default = "default_true")]
    pub exists_remotely: bool,
    #[serde(default)]
    pub has_upstream: bool,
    #[serde(default)]
    pub upstream_name: Option<String>,
    /// The upstream was linked by this run.
    #[serde(default)]
    pub auto_set_success: bool,
    #[serde(default)]
    pub ahead_behind: Option<AheadBehind>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BranchDetail {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: BranchStatus::Pending,
            is_current: false,
            exists_locally: true,
            exists_remotely: true,
            has_upstream: false,
            upstream_name: None,
            auto_set_success: false,
            ahead_behind: None,
            error: None,
        }
    }
}

/// Outcome of syncing one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncResult {
    pub repo_name: String,
    pub path: PathBuf,
    pub success: bool,
    /// Branch checked out when the run started.
    #[serde(default)]
    pub current_branch: Option<String>,
    #[serde(default)]
    pub stashed: bool,
    #[serde(default)]
    pub synced_branches: Vec<String>,
    #[serde(default)]
    pub skipped_branches: Vec<String>,
    #[serde(default)]
    pub branch_details: Vec<BranchDetail>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn new(target: &RepoTarget) -> Self {
        Self {
            repo_name: target.name.clone(),
            path: target.path.clone(),
            success: true,
            current_branch: None,
            stashed: false,
            synced_branches: Vec::new(),
            skipped_branches: Vec::new(),
            branch_details: Vec::new(),
            error: None,
            duration_ms: 0,
        }
    }

    /// Whether the branch active at entry has a tracking link.
    pub fn has_upstream(&self) -> bool {
        let Some(current) = self.current_branch.as_deref() else {
            return false;
        };
        self.branch_details
            .iter()
            .find(|detail| detail.name == current)
            .is_some_and(|detail| detail.has_upstream)
    }

    /// Names of branches that ended in `error`, in processing order.
    pub fn failed_branches(&self) -> Vec<&str> {
        self.branch_details
            .iter()
            .filter(|detail| detail.status == BranchStatus::Error)
            .map(|detail| detail.name.as_str())
            .collect()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn to_record(&self) -> Result<Map<String, Value>, RecordError> {
        let Value::Object(mut record) = serde_json::to_value(self)? else {
            return Err(RecordError::NotAnObject);
        };
        record.insert(SCHEMA_VERSION_KEY.to_string(), Value::from(SCHEMA_VERSION));
        record.insert(HAS_UPSTREAM_KEY.to_string(), Value::Bool(self.has_upstream()));
        Ok(record)
    }

    pub fn from_record(record: &Map<String, Value>) -> Result<Self, RecordError> {
        let mut record = record.clone();
        let version = record
            .remove(SCHEMA_VERSION_KEY)
            .ok_or(RecordError::MissingVersion)?;
        match version.as_u64() {
            Some(SCHEMA_VERSION) => {}
            Some(other) => return Err(RecordError::UnsupportedVersion(other)),
            None => return Err(RecordError::MissingVersion),
        }
        // Derived from branch_details; never trusted on load.
        record.remove(HAS_UPSTREAM_KEY);
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

/// Assembles a `SyncResult` as the state machine progresses.
///
/// Branch details are only accepted together with their terminal status,
/// so a finished result can never contain a pending branch.
#[derive(Debug)]
pub struct ResultBuilder {
    result: SyncResult,
}

impl ResultBuilder {
    pub fn new(target: &RepoTarget) -> Self {
        Self {
            result: SyncResult::new(target),
        }
    }

    pub fn current_branch(&mut self, branch: &str) {
        self.result.current_branch = (!branch.is_empty()).then(|| branch.to_string());
    }

    pub fn stashed(&mut self, stashed: bool) {
        self.result.stashed = stashed;
    }

    pub fn synced(&mut self, mut detail: BranchDetail) {
        detail.status = BranchStatus::Synced;
        self.result.synced_branches.push(detail.name.clone());
        self.result.branch_details.push(detail);
    }

    pub fn skipped(&mut self, mut detail: BranchDetail, reason: impl Into<String>) {
        detail.status = BranchStatus::Skipped;
        detail.error = Some(reason.into());
        self.result.skipped_branches.push(detail.name.clone());
        self.result.branch_details.push(detail);
    }

    /// Records a per-branch failure. Any branch error fails the repository;
    /// the first one becomes the top-level error.
    pub fn errored(&mut self, mut detail: BranchDetail, error: &SyncError) {
        let message = error.to_string();
        detail.status = BranchStatus::Error;
        detail.error = Some(message.clone());
        self.result.branch_details.push(detail);
        self.fail(message);
    }

    /// Marks the whole repository as failed, keeping an earlier error if set.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.result.success = false;
        if self.result.error.is_none() {
            self.result.error = Some(message.into());
        }
    }

    pub fn finish(mut self, elapsed: Duration) -> SyncResult {
        self.result.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> RepoTarget {
        RepoTarget::new("/work/api")
    }

    #[test]
    fn test_has_upstream_follows_current_branch_detail() {
        let mut builder = ResultBuilder::new(&target());
        builder.current_branch("main");

        let mut other = BranchDetail::new("dev");
        other.has_upstream = true;
        builder.synced(other);
        assert!(!builder.result.has_upstream());

        let mut main = BranchDetail::new("main");
        main.has_upstream = true;
        builder.synced(main);

        let result = builder.finish(Duration::from_millis(12));
        assert!(result.has_upstream());
        assert_eq!(result.duration_ms, 12);
    }

    #[test]
    fn test_has_upstream_is_false_without_current_branch() {
        let mut builder = ResultBuilder::new(&target());
        builder.current_branch("");
        let mut detail = BranchDetail::new("main");
        detail.has_upstream = true;
        builder.synced(detail);
        assert!(!builder.finish(Duration::ZERO).has_upstream());
    }

    #[test]
    fn test_builder_sets_terminal_status_and_lists() {
        let mut builder = ResultBuilder::new(&target());
        builder.synced(BranchDetail::new("A"));
        builder.skipped(BranchDetail::new("ghost"), "remote branch missing");

        let result = builder.finish(Duration::ZERO);
        assert!(result.success);
        assert_eq!(result.synced_branches, vec!["A"]);
        assert_eq!(result.skipped_branches, vec!["ghost"]);
        assert!(result.branch_details.iter().all(|d| d.status.is_terminal()));
        assert_eq!(
            result.branch_details[1].error.as_deref(),
            Some("remote branch missing")
        );
    }

    #[test]
    fn test_errored_branch_fails_repo_and_keeps_first_error() {
        let mut builder = ResultBuilder::new(&target());
        builder.errored(
            BranchDetail::new("A"),
            &SyncError::Checkout {
                branch: "A".to_string(),
                reason: "first".to_string(),
            },
        );
        builder.errored(
            BranchDetail::new("B"),
            &SyncError::Checkout {
                branch: "B".to_string(),
                reason: "second".to_string(),
            },
        );

        let result = builder.finish(Duration::ZERO);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("checkout of 'A' failed: first"));
        assert_eq!(result.failed_branches(), vec!["A", "B"]);
        assert!(result.skipped_branches.is_empty());
    }

    #[test]
    fn test_record_round_trip_keeps_every_field() -> anyhow::Result<()> {
        let mut builder = ResultBuilder::new(&target());
        builder.current_branch("main");
        builder.stashed(true);
        let mut detail = BranchDetail::new("main");
        detail.is_current = true;
        detail.has_upstream = true;
        detail.upstream_name = Some("origin/main".to_string());
        detail.auto_set_success = true;
        detail.ahead_behind = Some(AheadBehind { ahead: 2, behind: 1 });
        builder.synced(detail);
        let result = builder.finish(Duration::from_millis(40));

        let record = result.to_record()?;
        assert_eq!(record["schema_version"], json!(1));
        assert_eq!(record["has_upstream"], json!(true));
        assert_eq!(record["branch_details"][0]["status"], json!("synced"));

        assert_eq!(SyncResult::from_record(&record)?, result);
        Ok(())
    }

    #[test]
    fn test_from_record_applies_explicit_defaults() -> anyhow::Result<()> {
        let record = json!({
            "schema_version": 1,
            "repo_name": "api",
            "path": "/work/api",
            "success": false,
            "branch_details": [{ "name": "dev" }]
        });
        let Value::Object(record) = record else {
            anyhow::bail!("fixture is not an object");
        };

        let result = SyncResult::from_record(&record)?;
        assert!(!result.success);
        assert_eq!(result.current_branch, None);
        assert!(!result.stashed);
        assert!(result.synced_branches.is_empty());
        assert_eq!(result.error, None);
        assert_eq!(result.duration_ms, 0);

        let detail = &result.branch_details[0];
        assert_eq!(detail.status, BranchStatus::Pending);
        assert!(detail.exists_locally);
        assert!(detail.exists_remotely);
        assert!(!detail.has_upstream);
        assert_eq!(detail.ahead_behind, None);
        Ok(())
    }

    #[test]
    fn test_from_record_rejects_unknown_keys_and_versions() {
        let base = json!({
            "schema_version": 1,
            "repo_name": "api",
            "path": "/work/api",
            "success": true,
            "branch": "main"
        });
        let Value::Object(mut record) = base else {
            panic!("fixture is not an object");
        };
        assert!(matches!(
            SyncResult::from_record(&record),
            Err(RecordError::Invalid(_))
        ));

        record.remove("branch");
        record.insert("schema_version".to_string(), json!(2));
        assert!(matches!(
            SyncResult::from_record(&record),
            Err(RecordError::UnsupportedVersion(2))
        ));

        record.remove("schema_version");
        assert!(matches!(
            SyncResult::from_record(&record),
            Err(RecordError::MissingVersion)
        ));
    }
}
