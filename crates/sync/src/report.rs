use crate::error::{Error, Result};
use derive_more::Display;
use mirror_files::Placement;
use mirror_store::resource::ResourceKind;
use std::collections::HashMap;
use std::fmt;

/// Where in the remote tree a recoverable failure happened.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    #[display("modules of course {_0}")]
    Modules(u64),
    #[display("items of module {module_id} in course {course_id}")]
    ModuleItems { course_id: u64, module_id: u64 },
    #[display("folders of course {_0}")]
    Folders(u64),
    #[display("subfolders of folder {_0}")]
    Subfolders(u64),
    #[display("files of folder {_0}")]
    Files(u64),
    #[display("file {_0}")]
    File(u64),
}

#[derive(Debug)]
pub struct Failure {
    pub scope: Scope,
    pub error: Error,
}

/// How downloads ended up on disk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Placements {
    pub created: u64,
    pub unchanged: u64,
    pub added: u64,
    pub migrated: u64,
}
impl Placements {
    /// Placements that wrote something new to the mirror.
    pub fn written(&self) -> u64 {
        self.created + self.added + self.migrated
    }
}

/// What a sync run did.
#[derive(Debug, Default)]
pub struct Report {
    versions: HashMap<ResourceKind, u64>,
    pub downloads: u64,
    pub placements: Placements,
    /// Scopes that were skipped, in the order they failed.
    pub failures: Vec<Failure>,
}

impl Report {
    /// New metadata versions recorded for `kind`.
    pub fn versions(&self, kind: ResourceKind) -> u64 {
        self.versions.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_versions(&self) -> u64 {
        self.versions.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record_version(&mut self, kind: ResourceKind) {
        *self.versions.entry(kind).or_default() += 1;
    }

    pub(crate) fn record_placement(&mut self, placement: Placement) {
        let counter = match placement {
            Placement::Created => &mut self.placements.created,
            Placement::Unchanged => &mut self.placements.unchanged,
            Placement::Added => &mut self.placements.added,
            Placement::Migrated => &mut self.placements.migrated,
        };
        *counter += 1;
    }

    /// Record a recoverable failure of `scope` and carry on; fatal errors
    /// are handed back to stop the run.
    pub(crate) fn isolate(&mut self, scope: Scope, result: Result<()>) -> Result<()> {
        match result {
            Err(error) if !error.is_fatal() => {
                tracing::warn!(%scope, error = ?error, "Skipping after failure");
                self.failures.push(Failure { scope, error });
                Ok(())
            },
            other => other,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} new versions (", self.total_versions())?;
        for (i, kind) in ResourceKind::ALL.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}: {}", self.versions(kind))?;
        }
        write!(
            f,
            "), {} downloads, {} written to disk ({} migrated), {} identical, {} failures",
            self.downloads,
            self.placements.written(),
            self.placements.migrated,
            self.placements.unchanged,
            self.failures.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_isolate() {
        let mut report = Report::default();
        assert!(report.isolate(Scope::File(1), Ok(())).is_ok());
        assert!(report.isolate(Scope::File(2), Err(exn::Exn::from(ErrorKind::Download))).is_ok());
        let err = report.isolate(Scope::File(3), Err(exn::Exn::from(ErrorKind::Store))).unwrap_err();
        assert_eq!(*err, ErrorKind::Store);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].scope, Scope::File(2));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_summary() {
        let mut report = Report::default();
        report.record_version(ResourceKind::File);
        report.record_version(ResourceKind::File);
        report.record_version(ResourceKind::Course);
        report.record_placement(Placement::Created);
        report.record_placement(Placement::Migrated);
        report.downloads = 2;
        assert_eq!(report.versions(ResourceKind::File), 2);
        assert_eq!(report.versions(ResourceKind::Module), 0);
        assert_eq!(
            report.to_string(),
            "3 new versions (course: 1, folder: 0, file: 2, module: 0, module item: 0), \
             2 downloads, 2 written to disk (1 migrated), 0 identical, 0 failures"
        );
    }
}
