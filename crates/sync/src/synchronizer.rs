use crate::error::{self, ErrorKind, Result};
use crate::report::{Report, Scope};
use exn::ResultExt;
use futures::StreamExt;
use mirror_files::{Layout, Mirror, qualify, sanitize};
use mirror_remote::Client;
use mirror_remote::models::{Course, File, Folder, Record};
use mirror_store::resource::{ModuleId, ModuleItemId, Resource};
use mirror_store::{Outcome, Store, Table};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::pin::pin;

/// Walks every course the account can see, recording metadata history and
/// mirroring file contents.
///
/// Work is strictly sequential: one request in flight at a time.
#[derive(Debug)]
pub struct Synchronizer {
    client: Client,
    store: Store,
    mirror: Mirror,
}

async fn record<R: Resource>(table: &Table<R>, id: &R::Id, raw: &Value, report: &mut Report) -> Result<Outcome> {
    let outcome = table.insert(id, raw, false).await.or_raise(|| ErrorKind::Store)?;
    if outcome.written {
        tracing::debug!(kind = %R::KIND, ?id, version = outcome.version, "Recorded new version");
        report.record_version(R::KIND);
    }
    Ok(outcome)
}

impl Synchronizer {
    pub fn new(client: Client, store: Store, mirror: Mirror) -> Self {
        Self { client, store, mirror }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Run one full pass over the remote site.
    ///
    /// Only a failure to list courses, or a store or mirror I/O failure,
    /// ends the run with an error. Anything else skips the affected scope
    /// and is listed in [`Report::failures`].
    pub async fn run(&self) -> Result<Report> {
        let mut report = Report::default();
        let mut courses = pin!(self.client.list_courses());
        while let Some(course) = courses.next().await {
            let course = course.or_raise(|| ErrorKind::Courses)?;
            self.course(course, &mut report).await?;
        }
        tracing::info!(%report, "Sync finished");
        Ok(report)
    }

    #[tracing::instrument(skip_all, fields(course = course.id))]
    async fn course(&self, course: Record<Course>, report: &mut Report) -> Result<()> {
        let course_id = course.id;
        tracing::info!(name = course.name.as_deref().unwrap_or_default(), "Syncing course");
        record(self.store.courses(), &course_id, course.raw(), report).await?;

        let result = self.modules(course_id, report).await;
        report.isolate(Scope::Modules(course_id), result)?;
        let result = self.folders(course_id, report).await;
        report.isolate(Scope::Folders(course_id), result)?;
        Ok(())
    }

    async fn modules(&self, course_id: u64, report: &mut Report) -> Result<()> {
        let mut modules = pin!(self.client.list_modules(course_id));
        while let Some(module) = modules.next().await {
            let module = module.or_raise(|| ErrorKind::Remote)?;
            let module_id = module.id;
            record(self.store.modules(), &ModuleId { id: module_id, course_id }, module.raw(), report).await?;
            let result = self.module_items(course_id, module_id, report).await;
            report.isolate(Scope::ModuleItems { course_id, module_id }, result)?;
        }
        Ok(())
    }

    async fn module_items(&self, course_id: u64, module_id: u64, report: &mut Report) -> Result<()> {
        let mut items = pin!(self.client.list_module_items(course_id, module_id));
        while let Some(item) = items.next().await {
            let item = item.or_raise(|| ErrorKind::Remote)?;
            let id = ModuleItemId {
                id: item.id,
                course_id,
                module_id,
            };
            record(self.store.module_items(), &id, item.raw(), report).await?;
        }
        Ok(())
    }

    /// Breadth-first walk of the course's folder tree, starting at its root
    /// folder. Files land under `<course id>/<root folder>/<subfolders...>`.
    async fn folders(&self, course_id: u64, report: &mut Report) -> Result<()> {
        let root = self.client.root_folder(course_id).await.or_raise(|| ErrorKind::Remote)?;
        let base = PathBuf::from(course_id.to_string()).join(sanitize(&root.name));
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([(root, base)]);
        while let Some((folder, dir)) = queue.pop_front() {
            if !seen.insert(folder.id) {
                tracing::warn!(folder = folder.id, "Folder seen twice, skipping");
                continue;
            }
            record(self.store.folders(), &folder.id, folder.raw(), report).await?;

            let result = self.subfolders(&folder, &dir, &mut queue).await;
            report.isolate(Scope::Subfolders(folder.id), result)?;
            let result = self.files(folder.id, &dir, report).await;
            report.isolate(Scope::Files(folder.id), result)?;
        }
        Ok(())
    }

    async fn subfolders(
        &self,
        parent: &Folder,
        dir: &Path,
        queue: &mut VecDeque<(Record<Folder>, PathBuf)>,
    ) -> Result<()> {
        let mut subfolders = pin!(self.client.list_subfolders(parent.id));
        while let Some(folder) = subfolders.next().await {
            let folder = folder.or_raise(|| ErrorKind::Remote)?;
            let path = dir.join(sanitize(&folder.name));
            queue.push_back((folder, path));
        }
        Ok(())
    }

    async fn files(&self, folder_id: u64, dir: &Path, report: &mut Report) -> Result<()> {
        let mut files = pin!(self.client.list_folder_files(folder_id));
        while let Some(file) = files.next().await {
            let file = file.or_raise(|| ErrorKind::Remote)?;
            let id = file.id;
            let result = self.file(file, dir, report).await;
            report.isolate(Scope::File(id), result)?;
        }
        Ok(())
    }

    /// Download a file only if its metadata would produce a new version, and
    /// record that version only once the download is safely on disk. A failed
    /// download therefore gets retried on the next run.
    #[tracing::instrument(skip_all, fields(file = file.id))]
    async fn file(&self, file: Record<File>, dir: &Path, report: &mut Report) -> Result<()> {
        let table = self.store.files();
        let predicted = table.insert(&file.id, file.raw(), true).await.or_raise(|| ErrorKind::Store)?;
        if predicted.written {
            match file.download_url() {
                Some(url) => {
                    let path = dir.join(sanitize(&file.filename));
                    self.download(file.id, url, &path, predicted.version, report).await?;
                },
                None => tracing::debug!("No download link, recording metadata only"),
            }
        }
        record(table, &file.id, file.raw(), report).await?;
        Ok(())
    }

    async fn download(&self, id: u64, url: &str, path: &Path, version: u32, report: &mut Report) -> Result<()> {
        let url = self.client.resolve(url).or_raise(|| ErrorKind::Download)?;
        let previous = self.store.files().current(&id).await.or_raise(|| ErrorKind::Store)?.map(|c| c.version);
        let path = &self.local_path(id, path, previous).await?;

        let mut chunks = self.client.download(&url).await.or_raise(|| ErrorKind::Download)?;
        let mut staging = self.mirror.stage(path).await.map_err(error::mirror)?;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.or_raise(|| ErrorKind::Download)?;
            staging.write(&chunk).await.map_err(error::mirror)?;
        }
        let staged = staging.finish().await.map_err(error::mirror)?;
        let size = staged.size();
        report.downloads += 1;

        let placement = self.mirror.place(path, staged, version, previous).await.map_err(error::mirror)?;
        tracing::info!(path = %path.display(), version, size, ?placement, "Downloaded file");
        report.record_placement(placement);
        Ok(())
    }

    /// Two remote files can share a name, e.g. after one is deleted and a
    /// replacement uploaded under a new id. Whichever reached the mirror
    /// first keeps the plain name; the other is mirrored under
    /// [`qualify`]'d name from its first download on.
    async fn local_path(&self, id: u64, path: &Path, previous: Option<u32>) -> Result<PathBuf> {
        let qualified = qualify(path, id);
        if !matches!(self.mirror.layout(&qualified).await.map_err(error::mirror)?, Layout::Missing) {
            return Ok(qualified);
        }
        if previous.is_none() && !matches!(self.mirror.layout(path).await.map_err(error::mirror)?, Layout::Missing) {
            tracing::info!(path = %path.display(), qualified = %qualified.display(), "Name already taken, qualifying with id");
            return Ok(qualified);
        }
        Ok(path.to_path_buf())
    }
}
