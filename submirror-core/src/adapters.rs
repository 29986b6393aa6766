//! Default port implementations: the course service over HTTP, the `svn` client, the local
//! filesystem, and in-memory doubles for embedding and testing.

use crate::feed::parse_course_feed;
use crate::ports::{MetadataError, MetadataSource, RepositoryPort, WritePort};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::{BTreeMap, BTreeSet};
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use submirror_domain::{Layout, RepositoryListing};
use submirror_types::CourseId;
use submirror_types::error::RepositoryError;
use submirror_types::model::CourseSnapshot;
use submirror_types::plan::{Checkout, Revision};
use tracing::{debug, warn};
use url::Url;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// svn error codes meaning "no such path in this repository".
const SVN_PATH_NOT_FOUND: &[&str] = &["E170000", "E160013"];

/// Course service client: `GET <url>/course/<id>?format=json` with basic auth.
#[derive(Clone)]
pub struct HttpMetadataSource {
    base: Url,
    username: String,
    password: String,
    client: reqwest::blocking::Client,
}

impl HttpMetadataSource {
    pub fn new(url: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let base = Url::parse(url).with_context(|| format!("parse course service url {}", url))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("submirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            base,
            username: username.to_string(),
            password: password.to_string(),
            client,
        })
    }

    fn course_url(&self, course: &CourseId) -> Result<Url, MetadataError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| MetadataError::Fetch(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .push("course")
            .push(course.as_str());
        url.query_pairs_mut().append_pair("format", "json");
        Ok(url)
    }
}

impl MetadataSource for HttpMetadataSource {
    fn load_course(&self, course: &CourseId) -> Result<CourseSnapshot, MetadataError> {
        let url = self.course_url(course)?;
        debug!(course = %course, url = %url, "fetching course");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|e| MetadataError::Fetch(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(MetadataError::Authentication(format!(
                "course service answered {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(MetadataError::Fetch(format!(
                "course service answered {}",
                status
            )));
        }

        let body = response
            .text()
            .map_err(|e| MetadataError::Fetch(e.to_string()))?;
        parse_course_feed(course, &body).map_err(|e| MetadataError::Parse(format!("{:#}", e)))
    }
}

/// Fields of `svn info` output the adapter needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvnInfo {
    pub url: Option<String>,
    pub revision: Option<Revision>,
}

pub fn parse_info(stdout: &str) -> SvnInfo {
    let mut info = SvnInfo::default();
    for line in stdout.lines() {
        if let Some(url) = line.strip_prefix("URL:") {
            info.url = Some(url.trim().to_string());
        } else if let Some(rev) = line.strip_prefix("Revision:") {
            info.revision = rev.trim().parse::<u64>().ok().map(Revision);
        }
    }
    info
}

/// Repository access through the `svn` command-line client.
///
/// Every invocation is non-interactive and never caches credentials.
#[derive(Clone)]
pub struct SvnRepository {
    base: Url,
    username: String,
    password: String,
    program: String,
}

impl std::fmt::Debug for SvnRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvnRepository")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .field("program", &self.program)
            .finish()
    }
}

enum SvnFailure {
    NotFound,
    Other(String),
}

impl SvnRepository {
    pub fn new(base: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base).with_context(|| format!("parse repository url {}", base))?;
        Ok(Self {
            base,
            username: username.to_string(),
            password: password.to_string(),
            program: "svn".to_string(),
        })
    }

    /// Use another client binary (a wrapper script, a pinned version).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn repository_url(&self, repository: &str, subpath: &str) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("{} cannot be a base url", self.base))?;
            segments.pop_if_empty().push(repository);
            for part in subpath.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
        }
        Ok(url)
    }

    fn svn(&self, args: &[&str]) -> Result<String, SvnFailure> {
        debug!(program = %self.program, args = %args.join(" "), "svn");
        let output = Command::new(&self.program)
            .args([
                "--non-interactive",
                "--no-auth-cache",
                "--username",
                self.username.as_str(),
                "--password",
                self.password.as_str(),
            ])
            .args(args)
            .output()
            .map_err(|e| SvnFailure::Other(format!("run {}: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if SVN_PATH_NOT_FOUND.iter().any(|code| stderr.contains(code)) {
            Err(SvnFailure::NotFound)
        } else if stderr.is_empty() {
            Err(SvnFailure::Other(format!("svn exited with {}", output.status)))
        } else {
            Err(SvnFailure::Other(stderr))
        }
    }

    fn unavailable(repository: &str, message: impl Into<String>) -> RepositoryError {
        RepositoryError::Unavailable {
            repository: repository.to_string(),
            message: message.into(),
        }
    }

    fn classify(repository: &str, subpath: &str, failure: SvnFailure) -> RepositoryError {
        match failure {
            SvnFailure::NotFound => RepositoryError::PathNotFound {
                repository: repository.to_string(),
                subpath: subpath.to_string(),
            },
            SvnFailure::Other(message) => Self::unavailable(repository, message),
        }
    }

    fn list(&self, url: &Url) -> anyhow::Result<Vec<String>> {
        let out = self.svn(&["list", url.as_str()]).map_err(|f| match f {
            SvnFailure::NotFound => anyhow::anyhow!("{} does not exist", url),
            SvnFailure::Other(message) => anyhow::anyhow!(message),
        })?;
        Ok(out
            .lines()
            .filter_map(|l| l.trim().strip_suffix('/'))
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn same_url(a: &str, b: &Url) -> bool {
    match Url::parse(a) {
        Ok(a) => a.as_str().trim_end_matches('/') == b.as_str().trim_end_matches('/'),
        Err(_) => false,
    }
}

impl RepositoryPort for SvnRepository {
    fn remote_head(&self, repository: &str) -> Result<Revision, RepositoryError> {
        let url = self
            .repository_url(repository, "")
            .map_err(|e| Self::unavailable(repository, format!("{:#}", e)))?;
        let out = self
            .svn(&["info", url.as_str()])
            .map_err(|f| Self::classify(repository, "", f))?;
        parse_info(&out)
            .revision
            .ok_or_else(|| Self::unavailable(repository, "svn info printed no revision"))
    }

    fn local_revision(&self, checkout: &Checkout) -> anyhow::Result<Option<Revision>> {
        if !checkout.local_dir.join(".svn").is_dir() {
            return Ok(None);
        }
        let expected = self.repository_url(&checkout.repository, &checkout.subpath)?;
        let out = match self.svn(&["info", checkout.local_dir.as_str()]) {
            Ok(out) => out,
            Err(SvnFailure::NotFound) => return Ok(None),
            Err(SvnFailure::Other(message)) => {
                anyhow::bail!("svn info {}: {}", checkout.local_dir, message)
            }
        };
        let info = parse_info(&out);
        match info.url.as_deref() {
            Some(url) if same_url(url, &expected) => Ok(info.revision),
            found => {
                debug!(
                    dir = %checkout.local_dir,
                    expected = %expected,
                    found = found.unwrap_or("-"),
                    "working copy points elsewhere"
                );
                Ok(None)
            }
        }
    }

    fn checkout_or_update(&self, checkout: &Checkout) -> Result<Revision, RepositoryError> {
        let repository = checkout.repository.as_str();
        let url = self
            .repository_url(repository, &checkout.subpath)
            .map_err(|e| Self::unavailable(repository, format!("{:#}", e)))?;
        self.svn(&["checkout", "--force", url.as_str(), checkout.local_dir.as_str()])
            .map_err(|f| Self::classify(repository, &checkout.subpath, f))?;
        let out = self
            .svn(&["info", checkout.local_dir.as_str()])
            .map_err(|f| Self::classify(repository, &checkout.subpath, f))?;
        parse_info(&out).revision.ok_or_else(|| {
            Self::unavailable(
                repository,
                format!("no revision in working copy {}", checkout.local_dir),
            )
        })
    }

    fn list_dirs(&self, repository: &str) -> anyhow::Result<Vec<String>> {
        let root = self.repository_url(repository, "")?;
        let mut out = Vec::new();
        for top in self.list(&root)? {
            let nested = self.repository_url(repository, &top)?;
            let children = self.list(&nested).unwrap_or_else(|err| {
                warn!(repository = %repository, dir = %top, error = %err, "cannot list directory");
                Vec::new()
            });
            out.push(top.clone());
            out.extend(children.into_iter().map(|c| format!("{}/{}", top, c)));
        }
        Ok(out)
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}

/// Link candidates from an earlier unsorted checkout when one exists, otherwise from the server.
pub struct WorkingCopyListing {
    layout: Layout,
    repository: Arc<dyn RepositoryPort>,
}

impl WorkingCopyListing {
    pub fn new(layout: Layout, repository: Arc<dyn RepositoryPort>) -> Self {
        Self { layout, repository }
    }

    fn local_dirs(root: &Utf8Path) -> anyhow::Result<Vec<String>> {
        let mut out = Vec::new();
        for top in subdirs(root)? {
            let nested = subdirs(&root.join(&top))?;
            out.push(top.clone());
            out.extend(nested.into_iter().map(|n| format!("{}/{}", top, n)));
        }
        Ok(out)
    }
}

fn subdirs(dir: &Utf8Path) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string()
            && name != ".svn"
        {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

impl RepositoryListing for WorkingCopyListing {
    fn list_dirs(&self, repository: &str) -> anyhow::Result<Vec<String>> {
        let local = self.layout.unsorted_dir(repository);
        if local.is_dir() {
            debug!(repository = %repository, dir = %local, "listing unsorted checkout");
            return Self::local_dirs(&local).with_context(|| format!("list {}", local));
        }
        self.repository.list_dirs(repository)
    }
}

/// In-memory course service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataSource {
    courses: BTreeMap<CourseId, Result<CourseSnapshot, MetadataError>>,
}

impl InMemoryMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(mut self, snapshot: CourseSnapshot) -> Self {
        self.courses
            .insert(snapshot.course.id.clone(), Ok(snapshot));
        self
    }

    pub fn with_failure(mut self, course: CourseId, error: MetadataError) -> Self {
        self.courses.insert(course, Err(error));
        self
    }
}

impl MetadataSource for InMemoryMetadataSource {
    fn load_course(&self, course: &CourseId) -> Result<CourseSnapshot, MetadataError> {
        self.courses
            .get(course)
            .cloned()
            .unwrap_or_else(|| Err(MetadataError::Fetch(format!("unknown course {}", course))))
    }
}

#[derive(Debug, Default)]
struct MemoryRepoState {
    heads: BTreeMap<String, Revision>,
    unavailable: BTreeMap<String, String>,
    missing: BTreeSet<(String, String)>,
    working_copies: BTreeMap<Utf8PathBuf, (Checkout, Revision)>,
    unreadable: BTreeMap<Utf8PathBuf, String>,
    dirs: BTreeMap<String, Vec<String>>,
    fetches: Vec<Checkout>,
}

/// In-memory repository server plus working copies. Fetches are recorded, nothing touches disk.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryRepoState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryRepoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_head(self, repository: &str, head: u64) -> Self {
        self.set_head(repository, head);
        self
    }

    pub fn with_unavailable(self, repository: &str, message: &str) -> Self {
        self.set_unavailable(repository, message);
        self
    }

    pub fn with_missing_path(self, repository: &str, subpath: &str) -> Self {
        self.set_missing_path(repository, subpath);
        self
    }

    pub fn with_working_copy(self, checkout: Checkout, revision: u64) -> Self {
        self.set_working_copy(checkout, revision);
        self
    }

    pub fn with_dirs(self, repository: &str, dirs: &[&str]) -> Self {
        self.state().dirs.insert(
            repository.to_string(),
            dirs.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    pub fn set_head(&self, repository: &str, head: u64) {
        self.state()
            .heads
            .insert(repository.to_string(), Revision(head));
    }

    pub fn set_unavailable(&self, repository: &str, message: &str) {
        self.state()
            .unavailable
            .insert(repository.to_string(), message.to_string());
    }

    pub fn set_missing_path(&self, repository: &str, subpath: &str) {
        self.state()
            .missing
            .insert((repository.to_string(), subpath.to_string()));
    }

    /// Revision queries for `local_dir` fail with `message`.
    pub fn set_unreadable(&self, local_dir: &Utf8Path, message: &str) {
        self.state()
            .unreadable
            .insert(local_dir.to_path_buf(), message.to_string());
    }

    pub fn set_working_copy(&self, checkout: Checkout, revision: u64) {
        self.state().working_copies.insert(
            checkout.local_dir.clone(),
            (checkout, Revision(revision)),
        );
    }

    /// Checkouts fetched so far, in call order.
    pub fn fetches(&self) -> Vec<Checkout> {
        self.state().fetches.clone()
    }

    pub fn working_copy(&self, local_dir: &Utf8Path) -> Option<(Checkout, Revision)> {
        self.state().working_copies.get(local_dir).cloned()
    }
}

impl RepositoryPort for InMemoryRepository {
    fn remote_head(&self, repository: &str) -> Result<Revision, RepositoryError> {
        let state = self.state();
        if let Some(message) = state.unavailable.get(repository) {
            return Err(RepositoryError::Unavailable {
                repository: repository.to_string(),
                message: message.clone(),
            });
        }
        state
            .heads
            .get(repository)
            .copied()
            .ok_or_else(|| RepositoryError::Unavailable {
                repository: repository.to_string(),
                message: "no such repository".to_string(),
            })
    }

    fn local_revision(&self, checkout: &Checkout) -> anyhow::Result<Option<Revision>> {
        let state = self.state();
        if let Some(message) = state.unreadable.get(&checkout.local_dir) {
            anyhow::bail!("svn info {}: {}", checkout.local_dir, message);
        }
        Ok(state
            .working_copies
            .get(&checkout.local_dir)
            .filter(|(wc, _)| wc.repository == checkout.repository && wc.subpath == checkout.subpath)
            .map(|(_, rev)| *rev))
    }

    fn checkout_or_update(&self, checkout: &Checkout) -> Result<Revision, RepositoryError> {
        let head = self.remote_head(&checkout.repository)?;
        let mut state = self.state();
        if state
            .missing
            .contains(&(checkout.repository.clone(), checkout.subpath.clone()))
        {
            return Err(RepositoryError::PathNotFound {
                repository: checkout.repository.clone(),
                subpath: checkout.subpath.clone(),
            });
        }
        state.fetches.push(checkout.clone());
        state
            .working_copies
            .insert(checkout.local_dir.clone(), (checkout.clone(), head));
        Ok(head)
    }

    fn list_dirs(&self, repository: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.state().dirs.get(repository).cloned().unwrap_or_default())
    }
}
