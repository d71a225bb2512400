use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, trace, warn};

use crate::config::LauncherConfig;
use crate::error::{Error, Result, SharedError};
use crate::maven::coordinates::{Artifact, Status};
use crate::maven::metadata_xml::Metadata;
use crate::maven::paths::as_metadata_path;
use crate::repo::cache::{CacheRecord, LocalCache, StoredFile};
use crate::repo::descriptor::{RepositoryDescriptor, RepositoryRegistry};
use crate::repo::transport::{Fetched, FileTransport, HttpTransport, Transport};
use crate::util::checksum::{parse_hex_hash, ChecksumValidator, Md5Validator, Sha1Validator};
use crate::util::retry::{with_retry, RetryPolicy};
use crate::util::validating_stream::ValidatingStream;
use crate::vault::Vault;

enum FetchOutcome {
    Stored(StoredFile),
    NotModified,
    NotFound,
}

/// Performs the actual network and cache interaction for artifacts, trying the configured
///  repositories in priority order.
///
/// Every method records its outcome on the artifact (status, origin, file, counters) and returns
///  the recorded error on failure.
pub struct RepositoryConnector {
    config: Arc<LauncherConfig>,
    registry: RepositoryRegistry,
    cache: LocalCache,
    retry_policy: RetryPolicy,
    http: Arc<dyn Transport>,
    file: Arc<dyn Transport>,
    /// canonical paths that failed verification in this run
    invalid: Mutex<HashMap<String, SharedError>>,
    /// snapshot metadata that was fetched from a repository in this run
    checked_metadata: Mutex<HashSet<String>>,
}
impl RepositoryConnector {
    pub fn new(config: Arc<LauncherConfig>, vault: Arc<dyn Vault>) -> Result<RepositoryConnector> {
        let http = Arc::new(HttpTransport::new(vault, config.timeout()));
        Self::with_transports(config, http, Arc::new(FileTransport::new()))
    }

    pub fn with_transports(config: Arc<LauncherConfig>, http: Arc<dyn Transport>, file: Arc<dyn Transport>) -> Result<RepositoryConnector> {
        Ok(RepositoryConnector {
            registry: RepositoryRegistry::new(&config.repositories)?,
            cache: LocalCache::new(config.cache.clone()),
            retry_policy: config.retry_policy(),
            config,
            http,
            file,
            invalid: Mutex::new(HashMap::new()),
            checked_metadata: Mutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    /// For a snapshot, determines the timestamped version of its latest build from the
    ///  repositories' metadata. Within the update interval, or when offline, the cached metadata is
    ///  used without contacting the repository. No-op for releases and explicitly timestamped
    ///  snapshots.
    ///
    /// Returns an error only if no repository provided usable metadata and at least one of them
    ///  failed; the artifact's status is not changed either way.
    pub async fn resolve_snapshot_version(&self, artifact: &Artifact) -> Result<()> {
        let artifact_ref = match artifact.maven_ref() {
            Some(r) if r.coordinates.version.is_snapshot() => r,
            _ => return Ok(()),
        };
        if let Some(pinned) = artifact.state().resolved_snapshot_version {
            trace!("{} is pinned to {}", artifact_ref.as_string(), pinned);
            return Ok(());
        }

        let metadata_path = as_metadata_path(artifact_ref);
        let mut last_error = None;

        for repository in self.registry.iter() {
            let xml = match self.snapshot_metadata(artifact, repository, &metadata_path).await {
                Ok(Some(xml)) => xml,
                Ok(None) => continue,
                Err(e) => {
                    debug!("cannot get {} from {}: {}", metadata_path, repository.id, e);
                    last_error = Some(e);
                    continue;
                }
            };

            match Metadata::parse(&xml) {
                Ok(metadata) => {
                    if let Some(version) = metadata.resolve_snapshot_version(artifact_ref) {
                        debug!("{} -> {} ({})", artifact_ref.as_string(), version, repository.id);
                        artifact.update(|s| {
                            s.resolved_snapshot_version = Some(version);
                            s.repository_id = Some(repository.id.clone());
                        });
                        return Ok(());
                    }
                }
                Err(e) => warn!("ignoring invalid {} from {}: {}", metadata_path, repository.id, e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Metadata for one repository: the cached copy if it is recent enough, a fresh copy otherwise
    async fn snapshot_metadata(&self, artifact: &Artifact, repository: &RepositoryDescriptor, metadata_path: &str) -> Result<Option<String>> {
        let local = self.cache.metadata_path_for(metadata_path, &repository.id);
        let last_checked = self.cache.modified(&local).await
            .map(DateTime::<Utc>::from);

        if let Some(last_checked) = last_checked {
            let use_cached = self.config.offline
                || (!self.config.ignore_cache && (!self.config.update_snapshots || self.is_fresh(last_checked)));
            if use_cached {
                trace!("using cached {}", local.display());
                return Ok(Some(tokio::fs::read_to_string(&local).await?));
            }
        }
        if self.config.offline {
            return Ok(None);
        }

        let transport = self.transport(repository);
        let fetched = self.attempt(artifact, || async move {
            match transport.fetch(repository, metadata_path, None).await? {
                Fetched::Found(blob) => Ok(Some(blob.into_bytes().await?)),
                _ => Ok(None),
            }
        }).await;

        match fetched {
            Ok(Some(bytes)) => {
                self.cache.store_bytes(&local, bytes.clone()).await?;
                self.lock_checked().insert(metadata_path.to_string());
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            Ok(None) => Ok(None),
            Err(e) if last_checked.is_some() => {
                warn!("cannot update {} from {}, using cached copy: {}", metadata_path, repository.id, e);
                Ok(Some(tokio::fs::read_to_string(&local).await?))
            }
            Err(e) => Err(e),
        }
    }

    /// Determines whether (and where) the artifact exists without transferring its content. A
    ///  cached copy is sufficient; otherwise the repositories are queried in priority order.
    pub async fn resolve(&self, artifact: &Artifact) -> Result<()> {
        if artifact.maven_ref().is_none() {
            return Ok(());
        }
        artifact.set_status(Status::Resolving);

        let snapshot_error = self.resolve_snapshot_version(artifact).await.err();
        let canonical = self.canonical_path(artifact)?;

        if let Some(e) = self.invalid_error(&canonical) {
            return Err(self.fail(artifact, Status::Invalid, Error::Shared(e)));
        }

        if !self.config.ignore_cache && self.cache.file_size(&canonical).await?.is_some() {
            let record = self.cache.read_record(&canonical).await;
            artifact.update(|s| {
                s.status = Status::Resolved;
                if let Some(record) = record {
                    s.repository_id.get_or_insert(record.repository_id);
                    s.source = Some(record.source);
                }
            });
            debug!("{} resolved from cache", artifact);
            return Ok(());
        }

        if self.config.offline {
            return Err(self.fail(artifact, Status::NotFound, Error::NotFoundInAnyRepository(artifact.to_string())));
        }

        let preferred = artifact.state().repository_id;
        let mut last_error = None;
        for repository in self.registry.ordered(preferred.as_deref()) {
            let transport = self.transport(repository);
            let path = canonical.as_str();

            match self.attempt(artifact, || async move { transport.exists(repository, path).await }).await {
                Ok(true) => {
                    artifact.update(|s| {
                        s.status = Status::Resolved;
                        s.repository_id = Some(repository.id.clone());
                        s.source = Some(format!("{}{}", repository.url, path));
                    });
                    debug!("{} resolved in {}", artifact, repository.id);
                    return Ok(());
                }
                Ok(false) => trace!("{} not in {}", artifact, repository.id),
                Err(e) => {
                    debug!("cannot query {} for {}: {}", repository.id, artifact, e);
                    last_error = Some(e);
                }
            }
        }

        let e = last_error
            .or(snapshot_error)
            .unwrap_or_else(|| Error::NotFoundInAnyRepository(artifact.to_string()));
        Err(self.fail(artifact, Status::NotFound, e))
    }

    /// Materializes the artifact's content in the local cache, applying the offline, cache and
    ///  update policies. A download failing verification leaves nothing in the cache, and the path
    ///  is answered `Invalid` for the rest of the run.
    pub async fn download(&self, artifact: &Artifact) -> Result<()> {
        if artifact.maven_ref().is_none() {
            return Ok(());
        }
        if let Some(e) = artifact.error() {
            return Err(Error::Shared(e));
        }

        let canonical = self.canonical_path(artifact)?;
        if let Some(e) = self.invalid_error(&canonical) {
            return Err(self.fail(artifact, Status::Invalid, Error::Shared(e)));
        }

        let cached_size = if self.config.ignore_cache {
            None
        }
        else {
            self.cache.file_size(&canonical).await?
        };

        if self.config.offline {
            return match cached_size {
                Some(size) => {
                    let record = self.cache.read_record(&canonical).await;
                    self.use_cached(artifact, &canonical, size, record, Status::Offline);
                    Ok(())
                }
                None => Err(self.fail(artifact, Status::NotFound, Error::NotFoundInAnyRepository(artifact.to_string()))),
            };
        }

        let mut if_modified_since = None;
        let mut record = None;
        if let Some(size) = cached_size {
            record = self.cache.read_record(&canonical).await;

            let state = artifact.state();
            if artifact.is_snapshot() && state.resolved_snapshot_version.is_some() {
                // a timestamped build never changes
                let status = if self.was_checked(artifact) { Status::NotModified } else { Status::Cached };
                self.use_cached(artifact, &canonical, size, record, status);
                return Ok(());
            }

            let updatable = if artifact.is_snapshot() { self.config.update_snapshots } else { self.config.update_releases };
            let last_checked = match &record {
                Some(r) => Some(r.last_checked),
                None => self.cache.modified(&self.cache.path_for(&canonical)).await.map(DateTime::<Utc>::from),
            };
            if !updatable || last_checked.map(|t| self.is_fresh(t)).unwrap_or(false) {
                self.use_cached(artifact, &canonical, size, record, Status::Cached);
                return Ok(());
            }
            if_modified_since = last_checked;
        }
        else if self.config.skip_download {
            artifact.set_status(Status::Downloadable);
            debug!("{} is not cached, skipping download", artifact);
            return Ok(());
        }

        artifact.set_status(Status::Downloading);
        let preferred = artifact.state().repository_id;
        let mut last_error = None;

        for repository in self.registry.ordered(preferred.as_deref()) {
            match self.fetch_from(artifact, repository, &canonical, if_modified_since).await {
                Ok(FetchOutcome::NotFound) => trace!("{} not in {}", artifact, repository.id),
                Ok(FetchOutcome::NotModified) => {
                    debug!("{} not modified in {}", artifact, repository.id);
                    let record = match record {
                        Some(mut r) => {
                            r.last_checked = Utc::now();
                            self.write_record(&canonical, &r).await;
                            Some(r)
                        }
                        None => None,
                    };
                    self.use_cached(artifact, &canonical, cached_size.unwrap_or(0), record, Status::NotModified);
                    return Ok(());
                }
                Ok(FetchOutcome::Stored(stored)) => {
                    let source = format!("{}{}", repository.url, canonical);
                    self.write_record(&canonical, &CacheRecord {
                        repository_id: repository.id.clone(),
                        source: source.clone(),
                        sha1: hex::encode(stored.sha1),
                        last_checked: Utc::now(),
                    }).await;

                    artifact.update(|s| {
                        s.status = if stored.replaced { Status::Updated } else { Status::Downloaded };
                        s.repository_id = Some(repository.id.clone());
                        s.source = Some(source);
                        s.file = Some(stored.path);
                        s.size = stored.size;
                    });
                    return Ok(());
                }
                Err(e) if e.is_checksum_mismatch() => {
                    let e = artifact.fail(Status::Invalid, e);
                    warn!("{}", e);
                    self.lock_invalid().insert(canonical, e.clone());
                    return Err(Error::Shared(e));
                }
                Err(e) => {
                    debug!("cannot download {} from {}: {}", artifact, repository.id, e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(size) = cached_size {
            // revalidation failed, but the cached copy is still usable
            if let Some(e) = &last_error {
                warn!("cannot check {} for updates, using cached copy: {}", artifact, e);
            }
            self.use_cached(artifact, &canonical, size, record, Status::Cached);
            return Ok(());
        }

        let e = last_error.unwrap_or_else(|| Error::NotFoundInAnyRepository(artifact.to_string()));
        Err(self.fail(artifact, Status::NotFound, e))
    }

    async fn fetch_from(&self, artifact: &Artifact, repository: &RepositoryDescriptor, canonical: &str, if_modified_since: Option<DateTime<Utc>>) -> Result<FetchOutcome> {
        let transport = self.transport(repository);
        let label = artifact.to_string();

        self.attempt(artifact, || {
            let label = label.clone();
            async move {
                let blob = match transport.fetch(repository, canonical, if_modified_since).await? {
                    Fetched::NotFound => return Ok(FetchOutcome::NotFound),
                    Fetched::NotModified => return Ok(FetchOutcome::NotModified),
                    Fetched::Found(blob) => blob,
                };

                let validators = self.validators(artifact, repository, canonical, blob.sha1, blob.md5).await?;
                let data = ValidatingStream::new(blob.data, label, validators)
                    .inspect(move |chunk| {
                        if let Ok(chunk) = chunk {
                            artifact.update(|s| s.downloaded += chunk.len() as u64);
                        }
                    });

                Ok(FetchOutcome::Stored(self.cache.store(canonical, data).await?))
            }
        }).await
    }

    /// Checksum validators for a download: the SHA1 advertised in a response header or, failing
    ///  that, in a ".sha1" file next to the artifact, plus an advertised MD5.
    async fn validators(
        &self,
        artifact: &Artifact,
        repository: &RepositoryDescriptor,
        canonical: &str,
        sha1: Option<[u8; 20]>,
        md5: Option<[u8; 16]>,
    ) -> Result<Vec<Box<dyn ChecksumValidator>>> {
        if !self.config.verify {
            return Ok(vec![]);
        }

        let sha1 = match sha1 {
            Some(hash) => Some(hash),
            None => {
                artifact.count_request();
                match self.transport(repository).fetch(repository, &format!("{}.sha1", canonical), None).await? {
                    Fetched::Found(blob) => parse_hex_hash(&String::from_utf8_lossy(&blob.into_bytes().await?)),
                    _ => None,
                }
            }
        };

        let mut result: Vec<Box<dyn ChecksumValidator>> = vec![];
        match sha1 {
            Some(hash) => result.push(Box::new(Sha1Validator::new(hash))),
            None => warn!("no SHA1 checksum for {} in {}, accepting it unverified", artifact, repository.id),
        }
        if let Some(hash) = md5 {
            result.push(Box::new(Md5Validator::new(hash)));
        }
        Ok(result)
    }

    /// Runs a repository request with retries; every attempt counts as a request
    async fn attempt<T, F, Fut>(&self, artifact: &Artifact, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        with_retry(
            &self.retry_policy,
            |_| artifact.update(|s| {
                s.requests += 1;
                s.attempts += 1;
            }),
            operation,
        ).await
    }

    fn use_cached(&self, artifact: &Artifact, canonical: &str, size: u64, record: Option<CacheRecord>, status: Status) {
        let file: PathBuf = self.cache.path_for(canonical);
        artifact.update(|s| {
            s.status = status;
            s.file = Some(file);
            s.size = size;
            if let Some(record) = record {
                s.repository_id.get_or_insert(record.repository_id);
                s.source.get_or_insert(record.source);
            }
        });
        trace!("{} -> {:?}", artifact, status);
    }

    async fn write_record(&self, canonical: &str, record: &CacheRecord) {
        // the record only drives update checks, so the download stands without it
        if let Err(e) = self.cache.write_record(canonical, record).await {
            warn!("cannot write cache record for {}: {}", canonical, e);
        }
    }

    fn transport(&self, repository: &RepositoryDescriptor) -> &dyn Transport {
        if repository.is_local() {
            self.file.as_ref()
        }
        else {
            self.http.as_ref()
        }
    }

    fn canonical_path(&self, artifact: &Artifact) -> Result<String> {
        artifact.canonical_path()
            .ok_or_else(|| Error::MalformedCoordinate(artifact.to_string()))
    }

    fn fail(&self, artifact: &Artifact, status: Status, error: Error) -> Error {
        Error::Shared(artifact.fail(status, error))
    }

    fn is_fresh(&self, last_checked: DateTime<Utc>) -> bool {
        match Utc::now().signed_duration_since(last_checked).to_std() {
            Ok(age) => age < self.config.update_interval(),
            // checked "in the future", i.e. the clock was adjusted
            Err(_) => true,
        }
    }

    fn was_checked(&self, artifact: &Artifact) -> bool {
        artifact.maven_ref()
            .map(|r| self.lock_checked().contains(&as_metadata_path(r)))
            .unwrap_or(false)
    }

    fn invalid_error(&self, canonical: &str) -> Option<SharedError> {
        self.lock_invalid().get(canonical).cloned()
    }

    fn lock_invalid(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedError>> {
        self.invalid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_checked(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.checked_metadata.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
