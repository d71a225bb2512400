use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use futures_core::Stream;
use hyper::{Body, Client, Method, Request, Response, StatusCode, Uri};
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, HeaderMap, HeaderValue, IF_MODIFIED_SINCE, LOCATION, RANGE, USER_AGENT};
use hyper_tls::HttpsConnector;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::repo::descriptor::RepositoryDescriptor;
use crate::util::checksum::parse_hex_hash;
use crate::vault::{password_key, Vault};

/// Some repositories (Maven Central among them) refuse requests without a user agent
const USER_AGENT_VALUE: &str = concat!("maven-launcher/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 5;

/// Response body plus the checksums the repository advertised for it
pub struct Blob {
    pub data: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>,
    pub md5: Option<[u8; 16]>,
    pub sha1: Option<[u8; 20]>,
}
impl Blob {
    /// reads the entire body, for small files like metadata and checksum sidecars
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        self.data
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }
}

pub enum Fetched {
    Found(Blob),
    NotModified,
    NotFound,
}

/// Access to files in a repository, addressed by their repository-relative path
#[async_trait]
pub trait Transport: Send + Sync {
    /// Lightweight existence check that does not transfer the content
    async fn exists(&self, repository: &RepositoryDescriptor, path: &str) -> Result<bool>;

    async fn fetch(&self, repository: &RepositoryDescriptor, path: &str, if_modified_since: Option<DateTime<Utc>>) -> Result<Fetched>;
}

/// Transport for http(s) repositories.
///
/// Instances do HTTP connection caching internally, so keeping them alive has performance benefits.
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>>,
    vault: Arc<dyn Vault>,
    timeout: Duration,
}
impl HttpTransport {
    pub fn new(vault: Arc<dyn Vault>, timeout: Duration) -> HttpTransport {
        HttpTransport {
            client: Client::builder()
                .build::<_, Body>(HttpsConnector::new()),
            vault,
            timeout,
        }
    }

    fn request(&self, method: Method, uri: Uri, repository: &RepositoryDescriptor, if_modified_since: Option<DateTime<Utc>>, with_credentials: bool) -> Result<Request<Body>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, USER_AGENT_VALUE);

        if let Some(since) = if_modified_since {
            builder = builder.header(IF_MODIFIED_SINCE, since.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }

        match &repository.username {
            Some(username) if with_credentials => {
                let password = self.vault.get_property(&password_key(&repository.id));
                if password.is_none() {
                    debug!("no password for repository {}, authenticating as {} without one", repository.id, username);
                }
                let credentials = format!("{}:{}", username, password.unwrap_or_default());
                builder = builder.header(AUTHORIZATION, format!("Basic {}", STANDARD.encode(credentials)));
            }
            _ => {}
        }

        Ok(builder.body(Body::empty())?)
    }

    /// Sends a request for a repository path, following redirects. Credentials are sent only as
    ///  long as the redirects stay on the repository's own scheme and authority.
    async fn execute(&self, method: Method, repository: &RepositoryDescriptor, path: &str, if_modified_since: Option<DateTime<Utc>>, range: Option<&'static str>) -> Result<Response<Body>> {
        let origin = Uri::try_from(format!("{}{}", repository.url, path))?;
        let mut uri = origin.clone();

        for _ in 0..=MAX_REDIRECTS {
            let same_origin = uri.scheme() == origin.scheme() && uri.authority() == origin.authority();
            let mut request = self.request(method.clone(), uri.clone(), repository, if_modified_since, same_origin)?;
            if let Some(range) = range {
                request.headers_mut().insert(RANGE, HeaderValue::from_static(range));
            }

            let response = self.send(repository, request).await?;
            let status = response.status();
            if !status.is_redirection() || status == StatusCode::NOT_MODIFIED {
                return Ok(response);
            }

            let location = match response.headers().get(LOCATION).and_then(|l| l.to_str().ok()) {
                Some(location) => location,
                None => return Ok(response),
            };
            let target = resolve_location(&uri, location)?;
            debug!("{} redirected to {} (HTTP {})", uri, target, status.as_u16());
            uri = target;
        }

        Err(Error::Rejected {
            repository: repository.id.clone(),
            path: format!("{} (more than {} redirects)", path, MAX_REDIRECTS),
            status: StatusCode::LOOP_DETECTED.as_u16(),
        })
    }

    async fn send(&self, repository: &RepositoryDescriptor, request: Request<Body>) -> Result<Response<Body>> {
        // NB: credentials are in the headers, so only method and URI are traced
        trace!("{} {}", request.method(), request.uri());
        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(response) => Ok(response?),
            Err(_) => Err(Error::unavailable(&repository.id, format!("no response within {:?}", self.timeout))),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exists(&self, repository: &RepositoryDescriptor, path: &str) -> Result<bool> {
        let mut response = self.execute(Method::HEAD, repository, path, None, None).await?;
        if matches!(response.status(), StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED) {
            debug!("{} does not support HEAD, probing with a ranged GET", repository.id);
            response = self.execute(Method::GET, repository, path, None, Some("bytes=0-0")).await?;
        }

        match classify(repository, path, response.status())? {
            Classified::Success => Ok(true),
            Classified::NotModified => Ok(true),
            Classified::NotFound => Ok(false),
        }
    }

    async fn fetch(&self, repository: &RepositoryDescriptor, path: &str, if_modified_since: Option<DateTime<Utc>>) -> Result<Fetched> {
        let response = self.execute(Method::GET, repository, path, if_modified_since, None).await?;

        match classify(repository, path, response.status())? {
            Classified::NotFound => Ok(Fetched::NotFound),
            Classified::NotModified => Ok(Fetched::NotModified),
            Classified::Success => {
                let (sha1, md5) = advertised_checksums(response.headers());
                Ok(Fetched::Found(Blob {
                    data: Box::pin(response.into_body().map_err(Error::from)),
                    md5,
                    sha1,
                }))
            }
        }
    }
}

/// Target of a redirect: `location` may be absolute, host-relative or relative to `base`
fn resolve_location(base: &Uri, location: &str) -> Result<Uri> {
    if location.contains("://") {
        return Ok(Uri::try_from(location)?);
    }

    let path = if location.starts_with('/') {
        location.to_string()
    }
    else {
        let base_path = base.path();
        let dir = &base_path[..base_path.rfind('/').map(|idx| idx + 1).unwrap_or(0)];
        format!("{}{}", dir, location)
    };

    Ok(Uri::builder()
        .scheme(base.scheme_str().unwrap_or("https"))
        .authority(base.authority().map(|a| a.as_str()).unwrap_or_default())
        .path_and_query(path)
        .build()?)
}

enum Classified {
    Success,
    NotModified,
    NotFound,
}

fn classify(repository: &RepositoryDescriptor, path: &str, status: StatusCode) -> Result<Classified> {
    trace!("{}{} -> {}", repository.url, path, status);
    match status {
        s if s.is_success() => Ok(Classified::Success),
        StatusCode::NOT_MODIFIED => Ok(Classified::NotModified),
        StatusCode::NOT_FOUND | StatusCode::GONE => Ok(Classified::NotFound),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => Err(Error::unavailable(&repository.id, format!("HTTP {}", status))),
        s if s.is_server_error() => Err(Error::unavailable(&repository.id, format!("HTTP {}", status))),
        s => Err(Error::Rejected {
            repository: repository.id.clone(),
            path: path.to_string(),
            status: s.as_u16(),
        }),
    }
}

/// Repositories advertise checksums in a variety of headers. Values that are not a well-formed
///  hash (e.g. an opaque etag) are ignored.
fn advertised_checksums(headers: &HeaderMap) -> (Option<[u8; 20]>, Option<[u8; 16]>) {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    let sha1 = ["x-checksum-sha1", "x-goog-meta-checksum-sha1", "etag"]
        .iter()
        .filter_map(|name| header(*name))
        .find_map(parse_hex_hash::<20>);
    let md5 = ["x-checksum-md5", "x-goog-meta-checksum-md5"]
        .iter()
        .filter_map(|name| header(*name))
        .find_map(parse_hex_hash::<16>);
    (sha1, md5)
}

/// Transport for repositories in the local file system ("file:///path/to/repo/")
#[derive(Default)]
pub struct FileTransport {}
impl FileTransport {
    pub fn new() -> FileTransport {
        FileTransport {}
    }

    fn file_path(repository: &RepositoryDescriptor, path: &str) -> Result<PathBuf> {
        let base = repository.url
            .strip_prefix("file://")
            .or_else(|| repository.url.strip_prefix("file:"))
            .ok_or_else(|| Error::config(format!("not a file repository: {}", repository.url), "repositories"))?;
        Ok(PathBuf::from(base).join(path))
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn exists(&self, repository: &RepositoryDescriptor, path: &str) -> Result<bool> {
        let file = Self::file_path(repository, path)?;
        trace!("checking {}", file.display());
        match tokio::fs::metadata(&file).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, repository: &RepositoryDescriptor, path: &str, if_modified_since: Option<DateTime<Utc>>) -> Result<Fetched> {
        let file = Self::file_path(repository, path)?;
        trace!("reading {}", file.display());

        let file = match tokio::fs::File::open(&file).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Fetched::NotFound),
            Err(e) => return Err(e.into()),
        };

        if let Some(since) = if_modified_since {
            let modified: DateTime<Utc> = file.metadata().await?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH)
                .into();
            if modified <= since {
                return Ok(Fetched::NotModified);
            }
        }

        Ok(Fetched::Found(Blob {
            data: Box::pin(ReaderStream::new(file).map_err(Error::from)),
            md5: None,
            sha1: None,
        }))
    }
}
