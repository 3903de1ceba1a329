use crate::metadata::{MavenMetadata, METADATA_FILE};
use crate::transport::{artifact_dir, persist_atomic, ArtifactTransport};
use crate::ResolveError;
use quarry_schema::{ArtifactCoordinate, RepositoryId};
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

/// A remote Maven repository reached over HTTP(S).
///
/// Downloads land in an explicit local cache at
/// `<cache>/<repository id>/<maven path>`; a cached file is reused without
/// contacting the server again. Expects the standard Maven layout:
/// - `GET <base>/<group path>/<artifact>/<version>/<file>`: artifact
/// - `GET <base>/<group path>/<artifact>/maven-metadata.xml`: version index
pub struct HttpRepository {
    id: RepositoryId,
    base_url: String,
    auth_token: Option<String>,
    cache_dir: PathBuf,
    agent: ureq::Agent,
}

impl HttpRepository {
    pub fn new(id: &str, base_url: &str, cache_dir: impl Into<PathBuf>) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self {
            id: RepositoryId::from(id),
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth_token: None,
            cache_dir: cache_dir.into(),
            agent,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.auth_token = token.map(str::to_owned);
        self
    }

    fn cache_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.cache_dir
            .join(self.id.as_str())
            .join(coordinate.repository_path())
    }

    fn do_get(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        let mut req = self.agent.get(url);
        if let Some(ref token) = self.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(ResolveError::NotFound(url.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(ResolveError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => {
                return Err(ResolveError::Http(e.to_string()));
            }
        };

        let code = resp.status().as_u16();
        if code == 404 {
            return Err(ResolveError::NotFound(url.to_owned()));
        }
        if code >= 400 {
            return Err(ResolveError::Http(format!("HTTP {code} for {url}")));
        }

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| ResolveError::Http(e.to_string()))?;
        Ok(body)
    }
}

impl ArtifactTransport for HttpRepository {
    fn id(&self) -> &RepositoryId {
        &self.id
    }

    fn fetch(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf, ResolveError> {
        let cached = self.cache_path(coordinate);
        if cached.is_file() {
            debug!("cache hit {coordinate} ({})", self.id);
            return Ok(cached);
        }
        let url = format!("{}/{}", self.base_url, coordinate.repository_path());
        debug!("GET {url}");
        let data = self.do_get(&url).map_err(|e| match e {
            ResolveError::NotFound(_) => {
                ResolveError::NotFound(format!("{coordinate} in {}", self.id))
            }
            other => other,
        })?;
        persist_atomic(&cached, &data)?;
        Ok(cached)
    }

    fn list_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<String>, ResolveError> {
        let url = format!(
            "{}/{}/{METADATA_FILE}",
            self.base_url,
            artifact_dir(group_id, artifact_id)
        );
        debug!("GET {url}");
        let body = match self.do_get(&url) {
            Ok(body) => body,
            Err(ResolveError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let xml = String::from_utf8(body).map_err(|e| ResolveError::Metadata(e.to_string()))?;
        Ok(MavenMetadata::parse(&xml)?.versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    /// A captured HTTP request for header inspection.
    #[derive(Debug, Clone)]
    struct CapturedRequest {
        path: String,
        headers: HashMap<String, String>,
    }

    /// Serves a fixed set of paths; everything else is a 404.
    struct MockServer {
        addr: String,
        _handle: std::thread::JoinHandle<()>,
        requests: Arc<Mutex<Vec<CapturedRequest>>>,
    }

    impl MockServer {
        fn start(files: HashMap<String, Vec<u8>>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", listener.local_addr().unwrap());
            let files = Arc::new(files);
            let requests: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));

            let requests_clone = Arc::clone(&requests);
            let handle = std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { break };
                    let files = Arc::clone(&files);
                    let reqs = Arc::clone(&requests_clone);

                    std::thread::spawn(move || {
                        let mut reader = BufReader::new(stream.try_clone().unwrap());
                        let mut request_line = String::new();
                        if reader.read_line(&mut request_line).is_err() {
                            return;
                        }
                        let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
                        if parts.len() < 2 {
                            return;
                        }
                        let path = parts[1].to_owned();

                        let mut headers = HashMap::new();
                        loop {
                            let mut line = String::new();
                            if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                                break;
                            }
                            if let Some((k, v)) = line.trim().split_once(": ") {
                                headers.insert(k.to_lowercase(), v.to_owned());
                            }
                        }
                        reqs.lock().unwrap().push(CapturedRequest {
                            path: path.clone(),
                            headers,
                        });

                        match files.get(&path) {
                            Some(_) if path.starts_with("/error") => {
                                let _ = stream.write_all(
                                    b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                                );
                            }
                            Some(body) => {
                                let head = format!(
                                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                                    body.len()
                                );
                                let _ = stream.write_all(head.as_bytes());
                                let _ = stream.write_all(body);
                            }
                            None => {
                                let _ = stream.write_all(
                                    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                                );
                            }
                        }
                        let _ = stream.flush();
                    });
                }
            });

            MockServer {
                addr,
                _handle: handle,
                requests,
            }
        }

        fn captured_requests(&self) -> Vec<CapturedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn served(entries: Vec<(&str, Vec<u8>)>) -> HashMap<String, Vec<u8>> {
        entries
            .into_iter()
            .map(|(path, body)| (path.to_owned(), body))
            .collect()
    }

    fn metadata_xml(versions: &[&str]) -> Vec<u8> {
        let mut meta = MavenMetadata::new("org.example", "core");
        for v in versions {
            meta.add_version(v);
        }
        meta.to_xml().into_bytes()
    }

    #[test]
    fn fetch_downloads_into_cache() {
        let server = MockServer::start(served(vec![(
            "/org/example/core/1.0/core-1.0.jar",
            b"jar bytes".to_vec(),
        )]));
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("central", &server.addr, cache.path());

        let c = ArtifactCoordinate::jar("org.example", "core", "1.0");
        let path = repo.fetch(&c).unwrap();
        assert_eq!(
            path,
            cache.path().join("central/org/example/core/1.0/core-1.0.jar")
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"jar bytes");
    }

    #[test]
    fn fetch_reuses_cached_file() {
        let server = MockServer::start(served(vec![(
            "/org/example/core/1.0/core-1.0.jar",
            b"jar bytes".to_vec(),
        )]));
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("central", &server.addr, cache.path());
        let c = ArtifactCoordinate::jar("org.example", "core", "1.0");
        repo.fetch(&c).unwrap();
        repo.fetch(&c).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(server.captured_requests().len(), 1);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let server = MockServer::start(HashMap::new());
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("central", &server.addr, cache.path());
        let err = repo
            .fetch(&ArtifactCoordinate::jar("org.example", "core", "9.9"))
            .unwrap_err();
        assert!(err.is_not_found(), "got {err}");
    }

    #[test]
    fn server_error_is_not_not_found() {
        let server = MockServer::start(served(vec![("/error/core/maven-metadata.xml", Vec::new())]));
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("central", &server.addr, cache.path());
        let err = repo.list_versions("error", "core").unwrap_err();
        assert!(matches!(err, ResolveError::Http(_)), "got {err}");
    }

    #[test]
    fn list_versions_reads_metadata() {
        let server = MockServer::start(served(vec![(
            "/org/example/core/maven-metadata.xml",
            metadata_xml(&["1.0", "1.1"]),
        )]));
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("central", &server.addr, cache.path());
        assert_eq!(
            repo.list_versions("org.example", "core").unwrap(),
            ["1.0", "1.1"]
        );
        assert!(repo.list_versions("org.example", "other").unwrap().is_empty());
    }

    #[test]
    fn connection_refused_returns_error() {
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("central", "http://127.0.0.1:1", cache.path());
        let err = repo.list_versions("g", "a").unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn auth_token_sent_as_bearer_header() {
        let server = MockServer::start(served(vec![(
            "/org/example/core/maven-metadata.xml",
            metadata_xml(&["1.0"]),
        )]));
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("private", &server.addr, cache.path())
            .with_token(Some("secret-token-42"));
        repo.list_versions("org.example", "core").unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));
        let reqs = server.captured_requests();
        assert_eq!(reqs[0].path, "/org/example/core/maven-metadata.xml");
        assert_eq!(
            reqs[0].headers.get("authorization"),
            Some(&"Bearer secret-token-42".to_owned()),
        );
    }

    #[test]
    fn no_auth_header_without_token() {
        let server = MockServer::start(HashMap::new());
        let cache = tempfile::tempdir().unwrap();
        let repo = HttpRepository::new("central", &server.addr, cache.path());
        let _ = repo.list_versions("g", "a");

        std::thread::sleep(std::time::Duration::from_millis(50));
        let reqs = server.captured_requests();
        assert!(!reqs.is_empty());
        assert!(!reqs[0].headers.contains_key("authorization"));
    }
}
