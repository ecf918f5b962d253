// Session service client backed by the local game client's HTTPS endpoint.
//
// The client advertises its port and auth token through a lockfile in its
// install directory. We re-read it lazily whenever the cached connection
// goes stale (client restarted, new port).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ClientError, SessionClient};

const LOCKFILE_NAMES: [&str; 3] = ["lockfile", "LeagueClientUx.lockfile", "LeagueClient.lockfile"];

#[derive(Debug, Clone)]
struct Connection {
    port: String,
    auth_header: String,
    lockfile_path: PathBuf,
}

pub struct LcuClient {
    install_dir: PathBuf,
    http: reqwest::Client,
    connection: Mutex<Option<Connection>>,
}

impl LcuClient {
    /// `install_dir` is the client install directory containing the lockfile.
    ///
    /// The service uses a self-signed certificate, so certificate checks are
    /// disabled; requests carry a short timeout so one hung call cannot
    /// stall a poller.
    pub fn new(install_dir: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let install_dir = install_dir.into();
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| ClientError::Transport {
                path: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            install_dir,
            http,
            connection: Mutex::new(None),
        })
    }

    fn read_lockfile(install_dir: &Path) -> Result<Connection, ClientError> {
        for name in LOCKFILE_NAMES {
            let path = install_dir.join(name);
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            // Format: name:pid:port:token:protocol
            let parts: Vec<&str> = content.split(':').collect();
            if parts.len() < 5 {
                return Err(ClientError::MalformedLockfile {
                    path,
                    message: format!("expected 5 colon-separated fields, got {}", parts.len()),
                });
            }
            let port = parts[2].to_string();
            let token = parts[3];
            let auth = general_purpose::STANDARD.encode(format!("riot:{}", token));
            return Ok(Connection {
                port,
                auth_header: format!("Basic {}", auth),
                lockfile_path: path,
            });
        }
        Err(ClientError::LockfileNotFound {
            dir: install_dir.to_path_buf(),
        })
    }

    fn connection(&self) -> Result<Connection, ClientError> {
        let mut guard = self.connection.lock().unwrap();
        if let Some(conn) = guard.as_ref() {
            if conn.lockfile_path.exists() {
                return Ok(conn.clone());
            }
            debug!("lockfile at {:?} is gone, rediscovering", conn.lockfile_path);
            *guard = None;
        }
        let conn = Self::read_lockfile(&self.install_dir)?;
        debug!(port = %conn.port, "connected to session service");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    fn drop_connection(&self) {
        *self.connection.lock().unwrap() = None;
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let conn = self.connection()?;
        let url = format!("https://127.0.0.1:{}{}", conn.port, path);

        let mut req = self
            .http
            .request(method, &url)
            .header("Authorization", &conn.auth_header);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return Err(ClientError::Timeout {
                    path: path.to_string(),
                })
            }
            Err(e) => {
                // A refused connection usually means the client restarted on
                // a new port; forget the cached lockfile so the next call
                // rediscovers it.
                if e.is_connect() {
                    self.drop_connection();
                }
                return Err(ClientError::Transport {
                    path: path.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let text = resp.text().await.map_err(|e| ClientError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        if text.is_empty() {
            // Accept/minimize style endpoints return an empty body.
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            warn!(path, "response is not valid JSON: {}", e);
            ClientError::UnexpectedShape {
                path: path.to_string(),
                message: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl SessionClient for LcuClient {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.request(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.request(reqwest::Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.request(reqwest::Method::PATCH, path, Some(body)).await
    }
}
