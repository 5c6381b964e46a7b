//! Blocking HTTP portal client.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::util::safe_read_to_string;
use crate::error::{IngestError, Result};
use crate::portal::Portal;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Access key for a portal environment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortalKey {
    pub key: String,
    pub secret: String,
    pub server: String,
}

/// Portal reached over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpPortal {
    client: Client,
    server: String,
    credentials: Option<(String, String)>,
    raw_frame: bool,
}

impl HttpPortal {
    /// Create a client for a server without credentials
    pub fn new(server: impl Into<String>) -> Result<Self> {
        let server = server.into().trim_end_matches('/').to_string();
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(IngestError::Config(format!("portal server must be an http(s) URL: {server}")));
        }
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            server,
            credentials: None,
            raw_frame: true,
        })
    }

    /// Create a client from an access key
    pub fn from_key(key: &PortalKey) -> Result<Self> {
        Ok(Self::new(key.server.clone())?.with_credentials(key.key.clone(), key.secret.clone()))
    }

    /// Create a client from a keys file holding `{env: {key, secret, server}}`
    ///
    /// # Arguments
    /// * `path` - Path to the JSON keys file
    /// * `env` - Name of the environment entry to use
    pub fn from_keys_file(path: &Path, env: &str) -> Result<Self> {
        let content = safe_read_to_string(path, "reading portal access keys")?;
        let keys: FxHashMap<String, PortalKey> = serde_json::from_str(&content)?;
        let key = keys.get(env).ok_or_else(|| {
            IngestError::Config(format!("no entry for environment '{env}' in {}", path.display()))
        })?;
        Self::from_key(key)
    }

    /// Authenticate with a key/secret pair (basic auth)
    #[must_use]
    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some((key.into(), secret.into()));
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Request objects as stored (`frame=raw`) or as rendered by the portal
    #[must_use]
    pub fn with_raw_frame(mut self, raw_frame: bool) -> Self {
        self.raw_frame = raw_frame;
        self
    }

    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Full URL for a portal path; absolute URLs are passed through
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        normalize_url(&self.server, path)
    }

    fn get_json(&self, path: &str, raw: bool) -> Result<Option<Value>> {
        let url = self.url(path);
        let mut request = self.client.get(&url).header(ACCEPT, "application/json");
        if raw {
            request = request.query(&[("frame", "raw")]);
        }
        if let Some((key, secret)) = &self.credentials {
            request = request.basic_auth(key, Some(secret));
        }

        log::debug!("GET {url}");
        let response = request.send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Value>()?)),
            status => Err(IngestError::Portal(format!("GET {url} returned {status}"))),
        }
    }
}

impl Portal for HttpPortal {
    fn get_schema(&self, type_name: &str) -> Result<Option<Value>> {
        self.get_json(&format!("/profiles/{type_name}.json"), false)
    }

    fn get_schemas(&self) -> Result<Map<String, Value>> {
        match self.get_json("/profiles/", false)? {
            Some(Value::Object(map)) => Ok(map
                .into_iter()
                .filter(|(name, _)| !name.starts_with('_') && !name.starts_with('@'))
                .collect()),
            Some(_) => Err(IngestError::Portal("schema listing is not a JSON object".to_string())),
            None => Ok(Map::new()),
        }
    }

    fn get_metadata(&self, path: &str) -> Result<Option<Value>> {
        self.get_json(path, self.raw_frame)
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Join a server and a path, collapsing duplicate slashes in the path
#[must_use]
pub fn normalize_url(server: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let joined = format!("{}/{}", server.trim_end_matches('/'), path.trim_start_matches('/'));
    let (scheme, rest) = match joined.find("://") {
        Some(index) => joined.split_at(index + 3),
        None => ("", joined.as_str()),
    };
    let mut collapsed = String::with_capacity(rest.len());
    let mut previous_slash = false;
    for c in rest.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        collapsed.push(c);
    }
    format!("{scheme}{collapsed}")
}
