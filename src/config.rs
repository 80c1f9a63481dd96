use crate::error::ConfigError;
use hyper::Uri;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote container-runtime endpoint, always spoken to over https.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockerEndpoint {
    base: String,
    host: String,
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST` style value such as `tcp://10.0.0.5:2376`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDockerHost {
            host: raw.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = raw.parse().map_err(|e: hyper::http::uri::InvalidUri| invalid(&e.to_string()))?;
        let authority = uri.authority().ok_or_else(|| invalid("no host"))?;
        if authority.host().is_empty() {
            return Err(invalid("no host"));
        }

        Ok(Self {
            base: format!("https://{}", authority),
            host: authority.host().to_string(),
        })
    }

    /// `https://host:port`, without a trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The host's network address, used to reach published ports.
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Client credentials for the registry connection.
#[derive(Clone, Debug)]
pub struct CertPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

impl CertPaths {
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let paths = Self {
            cert: dir.join("cert.pem"),
            key: dir.join("key.pem"),
            ca: dir.join("ca.pem"),
        };
        for p in [&paths.cert, &paths.key, &paths.ca] {
            if !p.exists() {
                return Err(ConfigError::MissingCredential(p.clone()));
            }
        }
        Ok(paths)
    }
}

/// Deepest peer tree serde_json can decode: every level costs an array and
/// an object against its recursion limit of 128.
pub const DECODE_DEPTH_LIMIT: usize = 63;

/// Limits applied to the chain and to each forwarding hop.
#[derive(Clone, Debug)]
pub struct ForwardPolicy {
    pub timeout: Option<Duration>,
    pub max_hops: u32,
    pub max_decode_depth: usize,
    pub max_body_bytes: usize,
}

impl Default for ForwardPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(10)),
            max_hops: 32,
            max_decode_depth: DECODE_DEPTH_LIMIT,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

impl ForwardPolicy {
    /// A timeout of zero seconds disables the bound.
    pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    /// Reject limits that could never all be honoured. A chain of `max_hops`
    /// hops nests that many trees, so it has to fit below the decode depth.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_decode_depth == 0 || self.max_decode_depth > DECODE_DEPTH_LIMIT {
            return Err(ConfigError::DecodeDepth {
                depth: self.max_decode_depth,
                limit: DECODE_DEPTH_LIMIT,
            });
        }
        if self.max_hops as usize >= self.max_decode_depth {
            return Err(ConfigError::HopsExceedDepth {
                max_hops: self.max_hops,
                max_decode_depth: self.max_decode_depth,
            });
        }
        Ok(())
    }
}

pub fn local_hostname() -> Result<String, ConfigError> {
    let mut buf = [0 as libc::c_char; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return Err(ConfigError::Hostname(std::io::Error::last_os_error()));
    }
    // gethostname does not guarantee termination on truncation
    buf[buf.len() - 1] = 0;
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(name.to_string_lossy().into_owned())
}
