// Gate configuration.
//
// Layers, later wins:
//   1. built-in defaults
//   2. global config:      `~/.pushgate/config.toml`
//   3. repository config:  `<repo>/.pushgate/gate.toml`
//   4. environment:        `PUSHGATE_*`
//   5. command-line overrides
//
// A config file that exists but cannot be parsed is an error, never
// silently replaced by defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 15;
pub const DEFAULT_REMOTE: &str = "origin";

pub const ENV_TTL_SECS: &str = "PUSHGATE_TTL_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "PUSHGATE_MAX_ATTEMPTS";
pub const ENV_LOCK_ROOT: &str = "PUSHGATE_LOCK_ROOT";
pub const ENV_GLOBAL_LEASE: &str = "PUSHGATE_GLOBAL_LEASE";
pub const ENV_REF_LEASE: &str = "PUSHGATE_REF_LEASE";

/// Root directory for pushgate global state: `~/.pushgate/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".pushgate"))
}

/// Path to the global config file: `~/.pushgate/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Path to the repository config file: `<repo>/.pushgate/gate.toml`.
pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".pushgate").join("gate.toml")
}

// ── Resolved config ────────────────────────────────────────────────

/// Fully resolved settings consumed by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub ttl_secs: u64,
    pub max_retry_attempts: u32,
    /// Shared directory holding `locks/`.
    pub lock_root: PathBuf,
    pub enable_global_lease: bool,
    pub enable_per_reference_lease: bool,
    /// Remote fetched before validation.
    pub remote: String,
    pub fetch_before_validate: bool,
}

impl GateConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ── Config layers ──────────────────────────────────────────────────

/// One configuration source. Unset fields defer to earlier layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub ttl_secs: Option<u64>,
    pub max_retry_attempts: Option<u32>,
    pub lock_root: Option<PathBuf>,
    pub global_lease: Option<bool>,
    pub ref_lease: Option<bool>,
    pub remote: Option<String>,
    pub fetch_before_validate: Option<bool>,
}

impl ConfigLayer {
    /// Global file, repository file and environment for `repo_root`,
    /// merged. Command-line overrides go on top of this.
    pub fn discover(repo_root: &Path) -> Result<Self, ConfigError> {
        let global = match global_config_path() {
            Some(path) => Self::load_optional(&path)?,
            None => Self::default(),
        };
        let repo = Self::load_optional(&repo_config_path(repo_root))?;
        let env = Self::from_vars(std::env::vars())?;
        Ok(global.merge(repo).merge(env))
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Like [`load_from`](Self::load_from), but a missing file is an empty layer.
    pub fn load_optional(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Layer built from `PUSHGATE_*` variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                ENV_TTL_SECS => layer.ttl_secs = Some(parse_number(key, value)?),
                ENV_MAX_ATTEMPTS => layer.max_retry_attempts = Some(parse_number(key, value)?),
                ENV_LOCK_ROOT if !value.is_empty() => layer.lock_root = Some(PathBuf::from(value)),
                ENV_GLOBAL_LEASE => layer.global_lease = Some(parse_flag(key, value)?),
                ENV_REF_LEASE => layer.ref_lease = Some(parse_flag(key, value)?),
                _ => {}
            }
        }
        Ok(layer)
    }

    /// `other`'s set fields override this layer's.
    pub fn merge(self, other: Self) -> Self {
        Self {
            ttl_secs: other.ttl_secs.or(self.ttl_secs),
            max_retry_attempts: other.max_retry_attempts.or(self.max_retry_attempts),
            lock_root: other.lock_root.or(self.lock_root),
            global_lease: other.global_lease.or(self.global_lease),
            ref_lease: other.ref_lease.or(self.ref_lease),
            remote: other.remote.or(self.remote),
            fetch_before_validate: other.fetch_before_validate.or(self.fetch_before_validate),
        }
    }

    /// Apply defaults. `fallback_lock_root` is used when no layer names one.
    pub fn resolve(self, fallback_lock_root: Option<PathBuf>) -> Result<GateConfig, ConfigError> {
        let ttl_secs = self.ttl_secs.unwrap_or(DEFAULT_TTL_SECS);
        if ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ttl_secs".into(),
                value: "0".into(),
                expected: "a positive number of seconds",
            });
        }

        let lock_root =
            self.lock_root.or(fallback_lock_root).ok_or(ConfigError::MissingLockRoot)?;

        Ok(GateConfig {
            ttl_secs,
            max_retry_attempts: self.max_retry_attempts.unwrap_or(DEFAULT_MAX_RETRY_ATTEMPTS),
            lock_root,
            enable_global_lease: self.global_lease.unwrap_or(true),
            enable_per_reference_lease: self.ref_lease.unwrap_or(true),
            remote: self.remote.unwrap_or_else(|| DEFAULT_REMOTE.into()),
            fetch_before_validate: self.fetch_before_validate.unwrap_or(true),
        })
    }
}

/// Filesystem path of a push URL, when the remote lives on a (shared)
/// filesystem: plain paths and `file://` URLs. Network transports and
/// scp-style `host:path` give `None`.
pub fn lock_root_from_url(url: &str) -> Option<PathBuf> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        return None;
    }

    let is_windows_drive = url.len() >= 2
        && url.as_bytes()[0].is_ascii_alphabetic()
        && url.as_bytes()[1] == b':';
    if !is_windows_drive {
        if let Some(colon) = url.find(':') {
            // git treats `host:path` as scp-like unless a slash comes first.
            if url.find('/').map_or(true, |slash| colon < slash) {
                return None;
            }
        }
    }
    Some(PathBuf::from(url))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
        expected: "a non-negative integer",
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
            expected: "true or false",
        }),
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidValue { key: String, value: String, expected: &'static str },
    MissingLockRoot,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::InvalidValue { key, value, expected } => {
                write!(f, "invalid value {value:?} for {key}: expected {expected}")
            }
            Self::MissingLockRoot => write!(
                f,
                "no lock store root configured: set lock_root in .pushgate/gate.toml or {ENV_LOCK_ROOT}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::InvalidValue { .. } | Self::MissingLockRoot => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = ConfigLayer::default().resolve(Some(PathBuf::from("/srv/repo.git"))).unwrap();
        assert_eq!(cfg.ttl_secs, 300);
        assert_eq!(cfg.ttl(), Duration::from_secs(300));
        assert_eq!(cfg.max_retry_attempts, 15);
        assert_eq!(cfg.lock_root, PathBuf::from("/srv/repo.git"));
        assert!(cfg.enable_global_lease);
        assert!(cfg.enable_per_reference_lease);
        assert_eq!(cfg.remote, "origin");
        assert!(cfg.fetch_before_validate);
    }

    #[test]
    fn missing_lock_root_is_an_error() {
        let error = ConfigLayer::default().resolve(None).unwrap_err();
        assert!(matches!(error, ConfigError::MissingLockRoot));
        assert!(error.to_string().contains(ENV_LOCK_ROOT));
    }

    #[test]
    fn configured_lock_root_beats_fallback() {
        let layer = ConfigLayer { lock_root: Some("/mnt/locks".into()), ..Default::default() };
        let cfg = layer.resolve(Some("/srv/repo.git".into())).unwrap();
        assert_eq!(cfg.lock_root, PathBuf::from("/mnt/locks"));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let layer = ConfigLayer { ttl_secs: Some(0), ..Default::default() };
        let error = layer.resolve(Some("/x".into())).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let global = ConfigLayer {
            ttl_secs: Some(600),
            max_retry_attempts: Some(3),
            remote: Some("upstream".into()),
            ..Default::default()
        };
        let repo = ConfigLayer { ttl_secs: Some(120), global_lease: Some(false), ..Default::default() };

        let merged = global.merge(repo);
        assert_eq!(merged.ttl_secs, Some(120));
        assert_eq!(merged.max_retry_attempts, Some(3));
        assert_eq!(merged.global_lease, Some(false));
        assert_eq!(merged.remote.as_deref(), Some("upstream"));
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
ttl_secs = 90
max_retry_attempts = 4
lock_root = "/mnt/share/project.git"
global_lease = false
ref_lease = true
remote = "shared"
fetch_before_validate = false
"#;
        let layer: ConfigLayer = toml::from_str(toml_str).unwrap();
        let cfg = layer.resolve(None).unwrap();
        assert_eq!(cfg.ttl_secs, 90);
        assert_eq!(cfg.max_retry_attempts, 4);
        assert_eq!(cfg.lock_root, PathBuf::from("/mnt/share/project.git"));
        assert!(!cfg.enable_global_lease);
        assert!(cfg.enable_per_reference_lease);
        assert_eq!(cfg.remote, "shared");
        assert!(!cfg.fetch_before_validate);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = toml::from_str::<ConfigLayer>("ttl = 5").expect_err("parse should fail");
        assert!(error.to_string().contains("unknown field `ttl`"));
    }

    #[test]
    fn env_layer_parses_known_variables() {
        let layer = ConfigLayer::from_vars([
            (ENV_TTL_SECS, "45"),
            (ENV_MAX_ATTEMPTS, " 7 "),
            (ENV_LOCK_ROOT, "/mnt/locks"),
            (ENV_GLOBAL_LEASE, "off"),
            (ENV_REF_LEASE, "YES"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        assert_eq!(layer.ttl_secs, Some(45));
        assert_eq!(layer.max_retry_attempts, Some(7));
        assert_eq!(layer.lock_root, Some(PathBuf::from("/mnt/locks")));
        assert_eq!(layer.global_lease, Some(false));
        assert_eq!(layer.ref_lease, Some(true));
    }

    #[test]
    fn env_layer_rejects_garbage() {
        let error = ConfigLayer::from_vars([(ENV_TTL_SECS, "soon")]).unwrap_err();
        assert!(error.to_string().contains(ENV_TTL_SECS));

        let error = ConfigLayer::from_vars([(ENV_GLOBAL_LEASE, "maybe")]).unwrap_err();
        assert!(error.to_string().contains("true or false"));
    }

    #[test]
    fn empty_env_lock_root_is_ignored() {
        let layer = ConfigLayer::from_vars([(ENV_LOCK_ROOT, "")]).unwrap();
        assert_eq!(layer.lock_root, None);
    }

    fn write_layer(path: &Path, layer: &ConfigLayer) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, toml::to_string(layer).unwrap()).unwrap();
    }

    #[test]
    fn layer_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = repo_config_path(dir.path());
        let layer = ConfigLayer {
            ttl_secs: Some(30),
            lock_root: Some("/mnt/locks".into()),
            ..Default::default()
        };

        write_layer(&path, &layer);
        assert_eq!(ConfigLayer::load_from(&path).unwrap(), layer);
        assert!(path.ends_with(".pushgate/gate.toml"));
    }

    #[test]
    fn discover_reads_repository_file() {
        let dir = TempDir::new().unwrap();
        let layer = ConfigLayer { remote: Some("shared".into()), ..Default::default() };
        write_layer(&repo_config_path(dir.path()), &layer);

        let discovered = ConfigLayer::discover(dir.path()).unwrap();
        assert_eq!(discovered.remote.as_deref(), Some("shared"));
    }

    #[test]
    fn missing_file_is_an_empty_layer_but_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gate.toml");
        assert_eq!(ConfigLayer::load_optional(&path).unwrap(), ConfigLayer::default());

        std::fs::write(&path, "ttl_secs = [").unwrap();
        assert!(matches!(ConfigLayer::load_optional(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn lock_root_from_local_urls() {
        assert_eq!(lock_root_from_url("/srv/git/repo.git"), Some(PathBuf::from("/srv/git/repo.git")));
        assert_eq!(lock_root_from_url("../shared/repo.git"), Some(PathBuf::from("../shared/repo.git")));
        assert_eq!(lock_root_from_url("file:///mnt/nfs/repo.git"), Some(PathBuf::from("/mnt/nfs/repo.git")));
        assert_eq!(lock_root_from_url("C:\\shares\\repo.git"), Some(PathBuf::from("C:\\shares\\repo.git")));
        assert_eq!(lock_root_from_url("./a:b"), Some(PathBuf::from("./a:b")));
    }

    #[test]
    fn lock_root_from_network_urls_is_none() {
        assert_eq!(lock_root_from_url("https://example.com/repo.git"), None);
        assert_eq!(lock_root_from_url("ssh://git@example.com/repo.git"), None);
        assert_eq!(lock_root_from_url("git@example.com:team/repo.git"), None);
        assert_eq!(lock_root_from_url(""), None);
    }

    #[test]
    fn global_dir_is_under_home() {
        if let Some(dir) = global_dir() {
            assert!(dir.ends_with(".pushgate"));
        }
    }
}
