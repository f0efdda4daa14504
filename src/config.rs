//! Deploy configuration
//!
//! Options come from two sources, in priority order:
//! 1. Environment variables (`DEPLOY_*`, empty values ignored)
//! 2. A config file, given explicitly or found by walking up from the
//!    working directory (`.deployrc`, `.deploy.toml`, `deploy.toml`,
//!    `.deploy.json5`, `deploy.json5`), stopping at a `.git` directory
//!
//! `.toml` files are TOML; anything else is JSON5.
//!
//! # Example
//!
//! ```toml
//! host = "ftp.example.com"
//! user = "deploy"
//! password = "secret"
//! localRoot = "build"
//! remoteRoot = "/app"
//! publicDir = "public"
//! baseUrl = "https://example.com"
//! files = ["!/var/cache", "remote:!/uploads", "!*.log"]
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::logging::*;
use crate::paths;
use crate::transport::local::SCHEME as LOOPBACK_SCHEME;

const FILE_NAMES: &[&str] =
	&[".deployrc", ".deploy.toml", "deploy.toml", ".deploy.json5", "deploy.json5"];

const ENV_MAP: &[(&str, &str)] = &[
	("DEPLOY_HOST", "host"),
	("DEPLOY_PORT", "port"),
	("DEPLOY_USER", "user"),
	("DEPLOY_PASSWORD", "password"),
	("DEPLOY_LOCAL_ROOT", "localRoot"),
	("DEPLOY_REMOTE_ROOT", "remoteRoot"),
	("DEPLOY_PUBLIC_DIR", "publicDir"),
	("DEPLOY_REMOTE_ROOT_RELATIVE_TO_PUBLIC_DIR", "remoteRootRelativeToPublicDir"),
	("DEPLOY_BASE_URL", "baseUrl"),
];

/// Validated, normalised configuration of one deploy target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	/// FTP host, or `file:///dir` for the loopback host
	pub host: String,
	pub port: Option<u16>,
	pub user: String,
	pub password: String,
	/// Absolute local directory to deploy
	pub local_root: String,
	/// Absolute remote directory to deploy into, `/`-rooted
	pub remote_root: String,
	/// Absolute remote directory served at `base_url`
	pub public_dir: String,
	/// Site URL serving `public_dir`, without trailing slash
	pub base_url: String,
	/// `remote_root` as seen from `public_dir`
	pub remote_root_relative_to_public_dir: String,
	/// Filter patterns, see [`crate::exclusion`]
	pub files: Vec<String>,
}

impl Config {
	pub fn is_loopback(&self) -> bool {
		self.host.starts_with(LOOPBACK_SCHEME)
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PortValue {
	Int(i64),
	Float(f64),
	Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FilesValue {
	One(String),
	Many(Vec<String>),
}

/// Options as written in a config file; everything optional until merged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawConfig {
	host: Option<String>,
	port: Option<PortValue>,
	user: Option<String>,
	password: Option<String>,
	local_root: Option<String>,
	remote_root: Option<String>,
	public_dir: Option<String>,
	base_url: Option<String>,
	remote_root_relative_to_public_dir: Option<String>,
	files: Option<FilesValue>,
}

impl RawConfig {
	fn set(&mut self, key: &str, value: String) {
		match key {
			"host" => self.host = Some(value),
			"port" => self.port = Some(PortValue::Text(value)),
			"user" => self.user = Some(value),
			"password" => self.password = Some(value),
			"localRoot" => self.local_root = Some(value),
			"remoteRoot" => self.remote_root = Some(value),
			"publicDir" => self.public_dir = Some(value),
			"remoteRootRelativeToPublicDir" => self.remote_root_relative_to_public_dir = Some(value),
			"baseUrl" => self.base_url = Some(value),
			_ => {}
		}
	}

	/// Fill options still unset from `other`
	fn or(self, other: RawConfig) -> RawConfig {
		RawConfig {
			host: self.host.or(other.host),
			port: self.port.or(other.port),
			user: self.user.or(other.user),
			password: self.password.or(other.password),
			local_root: self.local_root.or(other.local_root),
			remote_root: self.remote_root.or(other.remote_root),
			public_dir: self.public_dir.or(other.public_dir),
			base_url: self.base_url.or(other.base_url),
			remote_root_relative_to_public_dir: self
				.remote_root_relative_to_public_dir
				.or(other.remote_root_relative_to_public_dir),
			files: self.files.or(other.files),
		}
	}
}

pub struct ConfigLoader {
	cwd: String,
	env: HashMap<String, String>,
}

impl ConfigLoader {
	/// Loader over the process working directory and environment
	pub fn new() -> Self {
		let cwd = env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
		Self::with_env(if cwd.is_empty() { "/".to_string() } else { cwd }, env::vars())
	}

	pub fn with_env<I, K, V>(cwd: impl Into<String>, vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self { cwd: cwd.into(), env: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
	}

	pub fn load(&self, file: Option<&Path>) -> Result<Config, ConfigError> {
		let from_env = self.from_env();

		let file = match file {
			Some(path) => {
				let path = path.to_string_lossy();
				Some(PathBuf::from(paths::resolve_from(&self.cwd, &[path.as_ref()])))
			}
			None => self.find_file(),
		};
		let from_file = match &file {
			Some(path) => {
				debug!("Loading config from {}", path.display());
				read_file(path)?
			}
			None => RawConfig::default(),
		};

		validate(from_env.or(from_file))
	}

	/// Nearest config file from the working directory upwards
	pub fn find_file(&self) -> Option<PathBuf> {
		let mut dir = PathBuf::from(paths::normalize(&self.cwd));
		loop {
			for name in FILE_NAMES {
				let candidate = dir.join(name);
				if candidate.is_file() {
					return Some(candidate);
				}
			}
			if dir.join(".git").exists() {
				return None;
			}
			match dir.parent() {
				Some(parent) => dir = parent.to_path_buf(),
				None => return None,
			}
		}
	}

	fn from_env(&self) -> RawConfig {
		let mut raw = RawConfig::default();
		for (name, key) in ENV_MAP {
			if let Some(value) = self.env.get(*name).filter(|v| !v.is_empty()) {
				raw.set(key, value.clone());
			}
		}
		raw.local_root = raw.local_root.map(|p| paths::resolve_from(&self.cwd, &[p.as_str()]));
		raw
	}
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
	let text = fs::read_to_string(path)
		.map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
	let parse_error = |message: String| ConfigError::Parse { path: path.to_path_buf(), message };

	let mut raw: RawConfig = if path.extension().map_or(false, |e| e == "toml") {
		toml::from_str(&text).map_err(|e| parse_error(e.to_string()))?
	} else {
		json5::from_str(&text).map_err(|e| parse_error(e.to_string()))?
	};

	let dir = path.parent().map_or_else(|| "/".to_string(), |p| p.to_string_lossy().into_owned());
	raw.local_root = raw.local_root.map(|p| paths::resolve_from(&dir, &[p.as_str()]));
	Ok(raw)
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
	value.filter(|v| !v.is_empty()).ok_or(ConfigError::Missing { key })
}

fn port(value: Option<PortValue>) -> Result<Option<u16>, ConfigError> {
	let invalid =
		|| ConfigError::Invalid { key: "port", message: "must be an int in 1..65535".to_string() };
	let n = match value {
		None => return Ok(None),
		Some(PortValue::Text(s)) if s.trim().is_empty() => return Ok(None),
		Some(PortValue::Int(n)) => n,
		Some(PortValue::Float(f)) if f.fract() == 0.0 => f as i64,
		Some(PortValue::Float(_)) => return Err(invalid()),
		Some(PortValue::Text(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
	};
	u16::try_from(n).ok().filter(|&p| p != 0).map(Some).ok_or_else(invalid)
}

fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
	let host = required(raw.host, "host")?;
	let loopback = host.starts_with(LOOPBACK_SCHEME);
	let (user, password) = if loopback {
		(raw.user.unwrap_or_default(), raw.password.unwrap_or_default())
	} else {
		(required(raw.user, "user")?, required(raw.password, "password")?)
	};
	let local_root = required(raw.local_root, "localRoot")?;
	let base_url = required(raw.base_url, "baseUrl")?;
	let port = port(raw.port)?;

	let remote_root = paths::normalize(&paths::rooted(&raw.remote_root.unwrap_or_default()));
	let public_dir = paths::resolve_from(
		&remote_root,
		&[raw.public_dir.as_deref().filter(|p| !p.is_empty()).unwrap_or(".")],
	);
	let remote_root_relative_to_public_dir = match raw.remote_root_relative_to_public_dir {
		Some(rel) if !rel.is_empty() => rel.trim_matches('/').to_string(),
		_ => paths::relative(&public_dir, &remote_root),
	};
	let files = match raw.files {
		None => Vec::new(),
		Some(FilesValue::One(p)) => vec![p],
		Some(FilesValue::Many(list)) => list,
	};

	Ok(Config {
		host,
		port,
		user,
		password,
		local_root,
		remote_root,
		public_dir,
		base_url: base_url.trim_end_matches('/').to_string(),
		remote_root_relative_to_public_dir,
		files,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn loader(cwd: &Path, vars: &[(&str, &str)]) -> ConfigLoader {
		ConfigLoader::with_env(cwd.to_string_lossy(), vars.iter().map(|&(k, v)| (k, v)))
	}

	const MINIMAL: &[(&str, &str)] = &[
		("DEPLOY_HOST", "ftp.example.com"),
		("DEPLOY_USER", "u"),
		("DEPLOY_PASSWORD", "p"),
		("DEPLOY_LOCAL_ROOT", "build"),
		("DEPLOY_BASE_URL", "https://example.com/"),
	];

	#[test]
	fn test_env_only_defaults() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join(".git")).unwrap();
		let config = loader(dir.path(), MINIMAL).load(None).unwrap();

		assert_eq!(config.local_root, format!("{}/build", dir.path().display()));
		assert_eq!(config.remote_root, "/");
		assert_eq!(config.public_dir, "/");
		assert_eq!(config.remote_root_relative_to_public_dir, "");
		assert_eq!(config.base_url, "https://example.com");
		assert_eq!(config.port, None);
		assert!(config.files.is_empty());
	}

	#[test]
	fn test_derived_relative_root() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join(".git")).unwrap();
		let mut vars = MINIMAL.to_vec();
		vars.push(("DEPLOY_REMOTE_ROOT", "app/"));
		vars.push(("DEPLOY_PUBLIC_DIR", "../public_html"));
		let config = loader(dir.path(), &vars).load(None).unwrap();

		assert_eq!(config.remote_root, "/app");
		assert_eq!(config.public_dir, "/public_html");
		assert_eq!(config.remote_root_relative_to_public_dir, "../app");
	}

	#[test]
	fn test_file_is_found_upwards_and_env_wins() {
		let dir = TempDir::new().unwrap();
		let project = dir.path().join("project");
		let nested = project.join("a/b");
		fs::create_dir_all(&nested).unwrap();
		fs::create_dir(project.join(".git")).unwrap();
		fs::write(
			project.join("deploy.toml"),
			"host = \"file-host\"\nport = 2121\nuser = \"fu\"\npassword = \"fp\"\n\
			 localRoot = \"dist\"\nbaseUrl = \"http://file\"\nfiles = \"!*.log\"\n",
		)
		.unwrap();

		let config = loader(&nested, &[("DEPLOY_HOST", "env-host"), ("DEPLOY_USER", "")])
			.load(None)
			.unwrap();
		assert_eq!(config.host, "env-host");
		assert_eq!(config.user, "fu");
		assert_eq!(config.port, Some(2121));
		assert_eq!(config.local_root, format!("{}/dist", project.display()));
		assert_eq!(config.files, vec!["!*.log".to_string()]);
	}

	#[test]
	fn test_json5_file_explicit() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join(".deployrc");
		fs::write(
			&path,
			"{ host: 'file:///tmp/fake', localRoot: '/abs', baseUrl: 'http://x', \
			 files: ['!/vendor', 'local:!.env'], port: '21', }",
		)
		.unwrap();

		let config = loader(dir.path(), &[]).load(Some(&path)).unwrap();
		assert!(config.is_loopback());
		assert_eq!(config.user, "");
		assert_eq!(config.local_root, "/abs");
		assert_eq!(config.port, Some(21));
		assert_eq!(config.files.len(), 2);
	}

	#[test]
	fn test_missing_and_invalid_options() {
		let dir = TempDir::new().unwrap();
		fs::create_dir(dir.path().join(".git")).unwrap();

		let err = loader(dir.path(), &MINIMAL[..4]).load(None).unwrap_err();
		assert!(matches!(err, ConfigError::Missing { key: "baseUrl" }));

		let mut vars = MINIMAL.to_vec();
		vars.retain(|(k, _)| *k != "DEPLOY_PASSWORD");
		let err = loader(dir.path(), &vars).load(None).unwrap_err();
		assert!(matches!(err, ConfigError::Missing { key: "password" }));

		for bad in ["abc", "0", "70000"] {
			let mut vars = MINIMAL.to_vec();
			vars.push(("DEPLOY_PORT", bad));
			let err = loader(dir.path(), &vars).load(None).unwrap_err();
			assert!(matches!(err, ConfigError::Invalid { key: "port", .. }), "{}", bad);
		}
	}

	#[test]
	fn test_unreadable_or_broken_file() {
		let dir = TempDir::new().unwrap();
		let err = loader(dir.path(), &[]).load(Some(Path::new("nope.toml"))).unwrap_err();
		assert!(matches!(err, ConfigError::Read { .. }));

		let path = dir.path().join("deploy.toml");
		fs::write(&path, "host = ").unwrap();
		let err = loader(dir.path(), &[]).load(Some(&path)).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
	}
}

// vim: ts=4
