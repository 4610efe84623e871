// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory configuration, layered from defaults, a TOML file and the
//! environment (`LOOM_DIRECTORY_*`).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use loom_directory_core::validate_dn;
use serde::Deserialize;
use tracing::{debug, trace};

const DEFAULT_TRAVERSAL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_DEPTH: u32 = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("Failed to parse TOML config at {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Validation error: {0}")]
	Validation(String),
}

/// Bind password; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct BindPassword(String);

impl BindPassword {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for BindPassword {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("[REDACTED]")
	}
}

/// Directory configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
	/// Base every search is scoped under.
	pub base: String,
	pub url: Option<String>,
	pub bind_dn: Option<String>,
	pub bind_password: Option<BindPassword>,
	/// Upper bound on a single membership traversal.
	pub traversal_timeout: Duration,
	/// Deepest group nesting a traversal follows.
	pub max_depth: u32,
}

impl DirectoryConfig {
	pub fn new(base: impl Into<String>) -> Self {
		Self {
			base: base.into(),
			url: None,
			bind_dn: None,
			bind_password: None,
			traversal_timeout: Duration::from_secs(DEFAULT_TRAVERSAL_TIMEOUT_SECS),
			max_depth: DEFAULT_MAX_DEPTH,
		}
	}
}

/// Directory configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DirectoryConfigLayer {
	#[serde(default)]
	pub base: Option<String>,
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub bind_dn: Option<String>,
	#[serde(default)]
	pub traversal_timeout_secs: Option<u64>,
	#[serde(default)]
	pub max_depth: Option<u32>,
}

impl DirectoryConfigLayer {
	pub fn merge(&mut self, other: DirectoryConfigLayer) {
		if other.base.is_some() {
			self.base = other.base;
		}
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.bind_dn.is_some() {
			self.bind_dn = other.bind_dn;
		}
		if other.traversal_timeout_secs.is_some() {
			self.traversal_timeout_secs = other.traversal_timeout_secs;
		}
		if other.max_depth.is_some() {
			self.max_depth = other.max_depth;
		}
	}

	pub fn finalize(self, bind_password: Option<BindPassword>) -> Result<DirectoryConfig, ConfigError> {
		let base = self
			.base
			.filter(|b| !b.trim().is_empty())
			.ok_or_else(|| ConfigError::Validation("directory base is required".to_string()))?;
		validate_dn(&base).map_err(|e| ConfigError::InvalidValue {
			key: "base".to_string(),
			message: e.to_string(),
		})?;

		if bind_password.is_some() && self.bind_dn.is_none() {
			return Err(ConfigError::Validation(
				"bind password given without bind_dn".to_string(),
			));
		}

		Ok(DirectoryConfig {
			base,
			url: self.url,
			bind_dn: self.bind_dn,
			bind_password,
			traversal_timeout: Duration::from_secs(
				self.traversal_timeout_secs
					.unwrap_or(DEFAULT_TRAVERSAL_TIMEOUT_SECS),
			),
			max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
		})
	}
}

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<DirectoryConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<DirectoryConfigLayer, ConfigError> {
		Ok(DirectoryConfigLayer {
			traversal_timeout_secs: Some(DEFAULT_TRAVERSAL_TIMEOUT_SECS),
			max_depth: Some(DEFAULT_MAX_DEPTH),
			..Default::default()
		})
	}
}

/// Reads the `[directory]` table of a TOML file; a missing file is empty.
pub struct TomlSource {
	path: PathBuf,
}

#[derive(Deserialize)]
struct TomlFile {
	#[serde(default)]
	directory: DirectoryConfigLayer,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/directory.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<DirectoryConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(DirectoryConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let file: TomlFile = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed directory layer from TOML");
		Ok(file.directory)
	}
}

/// Convention: `LOOM_DIRECTORY_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<DirectoryConfigLayer, ConfigError> {
		Ok(DirectoryConfigLayer {
			base: env_var("LOOM_DIRECTORY_BASE"),
			url: env_var("LOOM_DIRECTORY_URL"),
			bind_dn: env_var("LOOM_DIRECTORY_BIND_DN"),
			traversal_timeout_secs: env_parse("LOOM_DIRECTORY_TRAVERSAL_TIMEOUT_SECS")?,
			max_depth: env_parse("LOOM_DIRECTORY_MAX_DEPTH")?,
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid numeric value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Loads the bind password from `LOOM_DIRECTORY_BIND_PASSWORD_FILE` or
/// `LOOM_DIRECTORY_BIND_PASSWORD`, file first.
pub fn load_bind_password() -> Result<Option<BindPassword>, ConfigError> {
	const VAR: &str = "LOOM_DIRECTORY_BIND_PASSWORD";
	let file_var = format!("{VAR}_FILE");

	if let Some(path) = env_var(&file_var) {
		let path = PathBuf::from(path);
		let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
			path: path.clone(),
			source: e,
		})?;
		let secret = content.strip_suffix('\n').unwrap_or(&content);
		return Ok(Some(BindPassword::new(secret)));
	}

	Ok(env_var(VAR).map(BindPassword::new))
}

fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<DirectoryConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = DirectoryConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	merged.finalize(load_bind_password()?)
}

/// Precedence (highest to lowest): environment, `/etc/loom/directory.toml`,
/// built-in defaults.
pub fn load_config() -> Result<DirectoryConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<DirectoryConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_finalize_requires_base() {
		let err = DirectoryConfigLayer::default().finalize(None).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_finalize_rejects_unparseable_base() {
		let layer = DirectoryConfigLayer {
			base: Some("example.org".to_string()),
			..Default::default()
		};
		assert!(matches!(
			layer.finalize(None).unwrap_err(),
			ConfigError::InvalidValue { .. }
		));
	}

	#[test]
	fn test_finalize_accepts_organization_base() {
		let layer = DirectoryConfigLayer {
			base: Some("o=Example,c=US".to_string()),
			..Default::default()
		};
		let config = layer.finalize(None).unwrap();
		assert_eq!(config.base, "o=Example,c=US");
	}

	#[test]
	fn test_finalize_defaults() {
		let layer = DirectoryConfigLayer {
			base: Some("dc=example,dc=org".to_string()),
			..Default::default()
		};
		let config = layer.finalize(None).unwrap();
		assert_eq!(config.base, "dc=example,dc=org");
		assert_eq!(config.traversal_timeout, Duration::from_secs(30));
		assert_eq!(config.max_depth, 32);
	}

	#[test]
	fn test_password_requires_bind_dn() {
		let layer = DirectoryConfigLayer {
			base: Some("dc=example,dc=org".to_string()),
			..Default::default()
		};
		assert!(layer.finalize(Some(BindPassword::new("pw"))).is_err());
	}

	#[test]
	fn test_merge_overwrites_only_set_fields() {
		let mut base = DirectoryConfigLayer {
			base: Some("dc=old".to_string()),
			url: Some("ldap://old".to_string()),
			max_depth: Some(4),
			..Default::default()
		};
		base.merge(DirectoryConfigLayer {
			base: Some("dc=new".to_string()),
			..Default::default()
		});
		assert_eq!(base.base.as_deref(), Some("dc=new"));
		assert_eq!(base.url.as_deref(), Some("ldap://old"));
		assert_eq!(base.max_depth, Some(4));
	}

	#[test]
	fn test_bind_password_debug_is_redacted() {
		let pw = BindPassword::new("hunter2");
		assert_eq!(format!("{pw:?}"), "[REDACTED]");
		assert_eq!(pw.expose(), "hunter2");
	}

	#[test]
	fn test_toml_source_reads_directory_table() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("directory.toml");
		std::fs::write(
			&path,
			r#"
[directory]
base = "dc=example,dc=org"
url = "ldaps://dc1.example.org"
max_depth = 8
"#,
		)
		.unwrap();

		let layer = TomlSource::new(&path).load().unwrap();
		assert_eq!(layer.base.as_deref(), Some("dc=example,dc=org"));
		assert_eq!(layer.url.as_deref(), Some("ldaps://dc1.example.org"));
		assert_eq!(layer.max_depth, Some(8));
		assert!(layer.traversal_timeout_secs.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_is_empty() {
		let layer = TomlSource::new("/nonexistent/loom/directory.toml")
			.load()
			.unwrap();
		assert_eq!(layer, DirectoryConfigLayer::default());
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("directory.toml");
		std::fs::write(&path, "[directory]\nmax_depth = \"deep\"\n").unwrap();
		assert!(matches!(
			TomlSource::new(&path).load().unwrap_err(),
			ConfigError::TomlParse { .. }
		));
	}
}
