//! C6: the proxy's on-disk static configuration editor. The document itself
//! is free-form YAML (the proxy owns its full schema); this module only ever
//! touches the `experimental.plugins.<key>` subtree and arbitrary dotted
//! paths, leaving everything else byte-for-byte as found.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StaticConfigError {
	#[error("filesystem error: {0}")]
	Io(#[from] std::io::Error),
	#[error("failed to parse static config: {0}")]
	Parse(String),
	#[error("invalid module name: {0}")]
	InvalidModuleName(String),
}

pub type StaticConfigResult<T> = Result<T, StaticConfigError>;

/// Derives the plugin map key from a module path: last `/`-segment, minus a
/// trailing `@version`, `.git`, or `-plugin` suffix, lowercased.
pub fn derive_plugin_key(module_name: &str) -> StaticConfigResult<String> {
	let trimmed = module_name.trim();
	if trimmed.is_empty() {
		return Err(StaticConfigError::InvalidModuleName("module name is empty".into()));
	}
	let without_version = trimmed.split('@').next().unwrap_or(trimmed).trim_end_matches('/');
	let last = without_version.rsplit('/').next().unwrap_or(without_version);
	let last = last.to_lowercase();
	let last = last.strip_suffix(".git").unwrap_or(&last);
	let last = last.strip_suffix("-plugin").unwrap_or(last);
	if last.is_empty() {
		return Err(StaticConfigError::InvalidModuleName(format!("'{module_name}' has no usable path segment")));
	}
	Ok(last.to_string())
}

pub struct StaticConfigEditor {
	path: PathBuf,
}

impl StaticConfigEditor {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		StaticConfigEditor { path: path.into() }
	}

	fn load(&self) -> StaticConfigResult<Mapping> {
		if !self.path.exists() {
			return Ok(Mapping::new());
		}
		let raw = fs::read_to_string(&self.path)?;
		if raw.trim().is_empty() {
			return Ok(Mapping::new());
		}
		let value: Value = serde_yaml::from_str(&raw).map_err(|e| StaticConfigError::Parse(e.to_string()))?;
		match value {
			Value::Mapping(m) => Ok(m),
			Value::Null => Ok(Mapping::new()),
			other => Err(StaticConfigError::Parse(format!("expected a YAML mapping at the document root, found {other:?}"))),
		}
	}

	fn save(&self, doc: &Mapping) -> StaticConfigResult<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}
		if self.path.exists() {
			backup(&self.path)?;
		}
		let rendered = serde_yaml::to_string(&Value::Mapping(doc.clone())).map_err(|e| StaticConfigError::Parse(e.to_string()))?;
		write_atomic(&self.path, rendered.as_bytes())?;
		Ok(())
	}

	/// Upserts `experimental.plugins.<key> = {moduleName, version?}`.
	pub fn install_plugin(&self, module_name: &str, version: Option<&str>) -> StaticConfigResult<String> {
		let key = derive_plugin_key(module_name)?;
		let mut doc = self.load()?;

		let experimental = mapping_entry(&mut doc, "experimental");
		let plugins = mapping_entry(experimental, "plugins");

		let mut entry = Mapping::new();
		entry.insert(Value::String("moduleName".into()), Value::String(module_name.to_string()));
		if let Some(v) = version {
			entry.insert(Value::String("version".into()), Value::String(v.to_string()));
		}
		plugins.insert(Value::String(key.clone()), Value::Mapping(entry));

		self.save(&doc)?;
		Ok(key)
	}

	/// Removes a plugin entry, pruning `plugins`/`experimental` if they become empty.
	pub fn remove_plugin(&self, key: &str) -> StaticConfigResult<bool> {
		let mut doc = self.load()?;
		let removed = remove_plugin_key(&mut doc, key);
		if removed {
			self.save(&doc)?;
		}
		Ok(removed)
	}

	/// Returns the `experimental.plugins` subtree as `key -> {moduleName, version}`.
	pub fn list_plugins(&self) -> StaticConfigResult<Mapping> {
		let doc = self.load()?;
		let Some(Value::Mapping(experimental)) = doc.get(&Value::String("experimental".into())) else {
			return Ok(Mapping::new());
		};
		let Some(Value::Mapping(plugins)) = experimental.get(&Value::String("plugins".into())) else {
			return Ok(Mapping::new());
		};
		Ok(plugins.clone())
	}

	/// Sets an arbitrary dotted path (`a.b.c`) to `value`, creating intermediate mappings.
	pub fn update_path(&self, dotted_path: &str, value: Value) -> StaticConfigResult<()> {
		let mut doc = self.load()?;
		let segments: Vec<&str> = dotted_path.split('.').filter(|s| !s.is_empty()).collect();
		if segments.is_empty() {
			return Err(StaticConfigError::Parse("empty path".into()));
		}
		let mut cursor = &mut doc;
		for segment in &segments[..segments.len() - 1] {
			cursor = mapping_entry(cursor, segment);
		}
		cursor.insert(Value::String(segments[segments.len() - 1].to_string()), value);
		self.save(&doc)
	}
}

fn mapping_entry<'a>(parent: &'a mut Mapping, key: &str) -> &'a mut Mapping {
	let entry = parent.entry(Value::String(key.to_string())).or_insert_with(|| Value::Mapping(Mapping::new()));
	if !matches!(entry, Value::Mapping(_)) {
		*entry = Value::Mapping(Mapping::new());
	}
	match entry {
		Value::Mapping(m) => m,
		_ => unreachable!(),
	}
}

fn remove_plugin_key(doc: &mut Mapping, key: &str) -> bool {
	let Some(Value::Mapping(experimental)) = doc.get_mut(&Value::String("experimental".into())) else {
		return false;
	};
	let Some(Value::Mapping(plugins)) = experimental.get_mut(&Value::String("plugins".into())) else {
		return false;
	};
	let removed = plugins.remove(&Value::String(key.to_string())).is_some();
	if removed && plugins.is_empty() {
		experimental.remove(&Value::String("plugins".into()));
	}
	if experimental.is_empty() {
		doc.remove(&Value::String("experimental".into()));
	}
	removed
}

fn backup(path: &Path) -> std::io::Result<()> {
	let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
	let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
	let backup_path = path.with_file_name(format!("{file_name}.bak.{timestamp}"));
	fs::copy(path, backup_path)?;
	Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
	let tmp = path.with_extension("tmp");
	{
		let mut f = fs::File::create(&tmp)?;
		f.write_all(contents)?;
		f.sync_all()?;
	}
	fs::rename(&tmp, path)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tmp_path(label: &str) -> PathBuf {
		let mut p = std::env::temp_dir();
		p.push(format!("mw-staticconfig-test-{label}-{}.yml", uuid::Uuid::new_v4()));
		p
	}

	#[test]
	fn derives_plugin_key_from_module_path() {
		assert_eq!(derive_plugin_key("github.com/foo/traefik-secure-headers-plugin").unwrap(), "traefik-secure-headers");
		assert_eq!(derive_plugin_key("github.com/foo/bar.git@v1.2.3").unwrap(), "bar");
		assert_eq!(derive_plugin_key("github.com/foo/Baz-Plugin").unwrap(), "baz");
	}

	#[test]
	fn derive_plugin_key_rejects_empty() {
		assert!(derive_plugin_key("").is_err());
		assert!(derive_plugin_key("   ").is_err());
	}

	#[test]
	fn install_then_remove_plugin_prunes_empty_maps() {
		let path = tmp_path("install-remove");
		let editor = StaticConfigEditor::new(&path);

		let key = editor.install_plugin("github.com/foo/my-plugin", Some("v1.0.0")).unwrap();
		assert_eq!(key, "my");

		let raw = fs::read_to_string(&path).unwrap();
		assert!(raw.contains("experimental"));
		assert!(raw.contains("my"));

		let removed = editor.remove_plugin(&key).unwrap();
		assert!(removed);
		let raw_after = fs::read_to_string(&path).unwrap();
		let doc: Value = serde_yaml::from_str(&raw_after).unwrap();
		assert!(doc.get("experimental").is_none());

		let _ = fs::remove_file(&path);
		remove_backups(&path);
	}

	#[test]
	fn install_preserves_unrelated_keys() {
		let path = tmp_path("preserve");
		fs::write(&path, "entryPoints:\n  web:\n    address: \":80\"\n").unwrap();
		let editor = StaticConfigEditor::new(&path);
		editor.install_plugin("github.com/foo/bar-plugin", None).unwrap();

		let raw = fs::read_to_string(&path).unwrap();
		let doc: Value = serde_yaml::from_str(&raw).unwrap();
		assert!(doc.get("entryPoints").is_some());
		assert!(doc.get("experimental").is_some());

		let _ = fs::remove_file(&path);
		remove_backups(&path);
	}

	#[test]
	fn update_path_creates_intermediate_mappings() {
		let path = tmp_path("update-path");
		let editor = StaticConfigEditor::new(&path);
		editor.update_path("log.level", Value::String("DEBUG".into())).unwrap();
		let raw = fs::read_to_string(&path).unwrap();
		let doc: Value = serde_yaml::from_str(&raw).unwrap();
		assert_eq!(doc["log"]["level"].as_str(), Some("DEBUG"));
		let _ = fs::remove_file(&path);
		remove_backups(&path);
	}

	#[test]
	fn second_write_creates_a_backup() {
		let path = tmp_path("backup");
		let editor = StaticConfigEditor::new(&path);
		editor.update_path("a", Value::String("1".into())).unwrap();
		editor.update_path("b", Value::String("2".into())).unwrap();

		let dir = path.parent().unwrap();
		let stem = path.file_stem().unwrap().to_string_lossy().to_string();
		let has_backup = fs::read_dir(dir)
			.unwrap()
			.filter_map(|e| e.ok())
			.any(|e| e.file_name().to_string_lossy().starts_with(&stem) && e.file_name().to_string_lossy().contains(".bak."));
		assert!(has_backup);

		let _ = fs::remove_file(&path);
		remove_backups(&path);
	}

	fn remove_backups(path: &Path) {
		let Some(dir) = path.parent() else { return };
		let stem = path.file_stem().unwrap_or_default().to_string_lossy().to_string();
		if let Ok(entries) = fs::read_dir(dir) {
			for entry in entries.filter_map(|e| e.ok()) {
				let name = entry.file_name().to_string_lossy().to_string();
				if name.starts_with(&stem) && name.contains(".bak.") {
					let _ = fs::remove_file(entry.path());
				}
			}
		}
	}
}
