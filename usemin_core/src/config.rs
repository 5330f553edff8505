use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::Block;
use crate::BlockReplacement;
use crate::ConfigWriterOptions;
use crate::Flow;
use crate::FlowConfig;
use crate::RevvedPattern;
use crate::UseminError;
use crate::UseminResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["usemin.toml", ".usemin.toml", ".config/usemin.toml"];

fn default_dest() -> String {
	"dist".to_string()
}

fn default_staging() -> String {
	".tmp".to_string()
}

/// A custom rewrite rule from `[[patterns.<type>]]`.
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
	/// Regular expression; group 1, or the `path` group, is the reference.
	pub pattern: String,
	/// Shown when a reference matched by this rule is replaced.
	#[serde(default)]
	pub message: String,
}

/// Configuration loaded from a `usemin.toml` file.
///
/// ```toml
/// dest = "dist"
/// staging = ".tmp"
/// input = ["app"]
/// revmap = "dist/assets.json"
/// assets_dirs = ["dist"]
///
/// [flow.steps]
/// js = ["concat", "uglify"]
/// css = ["concat", "cssmin"]
///
/// [[patterns.html]]
/// pattern = '<x-icon src="([^"]+)"'
/// message = "Update custom icons"
///
/// [block_replacements]
/// less = '<link rel="stylesheet/less" href="{dest}">'
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseminConfig {
	/// Final destination root.
	#[serde(default = "default_dest")]
	pub dest: String,
	/// Root of intermediate step outputs.
	#[serde(default = "default_staging")]
	pub staging: String,
	/// Input roots. Documents' own directories are used when empty.
	#[serde(default)]
	pub input: Vec<String>,
	/// JSON logical → revved path mapping. When absent, revved files are
	/// looked up on disk.
	#[serde(default)]
	pub revmap: Option<PathBuf>,
	/// Directories searched for revved assets when rewriting.
	#[serde(default)]
	pub assets_dirs: Vec<String>,
	/// Steps per block type. The standard flow is used when absent.
	#[serde(default)]
	pub flow: Option<FlowConfig>,
	/// Extra rewrite rules per document type.
	#[serde(default)]
	pub patterns: IndexMap<String, Vec<PatternConfig>>,
	/// Replacement templates for custom block types. `{dest}` is substituted
	/// with the block's destination.
	#[serde(default)]
	pub block_replacements: IndexMap<String, String>,
}

impl Default for UseminConfig {
	fn default() -> Self {
		Self {
			dest: default_dest(),
			staging: default_staging(),
			input: Vec::new(),
			revmap: None,
			assets_dirs: Vec::new(),
			flow: None,
			patterns: IndexMap::new(),
			block_replacements: IndexMap::new(),
		}
	}
}

impl UseminConfig {
	/// Return the first config file found at `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is none.
	pub fn load(root: &Path) -> UseminResult<Option<UseminConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_file(&config_path).map(Some)
	}

	/// Load the config from an explicit file.
	pub fn load_file(path: &Path) -> UseminResult<UseminConfig> {
		let content = std::fs::read_to_string(path)?;
		let config: UseminConfig =
			toml::from_str(&content).map_err(|e| UseminError::ConfigParse(e.to_string()))?;
		tracing::debug!(path = %path.display(), "loaded configuration");

		Ok(config)
	}

	pub fn flow(&self) -> Flow {
		self.flow.clone().map_or_else(Flow::standard, Flow::new)
	}

	pub fn writer_options(&self) -> ConfigWriterOptions {
		ConfigWriterOptions::new(self.input.clone(), self.dest.clone(), self.staging.clone())
	}

	/// The configured revision map, resolved against `root`.
	pub fn revmap_path(&self, root: &Path) -> Option<PathBuf> {
		self.revmap.as_ref().map(|revmap| root.join(revmap))
	}

	/// Compile the custom rules configured for `doc_type`.
	pub fn patterns_for(&self, doc_type: &str) -> UseminResult<Vec<RevvedPattern>> {
		self.patterns
			.get(doc_type)
			.into_iter()
			.flatten()
			.map(|pattern| RevvedPattern::new(&pattern.pattern, pattern.message.clone()))
			.collect()
	}

	/// The configured block replacement templates as renderers.
	pub fn block_replacements(&self) -> HashMap<String, BlockReplacement> {
		self.block_replacements
			.iter()
			.map(|(block_type, template)| {
				let template = template.clone();
				let render: BlockReplacement =
					Arc::new(move |block: &Block| template.replace("{dest}", &block.dest));
				(block_type.clone(), render)
			})
			.collect()
	}
}
