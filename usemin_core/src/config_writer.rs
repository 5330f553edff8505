use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::Block;
use crate::ConfigFragment;
use crate::File;
use crate::FileProbe;
use crate::Flow;
use crate::PipelineContext;
use crate::StepConfigGenerator;
use crate::StepMap;
use crate::StepRef;
use crate::StepRegistry;
use crate::UseminError;
use crate::UseminResult;
use crate::paths;

/// Step name → `{ generated: { files: [...] }, <target>: ... }`.
pub type ConfigTree = Map<String, Value>;

/// Roots the generated configuration is expressed against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigWriterOptions {
	/// Input roots. When empty, each document's own directory is used.
	pub input: Vec<String>,
	/// Final destination root.
	pub dest: String,
	/// Root of intermediate outputs. Step `n` writes to `<staging>/<n>`.
	pub staging: String,
}

impl ConfigWriterOptions {
	pub fn new(
		input: impl IntoIterator<Item = impl Into<String>>,
		dest: impl Into<String>,
		staging: impl Into<String>,
	) -> Self {
		Self {
			input: input.into_iter().map(Into::into).collect(),
			dest: dest.into(),
			staging: staging.into(),
		}
	}
}

impl Default for ConfigWriterOptions {
	fn default() -> Self {
		Self::new(Vec::<String>::new(), "dist", ".tmp")
	}
}

/// Destinations already configured, with the sources they were configured
/// from.
#[derive(Debug, Clone, Default)]
pub struct SeenRegistry {
	destinations: HashMap<String, Vec<String>>,
}

impl SeenRegistry {
	/// Record that `dest` is built from `src`.
	///
	/// Returns `false` when the exact same pair was already recorded, and
	/// fails when `dest` was recorded with different sources.
	pub fn claim(&mut self, dest: &str, src: &[String]) -> UseminResult<bool> {
		match self.destinations.get(dest) {
			Some(existing) if existing.as_slice() == src => Ok(false),
			Some(existing) => Err(UseminError::DestinationConflict {
				dest: dest.to_string(),
				existing: existing.clone(),
				conflicting: src.to_vec(),
			}),
			None => {
				self.destinations.insert(dest.to_string(), src.to_vec());
				Ok(true)
			}
		}
	}

	pub fn contains(&self, dest: &str) -> bool {
		self.destinations.contains_key(dest)
	}

	pub fn len(&self) -> usize {
		self.destinations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.destinations.is_empty()
	}
}

/// Accumulated additions for one step during a single `process` call.
#[derive(Default)]
struct StepAdditions {
	files: Vec<Value>,
	targets: Map<String, Value>,
}

/// Turns the blocks of documents into build-tool configuration.
///
/// The writer keeps track of every destination it configured, so processing
/// the same document repeatedly never duplicates entries.
#[derive(Debug, Clone)]
pub struct ConfigWriter {
	flow: Flow,
	options: ConfigWriterOptions,
	registry: StepRegistry,
	seen: SeenRegistry,
	file_exists: FileProbe,
}

impl ConfigWriter {
	pub fn new(flow: Flow, options: ConfigWriterOptions) -> Self {
		Self {
			flow,
			options,
			registry: StepRegistry::builtin(),
			seen: SeenRegistry::default(),
			file_exists: FileProbe::default(),
		}
	}

	/// Use `registry` to resolve step names instead of the built-in one.
	#[must_use]
	pub fn with_registry(mut self, registry: StepRegistry) -> Self {
		self.registry = registry;
		self
	}

	/// Check input files with `probe` when a block reads from several input
	/// directories. Relative paths are otherwise checked against the working
	/// directory.
	#[must_use]
	pub fn with_file_probe(mut self, probe: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
		self.file_exists = FileProbe::new(probe);
		self
	}

	pub fn flow(&self) -> &Flow {
		&self.flow
	}

	pub fn options(&self) -> &ConfigWriterOptions {
		&self.options
	}

	pub fn seen(&self) -> &SeenRegistry {
		&self.seen
	}

	/// Generators for the steps of `block_type`. Without a type, the union of
	/// the steps of every type, in first-seen order.
	pub fn step_writers(&self, block_type: Option<&str>) -> UseminResult<Vec<Arc<dyn StepConfigGenerator>>> {
		match block_type {
			Some(block_type) => self.resolve_all(self.flow.steps(block_type)),
			None => self.resolve_union(self.flow.step_map()),
		}
	}

	/// Generators for the post-processing steps of `block_type`. Without a
	/// type, the union of the post steps of every type.
	pub fn post_writers(&self, block_type: Option<&str>) -> UseminResult<Vec<Arc<dyn StepConfigGenerator>>> {
		match block_type {
			Some(block_type) => self.resolve_all(self.flow.post(block_type)),
			None => self.resolve_union(self.flow.post_map()),
		}
	}

	fn resolve_all(&self, steps: &[StepRef]) -> UseminResult<Vec<Arc<dyn StepConfigGenerator>>> {
		steps.iter().map(|step| self.registry.resolve(step)).collect()
	}

	fn resolve_union(&self, map: &StepMap) -> UseminResult<Vec<Arc<dyn StepConfigGenerator>>> {
		let mut writers: Vec<Arc<dyn StepConfigGenerator>> = Vec::new();
		for step in map.values().flatten() {
			if writers.iter().any(|writer| writer.name() == step.name()) {
				continue;
			}
			writers.push(self.registry.resolve(step)?);
		}
		Ok(writers)
	}

	/// Directories the first step of `block` reads from.
	///
	/// An alternate search path on the block wins over the configured input
	/// roots, which win over the document's own directory.
	fn input_dirs(&self, file: &File, block: &Block) -> Vec<String> {
		if !block.search_path.is_empty() {
			block.search_path.clone()
		} else if !self.options.input.is_empty() {
			self.options.input.clone()
		} else {
			file.search_path.clone()
		}
	}

	/// Generate configuration for every block of `file` and merge it into
	/// `existing`.
	///
	/// Keys of `existing` are preserved; generated file lists are appended to
	/// and generated targets replace same-named ones. Blocks whose destination
	/// was already configured from the same sources are skipped.
	pub fn process(&mut self, file: &File, existing: Option<ConfigTree>) -> UseminResult<ConfigTree> {
		let mut writers = self.step_writers(None)?;
		writers.extend(self.post_writers(None)?);

		let mut additions: IndexMap<String, StepAdditions> = IndexMap::new();
		for writer in &writers {
			additions.entry(writer.name().to_string()).or_default();
		}

		for block in &file.blocks {
			if !self.seen.claim(&block.dest, &block.src)? {
				tracing::debug!(dest = %block.dest, "block already configured, skipping");
				continue;
			}

			tracing::debug!(dest = %block.dest, r#type = %block.r#type, "configuring block");
			self.process_block(file, block, existing.as_ref(), &mut additions)?;
		}

		let mut tree = existing.unwrap_or_default();
		for (step, step_additions) in additions {
			merge_step(&mut tree, step, step_additions);
		}

		Ok(tree)
	}

	fn process_block(
		&self,
		file: &File,
		block: &Block,
		existing: Option<&ConfigTree>,
		additions: &mut IndexMap<String, StepAdditions>,
	) -> UseminResult<()> {
		let steps = self.step_writers(Some(&block.r#type))?;
		let mut context = PipelineContext {
			input_dirs: self.input_dirs(file, block),
			input_files: block.src.clone(),
			file_exists: self.file_exists.clone(),
			..PipelineContext::default()
		};

		for (idx, writer) in steps.iter().enumerate() {
			let is_last_step = idx + 1 == steps.len();
			context.is_last_step = is_last_step;
			context.output_dir = if is_last_step {
				self.options.dest.clone()
			} else {
				paths::join(&[self.options.staging.as_str(), writer.name()])
			};
			context.output_files = Vec::new();
			context.options = ambient_options(existing, writer.name());

			let fragment = writer.create_config(&mut context, block)?;
			record(additions, writer.name(), fragment);

			context.input_dirs = vec![context.output_dir.clone()];
			context.input_files = std::mem::take(&mut context.output_files);
		}

		for writer in self.post_writers(Some(&block.r#type))? {
			let mut post_context = PipelineContext {
				input_dirs: context.input_dirs.clone(),
				input_files: context.input_files.clone(),
				output_dir: self.options.dest.clone(),
				output_files: Vec::new(),
				is_last_step: true,
				options: ambient_options(existing, writer.name()),
				file_exists: self.file_exists.clone(),
			};

			let fragment = writer.create_config(&mut post_context, block)?;
			record(additions, writer.name(), fragment);
		}

		Ok(())
	}
}

fn ambient_options(existing: Option<&ConfigTree>, step: &str) -> Option<Map<String, Value>> {
	existing?.get(step)?.as_object().cloned()
}

fn record(additions: &mut IndexMap<String, StepAdditions>, step: &str, fragment: ConfigFragment) {
	let entry = additions.entry(step.to_string()).or_default();
	entry.files.extend(
		fragment
			.files
			.into_iter()
			.map(|mapping| json!({ "dest": mapping.dest, "src": mapping.src })),
	);
	entry.targets.extend(fragment.targets);
}

fn merge_step(tree: &mut ConfigTree, step: String, additions: StepAdditions) {
	let section = tree.entry(step).or_insert_with(|| Value::Object(Map::new()));
	if !section.is_object() {
		*section = Value::Object(Map::new());
	}
	let Value::Object(section) = section else {
		return;
	};

	section.extend(additions.targets);

	let generated = section
		.entry("generated")
		.or_insert_with(|| Value::Object(Map::new()));
	if !generated.is_object() {
		*generated = Value::Object(Map::new());
	}
	let Value::Object(generated) = generated else {
		return;
	};

	if additions.files.is_empty() {
		return;
	}

	let files = generated
		.entry("files")
		.or_insert_with(|| Value::Array(Vec::new()));
	if !files.is_array() {
		*files = Value::Array(Vec::new());
	}
	if let Value::Array(files) = files {
		files.extend(additions.files);
	}
}
