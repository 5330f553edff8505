use std::fmt;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::Block;
use crate::StepRef;
use crate::UseminError;
use crate::UseminResult;
use crate::paths;

/// Produces the configuration one processing step needs for one block.
///
/// Generators receive the pipeline context the previous step left behind and
/// must set [`PipelineContext::output_files`] so the next step knows what to
/// consume.
pub trait StepConfigGenerator: Send + Sync {
	/// The configuration key the generated entries are stored under.
	fn name(&self) -> &str;

	fn create_config(&self, context: &mut PipelineContext, block: &Block) -> UseminResult<ConfigFragment>;
}

/// Answers whether an input path exists.
///
/// Paths are the joined input paths, as they appear in the generated
/// configuration. The default checks them relative to the working directory.
#[derive(Clone)]
pub struct FileProbe(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl FileProbe {
	pub fn new(probe: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
		Self(Arc::new(probe))
	}

	pub fn exists(&self, path: &str) -> bool {
		(self.0)(path)
	}
}

impl Default for FileProbe {
	fn default() -> Self {
		Self::new(|path| Path::new(path).exists())
	}
}

impl fmt::Debug for FileProbe {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("FileProbe(..)")
	}
}

/// Flowing state between the steps of a block's pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
	/// Directories the input files are resolved against.
	pub input_dirs: Vec<String>,
	/// Files to consume, relative to [`Self::input_dirs`].
	pub input_files: Vec<String>,
	/// Where this step writes.
	pub output_dir: String,
	/// Set by the generator: what it produced, relative to
	/// [`Self::output_dir`].
	pub output_files: Vec<String>,
	pub is_last_step: bool,
	/// The configuration already present for this step, if any.
	pub options: Option<Map<String, Value>>,
	/// Decides which input directory holds a file when there are several.
	pub file_exists: FileProbe,
}

impl PipelineContext {
	/// Locate `file` among the input directories.
	///
	/// With a single directory the joined path is returned as is. With
	/// several, the first directory holding the file wins and `None` is
	/// returned when none does.
	pub fn resolve_input(&self, file: &str) -> Option<String> {
		match self.input_dirs.as_slice() {
			[] => Some(paths::normalize(file)),
			[dir] => Some(paths::join(&[dir.as_str(), file])),
			dirs => {
				let found = dirs
					.iter()
					.map(|dir| paths::join(&[dir.as_str(), file]))
					.find(|candidate| self.file_exists.exists(candidate));
				if found.is_none() {
					tracing::warn!(%file, ?dirs, "input file not found in any search directory");
				}
				found
			}
		}
	}

	fn resolve_inputs(&self) -> Vec<String> {
		self.input_files
			.iter()
			.filter_map(|file| self.resolve_input(file))
			.collect()
	}

	fn first_input_dir(&self) -> &str {
		self.input_dirs.first().map_or("", String::as_str)
	}
}

/// One `{ dest, src }` entry of a step's generated file list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMapping {
	pub dest: String,
	pub src: Vec<String>,
}

impl FileMapping {
	pub fn new(dest: impl Into<String>, src: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			dest: dest.into(),
			src: src.into_iter().map(Into::into).collect(),
		}
	}
}

/// What a generator contributes for one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFragment {
	/// Appended to the step's `generated.files`.
	pub files: Vec<FileMapping>,
	/// Stored as sibling targets of `generated`, replacing same-named ones.
	pub targets: Map<String, Value>,
}

impl ConfigFragment {
	pub fn with_files(files: Vec<FileMapping>) -> Self {
		Self {
			files,
			targets: Map::new(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty() && self.targets.is_empty()
	}
}

/// Joins every input into the block's destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concat;

impl StepConfigGenerator for Concat {
	fn name(&self) -> &str {
		"concat"
	}

	fn create_config(&self, context: &mut PipelineContext, block: &Block) -> UseminResult<ConfigFragment> {
		let mapping = FileMapping {
			dest: paths::join(&[context.output_dir.as_str(), block.dest.as_str()]),
			src: context.resolve_inputs(),
		};
		context.output_files = vec![block.dest.clone()];

		Ok(ConfigFragment::with_files(vec![mapping]))
	}
}

/// A step transforming files one by one, such as a minifier.
///
/// Inside the pipeline each input maps to a same-named output. As the last
/// step, every input is combined into the block's destination.
#[derive(Debug, Clone)]
pub struct PerFileTransform {
	name: String,
}

impl PerFileTransform {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}

	/// The built-in script minifier step.
	pub fn uglify() -> Self {
		Self::new("uglify")
	}

	/// The built-in stylesheet minifier step.
	pub fn cssmin() -> Self {
		Self::new("cssmin")
	}
}

impl StepConfigGenerator for PerFileTransform {
	fn name(&self) -> &str {
		&self.name
	}

	fn create_config(&self, context: &mut PipelineContext, block: &Block) -> UseminResult<ConfigFragment> {
		if context.is_last_step {
			let mapping = FileMapping {
				dest: paths::join(&[context.output_dir.as_str(), block.dest.as_str()]),
				src: context.resolve_inputs(),
			};
			context.output_files = vec![block.dest.clone()];
			return Ok(ConfigFragment::with_files(vec![mapping]));
		}

		let files = context
			.input_files
			.iter()
			.filter_map(|file| {
				let src = context.resolve_input(file)?;
				Some(FileMapping {
					dest: paths::join(&[context.output_dir.as_str(), file.as_str()]),
					src: vec![src],
				})
			})
			.collect();
		context.output_files = context.input_files.clone();

		Ok(ConfigFragment::with_files(files))
	}
}

/// Emits module-bundler options for blocks declaring a `data-main` module.
///
/// Targets already configured for the step get the computed options filled
/// in where unset; otherwise a single `default` target is produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireJs;

impl RequireJs {
	/// `mainConfigFile` gets `.js` appended unless it already ends with `.js`:
	/// `app.js.loader` becomes `app.js.loader.js`.
	fn computed_options(context: &PipelineContext, block: &Block) -> Option<Map<String, Value>> {
		let requirejs = block.requirejs.as_ref()?;
		let input_dir = context.first_input_dir();

		let mut main_config_file = paths::join(&[
			input_dir,
			requirejs.base_url.as_str(),
			requirejs.name.as_str(),
		]);
		if !main_config_file.ends_with(".js") {
			main_config_file.push_str(".js");
		}

		let mut options = Map::new();
		options.insert("name".into(), Value::String(requirejs.name.clone()));
		options.insert(
			"out".into(),
			Value::String(paths::join(&[
				context.output_dir.as_str(),
				requirejs.dest.as_str(),
			])),
		);
		options.insert(
			"baseUrl".into(),
			Value::String(paths::join(&[input_dir, requirejs.base_url.as_str()])),
		);
		options.insert("mainConfigFile".into(), Value::String(main_config_file));

		Some(options)
	}
}

impl StepConfigGenerator for RequireJs {
	fn name(&self) -> &str {
		"requirejs"
	}

	fn create_config(&self, context: &mut PipelineContext, block: &Block) -> UseminResult<ConfigFragment> {
		let computed = Self::computed_options(context, block);
		context.output_files = Vec::new();

		let Some(computed) = computed else {
			return Ok(ConfigFragment::default());
		};

		let mut targets = Map::new();
		let existing = context.options.iter().flatten();
		for (name, target) in existing.filter(|(name, _)| name.as_str() != "generated") {
			let Value::Object(target) = target else {
				continue;
			};

			let mut target = target.clone();
			match target.get_mut("options") {
				Some(Value::Object(options)) => {
					for (key, value) in &computed {
						let unset = match options.get(key) {
							None | Some(Value::Null) => true,
							Some(Value::String(current)) => current.is_empty(),
							Some(_) => false,
						};
						if unset {
							options.insert(key.clone(), value.clone());
						}
					}
				}
				_ => {
					target.insert("options".into(), Value::Object(computed.clone()));
				}
			}
			targets.insert(name.clone(), Value::Object(target));
		}

		if targets.is_empty() {
			let mut target = Map::new();
			target.insert("options".into(), Value::Object(computed));
			targets.insert("default".into(), Value::Object(target));
		}

		Ok(ConfigFragment {
			files: Vec::new(),
			targets,
		})
	}
}

/// Step name → generator.
#[derive(Clone)]
pub struct StepRegistry {
	generators: IndexMap<String, Arc<dyn StepConfigGenerator>>,
}

impl StepRegistry {
	/// A registry without any step.
	pub fn empty() -> Self {
		Self {
			generators: IndexMap::new(),
		}
	}

	/// `concat`, `uglify`, `cssmin` and `requirejs`.
	pub fn builtin() -> Self {
		let mut registry = Self::empty();
		registry.register(Concat);
		registry.register(PerFileTransform::uglify());
		registry.register(PerFileTransform::cssmin());
		registry.register(RequireJs);
		registry
	}

	/// Add `generator`, replacing any step registered under the same name.
	pub fn register(&mut self, generator: impl StepConfigGenerator + 'static) {
		self.generators
			.insert(generator.name().to_string(), Arc::new(generator));
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn StepConfigGenerator>> {
		self.generators.get(name).cloned()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.generators.keys().map(String::as_str)
	}

	/// The generator behind a flow entry.
	pub fn resolve(&self, step: &StepRef) -> UseminResult<Arc<dyn StepConfigGenerator>> {
		match step {
			StepRef::Named(name) => self
				.get(name)
				.ok_or_else(|| UseminError::UnknownStep(name.clone())),
			StepRef::Custom(generator) => Ok(Arc::clone(generator)),
		}
	}
}

impl Default for StepRegistry {
	fn default() -> Self {
		Self::builtin()
	}
}

impl fmt::Debug for StepRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.generators.keys()).finish()
	}
}
