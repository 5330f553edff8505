use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Deserializer;

use crate::StepConfigGenerator;

/// Legacy step names and the name they are canonicalized to.
pub const STEP_ALIASES: [(&str, &str); 1] = [("uglifyjs", "uglify")];

/// One entry of a flow: either the name of a registered step or a
/// caller-supplied generator.
#[derive(Clone)]
#[non_exhaustive]
pub enum StepRef {
	Named(String),
	Custom(Arc<dyn StepConfigGenerator>),
}

impl StepRef {
	/// Wrap a caller-supplied generator.
	pub fn custom(generator: impl StepConfigGenerator + 'static) -> Self {
		Self::Custom(Arc::new(generator))
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Named(name) => name,
			Self::Custom(generator) => generator.name(),
		}
	}

	fn canonical(self) -> Self {
		match self {
			Self::Named(name) => {
				let canonical = STEP_ALIASES
					.iter()
					.find(|(alias, _)| *alias == name)
					.map_or(name, |(_, target)| (*target).to_string());
				Self::Named(canonical)
			}
			custom @ Self::Custom(_) => custom,
		}
	}
}

impl fmt::Debug for StepRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
			Self::Custom(generator) => f.debug_tuple("Custom").field(&generator.name()).finish(),
		}
	}
}

impl PartialEq<&str> for StepRef {
	fn eq(&self, other: &&str) -> bool {
		self.name() == *other
	}
}

impl From<&str> for StepRef {
	fn from(value: &str) -> Self {
		Self::Named(value.to_string())
	}
}

impl From<String> for StepRef {
	fn from(value: String) -> Self {
		Self::Named(value)
	}
}

impl<'de> Deserialize<'de> for StepRef {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self::Named)
	}
}

/// Block type → ordered steps.
pub type StepMap = IndexMap<String, Vec<StepRef>>;

/// The `[flow]` section of the configuration.
///
/// ```toml
/// [flow.steps]
/// js = ["concat", "uglify"]
/// css = ["concat", "cssmin"]
///
/// [flow.post]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowConfig {
	#[serde(default)]
	pub steps: StepMap,
	#[serde(default)]
	pub post: StepMap,
}

/// Which steps, and which post-processing steps, each block type goes
/// through.
#[derive(Debug, Clone, Default)]
pub struct Flow {
	steps: StepMap,
	post: StepMap,
}

impl Flow {
	pub fn new(config: FlowConfig) -> Self {
		let mut flow = Self::default();
		flow.set_steps(config.steps);
		flow.set_post(config.post);
		flow
	}

	/// `js` → concat, uglify and `css` → concat, cssmin, without post steps.
	pub fn standard() -> Self {
		let mut steps = StepMap::new();
		steps.insert("js".into(), vec!["concat".into(), "uglify".into()]);
		steps.insert("css".into(), vec!["concat".into(), "cssmin".into()]);

		Self::new(FlowConfig {
			steps,
			post: StepMap::new(),
		})
	}

	/// Steps for `block_type`, empty when it has none.
	pub fn steps(&self, block_type: &str) -> &[StepRef] {
		self.steps.get(block_type).map_or(&[], Vec::as_slice)
	}

	/// Post-processing steps for `block_type`, empty when it has none.
	pub fn post(&self, block_type: &str) -> &[StepRef] {
		self.post.get(block_type).map_or(&[], Vec::as_slice)
	}

	/// Replace every step list. Legacy names are canonicalized.
	pub fn set_steps(&mut self, steps: StepMap) {
		self.steps = canonicalize(steps);
	}

	/// Replace every post-processing list. Legacy names are canonicalized.
	pub fn set_post(&mut self, post: StepMap) {
		self.post = canonicalize(post);
	}

	/// All block types mentioned in steps, then in post, in first-seen
	/// order.
	pub fn block_types(&self) -> Vec<&str> {
		let mut types: Vec<&str> = Vec::new();
		for block_type in self.steps.keys().chain(self.post.keys()) {
			if !types.contains(&block_type.as_str()) {
				types.push(block_type);
			}
		}
		types
	}

	pub(crate) fn step_map(&self) -> &StepMap {
		&self.steps
	}

	pub(crate) fn post_map(&self) -> &StepMap {
		&self.post
	}
}

fn canonicalize(map: StepMap) -> StepMap {
	map.into_iter()
		.map(|(block_type, steps)| {
			(
				block_type,
				steps.into_iter().map(StepRef::canonical).collect(),
			)
		})
		.collect()
}
