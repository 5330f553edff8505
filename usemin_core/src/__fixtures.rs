use std::collections::HashMap;

use regex::Regex;

use crate::AssetFinder;
use crate::Block;
use crate::File;
use crate::RequireJsBlock;
use crate::StepRef;
use crate::paths;

/// A finder answering from a fixed table, whatever the search directories.
pub(crate) struct TableFinder(pub HashMap<String, String>);

impl TableFinder {
	pub(crate) fn new(entries: &[(&str, &str)]) -> Self {
		Self(
			entries
				.iter()
				.map(|(from, to)| ((*from).to_string(), (*to).to_string()))
				.collect(),
		)
	}
}

impl AssetFinder for TableFinder {
	fn find(&self, path: &str, _search_dirs: &[String]) -> String {
		self.0.get(path).cloned().unwrap_or_else(|| path.to_string())
	}
}

/// A finder returning the same answer for every lookup.
pub(crate) struct ConstantFinder(pub &'static str);

impl AssetFinder for ConstantFinder {
	fn find(&self, _path: &str, _search_dirs: &[String]) -> String {
		self.0.to_string()
	}
}

/// Expand `*` wildcards in the last segment of each pattern by listing the
/// parent directory.
pub(crate) fn expand_on_disk(patterns: &[String]) -> Vec<String> {
	patterns
		.iter()
		.flat_map(|pattern| {
			let dir = paths::dirname(pattern).to_string();
			let glob = regex::escape(paths::basename(pattern)).replace(r"\*", ".*");
			let matcher = Regex::new(&format!("^{glob}$")).expect("valid wildcard");

			std::fs::read_dir(&dir)
				.into_iter()
				.flatten()
				.flatten()
				.filter_map(|entry| entry.file_name().into_string().ok())
				.filter(|name| matcher.is_match(name))
				.map(|name| format!("{dir}/{name}"))
				.collect::<Vec<_>>()
		})
		.collect()
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| (*value).to_string()).collect()
}

pub(crate) fn step_names(steps: &[StepRef]) -> Vec<&str> {
	steps.iter().map(StepRef::name).collect()
}

pub(crate) fn site_block() -> Block {
	Block::new("js", "scripts/site.js", ["foo.js", "bar.js", "baz.js"])
}

pub(crate) fn site_file() -> File {
	File::from_blocks("index.html", "", vec![site_block()])
}

pub(crate) fn amd_block() -> Block {
	let mut block = Block::new("js", "scripts/amd-app.js", ["scripts/vendor/require.js"]);
	block.requirejs = Some(RequireJsBlock {
		dest: "scripts/amd-app.js".into(),
		base_url: "scripts".into(),
		name: "main".into(),
		src: "scripts/vendor/require.js".into(),
		orig_script: "scripts/vendor/require.js".into(),
	});
	block
}

pub(crate) const SITE_HTML: &str = r#"<html>
<head>
  <!-- build:css styles/main.css -->
  <link rel="stylesheet" href="styles/a.css">
  <link rel="stylesheet" href="styles/b.css">
  <!-- endbuild -->
</head>
<body>
  <!-- build:js scripts/site.js -->
  <script src="scripts/foo.js"></script>
  <script src="scripts/bar.js"></script>
  <!-- endbuild -->
</body>
</html>
"#;
