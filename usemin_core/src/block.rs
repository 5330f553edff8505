use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::BlockParser;
use crate::UseminResult;
use crate::paths;

/// One authored group of source files destined for a single optimized output.
///
/// ```html
/// <!-- build:js scripts/site.js -->
/// <script src="foo.js"></script>
/// <script src="bar.js"></script>
/// <!-- endbuild -->
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Block {
	/// Asset category tag, e.g. `js`, `css` or a custom tag.
	pub r#type: String,
	/// Logical output path. Identity key for deduplication and conflicts.
	pub dest: String,
	/// Input paths in authored order.
	pub src: Vec<String>,
	/// The original lines from the start marker to the end marker, used as
	/// the search key when the block is replaced.
	pub raw: Vec<String>,
	/// Leading whitespace of the start marker.
	pub indent: String,
	/// Alternate search path declared in the marker, `build:js(app) ...`.
	pub search_path: Vec<String>,
	pub defer: bool,
	pub r#async: bool,
	pub media: Option<String>,
	/// IE conditional comment opening the block, e.g. `<!--[if lt IE 9]>`.
	pub conditional_start: Option<String>,
	/// IE conditional comment closing the block, e.g. `<![endif]-->`.
	pub conditional_end: Option<String>,
	/// Module-bundler settings, present when a script declares `data-main`.
	pub requirejs: Option<RequireJsBlock>,
}

impl Block {
	/// Shorthand used by callers that build blocks by hand.
	pub fn new(
		r#type: impl Into<String>,
		dest: impl Into<String>,
		src: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			r#type: r#type.into(),
			dest: dest.into(),
			src: src.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	/// The raw lines joined with `linefeed`, i.e. the exact text to search for
	/// in the document.
	pub fn raw_text(&self, linefeed: &str) -> String {
		self.raw.join(linefeed)
	}
}

/// Module-bundler (requirejs-like) sub-configuration of a [`Block`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequireJsBlock {
	/// Output of the bundler, relative to the destination root.
	pub dest: String,
	/// Directory of the main module, relative to the input root.
	pub base_url: String,
	/// Name of the main module, with or without `.js`.
	pub name: String,
	/// The loader script referenced by the block.
	pub src: String,
	pub orig_script: String,
}

/// A document together with the blocks found in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
	/// Directory of the document, `/` separated.
	pub dir: String,
	/// File name of the document.
	pub name: String,
	/// The document text as read.
	pub content: String,
	/// Blocks in document order.
	pub blocks: Vec<Block>,
	/// Directories referenced files are resolved against by default. Holds
	/// the document's own directory.
	pub search_path: Vec<String>,
}

impl File {
	/// Build a file from an already parsed list of blocks.
	pub fn from_blocks(path: &str, content: impl Into<String>, blocks: Vec<Block>) -> Self {
		let dir = paths::dirname(path).to_string();
		Self {
			name: paths::basename(path).to_string(),
			search_path: vec![dir.clone()],
			dir,
			content: content.into(),
			blocks,
		}
	}

	/// Parse `content` with `parser`.
	pub fn parse(path: &str, content: impl Into<String>, parser: &dyn BlockParser) -> UseminResult<Self> {
		let content = content.into();
		let blocks = parser.parse(&content)?;
		Ok(Self::from_blocks(path, content, blocks))
	}

	/// Read and parse the document at `path`.
	pub fn read(path: &Path, parser: &dyn BlockParser) -> UseminResult<Self> {
		let content = std::fs::read_to_string(path)?;
		let key = path.to_string_lossy().replace('\\', "/");
		Self::parse(&key, content, parser)
	}

	/// The line ending used by the document.
	pub fn linefeed(&self) -> &'static str {
		linefeed_of(&self.content)
	}
}

/// `"\r\n"` when the text uses Windows line endings, otherwise `"\n"`.
pub fn linefeed_of(content: &str) -> &'static str {
	if content.contains("\r\n") { "\r\n" } else { "\n" }
}
