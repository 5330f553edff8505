use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use regex::Captures;

use crate::AssetFinder;
use crate::Block;
use crate::BlockParser;
use crate::File;
use crate::MarkerParser;
use crate::ReferenceKind;
use crate::RevvedPattern;
use crate::UseminError;
use crate::UseminResult;
use crate::builtin_patterns;

/// Renders the replacement markup of a block, without indentation.
pub type BlockReplacement = Arc<dyn Fn(&Block) -> String + Send + Sync>;

/// Receives a line for every reference that was rewritten.
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Markers used by template languages. References containing one are never
/// resolved.
const TEMPLATE_MARKERS: [&str; 5] = ["<%", "{{", "{%", "${", "<?"];

/// Rewrites a document: every block becomes a single reference to its
/// optimized output, and every asset reference is swapped for its revved
/// counterpart.
#[derive(Clone)]
pub struct DocumentRewriter {
	doc_type: String,
	patterns: Vec<RevvedPattern>,
	finder: Arc<dyn AssetFinder>,
	log: Option<LogFn>,
	block_replacements: HashMap<String, BlockReplacement>,
	parser: Arc<dyn BlockParser>,
}

/// Configures a [`DocumentRewriter`].
#[derive(Default)]
pub struct DocumentRewriterBuilder {
	doc_type: Option<String>,
	patterns: Vec<RevvedPattern>,
	finder: Option<Arc<dyn AssetFinder>>,
	log: Option<LogFn>,
	block_replacements: HashMap<String, BlockReplacement>,
	parser: Option<Arc<dyn BlockParser>>,
}

impl DocumentRewriterBuilder {
	/// The document type selecting the built-in patterns: `html`, `css`,
	/// `json`, or any custom type.
	#[must_use]
	pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
		self.doc_type = Some(doc_type.into());
		self
	}

	/// Extra patterns applied after the built-in ones.
	#[must_use]
	pub fn patterns(mut self, patterns: impl IntoIterator<Item = RevvedPattern>) -> Self {
		self.patterns.extend(patterns);
		self
	}

	#[must_use]
	pub fn finder(mut self, finder: impl AssetFinder + 'static) -> Self {
		self.finder = Some(Arc::new(finder));
		self
	}

	#[must_use]
	pub fn shared_finder(mut self, finder: Arc<dyn AssetFinder>) -> Self {
		self.finder = Some(finder);
		self
	}

	#[must_use]
	pub fn logger(mut self, log: impl Fn(&str) + Send + Sync + 'static) -> Self {
		self.log = Some(Arc::new(log));
		self
	}

	/// Render blocks of `block_type` with `replacement`. Overrides the
	/// built-in `js` and `css` renderings when given those types.
	#[must_use]
	pub fn block_replacement(
		mut self,
		block_type: impl Into<String>,
		replacement: impl Fn(&Block) -> String + Send + Sync + 'static,
	) -> Self {
		self.block_replacements
			.insert(block_type.into(), Arc::new(replacement));
		self
	}

	#[must_use]
	pub fn block_replacements(
		mut self,
		replacements: impl IntoIterator<Item = (String, BlockReplacement)>,
	) -> Self {
		self.block_replacements.extend(replacements);
		self
	}

	/// Parse blocks with `parser` instead of [`MarkerParser`].
	#[must_use]
	pub fn parser(mut self, parser: impl BlockParser + 'static) -> Self {
		self.parser = Some(Arc::new(parser));
		self
	}

	pub fn build(self) -> UseminResult<DocumentRewriter> {
		let doc_type = self
			.doc_type
			.filter(|doc_type| !doc_type.is_empty())
			.ok_or(UseminError::MissingType)?;
		let finder = self.finder.ok_or(UseminError::MissingParameter("finder"))?;

		let mut patterns = builtin_patterns(&doc_type);
		patterns.extend(self.patterns);

		Ok(DocumentRewriter {
			doc_type,
			patterns,
			finder,
			log: self.log,
			block_replacements: self.block_replacements,
			parser: self.parser.unwrap_or_else(|| Arc::new(MarkerParser)),
		})
	}
}

impl DocumentRewriter {
	pub fn builder() -> DocumentRewriterBuilder {
		DocumentRewriterBuilder::default()
	}

	/// A rewriter for `doc_type` with only the built-in patterns.
	pub fn new(doc_type: &str, finder: impl AssetFinder + 'static) -> UseminResult<Self> {
		Self::builder().doc_type(doc_type).finder(finder).build()
	}

	pub fn doc_type(&self) -> &str {
		&self.doc_type
	}

	/// Built-in patterns followed by custom ones.
	pub fn patterns(&self) -> &[RevvedPattern] {
		&self.patterns
	}

	/// The markup replacing `block`, indented like its start marker.
	///
	/// Returns `None` for block types with no known rendering; such blocks
	/// are left untouched.
	pub fn replace_with(&self, block: &Block) -> Option<String> {
		let render: &dyn Fn(&Block) -> String = match self.block_replacements.get(&block.r#type) {
			Some(custom) => custom.as_ref(),
			None if block.r#type == "js" => &render_script,
			None if block.r#type == "css" => &render_stylesheet,
			None => {
				tracing::warn!(
					r#type = %block.r#type,
					dest = %block.dest,
					"no replacement known for block type, leaving it untouched"
				);
				return None;
			}
		};

		if block.src.is_empty() {
			return Some(String::new());
		}

		let indent = &block.indent;
		let tag = render(block);
		Some(match (&block.conditional_start, &block.conditional_end) {
			(Some(start), Some(end)) => format!("{indent}{start}\n{indent}{tag}\n{indent}{end}"),
			_ => format!("{indent}{tag}"),
		})
	}

	/// Swap the raw text of every block of `file` for its replacement.
	pub fn replace_blocks(&self, file: &File) -> String {
		let linefeed = file.linefeed();
		let mut result = file.content.clone();

		for block in &file.blocks {
			let Some(replacement) = self.replace_with(block) else {
				continue;
			};
			let raw = block.raw_text(linefeed);
			if let Some(start) = result.find(&raw) {
				result.replace_range(start..start + raw.len(), &replacement);
			} else {
				tracing::warn!(dest = %block.dest, "block text not found in document");
			}
		}

		result
	}

	/// Rewrite every asset reference in `content` to its revved counterpart
	/// found in `search_paths`.
	pub fn replace_with_revved(&self, content: &str, search_paths: &[String]) -> String {
		let mut content = content.to_string();

		for pattern in &self.patterns {
			let replaced = pattern.regex().replace_all(&content, |captures: &Captures<'_>| {
				self.rewrite_match(pattern, captures, search_paths)
			});
			content = replaced.into_owned();
		}

		content
	}

	fn rewrite_match(&self, pattern: &RevvedPattern, captures: &Captures<'_>, search_paths: &[String]) -> String {
		let whole = &captures[0];
		let Some(reference) = pattern.reference(captures) else {
			return whole.to_string();
		};
		let Some(start) = captures.get(0).map(|m| m.start()) else {
			return whole.to_string();
		};

		let revved = match pattern.kind() {
			ReferenceKind::SrcSet => self.revved_srcset(pattern, reference.as_str(), search_paths),
			_ => self.revved_reference(pattern, reference.as_str(), search_paths),
		};
		if revved == reference.as_str() {
			return whole.to_string();
		}

		let rewritten = format!(
			"{}{}{}",
			&whole[..reference.start() - start],
			revved,
			&whole[reference.end() - start..]
		);
		tracing::debug!(pattern = pattern.message(), from = whole, to = %rewritten, "replaced reference");
		if let Some(log) = &self.log {
			log(&format!("{whole} changed to {rewritten}"));
		}

		rewritten
	}

	fn revved_reference(&self, pattern: &RevvedPattern, reference: &str, search_paths: &[String]) -> String {
		if is_external(reference) {
			return reference.to_string();
		}

		let split = reference.find(['?', '#']).unwrap_or(reference.len());
		let (path, suffix) = reference.split_at(split);
		if path.is_empty() {
			return reference.to_string();
		}

		let lookup = pattern.filter_in(path);
		let found = self.finder.find(&lookup, search_paths);
		if found == lookup {
			return reference.to_string();
		}

		format!("{}{suffix}", pattern.filter_out(&found))
	}

	fn revved_srcset(&self, pattern: &RevvedPattern, srcset: &str, search_paths: &[String]) -> String {
		srcset
			.split(',')
			.map(|candidate| {
				let leading = candidate.len() - candidate.trim_start().len();
				let url_end = candidate[leading..]
					.find(char::is_whitespace)
					.map_or(candidate.len(), |idx| leading + idx);
				let url = &candidate[leading..url_end];
				format!(
					"{}{}{}",
					&candidate[..leading],
					self.revved_reference(pattern, url, search_paths),
					&candidate[url_end..]
				)
			})
			.collect::<Vec<_>>()
			.join(",")
	}

	/// Replace the blocks of an already parsed file, then its references.
	pub fn rewrite(&self, file: &File, search_paths: &[String]) -> String {
		let content = self.replace_blocks(file);
		self.replace_with_revved(&content, search_paths)
	}

	/// Read, parse and rewrite the document at `path`.
	pub fn process(&self, path: &Path, search_paths: &[String]) -> UseminResult<String> {
		let file = File::read(path, self.parser.as_ref())?;
		tracing::debug!(path = %path.display(), blocks = file.blocks.len(), "rewriting document");
		Ok(self.rewrite(&file, search_paths))
	}
}

impl fmt::Debug for DocumentRewriter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DocumentRewriter")
			.field("doc_type", &self.doc_type)
			.field("patterns", &self.patterns)
			.field("block_replacements", &self.block_replacements.keys())
			.finish_non_exhaustive()
	}
}

/// Template expressions, absolute urls and inline data are not files.
fn is_external(reference: &str) -> bool {
	reference.is_empty()
		|| reference.contains("://")
		|| reference.starts_with("data:")
		|| TEMPLATE_MARKERS
			.iter()
			.any(|marker| reference.contains(marker))
}

fn render_script(block: &Block) -> String {
	let defer = if block.defer { "defer " } else { "" };
	let r#async = if block.r#async { "async " } else { "" };
	format!(r#"<script {defer}{async}src="{}"></script>"#, block.dest)
}

fn render_stylesheet(block: &Block) -> String {
	let media = block
		.media
		.as_ref()
		.map(|media| format!(r#" media="{media}""#))
		.unwrap_or_default();
	format!(r#"<link rel="stylesheet" href="{}"{media}>"#, block.dest)
}
