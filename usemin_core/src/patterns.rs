use std::fmt;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Captures;
use regex::Match;
use regex::Regex;

use crate::UseminError;
use crate::UseminResult;
use crate::paths;

/// Maps a reference before lookup (`filter_in`) or a lookup result before it
/// is written back (`filter_out`).
pub type ReferenceFilter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How the captured text of a pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ReferenceKind {
	/// A single asset reference.
	#[default]
	Path,
	/// A comma separated `srcset` candidate list.
	SrcSet,
	/// A reference only worth resolving when it carries a known asset
	/// extension.
	Asset,
}

/// Extensions treated as assets in attributes that may hold anything.
pub const ASSET_EXTENSIONS: &[&str] = &[
	".js", ".mjs", ".css", ".json", ".map", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp",
	".avif", ".ico", ".bmp", ".eot", ".ttf", ".otf", ".woff", ".woff2", ".mp4", ".webm", ".ogg",
	".mp3", ".wav", ".pdf", ".html",
];

/// A rule locating asset references in a document.
///
/// The reference is the `path` named group, or group 1 when the expression
/// has no such group. Only that span of the match is rewritten.
#[derive(Clone)]
pub struct RevvedPattern {
	regex: Regex,
	message: String,
	kind: ReferenceKind,
	excluded_attributes: Vec<String>,
	filter_in: Option<ReferenceFilter>,
	filter_out: Option<ReferenceFilter>,
}

impl RevvedPattern {
	pub fn new(pattern: &str, message: impl Into<String>) -> UseminResult<Self> {
		let regex = Regex::new(pattern).map_err(|e| UseminError::InvalidPattern {
			pattern: pattern.to_string(),
			reason: e.to_string(),
		})?;

		Ok(Self::from_regex(regex, message))
	}

	pub fn from_regex(regex: Regex, message: impl Into<String>) -> Self {
		Self {
			regex,
			message: message.into(),
			kind: ReferenceKind::default(),
			excluded_attributes: Vec::new(),
			filter_in: None,
			filter_out: None,
		}
	}

	#[must_use]
	pub fn with_kind(mut self, kind: ReferenceKind) -> Self {
		self.kind = kind;
		self
	}

	/// Ignore matches whose `attr` group equals `attribute`.
	#[must_use]
	pub fn excluding_attribute(mut self, attribute: impl Into<String>) -> Self {
		self.excluded_attributes.push(attribute.into());
		self
	}

	#[must_use]
	pub fn with_filter_in(mut self, filter: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
		self.filter_in = Some(Arc::new(filter));
		self
	}

	#[must_use]
	pub fn with_filter_out(mut self, filter: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
		self.filter_out = Some(Arc::new(filter));
		self
	}

	pub fn regex(&self) -> &Regex {
		&self.regex
	}

	/// Human readable description used when logging replacements.
	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn kind(&self) -> ReferenceKind {
		self.kind
	}

	/// The reference span of a match, `None` when the match should be left
	/// alone.
	pub(crate) fn reference<'h>(&self, captures: &Captures<'h>) -> Option<Match<'h>> {
		if let Some(attr) = captures.name("attr") {
			if self
				.excluded_attributes
				.iter()
				.any(|excluded| excluded == attr.as_str())
			{
				return None;
			}
		}

		let reference = captures.name("path").or_else(|| captures.get(1))?;
		if self.kind == ReferenceKind::Asset && !has_asset_extension(reference.as_str()) {
			return None;
		}

		Some(reference)
	}

	pub(crate) fn filter_in(&self, reference: &str) -> String {
		self.filter_in
			.as_ref()
			.map_or_else(|| reference.to_string(), |filter| filter(reference))
	}

	pub(crate) fn filter_out(&self, reference: &str) -> String {
		self.filter_out
			.as_ref()
			.map_or_else(|| reference.to_string(), |filter| filter(reference))
	}
}

impl fmt::Debug for RevvedPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RevvedPattern")
			.field("regex", &self.regex.as_str())
			.field("message", &self.message)
			.field("kind", &self.kind)
			.finish_non_exhaustive()
	}
}

fn has_asset_extension(reference: &str) -> bool {
	let path = reference.split(['?', '#']).next().unwrap_or(reference);
	let ext = paths::extname(path).to_ascii_lowercase();
	ASSET_EXTENSIONS.contains(&ext.as_str())
}

fn rule(pattern: &str, message: &str) -> RevvedPattern {
	RevvedPattern::from_regex(
		Regex::new(pattern).expect("valid built-in reference pattern"),
		message,
	)
}

fn attribute(tags: &str, attribute: &str) -> String {
	format!(r#"<(?:{tags})(?:\s[^>]*)?\s{attribute}=['"](?P<path>[^'"]+)['"]"#)
}

static HTML_PATTERNS: LazyLock<Vec<RevvedPattern>> = LazyLock::new(|| {
	vec![
		rule(
			&attribute("script", "src"),
			"Update the HTML to reference our revved/min scripts",
		),
		rule(
			&attribute("link", "href"),
			"Update the HTML with the new css filenames",
		),
		rule(
			&attribute("img", "src"),
			"Update the HTML with the new img filenames",
		),
		rule(
			&attribute("img|source", "srcset"),
			"Update the HTML with the new image filenames in srcset",
		)
		.with_kind(ReferenceKind::SrcSet),
		rule(
			&attribute("video|audio|source|track|embed|iframe", "src"),
			"Update the HTML with the new media filenames",
		),
		rule(
			&attribute("video", "poster"),
			"Update the HTML with the new poster filenames",
		),
		rule(
			&attribute("image", "src"),
			"Update the HTML with the new image filenames",
		),
		rule(
			&attribute("image|use", "xlink:href"),
			"Update the HTML with the new svg filenames",
		),
		rule(
			&attribute("object", "data"),
			"Update the HTML with the new object filenames",
		),
		rule(
			&attribute("a", "href"),
			"Update the HTML with the new anchor filenames",
		),
		rule(
			&attribute("input", "src"),
			"Update the HTML with the new input image filenames",
		),
		rule(
			&attribute("meta", "content"),
			"Update the HTML with the new meta filenames",
		),
		rule(
			r#"\sdata-main=['"](?P<path>[^'"]+)['"]"#,
			"Update the HTML with data-main tags",
		),
		rule(
			r#"\sdata-(?P<attr>[\w-]+)=['"](?P<path>[^'"]+)['"]"#,
			"Update the HTML with data-* tags",
		)
		.with_kind(ReferenceKind::Asset)
		.excluding_attribute("main"),
		rule(
			r#"url\(\s*['"]?(?P<path>[^'"()\s]+)['"]?\s*\)"#,
			"Update the HTML with background imgs, case there is some inline style",
		),
	]
});

static CSS_PATTERNS: LazyLock<Vec<RevvedPattern>> = LazyLock::new(|| {
	vec![
		rule(
			r#"(?:src=|url\(\s*)['"]?(?P<path>[^'"()\s]+)['"]?"#,
			"Update the CSS to reference our revved images",
		),
		rule(
			r#"@import\s+['"](?P<path>[^'"]+)['"]"#,
			"Update the CSS with the new imported stylesheets",
		),
	]
});

static JSON_PATTERNS: LazyLock<Vec<RevvedPattern>> = LazyLock::new(|| {
	vec![rule(
		r#":\s*['"](?P<path>[^'"]+)['"]"#,
		"Update the JSON with the new img filenames",
	)]
});

/// The built-in rules for a document type: `html`, `css` or `json`. Other
/// types have none.
pub fn builtin_patterns(doc_type: &str) -> Vec<RevvedPattern> {
	match doc_type {
		"html" => HTML_PATTERNS.clone(),
		"css" => CSS_PATTERNS.clone(),
		"json" => JSON_PATTERNS.clone(),
		_ => Vec::new(),
	}
}
