use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;

use crate::UseminError;
use crate::UseminResult;
use crate::paths;

/// Resolves a logical asset path to the path of its revved counterpart.
///
/// [`RevvedFinder`] is the built-in implementation; the rewriter accepts any
/// finder so callers can substitute their own lookup.
pub trait AssetFinder: Send + Sync {
	/// Return the revved variant of `path`, searching `search_dirs` in
	/// order, or `path` unchanged when there is none.
	fn find(&self, path: &str, search_dirs: &[String]) -> String;
}

/// Value of a revision map entry. Lists resolve to their first element.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum RevvedEntry {
	Single(String),
	Many(Vec<String>),
}

impl RevvedEntry {
	pub fn first(&self) -> Option<&str> {
		match self {
			Self::Single(path) => Some(path.as_str()),
			Self::Many(paths) => paths.first().map(String::as_str),
		}
	}
}

impl From<&str> for RevvedEntry {
	fn from(value: &str) -> Self {
		Self::Single(value.to_string())
	}
}

/// Synchronous glob expansion: given patterns, return the existing files
/// matching any of them.
pub type ExpandFn = dyn Fn(&[String]) -> Vec<String> + Send + Sync;

#[derive(Clone)]
enum Locator {
	Mapping(HashMap<String, RevvedEntry>),
	Expand(Arc<ExpandFn>),
}

impl fmt::Debug for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Mapping(mapping) => f.debug_tuple("Mapping").field(&mapping.len()).finish(),
			Self::Expand(_) => f.write_str("Expand(..)"),
		}
	}
}

/// Find, on disk or in a precomputed mapping, the revved version of a file.
///
/// Given `images/test.png` and search directories `["dist"]`, a hit on
/// `dist/images/test.1234.png` yields `images/test.1234.png`: results keep the
/// shape of the path that was asked for.
#[derive(Debug, Clone)]
pub struct RevvedFinder {
	locator: Locator,
}

impl RevvedFinder {
	/// Look revved files up in a logical path → revved path mapping, as
	/// produced by a file revving tool.
	pub fn from_mapping<K, V>(mapping: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: AsRef<str>,
		V: Into<RevvedEntry>,
	{
		let mapping = mapping
			.into_iter()
			.map(|(key, value)| {
				(
					paths::normalize(&key.as_ref().replace('\\', "/")),
					value.into(),
				)
			})
			.collect();

		Self {
			locator: Locator::Mapping(mapping),
		}
	}

	/// Look revved files up on disk through a glob expansion callback.
	pub fn from_expand(expand: impl Fn(&[String]) -> Vec<String> + Send + Sync + 'static) -> Self {
		Self {
			locator: Locator::Expand(Arc::new(expand)),
		}
	}

	/// Load a JSON revision map from `path`.
	pub fn load_mapping(path: &Path) -> UseminResult<Self> {
		let revmap_error = |reason: String| UseminError::Revmap {
			path: path.display().to_string(),
			reason,
		};
		let content = std::fs::read_to_string(path).map_err(|e| revmap_error(e.to_string()))?;
		let mapping: HashMap<String, RevvedEntry> =
			serde_json::from_str(&content).map_err(|e| revmap_error(e.to_string()))?;

		Ok(Self::from_mapping(mapping))
	}

	fn candidate_from_mapping(
		mapping: &HashMap<String, RevvedEntry>,
		file: &str,
		search_dirs: &[String],
	) -> Option<String> {
		let dirname = paths::dirname(file);

		search_dirs.iter().find_map(|dir| {
			let key = paths::join(&[dir.as_str(), file]);
			tracing::trace!(%key, "looking at mapping");
			let revved = mapping.get(&key)?.first()?;
			let name = paths::basename(revved);

			Some(if dirname == "." {
				name.to_string()
			} else {
				format!("{dirname}/{name}")
			})
		})
	}

	fn candidate_from_disk(expand: &ExpandFn, file: &str, search_dirs: &[String]) -> Option<String> {
		let ext = paths::extname(file);
		let name = paths::basename(file);
		let base = &name[..name.len() - ext.len()];
		let dirname = paths::dirname(file);

		let hex = "[0-9a-fA-F]+";
		let quoted_base = regex::escape(base);
		let quoted_ext = regex::escape(ext);
		let revved = Regex::new(&format!(
			"^(?:{hex}\\.{quoted_base}{quoted_ext}|{quoted_base}\\.{hex}{quoted_ext})$"
		))
		.ok()?;

		for dir in search_dirs {
			let suffix_form = paths::join(&[dir.as_str(), dirname, format!("{base}.*{ext}").as_str()]);
			let prefix_form = paths::join(&[dir.as_str(), dirname, format!("*.{base}{ext}").as_str()]);

			// Globs starting with `#` read as comments.
			if suffix_form.starts_with('#') {
				continue;
			}

			tracing::trace!(%suffix_form, %prefix_form, "looking on disk");
			let found = expand(&[suffix_form, prefix_form]);
			let hit = found
				.iter()
				.map(|path| paths::basename(path))
				.find(|candidate| revved.is_match(candidate));

			if let Some(hit) = hit {
				return Some(if file.contains('/') {
					format!("{dirname}/{hit}")
				} else {
					hit.to_string()
				});
			}
		}

		None
	}
}

impl AssetFinder for RevvedFinder {
	fn find(&self, path: &str, search_dirs: &[String]) -> String {
		if path.is_empty() || path.contains("://") {
			return path.to_string();
		}

		let file = path.trim_start_matches('/');
		let prefix = &path[..path.len() - file.len()];
		if file.is_empty() {
			return path.to_string();
		}

		let candidate = match &self.locator {
			Locator::Mapping(mapping) => Self::candidate_from_mapping(mapping, file, search_dirs),
			Locator::Expand(expand) => Self::candidate_from_disk(expand.as_ref(), file, search_dirs),
		};

		match candidate {
			Some(found) => {
				let revved = format!("{prefix}{found}");
				tracing::debug!(%path, %revved, "found revved version");
				revved
			}
			None => {
				tracing::trace!(%path, ?search_dirs, "no revved version");
				path.to_string()
			}
		}
	}
}
