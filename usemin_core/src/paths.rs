//! POSIX path helpers operating on plain strings.
//!
//! Generated configuration and rewritten references always use `/`, whatever
//! the host platform, so these helpers never go through [`std::path::Path`].

/// Normalize `.` and `..` segments and collapse repeated separators.
///
/// An empty path normalizes to `"."`. Leading `..` segments of a relative
/// path are kept, a trailing separator is preserved.
pub fn normalize(path: &str) -> String {
	if path.is_empty() {
		return ".".to_string();
	}

	let absolute = path.starts_with('/');
	let trailing = path.ends_with('/');
	let mut segments: Vec<&str> = Vec::new();

	for segment in path.split('/') {
		match segment {
			"" | "." => {}
			".." => {
				if segments.last().is_some_and(|last| *last != "..") {
					segments.pop();
				} else if !absolute {
					segments.push("..");
				}
			}
			other => segments.push(other),
		}
	}

	let mut normalized = segments.join("/");
	if normalized.is_empty() {
		return if absolute { "/" } else { "." }.to_string();
	}
	if trailing {
		normalized.push('/');
	}
	if absolute {
		normalized.insert(0, '/');
	}

	normalized
}

/// Join segments with `/` and normalize the result. Empty segments are
/// skipped; joining nothing yields `"."`.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
	let joined = segments
		.iter()
		.map(AsRef::as_ref)
		.filter(|segment| !segment.is_empty())
		.collect::<Vec<_>>()
		.join("/");

	normalize(&joined)
}

/// The directory part of `path`, `"."` when there is none.
pub fn dirname(path: &str) -> &str {
	let trimmed = path.trim_end_matches('/');
	match trimmed.rfind('/') {
		Some(0) => "/",
		Some(idx) => &trimmed[..idx],
		None if path.starts_with('/') => "/",
		None => ".",
	}
}

/// The last segment of `path`.
pub fn basename(path: &str) -> &str {
	let trimmed = path.trim_end_matches('/');
	trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// The extension of the last segment including its dot, or `""`.
///
/// Dotfiles such as `.htaccess` have no extension.
pub fn extname(path: &str) -> &str {
	let name = basename(path);
	match name.rfind('.') {
		Some(idx) if idx > 0 => &name[idx..],
		_ => "",
	}
}
