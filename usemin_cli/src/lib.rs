use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use globset::GlobBuilder;
use ignore::WalkBuilder;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Replace references to unoptimized scripts and stylesheets with their optimized versions.",
	long_about = "usemin reads `<!-- build:<type> <dest> -->` ... `<!-- endbuild -->` blocks from \
	              your HTML documents.\n\nIt generates the configuration your build steps need to \
	              produce each block's optimized output, then rewrites the documents so each block \
	              becomes a single reference and every asset reference points to its revved \
	              file.\n\nQuick start:\n  usemin prepare app/index.html   Print the step \
	              configuration\n  usemin rewrite dist/index.html   Rewrite blocks and asset \
	              references"
)]
pub struct UseminCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Generate the build-step configuration for the blocks of documents.
	///
	/// Every block is run through the steps of its type (by default `js`
	/// goes through concat then uglify, `css` through concat then cssmin).
	/// Intermediate outputs land in the staging directory and final outputs
	/// in the destination directory. The resulting configuration is printed
	/// as JSON.
	Prepare {
		/// Documents to read. Glob patterns are expanded from the project
		/// root.
		#[arg(required = true)]
		files: Vec<String>,

		/// Configuration file to use instead of the discovered `usemin.toml`.
		#[arg(long)]
		config: Option<PathBuf>,

		/// Existing JSON configuration to merge the generated entries into.
		#[arg(long)]
		merge: Option<PathBuf>,

		/// Write the configuration to this file instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,
	},
	/// Rewrite documents to reference optimized and revved assets.
	///
	/// Each block is replaced with a single tag pointing at its destination,
	/// then every asset reference the document type knows about is swapped
	/// for its revved counterpart, found on disk or in the configured revision
	/// map.
	Rewrite {
		/// Documents to rewrite. Glob patterns are expanded from the project
		/// root.
		#[arg(required = true)]
		files: Vec<String>,

		/// Configuration file to use instead of the discovered `usemin.toml`.
		#[arg(long)]
		config: Option<PathBuf>,

		/// Document type (`html`, `css`, `json`, ...). Defaults to the file
		/// extension, or `html`.
		#[arg(long = "type", value_name = "TYPE")]
		doc_type: Option<String>,

		/// Directory searched for revved assets. Repeatable. Defaults to
		/// `assets_dirs` from the configuration, then the document's own
		/// directory.
		#[arg(long = "assets-dir", value_name = "DIR")]
		assets_dirs: Vec<String>,

		/// Print the rewritten documents instead of writing them.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
}

const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// Whether `pattern` contains glob syntax.
pub fn is_glob(pattern: &str) -> bool {
	pattern.contains(GLOB_CHARS)
}

/// The literal directory a glob pattern starts from.
fn glob_base(pattern: &str) -> String {
	let segments: Vec<&str> = pattern.split('/').collect();
	let literal = segments
		.iter()
		.take_while(|segment| !is_glob(segment))
		.count()
		.min(segments.len().saturating_sub(1));

	match segments[..literal].join("/") {
		base if base.is_empty() && pattern.starts_with('/') => "/".to_string(),
		base => base,
	}
}

/// Expand glob patterns into the existing files matching any of them.
///
/// Relative patterns are resolved against `root` and results stay relative
/// to it. Results use `/` separators and keep first-seen order.
pub fn expand_globs(root: &Path, patterns: &[String]) -> Vec<String> {
	let mut found: Vec<String> = Vec::new();

	for pattern in patterns {
		let pattern = pattern.replace('\\', "/");
		let Ok(glob) = GlobBuilder::new(&pattern).literal_separator(true).build() else {
			tracing::debug!(%pattern, "skipping invalid glob");
			continue;
		};
		let matcher = glob.compile_matcher();

		let base = glob_base(&pattern);
		let walk_root = root.join(&base);
		let depth = (!pattern.contains("**")).then(|| {
			pattern[base.len()..]
				.split('/')
				.filter(|segment| !segment.is_empty())
				.count()
		});

		let walker = WalkBuilder::new(&walk_root)
			.standard_filters(false)
			.max_depth(depth)
			.build();

		for entry in walker.flatten() {
			if !entry.file_type().is_some_and(|file_type| file_type.is_file()) {
				continue;
			}
			let Ok(relative) = entry.path().strip_prefix(&walk_root) else {
				continue;
			};
			let relative = relative.to_string_lossy().replace('\\', "/");
			let candidate = match base.as_str() {
				"" => relative,
				"/" => format!("/{relative}"),
				base => format!("{base}/{relative}"),
			};

			if matcher.is_match(&candidate) && !found.contains(&candidate) {
				found.push(candidate);
			}
		}
	}

	found
}

/// Turn document arguments into paths relative to `root`, expanding globs.
pub fn resolve_documents(root: &Path, arguments: &[String]) -> Vec<String> {
	let mut documents = Vec::new();

	for argument in arguments {
		if is_glob(argument) {
			documents.extend(expand_globs(root, std::slice::from_ref(argument)));
		} else {
			documents.push(argument.replace('\\', "/"));
		}
	}

	documents
}

/// The document type implied by a file name: its extension for `css` and
/// `json`, `html` otherwise.
pub fn doc_type_for(path: &str) -> &'static str {
	match usemin_core::paths::extname(path) {
		".css" => "css",
		".json" => "json",
		_ => "html",
	}
}
