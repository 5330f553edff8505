use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum UseminError {
	#[error(transparent)]
	#[diagnostic(code(usemin::io_error))]
	Io(#[from] std::io::Error),

	#[error("No type given")]
	#[diagnostic(
		code(usemin::missing_type),
		help("pass the document type (`html`, `css`, `json`, ...) when building the rewriter")
	)]
	MissingType,

	#[error("Missing parameter: {0}")]
	#[diagnostic(code(usemin::missing_parameter))]
	MissingParameter(&'static str),

	#[error("invalid pattern `{pattern}`: {reason}")]
	#[diagnostic(code(usemin::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },

	#[error("unsupported step: `{0}`")]
	#[diagnostic(
		code(usemin::unknown_step),
		help("built-in steps are: concat, uglify, cssmin, requirejs")
	)]
	UnknownStep(String),

	#[error(
		"different sources attempting to write to the same destination `{dest}`: [{}] vs [{}]",
		.existing.join(", "),
		.conflicting.join(", ")
	)]
	#[diagnostic(
		code(usemin::destination_conflict),
		help("blocks sharing a destination must list exactly the same sources")
	)]
	DestinationConflict {
		dest: String,
		existing: Vec<String>,
		conflicting: Vec<String>,
	},

	#[error("block `{dest}` mixes deferred and non-deferred scripts")]
	#[diagnostic(
		code(usemin::mixed_defer),
		help("either every script of a block carries `defer` or none does")
	)]
	MixedDefer { dest: String },

	#[error("block `{dest}` mixes async and non-async scripts")]
	#[diagnostic(
		code(usemin::mixed_async),
		help("either every script of a block carries `async` or none does")
	)]
	MixedAsync { dest: String },

	#[error("missing `endbuild` for block `{dest}` opened on line {line}")]
	#[diagnostic(
		code(usemin::unclosed_block),
		help("add `<!-- endbuild -->` to close this block")
	)]
	UnclosedBlock { dest: String, line: usize },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(usemin::config_parse),
		help("check that usemin.toml is valid TOML and that every `patterns.<type>` entry is an array")
	)]
	ConfigParse(String),

	#[error("failed to load revision map `{path}`: {reason}")]
	#[diagnostic(code(usemin::revmap))]
	Revmap { path: String, reason: String },
}

pub type UseminResult<T> = Result<T, UseminError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
