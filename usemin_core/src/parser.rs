use std::sync::LazyLock;

use regex::Regex;

use crate::Block;
use crate::RequireJsBlock;
use crate::UseminError;
use crate::UseminResult;
use crate::paths;

/// Turns raw document text into [`Block`]s.
///
/// The engine only consumes the resulting blocks, so callers with their own
/// marker syntax can plug in a different implementation.
pub trait BlockParser: Send + Sync {
	fn parse(&self, content: &str) -> UseminResult<Vec<Block>>;
}

/// The default `<!-- build:<type>[(<search path>)] <dest> -->` ...
/// `<!-- endbuild -->` marker parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerParser;

static BUILD_START: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"<!--\s*build:(?P<type>\w+)(?:\((?P<alt>[^)]+)\))?\s*(?P<dest>\S+)?\s*(?:.*?)\s*-->")
		.expect("valid build start pattern")
});
static BUILD_END: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"<!--\s*endbuild\s*-->").expect("valid build end pattern"));
static CONDITIONAL_START: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(<!--\[if\s.*\]>)(?:<!-->)?").expect("valid conditional start pattern")
});
static CONDITIONAL_END: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?:<!--\s?)?(<!\[endif\]-->)").expect("valid conditional end pattern")
});
static ASSET: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(?:href|src)=["']([^'"]+)["']"#).expect("valid asset pattern")
});
static MEDIA: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#"media=['"]([^'"]+)['"]"#).expect("valid media pattern"));
static DEFER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\sdefer\b").expect("valid defer pattern"));
static ASYNC: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\sasync\b").expect("valid async pattern"));
static DATA_MAIN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"data-main=['"]([^'"]+)['"]"#).expect("valid data-main pattern")
});

/// A block under construction. `defer` and `async` stay undecided until the
/// first reference is seen so that mixing can be detected.
struct BlockCreator {
	block: Block,
	line: usize,
	defer: Option<bool>,
	r#async: Option<bool>,
}

impl BlockCreator {
	fn record_reference(&mut self, line: &str, asset: &str) -> UseminResult<()> {
		self.block.src.push(asset.to_string());

		if let Some(media) = MEDIA.captures(line) {
			self.block.media = Some(media[1].to_string());
		}

		let defer = DEFER.is_match(line);
		match self.defer {
			Some(previous) if previous != defer => {
				return Err(UseminError::MixedDefer {
					dest: self.block.dest.clone(),
				});
			}
			_ => self.defer = Some(defer),
		}

		let r#async = ASYNC.is_match(line);
		match self.r#async {
			Some(previous) if previous != r#async => {
				return Err(UseminError::MixedAsync {
					dest: self.block.dest.clone(),
				});
			}
			_ => self.r#async = Some(r#async),
		}

		if let Some(main) = DATA_MAIN.captures(line) {
			let main = &main[1];
			self.block.requirejs = Some(RequireJsBlock {
				dest: self.block.dest.clone(),
				base_url: paths::dirname(main).to_string(),
				name: paths::basename(main).to_string(),
				src: asset.to_string(),
				orig_script: asset.to_string(),
			});
		}

		Ok(())
	}

	fn into_block(self) -> Block {
		Block {
			defer: self.defer.unwrap_or(false),
			r#async: self.r#async.unwrap_or(false),
			..self.block
		}
	}
}

impl BlockParser for MarkerParser {
	fn parse(&self, content: &str) -> UseminResult<Vec<Block>> {
		let normalized = content.replace("\r\n", "\n");
		let mut blocks = Vec::new();
		let mut pending: Option<BlockCreator> = None;

		for (idx, line) in normalized.split('\n').enumerate() {
			if let Some(start) = BUILD_START.captures(line) {
				if let Some(open) = pending.take() {
					return Err(UseminError::UnclosedBlock {
						dest: open.block.dest,
						line: open.line,
					});
				}

				let indent = line.len() - line.trim_start().len();
				let block = Block {
					r#type: start["type"].to_string(),
					dest: start
						.name("dest")
						.map(|dest| dest.as_str().to_string())
						.unwrap_or_default(),
					indent: line[..indent].to_string(),
					search_path: start
						.name("alt")
						.map(|alt| vec![alt.as_str().to_string()])
						.unwrap_or_default(),
					..Block::default()
				};
				tracing::trace!(dest = %block.dest, r#type = %block.r#type, "opened block");
				pending = Some(BlockCreator {
					block,
					line: idx + 1,
					defer: None,
					r#async: None,
				});
			}

			let Some(creator) = pending.as_mut() else {
				continue;
			};

			if let Some(conditional) = CONDITIONAL_START.captures(line) {
				creator.block.conditional_start = Some(conditional[1].to_string());
			}
			if let Some(conditional) = CONDITIONAL_END.captures(line) {
				creator.block.conditional_end = Some(conditional[1].to_string());
			}

			creator.block.raw.push(line.to_string());

			if !BUILD_END.is_match(line) {
				if let Some(asset) = ASSET.captures(line) {
					creator.record_reference(line, &asset[1])?;
				}
				continue;
			}

			if let Some(done) = pending.take() {
				blocks.push(done.into_block());
			}
		}

		if let Some(open) = pending {
			return Err(UseminError::UnclosedBlock {
				dest: open.block.dest,
				line: open.line,
			});
		}

		Ok(blocks)
	}
}
