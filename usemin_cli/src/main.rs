use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use clap::Parser;
use owo_colors::OwoColorize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use usemin_cli::Commands;
use usemin_cli::UseminCli;
use usemin_cli::doc_type_for;
use usemin_cli::expand_globs;
use usemin_cli::resolve_documents;
use usemin_core::AssetFinder;
use usemin_core::ConfigTree;
use usemin_core::ConfigWriter;
use usemin_core::DocumentRewriter;
use usemin_core::File;
use usemin_core::MarkerParser;
use usemin_core::RevvedFinder;
use usemin_core::UseminConfig;
use usemin_core::UseminError;
use usemin_core::paths;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = UseminCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Prepare {
			files,
			config,
			merge,
			output,
		}) => run_prepare(&args, files, config.as_deref(), merge.as_deref(), output.as_deref()),
		Some(Commands::Rewrite {
			files,
			config,
			doc_type,
			assets_dirs,
			dry_run,
		}) => run_rewrite(
			&args,
			files,
			config.as_deref(),
			doc_type.as_deref(),
			assets_dirs,
			*dry_run,
		),
		None => {
			eprintln!("No subcommand specified. Run `usemin --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<UseminError>() {
			Ok(usemin_err) => {
				let report: miette::Report = (*usemin_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_directive = if verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.without_time()
		.with_target(false)
		.init();
}

fn resolve_root(args: &UseminCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<UseminConfig, UseminError> {
	match explicit {
		Some(path) => UseminConfig::load_file(&root.join(path)),
		None => Ok(UseminConfig::load(root)?.unwrap_or_default()),
	}
}

fn read_existing_config(path: &Path) -> Result<ConfigTree, Box<dyn std::error::Error>> {
	let content = std::fs::read_to_string(path)?;
	match serde_json::from_str::<Value>(&content)? {
		Value::Object(tree) => Ok(tree),
		_ => Err(format!("{} must contain a JSON object", path.display()).into()),
	}
}

fn run_prepare(
	args: &UseminCli,
	files: &[String],
	config_path: Option<&Path>,
	merge: Option<&Path>,
	output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root, config_path)?;
	let probe_root = root.clone();
	let mut writer = ConfigWriter::new(config.flow(), config.writer_options())
		.with_file_probe(move |path| probe_root.join(path).exists());

	let mut tree = match merge {
		Some(path) => Some(read_existing_config(&root.join(path))?),
		None => None,
	};

	let documents = resolve_documents(&root, files);
	for document in &documents {
		let content = std::fs::read_to_string(root.join(document))?;
		let file = File::parse(document, content, &MarkerParser)?;
		tracing::debug!(%document, blocks = file.blocks.len(), "parsed document");
		tree = Some(writer.process(&file, tree)?);
	}

	let json = serde_json::to_string_pretty(&Value::Object(tree.unwrap_or_default()))?;
	match output {
		Some(path) => {
			std::fs::write(root.join(path), format!("{json}\n"))?;
			println!(
				"{} Wrote configuration for {} block(s) to {}",
				colored!("✓", green),
				writer.seen().len(),
				path.display()
			);
		}
		None => println!("{json}"),
	}

	Ok(())
}

fn run_rewrite(
	args: &UseminCli,
	files: &[String],
	config_path: Option<&Path>,
	doc_type: Option<&str>,
	assets_dirs: &[String],
	dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(&root, config_path)?;

	let finder: Arc<dyn AssetFinder> = match config.revmap_path(&root) {
		Some(revmap) => Arc::new(RevvedFinder::load_mapping(&revmap)?),
		None => {
			let expand_root = root.clone();
			Arc::new(RevvedFinder::from_expand(move |patterns| {
				expand_globs(&expand_root, patterns)
			}))
		}
	};

	let replaced = Arc::new(AtomicUsize::new(0));
	let mut rewritten_count = 0;

	for document in resolve_documents(&root, files) {
		let doc_type = doc_type.unwrap_or_else(|| doc_type_for(&document));
		let counter = Arc::clone(&replaced);
		let rewriter = DocumentRewriter::builder()
			.doc_type(doc_type)
			.shared_finder(Arc::clone(&finder))
			.patterns(config.patterns_for(doc_type)?)
			.block_replacements(config.block_replacements())
			.logger(move |message| {
				counter.fetch_add(1, Ordering::Relaxed);
				tracing::info!("{message}");
			})
			.build()?;

		let search_dirs = if !assets_dirs.is_empty() {
			assets_dirs.to_vec()
		} else if !config.assets_dirs.is_empty() {
			config.assets_dirs.clone()
		} else {
			vec![paths::dirname(&document).to_string()]
		};

		let path = root.join(&document);
		let content = std::fs::read_to_string(&path)?;
		let file = File::parse(&document, content, &MarkerParser)?;
		let result = rewriter.rewrite(&file, &search_dirs);

		if dry_run {
			println!("{}", colored!(document, bold));
			println!("{result}");
			continue;
		}

		if result != file.content {
			std::fs::write(&path, &result)?;
			rewritten_count += 1;
			println!("  {} {document}", colored!("rewrote", green));
		}
	}

	println!(
		"Replaced {} references to assets in {rewritten_count} file(s)",
		replaced.load(Ordering::Relaxed)
	);

	Ok(())
}
