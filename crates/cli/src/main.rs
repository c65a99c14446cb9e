mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pybundle_lib::Verb;
use pybundle_lib::consts::DEFAULT_EXTERNAL;
use pybundle_lib::platform::workspace_root;

use crate::cmd::{RecipeSource, cmd_info, cmd_variants, cmd_verb};
use crate::output::{OutputFormat, print_error};

/// Build relocatable Python runtimes for standalone packages and plugin externals.
#[derive(Parser)]
#[command(name = "pybundle")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Workspace root (defaults to $PYBUNDLE_ROOT, then the current directory)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Remove every builder's prefix, source tree and artifacts
  Reset(RecipeArgs),
  /// Remove intermediate sources, keeping downloads and prefixes
  Clean(RecipeArgs),
  /// Download, compile and post-process every builder
  Build(RecipeArgs),
  /// Reset, then build every builder
  Install(RecipeArgs),
  /// List the named builder presets
  Variants {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
  /// Print the paths a builder preset derives
  Info {
    /// Preset name, see `pybundle variants`
    #[arg(long, default_value = "static")]
    variant: String,
    /// Plugin external the runtime is embedded in
    #[arg(long, default_value = DEFAULT_EXTERNAL)]
    external: String,
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

#[derive(Args)]
struct RecipeArgs {
  /// YAML recipe file
  #[arg(long, conflicts_with = "variant")]
  recipe: Option<PathBuf>,

  /// Read the recipe as a flat builder map instead of a project tree
  #[arg(long, requires = "recipe")]
  flat: bool,

  /// Build a single preset instead of a recipe
  #[arg(long)]
  variant: Option<String>,
}

impl RecipeArgs {
  fn source(self) -> RecipeSource {
    let flat = self.flat;
    match (self.recipe, self.variant) {
      (Some(path), _) if flat => RecipeSource::Flat(path),
      (Some(path), _) => RecipeSource::Tree(path),
      (None, Some(variant)) => RecipeSource::Variant(variant),
      (None, None) => RecipeSource::Defaults,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let root = cli.root.unwrap_or_else(workspace_root);

  match cli.command {
    Commands::Reset(args) => cmd_verb(Verb::Reset, args.source(), root),
    Commands::Clean(args) => cmd_verb(Verb::Clean, args.source(), root),
    Commands::Build(args) => cmd_verb(Verb::Build, args.source(), root),
    Commands::Install(args) => cmd_verb(Verb::Install, args.source(), root),
    Commands::Variants { format } => cmd_variants(format),
    Commands::Info {
      variant,
      external,
      format,
    } => cmd_info(&variant, &external, root, format),
  }
}
