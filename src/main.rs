//! astq CLI - structural search for source code

use clap::Parser;
use std::path::PathBuf;

use astq::search::{SearchCoordinator, SearchOptions};
use astq::{adapter, config, query, ui};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "astq")]
#[command(version = "0.1.0")]
#[command(about = "Structural search for source code using path expressions")]
#[command(long_about = r#"
astq greps syntax instead of text: files are parsed into a labeled tree and
matched against a path expression; matches print as path:line pairs with
optional surrounding context.

Example usage:
  astq '//function_definition[not(body/return_statement)]'
  astq -d src -C 2 '//call[function/identifier[@text="print"]]'
  astq -l javascript '//function_declaration/name/identifier'
"#)]
struct Cli {
    /// Hide output of matches
    #[arg(short, long)]
    quiet: bool,

    /// Increase output verbosity
    #[arg(short, long)]
    verbose: bool,

    /// Print only the matching elements, as XML
    #[arg(short = 'x', long)]
    xml: bool,

    /// Show absolute paths
    #[arg(short, long)]
    abspaths: bool,

    /// Ignore subdirectories, searching only files in the specified directory
    #[arg(short = 'R', long)]
    no_recurse: bool,

    /// Search directory or file
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Lines of context to display after the matching line
    #[arg(short = 'A', long, default_value_t = 0)]
    after_context: usize,

    /// Lines of context to display before the matching line
    #[arg(short = 'B', long, default_value_t = 0)]
    before_context: usize,

    /// Lines of context to display before and after the matching line
    #[arg(short = 'C', long, default_value_t = 0)]
    context: usize,

    /// Restrict the search to one language
    #[arg(short, long)]
    language: Option<String>,

    /// Query backend to use (full or restricted)
    #[arg(long)]
    backend: Option<String>,

    /// Print only path:line, without the raw source line
    #[arg(long)]
    no_source: bool,

    /// Drop leading docstrings while building the tree
    #[arg(long)]
    skip_docstrings: bool,

    /// Emit collected matches as JSON instead of rendering them
    #[arg(long)]
    json: bool,

    /// Path to a config file (default: astq.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Search expression
    #[arg(required = true)]
    expr: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let file_config = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    let expression = cli.expr.join(" ");
    let language = cli.language.or(file_config.language);
    let backend_name = cli
        .backend
        .or(file_config.backend)
        .unwrap_or_else(|| "full".to_string());
    let abspaths = cli.abspaths || file_config.abspaths.unwrap_or(false);
    let skip_docstrings = cli.skip_docstrings || file_config.skip_docstrings.unwrap_or(false);
    let context = if cli.context > 0 {
        cli.context
    } else {
        file_config.context.unwrap_or(0)
    };

    let wants_context = cli.before_context > 0 || cli.after_context > 0 || context > 0;
    if wants_context && cli.quiet {
        anyhow::bail!("context cannot be specified when suppressing output");
    }
    if wants_context && cli.json {
        anyhow::bail!("context cannot be combined with --json");
    }
    if wants_context && cli.no_source {
        anyhow::bail!("context cannot be combined with --no-source");
    }

    let registry = match &language {
        Some(language) => adapter::registry_for(language)?,
        None => adapter::default_registry(),
    };
    let backend = query::select_backend(&backend_name)?;

    let mut recurse = !cli.no_recurse;
    if cli.dir.is_file() && recurse {
        recurse = false;
        if cli.verbose {
            ui::warn("Not recursing, as a single file was passed");
        }
    }

    if cli.verbose {
        ui::info("backend", backend.name());
        ui::info("expression", &expression);
    }

    let options = SearchOptions {
        print_matches: !cli.quiet && !cli.json,
        print_xml: cli.xml,
        verbose: cli.verbose,
        abspaths,
        recurse,
        before_context: cli.before_context,
        after_context: cli.after_context,
        context,
        show_source: !cli.no_source,
        omit_docstrings: skip_docstrings,
    };

    let coordinator = SearchCoordinator::new(&registry, backend.as_ref(), options);
    let hits = coordinator.run(&cli.dir, &expression)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    }
    if cli.verbose {
        ui::info("matches", &hits.len().to_string());
    }

    Ok(())
}
