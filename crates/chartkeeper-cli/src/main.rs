//! chartkeeper CLI - keeps a Helm chart repository in sync with its upstreams

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use chartkeeper_core::Paths;

mod commands;
mod error;
mod exit_codes;

use error::Result;

#[derive(Parser)]
#[command(name = "chartkeeper")]
#[command(author = "chartkeeper Contributors")]
#[command(version)]
#[command(about = "Keeps a Helm chart repository in sync with its upstreams", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Only process this package (<vendor>/<name>)
    #[arg(long, global = true, env = "PACKAGE")]
    package: Option<String>,

    /// Repository root
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the packages of the repository
    List,

    /// Fetch new upstream versions and write them to the repository
    Stage,

    /// Stage and commit the result
    Auto,

    /// Check that released charts were not modified and the repository is consistent
    Validate,

    /// Hide every published version of packages in the Rancher UI
    Hide {
        /// Packages (<vendor>/<name>)
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Manage featured charts
    Feature {
        #[command(subcommand)]
        command: FeatureCommands,
    },

    /// Remove versions of a chart older than a number of days
    Cull {
        /// Chart name as it appears in index.yaml
        chart: String,

        /// Versions created more than this many days ago are removed
        days: u32,
    },
}

#[derive(Subcommand)]
enum FeatureCommands {
    /// List featured charts by slot
    List,

    /// Feature the latest version of a package
    Add {
        /// Package (<vendor>/<name>)
        package: String,

        /// Featured slot
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        index: u8,
    },

    /// Stop featuring a package
    Remove {
        /// Package (<vendor>/<name>)
        package: String,
    },
}

fn init_tracing(debug: bool) {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry().with(layer).with(filter).init();
}

fn run(cli: Cli) -> Result<()> {
    let paths = Paths::new(cli.repo);
    let package = cli.package.as_deref().filter(|p| !p.is_empty());

    match cli.command {
        Commands::List => commands::list::run(&paths, package),

        Commands::Stage => commands::stage::run(&paths, package, false),

        Commands::Auto => commands::stage::run(&paths, package, true),

        Commands::Validate => commands::validate::run(&paths),

        Commands::Hide { packages } => commands::hide::run(&paths, &packages),

        Commands::Feature { command } => match command {
            FeatureCommands::List => commands::feature::list(&paths),
            FeatureCommands::Add { package, index } => {
                commands::feature::add(&paths, &package, index)
            }
            FeatureCommands::Remove { package } => commands::feature::remove(&paths, &package),
        },

        Commands::Cull { chart, days } => commands::cull::run(&paths, &chart, days),
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
