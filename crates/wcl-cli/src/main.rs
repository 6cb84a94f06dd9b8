//! WCL CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "wcl")]
#[command(version)]
#[command(about = "Inspect, format and expand WCL files", long_about = None)]
struct Cli {
    /// Bound for substitution loops and include nesting
    #[arg(long, global = true, default_value_t = wcl::MAX_ITERATIONS)]
    max_iterations: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and report its size
    Check {
        /// WCL file to check
        file: String,
    },

    /// Print a file in canonical form
    Fmt {
        /// WCL file to format
        file: String,

        /// Write entries in key order (cmdline sections keep their order)
        #[arg(long)]
        sort: bool,

        /// Spaces per nesting level
        #[arg(long, default_value_t = 4)]
        indent: usize,
    },

    /// Look up a key with scoping and substitution
    Get {
        /// WCL file to read
        file: String,

        /// Key to look up (dotted keys are exact paths)
        key: String,

        /// Current-context binding (KEY=VALUE), e.g. curr_exec=exec_1
        #[arg(short = 'c', long)]
        current: Vec<String>,

        /// Section types to search, in order (comma separated)
        #[arg(long)]
        search_order: Option<String>,

        /// Print the stored value without substituting variables
        #[arg(long)]
        raw: bool,
    },

    /// Substitute variables in a string against a file
    Expand {
        /// WCL file supplying the variables
        file: String,

        /// Text to substitute
        text: String,

        /// Expand multi-valued variables into one line per combination
        #[arg(short = 'e', long)]
        expand: bool,

        /// Current-context binding (KEY=VALUE)
        #[arg(short = 'c', long)]
        current: Vec<String>,

        /// Print branches and the values that produced them as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the variables referenced in a file
    Vars {
        /// WCL file to scan
        file: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wcl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let max_iterations = cli.max_iterations;

    match cli.command {
        Commands::Check { file } => commands::check::execute(commands::check::CheckArgs {
            file,
            max_iterations,
        }),
        Commands::Fmt { file, sort, indent } => commands::fmt::execute(commands::fmt::FmtArgs {
            file,
            sort,
            indent,
            max_iterations,
        }),
        Commands::Get {
            file,
            key,
            current,
            search_order,
            raw,
        } => commands::get::execute(commands::get::GetArgs {
            file,
            key,
            current,
            search_order,
            raw,
            max_iterations,
        }),
        Commands::Expand {
            file,
            text,
            expand,
            current,
            json,
        } => commands::expand::execute(commands::expand::ExpandArgs {
            file,
            text,
            expand,
            current,
            json,
            max_iterations,
        }),
        Commands::Vars { file } => commands::vars::execute(commands::vars::VarsArgs {
            file,
            max_iterations,
        }),
    }
}
