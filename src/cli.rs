use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taintproof")]
#[command(about = "A runtime harness proving unsafe/safe sink contrasts for taint-rule validation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run registered scenarios and report PASS/FAIL per scenario
    Run {
        /// Restrict the run to one or more categories
        #[arg(short, long)]
        category: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "")]
        format: String,

        /// Show only scenarios that were not correctly demonstrated
        #[arg(long)]
        failed_only: bool,
    },

    /// List registered scenarios in registration order
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show one scenario's category, description, and inputs
    Show {
        /// Scenario id
        id: String,
    },
}
