pub mod list;
pub mod run;
pub mod show;

use crate::cli::Commands;
use crate::errors::HarnessResult;
use crate::utils::config::Config;

pub fn handle_command(command: Commands, config: &mut Config) -> HarnessResult<()> {
    match command {
        Commands::Run {
            category,
            format,
            failed_only,
        } => run::handle(&category, &format, failed_only, config),
        Commands::List { verbose } => list::handle(verbose),
        Commands::Show { id } => show::handle(&id),
    }
}
