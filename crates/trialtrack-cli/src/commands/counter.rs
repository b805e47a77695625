//! Counter management commands.

use clap::Subcommand;
use trialtrack_core::CoreError;

use super::common;

#[derive(Subcommand)]
pub enum CounterAction {
    /// Create a counter for a variable
    Add {
        /// Variable name the counter counts for
        variable: String,
    },
    /// Destroy a counter, returning its id to the pool
    Remove {
        /// Counter id
        id: u32,
    },
    /// Bump a counter's running count
    Bump {
        /// Counter id
        id: u32,
        /// Amount to add
        #[arg(long, default_value_t = 1)]
        by: i64,
    },
    /// List all counters
    List,
}

pub fn run(action: CounterAction) -> Result<(), CoreError> {
    let services = common::open_services()?;

    match action {
        CounterAction::Add { variable } => {
            let counter = services.counters.create(&variable)?;
            println!("Counter created: {}", counter.id);
            println!("{}", serde_json::to_string_pretty(&counter)?);
        }
        CounterAction::Remove { id } => {
            services.counters.remove(id)?;
            println!("Counter removed: {id}");
        }
        CounterAction::Bump { id, by } => {
            let count = services.counters.increment(id, by)?;
            println!("Counter {id}: {count}");
        }
        CounterAction::List => {
            let counters = services.counters.list()?;
            println!("{}", serde_json::to_string_pretty(&counters)?);
        }
    }
    Ok(())
}
