//! Cycle reporting flow: status, round recording, gating action commits.

use std::collections::BTreeMap;

use chrono::Utc;
use clap::Subcommand;
use trialtrack_core::{Config, CoreError};

use super::common;

#[derive(Subcommand)]
pub enum ReportAction {
    /// Show what is due at the group's current cycle position
    Status {
        /// Project id
        project: String,
        /// Group id
        group: String,
    },
    /// Record a completed round with captured values
    Record {
        /// Project id
        project: String,
        /// Group id
        group: String,
        /// Captured values as name=value pairs (value parsed as JSON when
        /// possible)
        #[arg(long = "value")]
        values: Vec<String>,
    },
    /// Discard the group's in-progress cycle
    Clear {
        /// Project id
        project: String,
        /// Group id
        group: String,
    },
    /// Commit an occurrence of the gating action
    ActionDone {
        /// Project id
        project: String,
        /// Group id
        group: String,
    },
    /// Supply qualifier data for a pending gating action
    Qualify {
        /// Project id
        project: String,
        /// Group id
        group: String,
        /// Qualifier data as a JSON document
        data: String,
    },
}

pub fn run(action: ReportAction) -> Result<(), CoreError> {
    let services = common::open_services()?;

    match action {
        ReportAction::Status { project, group } => {
            let key = common::parse_key(&project, &group)?;
            let mut group = common::load_group(&services.db, &key)?;
            let result = services.resolver.resolve_current_reporting(&mut group)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ReportAction::Record {
            project,
            group,
            values,
        } => {
            let key = common::parse_key(&project, &group)?;
            let group = common::load_group(&services.db, &key)?;
            let mut captured = BTreeMap::new();
            for raw in &values {
                let (name, value) = common::parse_captured(raw)?;
                captured.insert(name, value);
            }
            let position = services.progress.record_round(&key, Utc::now(), captured)?;
            if position > group.cycle_length && Config::load()?.auto_clear_completed {
                services.progress.clear(&key)?;
                println!("Cycle complete: progress cleared");
            } else {
                println!("Round recorded: next position {position}");
            }
        }
        ReportAction::Clear { project, group } => {
            let key = common::parse_key(&project, &group)?;
            if services.progress.clear(&key)? {
                println!("Cycle cleared");
            } else {
                println!("No cycle in progress");
            }
        }
        ReportAction::ActionDone { project, group } => {
            let key = common::parse_key(&project, &group)?;
            let mut group = common::load_group(&services.db, &key)?;
            services.gate.on_action_occurred(&mut group, Utc::now())?;
            let state = services.gate.state(&group)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        ReportAction::Qualify {
            project,
            group,
            data,
        } => {
            let key = common::parse_key(&project, &group)?;
            let group = common::load_group(&services.db, &key)?;
            let data: serde_json::Value = serde_json::from_str(&data)?;
            services.gate.supply_qualifier_data(&group, data)?;
            let state = services.gate.state(&group)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(())
}
