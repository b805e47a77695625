//! Group and variable management commands.

use clap::Subcommand;
use trialtrack_core::{
    Config, CoreError, Group, GroupKey, GroupKind, ModuleKind, Persistence, ReportKind,
    StorageError, VariableConfig,
};
use uuid::Uuid;

use super::common;

#[derive(Subcommand)]
pub enum GroupAction {
    /// Create a new group in a project
    Create {
        /// Owning project id
        project: String,
        /// Group kind: control or comparison
        #[arg(long, default_value = "control")]
        kind: String,
        /// Cycle length (defaults to the configured value)
        #[arg(long)]
        cycle_length: Option<u32>,
    },
    /// Register a variable with a group
    AddVariable {
        /// Project id
        project: String,
        /// Group id
        group: String,
        /// Variable name (unique within the group)
        name: String,
        /// Module tag: numeric, scale, note, food_intake, step_count,
        /// stopwatch or tally
        #[arg(long)]
        module: String,
        /// Comma-separated report positions, e.g. "1,3,7"
        #[arg(long)]
        positions: String,
        /// Report kind override: manual, auto_capture, computation or
        /// time_difference (defaults to the module's kind)
        #[arg(long)]
        kind: Option<String>,
    },
    /// List a project's groups
    List {
        /// Project id
        project: String,
    },
}

fn parse_group_kind(raw: &str) -> Result<GroupKind, CoreError> {
    match raw {
        "control" => Ok(GroupKind::Control),
        "comparison" => Ok(GroupKind::Comparison),
        other => Err(CoreError::Custom(format!("invalid group kind: {other}"))),
    }
}

fn parse_report_kind(raw: &str) -> Result<ReportKind, CoreError> {
    match raw {
        "manual" => Ok(ReportKind::Manual),
        "auto_capture" => Ok(ReportKind::AutoCapture),
        "computation" => Ok(ReportKind::Computation),
        "time_difference" => Ok(ReportKind::TimeDifference),
        other => Err(CoreError::Custom(format!("invalid report kind: {other}"))),
    }
}

pub fn run(action: GroupAction) -> Result<(), CoreError> {
    let services = common::open_services()?;

    match action {
        GroupAction::Create {
            project,
            kind,
            cycle_length,
        } => {
            let project_id = common::parse_uuid(&project, "project")?;
            let project = services
                .db
                .load_project(project_id)?
                .ok_or(CoreError::Storage(StorageError::NotFound {
                    what: "project",
                    id: project_id.to_string(),
                }))?;
            let cycle_length = match cycle_length {
                Some(len) => len,
                None => Config::load()?.default_cycle_length,
            };
            let key = GroupKey::new(project.id, Uuid::new_v4());
            let group = Group::new(key, parse_group_kind(&kind)?, cycle_length, project.gating);
            group.validate()?;
            services.db.save_group(&group)?;
            println!("Group created: {}", group.key.group_id);
            println!("{}", serde_json::to_string_pretty(&group)?);
        }
        GroupAction::AddVariable {
            project,
            group,
            name,
            module,
            positions,
            kind,
        } => {
            let key = common::parse_key(&project, &group)?;
            let mut group = common::load_group(&services.db, &key)?;
            let module = ModuleKind::from_tag(&module)?;
            let mut config = VariableConfig::new(name, module, common::parse_positions(&positions)?);
            if let Some(kind) = kind {
                config = config.with_kind(parse_report_kind(&kind)?);
            }
            group.insert_variable(config);
            group.validate()?;
            services.db.save_group(&group)?;
            println!("{}", serde_json::to_string_pretty(&group)?);
        }
        GroupAction::List { project } => {
            let project_id = common::parse_uuid(&project, "project")?;
            let groups = services.db.list_groups(project_id)?;
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
    }
    Ok(())
}
