//! Project management commands.

use clap::Subcommand;
use trialtrack_core::{CoreError, GatingActionConfig, Persistence, Project};

use super::common;

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a new project
    Create {
        /// Project title
        title: String,
        /// The gating action occurs before the primary variable set
        #[arg(long)]
        occurs_before: bool,
        /// The gating action recurs every cycle
        #[arg(long)]
        recurs: bool,
        /// Number of qualifying sub-conditions on the gating action
        #[arg(long, default_value_t = 0)]
        qualifiers: u32,
    },
    /// List all projects
    List,
    /// Delete a project and all group-scoped state under it
    Delete {
        /// Project id
        id: String,
    },
}

pub fn run(action: ProjectAction) -> Result<(), CoreError> {
    let services = common::open_services()?;

    match action {
        ProjectAction::Create {
            title,
            occurs_before,
            recurs,
            qualifiers,
        } => {
            let project = Project::new(
                title,
                GatingActionConfig {
                    occurs_before_inputs: occurs_before,
                    recurs_every_cycle: recurs,
                    qualifier_count: qualifiers,
                },
            );
            services.db.save_project(&project)?;
            println!("Project created: {}", project.id);
            println!("{}", serde_json::to_string_pretty(&project)?);
        }
        ProjectAction::List => {
            let projects = services.db.list_projects()?;
            println!("{}", serde_json::to_string_pretty(&projects)?);
        }
        ProjectAction::Delete { id } => {
            let id = common::parse_uuid(&id, "project")?;
            services.db.delete_project(id)?;
            println!("Project deleted: {id}");
        }
    }
    Ok(())
}
