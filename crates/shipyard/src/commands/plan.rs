use colored::Colorize;
use shipyard_cloud::{DatabaseSpec, Plan, ResourceKind};
use shipyard_core::{Configuration, InfrastructurePlanner};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub fn handle(config: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let (path, _config, plan) = load_plan(config.as_deref())?;
    print_plan(&path, &plan);
    Ok(ExitCode::SUCCESS)
}

/// Discover, load and plan a configuration
pub fn load_plan(explicit: Option<&Path>) -> anyhow::Result<(PathBuf, Configuration, Plan)> {
    let path = shipyard_config::find_config_file(explicit)?;
    let config = shipyard_core::load_configuration(&path)?;
    let plan = InfrastructurePlanner::new().plan(&config)?;
    Ok((path, config, plan))
}

pub fn print_plan(path: &Path, plan: &Plan) {
    println!(
        "{} {}",
        "Configuration:".bold(),
        path.display().to_string().cyan()
    );
    println!(
        "{} {} in {}",
        "Project:".bold(),
        plan.project.cyan(),
        plan.region
    );
    println!();

    for kind in plan.resource_kinds() {
        println!(
            "  {} {:<24} {}",
            "+".green(),
            kind.display_name(),
            resource_name(plan, kind).dimmed()
        );
    }
    if let DatabaseSpec::Local(local) = &plan.database {
        println!(
            "  {} {:<24} {}",
            "·".cyan(),
            "database on instance",
            format!("{} '{}'", local.engine, local.database).dimmed()
        );
    }

    println!();
    println!("{}", plan.summary());
}

fn resource_name(plan: &Plan, kind: ResourceKind) -> String {
    let name = match kind {
        ResourceKind::SshKey => plan.ssh_key.as_ref().map(|s| s.name.as_str()),
        ResourceKind::Compute => Some(plan.compute.name.as_str()),
        ResourceKind::Database => match &plan.database {
            DatabaseSpec::Managed(spec) => Some(spec.name.as_str()),
            DatabaseSpec::Local(_) => None,
        },
        ResourceKind::Firewall => plan.firewall.as_ref().map(|s| s.name.as_str()),
        ResourceKind::LoadBalancer => plan.load_balancer.as_ref().map(|s| s.name.as_str()),
        ResourceKind::Domain => plan.domain.as_ref().map(|s| s.name.as_str()),
        ResourceKind::Certificate => plan.certificate.as_ref().map(|s| s.name.as_str()),
        ResourceKind::Monitoring => plan.monitoring.as_ref().map(|s| s.description.as_str()),
    };
    name.unwrap_or_default().to_string()
}
