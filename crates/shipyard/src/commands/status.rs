use colored::Colorize;
use shipyard_cloud::{Phase, PhaseStatus, StateManager};
use std::path::Path;
use std::process::ExitCode;

pub async fn handle(project_root: &Path) -> anyhow::Result<ExitCode> {
    let state_manager = StateManager::new(project_root);
    let Some(state) = state_manager.load().await? else {
        println!(
            "No deployment recorded at {}",
            state_manager.state_path().display()
        );
        return Ok(ExitCode::SUCCESS);
    };

    println!("{} {}", "Project:".bold(), state.project.cyan());
    println!(
        "{} {}",
        "Updated:".bold(),
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!();
    println!("{}", "Phases".bold());
    for phase in Phase::ALL {
        let status = state.phase(phase);
        let marker = match status {
            PhaseStatus::Completed => "✓".green(),
            PhaseStatus::Failed if phase.is_fatal() => "✗".red(),
            PhaseStatus::Failed => "!".yellow(),
            PhaseStatus::Skipped => "-".dimmed(),
            PhaseStatus::Pending => "·".dimmed(),
        };
        println!("  {} {:<16} {}", marker, phase.as_str(), status);
    }

    println!();
    if state.is_empty() {
        println!("{}", "No resources recorded.".dimmed());
    } else {
        println!("{}", "Resources".bold());
        for (kind, resource) in &state.resources {
            let address = resource
                .attribute_str("public_ipv4")
                .or_else(|| resource.attribute_str("ip"))
                .map(|ip| format!(" {}", ip))
                .unwrap_or_default();
            println!(
                "  {:<24} {} {} [{}]{}",
                kind.display_name(),
                resource.name,
                format!("({})", resource.id).dimmed(),
                resource.status,
                address.cyan()
            );
        }
    }

    if !state.soft_failures.is_empty() {
        println!();
        println!("{}", "Warnings".yellow().bold());
        for failure in &state.soft_failures {
            println!("  {}: {}", failure.phase, failure.message);
        }
    }

    if let Some(phase) = state.failed_phase() {
        println!();
        println!(
            "{} the deployment failed in phase '{}'. Run `shipyard cleanup` to remove what was created.",
            "Note:".red().bold(),
            phase
        );
    }

    Ok(ExitCode::SUCCESS)
}
