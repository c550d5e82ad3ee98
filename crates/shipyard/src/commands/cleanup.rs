use super::cloud_client;
use crate::prompt::TerminalConfirm;
use colored::Colorize;
use shipyard_cloud::{StateManager, TeardownReport};
use shipyard_deploy::{AssumeYes, Confirm, TeardownTool};
use std::path::Path;
use std::process::ExitCode;

/// Exit code of a teardown pass that left resources behind
const EXIT_PARTIAL: u8 = 2;

pub async fn handle(project_root: &Path, yes: bool) -> anyhow::Result<ExitCode> {
    let state_manager = StateManager::new(project_root);
    let Some(state) = state_manager.load().await? else {
        println!(
            "No deployment recorded at {}",
            state_manager.state_path().display()
        );
        return Ok(ExitCode::SUCCESS);
    };

    if state.is_empty() {
        println!("{}", "Nothing to delete.".green());
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{} {}",
        "Resources recorded for".bold(),
        state.project.cyan()
    );
    for (kind, resource) in state.teardown_candidates() {
        let note = if kind.is_optional_deletion() {
            " (asks first)"
        } else {
            ""
        };
        println!(
            "  {} {:<24} {} {}{}",
            "-".red(),
            kind.display_name(),
            resource.name,
            format!("({})", resource.id).dimmed(),
            note.dimmed()
        );
    }
    println!();

    // Falls back to the token in a discovered configuration file
    let token_from_config = shipyard_config::find_config_file(None)
        .ok()
        .and_then(|path| shipyard_core::load_configuration(&path).ok())
        .and_then(|config| config.credentials.api_token);
    let cloud = cloud_client(token_from_config.as_deref())?;
    let teardown = TeardownTool::new(cloud, state_manager.clone());

    let report = if yes {
        teardown.run(&AssumeYes).await?
    } else {
        if !TerminalConfirm.confirm("Delete these resources?") {
            println!("{}", "Cleanup cancelled.".yellow());
            return Ok(ExitCode::SUCCESS);
        }
        teardown.run(&TerminalConfirm).await?
    };

    print_report(&report, &state_manager);
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

fn print_report(report: &TeardownReport, state_manager: &StateManager) {
    println!();
    for deleted in &report.deleted {
        println!("  {} {} {}", "✓".green(), deleted.kind.display_name(), deleted.name);
    }
    for kept in &report.kept {
        println!("  {} {} {} (kept)", "·".cyan(), kept.kind.display_name(), kept.name);
    }
    for failure in &report.failures {
        println!("  {} {}", "✗".red(), failure);
    }

    println!();
    println!(
        "{} ({:.1}s)",
        report.summary(),
        report.duration_ms as f64 / 1000.0
    );
    if !report.is_success() {
        println!(
            "{} Remaining resources are still listed in {}; run `shipyard cleanup` again to retry.",
            "Warning:".yellow().bold(),
            state_manager.state_path().display()
        );
    }
}
