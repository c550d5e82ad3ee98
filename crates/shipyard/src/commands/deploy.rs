use super::cloud_client;
use super::plan::{load_plan, print_plan};
use crate::prompt::TerminalConfirm;
use colored::Colorize;
use shipyard_cloud::{CancellationToken, StateManager};
use shipyard_deploy::{
    Confirm, DeployOptions, DeploymentOrchestrator, DeploymentOutcome, SshInstaller,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

pub async fn handle(
    project_root: &Path,
    config_path: Option<PathBuf>,
    cleanup_on_error: bool,
    yes: bool,
    app_dir: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let (path, config, plan) = load_plan(config_path.as_deref())?;
    print_plan(&path, &plan);
    println!();

    let prompt = "Create these resources? They are billed by the provider.";
    if !yes && !TerminalConfirm.confirm(prompt) {
        println!("{}", "Deployment cancelled.".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let cloud = cloud_client(config.credentials.api_token.as_deref())?;
    let state_manager = StateManager::new(project_root);

    // Ctrl-C stops the run at the next poll or phase boundary
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping after the current step...".yellow());
            on_signal.cancel();
        }
    });

    let mut orchestrator =
        DeploymentOrchestrator::new(cloud, state_manager).with_cancellation(cancel);
    if app_dir.is_some() {
        let mut installer = SshInstaller::new();
        // The private key sits next to the uploaded public key
        if let Some(public_key) = &config.ssh_public_key_path
            && public_key.extension().is_some_and(|ext| ext == "pub")
        {
            installer = installer.with_identity(public_key.with_extension(""));
        }
        orchestrator = orchestrator.with_installer(Arc::new(installer));
    }

    println!("{}", "Deploying...".blue().bold());
    let options = DeployOptions {
        cleanup_on_error,
        app_dir,
    };
    let outcome = orchestrator.deploy(&config, &plan, &options).await?;

    print_outcome(&outcome, config.domain.as_deref());
    Ok(ExitCode::SUCCESS)
}

fn print_outcome(outcome: &DeploymentOutcome, domain: Option<&str>) {
    println!();
    for (kind, resource) in &outcome.state.resources {
        println!(
            "  {} {:<24} {} {}",
            "✓".green(),
            kind.display_name(),
            resource.name,
            format!("({})", resource.id).dimmed()
        );
    }

    if !outcome.soft_failures.is_empty() {
        println!();
        println!("{}", "Completed with warnings:".yellow().bold());
        for failure in &outcome.soft_failures {
            println!("  {} {}: {}", "!".yellow(), failure.phase, failure.message);
        }
    }

    if let Some(install) = &outcome.install {
        for step in install.failures() {
            println!(
                "  {} install step '{}': {}",
                "!".yellow(),
                step.name,
                step.message.as_deref().unwrap_or("failed")
            );
        }
    }

    let db = &outcome.database;
    println!();
    println!("{}", "✓ Deployment completed".green().bold());
    println!("  {} {}", "Address: ".bold(), outcome.address.cyan());
    if let Some(domain) = domain {
        println!("  {} https://{}", "Domain:  ".bold(), domain);
    }
    println!(
        "  {} {}@{}:{}/{}",
        "Database:".bold(),
        db.user,
        db.host,
        db.port,
        db.database
    );
    println!(
        "  {}",
        "The database password is never written to .shipyard/state.json".dimmed()
    );
}
