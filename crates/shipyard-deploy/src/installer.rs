//! Application installation onto a provisioned instance
//!
//! The installer runs after the instance is reachable. Each step soft-fails:
//! a failed step is reported in the [`InstallReport`] and the run continues.

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Everything the installer needs to know about the target
#[derive(Debug, Clone)]
pub struct InstallContext {
    pub project: String,
    /// Public address of the instance
    pub address: String,
    /// Local directory packaged and shipped to the instance
    pub app_dir: PathBuf,
    /// Entries appended to the instance's environment file
    pub environment: BTreeMap<String, String>,
}

impl InstallContext {
    fn remote_archive(&self) -> String {
        format!("/tmp/{}-app.tar.gz", self.project)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallStep {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub steps: Vec<InstallStep>,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstallStep> {
        self.steps.iter().filter(|s| !s.ok)
    }

    pub fn succeeded(&mut self, name: &str) {
        tracing::info!(step = name, "install step completed");
        self.steps.push(InstallStep {
            name: name.to_string(),
            ok: true,
            message: None,
        });
    }

    pub fn failed(&mut self, name: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(step = name, %message, "install step failed");
        self.steps.push(InstallStep {
            name: name.to_string(),
            ok: false,
            message: Some(message),
        });
    }
}

/// Ships the application to a reachable instance
#[async_trait]
pub trait ApplicationInstaller: Send + Sync {
    async fn install(&self, ctx: &InstallContext) -> InstallReport;
}

/// Installs over `ssh`/`scp` using the operator's SSH agent or identity
#[derive(Debug, Clone)]
pub struct SshInstaller {
    user: String,
    identity: Option<PathBuf>,
}

impl Default for SshInstaller {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            identity: None,
        }
    }
}

impl SshInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    fn target(&self, ctx: &InstallContext) -> String {
        format!("{}@{}", self.user, ctx.address)
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=15".to_string(),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }

    async fn ssh(
        &self,
        ctx: &InstallContext,
        remote: &str,
        stdin: Option<&str>,
    ) -> Result<(), String> {
        let mut command = Command::new("ssh");
        command.args(self.base_args()).arg(self.target(ctx)).arg(remote);
        run(command, stdin).await
    }

    async fn scp(&self, ctx: &InstallContext, local: &Path, remote: &str) -> Result<(), String> {
        let mut command = Command::new("scp");
        command
            .args(self.base_args())
            .arg(local)
            .arg(format!("{}:{}", self.target(ctx), remote));
        run(command, None).await
    }
}

#[async_trait]
impl ApplicationInstaller for SshInstaller {
    async fn install(&self, ctx: &InstallContext) -> InstallReport {
        let mut report = InstallReport::default();
        let project = shell_escape(&ctx.project);
        let remote_archive = ctx.remote_archive();

        // package -> upload -> extract depend on each other
        let archive = match package(&ctx.app_dir).await {
            Ok(file) => {
                report.succeeded("package");
                Some(file)
            }
            Err(e) => {
                report.failed("package", e);
                None
            }
        };

        let uploaded = match &archive {
            Some(file) => match self.scp(ctx, file.path(), &remote_archive).await {
                Ok(()) => {
                    report.succeeded("upload");
                    true
                }
                Err(e) => {
                    report.failed("upload", e);
                    false
                }
            },
            None => {
                report.failed("upload", "skipped: no archive");
                false
            }
        };

        if uploaded {
            let extract = format!(
                "tar -xzf {archive} -C /opt/{project} && chown -R {project}:{project} /opt/{project} && rm -f {archive}",
                archive = shell_escape(&remote_archive),
                project = project,
            );
            match self.ssh(ctx, &extract, None).await {
                Ok(()) => report.succeeded("extract"),
                Err(e) => report.failed("extract", e),
            }
        } else {
            report.failed("extract", "skipped: archive was not uploaded");
        }

        if !ctx.environment.is_empty() {
            let entries: String = ctx
                .environment
                .iter()
                .map(|(key, value)| format!("{}={}\n", key, value))
                .collect();
            let append = format!("cat >> /etc/{project}/app.env", project = project);
            match self.ssh(ctx, &append, Some(&entries)).await {
                Ok(()) => report.succeeded("environment"),
                Err(e) => report.failed("environment", e),
            }
        }

        let restart = format!("systemctl restart {}.service", project);
        match self.ssh(ctx, &restart, None).await {
            Ok(()) => report.succeeded("restart"),
            Err(e) => report.failed("restart", e),
        }

        report
    }
}

/// Pack `app_dir` into a temporary tar.gz file
pub async fn package(app_dir: &Path) -> Result<tempfile::NamedTempFile, String> {
    if !app_dir.is_dir() {
        return Err(format!("{} is not a directory", app_dir.display()));
    }
    let app_dir = app_dir.to_path_buf();
    tokio::task::spawn_blocking(move || build_archive(&app_dir))
        .await
        .map_err(|e| format!("packaging task failed: {}", e))?
        .map_err(|e| format!("failed to package application: {}", e))
}

fn build_archive(app_dir: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    tracing::debug!("Packaging application from: {}", app_dir.display());

    let file = tempfile::Builder::new()
        .prefix("shipyard-app-")
        .suffix(".tar.gz")
        .tempfile()?;
    {
        let encoder = GzEncoder::new(file.as_file(), Compression::default());
        let mut tar = tar::Builder::new(encoder);
        tar.append_dir_all(".", app_dir)?;
        tar.into_inner()?.finish()?;
    }

    tracing::debug!(
        "Application archive created: {} bytes",
        file.as_file().metadata()?.len()
    );
    Ok(file)
}

async fn run(mut command: Command, stdin: Option<&str>) -> Result<(), String> {
    command
        .stdin(if stdin.is_some() {
            std::process::Stdio::piped()
        } else {
            std::process::Stdio::null()
        })
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped());

    let mut child = command.spawn().map_err(|e| format!("failed to start: {}", e))?;
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())
            .await
            .map_err(|e| format!("failed to write stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("failed to wait: {}", e))?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("exit status {}: {}", output.status, stderr.trim()))
    }
}

fn shell_escape(s: &str) -> String {
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}
