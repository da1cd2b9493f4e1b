//! Docker-backed sandbox
//!
//! One container per submission: no network, pinned cpu and memory, a
//! process cap. Source and stdin land in the container via base64 over
//! exec, runs are bounded with `timeout(1)`.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use bollard::{
    Docker,
    container::LogOutput,
    exec::{CreateExecOptions, StartExecResults},
    models::ContainerCreateBody,
    query_parameters::{CreateContainerOptionsBuilder, RemoveContainerOptionsBuilder},
};
use futures::StreamExt;
use uuid::Uuid;

use crate::{
    config::JudgeConfig,
    constants::DEFAULT_MEMORY_LIMIT_MB,
    error::AppResult,
};

use super::sandbox::{CompileResult, ResourceLimits, RunFault, RunOutput, Sandbox};

/// `timeout(1)` exit code for a killed command
const TIMEOUT_EXIT_CODE: i64 = 124;

/// Docker sandbox implementation
pub struct DockerSandbox {
    docker: Docker,
    config: JudgeConfig,
}

struct ExecOutput {
    stdout: String,
    stderr: String,
    exit_code: i64,
}

impl DockerSandbox {
    /// Create a new Docker sandbox
    pub fn new(docker: Docker, config: JudgeConfig) -> Self {
        Self { docker, config }
    }

    async fn create_container(&self, submission_id: &Uuid) -> AppResult<String> {
        let container_name = format!("codeduel-{}", submission_id);

        let options = CreateContainerOptionsBuilder::default()
            .name(&container_name)
            .build();

        let host_config = bollard::models::HostConfig {
            memory: Some((DEFAULT_MEMORY_LIMIT_MB * 1024 * 1024) as i64),
            memory_swap: Some((DEFAULT_MEMORY_LIMIT_MB * 1024 * 1024) as i64),
            cpu_period: Some(100_000),
            cpu_quota: Some(50_000),
            network_mode: Some("none".to_string()),
            pids_limit: Some(64),
            ..Default::default()
        };

        let config = ContainerCreateBody {
            image: Some(self.config.image.clone()),
            tty: Some(true),
            open_stdin: Some(true),
            host_config: Some(host_config),
            working_dir: Some("/judge/temp".to_string()),
            labels: Some({
                let mut labels = HashMap::new();
                labels.insert("codeduel.submission".to_string(), submission_id.to_string());
                labels
            }),
            ..Default::default()
        };

        let container = self.docker.create_container(Some(options), config).await?;

        self.docker
            .start_container(
                &container.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await?;

        Ok(container.id)
    }

    /// Write a file to the container
    async fn write_file(&self, container_id: &str, path: &str, content: &str) -> AppResult<()> {
        // base64 round trip keeps shell metacharacters in the payload inert
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let cmd = format!("echo '{}' | base64 -d > {}", encoded, path);

        self.exec_command(container_id, &cmd).await?;

        Ok(())
    }

    /// Execute a command in the container
    async fn exec_command(&self, container_id: &str, cmd: &str) -> AppResult<ExecOutput> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(vec!["/bin/sh", "-c", cmd]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let output = self.docker.start_exec(&exec.id, None).await?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = output {
            while let Some(msg) = output.next().await {
                match msg? {
                    LogOutput::StdOut { message } => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    LogOutput::StdErr { message } => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    _ => {}
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn compile(&self, submission_id: Uuid, source: &str) -> AppResult<CompileResult> {
        let container_id = self.create_container(&submission_id).await?;

        self.write_file(&container_id, "/judge/temp/solution.cpp", source)
            .await?;

        let result = self
            .exec_command(&container_id, "g++ -O2 -o solution solution.cpp 2>&1")
            .await?;

        if result.exit_code != 0 {
            // The compiler log is the terminal result; tear down now.
            let _ = self.cleanup(&container_id).await;
            return Ok(CompileResult::Failure { log: result.stdout });
        }

        Ok(CompileResult::Success {
            handle: container_id,
        })
    }

    async fn run(
        &self,
        handle: &str,
        stdin: &str,
        limits: ResourceLimits,
    ) -> AppResult<RunOutput> {
        self.write_file(handle, "/judge/temp/input.txt", stdin).await?;

        let cmd = format!(
            "ulimit -v {}; timeout {}s ./solution < input.txt",
            limits.memory_limit_mb * 1024,
            limits.time_limit.as_secs().max(1)
        );
        let result = self.exec_command(handle, &cmd).await?;

        let fault = if result.exit_code == TIMEOUT_EXIT_CODE {
            Some(RunFault::Timeout)
        } else if result.exit_code != 0 {
            Some(RunFault::Crashed {
                exit_code: result.exit_code,
            })
        } else {
            None
        };

        Ok(RunOutput {
            stdout: result.stdout,
            stderr: result.stderr,
            fault,
        })
    }

    async fn cleanup(&self, handle: &str) -> AppResult<()> {
        let options = RemoveContainerOptionsBuilder::default().force(true).build();

        self.docker.remove_container(handle, Some(options)).await?;

        Ok(())
    }
}
