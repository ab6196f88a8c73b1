// SPDX-License-Identifier: MIT

use crate::error::RunnerError;
use crate::traits::{ExecContext, ProvideRunner, Runner};
use async_trait::async_trait;
use std::process::Stdio;
use strata_core::{Dep, EnvMap, Exec};
use strata_metadata::Metadata;
use strata_sync::Streamer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Materializes an inline script (or reads one from `path`) to a temp
/// file and runs it with the configured shell, streaming output through
/// [`Streamer`] and translating the exit code per spec.md §4.3.
pub struct ShellExecRunner {
    exec: Exec,
    default_shell: String,
}

impl ShellExecRunner {
    pub fn new(exec: Exec, default_shell: impl Into<String>) -> Self {
        Self {
            exec,
            default_shell: default_shell.into(),
        }
    }

    async fn script_text(&self) -> Result<String, RunnerError> {
        if let Some(inline) = &self.exec.inline {
            return Ok(inline.clone());
        }
        if let Some(path) = &self.exec.path {
            return Ok(tokio::fs::read_to_string(path).await?);
        }
        Ok(String::new())
    }

    async fn run_impl(
        &self,
        streamer: &Streamer,
        env: &EnvMap,
        ctx: &ExecContext,
    ) -> Result<(), RunnerError> {
        let script = self.script_text().await?;
        let mut file = tempfile::NamedTempFile::new()?;
        {
            use std::io::Write;
            file.write_all(script.as_bytes())?;
            file.flush()?;
        }

        let shell = self.exec.shell_or(&self.default_shell);
        let mut parts = shell.split_whitespace();
        let program = parts.next().unwrap_or("/bin/sh");
        let mut cmd = Command::new(program);
        cmd.args(parts);
        cmd.arg(file.path());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (key, value) in env.iter() {
            cmd.env(key, value);
        }
        cmd.env("APP", &ctx.app_dir);
        if let Some(md) = &ctx.md_dir {
            cmd.env("MD", md);
        }
        if let Some(layer) = &ctx.layer_dir {
            cmd.env("LAYER", layer);
        }
        if let Some(cache) = &ctx.cache_dir {
            cmd.env("CACHE", cache);
        }
        if let Some(pf_config_path) = &ctx.pf_config_path {
            cmd.env("PF_CONFIG_PATH", pf_config_path);
        }

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let (stdout_done, stderr_done) = tokio::join!(
            pump_lines(stdout, |line| streamer.write_stdout(line)),
            pump_lines(stderr, |line| streamer.write_stderr(line)),
        );
        stdout_done?;
        stderr_done?;

        let status = child.wait().await?;
        match status.code() {
            Some(code) => match RunnerError::from_exit_code(code) {
                Some(e) => Err(e),
                None => Ok(()),
            },
            None => Err(RunnerError::Other("process terminated by signal".into())),
        }
    }
}

async fn pump_lines<F>(pipe: impl tokio::io::AsyncRead + Unpin, write: F) -> Result<(), RunnerError>
where
    F: Fn(&[u8]) -> Result<(), strata_sync::StreamClosed>,
{
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(());
        }
        if write(&line).is_err() {
            return Ok(());
        }
    }
}

#[async_trait]
impl Runner for ShellExecRunner {
    fn version(&self) -> String {
        self.exec
            .inline
            .clone()
            .or_else(|| self.exec.path.clone())
            .unwrap_or_default()
    }

    async fn execute(
        &self,
        streamer: &Streamer,
        env: &EnvMap,
        _metadata: &dyn Metadata,
        ctx: &ExecContext,
    ) -> Result<(), RunnerError> {
        self.run_impl(streamer, env, ctx).await
    }
}

#[async_trait]
impl ProvideRunner for ShellExecRunner {
    fn version(&self) -> String {
        Runner::version(self)
    }

    async fn provide(
        &self,
        streamer: &Streamer,
        env: &EnvMap,
        _metadata: &dyn Metadata,
        _deps: &[Dep],
        ctx: &ExecContext,
    ) -> Result<(), RunnerError> {
        self.run_impl(streamer, env, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_metadata::MemMetadata;

    fn ctx() -> ExecContext {
        ExecContext {
            app_dir: "/tmp/app".into(),
            md_dir: None,
            layer_dir: None,
            cache_dir: None,
            pf_config_path: None,
        }
    }

    #[tokio::test]
    async fn successful_script_streams_stdout() {
        let exec = Exec {
            shell: Some("/bin/sh".to_string()),
            inline: Some("echo hello".to_string()),
            path: None,
            glob: None,
        };
        let runner = ShellExecRunner::new(exec, "/bin/sh");
        let (streamer, reader) = Streamer::pair();
        let env = EnvMap::new();
        let md = MemMetadata::new();
        let result = runner.execute(&streamer, &env, &md, &ctx()).await;
        streamer.close();
        let mut out = Vec::new();
        let mut err = Vec::new();
        reader.drain_into(&mut out, &mut err).await.unwrap();
        assert!(result.is_ok());
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[tokio::test]
    async fn exit_code_100_is_a_decline() {
        let exec = Exec {
            shell: Some("/bin/sh".to_string()),
            inline: Some("exit 100".to_string()),
            path: None,
            glob: None,
        };
        let runner = ShellExecRunner::new(exec, "/bin/sh");
        let (streamer, reader) = Streamer::pair();
        let env = EnvMap::new();
        let md = MemMetadata::new();
        let result = runner.execute(&streamer, &env, &md, &ctx()).await;
        streamer.close();
        let mut out = Vec::new();
        let mut err = Vec::new();
        reader.drain_into(&mut out, &mut err).await.unwrap();
        assert!(matches!(result, Err(RunnerError::Declined)));
    }

    #[tokio::test]
    async fn other_nonzero_exit_is_a_code_error() {
        let exec = Exec {
            shell: Some("/bin/sh".to_string()),
            inline: Some("exit 7".to_string()),
            path: None,
            glob: None,
        };
        let runner = ShellExecRunner::new(exec, "/bin/sh");
        let (streamer, reader) = Streamer::pair();
        let env = EnvMap::new();
        let md = MemMetadata::new();
        let result = runner.execute(&streamer, &env, &md, &ctx()).await;
        streamer.close();
        let mut out = Vec::new();
        let mut err = Vec::new();
        reader.drain_into(&mut out, &mut err).await.unwrap();
        assert!(matches!(result, Err(RunnerError::Code(7))));
    }
}
