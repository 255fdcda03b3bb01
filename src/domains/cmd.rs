use std::{
    ffi::{OsStr, OsString},
    process::{ExitStatus, Output},
    string::FromUtf8Error,
};

use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    NonZero {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("'{program}' produced non-utf8 output: {source}")]
    Utf8 {
        program: String,
        source: FromUtf8Error,
    },
}

/// Builder for a single external command invocation.
///
/// Spawns exactly one child per `output`/`run` call and captures both output
/// streams, so child diagnostics never reach our stdout/stderr.
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    async fn capture(self) -> Result<Output, Error> {
        let program = self.program;
        let output = Command::new(&program)
            .args(&self.args)
            .output()
            .await
            .map_err(|source| Error::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::NonZero {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }

    /// Run the command and return its trimmed stdout.
    pub async fn output(self) -> Result<String, Error> {
        let program = self.program.clone();
        let output = self.capture().await?;

        let stdout =
            String::from_utf8(output.stdout).map_err(|source| Error::Utf8 { program, source })?;
        Ok(stdout.trim().to_string())
    }

    /// Run the command for its exit status only, discarding captured output.
    pub async fn run(self) -> Result<(), Error> {
        self.capture().await.map(|_| ())
    }
}
