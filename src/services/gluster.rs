use tracing::info;

use crate::{
    domains::{
        cmd::{Cmd, Error as CmdError},
        export::{Export, parse_volume_info},
    },
    fs_conf::FsConfig,
};

/// Backend name used in operator-facing log lines.
pub const BACKEND: &str = "glusterfs";

const GLUSTER_BIN: &str = "gluster";
const REMOTE_SHELL: &str = "ssh";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed locating '{program}': {source}")]
    Locate {
        program: String,
        source: CmdError,
    },

    #[error("getting volume info failed {BACKEND}: {0}")]
    Query(#[source] CmdError),

    #[error(
        "getting volume info failed {BACKEND}, make sure to have passwordless ssh on {host}: {source}"
    )]
    RemoteQuery {
        host: String,
        source: CmdError,
    },
}

/// Wrapper around the cluster's volume-management CLI.
///
/// In remote-cluster mode every query is issued over a remote shell to the
/// mount host instead of running locally.
#[derive(Debug, Clone)]
pub struct Gluster {
    runner: String,
    remote_host: Option<String>,
}

impl Gluster {
    /// Locate the binary queries will actually run (`gluster`, or the
    /// remote shell when the cluster is remote) and fail fast if absent.
    pub async fn init(config: &FsConfig) -> Result<Self, Error> {
        let wanted = if config.remote_cluster {
            REMOTE_SHELL
        } else {
            GLUSTER_BIN
        };
        let runner = Cmd::new("which")
            .arg(wanted)
            .output()
            .await
            .map_err(|source| Error::Locate {
                program: wanted.to_string(),
                source,
            })?;
        info!(runner, "located volume manager runner");

        Ok(Self {
            runner,
            remote_host: config
                .remote_cluster
                .then(|| config.mount_ip.clone()),
        })
    }

    fn info_cmd(&self) -> Cmd {
        let cmd = match &self.remote_host {
            Some(host) => Cmd::new(&self.runner).arg(host).arg(GLUSTER_BIN),
            None => Cmd::new(&self.runner),
        };
        cmd.args(["volume", "info"])
    }

    /// List the exports the cluster currently advertises. One child process
    /// per call, no retries; ordering follows the tool's output.
    pub async fn exports(&self) -> Result<Vec<Export>, Error> {
        let stdout = self
            .info_cmd()
            .output()
            .await
            .map_err(|source| match &self.remote_host {
                Some(host) => Error::RemoteQuery {
                    host: host.clone(),
                    source,
                },
                None => Error::Query(source),
            })?;

        Ok(parse_volume_info(&stdout))
    }
}

#[cfg(test)]
pub mod test {
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};

    use tempfile::TempDir;

    use super::*;

    impl Gluster {
        pub fn local(runner: &str) -> Self {
            Self {
                runner: runner.to_string(),
                remote_host: None,
            }
        }

        pub fn remote(runner: &str, host: &str) -> Self {
            Self {
                runner: runner.to_string(),
                remote_host: Some(host.to_string()),
            }
        }
    }

    /// Drop a stub executable into `dir` and return its path as a string.
    pub fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_string()
    }

    const VOLUME_INFO: &str = "\
echo 'Volume Name: vol1'
echo 'Type: Distribute'
echo 'Volume Name: vol2'";

    #[tokio::test]
    async fn lists_local_exports() {
        let dir = TempDir::new().unwrap();
        let gluster = Gluster::local(&fake_tool(dir.path(), "gluster", VOLUME_INFO));

        let exports = gluster.exports().await.unwrap();
        assert_eq!(exports, vec![Export::stub("vol1"), Export::stub("vol2")]);
    }

    #[tokio::test]
    async fn local_query_failure() {
        let dir = TempDir::new().unwrap();
        let gluster = Gluster::local(&fake_tool(dir.path(), "gluster", "exit 1"));

        let error = gluster.exports().await.unwrap_err();
        assert!(matches!(error, Error::Query(_)));
    }

    #[tokio::test]
    async fn remote_query_goes_through_the_shell() {
        let dir = TempDir::new().unwrap();
        let record = dir.path().join("argv");
        let body = format!(
            "echo \"$@\" > {}\necho 'Volume Name: remote1'",
            record.display()
        );
        let shell = fake_tool(dir.path(), "ssh", &body);
        let gluster = Gluster::remote(&shell, "gluster.example.com");

        let exports = gluster.exports().await.unwrap();
        assert_eq!(exports, vec![Export::stub("remote1")]);

        let argv = fs::read_to_string(&record).unwrap();
        assert_eq!(argv.trim(), "gluster.example.com gluster volume info");
    }

    #[tokio::test]
    async fn remote_failure_mentions_passwordless_ssh() {
        let dir = TempDir::new().unwrap();
        let shell = fake_tool(dir.path(), "ssh", "exit 255");
        let gluster = Gluster::remote(&shell, "gluster.example.com");

        let error = gluster.exports().await.unwrap_err();
        assert!(matches!(error, Error::RemoteQuery { .. }));
        assert!(error.to_string().contains("passwordless ssh"));
        assert!(error.to_string().contains("gluster.example.com"));
    }
}
