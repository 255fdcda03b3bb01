use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{fs, time::sleep};
use tracing::{debug, error};

use crate::{
    domains::cmd::Cmd,
    fs_conf::FsConfig,
    services::{
        gluster::{BACKEND, Gluster},
        lock::{self, Acquisition},
        mount_table::{MountTable, ProcMounts},
    },
};

/// Filesystem type handed to mount(8).
const FS_TYPE: &str = "glusterfs";
/// Lock-file name under each export's run directory.
const PID_FILE: &str = "glustervol.pid";
/// Where glusterd keeps per-volume runtime state; the per-export lock file
/// lives in the volume's own run directory so unrelated mounters of the
/// same export coordinate too.
const STATE_DIR: &str = "/var/lib/glusterd/vols";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("creating directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Lock(#[from] lock::Error),
}

/// How long to keep polling the mount table for a mount to appear.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(2),
        }
    }
}

/// Coordinates mounting cluster exports under a local root.
///
/// Among concurrent callers for the same export, exactly one runs the mount
/// command (serialized by an advisory lock on the export's pid file); the
/// rest poll the mount table until the winner's mount becomes visible or
/// the poll budget runs out.
#[derive(Clone)]
pub struct Mounter {
    gluster: Gluster,
    table: Arc<dyn MountTable>,
    wait: WaitPolicy,
    mount_ip: String,
    state_dir: PathBuf,
    mount_bin: String,
    umount_bin: String,
}

impl Mounter {
    pub fn new(config: &FsConfig, gluster: Gluster) -> Self {
        Self {
            gluster,
            table: Arc::new(ProcMounts),
            wait: WaitPolicy::default(),
            mount_ip: config.mount_ip.clone(),
            state_dir: PathBuf::from(STATE_DIR),
            mount_bin: "mount".to_string(),
            umount_bin: "umount".to_string(),
        }
    }

    /// Mount `drive` at `root/drive`.
    ///
    /// Expected failures (unknown export, failed mount command, mount never
    /// becoming visible) are logged and reported as `Ok(false)`; only
    /// directory-creation failures and lock failures other than contention
    /// escape as errors.
    pub async fn mount(&self, root: &Path, drive: &str) -> Result<bool, Error> {
        // Everything up to the lock is unguarded across processes; only the
        // mount command itself is serialized. Possible thundering herd.
        let exports = match self.gluster.exports().await {
            Ok(exports) => exports,
            Err(err) => {
                error!(error = %err, "listing exports failed");
                Vec::new()
            }
        };
        if !exports.iter().any(|export| export.name() == drive) {
            error!(drive, ?exports, "no export matching drive");
            return Ok(false);
        }

        let target = root.join(drive);
        if !target.is_dir() {
            create_dir(&target).await?;
        }

        let run_dir = self.state_dir.join(drive).join("run");
        create_dir(&run_dir).await?;

        match lock::try_exclusive(&run_dir.join(PID_FILE))? {
            Acquisition::Contended => {
                // Some other process is already mounting this export; just
                // wait for its mount to show up.
                debug!(drive, "mount lock contended, waiting for the holder");
                Ok(self.wait_visible(&target).await)
            }
            Acquisition::Acquired(_guard) => {
                let source = format!("{}:{}", self.mount_ip, drive);
                let mount = Cmd::new(&self.mount_bin)
                    .args(["-t", FS_TYPE])
                    .arg(&source)
                    .arg(&target);

                if let Err(err) = mount.run().await {
                    error!(
                        error = %err,
                        backend = BACKEND,
                        source,
                        target = %target.display(),
                        "mount failed"
                    );
                    return Ok(false);
                }

                if !self.wait_visible(&target).await {
                    error!(
                        backend = BACKEND,
                        source,
                        target = %target.display(),
                        "mount failed"
                    );
                    return Ok(false);
                }

                Ok(true)
            }
        }
    }

    /// Unmount `target`, best-effort. Failures are logged, never returned.
    pub async fn unmount(&self, target: &Path) {
        if let Err(err) = Cmd::new(&self.umount_bin).arg(target).run().await {
            error!(
                error = %err,
                backend = BACKEND,
                target = %target.display(),
                "unable to unmount"
            );
        }
    }

    pub async fn is_mounted(&self, target: &Path) -> bool {
        self.table.is_mounted(target).await
    }

    async fn wait_visible(&self, target: &Path) -> bool {
        for _ in 0..self.wait.attempts {
            if self.table.is_mounted(target).await {
                return true;
            }
            sleep(self.wait.interval).await;
        }

        error!(target = %target.display(), "busy wait for mount timed out");
        false
    }
}

async fn create_dir(path: &Path) -> Result<(), Error> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| Error::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}
