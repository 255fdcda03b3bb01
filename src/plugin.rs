use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    driver::{CreateOpts, Scope, VolumeDriver, VolumeState, VolumeSummary},
    fs_conf::FsConfig,
    services::{attachments::Attachments, gluster::Gluster, mounter::Mounter},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no export found matching volume '{0}'")]
    UnknownExport(String),

    #[error("mounting volume '{0}' failed, see server log")]
    MountFailed(String),

    #[error("volume '{name}' is still used by {attachments} container(s)")]
    Busy { name: String, attachments: usize },

    #[error(transparent)]
    Gluster(#[from] crate::services::gluster::Error),

    #[error(transparent)]
    Mount(#[from] crate::services::mounter::Error),
}

#[cfg_attr(test, derive(Debug, PartialEq, Clone, serde::Deserialize))]
#[derive(Serialize)]
pub struct Status {
    pub mounted: bool,
    pub object_only: bool,
}

/// Serves cluster exports as container volumes. Exports are provisioned by
/// cluster administrators; this plugin only mounts and unmounts them.
#[derive(Clone)]
pub struct Plugin {
    root: PathBuf,
    object_only: bool,
    gluster: Gluster,
    mounter: Mounter,
    attachments: Attachments,
}

impl Plugin {
    pub fn new(root: &Path, config: &FsConfig, gluster: Gluster) -> Self {
        Self {
            root: root.to_path_buf(),
            object_only: config.object_only,
            mounter: Mounter::new(config, gluster.clone()),
            gluster,
            attachments: Attachments::new(),
        }
    }

    fn target(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn ensure_export(&self, name: &str) -> Result<(), Error> {
        let exports = self.gluster.exports().await?;
        if exports.iter().any(|export| export.name() == name) {
            Ok(())
        } else {
            Err(Error::UnknownExport(name.to_string()))
        }
    }
}

#[async_trait::async_trait]
impl VolumeDriver for Plugin {
    type Error = Error;
    type Status = Status;

    async fn capabilities(&self) -> Scope {
        // A cluster export is the same volume on every node.
        Scope::Global
    }

    async fn path(&self, name: &str) -> Result<Option<PathBuf>, Self::Error> {
        let target = self.target(name);
        let mounted = self.mounter.is_mounted(&target).await;
        Ok(mounted.then_some(target))
    }

    async fn get(&self, name: &str) -> Result<VolumeState<Self::Status>, Self::Error> {
        self.ensure_export(name).await?;

        let target = self.target(name);
        let mounted = self.mounter.is_mounted(&target).await;
        Ok(VolumeState {
            mountpoint: mounted.then_some(target),
            status: Status {
                mounted,
                object_only: self.object_only,
            },
        })
    }

    async fn list(&self) -> Result<Vec<VolumeSummary>, Self::Error> {
        let exports = self.gluster.exports().await?;

        let mut volumes = Vec::with_capacity(exports.len());
        for export in exports {
            let target = self.target(export.name());
            let mounted = self.mounter.is_mounted(&target).await;
            volumes.push(VolumeSummary {
                name: export.name().to_string(),
                mountpoint: mounted.then_some(target),
            });
        }

        Ok(volumes)
    }

    async fn create(&self, name: &str, opts: Option<CreateOpts>) -> Result<(), Self::Error> {
        if let Some(opts) = opts
            && !opts.is_empty()
        {
            warn!(volume = name, ?opts, "cluster exports take no create options, ignoring");
        }

        self.ensure_export(name).await?;
        info!(volume = name, "export registered");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), Self::Error> {
        let attachments = self.attachments.active(name).await;
        if attachments > 0 {
            return Err(Error::Busy {
                name: name.to_string(),
                attachments,
            });
        }

        // Export lifecycle belongs to the cluster; nothing to tear down.
        info!(volume = name, "export released");
        Ok(())
    }

    async fn mount(&self, name: &str, id: &str) -> Result<PathBuf, Self::Error> {
        let target = self.target(name);

        if self.mounter.is_mounted(&target).await {
            let attachments = self.attachments.attach(name, id).await;
            debug!(volume = name, id, attachments, "export already mounted");
            return Ok(target);
        }

        if !self.mounter.mount(&self.root, name).await? {
            return Err(Error::MountFailed(name.to_string()));
        }

        let attachments = self.attachments.attach(name, id).await;
        info!(volume = name, id, attachments, target = %target.display(), "volume mounted");
        Ok(target)
    }

    async fn unmount(&self, name: &str, id: &str) -> Result<(), Self::Error> {
        let remaining = self.attachments.detach(name, id).await;
        if remaining > 0 {
            debug!(volume = name, id, remaining, "export still in use");
            return Ok(());
        }

        self.mounter.unmount(&self.target(name)).await;
        info!(volume = name, id, "volume unmounted");
        Ok(())
    }
}
