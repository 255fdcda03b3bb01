use clap::Parser;
use std::{io::ErrorKind, os::unix::fs::FileTypeExt, path::PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed getting current directory: {0:?}")]
    CurrentDir(ErrorKind),

    #[error("failed getting socket metadata: {0:?}")]
    SocketMetadata(ErrorKind),

    #[error("failed to create directory for {0}: {1:?}")]
    CreateDir(String, ErrorKind),

    #[error("path {0:?} must be a unix socket")]
    NoSocket(PathBuf),

    #[error("mount root {0:?} is not a directory")]
    NoDirMountPath(PathBuf),

    #[error("socket {0:?} has no parent path")]
    MissingSocketParent(PathBuf),
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct Args {
    /// Unix socket the plugin listens on.
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Root directory exports are mounted under.
    #[arg(short, long)]
    mount_path: Option<PathBuf>,

    /// Filesystem configuration file.
    #[arg(short, long)]
    fs_conf: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Settings {
    pub socket: PathBuf,
    pub mount_path: PathBuf,
    pub fs_conf: PathBuf,
}

impl Settings {
    pub async fn parse() -> Result<Self, Error> {
        let args = Args::parse();
        let current_dir = std::env::current_dir().map_err(|e| Error::CurrentDir(e.kind()))?;

        let mut socket = args
            .socket
            .unwrap_or_else(|| current_dir.join("glustervol_socket/plugin.sock"));
        if !socket.is_absolute() {
            socket = current_dir.join(socket);
        }

        let mount_path = args
            .mount_path
            .unwrap_or_else(|| PathBuf::from("/mnt/gluster-object"));
        let fs_conf = args
            .fs_conf
            .unwrap_or_else(|| PathBuf::from("/etc/glustervol/fs.conf"));

        if socket.exists() {
            let file_type = fs::metadata(&socket)
                .await
                .map_err(|e| Error::SocketMetadata(e.kind()))?
                .file_type();
            if !file_type.is_socket() {
                return Err(Error::NoSocket(socket));
            }
        } else {
            let Some(parent) = socket.parent() else {
                return Err(Error::MissingSocketParent(socket));
            };
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::CreateDir("socket".to_string(), e.kind()))?;
        }

        if mount_path.exists() {
            if !mount_path.is_dir() {
                return Err(Error::NoDirMountPath(mount_path));
            }
        } else {
            fs::create_dir_all(&mount_path)
                .await
                .map_err(|e| Error::CreateDir("mount root".to_string(), e.kind()))?;
        }

        let settings = Self {
            socket,
            mount_path,
            fs_conf,
        };
        info!(?settings, "parsed cli settings");

        Ok(settings)
    }
}
