mod domains;
mod driver;
mod fs_conf;
mod plugin;
mod services;
mod settings;
mod split_tracing;

use axum::serve;
use tokio::{fs, net::UnixListener};
use tracing::info;

use crate::{
    driver::VolumeDriver, fs_conf::FsConfig, plugin::Plugin, services::gluster::Gluster,
    settings::Settings,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    split_tracing::init();

    let settings = Settings::parse().await?;
    let config = FsConfig::load(&settings.fs_conf)?;
    info!(
        mount_ip = config.mount_ip,
        remote_cluster = config.remote_cluster,
        object_only = config.object_only,
        "loaded filesystem configuration"
    );

    if settings.socket.exists() {
        fs::remove_file(&settings.socket).await?;
    }

    let gluster = Gluster::init(&config).await?;
    let plugin = Plugin::new(&settings.mount_path, &config, gluster).into_router();
    let listener = UnixListener::bind(&settings.socket)?;
    info!(socket = ?settings.socket, "listening");

    serve(listener, plugin).await?;

    Ok(())
}
