use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
#[error("loading filesystem config: {0}")]
pub struct Error(#[from] config::ConfigError);

/// Process-wide filesystem settings, loaded once at startup and immutable
/// afterwards. A missing file or missing keys silently fall back to the
/// defaults below.
#[derive(Debug, Clone, Deserialize)]
pub struct FsConfig {
    /// Host the volume manager is queried on and mounts are sourced from.
    pub mount_ip: String,
    /// Issue volume-manager queries over ssh to `mount_ip` instead of
    /// running them locally.
    pub remote_cluster: bool,
    /// Exports are served as objects only; no other access path touches
    /// their metadata.
    pub object_only: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            mount_ip: "localhost".to_string(),
            remote_cluster: false,
            object_only: false,
        }
    }
}

impl FsConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let config = Config::builder()
            .set_default("mount_ip", "localhost")?
            .set_default("remote_cluster", false)?
            .set_default("object_only", false)?
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Ini)
                    .required(false),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod test {
    use std::{fs, path::PathBuf};

    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn write_conf(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("fs.conf");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = FsConfig::load(Path::new("/glustervol-no-such-dir/fs.conf")).unwrap();

        assert_eq!(config.mount_ip, "localhost");
        assert!(!config.remote_cluster);
        assert!(!config.object_only);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_conf(
            &dir,
            "mount_ip = gluster1.example.com\nremote_cluster = yes\nobject_only = yes\n",
        );

        let config = FsConfig::load(&path).unwrap();

        assert_eq!(config.mount_ip, "gluster1.example.com");
        assert!(config.remote_cluster);
        assert!(config.object_only);
    }

    #[test]
    fn missing_keys_keep_their_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_conf(&dir, "mount_ip = 10.0.0.5\n");

        let config = FsConfig::load(&path).unwrap();

        assert_eq!(config.mount_ip, "10.0.0.5");
        assert!(!config.remote_cluster);
        assert!(!config.object_only);
    }

    #[rstest]
    #[case("yes", true)]
    #[case("true", true)]
    #[case("on", true)]
    #[case("1", true)]
    #[case("no", false)]
    #[case("false", false)]
    #[case("0", false)]
    fn boolean_spellings(#[case] spelling: &str, #[case] expected: bool) {
        let dir = TempDir::new().unwrap();
        let path = write_conf(&dir, &format!("remote_cluster = {spelling}\n"));

        let config = FsConfig::load(&path).unwrap();
        assert_eq!(config.remote_cluster, expected);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write_conf(&dir, "mount_ip = host\nfuture_knob = 7\n");

        let config = FsConfig::load(&path).unwrap();
        assert_eq!(config.mount_ip, "host");
    }
}
