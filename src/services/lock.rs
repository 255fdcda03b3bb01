use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
};

use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("acquiring lock on {path:?}: {source}")]
pub struct Error {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// Outcome of a non-blocking lock attempt.
///
/// Contention is an expected state, not an error: it means some other
/// process holds the file and is doing the guarded work right now.
#[derive(Debug)]
pub enum Acquisition {
    Acquired(Guard),
    Contended,
}

/// Holds the advisory lock; unlocks when dropped.
#[derive(Debug)]
pub struct Guard {
    file: File,
    path: PathBuf,
}

/// Try to take an exclusive, non-blocking advisory lock on `path`, creating
/// the file if it does not exist. The file's content is never read or
/// written; only the lock matters.
///
/// `EWOULDBLOCK` and `EACCES` both mean another holder, per flock/lockf
/// semantics; anything else surfaces as an error.
pub fn try_exclusive(path: &Path) -> Result<Acquisition, Error> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| Error {
            path: path.to_path_buf(),
            source,
        })?;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::PermissionDenied => Ok(Acquisition::Contended),
            _ => Err(Error {
                path: path.to_path_buf(),
                source: err,
            }),
        };
    }

    debug!(path = %path.display(), "acquired mount lock");
    Ok(Acquisition::Acquired(Guard {
        file,
        path: path.to_path_buf(),
    }))
}

impl Drop for Guard {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!(path = %self.path.display(), "released mount lock");
    }
}
