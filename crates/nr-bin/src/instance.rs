//! Single-instance guard.
//!
//! A pid file keyed by a stable GUID under the runtime directory prevents
//! concurrent instances. A lock left behind by a dead process is reclaimed
//! by checking the recorded pid for liveness.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};

const INSTANCE_GUID: &str = "{DBA85A68-5557-4E2D-A844-33EB301E38CC}";

pub struct RunGuard {
    path: PathBuf,
}

impl RunGuard {
    /// Try to become the single instance. `Ok(None)` means another live
    /// instance holds the lock.
    pub fn try_acquire(dir: &Path) -> io::Result<Option<RunGuard>> {
        let mut hasher = DefaultHasher::new();
        INSTANCE_GUID.hash(&mut hasher);
        let path = dir.join(format!("newsroom-{:016x}.pid", hasher.finish()));

        match Self::write_lock(&path) {
            Ok(()) => return Ok(Some(RunGuard { path })),
            Err(e) if e.kind() != io::ErrorKind::AlreadyExists => return Err(e),
            Err(_) => {}
        }

        // a lock exists; reclaim it only if its owner is gone
        let holder = fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok());
        match holder {
            Some(pid) if pid != std::process::id() && process_alive(pid) => Ok(None),
            Some(pid) if pid == std::process::id() => Ok(Some(RunGuard { path })),
            _ => {
                tracing::warn!(target: "runtime", path = %path.display(),
                    "stale_instance_lock_reclaimed");
                fs::remove_file(&path)?;
                Self::write_lock(&path)?;
                Ok(Some(RunGuard { path }))
            }
        }
    }

    fn write_lock(path: &Path) -> io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options.open(path)?;
        use std::io::Write;
        write!(file, "{}", std::process::id())
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Best-effort liveness probe. Without a procfs we assume the holder is
/// alive, which errs on the safe side.
fn process_alive(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    if proc_root.is_dir() {
        proc_root.join(pid.to_string()).is_dir()
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_in_the_same_process_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunGuard::try_acquire(dir.path()).unwrap();
        assert!(first.is_some());
        // same pid in the lock file: re-acquisition is allowed
        let second = RunGuard::try_acquire(dir.path()).unwrap();
        assert!(second.is_some());
    }

    #[test]
    fn drop_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _guard = RunGuard::try_acquire(dir.path()).unwrap().unwrap();
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        // force the lock path and plant a pid that cannot be alive
        let guard = RunGuard::try_acquire(dir.path()).unwrap().unwrap();
        let path = guard.path.clone();
        std::mem::forget(guard);
        fs::write(&path, "4294967294").unwrap();
        let reclaimed = RunGuard::try_acquire(dir.path()).unwrap();
        assert!(reclaimed.is_some());
    }
}
