use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const EXAMPLE_ENV_FILE: &str = ".env.example";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Resolved locations of the files the controller reads.
#[derive(Debug, Clone)]
pub struct StackPaths {
    pub project_dir: PathBuf,
    pub env_file: PathBuf,
    pub compose_file: PathBuf,
}

impl StackPaths {
    pub fn resolve(project_dir: Option<PathBuf>, env_file: Option<PathBuf>) -> Result<Self> {
        let project_dir = match project_dir {
            Some(dir) => normalize_path(dir)?,
            None => std::env::current_dir()?,
        };
        let env_file = match env_file {
            Some(path) if path.is_absolute() => path,
            Some(path) => project_dir.join(path),
            None => project_dir.join(DEFAULT_ENV_FILE),
        };
        let compose_file = project_dir.join(DEFAULT_COMPOSE_FILE);
        Ok(Self {
            project_dir,
            env_file,
            compose_file,
        })
    }

    pub fn example_env_file(&self) -> PathBuf {
        self.project_dir.join(EXAMPLE_ENV_FILE)
    }
}

pub fn normalize_path(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub fn is_writable(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

pub fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}

pub fn current_gid() -> u32 {
    unsafe { libc::getgid() }
}
