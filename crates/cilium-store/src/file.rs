use crate::state::State;
use crate::{Db, StoreError};
use cilium_policy::PolicySource;
use cilium_schema::{DnsEndpoint, Endpoint, HaproxyEndpoint, PortBindings, User};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Exclusive advisory lock on a file, released on drop.
pub struct StoreLock {
    lock_file: File,
}

impl StoreLock {
    pub fn acquire(lock_path: &Path) -> Result<Self, StoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| StoreError::LockFailed(format!("{}: {e}", lock_path.display())))?;
        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, StoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

fn fsync_dir(dir: &Path) -> Result<(), StoreError> {
    let f = File::open(dir)?;
    f.sync_all()?;
    Ok(())
}

/// Store backed by one JSON state file.
///
/// Every operation takes an exclusive lock on `<path>.lock`, so several
/// adapter processes on one host can share the file. Writes go through a
/// temp file in the same directory and are renamed into place.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let dir = parent_dir(&path);
        fs::create_dir_all(&dir)?;
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        Ok(Self {
            path,
            lock_path: PathBuf::from(lock_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<State, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(State::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(State::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &State) -> Result<(), StoreError> {
        let dir = parent_dir(&self.path);
        let content = serde_json::to_vec_pretty(state)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;
        debug!("store state written to {}", self.path.display());
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, StoreError> {
        let _lock = StoreLock::acquire(&self.lock_path)?;
        let state = self.load()?;
        Ok(f(&state))
    }

    fn update<T>(&self, f: impl FnOnce(&mut State) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _lock = StoreLock::acquire(&self.lock_path)?;
        let mut state = self.load()?;
        let out = f(&mut state)?;
        self.save(&state)?;
        Ok(out)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl Db for FileStore {
    fn get_users(&self) -> Result<Vec<User>, StoreError> {
        self.read(State::users)
    }

    fn put_user(&self, name: &str) -> Result<(u32, bool), StoreError> {
        self.update(|s| s.put_user(name))
    }

    fn get_policies(&self) -> Result<Vec<PolicySource>, StoreError> {
        self.read(State::policies)
    }

    fn put_policy(&self, source: &PolicySource) -> Result<(), StoreError> {
        self.update(|s| {
            s.put_policy(source);
            Ok(())
        })
    }

    fn get_endpoint(&self, container: &str) -> Result<Endpoint, StoreError> {
        self.read(|s| s.endpoint(container))
    }

    fn put_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.update(|s| {
            s.put_endpoint(endpoint);
            Ok(())
        })
    }

    fn delete_endpoint(&self, container: &str) -> Result<(), StoreError> {
        self.update(|s| {
            s.delete_endpoint(container);
            Ok(())
        })
    }

    fn put_ip(&self, ip: &str) -> Result<(), StoreError> {
        self.update(|s| s.put_ip(ip))
    }

    fn delete_ip(&self, ip: &str) -> Result<(), StoreError> {
        self.update(|s| {
            s.delete_ip(ip);
            Ok(())
        })
    }

    fn get_docker_links(&self, container: &str) -> Result<Vec<String>, StoreError> {
        self.read(|s| s.links.get(container).cloned().unwrap_or_default())
    }

    fn put_docker_links(&self, container: &str, links: &[String]) -> Result<(), StoreError> {
        self.update(|s| {
            s.links.insert(container.to_owned(), links.to_vec());
            Ok(())
        })
    }

    fn get_docker_links_temp(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.read(|s| s.temp_links.get(name).cloned().unwrap_or_default())
    }

    fn put_docker_links_temp(&self, name: &str, links: &[String]) -> Result<(), StoreError> {
        self.update(|s| {
            s.temp_links.insert(name.to_owned(), links.to_vec());
            Ok(())
        })
    }

    fn get_port_bindings(&self, container: &str) -> Result<PortBindings, StoreError> {
        self.read(|s| s.port_bindings.get(container).cloned().unwrap_or_default())
    }

    fn put_port_bindings(&self, container: &str, bindings: &PortBindings) -> Result<(), StoreError> {
        self.update(|s| {
            s.port_bindings
                .insert(container.to_owned(), bindings.clone());
            Ok(())
        })
    }

    fn get_port_bindings_temp(&self, name: &str) -> Result<PortBindings, StoreError> {
        self.read(|s| s.temp_port_bindings.get(name).cloned().unwrap_or_default())
    }

    fn put_port_bindings_temp(&self, name: &str, bindings: &PortBindings) -> Result<(), StoreError> {
        self.update(|s| {
            s.temp_port_bindings
                .insert(name.to_owned(), bindings.clone());
            Ok(())
        })
    }

    fn get_dns_config(&self) -> Result<Option<DnsEndpoint>, StoreError> {
        self.read(|s| s.dns.clone())
    }

    fn put_dns_config(&self, dns: &DnsEndpoint) -> Result<(), StoreError> {
        self.update(|s| {
            s.dns = Some(dns.clone());
            Ok(())
        })
    }

    fn get_haproxy_config(&self) -> Result<HaproxyEndpoint, StoreError> {
        self.read(|s| s.haproxy.clone().unwrap_or_default())
    }

    fn put_haproxy_config(&self, haproxy: &HaproxyEndpoint) -> Result<(), StoreError> {
        self.update(|s| {
            s.haproxy = Some(haproxy.clone());
            Ok(())
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(|s| {
            *s = State::default();
            Ok(())
        })
    }

    fn flush_config(&self) -> Result<(), StoreError> {
        self.update(|s| {
            s.flush_config();
            Ok(())
        })
    }
}
