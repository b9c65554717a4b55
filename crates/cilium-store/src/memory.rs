use crate::state::State;
use crate::{Db, StoreError};
use cilium_policy::PolicySource;
use cilium_schema::{DnsEndpoint, Endpoint, HaproxyEndpoint, PortBindings, User};
use std::sync::{Mutex, MutexGuard};

/// Process-local store. All operations hold one mutex, so `put_ip` is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> Result<State, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Db for MemoryStore {
    fn get_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users())
    }

    fn put_user(&self, name: &str) -> Result<(u32, bool), StoreError> {
        self.lock()?.put_user(name)
    }

    fn get_policies(&self) -> Result<Vec<PolicySource>, StoreError> {
        Ok(self.lock()?.policies())
    }

    fn put_policy(&self, source: &PolicySource) -> Result<(), StoreError> {
        self.lock()?.put_policy(source);
        Ok(())
    }

    fn get_endpoint(&self, container: &str) -> Result<Endpoint, StoreError> {
        Ok(self.lock()?.endpoint(container))
    }

    fn put_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.lock()?.put_endpoint(endpoint);
        Ok(())
    }

    fn delete_endpoint(&self, container: &str) -> Result<(), StoreError> {
        self.lock()?.delete_endpoint(container);
        Ok(())
    }

    fn put_ip(&self, ip: &str) -> Result<(), StoreError> {
        self.lock()?.put_ip(ip)
    }

    fn delete_ip(&self, ip: &str) -> Result<(), StoreError> {
        self.lock()?.delete_ip(ip);
        Ok(())
    }

    fn get_docker_links(&self, container: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.links.get(container).cloned().unwrap_or_default())
    }

    fn put_docker_links(&self, container: &str, links: &[String]) -> Result<(), StoreError> {
        self.lock()?
            .links
            .insert(container.to_owned(), links.to_vec());
        Ok(())
    }

    fn get_docker_links_temp(&self, name: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .temp_links
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn put_docker_links_temp(&self, name: &str, links: &[String]) -> Result<(), StoreError> {
        self.lock()?
            .temp_links
            .insert(name.to_owned(), links.to_vec());
        Ok(())
    }

    fn get_port_bindings(&self, container: &str) -> Result<PortBindings, StoreError> {
        Ok(self
            .lock()?
            .port_bindings
            .get(container)
            .cloned()
            .unwrap_or_default())
    }

    fn put_port_bindings(&self, container: &str, bindings: &PortBindings) -> Result<(), StoreError> {
        self.lock()?
            .port_bindings
            .insert(container.to_owned(), bindings.clone());
        Ok(())
    }

    fn get_port_bindings_temp(&self, name: &str) -> Result<PortBindings, StoreError> {
        Ok(self
            .lock()?
            .temp_port_bindings
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn put_port_bindings_temp(&self, name: &str, bindings: &PortBindings) -> Result<(), StoreError> {
        self.lock()?
            .temp_port_bindings
            .insert(name.to_owned(), bindings.clone());
        Ok(())
    }

    fn get_dns_config(&self) -> Result<Option<DnsEndpoint>, StoreError> {
        Ok(self.lock()?.dns.clone())
    }

    fn put_dns_config(&self, dns: &DnsEndpoint) -> Result<(), StoreError> {
        self.lock()?.dns = Some(dns.clone());
        Ok(())
    }

    fn get_haproxy_config(&self) -> Result<HaproxyEndpoint, StoreError> {
        Ok(self.lock()?.haproxy.clone().unwrap_or_default())
    }

    fn put_haproxy_config(&self, haproxy: &HaproxyEndpoint) -> Result<(), StoreError> {
        self.lock()?.haproxy = Some(haproxy.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock()? = State::default();
        Ok(())
    }

    fn flush_config(&self) -> Result<(), StoreError> {
        self.lock()?.flush_config();
        Ok(())
    }
}
