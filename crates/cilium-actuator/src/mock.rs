//! In-memory collaborators for tests.

use crate::docker::{DockerApi, DockerEvent};
use crate::dns::DnsApi;
use crate::exec::CommandRunner;
use crate::haproxy::{HaproxyConfig, LoadBalancerApi};
use crate::kubernetes::{KubernetesApi, PodList};
use crate::ActuatorError;
use cilium_schema::{ApiContainer, ContainerInfo, DnsEndpoint, HaproxyEndpoint};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// Records every command line. Output is the canned response of the first
/// pattern contained in the command, or empty.
#[derive(Default)]
pub struct MockRunner {
    responses: Vec<(String, String)>,
    failures: Vec<String>,
    commands: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond(mut self, pattern: &str, output: &str) -> Self {
        self.responses.push((pattern.to_owned(), output.to_owned()));
        self
    }

    #[must_use]
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_owned());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &str) -> Result<String, ActuatorError> {
        if let Ok(mut c) = self.commands.lock() {
            c.push(command.to_owned());
        }
        if self.failures.iter().any(|p| command.contains(p.as_str())) {
            return Err(ActuatorError::CommandFailed {
                command: command.to_owned(),
                stderr: "mock failure".to_owned(),
            });
        }
        Ok(self
            .responses
            .iter()
            .find(|(p, _)| command.contains(p.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct DockerState {
    containers: BTreeMap<String, ContainerInfo>,
    hidden_inspects: HashMap<String, u32>,
    events: Vec<DockerEvent>,
    inspect_calls: u32,
}

/// Docker daemon holding containers in memory.
#[derive(Default)]
pub struct MockDocker {
    state: Mutex<DockerState>,
}

fn poisoned() -> ActuatorError {
    ActuatorError::Http("mock state poisoned".to_owned())
}

impl MockDocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_container(&self, info: ContainerInfo) {
        if let Ok(mut s) = self.state.lock() {
            s.containers.insert(info.id.clone(), info);
        }
    }

    /// Make the next `count` inspects of `id` report it as missing.
    pub fn hide_for(&self, id: &str, count: u32) {
        if let Ok(mut s) = self.state.lock() {
            s.hidden_inspects.insert(id.to_owned(), count);
        }
    }

    pub fn push_event(&self, event: DockerEvent) {
        if let Ok(mut s) = self.state.lock() {
            s.events.push(event);
        }
    }

    pub fn inspect_calls(&self) -> u32 {
        self.state.lock().map(|s| s.inspect_calls).unwrap_or(0)
    }
}

impl DockerApi for MockDocker {
    fn ping(&self) -> Result<(), ActuatorError> {
        Ok(())
    }

    fn inspect_container(&self, id: &str) -> Result<Option<ContainerInfo>, ActuatorError> {
        let mut s = self.state.lock().map_err(|_| poisoned())?;
        s.inspect_calls += 1;
        if let Some(left) = s.hidden_inspects.get_mut(id) {
            if *left > 0 {
                *left -= 1;
                return Ok(None);
            }
        }
        let by_name = format!("/{}", id.trim_start_matches('/'));
        Ok(s.containers
            .get(id)
            .or_else(|| s.containers.values().find(|c| c.name == by_name))
            .cloned())
    }

    fn list_containers(&self, all: bool) -> Result<Vec<ApiContainer>, ActuatorError> {
        let s = self.state.lock().map_err(|_| poisoned())?;
        Ok(s.containers
            .values()
            .filter(|c| all || c.state.running)
            .map(|c| ApiContainer {
                id: c.id.clone(),
                names: vec![c.name.clone()],
                image: c.config.image.clone().unwrap_or_default(),
                labels: c.labels(),
                ..Default::default()
            })
            .collect())
    }

    fn stream_events(
        &self,
        since: i64,
        sink: &mut dyn FnMut(DockerEvent) -> bool,
    ) -> Result<(), ActuatorError> {
        let events: Vec<DockerEvent> = {
            let s = self.state.lock().map_err(|_| poisoned())?;
            s.events.iter().filter(|e| e.time >= since).cloned().collect()
        };
        for event in events {
            if !sink(event) {
                break;
            }
        }
        Ok(())
    }
}

/// Serves queued pod lists in order; the last one repeats.
#[derive(Default)]
pub struct MockKubernetes {
    lists: Mutex<VecDeque<PodList>>,
    selectors: Mutex<Vec<String>>,
}

impl MockKubernetes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, list: PodList) {
        if let Ok(mut l) = self.lists.lock() {
            l.push_back(list);
        }
    }

    pub fn selectors(&self) -> Vec<String> {
        self.selectors
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl KubernetesApi for MockKubernetes {
    fn list_pods(&self, _namespace: &str, label_selector: &str) -> Result<PodList, ActuatorError> {
        if let Ok(mut s) = self.selectors.lock() {
            s.push(label_selector.to_owned());
        }
        let mut lists = self.lists.lock().map_err(|_| poisoned())?;
        if lists.len() > 1 {
            return Ok(lists.pop_front().unwrap_or_default());
        }
        Ok(lists.front().cloned().unwrap_or_default())
    }
}

/// Records DNS registrations as `(base_url, domain, ips)`.
#[derive(Default)]
pub struct MockDns {
    registrations: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl MockDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self) -> Vec<(String, String, Vec<String>)> {
        self.registrations
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl DnsApi for MockDns {
    fn register(&self, dns: &DnsEndpoint, domains: &[String], ips: &[String]) -> Result<(), ActuatorError> {
        let mut r = self.registrations.lock().map_err(|_| poisoned())?;
        for domain in domains {
            r.push((dns.base_url(), domain.clone(), ips.to_vec()));
        }
        Ok(())
    }
}

/// HAProxy config service keeping one config in memory.
#[derive(Default)]
pub struct MockHaproxy {
    config: Mutex<HaproxyConfig>,
    posts: Mutex<u32>,
}

impl MockHaproxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> HaproxyConfig {
        self.config.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn posts(&self) -> u32 {
        self.posts.lock().map(|p| *p).unwrap_or(0)
    }
}

impl LoadBalancerApi for MockHaproxy {
    fn get_config(&self, _endpoint: &HaproxyEndpoint) -> Result<HaproxyConfig, ActuatorError> {
        Ok(self.config.lock().map_err(|_| poisoned())?.clone())
    }

    fn post_config(&self, _endpoint: &HaproxyEndpoint, config: &HaproxyConfig) -> Result<(), ActuatorError> {
        *self.config.lock().map_err(|_| poisoned())? = config.clone();
        *self.posts.lock().map_err(|_| poisoned())? += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cilium_schema::ContainerState;

    #[test]
    fn docker_hides_then_reveals() {
        let docker = MockDocker::new();
        docker.add_container(ContainerInfo {
            id: "abc".to_owned(),
            ..Default::default()
        });
        docker.hide_for("abc", 2);
        assert!(docker.inspect_container("abc").unwrap().is_none());
        assert!(docker.inspect_container("abc").unwrap().is_none());
        assert!(docker.inspect_container("abc").unwrap().is_some());
        assert_eq!(docker.inspect_calls(), 3);
    }

    #[test]
    fn docker_lists_running_only_unless_all() {
        let docker = MockDocker::new();
        docker.add_container(ContainerInfo {
            id: "a".to_owned(),
            state: ContainerState {
                running: true,
                pid: 1,
            },
            ..Default::default()
        });
        docker.add_container(ContainerInfo {
            id: "b".to_owned(),
            ..Default::default()
        });
        assert_eq!(docker.list_containers(false).unwrap().len(), 1);
        assert_eq!(docker.list_containers(true).unwrap().len(), 2);
    }

    #[test]
    fn kubernetes_queue_repeats_last() {
        let k8s = MockKubernetes::new();
        k8s.queue(PodList::default());
        k8s.queue(PodList {
            items: vec![Default::default()],
        });
        assert!(k8s.list_pods("default", "a=b").unwrap().items.is_empty());
        assert_eq!(k8s.list_pods("default", "a=b").unwrap().items.len(), 1);
        assert_eq!(k8s.list_pods("default", "a=b").unwrap().items.len(), 1);
        assert_eq!(k8s.selectors().len(), 3);
    }
}
