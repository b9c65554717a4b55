use crate::ActuatorError;

pub const DEFAULT_PIPEWORK: &str = "/bin/pipework";
pub const DEFAULT_DOCKER_HOST: &str = "tcp://127.0.0.1:2375";
pub const DEFAULT_KUBERNETES_MASTER: &str = "http://127.0.0.1:8080";

/// Per-node settings read once from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEnv {
    pub host_ip: String,
    pub hostname: String,
    pub pipework: String,
    pub add_endpoint: String,
    pub remove_endpoint: String,
    pub docker_host: String,
    pub kubernetes_master: String,
}

impl Default for NodeEnv {
    fn default() -> Self {
        Self {
            host_ip: String::new(),
            hostname: String::new(),
            pipework: DEFAULT_PIPEWORK.to_owned(),
            add_endpoint: String::new(),
            remove_endpoint: String::new(),
            docker_host: DEFAULT_DOCKER_HOST.to_owned(),
            kubernetes_master: DEFAULT_KUBERNETES_MASTER.to_owned(),
        }
    }
}

impl NodeEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            host_ip: get("HOST_IP").unwrap_or(defaults.host_ip),
            hostname: get("HOSTNAME").unwrap_or(defaults.hostname),
            pipework: get("PIPEWORK").unwrap_or(defaults.pipework),
            add_endpoint: get("ADD_ENDPOINT").unwrap_or(defaults.add_endpoint),
            remove_endpoint: get("REMOVE_ENDPOINT").unwrap_or(defaults.remove_endpoint),
            docker_host: get("DOCKER_HOST").unwrap_or(defaults.docker_host),
            kubernetes_master: get("KUBERNETES_MASTER").unwrap_or(defaults.kubernetes_master),
        }
    }

    /// Host and port of the Docker daemon. A missing or unparsable port
    /// falls back to 80.
    pub fn docker_endpoint(&self) -> Result<(String, u16), ActuatorError> {
        let rest = self
            .docker_host
            .strip_prefix("tcp://")
            .or_else(|| self.docker_host.strip_prefix("http://"))
            .ok_or_else(|| ActuatorError::UnsupportedEndpoint(self.docker_host.clone()))?;
        let rest = rest.trim_end_matches('/');
        match rest.rsplit_once(':') {
            Some((host, port)) => Ok((host.to_owned(), port.parse().unwrap_or(80))),
            None => Ok((rest.to_owned(), 80)),
        }
    }

    pub fn docker_base_url(&self) -> Result<String, ActuatorError> {
        let (host, port) = self.docker_endpoint()?;
        Ok(format!("http://{host}:{port}"))
    }

    /// Whether an event origin names this node.
    pub fn is_local_origin(&self, from: &str) -> bool {
        from == "self" || from == format!("node:{}", self.hostname)
    }
}
