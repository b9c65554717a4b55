use crate::ActuatorError;
use cilium_schema::DnsEndpoint;
use serde::Serialize;
use tracing::debug;

pub trait DnsApi: Send + Sync {
    /// Point every domain in `domains` at `ips`.
    fn register(&self, dns: &DnsEndpoint, domains: &[String], ips: &[String]) -> Result<(), ActuatorError>;
}

#[derive(Serialize)]
struct DomainIps<'a> {
    ips: &'a [String],
}

/// `PUT {base}/domain/{domain}` with `{"ips": [...]}` per domain.
pub struct HttpDns {
    agent: ureq::Agent,
}

impl Default for HttpDns {
    fn default() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl HttpDns {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DnsApi for HttpDns {
    fn register(&self, dns: &DnsEndpoint, domains: &[String], ips: &[String]) -> Result<(), ActuatorError> {
        let body = serde_json::to_vec(&DomainIps { ips })?;
        for domain in domains {
            let url = format!("{}/domain/{domain}", dns.base_url());
            debug!("PUT {url}");
            self.agent
                .put(&url)
                .header("Content-Type", "application/json")
                .send(&body[..])
                .map_err(|e| ActuatorError::Http(format!("{url}: {e}")))?;
        }
        Ok(())
    }
}
