use crate::rpc::{DbRequest, DbResponse};
use crate::{Db, StoreError};
use cilium_policy::PolicySource;
use cilium_schema::{DnsEndpoint, Endpoint, HaproxyEndpoint, Labels, PortBindings, User};
use std::io::Read;

/// Store client of another adapter's `POST /db` route.
///
/// Atomicity of `put_ip` is provided by the serving adapter's own backend.
pub struct HttpStore {
    url: String,
    agent: ureq::Agent,
}

impl HttpStore {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn call(&self, request: &DbRequest) -> Result<DbResponse, StoreError> {
        let url = format!("{}/db", self.url);
        let body = serde_json::to_vec(request)?;
        tracing::debug!("POST {url} ({} bytes)", body.len());
        let resp = match self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(&body[..])
        {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(StoreError::Remote(format!("HTTP {code} for {url}")));
            }
            Err(e) => return Err(StoreError::Remote(e.to_string())),
        };

        let mut reader = resp.into_body().into_reader();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let response: DbResponse = serde_json::from_slice(&bytes)?;
        response.into_result()
    }

    fn expect_done(&self, request: &DbRequest) -> Result<(), StoreError> {
        match self.call(request)? {
            DbResponse::Done => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    fn links(&self, container: &str, temp: bool) -> Result<Vec<String>, StoreError> {
        let request = DbRequest::GetDockerLinks {
            container: container.to_owned(),
            temp,
        };
        match self.call(&request)? {
            DbResponse::Links(links) => Ok(links),
            other => Err(unexpected(&other)),
        }
    }

    fn port_bindings(&self, container: &str, temp: bool) -> Result<PortBindings, StoreError> {
        let request = DbRequest::GetPortBindings {
            container: container.to_owned(),
            temp,
        };
        match self.call(&request)? {
            DbResponse::PortBindings(pb) => Ok(pb),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(resp: &DbResponse) -> StoreError {
    StoreError::Remote(format!("unexpected store response: {resp:?}"))
}

impl Db for HttpStore {
    fn get_users(&self) -> Result<Vec<User>, StoreError> {
        match self.call(&DbRequest::GetUsers)? {
            DbResponse::Users(users) => Ok(users),
            other => Err(unexpected(&other)),
        }
    }

    fn put_user(&self, name: &str) -> Result<(u32, bool), StoreError> {
        let request = DbRequest::PutUser {
            name: name.to_owned(),
        };
        match self.call(&request)? {
            DbResponse::User { id, is_new } => Ok((id, is_new)),
            other => Err(unexpected(&other)),
        }
    }

    fn get_policies(&self) -> Result<Vec<PolicySource>, StoreError> {
        match self.call(&DbRequest::GetPolicies)? {
            DbResponse::Policies(p) => Ok(p),
            other => Err(unexpected(&other)),
        }
    }

    fn get_policies_that_covers(&self, labels: &Labels) -> Result<Vec<PolicySource>, StoreError> {
        let request = DbRequest::GetPoliciesThatCovers {
            labels: labels.clone(),
        };
        match self.call(&request)? {
            DbResponse::Policies(p) => Ok(p),
            other => Err(unexpected(&other)),
        }
    }

    fn put_policy(&self, source: &PolicySource) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutPolicy {
            source: source.clone(),
        })
    }

    fn get_endpoint(&self, container: &str) -> Result<Endpoint, StoreError> {
        let request = DbRequest::GetEndpoint {
            container: container.to_owned(),
        };
        match self.call(&request)? {
            DbResponse::Endpoint(ep) => Ok(ep),
            other => Err(unexpected(&other)),
        }
    }

    fn put_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutEndpoint {
            endpoint: endpoint.clone(),
        })
    }

    fn delete_endpoint(&self, container: &str) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::DeleteEndpoint {
            container: container.to_owned(),
        })
    }

    fn put_ip(&self, ip: &str) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutIp { ip: ip.to_owned() })
    }

    fn delete_ip(&self, ip: &str) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::DeleteIp { ip: ip.to_owned() })
    }

    fn get_docker_links(&self, container: &str) -> Result<Vec<String>, StoreError> {
        self.links(container, false)
    }

    fn put_docker_links(&self, container: &str, links: &[String]) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutDockerLinks {
            container: container.to_owned(),
            links: links.to_vec(),
            temp: false,
        })
    }

    fn get_docker_links_temp(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.links(name, true)
    }

    fn put_docker_links_temp(&self, name: &str, links: &[String]) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutDockerLinks {
            container: name.to_owned(),
            links: links.to_vec(),
            temp: true,
        })
    }

    fn get_port_bindings(&self, container: &str) -> Result<PortBindings, StoreError> {
        self.port_bindings(container, false)
    }

    fn put_port_bindings(&self, container: &str, bindings: &PortBindings) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutPortBindings {
            container: container.to_owned(),
            bindings: bindings.clone(),
            temp: false,
        })
    }

    fn get_port_bindings_temp(&self, name: &str) -> Result<PortBindings, StoreError> {
        self.port_bindings(name, true)
    }

    fn put_port_bindings_temp(&self, name: &str, bindings: &PortBindings) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutPortBindings {
            container: name.to_owned(),
            bindings: bindings.clone(),
            temp: true,
        })
    }

    fn get_dns_config(&self) -> Result<Option<DnsEndpoint>, StoreError> {
        match self.call(&DbRequest::GetDnsConfig)? {
            DbResponse::Dns(dns) => Ok(dns),
            other => Err(unexpected(&other)),
        }
    }

    fn put_dns_config(&self, dns: &DnsEndpoint) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutDnsConfig { dns: dns.clone() })
    }

    fn get_haproxy_config(&self) -> Result<HaproxyEndpoint, StoreError> {
        match self.call(&DbRequest::GetHaproxyConfig)? {
            DbResponse::Haproxy(h) => Ok(h),
            other => Err(unexpected(&other)),
        }
    }

    fn put_haproxy_config(&self, haproxy: &HaproxyEndpoint) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::PutHaproxyConfig {
            haproxy: haproxy.clone(),
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::Clear)
    }

    fn flush_config(&self) -> Result<(), StoreError> {
        self.expect_done(&DbRequest::FlushConfig)
    }
}
