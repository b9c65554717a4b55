//! Wire form of `Db` calls, served by the adapter's `POST /db` route and
//! issued by `HttpStore`.

use crate::{Db, StoreError};
use cilium_policy::PolicySource;
use cilium_schema::{DnsEndpoint, Endpoint, HaproxyEndpoint, Labels, PortBindings, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum DbRequest {
    GetUsers,
    PutUser { name: String },
    GetPolicies,
    GetPoliciesThatCovers { labels: Labels },
    PutPolicy { source: PolicySource },
    GetEndpoint { container: String },
    PutEndpoint { endpoint: Endpoint },
    DeleteEndpoint { container: String },
    PutIp { ip: String },
    DeleteIp { ip: String },
    GetDockerLinks {
        container: String,
        #[serde(default)]
        temp: bool,
    },
    PutDockerLinks {
        container: String,
        links: Vec<String>,
        #[serde(default)]
        temp: bool,
    },
    GetPortBindings {
        container: String,
        #[serde(default)]
        temp: bool,
    },
    PutPortBindings {
        container: String,
        bindings: PortBindings,
        #[serde(default)]
        temp: bool,
    },
    GetDnsConfig,
    PutDnsConfig { dns: DnsEndpoint },
    GetHaproxyConfig,
    PutHaproxyConfig { haproxy: HaproxyEndpoint },
    Clear,
    FlushConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "kebab-case")]
pub enum DbResponse {
    Done,
    Users(Vec<User>),
    User { id: u32, is_new: bool },
    Policies(Vec<PolicySource>),
    Endpoint(Endpoint),
    Links(Vec<String>),
    PortBindings(PortBindings),
    Dns(Option<DnsEndpoint>),
    Haproxy(HaproxyEndpoint),
    IpInUse(String),
    Error(String),
}

impl DbResponse {
    /// Map the two error forms back onto `StoreError`.
    pub fn into_result(self) -> Result<Self, StoreError> {
        match self {
            Self::IpInUse(ip) => Err(StoreError::IpInUse(ip)),
            Self::Error(msg) => Err(StoreError::Remote(msg)),
            other => Ok(other),
        }
    }
}

/// Execute `request` against `db`.
pub fn dispatch(db: &dyn Db, request: DbRequest) -> DbResponse {
    match run(db, request) {
        Ok(resp) => resp,
        Err(StoreError::IpInUse(ip)) => DbResponse::IpInUse(ip),
        Err(e) => DbResponse::Error(e.to_string()),
    }
}

fn run(db: &dyn Db, request: DbRequest) -> Result<DbResponse, StoreError> {
    use DbRequest as Q;
    use DbResponse as R;

    Ok(match request {
        Q::GetUsers => R::Users(db.get_users()?),
        Q::PutUser { name } => {
            let (id, is_new) = db.put_user(&name)?;
            R::User { id, is_new }
        }
        Q::GetPolicies => R::Policies(db.get_policies()?),
        Q::GetPoliciesThatCovers { labels } => R::Policies(db.get_policies_that_covers(&labels)?),
        Q::PutPolicy { source } => {
            db.put_policy(&source)?;
            R::Done
        }
        Q::GetEndpoint { container } => R::Endpoint(db.get_endpoint(&container)?),
        Q::PutEndpoint { endpoint } => {
            db.put_endpoint(&endpoint)?;
            R::Done
        }
        Q::DeleteEndpoint { container } => {
            db.delete_endpoint(&container)?;
            R::Done
        }
        Q::PutIp { ip } => {
            db.put_ip(&ip)?;
            R::Done
        }
        Q::DeleteIp { ip } => {
            db.delete_ip(&ip)?;
            R::Done
        }
        Q::GetDockerLinks { container, temp } => R::Links(if temp {
            db.get_docker_links_temp(&container)?
        } else {
            db.get_docker_links(&container)?
        }),
        Q::PutDockerLinks {
            container,
            links,
            temp,
        } => {
            if temp {
                db.put_docker_links_temp(&container, &links)?;
            } else {
                db.put_docker_links(&container, &links)?;
            }
            R::Done
        }
        Q::GetPortBindings { container, temp } => R::PortBindings(if temp {
            db.get_port_bindings_temp(&container)?
        } else {
            db.get_port_bindings(&container)?
        }),
        Q::PutPortBindings {
            container,
            bindings,
            temp,
        } => {
            if temp {
                db.put_port_bindings_temp(&container, &bindings)?;
            } else {
                db.put_port_bindings(&container, &bindings)?;
            }
            R::Done
        }
        Q::GetDnsConfig => R::Dns(db.get_dns_config()?),
        Q::PutDnsConfig { dns } => {
            db.put_dns_config(&dns)?;
            R::Done
        }
        Q::GetHaproxyConfig => R::Haproxy(db.get_haproxy_config()?),
        Q::PutHaproxyConfig { haproxy } => {
            db.put_haproxy_config(&haproxy)?;
            R::Done
        }
        Q::Clear => {
            db.clear()?;
            R::Done
        }
        Q::FlushConfig => {
            db.flush_config()?;
            R::Done
        }
    })
}
