//! Service endpoint records written when a DNS or load-balancer container
//! comes up, and read back by the clients that talk to them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsEndpoint {
    pub ip: String,
    #[serde(default = "default_dns_port")]
    pub port: String,
}

fn default_dns_port() -> String {
    "80".to_owned()
}

impl DnsEndpoint {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: default_dns_port(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaproxyEndpoint {
    #[serde(default = "default_haproxy_ip")]
    pub ip: String,
    #[serde(default = "default_haproxy_port")]
    pub port: String,
}

fn default_haproxy_ip() -> String {
    "127.0.0.1".to_owned()
}

fn default_haproxy_port() -> String {
    "10001".to_owned()
}

impl Default for HaproxyEndpoint {
    fn default() -> Self {
        Self {
            ip: default_haproxy_ip(),
            port: default_haproxy_port(),
        }
    }
}

impl HaproxyEndpoint {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: default_haproxy_port(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_port_defaults_to_80() {
        let dns: DnsEndpoint = serde_json::from_str(r#"{"ip":"10.0.0.2"}"#).unwrap();
        assert_eq!(dns.base_url(), "http://10.0.0.2:80");
    }

    #[test]
    fn haproxy_defaults_to_loopback() {
        assert_eq!(HaproxyEndpoint::default().base_url(), "http://127.0.0.1:10001");
    }
}
