use crate::ActuatorError;
use cilium_store::{Db, StoreError};
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

fn next_ip(ip: IpAddr) -> Option<IpAddr> {
    match ip {
        IpAddr::V4(v4) => u32::from(v4).checked_add(1).map(|n| IpAddr::V4(Ipv4Addr::from(n))),
        IpAddr::V6(v6) => u128::from(v6).checked_add(1).map(|n| IpAddr::V6(Ipv6Addr::from(n))),
    }
}

/// Claim an address from `cidr`.
///
/// When `cidr` names the network itself the first free address after it is
/// claimed, retrying on `IpInUse` until the network is exhausted. A host
/// address is claimed as-is.
pub fn allocate_ip(db: &dyn Db, cidr: &str) -> Result<(IpAddr, IpNet), ActuatorError> {
    let net: IpNet = cidr
        .parse()
        .map_err(|_| ActuatorError::InvalidCidr(cidr.to_owned()))?;
    let requested = net.addr();

    if requested != net.network() {
        debug!("claiming unique IP {requested}");
        db.put_ip(&requested.to_string())?;
        return Ok((requested, net));
    }

    let mut candidate = next_ip(requested);
    while let Some(ip) = candidate.filter(|ip| net.contains(ip)) {
        match db.put_ip(&ip.to_string()) {
            Ok(()) => return Ok((ip, net)),
            Err(StoreError::IpInUse(_)) => {
                debug!("IP {ip} in use, trying the next one");
                candidate = next_ip(ip);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ActuatorError::IpExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cilium_store::MemoryStore;

    #[test]
    fn skips_network_address() {
        let db = MemoryStore::new();
        let (ip, net) = allocate_ip(&db, "10.0.0.0/24").unwrap();
        assert_eq!(ip.to_string(), "10.0.0.1");
        assert_eq!(net.prefix_len(), 24);
        let (ip, _) = allocate_ip(&db, "10.0.0.0/24").unwrap();
        assert_eq!(ip.to_string(), "10.0.0.2");
    }

    #[test]
    fn exhausts_small_network() {
        let db = MemoryStore::new();
        allocate_ip(&db, "10.0.0.0/30").unwrap();
        allocate_ip(&db, "10.0.0.0/30").unwrap();
        allocate_ip(&db, "10.0.0.0/30").unwrap();
        assert!(matches!(
            allocate_ip(&db, "10.0.0.0/30"),
            Err(ActuatorError::IpExhausted)
        ));
    }

    #[test]
    fn host_address_claimed_once() {
        let db = MemoryStore::new();
        let (ip, _) = allocate_ip(&db, "10.0.0.9/24").unwrap();
        assert_eq!(ip.to_string(), "10.0.0.9");
        assert!(matches!(
            allocate_ip(&db, "10.0.0.9/24"),
            Err(ActuatorError::Store(StoreError::IpInUse(_)))
        ));
    }

    #[test]
    fn ipv6_network() {
        let db = MemoryStore::new();
        let (ip, _) = allocate_ip(&db, "fd00::/64").unwrap();
        assert_eq!(ip.to_string(), "fd00::1");
    }

    #[test]
    fn invalid_cidr() {
        let db = MemoryStore::new();
        assert!(matches!(
            allocate_ip(&db, "not-a-cidr"),
            Err(ActuatorError::InvalidCidr(_))
        ));
    }
}
