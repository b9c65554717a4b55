//! Cross-node endpoint scripts run from the Docker event handlers.

use crate::env::NodeEnv;
use crate::exec::CommandRunner;
use crate::retry::RetryPolicy;
use crate::ActuatorError;
use cilium_schema::Endpoint;
use cilium_store::Db;
use tracing::debug;

fn wait_for_endpoint(db: &dyn Db, retry: &RetryPolicy, container: &str) -> Option<Endpoint> {
    retry.run(|attempt| {
        debug!("attempt {attempt} for container {container}");
        match db.get_endpoint(container) {
            Ok(ep) if !ep.container.is_empty() => Some(ep),
            Ok(_) => None,
            Err(e) => {
                debug!("could not read endpoint of {container}: {e}");
                None
            }
        }
    })
}

/// Wire up the local side of a container running on another node.
///
/// Waits for the owning node to publish the endpoint record; endpoints of
/// this node need nothing.
pub fn add_endpoint(
    db: &dyn Db,
    runner: &dyn CommandRunner,
    env: &NodeEnv,
    retry: &RetryPolicy,
    container: &str,
) -> Result<(), ActuatorError> {
    debug!("adding remote endpoint {container}, local node {}", env.host_ip);
    let endpoint = wait_for_endpoint(db, retry, container)
        .ok_or_else(|| ActuatorError::RemoteEndpointNotFound(container.to_owned()))?;
    debug!("found endpoint {endpoint:?}");

    if endpoint.node == env.host_ip {
        return Ok(());
    }
    if env.add_endpoint.is_empty() {
        debug!("ADD_ENDPOINT not set, skipping {container}");
        return Ok(());
    }
    for (ip, mac) in endpoint.ips.iter().zip(&endpoint.macs) {
        runner.run(&format!(
            "{} {} {} {} {} {ip} {mac} {container}",
            env.add_endpoint, endpoint.node, endpoint.group, endpoint.bd, endpoint.namespace
        ))?;
    }
    Ok(())
}

/// Remove a local container's endpoint. When the record is known and owned
/// by this node its interface name is passed to the script as well.
pub fn remove_local_endpoint(
    db: &dyn Db,
    runner: &dyn CommandRunner,
    env: &NodeEnv,
    retry: &RetryPolicy,
    container: &str,
) -> Result<(), ActuatorError> {
    if env.remove_endpoint.is_empty() {
        debug!("REMOVE_ENDPOINT not set, skipping {container}");
        return Ok(());
    }
    let mut cmd = format!("{} {container}", env.remove_endpoint);
    if let Some(endpoint) = wait_for_endpoint(db, retry, container) {
        if endpoint.node == env.host_ip {
            cmd.push(' ');
            cmd.push_str(&endpoint.interface);
        }
    }
    runner.run(&cmd)?;
    Ok(())
}

pub fn remove_endpoint(
    runner: &dyn CommandRunner,
    env: &NodeEnv,
    container: &str,
) -> Result<(), ActuatorError> {
    if env.remove_endpoint.is_empty() {
        return Ok(());
    }
    runner.run(&format!("{} {container}", env.remove_endpoint))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use cilium_store::MemoryStore;
    use std::time::Duration;

    fn env() -> NodeEnv {
        NodeEnv {
            host_ip: "192.168.1.1".to_owned(),
            add_endpoint: "/add.sh".to_owned(),
            remove_endpoint: "/rm.sh".to_owned(),
            ..Default::default()
        }
    }

    fn endpoint(node: &str) -> Endpoint {
        Endpoint {
            container: "abc".to_owned(),
            ips: vec!["10.0.0.2".to_owned()],
            macs: vec!["02:00:00:00:00:02".to_owned()],
            node: node.to_owned(),
            interface: "eth1".to_owned(),
            group: 1,
            bd: 2,
            namespace: 3,
            ..Default::default()
        }
    }

    const QUICK: RetryPolicy = RetryPolicy::fixed(3, Duration::ZERO);

    #[test]
    fn remote_endpoint_runs_add_script() {
        let db = MemoryStore::new();
        db.put_endpoint(&endpoint("192.168.1.2")).unwrap();
        let runner = MockRunner::new();
        add_endpoint(&db, &runner, &env(), &QUICK, "abc").unwrap();
        assert_eq!(
            runner.commands(),
            vec!["/add.sh 192.168.1.2 1 2 3 10.0.0.2 02:00:00:00:00:02 abc"]
        );
    }

    #[test]
    fn local_endpoint_needs_nothing() {
        let db = MemoryStore::new();
        db.put_endpoint(&endpoint("192.168.1.1")).unwrap();
        let runner = MockRunner::new();
        add_endpoint(&db, &runner, &env(), &QUICK, "abc").unwrap();
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn missing_endpoint_gives_up() {
        let db = MemoryStore::new();
        let err = add_endpoint(&db, &MockRunner::new(), &env(), &QUICK, "abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Remote endpoint not found for container: 'abc'"
        );
    }

    #[test]
    fn remove_local_passes_interface() {
        let db = MemoryStore::new();
        db.put_endpoint(&endpoint("192.168.1.1")).unwrap();
        let runner = MockRunner::new();
        remove_local_endpoint(&db, &runner, &env(), &QUICK, "abc").unwrap();
        assert_eq!(runner.commands(), vec!["/rm.sh abc eth1"]);
    }

    #[test]
    fn remove_unknown_runs_bare_script() {
        let db = MemoryStore::new();
        let runner = MockRunner::new();
        remove_local_endpoint(&db, &runner, &env(), &QUICK, "abc").unwrap();
        remove_endpoint(&runner, &env(), "abc").unwrap();
        assert_eq!(runner.commands(), vec!["/rm.sh abc", "/rm.sh abc"]);
    }
}
