use crate::exec::CommandRunner;
use crate::ActuatorError;
use std::net::IpAddr;

/// Bridge used when the intent does not name one.
pub const DEFAULT_BRIDGE: &str = "lxc-br0";

/// Arguments of one pipework invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    pub bridge: String,
    pub pid: i64,
    pub container: String,
    pub ip: IpAddr,
    pub prefix_len: u8,
    pub gateway: String,
    pub group: u32,
    pub bd: u32,
    pub namespace: u32,
    pub mac: String,
    pub route: String,
}

impl BridgeRequest {
    /// `<pipework> --quiet <bridge> <pid> <id> <ip>/<len>[@<gw>] <group> <bd> <ns> <mac|auto> ['<route>']`
    pub fn command_line(&self, pipework: &str) -> String {
        let bridge = if self.bridge.is_empty() {
            DEFAULT_BRIDGE
        } else {
            &self.bridge
        };
        let mut cmd = format!(
            "{pipework} --quiet {bridge} {} {} {}/{}",
            self.pid, self.container, self.ip, self.prefix_len
        );
        if !self.gateway.is_empty() {
            cmd.push('@');
            cmd.push_str(&self.gateway);
        }
        cmd.push_str(&format!(" {} {} {}", self.group, self.bd, self.namespace));
        if self.mac.is_empty() {
            cmd.push_str(" auto");
        } else {
            cmd.push(' ');
            cmd.push_str(&self.mac);
        }
        if !self.route.is_empty() {
            cmd.push_str(&format!(" '{}'", self.route));
        }
        cmd
    }
}

/// Attach the container to the bridge. Returns the interface name inside the
/// container and its MAC address, as printed by the script.
pub fn create_bridge(
    runner: &dyn CommandRunner,
    pipework: &str,
    request: &BridgeRequest,
) -> Result<(String, String), ActuatorError> {
    let out = runner.run(&request.command_line(pipework))?;
    let mut fields = out.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(iface), Some(mac)) => Ok((iface.to_owned(), mac.to_owned())),
        _ => Err(ActuatorError::ScriptOutput(out.trim().to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;

    fn request() -> BridgeRequest {
        BridgeRequest {
            bridge: String::new(),
            pid: 1999,
            container: "b0e3c2a1".to_owned(),
            ip: "10.11.12.13".parse().unwrap(),
            prefix_len: 24,
            gateway: "199.231.41.15/24".to_owned(),
            group: 4,
            bd: 19,
            namespace: 20,
            mac: "00:01:02:03:04:05".to_owned(),
            route: "192.168.50.0/24 via 172.17.42.1".to_owned(),
        }
    }

    #[test]
    fn full_command_line() {
        assert_eq!(
            request().command_line("/bin/pipework"),
            "/bin/pipework --quiet lxc-br0 1999 b0e3c2a1 10.11.12.13/24@199.231.41.15/24 4 19 20 00:01:02:03:04:05 '192.168.50.0/24 via 172.17.42.1'"
        );
    }

    #[test]
    fn optional_fields_omitted() {
        let req = BridgeRequest {
            bridge: "br1".to_owned(),
            gateway: String::new(),
            mac: String::new(),
            route: String::new(),
            ..request()
        };
        assert_eq!(
            req.command_line("pw"),
            "pw --quiet br1 1999 b0e3c2a1 10.11.12.13/24 4 19 20 auto"
        );
    }

    #[test]
    fn parses_script_output() {
        let runner = MockRunner::new().respond("--quiet", "eth1 02:42:ac:11:00:02\n");
        let (iface, mac) = create_bridge(&runner, "/bin/pipework", &request()).unwrap();
        assert_eq!(iface, "eth1");
        assert_eq!(mac, "02:42:ac:11:00:02");
        assert_eq!(runner.commands().len(), 1);
    }

    #[test]
    fn short_output_is_error() {
        let runner = MockRunner::new().respond("--quiet", "eth1");
        assert!(matches!(
            create_bridge(&runner, "/bin/pipework", &request()),
            Err(ActuatorError::ScriptOutput(_))
        ));
    }
}
