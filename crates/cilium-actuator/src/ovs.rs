use crate::exec::CommandRunner;
use tracing::error;

/// Flow rules letting `origin` and every destination reach each other.
pub fn create_ovs_rules(origin: &str, destinations: &[String]) -> Vec<String> {
    destinations
        .iter()
        .flat_map(|dest| {
            [
                format!("priority=100,ip,nw_src={origin},nw_dst={dest},actions=NORMAL"),
                format!("priority=100,ip,nw_src={dest},nw_dst={origin},actions=NORMAL"),
            ]
        })
        .collect()
}

/// Push `rules` onto `bridge`. Failures are logged per rule and do not stop
/// the remaining rules. Returns how many rules were applied.
pub fn force_ovs_rules(runner: &dyn CommandRunner, bridge: &str, rules: &[String]) -> usize {
    if bridge.is_empty() {
        return 0;
    }
    let mut applied = 0;
    for rule in rules {
        match runner.run(&format!("ovs-ofctl add-flow {bridge} {rule}")) {
            Ok(_) => applied += 1,
            Err(e) => error!("error while adding OVS rule '{rule}': {e}"),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;

    #[test]
    fn rules_are_bidirectional() {
        let rules = create_ovs_rules("10.0.0.2", &["10.0.0.3".to_owned()]);
        assert_eq!(
            rules,
            vec![
                "priority=100,ip,nw_src=10.0.0.2,nw_dst=10.0.0.3,actions=NORMAL",
                "priority=100,ip,nw_src=10.0.0.3,nw_dst=10.0.0.2,actions=NORMAL",
            ]
        );
        assert!(create_ovs_rules("10.0.0.2", &[]).is_empty());
    }

    #[test]
    fn empty_bridge_pushes_nothing() {
        let runner = MockRunner::new();
        assert_eq!(force_ovs_rules(&runner, "", &["x".to_owned()]), 0);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn failing_rule_does_not_stop_others() {
        let runner = MockRunner::new().fail_on("bad");
        let applied = force_ovs_rules(&runner, "br0", &["bad".to_owned(), "good".to_owned()]);
        assert_eq!(applied, 1);
        assert_eq!(
            runner.commands(),
            vec!["ovs-ofctl add-flow br0 bad", "ovs-ofctl add-flow br0 good"]
        );
    }
}
