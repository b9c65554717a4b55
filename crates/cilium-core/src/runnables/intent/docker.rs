use super::network;
use crate::context::NodeContext;
use crate::CoreError;
use cilium_policy::Intent;
use cilium_schema::{lookup_service_name, DockerCreateConfig, Labels};
use tracing::{debug, info, warn};

const PUBLIC_IP_KEYWORD: &str = "$public-ip";

pub(super) fn pre_daemon_create(ctx: &NodeContext, intent: &Intent, config: &mut DockerCreateConfig) {
    if config.labels().is_empty() || intent.add_arguments().is_empty() {
        return;
    }
    let cmd: Vec<String> = intent
        .add_arguments()
        .iter()
        .map(|arg| arg.replace(PUBLIC_IP_KEYWORD, &ctx.env.host_ip))
        .collect();
    debug!("container {} command replaced with {cmd:?}", config.name);
    config.config.cmd = Some(cmd);
}

pub(super) fn pre_swarm_create(
    ctx: &NodeContext,
    intent: &Intent,
    config: &mut DockerCreateConfig,
) -> Result<(), CoreError> {
    let labels = config.labels();
    if labels.is_empty() {
        return Ok(());
    }
    check_max_scale(ctx, intent, &labels)?;

    let hostname = intent.hostname_from_labels(&labels);
    if !hostname.is_empty() {
        info!("new hostname {hostname} for container {}", config.name);
        config.config.hostname = Some(hostname);
    }

    if intent.remove_docker_links() {
        if let Some(host_config) = config.host_config.as_mut() {
            let links = host_config.links.take().unwrap_or_default();
            ctx.db.put_docker_links_temp(&config.name, &links)?;
            info!("removed docker links of container {}", config.name);
        }
    }
    if intent.remove_port_bindings() {
        if let Some(host_config) = config.host_config.as_mut() {
            let bindings = host_config.port_bindings.take().unwrap_or_default();
            ctx.db.put_port_bindings_temp(&config.name, &bindings)?;
            info!("removed port bindings of container {}", config.name);
        }
    }
    Ok(())
}

/// Fails once as many containers of the same service as `max-scale` allows
/// already exist, stopped ones included.
fn check_max_scale(ctx: &NodeContext, intent: &Intent, labels: &Labels) -> Result<(), CoreError> {
    let service = lookup_service_name(labels);
    if service.is_empty() {
        return Ok(());
    }
    let mut instances = 0;
    for container in ctx.docker.list_containers(true)? {
        let Some(info) = ctx.docker.inspect_container(&container.id)? else {
            continue;
        };
        if lookup_service_name(&info.labels()) != service {
            continue;
        }
        instances += 1;
        if instances >= intent.max_scale() {
            let labels = serde_json::to_string(labels)?;
            warn!("reached maximum scalability for containers with labels: {labels}");
            return Err(CoreError::MaxScaleReached(labels));
        }
    }
    Ok(())
}

pub(super) fn post_daemon_start(
    ctx: &NodeContext,
    intent: &Intent,
    config: &mut DockerCreateConfig,
) -> Result<(), CoreError> {
    let labels = config.labels();
    if labels.is_empty() {
        return Ok(());
    }
    network::configure_network(ctx, intent, config, &labels)?;
    network::save_service_records(ctx, &labels)?;
    info!("container successfully configured: {}", config.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use cilium_schema::{ContainerInfo, ContainerState, PortBinding, SERVICE_LABEL};
    use cilium_store::Db;

    fn running(id: &str, service: &str) -> ContainerInfo {
        let mut info = ContainerInfo {
            id: id.to_owned(),
            name: format!("/{id}"),
            state: ContainerState {
                running: true,
                pid: 100,
            },
            ..ContainerInfo::default()
        };
        info.config.labels = Some(Labels::from([(SERVICE_LABEL.to_owned(), service.to_owned())]));
        info
    }

    #[test]
    fn max_scale_counts_same_service() {
        let (ctx, mocks) = test_context();
        mocks.docker.add_container(running("a", "web"));
        mocks.docker.add_container(running("b", "db"));
        let intent = Intent {
            max_scale: Some(2),
            ..Intent::with_defaults()
        };
        let body = r#"{"Labels":{"com.intent.service":"web"}}"#;

        let mut create = DockerCreateConfig::from_body(body).unwrap();
        pre_swarm_create(&ctx, &intent, &mut create).unwrap();

        mocks.docker.add_container(running("c", "web"));
        let mut create = DockerCreateConfig::from_body(body).unwrap();
        let err = pre_swarm_create(&ctx, &intent, &mut create).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Reached maximum scalability for containers with labels: {\"com.intent.service\":\"web\"}"
        );
    }

    #[test]
    fn max_scale_counts_stopped_containers() {
        let (ctx, mocks) = test_context();
        let mut stopped = running("a", "web");
        stopped.state.running = false;
        mocks.docker.add_container(stopped);
        let intent = Intent {
            max_scale: Some(1),
            ..Intent::with_defaults()
        };
        let mut create =
            DockerCreateConfig::from_body(r#"{"Labels":{"com.intent.service":"web"}}"#).unwrap();
        let err = pre_swarm_create(&ctx, &intent, &mut create).unwrap_err();
        assert!(matches!(err, CoreError::MaxScaleReached(_)));
    }

    #[test]
    fn hostname_and_stashes() {
        let (ctx, mocks) = test_context();
        let intent = Intent {
            hostname_is: cilium_policy::intent::HostnameIs {
                value_of_label: Some("^app$".to_owned()),
            },
            max_scale: Some(10),
            remove_docker_links: Some(true),
            remove_port_bindings: Some(true),
            ..Intent::with_defaults()
        };
        let mut create = DockerCreateConfig::from_body(
            r#"{"Hostname":"old","Labels":{"app":"web"},
                "HostConfig":{"Links":["db:database"],"PortBindings":{"80/tcp":[{"HostPort":"8080"}]}}}"#,
        )
        .unwrap();
        create.name = "/web1".to_owned();
        pre_swarm_create(&ctx, &intent, &mut create).unwrap();

        assert_eq!(create.config.hostname.as_deref(), Some("web"));
        let host_config = create.host_config.unwrap();
        assert!(host_config.links.is_none());
        assert!(host_config.port_bindings.is_none());
        assert_eq!(
            mocks.db.get_docker_links_temp("/web1").unwrap(),
            vec!["db:database".to_owned()]
        );
        assert_eq!(
            mocks.db.get_port_bindings_temp("/web1").unwrap()["80/tcp"],
            vec![PortBinding::on_port("8080")]
        );
    }

    #[test]
    fn unlabelled_container_is_untouched() {
        let (ctx, _) = test_context();
        let intent = Intent {
            add_arguments: Some(vec!["-x".to_owned()]),
            ..Intent::with_defaults()
        };
        let mut create = DockerCreateConfig::from_body(r#"{"Cmd":["run"]}"#).unwrap();
        pre_daemon_create(&ctx, &intent, &mut create);
        assert_eq!(create.config.cmd, Some(vec!["run".to_owned()]));
    }
}
