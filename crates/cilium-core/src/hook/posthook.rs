use super::Dispatcher;
use crate::handlers::{RequestTag, TagDomain};
use crate::CoreError;
use cilium_schema::{ClientRequest, HookType, PostHookResponse, PowerstripRequest, ServerResponse};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn container_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"/([[:xdigit:]]{64})").ok())
        .as_ref()
}

pub(super) fn handle(
    dispatcher: &Dispatcher,
    tag: RequestTag,
    request: &PowerstripRequest,
) -> Result<PostHookResponse, CoreError> {
    let response = match tag.domain() {
        TagDomain::Docker => {
            docker_post(dispatcher, tag, &request.client_request, &request.server_response)?;
            request.server_response.clone()
        }
        TagDomain::Translation => {
            dispatcher
                .translate(HookType::PostHook, tag, request)?
                .server_response
        }
        TagDomain::Kubernetes | TagDomain::Passthrough => request.server_response.clone(),
    };
    Ok(PostHookResponse::new(response))
}

/// Id of the container a request acts on: the 64 hex digit path segment, or
/// the `Id` of a create response.
fn container_id(tag: RequestTag, client: &ClientRequest, response: &ServerResponse) -> Option<String> {
    let from_path = container_id_pattern()
        .and_then(|re| re.captures(&client.request))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned());
    if from_path.is_some() || tag != RequestTag::DockerDaemonCreate {
        return from_path;
    }
    serde_json::from_str::<Value>(&response.body)
        .ok()?
        .get("Id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

fn docker_post(
    dispatcher: &Dispatcher,
    tag: RequestTag,
    client: &ClientRequest,
    response: &ServerResponse,
) -> Result<(), CoreError> {
    let Some(id) = container_id(tag, client, response) else {
        debug!("no container id in {}", client.request);
        return Ok(());
    };
    let ctx = dispatcher.context();
    let info = ctx.retries.inspect.run(|attempt| {
        debug!("inspecting {id}, attempt {attempt}");
        match ctx.docker.inspect_container(&id) {
            Ok(info) => info.map(Ok),
            Err(e) => Some(Err(e)),
        }
    });
    let info = match info {
        Some(Ok(info)) => info,
        Some(Err(e)) => {
            warn!("failed to inspect container {id}, passing through: {e}");
            return Ok(());
        }
        None => {
            warn!("container {id} not found, passing through");
            return Ok(());
        }
    };
    let mut config = info.into_create_config();
    let Some((users, policies)) = dispatcher.load_policies(&config.labels()) else {
        return Ok(());
    };
    for runnable in dispatcher.resolve(&users, &policies)? {
        if let Some(exec) = runnable.docker() {
            exec.docker_exec(ctx, HookType::PostHook, tag, &mut config)?;
        }
    }
    Ok(())
}
