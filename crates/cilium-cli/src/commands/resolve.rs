use super::{json_pretty, open_store, EXIT_SUCCESS};
use cilium_policy::{
    filter_policies_by_kubernetes_kind, resolve, DockerConfig, FoldMode, IntentConfig,
    KubernetesConfig,
};
use cilium_schema::Labels;

/// Parses one `KEY=VALUE` label argument. Used as a clap value parser, so a
/// malformed label is a usage error.
pub fn parse_label(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("invalid label '{raw}', expected KEY=VALUE"))
}

pub fn run(
    store: &str,
    labels: &Labels,
    kind: Option<&str>,
    fold_mode: FoldMode,
    user_policies: bool,
) -> Result<u8, String> {
    let db = open_store(store)?;
    let users = db.get_users().map_err(|e| format!("store error: {e}"))?;
    let covering = db
        .get_policies_that_covers(labels)
        .map_err(|e| format!("store error: {e}"))?;

    if user_policies {
        println!("{}", json_pretty(&covering)?);
        return Ok(EXIT_SUCCESS);
    }

    let docker: DockerConfig = resolve(&users, &covering, fold_mode).map_err(|e| e.to_string())?;
    let intent: IntentConfig = resolve(&users, &covering, fold_mode).map_err(|e| e.to_string())?;
    let kubernetes_sources = match kind {
        Some(kind) => filter_policies_by_kubernetes_kind(&covering, kind),
        None => covering,
    };
    let kubernetes: KubernetesConfig =
        resolve(&users, &kubernetes_sources, fold_mode).map_err(|e| e.to_string())?;

    let payload = serde_json::json!({
        "docker-config": docker,
        "intent-config": intent,
        "kubernetes-config": kubernetes,
    });
    println!("{}", json_pretty(&payload)?);
    Ok(EXIT_SUCCESS)
}
