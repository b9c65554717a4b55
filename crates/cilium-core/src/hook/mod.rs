//! PowerStrip hook dispatch.
//!
//! Every request is classified against the handler table, then the matching
//! flow runs: container and Kubernetes object requests load the policies
//! covering their labels and pass through every resolved runnable, while
//! translation requests go through the translators only. Storage errors,
//! missing labels and uncovered requests fall through to an unmodified
//! response; failures inside a runnable are returned to the caller.

mod posthook;
mod prehook;

use crate::context::NodeContext;
use crate::handlers::{HandlerTable, RequestTag};
use crate::runnable::{Runnable, RunnableRegistry};
use crate::CoreError;
use cilium_policy::PolicySource;
use cilium_schema::{HookType, Labels, PostHookResponse, PowerstripRequest, PreHookResponse, User};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HookResponse {
    Pre(PreHookResponse),
    Post(PostHookResponse),
}

pub struct Dispatcher {
    ctx: NodeContext,
    registry: RunnableRegistry,
    handlers: HandlerTable,
}

impl Dispatcher {
    pub fn new(ctx: NodeContext, registry: RunnableRegistry) -> Result<Self, CoreError> {
        let handlers = HandlerTable::build(&registry)?;
        info!(
            "dispatcher ready with {} pre-hook and {} post-hook handlers",
            handlers.len(HookType::PreHook),
            handlers.len(HookType::PostHook)
        );
        Ok(Self {
            ctx,
            registry,
            handlers,
        })
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn registry(&self) -> &RunnableRegistry {
        &self.registry
    }

    /// Handle one envelope received on `base_addr`, the adapter route it was
    /// posted to.
    pub fn process(
        &self,
        base_addr: &str,
        request: &PowerstripRequest,
    ) -> Result<HookResponse, CoreError> {
        let hook = request.hook()?;
        let tag = self
            .handlers
            .classify(hook, base_addr, &request.client_request.request);
        info!(
            "{hook} {} {} ({tag})",
            request.client_request.method, request.client_request.request
        );
        match hook {
            HookType::PreHook => prehook::handle(self, tag, request).map(HookResponse::Pre),
            HookType::PostHook => posthook::handle(self, tag, request).map(HookResponse::Post),
        }
    }

    /// Users and covering policies for `labels`, or `None` when the request
    /// should pass through untouched.
    fn load_policies(&self, labels: &Labels) -> Option<(Vec<User>, Vec<PolicySource>)> {
        if labels.is_empty() {
            debug!("no labels, passing through");
            return None;
        }
        let users = match self.ctx.db.get_users() {
            Ok(users) => users,
            Err(e) => {
                warn!("failed to load users, passing through: {e}");
                return None;
            }
        };
        let policies = match self.ctx.db.get_policies_that_covers(labels) {
            Ok(policies) => policies,
            Err(e) => {
                warn!("failed to load policies, passing through: {e}");
                return None;
            }
        };
        if policies.iter().all(|s| s.policies.is_empty()) {
            debug!("no policies cover {labels:?}");
            return None;
        }
        Some((users, policies))
    }

    fn resolve(&self, users: &[User], policies: &[PolicySource]) -> Result<Vec<Runnable>, CoreError> {
        self.registry
            .resolve_all(users, policies, self.ctx.fold_mode)
    }

    /// Run every translator over a copy of `request`.
    fn translate(
        &self,
        hook: HookType,
        tag: RequestTag,
        request: &PowerstripRequest,
    ) -> Result<PowerstripRequest, CoreError> {
        let mut exchange = request.clone();
        for runnable in self.registry.translators() {
            if let Some(translator) = runnable.translator() {
                translator.translate(&self.ctx, hook, tag, &mut exchange)?;
            }
        }
        Ok(exchange)
    }
}
