//! Deep-link and intent dispatch
//!
//! Headless triggers for automation: `crashlab://action/<ACTION>` URLs and
//! `crash_action` intent extras both resolve to a catalog action. Unknown
//! identifiers are logged and otherwise ignored.

use crashlab_core::domain::MARKER_NAMESPACE;
use tracing::{info, warn};

use crate::catalog::{self, FaultAction, FaultArgs};
use crate::context::FaultContext;

/// URL scheme the harness registers.
pub const DEEP_LINK_SCHEME: &str = "crashlab";

/// Intent extra carrying the action identifier.
pub const INTENT_EXTRA: &str = "crash_action";

const ACTION_SEGMENT: &str = "action/";

/// Legacy identifiers and the catalog key they now mean
const ALIASES: &[(&str, &str)] = &[
    ("managed_exception", "managed_unhandled"),
    ("unobserved_task", "managed_unobserved_task"),
];

/// Extracts the identifier after `action/` (case-insensitive), dropping any
/// query, fragment, or `&` suffix.
pub fn parse_action_from_url(url: &str) -> Option<&str> {
    let start = url.to_ascii_lowercase().find(ACTION_SEGMENT)? + ACTION_SEGMENT.len();
    let rest = &url[start..];
    let end = rest.find(['?', '#', '&']).unwrap_or(rest.len());
    let action = rest[..end].trim_end_matches('/');
    (!action.is_empty()).then_some(action)
}

/// Maps an identifier (alias or key) to its catalog entry.
pub fn resolve(identifier: &str) -> Option<&'static FaultAction> {
    let id = identifier.trim();
    let key = ALIASES
        .iter()
        .find(|(alias, _)| *alias == id)
        .map_or(id, |(_, key)| *key);
    catalog::find(key)
}

/// Runs the action named by `identifier`. Returns `false` when it is unknown.
pub fn dispatch(ctx: &FaultContext, identifier: &str) -> bool {
    match resolve(identifier) {
        Some(action) => {
            action.invoke(ctx, &FaultArgs::default());
            true
        }
        None => {
            warn!("{MARKER_NAMESPACE}::ACTION::UNKNOWN::{identifier}");
            false
        }
    }
}

/// Handles a deep link. URLs without an action segment are ignored.
pub fn handle_deep_link(ctx: &FaultContext, url: &str) -> bool {
    info!("{MARKER_NAMESPACE}::DEEPLINK::{url}");
    match parse_action_from_url(url) {
        Some(action) => dispatch(ctx, action),
        None => {
            warn!("{MARKER_NAMESPACE}::ACTION::UNKNOWN::{url}");
            false
        }
    }
}

/// Handles a `crash_action` intent extra.
pub fn handle_intent(ctx: &FaultContext, crash_action: &str) -> bool {
    info!("{MARKER_NAMESPACE}::INTENT::{INTENT_EXTRA}={crash_action}");
    dispatch(ctx, crash_action)
}
