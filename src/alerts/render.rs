//! Message rendering
//!
//! Turns an [`AlertState`] into one message body per group. Bodies are
//! size-bounded: groups stop taking alerts once the soft limit is reached,
//! and every body is clamped to the hard limit the notifiers enforce.

use std::collections::BTreeMap;

use super::config::RenderConfig;
use super::model::{Alert, AlertState};

/// Appended to bodies that were cut short
pub const ELLIPSIS: &str = "...";

/// Key of the message sent for errors and for an empty alert set
pub const STATUS_KEY: &str = "";

/// Human-readable text for one alert.
///
/// Summary and description annotations win; otherwise all annotations;
/// otherwise the identity labels.
pub fn alert_text(alert: &Alert) -> String {
    let mut rows: Vec<String> = Vec::with_capacity(2);

    if let Some(summary) = alert.annotations.get("summary").filter(|s| !s.is_empty()) {
        rows.push(format!("• *{}*", summary));
    }
    if let Some(description) = alert
        .annotations
        .get("description")
        .filter(|s| !s.is_empty())
    {
        rows.push(description.to_string());
    }

    if !rows.is_empty() {
        return rows.join("\n");
    }
    if !alert.annotations.is_empty() {
        return alert.annotations.canonical_string();
    }
    alert.labels.canonical_string()
}

/// Join alert texts, newline separated, until `soft_limit` is reached.
///
/// The limit is checked before each alert is added, so the last accepted
/// alert may overshoot it. A result at or above the limit gets [`ELLIPSIS`].
pub fn render_group(alerts: &[&Alert], soft_limit: usize) -> String {
    let mut size = 0;
    let mut rows = Vec::new();

    for alert in alerts {
        if size >= soft_limit {
            break;
        }
        let text = alert_text(alert);
        size += text.len() + 2;
        rows.push(text);
    }

    let mut body = rows.join("\n");
    if !body.is_empty() && body.len() >= soft_limit {
        body.push_str(ELLIPSIS);
    }
    body
}

/// Cut `body` so that it fits in `hard_limit` bytes, ellipsis included.
///
/// A limit too small to hold [`ELLIPSIS`] truncates without the marker.
pub fn clamp_body(mut body: String, hard_limit: usize) -> String {
    if body.len() <= hard_limit {
        return body;
    }
    let marker = if hard_limit >= ELLIPSIS.len() { ELLIPSIS } else { "" };
    let mut cut = hard_limit - marker.len();
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str(marker);
    body
}

/// All messages for one state, keyed by group.
///
/// An error short-circuits to a single status message; an empty grouping
/// yields a single "NO ALERTS" status message.
pub fn build_messages(state: &AlertState, config: &RenderConfig) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    if state.has_error() {
        out.insert(
            STATUS_KEY.to_string(),
            clamp_body(format!("ERROR: {}", state.error), config.hard_limit),
        );
        return out;
    }

    for (key, group) in state.group_by(&config.group_by) {
        let body = render_group(&group, config.soft_limit);
        out.insert(key, clamp_body(body, config.hard_limit));
    }

    if out.is_empty() {
        out.insert(STATUS_KEY.to_string(), "NO ALERTS".to_string());
    }
    out
}
