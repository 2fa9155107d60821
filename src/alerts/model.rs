//! Alerts and alert state snapshots

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::labels::{push_quoted, LabelSet};

/// One firing alert as reported by the alert source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identity labels; must minimally carry `alertname`
    #[serde(default)]
    pub labels: LabelSet,
    /// Free-text information that does not define identity
    #[serde(default)]
    pub annotations: LabelSet,
    /// Prometheus' own API calls this `activeAt`
    #[serde(default, alias = "activeAt", skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "generatorURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub generator_url: Option<String>,
}

impl Alert {
    /// Create an alert with the given identity labels
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    pub fn with_annotations(mut self, annotations: LabelSet) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_starts_at(mut self, starts_at: DateTime<Utc>) -> Self {
        self.starts_at = Some(starts_at);
        self
    }

    pub fn with_ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    pub fn with_generator_url(mut self, url: impl Into<String>) -> Self {
        self.generator_url = Some(url.into());
        self
    }

    /// Start time ascending, then label canonical string ascending.
    /// A missing start time sorts first.
    fn display_order(&self, other: &Alert) -> Ordering {
        self.starts_at.cmp(&other.starts_at).then_with(|| {
            self.labels
                .canonical_string()
                .cmp(&other.labels.canonical_string())
        })
    }
}

/// Identity string of an [`AlertState`], compared across polls
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of everything the alert source reported on one poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertState {
    pub alerts: Vec<Alert>,
    /// Fetch or payload error; empty when the poll succeeded
    pub error: String,
}

impl AlertState {
    pub fn from_alerts(alerts: Vec<Alert>) -> Self {
        Self {
            alerts,
            error: String::new(),
        }
    }

    /// State for a poll that produced no usable alert list
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            alerts: Vec::new(),
            error: error.into(),
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Alerts in display order. The sort is stable, so alerts comparing
    /// equal keep their fetch order.
    pub fn sorted_alerts(&self) -> Vec<&Alert> {
        let mut sorted: Vec<&Alert> = self.alerts.iter().collect();
        sorted.sort_by(|a, b| a.display_order(b));
        sorted
    }

    /// Quoted error text followed by every alert's labels, in sorted order
    pub fn fingerprint(&self) -> Fingerprint {
        let mut out = String::new();
        if self.has_error() {
            out.push_str("&error=");
            push_quoted(&mut out, &self.error);
        }
        for alert in self.sorted_alerts() {
            out.push('&');
            out.push_str(&alert.labels.canonical_string());
        }
        Fingerprint(out)
    }

    /// Partition sorted alerts by the value of `label_name`.
    ///
    /// Every pair named `label_name` contributes a group, so an alert with
    /// the label repeated lands in several groups. Alerts without the label
    /// are left out.
    pub fn group_by(&self, label_name: &str) -> BTreeMap<String, Vec<&Alert>> {
        let mut groups: BTreeMap<String, Vec<&Alert>> = BTreeMap::new();
        for alert in self.sorted_alerts() {
            for label in alert.labels.iter().filter(|l| l.name == label_name) {
                groups
                    .entry(group_key(&label.value).to_string())
                    .or_default()
                    .push(alert);
            }
        }
        groups
    }
}

/// `host-1:9090` groups as `host-1`
pub fn group_key(value: &str) -> &str {
    match value.split_once(':') {
        Some((head, _)) => head,
        None => value,
    }
}
