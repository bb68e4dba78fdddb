//! Request and response types exchanged with the API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A server-assigned handle for an in-progress chunked upload.
///
/// Created from the initiate response and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// Session identifier.
    pub id: Uuid,

    /// Total content size in bytes.
    pub file_size_bytes: u64,

    /// Size of every chunk except possibly the last.
    pub chunk_size: u64,

    /// Media type detected by the API, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl UploadSession {
    /// Returns the number of chunks the content will be split into.
    pub fn chunk_count(&self) -> u64 {
        if self.chunk_size == 0 {
            return 0;
        }
        self.file_size_bytes.div_ceil(self.chunk_size)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitiateUploadRequest {
    pub file_size_bytes: u64,
}

/// Alert destinations notified when a scan produces results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Slack channel alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackAlert>,

    /// Email alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailAlert>,

    /// Webhook alert. Sent for file scans even when nothing was found.
    #[serde(rename = "url", skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookAlert>,
}

/// A Slack channel, formatted like `#general`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackAlert {
    /// Channel name.
    pub target: String,
}

/// An email recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAlert {
    /// Recipient address.
    pub address: String,
}

/// A URL accepting HTTP POST alert events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAlert {
    /// Webhook URL.
    pub address: String,
}

impl AlertConfig {
    /// Sends alerts to a Slack channel.
    pub fn with_slack(mut self, channel: impl Into<String>) -> Self {
        self.slack = Some(SlackAlert {
            target: channel.into(),
        });
        self
    }

    /// Sends alerts to an email address.
    pub fn with_email(mut self, address: impl Into<String>) -> Self {
        self.email = Some(EmailAlert {
            address: address.into(),
        });
        self
    }

    /// Sends alerts to a webhook URL.
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook = Some(WebhookAlert {
            address: url.into(),
        });
        self
    }
}

/// An inline policy describing how uploaded content is scanned.
///
/// Detection rules are passed through to the API untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPolicy {
    /// Deprecated: use [`alert_config`](Self::alert_config) instead.
    #[serde(rename = "webhookURL", skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Inline detection rule definitions.
    #[serde(default)]
    pub detection_rules: Vec<serde_json::Value>,

    /// Identifiers of existing detection rules.
    #[serde(rename = "detectionRuleUUIDs", default)]
    pub detection_rule_uuids: Vec<String>,

    /// Where results are delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_config: Option<AlertConfig>,
}

impl ScanPolicy {
    /// Adds an inline detection rule.
    pub fn with_detection_rule(mut self, rule: serde_json::Value) -> Self {
        self.detection_rules.push(rule);
        self
    }

    /// Adds an existing detection rule by identifier.
    pub fn with_detection_rule_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.detection_rule_uuids.push(uuid.into());
        self
    }

    /// Sets where results are delivered.
    pub fn with_alert_config(mut self, alert_config: AlertConfig) -> Self {
        self.alert_config = Some(alert_config);
        self
    }
}

/// A request to scan a file.
///
/// Exactly one of [`policy_uuid`](Self::policy_uuid) or
/// [`policy`](Self::policy) should be set. The content itself is passed
/// separately to [`NightfallClient::scan_file`](crate::NightfallClient::scan_file).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFileRequest {
    /// Identifier of a policy stored in the dashboard.
    #[serde(rename = "policyUUID")]
    pub policy_uuid: Option<String>,

    /// Inline policy.
    pub policy: Option<ScanPolicy>,

    /// Opaque metadata echoed back with the scan results.
    pub request_metadata: String,

    /// Total content size in bytes.
    #[serde(skip)]
    pub content_size_bytes: u64,

    /// Deadline for the whole upload-and-scan sequence.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl ScanFileRequest {
    /// Creates a request for content of the given size.
    pub fn new(content_size_bytes: u64) -> Self {
        Self {
            content_size_bytes,
            ..Self::default()
        }
    }

    /// Scans with a stored policy.
    pub fn with_policy_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.policy_uuid = Some(uuid.into());
        self
    }

    /// Scans with an inline policy.
    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the request metadata.
    pub fn with_request_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.request_metadata = metadata.into();
        self
    }

    /// Bounds the whole upload-and-scan sequence.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Returned when an asynchronous file scan was triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFileResponse {
    /// Identifier of the uploaded file.
    pub id: String,

    /// Status message from the API.
    pub message: String,
}

/// A request to scan inline text.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTextRequest {
    /// Strings to scan.
    pub payload: Vec<String>,

    /// Inline policy, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<serde_json::Value>,

    /// Identifiers of stored policies.
    #[serde(rename = "policyUUIDs", skip_serializing_if = "Vec::is_empty")]
    pub policy_uuids: Vec<String>,
}

impl ScanTextRequest {
    /// Creates a request for the given payload.
    pub fn new<I, S>(payload: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            payload: payload.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the inline policy.
    pub fn with_policy(mut self, policy: serde_json::Value) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Adds a stored policy.
    pub fn with_policy_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.policy_uuids.push(uuid.into());
        self
    }
}

/// Findings for a text scan.
///
/// `findings[i]` holds the findings for `payload[i]` of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTextResponse {
    /// Findings per payload entry.
    #[serde(default)]
    pub findings: Vec<Vec<serde_json::Value>>,

    /// Payload with findings redacted, if redaction was requested.
    #[serde(default)]
    pub redacted_payload: Vec<String>,
}

impl ScanTextResponse {
    /// Returns the total number of findings across all payload entries.
    pub fn finding_count(&self) -> usize {
        self.findings.iter().map(Vec::len).sum()
    }
}
