//! Entities returned by the API.
//!
//! Fields the API may omit are `Option` or `#[serde(default)]`; unknown
//! fields are ignored.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workplace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub billing_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub initial_fetch_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub initial_fetch_at: Option<String>,
    #[serde(default)]
    pub last_fetch_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

/// Entry in a config's change history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLog {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub rollback: bool,
    #[serde(default)]
    pub user: LogUser,
}

/// Workplace-wide audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub enclave_project: Option<String>,
    #[serde(default)]
    pub enclave_environment: Option<String>,
    #[serde(default)]
    pub enclave_config: Option<String>,
    #[serde(default)]
    pub user: LogUser,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceToken {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    /// Only present in the response to a create call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkplaceRef {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

/// Identity behind the current token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub token_type: String,
    #[serde(default)]
    pub token_preview: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    #[serde(default)]
    pub workplace: WorkplaceRef,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Masked,
    Unmasked,
    Restricted,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Masked => "masked",
            Visibility::Unmasked => "unmasked",
            Visibility::Restricted => "restricted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueType {
    #[serde(rename = "type")]
    pub kind: String,
}

/// A secret as returned by the list endpoint.
///
/// A restricted visibility means the matching value is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComputedSecret {
    pub name: String,
    pub raw: Option<String>,
    pub computed: Option<String>,
    pub raw_visibility: Visibility,
    pub computed_visibility: Visibility,
    pub raw_value_type: Option<ValueType>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSecret {
    #[serde(default)]
    raw: Option<String>,
    #[serde(default)]
    computed: Option<String>,
    #[serde(default)]
    raw_visibility: Visibility,
    #[serde(default)]
    computed_visibility: Visibility,
    #[serde(default)]
    raw_value_type: Option<ValueType>,
    #[serde(default)]
    note: Option<String>,
}

impl WireSecret {
    pub(crate) fn into_secret(self, name: String) -> ComputedSecret {
        let raw = match self.raw_visibility {
            Visibility::Restricted => None,
            _ => self.raw,
        };
        let computed = match self.computed_visibility {
            Visibility::Restricted => None,
            _ => self.computed,
        };
        ComputedSecret {
            name,
            raw,
            computed,
            raw_visibility: self.raw_visibility,
            computed_visibility: self.computed_visibility,
            raw_value_type: self.raw_value_type,
            note: self.note,
        }
    }
}

pub type SecretsMap = BTreeMap<String, ComputedSecret>;

/// PATCH-style mutation of one secret.
///
/// The `original_*` fields let the server reject concurrent edits and tell
/// a deletion apart from a create with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_promote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_converge: Option<bool>,
}

impl ChangeRequest {
    pub fn create(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn update(
        name: impl Into<String>,
        original_value: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            original_name: Some(name.clone()),
            name,
            original_value: Some(original_value.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            original_name: Some(name.clone()),
            name,
            should_delete: Some(true),
            ..Self::default()
        }
    }
}

/// Values submitted by `secrets set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretsUpdate {
    Values(BTreeMap<String, String>),
    ChangeRequests(Vec<ChangeRequest>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretNote {
    pub secret: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    pub fn current() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            hostname,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthCode {
    pub code: String,
    pub polling_code: String,
    pub auth_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthToken {
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dashboard_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OidcToken {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}
