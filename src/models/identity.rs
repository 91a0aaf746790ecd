use serde::{Deserialize, Serialize};

use super::Id;

/// Resolved caller identity, supplied by the (external) auth layer.
///
/// Every core call takes this explicitly; nothing reads roles from ambient
/// state. The core trusts it verbatim and does no credential verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityContext {
    /// Account reference, when the caller maps to a stored account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Id>,
    /// The caller's own tracking tag, if one is provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub is_admin: bool,
}

impl IdentityContext {
    /// An ordinary caller with a provisioned tag.
    pub fn user(tag: impl Into<String>) -> Self {
        Self {
            account: None,
            tag: Some(tag.into()),
            is_admin: false,
        }
    }

    /// An administrative caller without a tag of their own.
    pub fn admin() -> Self {
        Self {
            account: None,
            tag: None,
            is_admin: true,
        }
    }

    pub fn with_account(mut self, account: Id) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}
