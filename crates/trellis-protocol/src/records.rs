use std::collections::BTreeMap;

use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use trellis_core::{PermissionsBitmask, PermissionsInfo, RoleCode, RolePermissionsBlob, ThreadId};

/// The `minimallyEncoded: true` tag carried by every compact record.
///
/// Only ever serializes as `true` and only deserializes from `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MinimallyEncoded;

impl Serialize for MinimallyEncoded {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for MinimallyEncoded {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(Self)
        } else {
            Err(D::Error::invalid_value(Unexpected::Bool(false), &"true"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SpecialRole {
    Default,
    Admin,
}

impl TryFrom<u8> for SpecialRole {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Default),
            2 => Ok(Self::Admin),
            other => Err(format!("unknown special role {other}")),
        }
    }
}

impl From<SpecialRole> for u8 {
    fn from(value: SpecialRole) -> Self {
        match value {
            SpecialRole::Default => 1,
            SpecialRole::Admin => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThreadSubscription {
    pub home: bool,
    pub push_notifs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegacyRoleInfo {
    pub id: String,
    pub name: String,
    pub permissions: RolePermissionsBlob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_role: Option<SpecialRole>,
}

/// Compact role.
///
/// Roles encoded from legacy records keep the historical `isDefault` field
/// as it was stored; current writers only set `specialRole`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleInfo {
    pub minimally_encoded: MinimallyEncoded,
    pub id: String,
    pub name: String,
    pub permissions: Vec<RoleCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_role: Option<SpecialRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegacyMemberInfo {
    pub id: String,
    pub role: Option<String>,
    pub permissions: PermissionsInfo,
    pub is_sender: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<ThreadSubscription>,
}

/// Compact member. Members of thin threads may omit `permissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemberInfo {
    pub minimally_encoded: MinimallyEncoded,
    pub id: String,
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionsBitmask>,
    pub is_sender: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<ThreadSubscription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegacyThreadCurrentUserInfo {
    pub role: Option<String>,
    pub permissions: PermissionsInfo,
    pub subscription: ThreadSubscription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThreadCurrentUserInfo {
    pub minimally_encoded: MinimallyEncoded,
    pub role: Option<String>,
    pub permissions: PermissionsBitmask,
    pub subscription: ThreadSubscription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LegacyThreadInfo {
    pub id: ThreadId,
    #[serde(rename = "type")]
    pub thread_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub creation_time: u64,
    #[serde(rename = "parentThreadID", default, skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<String>,
    #[serde(rename = "containingThreadID", default, skip_serializing_if = "Option::is_none")]
    pub containing_thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    pub members: Vec<LegacyMemberInfo>,
    pub roles: BTreeMap<String, LegacyRoleInfo>,
    pub current_user: LegacyThreadCurrentUserInfo,
    pub replies_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_count: Option<u32>,
    #[serde(rename = "sourceMessageID", default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub thick: bool,
}

/// Compact thread info. Thick threads keep per-member permissions; thin
/// threads may drop them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThreadInfo {
    pub minimally_encoded: MinimallyEncoded,
    pub id: ThreadId,
    #[serde(rename = "type")]
    pub thread_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub creation_time: u64,
    #[serde(rename = "parentThreadID", default, skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<String>,
    #[serde(rename = "containingThreadID", default, skip_serializing_if = "Option::is_none")]
    pub containing_thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    pub members: Vec<MemberInfo>,
    pub roles: BTreeMap<String, RoleInfo>,
    pub current_user: ThreadCurrentUserInfo,
    pub replies_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_count: Option<u32>,
    #[serde(rename = "sourceMessageID", default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub thick: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}
