use std::collections::BTreeMap;
use std::fmt;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{CodecError, ThreadPermission};

/// Source written on the wire for a grant whose origin was lost in
/// compaction. Older readers compare against this exact string.
pub const UNKNOWN_SOURCE: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThreadId(String);

impl ThreadId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ThreadId {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() || value.chars().any(char::is_control) {
            return Err(CodecError::InvalidThreadId);
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for ThreadId {
    type Error = CodecError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<ThreadId> for String {
    fn from(value: ThreadId) -> Self {
        value.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which thread granted a permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provenance {
    Thread(ThreadId),
    /// Granted, but the granting thread is not known. Produced by decoding a
    /// bitmask.
    Unknown,
}

/// One resolved permission of a member on a thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPermissionInfo", into = "RawPermissionInfo")]
pub enum PermissionInfo {
    Granted(Provenance),
    NotGranted,
}

impl PermissionInfo {
    #[must_use]
    pub fn granted_by(thread_id: ThreadId) -> Self {
        Self::Granted(Provenance::Thread(thread_id))
    }

    #[must_use]
    pub const fn value(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    #[must_use]
    pub const fn source(&self) -> Option<&Provenance> {
        match self {
            Self::Granted(provenance) => Some(provenance),
            Self::NotGranted => None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct RawPermissionInfo {
    value: bool,
    source: Option<String>,
}

impl TryFrom<RawPermissionInfo> for PermissionInfo {
    type Error = CodecError;

    fn try_from(raw: RawPermissionInfo) -> Result<Self, Self::Error> {
        match (raw.value, raw.source) {
            (true, Some(source)) if source == UNKNOWN_SOURCE => {
                Ok(Self::Granted(Provenance::Unknown))
            }
            (true, Some(source)) => Ok(Self::granted_by(ThreadId::try_from(source)?)),
            (false, None) => Ok(Self::NotGranted),
            _ => Err(CodecError::InvalidPermissionInfo),
        }
    }
}

impl From<PermissionInfo> for RawPermissionInfo {
    fn from(info: PermissionInfo) -> Self {
        match info {
            PermissionInfo::Granted(Provenance::Thread(thread_id)) => Self {
                value: true,
                source: Some(thread_id.into()),
            },
            PermissionInfo::Granted(Provenance::Unknown) => Self {
                value: true,
                source: Some(UNKNOWN_SOURCE.to_owned()),
            },
            PermissionInfo::NotGranted => Self {
                value: false,
                source: None,
            },
        }
    }
}

/// Resolved permission set of one member on one thread, ordered by bit
/// position.
///
/// Deserialization skips names outside the registry so that payloads from
/// newer peers still load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionsInfo(BTreeMap<ThreadPermission, PermissionInfo>);

impl PermissionsInfo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, permission: ThreadPermission, info: PermissionInfo) {
        self.0.insert(permission, info);
    }

    #[must_use]
    pub fn get(&self, permission: ThreadPermission) -> Option<&PermissionInfo> {
        self.0.get(&permission)
    }

    /// Missing entries read as not granted.
    #[must_use]
    pub fn value_of(&self, permission: ThreadPermission) -> bool {
        self.get(permission).is_some_and(PermissionInfo::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ThreadPermission, &PermissionInfo)> {
        self.0.iter().map(|(permission, info)| (*permission, info))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ThreadPermission, PermissionInfo)> for PermissionsInfo {
    fn from_iter<I: IntoIterator<Item = (ThreadPermission, PermissionInfo)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for PermissionsInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (permission, info) in &self.0 {
            map.serialize_entry(permission.as_str(), info)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PermissionsInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PermissionsInfoVisitor)
    }
}

struct PermissionsInfoVisitor;

impl<'de> Visitor<'de> for PermissionsInfoVisitor {
    type Value = PermissionsInfo;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from permission name to {value, source}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut permissions = PermissionsInfo::new();
        while let Some(name) = access.next_key::<String>()? {
            if let Ok(permission) = name.parse::<ThreadPermission>() {
                permissions.insert(permission, access.next_value()?);
            } else {
                tracing::debug!(permission = %name, "skipping unregistered permission");
                access.next_value::<IgnoredAny>()?;
            }
        }
        Ok(permissions)
    }
}
