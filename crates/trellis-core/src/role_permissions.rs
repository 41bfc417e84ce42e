use core::fmt;
use core::str::FromStr;
use std::collections::HashMap;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{CodecError, ThreadPermission};

/// How far down the thread tree a role permission propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The thread the role belongs to.
    Current,
    Descendant,
    Child,
}

impl Scope {
    const fn bits(self) -> u8 {
        match self {
            Self::Current => 0b00,
            Self::Descendant => 0b01,
            Self::Child => 0b10,
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::Current => "",
            Self::Descendant => "descendant_",
            Self::Child => "child_",
        }
    }

    fn strip_prefix(value: &str) -> (Self, &str) {
        for scope in [Self::Descendant, Self::Child] {
            if let Some(rest) = value.strip_prefix(scope.prefix()) {
                return (scope, rest);
            }
        }
        (Self::Current, value)
    }
}

/// Which kinds of threads a role permission is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reach {
    None,
    /// Publicly joinable threads.
    Open,
    /// Threads directly under a community root.
    Toplevel,
    OpenToplevel,
}

impl Reach {
    const fn bits(self) -> u8 {
        match self {
            Self::None => 0b00,
            Self::Open => 0b01,
            Self::Toplevel => 0b10,
            Self::OpenToplevel => 0b11,
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Open => "open_",
            Self::Toplevel => "toplevel_",
            Self::OpenToplevel => "opentoplevel_",
        }
    }

    fn strip_prefix(value: &str) -> (Self, &str) {
        for reach in [Self::OpenToplevel, Self::Open, Self::Toplevel] {
            if let Some(rest) = value.strip_prefix(reach.prefix()) {
                return (reach, rest);
            }
        }
        (Self::None, value)
    }
}

/// Packs a scope and reach into the low nibble of a [`RoleCode`].
#[must_use]
pub const fn modifier_nibble(scope: Scope, reach: Reach) -> u8 {
    (scope.bits() << 2) | reach.bits()
}

/// # Errors
/// Returns [`CodecError::ReservedScope`] when both scope bits are set and
/// [`CodecError::InvalidModifier`] when `nibble` exceeds `0xf`.
pub fn decode_modifier_nibble(nibble: u8) -> Result<(Scope, Reach), CodecError> {
    if nibble > 0xf {
        return Err(CodecError::InvalidModifier(nibble));
    }
    let scope = match nibble >> 2 {
        0b00 => Scope::Current,
        0b01 => Scope::Descendant,
        0b10 => Scope::Child,
        _ => return Err(CodecError::ReservedScope(nibble)),
    };
    let reach = match nibble & 0b11 {
        0b00 => Reach::None,
        0b01 => Reach::Open,
        0b10 => Reach::Toplevel,
        _ => Reach::OpenToplevel,
    };
    Ok((scope, reach))
}

/// A single flag of a role definition, e.g. `child_opentoplevel_visible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RolePermission {
    base: ThreadPermission,
    ordinal: u8,
    scope: Scope,
    reach: Reach,
}

impl RolePermission {
    /// # Errors
    /// Returns [`CodecError::UnknownRolePermission`] when `base` has no role
    /// ordinal.
    pub fn new(base: ThreadPermission, scope: Scope, reach: Reach) -> Result<Self, CodecError> {
        let ordinal = base.role_ordinal().ok_or_else(|| {
            CodecError::UnknownRolePermission(describe(base, scope, reach))
        })?;
        Ok(Self {
            base,
            ordinal,
            scope,
            reach,
        })
    }

    #[must_use]
    pub const fn base(self) -> ThreadPermission {
        self.base
    }

    #[must_use]
    pub const fn scope(self) -> Scope {
        self.scope
    }

    #[must_use]
    pub const fn reach(self) -> Reach {
        self.reach
    }

    #[must_use]
    pub const fn code(self) -> RoleCode {
        RoleCode::from_parts(self.ordinal, modifier_nibble(self.scope, self.reach))
    }
}

impl fmt::Display for RolePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.scope.prefix(),
            self.reach.prefix(),
            self.base.as_str()
        )
    }
}

impl FromStr for RolePermission {
    type Err = CodecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (scope, rest) = Scope::strip_prefix(value);
        let (reach, rest) = Reach::strip_prefix(rest);
        let base = rest
            .parse::<ThreadPermission>()
            .map_err(|_| CodecError::UnknownRolePermission(value.to_owned()))?;
        Self::new(base, scope, reach)
    }
}

fn describe(base: ThreadPermission, scope: Scope, reach: Reach) -> String {
    format!("{}{}{}", scope.prefix(), reach.prefix(), base.as_str())
}

/// Three hex digits identifying one [`RolePermission`]: the role ordinal in
/// the upper bits and the modifier nibble in the lowest digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleCode(u16);

impl RoleCode {
    const DIGITS: usize = 3;

    #[must_use]
    pub const fn from_parts(ordinal: u8, nibble: u8) -> Self {
        Self(((ordinal as u16) << 4) | (nibble & 0xf) as u16)
    }

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        let [high, low] = self.0.to_be_bytes();
        (high << 4) | (low >> 4)
    }

    #[must_use]
    pub const fn nibble(self) -> u8 {
        let [_, low] = self.0.to_be_bytes();
        low & 0xf
    }

    /// # Errors
    /// Returns [`CodecError::UnknownRoleOrdinal`] or
    /// [`CodecError::ReservedScope`] when either part is unregistered.
    pub fn decode(self) -> Result<RolePermission, CodecError> {
        let base = ThreadPermission::from_role_ordinal(self.ordinal())
            .ok_or(CodecError::UnknownRoleOrdinal(self.ordinal()))?;
        let (scope, reach) = decode_modifier_nibble(self.nibble())?;
        RolePermission::new(base, scope, reach)
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03x}", self.0)
    }
}

impl FromStr for RoleCode {
    type Err = CodecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.len() != Self::DIGITS
            || !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(CodecError::InvalidRoleCode(value.to_owned()));
        }
        u16::from_str_radix(value, 16)
            .map(Self)
            .map_err(|_| CodecError::InvalidRoleCode(value.to_owned()))
    }
}

impl TryFrom<String> for RoleCode {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoleCode> for String {
    fn from(value: RoleCode) -> Self {
        value.to_string()
    }
}

/// Flags of a role definition keyed by role permission identifier.
///
/// Insertion order is significant and survives (de)serialization. Keys are
/// kept as strings so unknown identifiers reach the codec and fail there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePermissionsBlob {
    entries: Vec<(String, bool)>,
    index: HashMap<String, usize>,
}

impl RolePermissionsBlob {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-inserting an existing key updates it in place.
    pub fn insert(&mut self, key: impl Into<String>, value: bool) {
        let key = key.into();
        if let Some(&position) = self.index.get(&key) {
            self.entries[position].1 = value;
            return;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<bool> {
        self.index.get(key).map(|&position| self.entries[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Keys set to `true`, in insertion order.
    pub fn granted(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, value)| *value).map(|(key, _)| key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for RolePermissionsBlob {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        let mut blob = Self::new();
        for (key, value) in iter {
            blob.insert(key, value);
        }
        blob
    }
}

impl Serialize for RolePermissionsBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RolePermissionsBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RolePermissionsBlobVisitor)
    }
}

struct RolePermissionsBlobVisitor;

impl<'de> Visitor<'de> for RolePermissionsBlobVisitor {
    type Value = RolePermissionsBlob;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from role permission to boolean")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut blob = RolePermissionsBlob::new();
        while let Some((key, value)) = access.next_entry::<String, bool>()? {
            blob.insert(key, value);
        }
        Ok(blob)
    }
}

/// # Errors
/// Returns [`CodecError::UnknownRolePermission`] when `role_permission` is
/// not a registered identifier.
pub fn role_permission_to_code(role_permission: &str) -> Result<RoleCode, CodecError> {
    Ok(role_permission.parse::<RolePermission>()?.code())
}

/// # Errors
/// Returns a [`CodecError`] when `code` is malformed or unregistered.
pub fn code_to_role_permission(code: &str) -> Result<String, CodecError> {
    Ok(code.parse::<RoleCode>()?.decode()?.to_string())
}

/// Encodes the granted flags of `blob` in insertion order. `false` entries
/// are dropped.
///
/// # Errors
/// Fails on the first identifier that is not a registered role permission.
pub fn role_blob_to_code_array(blob: &RolePermissionsBlob) -> Result<Vec<RoleCode>, CodecError> {
    blob.granted().map(role_permission_to_code).collect()
}

/// Rebuilds a role blob, every key set to `true` in code order.
///
/// # Errors
/// Fails on the first code that does not decode.
pub fn code_array_to_role_blob(codes: &[RoleCode]) -> Result<RolePermissionsBlob, CodecError> {
    let mut blob = RolePermissionsBlob::new();
    for code in codes {
        blob.insert(code.decode()?.to_string(), true);
    }
    Ok(blob)
}
