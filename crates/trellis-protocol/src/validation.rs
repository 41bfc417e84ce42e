//! Structural parsers for every historical and compact record shape.
//!
//! Each parser inspects the `minimallyEncoded` marker first, then
//! deserializes into the typed record. Parsers never repair their input.

use serde::Deserialize;
use serde_json::Value;

use crate::records::{LegacyRoleInfo, LegacyThreadInfo, MemberInfo, RoleInfo, ThreadInfo};
use crate::SchemaError;

pub(crate) const MINIMALLY_ENCODED_KEY: &str = "minimallyEncoded";

/// Record shapes accepted at deserialization boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordVariant {
    LegacyRoleInfo,
    RoleInfo,
    /// Compact role that may still carry the historical `isDefault` field.
    PersistedRoleInfo,
    MemberWithPermissions,
    MemberSansPermissions,
    LegacyThreadInfo,
    ThreadInfo,
    /// Compact thread whose members carry no permissions.
    ThinThreadInfo,
    /// Compact `thick` thread whose members all carry permissions and a
    /// subscription.
    ThickThreadInfo,
}

impl RecordVariant {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LegacyRoleInfo => "legacy_role_info",
            Self::RoleInfo => "role_info",
            Self::PersistedRoleInfo => "persisted_role_info",
            Self::MemberWithPermissions => "member_with_permissions",
            Self::MemberSansPermissions => "member_sans_permissions",
            Self::LegacyThreadInfo => "legacy_thread_info",
            Self::ThreadInfo => "thread_info",
            Self::ThinThreadInfo => "thin_thread_info",
            Self::ThickThreadInfo => "thick_thread_info",
        }
    }
}

/// A thread info in either shape, picked by the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyThreadInfo {
    Legacy(LegacyThreadInfo),
    MinimallyEncoded(ThreadInfo),
}

/// # Errors
/// Returns the first reason `value` does not have the shape of `variant`.
pub fn validate(variant: RecordVariant, value: &Value) -> Result<(), SchemaError> {
    match variant {
        RecordVariant::LegacyRoleInfo => parse_legacy_role_info(value).map(drop),
        RecordVariant::RoleInfo => parse_role_info(value).map(drop),
        RecordVariant::PersistedRoleInfo => parse_persisted_role_info(value).map(drop),
        RecordVariant::MemberWithPermissions => parse_member_with_permissions(value).map(drop),
        RecordVariant::MemberSansPermissions => parse_member_sans_permissions(value).map(drop),
        RecordVariant::LegacyThreadInfo => parse_legacy_thread_info(value).map(drop),
        RecordVariant::ThreadInfo => parse_thread_info(value).map(drop),
        RecordVariant::ThinThreadInfo => parse_thin_thread_info(value).map(drop),
        RecordVariant::ThickThreadInfo => parse_thick_thread_info(value).map(drop),
    }
}

#[must_use]
pub fn accepts(variant: RecordVariant, value: &Value) -> bool {
    validate(variant, value).is_ok()
}

/// Most specific thread info variant `value` satisfies.
#[must_use]
pub fn identify_thread_info(value: &Value) -> Option<RecordVariant> {
    [
        RecordVariant::LegacyThreadInfo,
        RecordVariant::ThinThreadInfo,
        RecordVariant::ThickThreadInfo,
        RecordVariant::ThreadInfo,
    ]
    .into_iter()
    .find(|variant| accepts(*variant, value))
}

/// # Errors
/// See [`SchemaError`].
pub fn parse_legacy_role_info(value: &Value) -> Result<LegacyRoleInfo, SchemaError> {
    expect_legacy(value)?;
    parse(value)
}

/// Compact role in its current shape, without `isDefault`.
///
/// # Errors
/// Returns [`SchemaError::UnexpectedIsDefault`] for a role that still
/// carries the historical field.
pub fn parse_role_info(value: &Value) -> Result<RoleInfo, SchemaError> {
    let role = parse_persisted_role_info(value)?;
    if role.is_default.is_some() {
        return Err(SchemaError::UnexpectedIsDefault { role_id: role.id });
    }
    Ok(role)
}

/// Compact role with or without the historical `isDefault` field.
///
/// # Errors
/// See [`SchemaError`].
pub fn parse_persisted_role_info(value: &Value) -> Result<RoleInfo, SchemaError> {
    expect_minimally_encoded(value)?;
    parse(value)
}

/// # Errors
/// Returns [`SchemaError::MissingMemberPermissions`] when the member has no
/// permissions bitmask.
pub fn parse_member_with_permissions(value: &Value) -> Result<MemberInfo, SchemaError> {
    expect_minimally_encoded(value)?;
    let member: MemberInfo = parse(value)?;
    check_member_has_permissions(&member)?;
    Ok(member)
}

/// # Errors
/// Returns [`SchemaError::UnexpectedMemberPermissions`] when the member
/// carries a permissions bitmask.
pub fn parse_member_sans_permissions(value: &Value) -> Result<MemberInfo, SchemaError> {
    expect_minimally_encoded(value)?;
    let member: MemberInfo = parse(value)?;
    check_member_lacks_permissions(&member)?;
    Ok(member)
}

/// # Errors
/// See [`SchemaError`].
pub fn parse_legacy_thread_info(value: &Value) -> Result<LegacyThreadInfo, SchemaError> {
    expect_legacy(value)?;
    parse(value)
}

/// Any compact thread info, thin or thick, including thin threads whose
/// members still carry permissions.
///
/// # Errors
/// See [`SchemaError`].
pub fn parse_thread_info(value: &Value) -> Result<ThreadInfo, SchemaError> {
    expect_minimally_encoded(value)?;
    parse(value)
}

/// # Errors
/// See [`SchemaError`].
pub fn parse_thin_thread_info(value: &Value) -> Result<ThreadInfo, SchemaError> {
    let thread = parse_thread_info(value)?;
    if thread.thick {
        return Err(SchemaError::UnexpectedThick);
    }
    thread
        .members
        .iter()
        .try_for_each(check_member_lacks_permissions)?;
    Ok(thread)
}

/// # Errors
/// See [`SchemaError`].
pub fn parse_thick_thread_info(value: &Value) -> Result<ThreadInfo, SchemaError> {
    let thread = parse_thread_info(value)?;
    if !thread.thick {
        return Err(SchemaError::NotThick);
    }
    for member in &thread.members {
        check_member_has_permissions(member)?;
        if member.subscription.is_none() {
            return Err(SchemaError::MissingMemberSubscription {
                member_id: member.id.clone(),
            });
        }
    }
    Ok(thread)
}

/// Picks the legacy or compact path from the marker.
///
/// # Errors
/// Returns [`SchemaError::InvalidMarker`] when the marker is present but not
/// `true`, otherwise whatever the selected parser reports.
pub fn parse_any_thread_info(value: &Value) -> Result<AnyThreadInfo, SchemaError> {
    match marker(value)? {
        None => parse_legacy_thread_info(value).map(AnyThreadInfo::Legacy),
        Some(_) => parse_thread_info(value).map(AnyThreadInfo::MinimallyEncoded),
    }
}

fn parse<'a, T: Deserialize<'a>>(value: &'a Value) -> Result<T, SchemaError> {
    T::deserialize(value).map_err(SchemaError::from)
}

fn marker(value: &Value) -> Result<Option<bool>, SchemaError> {
    let object = value.as_object().ok_or(SchemaError::NotAnObject)?;
    match object.get(MINIMALLY_ENCODED_KEY) {
        None => Ok(None),
        Some(Value::Bool(true)) => Ok(Some(true)),
        Some(_) => Err(SchemaError::InvalidMarker),
    }
}

fn expect_legacy(value: &Value) -> Result<(), SchemaError> {
    match marker(value)? {
        None => Ok(()),
        Some(_) => Err(SchemaError::UnexpectedMarker),
    }
}

fn expect_minimally_encoded(value: &Value) -> Result<(), SchemaError> {
    match marker(value)? {
        None => Err(SchemaError::MissingMarker),
        Some(_) => Ok(()),
    }
}

fn check_member_has_permissions(member: &MemberInfo) -> Result<(), SchemaError> {
    if member.permissions.is_none() {
        return Err(SchemaError::MissingMemberPermissions {
            member_id: member.id.clone(),
        });
    }
    Ok(())
}

fn check_member_lacks_permissions(member: &MemberInfo) -> Result<(), SchemaError> {
    if member.permissions.is_some() {
        return Err(SchemaError::UnexpectedMemberPermissions {
            member_id: member.id.clone(),
        });
    }
    Ok(())
}
