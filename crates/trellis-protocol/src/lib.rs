#![forbid(unsafe_code)]

mod encoding;
mod manifest;
mod records;
mod validation;

use trellis_core::CodecError;

pub use encoding::{
    decode_current_user_info, decode_member_info, decode_role_info, decode_thread_info,
    decode_thread_info_json, encode_current_user_info, encode_member_info, encode_role_info,
    encode_thread_info, encode_thread_info_json, permissions_from_role, strip_member_permissions,
    EncodeOptions,
};
pub use manifest::{
    parse_permission_registry_manifest, permission_registry_manifest, PermissionLifecycle,
    PermissionManifestEntry, PermissionManifestError, PermissionRegistryManifest,
};
pub use records::{
    LegacyMemberInfo, LegacyRoleInfo, LegacyThreadCurrentUserInfo, LegacyThreadInfo,
    MemberInfo, MinimallyEncoded, RoleInfo, SpecialRole, ThreadCurrentUserInfo, ThreadInfo,
    ThreadSubscription,
};
pub use validation::{
    accepts, identify_thread_info, parse_any_thread_info, parse_legacy_role_info,
    parse_legacy_thread_info, parse_member_sans_permissions, parse_member_with_permissions,
    parse_persisted_role_info, parse_role_info, parse_thick_thread_info, parse_thin_thread_info,
    parse_thread_info, validate, AnyThreadInfo, RecordVariant,
};

/// Upper bound for a single thread info document accepted from untrusted
/// input.
pub const MAX_THREAD_INFO_BYTES: usize = 4 * 1024 * 1024;

/// Why a document does not have the shape a boundary expects.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("payload exceeds max size: max={max} bytes actual={actual} bytes")]
    OversizedPayload { max: usize, actual: usize },
    #[error("invalid json payload: {0}")]
    InvalidJson(String),
    #[error("record is not a json object")]
    NotAnObject,
    #[error("record is missing the minimallyEncoded marker")]
    MissingMarker,
    #[error("legacy record carries the minimallyEncoded marker")]
    UnexpectedMarker,
    #[error("minimallyEncoded marker must be literally true")]
    InvalidMarker,
    #[error("member `{member_id}` has no permissions bitmask")]
    MissingMemberPermissions { member_id: String },
    #[error("member `{member_id}` carries a permissions bitmask")]
    UnexpectedMemberPermissions { member_id: String },
    #[error("role `{role_id}` carries the historical isDefault field")]
    UnexpectedIsDefault { role_id: String },
    #[error("member `{member_id}` of a thick thread has no subscription")]
    MissingMemberSubscription { member_id: String },
    #[error("thread is thick")]
    UnexpectedThick,
    #[error("thread is not thick")]
    NotThick,
}

impl From<serde_json::Error> for SchemaError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidJson(error.to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("record is already minimally encoded")]
    AlreadyMinimallyEncoded,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Parses a thread info document from raw bytes at the storage or network
/// boundary.
///
/// # Errors
/// Returns [`SchemaError`] if the payload exceeds [`MAX_THREAD_INFO_BYTES`],
/// is malformed JSON, or matches neither thread info shape.
pub fn parse_thread_info_document(input: &[u8]) -> Result<AnyThreadInfo, SchemaError> {
    if input.len() > MAX_THREAD_INFO_BYTES {
        return Err(SchemaError::OversizedPayload {
            max: MAX_THREAD_INFO_BYTES,
            actual: input.len(),
        });
    }
    let value: serde_json::Value = serde_json::from_slice(input)?;
    parse_any_thread_info(&value)
}
