#![forbid(unsafe_code)]

//! Permission registry and compact codecs for per-thread access control.
//!
//! Resolved permissions travel in two shapes: the verbose named map used by
//! business logic and a minimally encoded shape used for storage and the
//! wire. This crate owns the numbering tables and the codecs between them.

mod bitmask;
mod info;
mod permissions;
mod role_permissions;

pub use bitmask::{
    bitmask_hex_to_permissions, bitmask_to_permissions, has_permission,
    permissions_to_bitmask, permissions_to_bitmask_hex, PermissionsBitmask,
    MAX_BITMASK_HEX_DIGITS,
};
pub use info::{PermissionInfo, PermissionsInfo, Provenance, ThreadId, UNKNOWN_SOURCE};
pub use permissions::ThreadPermission;
pub use role_permissions::{
    code_array_to_role_blob, code_to_role_permission, decode_modifier_nibble, modifier_nibble,
    role_blob_to_code_array, role_permission_to_code, Reach, RoleCode, RolePermission,
    RolePermissionsBlob, Scope,
};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("permissions bitmask `{0}` is not lowercase hex of 1 to 16 digits")]
    InvalidBitmask(String),
    #[error("role code `{0}` is not three lowercase hex digits")]
    InvalidRoleCode(String),
    #[error("role ordinal {0} is not registered")]
    UnknownRoleOrdinal(u8),
    #[error("modifier nibble {0:#x} uses the reserved scope bits")]
    ReservedScope(u8),
    #[error("modifier {0:#x} does not fit in a nibble")]
    InvalidModifier(u8),
    #[error("permission `{0}` is not registered")]
    UnknownPermission(String),
    #[error("role permission `{0}` is not registered")]
    UnknownRolePermission(String),
    #[error("permission info must pair a granted value with a source and a denied value with null")]
    InvalidPermissionInfo,
    #[error("thread id is invalid")]
    InvalidThreadId,
}

