use std::{collections::BTreeSet, sync::OnceLock};

use serde::{Deserialize, Serialize};

const PERMISSION_REGISTRY_MANIFEST_JSON: &str =
    include_str!("manifest/permission_registry_manifest.json");

/// Widest bitmask any platform stores.
const MAX_BIT_POSITIONS: u8 = 64;
const MAX_IDENTIFIER_LEN: usize = 64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLifecycle {
    #[default]
    Active,
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionManifestEntry {
    pub permission: String,
    pub bit_position: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_ordinal: Option<u8>,
    #[serde(default)]
    pub lifecycle: PermissionLifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionRegistryManifest {
    pub permissions: Vec<PermissionManifestEntry>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PermissionManifestError {
    #[error("invalid manifest json")]
    InvalidJson,
    #[error("permission `{0}` failed identifier validation")]
    InvalidPermission(String),
    #[error("duplicate permission `{0}` in manifest")]
    DuplicatePermission(String),
    #[error("permission `{permission}` has bit position {bit_position} outside the bitmask")]
    BitPositionOutOfRange { permission: String, bit_position: u8 },
    #[error("permission `{permission}` reuses bit position {bit_position}")]
    DuplicateBitPosition { permission: String, bit_position: u8 },
    #[error("permission `{permission}` reuses role ordinal {role_ordinal}")]
    DuplicateRoleOrdinal { permission: String, role_ordinal: u8 },
    #[error("permission `{permission}` is active and must include a role ordinal")]
    MissingRoleOrdinal { permission: String },
    #[error("permission `{permission}` is deprecated and must not include a role ordinal")]
    UnexpectedRoleOrdinal { permission: String },
    #[error("permission `{permission}` is deprecated and must include a migration note")]
    MissingDeprecatedMigration { permission: String },
    #[error("permission `{permission}` is active but includes migration note")]
    UnexpectedActiveMigration { permission: String },
}

impl From<serde_json::Error> for PermissionManifestError {
    fn from(_: serde_json::Error) -> Self {
        Self::InvalidJson
    }
}

/// Parse and validate a machine-readable permission registry manifest.
///
/// # Errors
/// Returns [`PermissionManifestError`] when JSON is invalid or when manifest
/// invariants fail (identifier format, duplicate names, bits or ordinals,
/// lifecycle metadata).
pub fn parse_permission_registry_manifest(
    json: &str,
) -> Result<PermissionRegistryManifest, PermissionManifestError> {
    let manifest: PermissionRegistryManifest = serde_json::from_str(json)?;
    validate_permission_registry_manifest(&manifest)?;
    Ok(manifest)
}

/// Return the embedded permission registry manifest.
///
/// # Panics
/// Panics if the embedded manifest file is invalid. The parity test against
/// the registry keeps it valid.
#[must_use]
pub fn permission_registry_manifest() -> &'static PermissionRegistryManifest {
    static MANIFEST: OnceLock<PermissionRegistryManifest> = OnceLock::new();
    MANIFEST.get_or_init(|| {
        parse_permission_registry_manifest(PERMISSION_REGISTRY_MANIFEST_JSON)
            .expect("permission registry manifest must parse and validate")
    })
}

fn validate_permission_registry_manifest(
    manifest: &PermissionRegistryManifest,
) -> Result<(), PermissionManifestError> {
    let mut names = BTreeSet::new();
    let mut bits = BTreeSet::new();
    let mut ordinals = BTreeSet::new();

    for entry in &manifest.permissions {
        let permission = || entry.permission.clone();

        if !is_valid_identifier(&entry.permission) {
            return Err(PermissionManifestError::InvalidPermission(permission()));
        }
        if !names.insert(entry.permission.as_str()) {
            return Err(PermissionManifestError::DuplicatePermission(permission()));
        }
        if entry.bit_position >= MAX_BIT_POSITIONS {
            return Err(PermissionManifestError::BitPositionOutOfRange {
                permission: permission(),
                bit_position: entry.bit_position,
            });
        }
        if !bits.insert(entry.bit_position) {
            return Err(PermissionManifestError::DuplicateBitPosition {
                permission: permission(),
                bit_position: entry.bit_position,
            });
        }

        match (entry.lifecycle, entry.role_ordinal) {
            (PermissionLifecycle::Active, None) => {
                return Err(PermissionManifestError::MissingRoleOrdinal {
                    permission: permission(),
                });
            }
            (PermissionLifecycle::Deprecated, Some(_)) => {
                return Err(PermissionManifestError::UnexpectedRoleOrdinal {
                    permission: permission(),
                });
            }
            (PermissionLifecycle::Active, Some(role_ordinal)) => {
                if !ordinals.insert(role_ordinal) {
                    return Err(PermissionManifestError::DuplicateRoleOrdinal {
                        permission: permission(),
                        role_ordinal,
                    });
                }
            }
            (PermissionLifecycle::Deprecated, None) => {}
        }

        match entry.lifecycle {
            PermissionLifecycle::Active if entry.migration.is_some() => {
                return Err(PermissionManifestError::UnexpectedActiveMigration {
                    permission: permission(),
                });
            }
            PermissionLifecycle::Deprecated
                if entry
                    .migration
                    .as_ref()
                    .is_none_or(|value| value.trim().is_empty()) =>
            {
                return Err(PermissionManifestError::MissingDeprecatedMigration {
                    permission: permission(),
                });
            }
            PermissionLifecycle::Active | PermissionLifecycle::Deprecated => {}
        }
    }

    Ok(())
}

fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use trellis_core::ThreadPermission;

    use super::{
        parse_permission_registry_manifest, permission_registry_manifest, PermissionLifecycle,
        PermissionManifestError,
    };

    #[test]
    fn embedded_manifest_matches_the_registry() {
        let manifest = permission_registry_manifest();
        assert_eq!(manifest.permissions.len(), ThreadPermission::ALL.len());

        for entry in &manifest.permissions {
            let permission: ThreadPermission = entry.permission.parse().unwrap();
            assert_eq!(entry.bit_position, permission.bit_position(), "{permission}");
            assert_eq!(entry.role_ordinal, permission.role_ordinal(), "{permission}");
            assert_eq!(
                entry.lifecycle == PermissionLifecycle::Deprecated,
                permission.is_deprecated(),
                "{permission}"
            );
        }
    }

    #[test]
    fn parse_rejects_deprecated_permission_without_migration() {
        let error = parse_permission_registry_manifest(
            r#"{"permissions":[
                {"permission":"membership","bit_position":19,"lifecycle":"deprecated"}
            ]}"#,
        )
        .expect_err("deprecated permission without migration must fail");

        assert_eq!(
            error,
            PermissionManifestError::MissingDeprecatedMigration {
                permission: String::from("membership"),
            }
        );
    }

    #[test]
    fn parse_rejects_reused_bit_positions() {
        let error = parse_permission_registry_manifest(
            r#"{"permissions":[
                {"permission":"know_of","bit_position":0,"role_ordinal":0},
                {"permission":"visible","bit_position":0,"role_ordinal":1}
            ]}"#,
        )
        .expect_err("reused bit positions must fail");

        assert_eq!(
            error,
            PermissionManifestError::DuplicateBitPosition {
                permission: String::from("visible"),
                bit_position: 0,
            }
        );
    }

    #[test]
    fn parse_rejects_reused_role_ordinals() {
        let error = parse_permission_registry_manifest(
            r#"{"permissions":[
                {"permission":"know_of","bit_position":0,"role_ordinal":0},
                {"permission":"visible","bit_position":1,"role_ordinal":0}
            ]}"#,
        )
        .expect_err("reused role ordinals must fail");

        assert_eq!(
            error,
            PermissionManifestError::DuplicateRoleOrdinal {
                permission: String::from("visible"),
                role_ordinal: 0,
            }
        );
    }

    #[test]
    fn parse_rejects_active_permission_without_ordinal() {
        let error = parse_permission_registry_manifest(
            r#"{"permissions":[{"permission":"know_of","bit_position":0}]}"#,
        )
        .expect_err("active permission without ordinal must fail");

        assert_eq!(
            error,
            PermissionManifestError::MissingRoleOrdinal {
                permission: String::from("know_of"),
            }
        );
    }

    #[test]
    fn parse_rejects_bits_outside_the_bitmask() {
        let error = parse_permission_registry_manifest(
            r#"{"permissions":[{"permission":"know_of","bit_position":64,"role_ordinal":0}]}"#,
        )
        .expect_err("bit 64 must fail");

        assert_eq!(
            error,
            PermissionManifestError::BitPositionOutOfRange {
                permission: String::from("know_of"),
                bit_position: 64,
            }
        );
    }

    #[test]
    fn parse_rejects_malformed_identifiers() {
        let error = parse_permission_registry_manifest(
            r#"{"permissions":[{"permission":"Know-Of","bit_position":0,"role_ordinal":0}]}"#,
        )
        .expect_err("identifier must be snake case");

        assert_eq!(
            error,
            PermissionManifestError::InvalidPermission(String::from("Know-Of"))
        );
    }
}
