use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CodecError, PermissionInfo, PermissionsInfo, Provenance, ThreadPermission};

/// Longest hex string a [`PermissionsBitmask`] accepts.
pub const MAX_BITMASK_HEX_DIGITS: usize = 16;

/// Set of granted permissions, one bit per
/// [`ThreadPermission::bit_position`].
///
/// Serialized as lowercase hex without a `0x` prefix or zero padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionsBitmask(u64);

impl PermissionsBitmask {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, permission: ThreadPermission) -> bool {
        self.0 & permission_mask(permission) != 0
    }

    pub fn insert(&mut self, permission: ThreadPermission) {
        self.0 |= permission_mask(permission);
    }

    /// Bits set in this mask that no registered permission owns.
    #[must_use]
    pub fn unknown_bits(self) -> u64 {
        self.0 & !known_permission_mask()
    }
}

impl fmt::Display for PermissionsBitmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl FromStr for PermissionsBitmask {
    type Err = CodecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty()
            || value.len() > MAX_BITMASK_HEX_DIGITS
            || !value.bytes().all(is_lower_hex_digit)
        {
            return Err(CodecError::InvalidBitmask(value.to_owned()));
        }
        u64::from_str_radix(value, 16)
            .map(Self)
            .map_err(|_| CodecError::InvalidBitmask(value.to_owned()))
    }
}

impl TryFrom<String> for PermissionsBitmask {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionsBitmask> for String {
    fn from(value: PermissionsBitmask) -> Self {
        value.to_string()
    }
}

/// Packs the granted entries of `permissions`. Provenance is dropped.
#[must_use]
pub fn permissions_to_bitmask(permissions: &PermissionsInfo) -> PermissionsBitmask {
    let mut bitmask = PermissionsBitmask::empty();
    for (permission, info) in permissions.iter() {
        if info.value() {
            bitmask.insert(permission);
        }
    }
    bitmask
}

#[must_use]
pub fn permissions_to_bitmask_hex(permissions: &PermissionsInfo) -> String {
    permissions_to_bitmask(permissions).to_string()
}

/// Expands a bitmask into an entry for every active permission.
///
/// Granted entries carry [`Provenance::Unknown`]. The retired flag is only
/// listed when its bit is set.
#[must_use]
pub fn bitmask_to_permissions(bitmask: PermissionsBitmask) -> PermissionsInfo {
    if bitmask.unknown_bits() != 0 {
        tracing::debug!(
            unknown_bits = bitmask.unknown_bits(),
            "ignoring unregistered permission bits"
        );
    }
    ThreadPermission::ALL
        .into_iter()
        .filter_map(|permission| {
            let granted = bitmask.contains(permission);
            if permission.is_deprecated() && !granted {
                return None;
            }
            let info = if granted {
                PermissionInfo::Granted(Provenance::Unknown)
            } else {
                PermissionInfo::NotGranted
            };
            Some((permission, info))
        })
        .collect()
}

/// # Errors
/// Returns [`CodecError::InvalidBitmask`] when `bitmask_hex` is not 1 to 16
/// lowercase hex digits.
pub fn bitmask_hex_to_permissions(bitmask_hex: &str) -> Result<PermissionsInfo, CodecError> {
    Ok(bitmask_to_permissions(bitmask_hex.parse()?))
}

/// Checks one permission against a hex bitmask.
///
/// Names outside the registry and malformed bitmasks answer `false`, so
/// readers holding older bitmasks can ask about newer permissions.
#[must_use]
pub fn has_permission(bitmask_hex: &str, permission: &str) -> bool {
    let Ok(permission) = permission.parse::<ThreadPermission>() else {
        return false;
    };
    bitmask_hex
        .parse::<PermissionsBitmask>()
        .is_ok_and(|bitmask| bitmask.contains(permission))
}

const fn permission_mask(permission: ThreadPermission) -> u64 {
    1 << permission.bit_position()
}

fn known_permission_mask() -> u64 {
    ThreadPermission::ALL
        .into_iter()
        .fold(0_u64, |bits, permission| bits | permission_mask(permission))
}

const fn is_lower_hex_digit(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'a'..=b'f')
}

#[cfg(test)]
mod tests {
    use super::{
        bitmask_hex_to_permissions, bitmask_to_permissions, has_permission,
        permissions_to_bitmask, permissions_to_bitmask_hex, PermissionsBitmask,
    };
    use crate::{
        CodecError, PermissionInfo, PermissionsInfo, Provenance, ThreadId, ThreadPermission,
    };

    fn granted() -> PermissionInfo {
        PermissionInfo::granted_by(ThreadId::try_from("1").unwrap())
    }

    fn ten_flag_fixture() -> PermissionsInfo {
        use ThreadPermission::{
            AddMembers, ChangeRole, CreateSidebars, CreateSubthreads, DeleteThread, EditEntries,
            EditMessage, EditPermissions, EditThread, EditThreadColor, EditThreadDescription,
            JoinThread, KnowOf, LeaveThread, ReactToMessage, RemoveMembers, Visible, Voiced,
        };
        let granted_flags = [
            KnowOf,
            Visible,
            Voiced,
            EditEntries,
            EditThread,
            EditThreadDescription,
            EditThreadColor,
            DeleteThread,
            CreateSubthreads,
            CreateSidebars,
            AddMembers,
            RemoveMembers,
            ChangeRole,
            ReactToMessage,
            EditMessage,
        ];
        let denied_flags = [JoinThread, EditPermissions, LeaveThread];
        granted_flags
            .into_iter()
            .map(|permission| (permission, granted()))
            .chain(
                denied_flags
                    .into_iter()
                    .map(|permission| (permission, PermissionInfo::NotGranted)),
            )
            .collect()
    }

    #[test]
    fn fixture_encodes_to_known_hex() {
        let bitmask = permissions_to_bitmask_hex(&ten_flag_fixture());
        assert_eq!(bitmask, "373ff");
        assert!(has_permission(&bitmask, "know_of"));
        assert!(has_permission(&bitmask, "create_sidebars"));
        assert!(!has_permission(&bitmask, "join_thread"));
        assert!(!has_permission(&bitmask, "edit_permissions"));
        assert!(has_permission(&bitmask, "remove_members"));
        assert!(!has_permission(&bitmask, "leave_thread"));
        assert!(has_permission(&bitmask, "edit_message"));
    }

    #[test]
    fn values_survive_a_round_trip_but_sources_do_not() {
        let original = ten_flag_fixture();
        let decoded = bitmask_to_permissions(permissions_to_bitmask(&original));
        for permission in ThreadPermission::ALL {
            assert_eq!(
                decoded.value_of(permission),
                original.value_of(permission),
                "{permission}"
            );
        }
        assert_eq!(
            decoded.get(ThreadPermission::KnowOf),
            Some(&PermissionInfo::Granted(Provenance::Unknown))
        );
        assert_eq!(
            decoded.get(ThreadPermission::JoinThread),
            Some(&PermissionInfo::NotGranted)
        );
    }

    #[test]
    fn short_hex_implies_zero_high_bits() {
        let decoded = bitmask_hex_to_permissions("3").unwrap();
        let granted: Vec<_> = decoded
            .iter()
            .filter(|(_, info)| info.value())
            .map(|(permission, _)| permission)
            .collect();
        assert_eq!(granted, [ThreadPermission::KnowOf, ThreadPermission::Visible]);
        assert_eq!(decoded.len(), 25);
    }

    #[test]
    fn retired_flag_is_listed_only_when_set() {
        let without = bitmask_to_permissions(PermissionsBitmask::from_bits(0));
        assert!(without.get(ThreadPermission::Membership).is_none());

        let with = bitmask_to_permissions(PermissionsBitmask::from_bits(1 << 19));
        assert!(with.value_of(ThreadPermission::Membership));
        assert_eq!(with.len(), 26);
    }

    #[test]
    fn unregistered_names_never_match() {
        for bitmask in ["0", "3", "373ff", "3ffffff", "ffffffffffffffff"] {
            assert!(!has_permission(bitmask, "summon_dragons"));
            assert!(!has_permission(bitmask, ""));
        }
        assert!(!has_permission("not-hex", "know_of"));
    }

    #[test]
    fn empty_set_encodes_as_zero() {
        assert_eq!(permissions_to_bitmask_hex(&PermissionsInfo::new()), "0");
    }

    #[test]
    fn parsing_rejects_non_canonical_hex() {
        for input in ["", "0x3", "3FF", "12345678901234567", " 3", "g"] {
            assert_eq!(
                input.parse::<PermissionsBitmask>(),
                Err(CodecError::InvalidBitmask(input.to_owned())),
                "{input:?}"
            );
        }
    }

    #[test]
    fn unknown_bits_are_reported_and_ignored() {
        let bitmask = PermissionsBitmask::from_bits((1 << 40) | 1);
        assert_eq!(bitmask.unknown_bits(), 1 << 40);
        let decoded = bitmask_to_permissions(bitmask);
        assert!(decoded.value_of(ThreadPermission::KnowOf));
        assert_eq!(decoded.iter().filter(|(_, info)| info.value()).count(), 1);
    }

    #[test]
    fn serde_uses_the_hex_string() {
        let bitmask = PermissionsBitmask::from_bits(0x3027f);
        assert_eq!(serde_json::to_string(&bitmask).unwrap(), "\"3027f\"");
        assert_eq!(
            serde_json::from_str::<PermissionsBitmask>("\"3027f\"").unwrap(),
            bitmask
        );
        assert!(serde_json::from_str::<PermissionsBitmask>("\"0x3027f\"").is_err());
    }
}
