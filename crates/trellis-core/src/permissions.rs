use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Every permission flag a thread member can hold.
///
/// The discriminant is the flag's bit position in a
/// [`PermissionsBitmask`](crate::PermissionsBitmask). Positions and role
/// ordinals are persisted, so new flags are only ever appended and retired
/// flags keep their slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ThreadPermission {
    KnowOf = 0,
    Visible = 1,
    Voiced = 2,
    EditEntries = 3,
    EditThread = 4,
    EditThreadDescription = 5,
    EditThreadColor = 6,
    DeleteThread = 7,
    CreateSubthreads = 8,
    CreateSidebars = 9,
    JoinThread = 10,
    EditPermissions = 11,
    AddMembers = 12,
    RemoveMembers = 13,
    ChangeRole = 14,
    LeaveThread = 15,
    ReactToMessage = 16,
    EditMessage = 17,
    EditThreadAvatar = 18,
    /// Retired. Keeps its bit position but has no role ordinal.
    Membership = 19,
    ManagePins = 20,
    ManageInviteLinks = 21,
    VoicedInAnnouncementChannels = 22,
    ManageFarcasterChannelTags = 23,
    DeleteOwnMessages = 24,
    DeleteAllMessages = 25,
}

impl ThreadPermission {
    /// All permissions in bit-position order.
    pub const ALL: [Self; 26] = [
        Self::KnowOf,
        Self::Visible,
        Self::Voiced,
        Self::EditEntries,
        Self::EditThread,
        Self::EditThreadDescription,
        Self::EditThreadColor,
        Self::DeleteThread,
        Self::CreateSubthreads,
        Self::CreateSidebars,
        Self::JoinThread,
        Self::EditPermissions,
        Self::AddMembers,
        Self::RemoveMembers,
        Self::ChangeRole,
        Self::LeaveThread,
        Self::ReactToMessage,
        Self::EditMessage,
        Self::EditThreadAvatar,
        Self::Membership,
        Self::ManagePins,
        Self::ManageInviteLinks,
        Self::VoicedInAnnouncementChannels,
        Self::ManageFarcasterChannelTags,
        Self::DeleteOwnMessages,
        Self::DeleteAllMessages,
    ];

    /// Permissions that can appear in a role definition, indexed by ordinal.
    const BY_ROLE_ORDINAL: [Self; 25] = [
        Self::KnowOf,
        Self::Visible,
        Self::Voiced,
        Self::EditEntries,
        Self::EditThread,
        Self::EditThreadDescription,
        Self::EditThreadColor,
        Self::DeleteThread,
        Self::CreateSubthreads,
        Self::CreateSidebars,
        Self::JoinThread,
        Self::EditPermissions,
        Self::AddMembers,
        Self::RemoveMembers,
        Self::ChangeRole,
        Self::LeaveThread,
        Self::ReactToMessage,
        Self::EditMessage,
        Self::EditThreadAvatar,
        Self::ManagePins,
        Self::ManageInviteLinks,
        Self::VoicedInAnnouncementChannels,
        Self::ManageFarcasterChannelTags,
        Self::DeleteOwnMessages,
        Self::DeleteAllMessages,
    ];

    #[must_use]
    pub const fn bit_position(self) -> u8 {
        self as u8
    }

    /// Position of this permission in role-definition codes, `None` for the
    /// retired flag.
    #[must_use]
    pub const fn role_ordinal(self) -> Option<u8> {
        match self {
            Self::KnowOf => Some(0),
            Self::Visible => Some(1),
            Self::Voiced => Some(2),
            Self::EditEntries => Some(3),
            Self::EditThread => Some(4),
            Self::EditThreadDescription => Some(5),
            Self::EditThreadColor => Some(6),
            Self::DeleteThread => Some(7),
            Self::CreateSubthreads => Some(8),
            Self::CreateSidebars => Some(9),
            Self::JoinThread => Some(10),
            Self::EditPermissions => Some(11),
            Self::AddMembers => Some(12),
            Self::RemoveMembers => Some(13),
            Self::ChangeRole => Some(14),
            Self::LeaveThread => Some(15),
            Self::ReactToMessage => Some(16),
            Self::EditMessage => Some(17),
            Self::EditThreadAvatar => Some(18),
            Self::Membership => None,
            Self::ManagePins => Some(19),
            Self::ManageInviteLinks => Some(20),
            Self::VoicedInAnnouncementChannels => Some(21),
            Self::ManageFarcasterChannelTags => Some(22),
            Self::DeleteOwnMessages => Some(23),
            Self::DeleteAllMessages => Some(24),
        }
    }

    #[must_use]
    pub fn from_bit_position(position: u8) -> Option<Self> {
        Self::ALL.get(usize::from(position)).copied()
    }

    #[must_use]
    pub fn from_role_ordinal(ordinal: u8) -> Option<Self> {
        Self::BY_ROLE_ORDINAL.get(usize::from(ordinal)).copied()
    }

    #[must_use]
    pub const fn is_deprecated(self) -> bool {
        matches!(self, Self::Membership)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KnowOf => "know_of",
            Self::Visible => "visible",
            Self::Voiced => "voiced",
            Self::EditEntries => "edit_entries",
            Self::EditThread => "edit_thread",
            Self::EditThreadDescription => "edit_thread_description",
            Self::EditThreadColor => "edit_thread_color",
            Self::DeleteThread => "delete_thread",
            Self::CreateSubthreads => "create_subthreads",
            Self::CreateSidebars => "create_sidebars",
            Self::JoinThread => "join_thread",
            Self::EditPermissions => "edit_permissions",
            Self::AddMembers => "add_members",
            Self::RemoveMembers => "remove_members",
            Self::ChangeRole => "change_role",
            Self::LeaveThread => "leave_thread",
            Self::ReactToMessage => "react_to_message",
            Self::EditMessage => "edit_message",
            Self::EditThreadAvatar => "edit_thread_avatar",
            Self::Membership => "membership",
            Self::ManagePins => "manage_pins",
            Self::ManageInviteLinks => "manage_invite_links",
            Self::VoicedInAnnouncementChannels => "voiced_in_announcement_channels",
            Self::ManageFarcasterChannelTags => "manage_farcaster_channel_tags",
            Self::DeleteOwnMessages => "delete_own_messages",
            Self::DeleteAllMessages => "delete_all_messages",
        }
    }
}

impl fmt::Display for ThreadPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadPermission {
    type Err = CodecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| CodecError::UnknownPermission(value.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::ThreadPermission;
    use crate::CodecError;

    #[test]
    fn bit_positions_follow_declaration_order() {
        for (index, permission) in ThreadPermission::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(permission.bit_position()), index);
            assert_eq!(
                ThreadPermission::from_bit_position(permission.bit_position()),
                Some(permission)
            );
        }
        assert_eq!(ThreadPermission::from_bit_position(26), None);
    }

    #[test]
    fn role_ordinals_skip_only_the_retired_flag() {
        let mut seen = HashSet::new();
        for permission in ThreadPermission::ALL {
            match permission.role_ordinal() {
                Some(ordinal) => {
                    assert!(seen.insert(ordinal), "ordinal {ordinal} reused");
                    assert_eq!(ThreadPermission::from_role_ordinal(ordinal), Some(permission));
                }
                None => assert!(permission.is_deprecated()),
            }
        }
        assert_eq!(seen.len(), 25);
        assert_eq!(ThreadPermission::from_role_ordinal(25), None);
    }

    #[test]
    fn numbering_is_stable_for_persisted_data() {
        assert_eq!(ThreadPermission::KnowOf.bit_position(), 0);
        assert_eq!(ThreadPermission::JoinThread.role_ordinal(), Some(0xa));
        assert_eq!(ThreadPermission::Membership.bit_position(), 19);
        assert_eq!(ThreadPermission::ManagePins.bit_position(), 20);
        assert_eq!(ThreadPermission::ManagePins.role_ordinal(), Some(19));
        assert_eq!(ThreadPermission::DeleteAllMessages.bit_position(), 25);
        assert_eq!(ThreadPermission::DeleteAllMessages.role_ordinal(), Some(24));
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for permission in ThreadPermission::ALL {
            assert_eq!(permission.as_str().parse::<ThreadPermission>(), Ok(permission));
        }
        assert_eq!(
            "edit_thread_name".parse::<ThreadPermission>(),
            Err(CodecError::UnknownPermission(String::from("edit_thread_name")))
        );
    }

    #[test]
    fn serde_names_match_registry_names() {
        for permission in ThreadPermission::ALL {
            let json = serde_json::to_string(&permission).unwrap();
            assert_eq!(json, format!("\"{}\"", permission.as_str()));
        }
    }
}
