use std::collections::BTreeMap;

use serde_json::Value;
use trellis_core::{
    bitmask_to_permissions, code_array_to_role_blob, permissions_to_bitmask,
    role_blob_to_code_array, CodecError, PermissionInfo, PermissionsInfo, RolePermissionsBlob,
    ThreadId, ThreadPermission,
};

use crate::records::{
    LegacyMemberInfo, LegacyRoleInfo, LegacyThreadCurrentUserInfo, LegacyThreadInfo,
    MemberInfo, MinimallyEncoded, RoleInfo, ThreadCurrentUserInfo, ThreadInfo,
};
use crate::validation::{parse_legacy_thread_info, parse_thread_info, MINIMALLY_ENCODED_KEY};
use crate::EncodingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    /// Drop per-member permissions from thin threads. Thick threads always
    /// keep them.
    pub strip_member_permissions: bool,
}

/// Replaces the role blob with its codes. `isDefault` and `specialRole`
/// are carried over as stored.
///
/// # Errors
/// Returns [`CodecError::UnknownRolePermission`] when a granted key of the
/// role blob is not a registered role permission.
pub fn encode_role_info(role: LegacyRoleInfo) -> Result<RoleInfo, CodecError> {
    let permissions = role_blob_to_code_array(&role.permissions)?;
    Ok(RoleInfo {
        minimally_encoded: MinimallyEncoded,
        id: role.id,
        name: role.name,
        permissions,
        is_default: role.is_default,
        special_role: role.special_role,
    })
}

/// # Errors
/// Fails on the first role code that does not decode.
pub fn decode_role_info(role: RoleInfo) -> Result<LegacyRoleInfo, CodecError> {
    let permissions = code_array_to_role_blob(&role.permissions)?;
    Ok(LegacyRoleInfo {
        id: role.id,
        name: role.name,
        permissions,
        is_default: role.is_default,
        special_role: role.special_role,
    })
}

#[must_use]
pub fn encode_member_info(member: LegacyMemberInfo) -> MemberInfo {
    MemberInfo {
        minimally_encoded: MinimallyEncoded,
        id: member.id,
        role: member.role,
        permissions: Some(permissions_to_bitmask(&member.permissions)),
        is_sender: member.is_sender,
        subscription: member.subscription,
    }
}

/// Thin form of a member, as sent to clients that derive member permissions
/// from roles.
#[must_use]
pub fn strip_member_permissions(member: MemberInfo) -> MemberInfo {
    MemberInfo {
        permissions: None,
        ..member
    }
}

/// Expands a compact member. A member without permissions gets the
/// unmodified flags of `role_permissions` granted by `thread_id`.
#[must_use]
pub fn decode_member_info(
    member: MemberInfo,
    role_permissions: Option<&RolePermissionsBlob>,
    thread_id: &ThreadId,
) -> LegacyMemberInfo {
    let permissions = match member.permissions {
        Some(bitmask) => bitmask_to_permissions(bitmask),
        None => permissions_from_role(role_permissions, thread_id),
    };
    LegacyMemberInfo {
        id: member.id,
        role: member.role,
        permissions,
        is_sender: member.is_sender,
        subscription: member.subscription,
    }
}

#[must_use]
pub fn encode_current_user_info(
    current_user: LegacyThreadCurrentUserInfo,
) -> ThreadCurrentUserInfo {
    ThreadCurrentUserInfo {
        minimally_encoded: MinimallyEncoded,
        role: current_user.role,
        permissions: permissions_to_bitmask(&current_user.permissions),
        subscription: current_user.subscription,
        unread: current_user.unread,
    }
}

#[must_use]
pub fn decode_current_user_info(
    current_user: ThreadCurrentUserInfo,
) -> LegacyThreadCurrentUserInfo {
    LegacyThreadCurrentUserInfo {
        role: current_user.role,
        permissions: bitmask_to_permissions(current_user.permissions),
        subscription: current_user.subscription,
        unread: current_user.unread,
    }
}

/// Permissions a member holds on `thread_id` through its role alone.
///
/// Only unmodified flags count, and nothing is granted unless the role also
/// grants `know_of`.
#[must_use]
pub fn permissions_from_role(
    role_permissions: Option<&RolePermissionsBlob>,
    thread_id: &ThreadId,
) -> PermissionsInfo {
    let grants = |permission: ThreadPermission| {
        role_permissions.is_some_and(|blob| blob.get(permission.as_str()) == Some(true))
    };
    let knows_of = grants(ThreadPermission::KnowOf);
    ThreadPermission::ALL
        .into_iter()
        .filter(|permission| !permission.is_deprecated())
        .map(|permission| {
            let info = if knows_of && grants(permission) {
                PermissionInfo::granted_by(thread_id.clone())
            } else {
                PermissionInfo::NotGranted
            };
            (permission, info)
        })
        .collect()
}

/// Encodes every member, role and the current user of `thread`.
///
/// Only legacy input is accepted, so a record cannot be encoded twice.
///
/// # Errors
/// Fails when any role carries an unregistered role permission.
pub fn encode_thread_info(
    thread: LegacyThreadInfo,
    options: &EncodeOptions,
) -> Result<ThreadInfo, EncodingError> {
    let strip = options.strip_member_permissions && !thread.thick;
    let members = thread
        .members
        .into_iter()
        .map(encode_member_info)
        .map(|member| if strip { strip_member_permissions(member) } else { member })
        .collect();
    let roles = thread
        .roles
        .into_iter()
        .map(|(id, role)| Ok((id, encode_role_info(role)?)))
        .collect::<Result<BTreeMap<_, _>, CodecError>>()?;

    Ok(ThreadInfo {
        minimally_encoded: MinimallyEncoded,
        id: thread.id,
        thread_type: thread.thread_type,
        name: thread.name,
        description: thread.description,
        color: thread.color,
        creation_time: thread.creation_time,
        parent_thread_id: thread.parent_thread_id,
        containing_thread_id: thread.containing_thread_id,
        community: thread.community,
        members,
        roles,
        current_user: encode_current_user_info(thread.current_user),
        replies_count: thread.replies_count,
        pinned_count: thread.pinned_count,
        source_message_id: thread.source_message_id,
        avatar: thread.avatar,
        thick: thread.thick,
    })
}

/// Expands a compact thread info. Any malformed role code rejects the whole
/// record.
///
/// # Errors
/// Returns [`EncodingError::Codec`] for the first role code that does not
/// decode.
pub fn decode_thread_info(thread: ThreadInfo) -> Result<LegacyThreadInfo, EncodingError> {
    let thread_id = thread.id;
    let roles = thread
        .roles
        .into_iter()
        .map(|(id, role)| Ok((id, decode_role_info(role)?)))
        .collect::<Result<BTreeMap<_, _>, CodecError>>()
        .map_err(|error| {
            tracing::warn!(
                event = "thread_info.decode",
                outcome = "invalid_role_code",
                thread_id = %thread_id,
                %error
            );
            error
        })?;
    let members = thread
        .members
        .into_iter()
        .map(|member| {
            let role_permissions = member
                .role
                .as_ref()
                .and_then(|role_id| roles.get(role_id))
                .map(|role| &role.permissions);
            decode_member_info(member, role_permissions, &thread_id)
        })
        .collect();

    Ok(LegacyThreadInfo {
        id: thread_id,
        thread_type: thread.thread_type,
        name: thread.name,
        description: thread.description,
        color: thread.color,
        creation_time: thread.creation_time,
        parent_thread_id: thread.parent_thread_id,
        containing_thread_id: thread.containing_thread_id,
        community: thread.community,
        members,
        roles,
        current_user: decode_current_user_info(thread.current_user),
        replies_count: thread.replies_count,
        pinned_count: thread.pinned_count,
        source_message_id: thread.source_message_id,
        avatar: thread.avatar,
        thick: thread.thick,
    })
}

/// Encodes an untyped thread info document. Role codes follow the key order
/// of each role blob in `value`.
///
/// # Errors
/// Returns [`EncodingError::AlreadyMinimallyEncoded`] when `value` already
/// carries the `minimallyEncoded` marker, and a schema or codec error when it
/// is not a valid legacy thread info.
pub fn encode_thread_info_json(
    value: &Value,
    options: &EncodeOptions,
) -> Result<Value, EncodingError> {
    if value.get(MINIMALLY_ENCODED_KEY).is_some() {
        return Err(EncodingError::AlreadyMinimallyEncoded);
    }
    let legacy = parse_legacy_thread_info(value)?;
    let encoded = encode_thread_info(legacy, options)?;
    Ok(serde_json::to_value(encoded).map_err(crate::SchemaError::from)?)
}

/// Decodes an untyped minimally encoded thread info document.
///
/// # Errors
/// Returns a schema error when `value` is not a compact thread info and a
/// codec error when a role code does not decode.
pub fn decode_thread_info_json(value: &Value) -> Result<Value, EncodingError> {
    let compact = parse_thread_info(value)?;
    let decoded = decode_thread_info(compact)?;
    Ok(serde_json::to_value(decoded).map_err(crate::SchemaError::from)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trellis_core::{
        CodecError, PermissionInfo, PermissionsBitmask, Provenance, RolePermissionsBlob,
        ThreadId, ThreadPermission,
    };

    use super::{
        decode_member_info, decode_role_info, decode_thread_info_json, encode_role_info,
        encode_thread_info, encode_thread_info_json, permissions_from_role, EncodeOptions,
    };
    use crate::records::{LegacyRoleInfo, MemberInfo, MinimallyEncoded, SpecialRole};
    use crate::EncodingError;

    fn members_role() -> LegacyRoleInfo {
        LegacyRoleInfo {
            id: String::from("85172"),
            name: String::from("Members"),
            permissions: [("know_of", true), ("visible", true), ("child_open_join_thread", true)]
                .into_iter()
                .collect(),
            is_default: Some(true),
            special_role: None,
        }
    }

    #[test]
    fn role_round_trip_is_lossless() {
        let encoded = encode_role_info(members_role()).unwrap();
        assert_eq!(encoded.is_default, Some(true));
        assert_eq!(encoded.special_role, None);
        let codes: Vec<String> = encoded.permissions.iter().map(ToString::to_string).collect();
        assert_eq!(codes, ["000", "010", "0a9"]);
        assert_eq!(decode_role_info(encoded).unwrap(), members_role());

        let admins = LegacyRoleInfo {
            id: String::from("85173"),
            name: String::from("Admins"),
            is_default: None,
            special_role: Some(SpecialRole::Admin),
            ..members_role()
        };
        let encoded = encode_role_info(admins.clone()).unwrap();
        assert_eq!(encoded.is_default, None);
        assert_eq!(decode_role_info(encoded).unwrap(), admins);
    }

    #[test]
    fn json_encode_follows_the_document_key_order() {
        let legacy = serde_json::from_str::<serde_json::Value>(
            r#"{
                "id": "85171",
                "type": 6,
                "color": "6d49ab",
                "creationTime": 0,
                "members": [],
                "roles": {
                    "85172": {
                        "id": "85172",
                        "name": "Members",
                        "permissions": {
                            "visible": true,
                            "know_of": true,
                            "child_open_join_thread": true
                        }
                    }
                },
                "currentUser": {
                    "role": null,
                    "permissions": {},
                    "subscription": { "home": false, "pushNotifs": false }
                },
                "repliesCount": 0
            }"#,
        )
        .unwrap();
        let encoded = encode_thread_info_json(&legacy, &EncodeOptions::default()).unwrap();
        assert_eq!(
            encoded["roles"]["85172"]["permissions"],
            json!(["010", "000", "0a9"])
        );

        let decoded = decode_thread_info_json(&encoded).unwrap();
        assert_eq!(
            serde_json::to_string(&decoded["roles"]["85172"]["permissions"]).unwrap(),
            r#"{"visible":true,"know_of":true,"child_open_join_thread":true}"#
        );
    }

    #[test]
    fn unknown_role_permission_fails_the_role() {
        let mut role = members_role();
        role.permissions.insert("child_summon_dragons", true);
        assert_eq!(
            encode_role_info(role),
            Err(CodecError::UnknownRolePermission(String::from(
                "child_summon_dragons"
            )))
        );
    }

    #[test]
    fn thin_member_permissions_come_from_the_role() {
        let thread_id = ThreadId::try_from("85171").unwrap();
        let member = MemberInfo {
            minimally_encoded: MinimallyEncoded,
            id: String::from("83853"),
            role: Some(String::from("85172")),
            permissions: None,
            is_sender: true,
            subscription: None,
        };
        let role = members_role();
        let decoded = decode_member_info(member, Some(&role.permissions), &thread_id);
        assert_eq!(
            decoded.permissions.get(ThreadPermission::Visible),
            Some(&PermissionInfo::granted_by(thread_id.clone()))
        );
        assert_eq!(
            decoded.permissions.get(ThreadPermission::JoinThread),
            Some(&PermissionInfo::NotGranted)
        );
        assert_eq!(decoded.permissions.len(), 25);
    }

    #[test]
    fn role_without_know_of_grants_nothing() {
        let thread_id = ThreadId::try_from("1").unwrap();
        let blob: RolePermissionsBlob = [("visible", true), ("voiced", true)].into_iter().collect();
        let permissions = permissions_from_role(Some(&blob), &thread_id);
        assert!(permissions.iter().all(|(_, info)| !info.value()));
        assert!(permissions_from_role(None, &thread_id)
            .iter()
            .all(|(_, info)| !info.value()));
    }

    #[test]
    fn explicit_bitmask_wins_over_the_role() {
        let thread_id = ThreadId::try_from("1").unwrap();
        let member = MemberInfo {
            minimally_encoded: MinimallyEncoded,
            id: String::from("256"),
            role: None,
            permissions: Some(PermissionsBitmask::from_bits(0b11)),
            is_sender: false,
            subscription: None,
        };
        let decoded = decode_member_info(member, None, &thread_id);
        assert_eq!(
            decoded.permissions.get(ThreadPermission::Visible),
            Some(&PermissionInfo::Granted(Provenance::Unknown))
        );
    }

    #[test]
    fn json_encode_refuses_compact_input() {
        let compact = json!({ "minimallyEncoded": true, "id": "1" });
        assert_eq!(
            encode_thread_info_json(&compact, &EncodeOptions::default()),
            Err(EncodingError::AlreadyMinimallyEncoded)
        );
    }

    #[test]
    fn strip_option_is_ignored_for_thick_threads() {
        let thread = serde_json::from_value(json!({
            "id": "t1",
            "type": 13,
            "color": "6d49ab",
            "creationTime": 1,
            "members": [{
                "id": "256",
                "role": null,
                "permissions": { "know_of": { "value": true, "source": "t1" } },
                "isSender": false,
                "subscription": { "home": true, "pushNotifs": false },
            }],
            "roles": {},
            "currentUser": {
                "role": null,
                "permissions": {},
                "subscription": { "home": true, "pushNotifs": false },
            },
            "repliesCount": 0,
            "thick": true,
        }))
        .unwrap();
        let options = EncodeOptions {
            strip_member_permissions: true,
        };
        let encoded = encode_thread_info(thread, &options).unwrap();
        assert_eq!(
            encoded.members[0].permissions,
            Some(PermissionsBitmask::from_bits(1))
        );
    }
}
