use super::*;
use shared::domain::{RoleEntry, RoomId, UserId};

fn bob() -> UserContext {
    UserContext {
        id: UserId::new("u-bob"),
        username: "bob".to_string(),
        token: "secret".to_string(),
    }
}

fn room() -> RoomRecord {
    RoomRecord {
        rid: RoomId::new("R1"),
        ..RoomRecord::default()
    }
}

fn owner_entry(user: &str) -> RoleEntry {
    RoleEntry {
        user: user.to_string(),
        value: RoomRole::Owner,
    }
}

#[test]
fn muted_non_owner_in_read_only_room_cannot_post() {
    let mut room = room();
    room.read_only = true;
    room.muted = vec!["bob".to_string()];

    assert!(is_read_only(&room, &bob()));
}

#[test]
fn owner_role_overrides_read_only_and_mute() {
    let mut room = room();
    room.read_only = true;
    room.muted = vec!["bob".to_string()];
    room.roles = vec![owner_entry("bob")];

    assert!(!is_read_only(&room, &bob()));
}

#[test]
fn read_only_flag_alone_does_not_block_an_unmuted_member() {
    let mut room = room();
    room.read_only = true;

    assert!(!is_read_only(&room, &bob()));
}

#[test]
fn read_only_implies_the_ro_flag() {
    for ro in [false, true] {
        for muted in [false, true] {
            for owner in [false, true] {
                let mut room = room();
                room.read_only = ro;
                if muted {
                    room.muted = vec!["bob".to_string()];
                }
                if owner {
                    room.roles = vec![owner_entry("bob")];
                }
                if is_read_only(&room, &bob()) {
                    assert!(room.read_only);
                }
            }
        }
    }
}

#[test]
fn block_semantics_exist_only_on_direct_rooms() {
    for kind in [RoomType::Channel, RoomType::Private, RoomType::Livechat] {
        let mut room = room();
        room.kind = kind;
        room.blocked = true;
        room.blocker = true;
        assert!(!is_blocked(&room));
    }

    let mut direct = room();
    direct.kind = RoomType::Direct;
    assert!(!is_blocked(&direct));
    direct.blocked = true;
    assert!(is_blocked(&direct));
    direct.blocked = false;
    direct.blocker = true;
    assert!(is_blocked(&direct));
}

#[test]
fn ownership_is_derived_from_any_owner_entry() {
    let mut room = room();
    assert!(!is_owner(&room));

    room.roles = vec![RoleEntry {
        user: "alice".to_string(),
        value: RoomRole::Moderator,
    }];
    assert!(!is_owner(&room));

    room.roles.push(owner_entry("alice"));
    assert!(is_owner(&room));
}

#[test]
fn mute_matches_on_username() {
    let mut room = room();
    room.muted = vec!["alice".to_string()];
    assert!(!is_muted(&room, &bob()));
    room.muted.push("bob".to_string());
    assert!(is_muted(&room, &bob()));
}

#[test]
fn joined_mirrors_the_local_record_presence() {
    assert!(is_joined(true));
    assert!(!is_joined(false));
}

#[test]
fn footer_shows_join_prompt_in_preview_mode() {
    let view = ViewState {
        loaded: true,
        joined: false,
        room: {
            let mut room = room();
            room.kind = RoomType::Direct;
            room.blocked = true;
            room
        },
        end: false,
        loading_more: false,
    };
    // Preview wins even over a blocked direct room.
    assert_eq!(footer_mode(&view, &bob()), FooterMode::Join);
}

#[test]
fn footer_precedence_read_only_then_blocked_then_composer() {
    let mut view = ViewState {
        loaded: true,
        joined: true,
        room: room(),
        end: false,
        loading_more: false,
    };

    view.room.archived = true;
    assert_eq!(footer_mode(&view, &bob()), FooterMode::ReadOnly);

    view.room.archived = false;
    view.room.kind = RoomType::Direct;
    view.room.blocker = true;
    assert_eq!(footer_mode(&view, &bob()), FooterMode::Blocked);

    view.room.blocker = false;
    assert_eq!(footer_mode(&view, &bob()), FooterMode::Composer);
}
