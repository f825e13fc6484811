//! Pure permission derivation over the current room record and user.
//! Recomputed on every render need; inputs are cheap, so nothing is cached.

use shared::domain::{RoomRecord, RoomRole, RoomType, UserContext};

use crate::ViewState;

/// A room is owned when any role entry carries the owner value.
pub fn is_owner(room: &RoomRecord) -> bool {
    room.roles.iter().any(|entry| entry.value == RoomRole::Owner)
}

pub fn is_muted(room: &RoomRecord, user: &UserContext) -> bool {
    room.muted.iter().any(|username| username == &user.username)
}

/// Write-blocking rule as shipped: a poster is blocked only when the room is
/// read-only AND the poster is muted AND not an owner. `ro` alone does not
/// block an unmuted member.
pub fn is_read_only(room: &RoomRecord, user: &UserContext) -> bool {
    room.read_only && is_muted(room, user) && !is_owner(room)
}

/// Block semantics exist only on direct rooms, in either direction.
pub fn is_blocked(room: &RoomRecord) -> bool {
    room.kind == RoomType::Direct && (room.blocked || room.blocker)
}

/// A room with no local subscription record is in preview mode.
pub fn is_joined(cache_has_local_record: bool) -> bool {
    cache_has_local_record
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterMode {
    Join,
    ReadOnly,
    Blocked,
    Composer,
}

/// Which footer affordance the rendering layer should show, in precedence
/// order: join prompt, read-only banner, blocked banner, composer.
pub fn footer_mode(view: &ViewState, user: &UserContext) -> FooterMode {
    if !view.joined {
        return FooterMode::Join;
    }
    if view.room.archived || is_read_only(&view.room, user) {
        return FooterMode::ReadOnly;
    }
    if is_blocked(&view.room) {
        return FooterMode::Blocked;
    }
    FooterMode::Composer
}

#[cfg(test)]
#[path = "tests/permissions_tests.rs"]
mod tests;
