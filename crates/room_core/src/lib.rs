//! Room view core: keeps one chat room's state synchronized between the
//! local cache and the remote messaging service, paginates older history on
//! demand, and derives the permission state that gates user actions.
//!
//! The controller is headless. Rendering, message-list virtualization and
//! composer UI are collaborators behind the ports defined here; they observe
//! the view through [`RoomController::subscribe_events`] and drive it through
//! the `on_*` entry points.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use room_cache::{CacheChange, RoomCache};
use shared::{
    domain::{MessageId, MessageRecord, RoomId, RoomRecord, RoomType, UserContext},
    protocol::{HistoryRequest, JoinRoomResponse, RoomInfoResponse},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

pub mod http_gateway;
pub mod pagination;
pub mod permissions;

use pagination::PaginationEngine;
use permissions::FooterMode;

pub const DEFAULT_PAGE_SIZE: usize = 50;
const VIEW_EVENT_CAPACITY: usize = 64;

/// Remote operations the room view needs from the messaging service. Every
/// call is an independent request/response exchange; no ordering between
/// calls is assumed.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Probe room metadata. Inaccessible rooms answer `success: false`
    /// rather than an error.
    async fn get_room_info(&self, rid: &RoomId) -> Result<RoomInfoResponse>;
    async fn join_room(&self, rid: &RoomId) -> Result<JoinRoomResponse>;
    async fn toggle_favorite(&self, rid: &RoomId, favorite: bool) -> Result<()>;
    async fn load_missed_messages(&self, room: &RoomRecord) -> Result<()>;
    async fn read_messages(&self, rid: &RoomId) -> Result<()>;
    /// Fetch one page of history older than `request.latest`. Returning
    /// fewer than `request.count` messages signals end-of-history.
    async fn load_history(&self, request: HistoryRequest) -> Result<Vec<MessageRecord>>;
    async fn send_message(&self, rid: &RoomId, msg: &str) -> Result<()>;
    async fn set_reaction(&self, shortcode: &str, message_id: &MessageId) -> Result<()>;
}

pub struct MissingRemoteGateway;

#[async_trait]
impl RemoteGateway for MissingRemoteGateway {
    async fn get_room_info(&self, rid: &RoomId) -> Result<RoomInfoResponse> {
        Err(anyhow!("remote gateway unavailable for room {rid}"))
    }

    async fn join_room(&self, rid: &RoomId) -> Result<JoinRoomResponse> {
        Err(anyhow!("remote gateway unavailable for room {rid}"))
    }

    async fn toggle_favorite(&self, rid: &RoomId, _favorite: bool) -> Result<()> {
        Err(anyhow!("remote gateway unavailable for room {rid}"))
    }

    async fn load_missed_messages(&self, room: &RoomRecord) -> Result<()> {
        Err(anyhow!("remote gateway unavailable for room {}", room.rid))
    }

    async fn read_messages(&self, rid: &RoomId) -> Result<()> {
        Err(anyhow!("remote gateway unavailable for room {rid}"))
    }

    async fn load_history(&self, request: HistoryRequest) -> Result<Vec<MessageRecord>> {
        Err(anyhow!("remote gateway unavailable for room {}", request.rid))
    }

    async fn send_message(&self, rid: &RoomId, _msg: &str) -> Result<()> {
        Err(anyhow!("remote gateway unavailable for room {rid}"))
    }

    async fn set_reaction(&self, _shortcode: &str, message_id: &MessageId) -> Result<()> {
        Err(anyhow!(
            "remote gateway unavailable for message {message_id}"
        ))
    }
}

/// Cross-cutting intents the controller dispatches into the surrounding
/// application, passed at construction instead of a process-wide store.
pub trait RoomIntents: Send + Sync {
    fn open_room(&self, room: RoomRecord);
    fn set_last_open(&self, last_open: Option<DateTime<Utc>>);
    fn toggle_reaction_picker(&self, message: Option<MessageRecord>);
    fn show_message_actions(&self, message: MessageRecord);
    fn close_room(&self);
}

/// Header/navigation boundary: receives affordance updates and owns the
/// room-actions screen the "more" affordance pushes.
pub trait HeaderPort: Send + Sync {
    fn set_actions(&self, actions: Vec<HeaderAction>);
    fn push_room_actions(&self, rid: &RoomId);
}

/// Read side of the local cache as the controller sees it.
pub trait RoomStateSource: Send + Sync {
    fn room(&self, rid: &RoomId) -> Option<RoomRecord>;
    fn changes(&self) -> broadcast::Receiver<CacheChange>;
}

impl RoomStateSource for RoomCache {
    fn room(&self, rid: &RoomId) -> Option<RoomRecord> {
        RoomCache::room(self, rid)
    }

    fn changes(&self) -> broadcast::Receiver<CacheChange> {
        RoomCache::changes(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderActionId {
    More,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderIcon {
    More,
    Star,
    StarOutline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderAction {
    pub id: HeaderActionId,
    pub icon: HeaderIcon,
}

/// The header affordance set for a room: a star reflecting the favorite
/// state, preceded by "more actions" for every room type except livechat.
pub fn header_actions_for(room: &RoomRecord) -> Vec<HeaderAction> {
    let mut actions = vec![HeaderAction {
        id: HeaderActionId::Star,
        icon: if room.favorite {
            HeaderIcon::Star
        } else {
            HeaderIcon::StarOutline
        },
    }];
    if room.kind != RoomType::Livechat {
        actions.insert(
            0,
            HeaderAction {
                id: HeaderActionId::More,
                icon: HeaderIcon::More,
            },
        );
    }
    actions
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppState {
    Foreground,
    #[default]
    Background,
}

/// Externally-owned props mirrored from the surrounding application store.
#[derive(Debug, Clone, Default)]
pub struct ExternalProps {
    /// The message the reaction picker / actions menu was opened for.
    pub action_message: Option<MessageRecord>,
    pub show_actions: bool,
    pub show_error_actions: bool,
    pub app_state: AppState,
}

/// Snapshot handed to the rendering layer. The room record is a copy, never
/// a live cache reference, so async mutation cannot tear a render.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub loaded: bool,
    pub joined: bool,
    pub room: RoomRecord,
    pub end: bool,
    pub loading_more: bool,
}

#[derive(Debug, Clone)]
pub enum RoomViewEvent {
    /// One of the re-render gate fields changed; the carried state is the
    /// post-change snapshot.
    Invalidated(ViewState),
    Closed,
}

/// The exact field set whose changes may re-render the view. Churn outside
/// this set (unread counts, name edits, role changes) must not invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RenderGate {
    read_only: bool,
    favorite: bool,
    blocked: bool,
    blocker: bool,
    archived: bool,
    loaded: bool,
    joined: bool,
    end: bool,
    loading_more: bool,
    show_actions: bool,
    show_error_actions: bool,
    app_state: AppState,
}

impl RenderGate {
    fn of(view: &ViewState, props: &ExternalProps) -> Self {
        Self {
            read_only: view.room.read_only,
            favorite: view.room.favorite,
            blocked: view.room.blocked,
            blocker: view.room.blocker,
            archived: view.room.archived,
            loaded: view.loaded,
            joined: view.joined,
            end: view.end,
            loading_more: view.loading_more,
            show_actions: props.show_actions,
            show_error_actions: props.show_error_actions,
            app_state: props.app_state,
        }
    }

    fn capture(state: &ControllerState) -> Self {
        Self {
            read_only: state.room.read_only,
            favorite: state.room.favorite,
            blocked: state.room.blocked,
            blocker: state.room.blocker,
            archived: state.room.archived,
            loaded: state.loaded,
            joined: state.joined,
            end: state.pagination.end(),
            loading_more: state.pagination.loading_more(),
            show_actions: state.props.show_actions,
            show_error_actions: state.props.show_error_actions,
            app_state: state.props.app_state,
        }
    }
}

/// Whether the rendering layer must be told about a state transition. Only
/// the declared gate fields participate; any other churn is ignored.
pub fn needs_render(
    prev_view: &ViewState,
    prev_props: &ExternalProps,
    next_view: &ViewState,
    next_props: &ExternalProps,
) -> bool {
    RenderGate::of(prev_view, prev_props) != RenderGate::of(next_view, next_props)
}

/// Whether the first authoritative cache snapshot has been published yet.
/// Tracked explicitly rather than inferred from room-id nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotPhase {
    NotYetSeen,
    Seen,
}

struct ControllerState {
    room: RoomRecord,
    loaded: bool,
    joined: bool,
    pagination: PaginationEngine,
    props: ExternalProps,
    snapshot_phase: SnapshotPhase,
    closed: bool,
    cache_task: Option<JoinHandle<()>>,
}

fn view_of(state: &ControllerState) -> ViewState {
    ViewState {
        loaded: state.loaded,
        joined: state.joined,
        room: state.room.clone(),
        end: state.pagination.end(),
        loading_more: state.pagination.loading_more(),
    }
}

pub struct RoomController {
    rid: RoomId,
    user: UserContext,
    cache: Arc<dyn RoomStateSource>,
    gateway: Arc<dyn RemoteGateway>,
    intents: Arc<dyn RoomIntents>,
    header: Arc<dyn HeaderPort>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<RoomViewEvent>,
}

impl RoomController {
    pub fn new(
        rid: RoomId,
        user: UserContext,
        cache: Arc<dyn RoomStateSource>,
        gateway: Arc<dyn RemoteGateway>,
        intents: Arc<dyn RoomIntents>,
        header: Arc<dyn HeaderPort>,
    ) -> Arc<Self> {
        Self::with_page_size(rid, user, cache, gateway, intents, header, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        rid: RoomId,
        user: UserContext,
        cache: Arc<dyn RoomStateSource>,
        gateway: Arc<dyn RemoteGateway>,
        intents: Arc<dyn RoomIntents>,
        header: Arc<dyn HeaderPort>,
        page_size: usize,
    ) -> Arc<Self> {
        let joined = cache.room(&rid).is_some();
        let (events, _) = broadcast::channel(VIEW_EVENT_CAPACITY);
        Arc::new(Self {
            rid,
            user,
            cache,
            gateway,
            intents,
            header,
            inner: Mutex::new(ControllerState {
                room: RoomRecord::default(),
                loaded: false,
                joined,
                pagination: PaginationEngine::new(page_size),
                props: ExternalProps::default(),
                snapshot_phase: SnapshotPhase::NotYetSeen,
                closed: false,
                cache_task: None,
            }),
            events,
        })
    }

    pub fn rid(&self) -> &RoomId {
        &self.rid
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RoomViewEvent> {
        self.events.subscribe()
    }

    pub async fn view_state(&self) -> ViewState {
        view_of(&*self.inner.lock().await)
    }

    pub async fn footer_mode(&self) -> FooterMode {
        let view = self.view_state().await;
        permissions::footer_mode(&view, &self.user)
    }

    /// Mounting: probe the remote service when the room has no local record,
    /// attach the cache listener, then mark the view loaded. `loaded` flips
    /// unconditionally; a failed probe just leaves the room in preview mode.
    pub async fn mount(self: &Arc<Self>) {
        if self.cache.room(&self.rid).is_none() {
            match self.gateway.get_room_info(&self.rid).await {
                Ok(RoomInfoResponse {
                    success: true,
                    room: Some(room),
                }) => {
                    self.seed_preview_room(room).await;
                }
                Ok(_) => {
                    info!(rid = %self.rid, "room: info probe denied, staying in preview");
                }
                Err(err) => {
                    warn!(rid = %self.rid, "room: info probe failed: {err}");
                }
            }
        }

        self.attach_cache_listener().await;

        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        let before = RenderGate::capture(&inner);
        inner.loaded = true;
        self.header.set_actions(header_actions_for(&inner.room));
        self.publish_if_changed(&inner, before);
    }

    /// Detach the cache listener and emit the close intent, exactly once.
    /// Already-dispatched network calls are not cancelled; their settlement
    /// is dropped against the closed controller.
    pub async fn unmount(&self) {
        let task = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.cache_task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        self.intents.close_room();
        let _ = self.events.send(RoomViewEvent::Closed);
    }

    /// Mirror externally-owned props into the controller. A transition into
    /// the foreground kicks off best-effort missed-message and read-receipt
    /// sync.
    pub async fn update_props(&self, next: ExternalProps) {
        let resumed_room = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return;
            }
            let before = RenderGate::capture(&inner);
            let resumed = next.app_state == AppState::Foreground
                && inner.props.app_state != AppState::Foreground;
            inner.props = next;
            self.publish_if_changed(&inner, before);
            resumed.then(|| inner.room.clone())
        };
        if let Some(room) = resumed_room {
            self.sync_on_resume(room);
        }
    }

    /// Entry point for the list collaborator when scroll nears the oldest
    /// loaded row. A call with no anchor, while a fetch is in flight, or
    /// after history is exhausted is a no-op.
    pub async fn on_end_reached(&self, anchor: Option<&MessageRecord>) {
        let Some(anchor) = anchor else {
            return;
        };

        let request = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return;
            }
            let before = RenderGate::capture(&inner);
            if !inner.pagination.try_begin() {
                return;
            }
            self.publish_if_changed(&inner, before);
            HistoryRequest {
                rid: self.rid.clone(),
                kind: inner.room.kind,
                latest: anchor.ts,
                count: inner.pagination.page_size() as u32,
            }
        };

        let result = self.gateway.load_history(request).await;

        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        let before = RenderGate::capture(&inner);
        match result {
            Ok(messages) => inner.pagination.complete(messages.len()),
            Err(err) => {
                inner.pagination.fail();
                warn!(rid = %self.rid, "room: load history failed: {err}");
            }
        }
        self.publish_if_changed(&inner, before);
    }

    /// Forward one composed message; the "resume from last read" marker is
    /// cleared once the send settles.
    pub async fn send_message(&self, msg: &str) {
        if let Err(err) = self.gateway.send_message(&self.rid, msg).await {
            warn!(rid = %self.rid, "room: send message failed: {err}");
        }
        self.intents.set_last_open(None);
    }

    /// Join from preview mode. On failure the view stays in preview.
    pub async fn join_room(&self) {
        match self.gateway.join_room(&self.rid).await {
            Ok(JoinRoomResponse { success: true }) => {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    return;
                }
                let before = RenderGate::capture(&inner);
                inner.joined = true;
                self.publish_if_changed(&inner, before);
            }
            Ok(_) => {}
            Err(err) => warn!(rid = %self.rid, "room: join failed: {err}"),
        }
    }

    pub fn on_message_long_press(&self, message: MessageRecord) {
        self.intents.show_message_actions(message);
    }

    /// Toggle a reaction. Without an explicit target the reaction applies to
    /// the message the picker was opened for and the picker is closed on
    /// success; with a target only the reaction is set. Errors never force
    /// the picker closed.
    pub async fn on_reaction_press(&self, shortcode: &str, message_id: Option<&MessageId>) {
        match message_id {
            Some(message_id) => {
                if let Err(err) = self.gateway.set_reaction(shortcode, message_id).await {
                    warn!(rid = %self.rid, "room: set reaction failed: {err}");
                }
            }
            None => {
                let action_message = { self.inner.lock().await.props.action_message.clone() };
                let Some(message) = action_message else {
                    warn!(rid = %self.rid, "room: reaction pressed with no active message");
                    return;
                };
                match self.gateway.set_reaction(shortcode, &message.id).await {
                    Ok(()) => self.intents.toggle_reaction_picker(None),
                    Err(err) => warn!(rid = %self.rid, "room: set reaction failed: {err}"),
                }
            }
        }
    }

    /// Dispatch a named header action event.
    pub async fn header_action(&self, action: HeaderActionId) {
        match action {
            HeaderActionId::More => self.header.push_room_actions(&self.rid),
            HeaderActionId::Star => {
                let favorite = !self.inner.lock().await.room.favorite;
                if let Err(err) = self.gateway.toggle_favorite(&self.rid, favorite).await {
                    // The cache listener is the eventual source of truth; no rollback.
                    warn!(rid = %self.rid, "room: toggle favorite failed: {err}");
                }
            }
        }
    }

    async fn seed_preview_room(&self, room: RoomRecord) {
        let seed = RoomRecord::preview_seed(room.rid, room.kind, room.name);
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        let before = RenderGate::capture(&inner);
        inner.room = seed.clone();
        inner.joined = false;
        inner.snapshot_phase = SnapshotPhase::Seen;
        self.intents.open_room(seed);
        self.publish_if_changed(&inner, before);
    }

    async fn attach_cache_listener(self: &Arc<Self>) {
        let mut rx = self.cache.changes();

        // Deliver the current snapshot before steady-state notifications so
        // a room already present in the cache opens immediately.
        if let Some(room) = self.cache.room(&self.rid) {
            self.on_cache_change(Some(room)).await;
        }

        let controller = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        if change.rid != controller.rid {
                            continue;
                        }
                        controller.on_cache_change(change.room).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            rid = %controller.rid,
                            skipped, "room: cache feed lagged, re-reading snapshot"
                        );
                        let snapshot = controller.cache.room(&controller.rid);
                        controller.on_cache_change(snapshot).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut inner = self.inner.lock().await;
        if inner.closed {
            task.abort();
            return;
        }
        inner.cache_task = Some(task);
    }

    /// Apply one authoritative cache snapshot. The first snapshot for this
    /// mount publishes the open-room and last-open intents; a vanished
    /// record is the "left room" transition.
    async fn on_cache_change(&self, room: Option<RoomRecord>) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        let before = RenderGate::capture(&inner);
        let favorite_before = inner.room.favorite;

        match room {
            Some(room) => {
                inner.room = room.clone();
                if inner.snapshot_phase == SnapshotPhase::NotYetSeen {
                    inner.snapshot_phase = SnapshotPhase::Seen;
                    self.intents.open_room(room.clone());
                    let last_open = if room.has_unread_activity() {
                        room.last_seen
                    } else {
                        None
                    };
                    self.intents.set_last_open(last_open);
                }
                if favorite_before != inner.room.favorite {
                    self.header.set_actions(header_actions_for(&inner.room));
                }
            }
            None => {
                // Republish the last known record so collaborators can clear
                // their per-room state.
                self.intents.open_room(inner.room.clone());
                inner.joined = false;
            }
        }

        self.publish_if_changed(&inner, before);
    }

    fn sync_on_resume(&self, room: RoomRecord) {
        let rid = room.rid.clone();
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(err) = gateway.load_missed_messages(&room).await {
                warn!(rid = %room.rid, "room: missed message sync failed: {err}");
            }
        });
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(err) = gateway.read_messages(&rid).await {
                warn!(rid = %rid, "room: read receipt sync failed: {err}");
            }
        });
    }

    fn publish_if_changed(&self, inner: &ControllerState, before: RenderGate) {
        if RenderGate::capture(inner) != before {
            let _ = self.events.send(RoomViewEvent::Invalidated(view_of(inner)));
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
