use std::sync::{Arc, OnceLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use room_cache::RoomCache;
use room_core::{
    http_gateway::HttpRemoteGateway, AppState, ExternalProps, HeaderAction, HeaderPort,
    RoomController, RoomIntents, RoomViewEvent,
};
use shared::domain::{MessageRecord, RoomId, RoomRecord, UserContext, UserId};
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: String,
    #[arg(long)]
    rid: String,
    #[arg(long)]
    user_id: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    token: String,
    #[arg(long, default_value = "sqlite://room-cache.db")]
    cache_url: String,
    #[arg(long, default_value_t = room_core::DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// Optional message to send once the room is open.
    #[arg(long)]
    send: Option<String>,
}

struct StoreIntents;

impl RoomIntents for StoreIntents {
    fn open_room(&self, room: RoomRecord) {
        info!(rid = %room.rid, name = %room.name, "intent: open room");
    }

    fn set_last_open(&self, last_open: Option<DateTime<Utc>>) {
        info!(?last_open, "intent: set last open");
    }

    fn toggle_reaction_picker(&self, message: Option<MessageRecord>) {
        let message_id = message.as_ref().map(|m| m.id.as_str()).unwrap_or("-");
        info!(message_id, "intent: toggle reaction picker");
    }

    fn show_message_actions(&self, message: MessageRecord) {
        info!(message = %message.id, "intent: show message actions");
    }

    fn close_room(&self) {
        info!("intent: close room");
    }
}

struct RoomActionsScreen;

impl RoomActionsScreen {
    fn register() -> Self {
        info!("navigation: registered room actions screen");
        Self
    }

    fn push(&self, rid: &RoomId) {
        info!(rid = %rid, "navigation: pushed room actions");
    }
}

/// Navigation-layer header. The room-actions screen is heavyweight, so it is
/// constructed exactly once, on first use of the "more" affordance.
struct NavigationHeader {
    room_actions: OnceLock<RoomActionsScreen>,
}

impl HeaderPort for NavigationHeader {
    fn set_actions(&self, actions: Vec<HeaderAction>) {
        info!(?actions, "header: actions updated");
    }

    fn push_room_actions(&self, rid: &RoomId) {
        self.room_actions
            .get_or_init(RoomActionsScreen::register)
            .push(rid);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let user = UserContext {
        id: UserId::new(args.user_id),
        username: args.username,
        token: args.token,
    };
    let cache = Arc::new(RoomCache::open(&args.cache_url).await?);
    let gateway = Arc::new(HttpRemoteGateway::new(&args.server_url, user.clone())?);
    let intents = Arc::new(StoreIntents);
    let header = Arc::new(NavigationHeader {
        room_actions: OnceLock::new(),
    });

    let controller = RoomController::with_page_size(
        RoomId::new(args.rid),
        user,
        cache,
        gateway,
        intents,
        header,
        args.page_size,
    );
    let mut events = controller.subscribe_events();

    controller.mount().await;
    controller
        .update_props(ExternalProps {
            app_state: AppState::Foreground,
            ..ExternalProps::default()
        })
        .await;

    let view = controller.view_state().await;
    println!(
        "room {} loaded={} joined={} footer={:?}",
        view.room.rid,
        view.loaded,
        view.joined,
        controller.footer_mode().await
    );

    if let Some(msg) = args.send {
        controller.send_message(&msg).await;
        println!("sent: {msg}");
    }

    while let Ok(event) = events.try_recv() {
        if let RoomViewEvent::Invalidated(view) = event {
            println!(
                "view invalidated: loaded={} joined={} end={} loading_more={}",
                view.loaded, view.joined, view.end, view.loading_more
            );
        }
    }

    controller.unmount().await;
    Ok(())
}
