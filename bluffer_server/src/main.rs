use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::{SinkExt, stream::StreamExt};
use parking_lot::Mutex as P_Mutex;
use serde_json::json;
use tokio::sync::{RwLock, mpsc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use bluffer_core::autoplay::fill_with_bots;
use bluffer_core::room::allocate_room_code;
use bluffer_core::{
    ClientMessage, JoinStatus, PlayerAction, PlayerId, PlayerSecret, PrivateState, PublicState, Room, RoomCode,
    ServerMessage, TurnDirection,
};

mod config;
mod dev;

use config::Config;

// 服务器全局状态
pub(crate) struct AppState {
    rooms: DashMap<RoomCode, Arc<RoomHandle>>,
    dev_mode: bool,
    channel_capacity: usize,
}

// 单个房间
// 重要‼️：严格规定使用锁的顺序，避免死锁：
// players -> room
// room 是同步锁，绝不能跨 .await 持有
pub(crate) struct RoomHandle {
    room: P_Mutex<Room>,
    // 将 PlayerId 映射到具体的网络连接（机器人没有连接）
    players: RwLock<HashMap<PlayerId, PlayerConnection>>,
    // 自动出牌运行期间拒绝玩家的游戏动作
    autoplay: AtomicBool,
}

// 玩家的网络连接信息
pub(crate) struct PlayerConnection {
    secret: PlayerSecret,
    // 用于向该玩家的 WebSocket 任务发送消息的通道，断线后为 None，等待重连
    sender: Option<mpsc::Sender<ServerMessage>>,
}

/// 一次变更之后要发出的全部消息，在持有房间锁时生成
pub(crate) struct RoomUpdate {
    event: Option<ServerMessage>,
    public: PublicState,
    private: Vec<PrivateState>,
}

type SharedState = Arc<AppState>;
type PlayerContext = Option<(RoomCode, PlayerId)>;

impl AppState {
    fn new(config: &Config) -> Self {
        AppState {
            rooms: DashMap::new(),
            dev_mode: config.dev_mode,
            channel_capacity: config.channel_capacity,
        }
    }

    fn room(&self, room_code: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.get(room_code).map(|r| r.value().clone())
    }
}

impl RoomHandle {
    fn new(room: Room, host_id: PlayerId, secret: PlayerSecret, sender: mpsc::Sender<ServerMessage>) -> Self {
        let mut players = HashMap::new();
        players.insert(host_id, PlayerConnection { secret, sender: Some(sender) });
        RoomHandle {
            room: P_Mutex::new(room),
            players: RwLock::new(players),
            autoplay: AtomicBool::new(false),
        }
    }

    fn autoplay_running(&self) -> bool {
        self.autoplay.load(Ordering::Acquire)
    }
}

impl RoomUpdate {
    fn capture(room: &Room, event: Option<ServerMessage>) -> Self {
        RoomUpdate {
            event,
            public: room.public_state(),
            private: room.join_order().iter().filter_map(|id| room.private_state(id)).collect(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    if config.dev_mode {
        info!("开发模式已开启");
    }

    let state = SharedState::new(AppState::new(&config));
    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("无法监听 {}", config.bind))?;
    info!("服务器正在监听 {}", config.bind);
    axum::serve(listener, app).await.context("服务器异常退出")?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，用于从其他任务接收要发送的消息
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.channel_capacity);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(p) => p,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    // 当前连接的上下文信息，创建/加入房间后填充
    let mut player_context: PlayerContext = None;

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(client_msg, state.clone(), &tx, &mut player_context).await;
                }
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                    let _ = tx.send(ServerMessage::error(format!("无效的消息: {}", e))).await;
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // 客户端断开连接，执行清理工作
    if let Some((room_code, player_id)) = player_context {
        handle_disconnect(state, room_code, player_id).await;
    }
    info!("客户端连接关闭");
}

/// 核心消息处理逻辑
async fn handle_client_message(
    msg: ClientMessage,
    state: SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut PlayerContext,
) {
    if msg.is_dev() && !state.dev_mode {
        let _ = tx.send(ServerMessage::error("开发模式未开启")).await;
        return;
    }

    match msg {
        ClientMessage::CreateRoom { nickname, deck_count, direction } => {
            create_room(&state, tx, context, &nickname, deck_count, direction, None).await;
        }
        ClientMessage::DevSeedRoom { nickname, player_count, deck_count, direction } => {
            create_room(&state, tx, context, &nickname, deck_count, direction, Some(player_count)).await;
        }
        ClientMessage::JoinRoom { room_code, nickname } => {
            join_room(&state, tx, context, &room_code, &nickname).await;
        }
        ClientMessage::RejoinRoom { room_code, player_id, secret } => {
            rejoin_room(&state, tx, context, &room_code, player_id, secret).await;
        }
        // 其他消息都需要先进入房间
        msg => {
            let Some((room_code, player_id)) = context.clone() else {
                let _ = tx.send(ServerMessage::error("请先加入或创建房间")).await;
                return;
            };
            let Some(handle) = state.room(&room_code) else {
                let _ = tx.send(ServerMessage::RoomNotFound { room_code }).await;
                return;
            };

            match msg {
                ClientMessage::StartGame => start_game(&handle, tx, player_id).await,
                ClientMessage::DevAutoplay { delay_ms, max_steps, seed } => {
                    if handle
                        .autoplay
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                    {
                        let _ = tx.send(ServerMessage::error("该房间的自动出牌已在运行")).await;
                        return;
                    }
                    info!("房间 {} 开始自动出牌 (delay={}ms, max_steps={})", room_code, delay_ms, max_steps);
                    let _ = tx
                        .send(ServerMessage::DevAutoplayStarted { room_code, delay_ms, max_steps })
                        .await;
                    tokio::spawn(dev::run_autoplay(handle, delay_ms, max_steps, seed));
                }
                other => match other.to_action() {
                    Some(action) => perform_action(&handle, tx, player_id, action).await,
                    None => {
                        let _ = tx.send(ServerMessage::error("不支持的消息")).await;
                    }
                },
            }
        }
    }
}

/// 创建房间。带 bots_to 时用机器人补满到该人数（dev_seed_room）
async fn create_room(
    state: &SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut PlayerContext,
    nickname: &str,
    deck_count: u8,
    direction: TurnDirection,
    bots_to: Option<usize>,
) {
    if context.is_some() {
        let _ = tx.send(ServerMessage::error("你已经在一个房间里了")).await;
        return;
    }

    let player_id = Uuid::new_v4();
    let player_secret = Uuid::new_v4();

    let mut room = match Room::create(RoomCode::new(), player_id, nickname, deck_count, direction) {
        Ok(room) => room,
        Err(e) => {
            let _ = tx.send(ServerMessage::invalid_action(e)).await;
            return;
        }
    };
    if let Some(player_count) = bots_to {
        let seeded = fill_with_bots(&mut room, player_count, &mut rand::rng());
        if let Err(e) = seeded {
            let _ = tx.send(ServerMessage::invalid_action(e)).await;
            return;
        }
    }

    // 生成一个未被占用的房间码
    let handle = loop {
        let code = allocate_room_code(&mut rand::rng(), |c| state.rooms.contains_key(c));
        // 分配和插入之间可能被其他连接抢先，抢到了就重新分配
        if let Entry::Vacant(slot) = state.rooms.entry(code.clone()) {
            room.code = code;
            let handle = Arc::new(RoomHandle::new(room, player_id, player_secret, tx.clone()));
            slot.insert(handle.clone());
            break handle;
        }
    };

    let (room_code, phase, update) = {
        let room = handle.room.lock();
        (room.code.clone(), room.game_state().phase(), RoomUpdate::capture(&room, None))
    };
    info!("玩家 {} 创建了新房间 {} ({} 人)", player_id, room_code, update.public.players.len());
    *context = Some((room_code.clone(), player_id));

    let _ = tx
        .send(ServerMessage::RoomCreated {
            room_code,
            your_id: player_id,
            your_secret: player_secret,
            phase,
            dev_mode: state.dev_mode,
        })
        .await;
    send_update(&*handle.players.read().await, update).await;
}

async fn join_room(
    state: &SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut PlayerContext,
    room_code: &str,
    nickname: &str,
) {
    if context.is_some() {
        let _ = tx.send(ServerMessage::error("你已经在一个房间里了")).await;
        return;
    }

    let room_code = room_code.trim().to_uppercase();
    let Some(handle) = state.room(&room_code) else {
        let _ = tx.send(ServerMessage::RoomNotFound { room_code }).await;
        return;
    };

    let player_id = Uuid::new_v4();
    let player_secret = Uuid::new_v4();

    let mut r_players = handle.players.write().await;
    // 拿到锁之前房间可能刚被移除
    if !state.rooms.contains_key(&room_code) {
        let _ = tx.send(ServerMessage::RoomNotFound { room_code }).await;
        return;
    }
    let (status, phase, update) = {
        let mut room = handle.room.lock();
        let status = room.add_player(player_id, nickname);
        (status, room.game_state().phase(), RoomUpdate::capture(&room, None))
    };

    match status {
        JoinStatus::Joined => {
            r_players.insert(player_id, PlayerConnection { secret: player_secret, sender: Some(tx.clone()) });
            info!("玩家 {} 加入了房间 {}", player_id, room_code);
            *context = Some((room_code.clone(), player_id));
            let _ = tx
                .send(ServerMessage::RoomJoined { room_code, your_id: player_id, your_secret: player_secret, phase })
                .await;
            send_update(&r_players, update).await;
        }
        JoinStatus::AlreadyJoined => {
            let _ = tx.send(ServerMessage::RoomAlreadyJoined { room_code, your_id: player_id, phase }).await;
        }
        JoinStatus::Full => {
            let _ = tx.send(ServerMessage::RoomFull { room_code }).await;
        }
        JoinStatus::Closed => {
            let _ = tx.send(ServerMessage::RoomClosed { room_code }).await;
        }
        JoinStatus::NotFound => {
            let _ = tx.send(ServerMessage::RoomNotFound { room_code }).await;
        }
    }
}

/// 断线重连：凭创建/加入时拿到的 secret 重新绑定连接
async fn rejoin_room(
    state: &SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut PlayerContext,
    room_code: &str,
    player_id: PlayerId,
    secret: PlayerSecret,
) {
    if context.is_some() {
        let _ = tx.send(ServerMessage::error("你已经在一个房间里了")).await;
        return;
    }

    let room_code = room_code.trim().to_uppercase();
    let Some(handle) = state.room(&room_code) else {
        let _ = tx.send(ServerMessage::RoomNotFound { room_code }).await;
        return;
    };

    let mut r_players = handle.players.write().await;
    // 拿到锁之前房间可能刚被移除
    if !state.rooms.contains_key(&room_code) {
        let _ = tx.send(ServerMessage::RoomNotFound { room_code }).await;
        return;
    }
    match r_players.get_mut(&player_id) {
        Some(conn) if conn.secret == secret => {
            conn.sender = Some(tx.clone());
        }
        _ => {
            let _ = tx.send(ServerMessage::invalid_action("玩家ID或凭证无效")).await;
            return;
        }
    }

    let (phase, update) = {
        let room = handle.room.lock();
        (room.game_state().phase(), RoomUpdate::capture(&room, None))
    };
    info!("玩家 {} 重新连接到房间 {}", player_id, room_code);
    *context = Some((room_code.clone(), player_id));
    let _ = tx.send(ServerMessage::RoomAlreadyJoined { room_code, your_id: player_id, phase }).await;
    send_update(&r_players, update).await;
}

async fn start_game(handle: &RoomHandle, tx: &mpsc::Sender<ServerMessage>, player_id: PlayerId) {
    if handle.autoplay_running() {
        let _ = tx.send(ServerMessage::invalid_action("自动出牌进行中")).await;
        return;
    }

    let r_players = handle.players.write().await;
    let result = {
        let mut room = handle.room.lock();
        room.start_by(player_id, &mut rand::rng()).map(|()| {
            let event = ServerMessage::GameStarted { room_code: room.code.clone(), phase: room.game_state().phase() };
            RoomUpdate::capture(&room, Some(event))
        })
    };

    match result {
        Ok(update) => send_update(&r_players, update).await,
        Err(e) => {
            let _ = tx.send(ServerMessage::invalid_action(e)).await;
        }
    }
}

async fn perform_action(handle: &RoomHandle, tx: &mpsc::Sender<ServerMessage>, player_id: PlayerId, action: PlayerAction) {
    if handle.autoplay_running() {
        let _ = tx.send(ServerMessage::invalid_action("自动出牌进行中")).await;
        return;
    }

    let r_players = handle.players.write().await;
    let result = {
        let mut room = handle.room.lock();
        room.apply(player_id, action).map(|event| RoomUpdate::capture(&room, event))
    };

    match result {
        Ok(update) => send_update(&r_players, update).await,
        Err(e) => {
            let _ = tx.send(ServerMessage::invalid_action(e)).await;
        }
    }
}

/// 玩家断开连接后的处理
async fn handle_disconnect(state: SharedState, room_code: RoomCode, player_id: PlayerId) {
    info!("玩家 {} 从房间 {} 断开连接", player_id, room_code);
    let Some(handle) = state.room(&room_code) else {
        return;
    };

    let mut r_players = handle.players.write().await;
    if let Some(conn) = r_players.get_mut(&player_id) {
        conn.sender = None;
    }

    // 判断是否清空房间
    if r_players.values().all(|c| c.sender.is_none()) {
        state.rooms.remove(&room_code);
        info!("房间 {} 已空，已被移除", room_code);
        return;
    }

    // 如果房主断开，按加入顺序转移给第一个在线的玩家
    let transferred = {
        let mut room = handle.room.lock();
        if room.host_id != player_id {
            None
        } else {
            let online = |id: &&PlayerId| r_players.get(*id).is_some_and(|c| c.sender.is_some());
            let new_host = room.join_order().iter().find(online).copied();
            new_host.map(|new_host_id| {
                room.host_id = new_host_id;
                let name = room
                    .game_state()
                    .player(&new_host_id)
                    .map_or("未知玩家".to_string(), |p| p.display_name.clone());
                (new_host_id, name, RoomUpdate::capture(&room, None))
            })
        }
    };

    if let Some((new_host_id, name, update)) = transferred {
        info!("房间 {} 的房主已转移给 {}", room_code, new_host_id);
        let info_msg = ServerMessage::Info { message: format!("房主已断开，新房主是 {}", name) };
        broadcast(&r_players, &info_msg).await;
        send_update(&r_players, update).await;
    }
}

/// 依次发出事件、公共状态和每个人自己的手牌
pub(crate) async fn send_update(players: &HashMap<PlayerId, PlayerConnection>, update: RoomUpdate) {
    if let Some(event) = &update.event {
        broadcast(players, event).await;
    }
    broadcast(players, &ServerMessage::PublicState { state: update.public }).await;
    for state in update.private {
        if let Some(conn) = players.get(&state.player_id) {
            send_to(conn, state.player_id, ServerMessage::PrivateState { state }).await;
        }
    }
}

/// 向房间内所有在线玩家广播消息
pub(crate) async fn broadcast(players: &HashMap<PlayerId, PlayerConnection>, message: &ServerMessage) {
    for (player_id, conn) in players {
        send_to(conn, *player_id, message.clone()).await;
    }
}

async fn send_to(conn: &PlayerConnection, player_id: PlayerId, message: ServerMessage) {
    let Some(sender) = &conn.sender else {
        return;
    };
    if sender.send(message).await.is_err() {
        // 发送失败，说明该玩家也断开了，后续由其自己的 handle_socket 任务处理
        warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
    }
}
