//! 房间与大厅管理：房间码、加入、人数上限、发牌，以及面向客户端的视图。

use crate::card::{build_deck, Card, VALID_DECK_COUNTS};
use crate::error::{GameError, RoomError};
use crate::message::{PlayerSummary, PrivateState, PublicState, ServerMessage};
use crate::state::{GamePhase, GameState, Player, PlayerAction, PlayerId, TurnDirection};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

pub type RoomCode = String;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;
pub const ROOM_CODE_LEN: usize = 5;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 加入房间的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinStatus {
    Joined,
    AlreadyJoined,
    Full,
    NotFound,
    Closed, // 游戏已开始
}

/// 单个房间：大厅信息加上本局的 GameState
#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub deck_count: u8,
    pub direction: TurnDirection,
    pub max_players: usize,
    join_order: Vec<PlayerId>,
    game_state: GameState,
}

/// 随机生成一个房间码（不保证唯一）
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// 生成一个 is_taken 判定为未占用的房间码
pub fn allocate_room_code<R, F>(rng: &mut R, is_taken: F) -> RoomCode
where
    R: Rng + ?Sized,
    F: Fn(&str) -> bool,
{
    loop {
        let code = generate_room_code(rng);
        if !is_taken(&code) {
            return code;
        }
    }
}

impl Room {
    /// 创建房间并让房主加入
    pub fn create(
        code: RoomCode,
        host_id: PlayerId,
        host_name: &str,
        deck_count: u8,
        direction: TurnDirection,
    ) -> Result<Self, RoomError> {
        if !VALID_DECK_COUNTS.contains(&deck_count) {
            return Err(RoomError::InvalidDeckCount(deck_count));
        }

        let mut room = Room {
            code,
            host_id,
            deck_count,
            direction,
            max_players: MAX_PLAYERS,
            join_order: Vec::new(),
            game_state: GameState::new(),
        };
        match room.add_player(host_id, host_name) {
            JoinStatus::Joined => Ok(room),
            status => Err(RoomError::JoinRejected(format!("{:?}", status))),
        }
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn join_order(&self) -> &[PlayerId] {
        &self.join_order
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.join_order.contains(player_id)
    }

    pub fn is_full(&self) -> bool {
        self.join_order.len() >= self.max_players
    }

    pub fn is_started(&self) -> bool {
        self.game_state.phase() != GamePhase::WaitingForPlayers
    }

    pub fn add_player(&mut self, player_id: PlayerId, display_name: &str) -> JoinStatus {
        if self.contains(&player_id) {
            return JoinStatus::AlreadyJoined;
        }
        if self.is_full() {
            return JoinStatus::Full;
        }
        if self.is_started() {
            return JoinStatus::Closed;
        }

        match self.game_state.add_player(Player::new(player_id, display_name)) {
            Ok(()) => {
                self.join_order.push(player_id);
                JoinStatus::Joined
            }
            Err(_) => JoinStatus::Closed,
        }
    }

    pub fn can_start(&self) -> bool {
        self.join_order.len() >= MIN_PLAYERS
    }

    /// 洗牌并按加入顺序轮流发牌，然后进入第一位玩家的回合
    pub fn start_game<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), RoomError> {
        if !self.can_start() {
            return Err(RoomError::NotEnoughPlayers(MIN_PLAYERS));
        }
        if self.is_started() {
            return Err(RoomError::AlreadyStarted);
        }

        let deck = build_deck(self.deck_count, rng)?;
        let mut hands: HashMap<PlayerId, Vec<Card>> =
            self.join_order.iter().map(|id| (*id, Vec::new())).collect();
        for (card_index, card) in deck.into_iter().enumerate() {
            let player_id = self.join_order[card_index % self.join_order.len()];
            hands.entry(player_id).or_default().push(card);
        }

        self.game_state.start_game(self.join_order.clone(), self.direction)?;
        self.game_state.set_dealt_hands(hands)?;
        info!("房间 {} 开始游戏，共 {} 名玩家，{} 副牌", self.code, self.join_order.len(), self.deck_count);
        Ok(())
    }

    /// 由 player_id 发起开局，只有房主可以
    pub fn start_by<R: Rng + ?Sized>(&mut self, player_id: PlayerId, rng: &mut R) -> Result<(), RoomError> {
        if self.host_id != player_id {
            return Err(RoomError::NotHost);
        }
        if self.is_started() {
            return Err(RoomError::AlreadyStarted);
        }
        self.start_game(rng)
    }

    /// 执行一名玩家的动作，返回需要广播的事件（如果有）
    pub fn apply(&mut self, player_id: PlayerId, action: PlayerAction) -> Result<Option<ServerMessage>, GameError> {
        match action {
            PlayerAction::PlayCards { card_indices, claim_rank } => {
                self.game_state.play_cards(player_id, &card_indices, claim_rank)?;
                debug!("房间 {}: {} 出了 {} 张，声明 {}", self.code, player_id, card_indices.len(), claim_rank);
                Ok(None)
            }
            PlayerAction::PassTurn => {
                let discarded = self.game_state.pass_turn(player_id)?;
                debug!("房间 {}: {} 过牌 (弃牌: {})", self.code, player_id, discarded);
                Ok(discarded.then(|| ServerMessage::PileDiscarded { room_code: self.code.clone(), player_id }))
            }
            PlayerAction::CallBluff { pick_index } => {
                let outcome = self.game_state.call_bluff(player_id, pick_index)?;
                debug!(
                    "房间 {}: {} 质疑 {}，翻开 {}，罚 {}",
                    self.code,
                    outcome.challenger_id,
                    outcome.claimant_id,
                    outcome.picked_card,
                    outcome.penalty_player_id
                );
                Ok(Some(ServerMessage::challenge_resolved(&self.code, &outcome)))
            }
        }
    }

    /// 房间内所有人可见的状态，不包含任何手牌内容
    pub fn public_state(&self) -> PublicState {
        let gs = &self.game_state;
        PublicState {
            room_code: self.code.clone(),
            phase: gs.phase(),
            host_id: self.host_id,
            deck_count: self.deck_count,
            direction: self.direction,
            players: self
                .join_order
                .iter()
                .filter_map(|id| gs.player(id))
                .map(|p| PlayerSummary {
                    player_id: p.id,
                    display_name: p.display_name.clone(),
                    hand_count: p.hand.len(),
                })
                .collect(),
            current_player_id: gs.current_player_id().ok(),
            last_claim: gs.last_claim().cloned(),
            round_rank: gs.round_rank(),
            round_starter_id: gs.round_starter_id(),
            last_play_count: gs.last_played_cards().len(),
            pile_count: gs.pile_size(),
            discard_pile_count: gs.discard_size(),
            finished_order: gs.finished_order().to_vec(),
            loser_id: gs.loser_id(),
            standings: gs.standings(),
        }
    }

    /// 只给 player_id 本人看的手牌
    pub fn private_state(&self, player_id: &PlayerId) -> Option<PrivateState> {
        let player = self.game_state.player(player_id)?;
        Some(PrivateState {
            room_code: self.code.clone(),
            player_id: *player_id,
            hand: player.hand.iter().map(Card::code).collect(),
        })
    }
}

/// 进程内的房间注册表。由调用方创建并持有，不是全局单例。
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: HashMap<RoomCode, Room>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建房间并登记，房主自动加入
    pub fn create_room<R: Rng + ?Sized>(
        &mut self,
        host_id: PlayerId,
        host_name: &str,
        deck_count: u8,
        direction: TurnDirection,
        rng: &mut R,
    ) -> Result<&mut Room, RoomError> {
        let code = self.unique_code(rng);
        let room = Room::create(code.clone(), host_id, host_name, deck_count, direction)?;
        info!("玩家 {} 创建了新房间 {}", host_id, code);
        Ok(self.rooms.entry(code).or_insert(room))
    }

    pub fn join_room(&mut self, room_code: &str, player_id: PlayerId, display_name: &str) -> (JoinStatus, Option<&Room>) {
        match self.rooms.get_mut(room_code) {
            None => (JoinStatus::NotFound, None),
            Some(room) => {
                let status = room.add_player(player_id, display_name);
                (status, Some(&*room))
            }
        }
    }

    /// 只有房主可以开始游戏
    pub fn start_game<R: Rng + ?Sized>(&mut self, room_code: &str, player_id: PlayerId, rng: &mut R) -> Result<&Room, RoomError> {
        let room = self.rooms.get_mut(room_code).ok_or(RoomError::NotFound)?;
        room.start_by(player_id, rng)?;
        Ok(room)
    }

    pub fn get(&self, room_code: &str) -> Option<&Room> {
        self.rooms.get(room_code)
    }

    pub fn get_mut(&mut self, room_code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_code)
    }

    pub fn remove(&mut self, room_code: &str) -> Option<Room> {
        self.rooms.remove(room_code)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn unique_code<R: Rng + ?Sized>(&self, rng: &mut R) -> RoomCode {
        allocate_room_code(rng, |code| self.rooms.contains_key(code))
    }
}
