//! 开发用的自动出牌：随机选择合法动作驱动整局游戏。
//!
//! 所有随机性都来自调用方传入的 `Rng`，同一个种子得到同一局游戏。

use crate::card::Rank;
use crate::error::{GameError, RoomError};
use crate::message::ServerMessage;
use crate::room::{JoinStatus, MAX_PLAYERS, MIN_PLAYERS, Room, RoomManager};
use crate::state::{GamePhase, GameState, PlayerAction, PlayerId, TurnDirection};
use rand::Rng;
use rand::seq::index;

/// 有人声明后，下一位选择质疑的概率
const BLUFF_PROBABILITY: f64 = 0.25;
/// 没有未结声明但有人声明过时过牌的概率
const PASS_PROBABILITY: f64 = 0.1;
/// 一次最多出几张
const MAX_CARDS_PER_PLAY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevAction {
    pub player_id: PlayerId,
    pub action: PlayerAction,
}

/// 用调用方的随机源生成玩家ID，使模拟可以完全复现
pub fn random_player_id<R: Rng + ?Sized>(rng: &mut R) -> PlayerId {
    uuid::Builder::from_random_bytes(rng.random()).into_uuid()
}

/// 创建一个房间，并用机器人补满到 player_count 人
pub fn seed_room_for_dev<'a, R: Rng + ?Sized>(
    manager: &'a mut RoomManager,
    host_id: PlayerId,
    host_name: &str,
    deck_count: u8,
    direction: TurnDirection,
    player_count: usize,
    rng: &mut R,
) -> Result<&'a mut Room, RoomError> {
    validate_player_count(player_count)?;
    let room = manager.create_room(host_id, host_name, deck_count, direction, rng)?;
    fill_with_bots(room, player_count, rng)?;
    Ok(room)
}

/// 往房间里加入机器人 "Bot 1" .. "Bot n-1"
pub fn fill_with_bots<R: Rng + ?Sized>(room: &mut Room, player_count: usize, rng: &mut R) -> Result<Vec<PlayerId>, RoomError> {
    validate_player_count(player_count)?;
    let mut bots = Vec::new();
    for index in 1..player_count {
        let bot_id = random_player_id(rng);
        let status = room.add_player(bot_id, &format!("Bot {}", index));
        if status != JoinStatus::Joined {
            return Err(RoomError::JoinRejected(format!("机器人 Bot {} 加入失败: {:?}", index, status)));
        }
        bots.push(bot_id);
    }
    Ok(bots)
}

fn validate_player_count(player_count: usize) -> Result<(), RoomError> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
        return Err(RoomError::InvalidPlayerCount { min: MIN_PLAYERS, max: MAX_PLAYERS, actual: player_count });
    }
    Ok(())
}

/// 为当前行动的玩家随机挑一个动作
pub fn choose_dev_action<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> Result<DevAction, GameError> {
    let player_id = state.current_player_id()?;
    let hand_len = state.player(&player_id).map_or(0, |p| p.hand.len());

    let action = match state.phase() {
        GamePhase::ClaimMade => {
            let can_challenge = state.last_claim().is_some_and(|c| c.player_id != player_id)
                && !state.last_played_cards().is_empty();
            if can_challenge && rng.random_bool(BLUFF_PROBABILITY) {
                PlayerAction::CallBluff { pick_index: rng.random_range(0..state.last_played_cards().len()) }
            } else {
                make_play_action(hand_len, state.round_rank(), rng)
            }
        }
        GamePhase::PlayerTurn => {
            if state.last_claim().is_some() && rng.random_bool(PASS_PROBABILITY) {
                PlayerAction::PassTurn
            } else {
                make_play_action(hand_len, state.round_rank(), rng)
            }
        }
        _ => PlayerAction::PassTurn,
    };

    Ok(DevAction { player_id, action })
}

fn make_play_action<R: Rng + ?Sized>(hand_len: usize, locked_rank: Option<Rank>, rng: &mut R) -> PlayerAction {
    if hand_len == 0 {
        return PlayerAction::PassTurn;
    }

    let count = rng.random_range(1..=hand_len.min(MAX_CARDS_PER_PLAY));
    let card_indices = index::sample(rng, hand_len, count).into_vec();
    let claim_rank = locked_rank.unwrap_or_else(|| Rank::STANDARD[rng.random_range(0..Rank::STANDARD.len())]);
    PlayerAction::PlayCards { card_indices, claim_rank }
}

/// 执行一个自动动作，返回需要广播的事件
pub fn apply_dev_action(room: &mut Room, action: &DevAction) -> Result<Option<ServerMessage>, GameError> {
    room.apply(action.player_id, action.action.clone())
}

/// 一局模拟的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    pub players: usize,
    pub deck_count: u8,
    pub direction: TurnDirection,
    pub max_steps: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            players: MIN_PLAYERS,
            deck_count: 1,
            direction: TurnDirection::Clockwise,
            max_steps: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub steps: usize,
    pub phase: GamePhase,
    pub standings: Vec<PlayerId>,
    pub loser_id: Option<PlayerId>,
    pub total_cards: usize,
}

/// 离线跑完一整局（或达到 max_steps），每一步之后回调 `on_step`
pub fn simulate_game<R, F>(config: &SimulationConfig, rng: &mut R, mut on_step: F) -> Result<SimulationReport, RoomError>
where
    R: Rng + ?Sized,
    F: FnMut(usize, &DevAction, &GameState),
{
    let mut manager = RoomManager::new();
    let host_id = random_player_id(rng);
    let room = seed_room_for_dev(
        &mut manager,
        host_id,
        "Dev Host",
        config.deck_count,
        config.direction,
        config.players,
        rng,
    )?;
    room.start_game(rng)?;

    let mut steps = 0;
    while room.game_state().phase() != GamePhase::GameOver && steps < config.max_steps {
        let action = choose_dev_action(room.game_state(), rng)?;
        apply_dev_action(room, &action)?;
        steps += 1;
        on_step(steps, &action, room.game_state());
    }

    let gs = room.game_state();
    Ok(SimulationReport {
        steps,
        phase: gs.phase(),
        standings: gs.standings(),
        loser_id: gs.loser_id(),
        total_cards: gs.total_cards(),
    })
}
