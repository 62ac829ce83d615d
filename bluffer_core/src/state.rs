use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type PlayerId = Uuid;

/// 一局吹牛游戏的全部可变状态。
///
/// 字段只在 crate 内可写，外部通过只读访问器读取，
/// 通过 `logic` 中的操作修改。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameState {
    pub(crate) phase: GamePhase,
    pub(crate) players: HashMap<PlayerId, Player>, // 可以根据player id查找player
    // 开局时确定，之后不再变化
    pub(crate) turn_order: Vec<PlayerId>,
    pub(crate) current_turn_index: usize,
    pub(crate) direction: TurnDirection,

    pub(crate) last_claim: Option<Claim>,
    // 上一手实际打出的牌，按其在手牌中的原顺序排列，质疑时从中翻牌
    pub(crate) last_played_cards: Vec<Card>,
    // 本轮累积的暗牌
    pub(crate) pile: Vec<Card>,
    // 无人质疑、绕桌一圈后被移出游戏的牌
    pub(crate) discard_pile: Vec<Card>,

    pub(crate) finished_order: Vec<PlayerId>,
    pub(crate) loser_id: Option<PlayerId>,
    // 本轮第一次声明锁定的点数，以及开启本轮的玩家
    pub(crate) round_rank: Option<Rank>,
    pub(crate) round_starter_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub hand: Vec<Card>, // 始终保持排序
}

/// 最近一次出牌的声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub player_id: PlayerId,
    pub rank: Rank,
    pub count: usize,
}

/// 一次质疑的结算结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOutcome {
    pub claimant_id: PlayerId,
    pub challenger_id: PlayerId,
    pub penalty_player_id: PlayerId,
    pub picked_card: Card,
    pub picked_matches_claim: bool,
}

/// 玩家在自己回合里可以执行的动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// 按手牌索引出牌并声明点数
    PlayCards { card_indices: Vec<usize>, claim_rank: Rank },
    /// 过牌
    PassTurn,
    /// 质疑上一手，翻开其中第 pick_index 张
    CallBluff { pick_index: usize },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    WaitingForPlayers,
    Dealing,
    PlayerTurn,
    ClaimMade,
    GameOver, // 终态，不再有任何转移
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnDirection {
    #[default]
    Clockwise,
    Counterclockwise,
}

impl TurnDirection {
    /// 推进出牌索引时的步长
    pub fn step(self) -> isize {
        match self {
            TurnDirection::Clockwise => 1,
            TurnDirection::Counterclockwise => -1,
        }
    }
}

impl Player {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Player { id, display_name: display_name.into(), hand: Vec::new() }
    }
}

// --- GameState 的只读访问 ---

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn direction(&self) -> TurnDirection {
        self.direction
    }

    pub fn last_claim(&self) -> Option<&Claim> {
        self.last_claim.as_ref()
    }

    pub fn last_played_cards(&self) -> &[Card] {
        &self.last_played_cards
    }

    pub fn pile_size(&self) -> usize {
        self.pile.len()
    }

    pub fn discard_size(&self) -> usize {
        self.discard_pile.len()
    }

    pub fn finished_order(&self) -> &[PlayerId] {
        &self.finished_order
    }

    pub fn loser_id(&self) -> Option<PlayerId> {
        self.loser_id
    }

    pub fn round_rank(&self) -> Option<Rank> {
        self.round_rank
    }

    pub fn round_starter_id(&self) -> Option<PlayerId> {
        self.round_starter_id
    }

    pub fn is_finished(&self, id: &PlayerId) -> bool {
        self.finished_order.contains(id)
    }

    /// 所有手牌、本轮牌堆与弃牌堆的总张数。任何操作前后都应保持不变。
    pub fn total_cards(&self) -> usize {
        self.players.values().map(|p| p.hand.len()).sum::<usize>()
            + self.pile.len()
            + self.discard_pile.len()
    }
}
