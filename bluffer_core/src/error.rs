use crate::card::Rank;
use crate::state::{GamePhase, PlayerId};
use thiserror::Error;

/// 规则引擎拒绝一次操作的原因。
///
/// 所有变体都属于“非法操作”：校验在修改任何状态之前全部完成，
/// 因此返回错误时 `GameState` 保持不变。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("当前阶段 {actual:?} 不允许该操作，需要 {expected}")]
    InvalidPhase { actual: GamePhase, expected: String },
    #[error("还没轮到玩家 {0}")]
    OutOfTurn(PlayerId),
    #[error("无效的声明点数 {0}")]
    InvalidClaimRank(Rank),
    #[error("至少要出一张牌")]
    NoCardsSelected,
    #[error("出牌索引重复")]
    DuplicateIndices,
    #[error("出牌索引 {index} 超出范围（手牌 {hand_size} 张）")]
    CardIndexOutOfRange { index: usize, hand_size: usize },
    #[error("本轮锁定的点数是 {locked}，声明必须一致（收到 {claimed}）")]
    ClaimRankMismatch { locked: Rank, claimed: Rank },
    #[error("不能质疑自己的声明")]
    SelfChallenge,
    #[error("没有可以质疑的声明")]
    NoClaim,
    #[error("没有可以翻开的牌")]
    EmptyPile,
    #[error("翻牌索引 {index} 超出范围（上一手 {count} 张）")]
    PickIndexOutOfRange { index: usize, count: usize },
    #[error("未知玩家 {0}")]
    UnknownPlayer(PlayerId),
    #[error("玩家 {0} 已经存在")]
    DuplicatePlayer(PlayerId),
    #[error("至少需要两名玩家才能开始")]
    NotEnoughPlayers,
    #[error("出牌顺序必须恰好包含所有已登记的玩家")]
    TurnOrderMismatch,
    #[error("玩家 {0} 没有发到手牌")]
    MissingHand(PlayerId),
    #[error("出牌顺序尚未设置")]
    TurnOrderNotSet,
}

/// 房间/大厅层面的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("房间不存在")]
    NotFound,
    #[error("只有房主可以开始游戏")]
    NotHost,
    #[error("游戏已经开始")]
    AlreadyStarted,
    #[error("牌副数只能是 1 或 2（收到 {0}）")]
    InvalidDeckCount(u8),
    #[error("玩家人数必须在 {min} 到 {max} 之间（收到 {actual}）")]
    InvalidPlayerCount { min: usize, max: usize, actual: usize },
    #[error("至少需要 {0} 名玩家才能开始")]
    NotEnoughPlayers(usize),
    #[error("无法加入房间: {0}")]
    JoinRejected(String),
    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无效的点数: {0}")]
pub struct ParseRankError(pub String);
