use crate::card::Rank;
use crate::room::RoomCode;
use crate::state::{ChallengeOutcome, Claim, GamePhase, PlayerAction, PlayerId, TurnDirection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PlayerSecret = Uuid;

fn default_deck_count() -> u8 {
    1
}

fn default_player_count() -> usize {
    crate::room::MIN_PLAYERS
}

fn default_max_steps() -> usize {
    5000
}

// --- 客户端 -> 服务器 的消息 ---
// 所有消息都以 {"type": "..."} 区分。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // --- 房间管理消息 ---
    /// 创建一个新房间，创建者成为房主
    CreateRoom {
        nickname: String,
        #[serde(default = "default_deck_count")]
        deck_count: u8,
        #[serde(default)]
        direction: TurnDirection,
    },
    /// 加入一个已存在的房间
    JoinRoom { room_code: RoomCode, nickname: String },
    /// 断线后凭 RoomJoined 里拿到的凭证重新接入
    RejoinRoom {
        room_code: RoomCode,
        player_id: PlayerId,
        secret: PlayerSecret,
    },
    /// 房主开始游戏
    StartGame,

    // --- 游戏内消息 ---
    PlayCards { card_indices: Vec<usize>, claim_rank: Rank },
    PassTurn,
    CallBluff { pick_index: usize },

    // --- 开发模式 ---
    /// 创建房间并用机器人补满到 player_count 人
    DevSeedRoom {
        nickname: String,
        #[serde(default = "default_player_count")]
        player_count: usize,
        #[serde(default = "default_deck_count")]
        deck_count: u8,
        #[serde(default)]
        direction: TurnDirection,
    },
    /// 让服务器替所有人自动出牌直到游戏结束
    DevAutoplay {
        #[serde(default)]
        delay_ms: u64,
        #[serde(default = "default_max_steps")]
        max_steps: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    // --- 房间管理消息 ---
    /// 创建房间成功，私密地发给创建者
    RoomCreated {
        room_code: RoomCode,
        your_id: PlayerId,
        your_secret: PlayerSecret, // 用于断线重连的凭证
        phase: GamePhase,
        dev_mode: bool,
    },
    RoomJoined {
        room_code: RoomCode,
        your_id: PlayerId,
        your_secret: PlayerSecret,
        phase: GamePhase,
    },
    /// 重连成功
    RoomAlreadyJoined {
        room_code: RoomCode,
        your_id: PlayerId,
        phase: GamePhase,
    },
    RoomNotFound { room_code: RoomCode },
    RoomFull { room_code: RoomCode },
    RoomClosed { room_code: RoomCode },

    // --- 游戏状态更新消息 ---
    GameStarted { room_code: RoomCode, phase: GamePhase },
    /// 房间内所有人都能看到的状态，只包含张数和ID
    PublicState { state: PublicState },
    /// 只发给对应玩家的手牌
    PrivateState { state: PrivateState },
    /// 开轮玩家的声明无人质疑，本轮牌堆进入弃牌堆
    PileDiscarded { room_code: RoomCode, player_id: PlayerId },
    ChallengeResolved {
        room_code: RoomCode,
        claimant_id: PlayerId,
        challenger_id: PlayerId,
        penalty_player_id: PlayerId,
        picked_card: String,
        picked_matches_claim: bool,
    },

    /// 规则引擎或大厅拒绝了该玩家的操作，只发给操作者
    InvalidAction { message: String },
    Error { message: String },
    Info { message: String },

    // --- 开发模式 ---
    DevAutoplayStarted {
        room_code: RoomCode,
        delay_ms: u64,
        max_steps: usize,
    },
    DevAutoplayDone {
        room_code: RoomCode,
        steps: usize,
        phase: GamePhase,
        standings: Vec<PlayerId>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub display_name: String,
    pub hand_count: usize,
}

/// 广播给整个房间的状态快照
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicState {
    pub room_code: RoomCode,
    pub phase: GamePhase,
    pub host_id: PlayerId,
    pub deck_count: u8,
    pub direction: TurnDirection,
    pub players: Vec<PlayerSummary>, // 按加入顺序
    pub current_player_id: Option<PlayerId>,
    pub last_claim: Option<Claim>,
    pub round_rank: Option<Rank>,
    pub round_starter_id: Option<PlayerId>,
    pub last_play_count: usize,
    pub pile_count: usize,
    pub discard_pile_count: usize,
    pub finished_order: Vec<PlayerId>,
    pub loser_id: Option<PlayerId>,
    pub standings: Vec<PlayerId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PrivateState {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    pub hand: Vec<String>, // 牌的短代码
}

impl ClientMessage {
    /// 游戏内动作对应的 PlayerAction
    pub fn to_action(&self) -> Option<PlayerAction> {
        match self {
            ClientMessage::PlayCards { card_indices, claim_rank } => Some(PlayerAction::PlayCards {
                card_indices: card_indices.clone(),
                claim_rank: *claim_rank,
            }),
            ClientMessage::PassTurn => Some(PlayerAction::PassTurn),
            ClientMessage::CallBluff { pick_index } => Some(PlayerAction::CallBluff { pick_index: *pick_index }),
            _ => None,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, ClientMessage::DevSeedRoom { .. } | ClientMessage::DevAutoplay { .. })
    }
}

impl From<PlayerAction> for ClientMessage {
    fn from(action: PlayerAction) -> Self {
        match action {
            PlayerAction::PlayCards { card_indices, claim_rank } => ClientMessage::PlayCards { card_indices, claim_rank },
            PlayerAction::PassTurn => ClientMessage::PassTurn,
            PlayerAction::CallBluff { pick_index } => ClientMessage::CallBluff { pick_index },
        }
    }
}

impl ServerMessage {
    pub fn challenge_resolved(room_code: &str, outcome: &ChallengeOutcome) -> Self {
        ServerMessage::ChallengeResolved {
            room_code: room_code.to_string(),
            claimant_id: outcome.claimant_id,
            challenger_id: outcome.challenger_id,
            penalty_player_id: outcome.penalty_player_id,
            picked_card: outcome.picked_card.code(),
            picked_matches_claim: outcome.picked_matches_claim,
        }
    }

    pub fn invalid_action(err: impl std::fmt::Display) -> Self {
        ServerMessage::InvalidAction { message: err.to_string() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, Suit};
    use serde_json::json;

    #[test]
    fn test_parse_play_cards() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "play_cards",
            "card_indices": [0, 2],
            "claim_rank": "10",
        }))
        .unwrap();
        assert_eq!(msg, ClientMessage::PlayCards { card_indices: vec![0, 2], claim_rank: Rank::Ten });
        assert_eq!(
            msg.to_action(),
            Some(PlayerAction::PlayCards { card_indices: vec![0, 2], claim_rank: Rank::Ten })
        );
    }

    #[test]
    fn test_create_room_defaults() {
        let msg: ClientMessage = serde_json::from_value(json!({"type": "create_room", "nickname": "P1"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom { nickname: "P1".into(), deck_count: 1, direction: TurnDirection::Clockwise }
        );

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "create_room", "nickname": "P1", "deck_count": 2, "direction": "COUNTERCLOCKWISE"
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::CreateRoom { deck_count: 2, direction: TurnDirection::Counterclockwise, .. }));
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "create_room", "nickname": "P1", "direction": "BAD"})).is_err());
        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "play_cards", "card_indices": [0], "claim_rank": "Z"})).is_err());
        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "play_cards", "card_indices": [-1], "claim_rank": "A"})).is_err());
        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "nope"})).is_err());
    }

    #[test]
    fn test_dev_messages() {
        let msg: ClientMessage = serde_json::from_value(json!({"type": "dev_autoplay"})).unwrap();
        assert_eq!(msg, ClientMessage::DevAutoplay { delay_ms: 0, max_steps: 5000, seed: None });
        assert!(msg.is_dev());
        assert!(!ClientMessage::StartGame.is_dev());
    }

    #[test]
    fn test_challenge_resolved_json_uses_card_code() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let outcome = ChallengeOutcome {
            claimant_id: a,
            challenger_id: b,
            penalty_player_id: b,
            picked_card: Card::new(Rank::Ten, Suit::Heart, 2),
            picked_matches_claim: true,
        };
        let value = serde_json::to_value(ServerMessage::challenge_resolved("ABCDE", &outcome)).unwrap();
        assert_eq!(value["type"], "challenge_resolved");
        assert_eq!(value["picked_card"], "10H");
        assert_eq!(value["penalty_player_id"], json!(b));
        assert_eq!(value["room_code"], "ABCDE");
    }

    #[test]
    fn test_action_roundtrips_through_client_message() {
        let action = PlayerAction::CallBluff { pick_index: 3 };
        assert_eq!(ClientMessage::from(action.clone()).to_action(), Some(action));
    }
}
