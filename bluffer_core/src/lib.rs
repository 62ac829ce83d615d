//! # 吹牛（Bluff）核心逻辑库
//!
//! 这个 `core` crate 包含了吹牛纸牌游戏的规则引擎（出牌、声明、质疑、弃牌与完成判定）、
//! 房间/大厅管理、开发用的自动出牌，以及客户端-服务器通信消息的定义。
//! 规则引擎本身是同步、确定性的，不做任何 I/O，
//! 网络服务器和客户端只通过这里导出的接口驱动它。

pub mod autoplay;
mod card;
mod error;
mod logic;
mod message;
pub mod room;
mod state;

pub use card::*;

pub use error::*;

pub use message::*;

pub use room::{JoinStatus, MAX_PLAYERS, MIN_PLAYERS, Room, RoomCode, RoomManager};

pub use state::*;
