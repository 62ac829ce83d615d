//! 开发模式下的自动出牌任务

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use bluffer_core::autoplay::{apply_dev_action, choose_dev_action};
use bluffer_core::{GameError, GamePhase, Room, RoomError, ServerMessage};

use crate::{RoomHandle, RoomUpdate, broadcast, send_update};

/// 替房间内所有人出牌，直到游戏结束或达到 max_steps。
/// 调用前必须已把 handle.autoplay 置为 true，结束时复位。
pub(crate) async fn run_autoplay(handle: Arc<RoomHandle>, delay_ms: u64, max_steps: usize, seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // 还在等人时先开局
    {
        let r_players = handle.players.write().await;
        let started = {
            let mut room = handle.room.lock();
            start_if_waiting(&mut room, &mut rng)
        };
        match started {
            Ok(Some(update)) => send_update(&r_players, update).await,
            Ok(None) => {}
            Err(e) => {
                warn!("自动出牌无法开局: {}", e);
                broadcast(&r_players, &ServerMessage::error(format!("自动出牌失败: {}", e))).await;
                handle.autoplay.store(false, Ordering::Release);
                return;
            }
        }
    }

    let mut steps = 0;
    while steps < max_steps {
        let r_players = handle.players.write().await;
        let step = {
            let mut room = handle.room.lock();
            if room.game_state().phase() == GamePhase::GameOver {
                None
            } else {
                Some(autoplay_step(&mut room, &mut rng))
            }
        };

        match step {
            None => break,
            Some(Ok(update)) => {
                send_update(&r_players, update).await;
                steps += 1;
            }
            Some(Err(e)) => {
                warn!("自动出牌出错: {}", e);
                broadcast(&r_players, &ServerMessage::error(format!("自动出牌出错: {}", e))).await;
                break;
            }
        }
        drop(r_players);

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    let done = {
        let room = handle.room.lock();
        info!("房间 {} 自动出牌结束: {} 步, {:?}", room.code, steps, room.game_state().phase());
        ServerMessage::DevAutoplayDone {
            room_code: room.code.clone(),
            steps,
            phase: room.game_state().phase(),
            standings: room.game_state().standings(),
        }
    };
    broadcast(&*handle.players.read().await, &done).await;
    handle.autoplay.store(false, Ordering::Release);
}

fn start_if_waiting(room: &mut Room, rng: &mut StdRng) -> Result<Option<RoomUpdate>, RoomError> {
    if room.is_started() {
        return Ok(None);
    }
    room.start_game(rng)?;
    let event = ServerMessage::GameStarted { room_code: room.code.clone(), phase: room.game_state().phase() };
    Ok(Some(RoomUpdate::capture(room, Some(event))))
}

fn autoplay_step(room: &mut Room, rng: &mut StdRng) -> Result<RoomUpdate, GameError> {
    let action = choose_dev_action(room.game_state(), rng)?;
    let event = apply_dev_action(room, &action)?;
    Ok(RoomUpdate::capture(room, event))
}
