use std::io::Write;

use anyhow::{Context, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;
use uuid::Uuid;

use bluffer_core::{ClientMessage, Rank, ServerMessage, TurnDirection};

const DEFAULT_URL: &str = "ws://127.0.0.1:25917/ws";

/// 一行输入解析出的命令
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send(ClientMessage),
    Help,
    Exit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let raw_url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    let url = Url::parse(&raw_url).with_context(|| format!("无效的服务器地址: {}", raw_url))?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await.context("无法连接")?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 启动一个任务来处理从服务器接收的消息
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(server_msg) => {
                        println!("\n<-- {}", render(&server_msg));
                        print!("> "); // 重新显示输入提示符
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => eprintln!("解析服务器消息失败: {}", e),
                },
                Ok(Message::Close(_)) => {
                    println!("\n服务器关闭了连接");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- 吹牛客户端 ---");
    print_help();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Send(msg)) => {
                let payload = serde_json::to_string(&msg)?;
                write.send(Message::Text(payload.into())).await?;
            }
            Ok(Command::Help) => print_help(),
            Ok(Command::Exit) => {
                println!("正在断开连接...");
                break;
            }
            Err(e) => println!("{}", e),
        }
    }

    let _ = write.close().await;
    Ok(())
}

fn print_help() {
    println!("可用命令:");
    println!("  create <昵称> [1|2] [cw|ccw]      - 创建一个新房间（牌副数、出牌方向）");
    println!("  join <房间码> <昵称>              - 加入一个房间");
    println!("  rejoin <房间码> <玩家ID> <凭证>   - 断线重连");
    println!("  start                             - 开始游戏 (仅房主)");
    println!("  play <点数> <序号,序号,..>        - 出牌并声明点数，例如 play 7 0,3");
    println!("  pass                              - 过牌");
    println!("  bluff <序号>                      - 质疑上家，翻开其出的第几张牌");
    println!("  seed <昵称> <人数>                - [dev] 创建房间并用机器人补满");
    println!("  autoplay [delay_ms] [max_steps] [seed] - [dev] 自动出牌");
    println!("  help                              - 显示帮助");
    println!("  exit                              - 退出");
}

fn parse_command(line: &str) -> anyhow::Result<Command> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, args)) = parts.split_first() else {
        bail!("请输入命令");
    };

    let msg = match command {
        "create" => {
            let nickname = args.first().unwrap_or(&"新玩家").to_string();
            let deck_count = args.get(1).map(|s| parse_num(s, "牌副数")).transpose()?.unwrap_or(1);
            let direction = args.get(2).map(|s| parse_direction(s)).transpose()?.unwrap_or_default();
            ClientMessage::CreateRoom { nickname, deck_count, direction }
        }
        "join" => {
            let [room_code, nickname] = args else {
                bail!("用法: join <房间码> <昵称>");
            };
            ClientMessage::JoinRoom { room_code: room_code.to_uppercase(), nickname: nickname.to_string() }
        }
        "rejoin" => {
            let [room_code, player_id, secret] = args else {
                bail!("用法: rejoin <房间码> <玩家ID> <凭证>");
            };
            ClientMessage::RejoinRoom {
                room_code: room_code.to_uppercase(),
                player_id: parse_uuid(player_id)?,
                secret: parse_uuid(secret)?,
            }
        }
        "start" => ClientMessage::StartGame,
        "play" => {
            let [rank, indices] = args else {
                bail!("用法: play <点数> <序号,序号,..>");
            };
            let claim_rank: Rank = rank.parse()?;
            let card_indices = indices
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| parse_num(s, "牌序号"))
                .collect::<anyhow::Result<Vec<usize>>>()?;
            ClientMessage::PlayCards { card_indices, claim_rank }
        }
        "pass" => ClientMessage::PassTurn,
        "bluff" => {
            let [index] = args else {
                bail!("用法: bluff <序号>");
            };
            ClientMessage::CallBluff { pick_index: parse_num(index, "牌序号")? }
        }
        "seed" => {
            let [nickname, count] = args else {
                bail!("用法: seed <昵称> <人数>");
            };
            ClientMessage::DevSeedRoom {
                nickname: nickname.to_string(),
                player_count: parse_num(count, "人数")?,
                deck_count: 1,
                direction: TurnDirection::Clockwise,
            }
        }
        "autoplay" => ClientMessage::DevAutoplay {
            delay_ms: args.first().map(|s| parse_num(s, "delay_ms")).transpose()?.unwrap_or(0),
            max_steps: args.get(1).map(|s| parse_num(s, "max_steps")).transpose()?.unwrap_or(5000),
            seed: args.get(2).map(|s| parse_num(s, "seed")).transpose()?,
        },
        "help" => return Ok(Command::Help),
        "exit" | "quit" => return Ok(Command::Exit),
        other => bail!("未知命令: {}", other),
    };
    Ok(Command::Send(msg))
}

fn parse_num<T: std::str::FromStr>(s: &str, what: &str) -> anyhow::Result<T> {
    s.parse().map_err(|_| anyhow!("无效的{}: {}", what, s))
}

fn parse_uuid(s: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("无效的ID: {}", s))
}

fn parse_direction(s: &str) -> anyhow::Result<TurnDirection> {
    match s.to_ascii_lowercase().as_str() {
        "cw" | "clockwise" => Ok(TurnDirection::Clockwise),
        "ccw" | "counterclockwise" => Ok(TurnDirection::Counterclockwise),
        _ => bail!("无效的方向: {} (cw 或 ccw)", s),
    }
}

/// 把服务器消息转成便于阅读的一段文字
fn render(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::RoomCreated { room_code, your_id, your_secret, .. }
        | ServerMessage::RoomJoined { room_code, your_id, your_secret, .. } => {
            format!("已进入房间 {}\n    你的ID: {}\n    重连凭证: {}", room_code, your_id, your_secret)
        }
        ServerMessage::PrivateState { state } => {
            let hand: Vec<String> = state.hand.iter().enumerate().map(|(i, c)| format!("[{}]{}", i, c)).collect();
            format!("你的手牌 ({} 张): {}", state.hand.len(), hand.join(" "))
        }
        ServerMessage::PublicState { state } => {
            let mut out = format!("房间 {} | {:?}", state.room_code, state.phase);
            if let Some(current) = state.current_player_id {
                out.push_str(&format!(" | 轮到 {}", current));
            }
            if let Some(claim) = &state.last_claim {
                out.push_str(&format!(" | 声明: {} x{} (by {})", claim.rank, claim.count, claim.player_id));
            }
            out.push_str(&format!(" | 牌堆 {} 弃牌 {}", state.pile_count, state.discard_pile_count));
            for p in &state.players {
                out.push_str(&format!("\n    {} {} - {} 张", p.player_id, p.display_name, p.hand_count));
            }
            out
        }
        ServerMessage::ChallengeResolved { challenger_id, claimant_id, picked_card, picked_matches_claim, penalty_player_id, .. } => {
            format!(
                "{} 质疑 {}，翻开 {} ({})，{} 收走牌堆",
                challenger_id,
                claimant_id,
                picked_card,
                if *picked_matches_claim { "属实" } else { "吹牛" },
                penalty_player_id
            )
        }
        ServerMessage::InvalidAction { message } | ServerMessage::Error { message } => format!("错误: {}", message),
        ServerMessage::Info { message } => message.clone(),
        other => format!("{:?}", other),
    }
}
