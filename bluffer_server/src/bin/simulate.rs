//! 离线跑自动出牌的模拟对局，用来检查规则引擎能否正常终局。
//!
//! ```text
//! bluffer-sim --players 4 --games 10 --deck-count 2 --seed 7
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bluffer_core::autoplay::{SimulationConfig, SimulationReport, simulate_game};
use bluffer_core::{PlayerId, TurnDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    Clockwise,
    Counterclockwise,
}

impl From<DirectionArg> for TurnDirection {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Clockwise => TurnDirection::Clockwise,
            DirectionArg::Counterclockwise => TurnDirection::Counterclockwise,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "bluffer-sim", version, about = "Run dev autoplay simulations offline", long_about = None)]
struct Args {
    /// 玩家人数 (2-6)
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// 模拟几局
    #[arg(long, default_value_t = 1)]
    games: usize,

    /// 几副牌 (1 或 2)
    #[arg(long, default_value_t = 1)]
    deck_count: u8,

    #[arg(long, value_enum, default_value_t = DirectionArg::Clockwise)]
    direction: DirectionArg,

    /// 每局最多多少步
    #[arg(long, default_value_t = 5000)]
    max_steps: usize,

    /// 第 i 局使用 seed + i - 1；不指定时随机选一个并打印出来
    #[arg(long)]
    seed: Option<u64>,

    /// 打印每一步的动作
    #[arg(long, default_value_t = false)]
    log_steps: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let config = SimulationConfig {
        players: args.players,
        deck_count: args.deck_count,
        direction: args.direction.into(),
        max_steps: args.max_steps,
    };
    let base_seed = match args.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random();
            println!("{}", base_seed_line(seed));
            seed
        }
    };
    info!("base seed = {}", base_seed);

    for game in 1..=args.games {
        let seed = base_seed.wrapping_add(game as u64 - 1);
        let mut rng = StdRng::seed_from_u64(seed);
        let report = simulate_game(&config, &mut rng, |step, action, _| {
            if args.log_steps {
                println!("  step={} player={} action={:?}", step, action.player_id, action.action);
            }
        })
        .with_context(|| format!("第 {} 局模拟失败 (seed={})", game, seed))?;
        println!("{}", summary_line(game, seed, &report));
    }
    Ok(())
}

fn base_seed_line(seed: u64) -> String {
    format!("base_seed={} (用 --seed {} 复现)", seed, seed)
}

fn summary_line(game: usize, seed: u64, report: &SimulationReport) -> String {
    let standings: Vec<String> = report.standings.iter().map(PlayerId::to_string).collect();
    let loser = report.loser_id.map_or_else(|| "none".to_string(), |id| id.to_string());
    format!(
        "game={} seed={} steps={} phase={:?} standings=[{}] loser={}",
        game,
        seed,
        report.steps,
        report.phase,
        standings.join(","),
        loser
    )
}
