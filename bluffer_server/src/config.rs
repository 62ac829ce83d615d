use std::net::SocketAddr;

use clap::Parser;

/// 吹牛游戏服务器
#[derive(Parser, Debug, Clone)]
#[command(name = "bluffer-server", version, about = "Bluff card game websocket server", long_about = None)]
pub struct Config {
    /// 监听地址
    #[arg(long, env = "BLUFFER_BIND", default_value = "0.0.0.0:25917")]
    pub bind: SocketAddr,

    /// 开启 dev_seed_room / dev_autoplay 等开发消息
    #[arg(long, env = "BLUFFER_DEV_MODE", default_value_t = false)]
    pub dev_mode: bool,

    /// 每个连接的待发送消息队列长度
    #[arg(long, default_value_t = 32)]
    pub channel_capacity: usize,
}
