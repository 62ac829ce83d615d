use crate::error::{ParseRankError, RoomError};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- 核心数据结构定义 ---

/// 花色 (Suit)
/// 变体的声明顺序就是手牌排序时的花色顺序：C, D, H, S，之后是两种王
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "C")]
    Club, // 梅花 ♣️
    #[serde(rename = "D")]
    Diamond, // 方块 ♦️
    #[serde(rename = "H")]
    Heart, // 红心 ♥️
    #[serde(rename = "S")]
    Spade, // 黑桃 ♠️
    #[serde(rename = "R")]
    RedJoker, // 大王
    #[serde(rename = "B")]
    BlackJoker, // 小王
}

/// 点数 (Rank)
/// 排序时 A 最小，K 之后是王
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "JK")]
    Joker,
}

/// 单张牌 (Card)
///
/// 多副牌时 `deck` 区分同点同花色的牌来自哪一副。
/// 字段顺序即排序键：点数、花色、牌副编号。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
    pub deck: u8,
}

impl Suit {
    /// 普通牌的四种花色，按建牌顺序排列
    pub const STANDARD: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Diamond, Suit::Club];
    /// 王的两种变体
    pub const JOKERS: [Suit; 2] = [Suit::RedJoker, Suit::BlackJoker];

    pub fn symbol(self) -> &'static str {
        match self {
            Suit::Club => "C",
            Suit::Diamond => "D",
            Suit::Heart => "H",
            Suit::Spade => "S",
            Suit::RedJoker => "R",
            Suit::BlackJoker => "B",
        }
    }
}

impl Rank {
    /// 可以被声明的 13 种点数（王不能被声明）
    pub const STANDARD: [Rank; 13] = [
        Rank::Ace, Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Joker => "JK",
        }
    }

    pub fn is_joker(self) -> bool {
        self == Rank::Joker
    }

    /// 是否是可以声明的点数
    pub fn is_claimable(self) -> bool {
        !self.is_joker()
    }
}

impl Card {
    pub fn new(rank: Rank, suit: Suit, deck: u8) -> Card {
        Card { rank, suit, deck }
    }

    /// 牌的短代码，例如 "AS"、"10H"、"JKR"。
    /// 日志和网络消息里引用具体某张牌时都用这个字符串。
    pub fn code(&self) -> String {
        format!("{}{}", self.rank.symbol(), self.suit.symbol())
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl FromStr for Rank {
    type Err = ParseRankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Rank::STANDARD
            .iter()
            .chain(std::iter::once(&Rank::Joker))
            .find(|r| r.symbol() == upper)
            .copied()
            .ok_or_else(|| ParseRankError(s.to_string()))
    }
}

/// 返回按 (点数, 花色, 牌副) 排好序的新列表。排序是稳定的。
pub fn sort_cards(cards: &[Card]) -> Vec<Card> {
    let mut sorted = cards.to_vec();
    sorted.sort();
    sorted
}

// --- 牌组生成 ---

/// 合法的牌副数
pub const VALID_DECK_COUNTS: [u8; 2] = [1, 2];

/// 每副牌 52 张普通牌加 2 张王
pub const CARDS_PER_DECK: usize = 54;

/// 创建一副（或两副）带王的牌并用调用方给的随机源洗牌
pub fn build_deck<R: Rng + ?Sized>(deck_count: u8, rng: &mut R) -> Result<Vec<Card>, RoomError> {
    if !VALID_DECK_COUNTS.contains(&deck_count) {
        return Err(RoomError::InvalidDeckCount(deck_count));
    }

    let mut deck = Vec::with_capacity(CARDS_PER_DECK * deck_count as usize);
    for deck_id in 1..=deck_count {
        for &suit in &Suit::STANDARD {
            for &rank in &Rank::STANDARD {
                deck.push(Card::new(rank, suit, deck_id));
            }
        }
        for &variant in &Suit::JOKERS {
            deck.push(Card::new(Rank::Joker, variant, deck_id));
        }
    }

    deck.shuffle(rng);
    Ok(deck)
}

// --- 单元测试 ---
