use crate::card::*;
use crate::error::GameError;
use crate::state::*;
use std::collections::{HashMap, HashSet};

// --- 核心游戏流程函数 ---

impl GameState {
    fn require_phase(&self, allowed: &[GamePhase]) -> Result<(), GameError> {
        if allowed.contains(&self.phase) {
            return Ok(());
        }
        let expected = allowed.iter().map(|p| format!("{:?}", p)).collect::<Vec<_>>().join(", ");
        Err(GameError::InvalidPhase { actual: self.phase, expected })
    }

    /// 开局前登记一名玩家
    pub fn add_player(&mut self, player: Player) -> Result<(), GameError> {
        self.require_phase(&[GamePhase::WaitingForPlayers])?;
        if self.players.contains_key(&player.id) {
            return Err(GameError::DuplicatePlayer(player.id));
        }
        self.players.insert(player.id, player);
        Ok(())
    }

    /// 设置出牌顺序和方向，进入发牌阶段
    ///
    /// 出牌顺序必须恰好是所有已登记玩家（至少两名），之后不再改变。
    pub fn start_game(&mut self, turn_order: Vec<PlayerId>, direction: TurnDirection) -> Result<(), GameError> {
        self.require_phase(&[GamePhase::WaitingForPlayers])?;

        if turn_order.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }
        if let Some(unknown) = turn_order.iter().find(|id| !self.players.contains_key(*id)) {
            return Err(GameError::UnknownPlayer(*unknown));
        }
        let distinct: HashSet<_> = turn_order.iter().collect();
        if distinct.len() != turn_order.len() || distinct.len() != self.players.len() {
            return Err(GameError::TurnOrderMismatch);
        }

        self.turn_order = turn_order;
        self.current_turn_index = 0;
        self.direction = direction;
        self.phase = GamePhase::Dealing;
        Ok(())
    }

    /// 写入发好的手牌（排序后保存），进入第一位玩家的回合
    pub fn set_dealt_hands(&mut self, mut hands: HashMap<PlayerId, Vec<Card>>) -> Result<(), GameError> {
        self.require_phase(&[GamePhase::Dealing])?;

        // 先全部校验，再修改
        if let Some(missing) = self.turn_order.iter().find(|id| !hands.contains_key(*id)) {
            return Err(GameError::MissingHand(*missing));
        }

        for player_id in &self.turn_order {
            let dealt = hands.remove(player_id).unwrap_or_default();
            if let Some(player) = self.players.get_mut(player_id) {
                player.hand = sort_cards(&dealt);
            }
        }

        self.phase = GamePhase::PlayerTurn;
        Ok(())
    }

    /// 获取当前行动的玩家ID
    pub fn current_player_id(&self) -> Result<PlayerId, GameError> {
        self.require_phase(&[GamePhase::PlayerTurn, GamePhase::ClaimMade])?;
        self.turn_order
            .get(self.current_turn_index)
            .copied()
            .ok_or(GameError::TurnOrderNotSet)
    }

    fn require_current(&self, player_id: PlayerId) -> Result<(), GameError> {
        if self.current_player_id()? != player_id {
            return Err(GameError::OutOfTurn(player_id));
        }
        Ok(())
    }

    /// 从手牌中打出若干张牌并声明点数
    ///
    /// 本轮的第一次声明锁定点数并记录开轮玩家；之后同一轮里的声明必须是同一点数。
    /// 打出的牌保持它们在手牌中的相对顺序，作为质疑时可翻的“上一手”。
    pub fn play_cards(&mut self, player_id: PlayerId, card_indices: &[usize], claim_rank: Rank) -> Result<(), GameError> {
        self.require_phase(&[GamePhase::PlayerTurn, GamePhase::ClaimMade])?;
        self.require_current(player_id)?;

        if !claim_rank.is_claimable() {
            return Err(GameError::InvalidClaimRank(claim_rank));
        }
        if card_indices.is_empty() {
            return Err(GameError::NoCardsSelected);
        }

        let hand_size = self.players.get(&player_id).ok_or(GameError::UnknownPlayer(player_id))?.hand.len();
        if let Some(&index) = card_indices.iter().find(|&&i| i >= hand_size) {
            return Err(GameError::CardIndexOutOfRange { index, hand_size });
        }
        let distinct: HashSet<_> = card_indices.iter().collect();
        if distinct.len() != card_indices.len() {
            return Err(GameError::DuplicateIndices);
        }

        if self.last_claim.is_some() {
            if let Some(locked) = self.round_rank {
                if locked != claim_rank {
                    return Err(GameError::ClaimRankMismatch { locked, claimed: claim_rank });
                }
            }
        }

        // 校验全部通过，开始修改状态
        if self.last_claim.is_none() {
            self.round_rank = Some(claim_rank);
            self.round_starter_id = Some(player_id);
        }

        let mut descending = card_indices.to_vec();
        descending.sort_unstable_by(|a, b| b.cmp(a));

        let mut played = Vec::with_capacity(descending.len());
        if let Some(player) = self.players.get_mut(&player_id) {
            for index in descending {
                played.push(player.hand.remove(index));
            }
        }
        played.reverse();

        self.pile.extend_from_slice(&played);
        self.last_claim = Some(Claim { player_id, rank: claim_rank, count: played.len() });
        self.last_played_cards = played;
        self.phase = GamePhase::ClaimMade;

        self.update_finished();
        self.advance_turn();
        Ok(())
    }

    /// 过牌。返回本次过牌是否把牌堆移入了弃牌堆。
    ///
    /// 开轮玩家的声明绕桌一圈无人质疑、再次轮到他并过牌时，本轮的牌堆整体弃掉。
    pub fn pass_turn(&mut self, player_id: PlayerId) -> Result<bool, GameError> {
        self.require_phase(&[GamePhase::PlayerTurn, GamePhase::ClaimMade])?;
        self.require_current(player_id)?;

        let discarded = self.phase == GamePhase::ClaimMade && self.round_starter_id == Some(player_id);
        if discarded {
            self.clear_round(true);
        }

        self.update_finished();
        self.advance_turn();
        Ok(discarded)
    }

    /// 质疑上一手声明，从上一手的牌中翻开 `pick_index` 这一张
    ///
    /// 翻开的牌与声明点数一致（王总算一致）时质疑者收走整个牌堆，否则声明者收走。
    pub fn call_bluff(&mut self, challenger_id: PlayerId, pick_index: usize) -> Result<ChallengeOutcome, GameError> {
        self.require_phase(&[GamePhase::ClaimMade])?;
        self.require_current(challenger_id)?;

        let claim = self.last_claim.clone().ok_or(GameError::NoClaim)?;
        if challenger_id == claim.player_id {
            return Err(GameError::SelfChallenge);
        }
        if !self.players.contains_key(&challenger_id) {
            return Err(GameError::UnknownPlayer(challenger_id));
        }
        if self.last_played_cards.is_empty() {
            return Err(GameError::EmptyPile);
        }
        let picked_card = *self
            .last_played_cards
            .get(pick_index)
            .ok_or(GameError::PickIndexOutOfRange { index: pick_index, count: self.last_played_cards.len() })?;

        let picked_matches_claim = picked_card.rank == claim.rank || picked_card.rank.is_joker();
        let penalty_player_id = if picked_matches_claim { challenger_id } else { claim.player_id };

        let penalized = self
            .players
            .get_mut(&penalty_player_id)
            .ok_or(GameError::UnknownPlayer(penalty_player_id))?;
        penalized.hand.append(&mut self.pile);
        penalized.hand = sort_cards(&penalized.hand);

        self.clear_round(false);
        self.update_finished();
        self.advance_turn();

        Ok(ChallengeOutcome {
            claimant_id: claim.player_id,
            challenger_id,
            penalty_player_id,
            picked_card,
            picked_matches_claim,
        })
    }

    /// 最终名次：按完成顺序排列，输家（如果有）排在最后
    pub fn standings(&self) -> Vec<PlayerId> {
        self.finished_order.iter().copied().chain(self.loser_id).collect()
    }

    // --- 辅助逻辑函数 ---

    /// 清空本轮状态；`discard` 为真时牌堆进入弃牌堆
    fn clear_round(&mut self, discard: bool) {
        if discard {
            self.discard_pile.append(&mut self.pile);
        }
        self.pile.clear();
        self.last_claim = None;
        self.last_played_cards.clear();
        self.round_rank = None;
        self.round_starter_id = None;
        self.phase = GamePhase::PlayerTurn;
    }

    /// 将行动权转移给下一位尚未完成的玩家；找不到则游戏结束
    fn advance_turn(&mut self) {
        if self.phase == GamePhase::GameOver || self.turn_order.is_empty() {
            return;
        }

        let len = self.turn_order.len() as isize;
        let step = self.direction.step();
        let mut index = self.current_turn_index as isize;

        for _ in 0..len {
            index = (index + step).rem_euclid(len);
            if !self.finished_order.contains(&self.turn_order[index as usize]) {
                self.current_turn_index = index as usize;
                return;
            }
        }

        self.phase = GamePhase::GameOver;
    }

    /// 更新完成顺序并检测游戏是否结束
    fn update_finished(&mut self) {
        let open_claimant = self.last_claim.as_ref().map(|c| c.player_id);

        // 刚用最后的牌做出声明的玩家要等本轮结算（质疑或弃牌）后才算完成
        let newly_finished: Vec<PlayerId> = self
            .turn_order
            .iter()
            .filter(|id| !self.finished_order.contains(id))
            .filter(|id| Some(**id) != open_claimant)
            .filter(|id| self.players.get(*id).is_some_and(|p| p.hand.is_empty()))
            .copied()
            .collect();
        self.finished_order.extend(newly_finished);

        if let Some(claimant) = open_claimant {
            if self.players.get(&claimant).is_some_and(|p| p.hand.is_empty()) {
                return;
            }
        }

        let remaining_with_cards: Vec<PlayerId> = self
            .turn_order
            .iter()
            .filter(|id| !self.finished_order.contains(id))
            .filter(|id| self.players.get(*id).is_some_and(|p| !p.hand.is_empty()))
            .copied()
            .collect();

        match remaining_with_cards.as_slice() {
            [loser] => {
                self.loser_id = Some(*loser);
                self.phase = GamePhase::GameOver;
            }
            [] => {
                self.loser_id = None;
                self.phase = GamePhase::GameOver;
            }
            _ => {}
        }
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use Rank::*;
    use Suit::*;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit, 1)
    }

    // 辅助函数：按给定手牌创建一局已发好牌的游戏
    fn setup_test_game(hands: Vec<Vec<Card>>, direction: TurnDirection) -> (GameState, Vec<PlayerId>) {
        let mut state = GameState::new();
        let mut player_ids = Vec::new();
        for i in 0..hands.len() {
            let id = Uuid::new_v4();
            state.add_player(Player::new(id, format!("P{}", i + 1))).unwrap();
            player_ids.push(id);
        }
        state.start_game(player_ids.clone(), direction).unwrap();
        let dealt = player_ids.iter().copied().zip(hands).collect();
        state.set_dealt_hands(dealt).unwrap();
        (state, player_ids)
    }

    fn setup_two_player_state() -> (GameState, Vec<PlayerId>) {
        setup_test_game(vec![vec![card(Ace, Spade)], vec![card(King, Heart)]], TurnDirection::Clockwise)
    }

    fn hand_len(state: &GameState, id: &PlayerId) -> usize {
        state.player(id).unwrap().hand.len()
    }

    #[test]
    fn test_lifecycle_phases() {
        let mut state = GameState::new();
        assert_eq!(state.phase(), GamePhase::WaitingForPlayers);
        assert!(matches!(state.current_player_id(), Err(GameError::InvalidPhase { .. })));

        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        state.add_player(Player::new(a, "A")).unwrap();
        assert_eq!(state.add_player(Player::new(a, "A again")), Err(GameError::DuplicatePlayer(a)));
        state.add_player(Player::new(b, "B")).unwrap();

        state.start_game(vec![b, a], TurnDirection::Clockwise).unwrap();
        assert_eq!(state.phase(), GamePhase::Dealing);
        assert!(matches!(state.add_player(Player::new(Uuid::new_v4(), "late")), Err(GameError::InvalidPhase { .. })));

        let missing: HashMap<_, _> = [(b, vec![card(Two, Club)])].into_iter().collect();
        assert_eq!(state.set_dealt_hands(missing), Err(GameError::MissingHand(a)));
        assert_eq!(state.phase(), GamePhase::Dealing);

        let hands = [(a, vec![card(King, Spade), card(Ace, Heart)]), (b, vec![card(Two, Club)])].into_iter().collect();
        state.set_dealt_hands(hands).unwrap();
        assert_eq!(state.phase(), GamePhase::PlayerTurn);
        assert_eq!(state.current_player_id(), Ok(b));
        // 手牌排序后保存
        assert_eq!(state.player(&a).unwrap().hand, vec![card(Ace, Heart), card(King, Spade)]);
    }

    #[test]
    fn test_start_game_requires_two_players() {
        let mut state = GameState::new();
        let p1 = Uuid::new_v4();
        state.add_player(Player::new(p1, "P1")).unwrap();
        assert_eq!(state.start_game(vec![p1], TurnDirection::Clockwise), Err(GameError::NotEnoughPlayers));
        assert_eq!(state.phase(), GamePhase::WaitingForPlayers);
    }

    #[test]
    fn test_start_game_rejects_bad_turn_order() {
        let mut state = GameState::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        state.add_player(Player::new(a, "A")).unwrap();
        state.add_player(Player::new(b, "B")).unwrap();
        state.add_player(Player::new(c, "C")).unwrap();

        let stranger = Uuid::new_v4();
        assert_eq!(state.start_game(vec![a, stranger], TurnDirection::Clockwise), Err(GameError::UnknownPlayer(stranger)));
        assert_eq!(state.start_game(vec![a, b], TurnDirection::Clockwise), Err(GameError::TurnOrderMismatch));
        assert_eq!(state.start_game(vec![a, b, b], TurnDirection::Clockwise), Err(GameError::TurnOrderMismatch));
        assert!(state.turn_order().is_empty());
        state.start_game(vec![c, a, b], TurnDirection::Counterclockwise).unwrap();
        assert_eq!(state.turn_order(), &[c, a, b]);
    }

    #[test]
    fn test_play_cards_updates_claim_and_pile() {
        let (mut state, p) = setup_two_player_state();
        state.play_cards(p[0], &[0], Ace).unwrap();

        let claim = state.last_claim().unwrap();
        assert_eq!(claim.rank, Ace);
        assert_eq!(claim.count, 1);
        assert_eq!(state.pile_size(), 1);
        assert_eq!(state.phase(), GamePhase::ClaimMade);
        assert_eq!(state.current_player_id(), Ok(p[1]));
        assert_eq!(state.round_rank(), Some(Ace));
        assert_eq!(state.round_starter_id(), Some(p[0]));
    }

    #[test]
    fn test_played_cards_keep_hand_order() {
        let hand = vec![card(Two, Club), card(Five, Diamond), card(Nine, Heart), card(King, Spade)];
        let (mut state, p) = setup_test_game(vec![hand, vec![card(Ace, Club)]], TurnDirection::Clockwise);

        state.play_cards(p[0], &[3, 0, 2], Seven).unwrap();
        assert_eq!(state.last_played_cards(), &[card(Two, Club), card(Nine, Heart), card(King, Spade)]);
        assert_eq!(state.player(&p[0]).unwrap().hand, vec![card(Five, Diamond)]);
        assert_eq!(state.last_claim().unwrap().count, 3);
    }

    #[test]
    fn test_invalid_plays_leave_state_unchanged() {
        let hand = vec![card(Two, Club), card(Five, Diamond)];
        let (mut state, p) = setup_test_game(vec![hand.clone(), hand], TurnDirection::Clockwise);
        let before = state.clone();

        assert_eq!(state.play_cards(p[1], &[0], Ace), Err(GameError::OutOfTurn(p[1])));
        assert_eq!(state.play_cards(p[0], &[], Ace), Err(GameError::NoCardsSelected));
        assert_eq!(state.play_cards(p[0], &[0, 0], Ace), Err(GameError::DuplicateIndices));
        assert_eq!(
            state.play_cards(p[0], &[0, 2], Ace),
            Err(GameError::CardIndexOutOfRange { index: 2, hand_size: 2 })
        );
        assert_eq!(state.play_cards(p[0], &[0], Joker), Err(GameError::InvalidClaimRank(Joker)));
        assert!(matches!(state.call_bluff(p[0], 0), Err(GameError::InvalidPhase { .. })));
        assert_eq!(state, before);
    }

    #[test]
    fn test_claim_rank_locked_for_round() {
        let hand = vec![card(Two, Club), card(Five, Diamond)];
        let (mut state, p) = setup_test_game(vec![hand.clone(), hand], TurnDirection::Clockwise);
        state.play_cards(p[0], &[0], Ace).unwrap();
        let before = state.clone();

        assert_eq!(
            state.play_cards(p[1], &[0], King),
            Err(GameError::ClaimRankMismatch { locked: Ace, claimed: King })
        );
        assert_eq!(state, before);

        // 同一点数的继续出牌是允许的，开轮玩家不变
        state.play_cards(p[1], &[1], Ace).unwrap();
        assert_eq!(state.round_starter_id(), Some(p[0]));
        assert_eq!(state.last_claim().unwrap().player_id, p[1]);
        assert_eq!(state.pile_size(), 2);
        assert_eq!(state.last_played_cards(), &[card(Five, Diamond)]);
    }

    #[test]
    fn test_call_bluff_penalizes_challenger_on_truthful_claim() {
        let (mut state, p) = setup_two_player_state();
        state.play_cards(p[0], &[0], Ace).unwrap();
        assert_eq!(state.phase(), GamePhase::ClaimMade);
        assert_eq!(state.current_player_id(), Ok(p[1]));

        let outcome = state.call_bluff(p[1], 0).unwrap();
        assert!(outcome.picked_matches_claim);
        assert_eq!(outcome.penalty_player_id, p[1]);
        assert_eq!(outcome.claimant_id, p[0]);
        assert_eq!(outcome.picked_card.code(), "AS");
        assert_eq!(hand_len(&state, &p[1]), 2);

        // p1 的声明结算后才算完成，剩下 p2 一人有牌，游戏结束
        assert_eq!(state.finished_order(), &[p[0]]);
        assert_eq!(state.loser_id(), Some(p[1]));
        assert_eq!(state.phase(), GamePhase::GameOver);
    }

    #[test]
    fn test_call_bluff_penalizes_claimant_on_false_claim() {
        let (mut state, p) = setup_test_game(vec![vec![card(King, Spade)], vec![card(King, Heart)]], TurnDirection::Clockwise);
        state.play_cards(p[0], &[0], Ace).unwrap();

        let outcome = state.call_bluff(p[1], 0).unwrap();
        assert!(!outcome.picked_matches_claim);
        assert_eq!(outcome.penalty_player_id, p[0]);
        assert_eq!(hand_len(&state, &p[0]), 1);
        assert_eq!(state.pile_size(), 0);
        assert_eq!(state.discard_size(), 0);
        assert!(state.last_claim().is_none());
        assert_eq!(state.phase(), GamePhase::PlayerTurn);
        assert_eq!(state.current_player_id(), Ok(p[0]));
    }

    #[test]
    fn test_joker_always_matches_claim() {
        let (mut state, p) = setup_test_game(
            vec![vec![card(Joker, RedJoker), card(Three, Club)], vec![card(King, Heart)]],
            TurnDirection::Clockwise,
        );
        // 排序后王在最后
        state.play_cards(p[0], &[1], Queen).unwrap();
        let outcome = state.call_bluff(p[1], 0).unwrap();
        assert!(outcome.picked_matches_claim);
        assert_eq!(outcome.penalty_player_id, p[1]);
    }

    #[test]
    fn test_call_bluff_rejections() {
        let hand = vec![card(Two, Club), card(Five, Diamond)];
        let (mut state, p) = setup_test_game(vec![hand.clone(), hand.clone(), hand], TurnDirection::Clockwise);
        state.play_cards(p[0], &[0], Two).unwrap();
        let before = state.clone();

        assert_eq!(state.call_bluff(p[2], 0), Err(GameError::OutOfTurn(p[2])));
        assert_eq!(state.call_bluff(p[1], 2), Err(GameError::PickIndexOutOfRange { index: 2, count: 1 }));
        assert_eq!(state, before);

        // p2 继续出牌，p3 过牌，轮回开轮玩家时仍可以质疑 p2 的那一手
        state.play_cards(p[1], &[0], Two).unwrap();
        state.pass_turn(p[2]).unwrap();
        assert_eq!(state.current_player_id(), Ok(p[0]));
        let outcome = state.call_bluff(p[0], 0).unwrap();
        assert_eq!(outcome.claimant_id, p[1]);
        assert!(outcome.picked_matches_claim);
        assert_eq!(outcome.penalty_player_id, p[0]);
        assert_eq!(hand_len(&state, &p[0]), 3);
    }

    #[test]
    fn test_self_challenge_rejected() {
        let (mut state, p) = setup_two_player_state();
        state.play_cards(p[0], &[0], Ace).unwrap();
        state.play_cards(p[1], &[0], Ace).unwrap();

        // p1 已完成被跳过，行动权回到声明者 p2 自己
        assert_eq!(state.finished_order(), &[p[0]]);
        assert_eq!(state.current_player_id(), Ok(p[1]));
        let before = state.clone();
        assert_eq!(state.call_bluff(p[1], 0), Err(GameError::SelfChallenge));
        assert_eq!(state, before);

        // 开轮玩家已经完成，这一轮只能靠质疑结算，过牌不会弃牌
        assert_eq!(state.pass_turn(p[1]), Ok(false));
        assert_eq!(state.phase(), GamePhase::ClaimMade);
        assert_eq!(state.current_player_id(), Ok(p[1]));
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let hands = vec![
            vec![card(Two, Club), card(Five, Diamond), card(Nine, Spade)],
            vec![card(Ace, Club), card(Ace, Diamond)],
        ];
        let (mut state, p) = setup_test_game(hands, TurnDirection::Clockwise);
        state.play_cards(p[0], &[0, 2], Two).unwrap();

        let mut first = state.clone();
        let mut second = state.clone();
        let a = first.call_bluff(p[1], 1).unwrap();
        let b = second.call_bluff(p[1], 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(first, second);
        assert!(!a.picked_matches_claim);
        assert_eq!(hand_len(&first, &p[0]), 3);
    }

    #[test]
    fn test_pass_turn_discards_when_round_starter_passes() {
        let (mut state, p) = setup_test_game(
            vec![
                vec![card(Ace, Spade), card(Two, Club)],
                vec![card(King, Heart)],
                vec![card(Queen, Diamond)],
            ],
            TurnDirection::Clockwise,
        );
        state.play_cards(p[0], &[0], Ace).unwrap();
        assert_eq!(state.pass_turn(p[1]), Ok(false));
        assert_eq!(state.pass_turn(p[2]), Ok(false));
        assert_eq!(state.pass_turn(p[0]), Ok(true));

        assert_eq!(state.discard_size(), 1);
        assert_eq!(state.pile_size(), 0);
        assert_eq!(state.phase(), GamePhase::PlayerTurn);
        assert!(state.last_claim().is_none());
        assert!(state.round_rank().is_none());
        assert!(state.round_starter_id().is_none());
        assert_eq!(state.current_player_id(), Ok(p[1]));

        // 没有未结声明时过牌只是把回合交给下一位
        assert_eq!(state.pass_turn(p[1]), Ok(false));
        assert_eq!(state.current_player_id(), Ok(p[2]));
    }

    #[test]
    fn test_finish_deferred_while_claim_open() {
        let (mut state, p) = setup_test_game(
            vec![
                vec![card(Ace, Spade)],
                vec![card(King, Heart), card(Two, Diamond)],
                vec![card(Queen, Diamond), card(Three, Club)],
            ],
            TurnDirection::Clockwise,
        );
        state.play_cards(p[0], &[0], Ace).unwrap();
        assert_eq!(hand_len(&state, &p[0]), 0);
        assert!(state.finished_order().is_empty());

        state.pass_turn(p[1]).unwrap();
        state.pass_turn(p[2]).unwrap();
        assert!(state.finished_order().is_empty());
        assert_eq!(state.current_player_id(), Ok(p[0]));

        assert_eq!(state.pass_turn(p[0]), Ok(true));
        assert_eq!(state.finished_order(), &[p[0]]);
        assert_eq!(state.phase(), GamePhase::PlayerTurn);
        assert_eq!(state.current_player_id(), Ok(p[1]));
    }

    #[test]
    fn test_counterclockwise_skips_finished_players() {
        let (mut state, p) = setup_test_game(
            vec![
                vec![card(Ace, Spade), card(Four, Heart)],
                vec![card(King, Heart), card(Two, Diamond)],
                vec![card(Queen, Diamond)],
            ],
            TurnDirection::Counterclockwise,
        );
        // 逆时针：p1 -> p3 -> p2
        state.play_cards(p[0], &[0], Ace).unwrap();
        assert_eq!(state.current_player_id(), Ok(p[2]));
        state.play_cards(p[2], &[0], Ace).unwrap();
        assert_eq!(state.current_player_id(), Ok(p[1]));
        // p2 质疑 p3：QD 不是 A，p3 收回整个牌堆
        let outcome = state.call_bluff(p[1], 0).unwrap();
        assert_eq!(outcome.penalty_player_id, p[2]);
        assert_eq!(hand_len(&state, &p[2]), 2);
        assert_eq!(state.current_player_id(), Ok(p[0]));
    }

    #[test]
    fn test_game_over_with_standings() {
        let (mut state, p) = setup_test_game(
            vec![vec![card(Ace, Spade)], vec![card(King, Heart)], vec![card(Queen, Diamond)]],
            TurnDirection::Clockwise,
        );
        state.play_cards(p[0], &[0], Ace).unwrap();
        state.pass_turn(p[1]).unwrap();
        state.pass_turn(p[2]).unwrap();
        assert_eq!(state.pass_turn(p[0]), Ok(true));
        assert_eq!(state.finished_order(), &[p[0]]);
        assert_eq!(state.current_player_id(), Ok(p[1]));

        state.play_cards(p[1], &[0], King).unwrap();
        assert_eq!(state.finished_order(), &[p[0]]);
        let outcome = state.call_bluff(p[2], 0).unwrap();
        assert_eq!(outcome.penalty_player_id, p[2]);

        assert_eq!(state.phase(), GamePhase::GameOver);
        assert_eq!(state.loser_id(), Some(p[2]));
        assert_eq!(state.standings(), vec![p[0], p[1], p[2]]);
        assert!(matches!(state.current_player_id(), Err(GameError::InvalidPhase { .. })));
        assert!(matches!(state.pass_turn(p[2]), Err(GameError::InvalidPhase { .. })));
        assert_eq!(state.total_cards(), 3);
    }

    #[test]
    fn test_no_loser_when_everyone_empties_together() {
        let (mut state, p) = setup_test_game(vec![vec![card(Ace, Spade)], vec![card(King, Heart)]], TurnDirection::Clockwise);
        // 直接构造两人手牌同时为空、没有未结声明的局面
        state.players.get_mut(&p[0]).unwrap().hand.clear();
        state.players.get_mut(&p[1]).unwrap().hand.clear();
        state.discard_pile = vec![card(Ace, Spade), card(King, Heart)];
        state.update_finished();

        assert_eq!(state.phase(), GamePhase::GameOver);
        assert_eq!(state.loser_id(), None);
        assert_eq!(state.standings(), vec![p[0], p[1]]);
    }

    #[test]
    fn test_cards_are_conserved() {
        let hands = vec![
            vec![card(Ace, Spade), card(Two, Club), card(Three, Club)],
            vec![card(King, Heart), card(Four, Diamond)],
            vec![card(Queen, Diamond), card(Five, Spade)],
        ];
        let (mut state, p) = setup_test_game(hands, TurnDirection::Clockwise);
        let total = state.total_cards();

        state.play_cards(p[0], &[0, 1], Ace).unwrap();
        assert_eq!(state.total_cards(), total);
        state.play_cards(p[1], &[1], Ace).unwrap();
        assert_eq!(state.total_cards(), total);
        state.call_bluff(p[2], 0).unwrap();
        assert_eq!(state.total_cards(), total);
        let _ = state.play_cards(p[0], &[0], Ten);
        assert_eq!(state.total_cards(), total);
    }
}
