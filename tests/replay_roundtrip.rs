use chess::{Board, Piece};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dicey_chess_web_app::game::replay::{ReplayEngine, StepDirection};
use dicey_chess_web_app::game::session::{CommitOutcome, GameSession, RollOutcome, SelectionOutcome};
use dicey_chess_web_app::game::variant;
use dicey_chess_web_app::models::settings::GameSettings;

/// Plays one game with random dice and random variant-legal moves. Returns
/// the session (finished or abandoned after the roll budget).
fn random_playout(seed: u64) -> GameSession {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut session = GameSession::new(GameSettings::default());

    for _ in 0..400 {
        if session.is_game_over() {
            break;
        }
        let granted = loop {
            let d1 = rng.gen_range(1..=6u8);
            let d2 = rng.gen_range(1..=6u8);
            match session.apply_roll(d1, d2).unwrap() {
                RollOutcome::RerollRequired => continue,
                RollOutcome::TurnForfeited | RollOutcome::NoPlayableMove => break false,
                RollOutcome::MovesGranted(_) => break true,
            }
        };
        if !granted || session.is_game_over() {
            continue;
        }
        'turn: loop {
            // both kings survive every intermediate position
            assert_eq!(session.board().pieces(Piece::King).popcnt(), 2);
            let moves = variant::legal_moves(session.board(), session.is_last_move_of_turn());
            assert!(!moves.is_empty(), "session should have drawn instead");
            let mv = moves[rng.gen_range(0..moves.len())];
            session.select_square(mv.get_source()).unwrap();
            match session.select_square(mv.get_dest()).unwrap() {
                SelectionOutcome::MoveReady => {}
                SelectionOutcome::PromotionChoiceRequired(pieces) => {
                    let piece = pieces[rng.gen_range(0..pieces.len())];
                    session.choose_promotion(piece).unwrap();
                }
                other => panic!("unexpected selection outcome {:?}", other),
            }
            match session.commit_pending().unwrap() {
                CommitOutcome::MoveCommitted { .. } => continue 'turn,
                CommitOutcome::TurnComplete | CommitOutcome::GameOver(_) => break 'turn,
            }
        }
    }
    session
}

#[test]
fn random_games_are_replayable_from_their_saved_form() {
    for seed in 0..8u64 {
        let session = random_playout(seed);
        if !session.is_game_over() {
            continue;
        }
        let saved = session.to_saved_game(1_700_000_000).unwrap();
        let mut replay = ReplayEngine::from_saved_game(&saved).unwrap();
        assert_eq!(replay.len(), session.flat_san_history().len());
        while replay.step(StepDirection::Forward).is_some() {}
        assert_eq!(
            replay.board().to_string(),
            session.board().to_string(),
            "seed {} diverged",
            seed
        );
    }
}

#[test]
fn replay_walks_back_to_the_initial_position() {
    let session = {
        let mut s = GameSession::new(GameSettings::default());
        s.apply_roll(3, 1).unwrap();
        for (from, to) in [("e2", "e4"), ("g1", "f3")] {
            s.select_square(from.parse().unwrap()).unwrap();
            s.select_square(to.parse().unwrap()).unwrap();
            s.commit_pending().unwrap();
        }
        s
    };
    let mut replay = ReplayEngine::from_session(&session);
    assert_eq!(replay.len(), 2);
    replay.step(StepDirection::Forward).unwrap();
    replay.step(StepDirection::Forward).unwrap();
    assert!(replay.step(StepDirection::Forward).is_none());
    replay.step(StepDirection::Backward).unwrap();
    replay.step(StepDirection::Backward).unwrap();
    assert!(replay.step(StepDirection::Backward).is_none());
    assert_eq!(replay.board().to_string(), Board::default().to_string());
}

#[test]
fn mismatched_histories_are_rejected_as_corrupt() {
    let session = random_playout(3);
    let Some(mut saved) = session.to_saved_game(1_700_000_000) else {
        return;
    };
    saved.dice_roll_history = "1".to_string();
    if saved.move_history.split(',').count() > 1 {
        assert!(ReplayEngine::from_saved_game(&saved).is_err());
    }
}
