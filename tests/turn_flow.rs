use std::str::FromStr;

use chess::{Board, Color, Square};

use dicey_chess_web_app::game::session::{
    CommitOutcome, GameSession, Outcome, Phase, RollOutcome, SelectionOutcome,
};
use dicey_chess_web_app::models::settings::GameSettings;

fn session() -> GameSession {
    GameSession::new(GameSettings::default())
}

fn session_at(fen: &str) -> GameSession {
    GameSession::with_position(GameSettings::default(), Board::from_str(fen).unwrap())
}

fn sq(name: &str) -> Square {
    Square::from_str(name).unwrap()
}

fn play(s: &mut GameSession, from: &str, to: &str) -> CommitOutcome {
    s.select_square(sq(from)).unwrap();
    assert_eq!(s.select_square(sq(to)).unwrap(), SelectionOutcome::MoveReady);
    s.commit_pending().unwrap()
}

#[test]
fn every_dice_pair_grants_the_absolute_difference() {
    for d1 in 1..=6u8 {
        for d2 in 1..=6u8 {
            let mut s = session();
            match s.apply_roll(d1, d2).unwrap() {
                RollOutcome::MovesGranted(n) => {
                    assert_eq!(n, d1.abs_diff(d2));
                    assert_eq!(s.moves_remaining(), n as i32);
                }
                RollOutcome::TurnForfeited => {
                    assert_eq!(d1, d2);
                    assert_eq!(s.turn(), Color::Black);
                }
                RollOutcome::RerollRequired => {
                    panic!("no check in the starting position")
                }
                RollOutcome::NoPlayableMove => {
                    panic!("the starting position always has a playable move")
                }
            }
        }
    }
}

#[test]
fn forfeited_turn_passes_without_any_move() {
    let mut s = session();
    s.apply_roll(3, 3).unwrap();
    assert!(s.flat_san_history().is_empty());
    assert_eq!(s.turn(), Color::Black);
    // black can roll and move right away
    s.apply_roll(2, 1).unwrap();
    assert_eq!(play(&mut s, "e7", "e5"), CommitOutcome::TurnComplete);
}

#[test]
fn a_three_move_turn_keeps_the_mover_on_the_board() {
    let mut s = session();
    s.apply_roll(4, 1).unwrap();
    for (from, to) in [("a2", "a3"), ("b2", "b3")] {
        assert!(matches!(
            play(&mut s, from, to),
            CommitOutcome::MoveCommitted { .. }
        ));
        assert_eq!(s.turn(), Color::White);
        assert_eq!(s.board().side_to_move(), Color::White);
    }
    assert_eq!(play(&mut s, "c2", "c3"), CommitOutcome::TurnComplete);
    assert_eq!(s.turn(), Color::Black);
}

#[test]
fn only_one_move_is_in_flight_at_a_time() {
    let mut s = session();
    s.apply_roll(3, 1).unwrap();
    s.select_square(sq("e2")).unwrap();
    s.select_square(sq("e4")).unwrap();
    // further clicks do nothing until the pending move commits
    assert_eq!(s.select_square(sq("d2")).unwrap(), SelectionOutcome::Ignored);
    assert_eq!(s.select_square(sq("d4")).unwrap(), SelectionOutcome::Ignored);
    s.commit_pending().unwrap();
    assert_eq!(
        s.select_square(sq("d2")).unwrap(),
        SelectionOutcome::FromSelected(sq("d2"))
    );
}

#[test]
fn commit_without_a_pending_move_fails() {
    let mut s = session();
    s.apply_roll(3, 1).unwrap();
    assert!(s.commit_pending().is_err());
}

#[test]
fn checkmate_ends_the_game_on_the_final_move() {
    let mut s = session();
    s.apply_roll(5, 1).unwrap();
    play(&mut s, "e2", "e4");
    play(&mut s, "f1", "c4");
    play(&mut s, "d1", "f3");
    s.select_square(sq("f3")).unwrap();
    s.select_square(sq("f7")).unwrap();
    assert_eq!(
        s.commit_pending().unwrap(),
        CommitOutcome::GameOver(Outcome::WhiteWins)
    );
    assert_eq!(s.phase(), Phase::GameOver);
    // nothing works after the game is over
    assert!(s.apply_roll(2, 1).is_err());
    assert!(s.select_square(sq("e7")).is_err());
}

#[test]
fn mover_out_of_moves_mid_turn_is_a_draw() {
    let mut s = session_at("8/8/8/8/1p6/6q1/1P3k2/7K w - - 0 1");
    s.apply_roll(4, 2).unwrap();
    s.select_square(sq("b2")).unwrap();
    s.select_square(sq("b3")).unwrap();
    assert_eq!(
        s.commit_pending().unwrap(),
        CommitOutcome::GameOver(Outcome::Draw)
    );
    assert_eq!(s.outcome(), Some(Outcome::Draw));
}

#[test]
fn zero_roll_in_check_never_forfeits() {
    let mut s = session_at("4k3/8/8/8/4q3/8/3P4/4K3 w - - 0 1");
    for d in 1..=6u8 {
        assert_eq!(s.apply_roll(d, d).unwrap(), RollOutcome::RerollRequired);
        assert_eq!(s.turn(), Color::White);
    }
    assert!(s.dice_history().is_empty());
}
