use serde::{Deserialize, Serialize};

/// One finished game as persisted. `at` is the save timestamp (unix seconds)
/// and doubles as the record key; `outcome` is coded 0 = white wins,
/// 1 = black wins, 2 = draw. Move and dice-roll histories are comma-joined
/// strings so the record stays readable in storage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedGame {
    pub at: u64,
    pub user_id: i64,
    pub duration: u64,
    pub opponent: String,
    pub outcome: u8,
    pub move_history: String,
    pub dice_roll_history: String,
    pub user_plays_white: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_fields_are_camel_case() {
        let game = SavedGame {
            at: 10,
            user_id: 1,
            duration: 300,
            opponent: "AI".to_string(),
            outcome: 0,
            move_history: "e4".to_string(),
            dice_roll_history: "1".to_string(),
            user_plays_white: true,
        };
        let json = serde_json::to_string(&game).unwrap();
        assert!(json.contains("\"userId\":1"));
        assert!(json.contains("\"diceRollHistory\":\"1\""));
        assert!(json.contains("\"userPlaysWhite\":true"));
        let back: SavedGame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, game);
    }
}
