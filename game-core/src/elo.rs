//! ELO rating updates for finished two-player matches.

/// Players below this many games use the higher provisional K-factor.
pub const PROVISIONAL_GAMES: i32 = 30;
pub const K_PROVISIONAL: f64 = 32.0;
pub const K_ESTABLISHED: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloUpdate {
    pub new_rating: i32,
    pub change: i32,
}

impl EloUpdate {
    fn unchanged(rating: i32) -> Self {
        EloUpdate {
            new_rating: rating,
            change: 0,
        }
    }
}

/// Rating change for a single player given the match outcome.
pub fn elo_change(rating: i32, opponent_rating: i32, won: bool, games_played: i32) -> EloUpdate {
    let k = if games_played < PROVISIONAL_GAMES {
        K_PROVISIONAL
    } else {
        K_ESTABLISHED
    };

    let expected = 1.0 / (1.0 + 10f64.powf((opponent_rating - rating) as f64 / 400.0));
    let actual = if won { 1.0 } else { 0.0 };
    let change = (k * (actual - expected)).round() as i32;

    EloUpdate {
        new_rating: rating + change,
        change,
    }
}

/// Rating changes for both players from their final match scores.
/// Equal scores are a tie and change nothing: a single round cannot
/// tie, but aggregate match scores can.
pub fn match_elo_changes(
    rating1: i32,
    rating2: i32,
    score1: i32,
    score2: i32,
    games_played1: i32,
    games_played2: i32,
) -> (EloUpdate, EloUpdate) {
    if score1 == score2 {
        return (EloUpdate::unchanged(rating1), EloUpdate::unchanged(rating2));
    }

    let player1_won = score1 > score2;
    (
        elo_change(rating1, rating2, player1_won, games_played1),
        elo_change(rating2, rating1, !player1_won, games_played2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_k_factor_below_30_games() {
        // Equal ratings, expected score 0.5: delta is round(K * 0.5)
        let update = elo_change(1000, 1000, true, 0);
        assert_eq!(update.change, 16);
        assert_eq!(update.new_rating, 1016);

        let update = elo_change(1000, 1000, true, 29);
        assert_eq!(update.change, 16);
    }

    #[test]
    fn test_established_k_factor_from_30_games() {
        let update = elo_change(1000, 1000, true, 30);
        assert_eq!(update.change, 8);

        let update = elo_change(1000, 1000, false, 100);
        assert_eq!(update.change, -8);
        assert_eq!(update.new_rating, 992);
    }

    #[test]
    fn test_underdog_gains_more() {
        let upset = elo_change(1000, 1400, true, 0);
        let favorite = elo_change(1400, 1000, true, 0);
        assert!(upset.change > favorite.change);
        assert!(upset.change > 16);
        assert!(favorite.change < 16);
    }

    #[test]
    fn test_match_changes_are_symmetric_for_equal_ratings() {
        let (p1, p2) = match_elo_changes(1000, 1000, 10_000, 0, 0, 0);
        assert_eq!(p1.change, 16);
        assert_eq!(p2.change, -16);
        assert_eq!(p1.new_rating, 1016);
        assert_eq!(p2.new_rating, 984);
    }

    #[test]
    fn test_tie_changes_nothing_regardless_of_gap() {
        let (p1, p2) = match_elo_changes(1000, 1600, 5000, 5000, 0, 50);
        assert_eq!(p1.change, 0);
        assert_eq!(p2.change, 0);
        assert_eq!(p1.new_rating, 1000);
        assert_eq!(p2.new_rating, 1600);
    }

    #[test]
    fn test_loser_identified_by_score_not_order() {
        let (p1, p2) = match_elo_changes(1000, 1000, 0, 9000, 0, 0);
        assert_eq!(p1.change, -16);
        assert_eq!(p2.change, 16);
    }
}
