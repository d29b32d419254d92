//! Match phases and the pure transition function.

use serde::Serialize;

/// One of the two cabinet positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Player {
    /// Left position, sensor channel 0
    One,
    /// Right position, sensor channel 1
    Two,
}

impl Player {
    /// Both players in index order.
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    /// 0-based index used for readings, scores, and lamps.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// Player for a 0-based index. Only bit 0 is considered.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        if index & 1 == 0 { Self::One } else { Self::Two }
    }

    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::One => "player1",
            Self::Two => "player2",
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Attract loop, waiting for a start press
    #[default]
    Idle,
    /// Countdown clip before play
    Countdown,
    /// Players are pulling; readings are sampled
    Active,
    /// Victory clip for one player
    Winner(Player),
}

impl Phase {
    /// Label for logs, metrics, and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Countdown => "countdown",
            Self::Active => "active",
            Self::Winner(Player::One) => "winner_p1",
            Self::Winner(Player::Two) => "winner_p2",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the winner from settled scores.
///
/// Player one must score strictly higher; a tie goes to player two.
#[must_use]
pub const fn decide_winner(scores: [u8; 2]) -> Player {
    if scores[0] > scores[1] {
        Player::One
    } else {
        Player::Two
    }
}

/// Result of evaluating the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Phase to enter
    pub to: Phase,
    /// Whether the start request is consumed by this transition
    pub clear_start: bool,
    /// Whether starting is re-enabled by this transition
    pub allow_start: bool,
}

impl Transition {
    const fn to(phase: Phase) -> Self {
        Self {
            to: phase,
            clear_start: false,
            allow_start: false,
        }
    }
}

/// Transition table of the match.
///
/// | from      | condition         | to                      |
/// |-----------|-------------------|-------------------------|
/// | Idle      | start requested   | Countdown (clear start) |
/// | Idle      | otherwise         | Idle                    |
/// | Countdown | always            | Active                  |
/// | Active    | always            | Winner(decided)         |
/// | Winner    | always            | Idle (allow start)      |
#[must_use]
pub const fn next_phase(current: Phase, start_requested: bool, scores: [u8; 2]) -> Transition {
    match current {
        Phase::Idle if start_requested => Transition {
            to: Phase::Countdown,
            clear_start: true,
            allow_start: false,
        },
        Phase::Idle => Transition::to(Phase::Idle),
        Phase::Countdown => Transition::to(Phase::Active),
        Phase::Active => Transition::to(Phase::Winner(decide_winner(scores))),
        Phase::Winner(_) => Transition {
            to: Phase::Idle,
            clear_start: false,
            allow_start: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [Phase; 5] = [
        Phase::Idle,
        Phase::Countdown,
        Phase::Active,
        Phase::Winner(Player::One),
        Phase::Winner(Player::Two),
    ];

    #[test]
    fn test_idle_without_start_stays_idle() {
        let t = next_phase(Phase::Idle, false, [0, 0]);
        assert_eq!(t.to, Phase::Idle);
        assert!(!t.clear_start);
        assert!(!t.allow_start);
    }

    #[test]
    fn test_idle_with_start_counts_down() {
        let t = next_phase(Phase::Idle, true, [0, 0]);
        assert_eq!(t.to, Phase::Countdown);
        assert!(t.clear_start);
    }

    #[test]
    fn test_countdown_is_unconditional() {
        for start in [false, true] {
            for scores in [[0, 0], [99, 1], [1, 99]] {
                assert_eq!(next_phase(Phase::Countdown, start, scores).to, Phase::Active);
            }
        }
    }

    #[test]
    fn test_active_strict_greater_for_player_one() {
        assert_eq!(
            next_phase(Phase::Active, false, [80, 40]).to,
            Phase::Winner(Player::One)
        );
        assert_eq!(
            next_phase(Phase::Active, false, [40, 80]).to,
            Phase::Winner(Player::Two)
        );
        assert_eq!(
            next_phase(Phase::Active, false, [55, 55]).to,
            Phase::Winner(Player::Two)
        );
    }

    #[test]
    fn test_winner_returns_to_idle_and_allows_start() {
        for player in Player::ALL {
            let t = next_phase(Phase::Winner(player), true, [10, 20]);
            assert_eq!(t.to, Phase::Idle);
            assert!(t.allow_start);
            assert!(!t.clear_start);
        }
    }

    #[test]
    fn test_table_is_total() {
        // Every combination yields a phase; only Idle consults start, only
        // Active consults scores.
        for phase in ALL_PHASES {
            for start in [false, true] {
                for scores in [[0, 0], [1, 0], [0, 1]] {
                    let t = next_phase(phase, start, scores);
                    match phase {
                        Phase::Idle => {
                            assert_eq!(t.to == Phase::Countdown, start);
                        }
                        Phase::Countdown => assert_eq!(t.to, Phase::Active),
                        Phase::Active => {
                            assert_eq!(t.to, Phase::Winner(decide_winner(scores)));
                        }
                        Phase::Winner(_) => assert_eq!(t.to, Phase::Idle),
                    }
                }
            }
        }
    }

    #[test]
    fn test_player_index_round_trip() {
        for player in Player::ALL {
            assert_eq!(Player::from_index(player.index()), player);
        }
        assert_eq!(Player::from_index(3), Player::Two);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Winner(Player::Two).to_string(), "winner_p2");
        assert_eq!(Phase::default(), Phase::Idle);
    }
}
