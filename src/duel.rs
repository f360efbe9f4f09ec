/*!
This module implements the two-player match coordinator that owns both game
sessions and routes commands, shared piece draws and garbage between them.
*/

use rand::{Rng, SeedableRng};

use crate::{
    game::Game, Command, Difficulty, Event, GameRng, MatchReport, Player, UpdateError,
};

/// How many garbage rows a single clear sends at most.
const GARBAGE_CAP: u32 = 4;

/// Events of a duel update, each tagged with the player whose board it concerns.
pub type DuelEvents = Vec<(Player, Event)>;

/// A two-player versus match.
///
/// `Duel` owns both [`Game`] sessions outright; the sessions never hold
/// references to each other. All coupling between the boards (the shared piece
/// sequence, garbage lines, the match outcome) happens here: commands and
/// ticks are routed to the addressed session with the other session passed as
/// peer, and the resulting events are inspected before being handed back.
///
/// ```
/// use versus_tetromino_engine::{Command, Difficulty, Duel, Player};
///
/// let mut duel = Duel::new(42);
/// duel.reset(Difficulty::normal());
/// duel.enable();
///
/// duel.apply(Player::One, Command::MoveRight).unwrap();
/// duel.tick(Player::One).unwrap();
/// duel.tick(Player::Two).unwrap();
///
/// // Both sides play the identical shape sequence.
/// let one = duel.game(Player::One).active_piece().unwrap().tetromino;
/// let two = duel.game(Player::Two).active_piece().unwrap().tetromino;
/// assert_eq!(one, two);
/// ```
#[derive(Eq, PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Duel {
    games: [Game; 2],
    /// The player whose session topped out first, once the match is decided.
    loser: Option<Player>,
}

impl Duel {
    /// Creates an idle duel; both sessions' randomness derives from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut rng = GameRng::seed_from_u64(seed);
        Self {
            games: [Game::new(rng.random()), Game::new(rng.random())],
            loser: None,
        }
    }

    /// Creates a duel from a thread-random seed.
    pub fn new_random() -> Self {
        Self::new(rand::random())
    }

    /// Re-initializes both sessions with the same difficulty and a freshly
    /// paired piece sequence.
    pub fn reset(&mut self, difficulty: Difficulty) -> DuelEvents {
        self.loser = None;
        let [one, two] = &mut self.games;
        one.clear_pending();
        two.clear_pending();
        let mut events: DuelEvents = one
            .reset_vs(difficulty, two)
            .into_iter()
            .map(|event| (Player::One, event))
            .collect();
        events.extend(
            two.reset_vs(difficulty, one)
                .into_iter()
                .map(|event| (Player::Two, event)),
        );
        events
    }

    /// Starts (or resumes) gravity on both sessions.
    pub fn enable(&mut self) {
        for game in &mut self.games {
            game.enable();
        }
    }

    /// Pauses both sessions.
    pub fn disable(&mut self) {
        for game in &mut self.games {
            game.disable();
        }
    }

    /// Applies one command to the addressed player's session.
    pub fn apply(&mut self, player: Player, command: Command) -> Result<DuelEvents, UpdateError> {
        if self.loser.is_some() {
            return Err(UpdateError::SessionOver);
        }
        let (game, peer) = self.pair_mut(player);
        let events = game.apply_vs(command, peer)?;
        Ok(self.route(player, events))
    }

    /// Advances the addressed player's session by one gravity tick.
    pub fn tick(&mut self, player: Player) -> Result<DuelEvents, UpdateError> {
        if self.loser.is_some() {
            return Err(UpdateError::SessionOver);
        }
        let (game, peer) = self.pair_mut(player);
        let events = game.tick_vs(peer)?;
        Ok(self.route(player, events))
    }

    /// The player who topped out, once the match is decided.
    pub fn outcome(&self) -> Option<Player> {
        self.loser
    }

    /// Final statistics of both sessions, indexed by `Player as usize`.
    pub fn reports(&self) -> [MatchReport; 2] {
        let [one, two] = &self.games;
        [one.report(), two.report()]
    }

    /// Read access to one player's session, for the render collaborator.
    pub fn game(&self, player: Player) -> &Game {
        &self.games[player as usize]
    }

    /// Splits the sessions into the addressed one and its peer.
    fn pair_mut(&mut self, player: Player) -> (&mut Game, &mut Game) {
        let [one, two] = &mut self.games;
        match player {
            Player::One => (one, two),
            Player::Two => (two, one),
        }
    }

    /// Tags `origin`'s events, converts its line clears into garbage for the
    /// opponent, and settles the match outcome on a game over.
    fn route(&mut self, origin: Player, events: Vec<Event>) -> DuelEvents {
        let mut routed: DuelEvents = Vec::with_capacity(events.len());
        for event in events {
            routed.push((origin, event));
            match event {
                Event::LinesCleared { count, .. } => {
                    let (_, peer) = self.pair_mut(origin);
                    if let Ok(received) = peer.push_garbage(count.min(GARBAGE_CAP)) {
                        routed.extend(received.into_iter().map(|e| (origin.other(), e)));
                    }
                }
                Event::GameOver { .. } => {
                    self.loser = Some(origin);
                    let (_, winner) = self.pair_mut(origin);
                    winner.disable();
                }
                _ => {}
            }
        }
        routed
    }
}
