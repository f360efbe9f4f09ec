/*!
# Versus Tetromino Engine

`versus_tetromino_engine` is a deterministic engine for a falling-tetromino game,
with optional two-player versus play (shared piece sequence, garbage line exchange).

The engine owns no clock, draws no pixels and reads no hardware: it consumes
already-decoded [`Command`]s plus a periodic gravity tick, and emits [`Event`]s that
tell external collaborators (renderer, scoreboard, view navigation) what changed.
The gravity cadence itself is engine-owned; embedders reschedule their timer from
[`Game::gravity_interval`] whenever a [`Event::LevelUp`] arrives.

# Examples

```
use versus_tetromino_engine::{Command, Difficulty, Game};

// Starting a session from a fixed seed makes the whole round reproducible.
let mut game = Game::new(42);
let _redraw = game.reset(Difficulty::default());
game.enable();

// Discrete player commands...
let _events = game.apply(Command::MoveLeft).unwrap();
// ...and the periodic gravity tick drive the simulation.
let _events = game.tick().unwrap();

// How long until the embedder should call `tick` again.
let _interval = game.gravity_interval();
```

For two-player matches, see [`Duel`], which owns both sessions and routes
commands, shared piece draws and garbage lines between them.
*/

#![warn(missing_docs)]

mod board;
mod duel;
mod game;
pub mod tetromino_generator;

use std::{error::Error, fmt, num::NonZeroU8};

use rand_chacha::ChaCha12Rng;

pub use board::{Board, PlacedTile};
pub use duel::Duel;
pub use game::{Game, SessionPhase};
pub use tetromino_generator::TetrominoGenerator;

/// Abstract identifier for which type of tile occupies a cell in the grid.
pub type TileTypeID = NonZeroU8;
/// Coordinates conventionally used to index into the [`Board`], starting in the bottom left.
pub type Coord = (usize, usize);
/// Coordinate offsets that can be [`add`]ed to [`Coord`]inates.
pub type Offset = (isize, isize);
/// The internal RNG used by a game session.
pub type GameRng = ChaCha12Rng;

/// The tile id used for injected garbage cells, distinct from all tetromino tile ids.
// SAFETY: Ye, `254 > 0`;
pub const GARBAGE_TILE: TileTypeID = unsafe { NonZeroU8::new_unchecked(254) };

/// Represents one of the seven "Tetrominos";
///
/// A *tetromino* is a two-dimensional, geometric shape made by
/// connecting four squares (orthogonally / along the edges).
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tetromino {
    /// 'O'-Tetromino. Four squares connected as one big square; `██`.
    O = 0,
    /// 'I'-Tetromino. Four squares connected as one straight line; `▄▄▄▄`.
    I = 1,
    /// 'S'-Tetromino. Four squares connected in an 'S'-snaking manner; `▄█▀`.
    S = 2,
    /// 'Z'-Tetromino. Four squares connected in a 'Z'-snaking manner; `▀█▄`.
    Z = 3,
    /// 'T'-Tetromino. Four squares connected in a 'T'-junction shape; `▄█▄`.
    T = 4,
    /// 'L'-Tetromino. Four squares connected in an 'L'-shape; `▄▄█`.
    L = 5,
    /// 'J'-Tetromino. Four squares connected in a 'J'-shape; `█▄▄`.
    J = 6,
}

/// Represents the rotation state an active piece can be in.
///
/// Rotation advances along the fixed 4-cycle `Top → Left → Bottom → Right → Top`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rotation {
    /// Spawn state.
    Top = 0,
    /// One turn from spawn.
    Left,
    /// Two turns from spawn.
    Bottom,
    /// Three turns from spawn.
    Right,
}

/// An active tetromino in play.
///
/// A piece is fully described by its shape, rotation state and pivot position;
/// its four absolute cells are recomputed wholesale from the shape's offset
/// table on every query, so rotation can never drift incrementally.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Piece {
    /// Type of tetromino the active piece is.
    pub tetromino: Tetromino,
    /// In which way the tetromino is re-oriented.
    pub rotation: Rotation,
    /// The position of the pivot cell on the playing grid.
    pub pivot: Coord,
    /// The tile id all four cells carry, usually [`Tetromino::tiletypeid`].
    pub tile: TileTypeID,
}

/// Represents a discrete, already-decoded player input.
///
/// Routing a command to the right player is the embedder's job (see [`Duel`]);
/// a single [`Game`] session only ever sees commands meant for it.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Moves the piece once to the left.
    MoveLeft = 0,
    /// Moves the piece once to the right.
    MoveRight,
    /// Advances the piece's rotation state by one step of the cycle.
    Rotate,
    /// Drops the piece down by one, as if a gravity tick had occurred.
    SoftDrop,
    /// Immediately drops the piece all the way down and locks it there.
    HardDrop,
}

/// Identifies one of the two sides of a [`Duel`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Player {
    /// The left/first player.
    One = 0,
    /// The right/second player.
    Two,
}

/// Immutable per-session difficulty configuration, supplied once at [`Game::reset`].
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Difficulty {
    /// Score multiplier applied on top of the level factor.
    pub level_multiplier: u32,
    /// How aggressively the gravity interval shrinks per level.
    pub speed_multiplier: u32,
    /// Whether [`Game::drop_preview`] exposes the active piece's landing position.
    pub drop_preview: bool,
    /// Whether pieces get a uniformly random tile id instead of their shape's own.
    pub random_tiles: bool,
}

/// Final statistics of one session, handed to the scoreboard collaborator at match end.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchReport {
    /// Total number of lines cleared by this session.
    pub lines_cleared: u32,
    /// Total points scored by this session.
    pub points: u32,
    /// Level the session ended on.
    pub level: u32,
    /// Whether this session topped out (in a duel: lost the match).
    pub is_loser: bool,
}

/// A state-change notification emitted by the engine.
///
/// These are fire-and-forget: external collaborators (renderer, scoreboard,
/// view navigation) consume them, and the engine never waits on anything.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Event {
    /// The sealed layer changed; redraw from [`Board::tiles`].
    StackChanged,
    /// The movable layer changed; redraw from [`Game::active_piece`] and [`Game::next_piece`].
    PieceMoved,
    /// A piece was locked down in a certain configuration.
    PieceLocked {
        /// The piece as it was sealed into the board.
        piece: Piece,
    },
    /// The just-locked piece completed some rows.
    LinesCleared {
        /// How many rows were cleared by this lock.
        count: u32,
        /// Points awarded for this lock (base score plus combo bonus).
        points: u32,
        /// Length of the current combo chain, this clear included.
        combo: u32,
    },
    /// The opponent sent garbage rows onto this board.
    GarbageReceived {
        /// How many garbage rows were injected.
        count: u32,
    },
    /// Enough lines were cleared to advance a level.
    ///
    /// Embedders should re-read [`Game::gravity_interval`] and restart their tick timer.
    LevelUp {
        /// The level just reached.
        level: u32,
    },
    /// The session reached its terminal state (board-top intrusion).
    GameOver {
        /// Final statistics for the scoreboard collaborator.
        report: MatchReport,
    },
}

/// An error that can be returned by the mutating [`Game`] and [`Duel`] operations.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
pub enum UpdateError {
    /// Attempt to advance a session that has already reached its terminal state.
    ///
    /// Only [`Game::reset`] can make the session playable again.
    SessionOver,
}

impl Tetromino {
    /// All `Tetromino` enum variants in order.
    ///
    /// Note that `Tetromino::VARIANTS[t as usize] == t` always holds.
    pub const VARIANTS: [Self; 7] = {
        use Tetromino::*;
        [O, I, S, Z, T, L, J]
    };

    /// Returns the mino offsets of a tetromino shape relative to its pivot cell,
    /// given a rotation state.
    ///
    /// Rotation is table lookup, not matrix math: each shape lists its four
    /// pivot-relative cells explicitly per state. 'O' is identical in all four
    /// states; 'I', 'S' and 'Z' only have two distinct states.
    #[rustfmt::skip]
    pub const fn minos(&self, rotation: Rotation) -> [Offset; 4] {
        use Rotation::*;
        match self {
            Tetromino::O => [(0, 0), (1, 0), (0, 1), (1, 1)],
            Tetromino::I => match rotation {
                Top | Bottom => [(-1, 0), (0, 0), (1, 0), (2, 0)],
                Left | Right => [(0, -1), (0, 0), (0, 1), (0, 2)],
            },
            Tetromino::S => match rotation {
                Top | Bottom => [(-1, 0), (0, 0), (0, 1), (1, 1)],
                Left | Right => [(1, -1), (0, 0), (1, 0), (0, 1)],
            },
            Tetromino::Z => match rotation {
                Top | Bottom => [(0, 0), (1, 0), (-1, 1), (0, 1)],
                Left | Right => [(0, -1), (0, 0), (1, 0), (1, 1)],
            },
            Tetromino::T => match rotation {
                Top    => [(-1, 0), (0, 0), (1, 0), (0, 1)],
                Left   => [(0, -1), (0, 0), (0, 1), (-1, 0)],
                Bottom => [(-1, 0), (0, 0), (1, 0), (0, -1)],
                Right  => [(0, -1), (0, 0), (0, 1), (1, 0)],
            },
            Tetromino::L => match rotation {
                Top    => [(-1, 0), (0, 0), (1, 0), (1, 1)],
                Left   => [(0, -1), (0, 0), (0, 1), (-1, 1)],
                Bottom => [(-1, -1), (-1, 0), (0, 0), (1, 0)],
                Right  => [(0, -1), (0, 0), (0, 1), (1, -1)],
            },
            Tetromino::J => match rotation {
                Top    => [(-1, 1), (-1, 0), (0, 0), (1, 0)],
                Left   => [(-1, -1), (0, -1), (0, 0), (0, 1)],
                Bottom => [(-1, 0), (0, 0), (1, 0), (1, -1)],
                Right  => [(0, -1), (0, 0), (0, 1), (1, 1)],
            },
        }
    }

    /// Returns the convened-on standard tile id corresponding to the given tetromino.
    pub const fn tiletypeid(&self) -> TileTypeID {
        use Tetromino::*;
        let u8 = match self {
            O => 1,
            I => 2,
            S => 3,
            Z => 4,
            T => 5,
            L => 6,
            J => 7,
        };
        // SAFETY: Ye, `u8 > 0`;
        unsafe { NonZeroU8::new_unchecked(u8) }
    }
}

impl Rotation {
    /// All `Rotation` enum variants in cycle order.
    ///
    /// Note that `Rotation::VARIANTS[r as usize] == r` always holds.
    pub const VARIANTS: [Self; 4] = {
        use Rotation::*;
        [Top, Left, Bottom, Right]
    };

    /// The next state in the rotation cycle.
    pub const fn rotated(&self) -> Self {
        Rotation::VARIANTS[(*self as usize + 1) % 4]
    }
}

impl Piece {
    /// Creates a piece in its spawn state, with all cells anchored at the
    /// board's top-left virtual origin.
    ///
    /// The session applies the random legal horizontal offset afterwards,
    /// when the piece actually becomes active.
    pub fn spawn(tetromino: Tetromino, tile: TileTypeID) -> Self {
        let mut min_dx: isize = 0;
        let mut max_dy: isize = 0;
        for (dx, dy) in tetromino.minos(Rotation::Top) {
            min_dx = min_dx.min(dx);
            max_dy = max_dy.max(dy);
        }
        Self {
            tetromino,
            rotation: Rotation::Top,
            pivot: (
                min_dx.unsigned_abs(),
                Board::HEIGHT - 1 - max_dy.unsigned_abs(),
            ),
            tile,
        }
    }

    /// Returns the four absolute cells the piece currently occupies.
    pub fn cells(&self) -> [Coord; 4] {
        // SAFETY: An instantiated piece always sits fully inside the grid.
        self.cells_reoriented(self.rotation)
            .expect("active piece out of grid bounds")
    }

    /// The absolute cells of this piece at pivot position, in the given rotation state.
    ///
    /// Returns `None` when any cell would fall off the low board edges.
    fn cells_reoriented(&self, rotation: Rotation) -> Option<[Coord; 4]> {
        let mut cells = [(0, 0); 4];
        for (cell, offset) in cells.iter_mut().zip(self.tetromino.minos(rotation)) {
            *cell = add(self.pivot, offset)?;
        }
        Some(cells)
    }

    /// Unconditionally translates the piece one cell to the left.
    ///
    /// Callers must have verified [`Piece::can_move_left`] first.
    pub fn move_left(&mut self) {
        self.pivot.0 -= 1;
    }

    /// Unconditionally translates the piece one cell to the right.
    ///
    /// Callers must have verified [`Piece::can_move_right`] first.
    pub fn move_right(&mut self) {
        self.pivot.0 += 1;
    }

    /// Unconditionally translates the piece one cell down.
    ///
    /// Callers must have verified [`Piece::can_move_down`] first.
    pub fn move_down(&mut self) {
        self.pivot.1 -= 1;
    }

    /// Whether the piece can descend one cell without collision.
    pub fn can_move_down(&self, board: &Board) -> bool {
        self.can_shift(board, (0, -1))
    }

    /// Whether the piece can move one cell to the left without collision.
    pub fn can_move_left(&self, board: &Board) -> bool {
        self.can_shift(board, (-1, 0))
    }

    /// Whether the piece can move one cell to the right without collision.
    pub fn can_move_right(&self, board: &Board) -> bool {
        self.can_shift(board, (1, 0))
    }

    /// Whether all cells one `step` over from this piece's cells are occupiable.
    ///
    /// Only the extremal cell per row/column in the direction of travel is
    /// actually checked: an interior cell cannot be blocked without the
    /// extremal cell already being blocked.
    fn can_shift(&self, board: &Board, step: Offset) -> bool {
        let cells = self.cells();
        cells
            .iter()
            .filter(|&&cell| {
                // Extremal in travel direction, i.e. the neighboring cell is not our own.
                !cells
                    .iter()
                    .any(|&other| other != cell && Some(other) == add(cell, step))
            })
            .all(|&cell| matches!(add(cell, step), Some(target) if board.is_occupiable(target)))
    }

    /// Whether the *next* rotation state's absolute cells are all occupiable.
    ///
    /// Always false for 'O', which has no distinct rotation states.
    pub fn can_rotate(&self, board: &Board) -> bool {
        if matches!(self.tetromino, Tetromino::O) {
            return false;
        }
        match self.cells_reoriented(self.rotation.rotated()) {
            Some(cells) => cells.iter().all(|&cell| board.is_occupiable(cell)),
            None => false,
        }
    }

    /// Advances the rotation-state cycle, replacing all four cells wholesale.
    ///
    /// Callers must have verified [`Piece::can_rotate`] first. No-op for 'O'.
    pub fn rotate(&mut self) {
        if matches!(self.tetromino, Tetromino::O) {
            return;
        }
        self.rotation = self.rotation.rotated();
    }

    /// Seals all four cells into the board and returns them for the caller's
    /// placed-tile bookkeeping.
    pub fn seal_into(&self, board: &mut Board) -> [PlacedTile; 4] {
        let tiles = self.cells().map(|position| PlacedTile {
            position,
            tile: self.tile,
        });
        board.seal(&tiles);
        tiles
    }

    /// The position the piece would come to rest at if it fell straight down.
    pub fn dropped(&self, board: &Board) -> Piece {
        let mut piece = *self;
        while piece.can_move_down(board) {
            piece.move_down();
        }
        piece
    }

    /// The leftmost column index the piece occupies.
    pub fn leftmost_x(&self) -> usize {
        // SAFETY: A piece always has exactly 4 cells.
        self.cells().iter().map(|&(x, _)| x).min().unwrap()
    }

    /// The rightmost column index the piece occupies.
    pub fn rightmost_x(&self) -> usize {
        // SAFETY: A piece always has exactly 4 cells.
        self.cells().iter().map(|&(x, _)| x).max().unwrap()
    }

    /// The lowest row index the piece occupies.
    pub fn bottom_y(&self) -> usize {
        // SAFETY: A piece always has exactly 4 cells.
        self.cells().iter().map(|&(_, y)| y).min().unwrap()
    }
}

impl Difficulty {
    /// Relaxed configuration: slow gravity curve, base scoring.
    pub const fn easy() -> Self {
        Self {
            level_multiplier: 1,
            speed_multiplier: 1,
            drop_preview: true,
            random_tiles: false,
        }
    }

    /// Default configuration: doubled score and gravity progression.
    pub const fn normal() -> Self {
        Self {
            level_multiplier: 2,
            speed_multiplier: 2,
            drop_preview: true,
            random_tiles: false,
        }
    }

    /// Punishing configuration: steep gravity curve, no landing preview,
    /// randomly colored tiles, but triple score.
    pub const fn hard() -> Self {
        Self {
            level_multiplier: 3,
            speed_multiplier: 4,
            drop_preview: false,
            random_tiles: true,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::easy()
    }
}

impl Player {
    /// The opposing player.
    pub const fn other(&self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateError::SessionOver => "attempt to advance a session after it ended",
        };
        write!(f, "{s}")
    }
}

impl Error for UpdateError {}

/// Adds an offset to a board coordinate, failing if the result is out of bounds
/// (negative or positive overflow in either direction).
pub fn add((x, y): Coord, (dx, dy): Offset) -> Option<Coord> {
    Some((x.checked_add_signed(dx)?, y.checked_add_signed(dy)?))
}
