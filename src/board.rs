/*!
This module implements the sealed playing grid: a fixed occupancy grid plus the
parallel collection of placed, colored unit tiles.
*/

use crate::{Coord, TileTypeID, GARBAGE_TILE};

/// A single sealed unit cell on the board, carrying its tile id for rendering.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlacedTile {
    /// Where on the grid the tile sits.
    pub position: Coord,
    /// Which tile type occupies the cell; garbage cells carry [`GARBAGE_TILE`].
    pub tile: TileTypeID,
}

/// The playing grid of one session.
///
/// The board keeps two views of the same sealed state in lock-step: a plain
/// occupancy grid for collision queries, and the list of [`PlacedTile`]s for
/// the render collaborator. A cell is occupied in the grid iff a placed tile
/// records that position. The grid is only ever mutated by [`Board::seal`],
/// [`Board::clear_full_rows`] and [`Board::push_garbage_row`].
#[derive(Eq, PartialEq, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Board {
    /// Occupancy flags, indexed `grid[y][x]` with `y = 0` at the bottom.
    grid: [[bool; Self::WIDTH]; Self::HEIGHT],
    /// The sealed, colored unit tiles, in no particular order.
    tiles: Vec<PlacedTile>,
}

impl Board {
    /// The playing grid width.
    pub const WIDTH: usize = 10;
    /// The playing grid height. Any sealed cell in the top two rows ends the session.
    pub const HEIGHT: usize = 20;

    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            grid: [[false; Self::WIDTH]; Self::HEIGHT],
            tiles: Vec::new(),
        }
    }

    /// Whether `coord` lies within grid bounds and its occupancy cell is empty.
    pub fn is_occupiable(&self, (x, y): Coord) -> bool {
        x < Self::WIDTH && y < Self::HEIGHT && !self.grid[y][x]
    }

    /// Whether `coord` lies within grid bounds and its occupancy cell is filled.
    pub fn is_occupied(&self, (x, y): Coord) -> bool {
        x < Self::WIDTH && y < Self::HEIGHT && self.grid[y][x]
    }

    /// Read accessor for the sealed unit tiles, for the render collaborator.
    pub fn tiles(&self) -> &[PlacedTile] {
        &self.tiles
    }

    /// The sum of occupancy flags in row `y`.
    pub fn occupied_in_row(&self, y: usize) -> usize {
        self.grid[y].iter().filter(|&&cell| cell).count()
    }

    /// Marks each given tile's position as occupied and records it as placed.
    ///
    /// No legality check is performed; the caller must have verified that the
    /// placement is final (the piece could not descend further).
    pub fn seal(&mut self, tiles: &[PlacedTile]) {
        for tile in tiles {
            let (x, y) = tile.position;
            self.grid[y][x] = true;
            self.tiles.push(*tile);
        }
    }

    /// Removes every fully-occupied row and returns how many were removed.
    ///
    /// Rows are scanned top to bottom; for each full row the rows above shift
    /// down by one and a fresh empty row appears at the top. Placed tiles on a
    /// cleared row are dropped, tiles above it follow their row down.
    pub fn clear_full_rows(&mut self) -> u32 {
        let mut cleared = 0;
        for y in (0..Self::HEIGHT).rev() {
            if self.grid[y].iter().all(|&cell| cell) {
                self.remove_row(y);
                cleared += 1;
            }
        }
        cleared
    }

    fn remove_row(&mut self, y: usize) {
        for yy in y..Self::HEIGHT - 1 {
            self.grid[yy] = self.grid[yy + 1];
        }
        self.grid[Self::HEIGHT - 1] = [false; Self::WIDTH];
        self.tiles.retain(|tile| tile.position.1 != y);
        for tile in &mut self.tiles {
            if tile.position.1 > y {
                tile.position.1 -= 1;
            }
        }
    }

    /// Injects one garbage row at the bottom, fully occupied except at `gap_x`.
    ///
    /// The whole stack shifts up by one: the topmost grid row is dropped and
    /// placed tiles pushed past the top are discarded. A `gap_x` outside the
    /// grid is clamped to the last column, never rejected. Whether the shift
    /// completes new rows is for the caller to re-check afterwards.
    pub fn push_garbage_row(&mut self, gap_x: usize) {
        let gap_x = gap_x.min(Self::WIDTH - 1);
        for yy in (1..Self::HEIGHT).rev() {
            self.grid[yy] = self.grid[yy - 1];
        }
        self.grid[0] = [true; Self::WIDTH];
        self.grid[0][gap_x] = false;

        for tile in &mut self.tiles {
            tile.position.1 += 1;
        }
        self.tiles.retain(|tile| tile.position.1 < Self::HEIGHT);
        for x in (0..Self::WIDTH).filter(|&x| x != gap_x) {
            self.tiles.push(PlacedTile {
                position: (x, 0),
                tile: GARBAGE_TILE,
            });
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_at(position: Coord) -> PlacedTile {
        PlacedTile {
            position,
            tile: GARBAGE_TILE,
        }
    }

    fn full_row(y: usize) -> Vec<PlacedTile> {
        (0..Board::WIDTH).map(|x| tile_at((x, y))).collect()
    }

    #[test]
    fn occupancy_and_tiles_stay_in_lockstep() {
        let mut board = Board::new();
        board.seal(&[tile_at((0, 0)), tile_at((9, 19)), tile_at((4, 7))]);
        for y in 0..Board::HEIGHT {
            for x in 0..Board::WIDTH {
                let recorded = board.tiles().iter().any(|t| t.position == (x, y));
                assert_eq!(board.is_occupied((x, y)), recorded, "mismatch at ({x}, {y})");
                assert_eq!(board.is_occupiable((x, y)), !recorded);
            }
        }
    }

    #[test]
    fn out_of_bounds_is_never_occupiable() {
        let board = Board::new();
        assert!(!board.is_occupiable((Board::WIDTH, 0)));
        assert!(!board.is_occupiable((0, Board::HEIGHT)));
        assert!(!board.is_occupied((Board::WIDTH, 5)));
    }

    #[test]
    fn clearing_a_single_row_shifts_tiles_above_down() {
        let mut board = Board::new();
        board.seal(&full_row(0));
        board.seal(&[tile_at((4, 3)), tile_at((7, 1))]);
        assert_eq!(board.clear_full_rows(), 1);
        assert_eq!(board.occupied_in_row(0), 1);
        assert!(board.is_occupied((7, 0)));
        assert!(board.is_occupied((4, 2)));
        assert_eq!(board.tiles().len(), 2);
        // A fresh empty row appeared at the top.
        assert_eq!(board.occupied_in_row(Board::HEIGHT - 1), 0);
    }

    #[test]
    fn clearing_multiple_and_nonadjacent_rows() {
        let mut board = Board::new();
        board.seal(&full_row(0));
        board.seal(&full_row(2));
        board.seal(&full_row(3));
        board.seal(&[tile_at((1, 1)), tile_at((5, 6))]);
        assert_eq!(board.clear_full_rows(), 3);
        assert!(board.is_occupied((1, 0)));
        assert!(board.is_occupied((5, 3)));
        assert_eq!(board.tiles().len(), 2);
    }

    #[test]
    fn no_full_rows_clears_nothing() {
        let mut board = Board::new();
        board.seal(&[tile_at((0, 0)), tile_at((1, 0))]);
        assert_eq!(board.clear_full_rows(), 0);
        assert_eq!(board.tiles().len(), 2);
    }

    #[test]
    fn garbage_row_has_exactly_one_gap() {
        let mut board = Board::new();
        board.seal(&[tile_at((0, 0))]);
        board.push_garbage_row(5);
        assert_eq!(board.occupied_in_row(0), Board::WIDTH - 1);
        assert!(board.is_occupiable((5, 0)));
        // The previously sealed tile followed the stack up.
        assert!(board.is_occupied((0, 1)));
        assert!(board
            .tiles()
            .iter()
            .any(|t| t.position == (0, 1) && t.tile == GARBAGE_TILE));
        assert_eq!(board.tiles().len(), 1 + (Board::WIDTH - 1));
        // All injected tiles carry the garbage id.
        for tile in board.tiles().iter().filter(|t| t.position.1 == 0) {
            assert_eq!(tile.tile, GARBAGE_TILE);
        }
    }

    #[test]
    fn garbage_push_discards_tiles_shifted_past_the_top() {
        let mut board = Board::new();
        board.seal(&[tile_at((3, Board::HEIGHT - 1)), tile_at((3, 0))]);
        board.push_garbage_row(0);
        assert!(board
            .tiles()
            .iter()
            .all(|t| t.position.1 < Board::HEIGHT));
        assert!(board.is_occupied((3, 1)));
        // Top row now holds what was below it, not the discarded tile.
        assert!(!board.tiles().iter().any(|t| t.position == (3, Board::HEIGHT - 1)));
    }

    #[test]
    fn garbage_gap_out_of_range_is_clamped() {
        let mut board = Board::new();
        board.push_garbage_row(Board::WIDTH + 3);
        assert!(board.is_occupiable((Board::WIDTH - 1, 0)));
        assert_eq!(board.occupied_in_row(0), Board::WIDTH - 1);
    }
}
