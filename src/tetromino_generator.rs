/*!
This module handles the generation of tetrominos, including the shared-sequence
pairing used in versus play.
*/

use std::collections::VecDeque;

use rand::Rng;

use crate::Tetromino;

/// A producer of the session's tetromino sequence.
///
/// Draws are uniformly random over the seven shapes, taken from the RNG the
/// caller passes in, so the sequence is a pure function of the session seed.
///
/// For versus play two generators are paired *by the caller*: generators hold
/// no reference to each other. Whoever draws first via
/// [`TetrominoGenerator::next_shared`] pushes a copy of the drawn tetromino
/// onto the peer's pending queue, and the peer consumes its queue before
/// drawing fresh shapes. Both sides therefore see the identical shape
/// sequence, each at its own pace.
#[derive(Eq, PartialEq, Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TetrominoGenerator {
    pending: VecDeque<Tetromino>,
}

impl TetrominoGenerator {
    /// Creates a generator with an empty pending queue.
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Appends a tetromino drawn by the paired generator.
    pub fn enqueue(&mut self, tetromino: Tetromino) {
        self.pending.push_back(tetromino);
    }

    /// The tetromino the next call to [`TetrominoGenerator::next`] or
    /// [`TetrominoGenerator::next_shared`] will return, if it is already
    /// determined by the pending queue.
    pub fn peek(&self) -> Option<Tetromino> {
        self.pending.front().copied()
    }

    /// Produces the next tetromino of an unpaired sequence.
    pub fn next(&mut self, rng: &mut impl Rng) -> Tetromino {
        self.pending.pop_front().unwrap_or_else(|| draw(rng))
    }

    /// Produces the next tetromino of a paired sequence.
    ///
    /// A fresh draw (one not already owed from the peer's earlier draws) is
    /// mirrored onto `peer`'s pending queue, keeping both shape sequences
    /// rank-order identical.
    pub fn next_shared(&mut self, rng: &mut impl Rng, peer: &mut TetrominoGenerator) -> Tetromino {
        match self.pending.pop_front() {
            Some(tetromino) => tetromino,
            None => {
                let tetromino = draw(rng);
                peer.enqueue(tetromino);
                tetromino
            }
        }
    }
}

/// One uniformly random tetromino shape.
fn draw(rng: &mut impl Rng) -> Tetromino {
    Tetromino::VARIANTS[rng.random_range(0..=6)]
}
