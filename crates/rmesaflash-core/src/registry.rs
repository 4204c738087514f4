//! Bounded collection of identified boards

use crate::board::{Board, BoardName};
use crate::error::{Error, Result};

/// Default number of boards a registry holds
pub const MAX_BOARDS: usize = 8;

/// Boards found during scanning
///
/// Capacity is fixed at construction. Adding a board to a full registry is
/// an error; boards are never dropped silently.
#[derive(Debug)]
pub struct BoardRegistry {
    boards: Vec<Board>,
    capacity: usize,
}

impl BoardRegistry {
    /// Registry holding up to [`MAX_BOARDS`] boards
    pub fn new() -> Self {
        Self::with_capacity(MAX_BOARDS)
    }

    /// Registry holding up to `capacity` boards
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            boards: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of boards
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of boards registered
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    /// True if no boards are registered
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// True if another board would not fit
    pub fn is_full(&self) -> bool {
        self.boards.len() >= self.capacity
    }

    /// Add a board
    ///
    /// On [`Error::RegistryFull`] the board is dropped, which releases its
    /// bus.
    pub fn push(&mut self, board: Board) -> Result<&mut Board> {
        if self.is_full() {
            log::error!(
                "board registry full ({}), can't add {}",
                self.capacity,
                board.info().name
            );
            return Err(Error::RegistryFull {
                capacity: self.capacity,
            });
        }
        self.boards.push(board);
        let index = self.boards.len() - 1;
        Ok(&mut self.boards[index])
    }

    /// Board at `index`
    pub fn get(&self, index: usize) -> Option<&Board> {
        self.boards.get(index)
    }

    /// Mutable board at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Board> {
        self.boards.get_mut(index)
    }

    /// First board with the given tag
    pub fn find(&mut self, name: BoardName) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.info().name == name)
    }

    /// Iterate over boards in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Board> {
        self.boards.iter()
    }

    /// Iterate mutably over boards in discovery order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Board> {
        self.boards.iter_mut()
    }

    /// Release every board's bus
    ///
    /// Boards stay registered. Safe to call repeatedly.
    pub fn release_all(&mut self) {
        for board in &mut self.boards {
            board.release();
        }
    }
}

impl Default for BoardRegistry {
    fn default() -> Self {
        Self::new()
    }
}
