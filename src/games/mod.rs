//! Example games validating the engine end to end.

pub mod dice;

pub use dice::{DiceBoard, DiceBoardMove, DiceMove, DicePlayerboard, DiceRace};
