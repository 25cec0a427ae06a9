//! The move execution engine: transactional execution plus the side-effect
//! accumulator that carries everything a move requested of the framework.

pub mod effects;
pub mod execute;

pub use effects::{
    BeginTurn, DelayedRequest, Effects, ExpirationMove, StatRecord, TurnOptions, TurnTargets,
};
pub use execute::{
    CanDoContext, Engine, ExecMode, ExecuteOptions, MoveContext, MoveOutput, NowContext,
};
