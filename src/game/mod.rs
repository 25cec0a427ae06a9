//! Game definitions: configuration, the `Game` trait, and normalization.

pub mod config;
pub mod registry;
pub mod rules;

pub use config::{GameConfig, SettingDef, SettingOption};
pub use registry::NormalizedGame;
pub use rules::{
    Boards, BotChoice, BotView, BoardValue, Game, InitialBoards, MoveValue, NowVerdict,
    SetupContext,
};
