//! Game definition normalization.
//!
//! Validates a [`GameConfig`] once, up front, and builds the id-indexed
//! lookup structures the engine consults on every move: stat key sets for
//! fail-fast logging, setting indexes for default resolution and exclusive
//! per-player assignment.
//!
//! Configuration problems are reported here, at match-init time - an
//! exclusive player setting that cannot cover the player count must fail
//! before the first move, not when the setting is first read.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

use crate::core::UserId;
use crate::error::EngineError;

use super::config::{GameConfig, SettingDef};

/// A validated game configuration with efficient lookups.
#[derive(Clone, Debug)]
pub struct NormalizedGame {
    config: GameConfig,
    player_stat_keys: FxHashSet<String>,
    match_stat_keys: FxHashSet<String>,
    game_setting_index: FxHashMap<String, usize>,
    player_setting_index: FxHashMap<String, usize>,
}

impl NormalizedGame {
    /// Validate and index a configuration.
    pub fn new(config: GameConfig) -> Result<Self, EngineError> {
        if config.min_players == 0 {
            return Err(EngineError::InvalidConfig(
                "min_players must be at least 1".to_string(),
            ));
        }
        if config.min_players > config.max_players {
            return Err(EngineError::InvalidConfig(format!(
                "min_players ({}) exceeds max_players ({})",
                config.min_players, config.max_players
            )));
        }

        let player_stat_keys = index_keys(&config.player_stats, "player stat")?;
        let match_stat_keys = index_keys(&config.match_stats, "match stat")?;
        let game_setting_index = index_settings(&config.game_settings, "game setting")?;
        let player_setting_index = index_settings(&config.player_settings, "player setting")?;

        Ok(Self {
            config,
            player_stat_keys,
            match_stat_keys,
            game_setting_index,
            player_setting_index,
        })
    }

    /// The underlying configuration.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Whether a per-player stat key was declared.
    #[must_use]
    pub fn has_player_stat(&self, key: &str) -> bool {
        self.player_stat_keys.contains(key)
    }

    /// Whether a match-level stat key was declared.
    #[must_use]
    pub fn has_match_stat(&self, key: &str) -> bool {
        self.match_stat_keys.contains(key)
    }

    /// Look up a match-level setting.
    #[must_use]
    pub fn game_setting(&self, key: &str) -> Option<&SettingDef> {
        self.game_setting_index
            .get(key)
            .map(|&i| &self.config.game_settings[i])
    }

    /// Look up a per-player setting.
    #[must_use]
    pub fn player_setting(&self, key: &str) -> Option<&SettingDef> {
        self.player_setting_index
            .get(key)
            .map(|&i| &self.config.player_settings[i])
    }

    /// Check a proposed player count against the declared bounds.
    pub fn check_player_count(&self, count: usize) -> Result<(), EngineError> {
        if count < self.config.min_players || count > self.config.max_players {
            return Err(EngineError::InvalidConfig(format!(
                "{} players requested, game supports {}..={}",
                count, self.config.min_players, self.config.max_players
            )));
        }
        Ok(())
    }

    /// Resolve every match-level setting to its default value.
    #[must_use]
    pub fn default_game_settings(&self) -> BTreeMap<String, String> {
        self.config
            .game_settings
            .iter()
            .filter_map(|s| {
                s.default_value()
                    .map(|v| (s.key.clone(), v.to_string()))
            })
            .collect()
    }

    /// Resolve per-player settings for the given roster.
    ///
    /// Exclusive settings hand option *i* to player *i* in registration
    /// order; a roster larger than the option list is a fatal configuration
    /// error. Non-exclusive settings give every player the default.
    pub fn assign_player_settings(
        &self,
        users: &[UserId],
    ) -> Result<BTreeMap<UserId, BTreeMap<String, String>>, EngineError> {
        let mut assigned: BTreeMap<UserId, BTreeMap<String, String>> =
            users.iter().map(|u| (u.clone(), BTreeMap::new())).collect();

        for setting in &self.config.player_settings {
            if setting.exclusive {
                if setting.options.len() < users.len() {
                    return Err(EngineError::InvalidConfig(format!(
                        "exclusive player setting `{}` has {} options for {} players",
                        setting.key,
                        setting.options.len(),
                        users.len()
                    )));
                }
                for (user, option) in users.iter().zip(&setting.options) {
                    if let Some(entry) = assigned.get_mut(user) {
                        entry.insert(setting.key.clone(), option.value.clone());
                    }
                }
            } else if let Some(default) = setting.default_value() {
                for user in users {
                    if let Some(entry) = assigned.get_mut(user) {
                        entry.insert(setting.key.clone(), default.to_string());
                    }
                }
            }
        }

        Ok(assigned)
    }
}

fn index_keys(keys: &[String], kind: &str) -> Result<FxHashSet<String>, EngineError> {
    let mut set = FxHashSet::default();
    for key in keys {
        if !set.insert(key.clone()) {
            return Err(EngineError::InvalidConfig(format!(
                "duplicate {} key `{}`",
                kind, key
            )));
        }
    }
    Ok(set)
}

fn index_settings(
    settings: &[SettingDef],
    kind: &str,
) -> Result<FxHashMap<String, usize>, EngineError> {
    let mut index = FxHashMap::default();
    for (i, setting) in settings.iter().enumerate() {
        if setting.options.is_empty() {
            return Err(EngineError::InvalidConfig(format!(
                "{} `{}` declares no options",
                kind, setting.key
            )));
        }
        if index.insert(setting.key.clone(), i).is_some() {
            return Err(EngineError::InvalidConfig(format!(
                "duplicate {} key `{}`",
                kind, setting.key
            )));
        }
    }
    Ok(index)
}
