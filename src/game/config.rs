//! Game configuration: player bounds, declared stats, settings.
//!
//! Games declare their static shape up front:
//! - how many players the rules support
//! - which stat keys handlers may log (logging anything else is a bug)
//! - which match-level and per-player settings exist, their options, and
//!   their defaults
//!
//! The declaration is plain data; [`crate::game::NormalizedGame`] validates
//! it and builds the lookup structures the engine consumes.

use serde::{Deserialize, Serialize};

/// One selectable option of a setting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingOption {
    /// Opaque option value, stored verbatim in `Meta`.
    pub value: String,

    /// Whether this option is the declared default.
    pub default: bool,
}

/// A match-level or per-player setting.
///
/// The resolved default is the first option flagged `default`, or the first
/// option when none is flagged. An `exclusive` player setting assigns a
/// distinct option to every player - which requires at least as many options
/// as players.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDef {
    /// Unique setting key.
    pub key: String,

    /// Selectable options, in declaration order.
    pub options: Vec<SettingOption>,

    /// Per-player exclusivity (meaningless for match-level settings).
    pub exclusive: bool,
}

impl SettingDef {
    /// Create a setting with no options yet.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            options: Vec::new(),
            exclusive: false,
        }
    }

    /// Add an option.
    #[must_use]
    pub fn with_option(mut self, value: impl Into<String>) -> Self {
        self.options.push(SettingOption {
            value: value.into(),
            default: false,
        });
        self
    }

    /// Add an option and mark it as the default.
    #[must_use]
    pub fn with_default_option(mut self, value: impl Into<String>) -> Self {
        self.options.push(SettingOption {
            value: value.into(),
            default: true,
        });
        self
    }

    /// Mark this player setting as exclusive (one distinct option per player).
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// The resolved default value: first declared default, else first option.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.default)
            .or_else(|| self.options.first())
            .map(|o| o.value.as_str())
    }
}

/// Complete game declaration consumed by the normalizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Minimum players the rules support.
    pub min_players: usize,

    /// Maximum players the rules support.
    pub max_players: usize,

    /// Declared per-player stat keys.
    pub player_stats: Vec<String>,

    /// Declared match-level stat keys.
    pub match_stats: Vec<String>,

    /// Match-level settings.
    pub game_settings: Vec<SettingDef>,

    /// Per-player settings.
    pub player_settings: Vec<SettingDef>,
}

impl GameConfig {
    /// Create a configuration for the given player range.
    #[must_use]
    pub fn new(min_players: usize, max_players: usize) -> Self {
        Self {
            min_players,
            max_players,
            player_stats: Vec::new(),
            match_stats: Vec::new(),
            game_settings: Vec::new(),
            player_settings: Vec::new(),
        }
    }

    /// Declare a per-player stat key.
    #[must_use]
    pub fn with_player_stat(mut self, key: impl Into<String>) -> Self {
        self.player_stats.push(key.into());
        self
    }

    /// Declare a match-level stat key.
    #[must_use]
    pub fn with_match_stat(mut self, key: impl Into<String>) -> Self {
        self.match_stats.push(key.into());
        self
    }

    /// Declare a match-level setting.
    #[must_use]
    pub fn with_game_setting(mut self, setting: SettingDef) -> Self {
        self.game_settings.push(setting);
        self
    }

    /// Declare a per-player setting.
    #[must_use]
    pub fn with_player_setting(mut self, setting: SettingDef) -> Self {
        self.player_settings.push(setting);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_default_resolution() {
        let setting = SettingDef::new("target")
            .with_option("20")
            .with_default_option("50")
            .with_option("100");

        assert_eq!(setting.default_value(), Some("50"));
    }

    #[test]
    fn test_setting_default_falls_back_to_first() {
        let setting = SettingDef::new("color").with_option("red").with_option("blue");

        assert_eq!(setting.default_value(), Some("red"));
    }

    #[test]
    fn test_setting_no_options() {
        let setting = SettingDef::new("empty");
        assert_eq!(setting.default_value(), None);
    }

    #[test]
    fn test_config_builder() {
        let config = GameConfig::new(2, 4)
            .with_player_stat("rolls")
            .with_match_stat("winning_total")
            .with_game_setting(SettingDef::new("target").with_default_option("20"))
            .with_player_setting(SettingDef::new("color").with_option("red").exclusive());

        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.player_stats, vec!["rolls"]);
        assert_eq!(config.match_stats, vec!["winning_total"]);
        assert_eq!(config.game_settings.len(), 1);
        assert!(config.player_settings[0].exclusive);
    }

    #[test]
    fn test_config_serde() {
        let config = GameConfig::new(2, 8).with_player_stat("wins");
        let json = serde_json::to_string(&config).unwrap();
        let back: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
