use std::{env, fs, path::Path, time::Duration};

use url::Url;

use crate::{
    domain::{GameplayType, QuickThereConfig},
    errors::Error,
    groups::GroupDefaults,
    ids::MAX_MACHINE_ID,
    menu::MenuSettings,
    Result,
};

/// Typed configuration, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub redis_url: String,
    pub database_url: String,

    // Callback tokens and private-chat sessions
    pub callback_token_ttl: Duration,
    pub private_chat_cache_ttl: Duration,
    pub id_machine_id: u16,

    // Menus
    pub button_label_max_length: usize,
    pub max_draw_cycle: u32,
    pub max_odds: f64,

    // New groups
    pub default_draw_cycle: u32,
    pub default_simple_odds: f64,
    pub default_triplet_odds: f64,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `load` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required env vars
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let database_url = get("DATABASE_URL").ok_or_else(|| {
            Error::Config("DATABASE_URL environment variable is required".to_string())
        })?;
        let redis_url = get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());

        check_url("DATABASE_URL", &database_url, &["postgres", "postgresql"])?;
        check_url("REDIS_URL", &redis_url, &["redis", "rediss"])?;

        let callback_token_ttl =
            Duration::from_secs(parse_or(&get, "CALLBACK_TOKEN_TTL_SECS", 3600u64)?);
        let private_chat_cache_ttl =
            Duration::from_secs(parse_or(&get, "PRIVATE_CHAT_CACHE_TTL_SECS", 86_400u64)?);
        if callback_token_ttl.is_zero() || private_chat_cache_ttl.is_zero() {
            return Err(Error::Config("cache TTLs must be positive".to_string()));
        }

        let id_machine_id = parse_or(&get, "ID_MACHINE_ID", 1u16)?;
        if id_machine_id > MAX_MACHINE_ID {
            return Err(Error::Config(format!(
                "ID_MACHINE_ID must be at most {MAX_MACHINE_ID}"
            )));
        }

        let button_label_max_length = parse_or(&get, "BUTTON_LABEL_MAX_LENGTH", 30usize)?;
        let max_draw_cycle = parse_or(&get, "MAX_DRAW_CYCLE_MINUTES", 1440u32)?;
        let default_draw_cycle = parse_or(&get, "DEFAULT_DRAW_CYCLE_MINUTES", 5u32)?;
        if default_draw_cycle == 0 || default_draw_cycle > max_draw_cycle {
            return Err(Error::Config(format!(
                "DEFAULT_DRAW_CYCLE_MINUTES must be between 1 and {max_draw_cycle}"
            )));
        }

        let max_odds = parse_or(&get, "MAX_ODDS", 1000.0f64)?;
        let default_simple_odds = parse_or(&get, "DEFAULT_SIMPLE_ODDS", 2.0f64)?;
        let default_triplet_odds = parse_or(&get, "DEFAULT_TRIPLET_ODDS", 30.0f64)?;
        for (key, v) in [
            ("DEFAULT_SIMPLE_ODDS", default_simple_odds),
            ("DEFAULT_TRIPLET_ODDS", default_triplet_odds),
        ] {
            if !(v.is_finite() && v > 0.0 && v <= max_odds) {
                return Err(Error::Config(format!(
                    "{key} must be above 0 and at most {max_odds}"
                )));
            }
        }

        Ok(Self {
            telegram_bot_token,
            redis_url,
            database_url,
            callback_token_ttl,
            private_chat_cache_ttl,
            id_machine_id,
            button_label_max_length,
            max_draw_cycle,
            max_odds,
            default_draw_cycle,
            default_simple_odds,
            default_triplet_odds,
        })
    }

    pub fn default_odds(&self) -> QuickThereConfig {
        QuickThereConfig {
            simple_odds: self.default_simple_odds,
            triplet_odds: self.default_triplet_odds,
        }
    }

    pub fn menu_settings(&self) -> MenuSettings {
        MenuSettings {
            button_label_max_length: self.button_label_max_length,
            max_draw_cycle: self.max_draw_cycle,
            max_odds: self.max_odds,
            default_odds: self.default_odds(),
        }
    }

    pub fn group_defaults(&self) -> GroupDefaults {
        GroupDefaults {
            gameplay_type: GameplayType::QuickThere,
            draw_cycle: self.default_draw_cycle,
            odds: self.default_odds(),
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue; // existing env wins
        }

        let mut val = v.trim();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }
        env::set_var(key, val);
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw}"))),
    }
}

fn check_url(key: &str, raw: &str, schemes: &[&str]) -> Result<()> {
    let url = Url::parse(raw).map_err(|e| Error::Config(format!("{key} is not a URL: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(Error::Config(format!(
            "{key} must use one of {schemes:?}, got {}",
            url.scheme()
        )));
    }
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("DATABASE_URL", "postgres://bot@localhost/dice"),
    ];

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.callback_token_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.private_chat_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.menu_settings().button_label_max_length, 30);
        assert_eq!(cfg.group_defaults().draw_cycle, 5);
        assert_eq!(cfg.default_odds().triplet_odds, 30.0);
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[REQUIRED[1]])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("TELEGRAM_BOT_TOKEN")));
    }

    #[test]
    fn rejects_bad_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CALLBACK_TOKEN_TTL_SECS", "soon"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ID_MACHINE_ID", "4096"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("REDIS_URL", "http://cache"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
