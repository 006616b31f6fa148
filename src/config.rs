use crate::domain::Decimal;
use crate::engine::{MatchingConfig, RankLadder};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub matching: MatchingConfig,
    pub matching_concurrency: usize,
    /// Scheduler period in seconds; `0` disables the scheduler.
    pub matching_interval_secs: u64,
    pub bonus_rates: BonusRates,
    pub rank_ladder: RankLadder,
    pub notify_webhook_url: Option<String>,
}

/// Percentages for the order- and match-driven bonuses. Zero disables one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BonusRates {
    pub referral_pct: Decimal,
    pub direct_sales_pct: Decimal,
    pub infinity_pct: Decimal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let bv_per_unit = required_positive(&env_map, "MATCHING_BV_PER_UNIT")?;
        let bonus_per_unit = required_positive(&env_map, "MATCHING_BONUS_PER_UNIT")?;

        let max_units_per_cycle = match env_map.get("MATCHING_MAX_UNITS_PER_CYCLE") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "MATCHING_MAX_UNITS_PER_CYCLE".to_string(),
                    "must be a non-negative integer".to_string(),
                )
            })?),
            None => None,
        };

        let matching_concurrency = env_map
            .get("MATCHING_CONCURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("8")
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MATCHING_CONCURRENCY".to_string(),
                    "must be an integer >= 1".to_string(),
                )
            })?;

        let matching_interval_secs = env_map
            .get("MATCHING_INTERVAL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("21600")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "MATCHING_INTERVAL_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let bonus_rates = BonusRates {
            referral_pct: percentage(&env_map, "REFERRAL_BONUS_PCT")?,
            direct_sales_pct: percentage(&env_map, "DIRECT_SALES_BONUS_PCT")?,
            infinity_pct: percentage(&env_map, "INFINITY_BONUS_PCT")?,
        };

        let rank_ladder = match env_map.get("RANK_LADDER") {
            Some(raw) => parse_rank_ladder(raw)?,
            None => RankLadder::default(),
        };

        let notify_webhook_url = env_map
            .get("NOTIFY_WEBHOOK_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            port,
            database_path,
            matching: MatchingConfig {
                bv_per_unit,
                bonus_per_unit,
                max_units_per_cycle,
            },
            matching_concurrency,
            matching_interval_secs,
            bonus_rates,
            rank_ladder,
            notify_webhook_url,
        })
    }
}

fn required_positive(env_map: &HashMap<String, String>, key: &str) -> Result<Decimal, ConfigError> {
    let raw = env_map
        .get(key)
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))?;
    Decimal::from_str_canonical(raw)
        .ok()
        .filter(|d| d.is_positive())
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), "must be a decimal > 0".to_string()))
}

fn percentage(env_map: &HashMap<String, String>, key: &str) -> Result<Decimal, ConfigError> {
    let Some(raw) = env_map.get(key) else {
        return Ok(Decimal::zero());
    };
    let hundred = Decimal::from_i64(100);
    Decimal::from_str_canonical(raw)
        .ok()
        .filter(|d| !d.is_negative() && *d <= hundred)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), "must be a percentage in [0, 100]".to_string())
        })
}

/// `left:right` pairs for 1_star upward, comma separated.
fn parse_rank_ladder(raw: &str) -> Result<RankLadder, ConfigError> {
    let invalid = |msg: &str| ConfigError::InvalidValue("RANK_LADDER".to_string(), msg.to_string());

    let mut counts = Vec::new();
    for entry in raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let (left, right) = entry
            .split_once(':')
            .ok_or_else(|| invalid("entries must look like left:right"))?;
        let left = left
            .trim()
            .parse::<usize>()
            .map_err(|_| invalid("left count must be an integer"))?;
        let right = right
            .trim()
            .parse::<usize>()
            .map_err(|_| invalid("right count must be an integer"))?;
        counts.push((left, right));
    }

    if counts.is_empty() || counts.len() > 5 {
        return Err(invalid("expected between 1 and 5 tiers"));
    }
    Ok(RankLadder::from_counts(&counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert("MATCHING_BV_PER_UNIT".to_string(), "100".to_string());
        map.insert("MATCHING_BONUS_PER_UNIT".to_string(), "500".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.matching.max_units_per_cycle, None);
        assert_eq!(config.matching_concurrency, 8);
        assert_eq!(config.matching_interval_secs, 21600);
        assert!(config.bonus_rates.referral_pct.is_zero());
        assert_eq!(config.rank_ladder, RankLadder::default());
        assert!(config.notify_webhook_url.is_none());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_bv_per_unit() {
        let mut env_map = setup_required_env();
        env_map.remove("MATCHING_BV_PER_UNIT");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "MATCHING_BV_PER_UNIT"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_zero_bonus_per_unit_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("MATCHING_BONUS_PER_UNIT".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MATCHING_BONUS_PER_UNIT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("MATCHING_CONCURRENCY".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MATCHING_CONCURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_percentage_out_of_range() {
        let mut env_map = setup_required_env();
        env_map.insert("INFINITY_BONUS_PCT".to_string(), "150".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "INFINITY_BONUS_PCT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_cap_and_rates_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("MATCHING_MAX_UNITS_PER_CYCLE".to_string(), "3".to_string());
        env_map.insert("REFERRAL_BONUS_PCT".to_string(), "10".to_string());
        env_map.insert("NOTIFY_WEBHOOK_URL".to_string(), "http://hooks.local/x".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.matching.max_units_per_cycle, Some(3));
        assert_eq!(config.bonus_rates.referral_pct, Decimal::from_i64(10));
        assert_eq!(config.notify_webhook_url.as_deref(), Some("http://hooks.local/x"));
    }

    #[test]
    fn test_rank_ladder_parsing() {
        let ladder = parse_rank_ladder("1:2, 3:3").unwrap();
        let reqs = ladder.requirements();
        assert_eq!(reqs.len(), 2);
        assert_eq!((reqs[0].left, reqs[0].right), (1, 2));
        assert_eq!((reqs[1].left, reqs[1].right), (3, 3));

        assert!(parse_rank_ladder("1-1").is_err());
        assert!(parse_rank_ladder("").is_err());
        assert!(parse_rank_ladder("1:1,1:1,1:1,1:1,1:1,1:1").is_err());
    }
}
