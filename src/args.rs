use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{config::BalanceConfig, model::structures::category::Category};

#[derive(Parser, Clone, Debug)]
#[command(
    display_name = "Rating Balancer",
    long_about = "Resolves skill ratings for a roster and evens out the red and blue teams"
)]
pub struct Args {
    /// Roster file: a JSON object with `red`, `blue` and optional `spectator` lists of
    /// `{ "id": 1, "name": "nick" }` entries.
    #[arg(short, long, help = "Roster JSON file")]
    pub roster: PathBuf,

    #[arg(
        short,
        long,
        default_value = "ca",
        value_parser = ["ca", "ffa", "ctf", "duel", "tdm"],
        help = "Game category the ratings are for"
    )]
    pub category: String,

    /// Without this flag only the best single switch is reported.
    #[arg(short, long, action = clap::ArgAction::SetTrue, help = "Balance the roster")]
    pub apply: bool,

    /// Persisted ratings and aliases. Created on first save.
    #[arg(short, long, env = "BALANCE_STORE", help = "Key-value store JSON file")]
    pub store: Option<PathBuf>,

    #[arg(long, env = "BALANCE_API_ROOT", help = "Rating service root URL")]
    pub api_root: Option<String>,

    #[arg(long, env = "BALANCE_LOOKUP_TIMEOUT_SECS", help = "Rating service timeout in seconds")]
    pub lookup_timeout: Option<u64>,

    #[arg(long, env = "BALANCE_DEFAULT_RATING", help = "Rating given when none can be found")]
    pub default_rating: Option<i32>,

    #[arg(
        long,
        env = "BALANCE_MINIMUM_SUGGESTION_DIFFERENCE",
        help = "Smallest improvement worth suggesting"
    )]
    pub minimum_suggestion_difference: Option<i32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "RUST_LOG",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        help = "Sets the logging verbosity"
    )]
    pub log_level: String
}

impl Args {
    pub fn category(&self) -> Category {
        self.category.parse().unwrap_or(Category::Ca)
    }

    /// Applies command line overrides on top of `base`.
    pub fn config(&self, base: BalanceConfig) -> BalanceConfig {
        BalanceConfig {
            api_root: self.api_root.clone().unwrap_or(base.api_root),
            lookup_timeout: self.lookup_timeout.map(Duration::from_secs).unwrap_or(base.lookup_timeout),
            default_rating: self.default_rating.unwrap_or(base.default_rating),
            minimum_suggestion_difference: self
                .minimum_suggestion_difference
                .unwrap_or(base.minimum_suggestion_difference),
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use crate::{config::BalanceConfig, model::structures::category::Category};
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_overrides_apply_on_top_of_base() {
        let args = Args::parse_from([
            "rating-balancer",
            "--roster",
            "teams.json",
            "--category",
            "ctf",
            "--default-rating",
            "1400",
            "--lookup-timeout",
            "2"
        ]);
        let config = args.config(BalanceConfig::default());

        assert_eq!(args.category(), Category::Ctf);
        assert!(!args.apply);
        assert_eq!(config.default_rating, 1400);
        assert_eq!(config.lookup_timeout, Duration::from_secs(2));
        assert_eq!(config.minimum_suggestion_difference, 25);
    }

    #[test]
    fn test_rejects_unknown_category() {
        let result = Args::try_parse_from(["rating-balancer", "--roster", "teams.json", "--category", "race"]);
        assert!(result.is_err());
    }
}
