// Rating defaults
pub const DEFAULT_RATING: i32 = 1250;
pub const MINIMUM_SUGGESTION_DIFFERENCE: i32 = 25;
// Name resolution
pub const MAX_NAME_RETRIES: u32 = 20;
pub const NAME_RETRY_DELAY_MS: u64 = 1000;
// Seconds after a round countdown during which an agreed switch is applied immediately
pub const AGREE_WINDOW_SECS: i64 = 7;
pub const SHUFFLE_BALANCE_DELAY_SECS: u64 = 5;
pub const LOADED_NOTICE_DELAY_SECS: u64 = 1;
pub const KICK_DELAY_SECS: u64 = 20;
// External rating service
pub const LOOKUP_API_ROOT: &str = "http://www.qlranks.com";
pub const LOOKUP_TIMEOUT_SECS: u64 = 10;
pub const LOOKUP_NAME_DELIMITER: &str = "+";
