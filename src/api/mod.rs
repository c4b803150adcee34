pub mod api_structs;

use std::{collections::HashMap, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    api::api_structs::{LookupResults, RankResponse},
    model::{constants::LOOKUP_NAME_DELIMITER, structures::category::Category}
};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Rating service unreachable: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("Rating service returned status {0}")]
    Status(u16),

    #[error("Rating service returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Rating service returned a valid, but unexpected JSON response")]
    UnexpectedShape
}

/// Batched name -> rating lookup against an external service.
///
/// Implementations run off the session's thread; the future must not touch session state.
pub trait RatingLookup: Send + Sync + 'static {
    fn lookup(&self, names: Vec<String>) -> BoxFuture<'static, Result<LookupResults, LookupError>>;
}

#[derive(Clone)]
pub struct RankClient {
    client: Client,
    api_root: String
}

impl RankClient {
    pub fn new(api_root: &str, timeout: Duration) -> Result<RankClient, LookupError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(LookupError::ClientBuild)?;

        Ok(RankClient {
            client,
            api_root: api_root.trim_end_matches('/').to_string()
        })
    }

    pub fn lookup_url(&self, names: &[String]) -> String {
        format!("{}/api.aspx?nick={}", self.api_root, names.join(LOOKUP_NAME_DELIMITER))
    }

    pub async fn fetch(&self, names: &[String]) -> Result<LookupResults, LookupError> {
        let url = self.lookup_url(names);
        debug!(%url, count = names.len(), "Requesting ratings");

        let response = self.client.get(&url).send().await.map_err(LookupError::Connection)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(LookupError::Connection)?;
        parse_payload(&body)
    }
}

impl RatingLookup for RankClient {
    fn lookup(&self, names: Vec<String>) -> BoxFuture<'static, Result<LookupResults, LookupError>> {
        let client = self.clone();
        Box::pin(async move { client.fetch(&names).await })
    }
}

/// Condenses a service payload into the ratings it actually reports.
///
/// Records without a name, and names with no usable rank in any category, are left out.
pub fn parse_payload(body: &str) -> Result<LookupResults, LookupError> {
    let value: Value = serde_json::from_str(body)?;
    if value.get("players").is_none() {
        return Err(LookupError::UnexpectedShape);
    }

    let response: RankResponse = serde_json::from_value(value)?;
    let mut results = HashMap::new();

    for record in response.players {
        let Some(nick) = record.nick.as_ref() else {
            warn!("Skipping rating record without a nick");
            continue;
        };

        let ratings: HashMap<Category, i32> = Category::iter()
            .filter_map(|category| {
                record
                    .mode(category)
                    .and_then(|mode| mode.usable_rating())
                    .map(|rating| (category, rating))
            })
            .collect();

        if !ratings.is_empty() {
            results.insert(nick.clone(), ratings);
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::{parse_payload, LookupError, RankClient};
    use crate::model::structures::category::Category;
    use std::time::Duration;

    #[test]
    fn test_parse_usable_ranks() {
        let body = r#"{"players":[
            {"nick":"rapha","ca":{"rank":12,"elo":2100},"duel":{"rank":3,"elo":2400},"tdm":{"rank":0,"elo":1200}}
        ]}"#;

        let results = parse_payload(body).unwrap();
        let rapha = &results["rapha"];

        assert_eq!(rapha.get(&Category::Ca), Some(&2100));
        assert_eq!(rapha.get(&Category::Duel), Some(&2400));
        // Zero rank is not a usable rating
        assert_eq!(rapha.get(&Category::Tdm), None);
    }

    #[test]
    fn test_parse_skips_names_without_any_rank() {
        let body = r#"{"players":[
            {"nick":"nobody","ca":{"rank":0,"elo":1200}},
            {"nick":"ghost","ca":null},
            {"ca":{"rank":1,"elo":2500}}
        ]}"#;

        let results = parse_payload(body).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_missing_players_field() {
        let result = parse_payload(r#"{"error":"rate limited"}"#);
        assert!(matches!(result, Err(LookupError::UnexpectedShape)));
    }

    #[test]
    fn test_parse_malformed() {
        let result = parse_payload("<html>oops</html>");
        assert!(matches!(result, Err(LookupError::Malformed(_))));
    }

    #[test]
    fn test_lookup_url_joins_names() {
        let client = RankClient::new("http://ranks.example.com/", Duration::from_secs(1)).unwrap();
        let url = client.lookup_url(&["cooller".to_string(), "rapha".to_string()]);

        assert_eq!(url, "http://ranks.example.com/api.aspx?nick=cooller+rapha");
    }
}
