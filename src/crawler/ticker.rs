use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    database::{table::price::Price, Repository},
    logging,
    util::{self, text},
};

/// JSON envelope returned by the ticker endpoint.
///
/// ```json
/// { "success": true,
///   "ticker": { "base": "BTC", "target": "USD",
///               "price": "50000.00", "volume": "12.5", "change": "1.25" } }
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub success: bool,
    pub ticker: Ticker,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Ticker {
    pub base: String,
    pub target: String,
    #[serde(deserialize_with = "text::deserialize_f64_from_str")]
    pub price: f64,
    #[serde(deserialize_with = "text::deserialize_f64_from_str")]
    pub volume: f64,
    #[serde(deserialize_with = "text::deserialize_f64_from_str")]
    pub change: f64,
}

impl From<Ticker> for Price {
    fn from(ticker: Ticker) -> Self {
        Price::new(
            ticker.base,
            ticker.target,
            ticker.price,
            ticker.volume,
            ticker.change,
        )
    }
}

/// What a single poll cycle ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// the sample was inserted
    Stored,
    /// the sample was valid but the insert failed
    NotStored,
    /// upstream answered with `success: false`
    Unsuccessful,
    /// the body wasn't a valid envelope
    Malformed,
}

/// Runs one poll cycle: fetches `uri`, decodes the envelope and stores the sample.
///
/// # Errors
/// Only transport failures are returned, everything after the body was read
/// is reported through the [`Outcome`].
pub async fn execute<R: Repository>(uri: &str, repository: &R) -> Result<Outcome> {
    logging::info_file_async(format!("polling with uri={}", uri));

    let payload = util::http::get(uri)
        .await
        .with_context(|| format!("Failed to fetch the ticker from {}", uri))?;

    Ok(ingest(&payload, repository).await)
}

/// Decodes an already fetched body and stores it when upstream flagged it successful.
pub async fn ingest<R: Repository>(payload: &str, repository: &R) -> Outcome {
    logging::info_file_async(format!("Received payload: {}", payload));

    let envelope = match parse(payload) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            logging::debug_file_async("Upstream reported no success".to_string());
            return Outcome::Unsuccessful;
        }
        Err(why) => {
            logging::error_file_async(format!("Malformed ticker payload because {:?}", why));
            return Outcome::Malformed;
        }
    };

    let price = Price::from(envelope.ticker);
    if price.insert(repository).await {
        Outcome::Stored
    } else {
        Outcome::NotStored
    }
}

/// `Ok(None)` when upstream flagged the sample unsuccessful, whatever its ticker holds.
fn parse(payload: &str) -> Result<Option<Envelope>> {
    #[derive(Deserialize)]
    struct Status {
        success: bool,
    }

    let status = serde_json::from_str::<Status>(payload)
        .context("Failed to parse the ticker status")?;
    if !status.success {
        return Ok(None);
    }

    serde_json::from_str::<Envelope>(payload)
        .map(Some)
        .context("Failed to parse the ticker envelope")
}
