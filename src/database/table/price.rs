use crate::{database::Repository, logging};

const INSERT_SQL: &str =
    "insert into prices(ticker,currency,price,volume,delta) values (?,?,?,?,?)";

/// One row of the `prices` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    /// base symbol, e.g. BTC
    pub ticker: String,
    /// quote symbol, e.g. USD
    pub currency: String,
    pub price: f64,
    pub volume: f64,
    pub delta: f64,
}

impl Price {
    pub fn new(ticker: String, currency: String, price: f64, volume: f64, delta: f64) -> Self {
        Price {
            ticker,
            currency,
            price,
            volume,
            delta,
        }
    }

    /// Inserts this row, preparing the statement anew for every call.
    ///
    /// Returns true only when both prepare and execute succeed. A failed
    /// prepare is never followed by an execute.
    pub async fn insert<R: Repository>(&self, repository: &R) -> bool {
        let statement = match repository.prepare(INSERT_SQL).await {
            Ok(statement) => {
                logging::debug_file_async("Prepared insert OK".to_string());
                statement
            }
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to prepare the insert of {:?} because {:?}",
                    self, why
                ));
                return false;
            }
        };

        match repository.execute(&statement, self).await {
            Ok(affected) => {
                logging::info_file_async(format!(
                    "DB exec OK, affected rows={} for {:?}",
                    affected, self
                ));
                true
            }
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to execute the insert of {:?} because {:?}",
                    self, why
                ));
                false
            }
        }
    }
}
