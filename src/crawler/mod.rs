/// Ticker endpoint of the quote source
pub mod ticker;
