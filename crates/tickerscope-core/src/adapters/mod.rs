pub mod lexicon;
pub mod synthetic;
pub mod yahoo;
pub mod yahoo_news;

pub use yahoo::{YahooMarketData, YahooTransport};
pub use yahoo_news::YahooNews;
