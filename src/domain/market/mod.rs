pub mod asset;
pub mod candle;
pub mod resolution;

pub use asset::{Asset, TradingPair};
pub use candle::Candle;
pub use resolution::Resolution;
