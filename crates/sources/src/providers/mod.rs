//! Data source implementations.

pub mod agriculture;
pub mod climate;
pub mod datagov;
pub mod market;
pub mod mock;

pub use agriculture::AgricultureSource;
pub use climate::ClimateSource;
pub use datagov::DataGovClient;
pub use market::MarketPriceSource;
pub use mock::MockSource;
