pub mod aggregator;
pub mod category;
pub mod lifecycle;
pub mod multiplier;
pub mod scheduler;

pub use aggregator::{Aggregator, BucketPoint, PortfolioForecast};
pub use lifecycle::{BulkGenerationResult, GenerationAction, GenerationStats, Lifecycle, ProcessedOpportunity};
