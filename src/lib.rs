// Flight-offer search and normalization library

// Export modules for each concern
pub mod cache;
pub mod duration;
pub mod flatten;
pub mod offers;
pub mod provider;
pub mod wire;

// Re-export key types for convenience
pub use cache::{CacheConfig, CacheStatsReport, CachingProvider, SearchCache};
pub use duration::{layover_duration, parse_duration, DurationDisplay, NegativeLayover, ParseError};
pub use flatten::{
    presentation_order, DataConsistencyWarning, FlattenConfig, FlattenError, FlattenReport,
    FlattenStats, FlightRow, NegativeLayoverPolicy, OfferFlattener, ParseErrorPolicy,
    RowGranularity,
};
pub use offers::{
    validate_offers, Itinerary, MalformedOfferError, Offer, Price, Segment, SegmentPoint,
};
pub use provider::{
    AmadeusClient, ClientConfig, OfferProvider, ProviderError, RetryConfig, SearchQuery,
    SearchResponse,
};
