//! Observability infrastructure - Cache metrics

mod metrics;

pub use self::metrics::{
    record_cache_lookup, record_cache_store, register_cache_info, LookupOutcome, StoreOutcome,
};
