/// Data layer: fetching, parsing, and filtering remote CSV datasets.
///
/// Architecture:
/// ```text
///   dataset identifier
///        │
///        ▼
///   ┌──────────┐   ┌───────────┐
///   │  fetch    │──▶│  loader    │  decode body, parse CSV → Table
///   └──────────┘   └───────────┘
///        │  (cache: optional TTL memo keyed by identifier)
///        ▼
///   ┌──────────┐
///   │  Table    │  typed columns, freshness timestamp
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  exclude rule + per-column specs → FilteredView
///   └──────────┘
/// ```

pub mod cache;
pub mod fetch;
pub mod filter;
pub mod freshness;
pub mod loader;
pub mod model;
