//! Allow-listed, parameterized filter queries over a synchronized table.
//!
//! Callers name fields and values; only fields from a fixed allow-list ever
//! reach SQL text, and every value is bound as a parameter.
//!
//! ```ignore
//! use sheetsync_query::{FilterRequest, QueryConfig, TableQuery};
//!
//! let customers = TableQuery::new(pool, QueryConfig::default())?;
//!
//! // STATE IN ('Delhi', 'Haryana') AND CITY IN ('Gurgaon')
//! let request = FilterRequest::from_pairs([
//!     ("STATE", "Delhi,Haryana"),
//!     ("CITY", "Gurgaon"),
//! ]);
//! let rows = customers.search(&request).await?;
//!
//! let states = customers.distinct_values("STATE").await?;
//! let customer = customers.find_by_key("C001").await?;
//! ```

pub mod allowlist;
pub mod builder;
pub mod error;
pub mod filter;
pub mod row;
pub mod table;

pub use allowlist::{AllowedField, AllowedFieldSet, is_valid_identifier};
pub use error::{QueryError, Result};
pub use filter::FilterRequest;
pub use row::Row;
pub use table::{DEFAULT_FILTER_FIELDS, DEFAULT_PROJECTION, QueryConfig, TableQuery};
