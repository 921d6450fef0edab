//! # sqlfrag
//!
//! Composable parameterized SQL fragments.
//!
//! ## Features
//!
//! - **Consistent by construction**: a fragment's text and parameters are
//!   normalized together; every `:name` placeholder binds exactly one value
//! - **Collision-free merging**: joining fragments renames clashing
//!   placeholder names instead of overwriting values
//! - **Positional input**: `?` marks are rewritten to `:param1, :param2, ...`
//!   at construction time
//! - **Comment substitution**: grow a query by replacing a unique
//!   `/* marker */` with another fragment
//! - **Executor-agnostic**: a finished fragment hands over a plain
//!   `(text, parameters)` pair; no connection, escaping, or execution here
//!
//! ## Example
//!
//! ```ignore
//! use sqlfrag::{join, ParamMap, SqlFragment};
//!
//! let name = SqlFragment::new("name = :name", ParamMap::from([("name", "ann")]))?;
//! let age = SqlFragment::new("age > :age", ParamMap::from([("age", 30)]))?;
//!
//! let mut filter = join(" AND ", vec![name.into(), age.into()])?;
//! filter.wrap("WHERE (", ")")?;
//!
//! let (text, params) = filter.into_parts();
//! // text:   WHERE (name = :name AND age > :age)
//! // params: {name: "ann", age: 30}
//! ```

pub mod compose;
pub mod error;
pub mod fragment;
pub mod params;
pub mod prelude;
pub mod value;


pub use compose::{SqlInput, join};
pub use error::{FragmentError, FragmentResult};
pub use fragment::{ParamStyle, SqlFragment};
pub use params::ParamMap;
pub use value::Value;
