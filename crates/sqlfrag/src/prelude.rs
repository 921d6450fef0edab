//! Convenient imports for typical `sqlfrag` usage.
//!
//! ```ignore
//! use sqlfrag::prelude::*;
//! ```

pub use crate::{
    FragmentError, FragmentResult, ParamMap, SqlFragment, SqlInput, Value, join,
};
