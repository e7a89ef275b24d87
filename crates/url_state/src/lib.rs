//! The navigable location's query string as the single source of truth for
//! list pagination, sort and filter state.
//!
//! Layout of the flat parameter mapping:
//!
//! | key            | meaning                        |
//! |----------------|--------------------------------|
//! | `limit`        | page size                      |
//! | `offset`       | index of the first row         |
//! | `s_<field>`    | sort direction (`asc`/`desc`)  |
//! | `f_<field>`    | filter value, only if non-empty |

pub mod codec;
pub mod store;

pub use codec::{
    decode, encode, normalize_filter_values, with_filters, with_pagination, with_sort,
    ListDefaults, UrlParams, QP_FILTERS_PREFIX, QP_LIMIT, QP_OFFSET, QP_SORT_PREFIX,
};
pub use store::{MemoryLocation, ParamStore};
