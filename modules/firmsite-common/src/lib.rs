pub mod aliases;
pub mod config;
pub mod error;
pub mod normalize;
pub mod slug;
pub mod types;

pub use aliases::{AliasTable, Taxonomy, TaxonomyKind};
pub use config::{Config, PayloadSettings};
pub use error::{FirmsiteError, Result};
pub use normalize::{normalize_list, Normalize};
pub use slug::{normalize_slug, normalize_slug_opt};
pub use types::*;
