//! Extract comment-delimited partials from HTML documents.
//!
//! ```text
//! <!-- extract:components/button.html category:Forms -->
//! <button>Go</button>
//! <!-- endextract -->
//! ```
//!
//! Every region (nested ones too) becomes a [`Fragment`]; a batch of documents
//! becomes an [`Inventory`] together with the page resources (scripts, styles,
//! meta tags, classnames) found in them.

pub mod config;
pub mod error;
pub mod extract;
pub mod fragment;
pub mod parser;
pub mod store;

pub use config::Options;
pub use error::{Error, Result};
pub use extract::{run, Inventory, Warning};
pub use fragment::Fragment;
