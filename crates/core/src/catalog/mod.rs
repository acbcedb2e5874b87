//! Catalog data: raw record normalization, option lists and the file-backed source.

pub mod browser;
pub mod local;
pub mod normalize;

pub use browser::{CatalogBrowser, ClassFilter, ClassOption, ClassSelection, GradeOption};
pub use local::LocalCatalog;
pub use normalize::{normalize, normalize_all, RawRecord};
