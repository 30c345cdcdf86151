//! Information about this project.

/// The formal name of this product.
pub const PRODUCT_NAME: &str = "regrtest";

/// The version of the product, in string form.
pub const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Info regarding the specific version of sources used to build this product.
pub const PRODUCT_GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");
