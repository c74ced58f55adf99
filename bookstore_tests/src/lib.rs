//! End to end tests, run against a deployed bookstore_catalog
//! (`BOOKSTORE_CATALOG_URL`, default http://127.0.0.1:8080)

#[cfg(all(test, feature = "load_tests"))]
mod load_test;

#[cfg(all(test, any(feature = "system_tests", feature = "load_tests")))]
pub(crate) fn catalog_url() -> String {
    std::env::var("BOOKSTORE_CATALOG_URL").unwrap_or("http://127.0.0.1:8080".to_string())
}
