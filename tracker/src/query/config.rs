/// Query configuration parameters.
///
/// These bound what a caller may ask for; they do not change traversal
/// semantics.
#[derive(Clone, Debug)]
pub struct QueryConfig {
    /// Result bound used when a request does not specify one.
    pub default_result_bound: usize,
    /// Largest result bound a query may ask for.
    pub max_result_bound: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_result_bound: 10,
            max_result_bound: 10_000,
        }
    }
}
