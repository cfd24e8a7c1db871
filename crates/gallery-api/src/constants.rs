/// Versioned prefix of every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Where the OpenAPI document is served.
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// Upper bound on requests processed at once.
pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
