pub mod apis;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod error;
pub mod infra;
pub mod logging;
pub mod matching;
pub mod parser;
pub mod pipeline;
pub mod popularity;
pub mod rate_limiter;
pub mod shutdown;
pub mod storage;
pub mod tabular;
pub mod types;
