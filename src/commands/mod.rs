pub mod config;
pub mod reporter;
pub mod serve;
pub mod unlock;
pub mod utils;
