// Infrastructure layer - Config, logging, runtime and input adapters
pub mod config;
pub mod logging;
pub mod runtime;
pub mod stdin_source;
