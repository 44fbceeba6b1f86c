pub mod config;
mod error;
pub mod fields;

pub use config::{
    ErrorPagesConfig, HandlerConfig, HandlerKind, LogFormat, LogsConfig, UpConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use fields::LogFields;
