use std::fmt::Debug;

mod config;
mod core;
mod sensitive;
mod telemetry;

pub mod api;
pub mod health_status;
pub mod gateway;
pub mod prelude;
pub mod streaming;
pub mod sync;
pub mod timeable;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use async_trait::async_trait;
pub use eyre;
pub use futures_util::StreamExt;
pub use serde::{Deserialize, Serialize};
pub use tokio::main;

pub use prelude::*;

/// Builds an [`eyre::Report`] from a format string.
#[macro_export]
macro_rules! throw {
    ($($arg:tt)*) => {
        $crate::eyre::eyre!($($arg)*)
    };
}

/// Everything a binary needs once its configuration is loaded and its ambient features
/// (error reporting, tracing) are running.
#[derive(Debug)]
pub struct Environment<T: Debug + Clone + Args + Validate> {
    pub service_name: String,
    pub config: Config<T>,
    pub tracing: Tracing,
}

#[derive(Debug, Clone, Parser)]
pub struct EnvironmentConfig {
    #[clap(flatten)]
    pub core: core::CoreConfig,

    #[clap(flatten)]
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Parser)]
pub struct Config<T: Debug + Clone + Args + Validate> {
    #[clap(flatten)]
    pub project: T,

    #[clap(flatten)]
    pub environment: EnvironmentConfig,
}

impl<T: Debug + Clone + Args + Validate> Config<T> {
    /// Loads the layered configuration (defaults, then environment variables, then
    /// command-line flags), validates every section and starts the ambient features.
    ///
    /// Any validation failure aborts startup.
    pub async fn init(service_name: &str) -> Result<Environment<T>> {
        let config = Self::parse();
        config.validate()?;

        core::Core::init(service_name, config.environment.clone()).await?;
        let tracing = Tracing::init(service_name, config.environment.clone()).await?;
        timeable::init(service_name);

        Ok(Environment {
            service_name: service_name.to_string(),
            config,
            tracing,
        })
    }
}

impl<T: Debug + Clone + Args + Validate> Validate for Config<T> {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.environment.tracing.validate()?;
        self.project.validate()
    }
}
