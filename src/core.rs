use crate::{async_trait, EnvironmentConfig, Feature, Parser, Result};

#[derive(Debug, Clone, Parser)]
pub struct CoreConfig {
    #[clap(long = "no-color", env = "NO_COLOR")]
    pub no_color: bool,
}

/// Installs the process-wide error report handler.
pub struct Core;

#[async_trait]
impl Feature for Core {
    async fn init(_service_name: &str, config: EnvironmentConfig) -> Result<Self> {
        if config.core.no_color {
            color_eyre::config::HookBuilder::default()
                .theme(color_eyre::config::Theme::new())
                .install()?;
        } else {
            color_eyre::install()?;
        }

        Ok(Self)
    }
}
