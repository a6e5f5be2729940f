//! Configuration loading: YAML file, then command-line overrides

use crate::Cli;
use fakecheck_classifiers::{FakecheckConfig, ModelSource};
use fakecheck_core::Result;
use std::time::Duration;

/// Load configuration from file and CLI overrides
pub fn load(cli: &Cli) -> Result<FakecheckConfig> {
    // A missing file means defaults
    let mut config = FakecheckConfig::load_or_default(&cli.config)?;
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut FakecheckConfig, cli: &Cli) {
    if let Some(path) = &cli.model_dir {
        config.model.source = ModelSource::Local { path: path.clone() };
    }
    if let Some(device) = cli.device {
        config.model.device = device;
    }
    if let Some(max_length) = cli.max_length {
        config.model.max_length = max_length;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.service = config.service.clone().with_timeout(Duration::from_millis(timeout_ms));
    }
}
