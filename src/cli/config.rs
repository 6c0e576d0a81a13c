//! Validated run configuration

use crate::cli::args::Args;
use crate::error::{ResolverError, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub image_specs: Vec<String>,
    pub template: PathBuf,
    pub substitutions: Option<PathBuf>,
    pub stamp_info_files: Vec<PathBuf>,
    pub image_chroot: Option<String>,
    pub push: bool,
    pub allow_unused_images: bool,
    pub skip_tls: bool,
    pub timeout: Option<Duration>,
    pub verbose: bool,
    pub quiet: bool,
}

impl ResolverConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        if let Some(0) = args.timeout {
            return Err(ResolverError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        let config = Self {
            image_specs: args.image_specs,
            template: args.template.map(PathBuf::from).unwrap_or_default(),
            substitutions: args
                .substitutions
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            stamp_info_files: args.stamp_info_files.into_iter().map(PathBuf::from).collect(),
            image_chroot: args.image_chroot.filter(|c| !c.is_empty()),
            push: !args.no_push,
            allow_unused_images: args.allow_unused_images,
            skip_tls: args.skip_tls,
            timeout: args.timeout.map(Duration::from_secs),
            verbose: args.verbose,
            quiet: args.quiet,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.template.as_os_str().is_empty() {
            return Err(ResolverError::Config(
                "--template is required".to_string(),
            ));
        }
        if self.verbose && self.quiet {
            return Err(ResolverError::Config(
                "--verbose and --quiet cannot be used together".to_string(),
            ));
        }
        if self.image_specs.iter().any(|s| s.trim().is_empty()) {
            return Err(ResolverError::Config(
                "--image-spec cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
