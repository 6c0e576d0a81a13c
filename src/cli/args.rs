//! Command-line argument parsing

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "resolver")]
#[command(
    about = "Publish images and rewrite the tags referenced by a YAML template into digests"
)]
#[command(version)]
pub struct Args {
    /// Image spec, repeatable
    #[arg(
        long = "image-spec",
        alias = "image_spec",
        value_name = "SPEC",
        help = "Image to publish: name=...;tarball=...;config=...;digest=...;diff_id=...;compressed_layer=...;uncompressed_layer=..."
    )]
    pub image_specs: Vec<String>,

    #[arg(
        long = "template",
        alias = "k8s_template",
        value_name = "FILE",
        help = "YAML template whose image tags are resolved"
    )]
    pub template: Option<String>,

    #[arg(
        long = "substitutions",
        value_name = "FILE",
        help = "JSON file with literal substitutions applied to the template text"
    )]
    pub substitutions: Option<String>,

    #[arg(
        long = "stamp-info-file",
        alias = "stamp_info_file",
        value_name = "FILE",
        help = "Workspace status file providing {KEY} stamp values, repeatable"
    )]
    pub stamp_info_files: Vec<String>,

    #[arg(
        long = "image-chroot",
        alias = "image_chroot",
        value_name = "PREFIX",
        help = "Repository prefix prepended to every published image name"
    )]
    pub image_chroot: Option<String>,

    #[arg(
        long = "no-push",
        alias = "no_push",
        help = "Compute digests without pushing the images"
    )]
    pub no_push: bool,

    #[arg(
        long = "allow-unused-images",
        alias = "allow_unused_images",
        help = "Do not fail when a published image is not referenced by the template"
    )]
    pub allow_unused_images: bool,

    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    #[arg(
        long = "timeout",
        short = 't',
        value_name = "SECONDS",
        help = "Timeout for each registry request"
    )]
    pub timeout: Option<u64>,

    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long = "quiet", short = 'q', help = "Only report errors")]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Fill unset options from `RESOLVER_*` environment variables
    pub fn from_env(self) -> Self {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.template.is_none() {
            self.template = lookup("RESOLVER_TEMPLATE");
        }
        if self.substitutions.is_none() {
            self.substitutions = lookup("RESOLVER_SUBSTITUTIONS");
        }
        if self.image_chroot.is_none() {
            self.image_chroot = lookup("RESOLVER_IMAGE_CHROOT");
        }
        if self.stamp_info_files.is_empty() {
            if let Some(files) = lookup("RESOLVER_STAMP_INFO_FILES") {
                self.stamp_info_files = files
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        if self.timeout.is_none() {
            self.timeout = lookup("RESOLVER_TIMEOUT").and_then(|t| t.parse().ok());
        }

        let flag = |key: &str| {
            lookup(key).is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        };
        self.no_push |= flag("RESOLVER_NO_PUSH");
        self.allow_unused_images |= flag("RESOLVER_ALLOW_UNUSED_IMAGES");
        self.skip_tls |= flag("RESOLVER_SKIP_TLS");
        self.verbose |= flag("RESOLVER_VERBOSE");

        self
    }
}
