use k8s_digest_resolver::cli::{Args, ResolverConfig, Runner};
use k8s_digest_resolver::logging::Logger;

#[tokio::main]
async fn main() {
    let args = Args::parse_args().from_env();
    let quiet = args.quiet;

    let result = match ResolverConfig::from_args(args) {
        Ok(config) => Runner::new(config).run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        // Errors are reported even in quiet mode
        let output = if quiet { Logger::new_quiet() } else { Logger::default() };
        output.error(&e.to_string());
        std::process::exit(1);
    }
}
