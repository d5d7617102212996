use crypto_loadtest::{ Config, LoadTestError, Runner };

use anyhow::Context;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    print_configuration(&config);

    let runner = Runner::new(config).context("failed to set up HTTP clients")?;

    let shutdown = runner.shutdown_token();
    ctrlc::set_handler(move || shutdown.cancel()).context("Error setting Ctrl+C handler")?;

    let runtime = Runner::build_runtime().context("failed to create tokio runtime")?;
    match runtime.block_on(runner.run()) {
        Ok(_) => Ok(()),
        Err(err @ LoadTestError::HealthCheckTimeout { .. }) => {
            error!(error = %err, "service health check failed");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

fn print_configuration(config: &Config) {
    println!("Encrypt Load Tester started");
    println!("Configuration:");
    println!("  URL: {}", config.target_url);
    println!("  Health URL: {}", config.health_url);
    println!("  RPS: {}", config.requests_per_second);
    println!("  Duration: {:?}", config.test_duration);
    println!("  Workers: {}", config.workers);
    println!("  Test Number: {}", config.test_number);
    println!("  Service: {}", config.service);
    println!("  Results path: {}", config.results_dir().display());
    println!("  Progress file: {}", config.progress_file().display());
    println!("  Summary file: {}", config.summary_file().display());
    println!("  JSON file: {}", config.results_file().display());
}
