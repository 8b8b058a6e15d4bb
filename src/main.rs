use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use kube_conformance::framework::{SharedCluster, install_crypto_provider};
use kube_conformance::{FrameworkConfig, Suite, SuiteOutcome, run_suite};

/// Run lifecycle conformance suites against the cluster in the current kubeconfig
#[derive(Parser, Debug)]
#[command(name = "kube-conformance", version, about)]
struct Cli {
    /// Suite to run; repeat for several. Runs every suite when omitted
    #[arg(long = "suite", value_enum)]
    suites: Vec<Suite>,

    /// List the available suites and exit
    #[arg(long)]
    list: bool,

    #[command(flatten)]
    config: FrameworkConfig,
}

fn print_suites() {
    for suite in Suite::ALL {
        println!("{:<42} {}", suite.name(), suite.description());
    }
}

fn print_summary(outcomes: &[SuiteOutcome]) {
    println!();
    for outcome in outcomes {
        let status = if outcome.passed() { "PASS" } else { "FAIL" };
        println!(
            "{status} {:<42} {:>8.1}s",
            outcome.suite.name(),
            outcome.duration.as_secs_f64()
        );
        if let Err(e) = &outcome.result {
            println!("     {e}");
        }
    }
    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    println!();
    println!(
        "{} passed, {} failed",
        outcomes.len() - failed,
        failed
    );
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.list {
        print_suites();
        return Ok(ExitCode::SUCCESS);
    }

    // Install the TLS crypto provider before any TLS operations
    install_crypto_provider()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kube_conformance=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    let cluster = SharedCluster::get().await?;
    info!("Running against {}", cluster.server_version());

    let suites = if cli.suites.is_empty() {
        Suite::ALL.to_vec()
    } else {
        cli.suites
    };

    let mut outcomes = Vec::with_capacity(suites.len());
    for suite in suites {
        let client = cluster.new_client().await?;
        let outcome = run_suite(client, suite, cli.config.clone()).await;
        match &outcome.result {
            Ok(()) => info!("{} passed in {:.1}s", suite, outcome.duration.as_secs_f64()),
            Err(e) => error!("{} failed: {}", suite, e),
        }
        outcomes.push(outcome);
    }

    print_summary(&outcomes);

    if outcomes.iter().all(SuiteOutcome::passed) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
