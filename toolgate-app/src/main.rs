use std::process::ExitCode;
use toolgate_app::commands::{self, USAGE};
use toolgate_app::{bootstrap, logging, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("-h" | "--help" | "help")) {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> anyhow::Result<String> {
    let invocation = commands::parse_args(args)?;
    let config = Config::load(&invocation.config_path)?;
    logging::init_telemetry(&config);

    let gate = bootstrap::build(&config).await?;
    let result = commands::execute(&gate, &invocation.command).await;
    gate.shutdown().await;
    result
}
