mod cmd;

use clap::Parser;
use cmd::config::{Effective, ReplayArgs};

#[derive(Parser)]
#[command(name = "mqtt-replay", about = "Replay a captured log as MQTT messages, keeping the original timing")]
struct Cli {
    #[command(flatten)]
    args: ReplayArgs,
}

#[tokio::main]
async fn main() {
    // stdout занят уведомлениями о публикации, логи — в stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let eff = match Effective::new(&cli.args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Явный exit: блокирующее чтение stdin не даст runtime завершиться после Ctrl+C.
    let code = match cmd::replay::run(&eff).await {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    std::process::exit(code);
}
