use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;

use replay_api::Publisher;
use replay_engine::{ReplayConfig, ReplayError, ReplayReport, Scheduler};
use transport_mqtt::MqttPublisher;

use super::config::Effective;
use super::error::MqttReplayError;
use super::publisher::{Announce, DryRun};

type Input = Box<dyn AsyncBufRead + Unpin + Send>;

pub async fn run(args: &Effective) -> Result<ReplayReport, MqttReplayError> {
    // Вход открываем до подключения: нет файла — нет и соединения.
    let input = open_input(args.input.as_deref()).await?;

    println!("Broker Host: {}", args.transport.host);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, stopping replay");
            signal_token.cancel();
        }
    });

    let result = if args.dry_run {
        tracing::info!("dry run, broker connection skipped");
        let (result, publisher) = replay_with(DryRun::default(), input, args.replay.clone(), args.quiet, &token).await;
        tracing::debug!(sent = publisher.sent(), "dry run done");
        result
    } else {
        let publisher = MqttPublisher::connect(&args.transport).await?;
        let (result, publisher) = replay_with(publisher, input, args.replay.clone(), args.quiet, &token).await;
        publisher.shutdown().await;
        result
    };
    signal.abort();

    Ok(result?)
}

/// Прогнать replay и вернуть publisher обратно, в том числе после ошибки.
pub async fn replay_with<P, R>(
    publisher: P,
    input: R,
    config: ReplayConfig,
    quiet: bool,
    token: &CancellationToken,
) -> (Result<ReplayReport, ReplayError>, P)
where
    P: Publisher,
    R: AsyncBufRead + Unpin,
{
    let mut scheduler = Scheduler::new(Announce::new(publisher, quiet), config);
    let result = scheduler.run(input, token).await;
    (result, scheduler.into_publisher().into_inner())
}

/// Файл или stdin, если путь не задан (или задан как `-`).
async fn open_input(path: Option<&str>) -> Result<Input, MqttReplayError> {
    match path {
        None | Some("-") => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| MqttReplayError::Input { path: path.to_string(), source })?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use replay_engine::{MalformedPolicy, ReplayEnd};
    use transport_mqtt::MqttConfig;

    use super::*;

    fn effective(input: Option<String>) -> Effective {
        Effective {
            transport: MqttConfig::default(),
            replay: ReplayConfig::default(),
            input,
            dry_run: true,
            quiet: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn replay_with_returns_publisher() {
        let log = "00:00:01.000000 a/b one\nnot a record\n00:00:02.000000 a/b two\n\n00:00:03.000000 a/b three\n";
        let token = CancellationToken::new();

        let (result, publisher) =
            replay_with(DryRun::default(), log.as_bytes(), ReplayConfig::default(), true, &token).await;
        let report = result.unwrap();

        assert_eq!(report.published, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.end, ReplayEnd::Sentinel);
        assert_eq!(publisher.sent(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_with_returns_publisher_on_abort() {
        let log = "00:00:01.000000 a/b one\ngarbage\n00:00:02.000000 a/b two\n";
        let token = CancellationToken::new();
        let config = ReplayConfig::default().with_on_malformed(MalformedPolicy::Abort);

        let (result, publisher) = replay_with(DryRun::default(), log.as_bytes(), config, true, &token).await;

        assert!(matches!(result, Err(ReplayError::Malformed { line_no: 2, .. })));
        assert_eq!(publisher.sent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dry_run_replays_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"12:00:00.000000 sensors/temp 21.5\n12:00:00.500000 sensors/temp 21.7\n")
            .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let report = run(&effective(Some(path))).await.unwrap();
        assert_eq!(report.lines, 2);
        assert_eq!(report.published, 2);
        assert_eq!(report.end, ReplayEnd::EndOfInput);
    }

    #[tokio::test]
    async fn missing_input_file_fails_before_connecting() {
        let mut eff = effective(Some("/nonexistent/capture.log".into()));
        eff.dry_run = false;

        let err = run(&eff).await.unwrap_err();
        assert!(matches!(err, MqttReplayError::Input { ref path, .. } if path == "/nonexistent/capture.log"));
    }
}
