use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hublink_envelope::EnvelopeConfig;
use hublink_hub::{serve_connection, HubConfig, HubListener, LinkStats, ProtocolContext};
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{hub_error, CliError, CliResult, SUCCESS};
use crate::output::{print_serve_summary, OutputFormat};

const ACCEPT_POLL: Duration = Duration::from_millis(50);
const READ_POLL: Duration = Duration::from_millis(250);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = match &args.config {
        Some(path) => HubConfig::from_file(path).map_err(|err| {
            hub_error(&format!("failed loading {}", path.display()), err)
        })?,
        None => HubConfig::default(),
    };

    let listener = HubListener::bind(&args.path).map_err(|err| hub_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let envelope_config = EnvelopeConfig {
        max_payload_size: config.hub.max_message_len as usize,
        read_timeout: Some(READ_POLL),
        ..EnvelopeConfig::default()
    };
    let mut ctx = ProtocolContext::simulated(&config);
    let mut totals = LinkStats::default();
    let mut connections = 0u64;

    while running.load(Ordering::SeqCst) {
        let stream = match listener.accept_while(&running, ACCEPT_POLL) {
            Ok(Some(stream)) => stream,
            Ok(None) => break,
            Err(err) => return Err(hub_error("accept failed", err)),
        };
        connections = connections.saturating_add(1);

        match serve_connection(&mut ctx, stream, &envelope_config, &running) {
            Ok(stats) => {
                info!(
                    received = stats.received,
                    rejected = stats.rejected,
                    sent = stats.sent,
                    "host connection closed"
                );
                totals.merge(stats);
            }
            Err(err) => warn!(error = %err, "host connection failed"),
        }

        if let Some(count) = args.count {
            if connections >= count as u64 {
                break;
            }
        }
    }

    print_serve_summary(
        &args.path.display().to_string(),
        connections,
        &totals,
        format,
    );
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
