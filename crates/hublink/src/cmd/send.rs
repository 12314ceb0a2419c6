use std::time::Duration;

use hublink_envelope::{decode, Envelope, EnvelopeConfig, EnvelopeReader, EnvelopeWriter};

use crate::cmd::SendArgs;
use crate::exit::{envelope_error, hub_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_envelope, test_result, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = EnvelopeConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        max_payload_size: args.max_payload,
    };

    let stream =
        hublink_hub::connect(&args.path).map_err(|err| hub_error("connect failed", err))?;
    let reader_stream = stream
        .try_clone()
        .map_err(|err| crate::exit::io_error("connect failed", err))?;
    let mut writer = EnvelopeWriter::with_config_unix(stream, config.clone())
        .map_err(|err| envelope_error("connect failed", err))?;
    let mut reader = EnvelopeReader::with_config_unix(reader_stream, config)
        .map_err(|err| envelope_error("connect failed", err))?;

    let request = args.request.to_envelope();
    writer
        .send(&request)
        .map_err(|err| envelope_error("send failed", err))?;

    let raw = reader
        .read_raw()
        .map_err(|err| envelope_error("receive failed", err))?;
    let response = decode(&raw).map_err(|err| envelope_error("invalid response", err))?;
    print_envelope(&response, &raw, format);

    match &response {
        Envelope::NanoappMessage(msg) if test_result(msg) == Some(false) => Ok(FAILURE),
        _ => Ok(SUCCESS),
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_bad_durations() {
        for input in ["", "0s", "fast", "-1ms"] {
            let err = parse_duration(input).unwrap_err();
            assert_eq!(err.code, USAGE, "{input}");
        }
    }
}
