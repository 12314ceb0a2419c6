use std::io::Read;

use hublink_envelope::decode;

use crate::cmd::DecodeArgs;
use crate::exit::{envelope_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_envelope, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = read_input(&args)?;
    let envelope = decode(&raw).map_err(|err| envelope_error("invalid envelope", err))?;
    print_envelope(&envelope, &raw, format);
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(text) = &args.hex {
        return parse_hex(text);
    }
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .map_err(|err| io_error("failed reading stdin", err))?;
    Ok(buf)
}

/// Accepts whitespace between byte pairs and an optional `0x` prefix.
fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let compact: String = text.split_whitespace().collect();
    let digits = compact.strip_prefix("0x").unwrap_or(&compact);
    hex::decode(digits)
        .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_input_allows_spacing_and_prefix() {
        assert_eq!(parse_hex("0x4842 0102").unwrap(), vec![0x48, 0x42, 0x01, 0x02]);
        assert_eq!(parse_hex("48 42\n01").unwrap(), vec![0x48, 0x42, 0x01]);
    }

    #[test]
    fn bad_hex_is_usage_error() {
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("484").unwrap_err().code, USAGE);
    }
}
