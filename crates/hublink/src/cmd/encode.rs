use hublink_envelope::encode;

use crate::cmd::EncodeArgs;
use crate::exit::{envelope_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let envelope = args.request.to_envelope();
    let raw = encode(&envelope).map_err(|err| envelope_error("encode failed", err))?;
    print_encoded(&envelope, &raw, format);
    Ok(SUCCESS)
}
