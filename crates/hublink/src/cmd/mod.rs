use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use hublink_envelope::{Envelope, NanoappMessage, DEFAULT_MAX_PAYLOAD};
use hublink_hub::settings_test::{MESSAGE_TYPE_TEST_COMMAND, SETTINGS_TEST_APP_ID};
use hublink_hub::{Feature, FeatureState, TestCommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
#[cfg(unix)]
pub mod send;
#[cfg(unix)]
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulated hub on a Unix socket.
    #[cfg(unix)]
    Serve(ServeArgs),
    /// Send one request to a hub and print the response.
    #[cfg(unix)]
    Send(SendArgs),
    /// Verify and decode one envelope.
    Decode(DecodeArgs),
    /// Encode a request envelope.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(unix)]
        Command::Serve(args) => serve::run(args, format),
        #[cfg(unix)]
        Command::Send(args) => send::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Requests a host can send to the hub.
#[derive(Subcommand, Debug, Clone)]
pub enum Request {
    /// Ask for the hub description.
    HubInfo,
    /// Ask for the loaded nanoapps.
    NanoappList,
    /// Ask the settings-test nanoapp to check a feature state.
    Test(TestArgs),
}

impl Request {
    pub fn to_envelope(&self) -> Envelope {
        match self {
            Request::HubInfo => Envelope::HubInfoRequest,
            Request::NanoappList => Envelope::NanoappListRequest,
            Request::Test(args) => {
                let command = TestCommand {
                    feature: args.feature.into(),
                    state: args.state.into(),
                };
                Envelope::NanoappMessage(NanoappMessage::new(
                    SETTINGS_TEST_APP_ID,
                    MESSAGE_TYPE_TEST_COMMAND,
                    args.endpoint,
                    command.encode(),
                ))
            }
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// Feature to exercise.
    #[arg(long)]
    pub feature: FeatureArg,
    /// State the feature is expected to be in.
    #[arg(long)]
    pub state: StateArg,
    /// Host endpoint the result is addressed to.
    #[arg(long, default_value = "1")]
    pub endpoint: u16,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum FeatureArg {
    WifiScanning,
    WifiRtt,
    GnssLocation,
    GnssMeasurement,
    WwanCellInfo,
}

impl From<FeatureArg> for Feature {
    fn from(arg: FeatureArg) -> Self {
        match arg {
            FeatureArg::WifiScanning => Feature::WifiScanning,
            FeatureArg::WifiRtt => Feature::WifiRtt,
            FeatureArg::GnssLocation => Feature::GnssLocation,
            FeatureArg::GnssMeasurement => Feature::GnssMeasurement,
            FeatureArg::WwanCellInfo => Feature::WwanCellInfo,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum StateArg {
    Enabled,
    Disabled,
}

impl From<StateArg> for FeatureState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Enabled => FeatureState::Enabled,
            StateArg::Disabled => FeatureState::Disabled,
        }
    }
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Hub configuration file (JSON). Default: built-in simulated hub.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Exit after serving N host connections.
    #[arg(long)]
    pub count: Option<usize>,
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Largest response payload accepted, in bytes. Match the hub's
    /// `max_message_len`.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
    #[command(subcommand)]
    pub request: Request,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Envelope bytes as hex.
    #[arg(long, conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read envelope bytes from file. Default: stdin.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(subcommand)]
    pub request: Request,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use hublink_envelope::{encode, MessageType};

    use super::*;

    #[test]
    fn test_request_encodes_settings_command() {
        let request = Request::Test(TestArgs {
            feature: FeatureArg::GnssMeasurement,
            state: StateArg::Disabled,
            endpoint: 7,
        });

        match request.to_envelope() {
            Envelope::NanoappMessage(msg) => {
                assert_eq!(msg.app_id, SETTINGS_TEST_APP_ID);
                assert_eq!(msg.message_type, MESSAGE_TYPE_TEST_COMMAND);
                assert_eq!(msg.host_endpoint, 7);
                let command = TestCommand::decode(&msg.message).unwrap();
                assert_eq!(command.feature, Feature::GnssMeasurement);
                assert_eq!(command.state, FeatureState::Disabled);
            }
            other => panic!("unexpected envelope {other:?}"),
        }
    }

    #[test]
    fn info_requests_have_empty_payloads() {
        let raw = encode(&Request::HubInfo.to_envelope()).unwrap();
        assert_eq!(&raw[..], &[0x48u8, 0x42, 0x01, 0x02, 0, 0, 0, 0]);
        assert_eq!(
            Request::NanoappList.to_envelope().message_type(),
            MessageType::NanoappListRequest
        );
    }
}
