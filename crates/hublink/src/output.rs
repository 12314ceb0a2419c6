use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hublink_envelope::{Envelope, HubInfoResponse, NanoappListEntry, NanoappMessage};
use hublink_hub::settings_test::{MESSAGE_TYPE_TEST_RESULT, SETTINGS_TEST_APP_ID};
#[cfg(unix)]
use hublink_hub::LinkStats;
use hublink_hub::TestResult;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EnvelopeOutput<'a> {
    message_type: &'static str,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    nanoapp_message: Option<NanoappMessageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hub_info: Option<HubInfoOutput<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nanoapps: Option<Vec<NanoappOutput>>,
}

#[derive(Serialize)]
struct NanoappMessageOutput {
    app_id: String,
    message_type: u32,
    host_endpoint: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_result: Option<bool>,
}

#[derive(Serialize)]
struct HubInfoOutput<'a> {
    name: &'a str,
    vendor: &'a str,
    toolchain: &'a str,
    legacy_platform_version: u32,
    legacy_toolchain_version: u32,
    peak_mips: f32,
    stopped_power: f32,
    sleep_power: f32,
    peak_power: f32,
    max_message_len: u32,
    platform_id: String,
    version: u32,
}

#[derive(Serialize)]
struct NanoappOutput {
    app_id: String,
    app_version: u32,
    enabled: bool,
    is_system: bool,
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    message_type: &'static str,
    size: usize,
    hex: &'a str,
}

impl NanoappMessageOutput {
    fn new(msg: &NanoappMessage) -> Self {
        Self {
            app_id: app_id_hex(msg.app_id),
            message_type: msg.message_type,
            host_endpoint: msg.host_endpoint,
            message: hex::encode(&msg.message),
            test_result: test_result(msg),
        }
    }
}

impl<'a> From<&'a HubInfoResponse> for HubInfoOutput<'a> {
    fn from(info: &'a HubInfoResponse) -> Self {
        Self {
            name: &info.name,
            vendor: &info.vendor,
            toolchain: &info.toolchain,
            legacy_platform_version: info.legacy_platform_version,
            legacy_toolchain_version: info.legacy_toolchain_version,
            peak_mips: info.peak_mips,
            stopped_power: info.stopped_power,
            sleep_power: info.sleep_power,
            peak_power: info.peak_power,
            max_message_len: info.max_message_len,
            platform_id: app_id_hex(info.platform_id),
            version: info.version,
        }
    }
}

impl From<&NanoappListEntry> for NanoappOutput {
    fn from(entry: &NanoappListEntry) -> Self {
        Self {
            app_id: app_id_hex(entry.app_id),
            app_version: entry.app_version,
            enabled: entry.enabled,
            is_system: entry.is_system,
        }
    }
}

/// Outcome carried by a feature-test result message, if `msg` is one.
pub fn test_result(msg: &NanoappMessage) -> Option<bool> {
    if msg.app_id != SETTINGS_TEST_APP_ID || msg.message_type != MESSAGE_TYPE_TEST_RESULT {
        return None;
    }
    TestResult::decode(&msg.message).ok().map(|r| r.success)
}

pub fn print_envelope(envelope: &Envelope, raw: &[u8], format: OutputFormat) {
    let message_type = envelope.message_type().name();
    match format {
        OutputFormat::Json => {
            let out = EnvelopeOutput {
                message_type,
                size: raw.len(),
                nanoapp_message: match envelope {
                    Envelope::NanoappMessage(msg) => Some(NanoappMessageOutput::new(msg)),
                    _ => None,
                },
                hub_info: match envelope {
                    Envelope::HubInfoResponse(info) => Some(HubInfoOutput::from(info)),
                    _ => None,
                },
                nanoapps: match envelope {
                    Envelope::NanoappListResponse(list) => {
                        Some(list.entries.iter().map(NanoappOutput::from).collect())
                    }
                    _ => None,
                },
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => println!("{}", envelope_table(envelope, raw.len())),
        OutputFormat::Pretty => {
            println!("message_type={message_type} size={}", raw.len());
            for (key, value) in envelope_fields(envelope) {
                println!("  {key}={value}");
            }
        }
        OutputFormat::Raw => print_raw(raw),
    }
}

pub fn print_encoded(envelope: &Envelope, raw: &[u8], format: OutputFormat) {
    let encoded = hex::encode(raw);
    match format {
        OutputFormat::Raw => print_raw(raw),
        OutputFormat::Json => {
            let out = EncodedOutput {
                message_type: envelope.message_type().name(),
                size: raw.len(),
                hex: &encoded,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{encoded}"),
    }
}

#[cfg(unix)]
pub fn print_serve_summary(path: &str, connections: u64, stats: &LinkStats, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out = serde_json::json!({
                "socket": path,
                "connections": connections,
                "stats": stats,
            });
            println!("{out}");
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "CONNECTIONS",
                    "RECEIVED",
                    "REJECTED",
                    "COMPLETIONS",
                    "SENT",
                    "DROPPED",
                ])
                .add_row(vec![
                    connections.to_string(),
                    stats.received.to_string(),
                    stats.rejected.to_string(),
                    stats.completions.to_string(),
                    stats.sent.to_string(),
                    stats.dropped.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "socket={path} connections={connections} received={} rejected={} completions={} sent={} dropped={}",
                stats.received, stats.rejected, stats.completions, stats.sent, stats.dropped
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn envelope_table(envelope: &Envelope, size: usize) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    if let Envelope::NanoappListResponse(list) = envelope {
        table.set_header(vec!["APP ID", "VERSION", "ENABLED", "SYSTEM"]);
        for entry in &list.entries {
            table.add_row(vec![
                app_id_hex(entry.app_id),
                entry.app_version.to_string(),
                entry.enabled.to_string(),
                entry.is_system.to_string(),
            ]);
        }
        return table;
    }

    table.set_header(vec!["FIELD", "VALUE"]);
    table.add_row(vec![
        "message_type".to_string(),
        envelope.message_type().name().to_string(),
    ]);
    table.add_row(vec!["size".to_string(), size.to_string()]);
    for (key, value) in envelope_fields(envelope) {
        table.add_row(vec![key.to_string(), value]);
    }
    table
}

fn envelope_fields(envelope: &Envelope) -> Vec<(&'static str, String)> {
    match envelope {
        Envelope::NanoappMessage(msg) => {
            let mut fields = vec![
                ("app_id", app_id_hex(msg.app_id)),
                ("message_type", msg.message_type.to_string()),
                ("host_endpoint", msg.host_endpoint.to_string()),
                ("message", hex::encode(&msg.message)),
            ];
            if let Some(success) = test_result(msg) {
                fields.push(("test_result", success.to_string()));
            }
            fields
        }
        Envelope::HubInfoResponse(info) => vec![
            ("name", info.name.clone()),
            ("vendor", info.vendor.clone()),
            ("toolchain", info.toolchain.clone()),
            (
                "legacy_platform_version",
                info.legacy_platform_version.to_string(),
            ),
            (
                "legacy_toolchain_version",
                info.legacy_toolchain_version.to_string(),
            ),
            ("peak_mips", info.peak_mips.to_string()),
            ("stopped_power", info.stopped_power.to_string()),
            ("sleep_power", info.sleep_power.to_string()),
            ("peak_power", info.peak_power.to_string()),
            ("max_message_len", info.max_message_len.to_string()),
            ("platform_id", app_id_hex(info.platform_id)),
            ("version", format!("{:#010x}", info.version)),
        ],
        Envelope::NanoappListResponse(list) => list
            .entries
            .iter()
            .map(|entry| {
                (
                    "nanoapp",
                    format!(
                        "{} v{} enabled={} system={}",
                        app_id_hex(entry.app_id),
                        entry.app_version,
                        entry.enabled,
                        entry.is_system
                    ),
                )
            })
            .collect(),
        Envelope::HubInfoRequest | Envelope::NanoappListRequest => Vec::new(),
    }
}

fn app_id_hex(id: u64) -> String {
    format!("{id:#018x}")
}
