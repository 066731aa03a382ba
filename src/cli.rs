//! CLI for this application
//!
use std::time::Duration;

use crate::settings;
use crate::swim::ProcessId;

pub use settings::{APP_NAME, APP_VERSION};

#[derive(Clone, Debug, clap::Parser)]
#[command(name = APP_NAME, version = APP_VERSION)]
pub struct Cli {
    // Identity of this process
    #[clap(
        long,
        env("SWIMFD_PROCESS_ID"),
        help = "Identifier of this process: 'host' or 'host:ping-port'"
    )]
    pub process_id: String,

    // Listener bind address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("SWIMFD_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // Bootstrap membership
    #[clap(
        long,
        env("SWIMFD_PEERS"),
        value_delimiter = ',',
        help = "Initial peers (e.g., 10.0.0.2,10.0.0.3 or 127.0.0.1:20010). If empty, waits for JOINs."
    )]
    pub peers: Vec<String>,

    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_PING,
        env("SWIMFD_PING_PORT"),
        help = "Port receiving PING"
    )]
    pub ping_port: u16,

    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_PING_REQ,
        env("SWIMFD_PING_REQ_PORT"),
        help = "Port receiving PING_REQ"
    )]
    pub ping_req_port: u16,

    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_FAIL,
        env("SWIMFD_FAIL_PORT"),
        help = "Port receiving FAIL and JOIN"
    )]
    pub fail_port: u16,

    #[clap(
        long,
        default_value = settings::DEFAULT_DIRECT_TIMEOUT_MS,
        env("SWIMFD_DIRECT_TIMEOUT_MS"),
        help = "Milliseconds to wait for a direct ACK"
    )]
    pub direct_timeout_ms: u64,

    #[clap(
        long,
        default_value = settings::DEFAULT_INDIRECT_TIMEOUT_MS,
        env("SWIMFD_INDIRECT_TIMEOUT_MS"),
        help = "Milliseconds to wait for a relayed ACK"
    )]
    pub indirect_timeout_ms: u64,

    #[clap(
        long,
        default_value = settings::DEFAULT_HELPER_TIMEOUT_MS,
        env("SWIMFD_HELPER_TIMEOUT_MS"),
        help = "Milliseconds a helper waits for the target"
    )]
    pub helper_timeout_ms: u64,

    #[clap(
        long,
        default_value = settings::DEFAULT_PROBE_INTERVAL_MS,
        env("SWIMFD_PROBE_INTERVAL_MS"),
        help = "Milliseconds between probe cycles"
    )]
    pub probe_interval_ms: u64,

    #[clap(
        long,
        default_value = settings::DEFAULT_INDIRECT_FANOUT,
        env("SWIMFD_INDIRECT_FANOUT"),
        help = "Helpers asked per indirect probe"
    )]
    pub indirect_fanout: usize,

    #[clap(
        long,
        default_value = settings::DEFAULT_MAX_HELPER_PROBES,
        env("SWIMFD_MAX_HELPER_PROBES"),
        help = "PING_REQs served at once; extra requests are dropped"
    )]
    pub max_helper_probes: usize,

    #[clap(long, env("SWIMFD_RNG_SEED"), help = "Seed for peer selection")]
    pub rng_seed: Option<u64>,

    #[clap(
        long,
        default_value = "10",
        env("SWIMFD_STATUS_INTERVAL_SECS"),
        help = "Seconds between membership status logs (0 disables)"
    )]
    pub status_interval_secs: u64,

    #[clap(long, env("SWIMFD_LOG_JSON"), help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            process_id: ProcessId::from(self.process_id),
            listen_address: self.listen_address,
            peers: self
                .peers
                .into_iter()
                .filter(|peer| !peer.is_empty())
                .map(ProcessId::from)
                .collect(),
            ports: settings::Ports {
                ping: self.ping_port,
                ping_req: self.ping_req_port,
                fail: self.fail_port,
            },
            direct_timeout: Duration::from_millis(self.direct_timeout_ms),
            indirect_timeout: Duration::from_millis(self.indirect_timeout_ms),
            helper_timeout: Duration::from_millis(self.helper_timeout_ms),
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            indirect_fanout: self.indirect_fanout,
            max_helper_probes: self.max_helper_probes,
            rng_seed: self.rng_seed,
        }
    }
}
