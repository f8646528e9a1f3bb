use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rn2483::util::hex::{decode_hex, encode_hex_upper};
use rn2483::logging::{log_debug, log_error, log_warn};
use rn2483::{
    init_logger, log_info, DeviceClient, JoinConfig, JoinSequencer, JoinState, Pin, PinLevel,
    ProtocolConfig, SerialConfig,
};

#[derive(Parser)]
#[command(name = "rn2483-cli")]
#[command(about = "CLI tool for the RN2483 LoRa module")]
struct Cli {
    /// Serial port the module is attached to
    #[arg(short, long, global = true, default_value = "/dev/ttyUSB0")]
    port: String,

    #[arg(short, long, global = true, default_value = "57600")]
    baudrate: u32,

    /// Per-command response deadline
    #[arg(long, global = true, default_value = "2000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Version,
    Voltage,
    Hweui,
    Snr,
    Reset,
    FactoryReset,
    Sleep {
        ms: u64,
    },
    Pin {
        pin: Pin,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        level: u8,
    },
    /// Transmit a raw LoRa frame given as hex
    Send {
        payload: String,
    },
    /// Wait for one raw LoRa frame
    Receive {
        #[arg(long, default_value = "10000")]
        wait_ms: u64,
    },
    /// Provision ABP or OTAA keys from a JSON file and join
    Join {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load_join_config(path: &PathBuf) -> Result<JoinConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading join config {}", path.display()))?;
    JoinConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log_error(&format!("{e:#}"));
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    log_debug(&format!(
        "opening {} at {} baud, {} ms per command",
        cli.port, cli.baudrate, cli.timeout_ms
    ));
    let serial = SerialConfig::new(&cli.port).with_baudrate(cli.baudrate);
    let protocol = ProtocolConfig {
        command_timeout: Duration::from_millis(cli.timeout_ms),
        ..Default::default()
    };
    let client = DeviceClient::open(&serial, protocol)
        .with_context(|| format!("opening {}", cli.port))?;

    match cli.command {
        Commands::Version => log_info(&format!("Version: {}", client.version().await?)),
        Commands::Voltage => log_info(&format!("Voltage: {} mV", client.voltage().await?)),
        Commands::Hweui => log_info(&format!("Hardware EUI: {}", client.hardware_eui().await?)),
        Commands::Snr => log_info(&format!(
            "SNR: {} dB",
            client.signal_to_noise_ratio().await?
        )),
        Commands::Reset => {
            client.reset().await?;
            log_info("Module reset");
        }
        Commands::FactoryReset => {
            client.factory_reset().await?;
            log_info("Factory defaults restored");
        }
        Commands::Sleep { ms } => {
            // The module only answers after waking up.
            let deadline = Duration::from_millis(ms.saturating_add(cli.timeout_ms));
            let client = client.with_timeout(deadline);
            client.sleep(ms).await?;
            log_info(&format!("Slept {ms} ms"));
        }
        Commands::Pin { pin, level } => {
            client.set_pin(pin, PinLevel::from(level == 1)).await?;
            log_info(&format!("{pin} set to {level}"));
        }
        Commands::Send { payload } => {
            let bytes = decode_hex(&payload).context("payload must be hex")?;
            client.send(&bytes).await.context("radio transmission")?;
            log_info(&format!("Sent {} bytes", bytes.len()));
        }
        Commands::Receive { wait_ms } => {
            let bytes = client
                .receive(Duration::from_millis(wait_ms))
                .await
                .context("radio reception")?;
            log_info(&format!("Received: {}", encode_hex_upper(&bytes)));
        }
        Commands::Join { config } => {
            let config = load_join_config(&config)?;
            let mut sequencer = JoinSequencer::new(&client);
            let outcome = sequencer.run(&config).await;
            if let JoinState::Failed { stage, reason } = sequencer.state() {
                log_warn(&format!(
                    "join stopped at {stage} ({reason}); settings already applied stay on the module"
                ));
            }
            outcome.with_context(|| format!("{} join", config.mode()))?;
            log_info(&format!("Join request accepted ({})", config.mode()));
        }
    }

    Ok(())
}
