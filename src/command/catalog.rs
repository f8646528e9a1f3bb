//! The command catalog: a closed set of command identifiers and the
//! templates the RN2483 understands for each of them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::command::template::{ArgKind, Args, CommandTemplate, HexLen, Placeholder};
use crate::constants::*;
use crate::error::{LoRaError, Result};

/// Every command this crate knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandId {
    SysVersion,
    SysVoltage,
    SysHardwareEui,
    SysReset,
    SysFactoryReset,
    SysSleep,
    SysSetPin,
    MacSetNwkSKey,
    MacSetAppSKey,
    MacSetAppKey,
    MacSetAppEui,
    MacSetDevAddr,
    MacSetDevEui,
    MacSetAdr,
    MacSetPowerIndex,
    MacSetDataRate,
    MacGetDevAddr,
    MacGetDevEui,
    MacGetAppEui,
    MacGetStatus,
    MacSave,
    MacPause,
    MacResume,
    MacJoin,
    MacTxConfirmed,
    RadioTx,
    RadioRx,
    RadioRxStop,
    RadioGetSnr,
}

impl CommandId {
    pub const ALL: &'static [CommandId] = &[
        CommandId::SysVersion,
        CommandId::SysVoltage,
        CommandId::SysHardwareEui,
        CommandId::SysReset,
        CommandId::SysFactoryReset,
        CommandId::SysSleep,
        CommandId::SysSetPin,
        CommandId::MacSetNwkSKey,
        CommandId::MacSetAppSKey,
        CommandId::MacSetAppKey,
        CommandId::MacSetAppEui,
        CommandId::MacSetDevAddr,
        CommandId::MacSetDevEui,
        CommandId::MacSetAdr,
        CommandId::MacSetPowerIndex,
        CommandId::MacSetDataRate,
        CommandId::MacGetDevAddr,
        CommandId::MacGetDevEui,
        CommandId::MacGetAppEui,
        CommandId::MacGetStatus,
        CommandId::MacSave,
        CommandId::MacPause,
        CommandId::MacResume,
        CommandId::MacJoin,
        CommandId::MacTxConfirmed,
        CommandId::RadioTx,
        CommandId::RadioRx,
        CommandId::RadioRxStop,
        CommandId::RadioGetSnr,
    ];

    /// Dotted symbolic name, e.g. `SYSTEM.VERSION`.
    pub fn name(self) -> &'static str {
        match self {
            CommandId::SysVersion => "SYSTEM.VERSION",
            CommandId::SysVoltage => "SYSTEM.VOLTAGE",
            CommandId::SysHardwareEui => "SYSTEM.HWEUI",
            CommandId::SysReset => "SYSTEM.RESET",
            CommandId::SysFactoryReset => "SYSTEM.FACTORY_RESET",
            CommandId::SysSleep => "SYSTEM.SLEEP",
            CommandId::SysSetPin => "SYSTEM.SET_PIN",
            CommandId::MacSetNwkSKey => "MAC.SET.NWKSKEY",
            CommandId::MacSetAppSKey => "MAC.SET.APPSKEY",
            CommandId::MacSetAppKey => "MAC.SET.APPKEY",
            CommandId::MacSetAppEui => "MAC.SET.APPEUI",
            CommandId::MacSetDevAddr => "MAC.SET.DEVADDR",
            CommandId::MacSetDevEui => "MAC.SET.DEVEUI",
            CommandId::MacSetAdr => "MAC.SET.ADR",
            CommandId::MacSetPowerIndex => "MAC.SET.PWRIDX",
            CommandId::MacSetDataRate => "MAC.SET.DR",
            CommandId::MacGetDevAddr => "MAC.GET.DEVADDR",
            CommandId::MacGetDevEui => "MAC.GET.DEVEUI",
            CommandId::MacGetAppEui => "MAC.GET.APPEUI",
            CommandId::MacGetStatus => "MAC.GET.STATUS",
            CommandId::MacSave => "MAC.SAVE",
            CommandId::MacPause => "MAC.PAUSE",
            CommandId::MacResume => "MAC.RESUME",
            CommandId::MacJoin => "MAC.JOIN",
            CommandId::MacTxConfirmed => "MAC.TX.CONFIRMED",
            CommandId::RadioTx => "RADIO.TX",
            CommandId::RadioRx => "RADIO.RX",
            CommandId::RadioRxStop => "RADIO.RX_STOP",
            CommandId::RadioGetSnr => "RADIO.SNR",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandId {
    type Err = LoRaError;

    fn from_str(s: &str) -> Result<Self> {
        CommandId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == s)
            .ok_or_else(|| LoRaError::UnknownCommand(s.to_string()))
    }
}

/// Immutable map from [`CommandId`] to [`CommandTemplate`].
#[derive(Debug)]
pub struct CommandCatalog {
    templates: HashMap<CommandId, CommandTemplate>,
}

static STANDARD: Lazy<Arc<CommandCatalog>> = Lazy::new(|| {
    let templates = standard_templates()
        .unwrap_or_else(|e| panic!("built-in command table is inconsistent: {e}"));
    let catalog = CommandCatalog::from_templates(templates)
        .unwrap_or_else(|e| panic!("built-in command table is inconsistent: {e}"));
    Arc::new(catalog)
});

impl CommandCatalog {
    /// Build a catalog; a repeated identifier is rejected.
    pub fn from_templates(templates: Vec<CommandTemplate>) -> Result<Self> {
        let mut map = HashMap::with_capacity(templates.len());
        for template in templates {
            let id = template.id();
            if map.insert(id, template).is_some() {
                return Err(LoRaError::DuplicateCommand(id.name().to_string()));
            }
        }
        Ok(CommandCatalog { templates: map })
    }

    /// The RN2483 command set, built once per process.
    pub fn standard() -> Arc<CommandCatalog> {
        Arc::clone(&STANDARD)
    }

    pub fn lookup(&self, id: CommandId) -> Result<&CommandTemplate> {
        self.templates
            .get(&id)
            .ok_or_else(|| LoRaError::UnknownCommand(id.name().to_string()))
    }

    /// Look up by dotted symbolic name, e.g. `MAC.TX.CONFIRMED`.
    pub fn lookup_name(&self, name: &str) -> Result<&CommandTemplate> {
        self.lookup(name.parse()?)
    }

    /// Render a template with the given arguments into wire bytes (no terminator).
    pub fn render(&self, template: &CommandTemplate, args: &Args) -> Result<Vec<u8>> {
        template.render(args).map(String::into_bytes)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn key(name: &'static str) -> Placeholder {
    Placeholder::new(name, ArgKind::Hex(HexLen::Exact(KEY_HEX_DIGITS)))
}

fn eui(name: &'static str) -> Placeholder {
    Placeholder::new(name, ArgKind::Hex(HexLen::Exact(EUI_HEX_DIGITS)))
}

fn payload(name: &'static str) -> Placeholder {
    Placeholder::new(
        name,
        ArgKind::Hex(HexLen::Even {
            max: MAX_PAYLOAD_BYTES * 2,
        }),
    )
}

fn standard_templates() -> Result<Vec<CommandTemplate>> {
    use CommandId::*;

    Ok(vec![
        CommandTemplate::new(SysVersion, "sys get ver", vec![])?,
        CommandTemplate::new(SysVoltage, "sys get vdd", vec![])?,
        CommandTemplate::new(SysHardwareEui, "sys get hweui", vec![])?,
        CommandTemplate::new(SysReset, "sys reset", vec![])?,
        CommandTemplate::new(SysFactoryReset, "sys factoryRESET", vec![])?,
        CommandTemplate::new(
            SysSleep,
            "sys sleep {ms}",
            vec![Placeholder::new(
                "ms",
                ArgKind::Integer {
                    min: SLEEP_MIN_MS,
                    max: SLEEP_MAX_MS,
                },
            )],
        )?,
        CommandTemplate::new(
            SysSetPin,
            "sys set pindig {pin} {state}",
            vec![
                Placeholder::new("pin", ArgKind::Enum(PIN_NAMES)),
                Placeholder::new("state", ArgKind::Enum(&["0", "1"])),
            ],
        )?,
        CommandTemplate::new(MacSetNwkSKey, "mac set nwkskey {key}", vec![key("key")])?.sensitive(),
        CommandTemplate::new(MacSetAppSKey, "mac set appskey {key}", vec![key("key")])?.sensitive(),
        CommandTemplate::new(MacSetAppKey, "mac set appkey {key}", vec![key("key")])?.sensitive(),
        CommandTemplate::new(MacSetAppEui, "mac set appeui {eui}", vec![eui("eui")])?,
        CommandTemplate::new(
            MacSetDevAddr,
            "mac set devaddr {address}",
            vec![Placeholder::new(
                "address",
                ArgKind::Hex(HexLen::Exact(DEVADDR_HEX_DIGITS)),
            )],
        )?,
        CommandTemplate::new(MacSetDevEui, "mac set deveui {eui}", vec![eui("eui")])?,
        CommandTemplate::new(
            MacSetAdr,
            "mac set adr {state}",
            vec![Placeholder::new("state", ArgKind::Enum(&["on", "off"]))],
        )?,
        CommandTemplate::new(
            MacSetPowerIndex,
            "mac set pwridx {index}",
            vec![Placeholder::new(
                "index",
                ArgKind::Integer {
                    min: 0,
                    max: POWER_INDEX_MAX,
                },
            )],
        )?,
        CommandTemplate::new(
            MacSetDataRate,
            "mac set dr {rate}",
            vec![Placeholder::new(
                "rate",
                ArgKind::Integer {
                    min: 0,
                    max: DATA_RATE_MAX,
                },
            )],
        )?,
        CommandTemplate::new(MacGetDevAddr, "mac get devaddr", vec![])?,
        CommandTemplate::new(MacGetDevEui, "mac get deveui", vec![])?,
        CommandTemplate::new(MacGetAppEui, "mac get appeui", vec![])?,
        CommandTemplate::new(MacGetStatus, "mac get status", vec![])?,
        CommandTemplate::new(MacSave, "mac save", vec![])?,
        CommandTemplate::new(MacPause, "mac pause", vec![])?,
        CommandTemplate::new(MacResume, "mac resume", vec![])?,
        CommandTemplate::new(
            MacJoin,
            "mac join {mode}",
            vec![Placeholder::new("mode", ArgKind::Enum(&["otaa", "abp"]))],
        )?,
        CommandTemplate::new(
            MacTxConfirmed,
            "mac tx cnf {port} {data}",
            vec![
                Placeholder::new(
                    "port",
                    ArgKind::Integer {
                        min: PORT_MIN,
                        max: PORT_MAX,
                    },
                ),
                payload("data"),
            ],
        )?,
        CommandTemplate::new(RadioTx, "radio tx {data}", vec![payload("data")])?,
        CommandTemplate::new(
            RadioRx,
            "radio rx {size}",
            vec![Placeholder::new(
                "size",
                ArgKind::Integer {
                    min: 0,
                    max: RX_WINDOW_MAX,
                },
            )],
        )?,
        CommandTemplate::new(RadioRxStop, "radio rxstop", vec![])?,
        CommandTemplate::new(RadioGetSnr, "radio get snr", vec![])?,
    ])
}
