//! # LoRaWAN Join Provisioning
//!
//! The [`JoinSequencer`] walks the module through the configuration a
//! LoRaWAN activation needs and then issues `mac join`.
//!
//! ```text
//! Idle -> ConfiguringKeys -> SettingAddressOrEUI -> SettingPower -> Saving -> Joining -> Joined
//!   \________________________ any failure ________________________________/
//!                                   v
//!                        Failed { stage, reason }
//! ```
//!
//! The first rejected step stops the sequence. Steps already applied stay
//! applied on the module; there is no rollback. `Joined` means the module
//! accepted the join command, not that the network answered.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroize;

use crate::constants::{
    DEFAULT_POWER_INDEX, DEVADDR_HEX_DIGITS, EUI_HEX_DIGITS, KEY_HEX_DIGITS, POWER_INDEX_MAX,
};
use crate::device_client::DeviceClient;
use crate::error::{LoRaError, Result};
use crate::util::hex::check_hex;

/// LoRaWAN activation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Over-the-air activation.
    Otaa,
    /// Activation by personalization.
    Abp,
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinMode::Otaa => "otaa",
            JoinMode::Abp => "abp",
        })
    }
}

/// Key material for one activation mode. Zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Abp {
        nwkskey: String,
        appskey: String,
        devaddr: String,
    },
    Otaa {
        appkey: String,
        appeui: String,
    },
}

impl Drop for Credentials {
    fn drop(&mut self) {
        match self {
            Credentials::Abp {
                nwkskey,
                appskey,
                devaddr,
            } => {
                nwkskey.zeroize();
                appskey.zeroize();
                devaddr.zeroize();
            }
            Credentials::Otaa { appkey, appeui } => {
                appkey.zeroize();
                appeui.zeroize();
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Abp { devaddr, .. } => f
                .debug_struct("Abp")
                .field("nwkskey", &"<redacted>")
                .field("appskey", &"<redacted>")
                .field("devaddr", devaddr)
                .finish(),
            Credentials::Otaa { appeui, .. } => f
                .debug_struct("Otaa")
                .field("appkey", &"<redacted>")
                .field("appeui", appeui)
                .finish(),
        }
    }
}

/// A validated activation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    credentials: Credentials,
    power_index: Option<u8>,
}

fn check_field(field: &str, value: &str, digits: usize) -> Result<()> {
    check_hex(value, Some(digits))
        .map_err(|e| LoRaError::InvalidJoinConfig(format!("{field}: {e}")))
}

impl JoinConfig {
    pub fn abp(nwkskey: &str, appskey: &str, devaddr: &str) -> Result<Self> {
        check_field("nwkskey", nwkskey, KEY_HEX_DIGITS)?;
        check_field("appskey", appskey, KEY_HEX_DIGITS)?;
        check_field("devaddr", devaddr, DEVADDR_HEX_DIGITS)?;
        Ok(JoinConfig {
            credentials: Credentials::Abp {
                nwkskey: nwkskey.to_string(),
                appskey: appskey.to_string(),
                devaddr: devaddr.to_string(),
            },
            power_index: None,
        })
    }

    pub fn otaa(appkey: &str, appeui: &str) -> Result<Self> {
        check_field("appkey", appkey, KEY_HEX_DIGITS)?;
        check_field("appeui", appeui, EUI_HEX_DIGITS)?;
        Ok(JoinConfig {
            credentials: Credentials::Otaa {
                appkey: appkey.to_string(),
                appeui: appeui.to_string(),
            },
            power_index: None,
        })
    }

    /// Override the transmit power index (0 to 5).
    pub fn with_power_index(mut self, index: u8) -> Result<Self> {
        if u64::from(index) > POWER_INDEX_MAX {
            return Err(LoRaError::InvalidJoinConfig(format!(
                "power_index {index} is out of range 0..={POWER_INDEX_MAX}"
            )));
        }
        self.power_index = Some(index);
        Ok(self)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: JoinConfigFile =
            serde_json::from_str(text).map_err(|e| LoRaError::InvalidJoinConfig(e.to_string()))?;
        JoinConfig::try_from(file)
    }

    pub fn mode(&self) -> JoinMode {
        match self.credentials {
            Credentials::Abp { .. } => JoinMode::Abp,
            Credentials::Otaa { .. } => JoinMode::Otaa,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn power_index(&self) -> Option<u8> {
        self.power_index
    }
}

/// Flat on-disk form of a [`JoinConfig`].
///
/// ```json
/// { "mode": "abp", "nwkskey": "...", "appskey": "...", "devaddr": "26011BDA" }
/// ```
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfigFile {
    pub mode: Option<JoinMode>,
    pub nwkskey: Option<String>,
    pub appskey: Option<String>,
    pub devaddr: Option<String>,
    pub appkey: Option<String>,
    pub appeui: Option<String>,
    pub power_index: Option<u8>,
}

impl Drop for JoinConfigFile {
    fn drop(&mut self) {
        self.nwkskey.zeroize();
        self.appskey.zeroize();
        self.appkey.zeroize();
    }
}

fn required<'a>(mode: JoinMode, name: &str, value: &'a Option<String>) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| {
        LoRaError::InvalidJoinConfig(format!("{mode} activation requires '{name}'"))
    })
}

fn forbidden(mode: JoinMode, name: &str, value: &Option<String>) -> Result<()> {
    match value {
        Some(_) => Err(LoRaError::InvalidJoinConfig(format!(
            "'{name}' does not apply to {mode} activation"
        ))),
        None => Ok(()),
    }
}

impl TryFrom<JoinConfigFile> for JoinConfig {
    type Error = LoRaError;

    fn try_from(file: JoinConfigFile) -> Result<Self> {
        let mode = file
            .mode
            .ok_or_else(|| LoRaError::InvalidJoinConfig("missing 'mode'".to_string()))?;

        let config = match mode {
            JoinMode::Abp => {
                forbidden(mode, "appkey", &file.appkey)?;
                forbidden(mode, "appeui", &file.appeui)?;
                JoinConfig::abp(
                    required(mode, "nwkskey", &file.nwkskey)?,
                    required(mode, "appskey", &file.appskey)?,
                    required(mode, "devaddr", &file.devaddr)?,
                )?
            }
            JoinMode::Otaa => {
                forbidden(mode, "nwkskey", &file.nwkskey)?;
                forbidden(mode, "appskey", &file.appskey)?;
                forbidden(mode, "devaddr", &file.devaddr)?;
                JoinConfig::otaa(
                    required(mode, "appkey", &file.appkey)?,
                    required(mode, "appeui", &file.appeui)?,
                )?
            }
        };

        match file.power_index {
            Some(index) => config.with_power_index(index),
            None => Ok(config),
        }
    }
}

/// A non-terminal step of the sequence, named in failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStage {
    ConfiguringKeys,
    SettingAddressOrEUI,
    SettingPower,
    Saving,
    Joining,
}

impl fmt::Display for JoinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinStage::ConfiguringKeys => "ConfiguringKeys",
            JoinStage::SettingAddressOrEUI => "SettingAddressOrEUI",
            JoinStage::SettingPower => "SettingPower",
            JoinStage::Saving => "Saving",
            JoinStage::Joining => "Joining",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinState {
    Idle,
    ConfiguringKeys,
    SettingAddressOrEUI,
    SettingPower,
    Saving,
    Joining,
    Joined,
    Failed { stage: JoinStage, reason: String },
}

impl From<JoinStage> for JoinState {
    fn from(stage: JoinStage) -> Self {
        match stage {
            JoinStage::ConfiguringKeys => JoinState::ConfiguringKeys,
            JoinStage::SettingAddressOrEUI => JoinState::SettingAddressOrEUI,
            JoinStage::SettingPower => JoinState::SettingPower,
            JoinStage::Saving => JoinState::Saving,
            JoinStage::Joining => JoinState::Joining,
        }
    }
}

impl JoinState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JoinState::Joined | JoinState::Failed { .. })
    }
}

/// Why a join sequence stopped.
#[derive(Debug, Error)]
#[error("join failed at {stage}: {source}")]
pub struct JoinError {
    pub stage: JoinStage,
    #[source]
    pub source: LoRaError,
}

impl JoinError {
    /// The device's reason token for a rejection, otherwise the error text.
    pub fn reason(&self) -> String {
        self.source
            .device_reason()
            .map(str::to_string)
            .unwrap_or_else(|| self.source.to_string())
    }
}

impl From<JoinError> for LoRaError {
    fn from(e: JoinError) -> Self {
        LoRaError::JoinFailed {
            stage: e.stage.to_string(),
            reason: e.reason(),
        }
    }
}

enum Step<'c> {
    NetworkSessionKey(&'c str),
    AppSessionKey(&'c str),
    AppKey(&'c str),
    DeviceAddress(&'c str),
    AppEui(&'c str),
    AdaptiveDataRate,
    PowerIndex(u8),
    Save,
    Join(JoinMode),
}

fn plan(config: &JoinConfig) -> Vec<(JoinStage, Step<'_>)> {
    use JoinStage::*;

    match &config.credentials {
        Credentials::Abp {
            nwkskey,
            appskey,
            devaddr,
        } => vec![
            (ConfiguringKeys, Step::NetworkSessionKey(nwkskey)),
            (ConfiguringKeys, Step::AppSessionKey(appskey)),
            (SettingAddressOrEUI, Step::DeviceAddress(devaddr)),
            (SettingPower, Step::AdaptiveDataRate),
            (
                SettingPower,
                Step::PowerIndex(config.power_index.unwrap_or(DEFAULT_POWER_INDEX)),
            ),
            (Saving, Step::Save),
            (Joining, Step::Join(JoinMode::Abp)),
        ],
        Credentials::Otaa { appkey, appeui } => {
            let mut steps = vec![
                (ConfiguringKeys, Step::AppKey(appkey)),
                (SettingAddressOrEUI, Step::AppEui(appeui)),
            ];
            if let Some(index) = config.power_index {
                steps.push((SettingPower, Step::PowerIndex(index)));
            }
            steps.push((Saving, Step::Save));
            steps.push((Joining, Step::Join(JoinMode::Otaa)));
            steps
        }
    }
}

/// Drives a [`DeviceClient`] through ABP or OTAA provisioning.
pub struct JoinSequencer<'a> {
    client: &'a DeviceClient,
    state: JoinState,
    history: Vec<JoinState>,
}

impl<'a> JoinSequencer<'a> {
    pub fn new(client: &'a DeviceClient) -> Self {
        JoinSequencer {
            client,
            state: JoinState::Idle,
            history: vec![JoinState::Idle],
        }
    }

    pub fn state(&self) -> &JoinState {
        &self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[JoinState] {
        &self.history
    }

    fn enter(&mut self, state: JoinState) {
        if state != self.state {
            log::debug!("join: {:?} -> {:?}", self.state, state);
            self.history.push(state.clone());
            self.state = state;
        }
    }

    async fn apply(&self, step: &Step<'_>) -> Result<()> {
        let client = self.client;
        match *step {
            Step::NetworkSessionKey(key) => client.set_network_session_key(key).await,
            Step::AppSessionKey(key) => client.set_app_session_key(key).await,
            Step::AppKey(key) => client.set_app_key(key).await,
            Step::DeviceAddress(address) => client.set_device_address(address).await,
            Step::AppEui(eui) => client.set_app_eui(eui).await,
            Step::AdaptiveDataRate => client.set_adaptive_data_rate(true).await,
            Step::PowerIndex(index) => client.set_power_index(index).await,
            Step::Save => client.save().await,
            Step::Join(mode) => client.join(mode).await,
        }
    }

    /// Run the whole sequence from `Idle`. A sequencer that already ran
    /// starts over.
    pub async fn run(&mut self, config: &JoinConfig) -> std::result::Result<(), JoinError> {
        self.state = JoinState::Idle;
        self.history = vec![JoinState::Idle];
        log::info!("provisioning {} activation", config.mode());

        for (stage, step) in plan(config) {
            self.enter(stage.into());
            if let Err(source) = self.apply(&step).await {
                let error = JoinError { stage, source };
                log::warn!("{error}");
                self.enter(JoinState::Failed {
                    stage,
                    reason: error.reason(),
                });
                return Err(error);
            }
        }

        self.enter(JoinState::Joined);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "2B7E151628AED2A6ABF7158809CF4F3C";

    #[test]
    fn test_abp_config_validates_lengths() {
        assert!(JoinConfig::abp(KEY, KEY, "26011BDA").is_ok());
        assert!(matches!(
            JoinConfig::abp(KEY, KEY, "26011B"),
            Err(LoRaError::InvalidJoinConfig(_))
        ));
        assert!(matches!(
            JoinConfig::abp("XYZ", KEY, "26011BDA"),
            Err(LoRaError::InvalidJoinConfig(_))
        ));
    }

    #[test]
    fn test_otaa_config() {
        let config = JoinConfig::otaa(KEY, "70B3D57ED0000001").unwrap();
        assert_eq!(config.mode(), JoinMode::Otaa);
        assert_eq!(config.power_index(), None);
    }

    #[test]
    fn test_power_index_bounds() {
        let config = JoinConfig::otaa(KEY, "70B3D57ED0000001").unwrap();
        assert!(config.clone().with_power_index(5).is_ok());
        assert!(config.with_power_index(6).is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = JoinConfig::abp(KEY, KEY, "26011BDA").unwrap();
        let text = format!("{config:?}");
        assert!(!text.contains(KEY));
        assert!(text.contains("26011BDA"));
    }

    #[test]
    fn test_file_with_wrong_field_set_is_rejected() {
        let mut file = JoinConfigFile::default();
        file.mode = Some(JoinMode::Otaa);
        file.appkey = Some(KEY.into());
        file.appeui = Some("70B3D57ED0000001".into());
        file.devaddr = Some("26011BDA".into());
        let err = JoinConfig::try_from(file).unwrap_err();
        assert!(err.to_string().contains("devaddr"));
    }

    #[test]
    fn test_file_missing_field_is_rejected() {
        let mut file = JoinConfigFile::default();
        file.mode = Some(JoinMode::Abp);
        file.nwkskey = Some(KEY.into());
        file.appskey = Some(KEY.into());
        let err = JoinConfig::try_from(file).unwrap_err();
        assert!(err.to_string().contains("devaddr"));
    }

    #[test]
    fn test_from_json() {
        let config = JoinConfig::from_json(&format!(
            r#"{{"mode":"abp","nwkskey":"{KEY}","appskey":"{KEY}","devaddr":"26011BDA","power_index":3}}"#
        ))
        .unwrap();
        assert_eq!(config.mode(), JoinMode::Abp);
        assert_eq!(config.power_index(), Some(3));

        assert!(JoinConfig::from_json(r#"{"mode":"abp","bogus":1}"#).is_err());
        assert!(JoinConfig::from_json(r#"{"mode":"lorawan"}"#).is_err());
    }

    #[test]
    fn test_otaa_plan_includes_power_only_when_overridden() {
        let config = JoinConfig::otaa(KEY, "70B3D57ED0000001").unwrap();
        let stages: Vec<JoinStage> = plan(&config).iter().map(|(s, _)| *s).collect();
        assert!(!stages.contains(&JoinStage::SettingPower));

        let config = config.with_power_index(0).unwrap();
        let stages: Vec<JoinStage> = plan(&config).iter().map(|(s, _)| *s).collect();
        assert!(stages.contains(&JoinStage::SettingPower));
    }

    #[test]
    fn test_join_error_into_lora_error() {
        let error = JoinError {
            stage: JoinStage::Saving,
            source: LoRaError::DeviceRejected("invalid_param".into()),
        };
        assert!(matches!(
            LoRaError::from(error),
            LoRaError::JoinFailed { ref stage, ref reason }
                if stage == "Saving" && reason == "invalid_param"
        ));
    }
}
