// Copyright 2021-2022 Farcaster Devs
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 3 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA

//! Configuration of the two proxies. A configuration is loaded once from YAML, then owned by the
//! proxy instance; on the foreign side it is the record the governor updates.
//!
//! ```yaml
//! governor: "0x1111111111111111111111111111111111111111"
//! arbitrator: "0x2222222222222222222222222222222222222222"
//! arbitrator_extra_data: "0x00"
//! messenger: "0x3333333333333333333333333333333333333333"
//! home_proxy: "0x4444444444444444444444444444444444444444"
//! home_chain_id: 10200
//! surplus: "20000"
//! meta_evidence: "ipfs/X"
//! multipliers:
//!   winner: 3000
//!   loser: 7000
//!   loser_appeal_period: 5000
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::governance::{Multipliers, MULTIPLIER_DIVISOR};
use crate::types::{Address, ChainId};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The file cannot be read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The content is not a valid configuration.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A required address is zero.
    #[error("Field {0} must not be the zero address")]
    ZeroAddress(&'static str),
    /// A multiplier is out of its range.
    #[error("Multiplier {name} out of range: {value}")]
    InvalidMultiplier { name: &'static str, value: u64 },
}

/// Parse and validate a configuration from YAML.
pub trait ProxyConfig: DeserializeOwned {
    /// Check the values serde cannot check.
    fn validate(&self) -> Result<(), Error>;

    fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

/// Governed configuration of a [`ForeignProxy`](crate::foreign::ForeignProxy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignProxyConfig {
    /// The only account allowed to change this configuration.
    pub governor: Address,
    /// The court disputes are created in.
    pub arbitrator: Address,
    /// Extra data passed to the court, selects the court and the number of jurors.
    #[serde(default, with = "crate::hash::hex_bytes")]
    pub arbitrator_extra_data: Vec<u8>,
    /// Messenger delivering messages from the home proxy.
    pub messenger: Address,
    /// The counterpart proxy.
    pub home_proxy: Address,
    /// Chain of the home proxy.
    pub home_chain_id: ChainId,
    /// Value kept on top of the arbitration cost to pay for the request message.
    #[serde(with = "string")]
    pub surplus: u128,
    /// Meta-evidence of the disputes.
    pub meta_evidence: String,
    #[serde(default)]
    pub multipliers: Multipliers,
}

impl ProxyConfig for ForeignProxyConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.messenger.is_zero() {
            return Err(Error::ZeroAddress("messenger"));
        }
        if self.home_proxy.is_zero() {
            return Err(Error::ZeroAddress("home_proxy"));
        }
        check_loser_appeal_period(self.multipliers.loser_appeal_period)
    }
}

/// The loser funding window cannot outlast the appeal period.
pub(crate) fn check_loser_appeal_period(value: u64) -> Result<(), Error> {
    if value > MULTIPLIER_DIVISOR {
        return Err(Error::InvalidMultiplier {
            name: "loser_appeal_period",
            value,
        });
    }
    Ok(())
}

/// Configuration of a [`HomeProxy`](crate::home::HomeProxy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomeProxyConfig {
    /// The oracle the proxy is the arbitrator of.
    pub oracle: Address,
    /// Messenger delivering messages from the foreign proxy.
    pub messenger: Address,
    /// The counterpart proxy.
    pub foreign_proxy: Address,
    /// Chain of the foreign proxy.
    pub foreign_chain_id: ChainId,
    /// Terms of service of the arbitration, published for the oracle users.
    #[serde(default)]
    pub metadata: String,
}

impl ProxyConfig for HomeProxyConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.oracle.is_zero() {
            return Err(Error::ZeroAddress("oracle"));
        }
        if self.messenger.is_zero() {
            return Err(Error::ZeroAddress("messenger"));
        }
        if self.foreign_proxy.is_zero() {
            return Err(Error::ZeroAddress("foreign_proxy"));
        }
        Ok(())
    }
}

/// Amounts are written as strings, YAML integers do not cover the whole range.
pub(crate) mod string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREIGN: &str = r#"
governor: "0x1111111111111111111111111111111111111111"
arbitrator: "0x2222222222222222222222222222222222222222"
arbitrator_extra_data: "0x0102"
messenger: "0x3333333333333333333333333333333333333333"
home_proxy: "0x4444444444444444444444444444444444444444"
home_chain_id: 10200
surplus: "20000"
meta_evidence: "ipfs/X"
"#;

    const HOME: &str = r#"
oracle: "0x5555555555555555555555555555555555555555"
messenger: "0x6666666666666666666666666666666666666666"
foreign_proxy: "0x7777777777777777777777777777777777777777"
foreign_chain_id: 5
metadata: "ipfs/Y"
"#;

    #[test]
    fn parse_foreign_config() {
        let config = ForeignProxyConfig::from_yaml_str(FOREIGN).unwrap();
        assert_eq!(config.governor, Address::repeat_byte(0x11));
        assert_eq!(config.arbitrator_extra_data, vec![0x01, 0x02]);
        assert_eq!(config.home_chain_id, ChainId(10200));
        assert_eq!(config.surplus, 20000);
        assert_eq!(config.multipliers, Multipliers::default());

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("surplus: \"20000\""));
        assert_eq!(ForeignProxyConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn parse_home_config() {
        let config = HomeProxyConfig::from_yaml_str(HOME).unwrap();
        assert_eq!(config.foreign_chain_id, ChainId(5));
        assert_eq!(config.metadata, "ipfs/Y");
    }

    #[test]
    fn reject_invalid_configs() {
        let unknown = format!("{}unknown: 1\n", HOME);
        assert!(matches!(
            HomeProxyConfig::from_yaml_str(&unknown),
            Err(Error::Yaml(_))
        ));
        let zero = HOME.replace(
            "0x6666666666666666666666666666666666666666",
            "0x0000000000000000000000000000000000000000",
        );
        assert!(matches!(
            HomeProxyConfig::from_yaml_str(&zero),
            Err(Error::ZeroAddress("messenger"))
        ));
        let multipliers = format!(
            "{}multipliers:\n  winner: 1\n  loser: 1\n  loser_appeal_period: 10001\n",
            FOREIGN
        );
        assert!(matches!(
            ForeignProxyConfig::from_yaml_str(&multipliers),
            Err(Error::InvalidMultiplier { .. })
        ));
        assert!(matches!(
            ForeignProxyConfig::from_file("/nonexistent/foreign.yaml"),
            Err(Error::Io(_))
        ));
    }
}
