use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::Symbol;
use crate::ValidationError;

/// Broad asset class of a catalog instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    EquityBr,
    EquityUs,
    Commodity,
    Crypto,
    Fx,
}

impl InstrumentClass {
    pub const ALL: [Self; 5] = [
        Self::EquityBr,
        Self::EquityUs,
        Self::Commodity,
        Self::Crypto,
        Self::Fx,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EquityBr => "equity_br",
            Self::EquityUs => "equity_us",
            Self::Commodity => "commodity",
            Self::Crypto => "crypto",
            Self::Fx => "fx",
        }
    }
}

impl Display for InstrumentClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentClass {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|class| class.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidInstrumentClass {
                value: value.to_owned(),
            })
    }
}

/// Quote currency of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Brl,
    Usd,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Brl => "BRL",
            Self::Usd => "USD",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BRL" => Ok(Self::Brl),
            "USD" => Ok(Self::Usd),
            _ => Err(ValidationError::UnsupportedCurrency {
                value: value.to_owned(),
            }),
        }
    }
}

/// Immutable catalog entry describing one tracked instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    pub symbol: Symbol,
    pub name: String,
    pub sector: String,
    pub class: InstrumentClass,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl InstrumentDescriptor {
    pub fn new(
        symbol: &str,
        name: impl Into<String>,
        sector: impl Into<String>,
        class: InstrumentClass,
        currency: Currency,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            symbol: Symbol::parse(symbol)?,
            name: name.into(),
            sector: sector.into(),
            class,
            currency,
            unit: None,
        })
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn needs_fx(&self) -> bool {
        self.currency != Currency::Usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_class_names_leniently() {
        assert_eq!(
            "Equity-BR".parse::<InstrumentClass>().expect("class"),
            InstrumentClass::EquityBr
        );
        assert!("bond".parse::<InstrumentClass>().is_err());
    }

    #[test]
    fn brl_instruments_need_fx() {
        let petr = InstrumentDescriptor::new(
            "PETR4.SA",
            "Petrobras PN",
            "Petróleo",
            InstrumentClass::EquityBr,
            Currency::Brl,
        )
        .expect("descriptor");
        let gold = InstrumentDescriptor::new(
            "GC=F",
            "Ouro",
            "Metais Preciosos",
            InstrumentClass::Commodity,
            Currency::Usd,
        )
        .expect("descriptor")
        .with_unit("oz");

        assert!(petr.needs_fx());
        assert!(!gold.needs_fx());
        assert_eq!(gold.unit.as_deref(), Some("oz"));
    }
}
