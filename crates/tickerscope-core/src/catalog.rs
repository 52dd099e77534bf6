use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::domain::{Currency, InstrumentClass, InstrumentDescriptor, Symbol};
use crate::ValidationError;

type CatalogRow = (
    &'static str,
    &'static str,
    &'static str,
    InstrumentClass,
    Currency,
    Option<&'static str>,
);

/// Tracked universe: Ibovespa and US equities, precious metals, crypto and USD/BRL.
const DEFAULT_INSTRUMENTS: &[CatalogRow] = &[
    ("BBAS3.SA", "Banco do Brasil", "Bancário", InstrumentClass::EquityBr, Currency::Brl, None),
    ("BBDC3.SA", "Bradesco ON", "Bancário", InstrumentClass::EquityBr, Currency::Brl, None),
    ("BBDC4.SA", "Bradesco PN", "Bancário", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ITUB3.SA", "Itaú Unibanco ON", "Bancário", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ITUB4.SA", "Itaú Unibanco PN", "Bancário", InstrumentClass::EquityBr, Currency::Brl, None),
    ("SANB11.SA", "Santander Brasil", "Bancário", InstrumentClass::EquityBr, Currency::Brl, None),
    ("BPAC11.SA", "BTG Pactual", "Bancário", InstrumentClass::EquityBr, Currency::Brl, None),
    ("BBSE3.SA", "BB Seguridade", "Seguros", InstrumentClass::EquityBr, Currency::Brl, None),
    ("IRBR3.SA", "IRB Brasil RE", "Seguros", InstrumentClass::EquityBr, Currency::Brl, None),
    ("B3SA3.SA", "B3", "Serviços Financeiros", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ITSA4.SA", "Itaúsa PN", "Holding", InstrumentClass::EquityBr, Currency::Brl, None),
    ("PETR3.SA", "Petrobras ON", "Petróleo e Gás", InstrumentClass::EquityBr, Currency::Brl, None),
    ("PETR4.SA", "Petrobras PN", "Petróleo e Gás", InstrumentClass::EquityBr, Currency::Brl, None),
    ("PRIO3.SA", "PetroRio", "Petróleo e Gás", InstrumentClass::EquityBr, Currency::Brl, None),
    ("RECV3.SA", "PetroReconcavo", "Petróleo e Gás", InstrumentClass::EquityBr, Currency::Brl, None),
    ("UGPA3.SA", "Ultrapar", "Petróleo e Gás", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CSAN3.SA", "Cosan", "Petróleo e Gás", InstrumentClass::EquityBr, Currency::Brl, None),
    ("VBBR3.SA", "Vibra Energia", "Petróleo e Gás", InstrumentClass::EquityBr, Currency::Brl, None),
    ("VALE3.SA", "Vale", "Mineração", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CSNA3.SA", "CSN", "Siderurgia", InstrumentClass::EquityBr, Currency::Brl, None),
    ("GGBR4.SA", "Gerdau PN", "Siderurgia", InstrumentClass::EquityBr, Currency::Brl, None),
    ("GOAU4.SA", "Metalúrgica Gerdau PN", "Siderurgia", InstrumentClass::EquityBr, Currency::Brl, None),
    ("USIM5.SA", "Usiminas PNA", "Siderurgia", InstrumentClass::EquityBr, Currency::Brl, None),
    ("BRAP4.SA", "Bradespar PN", "Mineração", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CMIN3.SA", "CSN Mineração", "Mineração", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ELET3.SA", "Eletrobras ON", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ELET6.SA", "Eletrobras PNB", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("EGIE3.SA", "Engie Brasil", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("EQTL3.SA", "Equatorial", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CPFE3.SA", "CPFL Energia", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CMIG4.SA", "Cemig PN", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ENGI11.SA", "Energisa", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("TAEE11.SA", "Taesa", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CPLE3.SA", "Copel ON", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("AURE3.SA", "Auren Energia", "Energia Elétrica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("SBSP3.SA", "Sabesp", "Saneamento", InstrumentClass::EquityBr, Currency::Brl, None),
    ("VIVT3.SA", "Telefônica Brasil", "Telecomunicações", InstrumentClass::EquityBr, Currency::Brl, None),
    ("TIMS3.SA", "TIM", "Telecomunicações", InstrumentClass::EquityBr, Currency::Brl, None),
    ("OIBR3.SA", "Oi ON", "Telecomunicações", InstrumentClass::EquityBr, Currency::Brl, None),
    ("MGLU3.SA", "Magazine Luiza", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("LREN3.SA", "Lojas Renner", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("AMER3.SA", "Americanas", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("BHIA3.SA", "Casas Bahia", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("PETZ3.SA", "Petz", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("AZZA3.SA", "Azzas 2154", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("LWSA3.SA", "Locaweb", "Tecnologia", InstrumentClass::EquityBr, Currency::Brl, None),
    ("GMAT3.SA", "Grupo Mateus", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ASAI3.SA", "Assaí", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("PCAR3.SA", "Pão de Açúcar", "Varejo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ABEV3.SA", "Ambev", "Bebidas", InstrumentClass::EquityBr, Currency::Brl, None),
    ("BEEF3.SA", "Minerva", "Alimentos", InstrumentClass::EquityBr, Currency::Brl, None),
    ("MDIA3.SA", "M. Dias Branco", "Alimentos", InstrumentClass::EquityBr, Currency::Brl, None),
    ("SMTO3.SA", "São Martinho", "Açúcar e Álcool", InstrumentClass::EquityBr, Currency::Brl, None),
    ("RDOR3.SA", "Rede D'Or", "Saúde", InstrumentClass::EquityBr, Currency::Brl, None),
    ("HAPV3.SA", "Hapvida", "Saúde", InstrumentClass::EquityBr, Currency::Brl, None),
    ("FLRY3.SA", "Fleury", "Saúde", InstrumentClass::EquityBr, Currency::Brl, None),
    ("RADL3.SA", "Raia Drogasil", "Saúde", InstrumentClass::EquityBr, Currency::Brl, None),
    ("HYPE3.SA", "Hypera", "Saúde", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CYRE3.SA", "Cyrela", "Construção", InstrumentClass::EquityBr, Currency::Brl, None),
    ("EZTC3.SA", "EZTEC", "Construção", InstrumentClass::EquityBr, Currency::Brl, None),
    ("MRVE3.SA", "MRV", "Construção", InstrumentClass::EquityBr, Currency::Brl, None),
    ("MULT3.SA", "Multiplan", "Shoppings", InstrumentClass::EquityBr, Currency::Brl, None),
    ("IGTI11.SA", "Iguatemi", "Shoppings", InstrumentClass::EquityBr, Currency::Brl, None),
    ("WEGE3.SA", "WEG", "Industrial", InstrumentClass::EquityBr, Currency::Brl, None),
    ("EMBR3.SA", "Embraer", "Aeronáutica", InstrumentClass::EquityBr, Currency::Brl, None),
    ("RAIL3.SA", "Rumo", "Logística", InstrumentClass::EquityBr, Currency::Brl, None),
    ("ECOR3.SA", "Ecorodovias", "Concessões", InstrumentClass::EquityBr, Currency::Brl, None),
    ("RENT3.SA", "Localiza", "Locação de Veículos", InstrumentClass::EquityBr, Currency::Brl, None),
    ("MOVI3.SA", "Movida", "Locação de Veículos", InstrumentClass::EquityBr, Currency::Brl, None),
    ("SUZB3.SA", "Suzano", "Papel e Celulose", InstrumentClass::EquityBr, Currency::Brl, None),
    ("KLBN11.SA", "Klabin", "Papel e Celulose", InstrumentClass::EquityBr, Currency::Brl, None),
    ("AZUL4.SA", "Azul", "Aviação", InstrumentClass::EquityBr, Currency::Brl, None),
    ("YDUQ3.SA", "Yduqs", "Educação", InstrumentClass::EquityBr, Currency::Brl, None),
    ("COGN3.SA", "Cogna", "Educação", InstrumentClass::EquityBr, Currency::Brl, None),
    ("TOTS3.SA", "Totvs", "Tecnologia", InstrumentClass::EquityBr, Currency::Brl, None),
    ("CVCB3.SA", "CVC", "Turismo", InstrumentClass::EquityBr, Currency::Brl, None),
    ("SLCE3.SA", "SLC Agrícola", "Agronegócio", InstrumentClass::EquityBr, Currency::Brl, None),
    ("AAPL", "Apple", "Tecnologia", InstrumentClass::EquityUs, Currency::Usd, None),
    ("MSFT", "Microsoft", "Tecnologia", InstrumentClass::EquityUs, Currency::Usd, None),
    ("GOOGL", "Alphabet (Google)", "Tecnologia", InstrumentClass::EquityUs, Currency::Usd, None),
    ("AMZN", "Amazon", "Tecnologia", InstrumentClass::EquityUs, Currency::Usd, None),
    ("META", "Meta (Facebook)", "Tecnologia", InstrumentClass::EquityUs, Currency::Usd, None),
    ("NVDA", "NVIDIA", "Tecnologia", InstrumentClass::EquityUs, Currency::Usd, None),
    ("TSLA", "Tesla", "Automotivo", InstrumentClass::EquityUs, Currency::Usd, None),
    ("JPM", "JPMorgan Chase", "Bancário", InstrumentClass::EquityUs, Currency::Usd, None),
    ("BAC", "Bank of America", "Bancário", InstrumentClass::EquityUs, Currency::Usd, None),
    ("WFC", "Wells Fargo", "Bancário", InstrumentClass::EquityUs, Currency::Usd, None),
    ("GS", "Goldman Sachs", "Bancário", InstrumentClass::EquityUs, Currency::Usd, None),
    ("JNJ", "Johnson & Johnson", "Saúde", InstrumentClass::EquityUs, Currency::Usd, None),
    ("UNH", "UnitedHealth", "Saúde", InstrumentClass::EquityUs, Currency::Usd, None),
    ("PFE", "Pfizer", "Farmacêutico", InstrumentClass::EquityUs, Currency::Usd, None),
    ("KO", "Coca-Cola", "Bebidas", InstrumentClass::EquityUs, Currency::Usd, None),
    ("PEP", "PepsiCo", "Bebidas", InstrumentClass::EquityUs, Currency::Usd, None),
    ("MCD", "McDonald's", "Restaurantes", InstrumentClass::EquityUs, Currency::Usd, None),
    ("WMT", "Walmart", "Varejo", InstrumentClass::EquityUs, Currency::Usd, None),
    ("XOM", "Exxon Mobil", "Petróleo e Gás", InstrumentClass::EquityUs, Currency::Usd, None),
    ("CVX", "Chevron", "Petróleo e Gás", InstrumentClass::EquityUs, Currency::Usd, None),
    ("GC=F", "Ouro", "Metal Precioso", InstrumentClass::Commodity, Currency::Usd, Some("oz")),
    ("SI=F", "Prata", "Metal Precioso", InstrumentClass::Commodity, Currency::Usd, Some("oz")),
    ("PL=F", "Platina", "Metal Precioso", InstrumentClass::Commodity, Currency::Usd, Some("oz")),
    ("PA=F", "Paládio", "Metal Precioso", InstrumentClass::Commodity, Currency::Usd, Some("oz")),
    ("BTC-USD", "Bitcoin", "Criptomoeda", InstrumentClass::Crypto, Currency::Usd, Some("unidade")),
    ("ETH-USD", "Ethereum", "Criptomoeda", InstrumentClass::Crypto, Currency::Usd, Some("unidade")),
    ("USDBRL=X", "Dólar/Real", "Câmbio", InstrumentClass::Fx, Currency::Brl, None),
];

/// Immutable, duplicate-free set of instruments for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentCatalog {
    instruments: Vec<InstrumentDescriptor>,
}

impl InstrumentCatalog {
    pub fn new(instruments: Vec<InstrumentDescriptor>) -> Result<Self, ValidationError> {
        let mut seen = BTreeSet::new();
        for instrument in &instruments {
            if !seen.insert(instrument.symbol.clone()) {
                return Err(ValidationError::DuplicateSymbol {
                    symbol: instrument.symbol.to_string(),
                });
            }
        }

        Ok(Self { instruments })
    }

    /// Built-in catalog tracked by `tickerscope run`.
    pub fn default_catalog() -> Result<Self, ValidationError> {
        let instruments = DEFAULT_INSTRUMENTS
            .iter()
            .map(|(symbol, name, sector, class, currency, unit)| {
                let descriptor =
                    InstrumentDescriptor::new(symbol, *name, *sector, *class, *currency)?;
                Ok(match unit {
                    Some(unit) => descriptor.with_unit(*unit),
                    None => descriptor,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        debug!(instruments = instruments.len(), "loaded default catalog");
        Self::new(instruments)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentDescriptor> {
        self.instruments.iter()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&InstrumentDescriptor> {
        self.instruments
            .iter()
            .find(|instrument| &instrument.symbol == symbol)
    }

    /// True when any instrument must be converted to USD through the FX snapshot.
    pub fn requires_fx(&self) -> bool {
        self.instruments.iter().any(InstrumentDescriptor::needs_fx)
    }

    /// Sub-catalog restricted to the given classes.
    pub fn filter_classes(&self, classes: &[InstrumentClass]) -> Self {
        Self {
            instruments: self
                .instruments
                .iter()
                .filter(|instrument| classes.contains(&instrument.class))
                .cloned()
                .collect(),
        }
    }

    /// Sub-catalog with exactly the given symbols, in catalog order.
    pub fn select(&self, symbols: &[Symbol]) -> Result<Self, ValidationError> {
        if let Some(unknown) = symbols.iter().find(|symbol| self.get(symbol).is_none()) {
            return Err(ValidationError::UnknownCatalogSymbol {
                symbol: unknown.to_string(),
            });
        }

        Ok(Self {
            instruments: self
                .instruments
                .iter()
                .filter(|instrument| symbols.contains(&instrument.symbol))
                .cloned()
                .collect(),
        })
    }
}

impl<'a> IntoIterator for &'a InstrumentCatalog {
    type Item = &'a InstrumentDescriptor;
    type IntoIter = std::slice::Iter<'a, InstrumentDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.instruments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_class() {
        let catalog = InstrumentCatalog::default_catalog().expect("static catalog is valid");

        assert_eq!(catalog.len(), 104);
        for class in InstrumentClass::ALL {
            assert!(
                catalog.iter().any(|instrument| instrument.class == class),
                "missing class {class}"
            );
        }
        assert!(catalog.requires_fx());
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let entry = InstrumentDescriptor::new(
            "VALE3.SA",
            "Vale",
            "Mineração",
            InstrumentClass::EquityBr,
            Currency::Brl,
        )
        .expect("descriptor");

        let err = InstrumentCatalog::new(vec![entry.clone(), entry]).expect_err("must fail");
        assert!(matches!(err, ValidationError::DuplicateSymbol { .. }));
    }

    #[test]
    fn usd_only_selection_does_not_require_fx() {
        let catalog = InstrumentCatalog::default_catalog().expect("static catalog is valid");
        let us = catalog.filter_classes(&[InstrumentClass::EquityUs, InstrumentClass::Crypto]);

        assert_eq!(us.len(), 22);
        assert!(!us.requires_fx());
    }

    #[test]
    fn select_rejects_unknown_symbols() {
        let catalog = InstrumentCatalog::default_catalog().expect("static catalog is valid");
        let known = Symbol::parse("petr4.sa").expect("symbol");
        let unknown = Symbol::parse("ZZZZ3.SA").expect("symbol");

        assert_eq!(catalog.select(&[known.clone()]).expect("known").len(), 1);
        let err = catalog.select(&[known, unknown]).expect_err("must fail");
        assert!(matches!(err, ValidationError::UnknownCatalogSymbol { .. }));
    }
}
