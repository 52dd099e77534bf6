use serde::{Deserialize, Serialize};

use crate::domain::{BenchmarkDeltas, BenchmarkIndex, HistoricalReference, HorizonValues};

/// Per-horizon index returns resolved in phase 1; read-only for the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReturns {
    pub ibovespa: Option<HorizonValues>,
    pub sp500: Option<HorizonValues>,
}

impl BenchmarkReturns {
    pub fn get(&self, index: BenchmarkIndex) -> Option<&HorizonValues> {
        match index {
            BenchmarkIndex::Ibovespa => self.ibovespa.as_ref(),
            BenchmarkIndex::Sp500 => self.sp500.as_ref(),
        }
    }

    pub fn set(&mut self, index: BenchmarkIndex, returns: HorizonValues) {
        match index {
            BenchmarkIndex::Ibovespa => self.ibovespa = Some(returns),
            BenchmarkIndex::Sp500 => self.sp500 = Some(returns),
        }
    }

    pub fn available(&self) -> usize {
        BenchmarkIndex::ALL
            .into_iter()
            .filter(|index| self.get(*index).is_some())
            .count()
    }
}

/// `instrument - index` per horizon; absent unless both sides are present.
pub fn relative_performance(instrument: &HorizonValues, index: &HorizonValues) -> HorizonValues {
    HorizonValues::from_fn(|horizon| {
        instrument
            .get(horizon)
            .zip(index.get(horizon))
            .map(|(own, benchmark)| own - benchmark)
    })
}

pub fn compare(history: &HistoricalReference, benchmarks: &BenchmarkReturns) -> BenchmarkDeltas {
    let delta = |index| {
        benchmarks
            .get(index)
            .map(|returns| relative_performance(&history.returns, returns))
    };

    BenchmarkDeltas {
        vs_ibovespa: delta(BenchmarkIndex::Ibovespa),
        vs_sp500: delta(BenchmarkIndex::Sp500),
    }
}
