// Subscribers that turn controller events into something a human can read.

use std::io::Write;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::mesi::{Core, Event, EventSink, Outcome, Stats};

pub const CSV_HEADER: &str = "cycle_core1,cycle_core2,misses_l1_core1,misses_l1_core2,misses_l2";

/// Writes one counters row per executed instruction.
pub struct CsvCounters<W: Write> {
    out: W,
    err: Option<std::io::Error>,
}

impl<W: Write> CsvCounters<W> {
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{}", CSV_HEADER).context("failed to write CSV header")?;
        Ok(Self { out, err: None })
    }

    fn row(&mut self, stats: &Stats) {
        if self.err.is_some() {
            return;
        }
        let res = writeln!(
            self.out,
            "{},{},{},{},{}",
            stats.cycles[0], stats.cycles[1], stats.l1_misses[0], stats.l1_misses[1], stats.l2_misses
        );
        if let Err(e) = res {
            self.err = Some(e);
        }
    }

    /// Flush and hand back the writer, surfacing the first write error.
    pub fn finish(mut self) -> Result<W> {
        if let Some(e) = self.err.take() {
            return Err(e).context("failed to write CSV row");
        }
        self.out.flush().context("failed to flush CSV output")?;
        Ok(self.out)
    }
}

/// Logs every event and optionally mirrors the counters to CSV.
pub struct Report<W: Write> {
    csv: Option<CsvCounters<W>>,
}

impl<W: Write> Report<W> {
    pub fn new(csv: Option<CsvCounters<W>>) -> Self {
        Report { csv }
    }
    pub fn finish(self) -> Result<Option<W>> {
        self.csv.map(CsvCounters::finish).transpose()
    }
}

impl<W: Write> EventSink for Report<W> {
    fn on_event(&mut self, event: &Event) {
        match event.outcome {
            Outcome::InvalidAction => warn!("{}", event),
            Outcome::InvalidState { .. } => error!("{}", event),
            _ => info!("{}", event),
        }
    }
    fn on_retired(&mut self, _core: Core, stats: &Stats) {
        if let Some(csv) = &mut self.csv {
            csv.row(stats);
        }
    }
}
