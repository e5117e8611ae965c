// Reads memory traces: one `<hex address> <mode>` pair per line.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::mesi::{Addr, Instr, Mode};

pub const DEFAULT_TRACE_CORE1: &str = "mem_trace_core1.txt";
pub const DEFAULT_TRACE_CORE2: &str = "mem_trace_core2.txt";

/// Parse one trace line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Instr>> {
    let mut parts = line.split_whitespace();
    let addr = match parts.next() {
        Some(addr) => addr,
        None => return Ok(None),
    };
    let mode = parts.next().ok_or_else(|| anyhow!("missing access mode after address '{}'", addr))?;
    let digits = addr.strip_prefix("0x").or_else(|| addr.strip_prefix("0X")).unwrap_or(addr);
    let addr = u64::from_str_radix(digits, 16)
        .with_context(|| format!("invalid hexadecimal address '{}'", addr))?;
    Ok(Some(Instr { addr: Addr(addr), mode: Mode::parse(mode) }))
}

/// Iterator over the instructions of one trace. The first error ends the
/// stream.
pub struct TraceReader<R> {
    name: String,
    lines: Lines<R>,
    line_no: usize,
    failed: bool,
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open trace {}", path.display()))?;
        Ok(Self::new(path.display().to_string(), BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        TraceReader { name: name.into(), lines: reader.lines(), line_no: 0, failed: false }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<Instr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let parsed = line
                .context("read error")
                .and_then(|l| parse_line(&l))
                .with_context(|| format!("{}:{}", self.name, self.line_no));
            match parsed {
                Ok(Some(instr)) => return Some(Ok(instr)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
