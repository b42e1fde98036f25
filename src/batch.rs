//! # Batch Printing
//!
//! Prints one label per data row over a single connection and reports a
//! per-row outcome.
//!
//! ## Row Pipeline
//!
//! ```text
//! row ─resolve─▶ ResolvedRow ─render─▶ Bitmap ─rasterize─▶ RasterLines ─driver─▶ printer
//! ```
//!
//! Rendering runs one row ahead of transmission, so the driver always knows
//! whether the label it is about to print is the last one that will reach the
//! printer.
//!
//! ## Failure Policy
//!
//! | Failure | Row | Later rows |
//! |---------|-----|------------|
//! | Render (bad value, does not fit) | error | continue |
//! | Transport or device | error | all error, same message |
//! | Connect | all error | |
//!
//! The connection is closed exactly once before [`Batch::run`] returns.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LabelError, PrintError, RenderError};
use crate::layout::{self, Barcoders, DataRow, FieldMapping, LabelSpec, SymbolSource};
use crate::protocol::{Driver, JobOptions, PrinterStatus};
use crate::raster::{self, RasterLine};
use crate::transport::{self, Transport, TransportTarget};

// ============================================================================
// JOB FILE
// ============================================================================

/// A complete print job as read from JSON.
///
/// ```
/// use ptlabel::batch::JobFile;
///
/// let job = JobFile::from_json(r#"{
///     "label": {"tape_width_mm": 12, "fields": [{"value": "{{name}}"}]},
///     "rows": [{"name": "Ada"}, {"name": "Grace"}],
///     "options": {"continuous": true}
/// }"#).unwrap();
/// assert_eq!(job.rows.len(), 2);
/// assert!(job.options.continuous);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    pub label: LabelSpec,
    #[serde(default)]
    pub rows: Vec<DataRow>,
    #[serde(default)]
    pub mapping: FieldMapping,
    #[serde(default)]
    pub options: JobOptions,
}

impl JobFile {
    pub fn from_json(text: &str) -> Result<Self, LabelError> {
        let job: JobFile = serde_json::from_str(text)
            .map_err(|e| LabelError::Config(format!("invalid job file: {}", e)))?;
        job.label.validate()?;
        Ok(job)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The rows to print; a job without rows prints its template once.
    pub fn effective_rows(&self) -> Vec<DataRow> {
        if self.rows.is_empty() {
            vec![DataRow::new()]
        } else {
            self.rows.clone()
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
}

/// Outcome of one data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowReport {
    /// 0-based row index
    pub index: usize,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RowReport {
    pub fn success(index: usize) -> Self {
        Self {
            index,
            outcome: Outcome::Success,
            message: None,
        }
    }

    pub fn error(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            outcome: Outcome::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Totals {
    pub total: usize,
    pub printed: usize,
    pub failed: usize,
}

/// Per-row results of a batch, in row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintResult {
    pub rows: Vec<RowReport>,
    pub totals: Totals,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Last status snapshot from the printer
    pub status: PrinterStatus,
}

/// Collects row reports and forwards each to the progress callback.
struct ResultBuilder<'p> {
    started_at: DateTime<Utc>,
    rows: Vec<RowReport>,
    progress: &'p mut dyn FnMut(&RowReport),
}

impl<'p> ResultBuilder<'p> {
    fn new(progress: &'p mut dyn FnMut(&RowReport)) -> Self {
        Self {
            started_at: Utc::now(),
            rows: Vec::new(),
            progress,
        }
    }

    fn push(&mut self, report: RowReport) {
        (self.progress)(&report);
        self.rows.push(report);
    }

    /// Mark rows `from..total` as failed with one message.
    fn fail_rest(&mut self, from: usize, total: usize, message: &str) {
        for index in from..total {
            self.push(RowReport::error(index, message));
        }
    }

    fn finish(self, status: PrinterStatus) -> PrintResult {
        let printed = self.rows.iter().filter(|r| r.is_success()).count();
        let totals = Totals {
            total: self.rows.len(),
            printed,
            failed: self.rows.len() - printed,
        };
        log::info!(
            "Batch finished: {} printed, {} failed of {}",
            totals.printed,
            totals.failed,
            totals.total
        );
        PrintResult {
            rows: self.rows,
            totals,
            started_at: self.started_at,
            finished_at: Utc::now(),
            status,
        }
    }
}

// ============================================================================
// BATCH
// ============================================================================

/// # Batch Job
///
/// ```
/// use ptlabel::batch::Batch;
/// use ptlabel::layout::{DataRow, FieldSpec, LabelSpec};
/// use ptlabel::printer::TapeWidth;
/// use ptlabel::transport::MockTransport;
///
/// let spec = LabelSpec::new(TapeWidth::Mm12, vec![FieldSpec::text("{{name}}")]);
/// let rows: Vec<DataRow> = vec![[("name".to_string(), "Ada".to_string())].into()];
///
/// let result = Batch::new(&spec, &rows).run(MockTransport::new(), |_| {});
/// assert_eq!(result.totals.printed, 1);
/// ```
pub struct Batch<'a> {
    spec: &'a LabelSpec,
    rows: &'a [DataRow],
    mapping: FieldMapping,
    options: JobOptions,
    symbols: &'a dyn SymbolSource,
}

impl<'a> Batch<'a> {
    pub fn new(spec: &'a LabelSpec, rows: &'a [DataRow]) -> Self {
        Self {
            spec,
            rows,
            mapping: FieldMapping::new(),
            options: JobOptions::default(),
            symbols: &Barcoders,
        }
    }

    pub fn mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn symbols(mut self, symbols: &'a dyn SymbolSource) -> Self {
        self.symbols = symbols;
        self
    }

    /// Resolve, render and rasterize one row.
    pub fn render_row(&self, index: usize) -> Result<Vec<RasterLine>, RenderError> {
        let row = self.rows.get(index).cloned().unwrap_or_default();
        let resolved = layout::resolve(self.spec, &row, &self.mapping);
        let bitmap = layout::render_label(self.spec, &resolved, self.symbols)?;
        raster::rasterize(&bitmap, self.spec.tape, self.options.compression)
    }

    /// Connect to `target` and print every row.
    pub fn run_on(&self, target: &TransportTarget, progress: impl FnMut(&RowReport)) -> PrintResult {
        let mut progress = progress;
        if let Err(e) = self.spec.validate() {
            return self.fail_all(&e.to_string(), &mut progress);
        }
        match transport::connect(target) {
            Ok(connection) => self.run(connection, progress),
            Err(e) => {
                log::error!("Cannot connect to {}: {}", target, e);
                self.fail_all(&e.to_string(), &mut progress)
            }
        }
    }

    /// Print every row over an already-open transport, which is closed
    /// before returning.
    pub fn run<T: Transport>(&self, transport: T, progress: impl FnMut(&RowReport)) -> PrintResult {
        let mut progress = progress;
        let mut results = ResultBuilder::new(&mut progress);
        let total = self.rows.len();

        if let Err(e) = self.spec.validate() {
            drop(transport::Session::new(transport));
            results.fail_rest(0, total, &e.to_string());
            return results.finish(PrinterStatus::Unavailable);
        }

        let mut driver = match Driver::new(transport, self.spec.tape, self.options.clone()) {
            Ok(driver) => driver,
            Err(e) => {
                results.fail_rest(0, total, &e.to_string());
                return results.finish(PrinterStatus::Unavailable);
            }
        };
        log::info!("Printing {} row(s) on {} tape", total, self.spec.tape);

        if let Err(e) = driver.initialize() {
            log::error!("Printer initialization failed: {}", e);
            results.fail_rest(0, total, &e.to_string());
            return self.close(driver, results);
        }

        // Label rendered but not yet sent, and render failures queued behind it.
        let mut pending: Option<(usize, Vec<RasterLine>)> = None;
        let mut deferred: Vec<RowReport> = Vec::new();
        let mut raster_mode = false;

        for index in 0..total {
            let lines = match self.render_row(index) {
                Ok(lines) => lines,
                Err(e) => {
                    let report = RowReport::error(index, e.to_string());
                    log::warn!("{}", PrintError::new(index, e));
                    if pending.is_some() {
                        deferred.push(report);
                    } else {
                        results.push(report);
                    }
                    continue;
                }
            };

            if let Some((sent, prev)) = pending.replace((index, lines)) {
                if let Err(message) = self.send(&mut driver, &mut raster_mode, &prev, false) {
                    results.push(RowReport::error(sent, message.clone()));
                    for report in deferred.drain(..) {
                        results.push(report);
                    }
                    results.fail_rest(index, total, &message);
                    return self.close(driver, results);
                }
                results.push(RowReport::success(sent));
                for report in deferred.drain(..) {
                    results.push(report);
                }
            }
        }

        if let Some((sent, lines)) = pending.take() {
            match self.send(&mut driver, &mut raster_mode, &lines, true) {
                Ok(()) => results.push(RowReport::success(sent)),
                Err(message) => {
                    results.push(RowReport::error(sent, message));
                    for report in deferred.drain(..) {
                        results.push(report);
                    }
                    return self.close(driver, results);
                }
            }
        }
        for report in deferred.drain(..) {
            results.push(report);
        }

        if let Err(e) = driver.finalize() {
            log::warn!("Final status request failed: {}", e);
        }
        self.close(driver, results)
    }

    fn send<T: Transport>(
        &self,
        driver: &mut Driver<T>,
        raster_mode: &mut bool,
        lines: &[RasterLine],
        last: bool,
    ) -> Result<(), String> {
        if !*raster_mode {
            driver.enter_raster_mode().map_err(|e| e.to_string())?;
            *raster_mode = true;
        }
        driver.print_label(lines, last).map_err(|e| {
            log::error!("Printing stopped: {}", e);
            e.to_string()
        })
    }

    fn close<T: Transport>(&self, driver: Driver<T>, results: ResultBuilder<'_>) -> PrintResult {
        let status = driver.status().clone();
        if let Err(e) = driver.finish() {
            log::warn!("Closing printer connection failed: {}", e);
        }
        results.finish(status)
    }

    fn fail_all(&self, message: &str, progress: &mut dyn FnMut(&RowReport)) -> PrintResult {
        let mut results = ResultBuilder::new(progress);
        results.fail_rest(0, self.rows.len(), message);
        results.finish(PrinterStatus::Unavailable)
    }
}

/// Connect, initialize, read the status and disconnect.
pub fn query_status(target: &TransportTarget, options: &JobOptions) -> Result<PrinterStatus, LabelError> {
    let connection = transport::connect(target)?;
    let mut driver = Driver::new(connection, Default::default(), options.clone())?;
    let status = driver.initialize()?;
    driver.finish()?;
    Ok(status)
}

// ============================================================================
// TESTS
// ============================================================================
