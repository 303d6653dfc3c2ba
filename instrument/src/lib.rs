//! Capture `tracing` events into column tables for offline analysis.
//!
//! Every event target becomes a table; every field becomes a typed column.
//! The schema is whatever the emitting code logs. Rows that lack a field get
//! that column's default (0, false, empty string).
//!
//! ```ignore
//! let (_, rec) = instrument::capture(|| run_for_a_while(&mut state));
//! let prices = rec.f64_column("price_step", "base");
//! let trades = rec.table("trade").map(|t| t.to_dataframe());
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use polars::prelude::*;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Level, Metadata, Subscriber};

// ============================================================================
// Columns and tables
// ============================================================================

/// One field's values across every row of a table.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    F64(Vec<f64>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

/// A single field value as it arrives from an event.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    F64(f64),
    U64(u64),
    I64(i64),
    Bool(bool),
    Str(String),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::F64(v) => v.len(),
            Column::U64(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view; integer and bool columns are widened to f64.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::F64(v) => Some(v.clone()),
            Column::U64(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Column::I64(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Column::Bool(v) => Some(v.iter().map(|b| if *b { 1.0 } else { 0.0 }).collect()),
            Column::Str(_) => None,
        }
    }

    fn empty_like(value: &Value, rows: usize) -> Self {
        match value {
            Value::F64(_) => Column::F64(vec![0.0; rows]),
            Value::U64(_) => Column::U64(vec![0; rows]),
            Value::I64(_) => Column::I64(vec![0; rows]),
            Value::Bool(_) => Column::Bool(vec![false; rows]),
            Value::Str(_) => Column::Str(vec![String::new(); rows]),
        }
    }

    /// Append `value`, or the column default when the row lacks it or the
    /// type disagrees with the column's first observation.
    fn push(&mut self, value: Option<Value>) {
        match (self, value) {
            (Column::F64(v), Some(Value::F64(x))) => v.push(x),
            (Column::F64(v), Some(Value::U64(x))) => v.push(x as f64),
            (Column::F64(v), Some(Value::I64(x))) => v.push(x as f64),
            (Column::F64(v), _) => v.push(0.0),
            (Column::U64(v), Some(Value::U64(x))) => v.push(x),
            (Column::U64(v), _) => v.push(0),
            (Column::I64(v), Some(Value::I64(x))) => v.push(x),
            (Column::I64(v), Some(Value::U64(x))) => v.push(x as i64),
            (Column::I64(v), _) => v.push(0),
            (Column::Bool(v), Some(Value::Bool(x))) => v.push(x),
            (Column::Bool(v), _) => v.push(false),
            (Column::Str(v), Some(Value::Str(x))) => v.push(x),
            (Column::Str(v), _) => v.push(String::new()),
        }
    }
}

/// All events recorded under one target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    pub columns: BTreeMap<String, Column>,
    pub rows: usize,
}

impl EventTable {
    fn append(&mut self, mut row: BTreeMap<String, Value>) {
        for (name, value) in &row {
            if !self.columns.contains_key(name) {
                self.columns
                    .insert(name.clone(), Column::empty_like(value, self.rows));
            }
        }
        for (name, column) in self.columns.iter_mut() {
            column.push(row.remove(name));
        }
        self.rows += 1;
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| match col {
                Column::F64(v) => polars::prelude::Column::new(name.into(), v),
                Column::U64(v) => polars::prelude::Column::new(name.into(), v),
                Column::I64(v) => polars::prelude::Column::new(name.into(), v),
                Column::Bool(v) => polars::prelude::Column::new(name.into(), v),
                Column::Str(v) => polars::prelude::Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

/// Tables keyed by event target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub tables: BTreeMap<String, EventTable>,
}

impl Recording {
    pub fn table(&self, target: &str) -> Option<&EventTable> {
        self.tables.get(target)
    }

    /// Number of events seen for `target`.
    pub fn count(&self, target: &str) -> usize {
        self.table(target).map_or(0, |t| t.rows)
    }

    /// A numeric column, widened to f64; empty when absent.
    pub fn f64_column(&self, target: &str, field: &str) -> Vec<f64> {
        self.table(target)
            .and_then(|t| t.column(field))
            .and_then(Column::to_f64)
            .unwrap_or_default()
    }

    /// A string column; empty when absent or not a string column.
    pub fn str_column(&self, target: &str, field: &str) -> Vec<String> {
        match self.table(target).and_then(|t| t.column(field)) {
            Some(Column::Str(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn to_dataframes(&self) -> PolarsResult<BTreeMap<String, DataFrame>> {
        self.tables
            .iter()
            .map(|(name, table)| Ok((name.clone(), table.to_dataframe()?)))
            .collect()
    }

    /// Write one `{target}.parquet` per table into `dir`.
    pub fn write_parquet(&self, dir: &Path) -> PolarsResult<()> {
        std::fs::create_dir_all(dir).map_err(io_error)?;
        for (name, mut df) in self.to_dataframes()? {
            let file =
                std::fs::File::create(dir.join(format!("{name}.parquet"))).map_err(io_error)?;
            ParquetWriter::new(file).finish(&mut df)?;
        }
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> PolarsError {
    PolarsError::IO {
        error: e.into(),
        msg: None,
    }
}

// ============================================================================
// Subscriber
// ============================================================================

#[derive(Default)]
struct RowVisitor {
    row: BTreeMap<String, Value>,
}

impl RowVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        self.row.insert(field.name().to_string(), value);
    }
}

impl Visit for RowVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::F64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::U64(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::I64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::Str(format!("{value:?}")));
    }
}

/// Subscriber that appends every INFO-or-louder event to a shared
/// [`Recording`]. Spans are ignored.
#[derive(Clone, Default)]
pub struct TableCollector {
    recording: Arc<Mutex<Recording>>,
}

impl TableCollector {
    /// Take everything recorded so far, leaving the collector empty.
    pub fn take(&self) -> Recording {
        let mut guard = self
            .recording
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }
}

impl Subscriber for TableCollector {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut visitor = RowVisitor::default();
        event.record(&mut visitor);
        let target = event.metadata().target().to_string();
        let mut guard = self
            .recording
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.tables.entry(target).or_default().append(visitor.row);
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Run `f` with a [`TableCollector`] as the thread's default subscriber and
/// return its result together with everything it logged.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Recording) {
    let collector = TableCollector::default();
    let out = tracing::subscriber::with_default(collector.clone(), f);
    (out, collector.take())
}
