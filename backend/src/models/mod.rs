//! Domain models for the HCE pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - A single spreadsheet value (null, number or text)
//! - [`CellKey`] - Hashable, ordered form of a non-null cell, used as a group key
//! - [`Table`] - Ordered columns plus rows, as loaded from a spreadsheet
//! - [`PivotTable`] - Grouped result with a row index and multi-level column headers
//! - [`TenureBucket`] - The five fixed tenure ranges
//! - [`columns`] - Column names of the POSDATA and PNAME files

pub mod columns;
pub mod table;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{ColumnError, ColumnResult};

pub use table::{PivotTable, Table};

// =============================================================================
// Cell
// =============================================================================

/// A single cell value.
///
/// Spreadsheet numbers, integers and date serials are all `Number`.
/// An empty cell (or empty string) is `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell.
    ///
    /// Text that parses as a number is accepted (CSV uploads and xlsx files
    /// with numbers stored as text). Any other text fails with
    /// [`ColumnError::NotNumeric`] naming `column`.
    pub fn as_number(&self, column: &str) -> ColumnResult<Option<f64>> {
        match self {
            Cell::Null => Ok(None),
            Cell::Number(n) => Ok(Some(*n)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| ColumnError::NotNumeric {
                        column: column.to_string(),
                        value: s.clone(),
                    })
            }
        }
    }

    /// Group key for this cell, `None` for nulls (null keys never group).
    pub fn key(&self) -> Option<CellKey> {
        match self {
            Cell::Null => None,
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) => Some(CellKey::Number(NumberKey::new(*n))),
            Cell::Text(s) => Some(CellKey::Text(s.clone())),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<Option<f64>> for Cell {
    fn from(n: Option<f64>) -> Self {
        n.map_or(Cell::Null, Cell::Number)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

// =============================================================================
// Group keys
// =============================================================================

/// A finite number usable as a map key.
#[derive(Debug, Clone, Copy)]
pub struct NumberKey(f64);

impl NumberKey {
    fn new(n: f64) -> Self {
        // -0.0 and 0.0 are the same group
        Self(if n == 0.0 { 0.0 } else { n })
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for NumberKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for NumberKey {}

impl Hash for NumberKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for NumberKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumberKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Non-null cell used as a group or join key.
///
/// Numbers sort before text; numbers sort numerically, text lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    Number(NumberKey),
    Text(String),
}

impl From<CellKey> for Cell {
    fn from(key: CellKey) -> Self {
        match key {
            CellKey::Number(n) => Cell::Number(n.value()),
            CellKey::Text(s) => Cell::Text(s),
        }
    }
}

impl From<&CellKey> for Cell {
    fn from(key: &CellKey) -> Self {
        key.clone().into()
    }
}

// =============================================================================
// Tenure
// =============================================================================

/// Tenure ranges, left-inclusive: [0,1), [1,3), [3,6), [6,11), [11,∞).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenureBucket {
    UnderOneYear,
    OneToTwoYears,
    ThreeToFiveYears,
    SixToTenYears,
    OverTenYears,
}

impl TenureBucket {
    pub const ALL: [TenureBucket; 5] = [
        TenureBucket::UnderOneYear,
        TenureBucket::OneToTwoYears,
        TenureBucket::ThreeToFiveYears,
        TenureBucket::SixToTenYears,
        TenureBucket::OverTenYears,
    ];

    /// Bucket for a tenure in years. Negative (or NaN) tenure has no bucket.
    pub fn from_tenure(years: f64) -> Option<Self> {
        if years.is_nan() || years < 0.0 {
            None
        } else if years < 1.0 {
            Some(TenureBucket::UnderOneYear)
        } else if years < 3.0 {
            Some(TenureBucket::OneToTwoYears)
        } else if years < 6.0 {
            Some(TenureBucket::ThreeToFiveYears)
        } else if years < 11.0 {
            Some(TenureBucket::SixToTenYears)
        } else {
            Some(TenureBucket::OverTenYears)
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TenureBucket::UnderOneYear => "<1Y",
            TenureBucket::OneToTwoYears => "1-2Y",
            TenureBucket::ThreeToFiveYears => "3-5Y",
            TenureBucket::SixToTenYears => "6-10Y",
            TenureBucket::OverTenYears => ">10Y",
        }
    }
}

impl fmt::Display for TenureBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
