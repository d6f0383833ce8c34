//! RDPAC report: eleven fixed aggregations over cleaned POSDATA.
//!
//! Every table is keyed by `SMI_CODE` on the rows, crossed with one or two
//! PNAME dimensions unstacked into the columns.
//!
//! ```text
//!  #  sheet                          dims                              value
//!  1  By Function                    Function                          count OBJECTID + Headcount
//!  2  By Subfunction                 Sub-Function                      count OBJECTID
//!  3  By Career Level by PC          Career Level by PC                count OBJECTID
//!  4  By Subfunction plus Sales      Sub-Function × CL-Sales           count OBJECTID
//!  5  By Function plus CL            Function × Career Level by PC     count OBJECTID
//!  6  COMP                           (none)                            five named aggregates
//!  7  By Function plus Incent        Function                          mean INCENT_TGT
//!  8  By cl plus Bon                 CL-Sales                          mean BON_TGT
//!  9  By SubFunction cl plus Incent  Sub-Function × CL-Sales           mean INCENT_TGT
//! 10  By Function PC plus Bon        Function × Career Level by PC     mean BON_TPER
//! 11  By SubFunction PC plus Incent  Sub-Function × Career Level by PC mean INCENT_TPER, BON_TPER
//! ```

use serde::Serialize;

use crate::error::ColumnResult;
use crate::models::columns::*;
use crate::models::{Cell, PivotTable, Table};

use super::pivot::{pivot, summarize, Aggregation};

/// Sheet names of the report, in output order.
pub const RDPAC_SHEET_NAMES: [&str; 11] = [
    "By Function",
    "By Subfunction",
    "By Career Level by PC",
    "By Subfunction plus Sales",
    "By Function plus CL",
    "COMP",
    "By Function plus Incent",
    "By cl plus Bon",
    "By SubFunction cl plus Incent",
    "By Function PC plus Bon",
    "By SubFunction PC plus Incent",
];

/// Row-wise total column appended to the "By Function" table.
pub const HEADCOUNT: &str = "Headcount";

/// The eleven report tables, in [`RDPAC_SHEET_NAMES`] order.
#[derive(Debug, Clone, Serialize)]
pub struct RdpacReport {
    pub tables: Vec<PivotTable>,
}

impl RdpacReport {
    pub fn sheet_names(&self) -> &'static [&'static str] {
        &RDPAC_SHEET_NAMES
    }

    /// (sheet name, table) pairs in output order.
    pub fn sheets(&self) -> impl Iterator<Item = (&'static str, &PivotTable)> {
        RDPAC_SHEET_NAMES.iter().copied().zip(self.tables.iter())
    }

    pub fn get(&self, sheet: &str) -> Option<&PivotTable> {
        self.sheets().find(|(name, _)| *name == sheet).map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Build the eleven RDPAC tables from cleaned POSDATA.
pub fn group_rdpac(cleaned: &Table) -> ColumnResult<RdpacReport> {
    let mut by_function = count(cleaned, &[FUNCTION])?;
    add_headcount(&mut by_function);

    let comp = summarize(
        cleaned,
        SMI_CODE,
        &[
            ("comp3act_sum", CMP3ACT, Aggregation::Sum),
            ("comp3tgt_mean", CMP3TGT_NEW, Aggregation::Mean),
            ("comp1_mean", CMP1, Aggregation::Mean),
            ("comp5_mean", CMP5, Aggregation::Mean),
            ("incentgt_sum", INCENT_TGT, Aggregation::Sum),
        ],
    )?;

    let tables = vec![
        by_function,
        count(cleaned, &[SUB_FUNCTION])?,
        count(cleaned, &[CAREER_LEVEL_PC])?,
        count(cleaned, &[SUB_FUNCTION, CL_SALES])?,
        count(cleaned, &[FUNCTION, CAREER_LEVEL_PC])?,
        comp,
        mean(cleaned, &[FUNCTION], &[INCENT_TGT])?,
        mean(cleaned, &[CL_SALES], &[BON_TGT])?,
        mean(cleaned, &[SUB_FUNCTION, CL_SALES], &[INCENT_TGT])?,
        mean(cleaned, &[FUNCTION, CAREER_LEVEL_PC], &[BON_TPER])?,
        mean(cleaned, &[SUB_FUNCTION, CAREER_LEVEL_PC], &[INCENT_TPER, BON_TPER])?,
    ];

    debug_assert_eq!(tables.len(), RDPAC_SHEET_NAMES.len());
    Ok(RdpacReport { tables })
}

/// Headcount of `OBJECTID` per SMI_CODE and `dims`.
fn count(table: &Table, dims: &[&str]) -> ColumnResult<PivotTable> {
    pivot(table, SMI_CODE, dims, &[OBJECT_ID], Aggregation::Count)
}

fn mean(table: &Table, dims: &[&str], values: &[&str]) -> ColumnResult<PivotTable> {
    pivot(table, SMI_CODE, dims, values, Aggregation::Mean)
}

/// Append `Headcount`: sum of the non-null counts on each row.
fn add_headcount(table: &mut PivotTable) {
    let totals = table
        .values
        .iter()
        .map(|row| {
            Cell::Number(
                row.iter()
                    .filter_map(|c| match c {
                        Cell::Number(n) => Some(*n),
                        _ => None,
                    })
                    .sum(),
            )
        })
        .collect();
    table.push_column(vec![Cell::text(HEADCOUNT)], totals);
}
