// Data-quality passes: read-only validation of upstream tables, and the final
// sanitization that makes every numeric cell finite.
//
// Validation runs on freshly fetched provider data so that upstream problems
// are reported separately from anything the pipeline's own arithmetic
// produces. Sanitization runs last on every output table.

use crate::schema::{PLAYER_ID, PLAYER_NAME};
use crate::table::{Table, TableResult};
use polars::prelude::*;
use serde::Serialize;
use tracing::{error, warn};

/// Offending rows reported per diagnostic.
pub const SAMPLE_SIZE: usize = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Non-finite cells found by one sanitization pass, counted before
/// replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityMetrics {
    pub inf_count: usize,
    pub nan_count: usize,
}

impl QualityMetrics {
    pub fn is_clean(&self) -> bool {
        self.inf_count == 0 && self.nan_count == 0
    }
}

/// One offending row in a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    /// `inf` or `-inf`.
    pub value: String,
}

/// An upstream column containing infinite values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub table: String,
    pub column: String,
    pub count: usize,
    pub samples: Vec<SampleRow>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Float values of a column, or `None` for non-float columns.
fn float_values(column: &Column) -> Option<Vec<Option<f64>>> {
    if !column.dtype().is_float() {
        return None;
    }
    let values = column.cast(&DataType::Float64).ok()?;
    let values = values.as_materialized_series().f64().ok()?.into_iter().collect();
    Some(values)
}

/// Report every float column of `table` holding positive or negative
/// infinity. Does not modify the table.
pub fn validate(table: &Table, label: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let ids = table.keys(PLAYER_ID).unwrap_or_default();
    let names = table.keys(PLAYER_NAME).unwrap_or_default();

    for column in table.frame().get_columns() {
        let Some(values) = float_values(column) else {
            continue;
        };
        let offending: Vec<(usize, f64)> = values
            .into_iter()
            .enumerate()
            .filter_map(|(row, v)| v.filter(|f| f.is_infinite()).map(|f| (row, f)))
            .collect();
        if offending.is_empty() {
            continue;
        }

        let samples = offending
            .iter()
            .take(SAMPLE_SIZE)
            .map(|&(row, value)| SampleRow {
                row,
                player_id: ids.get(row).cloned().flatten(),
                player_name: names.get(row).cloned().flatten(),
                value: value.to_string(),
            })
            .collect::<Vec<_>>();

        let name = column.name().as_str();
        error!(
            table = label,
            column = name,
            count = offending.len(),
            "upstream data quality issue: {}.{} has {} Inf values (sample rows: {:?})",
            label,
            name,
            offending.len(),
            samples.iter().map(|s| s.row).collect::<Vec<_>>()
        );

        diagnostics.push(Diagnostic {
            table: label.to_string(),
            column: name.to_string(),
            count: offending.len(),
            samples,
        });
    }

    diagnostics
}

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

/// Non-finite and missing cells of one column, or `None` when the column is
/// text or boolean and never sanitized.
fn count_non_finite(column: &Column) -> Option<QualityMetrics> {
    let dtype = column.dtype();
    if dtype.is_null() {
        return Some(QualityMetrics {
            inf_count: 0,
            nan_count: column.len(),
        });
    }
    if dtype.is_integer() {
        return Some(QualityMetrics {
            inf_count: 0,
            nan_count: column.null_count(),
        });
    }
    let values = float_values(column)?;
    let mut metrics = QualityMetrics::default();
    for v in values {
        match v {
            Some(f) if f.is_infinite() => metrics.inf_count += 1,
            Some(f) if f.is_nan() => metrics.nan_count += 1,
            None => metrics.nan_count += 1,
            _ => {}
        }
    }
    Some(metrics)
}

/// Expression zeroing every non-finite or missing cell of `name`.
fn zero_fill(name: &str, dtype: &DataType) -> Expr {
    let c = col(name);
    let filled = if dtype.is_integer() {
        c.fill_null(lit(0).cast(dtype.clone()))
    } else if dtype.is_null() {
        c.cast(DataType::Float64).fill_null(lit(0.0))
    } else {
        when(c.clone().is_infinite())
            .then(lit(NULL))
            .otherwise(c)
            .fill_nan(lit(0.0))
            .fill_null(lit(0.0))
    };
    filled.alias(name)
}

/// Replace every non-finite or missing numeric cell with zero.
///
/// Infinities count toward `inf_count`; NaN and null cells in numeric
/// columns count toward `nan_count`. Integer columns are filled with an
/// integer zero and keep their type. A column of nothing but nulls is
/// numeric by position and becomes a float column of zeros. Text and
/// boolean columns are untouched, and a table with nothing to replace comes
/// back unchanged.
pub fn sanitize(table: Table, label: &str) -> TableResult<(Table, QualityMetrics)> {
    let mut metrics = QualityMetrics::default();
    let mut fills = Vec::new();

    for column in table.frame().get_columns() {
        let Some(found) = count_non_finite(column) else {
            continue;
        };
        if found.is_clean() {
            continue;
        }
        metrics.inf_count += found.inf_count;
        metrics.nan_count += found.nan_count;
        fills.push(zero_fill(column.name().as_str(), column.dtype()));
    }

    if metrics.is_clean() {
        return Ok((table, metrics));
    }
    warn!(
        table = label,
        inf_count = metrics.inf_count,
        nan_count = metrics.nan_count,
        "replaced non-finite values with 0"
    );
    let cleaned = table.lazy().with_columns(fills).collect()?;
    Ok((Table::from(cleaned), metrics))
}

/// True when no numeric cell in `table` is infinite, NaN or null, and no
/// column is left untyped.
pub fn is_finite(table: &Table) -> bool {
    table
        .frame()
        .get_columns()
        .iter()
        .filter_map(count_non_finite)
        .all(|m| m.is_clean())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{parse_csv, ProviderOptions};
    use crate::schema::{normalize, TableKind};
    use crate::table::Value;

    fn column_f64(t: &Table, name: &str) -> Vec<f64> {
        (0..t.len())
            .map(|row| t.get(row, name).and_then(|v| v.as_f64()).unwrap())
            .collect()
    }

    fn clean(t: Table, label: &str) -> (Table, QualityMetrics) {
        sanitize(t, label).unwrap()
    }

    #[test]
    fn sanitize_replaces_inf_and_nan() {
        let t = Table::from(df!("value" => [1.0, f64::INFINITY, f64::NAN, f64::NEG_INFINITY, 5.0]).unwrap());
        let (out, metrics) = clean(t, "test");

        assert_eq!(column_f64(&out, "value"), vec![1.0, 0.0, 0.0, 0.0, 5.0]);
        assert_eq!(metrics, QualityMetrics { inf_count: 2, nan_count: 1 });
        assert!(is_finite(&out));
    }

    #[test]
    fn sanitize_counts_across_columns() {
        let t = Table::from(
            df!(
                "value" => [1.0, f64::INFINITY, f64::NAN, f64::NEG_INFINITY, 5.0],
                "score" => [Some(100.0), None, Some(f64::INFINITY), Some(200.0), Some(f64::NEG_INFINITY)],
            )
            .unwrap(),
        );
        let (out, metrics) = clean(t, "test");

        assert_eq!(metrics.inf_count, 4);
        assert_eq!(metrics.nan_count, 2);
        assert!(is_finite(&out));
        assert_eq!(column_f64(&out, "score"), vec![100.0, 0.0, 0.0, 200.0, 0.0]);
    }

    #[test]
    fn integer_columns_get_integer_zero() {
        let t = Table::from(df!("games" => [Some(3i64), None]).unwrap());
        let (out, metrics) = clean(t, "test");
        assert_eq!(out.get(1, "games"), Some(Value::Int(0)));
        assert_eq!(out.dtype("games"), Some(&DataType::Int64));
        assert_eq!(metrics.nan_count, 1);
    }

    #[test]
    fn empty_table_sanitizes_to_empty() {
        let (out, metrics) = clean(Table::new(), "empty");
        assert!(out.is_empty());
        assert!(metrics.is_clean());
    }

    #[test]
    fn text_only_table_is_unchanged() {
        let t = Table::from(df!("name" => [Some("Alice"), None], "position" => ["QB", "RB"]).unwrap());
        let (out, metrics) = clean(t.clone(), "strings");
        assert_eq!(out, t);
        assert!(metrics.is_clean());
    }

    #[test]
    fn clean_table_is_unchanged() {
        let t = Table::from(
            df!(
                "value" => [0.0, 1.5, -2.3, 100.0, -50.0],
                "count" => [0i64, 1, 2, 3, 4],
            )
            .unwrap(),
        );
        let (out, metrics) = clean(t.clone(), "valid");
        assert_eq!(out, t);
        assert_eq!(metrics, QualityMetrics::default());
    }

    #[test]
    fn sanitize_is_idempotent() {
        let t = Table::from(df!("v" => [f64::NAN, 2.0, f64::INFINITY]).unwrap());
        let (once, _) = clean(t, "a");
        let (twice, metrics) = clean(once.clone(), "a");
        assert_eq!(twice, once);
        assert!(metrics.is_clean());
    }

    #[test]
    fn mixed_text_and_inf_column_is_reported_and_zeroed() {
        let raw = parse_csv("player_id,racr\np1,inf\np2,n/a\np3,1.5", ProviderOptions::default()).unwrap();
        assert!(raw.is_numeric("racr"));

        let diags = validate(&raw, "weekly_stats");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].column, "racr");
        assert_eq!(diags[0].samples[0].player_id.as_deref(), Some("p1"));

        let (out, metrics) = clean(raw, "weekly_stats");
        assert_eq!(column_f64(&out, "racr"), vec![0.0, 0.0, 1.5]);
        assert_eq!(metrics, QualityMetrics { inf_count: 1, nan_count: 1 });
        assert!(is_finite(&out));
    }

    #[test]
    fn all_null_stat_column_is_zero_filled() {
        let raw = Table::from(
            DataFrame::new(vec![
                Column::new("player_id".into(), ["p1", "p2"]),
                Series::new_null("receiving_yards".into(), 2).into(),
            ])
            .unwrap(),
        );
        let normalized = normalize(&raw, TableKind::Weekly).unwrap();
        assert!(normalized.is_numeric("receiving_yards"));
        assert!(!is_finite(&normalized));

        let (out, metrics) = clean(normalized, "weekly_stats");
        assert_eq!(column_f64(&out, "receiving_yards"), vec![0.0, 0.0]);
        assert_eq!(metrics.nan_count, 2);
        assert!(is_finite(&out));
    }

    #[test]
    fn untyped_null_column_is_zeroed_without_normalizing() {
        let t = Table::from(
            DataFrame::new(vec![
                Column::new("player_id".into(), ["p1"]),
                Series::new_null("targets".into(), 1).into(),
            ])
            .unwrap(),
        );
        assert!(validate(&t, "x").is_empty());
        assert!(!is_finite(&t));

        let (out, metrics) = clean(t, "x");
        assert_eq!(out.get(0, "targets"), Some(Value::Float(0.0)));
        assert_eq!(metrics.nan_count, 1);
    }

    #[test]
    fn validate_reports_inf_per_column() {
        let t = Table::from(
            df!(
                "player_id" => ["p1", "p2"],
                "player_name" => ["One", "Two"],
                "yards" => [f64::INFINITY, 200.0],
                "touchdowns" => [1.0, f64::NEG_INFINITY],
                "receptions" => [5i64, 10],
            )
            .unwrap(),
        );
        let snapshot = t.clone();
        let diags = validate(&t, "weekly_stats");

        assert_eq!(t, snapshot);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].column, "yards");
        assert_eq!(diags[0].count, 1);
        assert_eq!(diags[0].table, "weekly_stats");
        assert_eq!(diags[0].samples[0].player_id.as_deref(), Some("p1"));
        assert_eq!(diags[0].samples[0].player_name.as_deref(), Some("One"));
        assert_eq!(diags[0].samples[0].value, "inf");
        assert_eq!(diags[1].column, "touchdowns");
        assert_eq!(diags[1].samples[0].row, 1);
        assert_eq!(diags[1].samples[0].value, "-inf");
    }

    #[test]
    fn validate_limits_samples() {
        let t = Table::from(df!("yards" => [f64::INFINITY; 5]).unwrap());
        let diags = validate(&t, "x");
        assert_eq!(diags[0].count, 5);
        assert_eq!(diags[0].samples.len(), SAMPLE_SIZE);
        assert_eq!(diags[0].samples[0].player_id, None);
    }

    #[test]
    fn validate_ignores_clean_and_text_columns() {
        let t = Table::from(df!("name" => ["inf", "Bob"], "yards" => [100i64, 200]).unwrap());
        assert!(validate(&t, "mixed").is_empty());
        assert!(validate(&Table::new(), "empty").is_empty());
    }

    #[test]
    fn validate_does_not_count_nan() {
        let t = Table::from(df!("yards" => [f64::NAN, 1.0]).unwrap());
        assert!(validate(&t, "nan_only").is_empty());
    }
}
