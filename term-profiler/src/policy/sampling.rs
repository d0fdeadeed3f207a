//! Fraction-based sampling for large tables.
//!
//! Sampling is expressed as a percentage of rows rather than a fixed row
//! count: fixed-size `TABLESAMPLE` on the warehouse is markedly slower on very
//! large tables than the equivalent fraction.

use std::fmt;

use crate::catalog::TableDescriptor;
use crate::config::ProfilingConfig;
use crate::error::Result;
use crate::security::SqlSecurity;

/// Decimal digits used when rendering the sample percentage.
pub const SAMPLE_FRACTION_PRECISION: usize = 8;

/// A fractional sample of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPlan {
    /// Percentage of rows to sample, `0 < fraction_percent < 100`
    pub fraction_percent: f64,
    /// Fully qualified, delimited table reference
    pub table_path: String,
}

impl SamplingPlan {
    /// The percentage rendered at fixed precision.
    pub fn fraction_literal(&self) -> String {
        format!(
            "{:.prec$}",
            self.fraction_percent,
            prec = SAMPLE_FRACTION_PRECISION
        )
    }

    /// The sampling query handed to the profiler service as custom SQL.
    pub fn to_sql(&self) -> String {
        format!(
            "select * from {} TABLESAMPLE ({})",
            self.table_path,
            self.fraction_literal()
        )
    }
}

impl fmt::Display for SamplingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Plans sampling for a table, or returns `None` for full-table profiling.
///
/// A fixed row limit supersedes sampling. Tables with an unknown or zero row
/// count, or no more rows than `sample_size`, are not sampled.
pub fn plan_sampling(
    table: &TableDescriptor,
    schema: &str,
    database: &str,
    config: &ProfilingConfig,
) -> Result<Option<SamplingPlan>> {
    if config.effective_limit().is_some() || !config.use_sampling {
        return Ok(None);
    }

    let rows = match table.rows_count {
        Some(rows) if rows > 0 && rows > config.sample_size => rows,
        _ => return Ok(None),
    };

    let fraction_percent = 100.0 * config.sample_size as f64 / rows as f64;
    let table_path = SqlSecurity::quote_path(&[database, schema, &table.name])?;

    Ok(Some(SamplingPlan {
        fraction_percent,
        table_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampling_config() -> ProfilingConfig {
        ProfilingConfig::default()
            .with_use_sampling(true)
            .with_sample_size(10_000)
    }

    #[test]
    fn test_one_percent_sample() {
        let table = TableDescriptor::new("T").with_rows_count(1_000_000);
        let plan = plan_sampling(&table, "PUBLIC", "DB", &sampling_config())
            .unwrap()
            .unwrap();

        assert_eq!(plan.fraction_literal(), "1.00000000");
        assert_eq!(
            plan.to_sql(),
            "select * from \"DB\".\"PUBLIC\".\"T\" TABLESAMPLE (1.00000000)"
        );
    }

    #[test]
    fn test_fraction_rendered_to_eight_digits() {
        let table = TableDescriptor::new("t_lower").with_rows_count(3_000_000);
        let plan = plan_sampling(&table, "S", "DB", &sampling_config())
            .unwrap()
            .unwrap();
        assert_eq!(plan.fraction_literal(), "0.33333333");
        assert!(plan.to_sql().contains("\"DB\".\"S\".\"t_lower\""));
    }

    #[test]
    fn test_limit_disables_sampling() {
        let table = TableDescriptor::new("T").with_rows_count(1_000_000);
        let config = sampling_config().with_limit(500);
        assert_eq!(plan_sampling(&table, "S", "DB", &config).unwrap(), None);
    }

    #[test]
    fn test_small_or_unknown_tables_not_sampled() {
        let config = sampling_config();

        let small = TableDescriptor::new("T").with_rows_count(10_000);
        assert_eq!(plan_sampling(&small, "S", "DB", &config).unwrap(), None);

        let unknown = TableDescriptor::new("T");
        assert_eq!(plan_sampling(&unknown, "S", "DB", &config).unwrap(), None);

        let empty = TableDescriptor::new("T").with_rows_count(0);
        assert_eq!(plan_sampling(&empty, "S", "DB", &config).unwrap(), None);
    }

    #[test]
    fn test_sampling_disabled() {
        let table = TableDescriptor::new("T").with_rows_count(1_000_000);
        let config = sampling_config().with_use_sampling(false);
        assert_eq!(plan_sampling(&table, "S", "DB", &config).unwrap(), None);
    }

    #[test]
    fn test_malformed_name_is_an_error() {
        let table = TableDescriptor::new("").with_rows_count(1_000_000);
        assert!(plan_sampling(&table, "S", "DB", &sampling_config()).is_err());
    }
}
