//! Property-based tests for the profiling policies.
//!
//! Covers the sampling fraction arithmetic, the fixed-limit override, the
//! quoted-name rule, and determinism of the eligibility filter.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use term_profiler::catalog::{TableDescriptor, TableKind};
use term_profiler::config::ProfilingConfig;
use term_profiler::dialect::{SnowflakePolicy, WarehousePolicy};
use term_profiler::policy::{plan_sampling, Decision, EligibilityFilter, SkipReason};

fn table_kind() -> impl Strategy<Value = TableKind> {
    prop_oneof![
        Just(TableKind::Base),
        Just(TableKind::External),
        Just(TableKind::View),
    ]
}

proptest! {
    #[test]
    fn sampling_fraction_matches_rows(
        sample_size in 1u64..1_000_000,
        extra_rows in 1u64..1_000_000_000,
    ) {
        let rows = sample_size + extra_rows;
        let config = ProfilingConfig::default().with_sample_size(sample_size);
        let table = TableDescriptor::new("T").with_rows_count(rows);

        let plan = plan_sampling(&table, "S", "DB", &config).unwrap().unwrap();
        let expected = format!("{:.8}", 100.0 * sample_size as f64 / rows as f64);

        prop_assert_eq!(plan.fraction_literal(), expected.clone());
        prop_assert_eq!(
            plan.to_sql(),
            format!("select * from \"DB\".\"S\".\"T\" TABLESAMPLE ({expected})")
        );
        prop_assert!(plan.fraction_percent > 0.0 && plan.fraction_percent < 100.0);
    }

    #[test]
    fn small_tables_are_never_sampled(
        sample_size in 1u64..1_000_000,
        fraction in 0.0f64..=1.0,
    ) {
        let rows = (sample_size as f64 * fraction) as u64;
        let config = ProfilingConfig::default().with_sample_size(sample_size);
        let table = TableDescriptor::new("T").with_rows_count(rows);

        prop_assert!(plan_sampling(&table, "S", "DB", &config).unwrap().is_none());
    }

    #[test]
    fn fixed_limit_disables_sampling(
        limit in 1u64..100_000,
        rows in proptest::option::of(0u64..u64::MAX / 2),
        use_sampling in any::<bool>(),
    ) {
        let config = ProfilingConfig::default()
            .with_limit(limit)
            .with_use_sampling(use_sampling);
        let mut table = TableDescriptor::new("T");
        table.rows_count = rows;

        prop_assert!(plan_sampling(&table, "S", "DB", &config).unwrap().is_none());
    }

    #[test]
    fn quoted_name_iff_not_upper_case(name in "[A-Za-z_][A-Za-z0-9_]{0,20}") {
        let policy = SnowflakePolicy::default();
        prop_assert_eq!(policy.requires_quoted_name(&name), name != name.to_uppercase());
    }

    #[test]
    fn eligibility_is_deterministic(
        kind in table_kind(),
        rows in proptest::option::of(0u64..10_000_000),
        size in proptest::option::of(0u64..20_000_000_000),
        allow_external in any::<bool>(),
    ) {
        let config = ProfilingConfig::default().with_profile_external_tables(allow_external);
        let filter = EligibilityFilter::new(&config).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut table = TableDescriptor::new("T").with_kind(kind);
        table.rows_count = rows;
        table.size_in_bytes = size;

        let first = filter.decide(&table, "S", "DB", now);
        let second = filter.decide(&table, "S", "DB", now);
        prop_assert_eq!(first, second);

        if kind == TableKind::External && !allow_external {
            prop_assert_eq!(first, Decision::Skip(SkipReason::ExternalTableExcluded));
        }
    }
}
