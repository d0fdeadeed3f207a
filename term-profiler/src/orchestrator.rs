//! The profiling orchestrator.
//!
//! A profiling pass over one database runs in four phases:
//!
//! 1. **Collect**: every table in the catalog snapshot is classified by the
//!    eligibility filter. Skips are counted and logged; eligible tables get a
//!    [`ProfileRequest`].
//! 2. **Short-circuit**: with no pending requests the pass ends here, before
//!    any connection is provisioned.
//! 3. **Dispatch**: a connection pool is built for the database and the
//!    requests are handed to the [`BatchExecutor`].
//! 4. **Emit**: work units are yielded lazily through a [`WorkUnitStream`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use term_profiler::prelude::*;
//!
//! # async fn example(
//! #     driver: Arc<dyn WarehouseDriver>,
//! #     service: Arc<dyn ProfilerService>,
//! #     catalog: CatalogSnapshot,
//! # ) -> Result<()> {
//! let settings = ProfilerSettings::new(WarehouseConfig::new("acme", "profiler", "secret"))
//!     .with_profiling(ProfilingConfig::default().with_enabled(true));
//!
//! let report = Arc::new(ProfilingReport::new());
//! let profiler = WarehouseProfiler::builder(settings)
//!     .driver(driver)
//!     .service(service)
//!     .reporter(report.clone())
//!     .build()?;
//!
//! let mut units = profiler.get_workunits(&catalog)?;
//! while let Some(unit) = units.next().await {
//!     println!("{}", unit?.dataset_name);
//! }
//! println!("profiled {} tables", report.entities_profiled());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::catalog::{CatalogSnapshot, TableDescriptor};
use crate::config::ProfilerSettings;
use crate::connection::{ConnectionPool, ConnectionProvisioner, WarehouseDriver};
use crate::dialect::{SnowflakePolicy, WarehousePolicy};
use crate::error::{Result, TermError};
use crate::executor::BatchExecutor;
use crate::policy::{Decision, EligibilityFilter, SkipReason};
use crate::report::{ProfilingReport, ProfilingReporter};
use crate::request::{ProfileRequest, RequestBuilder};
use crate::service::{ProfilerArgs, ProfilerService};
use crate::state::ProfilingStateHandler;
use crate::workunit::WorkUnitStream;

/// Profiles the tables of a warehouse database.
pub struct WarehouseProfiler {
    settings: ProfilerSettings,
    filter: EligibilityFilter,
    policy: Arc<dyn WarehousePolicy>,
    service: Arc<dyn ProfilerService>,
    reporter: Arc<dyn ProfilingReporter>,
    state: Option<Arc<dyn ProfilingStateHandler>>,
    provisioner: ConnectionProvisioner,
    executor: BatchExecutor,
}

impl WarehouseProfiler {
    /// Creates a builder for a profiler with the given settings.
    pub fn builder(settings: ProfilerSettings) -> WarehouseProfilerBuilder {
        WarehouseProfilerBuilder::new(settings)
    }

    pub fn settings(&self) -> &ProfilerSettings {
        &self.settings
    }

    pub fn policy(&self) -> &dyn WarehousePolicy {
        self.policy.as_ref()
    }

    /// Runs a profiling pass over one database.
    ///
    /// Returns an empty stream when profiling is disabled or no table is
    /// eligible; in both cases no connection is opened. Catalog
    /// inconsistencies and provisioning failures are returned here, before
    /// any work unit is produced.
    #[instrument(skip(self, catalog), fields(database = %catalog.database))]
    pub fn get_workunits(&self, catalog: &CatalogSnapshot) -> Result<WorkUnitStream> {
        if !self.settings.is_profiling_enabled() {
            debug!("Profiling is disabled");
            return Ok(WorkUnitStream::empty());
        }

        let requests = self.collect(catalog, Utc::now())?;
        if requests.is_empty() {
            info!("No tables eligible for profiling");
            return Ok(WorkUnitStream::empty());
        }

        self.generate_profile_workunits(requests, &catalog.database)
    }

    /// Classifies every table of the snapshot and builds the pending requests.
    ///
    /// Each table is either turned into a request, reported with
    /// `report_entity_profiled`, or counted as skipped, exactly once. `now`
    /// anchors the update-recency window for the whole pass.
    ///
    /// Nothing is reported until every table has been classified, so a
    /// malformed snapshot leaves the reporter untouched.
    pub fn collect(
        &self,
        catalog: &CatalogSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProfileRequest>> {
        catalog.validate()?;

        let database = catalog.database.as_str();
        let builder = RequestBuilder::new(
            &self.settings.profiling,
            self.policy.as_ref(),
            self.service.as_ref(),
        );

        let mut outcomes = Vec::with_capacity(catalog.table_count());
        for schema in &catalog.schemas {
            for table in catalog.tables(schema)? {
                let decision = match self.filter.decide(table, schema, database, now) {
                    Decision::Profile if self.already_profiled(table, schema, database) => {
                        Decision::Skip(SkipReason::AlreadyProfiled)
                    }
                    decision => decision,
                };

                let outcome = match decision {
                    Decision::Skip(reason) => Outcome::Skipped(reason),
                    Decision::Profile => Outcome::Pending(builder.build(table, schema, database)?),
                };
                outcomes.push((schema.as_str(), table, outcome));
            }
        }

        let mut requests = Vec::with_capacity(outcomes.len());
        for (schema, table, outcome) in outcomes {
            match outcome {
                Outcome::Skipped(reason) => {
                    self.reporter.report_skipped(schema, &table.name, reason);
                    info!(
                        table = %self.policy.pretty_name(&table.name, schema, database),
                        %reason,
                        "Skipping profiling"
                    );
                }
                Outcome::Pending(request) => {
                    self.reporter
                        .report_entity_profiled(schema, request.pretty_name());
                    requests.push(request);
                }
            }
        }

        debug!(
            pending = requests.len(),
            tables = catalog.table_count(),
            "Collected profiling requests"
        );
        Ok(requests)
    }

    /// Dispatches `requests` for `database` and returns their work units.
    ///
    /// Builds this pass's connection pool from a fresh database-scoped
    /// factory. An empty request list yields an empty stream without
    /// provisioning.
    pub fn generate_profile_workunits(
        &self,
        requests: Vec<ProfileRequest>,
        database: &str,
    ) -> Result<WorkUnitStream> {
        if requests.is_empty() {
            return Ok(WorkUnitStream::empty());
        }

        let profiling = &self.settings.profiling;
        let factory = self.provisioner.factory_for(database)?;
        let pool = ConnectionPool::new(
            Arc::new(factory),
            &self.settings.warehouse.pool,
            profiling.max_workers,
        );
        let args = ProfilerArgs::new(database, self.policy.platform())
            .with_catch_exceptions(profiling.catch_exceptions)
            .with_null_mapped_types(self.policy.null_mapped_types());

        self.executor
            .execute_batch(requests, pool, profiling.max_workers, args)
    }

    fn already_profiled(
        &self,
        table: &TableDescriptor,
        schema: &str,
        database: &str,
    ) -> bool {
        self.state.as_ref().is_some_and(|state| {
            let dataset = self.policy.dataset_identifier(&table.name, schema, database);
            state.is_already_profiled(&dataset, table)
        })
    }
}

enum Outcome {
    Skipped(SkipReason),
    Pending(ProfileRequest),
}

impl std::fmt::Debug for WarehouseProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseProfiler")
            .field("platform", &self.policy.platform())
            .field("enabled", &self.settings.is_profiling_enabled())
            .field("provisioner", &self.provisioner)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WarehouseProfiler`].
pub struct WarehouseProfilerBuilder {
    settings: ProfilerSettings,
    driver: Option<Arc<dyn WarehouseDriver>>,
    service: Option<Arc<dyn ProfilerService>>,
    policy: Option<Arc<dyn WarehousePolicy>>,
    reporter: Option<Arc<dyn ProfilingReporter>>,
    state: Option<Arc<dyn ProfilingStateHandler>>,
}

impl WarehouseProfilerBuilder {
    pub fn new(settings: ProfilerSettings) -> Self {
        Self {
            settings,
            driver: None,
            service: None,
            policy: None,
            reporter: None,
            state: None,
        }
    }

    /// Sets the warehouse driver used to open sessions. Required.
    pub fn driver(mut self, driver: Arc<dyn WarehouseDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Sets the profiler service. Required.
    pub fn service(mut self, service: Arc<dyn ProfilerService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Overrides the warehouse policy.
    ///
    /// Defaults to [`SnowflakePolicy`] honoring `convert_urns_to_lowercase`.
    pub fn policy(mut self, policy: Arc<dyn WarehousePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the report sink. Defaults to a private [`ProfilingReport`].
    pub fn reporter(mut self, reporter: Arc<dyn ProfilingReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Skips tables unchanged since they were last profiled.
    pub fn state_handler(mut self, state: Arc<dyn ProfilingStateHandler>) -> Self {
        self.state = Some(state);
        self
    }

    /// Builds the profiler.
    ///
    /// # Errors
    ///
    /// Returns [`TermError::Configuration`] if the settings are invalid or the
    /// driver or service is missing.
    pub fn build(self) -> Result<WarehouseProfiler> {
        self.settings.validate()?;

        let driver = self
            .driver
            .ok_or_else(|| TermError::Configuration("a warehouse driver is required".into()))?;
        let service = self
            .service
            .ok_or_else(|| TermError::Configuration("a profiler service is required".into()))?;
        let policy = self.policy.unwrap_or_else(|| {
            Arc::new(SnowflakePolicy::new(self.settings.convert_urns_to_lowercase))
        });
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(ProfilingReport::new()));

        let filter = EligibilityFilter::new(&self.settings.profiling)?;
        let provisioner =
            ConnectionProvisioner::new(driver, self.settings.warehouse.clone(), policy.clone());
        let executor = BatchExecutor::new(service.clone(), reporter.clone());

        Ok(WarehouseProfiler {
            settings: self.settings,
            filter,
            policy,
            service,
            reporter,
            state: self.state,
            provisioner,
            executor,
        })
    }
}
