//! Bounded-concurrency execution of profiling requests.
//!
//! Each request becomes one job: lease a pooled connection, call the profiler
//! service, and yield its work unit. Up to `max_workers` jobs run at once and
//! results are yielded in completion order.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use crate::connection::ConnectionPool;
use crate::error::{Result, TermError};
use crate::logging::{truncate_field, MAX_FIELD_LENGTH};
use crate::report::ProfilingReporter;
use crate::request::ProfileRequest;
use crate::service::{ProfilerArgs, ProfilerService};
use crate::workunit::{JobOutcome, WorkUnitStream};

/// Runs batches of profiling requests against a connection pool.
#[derive(Clone)]
pub struct BatchExecutor {
    service: Arc<dyn ProfilerService>,
    reporter: Arc<dyn ProfilingReporter>,
}

impl BatchExecutor {
    pub fn new(service: Arc<dyn ProfilerService>, reporter: Arc<dyn ProfilingReporter>) -> Self {
        Self { service, reporter }
    }

    /// Schedules `requests` over at most `max_workers` concurrent jobs.
    ///
    /// Nothing runs until the returned stream is polled. The stream owns the
    /// pool handle; once it is dropped and every lease has been returned, the
    /// pool's connections are closed.
    pub fn execute_batch(
        &self,
        requests: Vec<ProfileRequest>,
        pool: ConnectionPool,
        max_workers: usize,
        args: ProfilerArgs,
    ) -> Result<WorkUnitStream> {
        if let Some(request) = requests.iter().find(|r| r.database() != pool.database()) {
            return Err(TermError::Internal(format!(
                "request for '{}' scheduled on a pool for database '{}'",
                request.pretty_name(),
                pool.database()
            )));
        }

        debug!(
            database = %pool.database(),
            requests = requests.len(),
            max_workers,
            "Dispatching profiling batch"
        );

        let service = self.service.clone();
        let reporter = self.reporter.clone();
        let args = Arc::new(args);

        let jobs = stream::iter(requests)
            .map(move |request| {
                let job = ProfilingJob {
                    service: service.clone(),
                    reporter: reporter.clone(),
                    pool: pool.clone(),
                    args: args.clone(),
                };
                job.run(request)
            })
            .buffer_unordered(max_workers.max(1));

        Ok(WorkUnitStream::new(jobs.boxed()))
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor").finish_non_exhaustive()
    }
}

struct ProfilingJob {
    service: Arc<dyn ProfilerService>,
    reporter: Arc<dyn ProfilingReporter>,
    pool: ConnectionPool,
    args: Arc<ProfilerArgs>,
}

impl ProfilingJob {
    #[instrument(skip_all, fields(table = %request.pretty_name()))]
    async fn run(self, request: ProfileRequest) -> JobOutcome {
        // Connection failures are fatal to the pass.
        let mut conn = self.pool.get().await?;

        if conn.database() != request.database() {
            return Err(TermError::Internal(format!(
                "connection scoped to '{}' leased for a request on '{}'",
                conn.database(),
                request.database()
            )));
        }

        let outcome = self
            .service
            .profile_table(&mut *conn, &request, &self.args)
            .await;

        match outcome {
            Ok(unit) => Ok(unit),
            Err(e) if self.args.catch_exceptions => {
                let message = e.to_string();
                warn!(
                    error = %truncate_field(&message, MAX_FIELD_LENGTH),
                    "Profiling failed, continuing with remaining tables"
                );
                self.reporter.report_failure(request.pretty_name(), &message);
                conn.discard();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::PoolOptions;
    use crate::report::ProfilingReport;
    use crate::test_fixtures::{requests, CountingFactory, MockService};

    fn pool(factory: Arc<CountingFactory>, max_workers: usize) -> ConnectionPool {
        ConnectionPool::new(factory, &PoolOptions::default(), max_workers)
    }

    fn executor(service: Arc<MockService>, report: Arc<ProfilingReport>) -> BatchExecutor {
        BatchExecutor::new(service, report)
    }

    #[tokio::test]
    async fn test_every_request_yields_a_unit() {
        let service = Arc::new(MockService::new());
        let report = Arc::new(ProfilingReport::new());
        let pool = pool(Arc::new(CountingFactory::new("DB")), 3);

        let stream = executor(service.clone(), report)
            .execute_batch(
                requests("DB", &["A", "B", "C", "D"]),
                pool,
                3,
                ProfilerArgs::new("DB", "snowflake"),
            )
            .unwrap();

        let mut names: Vec<_> = stream
            .try_collect_units()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.dataset_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["db.public.a", "db.public.b", "db.public.c", "db.public.d"]);
        assert_eq!(service.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_max_workers() {
        let service = Arc::new(MockService::new().with_delay(Duration::from_millis(20)));
        let report = Arc::new(ProfilingReport::new());
        let factory = Arc::new(CountingFactory::new("DB"));

        let stream = executor(service.clone(), report)
            .execute_batch(
                requests("DB", &["A", "B", "C", "D", "E", "F"]),
                pool(factory.clone(), 2),
                2,
                ProfilerArgs::new("DB", "snowflake"),
            )
            .unwrap();

        assert_eq!(stream.try_collect_units().await.unwrap().len(), 6);
        assert!(service.max_in_flight() <= 2);
        assert!(factory.connects() <= 2);
    }

    #[tokio::test]
    async fn test_table_failure_is_isolated_and_reported() {
        let service = Arc::new(MockService::new().failing_on("DB.PUBLIC.B"));
        let report = Arc::new(ProfilingReport::new());

        let stream = executor(service, report.clone())
            .execute_batch(
                requests("DB", &["A", "B", "C"]),
                pool(Arc::new(CountingFactory::new("DB")), 2),
                2,
                ProfilerArgs::new("DB", "snowflake"),
            )
            .unwrap();

        let units = stream.try_collect_units().await.unwrap();
        assert_eq!(units.len(), 2);

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].table, "DB.PUBLIC.B");
    }

    #[tokio::test]
    async fn test_table_failure_is_fatal_without_catch_exceptions() {
        let service = Arc::new(MockService::new().failing_on("DB.PUBLIC.A"));
        let report = Arc::new(ProfilingReport::new());

        let stream = executor(service, report.clone())
            .execute_batch(
                requests("DB", &["A"]),
                pool(Arc::new(CountingFactory::new("DB")), 1),
                1,
                ProfilerArgs::new("DB", "snowflake").with_catch_exceptions(false),
            )
            .unwrap();

        let err = stream.try_collect_units().await.unwrap_err();
        assert!(matches!(err, TermError::ProfilingQuery { .. }));
        assert!(report.failures().is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_ends_the_stream() {
        let service = Arc::new(MockService::new());
        let report = Arc::new(ProfilingReport::new());

        let mut stream = executor(service.clone(), report)
            .execute_batch(
                requests("DB", &["A", "B"]),
                pool(Arc::new(CountingFactory::new("DB").failing()), 1),
                1,
                ProfilerArgs::new("DB", "snowflake"),
            )
            .unwrap();

        assert!(matches!(
            stream.next().await,
            Some(Err(TermError::Connection { .. }))
        ));
        assert!(stream.next().await.is_none());
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_requests_for_another_database_are_rejected() {
        let service = Arc::new(MockService::new());
        let report = Arc::new(ProfilingReport::new());

        let result = executor(service, report).execute_batch(
            requests("OTHER", &["A"]),
            pool(Arc::new(CountingFactory::new("DB")), 1),
            1,
            ProfilerArgs::new("DB", "snowflake"),
        );
        assert!(matches!(result, Err(TermError::Internal(_))));
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_connections() {
        let service = Arc::new(MockService::new().with_delay(Duration::from_millis(50)));
        let report = Arc::new(ProfilingReport::new());
        let pool = pool(Arc::new(CountingFactory::new("DB")), 4);

        let mut stream = executor(service, report)
            .execute_batch(
                requests("DB", &["A", "B", "C", "D", "E", "F", "G", "H"]),
                pool.clone(),
                4,
                ProfilerArgs::new("DB", "snowflake"),
            )
            .unwrap();

        assert!(stream.next().await.unwrap().is_ok());
        drop(stream);

        assert_eq!(pool.status().in_use, 0);
    }
}
