//! Test doubles for the warehouse driver and the profiler service.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::TableDescriptor;
use crate::config::{ProfilingConfig, WarehouseConfig};
use crate::connection::{ConnectionFactory, ScopedConnection, WarehouseConnection, WarehouseDriver};
use crate::dialect::SnowflakePolicy;
use crate::error::{BoxError, Result, TermError};
use crate::request::{ProfileRequest, RequestBuilder};
use crate::service::{ProfilerArgs, ProfilerService};
use crate::workunit::WorkUnit;

/// Session that records every statement it executes.
pub struct MockConnection {
    statements: Arc<Mutex<Vec<String>>>,
    fail_use_database: bool,
}

#[async_trait]
impl WarehouseConnection for MockConnection {
    async fn execute(&mut self, statement: &str) -> std::result::Result<(), BoxError> {
        if self.fail_use_database && statement.starts_with("use database") {
            return Err(format!("database does not exist: {statement}").into());
        }
        self.statements.lock().unwrap().push(statement.to_string());
        Ok(())
    }
}

/// Driver handing out [`MockConnection`]s.
#[derive(Default)]
pub struct MockDriver {
    opened: AtomicUsize,
    statements: Arc<Mutex<Vec<String>>>,
    fail_login: bool,
    fail_use_database: bool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    pub fn failing_use_database(mut self) -> Self {
        self.fail_use_database = true;
        self
    }

    /// Sessions opened successfully.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Statements executed across all sessions.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl WarehouseDriver for MockDriver {
    async fn open(
        &self,
        _config: &WarehouseConfig,
    ) -> std::result::Result<Box<dyn WarehouseConnection>, BoxError> {
        if self.fail_login {
            return Err("incorrect username or password".into());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            statements: self.statements.clone(),
            fail_use_database: self.fail_use_database,
        }))
    }
}

/// Pool factory that counts connects.
pub struct CountingFactory {
    database: String,
    connects: AtomicUsize,
    fail: bool,
}

impl CountingFactory {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            connects: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for CountingFactory {
    fn database(&self) -> &str {
        &self.database
    }

    async fn connect(&self) -> Result<ScopedConnection> {
        if self.fail {
            return Err(TermError::connection(&self.database, "warehouse unreachable"));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        let conn = MockConnection {
            statements: Arc::default(),
            fail_use_database: false,
        };
        Ok(ScopedConnection::new(Box::new(conn), &self.database))
    }
}

/// Profiler service that echoes the request back as the payload.
#[derive(Default)]
pub struct MockService {
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the table with this display name.
    pub fn failing_on(mut self, pretty_name: &str) -> Self {
        self.failing.insert(pretty_name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Display names of profiled tables, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of overlapping `profile_table` calls.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfilerService for MockService {
    async fn profile_table(
        &self,
        _conn: &mut dyn WarehouseConnection,
        request: &ProfileRequest,
        args: &ProfilerArgs,
    ) -> Result<Option<WorkUnit>> {
        self.calls
            .lock()
            .unwrap()
            .push(request.pretty_name().to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(request.pretty_name()) {
            return Err(TermError::profiling_query(
                request.pretty_name(),
                "statement timed out",
            ));
        }

        Ok(Some(WorkUnit::new(
            format!("{}-profile", request.dataset_name()),
            request.dataset_name(),
            serde_json::json!({
                "platform": args.platform,
                "batch_kwargs": request.batch_kwargs().to_map()?,
            }),
        )))
    }
}

/// Builds requests for tables in the `PUBLIC` schema of `database`.
pub fn requests(database: &str, tables: &[&str]) -> Vec<ProfileRequest> {
    let config = ProfilingConfig::default();
    let policy = SnowflakePolicy::default();
    let service = MockService::new();
    let builder = RequestBuilder::new(&config, &policy, &service);

    tables
        .iter()
        .map(|name| {
            builder
                .build(&TableDescriptor::new(*name), "PUBLIC", database)
                .unwrap()
        })
        .collect()
}
