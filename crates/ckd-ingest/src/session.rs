//! A warehouse session: the one scoped resource of a run.

use std::time::Instant;

use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::error::{IngestError, Result};
use crate::query::Query;
use crate::warehouse::Warehouse;

/// Owns a warehouse for the duration of a run and logs every query.
pub struct Session {
    warehouse: Box<dyn Warehouse>,
    queries: usize,
    rows: usize,
    closed: bool,
}

impl Session {
    pub fn open(warehouse: Box<dyn Warehouse>) -> Self {
        info!(warehouse = %warehouse.name(), "warehouse session opened");
        Self {
            warehouse,
            queries: 0,
            rows: 0,
            closed: false,
        }
    }

    /// Runs a query. Fails once the session has been closed.
    pub fn fetch(&mut self, query: &Query) -> Result<DataFrame> {
        if self.closed {
            return Err(IngestError::SessionClosed);
        }
        let start = Instant::now();
        let df = self.warehouse.fetch(query)?;
        self.queries += 1;
        self.rows += df.height();
        let params: Vec<String> = query.params().iter().map(ToString::to_string).collect();
        debug!(
            query = %query,
            params = ?params,
            rows = df.height(),
            duration_ms = start.elapsed().as_millis(),
            "query"
        );
        Ok(df)
    }

    /// Number of queries run so far.
    pub fn query_count(&self) -> usize {
        self.queries
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the warehouse. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.warehouse.close()?;
        info!(
            queries = self.queries,
            rows = self.rows,
            "warehouse session closed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("warehouse", &self.warehouse.name())
            .field("queries", &self.queries)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TableRef;
    use crate::warehouse::MemoryWarehouse;
    use polars::prelude::*;

    #[test]
    fn session_counts_queries_and_refuses_after_close() {
        let df = DataFrame::new(vec![Series::new("member_id".into(), vec!["M1"]).into()]).unwrap();
        let warehouse = MemoryWarehouse::new().with_table("member_2023", df);
        let mut session = Session::open(Box::new(warehouse));
        let query = Query::new(TableRef::new("member_2023").unwrap());

        assert_eq!(session.fetch(&query).unwrap().height(), 1);
        assert_eq!(session.query_count(), 1);

        session.close().unwrap();
        assert!(session.is_closed());
        assert!(matches!(
            session.fetch(&query),
            Err(IngestError::SessionClosed)
        ));
        session.close().unwrap();
    }
}
