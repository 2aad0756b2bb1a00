//! 查询监控

use metrics::{counter, histogram};
use std::time::Instant;

/// 慢查询阈值 (ms)
const SLOW_QUERY_MS: u128 = 100;

/// 用于计时的守卫结构
pub struct QueryTimer {
    start: Instant,
    table: &'static str,
    operation: &'static str,
}

impl QueryTimer {
    pub fn new(table: &'static str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            table,
            operation,
        }
    }

    pub fn finish(self) {
        self.record();
    }

    pub fn finish_with_error(self) {
        counter!(
            "db_query_errors_total",
            "table" => self.table,
            "operation" => self.operation
        )
        .increment(1);
        self.record();
    }

    /// 按结果记录并透传
    pub fn observe<T, E>(self, result: Result<T, E>) -> Result<T, E> {
        match result {
            Ok(value) => {
                self.finish();
                Ok(value)
            }
            Err(e) => {
                self.finish_with_error();
                Err(e)
            }
        }
    }

    fn record(&self) {
        let duration_ms = self.start.elapsed().as_millis();

        histogram!(
            "db_query_duration_ms",
            "table" => self.table,
            "operation" => self.operation
        )
        .record(duration_ms as f64);
        counter!(
            "db_queries_total",
            "table" => self.table,
            "operation" => self.operation
        )
        .increment(1);

        if duration_ms > SLOW_QUERY_MS {
            tracing::warn!(
                table = self.table,
                operation = self.operation,
                duration_ms = %duration_ms,
                "Slow query detected"
            );
        }
    }
}
