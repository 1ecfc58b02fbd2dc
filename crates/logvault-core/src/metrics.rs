//! Task timing metrics

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::network::{RequestRecord, ResponseRecord};

/// How a transaction's resource was obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchType {
    #[default]
    Unknown,
    NetworkLoad,
    ServerPush,
    LocalCache,
}

/// Connection-level characteristics of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionFlags {
    pub reused_connection: bool,
    pub proxy_connection: bool,
    pub cellular: bool,
    pub expensive: bool,
    pub constrained: bool,
    pub multipath: bool,
}

/// Per-phase timestamps of a transaction (Unix millis)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTiming {
    pub fetch_start: Option<i64>,
    pub domain_lookup_start: Option<i64>,
    pub domain_lookup_end: Option<i64>,
    pub connect_start: Option<i64>,
    pub connect_end: Option<i64>,
    pub secure_connection_start: Option<i64>,
    pub secure_connection_end: Option<i64>,
    pub request_start: Option<i64>,
    pub request_end: Option<i64>,
    pub response_start: Option<i64>,
    pub response_end: Option<i64>,
}

impl TransactionTiming {
    /// Milliseconds between two phase marks, when both were captured
    pub fn span(start: Option<i64>, end: Option<i64>) -> Option<i64> {
        match (start, end) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }

    /// Whole-transaction duration, from fetch start to response end
    pub fn total(&self) -> Option<i64> {
        Self::span(self.fetch_start, self.response_end)
    }
}

/// Byte counters of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSizes {
    pub request_header_bytes_sent: i64,
    pub request_body_bytes_before_encoding: i64,
    pub request_body_bytes_sent: i64,
    pub response_header_bytes_received: i64,
    pub response_body_bytes_after_decoding: i64,
    pub response_body_bytes_received: i64,
}

impl TransferSizes {
    pub fn total_sent(&self) -> i64 {
        self.request_header_bytes_sent + self.request_body_bytes_sent
    }

    pub fn total_received(&self) -> i64 {
        self.response_header_bytes_received + self.response_body_bytes_received
    }
}

/// One connection-level transaction within a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetricsRecord {
    /// Position within the task's transactions (dense, 0-based)
    pub index: u32,
    pub fetch_type: FetchType,
    pub request: Option<RequestRecord>,
    pub response: Option<ResponseRecord>,
    pub network_protocol: Option<String>,
    pub local_address: Option<String>,
    pub remote_address: Option<String>,
    pub local_port: Option<u16>,
    pub remote_port: Option<u16>,
    pub tls_version: Option<String>,
    pub tls_cipher_suite: Option<String>,
    pub flags: ConnectionFlags,
    pub timing: TransactionTiming,
    pub transfer: TransferSizes,
}

impl TransactionMetricsRecord {
    pub fn new(index: u32, fetch_type: FetchType) -> Self {
        Self {
            index,
            fetch_type,
            request: None,
            response: None,
            network_protocol: None,
            local_address: None,
            remote_address: None,
            local_port: None,
            remote_port: None,
            tls_version: None,
            tls_cipher_suite: None,
            flags: ConnectionFlags::default(),
            timing: TransactionTiming::default(),
            transfer: TransferSizes::default(),
        }
    }
}

/// Aggregate timing for a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Start of the task interval (Unix millis)
    pub start_millis: i64,
    pub duration_millis: i64,
    pub redirect_count: u32,
    /// Transactions ordered by `index`
    pub transactions: Vec<TransactionMetricsRecord>,
}

impl MetricsRecord {
    /// Build a metrics record, ordering transactions by index
    ///
    /// Fails unless the indices form a dense 0-based sequence.
    pub fn new(
        start_millis: i64,
        duration_millis: i64,
        redirect_count: u32,
        mut transactions: Vec<TransactionMetricsRecord>,
    ) -> Result<Self, CoreError> {
        transactions.sort_by_key(|t| t.index);
        let metrics = Self {
            start_millis,
            duration_millis,
            redirect_count,
            transactions,
        };
        metrics.validate()?;
        Ok(metrics)
    }

    /// Check that transactions are stored in dense 0-based index order
    pub fn validate(&self) -> Result<(), CoreError> {
        for (position, transaction) in self.transactions.iter().enumerate() {
            if transaction.index as usize != position {
                return Err(CoreError::InvalidMetrics(format!(
                    "expected transaction index {position}, found {}",
                    transaction.index
                )));
            }
        }
        if self.duration_millis < 0 {
            return Err(CoreError::InvalidMetrics(format!(
                "negative duration {}",
                self.duration_millis
            )));
        }
        Ok(())
    }

    /// The transaction that produced the final response
    pub fn last_transaction(&self) -> Option<&TransactionMetricsRecord> {
        self.transactions.last()
    }

    /// Summed transfer sizes across all transactions
    pub fn total_transfer(&self) -> TransferSizes {
        self.transactions
            .iter()
            .fold(TransferSizes::default(), |mut acc, t| {
                acc.request_header_bytes_sent += t.transfer.request_header_bytes_sent;
                acc.request_body_bytes_before_encoding +=
                    t.transfer.request_body_bytes_before_encoding;
                acc.request_body_bytes_sent += t.transfer.request_body_bytes_sent;
                acc.response_header_bytes_received += t.transfer.response_header_bytes_received;
                acc.response_body_bytes_after_decoding +=
                    t.transfer.response_body_bytes_after_decoding;
                acc.response_body_bytes_received += t.transfer.response_body_bytes_received;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transactions_sorted_by_index() {
        let metrics = MetricsRecord::new(
            0,
            120,
            1,
            vec![
                TransactionMetricsRecord::new(1, FetchType::NetworkLoad),
                TransactionMetricsRecord::new(0, FetchType::LocalCache),
            ],
        )
        .unwrap();

        let indices: Vec<u32> = metrics.transactions.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(metrics.last_transaction().unwrap().fetch_type, FetchType::NetworkLoad);
    }

    #[test]
    fn test_sparse_indices_rejected() {
        let result = MetricsRecord::new(
            0,
            10,
            0,
            vec![
                TransactionMetricsRecord::new(0, FetchType::NetworkLoad),
                TransactionMetricsRecord::new(2, FetchType::NetworkLoad),
            ],
        );
        assert!(matches!(result, Err(CoreError::InvalidMetrics(_))));
    }

    #[test]
    fn test_validate_rejects_unordered_fields() {
        let metrics = MetricsRecord {
            start_millis: 0,
            duration_millis: 10,
            redirect_count: 0,
            transactions: vec![
                TransactionMetricsRecord::new(1, FetchType::NetworkLoad),
                TransactionMetricsRecord::new(0, FetchType::NetworkLoad),
            ],
        };
        assert!(matches!(metrics.validate(), Err(CoreError::InvalidMetrics(_))));

        let negative = MetricsRecord {
            duration_millis: -5,
            transactions: Vec::new(),
            ..metrics
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_timing_span() {
        assert_eq!(TransactionTiming::span(Some(10), Some(25)), Some(15));
        assert_eq!(TransactionTiming::span(Some(10), None), None);
        assert_eq!(TransactionTiming::span(Some(30), Some(25)), None);
    }

    #[test]
    fn test_total_transfer() {
        let mut a = TransactionMetricsRecord::new(0, FetchType::NetworkLoad);
        a.transfer.response_body_bytes_received = 100;
        a.transfer.request_header_bytes_sent = 20;
        let mut b = TransactionMetricsRecord::new(1, FetchType::NetworkLoad);
        b.transfer.response_body_bytes_received = 50;

        let metrics = MetricsRecord::new(0, 0, 1, vec![a, b]).unwrap();
        let total = metrics.total_transfer();
        assert_eq!(total.response_body_bytes_received, 150);
        assert_eq!(total.total_sent(), 20);
    }
}
