//! Event aggregation across the three contract event categories.

use tracing::debug;

use crate::adapters::contract::SubsidyContract;
use crate::domain::{
    format_hash, to_checksum, to_decimal, BlockId, EventKind, EventRecord, EventsPage,
    LedgerError, LedgerResult, RpcLog,
};

/// Default number of events returned
pub const DEFAULT_EVENTS_LIMIT: usize = 10;

/// Block range and page size for an aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQuery {
    pub from_block: BlockId,
    pub to_block: BlockId,
    pub limit: usize,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            from_block: BlockId::default(),
            to_block: BlockId::default(),
            limit: DEFAULT_EVENTS_LIMIT,
        }
    }
}

/// Concatenate per-category batches, order by block descending and truncate.
///
/// The sort is stable: events sharing a block keep their category order.
pub fn merge_events(batches: Vec<Vec<EventRecord>>, limit: usize) -> Vec<EventRecord> {
    let mut events: Vec<EventRecord> = batches.into_iter().flatten().collect();
    events.sort_by(|a, b| b.block_number.cmp(&a.block_number));
    events.truncate(limit);
    events
}

/// Query, normalize and merge every event category over one block range.
pub async fn aggregate(contract: &SubsidyContract, query: EventQuery) -> LedgerResult<EventsPage> {
    let mut batches = Vec::with_capacity(EventKind::ALL.len());
    for kind in EventKind::ALL {
        let logs = contract
            .event_logs(kind, query.from_block, query.to_block)
            .await?;
        debug!(event = kind.name(), count = logs.len(), "fetched contract logs");
        let batch = logs
            .iter()
            .map(|log| normalize(contract, kind, log))
            .collect::<LedgerResult<Vec<_>>>()?;
        batches.push(batch);
    }

    let events = merge_events(batches, query.limit);
    Ok(EventsPage {
        total_events: events.len(),
        events,
    })
}

fn normalize(contract: &SubsidyContract, kind: EventKind, log: &RpcLog) -> LedgerResult<EventRecord> {
    let decoded = contract.decode_event(kind, log)?;
    let participant = decoded.address(kind.participant_field()).ok_or_else(|| {
        LedgerError::Decode(format!("{} log has no {}", kind.name(), kind.participant_field()))
    })?;
    let amount = decoded
        .uint("amount")
        .ok_or_else(|| LedgerError::Decode(format!("{} log has no amount", kind.name())))?;
    let block_number = log
        .block_number
        .and_then(|n| n.to_u64())
        .ok_or_else(|| LedgerError::Decode(format!("{} log is pending", kind.name())))?;

    Ok(EventRecord {
        kind,
        participant: to_checksum(&participant),
        amount: to_decimal(amount),
        amount_wei: amount.to_string(),
        block_number,
        transaction_hash: log.transaction_hash.as_ref().map(format_hash).unwrap_or_default(),
        timestamp: None,
    })
}
