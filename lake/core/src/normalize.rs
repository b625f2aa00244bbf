//! Flatten a sidecar block document into the four stored collections.
use error_stack::{report, Result};
use serde_json::Value;

use crate::error::MalformedBlockError;
use crate::ids::{EventId, ExtrinsicId};
use crate::model::{BlockBundle, BlockSummary, CallMethod, Event, EventSource, Extrinsic, Log};
use crate::partition::Partition;
use crate::raw::{RawBlock, RawEvent, RawExtrinsic, RawMethod};

const TIMESTAMP_PALLET: &str = "timestamp";
const TIMESTAMP_ARG: &str = "now";

/// Running event counter of one block.
///
/// Starts at 1 and is shared by the onInitialize, onFinalize and extrinsic
/// passes, in this order.
#[derive(Debug)]
pub struct EventSequence {
    number: u64,
    next: u32,
}

impl EventSequence {
    pub fn new(number: u64) -> Self {
        Self { number, next: 1 }
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId::new(self.number, self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u32 {
        self.next - 1
    }
}

/// Normalize the block document fetched for height `requested`.
///
/// The transform is pure: the same document and partition always produce the
/// same bundle. Any malformed field rejects the whole block.
pub fn normalize_block(
    requested: u64,
    partition: &Partition,
    block: &RawBlock,
) -> Result<BlockBundle, MalformedBlockError> {
    let number = block.number.trim().parse::<u64>().map_err(|_| {
        report!(MalformedBlockError::InvalidNumber)
            .attach_printable(format!("number: {:?}", block.number))
    })?;

    if number != requested {
        return Err(report!(MalformedBlockError::HeightMismatch)
            .attach_printable(format!("requested: {requested}, returned: {number}"))
            .attach_printable(format!("returned hash: {}", block.hash)));
    }

    let finalized = strict_bool(&block.finalized, "finalized")?;
    let flags = block
        .extrinsics
        .iter()
        .enumerate()
        .map(|(ordinal, extrinsic)| {
            let success = strict_bool(&extrinsic.success, "success")
                .map_err(|err| err.attach_printable(format!("extrinsic: {number}-{ordinal}")))?;
            let pays_fee = strict_bool(&extrinsic.pays_fee, "paysFee")
                .map_err(|err| err.attach_printable(format!("extrinsic: {number}-{ordinal}")))?;
            Ok((success, pays_fee))
        })
        .collect::<Result<Vec<_>, MalformedBlockError>>()?;

    let header = BlockHeader {
        number: number.to_string(),
        hash: block.hash.clone(),
        timestamp: extract_timestamp(&block.extrinsics),
    };

    let mut sequence = EventSequence::new(number);
    let mut events = Vec::new();

    for event in &block.on_initialize.events {
        let id = sequence.next_id();
        events.push(header.event(id, event, EventSource::OnInitialize, None));
    }

    for event in &block.on_finalize.events {
        let id = sequence.next_id();
        events.push(header.event(id, event, EventSource::OnFinalize, None));
    }

    let mut extrinsics = Vec::with_capacity(block.extrinsics.len());
    for ((ordinal, extrinsic), (success, pays_fee)) in
        block.extrinsics.iter().enumerate().zip(flags)
    {
        let extrinsic_id = ExtrinsicId::new(number, ordinal as u32);

        for event in &extrinsic.events {
            let id = sequence.next_id();
            events.push(header.event(
                id,
                event,
                EventSource::Extrinsic,
                Some(extrinsic_id.to_string()),
            ));
        }

        extrinsics.push(header.extrinsic(extrinsic_id, extrinsic, success, pays_fee));
    }

    let logs = block
        .logs
        .iter()
        .enumerate()
        .map(|(position, log)| Log {
            number: header.number.clone(),
            block_hash: header.hash.clone(),
            timestamp: header.timestamp,
            position: position as u32,
            log_type: log.log_type.clone(),
            index: log.index.clone(),
            value: log.value.clone(),
        })
        .collect::<Vec<_>>();

    let summary = BlockSummary {
        relay_chain: partition.relay_chain.clone(),
        chain: partition.chain.clone(),
        number: header.number.clone(),
        hash: block.hash.clone(),
        parent_hash: block.parent_hash.clone(),
        state_root: block.state_root.clone(),
        extrinsics_root: block.extrinsics_root.clone(),
        author_id: block.author_id.clone(),
        finalized,
        timestamp: header.timestamp,
        extrinsics_count: extrinsics.len() as u32,
        events_count: sequence.issued(),
        logs_count: logs.len() as u32,
    };

    Ok(BlockBundle {
        summary,
        extrinsics,
        events,
        logs,
    })
}

/// Block timestamp in milliseconds, taken from the `timestamp.set` call.
///
/// Returns `0` when there is no such call (genesis) or its argument is not an
/// integer.
pub fn extract_timestamp(extrinsics: &[RawExtrinsic]) -> i64 {
    let Some(now) = extrinsics
        .iter()
        .find(|extrinsic| extrinsic.method.pallet == TIMESTAMP_PALLET)
        .and_then(|extrinsic| extrinsic.args.get(TIMESTAMP_ARG))
    else {
        return 0;
    };

    match now {
        Value::String(text) => text.trim().parse::<i64>().unwrap_or(0),
        Value::Number(number) => number.as_i64().unwrap_or(0),
        _ => 0,
    }
}

fn strict_bool(value: &Value, field: &'static str) -> Result<bool, MalformedBlockError> {
    value.as_bool().ok_or_else(|| {
        report!(MalformedBlockError::NonBooleanFlag)
            .attach_printable(format!("field: {field}"))
            .attach_printable(format!("value: {value}"))
    })
}

/// Fields copied into every child row.
struct BlockHeader {
    number: String,
    hash: String,
    timestamp: i64,
}

impl BlockHeader {
    fn event(
        &self,
        id: EventId,
        event: &RawEvent,
        source: EventSource,
        extrinsic_id: Option<String>,
    ) -> Event {
        Event {
            number: self.number.clone(),
            block_hash: self.hash.clone(),
            timestamp: self.timestamp,
            event_id: id.to_string(),
            seq: id.seq,
            extrinsic_id,
            method: call_method(&event.method),
            data: event.data.clone(),
            source,
        }
    }

    fn extrinsic(
        &self,
        id: ExtrinsicId,
        extrinsic: &RawExtrinsic,
        success: bool,
        pays_fee: bool,
    ) -> Extrinsic {
        Extrinsic {
            number: self.number.clone(),
            block_hash: self.hash.clone(),
            timestamp: self.timestamp,
            extrinsic_id: id.to_string(),
            ordinal: id.ordinal,
            method: call_method(&extrinsic.method),
            args: extrinsic.args.clone(),
            info: extrinsic.info.clone(),
            extrinsic_hash: extrinsic.hash.clone(),
            tip: extrinsic.tip.clone(),
            nonce: extrinsic.nonce.clone(),
            signature: extrinsic.signature.clone(),
            era: extrinsic.era.clone(),
            success,
            pays_fee,
            event_count: extrinsic.events.len() as u32,
        }
    }
}

fn call_method(method: &RawMethod) -> CallMethod {
    CallMethod {
        pallet: method.pallet.clone(),
        method: method.method.clone(),
    }
}
