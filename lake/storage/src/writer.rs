use async_trait::async_trait;
use dotlake_core::{BlockBundle, Event, Extrinsic, Log, Partition};
use error_stack::{report, Result, ResultExt};
use tracing::debug;

use crate::error::StoreError;
use crate::schema::{
    BLOCKS_TABLE, BLOCK_COLUMNS, CHILD_TABLES, EVENTS_TABLE, EVENT_COLUMNS, EXTRINSICS_TABLE,
    EXTRINSIC_COLUMNS, LOGS_TABLE, LOG_COLUMNS,
};
use crate::session::SqlSession;
use crate::sql::{Dialect, SqlBuilder, SqlQuery, SqlValue};
use crate::{BlockWriter, Store};

/// Rows written for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub number: u64,
    pub extrinsics: u32,
    pub events: u32,
    pub logs: u32,
    /// Child rows of a previous ingestion of the same block that were
    /// replaced.
    pub replaced_rows: u64,
}

#[async_trait]
impl<S: SqlSession> BlockWriter for Store<S> {
    #[tracing::instrument(
        name = "write_bundle",
        skip_all,
        fields(partition = %bundle.partition(), number = bundle.number())
    )]
    async fn write_bundle(&self, bundle: &BlockBundle) -> Result<WriteSummary, StoreError> {
        let number = bundle
            .number()
            .parse::<u64>()
            .change_context(StoreError::Rejected)
            .attach_printable_lazy(|| format!("invalid block number {:?}", bundle.number()))?;
        let statements = bundle_statements(self.session.dialect(), bundle)?;
        let lease = format!("{}/{}", bundle.partition(), number);

        let affected = self
            .session
            .execute_atomically(&lease, statements)
            .await
            .attach_printable_lazy(|| format!("failed to write block {number}"))?;

        // The upsert comes first, followed by one delete per child table.
        let replaced_rows = affected.iter().skip(1).take(CHILD_TABLES.len()).sum();

        let summary = WriteSummary {
            number,
            extrinsics: bundle.summary.extrinsics_count,
            events: bundle.summary.events_count,
            logs: bundle.summary.logs_count,
            replaced_rows,
        };
        debug!(?summary, "block written");
        Ok(summary)
    }
}

/// Statements persisting `bundle`: summary upsert, removal of stale children,
/// then inserts of extrinsics, events and logs.
pub(crate) fn bundle_statements(
    dialect: Dialect,
    bundle: &BlockBundle,
) -> Result<Vec<SqlQuery>, StoreError> {
    check_counts(bundle)?;

    let summary = &bundle.summary;
    let partition = bundle.partition();
    let height = summary
        .number
        .parse::<i64>()
        .change_context(StoreError::Rejected)
        .attach_printable_lazy(|| format!("block number out of range: {}", summary.number))?;

    let parent = BlockColumns {
        partition: &partition,
        height,
        timestamp: summary.timestamp,
        hash: &summary.hash,
    };

    let rows = bundle.extrinsics.len() + bundle.events.len() + bundle.logs.len();
    let mut statements = Vec::with_capacity(1 + CHILD_TABLES.len() + rows);

    statements.push(upsert_block(dialect, &parent, bundle));

    for table in CHILD_TABLES {
        let mut builder = SqlBuilder::new(dialect);
        builder
            .push("DELETE FROM ")
            .push(table)
            .push(" WHERE relay_chain = ")
            .bind(&partition.relay_chain)
            .push(" AND chain = ")
            .bind(&partition.chain)
            .push(" AND number = ")
            .bind(height);
        statements.push(builder.build());
    }

    for extrinsic in &bundle.extrinsics {
        statements.push(insert(
            dialect,
            EXTRINSICS_TABLE,
            EXTRINSIC_COLUMNS,
            parent.with(extrinsic_values(extrinsic)),
        ));
    }

    for event in &bundle.events {
        statements.push(insert(
            dialect,
            EVENTS_TABLE,
            EVENT_COLUMNS,
            parent.with(event_values(event)),
        ));
    }

    for log in &bundle.logs {
        statements.push(insert(
            dialect,
            LOGS_TABLE,
            LOG_COLUMNS,
            parent.with(log_values(log)),
        ));
    }

    Ok(statements)
}

/// Columns every row shares with its block.
struct BlockColumns<'a> {
    partition: &'a Partition,
    height: i64,
    timestamp: i64,
    hash: &'a str,
}

impl BlockColumns<'_> {
    fn with(&self, rest: Vec<SqlValue>) -> Vec<SqlValue> {
        let mut values = vec![
            SqlValue::from(&self.partition.relay_chain),
            SqlValue::from(&self.partition.chain),
            SqlValue::BigInt(self.height),
            SqlValue::BigInt(self.timestamp),
            SqlValue::from(self.hash),
        ];
        values.extend(rest);
        values
    }
}

fn upsert_block(dialect: Dialect, parent: &BlockColumns<'_>, bundle: &BlockBundle) -> SqlQuery {
    let summary = &bundle.summary;
    let values = parent.with(vec![
        SqlValue::from(&summary.parent_hash),
        SqlValue::from(&summary.state_root),
        SqlValue::from(&summary.extrinsics_root),
        SqlValue::OptionalText(summary.author_id.clone()),
        SqlValue::Bool(summary.finalized),
        SqlValue::BigInt(summary.extrinsics_count.into()),
        SqlValue::BigInt(summary.events_count.into()),
        SqlValue::BigInt(summary.logs_count.into()),
    ]);

    // Partition and number form the conflict key, everything else is
    // replaced.
    let updates = BLOCK_COLUMNS
        .iter()
        .skip(3)
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder = SqlBuilder::new(dialect);
    builder
        .push("INSERT INTO ")
        .push(BLOCKS_TABLE)
        .push(" (")
        .push(&BLOCK_COLUMNS.join(", "))
        .push(") VALUES (")
        .bind_list(values)
        .push(") ON CONFLICT (relay_chain, chain, number) DO UPDATE SET ")
        .push(&updates);
    builder.build()
}

fn insert(dialect: Dialect, table: &str, columns: &[&str], values: Vec<SqlValue>) -> SqlQuery {
    debug_assert_eq!(columns.len(), values.len());
    let mut builder = SqlBuilder::new(dialect);
    builder
        .push("INSERT INTO ")
        .push(table)
        .push(" (")
        .push(&columns.join(", "))
        .push(") VALUES (")
        .bind_list(values)
        .push(")");
    builder.build()
}

fn extrinsic_values(extrinsic: &Extrinsic) -> Vec<SqlValue> {
    vec![
        SqlValue::Int(position(extrinsic.ordinal)),
        SqlValue::from(&extrinsic.extrinsic_id),
        SqlValue::from(&extrinsic.method.pallet),
        SqlValue::from(&extrinsic.method.method),
        SqlValue::Document(extrinsic.args.clone()),
        SqlValue::Document(extrinsic.info.clone()),
        SqlValue::OptionalText(extrinsic.extrinsic_hash.clone()),
        SqlValue::OptionalText(extrinsic.tip.clone()),
        SqlValue::OptionalText(extrinsic.nonce.clone()),
        SqlValue::Document(extrinsic.signature.clone()),
        SqlValue::Document(extrinsic.era.clone()),
        SqlValue::Bool(extrinsic.success),
        SqlValue::Bool(extrinsic.pays_fee),
        SqlValue::BigInt(extrinsic.event_count.into()),
    ]
}

fn event_values(event: &Event) -> Vec<SqlValue> {
    vec![
        SqlValue::Int(position(event.seq)),
        SqlValue::from(&event.event_id),
        SqlValue::OptionalText(event.extrinsic_id.clone()),
        SqlValue::from(&event.method.pallet),
        SqlValue::from(&event.method.method),
        SqlValue::Document(event.data.clone()),
        SqlValue::from(event.source.as_str()),
    ]
}

fn log_values(log: &Log) -> Vec<SqlValue> {
    vec![
        SqlValue::Int(position(log.position)),
        SqlValue::from(&log.log_type),
        SqlValue::from(&log.index),
        SqlValue::Document(log.value.clone()),
    ]
}

/// Reject bundles whose counters disagree with their rows.
fn check_counts(bundle: &BlockBundle) -> Result<(), StoreError> {
    let summary = &bundle.summary;

    check_count("extrinsics_count", summary.extrinsics_count, bundle.extrinsics.len())?;
    check_count("events_count", summary.events_count, bundle.events.len())?;
    check_count("logs_count", summary.logs_count, bundle.logs.len())?;

    let mut seqs = bundle.events.iter().map(|event| event.seq).collect::<Vec<_>>();
    seqs.sort_unstable();
    if !seqs.iter().copied().eq(1..=summary.events_count) {
        return Err(report!(StoreError::Rejected)
            .attach_printable(format!("event sequence is not 1..={}", summary.events_count))
            .attach_printable(format!("block: {}", summary.number)));
    }

    for extrinsic in &bundle.extrinsics {
        let own = bundle
            .events
            .iter()
            .filter(|event| event.extrinsic_id.as_deref() == Some(extrinsic.extrinsic_id.as_str()))
            .count();
        check_count(
            &format!("event_count of extrinsic {}", extrinsic.extrinsic_id),
            extrinsic.event_count,
            own,
        )?;
    }

    Ok(())
}

fn check_count(name: &str, declared: u32, rows: usize) -> Result<(), StoreError> {
    if usize::try_from(declared).ok() == Some(rows) {
        return Ok(());
    }
    Err(report!(StoreError::Rejected)
        .attach_printable(format!("{name} is {declared} but there are {rows} rows")))
}

/// Positions are stored in `INTEGER` columns.
fn position(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
