use async_trait::async_trait;
use dotlake_core::pagination::{clamp_limit, PageWindow};
use dotlake_core::{
    BlockSearch, BlockSummary, CallMethod, Event, EventFilter, EventSource, Extrinsic,
    ExtrinsicFilter, Log, Page, PageRequest, Partition,
};
use error_stack::{report, Result, ResultExt};

use crate::codec::DocumentCodec;
use crate::error::StoreError;
use crate::schema::{
    BLOCKS_TABLE, BLOCK_COLUMNS, EVENTS_TABLE, EVENT_COLUMNS, EXTRINSICS_TABLE,
    EXTRINSIC_COLUMNS, LOGS_TABLE, LOG_COLUMNS,
};
use crate::session::SqlSession;
use crate::sql::{Record, SqlBuilder};
use crate::{BlockQuery, Store};

type RowMapper<T> = fn(&Record, DocumentCodec) -> Result<T, StoreError>;

/// Child table read by a paginated block listing.
struct ChildRows {
    table: &'static str,
    columns: &'static [&'static str],
    order_by: &'static str,
}

#[async_trait]
impl<S: SqlSession> BlockQuery for Store<S> {
    async fn recent_blocks(
        &self,
        partition: &Partition,
        limit: u32,
    ) -> Result<Vec<BlockSummary>, StoreError> {
        let mut query = self.select(BLOCK_COLUMNS, BLOCKS_TABLE, partition);
        query
            .push(" ORDER BY number DESC LIMIT ")
            .bind(i64::from(clamp_limit(limit)));
        self.fetch_all(query, block_from_record).await
    }

    async fn block_by_number(
        &self,
        partition: &Partition,
        number: u64,
    ) -> Result<BlockSummary, StoreError> {
        let height = height(number)?;
        let mut query = self.select(BLOCK_COLUMNS, BLOCKS_TABLE, partition);
        query.push(" AND number = ").bind(height);
        self.fetch_all(query, block_from_record)
            .await?
            .pop()
            .ok_or_else(|| not_found(format!("block {number} in {partition}")))
    }

    async fn block_by_hash(
        &self,
        partition: &Partition,
        hash: &str,
    ) -> Result<BlockSummary, StoreError> {
        let mut query = self.select(BLOCK_COLUMNS, BLOCKS_TABLE, partition);
        query
            .push(" AND hash = ")
            .bind(hash)
            .push(" ORDER BY number DESC LIMIT 1");
        self.fetch_all(query, block_from_record)
            .await?
            .pop()
            .ok_or_else(|| not_found(format!("block with hash {hash} in {partition}")))
    }

    async fn search_blocks(
        &self,
        partition: &Partition,
        search: &BlockSearch,
        limit: u32,
    ) -> Result<Vec<BlockSummary>, StoreError> {
        let mut query = self.select(BLOCK_COLUMNS, BLOCKS_TABLE, partition);
        if let Some(number) = search.number {
            let Ok(height) = i64::try_from(number) else {
                return Ok(Vec::new());
            };
            query.push(" AND number = ").bind(height);
        }
        if let Some(hash) = &search.hash {
            query.push(" AND hash = ").bind(hash);
        }
        if let Some(author) = &search.author {
            query.push(" AND authorid = ").bind(author);
        }
        if let Some(finalized) = search.finalized {
            query.push(" AND finalized = ").bind(finalized);
        }
        query
            .push(" ORDER BY number DESC LIMIT ")
            .bind(i64::from(clamp_limit(limit)));
        self.fetch_all(query, block_from_record).await
    }

    async fn latest_block_number(&self, partition: &Partition) -> Result<Option<u64>, StoreError> {
        let mut query = SqlBuilder::new(self.session.dialect());
        query.push("SELECT MAX(number) AS latest FROM ").push(BLOCKS_TABLE);
        push_partition(&mut query, partition);

        let records = self.session.fetch(query.build()).await?;
        let Some(record) = records.first() else {
            return Ok(None);
        };
        match record.optional_int("latest")? {
            None => Ok(None),
            Some(latest) => u64::try_from(latest)
                .map(Some)
                .change_context(StoreError::Corrupt)
                .attach_printable_lazy(|| format!("negative block number {latest}")),
        }
    }

    async fn block_events(
        &self,
        partition: &Partition,
        number: u64,
        filter: &EventFilter,
        request: PageRequest,
    ) -> Result<Page<Event>, StoreError> {
        let child = ChildRows {
            table: EVENTS_TABLE,
            columns: EVENT_COLUMNS,
            order_by: "seq ASC",
        };
        self.fetch_page(
            partition,
            number,
            child,
            &|query: &mut SqlBuilder| push_event_filter(query, filter),
            event_from_record,
            request,
        )
        .await
    }

    async fn block_extrinsics(
        &self,
        partition: &Partition,
        number: u64,
        filter: &ExtrinsicFilter,
        request: PageRequest,
    ) -> Result<Page<Extrinsic>, StoreError> {
        let child = ChildRows {
            table: EXTRINSICS_TABLE,
            columns: EXTRINSIC_COLUMNS,
            order_by: "ordinal ASC",
        };
        self.fetch_page(
            partition,
            number,
            child,
            &|query: &mut SqlBuilder| push_extrinsic_filter(query, filter),
            extrinsic_from_record,
            request,
        )
        .await
    }

    async fn recent_extrinsics(
        &self,
        partition: &Partition,
        filter: &ExtrinsicFilter,
        limit: u32,
    ) -> Result<Vec<Extrinsic>, StoreError> {
        let mut query = self.select(EXTRINSIC_COLUMNS, EXTRINSICS_TABLE, partition);
        push_extrinsic_filter(&mut query, filter);
        query
            .push(" ORDER BY number DESC, ordinal DESC LIMIT ")
            .bind(i64::from(clamp_limit(limit)));
        self.fetch_all(query, extrinsic_from_record).await
    }

    async fn block_logs(
        &self,
        partition: &Partition,
        number: u64,
    ) -> Result<Vec<Log>, StoreError> {
        let height = self.ensure_block(partition, number).await?;
        let mut query = self.select(LOG_COLUMNS, LOGS_TABLE, partition);
        query
            .push(" AND number = ")
            .bind(height)
            .push(" ORDER BY position ASC");
        self.fetch_all(query, log_from_record).await
    }

    async fn extrinsic_by_hash(
        &self,
        partition: &Partition,
        hash: &str,
    ) -> Result<Extrinsic, StoreError> {
        let mut query = self.select(EXTRINSIC_COLUMNS, EXTRINSICS_TABLE, partition);
        query
            .push(" AND extrinsic_hash = ")
            .bind(hash)
            .push(" ORDER BY number DESC, ordinal DESC LIMIT 1");
        self.fetch_all(query, extrinsic_from_record)
            .await?
            .pop()
            .ok_or_else(|| not_found(format!("extrinsic with hash {hash} in {partition}")))
    }
}

impl<S: SqlSession> Store<S> {
    fn select(&self, columns: &[&str], table: &str, partition: &Partition) -> SqlBuilder {
        let mut query = SqlBuilder::new(self.session.dialect());
        query
            .push("SELECT ")
            .push(&columns.join(", "))
            .push(" FROM ")
            .push(table);
        push_partition(&mut query, partition);
        query
    }

    async fn fetch_all<T>(
        &self,
        query: SqlBuilder,
        mapper: RowMapper<T>,
    ) -> Result<Vec<T>, StoreError> {
        let codec = self.session.codec();
        let records = self.session.fetch(query.build()).await?;
        records
            .iter()
            .map(|record| mapper(record, codec))
            .collect()
    }

    /// One page of the child rows of a block.
    ///
    /// Items and total come from the same statement, so a concurrent
    /// re-ingestion cannot make them disagree. An empty page falls back to a
    /// single statement reading both the block existence and the total.
    async fn fetch_page<T>(
        &self,
        partition: &Partition,
        number: u64,
        child: ChildRows,
        filter: &(dyn Fn(&mut SqlBuilder) + Sync),
        mapper: RowMapper<T>,
        request: PageRequest,
    ) -> Result<Page<T>, StoreError> {
        let height = height(number)?;

        if let Some(window) = request.offset_window() {
            let mut query = SqlBuilder::new(self.session.dialect());
            query
                .push("SELECT ")
                .push(&child.columns.join(", "))
                .push(", COUNT(*) OVER () AS total FROM ")
                .push(child.table);
            push_partition(&mut query, partition);
            query.push(" AND number = ").bind(height);
            filter(&mut query);
            query.push(" ORDER BY ").push(child.order_by);
            push_window(&mut query, window);

            let codec = self.session.codec();
            let records = self.session.fetch(query.build()).await?;
            if let Some(first) = records.first() {
                let total = first.u64("total")?;
                let items = records
                    .iter()
                    .map(|record| mapper(record, codec))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Page::new(items, total, request));
            }
        }

        let mut query = SqlBuilder::new(self.session.dialect());
        query.push("SELECT (SELECT COUNT(*) FROM ").push(BLOCKS_TABLE);
        push_partition(&mut query, partition);
        query
            .push(" AND number = ")
            .bind(height)
            .push(") AS found, (SELECT COUNT(*) FROM ")
            .push(child.table);
        push_partition(&mut query, partition);
        query.push(" AND number = ").bind(height);
        filter(&mut query);
        query.push(") AS total");

        let records = self.session.fetch(query.build()).await?;
        let record = records
            .first()
            .ok_or_else(|| report!(StoreError::Corrupt).attach_printable("count returned no rows"))?;
        if record.int("found")? == 0 {
            return Err(not_found(format!("block {number} in {partition}")));
        }
        Ok(Page::empty(record.u64("total")?, request))
    }

    /// Returns the stored height of block `number`, or `NotFound`.
    async fn ensure_block(&self, partition: &Partition, number: u64) -> Result<i64, StoreError> {
        let height = height(number)?;
        let mut query = self.select(&["number"], BLOCKS_TABLE, partition);
        query.push(" AND number = ").bind(height);
        let records = self.session.fetch(query.build()).await?;
        if records.is_empty() {
            return Err(not_found(format!("block {number} in {partition}")));
        }
        Ok(height)
    }
}

fn push_partition(query: &mut SqlBuilder, partition: &Partition) {
    query
        .push(" WHERE relay_chain = ")
        .bind(&partition.relay_chain)
        .push(" AND chain = ")
        .bind(&partition.chain);
}

fn push_ignore_case(query: &mut SqlBuilder, column: &str, value: Option<&String>) {
    if let Some(value) = value {
        query
            .push(" AND LOWER(")
            .push(column)
            .push(") = ")
            .bind(value.to_lowercase());
    }
}

fn push_event_filter(query: &mut SqlBuilder, filter: &EventFilter) {
    push_ignore_case(query, "pallet", filter.pallet.as_ref());
    push_ignore_case(query, "method", filter.method.as_ref());
    if let Some(extrinsic_id) = &filter.extrinsic_id {
        query.push(" AND extrinsic_id = ").bind(extrinsic_id);
    }
}

fn push_extrinsic_filter(query: &mut SqlBuilder, filter: &ExtrinsicFilter) {
    push_ignore_case(query, "pallet", filter.pallet.as_ref());
    push_ignore_case(query, "method", filter.method.as_ref());
    if let Some(success) = filter.success {
        query.push(" AND success = ").bind(success);
    }
    if let Some(pays_fee) = filter.pays_fee {
        query.push(" AND pays_fee = ").bind(pays_fee);
    }
    if let Some(extrinsic_id) = &filter.extrinsic_id {
        query.push(" AND extrinsic_id = ").bind(extrinsic_id);
    }
}

fn push_window(query: &mut SqlBuilder, window: PageWindow) {
    query
        .push(" LIMIT ")
        .bind(i64::try_from(window.limit).unwrap_or(i64::MAX))
        .push(" OFFSET ")
        .bind(i64::try_from(window.offset).unwrap_or(i64::MAX));
}

/// Heights above `i64::MAX` cannot be stored.
fn height(number: u64) -> Result<i64, StoreError> {
    i64::try_from(number)
        .change_context(StoreError::NotFound)
        .attach_printable_lazy(|| format!("block number {number} out of range"))
}

fn not_found(what: String) -> error_stack::Report<StoreError> {
    report!(StoreError::NotFound).attach_printable(what)
}

fn block_from_record(record: &Record, _codec: DocumentCodec) -> Result<BlockSummary, StoreError> {
    Ok(BlockSummary {
        relay_chain: record.text("relay_chain")?,
        chain: record.text("chain")?,
        number: record.int("number")?.to_string(),
        hash: record.text("hash")?,
        parent_hash: record.text("parenthash")?,
        state_root: record.text("stateroot")?,
        extrinsics_root: record.text("extrinsicsroot")?,
        author_id: record.optional_text("authorid")?,
        finalized: record.bool("finalized")?,
        timestamp: record.int("timestamp")?,
        extrinsics_count: record.u32("extrinsics_count")?,
        events_count: record.u32("events_count")?,
        logs_count: record.u32("logs_count")?,
    })
}

fn extrinsic_from_record(record: &Record, codec: DocumentCodec) -> Result<Extrinsic, StoreError> {
    Ok(Extrinsic {
        number: record.int("number")?.to_string(),
        block_hash: record.text("hash")?,
        timestamp: record.int("timestamp")?,
        extrinsic_id: record.text("extrinsic_id")?,
        ordinal: record.u32("ordinal")?,
        method: CallMethod {
            pallet: record.text("pallet")?,
            method: record.text("method")?,
        },
        args: record.document("args", codec)?,
        info: record.document("info", codec)?,
        extrinsic_hash: record.optional_text("extrinsic_hash")?,
        tip: record.optional_text("tip")?,
        nonce: record.optional_text("nonce")?,
        signature: record.document("signature", codec)?,
        era: record.document("era", codec)?,
        success: record.bool("success")?,
        pays_fee: record.bool("pays_fee")?,
        event_count: record.u32("event_count")?,
    })
}

fn event_from_record(record: &Record, codec: DocumentCodec) -> Result<Event, StoreError> {
    let source = record.text("source")?;
    let source = source
        .parse::<EventSource>()
        .change_context(StoreError::Corrupt)?;
    Ok(Event {
        number: record.int("number")?.to_string(),
        block_hash: record.text("hash")?,
        timestamp: record.int("timestamp")?,
        event_id: record.text("event_id")?,
        seq: record.u32("seq")?,
        extrinsic_id: record.optional_text("extrinsic_id")?,
        method: CallMethod {
            pallet: record.text("pallet")?,
            method: record.text("method")?,
        },
        data: record.document("data", codec)?,
        source,
    })
}

fn log_from_record(record: &Record, codec: DocumentCodec) -> Result<Log, StoreError> {
    Ok(Log {
        number: record.int("number")?.to_string(),
        block_hash: record.text("hash")?,
        timestamp: record.int("timestamp")?,
        position: record.u32("position")?,
        log_type: record.text("type")?,
        index: record.text("index")?,
        value: record.document("value", codec)?,
    })
}
