//! Domain types of the column-family interface.

use bytes::Bytes;
use std::collections::BTreeMap;

wire_enum! {
    /// Number of replicas that must acknowledge a read or write.
    pub enum ConsistencyLevel {
        ONE = 1,
        QUORUM = 2,
        LOCAL_QUORUM = 3,
        EACH_QUORUM = 4,
        ALL = 5,
        ANY = 6,
        TWO = 7,
        THREE = 8,
    }

    pub enum IndexOperator {
        EQ = 0,
        GTE = 1,
        GT = 2,
        LTE = 3,
        LT = 4,
    }

    pub enum IndexType {
        KEYS = 0,
        CUSTOM = 1,
    }

    /// Compression applied to a CQL query string.
    pub enum Compression {
        GZIP = 1,
        NONE = 2,
    }

    pub enum CqlResultType {
        ROWS = 1,
        VOID = 2,
        INT = 3,
    }
}

wire_struct! {
    /// The basic unit of data: a name, a value and a client timestamp.
    pub struct Column {
        1: required name: Bytes,
        2: optional value: Bytes,
        3: optional timestamp: i64,
        /// Seconds until the column expires.
        4: optional ttl: i32,
    }

    /// A named group of columns.
    pub struct SuperColumn {
        1: required name: Bytes,
        2: required columns: Vec<Column>,
    }

    pub struct CounterColumn {
        1: required name: Bytes,
        2: required value: i64,
    }

    pub struct CounterSuperColumn {
        1: required name: Bytes,
        2: required columns: Vec<CounterColumn>,
    }

    /// Exactly one of the four members is expected to be set.
    pub struct ColumnOrSuperColumn {
        1: optional column: Column,
        2: optional super_column: SuperColumn,
        3: optional counter_column: CounterColumn,
        4: optional counter_super_column: CounterSuperColumn,
    }

    #[derive(thiserror::Error)]
    #[error("not found")]
    pub struct NotFoundException {}

    #[derive(thiserror::Error)]
    #[error("invalid request: {why}")]
    pub struct InvalidRequestException {
        1: required why: String,
    }

    #[derive(thiserror::Error)]
    #[error("unavailable")]
    pub struct UnavailableException {}

    #[derive(thiserror::Error)]
    #[error("timed out")]
    pub struct TimedOutException {}

    #[derive(thiserror::Error)]
    #[error("authentication failed: {why}")]
    pub struct AuthenticationException {
        1: required why: String,
    }

    #[derive(thiserror::Error)]
    #[error("not authorized: {why}")]
    pub struct AuthorizationException {
        1: required why: String,
    }

    #[derive(thiserror::Error)]
    #[error("schema disagreement")]
    pub struct SchemaDisagreementException {}

    /// Column family, and optionally super column, holding a set of columns.
    pub struct ColumnParent {
        3: required column_family: String,
        4: optional super_column: Bytes,
    }

    /// Path to a single column or super column.
    pub struct ColumnPath {
        3: required column_family: String,
        4: optional super_column: Bytes,
        5: optional column: Bytes,
    }

    pub struct SliceRange {
        1: required start: Bytes,
        2: required finish: Bytes,
        3: required reversed: bool = false,
        4: required count: i32 = 100,
    }

    /// Selects columns either by name or by range.
    pub struct SlicePredicate {
        1: optional column_names: Vec<Bytes>,
        2: optional slice_range: SliceRange,
    }

    pub struct IndexExpression {
        1: required column_name: Bytes,
        2: required op: IndexOperator,
        3: required value: Bytes,
    }

    pub struct IndexClause {
        1: required expressions: Vec<IndexExpression>,
        2: required start_key: Bytes,
        3: required count: i32 = 100,
    }

    /// Range of rows, by key or by token.
    pub struct KeyRange {
        1: optional start_key: Bytes,
        2: optional end_key: Bytes,
        3: optional start_token: String,
        4: optional end_token: String,
        5: required count: i32 = 100,
        6: optional row_filter: Vec<IndexExpression>,
    }

    pub struct KeySlice {
        1: required key: Bytes,
        2: required columns: Vec<ColumnOrSuperColumn>,
    }

    pub struct KeyCount {
        1: required key: Bytes,
        2: required count: i32,
    }

    pub struct Deletion {
        1: optional timestamp: i64,
        2: optional super_column: Bytes,
        3: optional predicate: SlicePredicate,
    }

    /// Either an insertion or a deletion.
    pub struct Mutation {
        1: optional column_or_supercolumn: ColumnOrSuperColumn,
        2: optional deletion: Deletion,
    }

    pub struct EndpointDetails {
        1: optional host: String,
        2: optional datacenter: String,
        3: optional rack: String,
    }

    /// A token range and the endpoints that replicate it.
    pub struct TokenRange {
        1: required start_token: String,
        2: required end_token: String,
        3: required endpoints: Vec<String>,
        4: optional rpc_endpoints: Vec<String>,
        5: optional endpoint_details: Vec<EndpointDetails>,
    }

    pub struct AuthenticationRequest {
        1: required credentials: BTreeMap<String, String>,
    }

    pub struct ColumnDef {
        1: required name: Bytes,
        2: required validation_class: String,
        3: optional index_type: IndexType,
        4: optional index_name: String,
        5: optional index_options: BTreeMap<String, String>,
    }

    /// Column family definition.
    pub struct CfDef {
        1: required keyspace: String,
        2: required name: String,
        3: optional column_type: String = "Standard",
        5: optional comparator_type: String = "BytesType",
        6: optional subcomparator_type: String,
        8: optional comment: String,
        12: optional read_repair_chance: f64,
        13: optional column_metadata: Vec<ColumnDef>,
        14: optional gc_grace_seconds: i32,
        15: optional default_validation_class: String,
        16: optional id: i32,
        17: optional min_compaction_threshold: i32,
        18: optional max_compaction_threshold: i32,
        24: optional replicate_on_write: bool,
        26: optional key_validation_class: String,
        28: optional key_alias: Bytes,
        29: optional compaction_strategy: String,
        30: optional compaction_strategy_options: BTreeMap<String, String>,
        32: optional compression_options: BTreeMap<String, String>,
        33: optional bloom_filter_fp_chance: f64,
        34: optional caching: String = "keys_only",
        37: optional dclocal_read_repair_chance: f64 = 0.0,
    }

    /// Keyspace definition.
    pub struct KsDef {
        1: required name: String,
        2: required strategy_class: String,
        3: optional strategy_options: BTreeMap<String, String>,
        4: optional replication_factor: i32,
        5: required cf_defs: Vec<CfDef>,
        6: optional durable_writes: bool = true,
    }

    pub struct CqlRow {
        1: required key: Bytes,
        2: required columns: Vec<Column>,
    }

    pub struct CqlMetadata {
        1: required name_types: BTreeMap<Bytes, String>,
        2: required value_types: BTreeMap<Bytes, String>,
        3: required default_name_type: String,
        4: required default_value_type: String,
    }

    pub struct CqlResult {
        1: required result_type: CqlResultType,
        2: optional rows: Vec<CqlRow>,
        3: optional num: i32,
        4: optional schema: CqlMetadata,
    }

    pub struct CqlPreparedResult {
        1: required item_id: i32,
        2: required count: i32,
        3: optional variable_types: Vec<String>,
        4: optional variable_names: Vec<String>,
    }
}

impl Column {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            timestamp: Some(timestamp),
            ttl: None,
        }
    }
}

impl ColumnParent {
    pub fn new(column_family: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
            super_column: None,
        }
    }
}

impl ColumnPath {
    pub fn new(column_family: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
            super_column: None,
            column: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<Bytes>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl SlicePredicate {
    /// Selects the named columns.
    pub fn names(names: Vec<Bytes>) -> Self {
        Self {
            column_names: Some(names),
            slice_range: None,
        }
    }

    /// Selects up to `count` columns between `start` and `finish`; empty bounds are open.
    pub fn range(start: impl Into<Bytes>, finish: impl Into<Bytes>, count: i32) -> Self {
        Self {
            column_names: None,
            slice_range: Some(SliceRange {
                start: start.into(),
                finish: finish.into(),
                reversed: false,
                count,
            }),
        }
    }
}

impl Mutation {
    pub fn insert(column: Column) -> Self {
        Self {
            column_or_supercolumn: Some(ColumnOrSuperColumn {
                column: Some(column),
                ..ColumnOrSuperColumn::default()
            }),
            deletion: None,
        }
    }

    pub fn delete(deletion: Deletion) -> Self {
        Self {
            column_or_supercolumn: None,
            deletion: Some(deletion),
        }
    }
}
