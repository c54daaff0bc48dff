//! Operation catalog.
//!
//! [`service!`](crate::service!) holds the one declaration of every remote
//! operation and hands it to a generator macro. This crate generates the
//! `*Args` / `*Result` records and [`Operation`] from it; the client and
//! server crates generate their stubs and dispatch from the same table.

use crate::error::ProtocolError;
use crate::field::{read_struct, FieldSpec, Record, WireValue};
use crate::types::{
    AuthenticationException, AuthorizationException, InvalidRequestException, NotFoundException,
    SchemaDisagreementException, TimedOutException, UnavailableException,
};
use crate::wire::{ProtocolRead, ProtocolWrite, TType};
use thiserror::Error;

/// A declared exception returned by an operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequestException),
    #[error(transparent)]
    NotFound(#[from] NotFoundException),
    #[error(transparent)]
    Unavailable(#[from] UnavailableException),
    #[error(transparent)]
    TimedOut(#[from] TimedOutException),
    #[error(transparent)]
    Authentication(#[from] AuthenticationException),
    #[error(transparent)]
    Authorization(#[from] AuthorizationException),
    #[error(transparent)]
    SchemaDisagreement(#[from] SchemaDisagreementException),
}

impl OperationError {
    /// Record name of the carried exception.
    pub fn name(&self) -> &'static str {
        match self {
            OperationError::InvalidRequest(_) => InvalidRequestException::NAME,
            OperationError::NotFound(_) => NotFoundException::NAME,
            OperationError::Unavailable(_) => UnavailableException::NAME,
            OperationError::TimedOut(_) => TimedOutException::NAME,
            OperationError::Authentication(_) => AuthenticationException::NAME,
            OperationError::Authorization(_) => AuthorizationException::NAME,
            OperationError::SchemaDisagreement(_) => SchemaDisagreementException::NAME,
        }
    }

    /// Short label, suitable for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::InvalidRequest(_) => "invalid_request",
            OperationError::NotFound(_) => "not_found",
            OperationError::Unavailable(_) => "unavailable",
            OperationError::TimedOut(_) => "timed_out",
            OperationError::Authentication(_) => "authentication",
            OperationError::Authorization(_) => "authorization",
            OperationError::SchemaDisagreement(_) => "schema_disagreement",
        }
    }

    pub fn invalid_request(why: impl Into<String>) -> Self {
        OperationError::InvalidRequest(InvalidRequestException { why: why.into() })
    }
}

/// An exception record that can occupy a result slot.
pub trait DeclaredException: Record + Into<OperationError> {
    fn extract(err: &OperationError) -> Option<&Self>;
}

macro_rules! declared_exceptions {
    ($($variant:ident($ty:ty)),* $(,)?) => {$(
        impl DeclaredException for $ty {
            fn extract(err: &OperationError) -> Option<&Self> {
                match err {
                    OperationError::$variant(exception) => Some(exception),
                    _ => None,
                }
            }
        }
    )*};
}

declared_exceptions! {
    InvalidRequest(InvalidRequestException),
    NotFound(NotFoundException),
    Unavailable(UnavailableException),
    TimedOut(TimedOutException),
    Authentication(AuthenticationException),
    Authorization(AuthorizationException),
    SchemaDisagreement(SchemaDisagreementException),
}

/// Argument record of one operation.
pub trait Call: Record {
    /// Method name carried in the envelope.
    const METHOD: &'static str;
    const OPERATION: Operation;
    type Reply: Reply;
}

/// Result record of one operation.
pub trait Reply: Record {
    type Success;

    fn from_result(result: Result<Self::Success, OperationError>) -> Self;
    fn into_result(self) -> Result<Self::Success, OperationError>;
    /// Returns true if the operation declares the exception carried by `err`.
    fn declares(err: &OperationError) -> bool;
}

/// Success type of the operation whose arguments are `C`.
pub type Success<C> = <<C as Call>::Reply as Reply>::Success;

/// Declaration of every remote operation.
///
/// Expands to `$callback! { ... }` with one entry per operation:
///
/// ```text
/// method(send_method, recv_method) => Variant, MethodArgs, MethodResult {
///     <id>: required|optional <arg>: <type> [= <default>], ...
/// } returns (<type>) | () throws {
///     <id>: <slot>: <exception type>, ...
/// };
/// ```
#[macro_export]
macro_rules! service {
    ($callback:ident) => {
        $callback! {
            /// Authenticates the connection.
            login(send_login, recv_login) => Login, LoginArgs, LoginResult {
                1: required auth_request: $crate::types::AuthenticationRequest,
            } returns () throws {
                1: authnx: $crate::types::AuthenticationException,
                2: authzx: $crate::types::AuthorizationException,
            };

            /// Selects the keyspace used by later calls on the connection.
            set_keyspace(send_set_keyspace, recv_set_keyspace) => SetKeyspace, SetKeyspaceArgs, SetKeyspaceResult {
                1: required keyspace: String,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
            };

            /// Reads a single column or super column.
            get(send_get, recv_get) => Get, GetArgs, GetResult {
                1: required key: $crate::Bytes,
                2: required column_path: $crate::types::ColumnPath,
                3: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns ($crate::types::ColumnOrSuperColumn) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: nfe: $crate::types::NotFoundException,
                3: ue: $crate::types::UnavailableException,
                4: te: $crate::types::TimedOutException,
            };

            /// Reads the columns of one row selected by a predicate.
            get_slice(send_get_slice, recv_get_slice) => GetSlice, GetSliceArgs, GetSliceResult {
                1: required key: $crate::Bytes,
                2: required column_parent: $crate::types::ColumnParent,
                3: required predicate: $crate::types::SlicePredicate,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns (Vec<$crate::types::ColumnOrSuperColumn>) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Counts the columns of one row selected by a predicate.
            get_count(send_get_count, recv_get_count) => GetCount, GetCountArgs, GetCountResult {
                1: required key: $crate::Bytes,
                2: required column_parent: $crate::types::ColumnParent,
                3: required predicate: $crate::types::SlicePredicate,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns (i32) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Performs `get_slice` for several keys at once.
            multiget_slice(send_multiget_slice, recv_multiget_slice) => MultigetSlice, MultigetSliceArgs, MultigetSliceResult {
                1: required keys: Vec<$crate::Bytes>,
                2: required column_parent: $crate::types::ColumnParent,
                3: required predicate: $crate::types::SlicePredicate,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns (::std::collections::BTreeMap<$crate::Bytes, Vec<$crate::types::ColumnOrSuperColumn>>) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Performs `get_count` for several keys at once.
            multiget_count(send_multiget_count, recv_multiget_count) => MultigetCount, MultigetCountArgs, MultigetCountResult {
                1: required keys: Vec<$crate::Bytes>,
                2: required column_parent: $crate::types::ColumnParent,
                3: required predicate: $crate::types::SlicePredicate,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns (::std::collections::BTreeMap<$crate::Bytes, i32>) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Reads a slice from every row in a key or token range.
            get_range_slices(send_get_range_slices, recv_get_range_slices) => GetRangeSlices, GetRangeSlicesArgs, GetRangeSlicesResult {
                1: required column_parent: $crate::types::ColumnParent,
                2: required predicate: $crate::types::SlicePredicate,
                3: required range: $crate::types::KeyRange,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns (Vec<$crate::types::KeySlice>) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Pages through a column family, resuming at `start_column`.
            get_paged_slice(send_get_paged_slice, recv_get_paged_slice) => GetPagedSlice, GetPagedSliceArgs, GetPagedSliceResult {
                1: required column_family: String,
                2: required range: $crate::types::KeyRange,
                3: required start_column: $crate::Bytes,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns (Vec<$crate::types::KeySlice>) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Reads rows matching a secondary index clause.
            get_indexed_slices(send_get_indexed_slices, recv_get_indexed_slices) => GetIndexedSlices, GetIndexedSlicesArgs, GetIndexedSlicesResult {
                1: required column_parent: $crate::types::ColumnParent,
                2: required index_clause: $crate::types::IndexClause,
                3: required column_predicate: $crate::types::SlicePredicate,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns (Vec<$crate::types::KeySlice>) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Writes one column.
            insert(send_insert, recv_insert) => Insert, InsertArgs, InsertResult {
                1: required key: $crate::Bytes,
                2: required column_parent: $crate::types::ColumnParent,
                3: required column: $crate::types::Column,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Increments a counter column.
            add(send_add, recv_add) => Add, AddArgs, AddResult {
                1: required key: $crate::Bytes,
                2: required column_parent: $crate::types::ColumnParent,
                3: required column: $crate::types::CounterColumn,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Deletes data older than `timestamp` at a path.
            remove(send_remove, recv_remove) => Remove, RemoveArgs, RemoveResult {
                1: required key: $crate::Bytes,
                2: required column_path: $crate::types::ColumnPath,
                3: required timestamp: i64,
                4: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Deletes a counter column.
            remove_counter(send_remove_counter, recv_remove_counter) => RemoveCounter, RemoveCounterArgs, RemoveCounterResult {
                1: required key: $crate::Bytes,
                2: required path: $crate::types::ColumnPath,
                3: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Applies mutations keyed by row key, then by column family.
            batch_mutate(send_batch_mutate, recv_batch_mutate) => BatchMutate, BatchMutateArgs, BatchMutateResult {
                1: required mutation_map: ::std::collections::BTreeMap<$crate::Bytes, ::std::collections::BTreeMap<String, Vec<$crate::types::Mutation>>>,
                2: optional consistency_level: $crate::types::ConsistencyLevel = $crate::types::ConsistencyLevel::ONE,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Removes all data from a column family.
            truncate(send_truncate, recv_truncate) => Truncate, TruncateArgs, TruncateResult {
                1: required cfname: String,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
            };

            /// Maps schema versions to the endpoints reporting them.
            describe_schema_versions(send_describe_schema_versions, recv_describe_schema_versions) => DescribeSchemaVersions, DescribeSchemaVersionsArgs, DescribeSchemaVersionsResult {
            } returns (::std::collections::BTreeMap<String, Vec<String>>) throws {
                1: ire: $crate::types::InvalidRequestException,
            };

            describe_keyspaces(send_describe_keyspaces, recv_describe_keyspaces) => DescribeKeyspaces, DescribeKeyspacesArgs, DescribeKeyspacesResult {
            } returns (Vec<$crate::types::KsDef>) throws {
                1: ire: $crate::types::InvalidRequestException,
            };

            describe_cluster_name(send_describe_cluster_name, recv_describe_cluster_name) => DescribeClusterName, DescribeClusterNameArgs, DescribeClusterNameResult {
            } returns (String) throws {};

            /// Returns the interface version of the server.
            describe_version(send_describe_version, recv_describe_version) => DescribeVersion, DescribeVersionArgs, DescribeVersionResult {
            } returns (String) throws {};

            /// Returns the token ranges of a keyspace and their endpoints.
            describe_ring(send_describe_ring, recv_describe_ring) => DescribeRing, DescribeRingArgs, DescribeRingResult {
                1: required keyspace: String,
            } returns (Vec<$crate::types::TokenRange>) throws {
                1: ire: $crate::types::InvalidRequestException,
            };

            describe_token_map(send_describe_token_map, recv_describe_token_map) => DescribeTokenMap, DescribeTokenMapArgs, DescribeTokenMapResult {
            } returns (::std::collections::BTreeMap<String, String>) throws {
                1: ire: $crate::types::InvalidRequestException,
            };

            describe_partitioner(send_describe_partitioner, recv_describe_partitioner) => DescribePartitioner, DescribePartitionerArgs, DescribePartitionerResult {
            } returns (String) throws {};

            describe_snitch(send_describe_snitch, recv_describe_snitch) => DescribeSnitch, DescribeSnitchArgs, DescribeSnitchResult {
            } returns (String) throws {};

            describe_keyspace(send_describe_keyspace, recv_describe_keyspace) => DescribeKeyspace, DescribeKeyspaceArgs, DescribeKeyspaceResult {
                1: required keyspace: String,
            } returns ($crate::types::KsDef) throws {
                1: nfe: $crate::types::NotFoundException,
                2: ire: $crate::types::InvalidRequestException,
            };

            /// Splits a token range into chunks of roughly `keys_per_split` keys.
            describe_splits(send_describe_splits, recv_describe_splits) => DescribeSplits, DescribeSplitsArgs, DescribeSplitsResult {
                1: required cf_name: String,
                2: required start_token: String,
                3: required end_token: String,
                4: required keys_per_split: i32,
            } returns (Vec<String>) throws {
                1: ire: $crate::types::InvalidRequestException,
            };

            system_add_column_family(send_system_add_column_family, recv_system_add_column_family) => SystemAddColumnFamily, SystemAddColumnFamilyArgs, SystemAddColumnFamilyResult {
                1: required cf_def: $crate::types::CfDef,
            } returns (String) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: sde: $crate::types::SchemaDisagreementException,
            };

            system_drop_column_family(send_system_drop_column_family, recv_system_drop_column_family) => SystemDropColumnFamily, SystemDropColumnFamilyArgs, SystemDropColumnFamilyResult {
                1: required column_family: String,
            } returns (String) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: sde: $crate::types::SchemaDisagreementException,
            };

            system_add_keyspace(send_system_add_keyspace, recv_system_add_keyspace) => SystemAddKeyspace, SystemAddKeyspaceArgs, SystemAddKeyspaceResult {
                1: required ks_def: $crate::types::KsDef,
            } returns (String) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: sde: $crate::types::SchemaDisagreementException,
            };

            system_drop_keyspace(send_system_drop_keyspace, recv_system_drop_keyspace) => SystemDropKeyspace, SystemDropKeyspaceArgs, SystemDropKeyspaceResult {
                1: required keyspace: String,
            } returns (String) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: sde: $crate::types::SchemaDisagreementException,
            };

            system_update_keyspace(send_system_update_keyspace, recv_system_update_keyspace) => SystemUpdateKeyspace, SystemUpdateKeyspaceArgs, SystemUpdateKeyspaceResult {
                1: required ks_def: $crate::types::KsDef,
            } returns (String) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: sde: $crate::types::SchemaDisagreementException,
            };

            system_update_column_family(send_system_update_column_family, recv_system_update_column_family) => SystemUpdateColumnFamily, SystemUpdateColumnFamilyArgs, SystemUpdateColumnFamilyResult {
                1: required cf_def: $crate::types::CfDef,
            } returns (String) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: sde: $crate::types::SchemaDisagreementException,
            };

            /// Executes a CQL statement.
            execute_cql_query(send_execute_cql_query, recv_execute_cql_query) => ExecuteCqlQuery, ExecuteCqlQueryArgs, ExecuteCqlQueryResult {
                1: required query: $crate::Bytes,
                2: required compression: $crate::types::Compression,
            } returns ($crate::types::CqlResult) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
                4: sde: $crate::types::SchemaDisagreementException,
            };

            /// Prepares a CQL statement for later execution by id.
            prepare_cql_query(send_prepare_cql_query, recv_prepare_cql_query) => PrepareCqlQuery, PrepareCqlQueryArgs, PrepareCqlQueryResult {
                1: required query: $crate::Bytes,
                2: required compression: $crate::types::Compression,
            } returns ($crate::types::CqlPreparedResult) throws {
                1: ire: $crate::types::InvalidRequestException,
            };

            execute_prepared_cql_query(send_execute_prepared_cql_query, recv_execute_prepared_cql_query) => ExecutePreparedCqlQuery, ExecutePreparedCqlQueryArgs, ExecutePreparedCqlQueryResult {
                1: required item_id: i32,
                2: required values: Vec<$crate::Bytes>,
            } returns ($crate::types::CqlResult) throws {
                1: ire: $crate::types::InvalidRequestException,
                2: ue: $crate::types::UnavailableException,
                3: te: $crate::types::TimedOutException,
                4: sde: $crate::types::SchemaDisagreementException,
            };

            set_cql_version(send_set_cql_version, recv_set_cql_version) => SetCqlVersion, SetCqlVersionArgs, SetCqlVersionResult {
                1: required version: String,
            } returns () throws {
                1: ire: $crate::types::InvalidRequestException,
            };
        }
    };
}

macro_rules! ok_ty {
    (()) => { () };
    (($ty:ty)) => { $ty };
}

macro_rules! result_fields {
    ((); $($id:literal $slot:ident),*) => {
        &[
            $( FieldSpec { id: $id, name: stringify!($slot), ttype: TType::Struct }, )*
        ]
    };
    (($ty:ty); $($id:literal $slot:ident),*) => {
        &[
            FieldSpec { id: 0, name: "success", ttype: <$ty as WireValue>::TTYPE },
            $( FieldSpec { id: $id, name: stringify!($slot), ttype: TType::Struct }, )*
        ]
    };
}

macro_rules! write_success {
    ((), $w:ident, $value:ident) => {
        let _ = $value;
    };
    (($ty:ty), $w:ident, $value:ident) => {
        $w.write_field_begin("success", <$ty as WireValue>::TTYPE, 0)?;
        WireValue::write($value, $w)?;
        $w.write_field_end()?;
    };
}

macro_rules! read_success {
    ((), $r:ident, $field_id:ident, $slot:ident) => {};
    (($ty:ty), $r:ident, $field_id:ident, $slot:ident) => {
        if $field_id == 0 {
            $slot = Some(<$ty as WireValue>::read($r)?);
        }
    };
}

macro_rules! finish_success {
    ((), $slot:ident, $method:ident) => {
        Ok::<(), ProtocolError>(())
    };
    (($ty:ty), $slot:ident, $method:ident) => {
        $slot.ok_or(ProtocolError::MissingResult {
            method: stringify!($method),
        })
    };
}

macro_rules! define_operation_records {
    (@operation $method:ident, $variant:ident, $args:ident, $result:ident,
        { $($id:literal : $kind:ident $arg:ident : $argty:ty $(= $default:expr)?),* $(,)? },
        $ret:tt,
        { $($xid:literal : $slot:ident : $xty:ty),* $(,)? }
    ) => {
        wire_struct! {
            #[doc = concat!("Arguments of `", stringify!($method), "`.")]
            pub struct $args {
                $( $id: $kind $arg: $argty $(= $default)?, )*
            }
        }

        impl Call for $args {
            const METHOD: &'static str = stringify!($method);
            const OPERATION: Operation = Operation::$variant;
            type Reply = $result;
        }

        #[doc = concat!("Result of `", stringify!($method), "`: the success value or a declared exception.")]
        #[derive(Debug, Clone, PartialEq)]
        pub struct $result(pub Result<ok_ty!($ret), OperationError>);

        impl Reply for $result {
            type Success = ok_ty!($ret);

            fn from_result(result: Result<Self::Success, OperationError>) -> Self {
                Self(result)
            }

            fn into_result(self) -> Result<Self::Success, OperationError> {
                self.0
            }

            #[allow(unused_variables)]
            fn declares(err: &OperationError) -> bool {
                $(
                    if <$xty as DeclaredException>::extract(err).is_some() {
                        return true;
                    }
                )*
                false
            }
        }

        impl Record for $result {
            const NAME: &'static str = stringify!($result);
            const FIELDS: &'static [FieldSpec] = result_fields!($ret; $($xid $slot),*);

            fn encode<W: ProtocolWrite>(&self, w: &mut W) -> Result<(), ProtocolError> {
                w.write_struct_begin(Self::NAME)?;
                match &self.0 {
                    Ok(value) => {
                        write_success!($ret, w, value);
                    }
                    Err(err) => {
                        $(
                            if let Some(exception) = <$xty as DeclaredException>::extract(err) {
                                w.write_field_begin(stringify!($slot), TType::Struct, $xid)?;
                                exception.encode(w)?;
                                w.write_field_end()?;
                            } else
                        )* {
                            return Err(ProtocolError::UndeclaredException {
                                method: stringify!($method),
                                exception: err.name(),
                            });
                        }
                    }
                }
                w.write_field_stop()?;
                w.write_struct_end()
            }

            #[allow(unused_mut, unused_variables)]
            fn decode<R: ProtocolRead>(r: &mut R) -> Result<Self, ProtocolError> {
                let mut success: Option<ok_ty!($ret)> = None;
                $( let mut $slot: Option<$xty> = None; )*
                read_struct(r, Self::NAME, Self::FIELDS, |r, field_id| {
                    read_success!($ret, r, field_id, success);
                    $(
                        if field_id == $xid {
                            $slot = Some(<$xty as WireValue>::read(r)?);
                        }
                    )*
                    Ok(())
                })?;

                // Highest populated id wins.
                let mut declared: Option<OperationError> = None;
                $(
                    if let Some(exception) = $slot {
                        declared = Some(exception.into());
                    }
                )*
                match declared {
                    Some(err) => Ok(Self(Err(err))),
                    None => finish_success!($ret, success, $method).map(|value| Self(Ok(value))),
                }
            }
        }
    };

    ($(
        $(#[$doc:meta])*
        $method:ident ($send:ident, $recv:ident) => $variant:ident, $args:ident, $result:ident {
            $($arg_fields:tt)*
        } returns $ret:tt throws {
            $($throws:tt)*
        };
    )*) => {
        /// Remote operations, one per method name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operation {
            $( $(#[$doc])* $variant, )*
        }

        impl Operation {
            /// Every operation, in declaration order.
            pub const ALL: &'static [Operation] = &[$(Operation::$variant),*];

            /// Method name carried in the envelope.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Operation::$variant => stringify!($method), )*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( stringify!($method) => Some(Operation::$variant), )*
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for Operation {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }

        $(
            define_operation_records! {
                @operation $method, $variant, $args, $result,
                { $($arg_fields)* },
                $ret,
                { $($throws)* }
            }
        )*
    };
}

service!(define_operation_records);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BinaryReader, BinaryWriter};
    use crate::types::{Column, ColumnOrSuperColumn, ColumnPath, ConsistencyLevel, Deletion, Mutation};
    use bytes::Bytes;
    use std::collections::BTreeMap;

    fn encode<T: Record>(value: &T) -> BinaryWriter {
        let mut w = BinaryWriter::new();
        value.encode(&mut w).unwrap();
        w
    }

    fn decode<T: Record>(w: BinaryWriter) -> Result<T, ProtocolError> {
        T::decode(&mut BinaryReader::new(w.into_bytes()))
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::ALL.len(), 36);
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(*op));
        }
        assert_eq!(Operation::GetSlice.name(), "get_slice");
        assert_eq!(Operation::from_name("frobnicate"), None);
        assert_eq!(GetArgs::METHOD, "get");
        assert_eq!(GetArgs::OPERATION, Operation::Get);
    }

    #[test]
    fn test_args_field_layout() {
        let ids: Vec<i16> = GetSliceArgs::FIELDS.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(GetSliceArgs::FIELDS[3].name, "consistency_level");
        assert_eq!(GetSliceArgs::FIELDS[3].ttype, TType::I32);

        let ids: Vec<i16> = GetResult::FIELDS.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(InsertResult::FIELDS.iter().all(|f| f.id != 0));
        assert!(DescribeVersionResult::FIELDS.len() == 1);
    }

    #[test]
    fn test_consistency_level_defaults_to_one() {
        assert_eq!(
            GetArgs::default().consistency_level,
            Some(ConsistencyLevel::ONE)
        );

        // An absent level reads back as ONE.
        let args = GetArgs {
            key: Bytes::from_static(b"k"),
            column_path: ColumnPath::new("Standard1"),
            consistency_level: None,
        };
        let decoded = decode::<GetArgs>(encode(&args)).unwrap();
        assert_eq!(decoded.consistency_level, Some(ConsistencyLevel::ONE));
    }

    #[test]
    fn test_batch_mutate_roundtrip() {
        let mut by_cf = BTreeMap::new();
        by_cf.insert(
            "Standard1".to_string(),
            vec![
                Mutation::insert(Column::new(&b"c1"[..], &b"v1"[..], 1)),
                Mutation::delete(Deletion {
                    timestamp: Some(2),
                    ..Deletion::default()
                }),
            ],
        );
        let mut mutation_map = BTreeMap::new();
        mutation_map.insert(Bytes::from_static(b"row1"), by_cf);

        let args = BatchMutateArgs {
            mutation_map,
            consistency_level: Some(ConsistencyLevel::QUORUM),
        };
        let decoded = decode::<BatchMutateArgs>(encode(&args)).unwrap();
        assert_eq!(decoded, args);

        let mutations = &decoded.mutation_map[&Bytes::from_static(b"row1")]["Standard1"];
        assert_eq!(mutations.len(), 2);
        assert!(mutations[0].column_or_supercolumn.is_some());
        assert_eq!(mutations[1].deletion.as_ref().unwrap().timestamp, Some(2));
    }

    #[test]
    fn test_void_success_is_empty_struct() {
        let w = encode(&InsertResult(Ok(())));
        assert_eq!(w.as_bytes(), &[0]);
        assert_eq!(decode::<InsertResult>(w).unwrap(), InsertResult(Ok(())));
    }

    #[test]
    fn test_success_roundtrip() {
        let result = GetResult(Ok(ColumnOrSuperColumn {
            column: Some(Column::new(&b"name"[..], &b"value"[..], 7)),
            ..ColumnOrSuperColumn::default()
        }));
        assert_eq!(decode::<GetResult>(encode(&result)).unwrap(), result);
    }

    #[test]
    fn test_declared_exception_roundtrip() {
        let result = GetResult(Err(NotFoundException {}.into()));
        let w = encode(&result);
        // field header (STRUCT, 2), empty struct, stop
        assert_eq!(w.as_bytes(), &[12, 0, 2, 0, 0]);
        assert_eq!(decode::<GetResult>(w).unwrap(), result);
    }

    #[test]
    fn test_undeclared_exception_rejected() {
        let result = DescribeRingResult(Err(TimedOutException {}.into()));
        let mut w = BinaryWriter::new();
        let err = result.encode(&mut w).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UndeclaredException {
                method: "describe_ring",
                exception: "TimedOutException"
            }
        ));
    }

    #[test]
    fn test_highest_exception_id_wins() {
        let mut w = BinaryWriter::new();
        w.write_field_begin("success", TType::I32, 0).unwrap();
        w.write_i32(5).unwrap();
        w.write_field_begin("te", TType::Struct, 3).unwrap();
        TimedOutException {}.encode(&mut w).unwrap();
        w.write_field_begin("ire", TType::Struct, 1).unwrap();
        InvalidRequestException {
            why: "bad".to_string(),
        }
        .encode(&mut w)
        .unwrap();
        w.write_field_stop().unwrap();

        let decoded = decode::<GetCountResult>(w).unwrap();
        assert_eq!(decoded.0, Err(OperationError::TimedOut(TimedOutException {})));
    }

    #[test]
    fn test_missing_result() {
        let mut w = BinaryWriter::new();
        w.write_field_stop().unwrap();
        assert!(matches!(
            decode::<DescribeVersionResult>(w),
            Err(ProtocolError::MissingResult {
                method: "describe_version"
            })
        ));
    }

    #[test]
    fn test_declares() {
        let nfe: OperationError = NotFoundException {}.into();
        assert!(GetResult::declares(&nfe));
        assert!(!GetSliceResult::declares(&nfe));
        assert!(!DescribeVersionResult::declares(&nfe));
        assert!(DescribeKeyspaceResult::declares(&nfe));
    }

    #[test]
    fn test_operation_error_labels() {
        let err = OperationError::invalid_request("Keyspace does not exist");
        assert_eq!(err.name(), "InvalidRequestException");
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(err.to_string(), "invalid request: Keyspace does not exist");
    }
}
