//! Message dispatch.
//!
//! A [`Processor`] reads one message from a protocol reader, runs the
//! matching [`Handler`] method and writes the reply, if any, to a protocol
//! writer. It holds no per-connection state and is shared by every
//! connection task.

use crate::handler::{Handler, HandlerError};
use crate::metrics::Metrics;
use colrpc_protocol::service::*;
use colrpc_protocol::{
    envelope, ApplicationException, ApplicationExceptionKind, MessageHeader, MessageType,
    ProtocolError, ProtocolRead, ProtocolWrite, Record, TType,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Dispatches incoming calls to a [`Handler`].
pub struct Processor<H> {
    handler: H,
    operations: HashMap<&'static str, Operation>,
    metrics: Option<Arc<Metrics>>,
}

impl<H: Handler> Processor<H> {
    pub fn new(handler: H) -> Self {
        let operations = Operation::ALL
            .iter()
            .map(|operation| (operation.name(), *operation))
            .collect();
        Self {
            handler,
            operations,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Looks up an operation by its method name.
    pub fn operation(&self, name: &str) -> Option<Operation> {
        self.operations.get(name).copied()
    }

    /// Processes one message.
    ///
    /// Returns `Ok(true)` when the handler succeeded or returned a declared
    /// exception, `Ok(false)` when an application exception was written
    /// instead, and `Err` when the request could not be decoded. In the last
    /// case a `PROTOCOL_ERROR` exception has already been written and the
    /// connection should be closed.
    pub async fn process<R, W>(&self, input: &mut R, output: &mut W) -> Result<bool, ProtocolError>
    where
        R: ProtocolRead + Send,
        W: ProtocolWrite + Send,
    {
        let header = input.read_message_begin()?;
        let oneway = match header.message_type {
            MessageType::Call => false,
            MessageType::Oneway => true,
            other => {
                tracing::warn!(
                    "Unexpected {} message for {} (seq_id={})",
                    other,
                    header.name,
                    header.seq_id
                );
                self.record_error("invalid_message_type");
                write_failure(
                    output,
                    &header,
                    ApplicationExceptionKind::INVALID_MESSAGE_TYPE,
                    format!("Unexpected message type {}", other),
                )?;
                return Ok(false);
            }
        };

        let operation = match self.operation(&header.name) {
            Some(operation) => operation,
            None => {
                input.skip(TType::Struct)?;
                input.read_message_end()?;
                tracing::warn!("Unknown function {} (seq_id={})", header.name, header.seq_id);
                self.record_error("unknown_method");
                if !oneway {
                    write_failure(
                        output,
                        &header,
                        ApplicationExceptionKind::UNKNOWN_METHOD,
                        format!("Unknown function {}", header.name),
                    )?;
                }
                return Ok(false);
            }
        };

        tracing::debug!("Dispatching {} (seq_id={})", operation, header.seq_id);
        let started = Instant::now();
        let result = self.dispatch(operation, &header, oneway, input, output).await;

        if let Some(metrics) = &self.metrics {
            metrics
                .requests_total
                .with_label_values(&[operation.name()])
                .inc();
            metrics
                .request_duration
                .with_label_values(&[operation.name()])
                .observe(started.elapsed().as_secs_f64());
        }

        result
    }

    /// Decodes the arguments of `C`. A decode failure is answered with
    /// `PROTOCOL_ERROR` and returned.
    fn read_args<C, R, W>(
        &self,
        header: &MessageHeader,
        oneway: bool,
        input: &mut R,
        output: &mut W,
    ) -> Result<C, ProtocolError>
    where
        C: Call,
        R: ProtocolRead,
        W: ProtocolWrite,
    {
        let decoded = match C::decode(input) {
            Ok(args) => input.read_message_end().map(|()| args),
            Err(e) => Err(e),
        };

        decoded.or_else(|e| {
            tracing::warn!("Failed to decode {} arguments: {}", C::METHOD, e);
            self.record_error("protocol_error");
            if !oneway {
                write_failure(
                    output,
                    header,
                    ApplicationExceptionKind::PROTOCOL_ERROR,
                    e.to_string(),
                )?;
            }
            Err(e)
        })
    }

    /// Writes the reply of `C` for a handler outcome.
    fn write_result<C, W>(
        &self,
        header: &MessageHeader,
        oneway: bool,
        result: Result<Success<C>, HandlerError>,
        output: &mut W,
    ) -> Result<bool, ProtocolError>
    where
        C: Call,
        W: ProtocolWrite,
    {
        let reply = match result {
            Ok(value) => C::Reply::from_result(Ok(value)),
            Err(HandlerError::Declared(err)) if <C::Reply as Reply>::declares(&err) => {
                tracing::debug!("{} returned {}", C::METHOD, err.name());
                self.record_error(err.kind());
                C::Reply::from_result(Err(err))
            }
            Err(err) => {
                tracing::error!("{} failed: {}", C::METHOD, err);
                self.record_error("internal_error");
                if !oneway {
                    write_failure(
                        output,
                        header,
                        ApplicationExceptionKind::INTERNAL_ERROR,
                        err.to_string(),
                    )?;
                }
                return Ok(false);
            }
        };

        if !oneway {
            envelope::write_reply(output, &header.name, header.seq_id)?;
            reply.encode(output)?;
            output.write_message_end()?;
        }
        Ok(true)
    }

    fn record_error(&self, kind: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.errors_total.with_label_values(&[kind]).inc();
        }
    }
}

fn write_failure<W: ProtocolWrite>(
    output: &mut W,
    header: &MessageHeader,
    kind: ApplicationExceptionKind,
    message: String,
) -> Result<(), ProtocolError> {
    let exception = ApplicationException::new(kind, message);
    envelope::write_exception(output, &header.name, header.seq_id, &exception)
}

macro_rules! handler_arg {
    (required $value:expr) => {
        $value
    };
    (optional $value:expr, $default:expr) => {
        $value.unwrap_or_else(|| ::core::convert::Into::into($default))
    };
}

macro_rules! define_dispatch {
    ($(
        $(#[$doc:meta])*
        $method:ident ($send:ident, $recv:ident) => $variant:ident, $args:ident, $result:ident {
            $($id:literal : $kind:ident $arg:ident : $argty:ty $(= $default:expr)?),* $(,)?
        } returns $ret:tt throws {
            $($xid:literal : $slot:ident : $xty:ty),* $(,)?
        };
    )*) => {
        impl<H: Handler> Processor<H> {
            #[allow(unused_variables)]
            async fn dispatch<R, W>(
                &self,
                operation: Operation,
                header: &MessageHeader,
                oneway: bool,
                input: &mut R,
                output: &mut W,
            ) -> Result<bool, ProtocolError>
            where
                R: ProtocolRead + Send,
                W: ProtocolWrite + Send,
            {
                match operation {
                    $(
                        Operation::$variant => {
                            let args = self.read_args::<$args, R, W>(header, oneway, input, output)?;
                            let result = self
                                .handler
                                .$method($( handler_arg!($kind args.$arg $(, $default)?) ),*)
                                .await;
                            self.write_result::<$args, W>(header, oneway, result, output)
                        }
                    )*
                }
            }
        }
    };
}

colrpc_protocol::service!(define_dispatch);

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use colrpc_protocol::types::{
        Column, ColumnOrSuperColumn, ColumnPath, ConsistencyLevel, InvalidRequestException,
        NotFoundException, SchemaDisagreementException,
    };
    use colrpc_protocol::{BinaryReader, BinaryWriter, Encoder};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        consistency: Mutex<Vec<ConsistencyLevel>>,
    }

    #[async_trait::async_trait]
    impl Handler for Recorder {
        async fn get(
            &self,
            key: Bytes,
            column_path: ColumnPath,
            consistency_level: ConsistencyLevel,
        ) -> Result<ColumnOrSuperColumn, HandlerError> {
            self.consistency.lock().unwrap().push(consistency_level);
            if key.as_ref() == b"missing" {
                return Err(NotFoundException {}.into());
            }
            Ok(ColumnOrSuperColumn {
                column: Some(Column::new(
                    column_path.column.unwrap_or_default(),
                    key,
                    1,
                )),
                ..Default::default()
            })
        }

        async fn truncate(&self, _cfname: String) -> Result<(), HandlerError> {
            // Not a declared exception of truncate.
            Err(SchemaDisagreementException {}.into())
        }

        async fn set_keyspace(&self, keyspace: String) -> Result<(), HandlerError> {
            if keyspace.is_empty() {
                return Err(InvalidRequestException {
                    why: "keyspace must not be empty".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    fn call<C: Call>(message_type: MessageType, seq_id: i32, args: &C) -> BinaryReader {
        let mut w = BinaryWriter::new();
        w.write_message_begin(C::METHOD, message_type, seq_id).unwrap();
        args.encode(&mut w).unwrap();
        w.write_message_end().unwrap();
        BinaryReader::new(w.into_bytes())
    }

    async fn run(
        processor: &Processor<Recorder>,
        mut input: BinaryReader,
    ) -> (Result<bool, ProtocolError>, BinaryReader) {
        let mut output = BinaryWriter::new();
        let result = processor.process(&mut input, &mut output).await;
        assert_eq!(input.remaining(), 0, "request not fully consumed");
        (result, BinaryReader::new(output.into_bytes()))
    }

    fn read_exception(reply: &mut BinaryReader) -> (MessageHeader, ApplicationException) {
        let header = reply.read_message_begin().unwrap();
        assert_eq!(header.message_type, MessageType::Exception);
        let exception = ApplicationException::decode(reply).unwrap();
        reply.read_message_end().unwrap();
        (header, exception)
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let processor = Processor::new(Recorder::default());

        let mut w = BinaryWriter::new();
        w.write_message_begin("no_such_method", MessageType::Call, 7)
            .unwrap();
        w.write_struct_begin("no_such_method_args").unwrap();
        w.write_field_begin("x", TType::I32, 1).unwrap();
        w.write_i32(5).unwrap();
        w.write_field_end().unwrap();
        w.write_field_stop().unwrap();
        w.write_struct_end().unwrap();
        w.write_message_end().unwrap();

        let (result, mut reply) = run(&processor, BinaryReader::new(w.into_bytes())).await;
        assert!(!result.unwrap());

        let (header, exception) = read_exception(&mut reply);
        assert_eq!(header.name, "no_such_method");
        assert_eq!(header.seq_id, 7);
        assert_eq!(exception.kind(), ApplicationExceptionKind::UNKNOWN_METHOD);
        assert_eq!(exception.message(), "Unknown function no_such_method");
    }

    #[tokio::test]
    async fn test_reply_echoes_seq_id() {
        let processor = Processor::new(Recorder::default());
        let args = GetArgs {
            key: Bytes::from_static(b"k1"),
            column_path: ColumnPath::new("Std1").with_column(Bytes::from_static(b"name")),
            consistency_level: Some(ConsistencyLevel::QUORUM),
        };

        let (result, mut reply) = run(&processor, call(MessageType::Call, -12, &args)).await;
        assert!(result.unwrap());

        let header = reply.read_message_begin().unwrap();
        assert_eq!(header.message_type, MessageType::Reply);
        assert_eq!(header.name, "get");
        assert_eq!(header.seq_id, -12);

        let value = GetResult::decode(&mut reply).unwrap().0.unwrap();
        let column = value.column.unwrap();
        assert_eq!(column.name, Bytes::from_static(b"name"));
        assert_eq!(column.value, Some(Bytes::from_static(b"k1")));
        assert_eq!(
            *processor.handler().consistency.lock().unwrap(),
            vec![ConsistencyLevel::QUORUM]
        );
    }

    #[tokio::test]
    async fn test_omitted_consistency_uses_default() {
        let processor = Processor::new(Recorder::default());
        let args = GetArgs {
            key: Bytes::from_static(b"k1"),
            column_path: ColumnPath::new("Std1"),
            consistency_level: None,
        };

        let (result, _) = run(&processor, call(MessageType::Call, 1, &args)).await;
        assert!(result.unwrap());
        assert_eq!(
            *processor.handler().consistency.lock().unwrap(),
            vec![ConsistencyLevel::ONE]
        );
    }

    #[tokio::test]
    async fn test_declared_exception_in_result() {
        let processor = Processor::new(Recorder::default());
        let args = GetArgs {
            key: Bytes::from_static(b"missing"),
            column_path: ColumnPath::new("Std1"),
            consistency_level: None,
        };

        let (result, mut reply) = run(&processor, call(MessageType::Call, 3, &args)).await;
        assert!(result.unwrap());

        let header = reply.read_message_begin().unwrap();
        assert_eq!(header.message_type, MessageType::Reply);
        let decoded = GetResult::decode(&mut reply).unwrap();
        assert!(matches!(decoded.0, Err(OperationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_undeclared_exception_is_internal_error() {
        let processor = Processor::new(Recorder::default());
        let args = TruncateArgs {
            cfname: "Cf1".to_string(),
        };

        let (result, mut reply) = run(&processor, call(MessageType::Call, 4, &args)).await;
        assert!(!result.unwrap());

        let (header, exception) = read_exception(&mut reply);
        assert_eq!(header.name, "truncate");
        assert_eq!(header.seq_id, 4);
        assert_eq!(exception.kind(), ApplicationExceptionKind::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_unimplemented_method() {
        let processor = Processor::new(Recorder::default());

        let (result, mut reply) =
            run(&processor, call(MessageType::Call, 2, &DescribeVersionArgs {})).await;
        assert!(!result.unwrap());

        let (_, exception) = read_exception(&mut reply);
        assert_eq!(exception.kind(), ApplicationExceptionKind::INTERNAL_ERROR);
        assert_eq!(exception.message(), "describe_version not implemented");
    }

    #[tokio::test]
    async fn test_oneway_never_replies() {
        let processor = Processor::new(Recorder::default());
        let args = SetKeyspaceArgs {
            keyspace: "Keyspace1".to_string(),
        };
        let (result, reply) = run(&processor, call(MessageType::Oneway, 9, &args)).await;
        assert!(result.unwrap());
        assert_eq!(reply.remaining(), 0);

        let args = SetKeyspaceArgs {
            keyspace: String::new(),
        };
        let (result, reply) = run(&processor, call(MessageType::Oneway, 10, &args)).await;
        assert!(result.unwrap());
        assert_eq!(reply.remaining(), 0);
    }

    #[tokio::test]
    async fn test_malformed_arguments() {
        let processor = Processor::new(Recorder::default());

        // set_keyspace without its required keyspace field.
        let mut w = BinaryWriter::new();
        w.write_message_begin("set_keyspace", MessageType::Call, 5)
            .unwrap();
        w.write_struct_begin("set_keyspace_args").unwrap();
        w.write_field_stop().unwrap();
        w.write_struct_end().unwrap();
        w.write_message_end().unwrap();

        let (result, mut reply) = run(&processor, BinaryReader::new(w.into_bytes())).await;
        assert!(matches!(result, Err(ProtocolError::MissingField { .. })));

        let (header, exception) = read_exception(&mut reply);
        assert_eq!(header.seq_id, 5);
        assert_eq!(exception.kind(), ApplicationExceptionKind::PROTOCOL_ERROR);
    }

    #[tokio::test]
    async fn test_reply_message_rejected() {
        let processor = Processor::new(Recorder::default());
        let frame = Encoder::encode_reply("describe_version", 1, &DescribeVersionResult(Ok(String::new())))
            .unwrap();

        let mut input = BinaryReader::new(frame.freeze().slice(4..));
        let mut output = BinaryWriter::new();
        assert!(!processor.process(&mut input, &mut output).await.unwrap());

        let mut reply = BinaryReader::new(output.into_bytes());
        let (_, exception) = read_exception(&mut reply);
        assert_eq!(
            exception.kind(),
            ApplicationExceptionKind::INVALID_MESSAGE_TYPE
        );
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let processor = Processor::new(Recorder::default()).with_metrics(Arc::clone(&metrics));
        let args = GetArgs {
            key: Bytes::from_static(b"missing"),
            column_path: ColumnPath::new("Std1"),
            consistency_level: None,
        };
        let _ = run(&processor, call(MessageType::Call, 1, &args)).await;

        assert_eq!(
            metrics.requests_total.with_label_values(&["get"]).get(),
            1.0
        );
        assert_eq!(
            metrics.errors_total.with_label_values(&["not_found"]).get(),
            1.0
        );
    }

    #[test]
    fn test_dispatch_table_covers_catalog() {
        let processor = Processor::new(Recorder::default());
        for operation in Operation::ALL {
            assert_eq!(processor.operation(operation.name()), Some(*operation));
        }
        assert_eq!(processor.operation("no_such_method"), None);
    }
}
