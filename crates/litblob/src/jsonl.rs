//! # JSON Lines
//!
//! A stream of JSON documents stored as one document per line.
//!
//! ## Invariants
//!
//! - Encoding an empty source fails before anything is written.
//! - The first item is converted before storage is touched, so a source of
//!   the wrong shape leaves no orphan object behind.
//! - Blank lines are skipped on decode.
//! - Decoding opens the object up front and reads one line per pull, so a
//!   malformed line surfaces from `ValueStream::try_next` with its index.
//! - Caller streams are pulled on a blocking worker, never on the bridge
//!   thread, so a source that itself needs the bridge can still be encoded.

use std::sync::Arc;

use litengine::AsyncTransformer;
use litengine::Bridge;
use litengine::Context;
use litengine::Error;
use litengine::FieldPath;
use litengine::HostKey;
use litengine::HostType;
use litengine::PathSegment;
use litengine::Reader;
use litengine::Result;
use litengine::StorageError;
use litengine::Value;
use litengine::ValueStream;
use litengine::litpack::Blob;
use litengine::litpack::BlobType;
use litengine::litpack::Dimensionality;
use litengine::litpack::Literal;
use litengine::litpack::WireType;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::json;

pub const JSONL_ITERATOR: &str = "jsonl_iterator";
pub const JSONL_FORMAT: &str = "JSONL";

const OBJECT_HINT: &str = "data.jsonl";

const PULL_CHUNK: usize = 64;

/// Items to encode, pulled a chunk at a time.
enum Source {
    List(std::vec::IntoIter<Value>),
    Stream(ValueStream),
}

impl Source {
    async fn next_chunk(&mut self) -> Result<Vec<Value>> {
        match self {
            Self::List(items) => Ok(items.by_ref().take(PULL_CHUNK).collect()),
            Self::Stream(stream) => {
                let stream = stream.clone();
                let pulled = tokio::task::spawn_blocking(move || {
                    let mut chunk = Vec::with_capacity(PULL_CHUNK);
                    while chunk.len() < PULL_CHUNK {
                        match stream.try_next()? {
                            Some(item) => chunk.push(item),
                            None => break,
                        }
                    }
                    Ok::<_, Error>(chunk)
                })
                .await;
                match pulled {
                    Ok(chunk) => chunk,
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(_) => Err(Error::Cancelled),
                }
            }
        }
    }
}

/// Documents read on demand from an open object.
struct LazyLines {
    lines: Option<Lines<BufReader<Reader>>>,
    bridge: Arc<Bridge>,
    cancel: CancellationToken,
    path: FieldPath,
    uri: String,
    read: usize,
}

impl Iterator for LazyLines {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Result<Value>> {
        let mut lines = self.lines.take()?;
        let pulled = self.bridge.run_sync(
            async move {
                loop {
                    let next = lines.next_line().await;
                    match next {
                        Ok(Some(line)) if line.trim().is_empty() => continue,
                        other => return Ok((lines, other)),
                    }
                }
            },
            &self.cancel,
        );

        let line = match pulled {
            Ok((lines, Ok(Some(line)))) => {
                self.lines = Some(lines);
                line
            }
            Ok((_, Ok(None))) => {
                debug!(uri = %self.uri, lines = self.read, "read json lines");
                return None;
            }
            Ok((_, Err(e))) => return Some(Err(io_error(e))),
            Err(e) => return Some(Err(e)),
        };

        let index = self.read;
        self.read += 1;
        let doc = serde_json::from_str(&line).map_err(|e| Error::Decode {
            path: self.path.child(PathSegment::Index(index)),
            expected: "JSON document".into(),
            found: e.to_string(),
        });
        Some(doc.map(json::from_json))
    }
}

/// A stream of JSON documents.
///
/// Decoded values are lazy: each pull of the returned stream blocks on the
/// engine's bridge for one line, so pull them from an ordinary thread.
#[derive(Debug, Default)]
pub struct JsonLinesTransformer;

impl JsonLinesTransformer {
    pub fn new() -> Self {
        Self
    }

    fn blob_type() -> BlobType {
        BlobType::single(JSONL_FORMAT)
    }
}

fn io_error(e: std::io::Error) -> Error {
    Error::Storage(StorageError::from(e))
}

#[async_trait::async_trait]
impl AsyncTransformer for JsonLinesTransformer {
    fn name(&self) -> &str {
        "JSON Lines iterator"
    }

    fn key(&self) -> HostKey {
        HostKey::exact(JSONL_ITERATOR)
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> Result<WireType> {
        Ok(WireType::Blob(Self::blob_type()))
    }

    /// Streams are accepted as-is; their items are only seen while encoding.
    fn check_value(&self, cx: &Context, _ty: &HostType, value: &Value) -> Result<()> {
        match value {
            Value::Stream(_) => Ok(()),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    json::to_json(item, &cx.path().child(PathSegment::Index(i)))?;
                }
                Ok(())
            }
            other => Err(cx.mismatch(JSONL_ITERATOR, other)),
        }
    }

    async fn encode(&self, cx: &Context, value: Value, _ty: &HostType, _expected: &WireType) -> Result<Literal> {
        let mut source = match value {
            Value::List(items) => Source::List(items.into_iter()),
            Value::Stream(stream) => Source::Stream(stream),
            other => return Err(cx.mismatch(JSONL_ITERATOR, &other)),
        };

        let mut chunk = source.next_chunk().await?.into_iter();
        let first = chunk
            .next()
            .ok_or_else(|| Error::EmptyStream { path: cx.path().clone() })?;
        let mut pending = Some(json::to_json(&first, &cx.path().child(PathSegment::Index(0)))?);

        let storage = cx.storage();
        let uri = storage.new_uri(OBJECT_HINT);
        let mut writer = storage.open_for_write(&uri).await?;

        let mut lines = 0usize;
        while let Some(doc) = pending.take() {
            let mut line = serde_json::to_vec(&doc)
                .map_err(|e| Error::Storage(StorageError::Io(e.to_string())))?;
            line.push(b'\n');
            writer.write_all(&line).await.map_err(io_error)?;
            lines += 1;

            let item = match chunk.next() {
                Some(item) => Some(item),
                None => {
                    chunk = source.next_chunk().await?.into_iter();
                    chunk.next()
                }
            };
            if let Some(item) = item {
                pending = Some(json::to_json(&item, &cx.path().child(PathSegment::Index(lines)))?);
            }
        }
        writer.shutdown().await.map_err(io_error)?;

        debug!(uri = %uri, lines, "wrote json lines");
        Ok(Literal::blob(Blob::new(uri, Self::blob_type())))
    }

    async fn decode(&self, cx: &Context, literal: Literal, _ty: &HostType) -> Result<Value> {
        let blob = match literal.as_blob() {
            Some(b) if b.dimensionality == Dimensionality::Single => b,
            _ => return Err(cx.decode_error(JSONL_ITERATOR, &literal)),
        };

        let reader = cx.storage().open_for_read(&blob.uri).await?;
        let lines = LazyLines {
            lines: Some(BufReader::new(reader).lines()),
            bridge: cx.engine().bridge()?,
            cancel: cx.cancel_token().clone(),
            path: cx.path().clone(),
            uri: blob.uri.clone(),
            read: 0,
        };
        Ok(Value::Stream(ValueStream::fallible(lines)))
    }

    fn infer_host_type(&self, _cx: &Context, wire: &WireType) -> Result<HostType> {
        match wire {
            WireType::Blob(bt) if *bt == Self::blob_type() => Ok(HostType::named(JSONL_ITERATOR)),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }

    fn blob_formats(&self) -> Vec<BlobType> {
        vec![Self::blob_type()]
    }
}
