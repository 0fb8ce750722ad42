//! Streaming Emitter
//!
//! Re-emits a tool result as `start`, a run of bounded `chunk` events with
//! progress, then `end`. Failures become a single in-band `error` event.

use futures::{stream, Stream};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::ToolDispatcher;
use crate::server::metrics;

/// Default number of records per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Default pause before each chunk.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSettings {
    pub chunk_size: usize,
    pub delay: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// One server-sent event of a streamed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    Start {
        tool: String,
        timestamp: String,
    },
    Chunk {
        data: Vec<Value>,
        progress: Progress,
        timestamp: String,
    },
    End {
        timestamp: String,
    },
    Error {
        message: String,
        timestamp: String,
    },
}

impl StreamChunk {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamChunk::Start { .. } => "start",
            StreamChunk::Chunk { .. } => "chunk",
            StreamChunk::End { .. } => "end",
            StreamChunk::Error { .. } => "error",
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

enum Phase {
    Start,
    Fetch,
    Emitting {
        groups: VecDeque<Vec<Value>>,
        emitted: usize,
        total: usize,
    },
    Finished,
}

struct Emitter {
    dispatcher: Arc<ToolDispatcher>,
    tool: String,
    params: Value,
    settings: StreamSettings,
    phase: Phase,
}

impl Emitter {
    async fn next_chunk(&mut self) -> Option<StreamChunk> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Start => {
                    self.phase = Phase::Fetch;
                    return Some(StreamChunk::Start {
                        tool: self.tool.clone(),
                        timestamp: now(),
                    });
                }
                Phase::Fetch => {
                    let params = std::mem::take(&mut self.params);
                    match self.dispatcher.invoke(&self.tool, params).await {
                        Ok(envelope) => {
                            let records = extract_records(envelope.result.unwrap_or_default());
                            let total = records.len();
                            self.phase = Phase::Emitting {
                                groups: partition(records, self.settings.chunk_size),
                                emitted: 0,
                                total,
                            };
                        }
                        Err(e) => {
                            return Some(StreamChunk::Error {
                                message: e.to_string(),
                                timestamp: now(),
                            });
                        }
                    }
                }
                Phase::Emitting {
                    mut groups,
                    emitted,
                    total,
                } => {
                    let Some(group) = groups.pop_front() else {
                        return Some(StreamChunk::End { timestamp: now() });
                    };
                    if !self.settings.delay.is_zero() {
                        tokio::time::sleep(self.settings.delay).await;
                    }
                    let emitted = emitted + group.len();
                    self.phase = Phase::Emitting {
                        groups,
                        emitted,
                        total,
                    };
                    metrics::record_stream_chunk();
                    return Some(StreamChunk::Chunk {
                        data: group,
                        progress: Progress {
                            current: emitted,
                            total,
                        },
                        timestamp: now(),
                    });
                }
                Phase::Finished => return None,
            }
        }
    }
}

/// Records carried by a dispatcher result: its `records` array when present,
/// the result itself when it is an array, otherwise the result as one record.
fn extract_records(result: Value) -> Vec<Value> {
    match result {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(records)) => records,
            Some(other) => {
                map.insert("records".to_string(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    }
}

fn partition(records: Vec<Value>, chunk_size: usize) -> VecDeque<Vec<Value>> {
    let chunk_size = chunk_size.max(1);
    let mut groups = VecDeque::with_capacity(records.len().div_ceil(chunk_size));
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        groups.push_back(records.by_ref().take(chunk_size).collect());
    }
    groups
}

/// Lazily stream the result of one tool call.
///
/// The tool is invoked once, after `start` is pulled. Dropping the stream
/// stops emission.
pub fn stream_tool_call(
    dispatcher: Arc<ToolDispatcher>,
    tool: String,
    params: Value,
    settings: StreamSettings,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    let emitter = Emitter {
        dispatcher,
        tool,
        params,
        settings,
        phase: Phase::Start,
    };
    stream::unfold(emitter, |mut emitter| async move {
        let chunk = emitter.next_chunk().await?;
        Some((chunk, emitter))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::mode::McpMode;
    use crate::odoo::{MockOdooRemote, RemoteError};
    use futures::StreamExt;
    use serde_json::json;

    fn settings(chunk_size: usize) -> StreamSettings {
        StreamSettings {
            chunk_size,
            delay: Duration::ZERO,
        }
    }

    fn remote_with_records(n: usize) -> MockOdooRemote {
        let mut remote = MockOdooRemote::new();
        remote
            .expect_search_read()
            .times(1)
            .returning(move |_, _, _| Ok((1..=n).map(|id| json!({"id": id})).collect()));
        remote
    }

    async fn collect(
        mode: McpMode,
        remote: MockOdooRemote,
        tool: &str,
        params: Value,
        settings: StreamSettings,
    ) -> Vec<StreamChunk> {
        let dispatcher = Arc::new(ToolDispatcher::new(mode, Arc::new(remote)));
        stream_tool_call(dispatcher, tool.to_string(), params, settings)
            .collect()
            .await
    }

    fn progress_of(chunk: &StreamChunk) -> Option<(usize, usize)> {
        match chunk {
            StreamChunk::Chunk { progress, .. } => Some((progress.current, progress.total)),
            _ => None,
        }
    }

    #[tokio::test]
    async fn twenty_five_records_in_chunks_of_ten() {
        let chunks = collect(
            McpMode::Readonly,
            remote_with_records(25),
            "odoo_search",
            json!({"model": "res.partner"}),
            settings(10),
        )
        .await;

        let kinds: Vec<_> = chunks.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["start", "chunk", "chunk", "chunk", "end"]);

        let progress: Vec<_> = chunks.iter().filter_map(progress_of).collect();
        assert_eq!(progress, vec![(10, 25), (20, 25), (25, 25)]);

        // Order is preserved across chunks.
        let ids: Vec<_> = chunks
            .iter()
            .filter_map(|c| match c {
                StreamChunk::Chunk { data, .. } => Some(data.clone()),
                _ => None,
            })
            .flatten()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, (1..=25).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn chunk_count_is_ceiling_of_records_over_size() {
        for (n, size) in [(1, 10), (10, 10), (11, 10), (7, 3), (9, 1)] {
            let chunks = collect(
                McpMode::Readonly,
                remote_with_records(n),
                "odoo_search",
                json!({"model": "res.partner"}),
                settings(size),
            )
            .await;

            let progress: Vec<_> = chunks.iter().filter_map(progress_of).collect();
            assert_eq!(progress.len(), n.div_ceil(size));
            assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));
            assert_eq!(progress.last().map(|p| p.0), Some(n));
            assert_eq!(chunks.last().map(|c| c.kind()), Some("end"));
        }
    }

    #[tokio::test]
    async fn empty_result_is_start_then_end() {
        let chunks = collect(
            McpMode::Readonly,
            remote_with_records(0),
            "odoo_search",
            json!({"model": "res.partner"}),
            settings(10),
        )
        .await;

        let kinds: Vec<_> = chunks.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["start", "end"]);
    }

    #[tokio::test]
    async fn remote_failure_is_a_single_error_event() {
        let mut remote = MockOdooRemote::new();
        remote
            .expect_search_read()
            .returning(|_, _, _| Err(RemoteError::Connection("connection refused".to_string())));

        let chunks = collect(
            McpMode::Readonly,
            remote,
            "odoo_search",
            json!({"model": "res.partner"}),
            settings(10),
        )
        .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind(), "start");
        match &chunks[1] {
            StreamChunk::Error { message, .. } => assert!(message.contains("connection refused")),
            other => panic!("expected error chunk, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn denied_tool_is_reported_in_band() {
        let chunks = collect(
            McpMode::Readonly,
            MockOdooRemote::new(),
            "odoo_unlink",
            json!({"model": "res.partner", "ids": [1]}),
            settings(10),
        )
        .await;

        let kinds: Vec<_> = chunks.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["start", "error"]);
    }

    #[tokio::test]
    async fn non_collection_result_is_one_chunk() {
        let mut remote = MockOdooRemote::new();
        remote
            .expect_fields_get()
            .returning(|_, _| Ok(json!({"name": {"type": "char"}})));

        let chunks = collect(
            McpMode::Readonly,
            remote,
            "odoo_fields_get",
            json!({"model": "res.partner"}),
            settings(10),
        )
        .await;

        let progress: Vec<_> = chunks.iter().filter_map(progress_of).collect();
        assert_eq!(progress, vec![(1, 1)]);
        match &chunks[1] {
            StreamChunk::Chunk { data, .. } => assert_eq!(data[0]["model"], "res.partner"),
            other => panic!("expected chunk, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn dropping_after_start_never_fetches() {
        // No expectations: fetching would panic.
        let dispatcher = Arc::new(ToolDispatcher::new(
            McpMode::Readonly,
            Arc::new(MockOdooRemote::new()),
        ));
        let first: Vec<_> = stream_tool_call(
            dispatcher,
            "odoo_search".to_string(),
            json!({"model": "res.partner"}),
            settings(10),
        )
        .take(1)
        .collect()
        .await;

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind(), "start");
    }

    #[test]
    fn chunk_serialisation_shape() {
        let chunk = StreamChunk::Chunk {
            data: vec![json!({"id": 1})],
            progress: Progress {
                current: 1,
                total: 3,
            },
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({
                "type": "chunk",
                "data": [{"id": 1}],
                "progress": {"current": 1, "total": 3},
                "timestamp": "2024-01-01T00:00:00+00:00"
            })
        );

        let start = serde_json::to_value(StreamChunk::Start {
            tool: "odoo_search".to_string(),
            timestamp: now(),
        })
        .unwrap();
        assert_eq!(start["type"], "start");
        assert!(chrono::DateTime::parse_from_rfc3339(start["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn extract_records_rules() {
        assert_eq!(extract_records(json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(
            extract_records(json!({"model": "m", "records": [{"id": 1}]})),
            vec![json!({"id": 1})]
        );
        assert_eq!(extract_records(json!({"model": "m"})), vec![json!({"model": "m"})]);
    }
}
