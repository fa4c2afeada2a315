use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::app::MeterEditor;
use crate::search::{Debouncer, SearchOutcome};

/// A frame tagged with the number of the query that produced it.
type Frame = (u64, Value);

/// Keystroke-level search: every text frame is the current query, and only the
/// query that survives the debounce window is answered.
pub(super) async fn live_search(
    ws: WebSocketUpgrade,
    State(editor): State<Arc<MeterEditor>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, editor))
}

async fn run_session(socket: WebSocket, editor: Arc<MeterEditor>) {
    let (mut sink, stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Frame>(16);

    let forward = tokio::spawn(async move {
        let mut newest = NewestOnly::default();
        while let Some((seq, frame)) = rx.recv().await {
            if !newest.admit(seq) {
                continue;
            }
            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    drive_queries(stream, tx, editor).await;
    let _ = forward.await;
}

/// Drops frames answering a query older than one already sent. A search that
/// got past its delay can still finish after a newer query was answered.
#[derive(Debug, Default)]
struct NewestOnly {
    newest: u64,
}

impl NewestOnly {
    fn admit(&mut self, seq: u64) -> bool {
        if seq < self.newest {
            return false;
        }
        self.newest = seq;
        true
    }
}

/// Reads queries until the client closes or errors. Returns once every frame
/// producer has let go of `tx`, apart from searches already running.
async fn drive_queries<S, E>(mut incoming: S, tx: mpsc::Sender<Frame>, editor: Arc<MeterEditor>)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    let min_chars = editor.config().search.min_chars;
    let mut debouncer = Debouncer::new(editor.config().search.debounce());
    let mut seq = 0u64;

    while let Some(Ok(msg)) = incoming.next().await {
        let query = match msg {
            Message::Text(text) => text.trim().to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        seq += 1;

        if query.chars().count() < min_chars {
            debouncer.cancel();
            let frame = json!({ "query": query, "result": SearchOutcome::Cleared });
            if tx.send((seq, frame)).await.is_err() {
                break;
            }
            continue;
        }

        let editor = editor.clone();
        let tx = tx.clone();
        let this = seq;
        debouncer.schedule(async move {
            let frame = match editor.search(&query).await {
                Ok(outcome) => json!({ "query": query, "result": outcome }),
                Err(e) => {
                    tracing::warn!(error = %e, "live search unavailable");
                    json!({ "query": query, "notice": e.notice() })
                }
            };
            let _ = tx.send((this, frame)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use feature_client::memory::InMemoryFeatureStore;
    use feature_client::MeterRecord;
    use futures::channel::mpsc as client;

    use crate::config::AppConfig;

    async fn editor() -> Arc<MeterEditor> {
        let records = ["123 Main St", "9 Oak Ave", "77 Main St"]
            .iter()
            .zip(1..)
            .map(|(address, id)| {
                let mut r = MeterRecord::new(id);
                r.address = Some(address.to_string());
                r
            })
            .collect();
        let store = Arc::new(InMemoryFeatureStore::new(records));
        let config = AppConfig::for_layer("https://example.com/FeatureServer/0");
        let editor = MeterEditor::new(store, config);
        editor.initialize().await.expect("load succeeds");
        Arc::new(editor)
    }

    struct Session {
        queries: client::UnboundedSender<Result<Message, axum::Error>>,
        frames: mpsc::Receiver<Frame>,
    }

    impl Session {
        async fn start() -> Self {
            let (queries, incoming) = client::unbounded();
            let (tx, frames) = mpsc::channel(16);
            tokio::spawn(drive_queries(incoming, tx, editor().await));
            Self { queries, frames }
        }

        fn type_query(&self, text: &str) {
            self.queries
                .unbounded_send(Ok(Message::Text(text.to_string())))
                .expect("session open");
        }

        async fn next_frame(&mut self) -> Value {
            self.frames.recv().await.expect("frame").1
        }

        async fn assert_quiet(&mut self) {
            let res = tokio::time::timeout(Duration::from_secs(5), self.frames.recv()).await;
            assert!(res.is_err(), "unexpected frame: {res:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_keystrokes_answers_only_the_last_query() {
        let mut session = Session::start().await;
        for text in ["ma", "mai", "main"] {
            session.type_query(text);
        }

        let frame = session.next_frame().await;
        assert_eq!(frame["query"], "main");
        assert_eq!(frame["result"]["state"], "matches");
        assert_eq!(frame["result"]["hits"].as_array().map(Vec::len), Some(2));
        session.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_clears_immediately_and_drops_pending_search() {
        let mut session = Session::start().await;
        session.type_query("main");
        session.type_query("m");

        let frame = session.next_frame().await;
        assert_eq!(frame["query"], "m");
        assert_eq!(frame["result"]["state"], "cleared");
        session.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_query_reports_no_matches() {
        let mut session = Session::start().await;
        session.type_query("zzz");

        let frame = session.next_frame().await;
        assert_eq!(frame["result"]["state"], "no_matches");
    }

    #[test]
    fn frames_older_than_the_newest_sent_are_dropped() {
        let mut newest = NewestOnly::default();
        assert!(newest.admit(1));
        assert!(newest.admit(3));
        assert!(!newest.admit(2));
        assert!(newest.admit(3));
        assert!(newest.admit(4));
    }
}
