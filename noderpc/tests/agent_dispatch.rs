//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Connection agent behaviour, driven through an in-memory connection.

mod common;

use bytes::Bytes;
use common::{raw_frame, read_response, request_frame, send, CountingFinder, Mode, Recorder};
use noderpc::processor::{Payload, ProcessorRegistry, JSON_PROCESSOR, PROTOBUF_PROCESSOR};
use noderpc::rpc::RpcError;
use noderpc::server::{Server, ServerConfig};
use noderpc::transport::{MemoryTransport, TransportError};
use noderpc::NoderpcError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Fixture {
    recorder: Arc<Recorder>,
    finder: Arc<CountingFinder>,
    processors: Arc<ProcessorRegistry>,
    server: Server,
    peer: MemoryTransport,
    agent: JoinHandle<NoderpcError>,
}

fn fixture() -> Fixture {
    common::init_tracing();
    let recorder = Recorder::new("UserHandler", |method, args| match method {
        "Login" => Ok(Some(Payload::Json(json!({"ok": true})))),
        "Echo" => Ok(Some(args)),
        "Fail" => Err(RpcError::application("boom")),
        other => Err(RpcError::application(format!("no method {}", other))),
    });
    let finder = Arc::new(CountingFinder::default());
    finder.registry.register(recorder.clone());

    let processors = Arc::new(ProcessorRegistry::new());
    let server = Server::new(ServerConfig::default(), processors.clone(), finder.clone());
    let (local, peer) = MemoryTransport::pair(1 << 16);
    let agent = tokio::spawn(server.new_agent(local).run());

    Fixture {
        recorder,
        finder,
        processors,
        server,
        peer,
        agent,
    }
}

impl Fixture {
    async fn call(&mut self, seq: u64, service_method: &str, no_reply: bool, args: Payload) {
        let frame = request_frame(
            &self.processors,
            JSON_PROCESSOR,
            seq,
            service_method,
            no_reply,
            &args,
        );
        send(&mut self.peer, &frame).await;
    }
}

#[tokio::test]
async fn test_known_handler_is_pushed_and_answered() {
    let mut fx = fixture();
    fx.call(7, "UserHandler.Login", false, Payload::Json(json!({"user": "ada"})))
        .await;

    let (id, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(id, JSON_PROCESSOR);
    assert_eq!(response.seq(), 7);
    assert_eq!(response.error(), None);
    assert_eq!(response.reply(), br#"{"ok":true}"#);
    assert_eq!(fx.recorder.seen(), vec![(7, "UserHandler.Login".to_string())]);
    assert_eq!(fx.server.requests().outstanding(), 0);
}

#[tokio::test]
async fn test_unknown_handler_is_answered_without_push() {
    let mut fx = fixture();
    fx.call(8, "Ghost.Run", false, Payload::Json(json!(null))).await;

    let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(response.seq(), 8);
    assert_eq!(
        response.error(),
        Some("service method Ghost.Run is not registered")
    );
    assert!(fx.recorder.seen().is_empty());
    assert_eq!(fx.finder.lookups(), 1);
}

#[tokio::test]
async fn test_malformed_service_method_skips_lookup() {
    let mut fx = fixture();
    fx.call(9, "NoDot", false, Payload::Json(json!(null))).await;
    fx.call(10, "A.B.C", false, Payload::Json(json!(null))).await;

    for seq in [9, 10] {
        let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
        assert_eq!(response.seq(), seq);
        assert!(response.error().unwrap().contains("is malformed"));
    }
    assert_eq!(fx.finder.lookups(), 0);
}

#[tokio::test]
async fn test_no_reply_routing_error_writes_nothing() {
    let mut fx = fixture();
    fx.call(10, "Ghost.Run", true, Payload::Json(json!(null))).await;
    fx.call(11, "NoDot", true, Payload::Json(json!(null))).await;
    fx.call(12, "UserHandler.Login", false, Payload::Json(json!({})))
        .await;

    // The first frame back answers the only request that wanted one.
    let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(response.seq(), 12);
    assert_eq!(fx.finder.lookups(), 2);
}

#[tokio::test]
async fn test_no_reply_success_writes_nothing() {
    let mut fx = fixture();
    fx.call(13, "UserHandler.Login", true, Payload::Json(json!({})))
        .await;
    fx.call(14, "UserHandler.Fail", false, Payload::Json(json!({})))
        .await;

    let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(response.seq(), 14);
    assert_eq!(response.error(), Some("boom"));
    assert_eq!(fx.recorder.seen().len(), 2);
}

#[tokio::test]
async fn test_decode_failure_with_seq_keeps_connection() {
    let mut fx = fixture();
    send(&mut fx.peer, &raw_frame(JSON_PROCESSOR, br#"{"seq":12,"service_method":42}"#)).await;

    let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(response.seq(), 12);
    assert!(response.error().unwrap().starts_with("rpc decode error"));

    fx.call(13, "UserHandler.Login", false, Payload::Json(json!({})))
        .await;
    let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(response.seq(), 13);
    assert!(!fx.agent.is_finished());
}

#[tokio::test]
async fn test_unattributable_decode_failure_closes_connection() {
    let mut fx = fixture();
    send(&mut fx.peer, &raw_frame(JSON_PROCESSOR, b"{]")).await;

    let reason = fx.agent.await.unwrap();
    assert!(matches!(reason, NoderpcError::Rpc(RpcError::Decode { .. })));
    assert_eq!(fx.server.requests().outstanding(), 0);
}

#[tokio::test]
async fn test_unknown_processor_closes_connection() {
    let mut fx = fixture();
    send(&mut fx.peer, &raw_frame(9, b"{}")).await;

    let reason = fx.agent.await.unwrap();
    assert!(matches!(
        reason,
        NoderpcError::Rpc(RpcError::UnknownProcessor { processor: 9 })
    ));
    assert!(reason.should_close_transport());
}

#[tokio::test]
async fn test_refused_push_is_answered_with_dispatch_error() {
    let mut fx = fixture();
    fx.recorder.set_mode(Mode::Refuse);
    fx.call(15, "UserHandler.Login", true, Payload::Json(json!({})))
        .await;
    fx.call(16, "UserHandler.Login", false, Payload::Json(json!({})))
        .await;

    let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(response.seq(), 16);
    assert_eq!(
        response.error(),
        Some("handler UserHandler rejected the request: overloaded")
    );
    assert_eq!(fx.server.requests().outstanding(), 0);
}

#[tokio::test]
async fn test_dropped_request_is_answered_as_abandoned() {
    let mut fx = fixture();
    fx.recorder.set_mode(Mode::Discard);
    fx.call(17, "UserHandler.Login", false, Payload::Json(json!({})))
        .await;

    let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(response.seq(), 17);
    assert_eq!(
        response.error(),
        Some(RpcError::Abandoned { seq: 17 }.to_wire().as_str())
    );
}

#[tokio::test]
async fn test_out_of_order_completions_keep_their_seq() {
    let mut fx = fixture();
    fx.recorder.set_mode(Mode::Hold);
    for seq in 20..23u64 {
        fx.call(seq, "UserHandler.Echo", false, Payload::Json(json!(seq)))
            .await;
    }
    tokio::time::timeout(Duration::from_secs(5), async {
        while fx.recorder.held() < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("requests reach the handler");
    assert_eq!(fx.server.requests().outstanding(), 3);

    fx.recorder.release_held();
    for expected in [22u64, 21, 20] {
        let (_, response) = read_response(&mut fx.peer, &fx.processors).await;
        assert_eq!(response.seq(), expected);
        assert_eq!(response.reply(), expected.to_string().as_bytes());
    }
    assert_eq!(fx.server.requests().outstanding(), 0);
}

#[tokio::test]
async fn test_response_uses_request_processor() {
    let mut fx = fixture();
    let args = Payload::Protobuf(Bytes::from_static(&[0x08, 0x2a]));
    let frame = request_frame(
        &fx.processors,
        PROTOBUF_PROCESSOR,
        30,
        "UserHandler.Echo",
        false,
        &args,
    );
    send(&mut fx.peer, &frame).await;

    let (id, response) = read_response(&mut fx.peer, &fx.processors).await;
    assert_eq!(id, PROTOBUF_PROCESSOR);
    assert_eq!(response.seq(), 30);
    assert_eq!(response.reply(), &[0x08, 0x2a]);
}

#[tokio::test]
async fn test_peer_hangup_ends_agent() {
    let fx = fixture();
    drop(fx.peer);

    let reason = fx.agent.await.unwrap();
    assert!(matches!(
        reason,
        NoderpcError::Transport(TransportError::ConnectionLost { .. })
    ));
}
