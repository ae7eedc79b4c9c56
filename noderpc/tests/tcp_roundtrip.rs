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

//! End-to-end calls between a server and a client over loopback TCP.

mod common;

use common::{Mode, Recorder};
use noderpc::client::{Client, ClientConfig};
use noderpc::handler::{HandlerRegistry, QueuedHandler};
use noderpc::processor::{Payload, ProcessorRegistry, PROTOBUF_PROCESSOR};
use noderpc::rpc::RpcError;
use noderpc::server::{Server, ServerConfig, ServerHandle};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, PartialEq, prost::Message)]
struct Counter {
    #[prost(int64, tag = "1")]
    value: i64,
}

fn greeter(method: &str, args: Payload) -> Result<Option<Payload>, RpcError> {
    match (method, args) {
        ("Hello", args @ Payload::Json(_)) => {
            let name: String = args.decode_json()?;
            Ok(Some(Payload::Json(json!(format!("hello {}", name)))))
        }
        ("Increment", args @ Payload::Protobuf(_)) => {
            let counter: Counter = args.decode_protobuf()?;
            Ok(Some(Payload::protobuf(&Counter {
                value: counter.value + 1,
            })))
        }
        ("Echo", args) => Ok(Some(args)),
        ("Nothing", _) => Ok(None),
        ("Fail", _) => Err(RpcError::application("boom")),
        (other, _) => Err(RpcError::application(format!("no method {}", other))),
    }
}

struct Running {
    handle: ServerHandle,
    processors: Arc<ProcessorRegistry>,
    held: Arc<Recorder>,
}

impl Running {
    fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.handle.local_addr().port())
    }

    async fn client(&self, config: ClientConfig) -> Client {
        Client::connect(self.addr(), self.processors.clone(), config)
            .await
            .unwrap()
    }
}

fn processors() -> Arc<ProcessorRegistry> {
    #[allow(unused_mut)]
    let mut processors = ProcessorRegistry::new();
    #[cfg(feature = "postcard")]
    processors
        .append(noderpc::processor::PostcardProcessor::new())
        .unwrap();
    Arc::new(processors)
}

async fn start(config: ServerConfig) -> Running {
    common::init_tracing();
    let handlers = Arc::new(HandlerRegistry::new());
    handlers.register(QueuedHandler::spawn("Greeter", greeter));
    let held = Recorder::new("Held", |_, args| Ok(Some(args)));
    held.set_mode(Mode::Hold);
    handlers.register(held.clone());

    let processors = processors();
    let server = Server::new(
        config.with_listen_addr("127.0.0.1:0"),
        processors.clone(),
        handlers,
    );
    let handle = server.start().await.unwrap();
    Running {
        handle,
        processors,
        held,
    }
}

async fn wait_for_connections(handle: &ServerHandle, expected: usize) {
    for _ in 0..200 {
        if handle.connection_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {} connections, have {}",
        expected,
        handle.connection_count()
    );
}

#[tokio::test]
async fn test_json_round_trip() {
    let server = start(ServerConfig::default()).await;
    let client = server.client(ClientConfig::default()).await;
    assert!(client.is_connected());

    let reply = client
        .call("Greeter.Hello", Payload::Json(json!("bob")))
        .await
        .unwrap();
    assert_eq!(reply, Some(Payload::Json(json!("hello bob"))));

    let error = client
        .call("Greeter.Fail", Payload::Json(json!(null)))
        .await
        .unwrap_err();
    assert_eq!(error, RpcError::application("boom"));

    let error = client
        .call("Nobody.Home", Payload::Json(json!(null)))
        .await
        .unwrap_err();
    assert!(error.to_string().contains("Nobody.Home"));
    assert_eq!(client.pending_len(), 0);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_null_reply_is_distinct_from_no_reply() {
    let server = start(ServerConfig::default()).await;
    let client = server.client(ClientConfig::default()).await;

    let reply = client
        .call("Greeter.Echo", Payload::Json(json!(null)))
        .await
        .unwrap();
    assert_eq!(reply, Some(Payload::Json(serde_json::Value::Null)));

    let reply = client
        .call("Greeter.Nothing", Payload::Json(json!(null)))
        .await
        .unwrap();
    assert_eq!(reply, None);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_protobuf_round_trip() {
    let server = start(ServerConfig::default()).await;
    let client = server.client(ClientConfig::default()).await;

    let reply = client
        .call("Greeter.Increment", Payload::protobuf(&Counter { value: 41 }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.decode_protobuf::<Counter>().unwrap(), Counter { value: 42 });

    // An explicitly chosen processor wins over the payload's shape.
    let protobuf = server.processors.lookup(PROTOBUF_PROCESSOR).cloned();
    let handle = client.go(
        protobuf,
        false,
        "Greeter.Echo",
        Payload::protobuf(&Counter { value: 7 }),
    );
    let reply = handle.result().await.unwrap().unwrap();
    assert_eq!(reply.decode_protobuf::<Counter>().unwrap(), Counter { value: 7 });

    server.handle.shutdown().await;
}

#[cfg(feature = "postcard")]
#[tokio::test]
async fn test_postcard_round_trip() {
    let server = start(ServerConfig::default()).await;
    let client = server.client(ClientConfig::default()).await;

    let args = Payload::postcard(&(3u32, "three")).unwrap();
    let reply = client.call("Greeter.Echo", args).await.unwrap().unwrap();
    let (n, word): (u32, String) = reply.decode_postcard().unwrap();
    assert_eq!((n, word.as_str()), (3, "three"));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_little_endian_framing() {
    let server = start(ServerConfig::default().with_little_endian(true)).await;
    let frame = noderpc::serialization::FrameConfig::default().with_little_endian(true);
    let client = server
        .client(ClientConfig::default().with_frame(frame))
        .await;

    let reply = client
        .call("Greeter.Hello", Payload::Json(json!("le")))
        .await
        .unwrap();
    assert_eq!(reply, Some(Payload::Json(json!("hello le"))));

    server.handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_one_connection() {
    let server = start(ServerConfig::default()).await;
    let client = Arc::new(server.client(ClientConfig::default()).await);

    let calls: Vec<_> = (0..64)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let reply = client
                    .call("Greeter.Echo", Payload::Json(json!(i)))
                    .await
                    .unwrap();
                (i, reply)
            })
        })
        .collect();
    for call in calls {
        let (i, reply) = call.await.unwrap();
        assert_eq!(reply, Some(Payload::Json(json!(i))));
    }
    assert_eq!(client.pending_len(), 0);
    assert_eq!(server.handle.connection_count(), 1);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_no_reply_call_completes_on_send() {
    let server = start(ServerConfig::default()).await;
    let client = server.client(ClientConfig::default()).await;

    let handle = client.go(None, true, "Held.Echo", Payload::Json(json!("quiet")));
    assert_eq!(handle.result().await, Ok(None));
    assert_eq!(client.pending_len(), 0);

    for _ in 0..200 {
        if server.held.held() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(server.held.held(), 1);
    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_connections_over_limit_are_refused() {
    let server = start(ServerConfig::default().with_max_conn_num(1)).await;
    let first = server.client(ClientConfig::default()).await;
    first
        .call("Greeter.Hello", Payload::Json(json!("first")))
        .await
        .unwrap();
    assert_eq!(server.handle.connection_count(), 1);

    let second = server.client(ClientConfig::default()).await;
    let error = second
        .call("Greeter.Hello", Payload::Json(json!("second")))
        .await
        .unwrap_err();
    assert_eq!(error, RpcError::ConnectionClosed);

    // The first connection keeps working.
    first
        .call("Greeter.Hello", Payload::Json(json!("again")))
        .await
        .unwrap();

    drop(first);
    wait_for_connections(&server.handle, 0).await;
    let third = server.client(ClientConfig::default()).await;
    third
        .call("Greeter.Hello", Payload::Json(json!("third")))
        .await
        .unwrap();

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_fails_pending_calls() {
    let server = start(ServerConfig::default()).await;
    let addr = server.addr();
    let client = server.client(ClientConfig::default()).await;

    let handle = client.go(None, false, "Held.Echo", Payload::Json(json!(1)));
    for _ in 0..200 {
        if server.held.held() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(client.pending_len(), 1);

    server.handle.shutdown().await;
    assert_eq!(handle.result().await, Err(RpcError::ConnectionClosed));
    assert_eq!(client.pending_len(), 0);
    assert!(!client.is_connected());

    assert!(Client::connect(addr, server.processors.clone(), ClientConfig::default())
        .await
        .is_err());
    let error = client
        .call("Greeter.Hello", Payload::Json(json!("late")))
        .await
        .unwrap_err();
    assert_eq!(error, RpcError::ConnectionClosed);
}

#[tokio::test]
async fn test_expiry_sweep_times_out_unanswered_calls() {
    let server = start(ServerConfig::default()).await;
    let config = ClientConfig::default()
        .with_call_timeout(Some(Duration::from_millis(100)))
        .with_expiry_interval(Duration::from_millis(20));
    let client = server.client(config).await;
    client.spawn_expiry_task();

    let handle = client.go(None, false, "Held.Echo", Payload::Json(json!("slow")));
    let seq = handle.seq();
    let error = handle.result().await.unwrap_err();
    assert!(matches!(error, RpcError::Timeout { seq: s, .. } if s == seq));
    assert_eq!(client.pending_len(), 0);

    // The late response is discarded and the connection stays usable.
    server.held.release_held();
    let reply = client
        .call("Greeter.Hello", Payload::Json(json!("after")))
        .await
        .unwrap();
    assert_eq!(reply, Some(Payload::Json(json!("hello after"))));

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_call_timeout_without_sweep() {
    let server = start(ServerConfig::default()).await;
    let config = ClientConfig::default().with_call_timeout(Some(Duration::from_millis(50)));
    let client = server.client(config).await;

    let error = client
        .call("Held.Echo", Payload::Json(json!("never")))
        .await
        .unwrap_err();
    assert!(error.is_timeout());
    assert_eq!(client.pending_len(), 0);

    server.handle.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let error = Server::new(
        ServerConfig::default().with_max_conn_num(0),
        processors(),
        Arc::new(HandlerRegistry::new()),
    )
    .start()
    .await
    .unwrap_err();
    assert!(error.to_string().starts_with("configuration error"));
}
