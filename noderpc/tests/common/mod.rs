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

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use noderpc::handler::{HandlerFinder, HandlerRegistry, PushError, RpcHandler};
use noderpc::pool::BufferPool;
use noderpc::processor::{Payload, ProcessorId, ProcessorRegistry, ResponseData};
use noderpc::rpc::{RpcError, RpcRequest};
use noderpc::serialization::framing::{encode_msg, read_msg, FrameConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("noderpc=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

type Behaviour = dyn Fn(&str, Payload) -> Result<Option<Payload>, RpcError> + Send + Sync;

/// What a [`Recorder`] does with a pushed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Completes it right away with the behaviour's result.
    Answer,
    /// Refuses it.
    Refuse,
    /// Keeps it until [`Recorder::release_held`].
    Hold,
    /// Drops it without a result.
    Discard,
}

/// A handler that records every request pushed to it.
pub struct Recorder {
    name: String,
    mode: Mutex<Mode>,
    behaviour: Box<Behaviour>,
    seen: Mutex<Vec<(u64, String)>>,
    held: Mutex<Vec<RpcRequest>>,
}

impl Recorder {
    pub fn new<F>(name: &str, behaviour: F) -> Arc<Self>
    where
        F: Fn(&str, Payload) -> Result<Option<Payload>, RpcError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            mode: Mutex::new(Mode::Answer),
            behaviour: Box::new(behaviour),
            seen: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }

    /// `(seq, service_method)` of every pushed request, in push order.
    pub fn seen(&self) -> Vec<(u64, String)> {
        self.seen.lock().clone()
    }

    pub fn held(&self) -> usize {
        self.held.lock().len()
    }

    /// Completes held requests, last pushed first.
    pub fn release_held(&self) {
        let held: Vec<RpcRequest> = self.held.lock().drain(..).collect();
        for request in held.into_iter().rev() {
            self.answer(request);
        }
    }

    fn answer(&self, mut request: RpcRequest) {
        let method = request.method_name().to_string();
        let result = request
            .take_args()
            .and_then(|args| (self.behaviour)(&method, args));
        request.complete(result);
    }
}

impl RpcHandler for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn push_request(&self, request: RpcRequest) -> Result<(), PushError> {
        self.seen
            .lock()
            .push((request.seq(), request.service_method().to_string()));
        let mode = *self.mode.lock();
        match mode {
            Mode::Answer => self.answer(request),
            Mode::Refuse => return Err(PushError::new(request, "overloaded")),
            Mode::Hold => self.held.lock().push(request),
            Mode::Discard => drop(request),
        }
        Ok(())
    }

    fn call_method(&self, service_method: &str, args: Payload) -> Result<Option<Payload>, RpcError> {
        let method = noderpc::processor::method_name(service_method);
        (self.behaviour)(method, args)
    }
}

/// A finder that counts lookups.
#[derive(Default)]
pub struct CountingFinder {
    pub registry: HandlerRegistry,
    lookups: AtomicUsize,
}

impl CountingFinder {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl HandlerFinder for CountingFinder {
    fn find_rpc_handler(&self, name: &str) -> Option<Arc<dyn RpcHandler>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.registry.find_rpc_handler(name)
    }
}

/// Encodes a complete request frame.
pub fn request_frame(
    processors: &ProcessorRegistry,
    id: ProcessorId,
    seq: u64,
    service_method: &str,
    no_reply: bool,
    args: &Payload,
) -> Vec<u8> {
    let processor = processors.lookup(id).expect("processor registered");
    let args = processor.marshal(args).expect("marshal args");
    let request = processor.make_rpc_request(seq, service_method, no_reply, args);
    let body = processor.encode_request(&request).expect("encode request");
    encode_msg(&FrameConfig::default(), &[&[id], &body]).expect("frame fits")
}

/// Encodes a frame around a raw envelope.
pub fn raw_frame(id: ProcessorId, envelope: &[u8]) -> Vec<u8> {
    encode_msg(&FrameConfig::default(), &[&[id], envelope]).expect("frame fits")
}

pub async fn send<W: AsyncWrite + Unpin>(stream: &mut W, frame: &[u8]) {
    stream.write_all(frame).await.expect("write frame");
}

/// Reads one response frame and decodes its envelope.
pub async fn read_response<R: AsyncRead + Unpin>(
    stream: &mut R,
    processors: &ProcessorRegistry,
) -> (ProcessorId, ResponseData) {
    let frame = read_msg(stream, &FrameConfig::default(), &BufferPool::default())
        .await
        .expect("response frame");
    let id = frame[0];
    let mut response = ResponseData::default();
    processors
        .lookup(id)
        .expect("processor registered")
        .decode_response(&frame[1..], &mut response)
        .expect("decode response");
    (id, response)
}
