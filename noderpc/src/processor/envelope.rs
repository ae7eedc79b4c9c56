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

//! Request and response envelopes.
//!
//! Every processor decodes its wire envelope into these shapes, so the agent
//! and the client can read `seq`, `service_method` and `no_reply` without
//! knowing which codec produced them. Arguments and replies stay encoded in
//! the processor's own format until a handler asks for them.

use bytes::Bytes;

/// Separator between the handler name and the method name.
pub const SERVICE_METHOD_SEPARATOR: char = '.';

/// A decoded request envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestData {
    /// Correlation sequence; 0 when none could be attributed.
    pub seq: u64,
    /// Target in `Handler.Method` form.
    pub service_method: String,
    /// The caller does not want a response.
    pub no_reply: bool,
    /// Processor-encoded arguments.
    pub args: Bytes,
}

impl RequestData {
    /// Correlation sequence.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Target in `Handler.Method` form.
    pub fn service_method(&self) -> &str {
        &self.service_method
    }

    /// Returns `true` if no response must be sent.
    pub fn is_no_reply(&self) -> bool {
        self.no_reply
    }

    /// Clears every field, keeping the method string's allocation.
    pub fn clear(&mut self) {
        self.seq = 0;
        self.service_method.clear();
        self.no_reply = false;
        self.args = Bytes::new();
    }
}

/// A decoded response envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseData {
    /// Sequence of the call being answered.
    pub seq: u64,
    /// Error text; empty on success.
    pub error: String,
    /// Processor-encoded reply.
    pub reply: Bytes,
}

impl ResponseData {
    /// Sequence of the call being answered.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The error text, if the call failed.
    pub fn error(&self) -> Option<&str> {
        if self.error.is_empty() {
            None
        } else {
            Some(&self.error)
        }
    }

    /// Processor-encoded reply bytes; empty when there is no reply.
    pub fn reply(&self) -> &[u8] {
        &self.reply
    }
}

/// Splits `Handler.Method` into its two parts.
///
/// Returns `None` unless the string has exactly one separator with a
/// non-empty name on each side.
///
/// ```rust
/// use noderpc::processor::split_service_method;
///
/// assert_eq!(split_service_method("UserHandler.Login"), Some(("UserHandler", "Login")));
/// assert_eq!(split_service_method("NoDot"), None);
/// assert_eq!(split_service_method("a.b.c"), None);
/// assert_eq!(split_service_method(".Login"), None);
/// ```
pub fn split_service_method(service_method: &str) -> Option<(&str, &str)> {
    let (handler, method) = service_method.split_once(SERVICE_METHOD_SEPARATOR)?;
    if handler.is_empty() || method.is_empty() || method.contains(SERVICE_METHOD_SEPARATOR) {
        return None;
    }
    Some((handler, method))
}

/// The method part of `Handler.Method`, or the whole string when it has no
/// handler prefix.
pub fn method_name(service_method: &str) -> &str {
    match service_method.rsplit_once(SERVICE_METHOD_SEPARATOR) {
        Some((_, method)) => method,
        None => service_method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rejects_empty_parts() {
        assert_eq!(split_service_method("Handler."), None);
        assert_eq!(split_service_method(""), None);
        assert_eq!(split_service_method("."), None);
        assert_eq!(split_service_method("A.B"), Some(("A", "B")));
    }

    #[test]
    fn test_method_name() {
        assert_eq!(method_name("UserHandler.Login"), "Login");
        assert_eq!(method_name("Login"), "Login");
    }

    #[test]
    fn test_request_clear() {
        let mut request = RequestData {
            seq: 9,
            service_method: "A.B".to_string(),
            no_reply: true,
            args: Bytes::from_static(b"{}"),
        };
        request.clear();
        assert_eq!(request, RequestData::default());
    }

    #[test]
    fn test_response_error_accessor() {
        let mut response = ResponseData::default();
        assert_eq!(response.error(), None);
        response.error = "boom".to_string();
        assert_eq!(response.error(), Some("boom"));
    }
}
