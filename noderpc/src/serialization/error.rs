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

//! Codec error types.
//!
//! Processors report failures while turning payloads and envelopes into bytes
//! as [`SerializationError`], and failures in the opposite direction as
//! [`DeserializationError`]. Both carry a human readable message and, when a
//! library error caused them, the original error as their source.

use std::error::Error as StdError;
use std::fmt;

type BoxedSource = Box<dyn StdError + Send + Sync>;

macro_rules! codec_error {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            message: String,
            source: Option<BoxedSource>,
        }

        impl $name {
            /// Creates an error with a message and no underlying cause.
            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                    source: None,
                }
            }

            /// Creates an error wrapping the library error that caused it.
            pub fn with_source(
                message: impl Into<String>,
                source: impl StdError + Send + Sync + 'static,
            ) -> Self {
                Self {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }

            /// The message given when the error was created.
            #[must_use]
            pub fn message(&self) -> &str {
                &self.message
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, ": {}"), self.message)?;
                if let Some(source) = &self.source {
                    write!(f, " ({})", source)?;
                }
                Ok(())
            }
        }

        impl StdError for $name {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                self.source
                    .as_ref()
                    .map(|e| e.as_ref() as &(dyn StdError + 'static))
            }
        }
    };
}

codec_error!(
    /// Failure to encode a payload or envelope.
    SerializationError,
    "serialization failed"
);

codec_error!(
    /// Failure to decode a payload or envelope.
    DeserializationError,
    "deserialization failed"
);

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("invalid json value", err)
    }
}

impl From<serde_json::Error> for DeserializationError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source("malformed json", err)
    }
}

impl From<prost::EncodeError> for SerializationError {
    fn from(err: prost::EncodeError) -> Self {
        Self::with_source("protobuf encode", err)
    }
}

impl From<prost::DecodeError> for DeserializationError {
    fn from(err: prost::DecodeError) -> Self {
        Self::with_source("malformed protobuf", err)
    }
}

#[cfg(feature = "postcard")]
impl From<postcard::Error> for SerializationError {
    fn from(err: postcard::Error) -> Self {
        Self::with_source("postcard encode", err)
    }
}

#[cfg(feature = "postcard")]
impl From<postcard::Error> for DeserializationError {
    fn from(err: postcard::Error) -> Self {
        Self::with_source("malformed postcard", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_without_source() {
        let error = SerializationError::new("payload kind mismatch");
        assert_eq!(
            error.to_string(),
            "serialization failed: payload kind mismatch"
        );
        assert_eq!(error.message(), "payload kind mismatch");
        assert!(error.source().is_none());
    }

    #[test]
    fn test_source_is_kept() {
        let cause = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let error = DeserializationError::from(cause);
        assert!(error.to_string().starts_with("deserialization failed: malformed json ("));
        assert!(error.source().is_some());
    }
}
