//! Codec selection: the pure reference implementation and the optional
//! native-library delegation.
//!
//! The bank ships a vendor shared library that packs requests and parses
//! responses. The simulator can delegate to it when present, but the pure
//! Rust implementation is the reference: both must produce byte-identical
//! frames and field-identical parses, and the conformance tests in
//! `tests/` hold them to that.
//!
//! Selection is a runtime decision (a configuration flag plus library
//! availability), never a compile-time branch, so the same binary can run
//! the equivalence suite against both implementations.

use crate::native::NativeCodec;
use crate::request::{TransactionRequest, pack_request, prepare_request};
use crate::response::{ParsedResponse, parse_response};
use ecrsim_core::Result;
use tracing::{info, warn};

/// Request packing and response parsing, independent of implementation.
pub trait MessageCodec: Send + Sync {
    /// Validate a request and produce the 205-byte wire frame.
    fn pack(&self, request: &TransactionRequest, pre_multiplied: bool) -> Result<Vec<u8>>;

    /// Parse a framed device response.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedResponse>;
}

/// The pure Rust reference codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PureCodec;

impl MessageCodec for PureCodec {
    fn pack(&self, request: &TransactionRequest, pre_multiplied: bool) -> Result<Vec<u8>> {
        pack_request(request, pre_multiplied)
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedResponse> {
        parse_response(bytes)
    }
}

/// The production codec: native library when loadable and enabled, pure
/// fallback otherwise — including per-call fallback when a native call
/// fails after loading succeeded.
pub struct CodecHandle {
    native: Option<NativeCodec>,
}

impl CodecHandle {
    /// Select the codec per the runtime flag.
    ///
    /// `disable_native` forces the pure implementation even when the
    /// vendor library is present; this is what the equivalence test
    /// environment toggles.
    #[must_use]
    pub fn select(disable_native: bool) -> Self {
        if disable_native {
            info!("native codec disabled by configuration, using pure implementation");
            return CodecHandle { native: None };
        }

        match NativeCodec::load() {
            Ok(native) => {
                info!(version = %native.version().unwrap_or_default(), "native codec loaded");
                CodecHandle { native: Some(native) }
            }
            Err(e) => {
                info!("native codec unavailable ({e}), using pure implementation");
                CodecHandle { native: None }
            }
        }
    }

    /// Whether the native library is serving this handle.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }
}

impl MessageCodec for CodecHandle {
    fn pack(&self, request: &TransactionRequest, pre_multiplied: bool) -> Result<Vec<u8>> {
        let _ = pre_multiplied;
        // Validation runs once, up front; its errors are final and are
        // never masked by a codec fallback.
        let fields = prepare_request(request)?;

        if let Some(native) = &self.native {
            match native.pack(&fields) {
                Ok(frame) => return Ok(frame),
                Err(e) => warn!("native pack failed ({e}), falling back to pure codec"),
            }
        }

        Ok(crate::frame::build_frame(&fields.to_payload()))
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedResponse> {
        if let Some(native) = &self.native {
            match native.parse(bytes) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => warn!("native parse failed ({e}), falling back to pure codec"),
            }
        }

        parse_response(bytes)
    }
}
