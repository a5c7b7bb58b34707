//! FMS wire codec: byte-exact request packing and response parsing for the
//! EDC terminal dialect, plus the stream codec used by the socket
//! transport and the optional native-library delegation.

pub mod codec;
pub mod frame;
pub mod native;
pub mod request;
pub mod response;
pub mod stream;

pub use codec::{CodecHandle, MessageCodec, PureCodec};
pub use frame::{build_frame, compute_lrc, decode_length, encode_length};
pub use native::NativeCodec;
pub use request::{PackedFields, TransactionRequest, pack_request, prepare_request};
pub use response::{ParsedResponse, parse_response};
pub use stream::{FmsFrameCodec, SocketItem};
