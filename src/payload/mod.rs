// Payload module - The typed field set and its byte codec

mod codec;
mod model;

pub use codec::{CodecError, PayloadCodec, FORMAT_VERSION};
pub use model::{FieldValue, Payload, PayloadError};
