//! Wire protocol types.
//!
//! - `message`: op-tagged envelopes, inbound decoding, outbound framing
//! - `task`: recognition task payloads delivered by task updates

pub mod message;
pub mod task;

pub use message::{
    ClientMessage, HandshakeAck, HandshakeRequest, ImageMetadata, Op, OutboundFrame,
    ServerMessage,
};
pub use task::{FaceMatch, FacePosition, RecognitionTask, RecognizedFace, StageState, StageStatus};
