//! Wire format: encoding batches for the transport, decoding them on the
//! collector side and writing the decoded events to the log.

pub mod collector;
pub mod decode;
pub mod payload;
