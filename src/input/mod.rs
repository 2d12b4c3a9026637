//! Binary stream input: bit cursor, packet mapping, indexing, readers.

pub mod bitbuffer;
pub mod index;
pub mod mapped;
pub mod packet;
pub mod stream_reader;
pub mod trace_reader;

pub use bitbuffer::BitBuffer;
pub use index::{PacketDescriptor, StreamInput};
pub use mapped::PacketMap;
pub use packet::{calculate_timestamp, PacketReader, LOST_EVENT_NAME};
pub use stream_reader::{ReadStatus, StreamInputReader};
pub use trace_reader::{InterruptHandle, TraceReader};
