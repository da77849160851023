use ctf_format::{
    tsdl, CtfStreamWriter, Event, Field, FieldType, Guid, Metadata, Packet, CTF_MAGIC, ROOT_SCOPE,
};
use tracing::warn;

use crate::dissector::DissectorRegistry;
use crate::source::{BufferRecord, EventRecord};

// Stamped into every packet header and echoed by the metadata document.
const TRACE_UUID: Guid = Guid::from_fields(
    0x2a6e5fe4,
    0x9c3b,
    0x4d10,
    [0x8f, 0x6b, 0x3e, 0x9d, 0x41, 0xc2, 0x7a, 0x55],
);

const DEFAULT_STREAM_NAME: &str = "stream";
const METADATA_STREAM_NAME: &str = "metadata";

/// Decoding driver: turns source records into encoded packets, registers
/// each event's layout for a dense id, and hands the packet bytes to the
/// stream writer. Streams follow the source buffers; the schema document is
/// written last.
pub struct CtfConverter {
    metadata: Metadata,
    registry: DissectorRegistry,
    writer: CtfStreamWriter,
}

impl CtfConverter {
    pub fn new(registry: DissectorRegistry, writer: CtfStreamWriter) -> Self {
        CtfConverter {
            metadata: Metadata::new(),
            registry,
            writer,
        }
    }

    /// Open the initial stream and emit its header, so that a trace with no
    /// buffer records still produces a valid stream file.
    pub fn start(&mut self) -> eyre::Result<()> {
        self.writer.open_stream(DEFAULT_STREAM_NAME)?;
        let mut packet = Packet::new();
        self.encode_stream_header(&mut packet, 0);
        self.writer.write(packet.raw_bytes())?;
        Ok(())
    }

    /// Switch to the stream of the next source buffer.
    pub fn on_buffer(&mut self, buffer: &BufferRecord) -> eyre::Result<()> {
        if self.writer.is_stream_open() {
            if let Err(e) = self.writer.close_stream() {
                warn!(error = %e, "failed to close stream");
            }
        }

        self.writer.open_stream(&buffer.stream_name())?;
        let mut packet = Packet::new();
        self.encode_stream_header(&mut packet, buffer.size);
        self.writer.write(packet.raw_bytes())?;
        Ok(())
    }

    /// Decode one event record and append its packet to the open stream.
    pub fn on_event(&mut self, record: &EventRecord<'_>) -> eyre::Result<()> {
        let mut packet = Packet::new();
        packet.set_timestamp(record.timestamp);

        // Event header: the id slot is patched once the layout is known.
        packet.set_event_id_offset(packet.len());
        packet.encode_u32(0);
        packet.encode_u64(record.timestamp);

        let mut event = Event::new();
        event.set_info(record.guid, record.opcode, record.version, record.event_id);

        if !self.registry.decode_event(
            &record.guid,
            record.opcode,
            record.payload,
            &mut packet,
            &mut event,
        ) {
            encode_opaque(record.payload, &mut packet, &mut event);
        }

        if event.name().is_empty() {
            event.set_name(format!(
                "{}:{}:{}:{}",
                record.guid, record.opcode, record.version, record.event_id
            ));
        }

        let id = self.metadata.get_id_for_event(&event);
        packet.update_u32(packet.event_id_offset(), id as u32);
        self.writer.write(packet.raw_bytes())?;
        Ok(())
    }

    /// Close the last stream and write the metadata document. Failure here
    /// is fatal to the conversion: without its schema the trace is
    /// unreadable.
    pub fn finish(mut self) -> eyre::Result<()> {
        if self.writer.is_stream_open() {
            if let Err(e) = self.writer.close_stream() {
                warn!(error = %e, "failed to close final stream");
            }
        }

        self.writer.open_stream(METADATA_STREAM_NAME)?;
        let document = tsdl::serialize(&self.metadata, &TRACE_UUID);
        self.writer.write(document.as_bytes())?;
        self.writer.close_stream()?;
        Ok(())
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn encode_stream_header(&self, packet: &mut Packet, buffer_size: u32) {
        packet.encode_u32(CTF_MAGIC);
        packet.encode_bytes(TRACE_UUID.as_bytes());
        packet.set_packet_context_offset(packet.len());
        packet.encode_u32(buffer_size);
        packet.encode_u32(buffer_size);
    }
}

fn encode_opaque(payload: &[u8], packet: &mut Packet, event: &mut Event) {
    event.add_field(Field::fixed(
        FieldType::BinaryFixed,
        "data",
        payload.len() as u64,
        ROOT_SCOPE,
    ));
    packet.encode_bytes(payload);
}
