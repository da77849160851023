//! Built-in dissectors for a few NT kernel logger providers. Each one
//! recognizes a fixed payload layout by provider guid, opcode and length,
//! then declares fields and re-encodes the payload bytes in lockstep.

use ctf_format::{Event, Field, FieldType, Guid, Packet};

use crate::dissector::{Dissector, DissectorRegistry};

const PERF_INFO_PROVIDER: Guid = Guid::from_fields(
    0xce1dbfb4,
    0x137e,
    0x4da6,
    [0x87, 0xb0, 0x3f, 0x59, 0xaa, 0x10, 0x2c, 0xbc],
);

const THREAD_PROVIDER: Guid = Guid::from_fields(
    0x3d6fa8d1,
    0xfe05,
    0x11d0,
    [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c],
);

const IMAGE_PROVIDER: Guid = Guid::from_fields(
    0x2cb15d1d,
    0x5fc1,
    0x11d2,
    [0xab, 0xe1, 0x00, 0xa0, 0xc9, 0x11, 0xf5, 0x18],
);

const OPCODE_SAMPLE_PROFILE: u8 = 46;
const OPCODE_THREAD_START: u8 = 1;
const OPCODE_THREAD_END: u8 = 2;
const OPCODE_THREAD_DC_START: u8 = 3;
const OPCODE_THREAD_DC_END: u8 = 4;
const OPCODE_IMAGE_UNLOAD: u8 = 2;
const OPCODE_IMAGE_LOAD: u8 = 10;

/// Register the built-in kernel dissectors.
pub fn register_defaults(registry: &mut DissectorRegistry) {
    registry.register(Box::new(PerfInfoDissector));
    registry.register(Box::new(ThreadDissector));
    registry.register(Box::new(ImageDissector));
}

/// PerfInfo sampled-profile interrupt events.
pub struct PerfInfoDissector;

impl Dissector for PerfInfoDissector {
    fn name(&self) -> &'static str {
        "perfinfo"
    }

    fn description(&self) -> &'static str {
        "kernel sampled-profile events"
    }

    fn decode(
        &self,
        guid: &Guid,
        opcode: u8,
        payload: &[u8],
        packet: &mut Packet,
        event: &mut Event,
    ) -> bool {
        if *guid != PERF_INFO_PROVIDER || opcode != OPCODE_SAMPLE_PROFILE || payload.len() != 16 {
            return false;
        }

        event.set_name("PerfInfo:SampleProfile");
        event.add_field(Field::new(FieldType::Xint64, "InstructionPointer"));
        packet.encode_u64(read_u64(payload, 0));
        event.add_field(Field::new(FieldType::Uint32, "ThreadId"));
        packet.encode_u32(read_u32(payload, 8));
        event.add_field(Field::new(FieldType::Uint16, "Count"));
        packet.encode_u16(read_u16(payload, 12));
        event.add_field(Field::new(FieldType::Uint16, "Reserved"));
        packet.encode_u16(read_u16(payload, 14));
        true
    }
}

/// Thread lifetime events, 64-bit v3 layout.
pub struct ThreadDissector;

impl Dissector for ThreadDissector {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn description(&self) -> &'static str {
        "kernel thread start/end events"
    }

    fn decode(
        &self,
        guid: &Guid,
        opcode: u8,
        payload: &[u8],
        packet: &mut Packet,
        event: &mut Event,
    ) -> bool {
        if *guid != THREAD_PROVIDER || payload.len() != 68 {
            return false;
        }
        let name = match opcode {
            OPCODE_THREAD_START => "Thread:Start",
            OPCODE_THREAD_END => "Thread:End",
            OPCODE_THREAD_DC_START => "Thread:DCStart",
            OPCODE_THREAD_DC_END => "Thread:DCEnd",
            _ => return false,
        };

        event.set_name(name);
        event.add_field(Field::new(FieldType::Uint32, "ProcessId"));
        packet.encode_u32(read_u32(payload, 0));
        event.add_field(Field::new(FieldType::Uint32, "TThreadId"));
        packet.encode_u32(read_u32(payload, 4));
        for (name, offset) in [
            ("StackBase", 8),
            ("StackLimit", 16),
            ("UserStackBase", 24),
            ("UserStackLimit", 32),
            ("Affinity", 40),
            ("Win32StartAddr", 48),
            ("TebBase", 56),
        ] {
            event.add_field(Field::new(FieldType::Xint64, name));
            packet.encode_u64(read_u64(payload, offset));
        }
        event.add_field(Field::new(FieldType::Uint32, "SubProcessTag"));
        packet.encode_u32(read_u32(payload, 64));
        true
    }
}

/// Image load/unload events, 64-bit layout with a trailing wide file name.
pub struct ImageDissector;

// Fixed-size prefix before the NUL-terminated UTF-16 FileName.
const IMAGE_FIXED_LEN: usize = 56;

impl Dissector for ImageDissector {
    fn name(&self) -> &'static str {
        "image"
    }

    fn description(&self) -> &'static str {
        "kernel image load/unload events"
    }

    fn decode(
        &self,
        guid: &Guid,
        opcode: u8,
        payload: &[u8],
        packet: &mut Packet,
        event: &mut Event,
    ) -> bool {
        if *guid != IMAGE_PROVIDER || payload.len() < IMAGE_FIXED_LEN {
            return false;
        }
        let name = match opcode {
            OPCODE_IMAGE_LOAD => "Image:Load",
            OPCODE_IMAGE_UNLOAD => "Image:Unload",
            _ => return false,
        };

        let wide: Vec<u16> = payload[IMAGE_FIXED_LEN..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        let file_name = match String::from_utf16(&wide) {
            Ok(file_name) => file_name,
            Err(_) => return false,
        };

        event.set_name(name);
        event.add_field(Field::new(FieldType::Xint64, "ImageBase"));
        packet.encode_u64(read_u64(payload, 0));
        event.add_field(Field::new(FieldType::Xint64, "ImageSize"));
        packet.encode_u64(read_u64(payload, 8));
        event.add_field(Field::new(FieldType::Uint32, "ProcessId"));
        packet.encode_u32(read_u32(payload, 16));
        event.add_field(Field::new(FieldType::Xint32, "ImageChecksum"));
        packet.encode_u32(read_u32(payload, 20));
        event.add_field(Field::new(FieldType::Uint32, "TimeDateStamp"));
        packet.encode_u32(read_u32(payload, 24));
        event.add_field(Field::new(FieldType::Uint32, "Reserved0"));
        packet.encode_u32(read_u32(payload, 28));
        event.add_field(Field::new(FieldType::Xint64, "DefaultBase"));
        packet.encode_u64(read_u64(payload, 32));
        for (name, offset) in [
            ("Reserved1", 40),
            ("Reserved2", 44),
            ("Reserved3", 48),
            ("Reserved4", 52),
        ] {
            event.add_field(Field::new(FieldType::Uint32, name));
            packet.encode_u32(read_u32(payload, offset));
        }
        event.add_field(Field::new(FieldType::String, "FileName"));
        packet.encode_string(&file_name);
        true
    }
}

fn read_u16(payload: &[u8], offset: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&payload[offset..offset + 2]);
    u16::from_le_bytes(bytes)
}

fn read_u32(payload: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&payload[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(payload: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&payload[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
