//! Serialization of the layout dictionary into the textual metadata
//! document consumed alongside the binary streams.
//!
//! Nesting follows the flat bracket sequence: `StructBegin`, `ArrayFixed`
//! and `ArrayVar` open a scope, `StructEnd` closes the innermost one.
//! `Field::parent` is a convenience index and is not consulted here.

use crate::metadata::{Event, Field, FieldType, Guid, Metadata};

/// Render the metadata document for every registered event, in id order.
///
/// `trace_uuid` must match the uuid encoded in each stream's packet header.
pub fn serialize(metadata: &Metadata, trace_uuid: &Guid) -> String {
    let mut out = String::new();

    out.push_str("/* CTF 1.8 */\n\n");
    serialize_typealiases(&mut out);
    serialize_trace_block(&mut out, trace_uuid);
    serialize_stream_block(&mut out);

    for (id, event) in metadata.events().iter().enumerate() {
        serialize_event(&mut out, id, event);
    }

    out
}

fn serialize_typealiases(out: &mut String) {
    for size in [8, 16, 32, 64] {
        out.push_str(&format!(
            "typealias integer {{ size = {size}; align = 8; signed = true; }} := int{size}_t;\n"
        ));
    }
    for size in [8, 16, 32, 64] {
        out.push_str(&format!(
            "typealias integer {{ size = {size}; align = 8; signed = false; }} := uint{size}_t;\n"
        ));
    }
    for size in [8, 16, 32, 64] {
        out.push_str(&format!(
            "typealias integer {{ size = {size}; align = 8; signed = false; base = 16; }} := xint{size}_t;\n"
        ));
    }
    out.push('\n');
}

fn serialize_trace_block(out: &mut String, trace_uuid: &Guid) {
    out.push_str("trace {\n");
    out.push_str("    major = 1;\n");
    out.push_str("    minor = 8;\n");
    out.push_str(&format!("    uuid = \"{trace_uuid}\";\n"));
    out.push_str("    byte_order = le;\n");
    out.push_str("    packet.header := struct {\n");
    out.push_str("        uint32_t magic;\n");
    out.push_str("        uint8_t uuid[16];\n");
    out.push_str("    };\n");
    out.push_str("};\n\n");
}

fn serialize_stream_block(out: &mut String) {
    out.push_str("stream {\n");
    out.push_str("    packet.context := struct {\n");
    out.push_str("        uint32_t content_size;\n");
    out.push_str("        uint32_t packet_size;\n");
    out.push_str("    };\n");
    out.push_str("    event.header := struct {\n");
    out.push_str("        uint32_t id;\n");
    out.push_str("        uint64_t timestamp;\n");
    out.push_str("    };\n");
    out.push_str("};\n\n");
}

fn serialize_event(out: &mut String, id: usize, event: &Event) {
    out.push_str("event {\n");
    out.push_str(&format!("    id = {id};\n"));
    out.push_str(&format!("    name = \"{}\";\n", event.name()));
    out.push_str("    fields := struct {\n");
    serialize_fields(out, event);
    out.push_str("    };\n");
    out.push_str("};\n\n");
}

fn serialize_fields(out: &mut String, event: &Event) {
    let mut depth = 2;
    let mut scopes: Vec<&Field> = Vec::new();

    for field in event.fields() {
        match field.field_type() {
            FieldType::Invalid => {}
            FieldType::StructBegin | FieldType::ArrayFixed | FieldType::ArrayVar => {
                indent(out, depth);
                out.push_str("struct {\n");
                scopes.push(field);
                depth += 1;
            }
            FieldType::StructEnd => {
                // Brackets are assumed balanced at registration time.
                if let Some(opener) = scopes.pop() {
                    depth -= 1;
                    indent(out, depth);
                    match opener.field_type() {
                        FieldType::ArrayFixed => {
                            out.push_str(&format!("}} {}[{}];\n", opener.name(), opener.size()));
                        }
                        FieldType::ArrayVar => {
                            out.push_str(&format!(
                                "}} {}[{}];\n",
                                opener.name(),
                                opener.field_size()
                            ));
                        }
                        _ => out.push_str(&format!("}} {};\n", opener.name())),
                    }
                }
            }
            FieldType::BinaryFixed => {
                scalar(out, depth, &format!("uint8_t {}[{}];", field.name(), field.size()));
            }
            FieldType::BinaryVar => {
                scalar(
                    out,
                    depth,
                    &format!("uint8_t {}[{}];", field.name(), field.field_size()),
                );
            }
            FieldType::Guid => scalar(out, depth, &format!("uint8_t {}[16];", field.name())),
            FieldType::String => scalar(out, depth, &format!("string {};", field.name())),
            FieldType::Int8 => integer(out, depth, "int8_t", field),
            FieldType::Int16 => integer(out, depth, "int16_t", field),
            FieldType::Int32 => integer(out, depth, "int32_t", field),
            FieldType::Int64 => integer(out, depth, "int64_t", field),
            FieldType::Uint8 => integer(out, depth, "uint8_t", field),
            FieldType::Uint16 => integer(out, depth, "uint16_t", field),
            FieldType::Uint32 => integer(out, depth, "uint32_t", field),
            FieldType::Uint64 => integer(out, depth, "uint64_t", field),
            FieldType::Xint8 => integer(out, depth, "xint8_t", field),
            FieldType::Xint16 => integer(out, depth, "xint16_t", field),
            FieldType::Xint32 => integer(out, depth, "xint32_t", field),
            FieldType::Xint64 => integer(out, depth, "xint64_t", field),
        }
    }
}

fn integer(out: &mut String, depth: usize, type_name: &str, field: &Field) {
    scalar(out, depth, &format!("{} {};", type_name, field.name()));
}

fn scalar(out: &mut String, depth: usize, declaration: &str) {
    indent(out, depth);
    out.push_str(declaration);
    out.push('\n');
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}
