//! Dictionary of event layouts. Each event encoded into a stream carries a
//! dense integer id that refers to a layout registered here; the layouts are
//! later serialized into the textual metadata document.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Parent id for fields declared in the root scope of an event.
pub const ROOT_SCOPE: usize = usize::MAX;

/// 16-byte provider/event identifier in wire layout: the first three
/// components are stored little-endian, the trailing 8 bytes verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid([u8; 16]);

impl Guid {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        let d1 = data1.to_le_bytes();
        let d2 = data2.to_le_bytes();
        let d3 = data3.to_le_bytes();
        Guid([
            d1[0], d1[1], d1[2], d1[3], d2[0], d2[1], d3[0], d3[1], data4[0], data4[1], data4[2],
            data4[3], data4[4], data4[5], data4[6], data4[7],
        ])
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u16::from_le_bytes([b[4], b[5]]),
            u16::from_le_bytes([b[6], b[7]]),
            b[8],
            b[9],
            b[10],
            b[11],
            b[12],
            b[13],
            b[14],
            b[15]
        )
    }
}

/// Type of field supported by the output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Invalid,
    ArrayFixed,
    ArrayVar,
    StructBegin,
    StructEnd,
    BinaryFixed,
    BinaryVar,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Xint8,
    Xint16,
    Xint32,
    Xint64,
    String,
    Guid,
}

/// Immutable description of one logical field.
///
/// `size` carries the element count of fixed aggregates, `field_size` names
/// a previously declared integer field holding the runtime length of
/// variable aggregates, and `parent` is the index of the enclosing
/// scope-opening field within the same event ([`ROOT_SCOPE`] at top level).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    field_type: FieldType,
    name: String,
    size: u64,
    field_size: String,
    parent: usize,
}

impl Field {
    pub fn new(field_type: FieldType, name: &str) -> Self {
        Field {
            field_type,
            name: name.to_string(),
            size: 0,
            field_size: String::new(),
            parent: ROOT_SCOPE,
        }
    }

    pub fn scoped(field_type: FieldType, name: &str, parent: usize) -> Self {
        Field {
            field_type,
            name: name.to_string(),
            size: 0,
            field_size: String::new(),
            parent,
        }
    }

    pub fn fixed(field_type: FieldType, name: &str, size: u64, parent: usize) -> Self {
        Field {
            field_type,
            name: name.to_string(),
            size,
            field_size: String::new(),
            parent,
        }
    }

    pub fn variable(field_type: FieldType, name: &str, field_size: &str, parent: usize) -> Self {
        Field {
            field_type,
            name: name.to_string(),
            size: 0,
            field_size: field_size.to_string(),
            parent,
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn field_size(&self) -> &str {
        &self.field_size
    }

    pub fn parent(&self) -> usize {
        self.parent
    }
}

/// Layout of one event: the identifying descriptor plus the ordered field
/// sequence. Equality over both is the sole basis for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    name: String,
    guid: Guid,
    opcode: u8,
    version: u8,
    event_id: u16,
    fields: Vec<Field>,
}

impl Event {
    pub fn new() -> Self {
        Event {
            name: String::new(),
            guid: Guid::default(),
            opcode: 0,
            version: 0,
            event_id: 0,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn guid(&self) -> &Guid {
        &self.guid
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn event_id(&self) -> u16 {
        self.event_id
    }

    pub fn set_info(&mut self, guid: Guid, opcode: u8, version: u8, event_id: u16) {
        self.guid = guid;
        self.opcode = opcode;
        self.version = version;
        self.event_id = event_id;
    }

    /// Append a field. The caller guarantees the name is unique within this
    /// event.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Remove all fields.
    pub fn reset(&mut self) {
        self.fields.clear();
    }

    /// Truncate the field sequence to its first `len` entries.
    pub fn reset_to(&mut self, len: usize) {
        self.fields.truncate(len);
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicating registry of event layouts. The id of a layout is its
/// position in insertion order; ids are dense, start at zero, and are never
/// reused.
#[derive(Debug)]
pub struct Metadata {
    events: Vec<Event>,
    // structural hash -> candidate ids, to skip the linear scan
    index: HashMap<u64, Vec<usize>>,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata {
            events: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Return the id of a layout structurally equal to `event`, registering
    /// a clone of it first if none exists yet.
    pub fn get_id_for_event(&mut self, event: &Event) -> usize {
        let key = fingerprint(event);
        if let Some(candidates) = self.index.get(&key) {
            for &id in candidates {
                if self.events[id] == *event {
                    return id;
                }
            }
        }

        let id = self.events.len();
        self.events.push(event.clone());
        self.index.entry(key).or_default().push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Look up a registered layout.
    ///
    /// # Panics
    ///
    /// Panics if `event_id` was never assigned.
    pub fn get_event_with_id(&self, event_id: usize) -> &Event {
        &self.events[event_id]
    }

    /// Registered layouts in id order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

fn fingerprint(event: &Event) -> u64 {
    let mut hasher = DefaultHasher::new();
    event.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(guid_byte: u8, fields: &[Field]) -> Event {
        let mut event = Event::new();
        event.set_info(Guid::from_bytes([guid_byte; 16]), 1, 2, 3);
        event.set_name("sample");
        for field in fields {
            event.add_field(field.clone());
        }
        event
    }

    #[test]
    fn test_guid_display() {
        let guid = Guid::from_fields(
            0x3d6fa8d1,
            0xfe05,
            0x11d0,
            [0x9d, 0xda, 0x00, 0xc0, 0x4f, 0xd7, 0xba, 0x7c],
        );
        assert_eq!(guid.to_string(), "3d6fa8d1-fe05-11d0-9dda-00c04fd7ba7c");
    }

    #[test]
    fn test_guid_from_fields_wire_layout() {
        let guid = Guid::from_fields(0x04030201, 0x0605, 0x0807, [9, 10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(
            guid.as_bytes(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
        );
    }

    #[test]
    fn test_field_equality_structural() {
        let a = Field::new(FieldType::Uint32, "a");
        let b = Field::new(FieldType::Uint32, "a");
        let c = Field::new(FieldType::Uint32, "c");
        let d = Field::new(FieldType::Int32, "a");
        let e = Field::scoped(FieldType::Uint32, "a", 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, e);
        assert_ne!(
            Field::fixed(FieldType::BinaryFixed, "x", 4, ROOT_SCOPE),
            Field::fixed(FieldType::BinaryFixed, "x", 8, ROOT_SCOPE)
        );
        assert_ne!(
            Field::variable(FieldType::BinaryVar, "x", "len", ROOT_SCOPE),
            Field::variable(FieldType::BinaryVar, "x", "count", ROOT_SCOPE)
        );
    }

    #[test]
    fn test_event_equality_covers_descriptor_and_fields() {
        let fields = [
            Field::new(FieldType::Uint32, "a"),
            Field::new(FieldType::String, "b"),
        ];
        let a = sample_event(1, &fields);
        let b = sample_event(1, &fields);
        assert_eq!(a, b);

        let mut c = sample_event(1, &fields);
        c.set_info(Guid::from_bytes([2; 16]), 1, 2, 3);
        assert_ne!(a, c);

        let mut d = sample_event(1, &fields);
        d.set_name("other");
        assert_ne!(a, d);

        let reordered = [
            Field::new(FieldType::String, "b"),
            Field::new(FieldType::Uint32, "a"),
        ];
        assert_ne!(a, sample_event(1, &reordered));
    }

    #[test]
    fn test_event_reset() {
        let mut event = sample_event(
            1,
            &[
                Field::new(FieldType::Uint8, "a"),
                Field::new(FieldType::Uint8, "b"),
                Field::new(FieldType::Uint8, "c"),
            ],
        );

        event.reset_to(1);
        assert_eq!(event.field_count(), 1);
        assert_eq!(event.fields()[0].name(), "a");

        event.reset();
        assert_eq!(event.field_count(), 0);
    }

    #[test]
    fn test_metadata_dedup_identical_events() {
        let mut metadata = Metadata::new();
        let event = sample_event(
            1,
            &[
                Field::new(FieldType::Uint32, "a"),
                Field::new(FieldType::String, "b"),
            ],
        );

        assert_eq!(metadata.get_id_for_event(&event), 0);
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get_id_for_event(&event), 0);
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn test_metadata_distinct_layouts_get_dense_ids() {
        let mut metadata = Metadata::new();
        let e1 = sample_event(1, &[Field::new(FieldType::Uint32, "a")]);
        let e2 = sample_event(1, &[Field::new(FieldType::Uint64, "a")]);

        assert_eq!(metadata.get_id_for_event(&e1), 0);
        assert_eq!(metadata.get_id_for_event(&e2), 1);
        assert_eq!(metadata.len(), 2);

        assert_eq!(metadata.get_id_for_event(&e1), 0);
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn test_metadata_assigns_ids_in_first_seen_order() {
        let mut metadata = Metadata::new();
        let events: Vec<Event> = (0..10u8)
            .map(|i| sample_event(i, &[Field::new(FieldType::Uint8, "x")]))
            .collect();

        for (i, event) in events.iter().enumerate() {
            assert_eq!(metadata.get_id_for_event(event), i);
        }
        assert_eq!(metadata.len(), events.len());

        for (i, event) in events.iter().enumerate() {
            assert_eq!(metadata.get_id_for_event(event), i);
            assert_eq!(metadata.get_event_with_id(i), event);
        }
    }

    #[test]
    #[should_panic]
    fn test_metadata_unknown_id_panics() {
        let metadata = Metadata::new();
        metadata.get_event_with_id(0);
    }
}
