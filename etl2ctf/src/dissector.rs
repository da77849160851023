use ctf_format::{Event, Guid, Packet};
use tracing::debug;

/// A decoder for one family of provider payloads.
///
/// A successful `decode` appends field descriptors to `event` and the
/// matching bytes to `packet` in lockstep: replaying the appended fields
/// against the appended bytes must parse exactly. A refusing decoder may
/// leave partial output behind; the registry rolls both sides back before
/// trying the next decoder.
pub trait Dissector {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn decode(
        &self,
        guid: &Guid,
        opcode: u8,
        payload: &[u8],
        packet: &mut Packet,
        event: &mut Event,
    ) -> bool;
}

/// Ordered chain of dissectors, built once before the driver runs.
pub struct DissectorRegistry {
    dissectors: Vec<Box<dyn Dissector>>,
}

impl DissectorRegistry {
    pub fn new() -> Self {
        DissectorRegistry {
            dissectors: Vec::new(),
        }
    }

    /// Add a dissector to the head of the chain, so later registrations are
    /// tried first.
    pub fn register(&mut self, dissector: Box<dyn Dissector>) {
        debug!(
            name = dissector.name(),
            description = dissector.description(),
            "registered dissector"
        );
        self.dissectors.insert(0, dissector);
    }

    pub fn len(&self) -> usize {
        self.dissectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dissectors.is_empty()
    }

    /// Try each dissector in chain order until one claims the payload.
    ///
    /// After a refusal, `packet` and `event` are truncated back to their
    /// pre-attempt lengths, so every dissector sees a clean slate. Returns
    /// false if no dissector claims the payload.
    pub fn decode_event(
        &self,
        guid: &Guid,
        opcode: u8,
        payload: &[u8],
        packet: &mut Packet,
        event: &mut Event,
    ) -> bool {
        let packet_mark = packet.len();
        let field_mark = event.field_count();

        for dissector in &self.dissectors {
            if dissector.decode(guid, opcode, payload, packet, event) {
                return true;
            }
            event.reset_to(field_mark);
            packet.reset(packet_mark);
        }

        false
    }
}

impl Default for DissectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_format::{Field, FieldType};

    struct RefuseAll;

    impl Dissector for RefuseAll {
        fn name(&self) -> &'static str {
            "refuse"
        }

        fn description(&self) -> &'static str {
            "refuses every payload"
        }

        fn decode(&self, _: &Guid, _: u8, _: &[u8], _: &mut Packet, _: &mut Event) -> bool {
            false
        }
    }

    struct RefuseDirty;

    impl Dissector for RefuseDirty {
        fn name(&self) -> &'static str {
            "refuse-dirty"
        }

        fn description(&self) -> &'static str {
            "writes partial output, then refuses"
        }

        fn decode(
            &self,
            _: &Guid,
            _: u8,
            _: &[u8],
            packet: &mut Packet,
            event: &mut Event,
        ) -> bool {
            event.add_field(Field::new(FieldType::Uint64, "partial"));
            packet.encode_u64(0xDEAD);
            false
        }
    }

    struct AcceptByte;

    impl Dissector for AcceptByte {
        fn name(&self) -> &'static str {
            "accept"
        }

        fn description(&self) -> &'static str {
            "claims every payload with a single byte"
        }

        fn decode(
            &self,
            _: &Guid,
            _: u8,
            _: &[u8],
            packet: &mut Packet,
            event: &mut Event,
        ) -> bool {
            event.add_field(Field::new(FieldType::Uint8, "x"));
            packet.encode_u8(0xAB);
            true
        }
    }

    #[test]
    fn test_first_claiming_dissector_wins() {
        let mut registry = DissectorRegistry::new();
        registry.register(Box::new(AcceptByte));
        registry.register(Box::new(RefuseAll));

        let mut packet = Packet::new();
        let mut event = Event::new();
        let claimed = registry.decode_event(
            &Guid::default(),
            0,
            &[1, 2, 3],
            &mut packet,
            &mut event,
        );

        assert!(claimed);
        assert_eq!(event.field_count(), 1);
        assert_eq!(event.fields()[0].name(), "x");
        assert_eq!(packet.raw_bytes(), &[0xAB]);
    }

    #[test]
    fn test_rollback_discards_partial_output() {
        let mut registry = DissectorRegistry::new();
        registry.register(Box::new(AcceptByte));
        registry.register(Box::new(RefuseDirty));

        let mut packet = Packet::new();
        packet.encode_u32(0);
        let mut event = Event::new();
        event.add_field(Field::new(FieldType::Uint32, "header"));

        let claimed =
            registry.decode_event(&Guid::default(), 0, &[], &mut packet, &mut event);

        assert!(claimed);
        assert_eq!(event.field_count(), 2);
        assert_eq!(event.fields()[0].name(), "header");
        assert_eq!(event.fields()[1].name(), "x");
        assert_eq!(packet.raw_bytes(), &[0, 0, 0, 0, 0xAB]);
    }

    #[test]
    fn test_total_miss_restores_pre_attempt_state() {
        let mut registry = DissectorRegistry::new();
        registry.register(Box::new(RefuseDirty));
        registry.register(Box::new(RefuseAll));

        let mut packet = Packet::new();
        packet.encode_u16(7);
        let mut event = Event::new();

        let claimed =
            registry.decode_event(&Guid::default(), 0, &[], &mut packet, &mut event);

        assert!(!claimed);
        assert_eq!(event.field_count(), 0);
        assert_eq!(packet.raw_bytes(), &[7, 0]);
    }

    #[test]
    fn test_later_registrations_take_priority() {
        struct Tagged(u8);

        impl Dissector for Tagged {
            fn name(&self) -> &'static str {
                "tagged"
            }

            fn description(&self) -> &'static str {
                "claims with its tag byte"
            }

            fn decode(
                &self,
                _: &Guid,
                _: u8,
                _: &[u8],
                packet: &mut Packet,
                event: &mut Event,
            ) -> bool {
                event.add_field(Field::new(FieldType::Uint8, "tag"));
                packet.encode_u8(self.0);
                true
            }
        }

        let mut registry = DissectorRegistry::new();
        registry.register(Box::new(Tagged(1)));
        registry.register(Box::new(Tagged(2)));

        let mut packet = Packet::new();
        let mut event = Event::new();
        registry.decode_event(&Guid::default(), 0, &[], &mut packet, &mut event);

        assert_eq!(packet.raw_bytes(), &[2]);
    }

    #[test]
    fn test_empty_registry_claims_nothing() {
        let registry = DissectorRegistry::new();
        let mut packet = Packet::new();
        let mut event = Event::new();

        assert!(!registry.decode_event(&Guid::default(), 0, &[1], &mut packet, &mut event));
        assert!(registry.is_empty());
    }
}
