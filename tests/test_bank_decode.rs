
use fixtures::*;

use fev::{
    DeserializationError, EventMode, FevParser, NodeKind, ParserSettings, PlayMode,
    Position3DType, Property, Rolloff3DType, StreamingType,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

fn parse(data: Vec<u8>) -> fev::Result<fev::Bank> {
    ensure_env_logger_initialized();
    FevParser::from_buffer(data).parse_bank()
}

fn decode_error(data: Vec<u8>) -> DeserializationError {
    match parse(data) {
        Ok(bank) => panic!("expected decode to fail, got {:?}", bank),
        Err(e) => match e {
            fev::FevError::Deserialization(inner) => inner,
            other => panic!("expected a deserialization error, got {:?}", other),
        },
    }
}

/// Header, no wave banks, empty root category and no event groups.
fn prelude() -> FevBuilder {
    let mut b = FevBuilder::new();
    b.header("bank").wave_banks(&[]).category("", 0.0, 0.0, 0);
    b
}

fn bank_with_single_event(event: &EventSpec) -> Vec<u8> {
    let mut b = prelude();
    b.u32(1).event_category("root", 0, 1).event(event);
    b.templates(&[]).definitions(&[]).reverbs(&[]);
    b.finish()
}

#[test]
fn test_minimal_bank() {
    let bank = parse(empty_bank()).unwrap();

    assert_eq!(bank.bank_name(), "");
    assert!(bank.wave_banks().is_empty());
    assert!(bank.events().is_empty());
    assert!(bank.sound_definitions().is_empty());
    assert!(bank.reverb_definitions().is_empty());
    assert_eq!(bank.categories().len(), 1);
    assert_eq!(bank.categories()[0].name, "");
    assert!(bank.categories()[0].subcategories.is_empty());
}

#[test]
fn test_bad_magic_fails_without_reading_further() {
    for magic in [b"FEV0", b"1VEF", b"\0\0\0\0"] {
        let mut data = empty_bank();
        data[..4].copy_from_slice(magic);

        assert!(matches!(
            decode_error(data),
            DeserializationError::InvalidMagic { magic: found } if &found == magic
        ));
    }
}

#[test]
fn test_full_bank() {
    let bank = parse(full_bank()).unwrap();

    assert_eq!(bank.bank_name(), "weapons");

    let wave_banks = bank.wave_banks();
    assert_eq!(wave_banks.len(), 2);
    assert_eq!(wave_banks[0].name, "weapons_stream");
    assert_eq!(wave_banks[0].max_streams, 32);
    assert_eq!(wave_banks[0].streaming_type, StreamingType::StreamFromDisk);
    assert_eq!(wave_banks[0].reserved, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(wave_banks[1].streaming_type, StreamingType::LoadIntoMemory);

    let categories: Vec<(&str, u32, u32)> = bank
        .all_categories()
        .map(|c| (c.name.as_str(), c.volume, c.pitch))
        .collect();
    assert_eq!(
        categories,
        vec![
            ("master", 1, 0),
            ("music", 0, 0),
            ("sfx", 1, 2),
            ("guns", 0, 0)
        ]
    );

    let names: Vec<&str> = bank.events().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["reload", "shot"]);

    let shot = bank.find_event("shot").unwrap();
    assert_eq!(shot.mode, EventMode::ThreeD);
    assert_eq!(shot.rolloff_3d, Rolloff3DType::Linear);
    assert_eq!(shot.position_3d, Position3DType::HeadRelative);
    assert_eq!(shot.volume_randomization, 0.25);
    assert_eq!(shot.position_randomization_3d, 3);
    assert_eq!(shot.category, "master/sfx");
    assert_eq!(
        shot.layers.iter().map(|l| l.priority).collect::<Vec<_>>(),
        vec![-1, 2]
    );
    assert_eq!(shot.user_properties.get("gain"), Some(&Property::Float(0.5)));
    assert_eq!(
        shot.user_properties.get("tag"),
        Some(&Property::String("loud".to_owned()))
    );

    let reload = bank.find_event("reload").unwrap();
    assert_eq!(reload.mode, EventMode::TwoD);
    assert_eq!(reload.rolloff_3d, Rolloff3DType::Unspecified);
    assert_eq!(reload.position_3d, Position3DType::WorldRelative);
    assert_eq!(reload.user_properties.get("clip"), Some(&Property::Int(30)));

    assert_eq!(bank.sound_definitions().len(), 2);
    let sd = bank.sound_definition("reload_sd").unwrap();
    assert_eq!(sd.play_mode, PlayMode::RandomNoRepeat);
    assert_eq!(sd.spawn_time_min, 10);
    assert_eq!(sd.maximum_spawned_sounds, 4);
    assert_eq!(sd.pitch_randomization, 0.2);

    let reverb = &bank.reverb_definitions()[0];
    assert_eq!(reverb.name, "hall");
    assert_eq!(reverb.room, -1000);
    assert_eq!(reverb.reflections, -2602);
    assert_eq!(reverb.lf_reference, 250.0);
}

#[test]
fn test_streaming_type_codes() {
    let mut b = FevBuilder::new();
    b.header("bank").wave_banks(&[
        (0x0B00_0000, 1, "disk"),
        (0x0001_0000, 1, "decompress"),
        (0xFFFF_FFFF, 1, "unknown"),
    ]);
    b.category("", 0.0, 0.0, 0)
        .u32(0)
        .templates(&[])
        .definitions(&[])
        .reverbs(&[]);

    let bank = parse(b.finish()).unwrap();
    let types: Vec<StreamingType> = bank.wave_banks().iter().map(|w| w.streaming_type).collect();
    assert_eq!(
        types,
        vec![
            StreamingType::StreamFromDisk,
            StreamingType::DecompressIntoMemory,
            StreamingType::DecompressIntoMemory
        ]
    );
}

#[test]
fn test_flag_word_decoding() {
    let cases = [
        (
            MODE_3D | ROLLOFF_LINEAR | POSITION_HEAD_RELATIVE,
            EventMode::ThreeD,
            Rolloff3DType::Linear,
            Position3DType::HeadRelative,
        ),
        (
            MODE_2D | ROLLOFF_LOGARITHMIC | ROLLOFF_LINEAR,
            EventMode::TwoD,
            Rolloff3DType::Logarithmic,
            Position3DType::WorldRelative,
        ),
        (
            MODE_2D | MODE_3D | ROLLOFF_CUSTOM,
            EventMode::ThreeD,
            Rolloff3DType::Custom,
            Position3DType::WorldRelative,
        ),
    ];

    for (flags, mode, rolloff, position) in cases {
        let mut event = EventSpec::new("e");
        event.flags = flags;

        let bank = parse(bank_with_single_event(&event)).unwrap();
        let decoded = &bank.events()[0];
        assert_eq!(decoded.mode, mode, "flags 0x{:08x}", flags);
        assert_eq!(decoded.rolloff_3d, rolloff, "flags 0x{:08x}", flags);
        assert_eq!(decoded.position_3d, position, "flags 0x{:08x}", flags);
        assert_eq!(decoded.flags.bits(), flags);
    }
}

#[test]
fn test_flag_word_without_mode_is_rejected() {
    let mut event = EventSpec::new("e");
    event.flags = ROLLOFF_LINEAR;

    assert!(matches!(
        decode_error(bank_with_single_event(&event)),
        DeserializationError::InvalidEventMode { flags, .. } if flags == ROLLOFF_LINEAR
    ));
}

#[test]
fn test_template_index_out_of_range() {
    let template = TemplateSpec {
        play_mode: 0,
        spawn_time_min: 0,
        spawn_time_max: 0,
        maximum_spawned_sounds: 1,
        volume: 1.0,
        volume_randomization: 0.0,
        pitch: 0.0,
        pitch_randomization: 0.0,
        position_3d_randomization: 0.0,
    };

    let mut b = prelude();
    b.u32(0)
        .templates(&[template.clone(), template])
        .definitions(&[("ok", 1), ("broken", 2)])
        .reverbs(&[]);

    match decode_error(b.finish()) {
        DeserializationError::TemplateIndexOutOfRange { name, index, count } => {
            assert_eq!(name, "broken");
            assert_eq!(index, 2);
            assert_eq!(count, 2);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_invalid_property_type_stops_the_list() {
    let mut event = EventSpec::new("e");
    event.properties = vec![
        ("first", PropertyValue::Int(1)),
        ("bad", PropertyValue::Raw(3)),
        // Never reached, even though it would decode fine.
        ("after", PropertyValue::Int(2)),
    ];

    match decode_error(bank_with_single_event(&event)) {
        DeserializationError::InvalidPropertyType { value, name, .. } => {
            assert_eq!(value, 3);
            assert_eq!(name, "bad");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_event_category_property_type_is_validated() {
    let mut b = prelude();
    b.u32(1).event_category_with(
        "root",
        &[
            ("notes", PropertyValue::String("kept")),
            ("color", PropertyValue::Raw(7)),
        ],
        0,
        0,
    );
    b.templates(&[]).definitions(&[]).reverbs(&[]);

    match decode_error(b.finish()) {
        DeserializationError::InvalidPropertyType { value, name, .. } => {
            assert_eq!(value, 7);
            assert_eq!(name, "color");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_duplicate_property_names_keep_last_value() {
    let mut event = EventSpec::new("e");
    event.properties = vec![
        ("loops", PropertyValue::Int(1)),
        ("loops", PropertyValue::String("forever")),
    ];

    let bank = parse(bank_with_single_event(&event)).unwrap();
    let properties = &bank.events()[0].user_properties;
    assert_eq!(properties.len(), 1);
    assert_eq!(
        properties.get("loops"),
        Some(&Property::String("forever".to_owned()))
    );
}

// Events with type id 16 carry 36 bytes before and 12 bytes after their user properties,
// every other type carries 4 and 4.
#[test]
fn test_type_id_16_event_layout() {
    let mut extended = EventSpec::new("extended");
    extended.type_id = 16;
    extended.properties = vec![("mood", PropertyValue::String("tense"))];
    extended.category = "master/music";

    let mut plain = EventSpec::new("plain");
    plain.type_id = 15;
    plain.properties = vec![("mood", PropertyValue::String("calm"))];

    let mut b = prelude();
    b.u32(1)
        .event_category("root", 0, 2)
        .event(&extended)
        .event(&plain);
    b.templates(&[]).definitions(&[]).reverbs(&[]);

    let bank = parse(b.finish()).unwrap();
    let extended = bank.find_event("extended").unwrap();
    assert_eq!(extended.type_id, 16);
    assert_eq!(extended.category, "master/music");
    assert_eq!(
        extended.user_properties.get("mood"),
        Some(&Property::String("tense".to_owned()))
    );

    let plain = bank.find_event("plain").unwrap();
    assert_eq!(plain.type_id, 15);
    assert_eq!(plain.category, "master");
}

#[test]
fn test_event_counts_match_declared_counts() {
    // root(2 subcategories, 1 event) -> a(1 subcategory, 2 events) -> b(0, 1)
    //                                -> c(0, 0)
    let mut b = prelude();
    b.u32(2);
    b.event_category("root", 2, 1)
        .event_category("a", 1, 2)
        .event_category("b", 0, 1)
        .event(&EventSpec::new("b1"))
        .event(&EventSpec::new("a1"))
        .event(&EventSpec::new("a2"))
        .event_category("c", 0, 0)
        .event(&EventSpec::new("root1"));
    b.event_category("second", 0, 1)
        .event(&EventSpec::new("second1"));
    b.templates(&[]).definitions(&[]).reverbs(&[]);

    let bank = parse(b.finish()).unwrap();
    let names: Vec<&str> = bank.events().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["b1", "a1", "a2", "root1", "second1"]);
}

#[test]
fn test_truncated_input_fails_at_every_cut() {
    let data = full_bank();

    // Every strict prefix of a valid bank must fail cleanly.
    for len in (0..data.len()).step_by(7) {
        let err = decode_error(data[..len].to_vec());
        assert!(
            matches!(err, DeserializationError::UnexpectedEndOfStream { .. }),
            "prefix of {} bytes: {:?}",
            len,
            err
        );
    }
}

#[test]
fn test_guid_bytes_are_preserved() {
    let mut event = EventSpec::new("e");
    event.guid = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    let bank = parse(bank_with_single_event(&event)).unwrap();
    let guid = bank.events()[0].guid;
    assert_eq!(guid.as_bytes(), &event.guid);
    assert_eq!(guid.to_string(), "00112233-4455-6677-8899-aabbccddeeff");
}

#[test]
fn test_node_observer_reports_depths() {
    let visits = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&visits);

    let parser = FevParser::from_buffer(full_bank()).with_configuration(
        ParserSettings::new().node_observer(move |visit| {
            sink.lock().unwrap().push((visit.kind, visit.depth));
        }),
    );
    parser.parse_bank().unwrap();

    let visits = visits.lock().unwrap();
    assert_eq!(
        *visits,
        vec![
            (NodeKind::Category, 0),
            (NodeKind::Category, 1),
            (NodeKind::Category, 1),
            (NodeKind::Category, 2),
            (NodeKind::EventCategory, 0),
            (NodeKind::EventCategory, 1),
            (NodeKind::Event, 2),
            (NodeKind::Event, 1),
        ]
    );
}

#[test]
fn test_chain_of_oversized_category_counts_fails_cleanly() {
    let mut b = FevBuilder::new();
    b.header("bank").wave_banks(&[]);
    for _ in 0..1_000 {
        b.category("", 0.0, 0.0, u32::MAX);
    }

    assert!(matches!(
        decode_error(b.finish()),
        DeserializationError::UnexpectedEndOfStream { .. }
    ));
}
