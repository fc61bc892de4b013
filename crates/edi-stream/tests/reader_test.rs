use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use edi_core::{DelimiterRole, Error, Event, EventKind, ValidationError};
use edi_schema::{ControlSchemaRegistry, Schema, SchemaLoader};
use edi_stream::{EdiStreamReader, ReaderConfig};

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn open_fixture(path: &str) -> File {
    File::open(repo_root().join("testdata").join(path)).expect("fixture should open")
}

fn load_schema(name: &str) -> Arc<Schema> {
    let path = repo_root().join(format!("testdata/schemas/{name}.yaml"));
    Arc::new(SchemaLoader::load_from_file(&path).expect("schema should load"))
}

fn resolving() -> ReaderConfig {
    ReaderConfig::new().resolve_control_schemas(true)
}

/// Read every event, binding `transaction` at each START_TRANSACTION.
fn read_all<R: Read>(
    reader: &mut EdiStreamReader<R>,
    transaction: Option<&Arc<Schema>>,
) -> Vec<Event> {
    let mut events = Vec::new();
    while reader.has_next().expect("has_next should succeed") {
        let kind = reader.next().expect("next should succeed");
        if kind == EventKind::StartTransaction {
            if let Some(schema) = transaction {
                reader
                    .set_transaction_schema(Arc::clone(schema))
                    .expect("transaction schema should bind");
            }
        }
        events.push(reader.event().expect("current event").clone());
    }
    events
}

fn errors(events: &[Event]) -> Vec<&Event> {
    events.iter().filter(|e| e.kind().is_error()).collect()
}

fn find<'a>(events: &'a [Event], kind: EventKind, text: &str) -> &'a Event {
    events
        .iter()
        .find(|e| e.kind() == kind && e.text() == Some(text))
        .unwrap_or_else(|| panic!("no {kind} event with text {text}"))
}

#[test]
fn x12_delimiters_are_available_inside_the_interchange() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    assert!(matches!(reader.delimiters(), Err(Error::IllegalState(_))));

    assert_eq!(reader.next().unwrap(), EventKind::StartInterchange);
    let delimiters = reader.delimiters().unwrap();
    assert_eq!(delimiters.len(), 5);
    assert_eq!(delimiters[&DelimiterRole::Segment], '~');
    assert_eq!(delimiters[&DelimiterRole::DataElement], '*');
    assert_eq!(delimiters[&DelimiterRole::ComponentElement], ':');
    assert_eq!(delimiters[&DelimiterRole::Repetition], '^');
    assert_eq!(delimiters[&DelimiterRole::Decimal], '.');

    assert_eq!(reader.standard().unwrap(), "X12");
    assert_eq!(reader.version().unwrap(), ["00501".to_string()]);
}

#[test]
fn interchange_accessors_fail_once_the_interchange_ends() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    while reader.next().unwrap() != EventKind::EndInterchange {}

    assert!(matches!(reader.delimiters(), Err(Error::IllegalState(_))));
    assert!(matches!(reader.standard(), Err(Error::IllegalState(_))));
    assert!(matches!(reader.version(), Err(Error::IllegalState(_))));
    assert!(!reader.has_next().unwrap());
    assert!(matches!(reader.next(), Err(Error::EndOfStream)));
}

#[test]
fn edifact_una_delimiters_and_released_text() {
    let mut reader = EdiStreamReader::new(open_fixture("edifact/invoic_una.edi"));
    assert_eq!(reader.next().unwrap(), EventKind::StartInterchange);

    let delimiters = reader.delimiters().unwrap();
    assert_eq!(delimiters.len(), 6);
    assert_eq!(delimiters[&DelimiterRole::Decimal], ',');
    assert_eq!(delimiters[&DelimiterRole::Release], '?');
    assert_eq!(delimiters[&DelimiterRole::Repetition], ' ');
    assert_eq!(reader.standard().unwrap(), "EDIFACT");
    assert_eq!(reader.version().unwrap(), ["UNOA".to_string(), "3".to_string()]);

    let events = read_all(&mut reader, None);
    assert!(errors(&events).is_empty());
    let document_number = find(&events, EventKind::ElementData, "INV+001");
    assert_eq!(document_number.location().segment_tag(), Some("BGM"));
    assert_eq!(document_number.location().element_position(), 2);
    find(&events, EventKind::ElementData, "1234,56");
}

#[test]
fn next_tag_visits_every_segment() {
    let config = ReaderConfig::new().validate_control_structure(false);
    let mut reader = EdiStreamReader::with_config(open_fixture("x12/simple997.edi"), config);

    let mut tags = Vec::new();
    loop {
        match reader.next_tag() {
            Ok(_) => tags.push(reader.text().unwrap().to_string()),
            Err(Error::EndOfStream) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(
        tags,
        ["ISA", "GS", "ST", "AK1", "AK2", "AK3", "AK4", "AK5", "AK9", "SE", "GE", "IEA"]
    );
}

#[test]
fn event_type_tracks_the_current_event() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    assert!(reader.has_next().unwrap());
    assert!(matches!(reader.event_type(), Err(Error::IllegalState(_))));

    let kind = reader.next().unwrap();
    assert_eq!(reader.event_type().unwrap(), kind);
    assert_eq!(reader.text().unwrap(), "INTERCHANGE");

    assert_eq!(reader.next().unwrap(), EventKind::StartSegment);
    assert_eq!(reader.text().unwrap(), "ISA");
    assert_eq!(reader.next().unwrap(), EventKind::ElementData);
    assert_eq!(reader.text().unwrap(), "00");
}

#[test]
fn closed_reader_rejects_every_call() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    reader.next().unwrap();
    reader.close();

    assert!(!reader.has_next().unwrap());
    assert!(matches!(reader.next(), Err(Error::IllegalState(_))));
    assert!(matches!(reader.event_type(), Err(Error::IllegalState(_))));
    assert!(matches!(reader.text(), Err(Error::IllegalState(_))));
    assert!(matches!(reader.location(), Err(Error::IllegalState(_))));
    assert!(matches!(reader.error_type(), Err(Error::IllegalState(_))));
}

#[test]
fn text_characters_are_copied_with_bounds_checks() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    loop {
        if reader.next().unwrap() == EventKind::ElementData
            && reader.text().unwrap() == "ReceiverDept"
        {
            break;
        }
    }

    let mut target = ['\0'; 20];
    assert_eq!(reader.get_text_characters(0, &mut target, 0, 20).unwrap(), 12);
    assert_eq!(target[..12].iter().collect::<String>(), "ReceiverDept");

    let mut target = ['\0'; 4];
    assert_eq!(reader.get_text_characters(8, &mut target, 0, 4).unwrap(), 4);
    assert_eq!(target.iter().collect::<String>(), "Dept");

    let mut target = ['\0'; 20];
    assert!(matches!(
        reader.get_text_characters(13, &mut target, 0, 5),
        Err(Error::IndexOutOfBounds(_))
    ));
    assert!(matches!(
        reader.get_text_characters(0, &mut target, 15, 10),
        Err(Error::IndexOutOfBounds(_))
    ));
}

#[test]
fn composite_events_carry_no_text() {
    let mut reader = EdiStreamReader::new(open_fixture("edifact/invoic_una.edi"));
    while reader.next().unwrap() != EventKind::StartComposite {}
    assert!(matches!(reader.text(), Err(Error::IllegalState(_))));
    assert!(matches!(reader.error_type(), Err(Error::IllegalState(_))));
}

#[test]
fn locations_follow_segments_elements_and_components() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    let before = reader.location().unwrap();
    assert_eq!(before.segment_position(), -1);
    assert_eq!(before.element_position(), -1);

    let schema = load_schema("997");
    let events = read_all(&mut reader, Some(&schema));
    assert!(errors(&events).is_empty());

    let isa_elements: Vec<&Event> = events
        .iter()
        .filter(|e| e.location().segment_tag() == Some("ISA") && e.kind() == EventKind::ElementData)
        .collect();
    assert_eq!(isa_elements.len(), 16);
    let isa11 = isa_elements[10];
    assert_eq!(isa11.text(), Some("^"));
    assert_eq!(isa11.location().element_position(), 11);
    assert_eq!(isa11.location().component_position(), -1);

    let ak4 = find(&events, EventKind::StartSegment, "AK4");
    assert_eq!(ak4.location().segment_position(), 7);
    assert_eq!(ak4.location().element_position(), -1);

    let start = events
        .iter()
        .position(|e| e.kind() == EventKind::StartComposite)
        .expect("AK401 is read as a composite");
    let composite = events[start].location();
    assert_eq!(composite.segment_position(), 7);
    assert_eq!(composite.element_position(), 1);
    assert_eq!(composite.component_position(), -1);

    let component = events[start + 1].location();
    assert_eq!(events[start + 1].text(), Some("8"));
    assert_eq!(component.element_position(), 1);
    assert_eq!(component.element_occurrence(), 1);
    assert_eq!(component.component_position(), 1);

    assert_eq!(events[start + 2].kind(), EventKind::EndComposite);
    assert_eq!(events[start + 2].location().component_position(), -1);

    let ak402 = find(&events, EventKind::ElementData, "66").location();
    assert_eq!(ak402.segment_position(), 7);
    assert_eq!(ak402.element_position(), 2);
    assert_eq!(ak402.component_position(), -1);

    let end_ak4 = find(&events, EventKind::EndSegment, "AK4").location();
    assert_eq!(end_ak4.segment_position(), 7);
    assert_eq!(end_ak4.element_position(), -1);

    let loop_start = find(&events, EventKind::StartLoop, "L_AK2").location();
    assert_eq!(loop_start.segment_tag(), Some("AK2"));
    assert_eq!(loop_start.segment_position(), 5);

    let loop_end = find(&events, EventKind::EndLoop, "L_AK3").location();
    assert_eq!(loop_end.segment_tag(), Some("AK5"));
    assert_eq!(loop_end.segment_position(), 8);

    let end = events.last().expect("events were read");
    assert_eq!(end.kind(), EventKind::EndInterchange);
    assert_eq!(end.location().segment_position(), -1);
}

#[test]
fn invalid_element_reports_data_errors_only() {
    let mut reader = EdiStreamReader::with_config(open_fixture("x12/invalid997.edi"), resolving());
    let events = read_all(&mut reader, Some(&load_schema("997")));

    let found = errors(&events);
    assert_eq!(found.len(), 2, "unexpected errors: {found:?}");
    assert_eq!(found[0].error(), Some(ValidationError::DataElementTooLong));
    assert_eq!(found[1].error(), Some(ValidationError::InvalidCharacterData));
    for event in found {
        assert_eq!(event.kind(), EventKind::ElementDataError);
        assert_eq!(event.text(), Some("12A45"));
        assert_eq!(event.location().segment_position(), 7);
        assert_eq!(event.location().element_position(), 2);
    }

    find(&events, EventKind::ElementData, "12A45");
}

#[test]
fn extra_trailing_delimiters_are_not_errors() {
    let mut reader =
        EdiStreamReader::with_config(open_fixture("x12/extraDelimiter997.edi"), resolving());
    let events = read_all(&mut reader, Some(&load_schema("997")));

    // Only the second AK3/AK4 pair breaks the schema, with its repetitions.
    let found = errors(&events);
    assert!(!found.is_empty());
    assert!(
        found.iter().all(|e| e.location().segment_position() >= 8),
        "{found:?}"
    );
}

#[test]
fn repetitions_and_components_carry_their_positions() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/extraDelimiter997.edi"));
    let events = read_all(&mut reader, None);
    assert!(errors(&events).is_empty(), "{:?}", errors(&events));

    let positions: Vec<(i32, i32, i32, i32, &str)> = events
        .iter()
        .filter(|e| e.kind() == EventKind::ElementData && e.location().segment_position() >= 8)
        .filter(|e| matches!(e.location().segment_tag(), Some("AK3" | "AK4")))
        .map(|e| {
            let l = e.location();
            (
                l.segment_position(),
                l.element_position(),
                l.element_occurrence(),
                l.component_position(),
                e.text().unwrap_or_default(),
            )
        })
        .collect();

    assert_eq!(
        positions,
        vec![
            (8, 1, 1, -1, "NM1"),
            (8, 2, 1, -1, "AK302-R1"),
            (8, 2, 2, -1, "AK302-R2"),
            (8, 2, 3, 1, "AK302-R3-COMP1"),
            (8, 2, 3, 2, "AK302-R3-COMP2"),
            (8, 3, 1, -1, "8"),
            (8, 4, 1, -1, "AK304-R1"),
            (8, 4, 2, -1, "AK304-R2"),
            (8, 4, 3, -1, "AK304-R3"),
            (9, 1, 1, -1, "8"),
            (9, 2, 1, -1, "66"),
            (9, 3, 1, -1, "7"),
            (9, 4, 1, 1, "AK404-R1-COMP1"),
            (9, 4, 1, 2, "AK404-R1-COMP2"),
            (9, 4, 1, 3, "AK404-R1-COMP3"),
            (9, 4, 2, 1, "AK404-R2-COMP1"),
            (9, 4, 2, 2, "AK404-R2-COMP2"),
        ]
    );

    let composites: Vec<(i32, i32, i32)> = events
        .iter()
        .filter(|e| e.kind() == EventKind::StartComposite && e.location().segment_position() >= 8)
        .map(|e| {
            let l = e.location();
            (l.segment_position(), l.element_position(), l.element_occurrence())
        })
        .collect();
    assert_eq!(composites, vec![(8, 2, 3), (9, 4, 1), (9, 4, 2)]);
}

#[test]
fn control_schema_is_resolved_by_version() {
    let mut reader = EdiStreamReader::with_config(open_fixture("x12/simple997.edi"), resolving());
    assert_eq!(reader.next().unwrap(), EventKind::StartInterchange);
    assert!(reader.control_schema().is_none());

    reader.next().unwrap();
    assert_eq!(reader.control_schema().unwrap().name(), "X12.00402");
}

#[test]
fn unknown_versions_leave_the_control_schema_unbound() {
    let text = fs::read_to_string(repo_root().join("testdata/x12/simple997.edi")).unwrap();
    for version in ["00000", "00001"] {
        let input = text.replace("*^*00501*", &format!("*^*{version}*"));
        let mut reader = EdiStreamReader::with_config(input.as_bytes(), resolving());

        assert_eq!(reader.next().unwrap(), EventKind::StartInterchange);
        assert_eq!(reader.version().unwrap(), [version.to_string()]);
        reader.next().unwrap();
        assert!(reader.control_schema().is_none());

        let events = read_all(&mut reader, None);
        assert!(errors(&events).is_empty());
    }
}

#[test]
fn caller_control_schema_takes_precedence() {
    let registry = Arc::new(ControlSchemaRegistry::with_builtins());
    let mut reader =
        EdiStreamReader::new(open_fixture("x12/simple997.edi")).with_registry(registry);
    assert_eq!(reader.next().unwrap(), EventKind::StartInterchange);

    let old = Arc::new(edi_schema::control::x12_00200().unwrap());
    reader.set_control_schema(old).unwrap();
    assert!(matches!(
        reader.set_control_schema(Arc::new(edi_schema::control::x12_00402().unwrap())),
        Err(Error::IllegalState(_))
    ));

    reader.next().unwrap();
    assert_eq!(reader.control_schema().unwrap().name(), "X12.00200");
}

#[test]
fn control_schema_can_only_be_set_at_interchange_start() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    reader.next().unwrap();
    reader.next().unwrap();

    let schema = Arc::new(edi_schema::control::x12_00402().unwrap());
    assert!(matches!(
        reader.set_control_schema(schema),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn transaction_schema_window_closes_at_first_body_segment() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    let ack = load_schema("997");
    let other = load_schema("275");

    assert_eq!(reader.next().unwrap(), EventKind::StartInterchange);
    assert!(matches!(
        reader.set_transaction_schema(Arc::clone(&ack)),
        Err(Error::IllegalState(_))
    ));

    while reader.next().unwrap() != EventKind::StartTransaction {}
    reader.set_transaction_schema(Arc::clone(&other)).unwrap();

    assert_eq!(reader.next().unwrap(), EventKind::StartSegment);
    assert_eq!(reader.text().unwrap(), "ST");
    reader.set_transaction_schema(Arc::clone(&other)).unwrap();

    while reader.next().unwrap() != EventKind::EndSegment {}
    reader.set_transaction_schema(Arc::clone(&ack)).unwrap();
    assert_eq!(reader.transaction_schema().unwrap().name(), "997");

    assert_eq!(reader.next().unwrap(), EventKind::StartSegment);
    assert_eq!(reader.text().unwrap(), "AK1");
    assert!(matches!(
        reader.set_transaction_schema(Arc::clone(&other)),
        Err(Error::IllegalState(_))
    ));

    let events = read_all(&mut reader, None);
    assert!(errors(&events).is_empty(), "{:?}", errors(&events));

    let end = events
        .iter()
        .position(|e| e.kind() == EventKind::EndTransaction)
        .unwrap();
    assert!(events[end..].iter().all(|e| !e.kind().is_error()));
}

#[test]
fn transaction_schema_is_rejected_after_the_transaction() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/simple997.edi"));
    while reader.next().unwrap() != EventKind::EndTransaction {}
    assert!(matches!(
        reader.set_transaction_schema(load_schema("997")),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn start_and_end_events_are_balanced() {
    let fixtures = [
        ("x12/simple997.edi", Some("997")),
        ("x12/extraDelimiter997.edi", Some("997")),
        ("edifact/invoic_una.edi", None),
        ("edifact/orders_latin1.edi", None),
        ("edifact/empty_segment.edi", Some("empty_segment")),
    ];

    for (fixture, schema) in fixtures {
        let schema = schema.map(load_schema);
        let mut reader = EdiStreamReader::with_config(open_fixture(fixture), resolving());
        let events = read_all(&mut reader, schema.as_ref());

        let mut open = Vec::new();
        for event in &events {
            let kind = event.kind();
            if kind.is_start() {
                open.push(kind);
            } else if kind.is_end() {
                let start = open.pop().unwrap_or_else(|| panic!("{fixture}: stray {kind}"));
                assert_eq!(start.matching_end(), Some(kind), "{fixture}");
            }
        }
        assert!(open.is_empty(), "{fixture}: unclosed {open:?}");
    }
}

#[test]
fn disabling_control_validation_keeps_locations() {
    let schema = load_schema("997");

    let mut validated =
        EdiStreamReader::with_config(open_fixture("x12/simple997.edi"), resolving());
    let with_control: Vec<Event> = read_all(&mut validated, Some(&schema))
        .into_iter()
        .filter(|e| !e.kind().is_error())
        .collect();

    let config = resolving().validate_control_structure(false);
    let mut unvalidated = EdiStreamReader::with_config(open_fixture("x12/simple997.edi"), config);
    let without_control: Vec<Event> = read_all(&mut unvalidated, Some(&schema))
        .into_iter()
        .filter(|e| !e.kind().is_error())
        .collect();

    assert_eq!(with_control, without_control);
}

#[test]
fn bad_control_counts_are_reported_as_control_errors() {
    let text = fs::read_to_string(repo_root().join("testdata/x12/simple997.edi")).unwrap();
    let input = text.replace("SE*8*0001~", "SE*9*0002~");

    let mut reader = EdiStreamReader::new(input.as_bytes());
    let events = read_all(&mut reader, None);
    let found: Vec<_> = errors(&events).iter().filter_map(|e| e.error()).collect();
    assert_eq!(
        found,
        [
            ValidationError::ControlCountDoesNotMatch,
            ValidationError::ControlReferenceMismatch
        ]
    );

    let config = ReaderConfig::new().validate_control_structure(false);
    let mut reader = EdiStreamReader::with_config(input.as_bytes(), config);
    assert!(errors(&read_all(&mut reader, None)).is_empty());
}

#[test]
fn latin1_text_is_decoded() {
    let mut reader = EdiStreamReader::new(open_fixture("edifact/orders_latin1.edi"));
    assert_eq!(reader.next().unwrap(), EventKind::StartInterchange);
    assert_eq!(reader.version().unwrap(), ["UNOC".to_string(), "3".to_string()]);

    let events = read_all(&mut reader, None);
    assert!(errors(&events).is_empty());

    let name = find(&events, EventKind::ElementData, "BÜTTNER WIDGET COMPANY").location();
    assert_eq!(name.segment_tag(), Some("NAD"));
    assert_eq!(name.segment_position(), 7);
    assert_eq!(name.element_position(), 4);
}

#[test]
fn empty_segment_reports_missing_required_element() {
    let mut reader = EdiStreamReader::new(open_fixture("edifact/empty_segment.edi"));
    let events = read_all(&mut reader, Some(&load_schema("empty_segment")));

    let found = errors(&events);
    assert_eq!(found.len(), 1, "unexpected errors: {found:?}");
    let missing = found[0];
    assert_eq!(missing.kind(), EventKind::ElementOccurrenceError);
    assert_eq!(missing.error(), Some(ValidationError::RequiredDataElementMissing));
    assert_eq!(missing.location().segment_tag(), Some("UNS"));
    assert_eq!(missing.location().segment_position(), 4);
    assert_eq!(missing.location().element_position(), 1);
    assert_eq!(missing.location().component_position(), -1);

    let uns = events
        .iter()
        .position(|e| e.kind() == EventKind::StartSegment && e.text() == Some("UNS"))
        .unwrap();
    assert_eq!(events[uns + 1].kind(), EventKind::ElementOccurrenceError);
    assert_eq!(events[uns + 2].kind(), EventKind::EndSegment);
}

#[test]
fn schema_declared_binary_element_is_readable() {
    let expected = fs::read(repo_root().join("testdata/x12/binary/payload.xml")).unwrap();
    let schema = load_schema("275");
    let mut reader = EdiStreamReader::new(open_fixture("x12/sample275_valid.edi"));

    let mut payload = Vec::new();
    let mut tags_after = Vec::new();
    while reader.has_next().unwrap() {
        match reader.next().unwrap() {
            EventKind::StartTransaction => {
                reader.set_transaction_schema(Arc::clone(&schema)).unwrap();
            }
            EventKind::ElementDataBinary => {
                assert_eq!(reader.binary_data_length().unwrap(), 2768);
                let location = reader.location().unwrap();
                assert_eq!(location.segment_tag(), Some("BIN"));
                assert_eq!(location.segment_position(), 5);
                assert_eq!(location.element_position(), 2);
                reader.binary_data().unwrap().read_to_end(&mut payload).unwrap();
            }
            EventKind::StartSegment if !payload.is_empty() => {
                tags_after.push(reader.text().unwrap().to_string());
            }
            kind => assert!(!kind.is_error(), "unexpected {kind}"),
        }
    }

    assert_eq!(payload, expected);
    assert!(String::from_utf8_lossy(&payload).contains("<levelone>"));
    assert_eq!(tags_after, ["SE", "GE", "IEA"]);
}

#[test]
fn unread_binary_data_is_skipped() {
    let schema = load_schema("275");
    let mut reader = EdiStreamReader::new(open_fixture("x12/sample275_valid.edi"));
    let events = read_all(&mut reader, Some(&schema));

    assert!(errors(&events).is_empty());
    let binary = events
        .iter()
        .position(|e| e.kind() == EventKind::ElementDataBinary)
        .unwrap();
    assert_eq!(events[binary + 1].kind(), EventKind::EndSegment);
    assert_eq!(events[binary + 1].text(), Some("BIN"));
}

#[test]
fn binary_length_can_be_declared_by_the_caller() {
    let mut reader = EdiStreamReader::new(open_fixture("x12/sample275_valid.edi"));
    while reader.next_tag().unwrap() == EventKind::StartSegment {
        if reader.text().unwrap() == "BIN" {
            break;
        }
    }
    assert!(matches!(
        reader.set_binary_data_length(2768),
        Err(Error::IllegalState(_))
    ));

    assert_eq!(reader.next().unwrap(), EventKind::ElementData);
    let length: u64 = reader.text().unwrap().parse().unwrap();
    reader.set_binary_data_length(length).unwrap();

    assert_eq!(reader.next().unwrap(), EventKind::ElementDataBinary);
    let mut payload = Vec::new();
    reader.binary_data().unwrap().read_to_end(&mut payload).unwrap();
    assert_eq!(payload.len(), 2768);
    assert!(payload.ends_with(b"</levelone>\n"));

    assert_eq!(reader.next().unwrap(), EventKind::EndSegment);
}

#[test]
fn binary_without_terminator_is_fatal() {
    let schema = load_schema("275");
    let mut reader = EdiStreamReader::new(open_fixture("x12/sample275_invalid.edi"));

    let err = loop {
        match reader.next() {
            Ok(EventKind::StartTransaction) => {
                reader.set_transaction_schema(Arc::clone(&schema)).unwrap();
            }
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    assert!(err.is_fatal());
    assert!(err.to_string().contains("found 'X'"), "{err}");
    assert!(matches!(reader.next(), Err(Error::IllegalState(_))));
}

#[test]
fn non_numeric_binary_length_is_fatal() {
    let schema = load_schema("275");
    let mut reader = EdiStreamReader::new(open_fixture("x12/sample275_nonnumeric.edi"));

    let err = loop {
        match reader.next() {
            Ok(EventKind::StartTransaction) => {
                reader.set_transaction_schema(Arc::clone(&schema)).unwrap();
            }
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    assert!(matches!(err, Error::Parse { .. }));
    assert!(err.to_string().contains("not numeric"), "{err}");
}

#[test]
fn unrecognized_header_is_fatal() {
    let mut reader = EdiStreamReader::new(&b"GS*FA*SENDER~"[..]);
    assert!(reader.has_next().unwrap());
    let err = reader.next().unwrap_err();
    assert!(err.is_fatal());
    assert!(!reader.has_next().unwrap());
}

#[test]
fn consecutive_interchanges_are_read_independently() -> anyhow::Result<()> {
    let text = fs::read_to_string(repo_root().join("testdata/x12/simple997.edi"))?;
    let edifact = fs::read_to_string(repo_root().join("testdata/edifact/invoic_una.edi"))?;
    let input = format!("{text}{edifact}");

    let mut reader = EdiStreamReader::with_config(input.as_bytes(), resolving());
    let mut standards = Vec::new();
    let mut control = Vec::new();
    while reader.has_next()? {
        if reader.next()? == EventKind::StartInterchange {
            standards.push(reader.standard()?);
            reader.next()?;
            let schema = reader
                .control_schema()
                .ok_or_else(|| anyhow::anyhow!("control schema not resolved"))?;
            control.push(schema.name().to_string());
        }
    }

    assert_eq!(standards, ["X12", "EDIFACT"]);
    assert_eq!(control, ["X12.00402", "EDIFACT.3"]);
    Ok(())
}
