use std::path::PathBuf;
use std::sync::Arc;

use edi_core::ValidationError;
use edi_schema::{Schema, SchemaLoader};
use edi_validation::{StructureEvent, StructureValidator, ValueRules};

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn ack_schema() -> anyhow::Result<Arc<Schema>> {
    let path = repo_root().join("testdata/schemas/997.yaml");
    Ok(Arc::new(SchemaLoader::load_from_file(&path)?))
}

/// Feed a tag sequence and collect every structure event, finish included.
fn walk(schema: Arc<Schema>, tags: &[&str]) -> Vec<StructureEvent> {
    let mut validator = StructureValidator::new(schema, ValueRules::default());
    let mut events = Vec::new();
    for tag in tags {
        events.extend(validator.segment(tag).events);
    }
    events.extend(validator.finish());
    events
}

fn errors(events: &[StructureEvent]) -> Vec<(ValidationError, &str)> {
    events
        .iter()
        .filter_map(|event| match event {
            StructureEvent::Error(error, tag) => Some((*error, tag.as_str())),
            _ => None,
        })
        .collect()
}

#[test]
fn acknowledgment_body_walks_without_errors() -> anyhow::Result<()> {
    let events = walk(ack_schema()?, &["AK1", "AK2", "AK3", "AK4", "AK5", "AK9"]);

    assert!(errors(&events).is_empty(), "unexpected errors: {events:?}");
    assert_eq!(
        events,
        vec![
            StructureEvent::StartLoop("L_AK2".to_string()),
            StructureEvent::StartLoop("L_AK3".to_string()),
            StructureEvent::EndLoop("L_AK3".to_string()),
            StructureEvent::EndLoop("L_AK2".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn repeated_loops_restart_at_their_leading_segment() -> anyhow::Result<()> {
    let tags = ["AK1", "AK2", "AK3", "AK4", "AK3", "AK5", "AK2", "AK5", "AK9"];
    let events = walk(ack_schema()?, &tags);

    assert!(errors(&events).is_empty(), "unexpected errors: {events:?}");
    let starts = events
        .iter()
        .filter(|e| matches!(e, StructureEvent::StartLoop(id) if id == "L_AK3"))
        .count();
    assert_eq!(starts, 2);
    Ok(())
}

#[test]
fn missing_trailer_segments_are_reported() -> anyhow::Result<()> {
    let events = walk(ack_schema()?, &["AK1", "AK2", "AK3"]);

    assert_eq!(
        errors(&events),
        vec![
            (ValidationError::MandatorySegmentMissing, "AK5"),
            (ValidationError::MandatorySegmentMissing, "AK9"),
        ]
    );
    assert!(matches!(events.last(), Some(StructureEvent::Error(_, tag)) if tag == "AK9"));
    Ok(())
}

#[test]
fn unknown_and_misplaced_segments_are_reported() -> anyhow::Result<()> {
    let events = walk(ack_schema()?, &["AK1", "NM1", "AK4", "AK9", "AK1"]);

    assert_eq!(
        errors(&events),
        vec![
            (ValidationError::SegmentNotInDefinedTransactionSet, "NM1"),
            (ValidationError::UnexpectedSegment, "AK4"),
            (ValidationError::SegmentNotInProperSequence, "AK1"),
        ]
    );
    Ok(())
}

#[test]
fn ak4_element_values_are_checked() -> anyhow::Result<()> {
    let schema = ack_schema()?;
    let mut validator = StructureValidator::new(Arc::clone(&schema), ValueRules::default());
    for tag in ["AK1", "AK2", "AK3"] {
        validator.segment(tag);
    }

    let outcome = validator.segment("AK4");
    assert!(outcome.events.is_empty());
    let mut elements = outcome
        .elements
        .ok_or_else(|| anyhow::anyhow!("AK4 should have an element cursor"))?;

    assert!(elements.is_composite(1));
    assert!(elements.start_composite(1, 1).is_empty());
    assert!(elements.component(1, 1, "8").is_empty());
    assert!(elements.end_composite(1, 1).is_empty());

    assert_eq!(
        elements.element(2, 1, "12A45"),
        vec![
            ValidationError::DataElementTooLong,
            ValidationError::InvalidCharacterData
        ]
    );

    let missing = elements.end_segment();
    assert_eq!(missing.len(), 1);
    assert_eq!((missing[0].element, missing[0].component), (3, -1));
    Ok(())
}
