//! Hierarchy state machine
//!
//! Turns lexer tokens into the public event sequence. Envelope tiers
//! (interchange, group, transaction) follow the dialect's header and trailer
//! tags; loops inside a transaction follow the bound transaction schema.
//! The machine owns the [`Location`] and stamps every event with a snapshot
//! of it.

use crate::config::ReaderConfig;
use crate::dialect::{self, Dialect};
use crate::lexer::{Boundary, Lexer, Token};
use crate::source::ByteSource;
use edi_core::{Error, Event, EventKind, Location, Result, Standard, ValidationError};
use edi_schema::Schema;
use edi_validation::{ElementCursor, MissingElement, StructureEvent, StructureValidator, ValueRules};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, trace};

/// Envelope tiers, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Interchange,
    Group,
    Transaction,
}

impl Tier {
    fn name(self) -> &'static str {
        match self {
            Tier::Interchange => "INTERCHANGE",
            Tier::Group => "GROUP",
            Tier::Transaction => "TRANSACTION",
        }
    }
}

/// Part a control segment plays in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Header(Tier),
    Trailer(Tier),
    /// Interchange-level service segment (X12 `TA1`)
    Service,
}

fn role(standard: Standard, tag: &str) -> Option<Role> {
    let role = match (standard, tag) {
        (Standard::X12, "ISA") | (Standard::Edifact, "UNB") => Role::Header(Tier::Interchange),
        (Standard::X12, "GS") | (Standard::Edifact, "UNG") => Role::Header(Tier::Group),
        (Standard::X12, "ST") | (Standard::Edifact, "UNH") => Role::Header(Tier::Transaction),
        (Standard::X12, "SE") | (Standard::Edifact, "UNT") => Role::Trailer(Tier::Transaction),
        (Standard::X12, "GE") | (Standard::Edifact, "UNE") => Role::Trailer(Tier::Group),
        (Standard::X12, "IEA") | (Standard::Edifact, "UNZ") => Role::Trailer(Tier::Interchange),
        (Standard::X12, "TA1") => Role::Service,
        _ => return None,
    };
    Some(role)
}

/// Element position of the control reference in a header segment.
fn reference_position(tag: &str) -> Option<usize> {
    match tag {
        "ISA" => Some(13),
        "GS" => Some(6),
        "ST" => Some(2),
        "UNB" | "UNG" => Some(5),
        "UNH" => Some(1),
        _ => None,
    }
}

/// Trailer element positions: count first, then reference.
const TRAILER_COUNT: usize = 1;
const TRAILER_REFERENCE: usize = 2;

#[derive(Debug)]
struct OpenTier {
    tier: Tier,
    reference: Option<String>,
    groups: u32,
    transactions: u32,
    segments: u32,
}

impl OpenTier {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            reference: None,
            groups: 0,
            transactions: 0,
            segments: 0,
        }
    }

    /// Count a trailer must carry for this tier.
    fn expected_count(&self, standard: Standard) -> u32 {
        match self.tier {
            Tier::Transaction => self.segments,
            Tier::Group => self.transactions,
            Tier::Interchange if standard == Standard::Edifact && self.groups == 0 => {
                self.transactions
            }
            Tier::Interchange => self.groups,
        }
    }
}

#[derive(Debug)]
struct SegmentState {
    tag: String,
    role: Option<Role>,
    cursor: Option<ElementCursor>,
    /// Delimiter before the next value
    prev: Boundary,
    in_composite: bool,
}

/// Event producer for one reader.
pub struct Machine {
    config: ReaderConfig,
    dialect: Option<Dialect>,
    lexer: Option<Lexer>,
    location: Location,
    tiers: Vec<OpenTier>,
    control_schema: Option<Arc<Schema>>,
    control: Option<StructureValidator>,
    transaction_schema: Option<Arc<Schema>>,
    transaction: Option<StructureValidator>,
    body_started: bool,
    segment: Option<SegmentState>,
    /// END_INTERCHANGE was produced; state is cleared on the next advance.
    closing: bool,
}

impl Machine {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            dialect: None,
            lexer: None,
            location: Location::new(),
            tiers: Vec::new(),
            control_schema: None,
            control: None,
            transaction_schema: None,
            transaction: None,
            body_started: false,
            segment: None,
            closing: false,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Dialect of the open interchange.
    pub fn dialect(&self) -> Option<&Dialect> {
        self.dialect.as_ref()
    }

    /// Whether an interchange has started and not yet ended.
    pub fn in_interchange(&self) -> bool {
        self.dialect.is_some() && !self.closing
    }

    pub fn control_schema(&self) -> Option<&Arc<Schema>> {
        self.control_schema.as_ref()
    }

    pub fn transaction_schema(&self) -> Option<&Arc<Schema>> {
        self.transaction_schema.as_ref()
    }

    /// Bind the control schema for the open interchange.
    pub fn bind_control(&mut self, schema: Arc<Schema>) {
        debug!("Binding control schema {}", schema.name());
        let rules = self.rules(self.config.validate_control_code_values);
        self.control = Some(StructureValidator::new(Arc::clone(&schema), rules));
        self.control_schema = Some(schema);
    }

    /// Whether a transaction schema may be bound now: a transaction is open
    /// and none of its body segments has started.
    pub fn transaction_window_open(&self) -> bool {
        !self.closing && !self.body_started && self.is_open(Tier::Transaction)
    }

    /// Bind (or replace) the schema for the open transaction's body.
    pub fn bind_transaction(&mut self, schema: Arc<Schema>) {
        debug!("Binding transaction schema {}", schema.name());
        self.transaction = None;
        self.transaction_schema = Some(schema);
    }

    /// Whether the element just produced may declare a binary length: it
    /// is a simple element and another element follows it.
    pub fn can_begin_binary(&self) -> bool {
        let in_binary = self.lexer.as_ref().is_some_and(Lexer::in_binary);
        !in_binary
            && self
                .segment
                .as_ref()
                .is_some_and(|s| s.prev == Boundary::Element && !s.in_composite)
    }

    pub fn begin_binary(&mut self, length: u64) {
        if let Some(lexer) = self.lexer.as_mut() {
            trace!("Binary element of {} bytes declared", length);
            lexer.begin_binary(length);
        }
    }

    /// Read bytes of the current binary element.
    ///
    /// # Errors
    ///
    /// Propagates source errors; input ending inside the payload is
    /// `UnexpectedEof`.
    pub fn read_binary<R: Read>(
        &mut self,
        source: &mut ByteSource<R>,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        match self.lexer.as_mut() {
            Some(lexer) => lexer.read_binary(source, buf),
            None => Ok(0),
        }
    }

    /// Process one token, or detect the next interchange header.
    ///
    /// Returns `Ok(false)` once input is exhausted between interchanges.
    ///
    /// # Errors
    ///
    /// Returns fatal parse and I/O errors; the machine must not be used
    /// afterwards.
    pub fn advance<R: Read>(
        &mut self,
        source: &mut ByteSource<R>,
        out: &mut VecDeque<Event>,
    ) -> Result<bool> {
        if self.closing {
            self.reset();
        }

        let token = match self.lexer.as_mut() {
            Some(lexer) => lexer.next_token(source)?,
            None => return self.start_interchange(source, out),
        };

        match token {
            None => Err(Error::parse(
                self.location.segment_position(),
                source.offset(),
                "unexpected end of data inside interchange",
            )),
            Some(Token::Tag { tag, next }) => {
                self.start_segment(tag, next, out);
                Ok(true)
            }
            Some(Token::Value { text, next }) => {
                self.value(&text, next, source.offset(), out)?;
                Ok(true)
            }
            Some(Token::Binary { length }) => {
                self.location.begin_element();
                let position = usize::try_from(self.location.element_position()).unwrap_or(0);
                if let Some(cursor) = self.segment.as_mut().and_then(|s| s.cursor.as_mut()) {
                    cursor.binary(position);
                }
                out.push_back(Event::binary(self.location.clone(), length));
                Ok(true)
            }
            Some(Token::SegmentEnd) => {
                self.end_segment(out);
                Ok(true)
            }
        }
    }

    fn start_interchange<R: Read>(
        &mut self,
        source: &mut ByteSource<R>,
        out: &mut VecDeque<Event>,
    ) -> Result<bool> {
        let Some(dialect) = dialect::detect(source)? else {
            return Ok(false);
        };

        debug!("Starting {} interchange", dialect.standard);
        self.location.reset();
        let mut at = Location::new();
        at.begin_segment(dialect.header_tag);

        self.lexer = Some(Lexer::new(dialect.delimiters, dialect.charset));
        self.tiers.push(OpenTier::new(Tier::Interchange));
        self.dialect = Some(dialect);
        out.push_back(Event::with_text(
            EventKind::StartInterchange,
            at,
            Tier::Interchange.name(),
        ));
        Ok(true)
    }

    fn reset(&mut self) {
        self.dialect = None;
        self.lexer = None;
        self.location.reset();
        self.tiers.clear();
        self.control_schema = None;
        self.control = None;
        self.clear_transaction();
        self.segment = None;
        self.closing = false;
    }

    fn clear_transaction(&mut self) {
        self.transaction_schema = None;
        self.transaction = None;
        self.body_started = false;
    }

    fn standard(&self) -> Standard {
        self.dialect.as_ref().map_or(Standard::X12, |d| d.standard)
    }

    fn rules(&self, check_codes: bool) -> ValueRules {
        let decimal = self
            .dialect
            .as_ref()
            .and_then(|d| d.delimiters.decimal_byte())
            .map_or('.', char::from);
        ValueRules::default()
            .decimal_mark(decimal)
            .check_codes(check_codes)
    }

    fn is_open(&self, tier: Tier) -> bool {
        self.tiers.iter().any(|t| t.tier == tier)
    }

    fn tier_mut(&mut self, tier: Tier) -> Option<&mut OpenTier> {
        self.tiers.iter_mut().rev().find(|t| t.tier == tier)
    }

    fn emit(&self, out: &mut VecDeque<Event>, kind: EventKind, text: &str) {
        out.push_back(Event::with_text(kind, self.location.clone(), text));
    }

    fn emit_error(&self, out: &mut VecDeque<Event>, error: ValidationError, text: &str) {
        out.push_back(Event::validation(error, self.location.clone(), text));
    }

    fn emit_missing(&self, out: &mut VecDeque<Event>, missing: &[MissingElement]) {
        for m in missing {
            out.push_back(Event::validation(
                ValidationError::RequiredDataElementMissing,
                self.location.at_element(m.element, m.component),
                "",
            ));
        }
    }

    /// Close tiers nested inside `parent`, innermost first.
    fn close_inside(&mut self, parent: Tier, out: &mut VecDeque<Event>) {
        while let Some(top) = self.tiers.last() {
            if top.tier == parent || self.tiers.len() == 1 {
                break;
            }
            let tier = top.tier;
            debug!(
                "Closing {} implicitly at segment {}",
                tier.name(),
                self.location.segment_position()
            );
            if tier == Tier::Transaction {
                self.finish_transaction_body(out);
            }
            self.close_top(out);
        }
    }

    fn close_top(&mut self, out: &mut VecDeque<Event>) {
        let Some(top) = self.tiers.pop() else {
            return;
        };
        match top.tier {
            Tier::Transaction => {
                self.clear_transaction();
                self.emit(out, EventKind::EndTransaction, Tier::Transaction.name());
            }
            Tier::Group => self.emit(out, EventKind::EndGroup, Tier::Group.name()),
            Tier::Interchange => {
                out.push_back(Event::with_text(
                    EventKind::EndInterchange,
                    Location::new(),
                    Tier::Interchange.name(),
                ));
                self.closing = true;
            }
        }
        debug!("{} ended", top.tier.name());
    }

    /// Report loops and required segments the transaction body left open.
    fn finish_transaction_body(&mut self, out: &mut VecDeque<Event>) {
        // An empty body still owes its required segments.
        let validator = self.transaction.take().or_else(|| {
            let schema = self.transaction_schema.as_ref().filter(|_| !self.body_started)?;
            Some(StructureValidator::new(Arc::clone(schema), self.rules(true)))
        });
        self.body_started = true;
        if let Some(mut validator) = validator {
            let events = validator.finish();
            self.emit_structure(out, events);
        }
    }

    fn emit_structure(&self, out: &mut VecDeque<Event>, events: Vec<StructureEvent>) {
        for event in events {
            match event {
                StructureEvent::StartLoop(id) => self.emit(out, EventKind::StartLoop, &id),
                StructureEvent::EndLoop(id) => self.emit(out, EventKind::EndLoop, &id),
                StructureEvent::Error(error, tag) => self.emit_error(out, error, &tag),
            }
        }
    }

    fn start_segment(&mut self, tag: String, next: Boundary, out: &mut VecDeque<Event>) {
        self.location.begin_segment(tag.as_str());
        let role = role(self.standard(), &tag);
        trace!("Segment {} at {}", tag, self.location.segment_position());

        match role {
            Some(Role::Header(Tier::Group) | Role::Trailer(Tier::Interchange)) => {
                self.close_inside(Tier::Interchange, out);
            }
            Some(Role::Header(Tier::Transaction)) => {
                let parent = if self.is_open(Tier::Group) {
                    Tier::Group
                } else {
                    Tier::Interchange
                };
                self.close_inside(parent, out);
            }
            Some(Role::Trailer(Tier::Group)) => self.close_inside(Tier::Group, out),
            Some(Role::Trailer(Tier::Transaction)) => self.finish_transaction_body(out),
            _ => {}
        }

        if role != Some(Role::Header(Tier::Transaction)) {
            if let Some(transaction) = self.tier_mut(Tier::Transaction) {
                transaction.segments += 1;
            }
        }

        let cursor = if role.is_some() {
            self.control_segment(&tag, out)
        } else if self.is_open(Tier::Transaction) {
            self.body_segment(&tag, out)
        } else {
            if self.config.validate_control_structure && self.control.is_some() {
                self.emit_error(out, ValidationError::UnexpectedSegment, &tag);
            }
            None
        };

        match role {
            Some(Role::Header(Tier::Group)) => self.open_tier(Tier::Group, out),
            Some(Role::Header(Tier::Transaction)) => self.open_tier(Tier::Transaction, out),
            _ => {}
        }

        self.emit(out, EventKind::StartSegment, &tag);
        self.segment = Some(SegmentState {
            tag,
            role,
            cursor,
            prev: Boundary::Element,
            in_composite: false,
        });

        if next == Boundary::Segment {
            self.end_segment(out);
        }
    }

    fn open_tier(&mut self, tier: Tier, out: &mut VecDeque<Event>) {
        if tier == Tier::Transaction {
            if let Some(group) = self.tier_mut(Tier::Group) {
                group.transactions += 1;
            }
            if let Some(interchange) = self.tier_mut(Tier::Interchange) {
                interchange.transactions += 1;
            }
            self.clear_transaction();
        } else if let Some(interchange) = self.tier_mut(Tier::Interchange) {
            interchange.groups += 1;
        }

        let mut open = OpenTier::new(tier);
        open.segments = 1;
        self.tiers.push(open);
        debug!("{} started", tier.name());

        let kind = match tier {
            Tier::Interchange => EventKind::StartInterchange,
            Tier::Group => EventKind::StartGroup,
            Tier::Transaction => EventKind::StartTransaction,
        };
        self.emit(out, kind, tier.name());
    }

    /// Feed a header or trailer to the control schema, when bound.
    fn control_segment(&mut self, tag: &str, out: &mut VecDeque<Event>) -> Option<ElementCursor> {
        let control = self.control.as_mut()?;
        let outcome = control.segment(tag);
        let cursor = outcome.elements.or_else(|| control.elements_for(tag));

        if self.config.validate_control_structure {
            for event in outcome.events {
                if let StructureEvent::Error(error, text) = event {
                    self.emit_error(out, error, &text);
                }
            }
        }
        cursor
    }

    /// Feed a body segment to the transaction schema, when bound.
    fn body_segment(&mut self, tag: &str, out: &mut VecDeque<Event>) -> Option<ElementCursor> {
        self.body_started = true;

        if self.transaction.is_none() {
            let schema = Arc::clone(self.transaction_schema.as_ref()?);
            let rules = self.rules(true);
            self.transaction = Some(StructureValidator::new(schema, rules));
        }

        let validator = self.transaction.as_mut()?;
        let outcome = validator.segment(tag);
        let cursor = outcome.elements.or_else(|| validator.elements_for(tag));
        self.emit_structure(out, outcome.events);
        cursor
    }

    fn value(
        &mut self,
        text: &str,
        next: Boundary,
        offset: u64,
        out: &mut VecDeque<Event>,
    ) -> Result<()> {
        let Some(mut segment) = self.segment.take() else {
            return Ok(());
        };

        match segment.prev {
            Boundary::Element | Boundary::Segment => self.location.begin_element(),
            Boundary::Repetition => self.location.begin_repetition(),
            Boundary::Component => self.location.begin_component(),
        }

        let position = usize::try_from(self.location.element_position()).unwrap_or(0);
        let occurrence = u32::try_from(self.location.element_occurrence()).unwrap_or(1);

        if segment.in_composite {
            self.component(&mut segment, position, text, out);
            if next != Boundary::Component {
                self.end_composite(&mut segment, position, occurrence, out);
            }
        } else if next == Boundary::Component {
            self.start_composite(&mut segment, position, occurrence, out);
            self.component(&mut segment, position, text, out);
        } else if !text.is_empty()
            && segment
                .cursor
                .as_ref()
                .is_some_and(|c| c.is_composite(position))
        {
            self.start_composite(&mut segment, position, occurrence, out);
            self.component(&mut segment, position, text, out);
            self.end_composite(&mut segment, position, occurrence, out);
        } else {
            self.simple_element(&mut segment, position, occurrence, text, out);

            let binary_next = next == Boundary::Element
                && segment
                    .cursor
                    .as_ref()
                    .is_some_and(|c| c.next_is_binary(position));
            if binary_next {
                let length = text.trim().parse::<u64>().map_err(|_| {
                    Error::parse(
                        self.location.segment_position(),
                        offset,
                        format!("binary length '{text}' is not numeric"),
                    )
                })?;
                self.begin_binary(length);
            }
        }

        segment.prev = next;
        self.segment = Some(segment);
        if next == Boundary::Segment {
            self.end_segment(out);
        }
        Ok(())
    }

    fn simple_element(
        &mut self,
        segment: &mut SegmentState,
        position: usize,
        occurrence: u32,
        text: &str,
        out: &mut VecDeque<Event>,
    ) {
        if let Some(cursor) = segment.cursor.as_mut() {
            for error in cursor.element(position, occurrence, text) {
                self.emit_error(out, error, text);
            }
        }

        if occurrence == 1 {
            if let Some(role) = segment.role {
                if let Some(error) = self.control_check(role, &segment.tag, position, text) {
                    self.emit_error(out, error, text);
                }
            }
        }

        self.emit(out, EventKind::ElementData, text);
    }

    fn start_composite(
        &mut self,
        segment: &mut SegmentState,
        position: usize,
        occurrence: u32,
        out: &mut VecDeque<Event>,
    ) {
        if let Some(cursor) = segment.cursor.as_mut() {
            for error in cursor.start_composite(position, occurrence) {
                self.emit_error(out, error, "");
            }
        }
        out.push_back(Event::new(EventKind::StartComposite, self.location.clone()));
        segment.in_composite = true;
        self.location.begin_component();
    }

    fn component(
        &mut self,
        segment: &mut SegmentState,
        position: usize,
        text: &str,
        out: &mut VecDeque<Event>,
    ) {
        let component = usize::try_from(self.location.component_position()).unwrap_or(0);
        if let Some(cursor) = segment.cursor.as_mut() {
            for error in cursor.component(position, component, text) {
                self.emit_error(out, error, text);
            }
        }
        self.emit(out, EventKind::ElementData, text);
    }

    fn end_composite(
        &mut self,
        segment: &mut SegmentState,
        position: usize,
        occurrence: u32,
        out: &mut VecDeque<Event>,
    ) {
        if let Some(cursor) = segment.cursor.as_ref() {
            self.emit_missing(out, &cursor.end_composite(position, occurrence));
        }
        segment.in_composite = false;
        self.location.clear_component();
        out.push_back(Event::new(EventKind::EndComposite, self.location.clone()));
    }

    fn end_segment(&mut self, out: &mut VecDeque<Event>) {
        let Some(segment) = self.segment.take() else {
            return;
        };

        if let Some(cursor) = segment.cursor.as_ref() {
            self.emit_missing(out, &cursor.end_segment());
        }
        self.location.end_segment();
        self.emit(out, EventKind::EndSegment, &segment.tag);

        if let Some(Role::Trailer(tier)) = segment.role {
            if self.tiers.last().is_some_and(|t| t.tier == tier) {
                self.close_top(out);
            }
        }
    }

    /// Record header references and compare trailer counts and references.
    fn control_check(
        &mut self,
        role: Role,
        tag: &str,
        position: usize,
        text: &str,
    ) -> Option<ValidationError> {
        let standard = self.standard();
        let check = self.config.validate_control_structure;

        match role {
            Role::Header(tier) if reference_position(tag) == Some(position) => {
                if let Some(open) = self.tier_mut(tier) {
                    open.reference = Some(text.to_string());
                }
                None
            }
            Role::Trailer(tier) if check && position == TRAILER_REFERENCE => {
                let open = self.tier_mut(tier)?;
                let reference = open.reference.as_deref()?;
                (reference != text).then_some(ValidationError::ControlReferenceMismatch)
            }
            Role::Trailer(tier) if check && position == TRAILER_COUNT => {
                let expected = self.tier_mut(tier)?.expected_count(standard);
                let matches = text.trim().parse::<u32>().is_ok_and(|n| n == expected);
                (!matches).then_some(ValidationError::ControlCountDoesNotMatch)
            }
            _ => None,
        }
    }
}
