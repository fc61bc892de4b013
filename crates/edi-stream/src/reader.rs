//! Pull reader over an EDI byte stream

use crate::config::ReaderConfig;
use crate::dialect::Dialect;
use crate::machine::Machine;
use crate::source::ByteSource;
use edi_core::{DelimiterRole, Error, Event, EventKind, Location, Result, ValidationError};
use edi_schema::{ControlSchemaRegistry, Schema};
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// A fatal error was returned; every later advance fails.
    Failed,
    Closed,
}

/// Streaming reader producing one [`Event`] per call to [`next`](Self::next).
///
/// ```no_run
/// use edi_core::EventKind;
/// use edi_stream::EdiStreamReader;
///
/// # fn main() -> edi_core::Result<()> {
/// let file = std::fs::File::open("simple997.edi")?;
/// let mut reader = EdiStreamReader::new(file);
/// while reader.has_next()? {
///     if reader.next()? == EventKind::StartSegment {
///         println!("{}", reader.text()?);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct EdiStreamReader<R: Read> {
    source: ByteSource<R>,
    machine: Machine,
    queue: VecDeque<Event>,
    current: Option<Event>,
    state: State,
    registry: Option<Arc<ControlSchemaRegistry>>,
}

impl<R: Read> EdiStreamReader<R> {
    /// Create a reader with the default configuration.
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ReaderConfig::default())
    }

    /// Create a reader with `config`.
    pub fn with_config(reader: R, config: ReaderConfig) -> Self {
        let registry = config
            .resolve_control_schemas
            .then(|| Arc::new(ControlSchemaRegistry::with_builtins()));
        Self {
            source: ByteSource::new(reader),
            machine: Machine::new(config),
            queue: VecDeque::new(),
            current: None,
            state: State::Open,
            registry,
        }
    }

    /// Resolve control schemas from `registry` for interchanges whose
    /// control schema was not set by the caller.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ControlSchemaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        self.machine.config()
    }

    /// Whether another event is available.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if peeking at the source fails.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.state != State::Open {
            return Ok(false);
        }
        if !self.queue.is_empty() || self.machine.in_interchange() {
            return Ok(true);
        }
        Ok(self.source.skip_whitespace()?.is_some())
    }

    /// Advance to the next event and return its kind.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] once input is exhausted, a fatal
    /// [`Error::Parse`] or [`Error::Io`] for malformed or unreadable input,
    /// and [`Error::IllegalState`] after [`close`](Self::close) or a fatal
    /// error.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<EventKind> {
        match self.state {
            State::Closed => return Err(Error::illegal_state("reader is closed")),
            State::Failed => return Err(Error::illegal_state("reader failed on an earlier error")),
            State::Open => {}
        }

        self.resolve_control_schema()?;

        loop {
            if let Some(event) = self.queue.pop_front() {
                let kind = event.kind();
                self.current = Some(event);
                return Ok(kind);
            }

            match self.machine.advance(&mut self.source, &mut self.queue) {
                Ok(true) => {}
                Ok(false) => return Err(Error::EndOfStream),
                Err(e) => {
                    error!("Reader failed: {}", e);
                    self.state = State::Failed;
                    self.current = None;
                    return Err(e);
                }
            }
        }
    }

    /// Advance to the next `START_SEGMENT`, skipping everything between.
    ///
    /// # Errors
    ///
    /// As for [`next`](Self::next).
    pub fn next_tag(&mut self) -> Result<EventKind> {
        loop {
            let kind = self.next()?;
            if kind == EventKind::StartSegment {
                return Ok(kind);
            }
        }
    }

    fn current(&self) -> Result<&Event> {
        if self.state == State::Closed {
            return Err(Error::illegal_state("reader is closed"));
        }
        self.current
            .as_ref()
            .ok_or_else(|| Error::illegal_state("no current event"))
    }

    /// The current event.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] before the first event or after close.
    pub fn event(&self) -> Result<&Event> {
        self.current()
    }

    /// Kind of the current event.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] before the first event or after close.
    pub fn event_type(&self) -> Result<EventKind> {
        self.current().map(Event::kind)
    }

    /// Text of the current event: the element value, segment tag, loop id
    /// or tier name.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] when the current event carries no text.
    pub fn text(&self) -> Result<&str> {
        self.current()?
            .text()
            .ok_or_else(|| Error::illegal_state("current event has no text"))
    }

    /// Copy characters of the current text into `target`, returning the
    /// number copied.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfBounds`] when `source_start` is past the end of
    /// the text or `target_start + length` exceeds `target`;
    /// [`Error::IllegalState`] when the current event carries no text.
    pub fn get_text_characters(
        &self,
        source_start: usize,
        target: &mut [char],
        target_start: usize,
        length: usize,
    ) -> Result<usize> {
        let text = self.text()?;
        let count = text.chars().count();

        if source_start > count {
            return Err(Error::out_of_bounds(format!(
                "source_start {source_start} exceeds text length {count}"
            )));
        }
        if target_start
            .checked_add(length)
            .is_none_or(|end| end > target.len())
        {
            return Err(Error::out_of_bounds(format!(
                "target_start {target_start} + length {length} exceeds target length {}",
                target.len()
            )));
        }

        let copied = length.min(count - source_start);
        for (slot, c) in target[target_start..target_start + copied]
            .iter_mut()
            .zip(text.chars().skip(source_start))
        {
            *slot = c;
        }
        Ok(copied)
    }

    /// Location of the current event; every coordinate is -1 before the
    /// first event.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] after close.
    pub fn location(&self) -> Result<Location> {
        if self.state == State::Closed {
            return Err(Error::illegal_state("reader is closed"));
        }
        Ok(self
            .current
            .as_ref()
            .map_or_else(Location::new, |e| e.location().clone()))
    }

    /// Validation error carried by the current event.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] when the current event is not an error.
    pub fn error_type(&self) -> Result<ValidationError> {
        self.current()?
            .error()
            .ok_or_else(|| Error::illegal_state("current event is not a validation error"))
    }

    fn interchange(&self) -> Result<&Dialect> {
        let open = self
            .current
            .as_ref()
            .is_some_and(|e| e.kind() != EventKind::EndInterchange);
        match self.machine.dialect() {
            Some(dialect) if open && self.state == State::Open => Ok(dialect),
            _ => Err(Error::illegal_state("not positioned inside an interchange")),
        }
    }

    /// Delimiters of the open interchange.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] before `START_INTERCHANGE` and from
    /// `END_INTERCHANGE` on.
    pub fn delimiters(&self) -> Result<BTreeMap<DelimiterRole, char>> {
        self.interchange().map(|d| d.delimiters.to_map())
    }

    /// Standard of the open interchange, `"X12"` or `"EDIFACT"`.
    ///
    /// # Errors
    ///
    /// As for [`delimiters`](Self::delimiters).
    pub fn standard(&self) -> Result<&'static str> {
        self.interchange().map(|d| d.standard.as_str())
    }

    /// Version of the open interchange.
    ///
    /// # Errors
    ///
    /// As for [`delimiters`](Self::delimiters).
    pub fn version(&self) -> Result<&[String]> {
        self.interchange().map(|d| d.version.as_slice())
    }

    /// Bind the control schema for the interchange just started.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] unless the current event is
    /// `START_INTERCHANGE` and no control schema is bound yet.
    pub fn set_control_schema(&mut self, schema: Arc<Schema>) -> Result<()> {
        if self.event_type()? != EventKind::StartInterchange {
            return Err(Error::illegal_state(
                "control schema may only be set at START_INTERCHANGE",
            ));
        }
        if self.machine.control_schema().is_some() {
            return Err(Error::illegal_state(
                "control schema already set for this interchange",
            ));
        }
        self.machine.bind_control(schema);
        Ok(())
    }

    /// Bind the schema for the current transaction's body.
    ///
    /// Allowed from `START_TRANSACTION` until the first body segment
    /// starts; binding again inside that window replaces the schema.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] outside that window.
    pub fn set_transaction_schema(&mut self, schema: Arc<Schema>) -> Result<()> {
        self.current()?;
        if !self.machine.transaction_window_open() {
            return Err(Error::illegal_state(
                "transaction schema may only be set between START_TRANSACTION and the first body segment",
            ));
        }
        self.machine.bind_transaction(schema);
        Ok(())
    }

    /// Control schema bound to the open interchange.
    pub fn control_schema(&self) -> Option<&Arc<Schema>> {
        self.machine.control_schema()
    }

    /// Transaction schema bound to the open transaction.
    pub fn transaction_schema(&self) -> Option<&Arc<Schema>> {
        self.machine.transaction_schema()
    }

    /// Declare that the next element is `length` bytes of binary data.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] unless the current event is `ELEMENT_DATA`
    /// for a simple element followed by another element.
    pub fn set_binary_data_length(&mut self, length: u64) -> Result<()> {
        if self.event_type()? != EventKind::ElementData
            || !self.queue.is_empty()
            || !self.machine.can_begin_binary()
        {
            return Err(Error::illegal_state(
                "binary length may only follow an element that precedes another element",
            ));
        }
        self.machine.begin_binary(length);
        Ok(())
    }

    /// Declared length of the current binary element.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] unless the current event is
    /// `ELEMENT_DATA_BINARY`.
    pub fn binary_data_length(&self) -> Result<u64> {
        self.current()?
            .binary_length()
            .ok_or_else(|| Error::illegal_state("current event is not ELEMENT_DATA_BINARY"))
    }

    /// Read access to the current binary element. Bytes left unread are
    /// skipped on the next advance.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalState`] unless the current event is
    /// `ELEMENT_DATA_BINARY`.
    pub fn binary_data(&mut self) -> Result<BinaryData<'_, R>> {
        self.binary_data_length()?;
        Ok(BinaryData {
            source: &mut self.source,
            machine: &mut self.machine,
        })
    }

    /// Stop reading. Later calls fail with [`Error::IllegalState`]; the
    /// underlying reader is left open and can be recovered with
    /// [`into_inner`](Self::into_inner).
    pub fn close(&mut self) {
        debug!("Reader closed");
        self.state = State::Closed;
        self.queue.clear();
        self.current = None;
    }

    /// Give back the caller's reader.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    /// Bind a control schema from the registry when the caller did not.
    fn resolve_control_schema(&mut self) -> Result<()> {
        let at_start = self
            .current
            .as_ref()
            .is_some_and(|e| e.kind() == EventKind::StartInterchange);
        if !at_start
            || self.machine.control_schema().is_some()
            || !self.machine.config().validate_control_structure
        {
            return Ok(());
        }
        let (Some(registry), Some(dialect)) = (self.registry.as_ref(), self.machine.dialect())
        else {
            return Ok(());
        };
        let standard = dialect.standard;
        let version = dialect.version.clone();

        let resolved = registry
            .resolve(standard.as_str(), &version)
            .map_err(|e| Error::Config(e.to_string()))?;
        match resolved {
            Some(schema) => self.machine.bind_control(schema),
            None => debug!("No control schema for {} {:?}", standard, version),
        }
        Ok(())
    }
}

/// Reader over the bytes of one binary element.
pub struct BinaryData<'a, R: Read> {
    source: &'a mut ByteSource<R>,
    machine: &'a mut Machine,
}

impl<R: Read> Read for BinaryData<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.machine.read_binary(self.source, buf)
    }
}
