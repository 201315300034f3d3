//! Injected, structured event sinks for layout tracing.
//!
//! Every component that traces takes `&dyn EventSink` explicitly; there is
//! no process-wide verbosity toggle.

use std::cell::RefCell;
use std::fmt;

use crate::spec::EnumShapeKind;

/// One structured layout event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutEvent {
    /// A field value was classified.
    FieldClassified {
        /// Field name.
        field: String,
        /// Resulting kind.
        kind: EnumShapeKind,
        /// Reserved width of this occurrence.
        width: usize,
    },
    /// A list of mappings had inconsistent key sets and fell back to a flat list.
    KeyValueDowngraded {
        /// Field name.
        field: String,
        /// Number of items.
        n_items: usize,
    },
    /// A sheet was created and its header block planned.
    SheetCreated {
        /// Sheet name.
        sheet_name: String,
        /// Total column count.
        n_cols: usize,
        /// Header row count.
        n_rows_header: usize,
    },
    /// One report row was rendered.
    RowRendered {
        /// Sheet name.
        sheet_name: String,
        /// 0-based row index.
        row_idx: usize,
        /// Source identifier.
        source_id: String,
    },
    /// Two distinct titles sanitized to the same sheet name.
    TitleCollision {
        /// Shared sheet name.
        sheet_name: String,
        /// Title that claimed the sheet first.
        title_first: String,
        /// Title that collided.
        title_current: String,
    },
    /// A report value was neither a mapping nor a list of mappings.
    ReportDegenerate {
        /// Source identifier.
        source_id: String,
    },
    /// A sheet was written to the output workbook.
    SheetWritten {
        /// Sheet name.
        sheet_name: String,
        /// Number of data rows.
        n_rows: usize,
    },
}

impl LayoutEvent {
    /// Whether this event indicates suspicious input.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::KeyValueDowngraded { .. } | Self::TitleCollision { .. } | Self::ReportDegenerate { .. }
        )
    }
}

impl fmt::Display for LayoutEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldClassified { field, kind, width } => {
                write!(f, "field {field:?} classified as {kind} (width={width})")
            }
            Self::KeyValueDowngraded { field, n_items } => write!(
                f,
                "field {field:?}: {n_items} mappings with inconsistent keys, treated as flat list"
            ),
            Self::SheetCreated {
                sheet_name,
                n_cols,
                n_rows_header,
            } => write!(
                f,
                "sheet {sheet_name:?} created (cols={n_cols}, header_rows={n_rows_header})"
            ),
            Self::RowRendered {
                sheet_name,
                row_idx,
                source_id,
            } => write!(f, "sheet {sheet_name:?} row {row_idx} <- {source_id}"),
            Self::TitleCollision {
                sheet_name,
                title_first,
                title_current,
            } => write!(
                f,
                "title {title_current:?} collides with {title_first:?} on sheet {sheet_name:?}"
            ),
            Self::ReportDegenerate { source_id } => {
                write!(f, "report in {source_id} has no field mapping")
            }
            Self::SheetWritten { sheet_name, n_rows } => {
                write!(f, "sheet {sheet_name:?} written ({n_rows} rows)")
            }
        }
    }
}

/// Receiver of layout events.
pub trait EventSink {
    /// Handle one event.
    fn emit(&self, event: LayoutEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: LayoutEvent) {}
}

/// Sink forwarding to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: LayoutEvent) {
        match &event {
            e if e.is_warning() => log::warn!("{e}"),
            LayoutEvent::SheetCreated { .. } | LayoutEvent::SheetWritten { .. } => {
                log::info!("{event}")
            }
            _ => log::debug!("{event}"),
        }
    }
}

/// Sink buffering events in memory.
#[derive(Debug, Default)]
pub struct CollectEventSink {
    events: RefCell<Vec<LayoutEvent>>,
}

impl CollectEventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of collected events.
    pub fn events(&self) -> Vec<LayoutEvent> {
        self.events.borrow().clone()
    }

    /// Take collected events, leaving the sink empty.
    pub fn take(&self) -> Vec<LayoutEvent> {
        self.events.take()
    }
}

impl EventSink for CollectEventSink {
    fn emit(&self, event: LayoutEvent) {
        self.events.borrow_mut().push(event);
    }
}
