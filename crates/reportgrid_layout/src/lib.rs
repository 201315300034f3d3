//! `reportgrid_layout` v1:
//! Shape inference and hierarchical sheet layout for extracted report fields.
//!
//! Module map:
//! - `conf`      : constants and default presets
//! - `spec`      : shapes/schemas/layouts/options/errors
//! - `event`     : injected event sinks
//! - `classify`  : per-value shape classification
//! - `schema`    : per-sheet schema accumulation
//! - `plan`      : column ranges, header and subtitle grid
//! - `value`     : per-cell scalar typing pipeline
//! - `render`    : one report -> one typed row
//! - `generate`  : two-pass workbook orchestration
//! - `normalize` : upstream field normalization transforms
//! - `util`      : pure helper functions
pub mod classify;
pub mod conf;
pub mod event;
pub mod generate;
pub mod normalize;
pub mod plan;
pub mod render;
pub mod schema;
pub mod spec;
pub mod util;
pub mod value;

pub use classify::{classify_field, classify_fields, classify_value};
pub use conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
pub use event::{CollectEventSink, EventSink, LayoutEvent, LogEventSink, NullEventSink};
pub use generate::build_workbook_layout;
pub use normalize::{EnumPreserveMatchRule, SpecNormalizeOptions, normalize_documents};
pub use plan::plan_sheet_layout;
pub use render::render_row;
pub use schema::{SchemaAccumulator, merge_schema};
pub use spec::{
    EnumCellValue, EnumFieldShape, EnumShapeKind, EnumTitleCollisionPolicy, LayoutError,
    SpecFieldColumns, SpecKeyValueShape, SpecLayoutOptions, SpecLayoutReport, SpecListShape,
    SpecNestedPath, SpecNestedPaths, SpecSheetGrid, SpecSheetHorizontalMerge, SpecSheetLayout,
    SpecSheetSchema, SpecSourceDocument, SpecValuePolicy, SpecWorkbookLayout,
};
pub use util::{
    calculate_total_columns, create_sheet_identifier, derive_display_identifier,
    sanitize_sheet_name,
};
pub use value::SpecValueFilters;
