//! Layout constants and default preset factories.

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];

/// Header text of the identifier column.
pub const C_IDENTIFIER_HEADER: &str = "File Name";
/// Prefix of generated sheet titles for reports without a `title`.
pub const C_DEFAULT_TITLE_PREFIX: &str = "Report";
/// Substring (case-insensitive) marking a field as date-typed.
pub const C_DATE_FIELD_MARKER: &str = "date";

/// Field-name marker of a continuation field.
pub const C_CONTINUATION_MARKER: &str = "(+1)";
/// Separator inserted between merged continuation texts.
pub const C_CONTINUATION_SEPARATOR: &str = "\n\n--- Additional Data ---\n\n";

/// Default unit patterns stripped from text cells, applied in order.
pub fn derive_default_unit_patterns() -> Vec<String> {
    [
        r"\[ms\]",
        r"\[s\]",
        r"\[V\]",
        r"\[mV\]",
        r"\[A\]",
        r"\[mA\]",
        r"\[Hz\]",
        r"\[kHz\]",
        r"\[MHz\]",
        r"\[°C\]",
        r"\[mm\]",
        r"\[cm\]",
        r"\[m\]",
        r"\[\w+\]",
        r"\+/-",
        r"Vac",
        r"Vdc",
        r"mA",
        r"M Ohm",
        r"Ohm",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Default date patterns, tried in order; first match wins.
///
/// Patterns containing `%H` are parsed as date-times and truncated to the date.
pub fn derive_default_date_formats() -> Vec<String> {
    [
        "%Y-%m-%d",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%d-%m-%Y",
        "%d.%m.%Y",
        "%Y.%m.%d",
        "%Y/%m/%d",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%d %B %Y",
        "%d %b %Y",
        "%d-%b-%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%b %d %Y",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
