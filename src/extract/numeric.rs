//! Lenient numeric parsing for scraped text

/// Parses a number out of display text
///
/// Only the first numeric run is read: it starts at the first digit (or at a
/// `.` directly before one) and continues through digits, `.`, `,`, and
/// whitespace. Within that run everything other than ASCII digits and `.` is
/// discarded, so currency symbols, thousands separators, and surrounding labels
/// are ignored. Returns None when no digit is found or the run does not parse
/// (for example `"1.2.3"`).
///
/// # Example
///
/// ```
/// use token_board::extract::parse_numeric;
///
/// assert_eq!(parse_numeric("$1,234,567.89"), Some(1234567.89));
/// assert_eq!(parse_numeric("Mkt. cap $42,000"), Some(42000.0));
/// assert_eq!(parse_numeric("n/a"), None);
/// ```
pub fn parse_numeric(text: &str) -> Option<f64> {
    let start = numeric_start(text)?;

    let cleaned: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ',') || c.is_whitespace())
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Byte offset of the first digit, or of a `.` immediately followed by one
fn numeric_start(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c.is_ascii_digit() {
            return Some(i);
        }
        if c == '.' && chars.peek().map_or(false, |(_, next)| next.is_ascii_digit()) {
            return Some(i);
        }
    }
    None
}
