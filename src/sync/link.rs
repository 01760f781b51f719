/// Extracts the issue key from a board's link column.
///
/// The column holds either a bare key (`KT-1`) or a key followed by other text
/// (`KT-1 - https://tracker/browse/KT-1`). The first whitespace-delimited token wins.
pub fn parse_linked_key(raw: &str) -> Option<String> {
    let key = if raw.contains(char::is_whitespace) {
        raw.split_whitespace().next()?
    } else {
        raw
    };
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
