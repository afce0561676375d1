//! Route template normalization (bounded metrics cardinality).
//!
//! `/tasks/42` -> `/tasks/:id`, `/files/abc123ef01` -> `/files/:token`.

pub const ID_PLACEHOLDER: &str = ":id";
pub const TOKEN_PLACEHOLDER: &str = ":token";

const MIN_TOKEN_LEN: usize = 8;

fn is_numeric(seg: &str) -> bool {
    !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit())
}

fn is_hex_token(seg: &str) -> bool {
    seg.len() >= MIN_TOKEN_LEN && seg.bytes().all(|b| b.is_ascii_hexdigit())
}

fn normalize_segment(seg: &str) -> &str {
    if is_numeric(seg) {
        ID_PLACEHOLDER
    } else if is_hex_token(seg) {
        TOKEN_PLACEHOLDER
    } else {
        seg
    }
}

/// Rewrite a concrete path into its route template. Idempotent.
pub fn normalize_route(pathname: &str) -> String {
    if pathname.is_empty() {
        return "/".to_string();
    }
    pathname
        .split('/')
        .map(normalize_segment)
        .collect::<Vec<_>>()
        .join("/")
}
