//! Selection strings.
//!
//! Operators select children with free-form strings such as
//! `"[1121, 1122]"` or `"{1121+1122; 1122+1123}"`. Parsing is forgiving:
//! tokens that do not name an attached child are skipped.

use std::collections::{BTreeSet, HashMap};

use segmir_topology::{EdgeAddress, PanelPosition};

use crate::device::{DeviceKind, Identity};

const DELIMITERS: &[char] = &[',', ';', ':', '"', '\'', '{', '}'];

/// Split a selection string into address tokens.
pub fn tokenize(selector: &str) -> impl Iterator<Item = &str> {
    let trimmed = selector.trim();
    let trimmed = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(']').unwrap_or(trimmed);
    trimmed
        .split(|c: char| c.is_whitespace() || DELIMITERS.contains(&c))
        .filter(|t| !t.is_empty())
}

/// Parse one token as an identity of the given kind.
pub fn parse_identity(token: &str, kind: DeviceKind) -> Option<Identity> {
    match kind {
        DeviceKind::Panel => token.parse::<PanelPosition>().ok().map(Identity::Panel),
        DeviceKind::Edge => token.parse::<EdgeAddress>().ok().map(Identity::Edge),
    }
}

/// Resolve a selection string to child indices through an identity index.
pub fn resolve_selection(
    selector: &str,
    kind: DeviceKind,
    index: &HashMap<Identity, usize>,
) -> BTreeSet<usize> {
    tokenize(selector)
        .filter_map(|token| parse_identity(token, kind))
        .filter_map(|id| index.get(&id).copied())
        .collect()
}

/// Render identities the way selection getters report them: `[a, b, c]`.
pub fn render_selection<'a>(ids: impl IntoIterator<Item = &'a Identity>) -> String {
    let parts: Vec<String> = ids.into_iter().map(Identity::address).collect();
    format!("[{}]", parts.join(", "))
}
