use serde::{Deserialize, Serialize};

use crate::text::fold;

const QUANTITY_KEYWORDS: &[&str] = &["qty", "qte", "quantite", "quantity", "quantites", "qt"];
const QUANTITY_UNITS: &[&str] =
    &["pcs", "pc", "piece", "pieces", "unite", "unites", "unit", "units", "u"];

/// One article request detected in free text, before any price lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCandidate {
    pub reference: String,
    /// Text left on the line once the reference and quantity are removed.
    pub designation: Option<String>,
    pub quantity: u32,
}

/// Detects article requests line by line. Order is detection order;
/// a reference seen twice is merged into its first occurrence.
pub fn extract_candidates(text: &str) -> Vec<ArticleCandidate> {
    let mut candidates: Vec<ArticleCandidate> = Vec::new();

    for line in text.lines() {
        let Some(candidate) = parse_line(line) else {
            continue;
        };

        match candidates.iter_mut().find(|existing| existing.reference == candidate.reference) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(candidate.quantity);
                if existing.designation.is_none() {
                    existing.designation = candidate.designation;
                }
            }
            None => candidates.push(candidate),
        }
    }

    candidates
}

/// `MOT-5KW-001`: upper-case alphanumeric segments joined by `-`, at least two
/// segments, at least one letter and one digit.
pub fn is_article_reference(token: &str) -> bool {
    let segments: Vec<&str> = token.split('-').collect();
    if segments.len() < 2 {
        return false;
    }
    let well_formed = segments.iter().all(|segment| {
        !segment.is_empty()
            && segment.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
    });

    well_formed
        && token.chars().any(|ch| ch.is_ascii_digit())
        && token.chars().any(|ch| ch.is_ascii_uppercase())
}

struct Token<'a> {
    raw: &'a str,
    clean: String,
    consumed: bool,
}

fn parse_line(line: &str) -> Option<ArticleCandidate> {
    let mut tokens: Vec<Token<'_>> = line
        .split_whitespace()
        .map(|raw| Token { raw, clean: clean_token(raw), consumed: false })
        .collect();

    let reference_index = tokens.iter().position(|token| {
        is_article_reference(token.raw.trim_matches(|ch: char| !ch.is_ascii_alphanumeric()))
    })?;
    let reference = tokens[reference_index]
        .raw
        .trim_matches(|ch: char| !ch.is_ascii_alphanumeric())
        .to_string();
    tokens[reference_index].consumed = true;

    let quantity = take_quantity(&mut tokens)?;

    let designation = tokens
        .iter()
        .filter(|token| !token.consumed && !token.clean.is_empty())
        .map(|token| token.raw)
        .collect::<Vec<_>>()
        .join(" ");
    let designation = designation
        .trim_matches(|ch: char| ch.is_whitespace() || matches!(ch, ',' | ';' | ':' | '-'))
        .to_string();

    Some(ArticleCandidate {
        reference,
        designation: (!designation.is_empty()).then_some(designation),
        quantity,
    })
}

fn clean_token(raw: &str) -> String {
    fold(raw).replace('×', "x").trim_matches(|ch: char| !ch.is_alphanumeric()).to_string()
}

fn positive(value: &str) -> Option<u32> {
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    value.parse::<u32>().ok().filter(|quantity| *quantity > 0)
}

/// Finds the first quantity expression among the unconsumed tokens and marks
/// the tokens it used.
fn take_quantity(tokens: &mut [Token<'_>]) -> Option<u32> {
    let live: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| !token.consumed && !token.clean.is_empty())
        .map(|(index, _)| index)
        .collect();

    for (position, &index) in live.iter().enumerate() {
        let current = tokens[index].clean.as_str();
        let next = live.get(position + 1).map(|&next| (next, tokens[next].clean.as_str()));

        // x10
        if let Some(quantity) = current.strip_prefix('x').and_then(positive) {
            tokens[index].consumed = true;
            return Some(quantity);
        }
        // 10x
        if let Some(quantity) = current.strip_suffix('x').and_then(positive) {
            tokens[index].consumed = true;
            return Some(quantity);
        }
        // 10pcs
        if let Some(quantity) = QUANTITY_UNITS
            .iter()
            .filter(|unit| unit.len() > 1)
            .find_map(|unit| current.strip_suffix(unit).and_then(positive))
        {
            tokens[index].consumed = true;
            return Some(quantity);
        }

        let Some((next_index, next_clean)) = next else {
            continue;
        };

        // x 10, qty 10, quantité : 10
        if current == "x" || QUANTITY_KEYWORDS.contains(&current) {
            if let Some(quantity) = positive(next_clean) {
                tokens[index].consumed = true;
                tokens[next_index].consumed = true;
                return Some(quantity);
            }
        }
        // 10 x, 10 pcs, 10 pièces
        if let Some(quantity) = positive(current) {
            if next_clean == "x" || QUANTITY_UNITS.contains(&next_clean) {
                tokens[index].consumed = true;
                tokens[next_index].consumed = true;
                return Some(quantity);
            }
        }
    }

    None
}
