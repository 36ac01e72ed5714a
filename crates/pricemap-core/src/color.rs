//! Colour classification of free-form offer text.
//!
//! Offers arrive as human-written strings ("29.90 руб/кг", "-60%",
//! "Спецпредложение"). The map only needs a coarse signal of how good the
//! offer is, so the text is reduced to one of four classes.
//!
//! # Rules (first match wins)
//!
//! 1. Per-kilogram price (`руб/кг`, `per-kg`, `/kg`): `< 30` green,
//!    `< 60` orange, otherwise red.
//! 2. Per-item price (`руб/вещь`, `per-item`, `/item`): `< 4` green,
//!    `< 7` orange, otherwise red.
//! 3. Percentage (`%`): `> 50` green, `> 20` orange, otherwise red.
//! 4. Anything else is gray.
//!
//! A unit marker with no number in the text falls through to the next rule.

use crate::shop::{ColorClass, RawOffer};

const PER_KG_MARKERS: &[&str] = &["руб/кг", "per-kg", "/kg"];
const PER_ITEM_MARKERS: &[&str] = &["руб/вещь", "per-item", "/item"];

/// Classify offer text into a [`ColorClass`].
pub fn classify_discount(text: &str) -> ColorClass {
    let lower = text.to_lowercase();

    if has_marker(&lower, PER_KG_MARKERS) {
        if let Some(price) = first_decimal(&lower) {
            return price_class(price, 30.0, 60.0);
        }
    }

    if has_marker(&lower, PER_ITEM_MARKERS) {
        if let Some(price) = first_decimal(&lower) {
            return price_class(price, 4.0, 7.0);
        }
    }

    if lower.contains('%') {
        if let Some(percent) = first_integer(&lower) {
            return if percent > 50 {
                ColorClass::Green
            } else if percent > 20 {
                ColorClass::Orange
            } else {
                ColorClass::Red
            };
        }
    }

    ColorClass::Gray
}

/// Colour for an ingested offer: derived from the text, with the source's
/// hint used only when the text itself is unclassifiable.
pub fn offer_color(offer: &RawOffer) -> ColorClass {
    match classify_discount(&offer.discount_text) {
        ColorClass::Gray => offer.color_hint(),
        derived => derived,
    }
}

fn has_marker(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

fn price_class(price: f64, green_below: f64, orange_below: f64) -> ColorClass {
    if price < green_below {
        ColorClass::Green
    } else if price < orange_below {
        ColorClass::Orange
    } else {
        ColorClass::Red
    }
}

/// First number in the text, accepting `.` or `,` as decimal separator.
fn first_decimal(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];

    let int_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let mut number = rest[..int_end].to_string();

    let tail = &rest[int_end..];
    if let Some(sep) = tail.chars().next().filter(|c| *c == '.' || *c == ',') {
        let frac = &tail[sep.len_utf8()..];
        let frac_end = frac
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(frac.len());
        if frac_end > 0 {
            number.push('.');
            number.push_str(&frac[..frac_end]);
        }
    }

    number.parse().ok()
}

/// First run of ASCII digits in the text.
fn first_integer(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    // Runs too long for u64 saturate rather than fall through to gray.
    Some(rest[..end].parse().unwrap_or(u64::MAX))
}
