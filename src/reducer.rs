//! Panel-solver output reduction.
//!
//! Console dumps, FT (total forces) and ST (stability derivatives) files all
//! share one shape: `label = value` pairs, several per line, derivative rows
//! prefixed by a description and a `|` column. Each line is split on `|`, each
//! `=` pairs the last token before it with the first token after it, and the
//! label is looked up in a declarative table. Derivative labels count only
//! inside a `|` row; elsewhere (the spiral-stability ratio `Clb Cnr / Clr Cnb`)
//! they are not derivatives. A token that does not parse is dropped for that
//! field only. A label seen twice keeps its last value.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::record::{Axis, Coef, Coefficients, StabilityDerivatives};

/// Where a parsed value goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Total(Coef),
    Derivative(Axis, Coef),
    NeutralPoint,
    Control,
}

/// Alternate spellings are consulted only when the preferred one is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spelling {
    Preferred,
    Alternate,
}

/// Totals and neutral point. Derivative and control labels are matched by
/// [`lookup`] from their structure.
pub const LABELS: &[(&str, Field, Spelling)] = &[
    ("CLtot", Field::Total(Coef::Lift), Spelling::Preferred),
    ("CDtot", Field::Total(Coef::Drag), Spelling::Preferred),
    ("CYtot", Field::Total(Coef::Side), Spelling::Preferred),
    ("Cltot", Field::Total(Coef::Roll), Spelling::Preferred),
    ("Cmtot", Field::Total(Coef::Pitch), Spelling::Preferred),
    ("Cntot", Field::Total(Coef::Yaw), Spelling::Preferred),
    ("Cl'tot", Field::Total(Coef::Roll), Spelling::Alternate),
    ("Cn'tot", Field::Total(Coef::Yaw), Spelling::Alternate),
    ("Xnp", Field::NeutralPoint, Spelling::Preferred),
];

/// `CLd01`, `Cmd02`, `CDffd01`: coefficient, `d`, control index.
fn is_control_label(label: &str) -> bool {
    let Some(pos) = label.rfind('d') else {
        return false;
    };
    let (head, digits) = (&label[..pos], &label[pos + 1..]);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (Coef::from_label(head).is_some() || head == "CDff")
}

pub fn lookup(label: &str) -> Option<(Field, Spelling)> {
    if let Some((_, field, spelling)) = LABELS.iter().find(|(l, _, _)| *l == label) {
        return Some((*field, *spelling));
    }
    if is_control_label(label) {
        return Some((Field::Control, Spelling::Preferred));
    }
    // Stability/rate derivative: coefficient label + axis suffix
    let mut chars = label.chars();
    let suffix = chars.next_back()?;
    let axis = Axis::from_suffix(suffix)?;
    let coef = Coef::from_label(chars.as_str())?;
    Some((Field::Derivative(axis, coef), Spelling::Preferred))
}

/// Every `label = value` pair on a line, in order. Values are raw tokens.
pub fn label_value_pairs(line: &str) -> Vec<(&str, &str)> {
    let mut rest = match line.split_once('|') {
        Some((_, derivatives)) => derivatives,
        None => line,
    };
    let mut pairs = Vec::new();
    while let Some(eq) = rest.find('=') {
        let label = rest[..eq].split_whitespace().last();
        let after = &rest[eq + 1..];
        let value = after.split_whitespace().next();
        if let (Some(l), Some(v)) = (label, value) {
            pairs.push((l, v));
        }
        // Skip past the value token so it is not read as the next label
        rest = match value {
            Some(v) => {
                let start = after.find(v).unwrap_or(0);
                &after[start + v.len()..]
            }
            None => after,
        };
    }
    pairs
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub totals: Coefficients<Option<f64>>,
    pub derivatives: StabilityDerivatives,
    pub xnp: Option<f64>,
    pub control_derivatives: BTreeMap<String, f64>,
}

impl ParsedOutput {
    fn set(&mut self, field: Field, label: &str, v: f64) {
        match field {
            Field::Total(c) => *self.totals.get_mut(c) = Some(v),
            Field::Derivative(a, c) => *self.derivatives.axis_mut(a).get_mut(c) = Some(v),
            Field::NeutralPoint => self.xnp = Some(v),
            Field::Control => {
                self.control_derivatives.insert(label.to_string(), v);
            }
        }
    }

    /// Values from `other` replace ours where present.
    pub fn overlay(&mut self, other: &ParsedOutput) {
        self.totals.overlay(&other.totals);
        self.derivatives.overlay(&other.derivatives);
        if other.xnp.is_some() {
            self.xnp = other.xnp;
        }
        for (k, v) in &other.control_derivatives {
            self.control_derivatives.insert(k.clone(), *v);
        }
    }

    /// Values from `other` used only where ours are absent.
    pub fn fill(&mut self, other: &ParsedOutput) {
        self.totals.fill(&other.totals);
        self.derivatives.fill(&other.derivatives);
        self.xnp = self.xnp.or(other.xnp);
        for (k, v) in &other.control_derivatives {
            self.control_derivatives.entry(k.clone()).or_insert(*v);
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ParsedOutput::default()
    }
}

/// Fortran output can print `1.0D-03`; accept that alongside plain floats.
fn parse_number(token: &str) -> Option<f64> {
    let v: f64 = match token.parse() {
        Ok(v) => v,
        Err(_) => token.replace(['D', 'd'], "E").parse().ok()?,
    };
    v.is_finite().then_some(v)
}

/// Reduce one solver text dump.
pub fn parse(text: &str) -> ParsedOutput {
    let mut preferred = ParsedOutput::default();
    let mut alternate = ParsedOutput::default();
    for line in text.lines() {
        let table_row = line.contains('|');
        for (label, token) in label_value_pairs(line) {
            let Some((field, spelling)) = lookup(label) else {
                continue;
            };
            if matches!(field, Field::Derivative(..)) && !table_row {
                continue;
            }
            let Some(v) = parse_number(token) else {
                continue;
            };
            match spelling {
                Spelling::Preferred => preferred.set(field, label, v),
                Spelling::Alternate => alternate.set(field, label, v),
            }
        }
    }
    preferred.fill(&alternate);
    preferred
}

/// `None` when the file is absent or unreadable.
pub fn parse_file(path: &Path) -> Option<ParsedOutput> {
    let bytes = fs::read(path).ok()?;
    Some(parse(&String::from_utf8_lossy(&bytes)))
}
