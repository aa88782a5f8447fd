use crate::constants::{ASCII_LOWER, BIT_MASKS, HOMOGLYPHS, KEYBOARD_LAYOUTS, VOWELS};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single lexical mutation technique applied to a domain label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Attack {
    Addition,
    Omission,
    Homograph,
    Subdomain,
    VowelSwap,
    Repetition,
    Hyphenation,
    Replacement,
    Bitsquatting,
    Transposition,
}

impl Attack {
    pub const ALL: [Attack; 10] = [
        Attack::Addition,
        Attack::Omission,
        Attack::Homograph,
        Attack::Subdomain,
        Attack::VowelSwap,
        Attack::Repetition,
        Attack::Hyphenation,
        Attack::Replacement,
        Attack::Bitsquatting,
        Attack::Transposition,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Attack::Addition => "addition",
            Attack::Omission => "omission",
            Attack::Homograph => "homograph",
            Attack::Subdomain => "subdomain",
            Attack::VowelSwap => "vowel-swap",
            Attack::Repetition => "repetition",
            Attack::Hyphenation => "hyphenation",
            Attack::Replacement => "replacement",
            Attack::Bitsquatting => "bitsquatting",
            Attack::Transposition => "transposition",
        }
    }

    /// Runs this technique against a single label (no dots).
    pub fn generate(self, label: &str) -> Vec<String> {
        match self {
            Attack::Addition => generate_addition(label),
            Attack::Omission => generate_omission(label),
            Attack::Homograph => generate_homograph(label),
            Attack::Subdomain => generate_subdomain(label),
            Attack::VowelSwap => generate_vowel_swap(label),
            Attack::Repetition => generate_repetition(label),
            Attack::Hyphenation => generate_hyphenation(label),
            Attack::Replacement => generate_replacement(label),
            Attack::Bitsquatting => generate_bitsquatting(label),
            Attack::Transposition => generate_transposition(label),
        }
    }
}

impl fmt::Display for Attack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn replace_at(chars: &[char], index: usize, with: char) -> String {
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| if i == index { with } else { c })
        .collect()
}

fn insert_at(chars: &[char], index: usize, with: char) -> String {
    let mut variation = String::with_capacity(chars.len() + 1);
    variation.extend(&chars[..index]);
    variation.push(with);
    variation.extend(&chars[index..]);
    variation
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '.'
}

// Splits the label at every interior position that does not touch an
// existing separator.
fn insert_separator(label: &str, separator: char) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut variations = Vec::new();

    for i in 1..chars.len() {
        if is_separator(chars[i - 1]) || is_separator(chars[i]) {
            continue;
        }
        variations.push(insert_at(&chars, i, separator));
    }

    variations
}

pub fn generate_addition(label: &str) -> Vec<String> {
    ASCII_LOWER
        .iter()
        .map(|c| format!("{}{}", label, c))
        .collect()
}

pub fn generate_omission(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();

    (0..chars.len())
        .map(|i| chars[..i].iter().chain(&chars[i + 1..]).collect())
        .collect()
}

/// Substitutes confusable glyphs one position at a time. A character that
/// occurs more than once additionally gets every occurrence replaced at
/// once, a single time per distinct character.
pub fn generate_homograph(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut variations = Vec::new();

    let mut counts: HashMap<char, usize> = HashMap::new();
    for &c in &chars {
        *counts.entry(c).or_insert(0) += 1;
    }

    let mut replaced_everywhere = HashSet::new();

    for (i, c) in chars.iter().enumerate() {
        let Some(glyphs) = HOMOGLYPHS.get(c) else {
            continue;
        };

        for &glyph in glyphs {
            variations.push(replace_at(&chars, i, glyph));
        }

        if counts[c] > 1 && replaced_everywhere.insert(*c) {
            for &glyph in glyphs {
                variations.push(
                    chars
                        .iter()
                        .map(|&other| if other == *c { glyph } else { other })
                        .collect(),
                );
            }
        }
    }

    variations
}

pub fn generate_subdomain(label: &str) -> Vec<String> {
    insert_separator(label, '.')
}

pub fn generate_vowel_swap(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut variations = Vec::new();

    for (i, c) in chars.iter().enumerate() {
        if !VOWELS.contains(c) {
            continue;
        }
        for &vowel in VOWELS.iter().filter(|&v| v != c) {
            variations.push(replace_at(&chars, i, vowel));
        }
    }

    variations
}

pub fn generate_repetition(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut seen = HashSet::new();
    let mut variations = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphabetic() {
            continue;
        }
        let variation = insert_at(&chars, i, c);
        if seen.insert(variation.clone()) {
            variations.push(variation);
        }
    }

    variations
}

pub fn generate_hyphenation(label: &str) -> Vec<String> {
    insert_separator(label, '-')
}

/// Fat-finger substitutions from the English, German, Spanish and French
/// keyboard adjacency maps.
pub fn generate_replacement(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut seen = HashSet::new();
    let mut variations = Vec::new();

    for (i, c) in chars.iter().enumerate() {
        for layout in KEYBOARD_LAYOUTS.iter() {
            let Some(neighbours) = layout.get(c) else {
                continue;
            };
            for &neighbour in neighbours {
                let variation = replace_at(&chars, i, neighbour);
                if seen.insert(variation.clone()) {
                    variations.push(variation);
                }
            }
        }
    }

    variations
}

// Flip each of the eight low bits of every character and keep results that
// land on a hostname character: [0-9], [a-z] or '-'.
pub fn generate_bitsquatting(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut variations = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        for mask in BIT_MASKS {
            let flipped = char::from_u32(c as u32 ^ mask)
                .filter(|f| f.is_ascii_digit() || f.is_ascii_lowercase() || *f == '-');
            if let Some(flipped) = flipped {
                variations.push(replace_at(&chars, i, flipped));
            }
        }
    }

    variations
}

pub fn generate_transposition(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut variations = Vec::new();

    for i in 0..chars.len().saturating_sub(1) {
        if chars[i] == chars[i + 1] {
            continue;
        }
        let mut swapped = chars.clone();
        swapped.swap(i, i + 1);
        variations.push(swapped.into_iter().collect());
    }

    variations
}
