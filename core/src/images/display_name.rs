//! Human-readable names for default library pictures.
//!
//! File names in the curated library are camelCase identifiers such as
//! `displayLCD16x2I2C.webp`. They are split into words at case changes and
//! letter/digit boundaries, words are title-cased, and well-known
//! electronics abbreviations stay upper-case.

/// Abbreviations kept upper-case in display names.
pub const ABBREVIATIONS: &[&str] = &[
    "LCD", "LED", "RGB", "I2C", "SPI", "USB", "DC", "AC", "IR", "NPN", "PNP", "SPDT", "DPDT",
    "SPST", "IC", "RFID",
];

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Number(String),
    Abbreviation(&'static str),
}

/// Display name for a library file.
///
/// ```
/// use stockroom_core::images::display_name;
///
/// assert_eq!(display_name("displayLCD16x2I2C.webp"), "Display LCD 16x2 I2C");
/// assert_eq!(display_name("jumperWires.png"), "Jumper Wires");
/// ```
#[must_use]
pub fn display_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };

    tokenize(stem)
        .into_iter()
        .map(|token| match token {
            Token::Abbreviation(abbr) => abbr.to_string(),
            Token::Number(number) => number,
            Token::Word(word) => render_word(&word),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_word(word: &str) -> String {
    let upper = word.to_uppercase();
    if let Some(abbr) = ABBREVIATIONS.iter().find(|abbr| **abbr == upper) {
        return (*abbr).to_string();
    }
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

fn tokenize(stem: &str) -> Vec<Token> {
    let chars: Vec<char> = stem.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if !c.is_alphanumeric() {
            i += 1;
            continue;
        }

        if let Some((abbr, width)) = abbreviation_at(&chars[i..]) {
            tokens.push(Token::Abbreviation(abbr));
            i += width;
            continue;
        }

        let start = i;
        if c.is_ascii_digit() {
            i = skip_digits(&chars, i);
            // Dimensions such as 16x2 stay one token.
            if i + 1 < len && matches!(chars[i], 'x' | 'X') && chars[i + 1].is_ascii_digit() {
                i = skip_digits(&chars, i + 1);
            }
            let number: String = chars[start..i].iter().collect();
            tokens.push(Token::Number(number.to_lowercase()));
            continue;
        }

        if c.is_uppercase() && chars.get(i + 1).is_some_and(|n| n.is_uppercase()) {
            while i < len && chars[i].is_uppercase() {
                i += 1;
            }
            // "ABCdef": the last capital starts the next word.
            if i < len && chars[i].is_lowercase() && i - start > 1 {
                i -= 1;
            }
        } else {
            i += 1;
            while i < len && chars[i].is_lowercase() {
                i += 1;
            }
        }
        tokens.push(Token::Word(chars[start..i].iter().collect()));
    }

    tokens
}

fn skip_digits(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    i
}

/// Longest abbreviation starting `rest`. A lower-case spelling only counts
/// when it is not immediately followed by more lower-case letters, so
/// `icHolder` matches but `icon` does not.
fn abbreviation_at(rest: &[char]) -> Option<(&'static str, usize)> {
    ABBREVIATIONS
        .iter()
        .filter_map(|abbr| {
            let width = abbr.chars().count();
            let candidate = rest.get(..width)?;
            let matches = candidate
                .iter()
                .zip(abbr.chars())
                .all(|(c, a)| c.eq_ignore_ascii_case(&a));
            if !matches {
                return None;
            }
            let shouted = candidate.iter().all(|c| !c.is_lowercase());
            let word_continues = rest.get(width).is_some_and(|c| c.is_lowercase());
            (shouted || !word_continues).then_some((*abbr, width))
        })
        .max_by_key(|(_, width)| *width)
}
