//! Identifier casing helpers shared by the key codec, the label resolver and
//! the entity catalog.
//!
//! The key styles keep the word shapes they are given: [`studly`] only
//! upper-cases the first char of each `-`/`_`/whitespace separated word, so
//! `HTMLReport` stays `HTMLReport`, and [`snake`] puts a delimiter in front of
//! every capital that follows another char, so `HTMLParser` becomes
//! `h_t_m_l_parser`. Keys built here therefore match keys stored by other
//! tooling for the same models. Labels go through [`words`] instead, which
//! knows about acronym runs. Everything operates on `char`s, never bytes.

/// Splits an identifier into its words.
pub fn words(value: &str) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if is_separator(c) {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        // `current` is only non-empty when the previous char was part of it
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}

fn is_separator(c: char) -> bool {
    c == '-' || c == '_' || c.is_whitespace()
}

/// Upper-cases the first char and lower-cases the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Upper-cases only the first char of `word`.
fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `invoice report` -> `InvoiceReport`, `userID` -> `UserID`
pub fn studly(value: &str) -> String {
    value.split(is_separator).map(upper_first).collect()
}

/// `invoice report` -> `invoiceReport`
pub fn camel(value: &str) -> String {
    let studly = studly(value);
    let mut chars = studly.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `InvoiceReport` -> `invoice_report`
pub fn snake(value: &str) -> String {
    delimited(value, '_')
}

/// `InvoiceReport` -> `invoice-report`
pub fn kebab(value: &str) -> String {
    delimited(value, '-')
}

/// `InvoiceReport` -> `INVOICE_REPORT`
pub fn upper_snake(value: &str) -> String {
    snake(value).to_uppercase()
}

fn delimited(value: &str, delimiter: char) -> String {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_lowercase()) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 4);
    let mut word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            word_start = true;
            continue;
        }
        let upper = c.is_uppercase() || (word_start && c.is_lowercase());
        if upper && !out.is_empty() {
            out.push(delimiter);
        }
        out.extend(c.to_lowercase());
        word_start = false;
    }
    out
}

/// Human readable form: `ViewAny` -> `View Any`, `impersonate-user` ->
/// `Impersonate User`.
pub fn headline(value: &str) -> String {
    words(value)
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last segment of a namespaced class identifier.
pub fn class_basename(class: &str) -> &str {
    class.rsplit(|c| c == '\\' || c == '/').next().unwrap_or(class)
}
