//! Command text to tokens, tokens to chunks.

/// Characters per chunk; one chunk becomes one piece.
pub const CHUNK_SIZE: usize = 4;

/// How command text is split into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizeMode {
    /// Split on runs of whitespace, nothing else.
    #[default]
    Whitespace,
    /// Like `Whitespace`, but `'…'` / `"…"` keep their content together and
    /// the quote characters are dropped.
    QuoteAware,
}

/// Split a raw command line into tokens. Operators and punctuation stay
/// attached to whatever token they touch; empty tokens are dropped.
pub fn tokenize(raw: &str, mode: TokenizeMode) -> Vec<String> {
    match mode {
        TokenizeMode::Whitespace => raw.split_whitespace().map(str::to_string).collect(),
        TokenizeMode::QuoteAware => tokenize_quoted(raw),
    }
}

/// No escapes; an unmatched quote swallows the rest of the line.
fn tokenize_quoted(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut open_quote: Option<char> = None;

    for c in raw.chars() {
        match open_quote {
            Some(q) if c == q => open_quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => open_quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Greedy split into `CHUNK_SIZE`-character pieces; the last holds the 1–3
/// leftovers. Counts characters, not bytes.
pub fn chunk(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    chars
        .chunks(CHUNK_SIZE)
        .map(|c| c.iter().collect())
        .collect()
}
