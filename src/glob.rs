/// Pattern matching for CONFIG GET parameter names. Only the forms such
/// patterns actually use are supported: `*` for any run of bytes, `?` for
/// exactly one byte, anything else literal.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    matches_at(pattern.as_bytes(), text.as_bytes())
}

fn matches_at(pattern: &[u8], text: &[u8]) -> bool {
    let Some((&head, rest)) = pattern.split_first() else {
        return text.is_empty();
    };

    match head {
        // let the star absorb every possible prefix of the remaining text
        b'*' => (0..=text.len()).any(|absorbed| matches_at(rest, &text[absorbed..])),
        b'?' => !text.is_empty() && matches_at(rest, &text[1..]),
        literal => text.first() == Some(&literal) && matches_at(rest, &text[1..]),
    }
}
