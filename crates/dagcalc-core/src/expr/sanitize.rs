//! Formula alphabet filter.

/// Words kept as a unit. Their letters are otherwise outside the alphabet.
const BUILTINS: [&str; 2] = ["int", "len"];

/// Multi-character operators kept as a unit, longest first.
const SHIFTS: [&str; 3] = [">>>", ">>", "<<"];

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit()
        || matches!(
            c,
            '.' | '+' | '-' | '*' | '/' | '%' | '(' | ')' | '&' | '|' | '^' | '~' | '$' | ' ' | '\''
        )
}

/// Removes every character that cannot appear in a formula.
///
/// Digits, `.`, `+ - * / % ( ) & | ^ ~`, `$`, space and `'` survive one by
/// one. The words `int` and `len` and the shift operators survive only as a
/// whole, so a lone `<` or a stray `i` is dropped.
pub fn sanitize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    'outer: while let Some(c) = rest.chars().next() {
        for unit in BUILTINS.iter().chain(SHIFTS.iter()) {
            if rest.starts_with(unit) {
                out.push_str(unit);
                rest = &rest[unit.len()..];
                continue 'outer;
            }
        }
        if is_allowed(c) {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}
