//! Identifier and literal quoting for generated SQL.

/// Quote a possibly schema-qualified identifier: each `.`-separated part is
/// wrapped in double quotes with embedded quotes doubled.
///
/// ```
/// use qail_export::quote::quote_ident;
///
/// assert_eq!(quote_ident("public.users"), r#""public"."users""#);
/// ```
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), r#""users""#);
        assert_eq!(quote_ident("sales.orders"), r#""sales"."orders""#);
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
        assert_eq!(quote_ident("Mixed Case"), r#""Mixed Case""#);
    }

    #[test]
    fn test_quote_literal_is_reversible() {
        for original in ["O'Brien", "''", "plain", "a'b'c'", ""] {
            let quoted = quote_literal(original);
            let inner = &quoted[1..quoted.len() - 1];
            assert_eq!(inner.replace("''", "'"), original);
        }
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
