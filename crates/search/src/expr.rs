//! Query parsing.
//!
//! The search box accepts free text (`checkout`), single-field filters
//! (`transaction.duration:>500ms`, `op:db`, `has:error`) and boolean
//! combinations with uppercase `AND`/`OR`. Adjacent terms with no explicit
//! keyword combine as AND. Quoted strings keep their spaces.

/// Comparison operator of a filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `=` (the default when no operator is written)
    Eq,
    /// `!=`
    Ne,
}

/// Right-hand side of a filter term.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// A bare number.
    Number(f64),
    /// A duration literal, normalized to milliseconds (`500ms`, `2s`,
    /// `1.5m`, `1h`).
    DurationMs(f64),
    /// Anything else.
    Text(String),
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchExpr {
    /// Free-text token matched as a substring.
    Free(String),
    /// A single-field comparison.
    Filter {
        /// Field key, e.g. `transaction.duration` or `has`.
        key: String,
        /// Comparison operator.
        op: Op,
        /// Parsed value.
        value: QueryValue,
    },
    /// Both sides must match.
    And(Box<SearchExpr>, Box<SearchExpr>),
    /// Either side may match.
    Or(Box<SearchExpr>, Box<SearchExpr>),
}

/// Parse a raw query string. `None` when the input holds no terms.
pub fn parse_query(input: &str) -> Option<SearchExpr> {
    let tokens = tokenize(input);
    let mut expr: Option<SearchExpr> = None;
    let mut pending_or = false;

    for token in tokens {
        match token.as_str() {
            "AND" => continue,
            "OR" => {
                pending_or = true;
                continue;
            }
            _ => {}
        }
        let term = parse_term(&token);
        expr = Some(match expr {
            None => term,
            Some(lhs) if pending_or => SearchExpr::Or(Box::new(lhs), Box::new(term)),
            Some(lhs) => SearchExpr::And(Box::new(lhs), Box::new(term)),
        });
        pending_or = false;
    }
    expr
}

/// Split on whitespace, keeping double-quoted runs as one token.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in input.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_term(token: &str) -> SearchExpr {
    // `key:value` with a non-empty key; a leading colon is free text.
    let Some((key, rest)) = token.split_once(':') else {
        return SearchExpr::Free(token.to_string());
    };
    if key.is_empty() || rest.is_empty() {
        return SearchExpr::Free(token.to_string());
    }
    let (op, raw) = split_op(rest);
    SearchExpr::Filter {
        key: key.to_string(),
        op,
        value: parse_value(raw),
    }
}

fn split_op(raw: &str) -> (Op, &str) {
    if let Some(rest) = raw.strip_prefix(">=") {
        (Op::Gte, rest)
    } else if let Some(rest) = raw.strip_prefix("<=") {
        (Op::Lte, rest)
    } else if let Some(rest) = raw.strip_prefix("!=") {
        (Op::Ne, rest)
    } else if let Some(rest) = raw.strip_prefix('>') {
        (Op::Gt, rest)
    } else if let Some(rest) = raw.strip_prefix('<') {
        (Op::Lt, rest)
    } else if let Some(rest) = raw.strip_prefix('=') {
        (Op::Eq, rest)
    } else {
        (Op::Eq, raw)
    }
}

fn parse_value(raw: &str) -> QueryValue {
    if let Ok(number) = raw.parse::<f64>() {
        return QueryValue::Number(number);
    }
    for (suffix, to_ms) in [("ms", 1.0), ("s", 1000.0), ("m", 60_000.0), ("h", 3_600_000.0)] {
        if let Some(body) = raw.strip_suffix(suffix) {
            if let Ok(number) = body.parse::<f64>() {
                return QueryValue::DurationMs(number * to_ms);
            }
        }
    }
    QueryValue::Text(raw.to_string())
}
