/// Read-only statement guard for `run_query`
///
/// A lexical check, applied before any SQL reaches the database adapter. It does
/// not parse SQL: it tokenizes just enough to skip string literals, quoted
/// identifiers and comments, then looks at statement boundaries and keywords.

use crate::error::ToolExecutionError;

/// Keywords that start (or smuggle in) a statement which writes or reconfigures
const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "REPLACE", "TRUNCATE", "ATTACH",
    "DETACH", "PRAGMA", "VACUUM", "REINDEX", "GRANT", "REVOKE", "MERGE", "UPSERT",
];

/// Keywords a read statement may begin with
const READ_LEADERS: &[&str] = &["SELECT", "WITH", "VALUES", "EXPLAIN"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Symbol(char),
}

/// Reject anything that is not a single read statement
///
/// Returns `Forbidden` for mutating or multi-statement input and
/// `ExecutionFailed` for input that holds no statement at all.
pub fn ensure_read_only(sql: &str) -> Result<(), ToolExecutionError> {
    let statements = split_statements(sql);

    let statement = match statements.as_slice() {
        [] => return Err(ToolExecutionError::execution_failed("query contains no SQL statement")),
        [single] => single,
        _ => {
            return Err(ToolExecutionError::forbidden(format!(
                "only a single read statement may be executed, found {}",
                statements.len()
            )))
        }
    };

    for (position, token) in statement.iter().enumerate() {
        let Token::Word(word) = token else { continue };
        if !MUTATING_KEYWORDS.contains(&word.as_str()) {
            continue;
        }
        // replace(x, 'a', 'b') is a string function, not REPLACE INTO
        if word == "REPLACE" && statement.get(position + 1) == Some(&Token::Symbol('(')) {
            continue;
        }
        return Err(ToolExecutionError::forbidden(format!(
            "{} statements are not permitted; the database is read-only",
            word
        )));
    }

    match statement.first() {
        Some(Token::Word(leader)) if READ_LEADERS.contains(&leader.as_str()) => Ok(()),
        Some(Token::Word(leader)) => Err(ToolExecutionError::forbidden(format!(
            "statements starting with {} are not permitted; only SELECT queries are allowed",
            leader
        ))),
        _ => Err(ToolExecutionError::forbidden("only SELECT queries are allowed")),
    }
}

/// Tokenize and group tokens into statements, dropping empty ones
fn split_statements(sql: &str) -> Vec<Vec<Token>> {
    let mut statements = Vec::new();
    let mut current = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            '\'' | '"' | '`' => {
                skip_quoted(&mut chars, c);
                current.push(Token::Symbol(c));
            }
            '[' => {
                skip_quoted(&mut chars, ']');
                current.push(Token::Symbol('['));
            }
            ';' => {
                if !current.is_empty() {
                    statements.push(std::mem::take(&mut current));
                }
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                current.push(Token::Word(word.to_ascii_uppercase()));
            }
            c if c.is_whitespace() => {}
            c => current.push(Token::Symbol(c)),
        }
    }

    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

/// Consume a quoted run up to its closing delimiter; doubled delimiters escape
fn skip_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, close: char) {
    while let Some(c) = chars.next() {
        if c == close {
            if close != ']' && chars.peek() == Some(&close) {
                chars.next();
                continue;
            }
            return;
        }
    }
}
