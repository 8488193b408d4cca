//! Read-query validation and decomposition.
//!
//! Queries follow a small fixed grammar:
//!
//! ```text
//! SELECT items FROM entity [WHERE ...] [ORDER BY ...] [STARTPOSITION n] [MAXRESULTS n]
//! ```
//!
//! Keywords are case-insensitive. The `FROM` entity must belong to a fixed
//! allow-list of remote entity types; unrecognized entities fail validation
//! before any network call. `WHERE` and `ORDER BY` bodies are carried through
//! verbatim (the remote service interprets them), but string literals are
//! tokenized so keywords inside quotes are never mistaken for clause
//! boundaries. Pagination clauses in the raw text are parsed out so the client
//! can replace them with generated ones when it paginates on the caller's
//! behalf.

use crate::error::{ErrorKind, SyncResult};
use crate::{bail, sync_error};

/// Entity types accepted in the `FROM` clause, in canonical casing.
///
/// The canonical name doubles as the key the remote service uses for the
/// entity array in query responses.
pub const ENTITY_TYPES: &[&str] = &[
    "Account",
    "Bill",
    "BillPayment",
    "Budget",
    "Class",
    "CompanyInfo",
    "CreditMemo",
    "Customer",
    "Department",
    "Deposit",
    "Employee",
    "Estimate",
    "Invoice",
    "Item",
    "JournalEntry",
    "Payment",
    "PaymentMethod",
    "Purchase",
    "PurchaseOrder",
    "RefundReceipt",
    "SalesReceipt",
    "TaxCode",
    "TaxRate",
    "Term",
    "TimeActivity",
    "Transfer",
    "Vendor",
    "VendorCredit",
];

/// Resolves an entity name to its canonical casing, if allowed.
pub fn canonical_entity(name: &str) -> Option<&'static str> {
    ENTITY_TYPES
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
        .copied()
}

/// A validated, decomposed read-query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Select items as written (`*`, column names, or `COUNT(*)`).
    pub select: Vec<String>,
    /// Canonical entity name from the allow-list.
    pub entity: String,
    /// Raw `WHERE` body, verbatim.
    pub where_clause: Option<String>,
    /// Raw `ORDER BY` body, verbatim.
    pub order_by: Option<String>,
    /// `STARTPOSITION` from the raw query text, if present.
    pub start_position: Option<u32>,
    /// `MAXRESULTS` from the raw query text, if present.
    pub max_results: Option<u32>,
}

impl ParsedQuery {
    /// Renders the query with the pagination clauses stripped.
    ///
    /// The client appends its own generated `STARTPOSITION`/`MAXRESULTS` when
    /// paginating.
    pub fn without_pagination(&self) -> String {
        let mut out = format!("SELECT {} FROM {}", self.select.join(", "), self.entity);

        if let Some(where_clause) = &self.where_clause {
            out.push_str(" WHERE ");
            out.push_str(where_clause);
        }

        if let Some(order_by) = &self.order_by {
            out.push_str(" ORDER BY ");
            out.push_str(order_by);
        }

        out
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    /// Identifier or keyword; may contain dots for field paths.
    Word,
    /// Integer literal.
    Number,
    /// Single-quoted string literal, quotes included in the span.
    StringLit,
    /// Any other single character.
    Symbol(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

impl Token {
    fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.start..self.end]
    }

    fn is_keyword(&self, input: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(input).eq_ignore_ascii_case(keyword)
    }
}

fn lex(input: &str) -> SyncResult<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0usize;

    while idx < bytes.len() {
        let byte = bytes[idx];

        if byte.is_ascii_whitespace() {
            idx += 1;
            continue;
        }

        if byte == b'\'' {
            // String literal; '' escapes a quote.
            let start = idx;
            idx += 1;
            loop {
                match bytes.get(idx) {
                    Some(b'\'') if bytes.get(idx + 1) == Some(&b'\'') => idx += 2,
                    Some(b'\'') => {
                        idx += 1;
                        break;
                    }
                    Some(_) => idx += 1,
                    None => bail!(
                        ErrorKind::ValidationError,
                        "Unterminated string literal in query"
                    ),
                }
            }
            tokens.push(Token {
                kind: TokenKind::StringLit,
                start,
                end: idx,
            });
            continue;
        }

        if byte.is_ascii_digit() {
            let start = idx;
            while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                idx += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Number,
                start,
                end: idx,
            });
            continue;
        }

        if byte.is_ascii_alphabetic() || byte == b'_' {
            let start = idx;
            while idx < bytes.len()
                && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_' || bytes[idx] == b'.')
            {
                idx += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Word,
                start,
                end: idx,
            });
            continue;
        }

        tokens.push(Token {
            kind: TokenKind::Symbol(byte as char),
            start: idx,
            end: idx + 1,
        });
        idx += 1;
    }

    Ok(tokens)
}

/// Parses and validates a read-query.
///
/// Validation order follows the grammar: `SELECT` and `FROM` (including the
/// entity allow-list) are checked before any later clause is considered.
pub fn parse(input: &str) -> SyncResult<ParsedQuery> {
    let tokens = lex(input)?;
    let mut pos = 0usize;

    match tokens.first() {
        Some(token) if token.is_keyword(input, "select") => pos += 1,
        _ => bail!(ErrorKind::ValidationError, "Query must begin with SELECT"),
    }

    // Select items run until the FROM keyword.
    let from_index = tokens[pos..]
        .iter()
        .position(|token| token.is_keyword(input, "from"))
        .map(|offset| pos + offset)
        .ok_or_else(|| sync_error!(ErrorKind::ValidationError, "Query must contain FROM"))?;

    let select = parse_select_items(input, &tokens[pos..from_index])?;
    pos = from_index + 1;

    let entity_token = tokens
        .get(pos)
        .filter(|token| token.kind == TokenKind::Word)
        .ok_or_else(|| {
            sync_error!(ErrorKind::ValidationError, "FROM must name an entity type")
        })?;
    let entity = canonical_entity(entity_token.text(input)).ok_or_else(|| {
        sync_error!(
            ErrorKind::ValidationError,
            "Unsupported entity type in FROM clause",
            entity_token.text(input)
        )
    })?;
    pos += 1;

    let mut where_clause = None;
    let mut order_by = None;
    let mut start_position = None;
    let mut max_results = None;

    while pos < tokens.len() {
        let token = &tokens[pos];

        if token.is_keyword(input, "where") {
            if where_clause.is_some() || order_by.is_some() {
                bail!(ErrorKind::ValidationError, "Unexpected WHERE clause");
            }
            let (body, next) = raw_clause(input, &tokens, pos + 1)?;
            where_clause = Some(body);
            pos = next;
            continue;
        }

        if token.is_keyword(input, "order") {
            if order_by.is_some() {
                bail!(ErrorKind::ValidationError, "Duplicate ORDER BY clause");
            }
            let by = tokens.get(pos + 1);
            if !by.is_some_and(|token| token.is_keyword(input, "by")) {
                bail!(ErrorKind::ValidationError, "ORDER must be followed by BY");
            }
            let (body, next) = raw_clause(input, &tokens, pos + 2)?;
            order_by = Some(body);
            pos = next;
            continue;
        }

        if token.is_keyword(input, "startposition") {
            start_position = Some(clause_number(input, &tokens, pos, "STARTPOSITION")?);
            pos += 2;
            continue;
        }

        if token.is_keyword(input, "maxresults") {
            max_results = Some(clause_number(input, &tokens, pos, "MAXRESULTS")?);
            pos += 2;
            continue;
        }

        bail!(
            ErrorKind::ValidationError,
            "Unexpected token in query",
            token.text(input)
        );
    }

    Ok(ParsedQuery {
        select,
        entity: entity.to_string(),
        where_clause,
        order_by,
        start_position,
        max_results,
    })
}

fn parse_select_items(input: &str, tokens: &[Token]) -> SyncResult<Vec<String>> {
    if tokens.is_empty() {
        bail!(ErrorKind::ValidationError, "SELECT list must not be empty");
    }

    let mut items = Vec::new();
    let mut pos = 0usize;

    loop {
        let token = tokens
            .get(pos)
            .ok_or_else(|| sync_error!(ErrorKind::ValidationError, "SELECT list must not be empty"))?;

        match &token.kind {
            TokenKind::Symbol('*') => {
                items.push("*".to_string());
                pos += 1;
            }
            TokenKind::Word => {
                // A word may be a bare column path or a function call like COUNT(*).
                if tokens.get(pos + 1).map(|t| &t.kind) == Some(&TokenKind::Symbol('(')) {
                    let close = tokens[pos..]
                        .iter()
                        .position(|t| t.kind == TokenKind::Symbol(')'))
                        .map(|offset| pos + offset)
                        .ok_or_else(|| {
                            sync_error!(
                                ErrorKind::ValidationError,
                                "Unbalanced parentheses in SELECT list"
                            )
                        })?;
                    let text = &input[token.start..tokens[close].end];
                    items.push(text.split_whitespace().collect::<Vec<_>>().join(""));
                    pos = close + 1;
                } else {
                    items.push(token.text(input).to_string());
                    pos += 1;
                }
            }
            _ => bail!(
                ErrorKind::ValidationError,
                "Invalid item in SELECT list",
                token.text(input)
            ),
        }

        if pos == tokens.len() {
            return Ok(items);
        }

        if tokens[pos].kind != TokenKind::Symbol(',') {
            bail!(
                ErrorKind::ValidationError,
                "SELECT items must be separated by commas",
                tokens[pos].text(input)
            );
        }
        pos += 1;
    }
}

/// Collects a raw clause body starting at `from` until the next top-level
/// keyword or end of input. Returns the verbatim source slice and the index of
/// the terminating token.
fn raw_clause(input: &str, tokens: &[Token], from: usize) -> SyncResult<(String, usize)> {
    let mut end = from;
    while end < tokens.len() {
        let token = &tokens[end];
        if token.is_keyword(input, "order")
            || token.is_keyword(input, "startposition")
            || token.is_keyword(input, "maxresults")
        {
            break;
        }
        end += 1;
    }

    if end == from {
        bail!(ErrorKind::ValidationError, "Clause body must not be empty");
    }

    let body = input[tokens[from].start..tokens[end - 1].end].trim().to_string();
    Ok((body, end))
}

fn clause_number(input: &str, tokens: &[Token], at: usize, clause: &'static str) -> SyncResult<u32> {
    let value = tokens
        .get(at + 1)
        .filter(|token| token.kind == TokenKind::Number)
        .ok_or_else(|| {
            sync_error!(
                ErrorKind::ValidationError,
                "Pagination clause requires a number",
                clause
            )
        })?;

    value.text(input).parse::<u32>().map_err(|_| {
        sync_error!(
            ErrorKind::ValidationError,
            "Pagination value is out of range",
            clause
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select_star() {
        let parsed = parse("SELECT * FROM Customer").unwrap();
        assert_eq!(parsed.select, vec!["*"]);
        assert_eq!(parsed.entity, "Customer");
        assert!(parsed.where_clause.is_none());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let parsed = parse("select Id, DisplayName from customer where Active = true").unwrap();
        assert_eq!(parsed.entity, "Customer");
        assert_eq!(parsed.select, vec!["Id", "DisplayName"]);
        assert_eq!(parsed.where_clause.as_deref(), Some("Active = true"));
    }

    #[test]
    fn full_grammar_roundtrip() {
        let parsed = parse(
            "SELECT Id FROM Invoice WHERE TotalAmt > '100' ORDER BY TxnDate DESC STARTPOSITION 11 MAXRESULTS 50",
        )
        .unwrap();

        assert_eq!(parsed.where_clause.as_deref(), Some("TotalAmt > '100'"));
        assert_eq!(parsed.order_by.as_deref(), Some("TxnDate DESC"));
        assert_eq!(parsed.start_position, Some(11));
        assert_eq!(parsed.max_results, Some(50));
        assert_eq!(
            parsed.without_pagination(),
            "SELECT Id FROM Invoice WHERE TotalAmt > '100' ORDER BY TxnDate DESC"
        );
    }

    #[test]
    fn keywords_inside_string_literals_are_inert() {
        let parsed =
            parse("SELECT * FROM Customer WHERE DisplayName = 'ORDER BY from maxresults'").unwrap();
        assert_eq!(
            parsed.where_clause.as_deref(),
            Some("DisplayName = 'ORDER BY from maxresults'")
        );
        assert!(parsed.order_by.is_none());
        assert!(parsed.max_results.is_none());
    }

    #[test]
    fn count_star_is_a_valid_select_item() {
        let parsed = parse("SELECT COUNT(*) FROM Payment").unwrap();
        assert_eq!(parsed.select, vec!["COUNT(*)"]);
    }

    #[test]
    fn rejects_missing_select() {
        let err = parse("FROM Customer").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn rejects_missing_from() {
        assert!(parse("SELECT *").is_err());
    }

    #[test]
    fn rejects_unknown_entity() {
        let err = parse("SELECT * FROM Gadget").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.detail(), Some("Gadget"));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(parse("SELECT * FROM Customer WHERE Name = 'oops").is_err());
    }

    #[test]
    fn select_validated_before_where() {
        // A malformed query missing FROM fails on FROM, not on the WHERE body.
        let err = parse("SELECT * WHERE Active = true").unwrap_err();
        assert!(err.user_message().contains("FROM"));
    }

    #[test]
    fn pagination_is_stripped_from_rendering() {
        let parsed = parse("SELECT * FROM Customer STARTPOSITION 5 MAXRESULTS 10").unwrap();
        assert_eq!(parsed.without_pagination(), "SELECT * FROM Customer");
        assert_eq!(parsed.start_position, Some(5));
    }
}
