//! Statement Source - Turns a migration unit into executable statements
//!
//! The executor only depends on the [`StatementSource`] trait. The bundled
//! [`SqlFileSource`] reads `<root>/<id>.<direction>.sql` and splits the file
//! into individual statements.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, TokenWithLocation, Tokenizer};
use std::fs;
use std::path::Path;
use tracing::warn;

use super::definitions::{Direction, MigrationId};
use crate::error::BoxError;

/// Produces the ordered statements of one side of a migration unit.
///
/// Implementations must be deterministic and must not touch the database;
/// side effects only happen when the executor runs the returned statements.
pub trait StatementSource: Send + Sync {
    fn load(
        &self,
        root: &Path,
        migration: &MigrationId,
        direction: Direction,
    ) -> Result<Vec<String>, BoxError>;
}

/// Reads plain SQL files from the application root
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFileSource;

impl SqlFileSource {
    pub fn new() -> Self {
        Self
    }
}

impl StatementSource for SqlFileSource {
    fn load(
        &self,
        root: &Path,
        migration: &MigrationId,
        direction: Direction,
    ) -> Result<Vec<String>, BoxError> {
        let path = migration.file_path(root, direction);
        let sql = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read migration file {}: {}", path.display(), e))?;
        Ok(split_sql_statements(&sql))
    }
}

/// Split SQL text into statements on top-level semicolons.
///
/// Semicolons inside string literals, quoted identifiers, comments and
/// dollar-quoted bodies do not terminate a statement. Statements are sliced
/// from the original text, so they run exactly as written. Fragments made of
/// whitespace and comments only are dropped.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    let mut tokenizer = Tokenizer::new(&dialect, sql);
    match tokenizer.tokenize_with_location() {
        Ok(tokens) => split_on_tokens(sql, &tokens),
        Err(e) => {
            // Fall back to naive splitting so unusual syntax still runs
            warn!("SQL tokenizing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

fn split_on_tokens(sql: &str, tokens: &[TokenWithLocation]) -> Vec<String> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_content = false;
    let mut body = TriggerBody::default();

    for token in tokens {
        match &token.token {
            Token::SemiColon if body.depth > 0 => {}
            Token::SemiColon => {
                let end = byte_offset(sql, &line_starts, token.location.line, token.location.column)
                    .unwrap_or(sql.len());
                if has_content {
                    push_statement(&mut statements, &sql[start..end]);
                }
                start = (end + 1).min(sql.len());
                has_content = false;
                body = TriggerBody::default();
            }
            Token::Whitespace(_) | Token::EOF => {}
            Token::Word(word) if word.quote_style.is_none() => {
                has_content = true;
                body.observe(&word.value);
            }
            _ => {
                has_content = true;
                body.leading_words = TRIGGER_HEADER_WORDS;
            }
        }
    }

    if has_content {
        push_statement(&mut statements, &sql[start..]);
    }
    statements
}

/// Number of leading words searched for `TRIGGER` after `CREATE`
const TRIGGER_HEADER_WORDS: usize = 4;

/// Tracks `BEGIN ... END` nesting inside a `CREATE TRIGGER` statement, whose
/// body holds semicolons that do not end the statement.
#[derive(Debug, Default)]
struct TriggerBody {
    leading_words: usize,
    creates: bool,
    is_trigger: bool,
    depth: usize,
}

impl TriggerBody {
    fn observe(&mut self, word: &str) {
        if self.leading_words < TRIGGER_HEADER_WORDS {
            if self.leading_words == 0 {
                self.creates = word.eq_ignore_ascii_case("CREATE");
            } else if self.creates && word.eq_ignore_ascii_case("TRIGGER") {
                self.is_trigger = true;
            }
            self.leading_words += 1;
        }
        if !self.is_trigger {
            return;
        }

        if word.eq_ignore_ascii_case("BEGIN") || (self.depth > 0 && word.eq_ignore_ascii_case("CASE")) {
            self.depth += 1;
        } else if word.eq_ignore_ascii_case("END") {
            self.depth = self.depth.saturating_sub(1);
        }
    }
}

fn push_statement(statements: &mut Vec<String>, fragment: &str) {
    let statement = fragment.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
}

/// Convert a 1-based (line, column-in-chars) location to a byte offset.
fn byte_offset(sql: &str, line_starts: &[usize], line: u64, column: u64) -> Option<usize> {
    let line_start = *line_starts.get(usize::try_from(line).ok()?.checked_sub(1)?)?;
    let column = usize::try_from(column).ok()?.checked_sub(1)?;
    let rest = &sql[line_start..];
    match rest.char_indices().nth(column) {
        Some((offset, _)) => Some(line_start + offset),
        None => Some(sql.len()),
    }
}
