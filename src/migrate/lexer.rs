// src/migrate/lexer.rs

//! Lexical statement splitting: quote-, comment-, and directive-aware, but
//! deliberately *not* a SQL parser. It knows enough to find statement
//! boundaries and extract `atlas:` directive comments; recognizing renames,
//! dialect keywords, or anything else requiring real grammar is the job of
//! a dialect-supplied [`crate::sqlgen::RenameParser`].

const DEFAULT_DELIMITER: &str = ";";

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub directive: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StmtDecl {
    pub text: String,
    pub pos: usize,
    pub comments: Vec<Comment>,
}

impl StmtDecl {
    /// All directive argument values recorded under `name` across this
    /// statement's leading comments, in file order. An argument-less
    /// directive contributes an empty string.
    pub fn directive(&self, name: &str) -> Vec<String> {
        self.comments
            .iter()
            .filter_map(|c| c.directive.as_ref())
            .filter(|(n, _)| n == name)
            .map(|(_, arg)| arg.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LexResult {
    pub stmts: Vec<StmtDecl>,
    pub is_checkpoint: bool,
    pub checkpoint_label: Option<String>,
}

/// Parses a directive out of a comment body (markers already stripped),
/// e.g. `"atlas:nolint destructive"` -> `Some(("nolint", "destructive"))`.
/// Whitespace-insensitive: leading/trailing space around the body, and the
/// single separating space before the argument, are both tolerated.
fn parse_directive(body: &str) -> Option<(String, String)> {
    let rest = body.trim().strip_prefix("atlas:")?;
    match rest.find(char::is_whitespace) {
        Some(idx) => Some((rest[..idx].to_string(), rest[idx..].trim().to_string())),
        None => Some((rest.to_string(), String::new())),
    }
}

struct Lexer<'a> {
    chars: Vec<(usize, char)>,
    src: &'a str,
    delimiter: String,
    stmts: Vec<StmtDecl>,
    pending_comments: Vec<Comment>,
    buf: String,
    start_pos: Option<usize>,
    saw_statement: bool,
    is_checkpoint: bool,
    checkpoint_label: Option<String>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().collect(),
            src,
            delimiter: DEFAULT_DELIMITER.to_string(),
            stmts: Vec::new(),
            pending_comments: Vec::new(),
            buf: String::new(),
            start_pos: None,
            saw_statement: false,
            is_checkpoint: false,
            checkpoint_label: None,
        }
    }

    fn peek(&self, i: usize) -> Option<char> {
        self.chars.get(i).map(|(_, c)| *c)
    }

    fn byte_at(&self, i: usize) -> usize {
        self.chars.get(i).map(|(b, _)| *b).unwrap_or(self.src.len())
    }

    fn starts_with_delimiter(&self, i: usize) -> bool {
        let start = self.byte_at(i);
        self.src[start..].starts_with(self.delimiter.as_str())
    }

    fn record_comment(&mut self, text: String) {
        let directive = parse_directive(&text);
        if let Some((name, arg)) = &directive {
            if name == "checkpoint" && !self.saw_statement {
                self.is_checkpoint = true;
                self.checkpoint_label = if arg.is_empty() { None } else { Some(arg.clone()) };
            }
            if name == "delimiter" && !self.saw_statement && !arg.is_empty() {
                self.delimiter = arg.clone();
            }
        }
        self.pending_comments.push(Comment { text, directive });
    }

    fn push_char(&mut self, pos: usize, c: char) {
        if self.start_pos.is_none() {
            self.start_pos = Some(pos);
        }
        self.buf.push(c);
    }

    fn emit_statement(&mut self) {
        if !self.buf.trim().is_empty() {
            self.stmts.push(StmtDecl {
                text: self.buf.trim().to_string(),
                pos: self.start_pos.unwrap_or(0),
                comments: std::mem::take(&mut self.pending_comments),
            });
            self.saw_statement = true;
        } else {
            self.pending_comments.clear();
        }
        self.buf.clear();
        self.start_pos = None;
    }

    fn run(mut self) -> LexResult {
        let n = self.chars.len();
        let mut i = 0;
        while i < n {
            let (byte_pos, c) = self.chars[i];

            if c == '-' && self.peek(i + 1) == Some('-') {
                let (text, next) = self.consume_line_comment(i + 2);
                self.record_comment(text);
                i = next;
                continue;
            }
            if c == '#' {
                let (text, next) = self.consume_line_comment(i + 1);
                self.record_comment(text);
                i = next;
                continue;
            }
            if c == '/' && self.peek(i + 1) == Some('*') {
                let (text, next) = self.consume_block_comment(i + 2);
                self.record_comment(text);
                i = next;
                continue;
            }
            if c == '\'' || c == '"' {
                let (text, next) = self.consume_quoted(i, c);
                for ch in text.chars() {
                    self.push_char(byte_pos, ch);
                }
                let _ = byte_pos;
                i = next;
                continue;
            }
            if self.starts_with_delimiter(i) {
                self.emit_statement();
                i += self.delimiter.chars().count();
                continue;
            }
            if c.is_whitespace() {
                if self.start_pos.is_some() {
                    self.buf.push(c);
                }
                i += 1;
                continue;
            }
            self.push_char(byte_pos, c);
            i += 1;
        }
        self.emit_statement();

        LexResult {
            stmts: self.stmts,
            is_checkpoint: self.is_checkpoint,
            checkpoint_label: self.checkpoint_label,
        }
    }

    /// Consumes to end-of-line (or end-of-input); `from` is the index just
    /// past the comment marker. Returns the comment body and the index of
    /// the newline (or end).
    fn consume_line_comment(&self, from: usize) -> (String, usize) {
        let mut i = from;
        let start_byte = self.byte_at(i);
        while i < self.chars.len() && self.chars[i].1 != '\n' {
            i += 1;
        }
        let end_byte = self.byte_at(i);
        (self.src[start_byte..end_byte].to_string(), i)
    }

    /// `from` is the index just past `/*`. Returns the comment body (without
    /// the `*/` terminator) and the index just past it.
    fn consume_block_comment(&self, from: usize) -> (String, usize) {
        let mut i = from;
        let start_byte = self.byte_at(i);
        while i < self.chars.len() {
            if self.chars[i].1 == '*' && self.peek(i + 1) == Some('/') {
                let end_byte = self.byte_at(i);
                return (self.src[start_byte..end_byte].to_string(), i + 2);
            }
            i += 1;
        }
        let end_byte = self.src.len();
        (self.src[start_byte..end_byte].to_string(), i)
    }

    /// `at` is the index of the opening quote. Returns the raw text
    /// (including both quote characters and any doubled-quote escapes) and
    /// the index just past the closing quote.
    fn consume_quoted(&self, at: usize, quote: char) -> (String, usize) {
        let start_byte = self.byte_at(at);
        let mut i = at + 1;
        loop {
            if i >= self.chars.len() {
                let end_byte = self.src.len();
                return (self.src[start_byte..end_byte].to_string(), i);
            }
            if self.chars[i].1 == quote {
                if self.peek(i + 1) == Some(quote) {
                    i += 2;
                    continue;
                }
                let end_byte = self.byte_at(i) + quote.len_utf8();
                return (self.src[start_byte..end_byte].to_string(), i + 1);
            }
            i += 1;
        }
    }
}

/// Splits `src` into statement declarations, stripping comments from the
/// statement text but retaining them (with directive parses) on each decl.
pub fn lex(src: &str) -> LexResult {
    Lexer::new(src).run()
}

/// Statement text only, comments stripped -- the common case for execution.
pub fn stmts(src: &str) -> Vec<String> {
    lex(src).stmts.into_iter().map(|s| s.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolon_ignoring_whitespace() {
        let out = stmts("CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);");
        assert_eq!(out, vec!["CREATE TABLE t (id INT)", "INSERT INTO t VALUES (1)"]);
    }

    #[test]
    fn semicolon_inside_string_literal_is_not_a_boundary() {
        let out = stmts("INSERT INTO t (s) VALUES ('a;b');");
        assert_eq!(out, vec!["INSERT INTO t (s) VALUES ('a;b')"]);
    }

    #[test]
    fn doubled_quote_is_an_escaped_literal_quote() {
        let out = stmts("INSERT INTO t (s) VALUES ('it''s; fine');");
        assert_eq!(out, vec!["INSERT INTO t (s) VALUES ('it''s; fine')"]);
    }

    #[test]
    fn line_and_block_comments_are_stripped_from_statement_text() {
        let src = "-- leading note\nCREATE TABLE t (\n  id INT /* primary */\n);";
        let out = stmts(src);
        assert_eq!(out, vec!["CREATE TABLE t (\n  id INT \n)"]);
    }

    #[test]
    fn custom_delimiter_directive_changes_the_terminator() {
        let src = "-- atlas:delimiter $$\nCREATE TABLE t (id INT)$$\nINSERT INTO t VALUES (1)$$";
        let out = stmts(src);
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("CREATE TABLE"));
    }

    #[test]
    fn checkpoint_directive_marks_file_and_captures_label() {
        let result = lex("-- atlas:checkpoint baseline\nCREATE TABLE t (id INT);");
        assert!(result.is_checkpoint);
        assert_eq!(result.checkpoint_label, Some("baseline".to_string()));
    }

    #[test]
    fn nolint_directive_without_args_yields_empty_string_argument() {
        let result = lex("-- atlas:nolint\n-- atlas:nolint destructive\nDROP TABLE t;");
        let decl = &result.stmts[0];
        assert_eq!(decl.directive("nolint"), vec!["".to_string(), "destructive".to_string()]);
    }

    #[test]
    fn block_comment_directive_is_recognized() {
        let result = lex("/*atlas:nolint DS101*/\nDROP TABLE t;");
        assert_eq!(result.stmts[0].directive("nolint"), vec!["DS101".to_string()]);
    }

    #[test]
    fn stmt_decl_pos_points_at_first_statement_character() {
        let result = lex("  \nCREATE TABLE t (id INT);");
        assert_eq!(result.stmts[0].pos, 3);
    }
}
