//! Splits SQL script text into individual commands.
//!
//! Commands end at a `;` outside of quotes and comments. Scripts written for
//! SQL Server may also end a command with `GO` alone on a line, and Oracle
//! scripts with `/` alone on a line. In Oracle scripts a PL/SQL block
//! (`BEGIN`, `DECLARE`, `CREATE [OR REPLACE] PROCEDURE ...`) contains `;`
//! internally and only ends at the `/` line.

/// Vendor-specific separator recognized in addition to `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtraSeparator {
    /// `GO` alone on a line (SQL Server).
    Go,
    /// `/` alone on a line (Oracle).
    Slash,
}

impl ExtraSeparator {
    fn matches(self, trimmed_line: &str) -> bool {
        match self {
            ExtraSeparator::Go => trimmed_line.eq_ignore_ascii_case("go"),
            ExtraSeparator::Slash => trimmed_line == "/",
        }
    }
}

const PLSQL_UNITS: &[&str] = &["PROCEDURE", "FUNCTION", "PACKAGE", "TRIGGER", "TYPE"];

pub struct SqlScriptParser;

impl SqlScriptParser {
    /// Commands of `script`, in order, trimmed. Empty and comment-only
    /// commands are dropped; comments inside a command are kept.
    pub fn commands(script: &str, extra: Option<ExtraSeparator>) -> Vec<String> {
        let chars: Vec<char> = script.chars().collect();
        let mut commands = Vec::new();
        let mut current = Command::default();
        let mut at_line_start = true;
        let mut i = 0;

        while i < chars.len() {
            if at_line_start {
                at_line_start = false;
                if let Some(sep) = extra {
                    let end = line_end(&chars, i);
                    let line: String = chars[i..end].iter().collect();
                    if sep.matches(line.trim()) {
                        current.flush_into(&mut commands);
                        i = end + 1;
                        at_line_start = true;
                        continue;
                    }
                }
            }

            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match c {
                '\'' | '"' | '`' => {
                    let end = quoted_end(&chars, i, c);
                    current.push_code(&chars[i..end]);
                    i = end;
                    continue;
                }
                '[' if extra == Some(ExtraSeparator::Go) => {
                    let end = quoted_end(&chars, i, ']');
                    current.push_code(&chars[i..end]);
                    i = end;
                    continue;
                }
                '-' if next == Some('-') => {
                    let end = line_end(&chars, i);
                    current.push_comment(&chars[i..end]);
                    i = end;
                    continue;
                }
                '/' if next == Some('*') => {
                    let end = block_comment_end(&chars, i);
                    current.push_comment(&chars[i..end]);
                    i = end;
                    continue;
                }
                ';' => {
                    if extra == Some(ExtraSeparator::Slash) && is_plsql_block(&current.text) {
                        current.push_code(&[';']);
                    } else {
                        current.flush_into(&mut commands);
                    }
                }
                '\n' => {
                    current.text.push('\n');
                    at_line_start = true;
                }
                _ => {
                    if c.is_whitespace() {
                        current.text.push(c);
                    } else {
                        current.push_code(&[c]);
                    }
                }
            }
            i += 1;
        }

        current.flush_into(&mut commands);
        commands
    }
}

#[derive(Default)]
struct Command {
    text: String,
    has_code: bool,
}

impl Command {
    fn push_code(&mut self, chars: &[char]) {
        self.text.extend(chars);
        self.has_code = true;
    }

    fn push_comment(&mut self, chars: &[char]) {
        self.text.extend(chars);
    }

    fn flush_into(&mut self, commands: &mut Vec<String>) {
        let cmd = std::mem::take(self);
        if cmd.has_code {
            commands.push(cmd.text.trim().to_string());
        }
    }
}

/// Index of the `\n` ending the line containing `from`, or the input length.
fn line_end(chars: &[char], from: usize) -> usize {
    chars[from..]
        .iter()
        .position(|&c| c == '\n')
        .map_or(chars.len(), |p| from + p)
}

/// Index just past the closing `close` of the quoted run starting at
/// `start`. A doubled closing character is an escape.
fn quoted_end(chars: &[char], start: usize, close: char) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        if chars[j] == close {
            if chars.get(j + 1) == Some(&close) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    chars.len()
}

fn block_comment_end(chars: &[char], start: usize) -> usize {
    let mut j = start + 2;
    while j + 1 < chars.len() {
        if chars[j] == '*' && chars[j + 1] == '/' {
            return j + 2;
        }
        j += 1;
    }
    chars.len()
}

/// Leading words of `text` with comments skipped, upper-cased.
fn leading_words(text: &str, n: usize) -> Vec<String> {
    let mut rest = text.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, r)| r).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, r)| r).trim_start();
        } else {
            break;
        }
    }
    rest.split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty())
        .take(n)
        .map(str::to_ascii_uppercase)
        .collect()
}

fn is_plsql_block(text: &str) -> bool {
    let words = leading_words(text, 5);
    let mut words = words.iter().map(String::as_str);
    match words.next() {
        Some("BEGIN") | Some("DECLARE") => true,
        Some("CREATE") => {
            let mut word = words.next();
            if word == Some("OR") {
                words.next(); // REPLACE
                word = words.next();
            }
            if matches!(word, Some("EDITIONABLE") | Some("NONEDITIONABLE")) {
                word = words.next();
            }
            word.is_some_and(|w| PLSQL_UNITS.contains(&w))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_semicolon() {
        let cmds = SqlScriptParser::commands(
            "CREATE TABLE a(id INT);\nINSERT INTO a VALUES (1);\n\n;  ",
            None,
        );
        assert_eq!(
            cmds,
            vec!["CREATE TABLE a(id INT)", "INSERT INTO a VALUES (1)"]
        );
    }

    #[test]
    fn test_semicolon_in_quotes_and_comments() {
        let script = "INSERT INTO a VALUES ('x;y', \"q;\");\n-- note; here\nSELECT 1 /* a; b */;";
        let cmds = SqlScriptParser::commands(script, None);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], "INSERT INTO a VALUES ('x;y', \"q;\")");
        assert_eq!(cmds[1], "-- note; here\nSELECT 1 /* a; b */");
    }

    #[test]
    fn test_doubled_quote_escape() {
        let cmds = SqlScriptParser::commands("SELECT 'it''s; fine'; SELECT 2", None);
        assert_eq!(cmds, vec!["SELECT 'it''s; fine'", "SELECT 2"]);
    }

    #[test]
    fn test_comment_only_commands_dropped() {
        let cmds = SqlScriptParser::commands("-- header\n/* block */\n", None);
        assert!(cmds.is_empty());
    }

    #[test]
    fn test_go_separator() {
        let script = "CREATE TABLE a(id INT)\nGO\ninsert into [a;b] values (1)\n  go  \nSELECT 1";
        let cmds = SqlScriptParser::commands(script, Some(ExtraSeparator::Go));
        assert_eq!(
            cmds,
            vec![
                "CREATE TABLE a(id INT)",
                "insert into [a;b] values (1)",
                "SELECT 1"
            ]
        );
    }

    #[test]
    fn test_go_is_not_special_without_separator() {
        let cmds = SqlScriptParser::commands("SELECT 1\nGO\nSELECT 2", None);
        assert_eq!(cmds.len(), 1);
    }

    #[test]
    fn test_go_inside_line_is_not_a_separator() {
        let cmds = SqlScriptParser::commands("SELECT go FROM t\nGO", Some(ExtraSeparator::Go));
        assert_eq!(cmds, vec!["SELECT go FROM t"]);
    }

    #[test]
    fn test_slash_separator_with_plsql_block() {
        let script = "DROP USER scott CASCADE;\n\
                      CREATE OR REPLACE PROCEDURE p AS\nBEGIN\n  NULL;\nEND;\n/\n\
                      BEGIN\n  x := 1;\nEND;\n/\n\
                      SELECT 1 FROM dual;";
        let cmds = SqlScriptParser::commands(script, Some(ExtraSeparator::Slash));
        assert_eq!(cmds.len(), 4);
        assert_eq!(cmds[0], "DROP USER scott CASCADE");
        assert_eq!(
            cmds[1],
            "CREATE OR REPLACE PROCEDURE p AS\nBEGIN\n  NULL;\nEND;"
        );
        assert_eq!(cmds[2], "BEGIN\n  x := 1;\nEND;");
        assert_eq!(cmds[3], "SELECT 1 FROM dual");
    }

    #[test]
    fn test_create_table_is_not_plsql() {
        assert!(!is_plsql_block("CREATE TABLE t(id INT)"));
        assert!(is_plsql_block("-- c\nCREATE EDITIONABLE TRIGGER trg"));
        assert!(is_plsql_block("declare x number"));
    }
}
