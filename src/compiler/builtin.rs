//! Builtin compiler for plain-CSS sources.
//!
//! Local `@import` statements are inlined recursively, looked up relative to
//! the importing file first and then in each include path. Remote imports are
//! hoisted to the top of the result, after any `@charset`. Each file is
//! checked on its own (imports blanked out, line numbers preserved) so errors
//! point at the file that contains them: first for LESS-only constructs this
//! backend cannot translate, then with the CSS parser.

use std::ffi::OsString;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::{CompileError, CompileErrorKind, StyleCompiler};
use crate::css;

/// Inlines `@import`s and validates CSS syntax
#[derive(Debug, Clone, Default)]
pub struct BuiltinCompiler {
    include_paths: Vec<PathBuf>,
}

/// One `@import` statement found in a file
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportStatement {
    /// Byte range of the whole statement, including the semicolon
    span: Range<usize>,
    /// The imported path or URL as written
    target: String,
    /// 1-indexed line of the statement
    line: usize,
}

impl BuiltinCompiler {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    fn expand(
        &self,
        file: &Path,
        stack: &mut Vec<PathBuf>,
        hoisted: &mut Vec<String>,
    ) -> Result<String, CompileError> {
        let key = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
        if stack.contains(&key) {
            return Err(CompileError::new(
                CompileErrorKind::CircularImport,
                file,
                "file imports itself through an @import chain",
            ));
        }

        let content = fs::read_to_string(file)
            .map_err(|e| CompileError::new(CompileErrorKind::Read, file, e.to_string()))?;
        let imports = find_imports(&content);
        let blanked = blank_imports(&content, &imports);

        let masked = mask_literals(&blanked);
        if let Some((offset, construct)) = find_less_construct(&masked) {
            let (line, column) = line_column(&masked, offset);
            let message = format!("{} needs the lessc compiler", construct);
            return Err(CompileError::new(CompileErrorKind::Syntax, file, message).at(line, column));
        }

        css::check_syntax(&file.display().to_string(), &blanked).map_err(|issue| {
            let error = CompileError::new(CompileErrorKind::Syntax, file, issue.message);
            match issue.location {
                Some((line, column)) => error.at(line, column),
                None => error,
            }
        })?;

        stack.push(key);
        let base_dir = file.parent().unwrap_or_else(|| Path::new("."));
        let mut output = String::with_capacity(content.len());
        let mut last = 0;

        for import in &imports {
            output.push_str(&content[last..import.span.start]);
            if is_remote(&import.target) {
                let statement = content[import.span.clone()].trim().to_string();
                if !hoisted.contains(&statement) {
                    hoisted.push(statement);
                }
            } else {
                let resolved = self.resolve(base_dir, &import.target).ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::UnresolvedImport,
                        file,
                        format!("'{}' wasn't found", import.target),
                    )
                    .at_line(import.line)
                })?;
                output.push_str(&self.expand(&resolved, stack, hoisted)?);
                output.push('\n');
            }
            last = import.span.end;
        }
        output.push_str(&content[last..]);

        stack.pop();
        Ok(output)
    }

    /// Find an import target, trying the name as written, then `.less`, then `.css`.
    fn resolve(&self, base_dir: &Path, target: &str) -> Option<PathBuf> {
        std::iter::once(base_dir)
            .chain(self.include_paths.iter().map(PathBuf::as_path))
            .flat_map(|dir| candidates(&dir.join(target)))
            .find(|path| path.is_file())
    }
}

impl StyleCompiler for BuiltinCompiler {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn compile(&self, source: &Path) -> Result<String, CompileError> {
        let mut stack = Vec::new();
        let mut hoisted = Vec::new();
        let body = self.expand(source, &mut stack, &mut hoisted)?;
        if hoisted.is_empty() {
            return Ok(body);
        }

        let (charset, rest) = split_charset(&body);
        let mut output = String::with_capacity(body.len() + hoisted.len() * 64);
        if !charset.is_empty() {
            output.push_str(charset.trim());
            output.push('\n');
        }
        for statement in &hoisted {
            output.push_str(statement);
            output.push('\n');
        }
        output.push_str(rest);
        Ok(output)
    }
}

/// Split a leading `@charset` statement off `css`.
fn split_charset(css: &str) -> (&str, &str) {
    let trimmed = css.trim_start();
    if trimmed.starts_with("@charset") {
        if let Some(end) = trimmed.find(';') {
            return css.split_at(css.len() - trimmed.len() + end + 1);
        }
    }
    ("", css)
}

/// At-rules whose name may be followed directly by a colon in plain CSS
const COLON_AT_RULES: &[&str] = &["page"];

/// Replace comments, strings and `url(...)` bodies with spaces, keeping byte
/// offsets and newlines.
fn mask_literals(css: &str) -> String {
    let blank = |out: &mut String, c: char| {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    };

    let mut out = String::with_capacity(css.len());
    let mut chars = css.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '/' if css[i..].starts_with("/*") => {
                blank(&mut out, c);
                let mut prev = ' ';
                for (_, c) in chars.by_ref() {
                    blank(&mut out, c);
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '"' | '\'' => {
                out.push(c);
                let mut escaped = false;
                for (_, inner) in chars.by_ref() {
                    if !escaped && inner == c {
                        out.push(inner);
                        break;
                    }
                    escaped = !escaped && inner == '\\';
                    blank(&mut out, inner);
                }
            }
            '(' if follows_url(css, i) => {
                out.push(c);
                while let Some(&(_, inner)) = chars.peek() {
                    if inner == ')' {
                        break;
                    }
                    blank(&mut out, inner);
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn follows_url(css: &str, paren: usize) -> bool {
    css.get(paren.saturating_sub(3)..paren).is_some_and(|name| name.eq_ignore_ascii_case("url"))
}

/// Find the first LESS-only construct in masked source: variable definitions,
/// variable references, interpolation, or rules nested in rules.
fn find_less_construct(masked: &str) -> Option<(usize, String)> {
    if let Some(offset) = masked.find("@{") {
        return Some((offset, "LESS interpolation".to_string()));
    }

    // true for style-rule blocks, false for at-rule blocks
    let mut blocks: Vec<bool> = Vec::new();
    let mut start = 0;

    for (i, c) in masked.char_indices() {
        match c {
            '{' => {
                let prelude = &masked[start..i];
                let lead = prelude.len() - prelude.trim_start().len();
                let is_style = !prelude.trim_start().starts_with('@');
                if is_style && blocks.last() == Some(&true) {
                    return Some((start + lead, "nested rule".to_string()));
                }
                if !is_style {
                    if let Some(found) = check_statement(masked, start, i) {
                        return Some(found);
                    }
                }
                blocks.push(is_style);
                start = i + 1;
            }
            ';' | '}' => {
                if let Some(found) = check_statement(masked, start, i) {
                    return Some(found);
                }
                if c == '}' {
                    blocks.pop();
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    check_statement(masked, start, masked.len())
}

/// Look for a variable definition or reference in `masked[start..end]`.
fn check_statement(masked: &str, start: usize, end: usize) -> Option<(usize, String)> {
    let statement = &masked[start..end];
    let trimmed = statement.trim_start();
    let offset = start + statement.len() - trimmed.len();

    // Part of the statement where an `@name` can only be a LESS variable
    let values = if let Some(rest) = trimmed.strip_prefix('@') {
        let name_len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        let name = &rest[..name_len];
        let after = &rest[name_len..];
        if after.trim_start().starts_with(':')
            && !name.is_empty()
            && !COLON_AT_RULES.contains(&name.to_ascii_lowercase().as_str())
        {
            return Some((offset, format!("LESS variable definition '@{}'", name)));
        }
        (offset + 1 + name_len, after)
    } else {
        match trimmed.find(':') {
            Some(colon) => (offset + colon + 1, &trimmed[colon + 1..]),
            None => return None,
        }
    };

    let (base, text) = values;
    text.match_indices('@').find_map(|(i, _)| {
        let rest = &text[i + 1..];
        let next = rest.chars().next()?;
        (next.is_ascii_alphabetic() || next == '_' || next == '-').then(|| {
            let name: String = rest.chars().take_while(|&c| is_ident_char(c)).collect();
            (base + i, format!("LESS variable reference '@{}'", name))
        })
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// 1-indexed line and column of a byte offset.
fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = offset - before.rfind('\n').map_or(0, |n| n + 1) + 1;
    (line, column)
}

fn candidates(path: &Path) -> [PathBuf; 3] {
    let with_suffix = |suffix: &str| {
        let mut name = OsString::from(path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    };
    [path.to_path_buf(), with_suffix(".less"), with_suffix(".css")]
}

fn is_remote(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("//")
}

fn import_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // @import (options) url("x") media;  /  @import "x";  /  @import 'x' screen;
        Regex::new(concat!(
            r#"(?m)^[ \t]*@import[ \t]+(?:\([^)]*\)[ \t]*)?"#,
            r#"(?:url\([ \t]*)?["']?([^"')\s;]+)["']?[ \t]*\)?[^;\n]*;"#,
        ))
        .expect("import pattern is valid")
    })
}

fn find_imports(content: &str) -> Vec<ImportStatement> {
    import_pattern()
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps.get(1)?.as_str().to_string();
            let line = content[..whole.start()].matches('\n').count() + 1;
            Some(ImportStatement { span: whole.range(), target, line })
        })
        .collect()
}

/// Replace import statements with spaces so line and column numbers survive.
fn blank_imports(content: &str, imports: &[ImportStatement]) -> String {
    let mut blanked = String::with_capacity(content.len());
    let mut last = 0;
    for import in imports {
        blanked.push_str(&content[last..import.span.start]);
        blanked.extend(
            content[import.span.clone()].chars().map(|c| if c == '\n' { '\n' } else { ' ' }),
        );
        last = import.span.end;
    }
    blanked.push_str(&content[last..]);
    blanked
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_find_imports_forms() {
        let content = concat!(
            "@import \"modules/nav.less\";\n",
            "@import 'helpers/mixins';\n",
            "@import url(base.css) screen;\n",
            "@import (reference) \"theme\";\n",
            ".a { color: red; }\n",
        );
        let imports = find_imports(content);
        let targets: Vec<&str> = imports.iter().map(|i| i.target.as_str()).collect();
        assert_eq!(targets, vec!["modules/nav.less", "helpers/mixins", "base.css", "theme"]);
        let lines: Vec<usize> = imports.iter().map(|i| i.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_blank_imports_preserves_length() {
        let content = "@import \"a\";\n.b { color: blue; }\n";
        let blanked = blank_imports(content, &find_imports(content));
        assert_eq!(blanked.len(), content.len());
        assert!(blanked.starts_with(&format!("{}\n.b", " ".repeat(12))));
    }

    #[test]
    fn test_compile_plain_css() {
        let temp = TempDir::new().unwrap();
        let source = write(temp.path(), "a.less", ".box { display: flex; color: red; }\n");

        let css = BuiltinCompiler::default().compile(&source).unwrap();
        assert!(css.contains(".box"));
        assert!(css.contains("display: flex"));
    }

    #[test]
    fn test_compile_inlines_partials() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "modules/nav.less", "nav { margin: 0; }\n");
        write(temp.path(), "helpers/reset.css", "* { box-sizing: border-box; }\n");
        let source = write(
            temp.path(),
            "site.less",
            "@import \"modules/nav\";\n@import 'helpers/reset';\nbody { color: black; }\n",
        );

        let css = BuiltinCompiler::default().compile(&source).unwrap();
        assert!(!css.contains("@import"));
        let nav = css.find("nav {").unwrap();
        let reset = css.find("box-sizing").unwrap();
        let body = css.find("body {").unwrap();
        assert!(nav < reset && reset < body);
    }

    #[test]
    fn test_compile_uses_include_paths() {
        let temp = TempDir::new().unwrap();
        let vendor = temp.path().join("vendor");
        write(&vendor, "grid.less", ".row { display: flex; }\n");
        let source = write(temp.path(), "src/site.less", "@import \"grid\";\n");

        let css = BuiltinCompiler::new(vec![vendor]).compile(&source).unwrap();
        assert!(css.contains(".row"));
    }

    #[test]
    fn test_compile_keeps_remote_imports() {
        let temp = TempDir::new().unwrap();
        let source = write(
            temp.path(),
            "fonts.less",
            "@import url(\"https://fonts.example.com/css?family=Sans\");\n",
        );

        let css = BuiltinCompiler::default().compile(&source).unwrap();
        assert!(css.contains("@import url(\"https://fonts.example.com/css?family=Sans\");"));
    }

    #[test]
    fn test_unresolved_import() {
        let temp = TempDir::new().unwrap();
        let source =
            write(temp.path(), "site.less", ".a { color: red; }\n@import \"modules/missing\";\n");

        let error = BuiltinCompiler::default().compile(&source).unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::UnresolvedImport);
        assert_eq!(error.file, source);
        assert_eq!(error.line, Some(2));
        assert!(error.message.contains("modules/missing"));
    }

    #[test]
    fn test_syntax_error_reported_against_partial() {
        let temp = TempDir::new().unwrap();
        let partial = write(temp.path(), "modules/broken.less", "\n\n..oops { color: red; }\n");
        let source = write(temp.path(), "site.less", "@import \"modules/broken\";\n");

        let error = BuiltinCompiler::default().compile(&source).unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::Syntax);
        assert_eq!(error.file, partial);
        assert_eq!(error.line, Some(3));
    }

    #[test]
    fn test_circular_import() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.less", "@import \"b\";\n");
        write(temp.path(), "b.less", "@import \"a\";\n");

        let error = BuiltinCompiler::default().compile(&temp.path().join("a.less")).unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::CircularImport);
    }

    #[test]
    fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let error = BuiltinCompiler::default().compile(&temp.path().join("nope.less")).unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::Read);
    }

    #[test]
    fn test_remote_imports_hoisted_above_inlined_rules() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "modules/base.less", "body { margin: 0; }\n");
        let source = write(
            temp.path(),
            "site.less",
            concat!(
                "@charset \"utf-8\";\n",
                "@import \"modules/base\";\n",
                "@import url(\"https://fonts.example.com/css?family=Sans\");\n",
                ".a { color: red; }\n",
            ),
        );

        let css = BuiltinCompiler::default().compile(&source).unwrap();
        assert!(css.starts_with("@charset \"utf-8\";\n@import url(\"https://fonts.example.com/"));
        assert_eq!(css.matches("@import").count(), 1);
        assert!(css.find("@import").unwrap() < css.find("body").unwrap());
        assert!(crate::css::minify("site.css", &css).is_ok());
    }

    #[test]
    fn test_less_variables_rejected() {
        let temp = TempDir::new().unwrap();
        let source =
            write(temp.path(), "a.less", "/* brand */\n@brand: red;\n.a { color: @brand; }\n");

        let error = BuiltinCompiler::default().compile(&source).unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::Syntax);
        assert_eq!((error.line, error.column), (Some(2), Some(1)));
        assert!(error.message.contains("@brand"), "{}", error.message);
        assert!(error.message.contains("lessc"));
    }

    #[test]
    fn test_less_variable_reference_rejected() {
        let temp = TempDir::new().unwrap();
        let content = ".a {\n  margin: 0;\n  color: darken(@brand, 10%);\n}\n";
        let source = write(temp.path(), "a.less", content);

        let error = BuiltinCompiler::default().compile(&source).unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::Syntax);
        assert_eq!(error.line, Some(3));
        assert!(error.message.contains("reference '@brand'"), "{}", error.message);
    }

    #[test]
    fn test_nested_rules_rejected() {
        let temp = TempDir::new().unwrap();
        let source = write(temp.path(), "a.less", ".a {\n  color: red;\n  .b { margin: 0; }\n}\n");

        let error = BuiltinCompiler::default().compile(&source).unwrap_err();
        assert_eq!(error.kind, CompileErrorKind::Syntax);
        assert_eq!(error.line, Some(3));
        assert!(error.message.contains("nested rule"));
    }

    #[test]
    fn test_plain_css_at_rules_accepted() {
        let temp = TempDir::new().unwrap();
        let source = write(
            temp.path(),
            "a.less",
            concat!(
                "@page :first { margin: 1in; }\n",
                "@media screen and (min-width: 600px) { .a { color: red; } }\n",
                "@keyframes spin { from { opacity: 0; } to { opacity: 1; } }\n",
                ".icon { background: url(img/icon@2x.png); content: \"@me\"; }\n",
                "/* @brand: red; */\n",
            ),
        );

        assert!(BuiltinCompiler::default().compile(&source).is_ok());
    }

    #[test]
    fn test_non_ascii_selectors_accepted() {
        let temp = TempDir::new().unwrap();
        let content = ".café:hover { margin: 0; }\n.é { font-family: Café, sans-serif; }\n";
        let source = write(temp.path(), "a.less", content);
        assert!(BuiltinCompiler::default().compile(&source).is_ok());
    }

    #[test]
    fn test_mask_literals_keeps_offsets() {
        let css = "a { content: \"é@x\"; }\n/* @y: 1; */ b { background: URL(a@b.png) }";
        let masked = mask_literals(css);
        assert_eq!(masked.len(), css.len());
        assert!(!masked.contains('@'));
        assert_eq!(masked.matches('\n').count(), 1);
    }
}
