//! Token-level scanning of command source files.
//!
//! The scanner never compiles or evaluates a file. It strips comments and
//! literals, tracks `mod name { ... }` blocks, and reports every `struct`,
//! `enum` and `union` declaration qualified by the modules enclosing it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Punct(char),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.src[self.pos..].starts_with(pat)
    }

    fn skip_while<F: Fn(char) -> bool>(&mut self, pred: F) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.bump();
        }
    }

    fn skip_line(&mut self) {
        self.skip_while(|c| c != '\n');
    }

    fn skip_block_comment(&mut self) {
        // Rust block comments nest
        let mut depth = 0usize;
        while self.peek().is_some() {
            if self.starts_with("/*") {
                self.pos += 2;
                depth += 1;
            } else if self.starts_with("*/") {
                self.pos += 2;
                depth -= 1;
                if depth == 0 {
                    return;
                }
            } else {
                self.bump();
            }
        }
    }

    /// Skip past the closing `quote`, honouring backslash escapes
    fn skip_quoted(&mut self, quote: char) {
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == quote {
                return;
            }
        }
    }

    /// Skip a raw string body terminated by `"` and `hashes` pound signs
    fn skip_raw_string(&mut self, hashes: usize) {
        let terminator = format!("\"{}", "#".repeat(hashes));
        match self.src[self.pos..].find(&terminator) {
            Some(offset) => self.pos += offset + terminator.len(),
            None => self.pos = self.src.len(),
        }
    }

    /// Either a char literal (`'a'`, `'\n'`) or a lifetime (`'a`)
    fn skip_char_or_lifetime(&mut self) {
        self.bump();
        match self.peek() {
            Some('\\') => self.skip_quoted('\''),
            Some(_) => {
                let c = self.bump().unwrap_or_default();
                if self.peek() == Some('\'') {
                    self.bump();
                } else if is_ident_continue(c) {
                    self.skip_while(is_ident_continue);
                }
            }
            None => {}
        }
    }

    fn count_hashes(&self) -> usize {
        self.src[self.pos..].chars().take_while(|c| *c == '#').count()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            let c = self.peek()?;

            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if self.starts_with("//") {
                self.skip_line();
                continue;
            }
            if self.starts_with("/*") {
                self.skip_block_comment();
                continue;
            }
            if c == '"' {
                self.bump();
                self.skip_quoted('"');
                continue;
            }
            if c == '\'' {
                self.skip_char_or_lifetime();
                continue;
            }
            if c.is_ascii_digit() {
                self.skip_while(is_ident_continue);
                continue;
            }

            if is_ident_start(c) {
                let src = self.src;
                let start = self.pos;
                self.skip_while(is_ident_continue);
                let ident = &src[start..self.pos];

                match (ident, self.peek()) {
                    ("b" | "c", Some('"')) => {
                        self.bump();
                        self.skip_quoted('"');
                        continue;
                    }
                    ("b", Some('\'')) => {
                        self.bump();
                        self.skip_quoted('\'');
                        continue;
                    }
                    ("r" | "br" | "cr", Some('"' | '#')) => {
                        let hashes = self.count_hashes();
                        if self.peek_nth(hashes) == Some('"') {
                            self.pos += hashes + 1;
                            self.skip_raw_string(hashes);
                            continue;
                        }
                        if ident == "r"
                            && hashes == 1
                            && self.peek_nth(1).map(is_ident_start).unwrap_or(false)
                        {
                            self.pos += 1;
                            self.skip_while(is_ident_continue);
                            return Some(Token::Ident(&src[start..self.pos]));
                        }
                    }
                    _ => {}
                }

                return Some(Token::Ident(ident));
            }

            self.bump();
            return Some(Token::Punct(c));
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn strip_raw(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

/// Qualified names of every type declared in `source`, in declaration order
pub fn declared_types(source: &str) -> Vec<String> {
    let tokens: Vec<Token<'_>> = Lexer::new(source).collect();

    let mut found = Vec::new();
    // (module name, brace depth inside its block)
    let mut modules: Vec<(&str, usize)> = Vec::new();
    let mut pending_module: Option<&str> = None;
    let mut depth = 0usize;

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            Token::Punct('{') => {
                depth += 1;
                if let Some(name) = pending_module.take() {
                    modules.push((name, depth));
                }
            }
            Token::Punct('}') => {
                if modules.last().map(|(_, d)| *d == depth).unwrap_or(false) {
                    modules.pop();
                }
                depth = depth.saturating_sub(1);
            }
            Token::Punct(';') => pending_module = None,
            Token::Ident("mod") => {
                if let Some(Token::Ident(name)) = tokens.get(i + 1) {
                    pending_module = Some(strip_raw(name));
                    i += 1;
                }
            }
            Token::Ident(keyword @ ("struct" | "enum" | "union")) => {
                if let Some(Token::Ident(name)) = tokens.get(i + 1) {
                    // `union` is only a keyword in declaration position
                    let is_declaration = keyword != "union"
                        || matches!(tokens.get(i + 2), Some(Token::Punct('{' | '<')));
                    if is_declaration {
                        found.push(qualify(&modules, strip_raw(name)));
                        i += 1;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    found
}

fn qualify(modules: &[(&str, usize)], name: &str) -> String {
    let mut qualified = String::new();
    for (module, _) in modules {
        qualified.push_str(module);
        qualified.push_str("::");
    }
    qualified.push_str(name);
    qualified
}
