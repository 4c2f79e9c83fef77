use crate::{
    ast::{NodeId, NodeKind, Tree},
    error::{ParseError, ParseErrorKind},
};

type ParseResult<T> = Result<T, ParseError>;

/// Which tokenizer handles non-bracket characters, selected by the variant of
/// the current insertion node.
enum ScanContext {
    Root,
    Choices,
    Block,
}

fn scan_context(kind: &NodeKind) -> ScanContext {
    match kind {
        NodeKind::Root { .. } => ScanContext::Root,
        NodeKind::Choices => ScanContext::Choices,
        NodeKind::Section { .. }
        | NodeKind::If { .. }
        | NodeKind::Else { .. }
        | NodeKind::Navigate { .. }
        | NodeKind::Show { .. }
        | NodeKind::Choice { .. }
        | NodeKind::Heading1
        | NodeKind::Heading2
        | NodeKind::Bold
        | NodeKind::Emphasis => ScanContext::Block,
        NodeKind::Text { .. }
        | NodeKind::LineBreak
        | NodeKind::Include { .. }
        | NodeKind::Print { .. }
        | NodeKind::Image { .. }
        | NodeKind::Input { .. } => {
            unreachable!("the insertion cursor never points at a terminal node")
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
    tree: Tree,
    /// The node currently receiving newly parsed children.
    cursor: NodeId,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            input,
            pos: 0,
            line: 1,
            line_start_pos: 0,
            tree: Tree::new(),
            cursor: Tree::ROOT,
        }
    }

    #[inline]
    fn current_column(&self) -> usize {
        self.pos - self.line_start_pos + 1
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            offset: self.pos,
            line: self.line,
            column: self.current_column(),
            kind,
        }
    }

    /// Advances the parser position by char_len bytes, correctly handling
    /// multi-byte characters. Updates line tracking on newlines.
    #[inline]
    fn advance_by_char(&mut self, current_char: char, char_len: usize) {
        if current_char == '\n' {
            self.line += 1;
            self.line_start_pos = self.pos + char_len;
        }
        self.pos += char_len;
    }

    /// Advances the parser position by `len` bytes. Only for fixed ASCII
    /// delimiters that cannot contain newlines.
    #[inline]
    fn advance_bytes_no_newline(&mut self, len: usize) {
        self.pos += len;
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap()
    }

    /// Peek if the remaining input starts with `s`
    fn peek(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    /// Consume `s` if the remaining input starts with it.
    /// Assumes `s` does not contain newlines.
    fn consume(&mut self, s: &str) -> bool {
        if self.peek(s) {
            self.advance_bytes_no_newline(s.len());
            true
        } else {
            false
        }
    }

    /// Consume leading whitespace including newlines.
    fn consume_whitespace(&mut self) {
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() {
                self.advance_by_char(c, c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// Consume spaces and tabs, but never newlines. Used between a directive
    /// keyword and its opening parenthesis.
    fn skip_inline_spaces(&mut self) {
        while !self.eof() {
            let c = self.current_char();
            if c == ' ' || c == '\t' {
                self.advance_bytes_no_newline(c.len_utf8());
            } else {
                break;
            }
        }
    }

    /// The word following a backslash, for error reporting. Does not advance.
    fn peek_command_word(&self) -> String {
        self.input[self.pos..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect()
    }

    // --- Bracket rule (uniform across contexts) ---

    /// `{` descends into the most recently added child of the insertion node.
    fn open_block(&mut self) -> ParseResult<()> {
        let last = self.tree.node(self.cursor).children.last().copied();
        let Some(last) = last else {
            return Err(self.make_error(ParseErrorKind::BlockOpenWithoutCommand));
        };
        if !self.tree.node(last).kind.is_container() {
            return Err(self.make_error(ParseErrorKind::BlockOpenAfterTerminal));
        }
        self.cursor = last;
        self.advance_bytes_no_newline(1);
        Ok(())
    }

    /// `}` ascends to the insertion node's parent.
    fn close_block(&mut self) -> ParseResult<()> {
        if self.cursor == Tree::ROOT {
            return Err(self.make_error(ParseErrorKind::UnbalancedClose));
        }
        self.cursor = self.tree.node(self.cursor).parent.unwrap_or(Tree::ROOT);
        self.advance_bytes_no_newline(1);
        Ok(())
    }

    // --- Directive plumbing ---

    /// Captures the raw body of a `(...)` directive. The body may not span
    /// lines and may not itself contain `)` (conditions and assignments are
    /// passed through verbatim up to the first closing parenthesis).
    fn directive_body(&mut self, directive: &str) -> ParseResult<String> {
        self.skip_inline_spaces();
        if !self.consume("(") {
            return Err(self.make_error(ParseErrorKind::MalformedDirective {
                directive: directive.to_string(),
                expected: "'('".to_string(),
            }));
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c == ')' {
                let body = self.input[start..self.pos].to_string();
                self.advance_bytes_no_newline(1);
                return Ok(body);
            }
            if c == '\n' {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: directive.to_string(),
                    expected: "')' before end of line".to_string(),
                }));
            }
            self.advance_by_char(c, c.len_utf8());
        }
        Err(self.make_error(ParseErrorKind::MalformedDirective {
            directive: directive.to_string(),
            expected: "')'".to_string(),
        }))
    }

    fn directive_args(&mut self, directive: &str) -> ParseResult<Vec<String>> {
        let body = self.directive_body(directive)?;
        Ok(split_args(&body))
    }

    fn parse_preserve(&self, directive: &str, raw: &str) -> ParseResult<bool> {
        match raw {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.make_error(ParseErrorKind::MalformedDirective {
                directive: directive.to_string(),
                expected: format!("'true' or 'false' preserve flag, found '{}'", raw),
            })),
        }
    }

    /// Captures a `\script{...}` / `\style{...}` body verbatim using a
    /// brace-depth counter. The captured substring is everything between the
    /// first `{` and its matching `}`, exclusive; it is never tokenized and
    /// the directive opens no insertion context.
    fn raw_block(&mut self, directive: &str) -> ParseResult<String> {
        self.consume_whitespace();
        if !self.consume("{") {
            return Err(self.make_error(ParseErrorKind::MalformedDirective {
                directive: directive.to_string(),
                expected: "'{'".to_string(),
            }));
        }
        let start = self.pos;
        let mut depth: usize = 1;
        while !self.eof() {
            let c = self.current_char();
            if c == '{' {
                depth += 1;
            } else if c == '}' {
                depth -= 1;
                if depth == 0 {
                    let body = self.input[start..self.pos].to_string();
                    self.advance_bytes_no_newline(1);
                    return Ok(body);
                }
            }
            self.advance_by_char(c, c.len_utf8());
        }
        Err(self.make_error(ParseErrorKind::UnterminatedRawBlock {
            directive: directive.to_string(),
        }))
    }

    /// Hoists a raw script or style body to the nearest enclosing Section
    /// (or Root).
    fn hoist_raw(&mut self, directive: &str) -> ParseResult<()> {
        let body = self.raw_block(directive)?;
        let target = self.tree.hoist_target(self.cursor);
        match &mut self.tree.node_mut(target).kind {
            NodeKind::Root {
                scripts, styles, ..
            }
            | NodeKind::Section {
                scripts, styles, ..
            } => {
                if directive == "script" {
                    scripts.push(body);
                } else {
                    styles.push(body);
                }
            }
            _ => unreachable!("hoist target is always Root or Section"),
        }
        Ok(())
    }

    /// Resolves the conditional scope of a `\set` assignment: walks up through
    /// enclosing If/Else blocks to the nearest Section (or Root), and guards
    /// the assignment with the conjunction of their conditions.
    fn apply_set(&mut self, assignment: &str) {
        let mut guards: Vec<String> = Vec::new();
        let mut node = self.cursor;
        let target = loop {
            match &self.tree.node(node).kind {
                NodeKind::Root { .. } | NodeKind::Section { .. } => break node,
                NodeKind::If { condition, .. } => guards.push(condition.clone()),
                NodeKind::Else { matched_if } => {
                    let matched = *matched_if;
                    if let NodeKind::If { condition, .. } = &self.tree.node(matched).kind {
                        guards.push(format!("!({})", condition));
                    }
                }
                _ => {}
            }
            node = self.tree.node(node).parent.unwrap_or(Tree::ROOT);
        };
        // Collected innermost-first on the way up; the emitted conjunction
        // reads outer-to-inner.
        guards.reverse();
        let statement = if guards.is_empty() {
            format!("{};", assignment)
        } else {
            format!("if ({}) {};", guards.join(" && "), assignment)
        };
        match &mut self.tree.node_mut(target).kind {
            NodeKind::Root { variables, .. } | NodeKind::Section { variables, .. } => {
                variables.push(statement);
            }
            _ => unreachable!("hoist target is always Root or Section"),
        }
    }

    /// `\else` matches the nearest preceding sibling that is an unmatched If,
    /// scanning existing children in reverse. Both sides of the If/Else link
    /// are established here, atomically.
    fn apply_else(&mut self) -> ParseResult<()> {
        let mut matched = None;
        for &child in self.tree.node(self.cursor).children.iter().rev() {
            match &self.tree.node(child).kind {
                NodeKind::If { else_branch, .. } => {
                    if else_branch.is_some() {
                        return Err(self.make_error(ParseErrorKind::DoubleElse));
                    }
                    matched = Some(child);
                    break;
                }
                NodeKind::Else { .. } => {
                    return Err(self.make_error(ParseErrorKind::DoubleElse));
                }
                _ => {}
            }
        }
        let Some(if_id) = matched else {
            return Err(self.make_error(ParseErrorKind::OrphanElse));
        };
        let else_id = self.tree.append(self.cursor, NodeKind::Else { matched_if: if_id });
        match &mut self.tree.node_mut(if_id).kind {
            NodeKind::If { else_branch, .. } => *else_branch = Some(else_id),
            _ => unreachable!("matched node is an If"),
        }
        Ok(())
    }

    // --- Root context ---

    fn scan_root(&mut self) -> ParseResult<()> {
        self.consume_whitespace();
        if self.eof() {
            return Ok(());
        }
        let c = self.current_char();
        if c == '{' || c == '}' {
            // Handled by the bracket rule.
            return Ok(());
        }
        if c != '\\' {
            return Err(self.make_error(ParseErrorKind::UnexpectedCharacter { found: c }));
        }
        self.advance_bytes_no_newline(1);

        if self.consume("section") {
            let mut args = self.directive_args("section")?;
            if args.is_empty() || args[0].is_empty() {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "section".to_string(),
                    expected: "a section name".to_string(),
                }));
            }
            let name = args.remove(0);
            self.tree.append(
                self.cursor,
                NodeKind::Section {
                    name,
                    params: args,
                    variables: Vec::new(),
                    scripts: Vec::new(),
                    styles: Vec::new(),
                },
            );
            self.consume_whitespace();
            Ok(())
        } else if self.consume("title") {
            let body = self.directive_body("title")?;
            match &mut self.tree.node_mut(Tree::ROOT).kind {
                // Last \title directive wins.
                NodeKind::Root { title, .. } => *title = Some(body.trim().to_string()),
                _ => unreachable!("root node is always Root"),
            }
            Ok(())
        } else if self.consume("script") {
            self.hoist_raw("script")
        } else if self.consume("style") {
            self.hoist_raw("style")
        } else if self.consume("set") {
            // Root-scope assignments are unconditional; there are no
            // enclosing conditionals to resolve against.
            let body = self.directive_body("set")?;
            self.apply_set(body.trim());
            Ok(())
        } else {
            Err(self.make_error(ParseErrorKind::UnknownCommand {
                command: self.peek_command_word(),
            }))
        }
    }

    // --- Block context ---

    fn scan_block(&mut self) -> ParseResult<()> {
        if self.peek("\n\n") {
            self.tree.append(self.cursor, NodeKind::LineBreak);
            self.advance_by_char('\n', 1);
            self.advance_by_char('\n', 1);
            return Ok(());
        }
        if self.current_char() == '\\' {
            return self.block_command();
        }
        self.scan_text()
    }

    fn block_command(&mut self) -> ParseResult<()> {
        self.advance_bytes_no_newline(1);

        // Container commands consume their trailing whitespace so the scan
        // resumes at the following `{`, which the bracket rule then descends
        // through.
        if self.consume("choices") {
            self.tree.append(self.cursor, NodeKind::Choices);
            self.consume_whitespace();
            Ok(())
        } else if self.consume("h1") {
            self.tree.append(self.cursor, NodeKind::Heading1);
            self.consume_whitespace();
            Ok(())
        } else if self.consume("h2") {
            self.tree.append(self.cursor, NodeKind::Heading2);
            self.consume_whitespace();
            Ok(())
        } else if self.consume("bf") {
            self.tree.append(self.cursor, NodeKind::Bold);
            self.consume_whitespace();
            Ok(())
        } else if self.consume("em") {
            self.tree.append(self.cursor, NodeKind::Emphasis);
            self.consume_whitespace();
            Ok(())
        } else if self.consume("script") {
            self.hoist_raw("script")
        } else if self.consume("style") {
            self.hoist_raw("style")
        } else if self.consume("set") {
            let body = self.directive_body("set")?;
            self.apply_set(body.trim());
            Ok(())
        } else if self.consume("print") {
            let body = self.directive_body("print")?;
            let expr = body.trim().to_string();
            if expr.is_empty() {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "print".to_string(),
                    expected: "an expression".to_string(),
                }));
            }
            self.tree.append(self.cursor, NodeKind::Print { expr });
            Ok(())
        } else if self.consume("include") {
            let mut args = self.directive_args("include")?;
            if args.is_empty() || args[0].is_empty() {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "include".to_string(),
                    expected: "a target section name".to_string(),
                }));
            }
            let target = args.remove(0);
            self.tree.append(self.cursor, NodeKind::Include { target, args });
            Ok(())
        } else if self.consume("input") {
            let mut args = self.directive_args("input")?;
            if args.len() < 2 {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "input".to_string(),
                    expected: "an input type and a variable name".to_string(),
                }));
            }
            let kind = args.remove(0);
            let binding = args.remove(0);
            let placeholder = if args.is_empty() {
                None
            } else {
                Some(args.remove(0))
            };
            self.tree.append(
                self.cursor,
                NodeKind::Input {
                    kind,
                    binding,
                    placeholder,
                },
            );
            Ok(())
        } else if self.consume("image") {
            let mut args = self.directive_args("image")?.into_iter();
            let (Some(url), Some(height), Some(width), Some(alt), None) = (
                args.next(),
                args.next(),
                args.next(),
                args.next(),
                args.next(),
            ) else {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "image".to_string(),
                    expected: "four arguments (url, height, width, alt)".to_string(),
                }));
            };
            self.tree.append(
                self.cursor,
                NodeKind::Image {
                    url,
                    height,
                    width,
                    alt,
                },
            );
            Ok(())
        } else if self.consume("nav") {
            let mut args = self.directive_args("nav")?;
            if args.is_empty() || args[0].is_empty() {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "nav".to_string(),
                    expected: "a target section name".to_string(),
                }));
            }
            let target = args.remove(0);
            self.tree.append(self.cursor, NodeKind::Navigate { target, args });
            self.consume_whitespace();
            Ok(())
        } else if self.consume("show") {
            let mut args = self.directive_args("show")?;
            if args.len() < 2 {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "show".to_string(),
                    expected: "a target and a preserve flag".to_string(),
                }));
            }
            let target = args.remove(0);
            let preserve = self.parse_preserve("show", &args.remove(0))?;
            self.tree.append(
                self.cursor,
                NodeKind::Show {
                    target,
                    args,
                    preserve,
                },
            );
            self.consume_whitespace();
            Ok(())
        } else if self.consume("if") {
            let condition = self.directive_body("if")?.trim().to_string();
            if condition.is_empty() {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "if".to_string(),
                    expected: "a condition".to_string(),
                }));
            }
            self.tree.append(
                self.cursor,
                NodeKind::If {
                    condition,
                    else_branch: None,
                },
            );
            self.consume_whitespace();
            Ok(())
        } else if self.consume("else") {
            self.apply_else()?;
            self.consume_whitespace();
            Ok(())
        } else {
            Err(self.make_error(ParseErrorKind::UnknownCommand {
                command: self.peek_command_word(),
            }))
        }
    }

    /// Captures a run of plain text up to the next double newline, backslash,
    /// or brace. Runs that are entirely whitespace produce no node.
    fn scan_text(&mut self) -> ParseResult<()> {
        let start = self.pos;
        while !self.eof() {
            if self.peek("\n\n") {
                break;
            }
            let c = self.current_char();
            if c == '\\' || c == '{' || c == '}' {
                break;
            }
            self.advance_by_char(c, c.len_utf8());
        }
        let run = &self.input[start..self.pos];
        if !run.trim().is_empty() {
            self.tree.append(
                self.cursor,
                NodeKind::Text {
                    text: run.to_string(),
                },
            );
        }
        Ok(())
    }

    // --- Choices context ---

    fn scan_choices(&mut self) -> ParseResult<()> {
        self.consume_whitespace();
        if self.eof() {
            return Ok(());
        }
        let c = self.current_char();
        if c == '{' || c == '}' {
            return Ok(());
        }
        if c != '\\' {
            return Err(self.make_error(ParseErrorKind::InvalidChoicesContent {
                found: c.to_string(),
            }));
        }
        self.advance_bytes_no_newline(1);
        if self.consume("choice") {
            let mut args = self.directive_args("choice")?;
            if args.len() < 2 {
                return Err(self.make_error(ParseErrorKind::MalformedDirective {
                    directive: "choice".to_string(),
                    expected: "a target and a preserve flag".to_string(),
                }));
            }
            let target = args.remove(0);
            let preserve = self.parse_preserve("choice", &args.remove(0))?;
            self.tree.append(
                self.cursor,
                NodeKind::Choice {
                    target,
                    args,
                    preserve,
                },
            );
            self.consume_whitespace();
            Ok(())
        } else {
            Err(self.make_error(ParseErrorKind::InvalidChoicesContent {
                found: format!("\\{}", self.peek_command_word()),
            }))
        }
    }

    // --- Main loop ---

    fn run(&mut self) -> ParseResult<()> {
        while !self.eof() {
            let c = self.current_char();
            if c == '{' {
                self.open_block()?;
            } else if c == '}' {
                self.close_block()?;
            } else {
                match scan_context(&self.tree.node(self.cursor).kind) {
                    ScanContext::Root => self.scan_root()?,
                    ScanContext::Choices => self.scan_choices()?,
                    ScanContext::Block => self.scan_block()?,
                }
            }
        }
        if self.cursor != Tree::ROOT {
            let mut depth = 0;
            let mut node = self.cursor;
            while let Some(parent) = self.tree.node(node).parent {
                depth += 1;
                node = parent;
            }
            return Err(self.make_error(ParseErrorKind::UnclosedBlock { depth }));
        }
        Ok(())
    }
}

fn split_args(body: &str) -> Vec<String> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    body.split(',').map(|a| a.trim().to_string()).collect()
}

/// Parses the full source text into a completed tree, or fails with the
/// first structural error. Each call builds an independent tree.
pub(crate) fn parse(input: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new(input);
    parser.run()?;
    Ok(parser.tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_children(tree: &Tree) -> Vec<&NodeKind> {
        tree.node(Tree::ROOT)
            .children
            .iter()
            .map(|&c| &tree.node(c).kind)
            .collect()
    }

    /// The single section's node id in a one-section tree.
    fn only_section(tree: &Tree) -> NodeId {
        let children = &tree.node(Tree::ROOT).children;
        assert_eq!(children.len(), 1, "expected exactly one root child");
        children[0]
    }

    fn child_kinds(tree: &Tree, id: NodeId) -> Vec<&NodeKind> {
        tree.node(id)
            .children
            .iter()
            .map(|&c| &tree.node(c).kind)
            .collect()
    }

    fn section_variables(tree: &Tree, id: NodeId) -> &[String] {
        match &tree.node(id).kind {
            NodeKind::Section { variables, .. } => variables,
            other => panic!("expected a Section, got {:?}", other),
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_input() {
        let tree = parse("").unwrap();
        assert!(tree.node(Tree::ROOT).children.is_empty());
        assert_eq!(tree.title(), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_whitespace_only_input() {
        let tree = parse("  \n\n\t  \n").unwrap();
        assert!(tree.node(Tree::ROOT).children.is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_section_with_text() {
        let tree = parse("\\section(intro) {Hello}").unwrap();
        let section = only_section(&tree);
        match &tree.node(section).kind {
            NodeKind::Section { name, params, .. } => {
                assert_eq!(name, "intro");
                assert!(params.is_empty());
            }
            other => panic!("expected Section, got {:?}", other),
        }
        assert_eq!(
            child_kinds(&tree, section),
            vec![&NodeKind::Text {
                text: "Hello".to_string()
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_section_parameters() {
        let tree = parse("\\section(room, light, door) {x}").unwrap();
        let section = only_section(&tree);
        match &tree.node(section).kind {
            NodeKind::Section { name, params, .. } => {
                assert_eq!(name, "room");
                assert_eq!(params, &["light".to_string(), "door".to_string()]);
            }
            other => panic!("expected Section, got {:?}", other),
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_title_last_wins() {
        let tree = parse("\\title(A)\n\\title(B)").unwrap();
        assert_eq!(tree.title(), Some("B"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_root_set_is_unconditional() {
        let tree = parse("\\set(score = 0)").unwrap();
        match &tree.node(Tree::ROOT).kind {
            NodeKind::Root { variables, .. } => {
                assert_eq!(variables, &["score = 0;".to_string()]);
            }
            other => panic!("expected Root, got {:?}", other),
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unexpected_character_at_root() {
        let err = parse("hello").unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
        assert!(matches!(
            err.kind,
            ParseErrorKind::UnexpectedCharacter { found: 'h' }
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unknown_root_directive() {
        let err = parse("\\chapter(one)").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::UnknownCommand { ref command } if command == "chapter")
        );
    }

    // --- Bracket structure ---

    #[test]
    #[ntest::timeout(100)]
    fn test_open_with_no_child() {
        let err = parse("{").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::BlockOpenWithoutCommand));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_close_at_root() {
        let err = parse("}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnbalancedClose));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unclosed_block_at_eof() {
        let err = parse("\\section(a) {text").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnclosedBlock { depth: 1 }));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_extra_close_after_balanced_section() {
        let err = parse("\\section(a) {}}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnbalancedClose));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_open_after_text_is_rejected() {
        let err = parse("\\section(a) {some text {oops}}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::BlockOpenAfterTerminal));
    }

    // --- Block content ---

    #[test]
    #[ntest::timeout(100)]
    fn test_double_newline_becomes_line_break() {
        let tree = parse("\\section(s) {One\n\nTwo}").unwrap();
        let section = only_section(&tree);
        assert_eq!(
            child_kinds(&tree, section),
            vec![
                &NodeKind::Text {
                    text: "One".to_string()
                },
                &NodeKind::LineBreak,
                &NodeKind::Text {
                    text: "Two".to_string()
                },
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_single_newline_stays_in_text() {
        let tree = parse("\\section(s) {One\nTwo}").unwrap();
        let section = only_section(&tree);
        assert_eq!(
            child_kinds(&tree, section),
            vec![&NodeKind::Text {
                text: "One\nTwo".to_string()
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_heading_and_emphasis_nesting() {
        let tree = parse("\\section(s) {\\h1 {A \\em {big} day}}").unwrap();
        let section = only_section(&tree);
        let heading = tree.node(section).children[0];
        assert_eq!(tree.node(heading).kind, NodeKind::Heading1);
        let inner = child_kinds(&tree, heading);
        assert_eq!(inner.len(), 3);
        assert_eq!(
            inner[0],
            &NodeKind::Text {
                text: "A ".to_string()
            }
        );
        assert_eq!(inner[1], &NodeKind::Emphasis);
        assert_eq!(
            inner[2],
            &NodeKind::Text {
                text: " day".to_string()
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_whitespace_only_runs_create_no_text() {
        let tree = parse("\\section(s) {\\h1 {a} \n \\h2 {b}}").unwrap();
        let section = only_section(&tree);
        assert_eq!(
            child_kinds(&tree, section),
            vec![&NodeKind::Heading1, &NodeKind::Heading2]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unknown_block_command() {
        let err = parse("\\section(s) {\\wibble}").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::UnknownCommand { ref command } if command == "wibble")
        );
    }

    // --- If / Else ---

    #[test]
    #[ntest::timeout(100)]
    fn test_if_else_links_both_ways() {
        let tree = parse("\\section(s) {\\if(found) {x} \\else {y}}").unwrap();
        let section = only_section(&tree);
        let children = &tree.node(section).children;
        assert_eq!(children.len(), 2);
        let (if_id, else_id) = (children[0], children[1]);
        match &tree.node(if_id).kind {
            NodeKind::If {
                condition,
                else_branch,
            } => {
                assert_eq!(condition, "found");
                assert_eq!(*else_branch, Some(else_id));
            }
            other => panic!("expected If, got {:?}", other),
        }
        match &tree.node(else_id).kind {
            NodeKind::Else { matched_if } => assert_eq!(*matched_if, if_id),
            other => panic!("expected Else, got {:?}", other),
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_orphan_else() {
        let err = parse("\\section(s) {\\else {y}}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::OrphanElse));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_double_else() {
        let err = parse("\\section(s) {\\if(a) {x} \\else {y} \\else {z}}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::DoubleElse));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_else_matches_nearest_if() {
        let tree = parse("\\section(s) {\\if(a) {x} text \\else {y}}").unwrap();
        let section = only_section(&tree);
        let children = &tree.node(section).children;
        // If, Text, Else — the reverse scan skips the text sibling.
        assert_eq!(children.len(), 3);
        match &tree.node(children[2]).kind {
            NodeKind::Else { matched_if } => assert_eq!(*matched_if, children[0]),
            other => panic!("expected Else, got {:?}", other),
        }
    }

    // --- Variable scope resolution ---

    #[test]
    #[ntest::timeout(100)]
    fn test_set_without_conditionals() {
        let tree = parse("\\section(s) {\\set(x = 1)}").unwrap();
        let section = only_section(&tree);
        assert_eq!(section_variables(&tree, section), &["x = 1;".to_string()]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_set_under_nested_ifs_conjoins_outer_to_inner() {
        let tree = parse("\\section(s) {\\if(a) {\\if(b) {\\set(x=1)}}}").unwrap();
        let section = only_section(&tree);
        assert_eq!(
            section_variables(&tree, section),
            &["if (a && b) x=1;".to_string()]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_set_under_else_negates_matched_condition() {
        let tree = parse("\\section(s) {\\if(a) {x} \\else {\\set(y=2)}}").unwrap();
        let section = only_section(&tree);
        assert_eq!(
            section_variables(&tree, section),
            &["if (!(a)) y=2;".to_string()]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_set_statements_keep_encounter_order() {
        let tree = parse("\\section(s) {\\set(a=1)\\set(b=2)}").unwrap();
        let section = only_section(&tree);
        assert_eq!(
            section_variables(&tree, section),
            &["a=1;".to_string(), "b=2;".to_string()]
        );
    }

    // --- Raw script/style capture ---

    #[test]
    #[ntest::timeout(100)]
    fn test_script_captures_nested_braces_verbatim() {
        let tree = parse("\\section(s) {\\script{ if (x) { y(); } }}").unwrap();
        let section = only_section(&tree);
        match &tree.node(section).kind {
            NodeKind::Section { scripts, .. } => {
                assert_eq!(scripts, &[" if (x) { y(); } ".to_string()]);
            }
            other => panic!("expected Section, got {:?}", other),
        }
        // The raw capture adds no children to the section.
        assert!(tree.node(section).children.is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_style_at_root_with_nested_braces() {
        let tree = parse("\\style{body { color: red; }}").unwrap();
        match &tree.node(Tree::ROOT).kind {
            NodeKind::Root { styles, .. } => {
                assert_eq!(styles, &["body { color: red; }".to_string()]);
            }
            other => panic!("expected Root, got {:?}", other),
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nested_style_hoists_to_enclosing_section() {
        let tree = parse("\\section(s) {\\if(a) {\\style{.x { top: 0; }}}}").unwrap();
        let section = only_section(&tree);
        match &tree.node(section).kind {
            NodeKind::Section { styles, .. } => {
                assert_eq!(styles, &[".x { top: 0; }".to_string()]);
            }
            other => panic!("expected Section, got {:?}", other),
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unterminated_script() {
        let err = parse("\\section(s) {\\script{ if (x) { }").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::UnterminatedRawBlock { ref directive } if directive == "script")
        );
    }

    // --- Links, leaves, choices ---

    #[test]
    #[ntest::timeout(100)]
    fn test_nav_show_payloads() {
        let tree =
            parse("\\section(s) {\\nav(cellar, torch) {Go down} \\show(hint, true, 1) {Peek}}")
                .unwrap();
        let section = only_section(&tree);
        let kinds = child_kinds(&tree, section);
        assert_eq!(kinds.len(), 2);
        assert_eq!(
            kinds[0],
            &NodeKind::Navigate {
                target: "cellar".to_string(),
                args: vec!["torch".to_string()],
            }
        );
        assert_eq!(
            kinds[1],
            &NodeKind::Show {
                target: "hint".to_string(),
                args: vec!["1".to_string()],
                preserve: true,
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_show_preserve_flag_must_be_boolean() {
        let err = parse("\\section(s) {\\show(hint, yes) {Peek}}").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::MalformedDirective { ref directive, .. } if directive == "show")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_include_print_image_input_leaves() {
        let tree = parse(
            "\\section(s) {\\include(stats, hp)\\print(score)\\image(u, 10, 20, alt)\\input(text, name, Your name)}",
        )
        .unwrap();
        let section = only_section(&tree);
        let kinds = child_kinds(&tree, section);
        assert_eq!(
            kinds,
            vec![
                &NodeKind::Include {
                    target: "stats".to_string(),
                    args: vec!["hp".to_string()],
                },
                &NodeKind::Print {
                    expr: "score".to_string()
                },
                &NodeKind::Image {
                    url: "u".to_string(),
                    height: "10".to_string(),
                    width: "20".to_string(),
                    alt: "alt".to_string(),
                },
                &NodeKind::Input {
                    kind: "text".to_string(),
                    binding: "name".to_string(),
                    placeholder: Some("Your name".to_string()),
                },
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_image_requires_four_arguments() {
        let err = parse("\\section(s) {\\image(u, 10)}").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::MalformedDirective { ref directive, .. } if directive == "image")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_choices_accepts_only_choice() {
        let tree = parse("\\section(s) {\\choices {\\choice(pick, true, 1) {Option 1}}}").unwrap();
        let section = only_section(&tree);
        let choices = tree.node(section).children[0];
        assert_eq!(tree.node(choices).kind, NodeKind::Choices);
        let choice = tree.node(choices).children[0];
        assert_eq!(
            tree.node(choice).kind,
            NodeKind::Choice {
                target: "pick".to_string(),
                args: vec!["1".to_string()],
                preserve: true,
            }
        );
        assert_eq!(
            child_kinds(&tree, choice),
            vec![&NodeKind::Text {
                text: "Option 1".to_string()
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_choices_rejects_plain_text() {
        let err = parse("\\section(s) {\\choices {pick one}}").unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::InvalidChoicesContent { .. }
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_choices_rejects_other_commands() {
        let err = parse("\\section(s) {\\choices {\\nav(a) {x}}}").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::InvalidChoicesContent { ref found } if found == "\\nav")
        );
    }

    // --- Malformed directives ---

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_closing_paren() {
        let err = parse("\\section(intro").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::MalformedDirective { ref directive, .. } if directive == "section")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_opening_paren() {
        let err = parse("\\section intro").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::MalformedDirective { ref expected, .. } if expected == "'('")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_newline_inside_directive_body() {
        let err = parse("\\section(s) {\\print(a\nb)}").unwrap_err();
        assert!(
            matches!(err.kind, ParseErrorKind::MalformedDirective { ref directive, .. } if directive == "print")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_errors_carry_position() {
        let err = parse("\\section(s) {\n\n}}").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnbalancedClose));
        assert_eq!(err.line, 3);
        assert_eq!(err.offset, 16);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_multiple_sections_stay_siblings() {
        let tree = parse("\\section(a) {x}\n\\section(b) {y}").unwrap();
        let kinds = root_children(&tree);
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], NodeKind::Section { name, .. } if name == "a"));
        assert!(matches!(kinds[1], NodeKind::Section { name, .. } if name == "b"));
    }
}
