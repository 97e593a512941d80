//! # Parser
//!
//! Single-shot recursive-descent parser with operator-precedence climbing for
//! expressions. Turns a flat [`crate::lexer::LocatedToken`] stream into a
//! [`crate::ast::Program`].
//!
//! Unlike the lexer, the parser never stops at the first problem: every
//! parse rule that fails records a [`ParseError`] and recovers at the
//! nearest synchronization token (`;` or the enclosing `}`) so the checker
//! still gets a best-effort tree to look at.
//!
//! ## Precedence (low to high)
//! `||`, `&&`, `??`, equality, comparison, `..`/`..=`, additive,
//! multiplicative, unary (`- !`), postfix (`()` `.` `[]`), primary.
//!
//! ## Clip and score statement names
//! `note`, `rest`, `chord`, `hit`, `breath`, `at`, `arp`, `triplet`, `cc`,
//! `automation`, `marker`, and `place` are not reserved keywords (`place` is
//! the one exception — it is lexed as a keyword since it only ever appears
//! in track bodies). The rest read as ordinary identifier calls; this
//! module recognizes them by name at clip- and score-statement position,
//! the same way `at(...)` is recognized to build dedicated AST nodes
//! instead of leaving them as opaque `Call` expressions for the evaluator
//! to re-dispatch on by string.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{LocatedToken, TemplatePart, Token};
use crate::pos::PosRef;

pub struct Parser {
    tokens: Vec<LocatedToken>,
    pos: usize,
    errors: Vec<ParseError>,
}

/// Parses a full program, collecting recoverable errors rather than
/// stopping at the first one.
pub fn parse(tokens: Vec<LocatedToken>) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    (program, parser.errors)
}

impl Parser {
    fn new(tokens: Vec<LocatedToken>) -> Parser {
        Parser { tokens, pos: 0, errors: Vec::new() }
    }

    // -- token stream primitives -----------------------------------------

    fn current(&self) -> &LocatedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn span(&self) -> Span {
        Span::new(self.current().line, self.current().column)
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> LocatedToken {
        let tok = self.current().clone();
        if !self.is_eof() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek() == tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn ident_is(&self, name: &str) -> bool {
        matches!(self.peek(), Token::Identifier(s) if s == name)
    }

    fn expect(&mut self, tok: Token, expected: &str) -> Span {
        let span = self.span();
        if !self.eat(&tok) {
            self.error_unexpected(expected);
        }
        span
    }

    fn error_unexpected(&mut self, expected: &str) {
        let found = self.peek().describe();
        let span = self.span();
        self.errors.push(ParseError::UnexpectedToken {
            found,
            expected: expected.to_string(),
            line: span.line,
            column: span.column,
        });
    }

    fn expect_identifier(&mut self) -> String {
        if let Token::Identifier(name) = self.peek().clone() {
            self.advance();
            name
        } else {
            let span = self.span();
            self.errors.push(ParseError::ExpectedIdentifier { line: span.line, column: span.column });
            String::new()
        }
    }

    /// Skips tokens until the next `;` (consumed) or a brace boundary, so
    /// a later rule can resume at a clean statement start.
    fn synchronize(&mut self) {
        while !self.is_eof() {
            match self.peek() {
                Token::Semicolon => {
                    self.advance();
                    return;
                }
                Token::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // -- program -----------------------------------------------------------

    fn parse_program(&mut self) -> Program {
        let mut imports = Vec::new();
        while self.check(&Token::Import) {
            imports.push(self.parse_import());
        }

        let mut body = Vec::new();
        while !self.is_eof() {
            if self.check(&Token::Import) {
                let span = self.span();
                self.errors.push(ParseError::InvalidImport {
                    message: "imports must appear before other declarations".to_string(),
                    line: span.line,
                    column: span.column,
                });
                self.parse_import();
                continue;
            }
            match self.parse_top_level() {
                Some(item) => body.push(item),
                None => self.synchronize(),
            }
        }

        Program { imports, body }
    }

    fn parse_import(&mut self) -> ImportDecl {
        let span = self.span();
        self.expect(Token::Import, "'import'");

        let kind = if self.eat(&Token::Star) {
            self.expect(Token::As, "'as'");
            let alias = self.expect_identifier();
            ImportKind::Namespace(alias)
        } else {
            self.expect(Token::LBrace, "'{'");
            let mut names = Vec::new();
            while !self.check(&Token::RBrace) && !self.is_eof() {
                let name = self.expect_identifier();
                let alias = if self.eat(&Token::As) { Some(self.expect_identifier()) } else { None };
                names.push((name, alias));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RBrace, "'}'");
            ImportKind::Named(names)
        };

        self.expect(Token::From, "'from'");
        let from = self.parse_string_literal_text();
        self.expect(Token::Semicolon, "';'");
        ImportDecl { kind, from, span }
    }

    fn parse_string_literal_text(&mut self) -> String {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                s
            }
            _ => {
                self.error_unexpected("a string literal");
                String::new()
            }
        }
    }

    fn parse_top_level(&mut self) -> Option<TopLevel> {
        let exported = self.eat(&Token::Export);
        match self.peek() {
            Token::Fn => Some(TopLevel::Fn(self.parse_fn_decl(exported))),
            Token::Const | Token::Let => Some(TopLevel::Const(self.parse_const_decl(exported))),
            _ => {
                self.error_unexpected("a top-level declaration ('fn', 'const', or 'let')");
                None
            }
        }
    }

    fn parse_fn_decl(&mut self, exported: bool) -> FnDecl {
        let span = self.span();
        self.expect(Token::Fn, "'fn'");
        let name = self.expect_identifier();

        let mut type_params = Vec::new();
        if self.eat(&Token::Lt) {
            while !self.check(&Token::Gt) && !self.is_eof() {
                type_params.push(self.expect_identifier());
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::Gt, "'>'");
        }

        self.expect(Token::LParen, "'('");
        let mut params = Vec::new();
        while !self.check(&Token::RParen) && !self.is_eof() {
            let name = self.expect_identifier();
            let ty = if self.eat(&Token::Colon) { Some(self.parse_type_expr()) } else { None };
            params.push(Param { name, ty });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "')'");

        let return_type = if self.eat(&Token::Arrow) { Some(self.parse_type_expr()) } else { None };
        let body = self.parse_block();

        FnDecl { name, type_params, params, return_type, body, exported, span }
    }

    fn parse_type_expr(&mut self) -> TypeExpr {
        let name = self.expect_identifier();
        if name.is_empty() {
            return TypeExpr::Unknown;
        }
        if self.eat(&Token::Lt) {
            let mut args = Vec::new();
            while !self.check(&Token::Gt) && !self.is_eof() {
                args.push(self.parse_type_expr());
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::Gt, "'>'");
            TypeExpr::Generic(name, args)
        } else {
            TypeExpr::Named(name)
        }
    }

    fn parse_pattern(&mut self) -> Pattern {
        if self.eat(&Token::LParen) {
            let mut elems = Vec::new();
            while !self.check(&Token::RParen) && !self.is_eof() {
                elems.push(self.parse_pattern());
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen, "')'");
            Pattern::Tuple(elems)
        } else {
            Pattern::Name(self.expect_identifier())
        }
    }

    fn parse_const_decl(&mut self, exported: bool) -> ConstDecl {
        let span = self.span();
        let mutable = self.check(&Token::Let);
        self.advance(); // 'const' or 'let'
        let pattern = self.parse_pattern();
        let ty = if self.eat(&Token::Colon) { Some(self.parse_type_expr()) } else { None };
        self.expect(Token::Eq, "'='");
        let init = self.parse_expr();
        self.expect(Token::Semicolon, "';'");
        ConstDecl { pattern, ty, init, mutable, exported, span }
    }

    // -- statements ----------------------------------------------------

    fn parse_block(&mut self) -> Block {
        let span = self.span();
        self.expect(Token::LBrace, "'{'");
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        if !self.eat(&Token::RBrace) {
            let span = self.span();
            self.errors.push(ParseError::MissingBrace { line: span.line, column: span.column });
        }
        Block { stmts, span }
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.peek() {
            Token::Return => {
                let span = self.span();
                self.advance();
                let value = if self.check(&Token::Semicolon) { None } else { Some(self.parse_expr()) };
                self.expect(Token::Semicolon, "';'");
                Some(Stmt::Return(value, span))
            }
            Token::If => Some(Stmt::If(self.parse_if_stmt())),
            Token::For => Some(Stmt::For(self.parse_for_stmt())),
            Token::Const => Some(Stmt::Const(self.parse_const_decl(false))),
            Token::Let => Some(Stmt::Let(self.parse_const_decl(false))),
            _ => self.parse_expr_or_assignment_stmt(),
        }
    }

    fn parse_if_stmt(&mut self) -> IfStmt {
        let span = self.span();
        self.expect(Token::If, "'if'");
        let cond = self.parse_expr();
        let then_block = self.parse_block();
        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(Box::new(ElseBranch::If(self.parse_if_stmt())))
            } else {
                Some(Box::new(ElseBranch::Block(self.parse_block())))
            }
        } else {
            None
        };
        IfStmt { cond, then_block, else_branch, span }
    }

    fn parse_for_stmt(&mut self) -> ForStmt {
        let span = self.span();
        self.expect(Token::For, "'for'");
        let paren = self.eat(&Token::LParen);
        let pattern = self.parse_pattern();
        self.expect(Token::In, "'in'");
        let iterable = self.parse_expr();
        if paren {
            self.expect(Token::RParen, "')'");
        }
        let body = self.parse_block();
        ForStmt { pattern, iterable, body, span }
    }

    fn parse_expr_or_assignment_stmt(&mut self) -> Option<Stmt> {
        let span = self.span();
        let expr = self.parse_expr();
        if self.eat(&Token::Eq) {
            let value = self.parse_expr();
            self.expect(Token::Semicolon, "';'");
            Some(Stmt::Assignment(AssignmentStmt { target: expr, value, span }))
        } else {
            self.expect(Token::Semicolon, "';'");
            Some(Stmt::Expr(expr))
        }
    }

    // -- expressions: precedence climbing -------------------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.check(&Token::OrOr) {
            let span = self.span();
            self.advance();
            let right = self.parse_and();
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right), span);
        }
        left
    }

    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_coalesce();
        while self.check(&Token::AndAnd) {
            let span = self.span();
            self.advance();
            let right = self.parse_coalesce();
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right), span);
        }
        left
    }

    fn parse_coalesce(&mut self) -> Expr {
        let mut left = self.parse_equality();
        while self.check(&Token::QuestionQuestion) {
            let span = self.span();
            self.advance();
            let right = self.parse_equality();
            left = Expr::Binary(BinaryOp::Coalesce, Box::new(left), Box::new(right), span);
        }
        left
    }

    fn parse_equality(&mut self) -> Expr {
        let mut left = self.parse_comparison();
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::Ne,
                _ => break,
            };
            let span = self.span();
            self.advance();
            let right = self.parse_comparison();
            left = Expr::Binary(op, Box::new(left), Box::new(right), span);
        }
        left
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut left = self.parse_range();
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::Ge,
                _ => break,
            };
            let span = self.span();
            self.advance();
            let right = self.parse_range();
            left = Expr::Binary(op, Box::new(left), Box::new(right), span);
        }
        left
    }

    fn parse_range(&mut self) -> Expr {
        let left = self.parse_additive();
        if self.check(&Token::DotDot) || self.check(&Token::DotDotEq) {
            let span = self.span();
            self.advance();
            let right = self.parse_additive();
            Expr::Range(Box::new(left), Box::new(right), span)
        } else {
            left
        }
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            let span = self.span();
            self.advance();
            let right = self.parse_multiplicative();
            left = Expr::Binary(op, Box::new(left), Box::new(right), span);
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            let span = self.span();
            self.advance();
            let right = self.parse_unary();
            left = Expr::Binary(op, Box::new(left), Box::new(right), span);
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let span = self.span();
        match self.peek() {
            Token::Minus => {
                self.advance();
                Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()), span)
            }
            Token::Bang => {
                self.advance();
                Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()), span)
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.peek() {
                Token::Dot => {
                    let span = self.span();
                    self.advance();
                    let name = self.expect_identifier();
                    expr = Expr::Member(Box::new(expr), name, span);
                }
                Token::LBracket => {
                    let span = self.span();
                    self.advance();
                    let index = self.parse_expr();
                    self.expect(Token::RBracket, "']'");
                    expr = Expr::Index(Box::new(expr), Box::new(index), span);
                }
                Token::LParen => {
                    let span = self.span();
                    self.advance();
                    let args = self.parse_args();
                    self.expect(Token::RParen, "')'");
                    expr = Expr::Call(Box::new(expr), args, span);
                }
                _ => break,
            }
        }
        expr
    }

    /// Named args must come after positional ones; a name followed by `:`
    /// at argument position marks a named argument.
    fn parse_args(&mut self) -> Vec<Arg> {
        let mut args = Vec::new();
        while !self.check(&Token::RParen) && !self.is_eof() {
            let is_named = matches!(self.peek(), Token::Identifier(_))
                && matches!(self.tokens.get(self.pos + 1).map(|t| &t.token), Some(Token::Colon));
            let name = if is_named {
                let n = self.expect_identifier();
                self.advance(); // ':'
                Some(n)
            } else {
                None
            };
            let value = self.parse_expr();
            args.push(Arg { name, value });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        args
    }

    fn parse_primary(&mut self) -> Expr {
        let span = self.span();
        match self.peek().clone() {
            Token::Int(n) => {
                self.advance();
                Expr::IntLit(n, span)
            }
            Token::Float(f) => {
                self.advance();
                Expr::FloatLit(f, span)
            }
            Token::Str(s) => {
                self.advance();
                Expr::StringLit(s, span)
            }
            Token::TemplateString(parts) => {
                self.advance();
                Expr::TemplateLit(self.parse_template_parts(parts), span)
            }
            Token::Duration(rat) => {
                self.advance();
                Expr::DurationLit(rat, span)
            }
            Token::BarBeat(bar, beat) => {
                self.advance();
                Expr::BarBeatLit(PosRef::new(bar, beat), span)
            }
            Token::Pitch { letter, accidental, octave } => {
                self.advance();
                match crate::pitch::Pitch::from_letter(letter, accidental, octave) {
                    Some(p) => Expr::PitchLit(p, span),
                    None => {
                        self.error_unexpected("a valid pitch literal");
                        Expr::NullLit(span)
                    }
                }
            }
            Token::Up => {
                self.advance();
                Expr::EnumVariantLit("up".to_string(), span)
            }
            Token::Down => {
                self.advance();
                Expr::EnumVariantLit("down".to_string(), span)
            }
            Token::Identifier(name) => {
                self.advance();
                Expr::Identifier(name, span)
            }
            Token::LParen => {
                self.advance();
                let first = self.parse_expr();
                if self.eat(&Token::Comma) {
                    let mut items = vec![first];
                    while !self.check(&Token::RParen) && !self.is_eof() {
                        items.push(self.parse_expr());
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::RParen, "')'");
                    Expr::Tuple(items, span)
                } else {
                    self.expect(Token::RParen, "')'");
                    first
                }
            }
            Token::LBracket => self.parse_array_literal(span),
            Token::LBrace => self.parse_object_literal(span),
            Token::Match => self.parse_match_expr(span),
            Token::Score => self.parse_score_expr(span),
            Token::Clip => self.parse_clip_expr(span),
            _ => {
                self.error_unexpected("an expression");
                self.advance();
                Expr::NullLit(span)
            }
        }
    }

    fn parse_template_parts(&self, parts: Vec<TemplatePart>) -> Vec<TemplateSegment> {
        parts
            .into_iter()
            .map(|part| match part {
                TemplatePart::Static(s) => TemplateSegment::Static(s),
                TemplatePart::Expr(src) => {
                    let (program_expr, _errs) = parse_embedded_expr(&src);
                    TemplateSegment::Expr(program_expr)
                }
            })
            .collect()
    }

    fn parse_array_literal(&mut self, span: Span) -> Expr {
        self.expect(Token::LBracket, "'['");
        let mut items = Vec::new();
        while !self.check(&Token::RBracket) && !self.is_eof() {
            if self.eat(&Token::DotDot) {
                items.push(ArrayItem::Spread(self.parse_expr()));
            } else {
                items.push(ArrayItem::Item(self.parse_expr()));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBracket, "']'");
        Expr::Array(items, span)
    }

    fn parse_object_literal(&mut self, span: Span) -> Expr {
        self.expect(Token::LBrace, "'{'");
        let mut items = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            if self.eat(&Token::DotDot) {
                items.push(ObjectItem::Spread(self.parse_expr()));
            } else {
                let key = self.expect_identifier();
                self.expect(Token::Colon, "':'");
                let value = self.parse_expr();
                items.push(ObjectItem::KeyValue(key, value));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace, "'}'");
        Expr::Object(items, span)
    }

    fn parse_match_expr(&mut self, span: Span) -> Expr {
        self.expect(Token::Match, "'match'");
        let head = self.parse_expr();
        self.expect(Token::LBrace, "'{'");
        let mut arms = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            let pattern = if self.eat(&Token::Else) {
                MatchPattern::Else
            } else {
                let first = self.parse_additive();
                if self.check(&Token::DotDot) || self.check(&Token::DotDotEq) {
                    self.advance();
                    let last = self.parse_additive();
                    MatchPattern::Range(first, last)
                } else {
                    MatchPattern::Literal(first)
                }
            };
            self.expect(Token::Arrow, "'->'");
            let body = self.parse_expr();
            self.expect(Token::Semicolon, "';'");
            arms.push(MatchArm { pattern, body });
        }
        self.expect(Token::RBrace, "'}'");
        Expr::Match(Box::new(head), arms, span)
    }

    // -- score expressions ------------------------------------------------

    fn parse_score_expr(&mut self, span: Span) -> Expr {
        self.expect(Token::Score, "'score'");
        self.expect(Token::LBrace, "'{'");
        let mut items = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            match self.parse_score_item() {
                Some(item) => items.push(item),
                None => self.synchronize(),
            }
        }
        self.expect(Token::RBrace, "'}'");
        Expr::Score(ScoreExpr { items, span }, span)
    }

    fn parse_score_item(&mut self) -> Option<ScoreItem> {
        match self.peek() {
            Token::Meta => Some(self.parse_meta_block()),
            Token::Tempo => Some(self.parse_tempo_block()),
            Token::Meter => Some(self.parse_meter_block()),
            Token::Sound => Some(self.parse_sound_decl()),
            Token::Track => Some(self.parse_track_decl()),
            Token::Identifier(name) if name == "marker" => Some(self.parse_score_marker()),
            _ => {
                self.error_unexpected("a score item ('meta', 'tempo', 'meter', 'sound', 'track', or 'marker')");
                None
            }
        }
    }

    fn parse_meta_block(&mut self) -> ScoreItem {
        let span = self.span();
        self.expect(Token::Meta, "'meta'");
        self.expect(Token::LBrace, "'{'");
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            let key = self.expect_identifier();
            self.expect(Token::Colon, "':'");
            let value = self.parse_expr();
            fields.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace, "'}'");
        ScoreItem::Meta(fields, span)
    }

    fn parse_tempo_block(&mut self) -> ScoreItem {
        let span = self.span();
        self.expect(Token::Tempo, "'tempo'");
        self.expect(Token::LBrace, "'{'");
        let mut entries = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            let entry_span = self.span();
            let pos = self.parse_expr();
            self.expect(Token::Arrow, "'->'");
            let bpm = self.parse_additive();
            if matches!(self.peek(), Token::Identifier(name) if name == "bpm") {
                self.advance();
            } else {
                self.error_unexpected("'bpm'");
            }
            let unit = if matches!(self.peek(), Token::Identifier(name) if name == "unit") {
                self.advance();
                Some(self.parse_additive())
            } else {
                None
            };
            self.expect(Token::Semicolon, "';'");
            entries.push(TempoEntry { pos, bpm, unit, span: entry_span });
        }
        self.expect(Token::RBrace, "'}'");
        ScoreItem::Tempo(entries, span)
    }

    fn parse_meter_block(&mut self) -> ScoreItem {
        let span = self.span();
        self.expect(Token::Meter, "'meter'");
        self.expect(Token::LBrace, "'{'");
        let mut entries = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            let entry_span = self.span();
            let pos = self.parse_expr();
            self.expect(Token::Arrow, "'->'");
            let numerator = self.parse_additive();
            self.expect(Token::Slash, "'/'");
            let denominator = self.parse_additive();
            self.expect(Token::Semicolon, "';'");
            entries.push(MeterEntry { pos, numerator, denominator, span: entry_span });
        }
        self.expect(Token::RBrace, "'}'");
        ScoreItem::Meter(entries, span)
    }

    fn parse_sound_kind(&mut self) -> String {
        match self.peek() {
            Token::Instrument => {
                self.advance();
                "instrument".to_string()
            }
            Token::DrumKit => {
                self.advance();
                "drumKit".to_string()
            }
            Token::Vocal => {
                self.advance();
                "vocal".to_string()
            }
            Token::Fx => {
                self.advance();
                "fx".to_string()
            }
            _ => {
                self.error_unexpected("a sound kind ('instrument', 'drumKit', 'vocal', or 'fx')");
                String::new()
            }
        }
    }

    fn parse_sound_decl(&mut self) -> ScoreItem {
        let span = self.span();
        self.expect(Token::Sound, "'sound'");
        let id = self.parse_postfix();
        self.expect(Token::Kind, "'kind'");
        let kind = self.parse_sound_kind();
        self.expect(Token::LBrace, "'{'");
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            let key = self.expect_identifier();
            self.expect(Token::Colon, "':'");
            let value = self.parse_expr();
            fields.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace, "'}'");
        ScoreItem::Sound(SoundDeclNode { id, kind, fields, span })
    }

    fn parse_track_decl(&mut self) -> ScoreItem {
        let span = self.span();
        self.expect(Token::Track, "'track'");
        let name = self.parse_postfix();
        self.expect(Token::Role, "'role'");
        let role = self.expect_identifier();
        self.expect(Token::Sound, "'sound'");
        let sound = self.parse_postfix();
        self.expect(Token::LBrace, "'{'");
        let mut placements = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            if self.check(&Token::Place) {
                placements.push(self.parse_place_stmt());
            } else {
                self.error_unexpected("'place'");
                self.synchronize();
            }
        }
        self.expect(Token::RBrace, "'}'");
        ScoreItem::Track(TrackDeclNode { name, role, sound, placements, span })
    }

    fn parse_place_stmt(&mut self) -> PlaceStmt {
        let span = self.span();
        self.expect(Token::Place, "'place'");
        let pos = self.parse_additive();
        let clip = self.parse_expr();
        self.expect(Token::Semicolon, "';'");
        PlaceStmt { pos, clip, span }
    }

    fn parse_score_marker(&mut self) -> ScoreItem {
        let span = self.span();
        self.advance(); // 'marker'
        self.expect(Token::LParen, "'('");
        let pos = self.parse_expr();
        self.expect(Token::Comma, "','");
        let kind = self.parse_expr();
        self.expect(Token::Comma, "','");
        let label = self.parse_expr();
        self.expect(Token::RParen, "')'");
        self.expect(Token::Semicolon, "';'");
        ScoreItem::Marker { pos, kind, label, span }
    }

    // -- clip expressions --------------------------------------------------

    fn parse_clip_expr(&mut self, span: Span) -> Expr {
        self.expect(Token::Clip, "'clip'");
        self.expect(Token::LBrace, "'{'");
        let stmts = self.parse_clip_stmts();
        self.expect(Token::RBrace, "'}'");
        Expr::Clip(ClipExpr { stmts, span }, span)
    }

    fn parse_clip_stmts(&mut self) -> Vec<ClipStmt> {
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_eof() {
            match self.parse_clip_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        stmts
    }

    fn parse_clip_stmt(&mut self) -> Option<ClipStmt> {
        match self.peek() {
            Token::Const => return Some(ClipStmt::Const(self.parse_const_decl(false))),
            Token::Let => return Some(ClipStmt::Let(self.parse_const_decl(false))),
            Token::For => return Some(self.parse_clip_for()),
            Token::If => return Some(self.parse_clip_if()),
            _ => {}
        }

        if let Token::Identifier(name) = self.peek().clone() {
            match name.as_str() {
                "at" => return Some(self.parse_clip_at()),
                "rest" => return Some(self.parse_clip_rest()),
                "note" => return Some(self.parse_clip_note()),
                "chord" => return Some(self.parse_clip_chord()),
                "hit" => return Some(self.parse_clip_hit()),
                "breath" => return Some(self.parse_clip_breath()),
                "arp" => return Some(self.parse_clip_arp()),
                "triplet" => return Some(self.parse_clip_triplet()),
                "cc" => return Some(self.parse_clip_cc()),
                "automation" => return Some(self.parse_clip_automation()),
                "marker" => return Some(self.parse_clip_marker()),
                _ => {}
            }
        }

        let span = self.span();
        let expr = self.parse_expr();
        self.expect(Token::Semicolon, "';'");
        Some(ClipStmt::Expr(expr, span))
    }

    fn parse_clip_for(&mut self) -> ClipStmt {
        let span = self.span();
        self.expect(Token::For, "'for'");
        let paren = self.eat(&Token::LParen);
        let pattern = self.parse_pattern();
        self.expect(Token::In, "'in'");
        let iterable = self.parse_expr();
        if paren {
            self.expect(Token::RParen, "')'");
        }
        self.expect(Token::LBrace, "'{'");
        let body = self.parse_clip_stmts();
        self.expect(Token::RBrace, "'}'");
        ClipStmt::For { pattern, iterable, body, span }
    }

    fn parse_clip_if(&mut self) -> ClipStmt {
        let span = self.span();
        self.expect(Token::If, "'if'");
        let cond = self.parse_expr();
        self.expect(Token::LBrace, "'{'");
        let then_body = self.parse_clip_stmts();
        self.expect(Token::RBrace, "'}'");
        let else_body = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(vec![self.parse_clip_if()])
            } else {
                self.expect(Token::LBrace, "'{'");
                let body = self.parse_clip_stmts();
                self.expect(Token::RBrace, "'}'");
                Some(body)
            }
        } else {
            None
        };
        ClipStmt::If { cond, then_body, else_body, span }
    }

    fn parse_clip_args(&mut self) -> (Vec<Expr>, Vec<Arg>) {
        self.expect(Token::LParen, "'('");
        let args = self.parse_args();
        self.expect(Token::RParen, "')'");
        let mut positional = Vec::new();
        let mut named = Vec::new();
        for arg in args {
            match arg.name {
                None => positional.push(arg.value),
                Some(name) => named.push(Arg { name: Some(name), value: arg.value }),
            }
        }
        (positional, named)
    }

    fn parse_clip_at(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, _) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        ClipStmt::At { pos: take_arg(&mut args, span), span }
    }

    fn parse_clip_rest(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, _) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        ClipStmt::Rest { dur: take_arg(&mut args, span), span }
    }

    fn parse_clip_note(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, named) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let dur = take_last_arg(&mut args, span);
        let pitch = take_arg(&mut args, span);
        ClipStmt::Note { pitch, dur, args: named, span }
    }

    fn parse_clip_chord(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, named) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let dur = take_last_arg(&mut args, span);
        let pitches = take_arg(&mut args, span);
        ClipStmt::Chord { pitches, dur, args: named, span }
    }

    fn parse_clip_hit(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, named) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let dur = take_last_arg(&mut args, span);
        let key = take_arg(&mut args, span);
        ClipStmt::Hit { key, dur, args: named, span }
    }

    fn parse_clip_breath(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, named) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let dur = take_arg(&mut args, span);
        ClipStmt::Breath { dur, args: named, span }
    }

    fn parse_clip_arp(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, _) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let dir = take_last_arg(&mut args, span);
        let unit = take_last_arg(&mut args, span);
        let pitches = take_arg(&mut args, span);
        ClipStmt::Arp { pitches, unit, dir, span }
    }

    fn parse_clip_triplet(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        self.expect(Token::LParen, "'('");
        let actual = self.parse_expr();
        let mut in_time = None;
        if self.eat(&Token::Comma) {
            let args = self.parse_args();
            for arg in args {
                if arg.name.as_deref() == Some("inTime") {
                    in_time = Some(arg.value);
                }
            }
        }
        self.expect(Token::RParen, "')'");
        self.expect(Token::LBrace, "'{'");
        let body = self.parse_clip_stmts();
        self.expect(Token::RBrace, "'}'");
        ClipStmt::Triplet { actual, in_time, body, span }
    }

    fn parse_clip_cc(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, _) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let value = take_last_arg(&mut args, span);
        let number = take_arg(&mut args, span);
        ClipStmt::Cc { number, value, span }
    }

    fn parse_clip_automation(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, _) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let curve = take_last_arg(&mut args, span);
        let end = take_last_arg(&mut args, span);
        let start = take_last_arg(&mut args, span);
        let param = take_arg(&mut args, span);
        ClipStmt::Automation { param, start, end, curve, span }
    }

    fn parse_clip_marker(&mut self) -> ClipStmt {
        let span = self.span();
        self.advance();
        let (mut args, _) = self.parse_clip_args();
        self.expect(Token::Semicolon, "';'");
        let label = take_last_arg(&mut args, span);
        let kind = take_arg(&mut args, span);
        ClipStmt::Marker { kind, label, span }
    }
}

/// Pops the next positional argument in declaration order, or `Null` (with
/// a recorded diagnostic upstream via the checker's `missing-argument`
/// path) when the call was short.
fn take_arg(args: &mut Vec<Expr>, span: Span) -> Expr {
    if args.is_empty() {
        Expr::NullLit(span)
    } else {
        args.remove(0)
    }
}

/// Pops the last remaining positional argument — used for trailing
/// parameters (duration, curve, …) so earlier calls to `take_arg` can
/// consume from the front without disturbing these.
fn take_last_arg(args: &mut Vec<Expr>, span: Span) -> Expr {
    args.pop().unwrap_or(Expr::NullLit(span))
}

/// Re-lexes and re-parses the raw source text of a `${...}` template
/// expression. Errors are folded into the returned vector rather than
/// propagated, since a broken interpolation shouldn't abort the whole
/// enclosing parse.
fn parse_embedded_expr(src: &str) -> (Expr, Vec<ParseError>) {
    match crate::lexer::tokenize(src) {
        Ok(tokens) => {
            let mut inner = Parser::new(tokens);
            let expr = inner.parse_expr();
            (expr, inner.errors)
        }
        Err(err) => {
            let span = err.position();
            (Expr::NullLit(span), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> (Program, Vec<ParseError>) {
        parse(tokenize(src).unwrap())
    }

    #[test]
    fn parses_minimal_fn() {
        let (program, errors) = parse_src("fn main() { return 1; }");
        assert!(errors.is_empty());
        assert_eq!(program.body.len(), 1);
        assert!(matches!(program.body[0], TopLevel::Fn(_)));
    }

    #[test]
    fn parses_import_before_body() {
        let (program, errors) =
            parse_src(r#"import { note, rest } from "std:core"; fn main() { return 1; }"#);
        assert!(errors.is_empty());
        assert_eq!(program.imports.len(), 1);
    }

    #[test]
    fn parses_clip_note_statements() {
        let (program, errors) = parse_src("fn main() { return clip { note(C4, q); rest(e); }; }");
        assert!(errors.is_empty());
        let TopLevel::Fn(f) = &program.body[0] else { panic!() };
        let Stmt::Return(Some(Expr::Clip(clip, _)), _) = &f.body.stmts[0] else { panic!() };
        assert_eq!(clip.stmts.len(), 2);
        assert!(matches!(clip.stmts[0], ClipStmt::Note { .. }));
        assert!(matches!(clip.stmts[1], ClipStmt::Rest { .. }));
    }

    #[test]
    fn parses_score_with_tempo_and_meter() {
        let src = r#"fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                sound "p" kind instrument {}
                track "P" role Instrument sound "p" {}
            };
        }"#;
        let (program, errors) = parse_src(src);
        assert!(errors.is_empty(), "{:?}", errors);
        let TopLevel::Fn(f) = &program.body[0] else { panic!() };
        let Stmt::Return(Some(Expr::Score(score, _)), _) = &f.body.stmts[0] else { panic!() };
        assert_eq!(score.items.len(), 4);
    }

    #[test]
    fn named_args_after_positional() {
        let (program, errors) = parse_src("fn main() { return clip { note(C4, q, velocity: 0.8); }; }");
        assert!(errors.is_empty());
        let TopLevel::Fn(f) = &program.body[0] else { panic!() };
        let Stmt::Return(Some(Expr::Clip(clip, _)), _) = &f.body.stmts[0] else { panic!() };
        let ClipStmt::Note { args, .. } = &clip.stmts[0] else { panic!() };
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].name.as_deref(), Some("velocity"));
    }

    #[test]
    fn range_in_for_loop() {
        let (program, errors) = parse_src("fn main() { for (i in 0..3) { return i; } return 0; }");
        assert!(errors.is_empty());
        let TopLevel::Fn(f) = &program.body[0] else { panic!() };
        assert!(matches!(f.body.stmts[0], Stmt::For(_)));
    }

    #[test]
    fn unterminated_block_recovers_with_missing_brace_error() {
        let (_program, errors) = parse_src("fn main() { return 1;");
        assert!(errors.iter().any(|e| matches!(e, ParseError::MissingBrace { .. })));
    }
}
