//! # Type Checker
//!
//! A nominal, non-inferring type system: every rule here only ever looks at
//! a type annotation, a literal's obvious type, or the result of another
//! locally-typed rule — there is no whole-program inference, so an
//! unannotated function parameter or an arbitrary call result is
//! [`Type::Unknown`] and unifies with everything. This keeps the checker a
//! single pass per module that only ever *collects* diagnostics (see
//! `SPEC_FULL.md` §4.4); it never rewrites the AST and never halts.

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::error::CheckFinding;
use crate::resolver::{ExportTable, ResolvedModule};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Number,
    String,
    Bool,
    Null,
    Pitch,
    Dur,
    Pos,
    Clip,
    Score,
    Array,
    Tuple,
    Object,
    Range,
    Curve,
    Rng,
    Lyric,
    LyricToken,
    Function,
    Enum,
    EnumVariant,
    Unknown,
}

impl Type {
    fn from_name(name: &str) -> Type {
        match name {
            "Number" => Type::Number,
            "String" => Type::String,
            "Bool" => Type::Bool,
            "Null" => Type::Null,
            "Pitch" => Type::Pitch,
            "Time" | "Dur" => Type::Dur,
            "Pos" => Type::Pos,
            "Clip" => Type::Clip,
            "Score" => Type::Score,
            "Array" => Type::Array,
            "Tuple" => Type::Tuple,
            "Object" => Type::Object,
            "Range" => Type::Range,
            "Curve" => Type::Curve,
            "Rng" => Type::Rng,
            "Lyric" => Type::Lyric,
            "LyricToken" => Type::LyricToken,
            "Function" => Type::Function,
            "Enum" => Type::Enum,
            "EnumVariant" => Type::EnumVariant,
            _ => Type::Unknown,
        }
    }

    fn from_type_expr(ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Named(name) => Type::from_name(name),
            TypeExpr::Generic(name, _) => Type::from_name(name),
            TypeExpr::Unknown => Type::Unknown,
        }
    }

    /// "Unifiable" per §4.4: `Unknown` unifies with anything; otherwise two
    /// types unify only if equal.
    fn unifies(&self, other: &Type) -> bool {
        *self == Type::Unknown || *other == Type::Unknown || self == other
    }

    fn least_upper_bound(&self, other: &Type) -> Type {
        if self.unifies(other) {
            if *self == Type::Unknown {
                other.clone()
            } else {
                self.clone()
            }
        } else {
            Type::Unknown
        }
    }
}

/// Names visible while checking one module: locals/params in scope plus
/// every name brought in by `import`.
struct Env<'a> {
    scopes: Vec<HashMap<String, Type>>,
    imported: &'a HashMap<String, Type>,
}

impl<'a> Env<'a> {
    fn new(imported: &'a HashMap<String, Type>) -> Env<'a> {
        Env { scopes: vec![HashMap::new()], imported }
    }

    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, ty: Type) {
        self.scopes.last_mut().unwrap().insert(name.to_string(), ty);
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty.clone());
            }
        }
        self.imported.get(name).cloned()
    }

    fn all_visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.imported.keys().cloned().collect();
        for scope in &self.scopes {
            names.extend(scope.keys().cloned());
        }
        names
    }
}

/// Checks every module in `modules` (dependency order doesn't matter here —
/// each module is checked independently against its own imports) and
/// returns the combined diagnostics.
pub fn check(modules: &[ResolvedModule], exports: &HashMap<String, ExportTable>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for module in modules {
        let imported = imported_types(module, exports, modules);
        let mut checker = ModuleChecker { diagnostics: &mut diagnostics, file: module.key.clone() };
        checker.check_program(&module.program, &imported);
    }
    diagnostics
}

fn imported_types(
    module: &ResolvedModule,
    exports: &HashMap<String, ExportTable>,
    modules: &[ResolvedModule],
) -> HashMap<String, Type> {
    let mut imported = HashMap::new();
    for import in &module.program.imports {
        let Some(table) = exports.get(&resolved_key(&import.from, modules)) else { continue };
        match &import.kind {
            ImportKind::Named(names) => {
                for (name, alias) in names {
                    if table.contains_key(name) {
                        imported.insert(alias.clone().unwrap_or_else(|| name.clone()), Type::Unknown);
                    }
                }
            }
            ImportKind::Namespace(alias) => {
                imported.insert(alias.clone(), Type::Object);
            }
        }
    }
    imported
}

/// The resolver records modules under their canonical key, which for a
/// `std:` import is the specifier itself; for a host module it's whatever
/// key the host's provider assigned. Either way it is one of `modules`.
fn resolved_key(specifier: &str, modules: &[ResolvedModule]) -> String {
    modules
        .iter()
        .map(|m| m.key.clone())
        .find(|k| k == specifier)
        .unwrap_or_else(|| specifier.to_string())
}

struct ModuleChecker<'d> {
    diagnostics: &'d mut Vec<Diagnostic>,
    file: String,
}

impl<'d> ModuleChecker<'d> {
    fn report(&mut self, finding: CheckFinding, span: Span) {
        self.diagnostics.push(finding.at(span).with_file(self.file.clone()));
    }

    fn check_program(&mut self, program: &Program, imported: &HashMap<String, Type>) {
        let mut env = Env::new(imported);
        for item in &program.body {
            if let TopLevel::Const(c) = item {
                let ty = c.ty.as_ref().map(Type::from_type_expr).unwrap_or(Type::Unknown);
                if let Pattern::Name(name) = &c.pattern {
                    env.declare(name, ty);
                }
            }
        }
        for item in &program.body {
            match item {
                TopLevel::Fn(f) => {
                    env.declare(&f.name, Type::Function);
                }
                TopLevel::Const(_) | TopLevel::TypeAlias(_) | TopLevel::Enum(_) => {}
            }
        }
        for item in &program.body {
            match item {
                TopLevel::Fn(f) => self.check_fn(f, &mut env),
                TopLevel::Const(c) => {
                    self.check_expr(&c.init, &mut env);
                }
                TopLevel::TypeAlias(_) | TopLevel::Enum(_) => {}
            }
        }
    }

    fn check_fn(&mut self, f: &FnDecl, env: &mut Env) {
        env.push();
        for param in &f.params {
            let ty = param.ty.as_ref().map(Type::from_type_expr).unwrap_or(Type::Unknown);
            env.declare(&param.name, ty);
        }
        self.check_block(&f.body, env);
        env.pop();
    }

    fn check_block(&mut self, block: &Block, env: &mut Env) {
        env.push();
        for stmt in &block.stmts {
            self.check_stmt(stmt, env);
        }
        env.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt, env: &mut Env) {
        match stmt {
            Stmt::Return(Some(expr), _) => {
                self.check_expr(expr, env);
            }
            Stmt::Return(None, _) => {}
            Stmt::If(if_stmt) => self.check_if(if_stmt, env),
            Stmt::For(for_stmt) => {
                self.check_expr(&for_stmt.iterable, env);
                env.push();
                self.declare_pattern(&for_stmt.pattern, Type::Unknown, env);
                self.check_block(&for_stmt.body, env);
                env.pop();
            }
            Stmt::Assignment(a) => {
                self.check_expr(&a.target, env);
                self.check_expr(&a.value, env);
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr, env);
            }
            Stmt::Let(c) | Stmt::Const(c) => {
                let ty = self.check_expr(&c.init, env);
                let declared = c.ty.as_ref().map(Type::from_type_expr).unwrap_or(ty);
                self.declare_pattern(&c.pattern, declared, env);
            }
        }
    }

    fn check_if(&mut self, if_stmt: &IfStmt, env: &mut Env) {
        self.check_expr(&if_stmt.cond, env);
        self.check_block(&if_stmt.then_block, env);
        match &if_stmt.else_branch {
            Some(branch) => match branch.as_ref() {
                ElseBranch::Block(b) => self.check_block(b, env),
                ElseBranch::If(i) => self.check_if(i, env),
            },
            None => {}
        }
    }

    fn declare_pattern(&mut self, pattern: &Pattern, ty: Type, env: &mut Env) {
        match pattern {
            Pattern::Name(name) => env.declare(name, ty),
            Pattern::Tuple(elems) => {
                for elem in elems {
                    self.declare_pattern(elem, Type::Unknown, env);
                }
            }
        }
    }

    /// Infers and returns the expression's type for its use at the call
    /// site, reporting any findings along the way.
    fn check_expr(&mut self, expr: &Expr, env: &mut Env) -> Type {
        match expr {
            Expr::IntLit(..) | Expr::FloatLit(..) => Type::Number,
            Expr::StringLit(..) => Type::String,
            Expr::BoolLit(..) => Type::Bool,
            Expr::NullLit(_) => Type::Null,
            Expr::EnumVariantLit(..) => Type::EnumVariant,
            Expr::PitchLit(..) => Type::Pitch,
            Expr::DurationLit(..) => Type::Dur,
            Expr::BarBeatLit(..) => Type::Pos,
            Expr::Identifier(name, span) => match env.lookup(name) {
                Some(ty) => ty,
                None => {
                    let suggestion = suggest(name, &env.all_visible_names());
                    self.report(CheckFinding::UndefinedSymbol { name: name.clone(), suggestion }, *span);
                    Type::Unknown
                }
            },
            Expr::TemplateLit(segments, _) => {
                for seg in segments {
                    if let TemplateSegment::Expr(e) = seg {
                        self.check_expr(e, env);
                    }
                }
                Type::String
            }
            Expr::Array(items, _) => {
                for item in items {
                    match item {
                        ArrayItem::Item(e) | ArrayItem::Spread(e) => {
                            self.check_expr(e, env);
                        }
                    }
                }
                Type::Array
            }
            Expr::Tuple(items, _) => {
                for item in items {
                    self.check_expr(item, env);
                }
                Type::Tuple
            }
            Expr::Object(items, _) => {
                for item in items {
                    match item {
                        ObjectItem::KeyValue(_, e) | ObjectItem::Spread(e) => {
                            self.check_expr(e, env);
                        }
                    }
                }
                Type::Object
            }
            Expr::Member(base, _, _) => {
                self.check_expr(base, env);
                Type::Unknown
            }
            Expr::Index(base, index, _) => {
                self.check_expr(base, env);
                self.check_expr(index, env);
                Type::Unknown
            }
            Expr::Call(callee, args, span) => self.check_call(callee, args, env, *span),
            Expr::Unary(_, inner, _) => {
                self.check_expr(inner, env);
                Type::Unknown
            }
            Expr::Binary(op, lhs, rhs, span) => {
                let lt = self.check_expr(lhs, env);
                let rt = self.check_expr(rhs, env);
                self.check_binary(*op, lt, rt, *span)
            }
            Expr::Match(head, arms, _) => {
                self.check_expr(head, env);
                let mut result = Type::Unknown;
                for arm in arms {
                    if let MatchPattern::Range(a, b) = &arm.pattern {
                        self.check_expr(a, env);
                        self.check_expr(b, env);
                    } else if let MatchPattern::Literal(e) = &arm.pattern {
                        self.check_expr(e, env);
                    }
                    let body_ty = self.check_expr(&arm.body, env);
                    result = result.least_upper_bound(&body_ty);
                }
                result
            }
            Expr::Range(lhs, rhs, _) => {
                self.check_expr(lhs, env);
                self.check_expr(rhs, env);
                Type::Range
            }
            Expr::Score(score, _) => {
                self.check_score(score, env);
                Type::Score
            }
            Expr::Clip(clip, _) => {
                self.check_clip_stmts(&clip.stmts, env);
                Type::Clip
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOp, lhs: Type, rhs: Type, span: Span) -> Type {
        use BinaryOp::*;
        match op {
            Add => match (&lhs, &rhs) {
                (Type::Pos, Type::Dur) | (Type::Dur, Type::Pos) => Type::Pos,
                (Type::Pos, Type::Pos) => {
                    self.report(
                        CheckFinding::TypeMismatch { expected: "Dur".to_string(), found: "Pos".to_string() },
                        span,
                    );
                    Type::Pos
                }
                (Type::Dur, Type::Dur) | (Type::Number, Type::Number) => lhs,
                (Type::String, Type::String) => Type::String,
                (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
                _ => {
                    self.report(
                        CheckFinding::TypeMismatch { expected: format!("{:?}", lhs), found: format!("{:?}", rhs) },
                        span,
                    );
                    Type::Unknown
                }
            },
            Sub => match (&lhs, &rhs) {
                (Type::Pos, Type::Dur) => Type::Pos,
                (Type::Pos, Type::Pos) => Type::Dur,
                (Type::Dur, Type::Dur) | (Type::Number, Type::Number) => lhs,
                (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
                _ => Type::Unknown,
            },
            Mul => match (&lhs, &rhs) {
                (Type::Dur, Type::Number) | (Type::Number, Type::Dur) => Type::Dur,
                (Type::Number, Type::Number) => Type::Number,
                (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
                _ => Type::Unknown,
            },
            Div => match (&lhs, &rhs) {
                (Type::Dur, Type::Dur) => Type::Number,
                (Type::Number, Type::Number) => Type::Dur,
                (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
                _ => Type::Unknown,
            },
            Mod => Type::Number,
            Eq | Ne | Lt | Le | Gt | Ge | And | Or => Type::Bool,
            Coalesce => rhs,
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Arg], env: &mut Env, span: Span) -> Type {
        self.check_expr(callee, env);
        for arg in args {
            self.check_expr(&arg.value, env);
        }
        if let Expr::Identifier(name, _) = callee {
            match name.as_str() {
                "note" => {
                    if let Some(first) = args.first() {
                        self.expect_type(&first.value, env, Type::Pitch, CheckFinding::ExpectedPitch);
                    }
                    if let Some(second) = args.get(1) {
                        self.expect_type(&second.value, env, Type::Dur, CheckFinding::ExpectedDuration);
                    }
                }
                "rest" => {
                    if let Some(first) = args.first() {
                        self.expect_type(&first.value, env, Type::Dur, CheckFinding::ExpectedDuration);
                    }
                }
                _ => {}
            }
        }
        let _ = span;
        Type::Unknown
    }

    fn expect_type(&mut self, expr: &Expr, env: &mut Env, expected: Type, finding: CheckFinding) {
        let actual = self.check_expr(expr, env);
        if actual != Type::Unknown && actual != expected {
            self.report(finding, expr.span());
        }
    }

    fn check_score(&mut self, score: &ScoreExpr, env: &mut Env) {
        let mut sound_ids: Vec<String> = Vec::new();
        let mut sound_kinds: HashMap<String, String> = HashMap::new();
        for item in &score.items {
            if let ScoreItem::Sound(decl) = item {
                if let Expr::StringLit(id, _) = &decl.id {
                    sound_ids.push(id.clone());
                    sound_kinds.insert(id.clone(), decl.kind.clone());
                }
            }
        }

        for item in &score.items {
            match item {
                ScoreItem::Meta(fields, _) => {
                    for (_, value) in fields {
                        self.check_expr(value, env);
                    }
                }
                ScoreItem::Tempo(entries, _) => {
                    for entry in entries {
                        self.expect_type(&entry.pos, env, Type::Pos, CheckFinding::ExpectedPosition);
                        self.expect_type(&entry.bpm, env, Type::Number, CheckFinding::ExpectedNumber);
                        if let Some(unit) = &entry.unit {
                            self.expect_type(unit, env, Type::Dur, CheckFinding::ExpectedDuration);
                        }
                    }
                }
                ScoreItem::Meter(entries, _) => {
                    for entry in entries {
                        self.expect_type(&entry.pos, env, Type::Pos, CheckFinding::ExpectedPosition);
                        self.expect_type(&entry.numerator, env, Type::Number, CheckFinding::ExpectedNumber);
                        self.expect_type(&entry.denominator, env, Type::Number, CheckFinding::ExpectedNumber);
                    }
                }
                ScoreItem::Sound(decl) => {
                    self.check_expr(&decl.id, env);
                    for (_, value) in &decl.fields {
                        self.check_expr(value, env);
                    }
                }
                ScoreItem::Track(track) => {
                    self.check_expr(&track.name, env);
                    self.check_expr(&track.sound, env);
                    if let Expr::StringLit(sound_id, span) = &track.sound {
                        match sound_kinds.get(sound_id) {
                            Some(kind) => {
                                if !role_matches_kind(&track.role, kind) {
                                    self.report(
                                        CheckFinding::RoleMismatch {
                                            message: format!(
                                                "track role '{}' does not match sound kind '{}'",
                                                track.role, kind
                                            ),
                                        },
                                        *span,
                                    );
                                }
                            }
                            None => {
                                self.report(CheckFinding::UnknownSound { id: sound_id.clone() }, *span);
                            }
                        }
                    }
                    for place in &track.placements {
                        self.expect_type(&place.pos, env, Type::Pos, CheckFinding::ExpectedPosition);
                        self.expect_type(&place.clip, env, Type::Clip, CheckFinding::ExpectedClip);
                    }
                }
                ScoreItem::Marker { pos, kind, label, .. } => {
                    self.expect_type(pos, env, Type::Pos, CheckFinding::ExpectedPosition);
                    self.check_expr(kind, env);
                    self.check_expr(label, env);
                }
            }
        }
    }

    fn check_clip_stmts(&mut self, stmts: &[ClipStmt], env: &mut Env) {
        for stmt in stmts {
            self.check_clip_stmt(stmt, env);
        }
    }

    fn check_clip_stmt(&mut self, stmt: &ClipStmt, env: &mut Env) {
        match stmt {
            ClipStmt::At { pos, .. } => self.expect_type(pos, env, Type::Pos, CheckFinding::ExpectedPosition),
            ClipStmt::Rest { dur, .. } => self.expect_type(dur, env, Type::Dur, CheckFinding::ExpectedDuration),
            ClipStmt::Note { pitch, dur, args, .. } => {
                self.expect_type(pitch, env, Type::Pitch, CheckFinding::ExpectedPitch);
                self.expect_type(dur, env, Type::Dur, CheckFinding::ExpectedDuration);
                self.check_named_args(args, env);
            }
            ClipStmt::Chord { pitches, dur, args, .. } => {
                self.check_expr(pitches, env);
                self.expect_type(dur, env, Type::Dur, CheckFinding::ExpectedDuration);
                self.check_named_args(args, env);
            }
            ClipStmt::Hit { key, dur, args, .. } => {
                self.expect_type(key, env, Type::String, CheckFinding::ExpectedString);
                self.expect_type(dur, env, Type::Dur, CheckFinding::ExpectedDuration);
                self.check_named_args(args, env);
            }
            ClipStmt::Breath { dur, args, .. } => {
                self.expect_type(dur, env, Type::Dur, CheckFinding::ExpectedDuration);
                self.check_named_args(args, env);
            }
            ClipStmt::Arp { pitches, unit, dir, .. } => {
                self.check_expr(pitches, env);
                self.expect_type(unit, env, Type::Dur, CheckFinding::ExpectedDuration);
                self.check_expr(dir, env);
            }
            ClipStmt::Triplet { actual, in_time, body, .. } => {
                self.expect_type(actual, env, Type::Number, CheckFinding::ExpectedNumber);
                if let Some(k) = in_time {
                    self.expect_type(k, env, Type::Number, CheckFinding::ExpectedNumber);
                }
                self.check_clip_stmts(body, env);
            }
            ClipStmt::Cc { number, value, .. } => {
                self.check_expr(number, env);
                self.check_expr(value, env);
            }
            ClipStmt::Automation { param, start, end, curve, .. } => {
                self.check_expr(param, env);
                self.expect_type(start, env, Type::Pos, CheckFinding::ExpectedPosition);
                self.expect_type(end, env, Type::Pos, CheckFinding::ExpectedPosition);
                self.expect_type(curve, env, Type::Curve, CheckFinding::ExpectedClip);
            }
            ClipStmt::Marker { kind, label, .. } => {
                self.check_expr(kind, env);
                self.check_expr(label, env);
            }
            ClipStmt::Let(c) | ClipStmt::Const(c) => {
                let ty = self.check_expr(&c.init, env);
                let declared = c.ty.as_ref().map(Type::from_type_expr).unwrap_or(ty);
                self.declare_pattern(&c.pattern, declared, env);
            }
            ClipStmt::For { pattern, iterable, body, .. } => {
                self.check_expr(iterable, env);
                env.push();
                self.declare_pattern(pattern, Type::Unknown, env);
                self.check_clip_stmts(body, env);
                env.pop();
            }
            ClipStmt::If { cond, then_body, else_body, .. } => {
                self.check_expr(cond, env);
                env.push();
                self.check_clip_stmts(then_body, env);
                env.pop();
                if let Some(body) = else_body {
                    env.push();
                    self.check_clip_stmts(body, env);
                    env.pop();
                }
            }
            ClipStmt::Expr(e, _) => {
                self.check_expr(e, env);
            }
        }
    }

    fn check_named_args(&mut self, args: &[Arg], env: &mut Env) {
        for arg in args {
            self.check_expr(&arg.value, env);
        }
    }
}

fn role_matches_kind(role: &str, kind: &str) -> bool {
    matches!(
        (role, kind),
        ("Instrument", "instrument") | ("Drums", "drumKit") | ("Vocal", "vocal") | ("Automation", _)
    ) || kind == "fx"
}

/// Levenshtein edit distance, used only to suggest a fix for
/// `undefined-symbol`. Small and self-contained enough to inline rather
/// than pull in a crate for it.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let temp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = temp;
        }
    }
    row[b.len()]
}

fn suggest(name: &str, candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (c, edit_distance(name, c)))
        .filter(|(c, dist)| *dist <= 2 && !c.is_empty())
        .min_by_key(|(_, dist)| *dist)
        .map(|(c, _)| c.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};
    use std::collections::HashMap;

    fn check_src(src: &str) -> Vec<Diagnostic> {
        let tokens = lexer::tokenize(src).unwrap();
        let (program, errors) = parser::parse(tokens);
        assert!(errors.is_empty(), "{:?}", errors);
        let modules = vec![crate::resolver::ResolvedModule { key: "<main>".to_string(), program }];
        check(&modules, &HashMap::new())
    }

    #[test]
    fn rest_with_position_is_expected_duration_error() {
        let diags = check_src("fn main() { return clip { rest(1:1); }; }");
        assert!(diags.iter().any(|d| d.code == "expected-duration"));
    }

    #[test]
    fn note_with_correct_types_is_clean() {
        let diags = check_src("fn main() { return clip { note(C4, q); }; }");
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn undefined_symbol_reports_suggestion() {
        let diags = check_src("fn main() { return clip { note(C4, q, velocity: velocityy); }; }");
        let finding = diags.iter().find(|d| d.code == "undefined-symbol").unwrap();
        assert!(finding.message.contains("did you mean"));
    }

    #[test]
    fn edit_distance_basic() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("velocity", "velocityy"), 1);
    }
}
