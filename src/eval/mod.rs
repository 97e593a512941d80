//! # Evaluator
//!
//! A tree-walking interpreter over [`crate::ast`] producing [`RuntimeValue`]s.
//! `evaluate` drives the whole resolved module graph: each module gets its
//! own child scope of a single shared root (the root carries the always-
//! present intrinsics from [`intrinsics`]); imports bind names from an
//! already-evaluated dependency module's scope straight into the importer's,
//! per the resolver's dependency-first ordering guarantee (`resolver.rs`
//! doc comment) — no second topological sort is needed here.
//!
//! `return` unwinds through nested blocks via [`ExecOutcome`] rather than
//! through `Result::Err`, per the design note in `SPEC_FULL.md` §9
//! ("Non-local return"): a thrown `EvalError` means something actually went
//! wrong, while a `return` is ordinary control flow.

pub mod intrinsics;
pub mod scope;
pub mod value;

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{
    Arg, AssignmentStmt, BinaryOp, Block, ClipExpr, ClipStmt, ConstDecl, Expr, ForStmt, IfStmt, ImportKind, Param,
    Pattern, Program, ScoreExpr, ScoreItem, Stmt, TopLevel, UnaryOp,
};
use crate::error::EvalError;
use crate::pitch::Pitch;
use crate::pos::{PosAtom, PosRef};
use crate::rational::Rat;
use crate::resolver::{ExportTable, ResolvedModule};

use scope::{child_scope, root_scope, Scope};
use value::{
    ClipEvent, ClipValue, EnumVariantValue, FunctionValue, MarkerEventValue, MetaValue, ObjectMap, PlacementValue,
    RuntimeValue, ScoreValue, SoundValue, TempoEventValue, TrackValue,
};

/// Bounds recursive call depth; see `SPEC_FULL.md` §4.5.
pub const MAX_CALL_DEPTH: usize = 512;

/// Safety bound on range-driven `for` loops (the stdlib `range` helper's
/// iteration count is not otherwise bounded by the language itself).
pub const MAX_RANGE_ITERATIONS: i64 = 10_000;

/// Outcome of executing a block or statement: either it ran to completion,
/// or a `return` is unwinding toward the nearest call frame.
enum ExecOutcome {
    Normal,
    Return(RuntimeValue),
}

struct Interpreter {
    depth: std::cell::Cell<usize>,
}

/// Evaluates the resolved module graph's entry point: the exported `main`
/// function of `main_key`, called with zero arguments.
pub fn evaluate(
    modules: &[ResolvedModule],
    exports: &HashMap<String, ExportTable>,
    main_key: &str,
) -> Result<RuntimeValue, EvalError> {
    let interp = Interpreter { depth: std::cell::Cell::new(0) };
    let root = root_scope();
    intrinsics::install(&root);

    let mut module_scopes: HashMap<String, Scope> = HashMap::new();

    for module in modules {
        let scope = child_scope(&root);
        bind_imports(&interp, module, exports, &module_scopes, &scope)?;
        interp.bootstrap_module(module, &scope)?;
        module_scopes.insert(module.key.clone(), scope);
    }

    let main_scope = module_scopes.get(main_key).ok_or_else(|| EvalError::InvalidOperation {
        message: format!("module '{}' was not resolved", main_key),
    })?;
    let main = main_scope.get("main").ok_or_else(|| EvalError::InvalidOperation {
        message: "entry module does not export a function named 'main'".to_string(),
    })?;
    interp.call_value(&main, &[])
}

/// The resolver records modules under their canonical key; a `std:` import's
/// key is the specifier itself. Mirrors `checker::resolved_key` so both
/// stages agree on which module an import binds to.
fn resolved_key(specifier: &str, modules: &HashMap<String, Scope>) -> String {
    modules.keys().find(|k| k.as_str() == specifier).cloned().unwrap_or_else(|| specifier.to_string())
}

fn bind_imports(
    interp: &Interpreter,
    module: &ResolvedModule,
    exports: &HashMap<String, ExportTable>,
    module_scopes: &HashMap<String, Scope>,
    scope: &Scope,
) -> Result<(), EvalError> {
    let _ = interp;
    for import in &module.program.imports {
        let dep_key = resolved_key(&import.from, module_scopes);
        let dep_scope = module_scopes.get(&dep_key).ok_or_else(|| EvalError::InvalidOperation {
            message: format!("module '{}' was imported before it was evaluated", import.from),
        })?;
        match &import.kind {
            ImportKind::Named(names) => {
                for (name, alias) in names {
                    let value = dep_scope.get(name).unwrap_or(RuntimeValue::Null);
                    scope.declare(alias.as_deref().unwrap_or(name), value, false);
                }
            }
            ImportKind::Namespace(alias) => {
                let mut map = ObjectMap::new();
                for name in exported_names(exports, &dep_key) {
                    map.set(&name, dep_scope.get(&name).unwrap_or(RuntimeValue::Null));
                }
                scope.declare(alias, RuntimeValue::object(map), false);
            }
        }
    }
    Ok(())
}

/// Every name the dependency module exports, in declaration order — read
/// straight from the resolver's `ExportTable` (name -> declaration index)
/// rather than re-derived from the dependency's scope bindings, which would
/// expose every top-level name, exported or not.
fn exported_names(exports: &HashMap<String, ExportTable>, dep_key: &str) -> Vec<String> {
    let mut named: Vec<(&String, &usize)> = exports.get(dep_key).map(|table| table.iter().collect()).unwrap_or_default();
    named.sort_by_key(|(_, index)| **index);
    named.into_iter().map(|(name, _)| name.clone()).collect()
}

impl Interpreter {
    /// Declares every top-level function first (closures only need a scope
    /// reference, not forward values), then evaluates `const`/`let`
    /// initializers in source order.
    fn bootstrap_module(&self, module: &ResolvedModule, scope: &Scope) -> Result<(), EvalError> {
        for item in &module.program.body {
            if let TopLevel::Fn(f) = item {
                let closure = RuntimeValue::Function(Rc::new(FunctionValue::Closure {
                    name: f.name.clone(),
                    params: f.params.clone(),
                    body: f.body.clone(),
                    scope: Rc::clone(scope),
                }));
                scope.declare(&f.name, closure, false);
            }
        }
        for item in &module.program.body {
            if let TopLevel::Const(c) = item {
                let value = self.eval_expr(&c.init, scope)?;
                self.bind_pattern(&c.pattern, value, scope, c.mutable)?;
            }
        }
        Ok(())
    }

    fn bind_pattern(&self, pattern: &Pattern, value: RuntimeValue, scope: &Scope, mutable: bool) -> Result<(), EvalError> {
        match pattern {
            Pattern::Name(name) => {
                scope.declare(name, value, mutable);
                Ok(())
            }
            Pattern::Tuple(elems) => {
                let items = match &value {
                    RuntimeValue::Array(items) => items.borrow().clone(),
                    other => {
                        return Err(EvalError::InvalidOperation {
                            message: format!("cannot destructure a {} as a tuple", other.type_name()),
                        })
                    }
                };
                for (i, elem) in elems.iter().enumerate() {
                    let v = items.get(i).cloned().unwrap_or(RuntimeValue::Null);
                    self.bind_pattern(elem, v, scope, mutable)?;
                }
                Ok(())
            }
        }
    }

    fn exec_block(&self, block: &Block, scope: &Scope) -> Result<ExecOutcome, EvalError> {
        for stmt in &block.stmts {
            match self.exec_stmt(stmt, scope)? {
                ExecOutcome::Normal => {}
                ret @ ExecOutcome::Return(_) => return Ok(ret),
            }
        }
        Ok(ExecOutcome::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, scope: &Scope) -> Result<ExecOutcome, EvalError> {
        match stmt {
            Stmt::Return(Some(expr), _) => Ok(ExecOutcome::Return(self.eval_expr(expr, scope)?)),
            Stmt::Return(None, _) => Ok(ExecOutcome::Return(RuntimeValue::Null)),
            Stmt::If(if_stmt) => self.exec_if(if_stmt, scope),
            Stmt::For(for_stmt) => self.exec_for(for_stmt, scope),
            Stmt::Assignment(a) => {
                self.exec_assignment(a, scope)?;
                Ok(ExecOutcome::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr, scope)?;
                Ok(ExecOutcome::Normal)
            }
            Stmt::Let(c) | Stmt::Const(c) => {
                let value = self.eval_expr(&c.init, scope)?;
                self.bind_pattern(&c.pattern, value, scope, c.mutable)?;
                Ok(ExecOutcome::Normal)
            }
        }
    }

    fn exec_if(&self, if_stmt: &IfStmt, scope: &Scope) -> Result<ExecOutcome, EvalError> {
        if self.eval_expr(&if_stmt.cond, scope)?.is_truthy() {
            let inner = child_scope(scope);
            return self.exec_block(&if_stmt.then_block, &inner);
        }
        match &if_stmt.else_branch {
            Some(branch) => match branch.as_ref() {
                crate::ast::ElseBranch::Block(b) => {
                    let inner = child_scope(scope);
                    self.exec_block(b, &inner)
                }
                crate::ast::ElseBranch::If(i) => self.exec_if(i, scope),
            },
            None => Ok(ExecOutcome::Normal),
        }
    }

    fn exec_for(&self, for_stmt: &ForStmt, scope: &Scope) -> Result<ExecOutcome, EvalError> {
        let iterable = self.eval_expr(&for_stmt.iterable, scope)?;
        for item in self.iterate(&iterable)? {
            let inner = child_scope(scope);
            self.bind_pattern(&for_stmt.pattern, item, &inner, false)?;
            match self.exec_block(&for_stmt.body, &inner)? {
                ExecOutcome::Normal => {}
                ret @ ExecOutcome::Return(_) => return Ok(ret),
            }
        }
        Ok(ExecOutcome::Normal)
    }

    /// Produces the concrete sequence a `for` loop walks. Ranges are
    /// inclusive per the open question resolved in `SPEC_FULL.md` §9(a).
    fn iterate(&self, value: &RuntimeValue) -> Result<Vec<RuntimeValue>, EvalError> {
        match value {
            RuntimeValue::Array(items) => Ok(items.borrow().clone()),
            RuntimeValue::Range(lo, hi) => {
                let count = hi.saturating_sub(*lo).saturating_add(1);
                if count > MAX_RANGE_ITERATIONS {
                    return Err(EvalError::InvalidOperation {
                        message: format!("range iteration exceeds the {} item safety limit", MAX_RANGE_ITERATIONS),
                    });
                }
                Ok((*lo..=*hi).map(RuntimeValue::Int).collect())
            }
            RuntimeValue::Object(map) => {
                Ok(map.borrow().keys().map(|k| RuntimeValue::str(k.clone())).collect())
            }
            other => Err(EvalError::InvalidOperation {
                message: format!("cannot iterate over a {}", other.type_name()),
            }),
        }
    }

    fn exec_assignment(&self, a: &AssignmentStmt, scope: &Scope) -> Result<(), EvalError> {
        let value = self.eval_expr(&a.value, scope)?;
        match &a.target {
            Expr::Identifier(name, _) => scope.assign(name, value),
            Expr::Index(base, index, _) => {
                let base_value = self.eval_expr(base, scope)?;
                let index_value = self.eval_expr(index, scope)?;
                match base_value {
                    RuntimeValue::Array(items) => {
                        let i = expect_index(&index_value)?;
                        let mut items = items.borrow_mut();
                        if i == items.len() {
                            items.push(value);
                        } else if i < items.len() {
                            items[i] = value;
                        } else {
                            items.resize(i, RuntimeValue::Null);
                            items.push(value);
                        }
                        Ok(())
                    }
                    RuntimeValue::Object(map) => {
                        let key = match index_value {
                            RuntimeValue::Str(s) => s.to_string(),
                            other => {
                                return Err(EvalError::InvalidOperation {
                                    message: format!("object index must be a String, found {}", other.type_name()),
                                })
                            }
                        };
                        map.borrow_mut().set(&key, value);
                        Ok(())
                    }
                    other => Err(EvalError::InvalidOperation {
                        message: format!("cannot index-assign into a {}", other.type_name()),
                    }),
                }
            }
            Expr::Member(base, field, _) => {
                let base_value = self.eval_expr(base, scope)?;
                match base_value {
                    RuntimeValue::Object(map) => {
                        map.borrow_mut().set(field, value);
                        Ok(())
                    }
                    other => Err(EvalError::InvalidOperation {
                        message: format!("cannot assign a field on a {}", other.type_name()),
                    }),
                }
            }
            _ => Err(EvalError::InvalidOperation { message: "invalid assignment target".to_string() }),
        }
    }

    fn eval_expr(&self, expr: &Expr, scope: &Scope) -> Result<RuntimeValue, EvalError> {
        match expr {
            Expr::IntLit(n, _) => Ok(RuntimeValue::Int(*n)),
            Expr::FloatLit(f, _) => Ok(RuntimeValue::Float(*f)),
            Expr::StringLit(s, _) => Ok(RuntimeValue::str(s.clone())),
            Expr::TemplateLit(segments, _) => {
                let mut out = String::new();
                for seg in segments {
                    match seg {
                        crate::ast::TemplateSegment::Static(s) => out.push_str(s),
                        crate::ast::TemplateSegment::Expr(e) => {
                            out.push_str(&stringify(&self.eval_expr(e, scope)?))
                        }
                    }
                }
                Ok(RuntimeValue::str(out))
            }
            Expr::BoolLit(b, _) => Ok(RuntimeValue::Bool(*b)),
            Expr::NullLit(_) => Ok(RuntimeValue::Null),
            Expr::EnumVariantLit(tag, _) => {
                Ok(RuntimeValue::EnumVariant(Rc::new(EnumVariantValue { tag: tag.clone(), payload: RuntimeValue::Null })))
            }
            Expr::PitchLit(p, _) => Ok(RuntimeValue::Pitch(*p)),
            Expr::DurationLit(r, _) => Ok(RuntimeValue::Rat(*r)),
            Expr::BarBeatLit(pos_ref, _) => Ok(RuntimeValue::Pos(PosAtom::Ref(*pos_ref))),
            Expr::Identifier(name, span) => scope.get(name).ok_or_else(|| EvalError::InvalidOperation {
                message: format!("undefined binding '{}' at line {}, column {}", name, span.line, span.column),
            }),
            Expr::Array(items, _) => {
                let mut out = Vec::new();
                for item in items {
                    match item {
                        crate::ast::ArrayItem::Item(e) => out.push(self.eval_expr(e, scope)?),
                        crate::ast::ArrayItem::Spread(e) => {
                            let value = self.eval_expr(e, scope)?;
                            match value {
                                RuntimeValue::Array(items) => out.extend(items.borrow().iter().cloned()),
                                other => {
                                    return Err(EvalError::InvalidOperation {
                                        message: format!("cannot spread a {} into an array", other.type_name()),
                                    })
                                }
                            }
                        }
                    }
                }
                Ok(RuntimeValue::array(out))
            }
            Expr::Tuple(items, _) => {
                let mut out = Vec::new();
                for item in items {
                    out.push(self.eval_expr(item, scope)?);
                }
                Ok(RuntimeValue::array(out))
            }
            Expr::Object(items, _) => {
                let mut map = ObjectMap::new();
                for item in items {
                    match item {
                        crate::ast::ObjectItem::KeyValue(key, e) => {
                            map.set(key, self.eval_expr(e, scope)?);
                        }
                        crate::ast::ObjectItem::Spread(e) => {
                            let value = self.eval_expr(e, scope)?;
                            match value {
                                RuntimeValue::Object(other) => map.spread_from(&other.borrow()),
                                other => {
                                    return Err(EvalError::InvalidOperation {
                                        message: format!("cannot spread a {} into an object", other.type_name()),
                                    })
                                }
                            }
                        }
                    }
                }
                Ok(RuntimeValue::object(map))
            }
            Expr::Member(base, field, _) => {
                let base_value = self.eval_expr(base, scope)?;
                self.eval_member(&base_value, field)
            }
            Expr::Index(base, index, _) => {
                let base_value = self.eval_expr(base, scope)?;
                let index_value = self.eval_expr(index, scope)?;
                self.eval_index(&base_value, &index_value)
            }
            Expr::Call(callee, args, _) => self.eval_call(callee, args, scope),
            Expr::Unary(op, inner, _) => {
                let value = self.eval_expr(inner, scope)?;
                self.eval_unary(*op, value)
            }
            Expr::Binary(op, lhs, rhs, _) => self.eval_binary(*op, lhs, rhs, scope),
            Expr::Match(head, arms, _) => self.eval_match(head, arms, scope),
            Expr::Range(lhs, rhs, _) => {
                let lo = expect_int_value(&self.eval_expr(lhs, scope)?)?;
                let hi = expect_int_value(&self.eval_expr(rhs, scope)?)?;
                Ok(RuntimeValue::Range(lo, hi))
            }
            Expr::Score(score, _) => self.eval_score(score, scope),
            Expr::Clip(clip, _) => self.eval_clip(clip, scope),
        }
    }

    fn eval_member(&self, base: &RuntimeValue, field: &str) -> Result<RuntimeValue, EvalError> {
        match base {
            RuntimeValue::Object(map) => Ok(map.borrow().get(field)),
            RuntimeValue::Pitch(p) => match field {
                "midi" => Ok(RuntimeValue::Int(p.midi as i64)),
                "cents" => Ok(RuntimeValue::Int(p.cents as i64)),
                _ => Ok(RuntimeValue::Null),
            },
            RuntimeValue::EnumVariant(v) => match field {
                "tag" => Ok(RuntimeValue::str(v.tag.clone())),
                "payload" => Ok(v.payload.clone()),
                _ => Ok(RuntimeValue::Null),
            },
            RuntimeValue::Clip(c) => match field {
                "length" => Ok(RuntimeValue::Rat(c.length.unwrap_or(Rat::ZERO))),
                _ => Ok(RuntimeValue::Null),
            },
            other => Err(EvalError::InvalidOperation {
                message: format!("cannot read field '{}' on a {}", field, other.type_name()),
            }),
        }
    }

    fn eval_index(&self, base: &RuntimeValue, index: &RuntimeValue) -> Result<RuntimeValue, EvalError> {
        match base {
            RuntimeValue::Array(items) => {
                let i = expect_index(index)?;
                Ok(items.borrow().get(i).cloned().unwrap_or(RuntimeValue::Null))
            }
            RuntimeValue::Object(map) => match index {
                RuntimeValue::Str(s) => Ok(map.borrow().get(s)),
                other => Err(EvalError::InvalidOperation {
                    message: format!("object index must be a String, found {}", other.type_name()),
                }),
            },
            other => Err(EvalError::InvalidOperation {
                message: format!("cannot index a {}", other.type_name()),
            }),
        }
    }

    fn eval_call(&self, callee: &Expr, args: &[Arg], scope: &Scope) -> Result<RuntimeValue, EvalError> {
        let callee_value = self.eval_expr(callee, scope)?;
        let mut positional = Vec::new();
        let mut named: Vec<(&str, RuntimeValue)> = Vec::new();
        for arg in args {
            let value = self.eval_expr(&arg.value, scope)?;
            match &arg.name {
                Some(name) => named.push((name.as_str(), value)),
                None => positional.push(value),
            }
        }
        match &callee_value {
            RuntimeValue::Function(f) => match f.as_ref() {
                FunctionValue::Native(_, _) => {
                    if !named.is_empty() {
                        return Err(EvalError::UnknownNamedArgument {
                            name: f.name().to_string(),
                            arg: named[0].0.to_string(),
                        });
                    }
                    self.call_value(&callee_value, &positional)
                }
                FunctionValue::Closure { params, .. } => {
                    let mut full = positional;
                    for (name, value) in named {
                        let slot = params
                            .iter()
                            .position(|p| p.name == name)
                            .filter(|&i| i >= full.len())
                            .ok_or_else(|| EvalError::UnknownNamedArgument {
                                name: f.name().to_string(),
                                arg: name.to_string(),
                            })?;
                        while full.len() <= slot {
                            full.push(RuntimeValue::Null);
                        }
                        full[slot] = value;
                    }
                    self.call_value(&callee_value, &full)
                }
            },
            other => {
                let _ = other;
                Err(EvalError::NonCallable)
            }
        }
    }

    fn call_value(&self, callee: &RuntimeValue, args: &[RuntimeValue]) -> Result<RuntimeValue, EvalError> {
        let f = match callee {
            RuntimeValue::Function(f) => f,
            other => {
                let _ = other;
                return Err(EvalError::NonCallable);
            }
        };
        match f.as_ref() {
            FunctionValue::Native(_, handler) => handler(args),
            FunctionValue::Closure { name, params, body, scope } => {
                if self.depth.get() >= MAX_CALL_DEPTH {
                    return Err(EvalError::StackOverflow { limit: MAX_CALL_DEPTH });
                }
                if args.len() > params.len() {
                    return Err(EvalError::ArityMismatch { name: name.clone(), expected: params.len(), got: args.len() });
                }
                let call_scope = child_scope(scope);
                for (i, param) in params.iter().enumerate() {
                    match args.get(i) {
                        Some(value) => call_scope.declare(&param.name, value.clone(), false),
                        None => {
                            return Err(EvalError::MissingArgument { name: name.clone(), param: param.name.clone() })
                        }
                    }
                }
                self.depth.set(self.depth.get() + 1);
                let outcome = self.exec_block(body, &call_scope);
                self.depth.set(self.depth.get() - 1);
                match outcome? {
                    ExecOutcome::Return(value) => Ok(value),
                    ExecOutcome::Normal => Ok(RuntimeValue::Null),
                }
            }
        }
    }

    fn eval_unary(&self, op: UnaryOp, value: RuntimeValue) -> Result<RuntimeValue, EvalError> {
        match op {
            UnaryOp::Not => Ok(RuntimeValue::Bool(!value.is_truthy())),
            UnaryOp::Neg => match value {
                RuntimeValue::Int(n) => Ok(RuntimeValue::Int(-n)),
                RuntimeValue::Float(f) => Ok(RuntimeValue::Float(-f)),
                RuntimeValue::Rat(r) => Ok(RuntimeValue::Rat(-r)),
                other => Err(EvalError::InvalidOperation {
                    message: format!("cannot negate a {}", other.type_name()),
                }),
            },
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: &Scope) -> Result<RuntimeValue, EvalError> {
        use BinaryOp::*;
        if op == And {
            let l = self.eval_expr(lhs, scope)?;
            return if !l.is_truthy() { Ok(l) } else { self.eval_expr(rhs, scope) };
        }
        if op == Or {
            let l = self.eval_expr(lhs, scope)?;
            return if l.is_truthy() { Ok(l) } else { self.eval_expr(rhs, scope) };
        }
        if op == Coalesce {
            let l = self.eval_expr(lhs, scope)?;
            return if matches!(l, RuntimeValue::Null) { self.eval_expr(rhs, scope) } else { Ok(l) };
        }
        let l = self.eval_expr(lhs, scope)?;
        let r = self.eval_expr(rhs, scope)?;
        match op {
            Add => add(l, r),
            Sub => sub(l, r),
            Mul => mul(l, r),
            Div => div(l, r),
            Mod => modulo(l, r),
            Eq => Ok(RuntimeValue::Bool(values_equal(&l, &r))),
            Ne => Ok(RuntimeValue::Bool(!values_equal(&l, &r))),
            Lt => compare(&l, &r).map(|o| RuntimeValue::Bool(o == std::cmp::Ordering::Less)),
            Le => compare(&l, &r).map(|o| RuntimeValue::Bool(o != std::cmp::Ordering::Greater)),
            Gt => compare(&l, &r).map(|o| RuntimeValue::Bool(o == std::cmp::Ordering::Greater)),
            Ge => compare(&l, &r).map(|o| RuntimeValue::Bool(o != std::cmp::Ordering::Less)),
            And | Or | Coalesce => unreachable!("handled above with short-circuit evaluation"),
        }
    }

    fn eval_match(
        &self,
        head: &Expr,
        arms: &[crate::ast::MatchArm],
        scope: &Scope,
    ) -> Result<RuntimeValue, EvalError> {
        let head_value = self.eval_expr(head, scope)?;
        for arm in arms {
            match &arm.pattern {
                crate::ast::MatchPattern::Literal(e) => {
                    let candidate = self.eval_expr(e, scope)?;
                    if values_equal(&head_value, &candidate) {
                        return self.eval_expr(&arm.body, scope);
                    }
                }
                crate::ast::MatchPattern::Range(lo, hi) => {
                    let lo = expect_int_value(&self.eval_expr(lo, scope)?)?;
                    let hi = expect_int_value(&self.eval_expr(hi, scope)?)?;
                    if let RuntimeValue::Int(n) = head_value {
                        if n >= lo && n <= hi {
                            return self.eval_expr(&arm.body, scope);
                        }
                    }
                }
                crate::ast::MatchPattern::Else => return self.eval_expr(&arm.body, scope),
            }
        }
        Ok(RuntimeValue::Null)
    }

    // -----------------------------------------------------------------
    // Score construction
    // -----------------------------------------------------------------

    fn eval_score(&self, score: &ScoreExpr, scope: &Scope) -> Result<RuntimeValue, EvalError> {
        let mut meta = MetaValue::default();
        let mut tempo_map = Vec::new();
        let mut meter_map = Vec::new();
        let mut sounds = Vec::new();
        let mut tracks = Vec::new();
        let mut markers = Vec::new();

        // Evaluation order is fixed regardless of source order, per
        // spec.md §4.5's "Score construction" steps.
        for item in &score.items {
            if let ScoreItem::Meta(fields, _) = item {
                for (key, value) in fields {
                    let v = self.eval_expr(value, scope)?;
                    match key.as_str() {
                        "title" => meta.title = Some(expect_string(&v)?),
                        "artist" => meta.artist = Some(expect_string(&v)?),
                        "album" => meta.album = Some(expect_string(&v)?),
                        "copyright" => meta.copyright = Some(expect_string(&v)?),
                        other => meta.ext.set(other, v),
                    }
                }
            }
        }
        for item in &score.items {
            if let ScoreItem::Tempo(entries, _) = item {
                for entry in entries {
                    let at = self.eval_pos(&entry.pos, scope)?;
                    let bpm = expect_number(&self.eval_expr(&entry.bpm, scope)?)?;
                    let unit = match &entry.unit {
                        Some(u) => expect_rat(&self.eval_expr(u, scope)?)?,
                        None => Rat::new(1, 4),
                    };
                    tempo_map.push(TempoEventValue { at, bpm, unit });
                }
            }
        }
        for item in &score.items {
            if let ScoreItem::Meter(entries, _) = item {
                for entry in entries {
                    let at = self.eval_pos(&entry.pos, scope)?;
                    let numerator = expect_int_value(&self.eval_expr(&entry.numerator, scope)?)?;
                    let denominator = expect_int_value(&self.eval_expr(&entry.denominator, scope)?)?;
                    meter_map.push(value::MeterEventValue { at, numerator, denominator });
                }
            }
        }
        for item in &score.items {
            if let ScoreItem::Sound(decl) = item {
                let id = expect_string(&self.eval_expr(&decl.id, scope)?)?;
                let mut ext = ObjectMap::new();
                let mut label = None;
                let mut family = None;
                let mut tags = None;
                let mut range = None;
                let mut transposition = None;
                let mut drum_keys = None;
                let mut vocal = None;
                let mut hints = None;
                for (key, expr) in &decl.fields {
                    let v = self.eval_expr(expr, scope)?;
                    match key.as_str() {
                        "label" => label = Some(expect_string(&v)?),
                        "family" => family = Some(expect_string(&v)?),
                        "tags" => tags = Some(v),
                        "range" => range = Some(v),
                        "transposition" => transposition = Some(expect_int_value(&v)?),
                        "drumKeys" => drum_keys = Some(v),
                        "vocal" => vocal = Some(v),
                        "hints" => hints = Some(v),
                        other => ext.set(other, v),
                    }
                }
                sounds.push(SoundValue {
                    id,
                    kind: decl.kind.clone(),
                    label,
                    family,
                    tags,
                    range,
                    transposition,
                    drum_keys,
                    vocal,
                    hints,
                    ext,
                });
            }
        }
        for item in &score.items {
            if let ScoreItem::Track(track) = item {
                let name = expect_string(&self.eval_expr(&track.name, scope)?)?;
                let sound = expect_string(&self.eval_expr(&track.sound, scope)?)?;
                let mut placements = Vec::new();
                for place in &track.placements {
                    let at = self.eval_pos(&place.pos, scope)?;
                    let clip = match self.eval_expr(&place.clip, scope)? {
                        RuntimeValue::Clip(c) => c,
                        other => {
                            return Err(EvalError::InvalidOperation {
                                message: format!("place expects a Clip, found {}", other.type_name()),
                            })
                        }
                    };
                    placements.push(PlacementValue { at, clip });
                }
                tracks.push(TrackValue { name, role: track.role.clone(), sound, mix: None, placements });
            }
        }
        for item in &score.items {
            if let ScoreItem::Marker { pos, kind, label, .. } = item {
                let at = self.eval_pos(pos, scope)?;
                let kind = expect_string(&self.eval_expr(kind, scope)?)?;
                let label = expect_string(&self.eval_expr(label, scope)?)?;
                markers.push(MarkerEventValue { pos: at, kind, label });
            }
        }

        Ok(RuntimeValue::Score(Rc::new(ScoreValue { meta, tempo_map, meter_map, sounds, tracks, markers })))
    }

    /// Evaluates an expression expected to produce a `Pos`: either a literal
    /// bar:beat reference (kept symbolic) or an already-resolved `Rat`.
    fn eval_pos(&self, expr: &Expr, scope: &Scope) -> Result<PosAtom, EvalError> {
        match self.eval_expr(expr, scope)? {
            RuntimeValue::Pos(p) => Ok(p),
            RuntimeValue::Rat(r) => Ok(PosAtom::Resolved(r)),
            RuntimeValue::Int(n) => Ok(PosAtom::Resolved(Rat::from_int(n))),
            other => Err(EvalError::InvalidOperation {
                message: format!("expected a Pos value, found {}", other.type_name()),
            }),
        }
    }

    // -----------------------------------------------------------------
    // Clip construction
    // -----------------------------------------------------------------

    fn eval_clip(&self, clip: &ClipExpr, scope: &Scope) -> Result<RuntimeValue, EvalError> {
        let mut events = Vec::new();
        let mut cursor = Rat::ZERO;
        let inner = child_scope(scope);
        self.exec_clip_stmts(&clip.stmts, &inner, &mut events, &mut cursor, Rat::ONE)?;
        Ok(RuntimeValue::Clip(Rc::new(ClipValue { events, length: Some(cursor) })))
    }

    /// `time_scale` implements `triplet`'s "scale each statement's time
    /// contribution" rule: every duration a nested statement would have
    /// advanced the cursor by is multiplied by `k / n` before being applied.
    fn exec_clip_stmts(
        &self,
        stmts: &[ClipStmt],
        scope: &Scope,
        events: &mut Vec<ClipEvent>,
        cursor: &mut Rat,
        time_scale: Rat,
    ) -> Result<(), EvalError> {
        for stmt in stmts {
            self.exec_clip_stmt(stmt, scope, events, cursor, time_scale)?;
        }
        Ok(())
    }

    fn exec_clip_stmt(
        &self,
        stmt: &ClipStmt,
        scope: &Scope,
        events: &mut Vec<ClipEvent>,
        cursor: &mut Rat,
        time_scale: Rat,
    ) -> Result<(), EvalError> {
        match stmt {
            ClipStmt::At { pos, .. } => {
                *cursor = self.eval_clip_rat(pos, scope)?;
                Ok(())
            }
            ClipStmt::Rest { dur, .. } => {
                let dur = expect_rat(&self.eval_expr(dur, scope)?)? * time_scale;
                *cursor = *cursor + dur;
                Ok(())
            }
            ClipStmt::Note { pitch, dur, args, .. } => {
                let pitch = match self.eval_expr(pitch, scope)? {
                    RuntimeValue::Pitch(p) => p,
                    other => {
                        return Err(EvalError::InvalidOperation {
                            message: format!("note expects a Pitch, found {}", other.type_name()),
                        })
                    }
                };
                let dur = expect_rat(&self.eval_expr(dur, scope)?)? * time_scale;
                let mut ev = ObjectMap::new();
                ev.set("type", RuntimeValue::str("note"));
                ev.set("start", RuntimeValue::Rat(*cursor));
                ev.set("dur", RuntimeValue::Rat(dur));
                ev.set("pitch", RuntimeValue::Pitch(pitch));
                self.apply_named_args(&mut ev, args, scope)?;
                events.push(ev);
                *cursor = *cursor + dur;
                Ok(())
            }
            ClipStmt::Chord { pitches, dur, args, .. } => {
                let pitches = self.eval_expr(pitches, scope)?;
                let dur = expect_rat(&self.eval_expr(dur, scope)?)? * time_scale;
                let mut ev = ObjectMap::new();
                ev.set("type", RuntimeValue::str("chord"));
                ev.set("start", RuntimeValue::Rat(*cursor));
                ev.set("dur", RuntimeValue::Rat(dur));
                ev.set("pitches", pitches);
                self.apply_named_args(&mut ev, args, scope)?;
                events.push(ev);
                *cursor = *cursor + dur;
                Ok(())
            }
            ClipStmt::Hit { key, dur, args, .. } => {
                let key = expect_string(&self.eval_expr(key, scope)?)?;
                let dur = expect_rat(&self.eval_expr(dur, scope)?)? * time_scale;
                let mut ev = ObjectMap::new();
                ev.set("type", RuntimeValue::str("drumHit"));
                ev.set("start", RuntimeValue::Rat(*cursor));
                ev.set("dur", RuntimeValue::Rat(dur));
                ev.set("key", RuntimeValue::str(key));
                self.apply_named_args(&mut ev, args, scope)?;
                events.push(ev);
                *cursor = *cursor + dur;
                Ok(())
            }
            ClipStmt::Breath { dur, args, .. } => {
                let dur = expect_rat(&self.eval_expr(dur, scope)?)? * time_scale;
                let mut ev = ObjectMap::new();
                ev.set("type", RuntimeValue::str("breath"));
                ev.set("start", RuntimeValue::Rat(*cursor));
                ev.set("dur", RuntimeValue::Rat(dur));
                self.apply_named_args(&mut ev, args, scope)?;
                events.push(ev);
                *cursor = *cursor + dur;
                Ok(())
            }
            ClipStmt::Arp { pitches, unit, dir, .. } => {
                let pitches = match self.eval_expr(pitches, scope)? {
                    RuntimeValue::Array(items) => items.borrow().clone(),
                    other => {
                        return Err(EvalError::InvalidOperation {
                            message: format!("arp expects an Array of Pitch, found {}", other.type_name()),
                        })
                    }
                };
                let unit = expect_rat(&self.eval_expr(unit, scope)?)? * time_scale;
                let descending = match self.eval_expr(dir, scope)? {
                    RuntimeValue::EnumVariant(v) => v.tag == "down",
                    _ => false,
                };
                let mut ordered = pitches;
                if descending {
                    ordered.reverse();
                }
                for pitch in ordered {
                    let pitch = match pitch {
                        RuntimeValue::Pitch(p) => p,
                        other => {
                            return Err(EvalError::InvalidOperation {
                                message: format!("arp expects Pitch elements, found {}", other.type_name()),
                            })
                        }
                    };
                    let mut ev = ObjectMap::new();
                    ev.set("type", RuntimeValue::str("note"));
                    ev.set("start", RuntimeValue::Rat(*cursor));
                    ev.set("dur", RuntimeValue::Rat(unit));
                    ev.set("pitch", RuntimeValue::Pitch(pitch));
                    events.push(ev);
                    *cursor = *cursor + unit;
                }
                Ok(())
            }
            ClipStmt::Triplet { actual, in_time, body, .. } => {
                let actual = expect_int_value(&self.eval_expr(actual, scope)?)?;
                let in_time = match in_time {
                    Some(k) => expect_int_value(&self.eval_expr(k, scope)?)?,
                    None => 2,
                };
                let scale = time_scale * Rat::new(in_time, actual);
                let inner = child_scope(scope);
                self.exec_clip_stmts(body, &inner, events, cursor, scale)
            }
            ClipStmt::Cc { number, value, .. } => {
                let number = self.eval_expr(number, scope)?;
                let value = self.eval_expr(value, scope)?;
                let mut ev = ObjectMap::new();
                ev.set("type", RuntimeValue::str("control"));
                ev.set("start", RuntimeValue::Rat(*cursor));
                ev.set("kind", RuntimeValue::str("cc"));
                let mut data = ObjectMap::new();
                data.set("number", number);
                data.set("value", value);
                ev.set("data", RuntimeValue::object(data));
                events.push(ev);
                Ok(())
            }
            ClipStmt::Automation { param, start, end, curve, .. } => {
                let param = expect_string(&self.eval_expr(param, scope)?)?;
                let start = self.eval_clip_rat(start, scope)?;
                let end = self.eval_clip_rat(end, scope)?;
                let curve = self.eval_expr(curve, scope)?;
                let mut ev = ObjectMap::new();
                ev.set("type", RuntimeValue::str("automation"));
                ev.set("param", RuntimeValue::str(param));
                ev.set("start", RuntimeValue::Rat(start));
                ev.set("end", RuntimeValue::Rat(end));
                ev.set("curve", curve);
                events.push(ev);
                Ok(())
            }
            ClipStmt::Marker { kind, label, .. } => {
                let kind = expect_string(&self.eval_expr(kind, scope)?)?;
                let label = expect_string(&self.eval_expr(label, scope)?)?;
                let mut ev = ObjectMap::new();
                ev.set("type", RuntimeValue::str("marker"));
                ev.set("pos", RuntimeValue::Rat(*cursor));
                ev.set("kind", RuntimeValue::str(kind));
                ev.set("label", RuntimeValue::str(label));
                events.push(ev);
                Ok(())
            }
            ClipStmt::Let(c) | ClipStmt::Const(c) => {
                let value = self.eval_expr(&c.init, scope)?;
                self.bind_pattern(&c.pattern, value, scope, c.mutable)
            }
            ClipStmt::For { pattern, iterable, body, .. } => {
                let iterable = self.eval_expr(iterable, scope)?;
                for item in self.iterate(&iterable)? {
                    let inner = child_scope(scope);
                    self.bind_pattern(pattern, item, &inner, false)?;
                    self.exec_clip_stmts(body, &inner, events, cursor, time_scale)?;
                }
                Ok(())
            }
            ClipStmt::If { cond, then_body, else_body, .. } => {
                if self.eval_expr(cond, scope)?.is_truthy() {
                    let inner = child_scope(scope);
                    self.exec_clip_stmts(then_body, &inner, events, cursor, time_scale)
                } else if let Some(body) = else_body {
                    let inner = child_scope(scope);
                    self.exec_clip_stmts(body, &inner, events, cursor, time_scale)
                } else {
                    Ok(())
                }
            }
            ClipStmt::Expr(e, _) => {
                self.eval_expr(e, scope)?;
                Ok(())
            }
        }
    }

    fn apply_named_args(&self, ev: &mut ObjectMap, args: &[Arg], scope: &Scope) -> Result<(), EvalError> {
        for arg in args {
            let name = arg.name.as_deref().ok_or_else(|| EvalError::InvalidOperation {
                message: "musical event arguments must be named (e.g. velocity: 0.8)".to_string(),
            })?;
            let value = self.eval_expr(&arg.value, scope)?;
            ev.set(name, value);
        }
        Ok(())
    }

    /// `at(pos)`, and `automation`'s `start`/`end`, accept either an
    /// already-resolved `Rat` or a `Pos` literal that happens to already be
    /// resolved — a still-symbolic bar:beat reference can't be converted to
    /// a clip-relative offset without the enclosing score's meter map, which
    /// doesn't exist yet at clip-evaluation time.
    fn eval_clip_rat(&self, expr: &Expr, scope: &Scope) -> Result<Rat, EvalError> {
        match self.eval_expr(expr, scope)? {
            RuntimeValue::Rat(r) => Ok(r),
            RuntimeValue::Int(n) => Ok(Rat::from_int(n)),
            RuntimeValue::Pos(PosAtom::Resolved(r)) => Ok(r),
            RuntimeValue::Pos(_) => Err(EvalError::InvalidOperation {
                message: "a clip-internal position must resolve to a plain Dur; bar:beat references are only valid at score scope".to_string(),
            }),
            other => Err(EvalError::InvalidOperation {
                message: format!("expected a Dur or resolved Pos, found {}", other.type_name()),
            }),
        }
    }
}

fn expect_index(value: &RuntimeValue) -> Result<usize, EvalError> {
    match value {
        RuntimeValue::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(EvalError::InvalidOperation {
            message: format!("array index must be a non-negative integer, found {}", other.type_name()),
        }),
    }
}

fn expect_string(value: &RuntimeValue) -> Result<String, EvalError> {
    match value {
        RuntimeValue::Str(s) => Ok(s.to_string()),
        other => Err(EvalError::InvalidOperation {
            message: format!("expected a String, found {}", other.type_name()),
        }),
    }
}

fn expect_number(value: &RuntimeValue) -> Result<f64, EvalError> {
    match value {
        RuntimeValue::Int(n) => Ok(*n as f64),
        RuntimeValue::Float(f) => Ok(*f),
        RuntimeValue::Rat(r) => Ok(r.to_f64()),
        other => Err(EvalError::InvalidOperation {
            message: format!("expected a Number, found {}", other.type_name()),
        }),
    }
}

fn expect_int_value(value: &RuntimeValue) -> Result<i64, EvalError> {
    match value {
        RuntimeValue::Int(n) => Ok(*n),
        RuntimeValue::Rat(r) if r.d == 1 => Ok(r.n),
        other => Err(EvalError::InvalidOperation {
            message: format!("expected an integer, found {}", other.type_name()),
        }),
    }
}

fn expect_rat(value: &RuntimeValue) -> Result<Rat, EvalError> {
    match value {
        RuntimeValue::Rat(r) => Ok(*r),
        RuntimeValue::Int(n) => Ok(Rat::from_int(*n)),
        other => Err(EvalError::InvalidOperation {
            message: format!("expected a Dur, found {}", other.type_name()),
        }),
    }
}

/// Binary `+`. Implements the Pos/Dur/Number cross-type table in
/// `SPEC_FULL.md` §4.4 verbatim; exact-type arms come before the generic
/// `Int`/`Float` fallback so integer addition doesn't get promoted to float.
fn add(l: RuntimeValue, r: RuntimeValue) -> Result<RuntimeValue, EvalError> {
    use RuntimeValue::*;
    match (l, r) {
        (Pos(_), Pos(_)) => Err(EvalError::PosPlusPos),
        (Pos(p), Rat(d)) => Ok(Pos(p.add_duration(d))),
        (Rat(d), Pos(p)) => Ok(Pos(p.add_duration(d))),
        (Pos(p), Int(n)) => Ok(Pos(p.add_duration(Rat::from_int(n)))),
        (Int(n), Pos(p)) => Ok(Pos(p.add_duration(Rat::from_int(n)))),
        (Int(a), Int(b)) => Ok(Int(a + b)),
        (Rat(a), Rat(b)) => Ok(Rat(a + b)),
        (Rat(a), Int(b)) => Ok(Rat(a + Rat::from_int(b))),
        (Int(a), Rat(b)) => Ok(Rat(Rat::from_int(a) + b)),
        (Str(a), Str(b)) => Ok(Str(format!("{}{}", a, b).into())),
        (Float(a), Float(b)) => Ok(Float(a + b)),
        (Float(a), Int(b)) => Ok(Float(a + b as f64)),
        (Int(a), Float(b)) => Ok(Float(a as f64 + b)),
        (Float(a), Rat(b)) => Ok(Float(a + b.to_f64())),
        (Rat(a), Float(b)) => Ok(Float(a.to_f64() + b)),
        (a, b) => Err(EvalError::InvalidOperation {
            message: format!("cannot add a {} and a {}", a.type_name(), b.type_name()),
        }),
    }
}

fn sub(l: RuntimeValue, r: RuntimeValue) -> Result<RuntimeValue, EvalError> {
    use RuntimeValue::*;
    match (l, r) {
        (Pos(PosAtom::Resolved(a)), Pos(PosAtom::Resolved(b))) => Ok(Rat(a - b)),
        (Pos(_), Pos(_)) => Err(EvalError::InvalidOperation {
            message: "subtracting two symbolic positions requires a meter map, which isn't known until normalization".to_string(),
        }),
        (Pos(p), Rat(d)) => Ok(Pos(p.sub_duration(d))),
        (Pos(p), Int(n)) => Ok(Pos(p.sub_duration(Rat::from_int(n)))),
        (Int(a), Int(b)) => Ok(Int(a - b)),
        (Rat(a), Rat(b)) => Ok(Rat(a - b)),
        (Rat(a), Int(b)) => Ok(Rat(a - Rat::from_int(b))),
        (Int(a), Rat(b)) => Ok(Rat(Rat::from_int(a) - b)),
        (Float(a), Float(b)) => Ok(Float(a - b)),
        (Float(a), Int(b)) => Ok(Float(a - b as f64)),
        (Int(a), Float(b)) => Ok(Float(a as f64 - b)),
        (Float(a), Rat(b)) => Ok(Float(a - b.to_f64())),
        (Rat(a), Float(b)) => Ok(Float(a.to_f64() - b)),
        (a, b) => Err(EvalError::InvalidOperation {
            message: format!("cannot subtract a {} from a {}", b.type_name(), a.type_name()),
        }),
    }
}

fn mul(l: RuntimeValue, r: RuntimeValue) -> Result<RuntimeValue, EvalError> {
    use RuntimeValue::*;
    match (l, r) {
        (Int(a), Int(b)) => Ok(Int(a * b)),
        (Rat(a), Rat(b)) => Ok(Rat(a * b)),
        (Rat(a), Int(b)) => Ok(Rat(a * Rat::from_int(b))),
        (Int(a), Rat(b)) => Ok(Rat(Rat::from_int(a) * b)),
        (Rat(a), Float(b)) => Ok(Rat(a * Rat::from_f64_approx(b))),
        (Float(a), Rat(b)) => Ok(Rat(Rat::from_f64_approx(a) * b)),
        (Float(a), Float(b)) => Ok(Float(a * b)),
        (Float(a), Int(b)) => Ok(Float(a * b as f64)),
        (Int(a), Float(b)) => Ok(Float(a as f64 * b)),
        (a, b) => Err(EvalError::InvalidOperation {
            message: format!("cannot multiply a {} and a {}", a.type_name(), b.type_name()),
        }),
    }
}

fn div(l: RuntimeValue, r: RuntimeValue) -> Result<RuntimeValue, EvalError> {
    use RuntimeValue::*;
    match (l, r) {
        (Int(_), Int(0)) => Err(EvalError::DivideByZero),
        // Integer / integer always produces an exact `Rat`, never a float;
        // see the "Integer-to-rational coercion" design note.
        (Int(a), Int(b)) => Ok(Rat(Rat::new(a, b))),
        (Rat(a), Rat(b)) => a.checked_div(b).map(Rat).ok_or(EvalError::DivideByZero),
        (Rat(a), Int(b)) => a.checked_div(Rat::from_int(b)).map(Rat).ok_or(EvalError::DivideByZero),
        (Int(a), Rat(b)) => Rat::from_int(a).checked_div(b).map(Rat).ok_or(EvalError::DivideByZero),
        (Float(a), Float(b)) => Ok(Float(a / b)),
        (Float(a), Int(b)) => Ok(Float(a / b as f64)),
        (Int(a), Float(b)) => Ok(Float(a as f64 / b)),
        (Float(a), Rat(b)) => Ok(Float(a / b.to_f64())),
        (Rat(a), Float(b)) => Ok(Float(a.to_f64() / b)),
        (a, b) => Err(EvalError::InvalidOperation {
            message: format!("cannot divide a {} by a {}", a.type_name(), b.type_name()),
        }),
    }
}

/// Truncating (sign-of-dividend) remainder, matching Rust's native `%` —
/// `std:theory`'s `degree()` manually corrects negative remainders, which
/// would be dead code under a always-non-negative `rem_euclid`.
fn modulo(l: RuntimeValue, r: RuntimeValue) -> Result<RuntimeValue, EvalError> {
    use RuntimeValue::*;
    match (l, r) {
        (Int(_), Int(0)) => Err(EvalError::DivideByZero),
        (Int(a), Int(b)) => Ok(Int(a % b)),
        (a, b) => {
            let a = expect_number(&a)?;
            let b = expect_number(&b)?;
            Ok(Float(a % b))
        }
    }
}

fn values_equal(l: &RuntimeValue, r: &RuntimeValue) -> bool {
    use RuntimeValue::*;
    match (l, r) {
        (Int(a), Int(b)) => a == b,
        (Float(a), Float(b)) => a == b,
        (Int(a), Float(b)) | (Float(b), Int(a)) => *a as f64 == *b,
        (Rat(a), Rat(b)) => a == b,
        (Bool(a), Bool(b)) => a == b,
        (Str(a), Str(b)) => a == b,
        (Null, Null) => true,
        (Pitch(a), Pitch(b)) => a == b,
        (EnumVariant(a), EnumVariant(b)) => a.tag == b.tag,
        (Array(a), Array(b)) => {
            let a = a.borrow();
            let b = b.borrow();
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        _ => false,
    }
}

fn compare(l: &RuntimeValue, r: &RuntimeValue) -> Result<std::cmp::Ordering, EvalError> {
    use RuntimeValue::*;
    match (l, r) {
        (Int(a), Int(b)) => Ok(a.cmp(b)),
        (Rat(a), Rat(b)) => Ok(a.cmp(b)),
        (Str(a), Str(b)) => Ok(a.cmp(b)),
        _ => {
            let a = expect_number(l)?;
            let b = expect_number(r)?;
            a.partial_cmp(&b).ok_or_else(|| EvalError::InvalidOperation { message: "cannot compare NaN".to_string() })
        }
    }
}

/// Renders a runtime value for template-literal interpolation, per the
/// coercion rule in spec.md §4.5: numbers without trailing zeros, rationals
/// to three decimal places, booleans as `true`/`false`, `null` as empty.
pub fn stringify(value: &RuntimeValue) -> String {
    match value {
        RuntimeValue::Int(n) => n.to_string(),
        RuntimeValue::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        RuntimeValue::Rat(r) => format!("{:.3}", r.to_f64()),
        RuntimeValue::Bool(b) => b.to_string(),
        RuntimeValue::Str(s) => s.to_string(),
        RuntimeValue::Null => String::new(),
        RuntimeValue::Pos(PosAtom::Resolved(r)) => format!("{:.3}", r.to_f64()),
        RuntimeValue::Pos(PosAtom::Ref(PosRef { bar, beat })) => format!("{}:{}", bar, beat),
        RuntimeValue::Pos(PosAtom::RefPlus(PosRef { bar, beat }, offset)) => {
            format!("{}:{}+{:.3}", bar, beat, offset.to_f64())
        }
        RuntimeValue::Pitch(p) => format!("midi{}", p.midi),
        RuntimeValue::Array(items) => {
            let parts: Vec<String> = items.borrow().iter().map(stringify).collect();
            format!("[{}]", parts.join(", "))
        }
        RuntimeValue::Object(map) => {
            let parts: Vec<String> = map.borrow().entries().map(|(k, v)| format!("{}: {}", k, stringify(v))).collect();
            format!("{{{}}}", parts.join(", "))
        }
        RuntimeValue::Function(f) => format!("<fn {}>", f.name()),
        RuntimeValue::Range(lo, hi) => format!("{}..{}", lo, hi),
        RuntimeValue::Clip(c) => format!("<clip {} events>", c.events.len()),
        RuntimeValue::Score(_) => "<score>".to_string(),
        RuntimeValue::Curve(c) => format!("<curve {} points>", c.points.len()),
        RuntimeValue::Lyric(l) => l.text.clone(),
        RuntimeValue::LyricToken(t) => t.text.clone(),
        RuntimeValue::Rng(_) => "<rng>".to_string(),
        RuntimeValue::EnumVariant(v) => v.tag.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{self, BuiltinProvider};

    fn eval_main(src: &str) -> RuntimeValue {
        let outcome = resolver::resolve(src, &BuiltinProvider).expect("resolution should succeed");
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        evaluate(&outcome.modules, &outcome.exports, &outcome.main_key).expect("evaluation should succeed")
    }

    #[test]
    fn integer_division_produces_an_exact_rational() {
        let value = eval_main("fn main() { return 3 / 2; }");
        assert!(matches!(value, RuntimeValue::Rat(r) if r == Rat::new(3, 2)));
    }

    #[test]
    fn closures_capture_mutable_bindings_by_reference() {
        let value = eval_main(
            r#"
            fn counter() {
                let n = 0;
                n = n + 1;
                n = n + 1;
                return n;
            }
            fn main() { return counter(); }
            "#,
        );
        assert!(matches!(value, RuntimeValue::Int(2)));
    }

    #[test]
    fn named_arguments_bind_after_positional_ones() {
        let value = eval_main(
            r#"
            fn note(pitch, dur, velocity) { return velocity; }
            fn main() { return note(1, 2, velocity: 9); }
            "#,
        );
        assert!(matches!(value, RuntimeValue::Int(9)));
    }

    #[test]
    fn clip_note_advances_the_cursor() {
        let value = eval_main("fn main() { return clip { note(C4, q); note(E4, q); }; }");
        match value {
            RuntimeValue::Clip(c) => {
                assert_eq!(c.events.len(), 2);
                assert_eq!(c.events[1].get("start"), RuntimeValue::Rat(Rat::new(1, 4)));
            }
            other => panic!("expected a Clip, got {:?}", other),
        }
    }

    #[test]
    fn stdlib_concat_shifts_and_extends() {
        let value = eval_main(
            r#"
            import { concat } from "std:core";
            fn main() {
                return concat(clip { note(C4, q); }, clip { note(E4, h); });
            }
            "#,
        );
        match value {
            RuntimeValue::Clip(c) => {
                assert_eq!(c.events.len(), 2);
                assert_eq!(c.events[1].get("start"), RuntimeValue::Rat(Rat::new(1, 4)));
                assert_eq!(c.length, Some(Rat::new(3, 4)));
            }
            other => panic!("expected a Clip, got {:?}", other),
        }
    }

    #[test]
    fn range_is_inclusive_in_for_loops() {
        let value = eval_main(
            r#"
            fn main() {
                let total = 0;
                for (i in 0..3) {
                    total = total + i;
                }
                return total;
            }
            "#,
        );
        assert!(matches!(value, RuntimeValue::Int(6)));
    }

    #[test]
    fn namespace_import_binds_an_object_of_every_export() {
        let value = eval_main(
            r#"
            import * as core from "std:core";
            fn main() {
                return core.concat(clip { note(C4, q); }, clip { note(E4, h); });
            }
            "#,
        );
        match value {
            RuntimeValue::Clip(c) => {
                assert_eq!(c.events.len(), 2);
                assert_eq!(c.length, Some(Rat::new(3, 4)));
            }
            other => panic!("expected a Clip, got {:?}", other),
        }
    }

    #[test]
    fn triplet_scales_duration_by_an_exact_rational() {
        let value = eval_main("fn main() { return clip { triplet(3) { note(C4, q); } }; }");
        match value {
            RuntimeValue::Clip(c) => {
                assert_eq!(c.events[0].get("dur"), RuntimeValue::Rat(Rat::new(1, 4) * Rat::new(2, 3)));
            }
            other => panic!("expected a Clip, got {:?}", other),
        }
    }

    #[test]
    fn stack_overflow_is_reported_past_the_call_depth_limit() {
        let outcome = resolver::resolve(
            "fn recurse(n) { return recurse(n + 1); } fn main() { return recurse(0); }",
            &BuiltinProvider,
        )
        .unwrap();
        let err = evaluate(&outcome.modules, &outcome.exports, &outcome.main_key).unwrap_err();
        assert!(matches!(err, EvalError::StackOverflow { .. }));
    }
}
