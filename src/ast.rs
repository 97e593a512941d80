//! # Abstract Syntax Tree
//!
//! Typed AST produced by `parser.rs` from a token stream. Every node carries
//! a [`Span`] (reusing [`crate::diagnostics::Position`] — a parse-time
//! position is exactly a diagnostic position) so the checker and evaluator
//! can report precise locations.
//!
//! The AST is never rewritten after parsing: the type checker only reads
//! it (types are advisory, per `SPEC_FULL.md` §4.4), and the evaluator
//! walks it directly rather than lowering it to some other IR — the "IR"
//! in this crate is the *output* document, not an AST-level concept.

use crate::pitch::Pitch;
use crate::pos::PosRef;
use crate::rational::Rat;

/// Reuses the diagnostic position type: a parse-time span is exactly a
/// `{ line, column }` point in this grammar (no end offset is tracked).
pub type Span = crate::diagnostics::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub imports: Vec<ImportDecl>,
    pub body: Vec<TopLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Fn(FnDecl),
    Const(ConstDecl),
    TypeAlias(TypeAliasDecl),
    Enum(EnumDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub exported: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub pattern: Pattern,
    pub ty: Option<TypeExpr>,
    pub init: Expr,
    /// `true` for `let` (reassignable), `false` for `const`.
    pub mutable: bool,
    pub exported: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Name(String),
    Tuple(Vec<Pattern>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<String>,
    pub span: Span,
}

/// A type annotation as written in source. The checker resolves these into
/// `checker::Type`; the AST keeps them as unresolved names since it is
/// never rewritten after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Generic(String, Vec<TypeExpr>),
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub kind: ImportKind,
    pub from: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    /// `import { a, b as c } from "...";`
    Named(Vec<(String, Option<String>)>),
    /// `import * as ns from "...";`
    Namespace(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Return(Option<Expr>, Span),
    If(IfStmt),
    For(ForStmt),
    Assignment(AssignmentStmt),
    Expr(Expr),
    Let(ConstDecl),
    Const(ConstDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    pub else_branch: Option<Box<ElseBranch>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    Block(Block),
    If(IfStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub pattern: Pattern,
    pub iterable: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentStmt {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectItem {
    KeyValue(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: MatchPattern,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchPattern {
    Literal(Expr),
    Range(Expr, Expr),
    Else,
}

/// One segment of a (possibly interpolated) string literal, after the
/// lexer's raw `${...}` text has been re-lexed and re-parsed by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSegment {
    Static(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(i64, Span),
    FloatLit(f64, Span),
    StringLit(String, Span),
    TemplateLit(Vec<TemplateSegment>, Span),
    BoolLit(bool, Span),
    NullLit(Span),
    /// A bare domain-direction keyword (`up`, `down`) used as a value, e.g.
    /// the `dir` argument of `arp(...)`. `true`/`false`/`null` have no
    /// literal syntax of their own — they resolve as ordinary identifiers
    /// bound by the evaluator's global scope — so this is the only place
    /// an `EnumVariant` reaches the AST directly.
    EnumVariantLit(String, Span),
    PitchLit(Pitch, Span),
    DurationLit(Rat, Span),
    BarBeatLit(PosRef, Span),
    Identifier(String, Span),
    Array(Vec<ArrayItem>, Span),
    Tuple(Vec<Expr>, Span),
    Object(Vec<ObjectItem>, Span),
    Member(Box<Expr>, String, Span),
    Index(Box<Expr>, Box<Expr>, Span),
    Call(Box<Expr>, Vec<Arg>, Span),
    Unary(UnaryOp, Box<Expr>, Span),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Span),
    Match(Box<Expr>, Vec<MatchArm>, Span),
    /// Both `..` and `..=` produce the same inclusive-range runtime value;
    /// see the open question resolved in `SPEC_FULL.md` §9(a).
    Range(Box<Expr>, Box<Expr>, Span),
    Score(ScoreExpr, Span),
    Clip(ClipExpr, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit(_, s)
            | Expr::FloatLit(_, s)
            | Expr::StringLit(_, s)
            | Expr::TemplateLit(_, s)
            | Expr::BoolLit(_, s)
            | Expr::NullLit(s)
            | Expr::EnumVariantLit(_, s)
            | Expr::PitchLit(_, s)
            | Expr::DurationLit(_, s)
            | Expr::BarBeatLit(_, s)
            | Expr::Identifier(_, s)
            | Expr::Array(_, s)
            | Expr::Tuple(_, s)
            | Expr::Object(_, s)
            | Expr::Member(_, _, s)
            | Expr::Index(_, _, s)
            | Expr::Call(_, _, s)
            | Expr::Unary(_, _, s)
            | Expr::Binary(_, _, _, s)
            | Expr::Match(_, _, s)
            | Expr::Range(_, _, s)
            | Expr::Score(_, s)
            | Expr::Clip(_, s) => *s,
        }
    }
}

// ---------------------------------------------------------------------
// Score / clip expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreExpr {
    pub items: Vec<ScoreItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreItem {
    Meta(Vec<(String, Expr)>, Span),
    Tempo(Vec<TempoEntry>, Span),
    Meter(Vec<MeterEntry>, Span),
    Sound(SoundDeclNode),
    Track(TrackDeclNode),
    Marker { pos: Expr, kind: Expr, label: Expr, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TempoEntry {
    pub pos: Expr,
    pub bpm: Expr,
    pub unit: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterEntry {
    pub pos: Expr,
    pub numerator: Expr,
    pub denominator: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundDeclNode {
    pub id: Expr,
    pub kind: String,
    pub fields: Vec<(String, Expr)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackDeclNode {
    pub name: Expr,
    pub role: String,
    pub sound: Expr,
    pub placements: Vec<PlaceStmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceStmt {
    pub pos: Expr,
    pub clip: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipExpr {
    pub stmts: Vec<ClipStmt>,
    pub span: Span,
}

/// Clip-body statements. In source these read exactly like function calls
/// (`note(C4, q)`, `rest(e)`, `at(2:1)`, `triplet(3, inTime: 2) { ... }`) —
/// the parser recognizes these names at clip-statement position and builds
/// the dedicated node directly, rather than leaving them as opaque `Call`
/// expressions the evaluator has to pattern-match on by name.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipStmt {
    At { pos: Expr, span: Span },
    Rest { dur: Expr, span: Span },
    Note { pitch: Expr, dur: Expr, args: Vec<Arg>, span: Span },
    Chord { pitches: Expr, dur: Expr, args: Vec<Arg>, span: Span },
    Hit { key: Expr, dur: Expr, args: Vec<Arg>, span: Span },
    Breath { dur: Expr, args: Vec<Arg>, span: Span },
    Arp { pitches: Expr, unit: Expr, dir: Expr, span: Span },
    Triplet { actual: Expr, in_time: Option<Expr>, body: Vec<ClipStmt>, span: Span },
    Cc { number: Expr, value: Expr, span: Span },
    Automation { param: Expr, start: Expr, end: Expr, curve: Expr, span: Span },
    Marker { kind: Expr, label: Expr, span: Span },
    Let(ConstDecl),
    Const(ConstDecl),
    /// Unlike the top-level `ForStmt`, a clip's `for` body is itself a
    /// sequence of clip statements, so `hit`/`note`/`rest`/... nested
    /// inside a loop still advance the enclosing cursor.
    For { pattern: Pattern, iterable: Expr, body: Vec<ClipStmt>, span: Span },
    If { cond: Expr, then_body: Vec<ClipStmt>, else_body: Option<Vec<ClipStmt>>, span: Span },
    Expr(Expr, Span),
}

impl ClipStmt {
    pub fn span(&self) -> Span {
        match self {
            ClipStmt::At { span, .. }
            | ClipStmt::Rest { span, .. }
            | ClipStmt::Note { span, .. }
            | ClipStmt::Chord { span, .. }
            | ClipStmt::Hit { span, .. }
            | ClipStmt::Breath { span, .. }
            | ClipStmt::Arp { span, .. }
            | ClipStmt::Triplet { span, .. }
            | ClipStmt::Cc { span, .. }
            | ClipStmt::Automation { span, .. }
            | ClipStmt::Marker { span, .. }
            | ClipStmt::For { span, .. }
            | ClipStmt::If { span, .. }
            | ClipStmt::Expr(_, span) => *span,
            ClipStmt::Let(c) | ClipStmt::Const(c) => c.span,
        }
    }
}
