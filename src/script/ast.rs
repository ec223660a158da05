//! The parsed form of a script.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::parsing::Span;
use crate::value::Value;

/// Index of a [Block] in the block arena of a [Program].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// A parsed script.
///
/// Nested blocks are stored in a flat arena and referred to by [BlockId], so an
/// execution can keep plain indices into the program while the program itself is
/// shared and never changes after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub blocks: Vec<Block>,
    pub root: BlockId,
}

impl Program {
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Statement at `index` of block `id`, if there is one.
    pub fn statement(&self, id: BlockId, index: usize) -> Option<&StatementEntry> {
        self.blocks.get(id.0).and_then(|block| block.statements.get(index))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub statements: Vec<StatementEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementEntry {
    pub statement: Statement,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Call into the device emulator.
    DeviceCall {
        method: DeviceMethod,
        args: Vec<Expr>,
    },

    /// Cooperative pause.
    Sleep {
        duration: Expr,
        unit: SleepUnit,
    },

    /// `name = value`, or `name op= value` when `op` is set.
    Assign {
        name: String,
        op: Option<BinaryOp>,
        value: Expr,
    },

    If {
        condition: Expr,
        then_block: BlockId,
        else_block: Option<BlockId>,
    },

    Repeat {
        kind: RepeatKind,
        body: BlockId,
    },

    Break,
    Continue,
    Pass,

    /// An expression evaluated for nothing but its value, which is discarded.
    Expression(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SleepUnit {
    Seconds,
    Milliseconds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepeatKind {
    /// `for variable in range(start, stop)`. The bounds are evaluated once on entry.
    Count {
        variable: Option<String>,
        start: Expr,
        stop: Expr,
    },

    /// `while condition`. The condition is evaluated before every iteration.
    While(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    /// An `f"..."` string.
    Format(Vec<FormatPart>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Builtin,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormatPart {
    Text(String),
    Hole(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

/// The fixed set of device operations a script can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceMethod {
    FillScreen,
    DrawString,
    FillRect,
    DrawRect,
    FillCircle,
    DrawCircle,
    DrawLine,
    DrawPixel,
    Tone,
    NoTone,
    Print,
}

/// Functions usable inside expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Str,
    Int,
    Abs,
    Min,
    Max,
    ReadButton,
    ButtonA,
    ButtonB,
    ReadTiltX,
    ReadTiltY,
    ReadTiltZ,
    Color565,
}

/// Number of arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arity {
    pub min: usize,
    /// `None` for any number of arguments.
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Arity {
        Arity { min: n, max: Some(n) }
    }

    pub const fn between(min: usize, max: usize) -> Arity {
        Arity { min, max: Some(max) }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map(|max| count <= max).unwrap_or(true)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "any number of"),
        }
    }
}

/// Anything a name in call position can refer to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Callable {
    Device(DeviceMethod),
    Sleep(SleepUnit),
    Builtin(Builtin),
}

impl Callable {
    pub fn arity(&self) -> Arity {
        match self {
            Callable::Device(method) => method.arity(),
            Callable::Sleep(_) => Arity::exactly(1),
            Callable::Builtin(builtin) => builtin.arity(),
        }
    }
}

impl DeviceMethod {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceMethod::FillScreen => "fillScreen",
            DeviceMethod::DrawString => "drawString",
            DeviceMethod::FillRect => "fillRect",
            DeviceMethod::DrawRect => "drawRect",
            DeviceMethod::FillCircle => "fillCircle",
            DeviceMethod::DrawCircle => "drawCircle",
            DeviceMethod::DrawLine => "drawLine",
            DeviceMethod::DrawPixel => "drawPixel",
            DeviceMethod::Tone => "tone",
            DeviceMethod::NoTone => "noTone",
            DeviceMethod::Print => "print",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            DeviceMethod::FillScreen => Arity::exactly(1),
            DeviceMethod::DrawString => Arity::between(4, 5),
            DeviceMethod::FillRect | DeviceMethod::DrawRect => Arity::exactly(5),
            DeviceMethod::FillCircle | DeviceMethod::DrawCircle => Arity::exactly(4),
            DeviceMethod::DrawLine => Arity::exactly(5),
            DeviceMethod::DrawPixel => Arity::exactly(3),
            DeviceMethod::Tone => Arity::exactly(2),
            DeviceMethod::NoTone => Arity::exactly(0),
            DeviceMethod::Print => Arity { min: 0, max: None },
        }
    }
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::ReadButton => "readButton",
            Builtin::ButtonA => "buttonA",
            Builtin::ButtonB => "buttonB",
            Builtin::ReadTiltX => "readTiltX",
            Builtin::ReadTiltY => "readTiltY",
            Builtin::ReadTiltZ => "readTiltZ",
            Builtin::Color565 => "color565",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Builtin::Str | Builtin::Int | Builtin::Abs | Builtin::ReadButton => Arity::exactly(1),
            Builtin::Min | Builtin::Max => Arity::exactly(2),
            Builtin::ButtonA | Builtin::ButtonB => Arity::exactly(0),
            Builtin::ReadTiltX | Builtin::ReadTiltY | Builtin::ReadTiltZ => Arity::exactly(0),
            Builtin::Color565 => Arity::exactly(3),
        }
    }
}

lazy_static! {
    static ref CALLABLES: HashMap<&'static str, Callable> = {
        let mut table = HashMap::new();

        let methods = [
            DeviceMethod::FillScreen,
            DeviceMethod::DrawString,
            DeviceMethod::FillRect,
            DeviceMethod::DrawRect,
            DeviceMethod::FillCircle,
            DeviceMethod::DrawCircle,
            DeviceMethod::DrawLine,
            DeviceMethod::DrawPixel,
            DeviceMethod::Tone,
            DeviceMethod::NoTone,
            DeviceMethod::Print,
        ];

        for method in methods.iter() {
            table.insert(method.name(), Callable::Device(*method));
        }

        let builtins = [
            Builtin::Str,
            Builtin::Int,
            Builtin::Abs,
            Builtin::Min,
            Builtin::Max,
            Builtin::ReadButton,
            Builtin::ButtonA,
            Builtin::ButtonB,
            Builtin::ReadTiltX,
            Builtin::ReadTiltY,
            Builtin::ReadTiltZ,
            Builtin::Color565,
        ];

        for builtin in builtins.iter() {
            table.insert(builtin.name(), Callable::Builtin(*builtin));
        }

        table.insert("sleep", Callable::Sleep(SleepUnit::Seconds));
        table.insert("sleep_ms", Callable::Sleep(SleepUnit::Milliseconds));

        table
    };
}

/// Looks up the callable with the given name.
pub fn lookup_callable(name: &str) -> Option<Callable> {
    CALLABLES.get(name).copied()
}

/// The known callable whose name is closest to `name`, if any is close enough to be
/// a plausible typo.
pub fn suggest_callable(name: &str) -> Option<&'static str> {
    let lowercase = name.to_lowercase();

    CALLABLES.keys()
        .map(|candidate| (edit_distance::edit_distance(&lowercase, &candidate.to_lowercase()), *candidate))
        .filter(|(distance, candidate)| *distance <= std::cmp::max(1, candidate.len() / 3))
        .min()
        .map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_suggest() {
        assert_eq!(lookup_callable("drawString"), Some(Callable::Device(DeviceMethod::DrawString)));
        assert_eq!(lookup_callable("sleep_ms"), Some(Callable::Sleep(SleepUnit::Milliseconds)));
        assert_eq!(lookup_callable("eval"), None);

        assert_eq!(suggest_callable("drawstring"), Some("drawString"));
        assert_eq!(suggest_callable("drawStrng"), Some("drawString"));
        assert_eq!(suggest_callable("completelyUnrelated"), None);
    }

    #[test]
    fn test_arity() {
        assert!(DeviceMethod::DrawString.arity().accepts(4));
        assert!(DeviceMethod::DrawString.arity().accepts(5));
        assert!(!DeviceMethod::DrawString.arity().accepts(3));
        assert!(DeviceMethod::Print.arity().accepts(7));
        assert_eq!(DeviceMethod::DrawString.arity().to_string(), "4 to 5");
    }
}
