//! Intermediate representation handed to the backend
//!
//! Lowering produces closures: named instruction sequences over symbols with
//! positional parameters. Instructions are moves, message sends, labels,
//! jumps and the two structured control constructs, loop and if. What a send
//! does is decided by the backend from its operator symbol.

use wr_hir::{LabelId, NodeId, SymbolId, SymbolTable};
use wr_intern::Interner;

/// One instruction and the tree node it was generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    /// What the instruction does
    pub kind: CodeKind,
    /// Tree node the instruction was generated for
    pub node: Option<NodeId>,
}

/// Instruction shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeKind {
    /// Copy `src` into `dst`
    Move {
        /// Value copied
        src: SymbolId,
        /// Receiver of the copy
        dst: SymbolId,
    },
    /// Send `args` to `args[0]`, binding `results`
    Send {
        /// Operator followed by its operands
        args: Vec<SymbolId>,
        /// Symbols bound to the outcome
        results: Vec<SymbolId>,
    },
    /// Jump target
    Label(LabelId),
    /// Unconditional jump
    Goto(LabelId),
    /// Structured loop
    Loop {
        /// Target of `continue`, if the loop is continued by name
        continue_label: Option<LabelId>,
        /// Target of `break`, if the loop is broken by name
        break_label: Option<LabelId>,
        /// Condition is tested after the body
        post_test: bool,
        /// Runs once before the first test
        before: Vec<Code>,
        /// Computes the condition before each test
        cond_code: Vec<Code>,
        /// Tested value
        cond: Option<SymbolId>,
        /// Loop body
        body: Vec<Code>,
    },
    /// Two-armed conditional
    If {
        /// Computes the condition
        cond_code: Vec<Code>,
        /// Tested value
        cond: Option<SymbolId>,
        /// Runs when the condition holds
        then_code: Vec<Code>,
        /// Value of the then arm
        then_value: Option<SymbolId>,
        /// Runs otherwise
        else_code: Vec<Code>,
        /// Value of the else arm
        else_value: Option<SymbolId>,
        /// Receives the value of the arm taken
        result: SymbolId,
    },
}

impl Code {
    /// Instruction `kind` generated for `node`
    #[must_use]
    pub fn new(kind: CodeKind, node: Option<NodeId>) -> Self {
        Self { kind, node }
    }

    /// `dst = src`
    #[must_use]
    pub fn mov(src: SymbolId, dst: SymbolId, node: Option<NodeId>) -> Self {
        Self::new(CodeKind::Move { src, dst }, node)
    }

    /// Send of `args`, binding `results`
    #[must_use]
    pub fn send(args: Vec<SymbolId>, results: Vec<SymbolId>, node: Option<NodeId>) -> Self {
        Self::new(CodeKind::Send { args, results }, node)
    }

    /// Jump target `label`
    #[must_use]
    pub fn label(label: LabelId, node: Option<NodeId>) -> Self {
        Self::new(CodeKind::Label(label), node)
    }

    /// Jump to `label`
    #[must_use]
    pub fn goto(label: LabelId, node: Option<NodeId>) -> Self {
        Self::new(CodeKind::Goto(label), node)
    }

    /// Arguments of a send, operator first
    #[must_use]
    pub fn send_args(&self) -> Option<&[SymbolId]> {
        match &self.kind {
            CodeKind::Send { args, .. } => Some(args),
            _ => None,
        }
    }
}

/// Callable unit: a function, a module initializer or the program entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    /// Function symbol the closure implements
    pub sym: SymbolId,
    /// Positional parameters; the first is the function's own name literal
    pub params: Vec<SymbolId>,
    /// Instructions, in execution order
    pub body: Vec<Code>,
}

impl Closure {
    /// Every send in the body, including those nested in loops and ifs
    #[must_use]
    pub fn sends(&self) -> Vec<&Code> {
        let mut sends = Vec::new();
        collect_sends(&self.body, &mut sends);
        sends
    }
}

fn collect_sends<'a>(code: &'a [Code], sends: &mut Vec<&'a Code>) {
    for instruction in code {
        match &instruction.kind {
            CodeKind::Send { .. } => sends.push(instruction),
            CodeKind::Loop {
                before,
                cond_code,
                body,
                ..
            } => {
                collect_sends(before, sends);
                collect_sends(cond_code, sends);
                collect_sends(body, sends);
            }
            CodeKind::If {
                cond_code,
                then_code,
                else_code,
                ..
            } => {
                collect_sends(cond_code, sends);
                collect_sends(then_code, sends);
                collect_sends(else_code, sends);
            }
            CodeKind::Move { .. } | CodeKind::Label(_) | CodeKind::Goto(_) => {}
        }
    }
}

/// Output of a successful compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Function closures in lowering order, then module initializers, then the entry
    pub closures: Vec<Closure>,
    /// Symbol of the closure the backend starts from
    pub entry: SymbolId,
}

impl Program {
    /// Closure implementing `sym`
    #[must_use]
    pub fn closure(&self, sym: SymbolId) -> Option<&Closure> {
        self.closures.iter().find(|closure| closure.sym == sym)
    }

    /// Closure the backend starts from
    #[must_use]
    pub fn entry_closure(&self) -> Option<&Closure> {
        self.closure(self.entry)
    }

    /// Stable text form of every closure
    #[must_use]
    pub fn render(&self, symbols: &SymbolTable, interner: &Interner) -> String {
        let printer = Printer { symbols, interner };
        let mut out = String::new();
        for closure in &self.closures {
            let params: Vec<String> = closure
                .params
                .iter()
                .map(|&param| printer.sym(param))
                .collect();
            out.push_str(&format!(
                "closure {}({})\n",
                printer.sym(closure.sym),
                params.join(", ")
            ));
            printer.block(&mut out, &closure.body, 1);
        }
        out.push_str(&format!("entry {}\n", printer.sym(self.entry)));
        out
    }
}

struct Printer<'a> {
    symbols: &'a SymbolTable,
    interner: &'a Interner,
}

impl Printer<'_> {
    fn sym(&self, id: SymbolId) -> String {
        let symbol = &self.symbols[id];
        if let Some(constant) = &symbol.constant {
            return constant.clone();
        }
        match symbol.name {
            Some(name) if symbol.is_symbol => format!("#{}", self.interner.resolve(name)),
            Some(name) => self.interner.resolve(name).to_owned(),
            None => format!("%{}", u32::from(id.into_raw())),
        }
    }

    fn list(&self, syms: &[SymbolId]) -> String {
        syms.iter()
            .map(|&sym| self.sym(sym))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn value(&self, sym: Option<SymbolId>) -> String {
        sym.map_or_else(|| "_".to_owned(), |sym| self.sym(sym))
    }

    fn block(&self, out: &mut String, code: &[Code], depth: usize) {
        for instruction in code {
            self.instruction(out, instruction, depth);
        }
    }

    fn line(out: &mut String, depth: usize, text: &str) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(text);
        out.push('\n');
    }

    fn instruction(&self, out: &mut String, code: &Code, depth: usize) {
        match &code.kind {
            CodeKind::Move { src, dst } => Self::line(
                out,
                depth,
                &format!("move {} -> {}", self.sym(*src), self.sym(*dst)),
            ),
            CodeKind::Send { args, results } if results.is_empty() => {
                Self::line(out, depth, &format!("send {}", self.list(args)));
            }
            CodeKind::Send { args, results } => Self::line(
                out,
                depth,
                &format!("send {} -> {}", self.list(args), self.list(results)),
            ),
            CodeKind::Label(label) => Self::line(out, depth, &format!("label {label}")),
            CodeKind::Goto(label) => Self::line(out, depth, &format!("goto {label}")),
            CodeKind::Loop {
                continue_label,
                break_label,
                post_test,
                before,
                cond_code,
                cond,
                body,
            } => {
                let labels = |label: &Option<LabelId>| {
                    label.map_or_else(|| "_".to_owned(), |label| label.to_string())
                };
                let shape = if *post_test { "do-while" } else { "while" };
                Self::line(
                    out,
                    depth,
                    &format!(
                        "loop {shape} continue {} break {}",
                        labels(continue_label),
                        labels(break_label)
                    ),
                );
                if !before.is_empty() {
                    Self::line(out, depth + 1, "before:");
                    self.block(out, before, depth + 2);
                }
                Self::line(out, depth + 1, &format!("cond {}:", self.value(*cond)));
                self.block(out, cond_code, depth + 2);
                Self::line(out, depth + 1, "body:");
                self.block(out, body, depth + 2);
            }
            CodeKind::If {
                cond_code,
                cond,
                then_code,
                then_value,
                else_code,
                else_value,
                result,
            } => {
                Self::line(out, depth, &format!("if -> {}", self.sym(*result)));
                Self::line(out, depth + 1, &format!("cond {}:", self.value(*cond)));
                self.block(out, cond_code, depth + 2);
                Self::line(out, depth + 1, &format!("then {}:", self.value(*then_value)));
                self.block(out, then_code, depth + 2);
                Self::line(out, depth + 1, &format!("else {}:", self.value(*else_value)));
                self.block(out, else_code, depth + 2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn test_render_program() {
        let interner = Interner::new();
        let mut symbols = SymbolTable::new();
        let symbol_ty = symbols.alloc(Some(interner.intern("symbol")));
        let reply = symbols.alloc(Some(interner.intern("reply")));
        let f = symbols.alloc(Some(interner.intern("f")));
        let f_literal = symbols.symbol_literal(interner.intern("f"), symbol_ty);
        let cont = symbols.alloc(None);
        let ret = symbols.alloc(None);
        let one = symbols.constant("1", None);
        let flag = symbols.constant("true", None);
        let merged = symbols.alloc(Some(interner.intern("merged")));

        let branch = Code::new(
            CodeKind::If {
                cond_code: Vec::new(),
                cond: Some(flag),
                then_code: vec![Code::label(LabelId(3), None)],
                then_value: Some(one),
                else_code: Vec::new(),
                else_value: None,
                result: merged,
            },
            None,
        );
        let body = vec![
            branch,
            Code::mov(one, ret, None),
            Code::label(LabelId(0), None),
            Code::send(vec![reply, cont, ret], Vec::new(), None),
        ];
        let program = Program {
            closures: vec![Closure {
                sym: f,
                params: vec![f_literal],
                body,
            }],
            entry: f,
        };

        let cont_id = u32::from(cont.into_raw());
        let ret_id = u32::from(ret.into_raw());
        let rendered = program
            .render(&symbols, &interner)
            .replace(&format!("%{cont_id}"), "%cont")
            .replace(&format!("%{ret_id}"), "%ret");
        expect![[r#"
            closure f(#f)
              if -> merged
                cond true:
                then 1:
                  label L3
                else _:
              move 1 -> %ret
              label L0
              send reply %cont %ret
            entry f
        "#]]
        .assert_eq(&rendered);
    }

    #[test]
    fn test_sends_reach_into_structured_code() {
        let mut symbols = SymbolTable::new();
        let op = symbols.alloc(None);
        let inner = Code::send(vec![op], Vec::new(), None);
        let outer = Code::new(
            CodeKind::Loop {
                continue_label: Some(LabelId(0)),
                break_label: Some(LabelId(1)),
                post_test: false,
                before: Vec::new(),
                cond_code: vec![inner.clone()],
                cond: None,
                body: vec![inner.clone()],
            },
            None,
        );
        let closure = Closure {
            sym: op,
            params: Vec::new(),
            body: vec![outer, Code::goto(LabelId(1), None)],
        };
        assert_eq!(closure.sends().len(), 2);
        assert_eq!(closure.sends()[0].send_args(), Some(&[op][..]));
    }
}
