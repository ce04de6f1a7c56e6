//! Operator applications

use crate::LoweringContext;
use wr_hir::{Builtin, Constructor, NodeId, NodeKind, SymbolId};
use wr_ir::Code;

impl LoweringContext<'_> {
    pub(crate) fn lower_op(&mut self, node: NodeId, children: &[NodeId], code: &mut Vec<Code>) {
        let Some(op) = self.ctx.op_text(node).map(str::to_owned) else {
            panic!("internal error: operator without an operator token");
        };
        let op_index = self.ctx.tree[node].op_index;
        let token = children[op_index];
        let lhs = children.first().copied().filter(|_| op_index > 0);
        let rhs = children.last().copied().filter(|_| children.len() > op_index + 1);

        let result = self.temp_at(node);
        self.ctx.tree[node].rval = Some(result);
        for operand in lhs.into_iter().chain(rhs) {
            code.extend(self.take_code(operand));
        }

        if op.starts_with(',') {
            // Inner commas of a chain leave the send to the outermost one
            if self.ctx.tree[node].in_tuple {
                return;
            }
            let constructor = match self.ctx.tree[node].constructor {
                Constructor::Tuple => Builtin::MakeTuple,
                Constructor::Vector => Builtin::MakeVector,
                Constructor::Set => Builtin::MakeSet,
            };
            let mut args = vec![self.ctx.builtin(constructor)];
            if let Some(lhs) = lhs {
                self.chain_operands(lhs, ",", &mut args);
            }
            args.extend(rhs.map(|rhs| self.value_of(rhs)));
            code.push(Code::send(args, vec![result], Some(node)));
        } else if op.starts_with("^^") {
            if self.ctx.tree[node].in_apply {
                return;
            }
            let mut args = Vec::new();
            if let Some(lhs) = lhs {
                self.chain_operands(lhs, "^^", &mut args);
            }
            args.extend(rhs.map(|rhs| self.value_of(rhs)));
            code.push(Code::send(args, vec![result], Some(node)));
        } else {
            self.dispatch(node, &op, token, lhs, rhs, code);
        }
    }

    /// Operands of a left-nested chain of `delimiter` operators, leftmost first
    fn chain_operands(&self, node: NodeId, delimiter: &str, args: &mut Vec<SymbolId>) {
        let lowered = &self.ctx.tree[node];
        let chained = lowered.kind == NodeKind::Op
            && lowered.op_index > 0
            && self
                .ctx
                .op_text(node)
                .is_some_and(|op| op.starts_with(delimiter));
        if !chained {
            args.push(self.value_of(node));
            return;
        }
        let children = &lowered.children;
        self.chain_operands(children[0], delimiter, args);
        if children.len() > lowered.op_index + 1 {
            if let Some(&rhs) = children.last() {
                args.push(self.value_of(rhs));
            }
        }
    }

    /// Generic operator: pack the operands with the operator token and send
    /// them through the operator dispatcher
    fn dispatch(
        &mut self,
        node: NodeId,
        op: &str,
        token: NodeId,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
        code: &mut Vec<Code>,
    ) {
        let assign = matches!(op.as_bytes(), [first, b'='] if *first != b'=');
        let deref = op.starts_with('.') || op.starts_with("->");
        let result = self.value_of(node);

        let packed = self.temp_at(node);
        let mut args = vec![self.ctx.builtin(Builtin::MakeTuple)];
        args.extend(lhs.map(|lhs| self.value_of(lhs)));
        args.push(self.value_of(token));
        args.extend(rhs.map(|rhs| self.value_of(rhs)));
        code.push(Code::send(args, vec![packed], Some(node)));

        let dispatched = if deref { self.temp_at(node) } else { result };
        let operator = self.ctx.builtin(Builtin::Operator);
        code.push(Code::send(vec![operator, packed], vec![dispatched], Some(node)));

        if deref {
            let primitive = self.ctx.builtin(Builtin::Primitive);
            let deref = self.ctx.builtin(Builtin::Deref);
            code.push(Code::send(
                vec![primitive, deref, dispatched],
                vec![result],
                Some(node),
            ));
        }
        if assign {
            let target = lhs.or(rhs).and_then(|operand| self.ctx.tree[operand].lval);
            if let Some(target) = target {
                code.push(Code::mov(result, target, Some(node)));
            }
        }
    }
}
