//! Lowering a parsed pattern into the derivative node graph.
//!
//! Compilation collects every byte class the pattern mentions, refines the
//! byte space into minterms, and rebuilds the tree over minterm-mask
//! predicates through the hash-consing node builder. The word-letter and
//! newline classes always join the refinement, since anchor classification
//! depends on them even when the pattern never names them.

use crate::algebra::{compute_minterms, MintermSet, MintermSetAlgebra, MAX_MINTERMS};
use crate::automaton::builder::StateBuilder;
use crate::automaton::node::{NodeBuilder, NodeRef};
use crate::byteset::ByteSet;
use crate::parser::{self, Ast};
use crate::PatternError;

/// Compile a parsed pattern into a state builder and its root node.
pub(crate) fn compile(
    ast: &Ast,
) -> Result<(StateBuilder<MintermSetAlgebra>, NodeRef<MintermSet>), PatternError> {
    let mut classes = Vec::new();
    collect_classes(ast, &mut classes);
    classes.push(parser::word_class());
    classes.push(parser::newline_class());

    let minterms = compute_minterms(&classes);
    if minterms.len() > MAX_MINTERMS {
        return Err(PatternError::TooManyClasses {
            count: minterms.len(),
        });
    }

    let algebra = MintermSetAlgebra::new(minterms);
    let word_mask = algebra.translate(&parser::word_class());
    let newline_mask = algebra.translate(&parser::newline_class());
    let minterm_count = algebra.minterm_count();

    let nodes = NodeBuilder::new(algebra, word_mask, newline_mask);
    let root = lower_ast(&nodes, ast);
    Ok((StateBuilder::new(nodes, minterm_count), root))
}

fn collect_classes(ast: &Ast, out: &mut Vec<ByteSet>) {
    match ast {
        Ast::Empty | Ast::Anchor(_) => {}
        Ast::Class(set) => {
            if !out.contains(set) {
                out.push(*set);
            }
        }
        Ast::Concat(items) | Ast::Alt(items) => {
            for item in items {
                collect_classes(item, out);
            }
        }
        Ast::Repeat { node, .. } | Ast::Group { node, .. } => collect_classes(node, out),
    }
}

fn lower_ast(nodes: &NodeBuilder<MintermSetAlgebra>, ast: &Ast) -> NodeRef<MintermSet> {
    match ast {
        Ast::Empty => nodes.epsilon(),
        Ast::Class(set) => nodes.mk_singleton(nodes.algebra().translate(set)),
        Ast::Concat(items) => {
            // Right-fold keeps concatenations right-leaning, which is the
            // shape derivative computation peels from.
            items.iter().rev().fold(nodes.epsilon(), |acc, item| {
                nodes.mk_concat(lower_ast(nodes, item), acc)
            })
        }
        Ast::Alt(branches) => {
            let alts = branches.iter().map(|b| lower_ast(nodes, b)).collect();
            nodes.mk_or(alts)
        }
        Ast::Repeat {
            node,
            lower,
            upper,
            lazy,
        } => nodes.mk_loop(lower_ast(nodes, node), *lower, *upper, *lazy),
        Ast::Group { node, group } => match group {
            Some(g) => {
                let body = lower_ast(nodes, node);
                let tail = nodes.mk_concat(body, nodes.mk_capture_end(*g));
                nodes.mk_concat(nodes.mk_capture_start(*g), tail)
            }
            None => lower_ast(nodes, node),
        },
        Ast::Anchor(kind) => nodes.mk_anchor(*kind),
    }
}
