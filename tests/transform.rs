//! Visitor-driven passes that rewrite the tree through transformation requests.

use jack_scheduler::{
    prelude::*,
    tree::{BinaryOp, Node},
};

const PARSED: Tag = Tag::new("Parsed");
const FOLDED: Tag = Tag::new("Folded");

/// Folds binary expressions whose operands are both literals.
///
/// Works on the tree as it was when the walk started, so nested foldable expressions
/// need another run.
struct Folder {
    request: TransformationRequest,
}

impl Visitor for Folder {
    fn visit(&mut self, _tree: &ProgramTree, _id: NodeId, _node: &Node) -> bool {
        true
    }

    fn end_visit(&mut self, tree: &ProgramTree, id: NodeId, node: &Node) {
        let NodeKind::Binary(op) = node.kind() else {
            return;
        };
        let operands: Vec<i64> = node
            .children()
            .iter()
            .filter_map(|child| match tree.kind(*child) {
                Some(NodeKind::Literal(value)) => Some(*value),
                _ => None,
            })
            .collect();
        let [lhs, rhs] = operands[..] else {
            return;
        };
        let folded = match op {
            BinaryOp::Add => lhs.checked_add(rhs),
            BinaryOp::Sub => lhs.checked_sub(rhs),
            BinaryOp::Mul => lhs.checked_mul(rhs),
            _ => None,
        };
        if let Some(value) = folded {
            self.request
                .replace(id, NodeTemplate::new(NodeKind::Literal(value)));
        }
    }
}

fn fold(cx: &mut RunContext<'_>) -> Result<()> {
    let mut folder = Folder {
        request: cx.transform(),
    };
    cx.tree().walk(cx.entity(), &mut folder);
    cx.commit(folder.request);
    Ok(())
}

/// `class Calc { int calc() { return 2 * 3 + 4; } int neg() { return -(1 - 1); } }`
fn program() -> Result<(ProgramTree, NodeId, NodeId)> {
    let mut tree = ProgramTree::new();
    let root = tree.root();
    let calc_type = tree.add_child(root, NodeKind::Type { name: "Calc".into() })?;

    let calc = tree.add_child(calc_type, NodeKind::Method { name: "calc".into() })?;
    let body = tree.add_child(calc, NodeKind::Block)?;
    let ret = tree.add_child(body, NodeKind::Return)?;
    let sum = tree.add_child(ret, NodeKind::Binary(BinaryOp::Add))?;
    let product = tree.add_child(sum, NodeKind::Binary(BinaryOp::Mul))?;
    tree.add_child(product, NodeKind::Literal(2))?;
    tree.add_child(product, NodeKind::Literal(3))?;
    tree.add_child(sum, NodeKind::Literal(4))?;

    let neg = tree.add_child(calc_type, NodeKind::Method { name: "neg".into() })?;
    let body = tree.add_child(neg, NodeKind::Block)?;
    let neg_ret = tree.add_child(body, NodeKind::Return)?;
    let minus = tree
        .add_child(neg_ret, NodeKind::Unary(jack_scheduler::tree::UnaryOp::Neg))?;
    let diff = tree.add_child(minus, NodeKind::Binary(BinaryOp::Sub))?;
    tree.add_child(diff, NodeKind::Literal(1))?;
    tree.add_child(diff, NodeKind::Literal(1))?;

    Ok((tree, ret, neg_ret))
}

fn fold_plan(registry: &SchedulableRegistry) -> Result<Plan> {
    let mut request = Request::new(registry);
    request
        .add_production(Production::new("Folded", &[FOLDED]))
        .add_initial_tags_or_markers([PARSED])
        .add_all_schedulables();
    request.build_plan(Granularity::Session)
}

#[test]
fn test_folding_pass_commits_after_walk() -> Result<()> {
    let mut registry = SchedulableRegistry::new();
    registry
        .register_fn(
            SchedulableDescriptor::new("Fold", Granularity::Method)
                .needs(PARSED)
                .adds(FOLDED),
            fold,
        )?;
    let plan = fold_plan(&registry)?;
    assert_eq!(plan.to_string(), "[Session]\n  SessionToType\n    TypeToMethod\n      Fold\n");

    let (tree, calc_ret, neg_ret) = program()?;
    let mut session = Session::new(tree, &[PARSED].into_iter().collect());
    plan.process(&mut session, &CompilationContext::default())?;

    assert_eq!(session.tree().render(calc_ret), "(return (+ 6 4))");
    assert_eq!(session.tree().render(neg_ret), "(return (unary- 0))");
    assert!(session.has_tag(FOLDED));

    // the second run sees the folded operands
    session.remove_tag(FOLDED);
    plan.process(&mut session, &CompilationContext::default())?;
    assert_eq!(session.tree().render(calc_ret), "(return 10)");
    Ok(())
}

#[test]
fn test_session_commit_preserves_append_order() -> Result<()> {
    let (tree, calc_ret, _) = program()?;
    let mut session = Session::new(tree, &LabelSet::new());
    let sum = session.tree().children(calc_ret)[0];
    let four = session.tree().children(sum)[1];

    let mut request = TransformationRequest::new();
    request
        .replace(four, NodeTemplate::new(NodeKind::Literal(5)))
        .insert_before(sum, NodeTemplate::new(NodeKind::Literal(0)))
        .prepend_child(calc_ret, NodeTemplate::new(NodeKind::Literal(-1)));
    assert_eq!(session.commit(request)?, 3);
    assert_eq!(
        session.tree().render(calc_ret),
        "(return -1 0 (+ (* 2 3) 5))"
    );
    Ok(())
}

#[test]
fn test_stale_step_aborts_commit() -> Result<()> {
    let (tree, calc_ret, _) = program()?;
    let mut session = Session::new(tree, &LabelSet::new());
    let sum = session.tree().children(calc_ret)[0];
    let product = session.tree().children(sum)[0];

    let mut request = TransformationRequest::new();
    request
        .remove(sum)
        .replace(product, NodeTemplate::new(NodeKind::Literal(6)));
    let err = session.commit(request).unwrap_err();
    assert!(matches!(err, Error::StaleNode(id) if id == product));
    assert_eq!(session.tree().render(calc_ret), "return");
    Ok(())
}
