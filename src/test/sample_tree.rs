use crate::{
    contract::LabelSet,
    session::FrontEnd,
    test::labels::PARSED,
    tree::{BinaryOp, NodeId, NodeKind, ProgramTree},
    Result,
};

/// ```text
/// program
/// └── package com.example
///     ├── type Main
///     │   ├── method main { return a + 1; }
///     │   ├── method helper { }
///     │   └── field count
///     └── type Util
///         └── method util { }
/// ```
pub struct SampleTree {
    pub tree: ProgramTree,
    pub package: NodeId,
    pub main_type: NodeId,
    pub util_type: NodeId,
    pub main_method: NodeId,
    pub helper_method: NodeId,
    pub count_field: NodeId,
    pub main_return: NodeId,
}

impl SampleTree {
    pub fn build() -> Self {
        Self::try_build().unwrap()
    }

    fn try_build() -> Result<Self> {
        let mut tree = ProgramTree::new();
        let root = tree.root();

        let package = tree.add_child(
            root,
            NodeKind::Package {
                name: "com.example".into(),
            },
        )?;
        let main_type = tree.add_child(package, NodeKind::Type { name: "Main".into() })?;

        let main_method = tree.add_child(main_type, NodeKind::Method { name: "main".into() })?;
        let body = tree.add_child(main_method, NodeKind::Block)?;
        let main_return = tree.add_child(body, NodeKind::Return)?;
        let sum = tree.add_child(main_return, NodeKind::Binary(BinaryOp::Add))?;
        tree.add_child(sum, NodeKind::Local { name: "a".into() })?;
        tree.add_child(sum, NodeKind::Literal(1))?;

        let helper_method = tree.add_child(
            main_type,
            NodeKind::Method {
                name: "helper".into(),
            },
        )?;
        tree.add_child(helper_method, NodeKind::Block)?;
        let count_field = tree.add_child(
            main_type,
            NodeKind::Field {
                name: "count".into(),
            },
        )?;

        let util_type = tree.add_child(package, NodeKind::Type { name: "Util".into() })?;
        let util_method = tree.add_child(util_type, NodeKind::Method { name: "util".into() })?;
        tree.add_child(util_method, NodeKind::Block)?;

        Ok(SampleTree {
            tree,
            package,
            main_type,
            util_type,
            main_method,
            helper_method,
            count_field,
            main_return,
        })
    }

    /// Every method in declaration order
    pub fn methods(&self) -> Vec<NodeId> {
        let util = self.tree.children(self.util_type)[0];
        vec![self.main_method, self.helper_method, util]
    }
}

/// Front end handing out a fresh [`SampleTree`] with `Parsed` established.
pub struct SampleFrontEnd;

impl FrontEnd for SampleFrontEnd {
    fn program(&mut self) -> Result<ProgramTree> {
        Ok(SampleTree::try_build()?.tree)
    }

    fn initial_labels(&self) -> LabelSet {
        [PARSED].into_iter().collect()
    }
}
