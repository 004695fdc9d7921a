//! Cycle-safe traversal of the concept hierarchy.
//!
//! All walks use an explicit stack plus the ordered ancestor path, so the
//! amount of host stack used is constant regardless of how deep the input is.
//! A node whose name already appears among its strict ancestors is treated as
//! a cycle: it is reported (or marked, when rendering) and never expanded.

use std::collections::{BTreeSet, HashSet};

use super::{HierarchyInput, IssueKind, OntologyNode, ValidationIssue};

/// Label used as the parent of top-level nodes in duplicate reports.
const ROOT_LABEL: &str = "<root>";

/// Read-only view over a hierarchy forest.
#[derive(Debug, Clone, Copy)]
pub struct OntologyGraph<'a> {
    roots: &'a [OntologyNode],
}

impl<'a> OntologyGraph<'a> {
    pub fn new(roots: &'a [OntologyNode]) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &'a [OntologyNode] {
        self.roots
    }

    /// Check the forest for cycles, duplicate children, and excessive depth.
    ///
    /// Roots are at depth 1. Issues are emitted in pre-order; duplicate
    /// children of a node are reported before its subtree is walked.
    pub fn validate(&self, forbid_cycles: bool, max_depth: Option<usize>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        report_duplicates(ROOT_LABEL, self.roots, &mut issues);

        let mut stack: Vec<(&'a OntologyNode, usize)> =
            self.roots.iter().rev().map(|root| (root, 1)).collect();
        let mut path: Vec<&'a str> = Vec::new();

        while let Some((node, depth)) = stack.pop() {
            // Everything left on the path past depth-1 belongs to a finished sibling subtree.
            path.truncate(depth - 1);
            path.push(node.name.as_str());

            if let Some(max) = max_depth {
                if depth > max {
                    issues.push(ValidationIssue::error(
                        IssueKind::DepthExceeded,
                        format!(
                            "node '{}' at depth {depth} exceeds max_depth={max} (path: {})",
                            node.name,
                            path.join(" > ")
                        ),
                    ));
                }
            }

            if forbid_cycles && path[..depth - 1].contains(&node.name.as_str()) {
                issues.push(ValidationIssue::error(
                    IssueKind::CycleDetected,
                    format!("cycle detected: {} (path: {})", node.name, path.join(" > ")),
                ));
                continue;
            }

            report_duplicates(&node.name, &node.children, &mut issues);
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        }

        tracing::debug!(
            roots = self.roots.len(),
            issues = issues.len(),
            "hierarchy validated"
        );
        issues
    }

    /// Every concept name that appears anywhere in the forest.
    pub fn node_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut stack: Vec<&OntologyNode> = self.roots.iter().collect();
        while let Some(node) = stack.pop() {
            names.insert(node.name.clone());
            stack.extend(node.children.iter());
        }
        names
    }

    /// Render the forest as an indented ASCII tree.
    ///
    /// ```text
    /// Battery
    ///   ├─ Cell
    ///   │  └─ Electrolyte
    ///   └─ BMS
    /// ```
    ///
    /// A node repeating one of its ancestors is printed with a `(cycle)` marker
    /// and its children are not shown.
    pub fn render_tree(&self) -> String {
        let mut lines = Vec::new();

        for root in self.roots {
            let mut stack: Vec<(&OntologyNode, usize, String, bool)> =
                vec![(root, 1, String::new(), true)];
            let mut path: Vec<&str> = Vec::new();

            while let Some((node, depth, prefix, is_last)) = stack.pop() {
                path.truncate(depth - 1);
                let repeated = path.contains(&node.name.as_str());
                path.push(node.name.as_str());

                let marker = if repeated { " (cycle)" } else { "" };
                if depth == 1 {
                    lines.push(format!("{}{marker}", node.name));
                } else {
                    let connector = if is_last { "└─ " } else { "├─ " };
                    lines.push(format!("{prefix}{connector}{}{marker}", node.name));
                }

                if repeated {
                    continue;
                }

                let child_prefix = if depth == 1 {
                    "  ".to_string()
                } else if is_last {
                    format!("{prefix}   ")
                } else {
                    format!("{prefix}│  ")
                };
                let count = node.children.len();
                for (i, child) in node.children.iter().enumerate().rev() {
                    stack.push((child, depth + 1, child_prefix.clone(), i + 1 == count));
                }
            }
        }

        lines.join("\n")
    }
}

/// Validate a hierarchy as read from the dataset.
///
/// A non-mapping hierarchy yields a single fatal issue and no traversal.
pub fn validate_hierarchy(
    input: &HierarchyInput,
    forbid_cycles: bool,
    max_depth: Option<usize>,
) -> Vec<ValidationIssue> {
    match input {
        HierarchyInput::Malformed { found } => vec![ValidationIssue::error(
            IssueKind::InvalidRootShape,
            format!("ontology hierarchy must be a mapping, found {found}"),
        )],
        HierarchyInput::Forest(roots) => OntologyGraph::new(roots).validate(forbid_cycles, max_depth),
    }
}

/// Report each name that occurs more than once among `children`, once.
fn report_duplicates(parent: &str, children: &[OntologyNode], issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for child in children {
        let name = child.name.as_str();
        if !seen.insert(name) && reported.insert(name) {
            issues.push(ValidationIssue::error(
                IssueKind::DuplicateChild,
                format!("duplicate child: '{name}' appears more than once under '{parent}'"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HierarchyInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn well_formed_hierarchy_has_no_issues() {
        let input = parse(r#"{"Vehicle": {"Battery": {"Cell": {}}, "Motor": {}}, "Symptom": {}}"#);
        assert!(validate_hierarchy(&input, true, Some(3)).is_empty());
    }

    #[test]
    fn cycle_reported_once_with_path() {
        let input = parse(r#"{"A": {"B": {"A": {}}}}"#);
        let issues = validate_hierarchy(&input, true, None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::CycleDetected);
        assert_eq!(issues[0].message, "cycle detected: A (path: A > B > A)");
    }

    #[test]
    fn cycle_does_not_descend_but_siblings_continue() {
        let input = parse(r#"{"A": {"B": {"A": {"B": {}}}, "C": {"C": {}}}}"#);
        let issues = validate_hierarchy(&input, true, None);
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "cycle detected: A (path: A > B > A)",
                "cycle detected: C (path: A > C > C)",
            ]
        );
    }

    #[test]
    fn cycles_allowed_when_not_forbidden() {
        let input = parse(r#"{"A": {"B": {"A": {}}}}"#);
        assert!(validate_hierarchy(&input, false, None).is_empty());
    }

    #[test]
    fn repeated_name_in_sibling_branch_is_not_a_cycle() {
        let input = parse(r#"{"A": {"X": {}}, "B": {"X": {}}}"#);
        assert!(validate_hierarchy(&input, true, None).is_empty());
    }

    #[test]
    fn duplicate_children_reported_once_per_name() {
        let input = parse(r#"{"Battery": {"Cell": {}, "Cell": {}, "Cell": {}, "BMS": {}}}"#);
        let issues = validate_hierarchy(&input, true, None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DuplicateChild);
        assert!(issues[0].message.contains("'Cell'"));
        assert!(issues[0].message.contains("'Battery'"));
    }

    #[test]
    fn duplicate_roots_reported() {
        let input = parse(r#"{"A": {}, "A": {}}"#);
        let issues = validate_hierarchy(&input, true, None);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("<root>"));
    }

    #[test]
    fn depth_exceeded_cites_node_and_path() {
        let input = parse(r#"{"A": {"B": {"C": {}}}}"#);
        let issues = validate_hierarchy(&input, true, Some(2));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DepthExceeded);
        assert!(issues[0].message.contains("'C'"));
        assert!(issues[0].message.contains("A > B > C"));
    }

    #[test]
    fn malformed_root_is_single_fatal_issue() {
        let input = parse(r#""not a tree""#);
        let issues = validate_hierarchy(&input, true, Some(1));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::InvalidRootShape);
    }

    #[test]
    fn long_chain_is_walked_without_recursion() {
        let mut node = OntologyNode::leaf("n999");
        for i in (0..999).rev() {
            node = OntologyNode {
                name: format!("n{i}"),
                children: vec![node],
            };
        }
        let roots = vec![node];
        let graph = OntologyGraph::new(&roots);
        assert!(graph.validate(true, None).is_empty());
        assert_eq!(graph.validate(true, Some(999)).len(), 1);
        assert_eq!(graph.node_names().len(), 1000);
    }

    #[test]
    fn node_names_cover_every_level() {
        let input = parse(r#"{"A": {"B": {"C": {}}}, "D": {}}"#);
        let names = OntologyGraph::new(input.roots()).node_names();
        let names: Vec<_> = names.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn render_tree_ascii() {
        let input = parse(r#"{"Battery": {"Cell": {"Electrolyte": {}}, "BMS": {}}}"#);
        let rendered = OntologyGraph::new(input.roots()).render_tree();
        let expected = "Battery\n  ├─ Cell\n  │  └─ Electrolyte\n  └─ BMS";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn render_tree_marks_cycles() {
        let input = parse(r#"{"A": {"B": {"A": {"B": {}}}}}"#);
        let rendered = OntologyGraph::new(input.roots()).render_tree();
        assert_eq!(rendered, "A\n  └─ B\n     └─ A (cycle)");
    }
}
