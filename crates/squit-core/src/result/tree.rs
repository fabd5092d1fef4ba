use std::collections::BTreeMap;

use super::SquitResult;

/// A node of the result hierarchy mirroring the test directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquitResultTree {
    /// Result id, only set on leaves.
    pub id: Option<u64>,
    pub name: String,
    pub children: Vec<SquitResultTree>,
    pub successful: usize,
    pub failed: usize,
    pub ignored: usize,
}

impl SquitResultTree {
    /// Group results by shared path prefixes.
    pub fn build(results: &[SquitResult]) -> Vec<SquitResultTree> {
        let entries: Vec<(Vec<String>, &SquitResult)> = results
            .iter()
            .map(|result| (result.segments(), result))
            .collect();
        let entries: Vec<(&[String], &SquitResult)> = entries
            .iter()
            .map(|(segments, result)| (segments.as_slice(), *result))
            .collect();
        build_level(entries)
    }

    fn leaf(result: &SquitResult) -> Self {
        Self {
            id: Some(result.id),
            name: result.name(),
            children: Vec::new(),
            successful: usize::from(result.is_success()),
            failed: usize::from(result.is_failure()),
            ignored: usize::from(result.is_ignored()),
        }
    }

    fn node(name: String, children: Vec<SquitResultTree>) -> Self {
        let (successful, failed, ignored) = children.iter().fold((0, 0, 0), |acc, child| {
            (
                acc.0 + child.successful,
                acc.1 + child.failed,
                acc.2 + child.ignored,
            )
        });
        Self {
            id: None,
            name,
            children,
            successful,
            failed,
            ignored,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.id.is_some()
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed + self.ignored
    }

    /// No failures below this node.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Leaves below this node, in order.
    pub fn leaves(&self) -> Vec<&SquitResultTree> {
        if self.is_leaf() {
            return vec![self];
        }
        self.children.iter().flat_map(|c| c.leaves()).collect()
    }
}

fn build_level(entries: Vec<(&[String], &SquitResult)>) -> Vec<SquitResultTree> {
    let mut groups: BTreeMap<&str, Vec<(&[String], &SquitResult)>> = BTreeMap::new();
    for (segments, result) in entries {
        let Some(first) = segments.first() else {
            continue;
        };
        groups.entry(first.as_str()).or_default().push((segments, result));
    }

    groups
        .into_iter()
        .map(|(name, group)| {
            if let [(segments, result)] = group.as_slice() {
                if segments.len() == 1 {
                    return SquitResultTree::leaf(result);
                }
            }

            let mut children = Vec::new();
            let mut deeper = Vec::new();
            for (segments, result) in group {
                if segments.len() == 1 {
                    children.push(SquitResultTree::leaf(result));
                } else {
                    deeper.push((&segments[1..], result));
                }
            }
            children.extend(build_level(deeper));
            SquitResultTree::node(name.to_string(), children)
        })
        .collect()
}
