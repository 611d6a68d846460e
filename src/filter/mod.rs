//! # Selector filters
//!
//! Combinator library that compiles element selectors into predicates over
//! view-hierarchy node lists. Each combinator takes and returns an
//! `ElementFilter`; the orchestra AND-combines one filter per selector
//! constraint and applies an index pick or clickable-first ordering on top.
//!
//! Filters receive the flattened hierarchy in document order and return the
//! surviving nodes, possibly reordered (positional filters sort by proximity
//! to their anchor).

use std::cmp::Reverse;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::command::ElementTrait;
use crate::hierarchy::TreeNode;

/// Predicate over a flattened view hierarchy.
pub type ElementFilter = Arc<dyn Fn(&[TreeNode]) -> Vec<TreeNode> + Send + Sync>;

const LONG_TEXT_LENGTH: usize = 200;

/// Compiles a selector regex with the lookup options: case-insensitive,
/// `.` matches newline, multiline. The pattern must match the entire
/// attribute value.
pub fn compile_selector_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\A(?:{pattern})\z"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .multi_line(true)
        .build()
}

fn matching<P>(predicate: P) -> ElementFilter
where
    P: Fn(&TreeNode) -> bool + Send + Sync + 'static,
{
    Arc::new(move |nodes| nodes.iter().filter(|n| predicate(n)).cloned().collect())
}

/// Keeps nodes whose `text` attribute fully matches the regex, then reduces
/// to the deepest such nodes.
pub fn text_matching(regex: Regex) -> ElementFilter {
    deepest_matching_element(matching(move |node| {
        node.attribute("text").is_some_and(|t| regex.is_match(t))
    }))
}

/// Keeps nodes whose `id` attribute fully matches the regex, then reduces
/// to the deepest such nodes.
pub fn id_matching(regex: Regex) -> ElementFilter {
    deepest_matching_element(matching(move |node| {
        node.attribute("id").is_some_and(|id| regex.is_match(id))
    }))
}

/// Of all matches, keeps only those that do not contain another match in
/// their subtree. Containers repeat the text of their leaves; the leaf is
/// the element the user means.
pub fn deepest_matching_element(filter: ElementFilter) -> ElementFilter {
    Arc::new(move |nodes| {
        let matches = filter(nodes);
        matches
            .iter()
            .filter(|candidate| {
                let subtree = candidate.aggregate();
                !matches
                    .iter()
                    .any(|other| other != *candidate && subtree.contains(other))
            })
            .cloned()
            .collect()
    })
}

/// Width and height within ± tolerance of the requested size.
/// Absent dimensions are unconstrained.
pub fn size_matching(width: Option<i64>, height: Option<i64>, tolerance: Option<i64>) -> ElementFilter {
    let tolerance = tolerance.unwrap_or(0);
    matching(move |node| {
        let bounds = node.bounds();
        let width_ok = width.map_or(true, |w| (bounds.width - w).abs() <= tolerance);
        let height_ok = height.map_or(true, |h| (bounds.height - h).abs() <= tolerance);
        width_ok && height_ok
    })
}

/// Nodes strictly below the anchor's center, closest first.
pub fn below(anchor: ElementFilter) -> ElementFilter {
    Arc::new(move |nodes| {
        let anchors = anchor(nodes);
        let Some(anchor_node) = anchors.first() else {
            return Vec::new();
        };
        let anchor_y = anchor_node.bounds().center().1;
        let mut result: Vec<TreeNode> = nodes
            .iter()
            .filter(|n| n.bounds().center().1 > anchor_y)
            .cloned()
            .collect();
        result.sort_by_key(|n| n.bounds().center().1);
        result
    })
}

/// Nodes strictly above the anchor's center, closest first.
pub fn above(anchor: ElementFilter) -> ElementFilter {
    Arc::new(move |nodes| {
        let anchors = anchor(nodes);
        let Some(anchor_node) = anchors.first() else {
            return Vec::new();
        };
        let anchor_y = anchor_node.bounds().center().1;
        let mut result: Vec<TreeNode> = nodes
            .iter()
            .filter(|n| n.bounds().center().1 < anchor_y)
            .cloned()
            .collect();
        result.sort_by_key(|n| Reverse(n.bounds().center().1));
        result
    })
}

/// Nodes strictly left of the anchor's center, closest first.
pub fn left_of(anchor: ElementFilter) -> ElementFilter {
    Arc::new(move |nodes| {
        let anchors = anchor(nodes);
        let Some(anchor_node) = anchors.first() else {
            return Vec::new();
        };
        let anchor_x = anchor_node.bounds().center().0;
        let mut result: Vec<TreeNode> = nodes
            .iter()
            .filter(|n| n.bounds().center().0 < anchor_x)
            .cloned()
            .collect();
        result.sort_by_key(|n| Reverse(n.bounds().center().0));
        result
    })
}

/// Nodes strictly right of the anchor's center, closest first.
pub fn right_of(anchor: ElementFilter) -> ElementFilter {
    Arc::new(move |nodes| {
        let anchors = anchor(nodes);
        let Some(anchor_node) = anchors.first() else {
            return Vec::new();
        };
        let anchor_x = anchor_node.bounds().center().0;
        let mut result: Vec<TreeNode> = nodes
            .iter()
            .filter(|n| n.bounds().center().0 > anchor_x)
            .cloned()
            .collect();
        result.sort_by_key(|n| n.bounds().center().0);
        result
    })
}

/// Nodes whose direct children include the given (already resolved) element.
pub fn contains_child(child: TreeNode) -> ElementFilter {
    matching(move |node| node.children.contains(&child))
}

/// Nodes for which every sub-filter matches somewhere in their subtree
/// (the node itself excluded).
pub fn contains_descendants(filters: Vec<ElementFilter>) -> ElementFilter {
    Arc::new(move |nodes| {
        nodes
            .iter()
            .filter(|node| {
                let descendants: Vec<TreeNode> = node
                    .children
                    .iter()
                    .flat_map(|child| child.aggregate())
                    .collect();
                filters.iter().all(|f| !f(&descendants).is_empty())
            })
            .cloned()
            .collect()
    })
}

pub fn has_trait(element_trait: ElementTrait) -> ElementFilter {
    matching(move |node| match element_trait {
        ElementTrait::Text => node
            .attribute("text")
            .is_some_and(|t| !t.trim().is_empty()),
        ElementTrait::Square => {
            let bounds = node.bounds();
            bounds.width > 0 && bounds.width == bounds.height
        }
        ElementTrait::LongText => node
            .attribute("text")
            .is_some_and(|t| t.len() > LONG_TEXT_LENGTH),
    })
}

pub fn is_enabled(expected: bool) -> ElementFilter {
    matching(move |node| node.enabled == Some(expected))
}

pub fn is_selected(expected: bool) -> ElementFilter {
    matching(move |node| node.selected == Some(expected))
}

pub fn is_checked(expected: bool) -> ElementFilter {
    matching(move |node| node.checked == Some(expected))
}

pub fn is_focused(expected: bool) -> ElementFilter {
    matching(move |node| node.focused == Some(expected))
}

/// AND-combination: a node survives only if it survives every filter.
/// Order follows the first filter's output. No filters means no constraint.
pub fn intersect(filters: Vec<ElementFilter>) -> ElementFilter {
    Arc::new(move |nodes| {
        let mut iter = filters.iter();
        let Some(first) = iter.next() else {
            return nodes.to_vec();
        };
        let mut result = first(nodes);
        for filter in iter {
            let survivors = filter(nodes);
            result.retain(|node| survivors.contains(node));
        }
        result
    })
}

/// Picks the n-th match (in the underlying filter's order), if present.
pub fn index(filter: ElementFilter, position: usize) -> ElementFilter {
    Arc::new(move |nodes| {
        filter(nodes)
            .into_iter()
            .nth(position)
            .map(|n| vec![n])
            .unwrap_or_default()
    })
}

/// Stable reorder of the matches with clickable elements first, so that
/// lookup prefers a tappable candidate when the selector is ambiguous.
pub fn clickable_first(filter: ElementFilter) -> ElementFilter {
    Arc::new(move |nodes| {
        let mut result = filter(nodes);
        result.sort_by_key(|n| n.clickable != Some(true));
        result
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn text_node(text: &str, bounds: &str) -> TreeNode {
        TreeNode {
            attributes: HashMap::from([
                ("text".to_string(), text.to_string()),
                ("bounds".to_string(), bounds.to_string()),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_selector_regex_options() {
        // Case-insensitive, dot matches newline, and full-string semantics.
        let regex = compile_selector_regex("login.*done").unwrap();
        assert!(regex.is_match("LOGIN\ndone"));
        assert!(regex.is_match("Login then done"));
        assert!(!regex.is_match("prefix Login done"));

        let exact = compile_selector_regex("Login").unwrap();
        assert!(exact.is_match("login"));
        assert!(!exact.is_match("Login button"));
    }

    #[test]
    fn test_text_matching_prefers_deepest() {
        // A container repeating its leaf's text must lose to the leaf.
        let leaf = text_node("Login", "[10,10][90,40]");
        let container = TreeNode {
            attributes: HashMap::from([
                ("text".to_string(), "Login".to_string()),
                ("bounds".to_string(), "[0,0][100,50]".to_string()),
            ]),
            children: vec![leaf.clone()],
            ..Default::default()
        };

        let filter = text_matching(compile_selector_regex("Login").unwrap());
        let matches = filter(&container.aggregate());
        assert_eq!(matches, vec![leaf]);
    }

    #[test]
    fn test_below_sorts_by_proximity() {
        let anchor = text_node("Anchor", "[0,0][100,20]");
        let near = text_node("Near", "[0,30][100,50]");
        let far = text_node("Far", "[0,100][100,120]");
        let nodes = vec![far.clone(), anchor.clone(), near.clone()];

        let filter = below(text_matching(compile_selector_regex("Anchor").unwrap()));
        let matches = filter(&nodes);
        assert_eq!(matches, vec![near, far]);
    }

    #[test]
    fn test_above_and_left_of() {
        let anchor = text_node("Anchor", "[100,100][200,140]");
        let above_node = text_node("Up", "[100,10][200,40]");
        let left_node = text_node("Left", "[0,100][50,140]");
        let nodes = vec![anchor.clone(), above_node.clone(), left_node.clone()];

        let anchor_filter = text_matching(compile_selector_regex("Anchor").unwrap());
        assert_eq!(above(anchor_filter.clone())(&nodes), vec![above_node]);
        assert_eq!(left_of(anchor_filter)(&nodes), vec![left_node]);
    }

    #[test]
    fn test_intersect_requires_all() {
        let target = TreeNode {
            attributes: HashMap::from([("text".to_string(), "Save".to_string())]),
            enabled: Some(true),
            ..Default::default()
        };
        let disabled = TreeNode {
            attributes: HashMap::from([("text".to_string(), "Save".to_string())]),
            enabled: Some(false),
            ..Default::default()
        };
        let nodes = vec![disabled, target.clone()];

        let filter = intersect(vec![
            text_matching(compile_selector_regex("Save").unwrap()),
            is_enabled(true),
        ]);
        assert_eq!(filter(&nodes), vec![target]);
    }

    #[test]
    fn test_intersect_empty_is_identity() {
        let nodes = vec![text_node("A", "[0,0][1,1]"), text_node("B", "[0,0][1,1]")];
        assert_eq!(intersect(Vec::new())(&nodes), nodes);
    }

    #[test]
    fn test_index_picks_nth_match() {
        let first = text_node("Row", "[0,0][10,10]");
        let second = text_node("Row", "[0,20][10,30]");
        let nodes = vec![first, second.clone()];

        let base = text_matching(compile_selector_regex("Row").unwrap());
        assert_eq!(index(base.clone(), 1)(&nodes), vec![second]);
        assert!(index(base, 5)(&nodes).is_empty());
    }

    #[test]
    fn test_clickable_first_is_stable() {
        let label = text_node("Item", "[0,0][10,10]");
        let mut button = text_node("Item", "[0,20][10,30]");
        button.clickable = Some(true);
        let nodes = vec![label.clone(), button.clone()];

        let filter = clickable_first(text_matching(compile_selector_regex("Item").unwrap()));
        assert_eq!(filter(&nodes), vec![button, label]);
    }

    #[test]
    fn test_contains_child_uses_resolved_element() {
        let child = text_node("Price", "[0,0][10,10]");
        let parent = TreeNode {
            children: vec![child.clone()],
            ..Default::default()
        };
        let other = TreeNode::default();
        let nodes = vec![parent.clone(), other];

        assert_eq!(contains_child(child)(&nodes), vec![parent]);
    }

    #[test]
    fn test_contains_descendants_requires_every_filter() {
        let title = text_node("Title", "[0,0][10,10]");
        let price = text_node("Price", "[0,20][10,30]");
        let full_card = TreeNode {
            children: vec![title.clone(), price.clone()],
            ..Default::default()
        };
        let partial_card = TreeNode {
            children: vec![title],
            ..Default::default()
        };
        let nodes = vec![full_card.clone(), partial_card];

        let filter = contains_descendants(vec![
            text_matching(compile_selector_regex("Title").unwrap()),
            text_matching(compile_selector_regex("Price").unwrap()),
        ]);
        assert_eq!(filter(&nodes), vec![full_card]);
    }

    #[test]
    fn test_size_matching_with_tolerance() {
        let node = text_node("Box", "[0,0][100,50]");
        let nodes = vec![node.clone()];

        assert_eq!(size_matching(Some(100), Some(50), None)(&nodes), vec![node.clone()]);
        assert_eq!(
            size_matching(Some(95), Some(45), Some(5))(&nodes),
            vec![node.clone()]
        );
        assert!(size_matching(Some(90), Some(50), Some(5))(&nodes).is_empty());
        // Unconstrained height.
        assert_eq!(size_matching(Some(100), None, None)(&nodes), vec![node]);
    }

    #[test]
    fn test_traits() {
        let mut square = text_node("", "[0,0][50,50]");
        square.attributes.remove("text");
        let texty = text_node("hello", "[0,0][10,20]");
        let long = text_node(&"x".repeat(201), "[0,0][10,20]");
        let nodes = vec![square.clone(), texty.clone(), long.clone()];

        assert_eq!(has_trait(ElementTrait::Square)(&nodes), vec![square]);
        assert_eq!(
            has_trait(ElementTrait::Text)(&nodes),
            vec![texty, long.clone()]
        );
        assert_eq!(has_trait(ElementTrait::LongText)(&nodes), vec![long]);
    }
}
