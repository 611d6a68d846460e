// Module: Hierarchy
// View-hierarchy snapshots as reported by the device driver.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static BOUNDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("valid bounds regex")
});

/// One accessibility node in a view-hierarchy snapshot.
///
/// Attributes are driver-reported key/value pairs (`text`, `id`, `bounds`,
/// `hintText`, ...). The boolean properties are kept separate because not
/// every driver reports them; `None` means "not reported".
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub children: Vec<TreeNode>,
    #[serde(default)]
    pub clickable: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub focused: Option<bool>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub selected: Option<bool>,
}

impl TreeNode {
    /// Returns the value of a driver attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Flattens the subtree rooted at this node in document order,
    /// the node itself first.
    pub fn aggregate(&self) -> Vec<TreeNode> {
        let mut nodes = vec![self.clone()];
        for child in &self.children {
            nodes.extend(child.aggregate());
        }
        nodes
    }

    /// Parses the `bounds` attribute (`[left,top][right,bottom]`).
    /// Nodes without parseable bounds report a zero-sized rectangle.
    pub fn bounds(&self) -> Bounds {
        self.attribute("bounds")
            .and_then(|raw| {
                let caps = BOUNDS_RE.captures(raw)?;
                let left: i64 = caps[1].parse().ok()?;
                let top: i64 = caps[2].parse().ok()?;
                let right: i64 = caps[3].parse().ok()?;
                let bottom: i64 = caps[4].parse().ok()?;
                Some(Bounds {
                    x: left,
                    y: top,
                    width: right - left,
                    height: bottom - top,
                })
            })
            .unwrap_or_default()
    }

    pub fn to_ui_element(&self) -> UiElement {
        UiElement {
            bounds: self.bounds(),
            node: self.clone(),
        }
    }
}

/// Rectangle occupied by an element, in device grid coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Bounds {
    pub fn center(&self) -> (i64, i64) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Fraction of this rectangle that lies inside the screen rectangle
    /// `(0, 0, screen_width, screen_height)`, in `0.0..=1.0`.
    pub fn visible_percentage(&self, screen_width: i64, screen_height: i64) -> f64 {
        let area = self.width * self.height;
        if area <= 0 {
            return 0.0;
        }
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = (self.x + self.width).min(screen_width);
        let bottom = (self.y + self.height).min(screen_height);
        let visible_width = (right - left).max(0);
        let visible_height = (bottom - top).max(0);
        (visible_width * visible_height) as f64 / area as f64
    }
}

/// A full snapshot of the current screen's accessibility tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewHierarchy {
    pub root: TreeNode,
}

impl ViewHierarchy {
    pub fn aggregate(&self) -> Vec<TreeNode> {
        self.root.aggregate()
    }
}

/// A matched element: the node that satisfied a lookup plus its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiElement {
    pub node: TreeNode,
    pub bounds: Bounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_bounds(bounds: &str) -> TreeNode {
        TreeNode {
            attributes: HashMap::from([("bounds".to_string(), bounds.to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn test_bounds_parsing() {
        let node = node_with_bounds("[10,20][110,220]");
        let bounds = node.bounds();
        assert_eq!(bounds.x, 10);
        assert_eq!(bounds.y, 20);
        assert_eq!(bounds.width, 100);
        assert_eq!(bounds.height, 200);
        assert_eq!(bounds.center(), (60, 120));
    }

    #[test]
    fn test_missing_bounds_are_zero() {
        let node = TreeNode::default();
        assert_eq!(node.bounds(), Bounds::default());
        assert_eq!(node.bounds().visible_percentage(1080, 1920), 0.0);
    }

    #[test]
    fn test_aggregate_is_document_order() {
        let tree = TreeNode {
            attributes: HashMap::from([("id".to_string(), "root".to_string())]),
            children: vec![
                TreeNode {
                    attributes: HashMap::from([("id".to_string(), "a".to_string())]),
                    children: vec![TreeNode {
                        attributes: HashMap::from([("id".to_string(), "a1".to_string())]),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                TreeNode {
                    attributes: HashMap::from([("id".to_string(), "b".to_string())]),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let ids: Vec<_> = tree
            .aggregate()
            .iter()
            .map(|n| n.attribute("id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_visible_percentage_partially_off_screen() {
        // 100x100 element, half of it below the bottom edge.
        let node = node_with_bounds("[0,150][100,250]");
        let visible = node.bounds().visible_percentage(200, 200);
        assert!((visible - 0.5).abs() < f64::EPSILON, "got {}", visible);
    }

    #[test]
    fn test_visible_percentage_fully_on_screen() {
        let node = node_with_bounds("[0,0][50,50]");
        assert_eq!(node.bounds().visible_percentage(200, 200), 1.0);
    }
}
