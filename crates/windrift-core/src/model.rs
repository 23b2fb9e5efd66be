//! The browser-session domain model: Session, Window, Tab, TabGroup.
//!
//! These are the values the rest of the core moves around, encrypts, and
//! reconciles. They carry no I/O and no crypto of their own; `crypto.rs`
//! and `windrift-store` operate on the serialized form.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// How a session came to exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionProvenance {
    Manual,
    Auto,
    Import,
}

/// The fixed 8-color palette a `TabGroup` color must be drawn from.
pub const GROUP_COLOR_PALETTE: [&str; 8] = [
    "grey", "blue", "red", "yellow", "green", "pink", "purple", "cyan",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
}

impl GroupColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grey => "grey",
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Pink => "pink",
            Self::Purple => "purple",
            Self::Cyan => "cyan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "grey" => Self::Grey,
            "blue" => Self::Blue,
            "red" => Self::Red,
            "yellow" => Self::Yellow,
            "green" => Self::Green,
            "pink" => Self::Pink,
            "purple" => Self::Purple,
            "cyan" => Self::Cyan,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Normal,
    Minimized,
    Maximized,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TabGroup {
    pub id: String,
    pub title: String,
    pub color: GroupColor,
    pub collapsed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub url: String,
    pub title: String,
    pub index: u32,
    pub pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discarded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub id: String,
    pub tabs: Vec<Tab>,
    pub groups: Vec<TabGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WindowState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub windows: Vec<Window>,
    pub provenance: SessionProvenance,
}

/// Errors raised by the structural-invariant checks in this module.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("group color '{0}' is not one of the 8 allowed palette values")]
    InvalidGroupColor(String),
    #[error("tab {tab_id} references group {group_id} which is not in its own window")]
    DanglingGroupReference { tab_id: String, group_id: String },
}

impl Window {
    /// Renumbers tabs to 0..N-1 in their current order, never leaving gaps.
    ///
    /// Per spec: "Within one Window, tab indexes are 0..N-1 after any
    /// restore; gaps are never persisted."
    pub fn renumber_tabs(&mut self) {
        for (i, tab) in self.tabs.iter_mut().enumerate() {
            tab.index = i as u32;
        }
    }

    /// Validates that every tab's group reference, if present, points at a
    /// group that exists in this same window.
    pub fn validate_group_references(&self) -> Result<(), ModelError> {
        for tab in &self.tabs {
            if let Some(group_id) = &tab.group_id
                && !self.groups.iter().any(|g| &g.id == group_id)
            {
                return Err(ModelError::DanglingGroupReference {
                    tab_id: tab.id.clone(),
                    group_id: group_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Drops groups that are no longer referenced by any surviving tab.
    pub fn drop_unreferenced_groups(&mut self) {
        let referenced: std::collections::HashSet<&str> = self
            .tabs
            .iter()
            .filter_map(|t| t.group_id.as_deref())
            .collect();
        self.groups.retain(|g| referenced.contains(g.id.as_str()));
    }
}

impl GroupColor {
    pub fn validate(s: &str) -> Result<Self, ModelError> {
        Self::parse(s).ok_or_else(|| ModelError::InvalidGroupColor(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: &str, index: u32, group_id: Option<&str>) -> Tab {
        Tab {
            id: id.to_string(),
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            index,
            pinned: false,
            favicon_url: None,
            discarded: None,
            group_id: group_id.map(str::to_string),
        }
    }

    #[test]
    fn renumber_tabs_closes_gaps() {
        let mut window = Window {
            id: "w1".to_string(),
            tabs: vec![tab("a", 5, None), tab("b", 9, None), tab("c", 100, None)],
            groups: vec![],
            focused: None,
            state: None,
        };
        window.renumber_tabs();
        let indexes: Vec<u32> = window.tabs.iter().map(|t| t.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn dangling_group_reference_is_rejected() {
        let window = Window {
            id: "w1".to_string(),
            tabs: vec![tab("a", 0, Some("missing-group"))],
            groups: vec![],
            focused: None,
            state: None,
        };
        assert_eq!(
            window.validate_group_references(),
            Err(ModelError::DanglingGroupReference {
                tab_id: "a".to_string(),
                group_id: "missing-group".to_string(),
            })
        );
    }

    #[test]
    fn palette_rejects_unknown_colors() {
        assert!(GroupColor::validate("grey").is_ok());
        assert!(GroupColor::validate("chartreuse").is_err());
    }

    #[test]
    fn unreferenced_groups_are_dropped() {
        let mut window = Window {
            id: "w1".to_string(),
            tabs: vec![tab("a", 0, Some("g1"))],
            groups: vec![
                TabGroup {
                    id: "g1".to_string(),
                    title: "Kept".to_string(),
                    color: GroupColor::Blue,
                    collapsed: false,
                },
                TabGroup {
                    id: "g2".to_string(),
                    title: "Dropped".to_string(),
                    color: GroupColor::Red,
                    collapsed: false,
                },
            ],
            focused: None,
            state: None,
        };
        window.drop_unreferenced_groups();
        assert_eq!(window.groups.len(), 1);
        assert_eq!(window.groups[0].id, "g1");
    }
}
