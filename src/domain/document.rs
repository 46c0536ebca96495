// Configuration document model
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

fn default_true() -> bool {
    true
}

/// Full state of one named dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub settings: Settings,
}

impl ConfigDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            name: name.into(),
            categories: Vec::new(),
            settings: Settings::default(),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }
}

/// Global settings. Keys this version does not know about are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub customization: CustomizationSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationSettings {
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Optional UI regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    #[serde(default = "default_true")]
    pub enabled_left_sidebar: bool,
    #[serde(default = "default_true")]
    pub enabled_right_sidebar: bool,
    #[serde(default)]
    pub enabled_docker: bool,
    #[serde(default)]
    pub enabled_ping: bool,
    #[serde(default)]
    pub enabled_searchbar: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            enabled_left_sidebar: true,
            enabled_right_sidebar: true,
            enabled_docker: false,
            enabled_ping: false,
            enabled_searchbar: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutFlag {
    LeftSidebar,
    RightSidebar,
    Docker,
    Ping,
    Searchbar,
}

impl LayoutSettings {
    pub fn get(&self, flag: LayoutFlag) -> bool {
        match flag {
            LayoutFlag::LeftSidebar => self.enabled_left_sidebar,
            LayoutFlag::RightSidebar => self.enabled_right_sidebar,
            LayoutFlag::Docker => self.enabled_docker,
            LayoutFlag::Ping => self.enabled_ping,
            LayoutFlag::Searchbar => self.enabled_searchbar,
        }
    }

    pub fn with(mut self, flag: LayoutFlag, value: bool) -> Self {
        let slot = match flag {
            LayoutFlag::LeftSidebar => &mut self.enabled_left_sidebar,
            LayoutFlag::RightSidebar => &mut self.enabled_right_sidebar,
            LayoutFlag::Docker => &mut self.enabled_docker,
            LayoutFlag::Ping => &mut self.enabled_ping,
            LayoutFlag::Searchbar => &mut self.enabled_searchbar,
        };
        *slot = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }
}

/// An app or widget placed on the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub kind: ItemKind,
    #[serde(default)]
    pub placement: BTreeMap<Breakpoint, Placement>,
}

impl Item {
    pub fn app(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::App {
                name: name.into(),
                url: url.into(),
                icon: None,
            },
            placement: BTreeMap::new(),
        }
    }

    pub fn widget(id: impl Into<String>, widget_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ItemKind::Widget {
                widget_type: widget_type.into(),
                options: Map::new(),
            },
            placement: BTreeMap::new(),
        }
    }

    pub fn placed(mut self, breakpoint: Breakpoint, placement: Placement) -> Self {
        self.placement.insert(breakpoint, placement);
        self
    }

    pub fn placement_at(&self, breakpoint: Breakpoint) -> Option<Placement> {
        self.placement.get(&breakpoint).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ItemKind {
    App {
        name: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    Widget {
        widget_type: String,
        #[serde(default)]
        options: Map<String, Value>,
    },
}

impl ItemKind {
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::App { .. } => "app",
            ItemKind::Widget { .. } => "widget",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Small,
    Medium,
    Large,
}

/// Grid coordinates of an item for one breakpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Saturates at `u32::MAX`, stored coordinates are not trusted
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Width and height raised to at least one cell
    pub fn normalized(self) -> Self {
        Self {
            width: self.width.max(1),
            height: self.height.max(1),
            ..self
        }
    }

    pub fn at(self, x: u32, y: u32) -> Self {
        Self { x, y, ..self }
    }

    pub fn overlaps(&self, other: &Placement) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}
