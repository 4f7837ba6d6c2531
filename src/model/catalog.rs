use crate::model::{ColorId, PartKey, ANY_COLOR_ID};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartCategory {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub id: ColorId,
    pub name: String,
    pub rgb: Option<String>,
    pub is_trans: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub part_num: String,
    pub name: String,
    pub part_cat_id: Option<i32>,
    pub part_material: Option<String>,
}

/// Part with its category name resolved, as returned by part lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartInfo {
    pub part_num: String,
    pub name: String,
    pub part_cat_id: Option<i32>,
    pub part_material: Option<String>,
    pub part_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegoSet {
    pub set_num: String,
    pub name: String,
    pub year: Option<i32>,
    pub theme_id: Option<i32>,
    pub num_parts: Option<i32>,
    pub img_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: i32,
    pub version: Option<i32>,
    /// Set number or minifig number this inventory belongs to
    pub set_num: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryPart {
    pub inventory_id: i32,
    pub part_num: String,
    pub color_id: ColorId,
    pub quantity: i32,
    pub is_spare: bool,
    pub img_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub element_id: String,
    pub part_num: String,
    pub color_id: ColorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minifig {
    pub fig_num: String,
    pub name: String,
    pub num_parts: Option<i32>,
    pub img_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMinifig {
    pub inventory_id: i32,
    pub fig_num: String,
    pub quantity: i32,
}

/// A full replacement of the reference tables.
///
/// Loading a snapshot replaces every catalog table; user data is untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub themes: Vec<Theme>,
    pub part_categories: Vec<PartCategory>,
    pub colors: Vec<Color>,
    pub parts: Vec<Part>,
    pub sets: Vec<LegoSet>,
    pub inventories: Vec<Inventory>,
    pub inventory_parts: Vec<InventoryPart>,
    pub elements: Vec<Element>,
    pub minifigs: Vec<Minifig>,
    pub inventory_minifigs: Vec<InventoryMinifig>,
}

/// Set row joined with its theme, as shown to users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetInfo {
    pub set_number: String,
    pub set_name: String,
    pub year: Option<i32>,
    pub theme_id: Option<i32>,
    pub theme_name: Option<String>,
    pub num_parts: Option<i32>,
    pub set_image: Option<String>,
    pub set_url: String,
}

impl SetInfo {
    pub fn catalog_url(set_num: &str) -> String {
        format!("https://rebrickable.com/sets/{}/", set_num)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSuggestion {
    pub set_number: String,
    pub set_name: String,
}

/// Where a raw inventory row came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartSource {
    Set,
    Minifig {
        fig_num: String,
        fig_name: Option<String>,
    },
}

/// One joined inventory row as read from the store, before grouping.
///
/// Minifig rows already carry `part quantity * minifig count`.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPartRow {
    pub part_num: String,
    pub part_name: String,
    pub part_category: Option<String>,
    pub color_id: ColorId,
    pub color_name: String,
    pub color_rgb: Option<String>,
    pub quantity: i32,
    pub is_spare: bool,
    pub img_url: Option<String>,
    pub element_id: Option<String>,
    pub source: PartSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinifigSource {
    pub minifig_num: String,
    pub minifig_name: Option<String>,
    pub quantity: i32,
}

/// Grouped inventory row for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetInventoryPart {
    pub part_number: String,
    pub part_name: String,
    pub part_category: Option<String>,
    pub color_id: ColorId,
    pub color_name: String,
    pub color_rgb: Option<String>,
    pub quantity: i32,
    pub is_spare: bool,
    pub is_minifig_part: bool,
    pub part_image_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub minifig_sources: Vec<MinifigSource>,
}

impl SetInventoryPart {
    pub fn key(&self) -> PartKey {
        PartKey {
            part_num: self.part_number.clone(),
            color_id: self.color_id,
            is_spare: self.is_spare,
            is_minifig_part: self.is_minifig_part,
        }
    }

    pub fn is_any_color(&self) -> bool {
        self.color_id == ANY_COLOR_ID
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetInventory {
    #[serde(flatten)]
    pub set: SetInfo,
    #[serde(rename = "inventory")]
    pub parts: Vec<SetInventoryPart>,
}

impl SetInventory {
    /// Sum of non-spare quantities, set and minifig parts alike
    pub fn required_part_count(&self) -> i64 {
        self.parts
            .iter()
            .filter(|p| !p.is_spare)
            .map(|p| i64::from(p.quantity))
            .sum()
    }

    pub fn find(&self, key: &PartKey) -> Option<&SetInventoryPart> {
        self.parts.iter().find(|p| {
            p.part_number == key.part_num
                && p.color_id == key.color_id
                && p.is_spare == key.is_spare
                && p.is_minifig_part == key.is_minifig_part
        })
    }
}

/// Row counts per catalog table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    #[serde(flatten)]
    pub tables: BTreeMap<String, i64>,
}

impl CatalogStats {
    pub fn count(&self, table: &str) -> i64 {
        self.tables.get(table).copied().unwrap_or(0)
    }
}

pub const CATALOG_TABLES: [&str; 10] = [
    "themes",
    "part_categories",
    "colors",
    "parts",
    "sets",
    "inventories",
    "inventory_parts",
    "elements",
    "minifigs",
    "inventory_minifigs",
];
