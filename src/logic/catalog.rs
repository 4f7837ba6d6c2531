use itertools::Itertools;
use std::cmp::Ordering;

use crate::error::{InventoryError, InventoryResult};
use crate::model::{
    CatalogPartRow, CatalogStats, Color, ColorId, MinifigSource, PartInfo, PartKey, PartSource,
    SetInfo, SetInventory, SetInventoryPart, SetSuggestion, Theme,
};
use crate::store::traits::Store;

pub const MIN_SUGGESTION_QUERY_LEN: usize = 2;
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;
pub const MAX_SUGGESTION_LIMIT: usize = 50;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;

pub fn element_image_url(element_id: &str) -> String {
    format!(
        "https://cdn.rebrickable.com/media/parts/photos/{}.jpg",
        element_id
    )
}

pub fn generic_part_image_url(part_num: &str) -> String {
    format!("https://cdn.rebrickable.com/media/parts/ldraw/{}.png", part_num)
}

/// Rank of a set number for an autocomplete query: 0 for prefix matches,
/// 1 for substring-only matches, `None` when it does not match at all.
pub fn suggestion_rank(set_num: &str, partial: &str) -> Option<u8> {
    let set_num = set_num.to_lowercase();
    let partial = partial.to_lowercase();
    if set_num.starts_with(&partial) {
        Some(0)
    } else if set_num.contains(&partial) {
        Some(1)
    } else {
        None
    }
}

/// Display order: regular before spare, "any color" first, then color name,
/// category, part name.
fn display_order(a: &SetInventoryPart, b: &SetInventoryPart) -> Ordering {
    a.is_spare
        .cmp(&b.is_spare)
        .then_with(|| (!a.is_any_color()).cmp(&!b.is_any_color()))
        .then_with(|| a.color_name.cmp(&b.color_name))
        .then_with(|| {
            a.part_category
                .as_deref()
                .unwrap_or("")
                .cmp(b.part_category.as_deref().unwrap_or(""))
        })
        .then_with(|| a.part_name.cmp(&b.part_name))
        .then_with(|| a.part_number.cmp(&b.part_number))
        .then_with(|| a.is_minifig_part.cmp(&b.is_minifig_part))
}

fn row_key(row: &CatalogPartRow) -> PartKey {
    PartKey {
        part_num: row.part_num.clone(),
        color_id: row.color_id,
        is_spare: row.is_spare,
        is_minifig_part: matches!(row.source, PartSource::Minifig { .. }),
    }
}

fn merge_rows(key: PartKey, rows: Vec<CatalogPartRow>) -> Option<SetInventoryPart> {
    let first = rows.first()?.clone();

    let image_url = rows
        .iter()
        .find_map(|r| r.img_url.clone().filter(|u| !u.is_empty()))
        .or_else(|| {
            rows.iter()
                .find_map(|r| r.element_id.as_deref().map(element_image_url))
        })
        .unwrap_or_else(|| generic_part_image_url(&key.part_num));

    let minifig_sources = rows
        .iter()
        .filter_map(|r| match &r.source {
            PartSource::Minifig { fig_num, fig_name } => Some(MinifigSource {
                minifig_num: fig_num.clone(),
                minifig_name: fig_name.clone(),
                quantity: r.quantity,
            }),
            PartSource::Set => None,
        })
        .collect();

    Some(SetInventoryPart {
        part_number: key.part_num,
        part_name: first.part_name,
        part_category: first.part_category,
        color_id: key.color_id,
        color_name: first.color_name,
        color_rgb: first.color_rgb,
        quantity: rows.iter().map(|r| r.quantity).sum(),
        is_spare: key.is_spare,
        is_minifig_part: key.is_minifig_part,
        part_image_url: image_url,
        minifig_sources,
    })
}

/// Group raw rows by part key and order them for display
pub fn assemble_inventory(set: SetInfo, rows: Vec<CatalogPartRow>) -> SetInventory {
    let parts = rows
        .into_iter()
        .into_group_map_by(row_key)
        .into_iter()
        .filter_map(|(key, rows)| merge_rows(key, rows))
        .sorted_by(display_order)
        .collect();

    SetInventory { set, parts }
}

fn clamp_limit(limit: Option<usize>, default: usize, max: usize) -> usize {
    limit.unwrap_or(default).clamp(1, max)
}

/// Read-only catalog operations
pub struct CatalogLookup;

impl CatalogLookup {
    pub async fn lookup_set<S: Store>(store: &S, set_num: &str) -> InventoryResult<SetInventory> {
        let set_num = set_num.trim();
        if set_num.is_empty() {
            return Err(InventoryError::validation("Set number is required"));
        }

        let set = store
            .get_set(set_num)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("Set '{}'", set_num)))?;
        let rows = store.list_set_part_rows(set_num).await?;

        Ok(assemble_inventory(set, rows))
    }

    pub async fn suggest_sets<S: Store>(
        store: &S,
        partial: &str,
        limit: Option<usize>,
    ) -> InventoryResult<Vec<SetSuggestion>> {
        let partial = partial.trim();
        if partial.chars().count() < MIN_SUGGESTION_QUERY_LEN {
            return Ok(Vec::new());
        }
        let limit = clamp_limit(limit, DEFAULT_SUGGESTION_LIMIT, MAX_SUGGESTION_LIMIT);
        Ok(store.suggest_sets(partial, limit).await?)
    }

    pub async fn search_sets<S: Store>(
        store: &S,
        query: &str,
        limit: Option<usize>,
    ) -> InventoryResult<Vec<SetInfo>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(InventoryError::validation("Search query is required"));
        }
        let limit = clamp_limit(limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);
        Ok(store.search_sets(query, limit).await?)
    }

    pub async fn get_theme<S: Store>(store: &S, id: i32) -> InventoryResult<Theme> {
        store
            .get_theme(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("Theme {}", id)))
    }

    pub async fn get_part<S: Store>(store: &S, part_num: &str) -> InventoryResult<PartInfo> {
        store
            .get_part(part_num)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("Part '{}'", part_num)))
    }

    pub async fn get_color<S: Store>(store: &S, id: ColorId) -> InventoryResult<Color> {
        store
            .get_color(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("Color {}", id)))
    }

    pub async fn catalog_stats<S: Store>(store: &S) -> InventoryResult<CatalogStats> {
        Ok(store.catalog_stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ANY_COLOR_ID;

    fn set_info() -> SetInfo {
        SetInfo {
            set_number: "75001-1".to_string(),
            set_name: "Republic Troopers vs. Sith Troopers".to_string(),
            year: Some(2013),
            theme_id: Some(158),
            theme_name: Some("Star Wars".to_string()),
            num_parts: Some(63),
            set_image: None,
            set_url: SetInfo::catalog_url("75001-1"),
        }
    }

    fn row(part: &str, color: ColorId, color_name: &str, qty: i32) -> CatalogPartRow {
        CatalogPartRow {
            part_num: part.to_string(),
            part_name: format!("Part {}", part),
            part_category: Some("Bricks".to_string()),
            color_id: color,
            color_name: color_name.to_string(),
            color_rgb: None,
            quantity: qty,
            is_spare: false,
            img_url: None,
            element_id: None,
            source: PartSource::Set,
        }
    }

    fn minifig_row(part: &str, fig: &str, qty: i32) -> CatalogPartRow {
        CatalogPartRow {
            source: PartSource::Minifig {
                fig_num: fig.to_string(),
                fig_name: Some(format!("Fig {}", fig)),
            },
            ..row(part, 0, "Black", qty)
        }
    }

    #[test]
    fn test_minifig_rows_are_grouped_separately_from_set_rows() {
        let rows = vec![
            row("3626c", 0, "Black", 1),
            minifig_row("3626c", "fig-000001", 2),
            minifig_row("3626c", "fig-000002", 1),
        ];
        let inventory = assemble_inventory(set_info(), rows);

        assert_eq!(inventory.parts.len(), 2);
        let minifig = inventory
            .find(&PartKey::new("3626c", 0).minifig())
            .expect("minifig row");
        assert_eq!(minifig.quantity, 3);
        assert_eq!(minifig.minifig_sources.len(), 2);

        let regular = inventory.find(&PartKey::new("3626c", 0)).expect("set row");
        assert_eq!(regular.quantity, 1);
        assert!(regular.minifig_sources.is_empty());
    }

    #[test]
    fn test_display_order() {
        let mut spare = row("3023", 4, "Red", 1);
        spare.is_spare = true;
        let rows = vec![
            spare,
            row("3001", 4, "Red", 2),
            row("3003", 0, "Black", 2),
            row("3004", ANY_COLOR_ID, "[No Color/Any Color]", 1),
        ];
        let inventory = assemble_inventory(set_info(), rows);
        let order: Vec<&str> = inventory
            .parts
            .iter()
            .map(|p| p.part_number.as_str())
            .collect();
        assert_eq!(order, vec!["3004", "3003", "3001", "3023"]);
    }

    #[test]
    fn test_image_url_fallbacks() {
        let mut with_image = row("3001", 4, "Red", 1);
        with_image.img_url = Some("https://img.example/3001.png".to_string());
        let mut with_element = row("3003", 4, "Red", 1);
        with_element.element_id = Some("300321".to_string());
        let bare = row("3004", 4, "Red", 1);

        let inventory = assemble_inventory(set_info(), vec![with_image, with_element, bare]);
        let url = |part: &str| {
            inventory
                .find(&PartKey::new(part, 4))
                .map(|p| p.part_image_url.clone())
                .unwrap()
        };
        assert_eq!(url("3001"), "https://img.example/3001.png");
        assert_eq!(
            url("3003"),
            "https://cdn.rebrickable.com/media/parts/photos/300321.jpg"
        );
        assert_eq!(
            url("3004"),
            "https://cdn.rebrickable.com/media/parts/ldraw/3004.png"
        );
    }

    #[test]
    fn test_required_part_count_skips_spares() {
        let mut spare = row("3023", 4, "Red", 5);
        spare.is_spare = true;
        let inventory = assemble_inventory(
            set_info(),
            vec![row("3001", 4, "Red", 2), spare, minifig_row("973", "fig-1", 3)],
        );
        assert_eq!(inventory.required_part_count(), 5);
    }

    #[test]
    fn test_suggestion_rank() {
        assert_eq!(suggestion_rank("10265-1", "1026"), Some(0));
        assert_eq!(suggestion_rank("21026-1", "1026"), Some(1));
        assert_eq!(suggestion_rank("75001-1", "1026"), None);
        assert_eq!(suggestion_rank("SW0001A", "sw0"), Some(0));
    }
}
