use crate::model::{
    CatalogSnapshot, Color, ColorId, Element, Inventory, InventoryMinifig, InventoryPart,
    LegoSet, Minifig, Part, PartCategory, Theme, ANY_COLOR_ID,
};
use crate::store::traits::Store;
use anyhow::Result;

const BLACK: ColorId = 0;
const RED: ColorId = 4;
const YELLOW: ColorId = 14;
const WHITE: ColorId = 15;
const LIGHT_BLUISH_GRAY: ColorId = 71;
const TRANS_CLEAR: ColorId = 47;

fn theme(id: i32, name: &str) -> Theme {
    Theme {
        id,
        name: name.to_string(),
        parent_id: None,
    }
}

fn color(id: ColorId, name: &str, rgb: &str, is_trans: bool) -> Color {
    Color {
        id,
        name: name.to_string(),
        rgb: Some(rgb.to_string()),
        is_trans,
    }
}

fn part(part_num: &str, name: &str, part_cat_id: i32) -> Part {
    Part {
        part_num: part_num.to_string(),
        name: name.to_string(),
        part_cat_id: Some(part_cat_id),
        part_material: Some("Plastic".to_string()),
    }
}

fn set(set_num: &str, name: &str, year: i32, theme_id: i32, num_parts: i32) -> LegoSet {
    LegoSet {
        set_num: set_num.to_string(),
        name: name.to_string(),
        year: Some(year),
        theme_id: Some(theme_id),
        num_parts: Some(num_parts),
        img_url: Some(format!(
            "https://cdn.rebrickable.com/media/sets/{}.jpg",
            set_num
        )),
    }
}

fn inventory(id: i32, set_num: &str) -> Inventory {
    Inventory {
        id,
        version: Some(1),
        set_num: set_num.to_string(),
    }
}

fn inv_part(inventory_id: i32, part_num: &str, color_id: ColorId, quantity: i32) -> InventoryPart {
    InventoryPart {
        inventory_id,
        part_num: part_num.to_string(),
        color_id,
        quantity,
        is_spare: false,
        img_url: None,
    }
}

fn spare(inventory_id: i32, part_num: &str, color_id: ColorId, quantity: i32) -> InventoryPart {
    InventoryPart {
        is_spare: true,
        ..inv_part(inventory_id, part_num, color_id, quantity)
    }
}

fn element(element_id: &str, part_num: &str, color_id: ColorId) -> Element {
    Element {
        element_id: element_id.to_string(),
        part_num: part_num.to_string(),
        color_id,
    }
}

/// Small demonstration catalog: a few sets, one with minifigs, and an
/// "any color" row.
pub fn demo_catalog() -> CatalogSnapshot {
    let themes = vec![
        theme(158, "Star Wars"),
        theme(608, "Architecture"),
        theme(721, "Icons"),
    ];

    let part_categories = vec![
        PartCategory { id: 3, name: "Bricks Sloped".to_string() },
        PartCategory { id: 11, name: "Bricks".to_string() },
        PartCategory { id: 14, name: "Plates".to_string() },
        PartCategory { id: 27, name: "Minifig Accessories".to_string() },
        PartCategory { id: 59, name: "Minifig Heads".to_string() },
        PartCategory { id: 60, name: "Minifig Upper Body".to_string() },
        PartCategory { id: 61, name: "Minifig Lower Body".to_string() },
    ];

    let colors = vec![
        color(BLACK, "Black", "05131D", false),
        color(RED, "Red", "C91A09", false),
        color(YELLOW, "Yellow", "F2CD37", false),
        color(WHITE, "White", "FFFFFF", false),
        color(TRANS_CLEAR, "Trans-Clear", "FCFCFC", true),
        color(LIGHT_BLUISH_GRAY, "Light Bluish Gray", "A0A5A9", false),
        color(ANY_COLOR_ID, "[No Color/Any Color]", "05131D", false),
    ];

    let parts = vec![
        part("3001", "Brick 2 x 4", 11),
        part("3003", "Brick 2 x 2", 11),
        part("3004", "Brick 1 x 2", 11),
        part("3023", "Plate 1 x 2", 14),
        part("3024", "Plate 1 x 1", 14),
        part("3039", "Slope 45 2 x 2", 3),
        part("3626c", "Minifig Head", 59),
        part("973c00", "Torso Plain", 60),
        part("970c00", "Hips and Legs Plain", 61),
        part("64567", "Minifig Lightsaber Hilt", 27),
    ];

    // num_parts is the non-spare total, minifig parts included.
    let sets = vec![
        set("10260-1", "Downtown Diner", 2018, 721, 15),
        set("10265-1", "Ford Mustang", 2019, 721, 16),
        set("21026-1", "Venice", 2016, 608, 22),
        set("75001-1", "Republic Troopers vs. Sith Troopers", 2013, 158, 19),
    ];

    let inventories = vec![
        inventory(1, "10265-1"),
        inventory(2, "21026-1"),
        inventory(3, "75001-1"),
        inventory(4, "10260-1"),
        inventory(10, "fig-000001"),
        inventory(11, "fig-000002"),
    ];

    let mut mustang_brick = inv_part(1, "3001", RED, 4);
    mustang_brick.img_url = Some("https://cdn.rebrickable.com/media/parts/elements/300121.jpg".to_string());

    let inventory_parts = vec![
        // 10265-1
        mustang_brick,
        inv_part(1, "3003", RED, 2),
        inv_part(1, "3023", BLACK, 6),
        inv_part(1, "3024", ANY_COLOR_ID, 2),
        inv_part(1, "3039", RED, 2),
        spare(1, "3024", BLACK, 1),
        // 21026-1
        inv_part(2, "3003", WHITE, 4),
        inv_part(2, "3004", WHITE, 6),
        inv_part(2, "3023", LIGHT_BLUISH_GRAY, 8),
        inv_part(2, "3024", WHITE, 4),
        spare(2, "3024", WHITE, 1),
        // 75001-1
        inv_part(3, "3001", BLACK, 2),
        inv_part(3, "3023", LIGHT_BLUISH_GRAY, 3),
        spare(3, "64567", BLACK, 1),
        // 10260-1
        inv_part(4, "3004", YELLOW, 10),
        inv_part(4, "3023", WHITE, 5),
        // fig-000001
        inv_part(10, "3626c", WHITE, 1),
        inv_part(10, "973c00", WHITE, 1),
        inv_part(10, "970c00", WHITE, 1),
        // fig-000002
        inv_part(11, "3626c", BLACK, 1),
        inv_part(11, "973c00", RED, 1),
        inv_part(11, "970c00", BLACK, 1),
        inv_part(11, "64567", BLACK, 1),
    ];

    let elements = vec![
        element("300121", "3001", RED),
        element("300321", "3003", RED),
        element("302326", "3023", BLACK),
        element("4211398", "3023", LIGHT_BLUISH_GRAY),
        element("300401", "3004", WHITE),
    ];

    let minifigs = vec![
        Minifig {
            fig_num: "fig-000001".to_string(),
            name: "Republic Trooper".to_string(),
            num_parts: Some(3),
            img_url: None,
        },
        Minifig {
            fig_num: "fig-000002".to_string(),
            name: "Sith Trooper".to_string(),
            num_parts: Some(4),
            img_url: None,
        },
    ];

    let inventory_minifigs = vec![
        InventoryMinifig {
            inventory_id: 3,
            fig_num: "fig-000001".to_string(),
            quantity: 2,
        },
        InventoryMinifig {
            inventory_id: 3,
            fig_num: "fig-000002".to_string(),
            quantity: 2,
        },
    ];

    CatalogSnapshot {
        themes,
        part_categories,
        colors,
        parts,
        sets,
        inventories,
        inventory_parts,
        elements,
        minifigs,
        inventory_minifigs,
    }
}

pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let snapshot = demo_catalog();
    log::info!(
        "Loading demo catalog: {} sets, {} inventory rows",
        snapshot.sets.len(),
        snapshot.inventory_parts.len()
    );
    store.replace_catalog(snapshot).await
}
