use anyhow::{anyhow, Result};
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::logic::catalog::suggestion_rank;
use crate::logic::quantity::resolve_change;
use crate::model::{
    CatalogPartRow, CatalogSnapshot, CatalogStats, Color, ColorId, Element, InstanceId,
    InstancePartOverride, InstanceSummary, Inventory, InventoryInstance, InventoryMinifig,
    InventoryPart, LegoSet, Minifig, NewInstance, NewUser, Part, PartCategory, PartInfo, PartKey,
    PartSource, QuantityChange, QuantityOutcome, SetInfo, SetSuggestion, Theme, User, UserId,
};
use crate::store::traits::{CatalogStore, InstanceStore, Store, UserStore};

#[derive(Debug, Default)]
struct CatalogTables {
    themes: HashMap<i32, Theme>,
    part_categories: HashMap<i32, PartCategory>,
    colors: HashMap<ColorId, Color>,
    parts: HashMap<String, Part>,
    sets: BTreeMap<String, LegoSet>,
    inventories: Vec<Inventory>,
    inventory_parts: Vec<InventoryPart>,
    elements: Vec<Element>,
    minifigs: HashMap<String, Minifig>,
    inventory_minifigs: Vec<InventoryMinifig>,
}

impl CatalogTables {
    fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            themes: snapshot.themes.into_iter().map(|t| (t.id, t)).collect(),
            part_categories: snapshot
                .part_categories
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            colors: snapshot.colors.into_iter().map(|c| (c.id, c)).collect(),
            parts: snapshot
                .parts
                .into_iter()
                .map(|p| (p.part_num.clone(), p))
                .collect(),
            sets: snapshot
                .sets
                .into_iter()
                .map(|s| (s.set_num.clone(), s))
                .collect(),
            inventories: snapshot.inventories,
            inventory_parts: snapshot.inventory_parts,
            elements: snapshot.elements,
            minifigs: snapshot
                .minifigs
                .into_iter()
                .map(|m| (m.fig_num.clone(), m))
                .collect(),
            inventory_minifigs: snapshot.inventory_minifigs,
        }
    }

    fn set_info(&self, set: &LegoSet) -> SetInfo {
        SetInfo {
            set_number: set.set_num.clone(),
            set_name: set.name.clone(),
            year: set.year,
            theme_id: set.theme_id,
            theme_name: set
                .theme_id
                .and_then(|id| self.themes.get(&id))
                .map(|t| t.name.clone()),
            num_parts: set.num_parts,
            set_image: set.img_url.clone(),
            set_url: SetInfo::catalog_url(&set.set_num),
        }
    }

    fn inventory_ids(&self, owner: &str) -> Vec<i32> {
        self.inventories
            .iter()
            .filter(|inv| inv.set_num == owner)
            .map(|inv| inv.id)
            .collect()
    }

    fn element_for(&self, part_num: &str, color_id: ColorId) -> Option<String> {
        self.elements
            .iter()
            .filter(|e| e.part_num == part_num && e.color_id == color_id)
            .map(|e| e.element_id.clone())
            .min()
    }

    /// Inner-joins inventory parts of the given inventories with parts and colors
    fn part_rows(
        &self,
        inventory_ids: &[i32],
        multiplier: i32,
        source: &PartSource,
    ) -> Vec<CatalogPartRow> {
        self.inventory_parts
            .iter()
            .filter(|ip| inventory_ids.contains(&ip.inventory_id))
            .filter_map(|ip| {
                let part = self.parts.get(&ip.part_num)?;
                let color = self.colors.get(&ip.color_id)?;
                Some(CatalogPartRow {
                    part_num: ip.part_num.clone(),
                    part_name: part.name.clone(),
                    part_category: part
                        .part_cat_id
                        .and_then(|id| self.part_categories.get(&id))
                        .map(|c| c.name.clone()),
                    color_id: ip.color_id,
                    color_name: color.name.clone(),
                    color_rgb: color.rgb.clone(),
                    quantity: ip.quantity * multiplier,
                    is_spare: ip.is_spare,
                    img_url: ip.img_url.clone(),
                    element_id: self.element_for(&ip.part_num, ip.color_id),
                    source: source.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct UserTables {
    users: BTreeMap<UserId, User>,
    next_id: UserId,
}

#[derive(Debug, Default)]
struct InstanceTables {
    instances: BTreeMap<InstanceId, InventoryInstance>,
    overrides: HashMap<InstanceId, Vec<InstancePartOverride>>,
    next_id: InstanceId,
}

impl InstanceTables {
    fn name_taken(
        &self,
        owner_id: UserId,
        set_num: &str,
        name: &str,
        except: Option<InstanceId>,
    ) -> bool {
        self.instances.values().any(|i| {
            i.owner_id == owner_id
                && i.set_num == set_num
                && i.name == name
                && Some(i.id) != except
        })
    }

    fn touch(&mut self, id: InstanceId) {
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.updated_at = Utc::now();
        }
    }
}

fn check_override_rows(rows: &[InstancePartOverride]) -> Result<()> {
    let mut seen = HashSet::new();
    for row in rows {
        if row.quantity < 0 {
            return Err(anyhow!(
                "Negative quantity {} for {}",
                row.quantity,
                row.key()
            ));
        }
        if !seen.insert(row.key()) {
            return Err(anyhow!("Duplicate override row {}", row.key()));
        }
    }
    Ok(())
}

/// In-process store with the same semantics as the Postgres store.
///
/// Each write holds one lock for its whole duration, so a write is either
/// fully visible or not visible at all.
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: RwLock<CatalogTables>,
    users: RwLock<UserTables>,
    instances: RwLock<InstanceTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn get_set(&self, set_num: &str) -> Result<Option<SetInfo>> {
        let catalog = self.catalog.read();
        Ok(catalog.sets.get(set_num).map(|s| catalog.set_info(s)))
    }

    async fn list_set_part_rows(&self, set_num: &str) -> Result<Vec<CatalogPartRow>> {
        let catalog = self.catalog.read();
        let set_inventories = catalog.inventory_ids(set_num);

        let mut rows = catalog.part_rows(&set_inventories, 1, &PartSource::Set);

        for included in catalog
            .inventory_minifigs
            .iter()
            .filter(|im| set_inventories.contains(&im.inventory_id))
        {
            let fig_inventories = catalog.inventory_ids(&included.fig_num);
            let source = PartSource::Minifig {
                fig_num: included.fig_num.clone(),
                fig_name: catalog
                    .minifigs
                    .get(&included.fig_num)
                    .map(|m| m.name.clone()),
            };
            rows.extend(catalog.part_rows(&fig_inventories, included.quantity, &source));
        }

        Ok(rows)
    }

    async fn search_sets(&self, query: &str, limit: usize) -> Result<Vec<SetInfo>> {
        let catalog = self.catalog.read();
        let needle = query.to_lowercase();

        let mut matches: Vec<&LegoSet> = catalog
            .sets
            .values()
            .filter(|s| {
                s.set_num.to_lowercase().contains(&needle)
                    || s.name.to_lowercase().contains(&needle)
            })
            .collect();
        // Newest first, undated sets last.
        matches.sort_by_key(|s| (s.year.is_none(), Reverse(s.year), s.name.clone()));

        Ok(matches
            .into_iter()
            .take(limit)
            .map(|s| catalog.set_info(s))
            .collect())
    }

    async fn suggest_sets(&self, partial: &str, limit: usize) -> Result<Vec<SetSuggestion>> {
        let catalog = self.catalog.read();

        let mut ranked: Vec<(u8, &LegoSet)> = catalog
            .sets
            .values()
            .filter_map(|s| suggestion_rank(&s.set_num, partial).map(|rank| (rank, s)))
            .collect();
        ranked.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.set_num.cmp(&b.set_num)));

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(_, s)| SetSuggestion {
                set_number: s.set_num.clone(),
                set_name: s.name.clone(),
            })
            .collect())
    }

    async fn get_theme(&self, id: i32) -> Result<Option<Theme>> {
        Ok(self.catalog.read().themes.get(&id).cloned())
    }

    async fn get_part(&self, part_num: &str) -> Result<Option<PartInfo>> {
        let catalog = self.catalog.read();
        Ok(catalog.parts.get(part_num).map(|p| PartInfo {
            part_num: p.part_num.clone(),
            name: p.name.clone(),
            part_cat_id: p.part_cat_id,
            part_material: p.part_material.clone(),
            part_category: p
                .part_cat_id
                .and_then(|id| catalog.part_categories.get(&id))
                .map(|c| c.name.clone()),
        }))
    }

    async fn get_color(&self, id: ColorId) -> Result<Option<Color>> {
        Ok(self.catalog.read().colors.get(&id).cloned())
    }

    async fn catalog_stats(&self) -> Result<CatalogStats> {
        let catalog = self.catalog.read();
        let counts = [
            ("themes", catalog.themes.len()),
            ("part_categories", catalog.part_categories.len()),
            ("colors", catalog.colors.len()),
            ("parts", catalog.parts.len()),
            ("sets", catalog.sets.len()),
            ("inventories", catalog.inventories.len()),
            ("inventory_parts", catalog.inventory_parts.len()),
            ("elements", catalog.elements.len()),
            ("minifigs", catalog.minifigs.len()),
            ("inventory_minifigs", catalog.inventory_minifigs.len()),
        ];

        Ok(CatalogStats {
            tables: counts
                .into_iter()
                .map(|(table, count)| (table.to_string(), count as i64))
                .collect(),
        })
    }

    async fn replace_catalog(&self, snapshot: CatalogSnapshot) -> Result<()> {
        let tables = CatalogTables::from_snapshot(snapshot);
        *self.catalog.write() = tables;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>> {
        let mut tables = self.users.write();
        if tables.users.values().any(|u| u.user_name == user.user_name) {
            return Ok(None);
        }

        tables.next_id += 1;
        let created = User {
            user_id: tables.next_id,
            user_name: user.user_name,
            password_hash: user.password_hash,
            password_salt: user.password_salt,
            created_at: Utc::now(),
        };
        tables.users.insert(created.user_id, created.clone());
        Ok(Some(created))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().users.get(&id).cloned())
    }

    async fn get_user_by_name(&self, user_name: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .users
            .values()
            .find(|u| u.user_name == user_name)
            .cloned())
    }
}

#[async_trait::async_trait]
impl InstanceStore for MemoryStore {
    async fn create_instance(
        &self,
        instance: NewInstance,
        overrides: Vec<InstancePartOverride>,
    ) -> Result<Option<InventoryInstance>> {
        let mut tables = self.instances.write();
        if tables.name_taken(instance.owner_id, &instance.set_num, &instance.name, None) {
            return Ok(None);
        }
        // Validate everything before the first insert so a failure leaves no trace.
        check_override_rows(&overrides)?;

        let now = Utc::now();
        let id = tables.next_id + 1;
        let created = InventoryInstance {
            id,
            owner_id: instance.owner_id,
            set_num: instance.set_num,
            name: instance.name,
            description: instance.description,
            is_public: instance.is_public,
            created_at: now,
            updated_at: now,
        };

        tables.next_id = id;
        tables.instances.insert(id, created.clone());
        tables.overrides.insert(id, overrides);
        Ok(Some(created))
    }

    async fn get_instance(&self, id: InstanceId) -> Result<Option<InventoryInstance>> {
        Ok(self.instances.read().instances.get(&id).cloned())
    }

    async fn find_instance_by_name(
        &self,
        owner_id: UserId,
        set_num: &str,
        name: &str,
    ) -> Result<Option<InventoryInstance>> {
        Ok(self
            .instances
            .read()
            .instances
            .values()
            .find(|i| i.owner_id == owner_id && i.set_num == set_num && i.name == name)
            .cloned())
    }

    async fn list_instances(
        &self,
        owner_id: UserId,
        set_num: Option<&str>,
    ) -> Result<Vec<InstanceSummary>> {
        let tables = self.instances.read();
        let mut summaries: Vec<InstanceSummary> = tables
            .instances
            .values()
            .filter(|i| i.owner_id == owner_id)
            .filter(|i| set_num.map_or(true, |s| i.set_num == s))
            .map(|i| InstanceSummary {
                instance: i.clone(),
                part_count: tables.overrides.get(&i.id).map_or(0, |o| o.len() as i64),
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.instance
                .created_at
                .cmp(&a.instance.created_at)
                .then_with(|| b.instance.id.cmp(&a.instance.id))
        });
        Ok(summaries)
    }

    async fn list_overrides(&self, instance_id: InstanceId) -> Result<Vec<InstancePartOverride>> {
        Ok(self
            .instances
            .read()
            .overrides
            .get(&instance_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_quantity_change(
        &self,
        instance_id: InstanceId,
        key: &PartKey,
        change: QuantityChange,
    ) -> Result<QuantityOutcome> {
        let mut tables = self.instances.write();
        let Some(row) = tables
            .overrides
            .get_mut(&instance_id)
            .and_then(|rows| rows.iter_mut().find(|r| r.matches(key)))
        else {
            return Ok(QuantityOutcome::Missing);
        };

        let outcome = resolve_change(row.quantity, change);
        if let QuantityOutcome::Updated { quantity, .. } = outcome {
            row.quantity = quantity;
            tables.touch(instance_id);
        }
        Ok(outcome)
    }

    async fn set_quantities(
        &self,
        instance_id: InstanceId,
        rows: Vec<InstancePartOverride>,
    ) -> Result<()> {
        let mut tables = self.instances.write();
        if !tables.instances.contains_key(&instance_id) {
            return Err(anyhow!("Instance not found: {}", instance_id));
        }
        check_override_rows(&rows)?;

        let existing = tables.overrides.entry(instance_id).or_default();
        for row in rows {
            match existing.iter_mut().find(|r| r.matches(&row.key())) {
                Some(current) => current.quantity = row.quantity,
                None => existing.push(row),
            }
        }
        tables.touch(instance_id);
        Ok(())
    }

    async fn upsert_override(
        &self,
        instance_id: InstanceId,
        row: InstancePartOverride,
    ) -> Result<()> {
        let mut tables = self.instances.write();
        if !tables.instances.contains_key(&instance_id) {
            return Err(anyhow!("Instance not found: {}", instance_id));
        }
        check_override_rows(std::slice::from_ref(&row))?;

        let existing = tables.overrides.entry(instance_id).or_default();
        match existing.iter_mut().find(|r| r.matches(&row.key())) {
            Some(current) => *current = row,
            None => existing.push(row),
        }
        tables.touch(instance_id);
        Ok(())
    }

    async fn rename_instance(&self, id: InstanceId, name: &str) -> Result<bool> {
        let mut tables = self.instances.write();
        let Some((owner_id, set_num)) = tables
            .instances
            .get(&id)
            .map(|i| (i.owner_id, i.set_num.clone()))
        else {
            return Err(anyhow!("Instance not found: {}", id));
        };
        if tables.name_taken(owner_id, &set_num, name, Some(id)) {
            return Ok(false);
        }

        if let Some(instance) = tables.instances.get_mut(&id) {
            instance.name = name.to_string();
            instance.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn delete_instance(&self, id: InstanceId) -> Result<bool> {
        let mut tables = self.instances.write();
        let removed = tables.instances.remove(&id).is_some();
        tables.overrides.remove(&id);
        Ok(removed)
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_instance(owner_id: UserId, name: &str) -> NewInstance {
        NewInstance {
            owner_id,
            set_num: "10265-1".to_string(),
            name: name.to_string(),
            description: None,
            is_public: false,
        }
    }

    fn override_row(part: &str, quantity: i32) -> InstancePartOverride {
        InstancePartOverride {
            part_num: part.to_string(),
            part_name: format!("Part {}", part),
            color_id: 4,
            color_name: "Red".to_string(),
            quantity,
            is_spare: false,
            is_minifig_part: false,
            part_image_url: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_failed_creation_leaves_nothing_behind() {
        let store = MemoryStore::new();

        // Second row violates the non-negative constraint.
        let result = store
            .create_instance(
                new_instance(1, "Broken"),
                vec![override_row("3001", 2), override_row("3003", -1)],
            )
            .await;
        assert!(result.is_err());

        assert!(store.list_instances(1, None).await.unwrap().is_empty());
        assert!(store.instances.read().overrides.is_empty());

        // Duplicate keys are rejected the same way.
        let result = store
            .create_instance(
                new_instance(1, "Doubled"),
                vec![override_row("3001", 2), override_row("3001", 3)],
            )
            .await;
        assert!(result.is_err());
        assert!(store.instances.read().instances.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_instance_name_is_reported() {
        let store = MemoryStore::new();
        let first = store
            .create_instance(new_instance(1, "Main"), vec![override_row("3001", 2)])
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .create_instance(new_instance(1, "Main"), vec![])
            .await
            .unwrap();
        assert!(second.is_none());

        // Another user may reuse the name.
        let other = store
            .create_instance(new_instance(2, "Main"), vec![])
            .await
            .unwrap();
        assert!(other.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let instance = store
            .create_instance(new_instance(1, "Main"), vec![override_row("3001", 0)])
            .await
            .unwrap()
            .unwrap();
        let instance_id = instance.id;
        let key = PartKey::new("3001", 4);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    store
                        .apply_quantity_change(instance_id, &key, QuantityChange::Delta(1))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let rows = store.list_overrides(instance_id).await.unwrap();
        assert_eq!(rows[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_rejected_change_leaves_row_untouched() {
        let store = MemoryStore::new();
        let instance = store
            .create_instance(
                new_instance(1, "Main"),
                vec![override_row("3001", 0), override_row("3003", 5)],
            )
            .await
            .unwrap()
            .unwrap();

        let outcome = store
            .apply_quantity_change(instance.id, &PartKey::new("3001", 4), QuantityChange::Delta(-1))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            QuantityOutcome::Rejected {
                current: 0,
                attempted: -1
            }
        );

        let rows = store.list_overrides(instance.id).await.unwrap();
        assert_eq!(rows[0].quantity, 0);
        assert_eq!(rows[1].quantity, 5);

        let missing = store
            .apply_quantity_change(instance.id, &PartKey::new("9999", 4), QuantityChange::Delta(1))
            .await
            .unwrap();
        assert_eq!(missing, QuantityOutcome::Missing);
    }

    #[tokio::test]
    async fn test_delete_removes_overrides() {
        let store = MemoryStore::new();
        let instance = store
            .create_instance(new_instance(1, "Main"), vec![override_row("3001", 1)])
            .await
            .unwrap()
            .unwrap();

        assert!(store.delete_instance(instance.id).await.unwrap());
        assert!(store.get_instance(instance.id).await.unwrap().is_none());
        assert!(store.list_overrides(instance.id).await.unwrap().is_empty());
        assert!(!store.delete_instance(instance.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_collision() {
        let store = MemoryStore::new();
        let a = store
            .create_instance(new_instance(1, "First"), vec![])
            .await
            .unwrap()
            .unwrap();
        store
            .create_instance(new_instance(1, "Second"), vec![])
            .await
            .unwrap()
            .unwrap();

        assert!(!store.rename_instance(a.id, "Second").await.unwrap());
        assert!(store.rename_instance(a.id, "First").await.unwrap());
        assert!(store.rename_instance(a.id, "Renamed").await.unwrap());
        assert_eq!(store.get_instance(a.id).await.unwrap().unwrap().name, "Renamed");
    }
}
