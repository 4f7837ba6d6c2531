use std::collections::{BTreeMap, HashMap};

use crate::error::{InventoryError, InventoryResult};
use crate::logic::catalog::CatalogLookup;
use crate::logic::quantity::validate_change;
use crate::model::{
    ColorId, InstanceDetail, InstanceId, InstancePartOverride, InstanceSummary,
    InventoryInstance, NewInstance, PartKey, QuantityChange, QuantityOutcome, UserContext,
    DEFAULT_INSTANCE_NAME, MAX_INSTANCE_NAME_LEN,
};
use crate::store::traits::Store;

#[derive(Debug, Clone)]
pub struct CreateInstanceRequest {
    pub set_num: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
}

/// A single override write requested by a client
#[derive(Debug, Clone)]
pub struct AddPartRequest {
    pub key: PartKey,
    pub quantity: i32,
    pub notes: Option<String>,
}

/// Result of a successful quantity change
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QuantityUpdate {
    pub instance_id: InstanceId,
    pub key: String,
    pub previous: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SaveOutcome {
    pub instance: InventoryInstance,
    pub created: bool,
    pub updated_rows: usize,
}

fn normalize_name(name: &str) -> InventoryResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InventoryError::validation("Name cannot be empty"));
    }
    if name.chars().count() > MAX_INSTANCE_NAME_LEN {
        return Err(InventoryError::validation(format!(
            "Name must be at most {} characters",
            MAX_INSTANCE_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn forbidden(id: InstanceId) -> InventoryError {
    InventoryError::Forbidden(format!("Instance {} belongs to another user", id))
}

/// Instance lifecycle and quantity workflow.
///
/// Every operation takes the caller's identity and checks ownership before
/// touching the store.
pub struct InstanceService;

impl InstanceService {
    /// Fetch an instance the caller owns
    async fn owned_instance<S: Store>(
        store: &S,
        user: &UserContext,
        id: InstanceId,
    ) -> InventoryResult<InventoryInstance> {
        let instance = store
            .get_instance(id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("Instance {}", id)))?;
        if !instance.is_owned_by(user.user_id) {
            return Err(forbidden(id));
        }
        Ok(instance)
    }

    async fn ensure_user<S: Store>(store: &S, user: &UserContext) -> InventoryResult<()> {
        match store.get_user(user.user_id).await? {
            Some(_) => Ok(()),
            None => Err(InventoryError::Unauthorized(format!(
                "Unknown user {}",
                user.user_id
            ))),
        }
    }

    /// Create an instance seeded with the set's canonical quantities
    pub async fn create_instance<S: Store>(
        store: &S,
        user: &UserContext,
        request: CreateInstanceRequest,
    ) -> InventoryResult<InstanceDetail> {
        let name = normalize_name(&request.name)?;
        Self::ensure_user(store, user).await?;

        let inventory = CatalogLookup::lookup_set(store, &request.set_num).await?;
        let overrides: Vec<InstancePartOverride> =
            inventory.parts.iter().map(InstancePartOverride::from).collect();

        let new_instance = NewInstance {
            owner_id: user.user_id,
            set_num: inventory.set.set_number.clone(),
            name,
            description: request.description.filter(|d| !d.trim().is_empty()),
            is_public: request.is_public,
        };

        let instance = store
            .create_instance(new_instance.clone(), overrides.clone())
            .await?
            .ok_or_else(|| {
                InventoryError::Conflict(format!(
                    "An instance named '{}' already exists for set {}",
                    new_instance.name, new_instance.set_num
                ))
            })?;

        log::info!(
            "User {} created instance {} ('{}') of set {} with {} part rows",
            user.user_id,
            instance.id,
            instance.name,
            instance.set_num,
            overrides.len()
        );

        Ok(InstanceDetail {
            instance,
            parts: overrides,
        })
    }

    pub async fn adjust_quantity<S: Store>(
        store: &S,
        user: &UserContext,
        instance_id: InstanceId,
        key: &PartKey,
        change: QuantityChange,
    ) -> InventoryResult<QuantityUpdate> {
        validate_change(change).map_err(InventoryError::Validation)?;
        Self::owned_instance(store, user, instance_id).await?;

        match store.apply_quantity_change(instance_id, key, change).await? {
            QuantityOutcome::Updated { previous, quantity } => {
                log::info!(
                    "Instance {}: {} {} -> {}",
                    instance_id,
                    key,
                    previous,
                    quantity
                );
                Ok(QuantityUpdate {
                    instance_id,
                    key: key.to_string(),
                    previous,
                    quantity,
                })
            }
            QuantityOutcome::Rejected { current, attempted } => {
                log::warn!(
                    "Instance {}: rejected change on {} ({} -> {})",
                    instance_id,
                    key,
                    current,
                    attempted
                );
                Err(InventoryError::InvalidQuantity {
                    current: Some(current),
                    attempted,
                })
            }
            QuantityOutcome::OutOfRange { current, attempted } => {
                log::warn!(
                    "Instance {}: rejected change on {} ({} -> {})",
                    instance_id,
                    key,
                    current,
                    attempted
                );
                Err(InventoryError::validation(format!(
                    "Quantity {} for {} exceeds the maximum of {}",
                    attempted,
                    key,
                    i32::MAX
                )))
            }
            QuantityOutcome::Missing => Err(InventoryError::not_found(format!(
                "Part {} in instance {}",
                key, instance_id
            ))),
        }
    }

    /// Batch save keyed by part-key text. Creates the named instance on
    /// first modification; all rows are validated before anything is written
    /// and the rows land in a single store write.
    pub async fn save_modifications<S: Store>(
        store: &S,
        user: &UserContext,
        set_num: &str,
        instance_name: Option<&str>,
        modifications: &HashMap<String, i32>,
    ) -> InventoryResult<SaveOutcome> {
        let name = normalize_name(instance_name.unwrap_or(DEFAULT_INSTANCE_NAME))?;

        let mut parsed: BTreeMap<PartKey, i32> = BTreeMap::new();
        for (raw_key, quantity) in modifications {
            let key: PartKey = raw_key
                .parse()
                .map_err(|e: crate::model::PartKeyParseError| InventoryError::validation(e.to_string()))?;
            if *quantity < 0 {
                return Err(InventoryError::InvalidQuantity {
                    current: None,
                    attempted: i64::from(*quantity),
                });
            }
            // "3001_4" and "3001_4_regular_normal" name the same row
            if parsed.insert(key.clone(), *quantity).is_some() {
                return Err(InventoryError::validation(format!(
                    "Part {} appears more than once in the batch",
                    key
                )));
            }
        }

        let inventory = CatalogLookup::lookup_set(store, set_num).await?;
        let mut rows = Vec::with_capacity(parsed.len());
        for (key, quantity) in &parsed {
            let part = inventory.find(key).ok_or_else(|| {
                InventoryError::not_found(format!("Part {} in set {}", key, set_num))
            })?;
            rows.push(InstancePartOverride {
                quantity: *quantity,
                ..InstancePartOverride::from(part)
            });
        }
        let updated_rows = rows.len();

        let existing = store
            .find_instance_by_name(user.user_id, &inventory.set.set_number, &name)
            .await?;
        let (instance, created) = match existing {
            Some(instance) => {
                store.set_quantities(instance.id, rows).await?;
                (instance, false)
            }
            None => {
                Self::ensure_user(store, user).await?;
                let overrides: Vec<InstancePartOverride> = inventory
                    .parts
                    .iter()
                    .map(|part| InstancePartOverride {
                        quantity: parsed.get(&part.key()).copied().unwrap_or(part.quantity),
                        ..InstancePartOverride::from(part)
                    })
                    .collect();
                let new_instance = NewInstance {
                    owner_id: user.user_id,
                    set_num: inventory.set.set_number.clone(),
                    name: name.clone(),
                    description: None,
                    is_public: false,
                };

                match store.create_instance(new_instance, overrides).await? {
                    Some(instance) => (instance, true),
                    None => {
                        // Lost a race with a concurrent first save under the same name
                        let instance = store
                            .find_instance_by_name(user.user_id, &inventory.set.set_number, &name)
                            .await?
                            .ok_or_else(|| {
                                InventoryError::Conflict(format!(
                                    "Instance '{}' was removed while saving",
                                    name
                                ))
                            })?;
                        store.set_quantities(instance.id, rows).await?;
                        (instance, false)
                    }
                }
            }
        };

        log::info!(
            "Instance {}: saved {} modifications (created: {})",
            instance.id,
            updated_rows,
            created
        );

        let instance = store.get_instance(instance.id).await?.unwrap_or(instance);
        Ok(SaveOutcome {
            instance,
            created,
            updated_rows,
        })
    }

    /// Current quantities of a named instance, keyed by part-key text
    pub async fn modifications<S: Store>(
        store: &S,
        user: &UserContext,
        set_num: &str,
        instance_name: Option<&str>,
    ) -> InventoryResult<BTreeMap<String, i32>> {
        let name = normalize_name(instance_name.unwrap_or(DEFAULT_INSTANCE_NAME))?;
        let Some(instance) = store
            .find_instance_by_name(user.user_id, set_num.trim(), &name)
            .await?
        else {
            return Ok(BTreeMap::new());
        };

        Ok(store
            .list_overrides(instance.id)
            .await?
            .into_iter()
            .map(|row| (row.key().to_string(), row.quantity))
            .collect())
    }

    /// Insert or replace one override for any catalog part and color
    pub async fn add_part<S: Store>(
        store: &S,
        user: &UserContext,
        instance_id: InstanceId,
        request: AddPartRequest,
    ) -> InventoryResult<InstancePartOverride> {
        Self::owned_instance(store, user, instance_id).await?;

        let existing = store
            .list_overrides(instance_id)
            .await?
            .into_iter()
            .find(|row| row.matches(&request.key));
        if request.quantity < 0 {
            return Err(InventoryError::InvalidQuantity {
                current: existing.map(|row| row.quantity),
                attempted: i64::from(request.quantity),
            });
        }

        let part = CatalogLookup::get_part(store, &request.key.part_num).await?;
        let color = CatalogLookup::get_color(store, request.key.color_id).await?;

        let row = InstancePartOverride {
            part_num: part.part_num.clone(),
            part_name: part.name,
            color_id: color.id,
            color_name: color.name,
            quantity: request.quantity,
            is_spare: request.key.is_spare,
            is_minifig_part: request.key.is_minifig_part,
            part_image_url: existing
                .and_then(|row| row.part_image_url)
                .or_else(|| Some(crate::logic::catalog::generic_part_image_url(&part.part_num))),
            notes: request.notes.filter(|n| !n.trim().is_empty()),
        };

        store.upsert_override(instance_id, row.clone()).await?;
        log::info!(
            "Instance {}: upserted {} = {}",
            instance_id,
            row.key(),
            row.quantity
        );
        Ok(row)
    }

    pub async fn rename_instance<S: Store>(
        store: &S,
        user: &UserContext,
        instance_id: InstanceId,
        new_name: &str,
    ) -> InventoryResult<InventoryInstance> {
        let name = normalize_name(new_name)?;
        Self::owned_instance(store, user, instance_id).await?;

        if !store.rename_instance(instance_id, &name).await? {
            return Err(InventoryError::Conflict(format!(
                "An instance named '{}' already exists for this set",
                name
            )));
        }

        store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("Instance {}", instance_id)))
    }

    pub async fn delete_instance<S: Store>(
        store: &S,
        user: &UserContext,
        instance_id: InstanceId,
    ) -> InventoryResult<()> {
        let instance = Self::owned_instance(store, user, instance_id).await?;

        if !store.delete_instance(instance_id).await? {
            return Err(InventoryError::not_found(format!("Instance {}", instance_id)));
        }
        log::info!(
            "User {} deleted instance {} ('{}') of set {}",
            user.user_id,
            instance.id,
            instance.name,
            instance.set_num
        );
        Ok(())
    }

    pub async fn list_instances<S: Store>(
        store: &S,
        user: &UserContext,
        set_num: Option<&str>,
    ) -> InventoryResult<Vec<InstanceSummary>> {
        let set_num = set_num.map(str::trim).filter(|s| !s.is_empty());
        Ok(store.list_instances(user.user_id, set_num).await?)
    }

    pub async fn get_instance_detail<S: Store>(
        store: &S,
        user: &UserContext,
        instance_id: InstanceId,
    ) -> InventoryResult<InstanceDetail> {
        let instance = store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| InventoryError::not_found(format!("Instance {}", instance_id)))?;
        if !instance.is_visible_to(user.user_id) {
            return Err(forbidden(instance_id));
        }

        let parts = store.list_overrides(instance_id).await?;
        Ok(InstanceDetail { instance, parts })
    }
}

/// Build a key from loose request fields
pub fn part_key(part_num: &str, color_id: ColorId, is_spare: bool, is_minifig_part: bool) -> PartKey {
    PartKey {
        part_num: part_num.trim().to_string(),
        color_id,
        is_spare,
        is_minifig_part,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{AccountService, CatalogLookup};
    use crate::seed::load_seed_data;
    use crate::store::traits::InstanceStore;
    use crate::store::MemoryStore;

    async fn seeded() -> (MemoryStore, UserContext, UserContext) {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();
        let alice = AccountService::register(&store, "alice", "secret1").await.unwrap();
        let bob = AccountService::register(&store, "bobby", "secret2").await.unwrap();
        (
            store,
            UserContext::new(alice.user_id),
            UserContext::new(bob.user_id),
        )
    }

    fn request(set_num: &str, name: &str) -> CreateInstanceRequest {
        CreateInstanceRequest {
            set_num: set_num.to_string(),
            name: name.to_string(),
            description: None,
            is_public: false,
        }
    }

    #[tokio::test]
    async fn test_create_instance_copies_canonical_inventory() {
        let (store, alice, _) = seeded().await;
        let inventory = CatalogLookup::lookup_set(&store, "10265-1").await.unwrap();

        let detail = InstanceService::create_instance(&store, &alice, request("10265-1", " Mine "))
            .await
            .unwrap();

        assert_eq!(detail.instance.name, "Mine");
        assert_eq!(detail.parts.len(), inventory.parts.len());
        let required: i64 = detail
            .parts
            .iter()
            .filter(|p| !p.is_spare)
            .map(|p| i64::from(p.quantity))
            .sum();
        assert_eq!(required, inventory.required_part_count());

        let stored = store.list_overrides(detail.instance.id).await.unwrap();
        assert_eq!(stored.len(), detail.parts.len());
    }

    #[tokio::test]
    async fn test_create_instance_errors() {
        let (store, alice, _) = seeded().await;

        let err = InstanceService::create_instance(&store, &alice, request("99999-1", "Mine"))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));

        let err = InstanceService::create_instance(&store, &alice, request("10265-1", "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap();
        let err = InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));

        let stranger = UserContext::new(9_999);
        let err = InstanceService::create_instance(&store, &stranger, request("10265-1", "Mine"))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_quantity_never_goes_negative() {
        let (store, alice, _) = seeded().await;
        let detail = InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap();
        let id = detail.instance.id;
        let key = PartKey::new("3003", 4);

        let first = InstanceService::adjust_quantity(&store, &alice, id, &key, QuantityChange::Delta(-1))
            .await
            .unwrap();
        assert_eq!((first.previous, first.quantity), (2, 1));
        InstanceService::adjust_quantity(&store, &alice, id, &key, QuantityChange::Delta(-1))
            .await
            .unwrap();

        let err = InstanceService::adjust_quantity(&store, &alice, id, &key, QuantityChange::Delta(-1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InvalidQuantity {
                current: Some(0),
                attempted: -1
            }
        ));

        let parts = store.list_overrides(id).await.unwrap();
        let row = parts.iter().find(|p| p.matches(&key)).unwrap();
        assert_eq!(row.quantity, 0);
    }

    #[tokio::test]
    async fn test_adjust_quantity_validation_and_missing_key() {
        let (store, alice, _) = seeded().await;
        let id = InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap()
            .instance
            .id;

        let err = InstanceService::adjust_quantity(
            &store,
            &alice,
            id,
            &PartKey::new("3003", 4),
            QuantityChange::Delta(0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        let err = InstanceService::adjust_quantity(
            &store,
            &alice,
            id,
            &PartKey::new("3003", 4).spare(),
            QuantityChange::Delta(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));

        let set = InstanceService::adjust_quantity(
            &store,
            &alice,
            id,
            &PartKey::new("3003", 4),
            QuantityChange::Set(7),
        )
        .await
        .unwrap();
        assert_eq!(set.quantity, 7);
    }

    #[tokio::test]
    async fn test_other_users_cannot_mutate_or_delete() {
        let (store, alice, bob) = seeded().await;
        let detail = InstanceService::create_instance(&store, &alice, request("21026-1", "Venice"))
            .await
            .unwrap();
        let id = detail.instance.id;

        let err = InstanceService::delete_instance(&store, &bob, id)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Forbidden(_)));

        let err = InstanceService::adjust_quantity(
            &store,
            &bob,
            id,
            &PartKey::new("3003", 15),
            QuantityChange::Delta(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InventoryError::Forbidden(_)));

        let after = InstanceService::get_instance_detail(&store, &alice, id)
            .await
            .unwrap();
        assert_eq!(after.instance, detail.instance);
        assert_eq!(after.parts, detail.parts);

        InstanceService::delete_instance(&store, &alice, id).await.unwrap();
        assert!(store.get_instance(id).await.unwrap().is_none());
        assert!(store.list_overrides(id).await.unwrap().is_empty());
        let err = InstanceService::delete_instance(&store, &alice, id)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_public_instances_are_readable_by_others() {
        let (store, alice, bob) = seeded().await;
        let private = InstanceService::create_instance(&store, &alice, request("10265-1", "Private"))
            .await
            .unwrap();
        let public = InstanceService::create_instance(
            &store,
            &alice,
            CreateInstanceRequest {
                is_public: true,
                ..request("10265-1", "Shared")
            },
        )
        .await
        .unwrap();

        let err = InstanceService::get_instance_detail(&store, &bob, private.instance.id)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Forbidden(_)));
        assert!(InstanceService::get_instance_detail(&store, &bob, public.instance.id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_save_modifications_creates_default_instance() {
        let (store, alice, _) = seeded().await;
        let mut changes = HashMap::new();
        changes.insert(PartKey::new("3001", 4).to_string(), 1);
        changes.insert(PartKey::new("3024", 0).spare().to_string(), 0);

        let first = InstanceService::save_modifications(&store, &alice, "10265-1", None, &changes)
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.instance.name, DEFAULT_INSTANCE_NAME);
        assert_eq!(first.updated_rows, 2);

        let saved = InstanceService::modifications(&store, &alice, "10265-1", None)
            .await
            .unwrap();
        assert_eq!(saved.get("3001_4_regular_normal"), Some(&1));
        assert_eq!(saved.get("3024_0_spare_normal"), Some(&0));
        // Untouched rows keep their canonical quantity
        assert_eq!(saved.get("3003_4_regular_normal"), Some(&2));

        let second = InstanceService::save_modifications(&store, &alice, "10265-1", None, &changes)
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.instance.id, first.instance.id);
    }

    #[tokio::test]
    async fn test_save_modifications_rejects_whole_batch() {
        let (store, alice, _) = seeded().await;
        let id = InstanceService::create_instance(&store, &alice, request("10265-1", "Default"))
            .await
            .unwrap()
            .instance
            .id;
        let before = store.list_overrides(id).await.unwrap();

        let mut negative = HashMap::new();
        negative.insert("3001_4_regular_normal".to_string(), 3);
        negative.insert("3003_4_regular_normal".to_string(), -1);
        let err = InstanceService::save_modifications(&store, &alice, "10265-1", None, &negative)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InvalidQuantity {
                current: None,
                attempted: -1
            }
        ));
        assert_eq!(store.list_overrides(id).await.unwrap(), before);

        let mut twice = HashMap::new();
        twice.insert("3001_4".to_string(), 1);
        twice.insert("3001_4_regular_normal".to_string(), 2);
        let err = InstanceService::save_modifications(&store, &alice, "10265-1", None, &twice)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
        assert_eq!(store.list_overrides(id).await.unwrap(), before);

        let mut unknown = HashMap::new();
        unknown.insert("3001_15_regular_normal".to_string(), 1);
        let err = InstanceService::save_modifications(&store, &alice, "10265-1", None, &unknown)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));

        let mut malformed = HashMap::new();
        malformed.insert("3001-red".to_string(), 1);
        let err = InstanceService::save_modifications(&store, &alice, "10265-1", None, &malformed)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rejected_first_save_creates_nothing() {
        let (store, alice, _) = seeded().await;

        let mut twice = HashMap::new();
        twice.insert("3001_4".to_string(), 1);
        twice.insert("3001_4_regular_normal".to_string(), 2);
        let err = InstanceService::save_modifications(&store, &alice, "10265-1", None, &twice)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
        assert!(store
            .find_instance_by_name(alice.user_id, "10265-1", DEFAULT_INSTANCE_NAME)
            .await
            .unwrap()
            .is_none());

        let mut unknown = HashMap::new();
        unknown.insert("3001_4".to_string(), 1);
        unknown.insert("9999_4".to_string(), 1);
        let err = InstanceService::save_modifications(&store, &alice, "10265-1", None, &unknown)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
        assert!(InstanceService::list_instances(&store, &alice, None)
            .await
            .unwrap()
            .is_empty());

        // The short spelling alone is accepted and stored under the full key
        let mut short = HashMap::new();
        short.insert("3001_4".to_string(), 3);
        let saved = InstanceService::save_modifications(&store, &alice, "10265-1", None, &short)
            .await
            .unwrap();
        assert!(saved.created);
        let current = InstanceService::modifications(&store, &alice, "10265-1", None)
            .await
            .unwrap();
        assert_eq!(current.get("3001_4_regular_normal"), Some(&3));
    }

    #[tokio::test]
    async fn test_quantity_above_max_is_rejected() {
        let (store, alice, _) = seeded().await;
        let id = InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap()
            .instance
            .id;
        let key = PartKey::new("3003", 4);

        InstanceService::adjust_quantity(&store, &alice, id, &key, QuantityChange::Set(i32::MAX))
            .await
            .unwrap();
        let err = InstanceService::adjust_quantity(&store, &alice, id, &key, QuantityChange::Delta(5))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        let parts = store.list_overrides(id).await.unwrap();
        let row = parts.iter().find(|p| p.matches(&key)).unwrap();
        assert_eq!(row.quantity, i32::MAX);
    }

    #[tokio::test]
    async fn test_negative_add_part_reports_stored_quantity() {
        let (store, alice, _) = seeded().await;
        let id = InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap()
            .instance
            .id;
        InstanceService::adjust_quantity(&store, &alice, id, &PartKey::new("3003", 4), QuantityChange::Set(5))
            .await
            .unwrap();

        let negative = |key: PartKey| AddPartRequest {
            key,
            quantity: -2,
            notes: None,
        };
        let err = InstanceService::add_part(&store, &alice, id, negative(PartKey::new("3003", 4)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InvalidQuantity {
                current: Some(5),
                attempted: -2
            }
        ));

        let err = InstanceService::add_part(&store, &alice, id, negative(PartKey::new("3001", 15)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InvalidQuantity { current: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_modifications_empty_without_instance() {
        let (store, alice, _) = seeded().await;
        let saved = InstanceService::modifications(&store, &alice, "21026-1", Some("Nope"))
            .await
            .unwrap();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn test_add_part_and_rename() {
        let (store, alice, _) = seeded().await;
        let id = InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap()
            .instance
            .id;

        let row = InstanceService::add_part(
            &store,
            &alice,
            id,
            AddPartRequest {
                key: part_key("3001", 15, false, false),
                quantity: 3,
                notes: Some("from the bulk bin".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(row.color_name, "White");
        let parts = store.list_overrides(id).await.unwrap();
        assert!(parts.iter().any(|p| p.matches(&row.key()) && p.quantity == 3));

        let err = InstanceService::add_part(
            &store,
            &alice,
            id,
            AddPartRequest {
                key: part_key("3001", 12345, false, false),
                quantity: 1,
                notes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));

        InstanceService::create_instance(&store, &alice, request("10265-1", "Other"))
            .await
            .unwrap();
        let err = InstanceService::rename_instance(&store, &alice, id, "Other")
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));

        let renamed = InstanceService::rename_instance(&store, &alice, id, "  Garage  ")
            .await
            .unwrap();
        assert_eq!(renamed.name, "Garage");
    }

    #[tokio::test]
    async fn test_list_instances_filters_by_set() {
        let (store, alice, bob) = seeded().await;
        InstanceService::create_instance(&store, &alice, request("10265-1", "Mine"))
            .await
            .unwrap();
        InstanceService::create_instance(&store, &alice, request("21026-1", "Mine"))
            .await
            .unwrap();
        InstanceService::create_instance(&store, &bob, request("10265-1", "Mine"))
            .await
            .unwrap();

        let all = InstanceService::list_instances(&store, &alice, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let venice = InstanceService::list_instances(&store, &alice, Some("21026-1"))
            .await
            .unwrap();
        assert_eq!(venice.len(), 1);
        assert_eq!(venice[0].part_count, 5);
    }

    #[tokio::test]
    async fn test_autocomplete_prefers_prefix_matches() {
        let (store, _, _) = seeded().await;
        let suggestions = CatalogLookup::suggest_sets(&store, "1026", None).await.unwrap();
        let numbers: Vec<&str> = suggestions.iter().map(|s| s.set_number.as_str()).collect();

        let mustang = numbers.iter().position(|n| *n == "10265-1").unwrap();
        let venice = numbers.iter().position(|n| *n == "21026-1").unwrap();
        assert!(mustang < venice);

        assert!(CatalogLookup::suggest_sets(&store, "1", None)
            .await
            .unwrap()
            .is_empty());
    }
}
