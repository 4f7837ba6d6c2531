use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Postgres, QueryBuilder, Row,
};

use crate::logic::quantity::resolve_change;
use crate::model::{
    CatalogPartRow, CatalogSnapshot, CatalogStats, Color, ColorId, InstanceId,
    InstancePartOverride, InstanceSummary, InventoryInstance, NewInstance, NewUser, PartInfo,
    PartKey, PartSource, QuantityChange, QuantityOutcome, SetInfo, SetSuggestion, Theme, User,
    UserId, CATALOG_TABLES,
};
use crate::store::traits::{CatalogStore, InstanceStore, Store, UserStore};

/// Rows per multi-value INSERT during catalog loads
const INSERT_CHUNK: usize = 1000;

const INSTANCE_COLUMNS: &str =
    "id, owner_id, set_num, name, description, is_public, created_at, updated_at";

const OVERRIDE_COLUMNS: &str = "part_num, part_name, color_id, color_name, quantity, is_spare, \
     is_minifig_part, part_image_url, notes";

const SET_INFO_SELECT: &str = r#"
    SELECT s.set_num, s.name, s.year, s.theme_id, s.num_parts, s.img_url,
           t.name AS theme_name
    FROM sets s
    LEFT JOIN themes t ON s.theme_id = t.id
"#;

const PART_ROW_COLUMNS: &str = r#"
    ip.part_num,
    p.name AS part_name,
    pc.name AS part_category,
    ip.color_id,
    c.name AS color_name,
    c.rgb AS color_rgb,
    ip.is_spare,
    ip.img_url,
    (SELECT e.element_id FROM elements e
      WHERE e.part_num = ip.part_num AND e.color_id = ip.color_id
      ORDER BY e.element_id LIMIT 1) AS element_id
"#;

/// Escape LIKE wildcards in user input (backslash is the default escape)
fn like_escape(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn set_info_from_row(row: &PgRow) -> Result<SetInfo, sqlx::Error> {
    let set_num: String = row.try_get("set_num")?;
    Ok(SetInfo {
        set_url: SetInfo::catalog_url(&set_num),
        set_number: set_num,
        set_name: row.try_get("name")?,
        year: row.try_get("year")?,
        theme_id: row.try_get("theme_id")?,
        theme_name: row.try_get("theme_name")?,
        num_parts: row.try_get("num_parts")?,
        set_image: row.try_get("img_url")?,
    })
}

fn part_row_from_row(row: &PgRow, source: PartSource) -> Result<CatalogPartRow, sqlx::Error> {
    Ok(CatalogPartRow {
        part_num: row.try_get("part_num")?,
        part_name: row.try_get("part_name")?,
        part_category: row.try_get("part_category")?,
        color_id: row.try_get("color_id")?,
        color_name: row.try_get("color_name")?,
        color_rgb: row.try_get("color_rgb")?,
        quantity: row.try_get("quantity")?,
        is_spare: row.try_get("is_spare")?,
        img_url: row.try_get("img_url")?,
        element_id: row.try_get("element_id")?,
        source,
    })
}

fn instance_from_row(row: &PgRow) -> Result<InventoryInstance, sqlx::Error> {
    Ok(InventoryInstance {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        set_num: row.try_get("set_num")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_public: row.try_get("is_public")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn override_from_row(row: &PgRow) -> Result<InstancePartOverride, sqlx::Error> {
    Ok(InstancePartOverride {
        part_num: row.try_get("part_num")?,
        part_name: row.try_get("part_name")?,
        color_id: row.try_get("color_id")?,
        color_name: row.try_get("color_name")?,
        quantity: row.try_get("quantity")?,
        is_spare: row.try_get("is_spare")?,
        is_minifig_part: row.try_get("is_minifig_part")?,
        part_image_url: row.try_get("part_image_url")?,
        notes: row.try_get("notes")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        password_hash: row.try_get("password_hash")?,
        password_salt: row.try_get("password_salt")?,
        created_at: row.try_get("created_at")?,
    })
}

fn push_override_values(builder: &mut QueryBuilder<'_, Postgres>, instance_id: InstanceId, rows: &[InstancePartOverride]) {
    builder.push_values(rows, |mut b, row| {
        b.push_bind(instance_id)
            .push_bind(row.part_num.clone())
            .push_bind(row.part_name.clone())
            .push_bind(row.color_id)
            .push_bind(row.color_name.clone())
            .push_bind(row.quantity)
            .push_bind(row.is_spare)
            .push_bind(row.is_minifig_part)
            .push_bind(row.part_image_url.clone())
            .push_bind(row.notes.clone());
    });
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, 20).await
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run embedded database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl CatalogStore for PostgresStore {
    async fn get_set(&self, set_num: &str) -> Result<Option<SetInfo>> {
        let row = sqlx::query(&format!("{} WHERE s.set_num = $1", SET_INFO_SELECT))
            .bind(set_num)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch set")?;

        row.as_ref()
            .map(set_info_from_row)
            .transpose()
            .context("Failed to decode set row")
    }

    async fn list_set_part_rows(&self, set_num: &str) -> Result<Vec<CatalogPartRow>> {
        let set_rows = sqlx::query(&format!(
            r#"
            SELECT {}, ip.quantity
            FROM inventory_parts ip
            JOIN inventories inv ON ip.inventory_id = inv.id
            JOIN parts p ON ip.part_num = p.part_num
            JOIN colors c ON ip.color_id = c.id
            LEFT JOIN part_categories pc ON p.part_cat_id = pc.id
            WHERE inv.set_num = $1
            "#,
            PART_ROW_COLUMNS
        ))
        .bind(set_num)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch set inventory parts")?;

        let minifig_rows = sqlx::query(&format!(
            r#"
            SELECT {}, (ip.quantity * im.quantity) AS quantity,
                   im.fig_num, m.name AS fig_name
            FROM inventory_minifigs im
            JOIN inventories inv ON im.inventory_id = inv.id
            JOIN inventories fig_inv ON fig_inv.set_num = im.fig_num
            JOIN inventory_parts ip ON ip.inventory_id = fig_inv.id
            JOIN parts p ON ip.part_num = p.part_num
            JOIN colors c ON ip.color_id = c.id
            LEFT JOIN part_categories pc ON p.part_cat_id = pc.id
            LEFT JOIN minifigs m ON m.fig_num = im.fig_num
            WHERE inv.set_num = $1
            "#,
            PART_ROW_COLUMNS
        ))
        .bind(set_num)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch minifig inventory parts")?;

        let mut rows = Vec::with_capacity(set_rows.len() + minifig_rows.len());
        for row in &set_rows {
            rows.push(part_row_from_row(row, PartSource::Set)?);
        }
        for row in &minifig_rows {
            let source = PartSource::Minifig {
                fig_num: row.try_get("fig_num")?,
                fig_name: row.try_get("fig_name")?,
            };
            rows.push(part_row_from_row(row, source)?);
        }
        Ok(rows)
    }

    async fn search_sets(&self, query: &str, limit: usize) -> Result<Vec<SetInfo>> {
        let pattern = format!("%{}%", like_escape(query));
        let rows = sqlx::query(&format!(
            "{} WHERE s.set_num ILIKE $1 OR s.name ILIKE $1 \
             ORDER BY s.year DESC NULLS LAST, s.name LIMIT $2",
            SET_INFO_SELECT
        ))
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search sets")?;

        rows.iter()
            .map(set_info_from_row)
            .collect::<Result<_, _>>()
            .context("Failed to decode set rows")
    }

    async fn suggest_sets(&self, partial: &str, limit: usize) -> Result<Vec<SetSuggestion>> {
        let rows = sqlx::query(
            r#"
            SELECT set_num, name
            FROM sets
            WHERE set_num ILIKE '%' || $1 || '%'
            ORDER BY CASE WHEN set_num ILIKE $1 || '%' THEN 0 ELSE 1 END, set_num
            LIMIT $2
            "#,
        )
        .bind(like_escape(partial))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch set suggestions")?;

        rows.iter()
            .map(|row| -> Result<SetSuggestion, sqlx::Error> {
                Ok(SetSuggestion {
                    set_number: row.try_get("set_num")?,
                    set_name: row.try_get("name")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .context("Failed to decode set suggestions")
    }

    async fn get_theme(&self, id: i32) -> Result<Option<Theme>> {
        let row = sqlx::query("SELECT id, name, parent_id FROM themes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch theme")?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Theme {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            parent_id: row.try_get("parent_id")?,
        }))
    }

    async fn get_part(&self, part_num: &str) -> Result<Option<PartInfo>> {
        let row = sqlx::query(
            r#"
            SELECT p.part_num, p.name, p.part_cat_id, p.part_material,
                   pc.name AS part_category
            FROM parts p
            LEFT JOIN part_categories pc ON p.part_cat_id = pc.id
            WHERE p.part_num = $1
            "#,
        )
        .bind(part_num)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch part")?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(PartInfo {
            part_num: row.try_get("part_num")?,
            name: row.try_get("name")?,
            part_cat_id: row.try_get("part_cat_id")?,
            part_material: row.try_get("part_material")?,
            part_category: row.try_get("part_category")?,
        }))
    }

    async fn get_color(&self, id: ColorId) -> Result<Option<Color>> {
        let row = sqlx::query("SELECT id, name, rgb, is_trans FROM colors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch color")?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Color {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            rgb: row.try_get("rgb")?,
            is_trans: row.try_get("is_trans")?,
        }))
    }

    async fn catalog_stats(&self) -> Result<CatalogStats> {
        let mut stats = CatalogStats::default();
        for table in CATALOG_TABLES {
            // Table names come from a fixed list, never from input.
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to count {}", table))?;
            stats.tables.insert(table.to_string(), count);
        }
        Ok(stats)
    }

    async fn replace_catalog(&self, snapshot: CatalogSnapshot) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start catalog transaction")?;

        sqlx::query(
            "TRUNCATE inventory_minifigs, minifigs, elements, inventory_parts, inventories, \
             sets, parts, colors, part_categories, themes",
        )
        .execute(&mut *tx)
        .await
        .context("Failed to clear catalog tables")?;

        for chunk in snapshot.themes.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO themes (id, name, parent_id) ");
            builder.push_values(chunk, |mut b, theme| {
                b.push_bind(theme.id)
                    .push_bind(theme.name.clone())
                    .push_bind(theme.parent_id);
            });
            builder.build().execute(&mut *tx).await.context("Failed to load themes")?;
        }

        for chunk in snapshot.part_categories.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO part_categories (id, name) ");
            builder.push_values(chunk, |mut b, category| {
                b.push_bind(category.id).push_bind(category.name.clone());
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to load part categories")?;
        }

        for chunk in snapshot.colors.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO colors (id, name, rgb, is_trans) ");
            builder.push_values(chunk, |mut b, color| {
                b.push_bind(color.id)
                    .push_bind(color.name.clone())
                    .push_bind(color.rgb.clone())
                    .push_bind(color.is_trans);
            });
            builder.build().execute(&mut *tx).await.context("Failed to load colors")?;
        }

        for chunk in snapshot.parts.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO parts (part_num, name, part_cat_id, part_material) ",
            );
            builder.push_values(chunk, |mut b, part| {
                b.push_bind(part.part_num.clone())
                    .push_bind(part.name.clone())
                    .push_bind(part.part_cat_id)
                    .push_bind(part.part_material.clone());
            });
            builder.build().execute(&mut *tx).await.context("Failed to load parts")?;
        }

        for chunk in snapshot.sets.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO sets (set_num, name, year, theme_id, num_parts, img_url) ",
            );
            builder.push_values(chunk, |mut b, set| {
                b.push_bind(set.set_num.clone())
                    .push_bind(set.name.clone())
                    .push_bind(set.year)
                    .push_bind(set.theme_id)
                    .push_bind(set.num_parts)
                    .push_bind(set.img_url.clone());
            });
            builder.build().execute(&mut *tx).await.context("Failed to load sets")?;
        }

        for chunk in snapshot.inventories.chunks(INSERT_CHUNK) {
            let mut builder =
                QueryBuilder::<Postgres>::new("INSERT INTO inventories (id, version, set_num) ");
            builder.push_values(chunk, |mut b, inventory| {
                b.push_bind(inventory.id)
                    .push_bind(inventory.version)
                    .push_bind(inventory.set_num.clone());
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to load inventories")?;
        }

        for chunk in snapshot.inventory_parts.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO inventory_parts (inventory_id, part_num, color_id, quantity, is_spare, img_url) ",
            );
            builder.push_values(chunk, |mut b, ip| {
                b.push_bind(ip.inventory_id)
                    .push_bind(ip.part_num.clone())
                    .push_bind(ip.color_id)
                    .push_bind(ip.quantity)
                    .push_bind(ip.is_spare)
                    .push_bind(ip.img_url.clone());
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to load inventory parts")?;
        }

        for chunk in snapshot.elements.chunks(INSERT_CHUNK) {
            let mut builder =
                QueryBuilder::<Postgres>::new("INSERT INTO elements (element_id, part_num, color_id) ");
            builder.push_values(chunk, |mut b, element| {
                b.push_bind(element.element_id.clone())
                    .push_bind(element.part_num.clone())
                    .push_bind(element.color_id);
            });
            builder.build().execute(&mut *tx).await.context("Failed to load elements")?;
        }

        for chunk in snapshot.minifigs.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO minifigs (fig_num, name, num_parts, img_url) ",
            );
            builder.push_values(chunk, |mut b, minifig| {
                b.push_bind(minifig.fig_num.clone())
                    .push_bind(minifig.name.clone())
                    .push_bind(minifig.num_parts)
                    .push_bind(minifig.img_url.clone());
            });
            builder.build().execute(&mut *tx).await.context("Failed to load minifigs")?;
        }

        for chunk in snapshot.inventory_minifigs.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO inventory_minifigs (inventory_id, fig_num, quantity) ",
            );
            builder.push_values(chunk, |mut b, im| {
                b.push_bind(im.inventory_id)
                    .push_bind(im.fig_num.clone())
                    .push_bind(im.quantity);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to load inventory minifigs")?;
        }

        tx.commit().await.context("Failed to commit catalog load")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    async fn create_user(&self, user: NewUser) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (user_name, password_hash, password_salt)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_name) DO NOTHING
            RETURNING user_id, user_name, password_hash, password_salt, created_at
            "#,
        )
        .bind(&user.user_name)
        .bind(&user.password_hash)
        .bind(&user.password_salt)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to create user")?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .context("Failed to decode user row")
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, user_name, password_hash, password_salt, created_at \
             FROM users WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .context("Failed to decode user row")
    }

    async fn get_user_by_name(&self, user_name: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT user_id, user_name, password_hash, password_salt, created_at \
             FROM users WHERE user_name = $1",
        )
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by name")?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .context("Failed to decode user row")
    }
}

#[async_trait::async_trait]
impl InstanceStore for PostgresStore {
    async fn create_instance(
        &self,
        instance: NewInstance,
        overrides: Vec<InstancePartOverride>,
    ) -> Result<Option<InventoryInstance>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start instance transaction")?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO inventory_instances (owner_id, set_num, name, description, is_public)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id, set_num, name) DO NOTHING
            RETURNING {}
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(instance.owner_id)
        .bind(&instance.set_num)
        .bind(&instance.name)
        .bind(&instance.description)
        .bind(instance.is_public)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to insert instance")?;

        let Some(row) = row else {
            // Name taken; dropping the transaction rolls it back.
            return Ok(None);
        };
        let created = instance_from_row(&row)?;

        for chunk in overrides.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(format!(
                "INSERT INTO instance_part_overrides (instance_id, {}) ",
                OVERRIDE_COLUMNS
            ));
            push_override_values(&mut builder, created.id, chunk);
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to insert instance overrides")?;
        }

        tx.commit().await.context("Failed to commit instance")?;
        Ok(Some(created))
    }

    async fn get_instance(&self, id: InstanceId) -> Result<Option<InventoryInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inventory_instances WHERE id = $1",
            INSTANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch instance")?;

        row.as_ref()
            .map(instance_from_row)
            .transpose()
            .context("Failed to decode instance row")
    }

    async fn find_instance_by_name(
        &self,
        owner_id: UserId,
        set_num: &str,
        name: &str,
    ) -> Result<Option<InventoryInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inventory_instances WHERE owner_id = $1 AND set_num = $2 AND name = $3",
            INSTANCE_COLUMNS
        ))
        .bind(owner_id)
        .bind(set_num)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch instance by name")?;

        row.as_ref()
            .map(instance_from_row)
            .transpose()
            .context("Failed to decode instance row")
    }

    async fn list_instances(
        &self,
        owner_id: UserId,
        set_num: Option<&str>,
    ) -> Result<Vec<InstanceSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT i.id, i.owner_id, i.set_num, i.name, i.description, i.is_public,
                   i.created_at, i.updated_at,
                   (SELECT COUNT(*) FROM instance_part_overrides o
                     WHERE o.instance_id = i.id) AS part_count
            FROM inventory_instances i
            WHERE i.owner_id = $1 AND ($2::TEXT IS NULL OR i.set_num = $2)
            ORDER BY i.created_at DESC, i.id DESC
            "#,
        )
        .bind(owner_id)
        .bind(set_num)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list instances")?;

        rows.iter()
            .map(|row| -> Result<InstanceSummary, sqlx::Error> {
                Ok(InstanceSummary {
                    instance: instance_from_row(row)?,
                    part_count: row.try_get("part_count")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .context("Failed to decode instance rows")
    }

    async fn list_overrides(&self, instance_id: InstanceId) -> Result<Vec<InstancePartOverride>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM instance_part_overrides WHERE instance_id = $1 \
             ORDER BY is_spare, is_minifig_part, color_name, part_name, part_num",
            OVERRIDE_COLUMNS
        ))
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list instance overrides")?;

        rows.iter()
            .map(override_from_row)
            .collect::<Result<_, _>>()
            .context("Failed to decode override rows")
    }

    async fn apply_quantity_change(
        &self,
        instance_id: InstanceId,
        key: &PartKey,
        change: QuantityChange,
    ) -> Result<QuantityOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start quantity transaction")?;

        // Row lock serializes concurrent read-modify-write on the same key.
        let current: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM instance_part_overrides
            WHERE instance_id = $1 AND part_num = $2 AND color_id = $3
              AND is_spare = $4 AND is_minifig_part = $5
            FOR UPDATE
            "#,
        )
        .bind(instance_id)
        .bind(&key.part_num)
        .bind(key.color_id)
        .bind(key.is_spare)
        .bind(key.is_minifig_part)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock override row")?;

        let Some(current) = current else {
            return Ok(QuantityOutcome::Missing);
        };

        let outcome = resolve_change(current, change);
        let QuantityOutcome::Updated { quantity, .. } = outcome else {
            tx.rollback().await.context("Failed to roll back quantity change")?;
            return Ok(outcome);
        };

        sqlx::query(
            r#"
            UPDATE instance_part_overrides SET quantity = $6
            WHERE instance_id = $1 AND part_num = $2 AND color_id = $3
              AND is_spare = $4 AND is_minifig_part = $5
            "#,
        )
        .bind(instance_id)
        .bind(&key.part_num)
        .bind(key.color_id)
        .bind(key.is_spare)
        .bind(key.is_minifig_part)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .context("Failed to update override quantity")?;

        sqlx::query("UPDATE inventory_instances SET updated_at = NOW() WHERE id = $1")
            .bind(instance_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch instance")?;

        tx.commit().await.context("Failed to commit quantity change")?;
        Ok(outcome)
    }

    async fn set_quantities(
        &self,
        instance_id: InstanceId,
        rows: Vec<InstancePartOverride>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start batch transaction")?;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(format!(
                "INSERT INTO instance_part_overrides (instance_id, {}) ",
                OVERRIDE_COLUMNS
            ));
            push_override_values(&mut builder, instance_id, chunk);
            builder.push(
                " ON CONFLICT (instance_id, part_num, color_id, is_spare, is_minifig_part) \
                 DO UPDATE SET quantity = EXCLUDED.quantity",
            );
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to save instance quantities")?;
        }

        sqlx::query("UPDATE inventory_instances SET updated_at = NOW() WHERE id = $1")
            .bind(instance_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch instance")?;

        tx.commit().await.context("Failed to commit batch save")?;
        Ok(())
    }

    async fn upsert_override(
        &self,
        instance_id: InstanceId,
        row: InstancePartOverride,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start override transaction")?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO instance_part_overrides (instance_id, {}) ",
            OVERRIDE_COLUMNS
        ));
        push_override_values(&mut builder, instance_id, std::slice::from_ref(&row));
        builder.push(
            " ON CONFLICT (instance_id, part_num, color_id, is_spare, is_minifig_part) \
             DO UPDATE SET part_name = EXCLUDED.part_name, color_name = EXCLUDED.color_name, \
             quantity = EXCLUDED.quantity, part_image_url = EXCLUDED.part_image_url, \
             notes = EXCLUDED.notes",
        );
        builder
            .build()
            .execute(&mut *tx)
            .await
            .context("Failed to upsert override")?;

        sqlx::query("UPDATE inventory_instances SET updated_at = NOW() WHERE id = $1")
            .bind(instance_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch instance")?;

        tx.commit().await.context("Failed to commit override")?;
        Ok(())
    }

    async fn rename_instance(&self, id: InstanceId, name: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE inventory_instances SET name = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e).context("Failed to rename instance"),
        }
    }

    async fn delete_instance(&self, id: InstanceId) -> Result<bool> {
        // Overrides go with the instance through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM inventory_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete instance")?;

        Ok(result.rows_affected() > 0)
    }
}

impl Store for PostgresStore {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_escape() {
        assert_eq!(like_escape("10265"), "10265");
        assert_eq!(like_escape("50%_off"), "50\\%\\_off");
        assert_eq!(like_escape("a\\b"), "a\\\\b");
    }
}
