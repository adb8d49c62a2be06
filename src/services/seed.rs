//! Demo data for a fresh database.
//!
//! The dataset is generated up front from a caller-supplied RNG (so a fixed
//! seed reproduces it), then written in one database transaction after
//! wiping every table.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use fake::{
    faker::{
        address::en::CityName,
        company::en::{CompanyName, Industry},
        lorem::en::Sentence,
        name::en::Name,
    },
    Fake,
};
use log::info;
use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    models::{UserRole, WarehouseType},
    utils::hash_password,
};

pub const STAFF_USERS: usize = 4;
pub const LOCATIONS: usize = 10;
pub const WAREHOUSES: usize = 20;
pub const PRODUCTS: usize = 50;
pub const SUB_LOCATIONS_PER_WAREHOUSE: RangeInclusive<usize> = 1..=4;
pub const PRODUCTS_PER_SUB_LOCATION: usize = 25;
pub const DEFAULT_PASSWORD: &str = "password";
pub const MANAGER_EMAIL: &str = "manager@stockmaster.io";

const SUB_LOCATION_NAMES: [&str; 5] = ["Rack A", "Rack B", "Rack C", "Shelf 1", "Shelf 2"];
const PRODUCT_ADJECTIVES: [&str; 8] = [
    "Ergonomic", "Rustic", "Sleek", "Handcrafted", "Refined", "Practical", "Durable", "Compact",
];
const PRODUCT_MATERIALS: [&str; 8] = [
    "Steel", "Wooden", "Cotton", "Granite", "Plastic", "Rubber", "Bronze", "Concrete",
];
const PRODUCT_NOUNS: [&str; 10] = [
    "Chair", "Table", "Gloves", "Keyboard", "Bottle", "Lamp", "Crate", "Pallet", "Helmet", "Bench",
];

#[derive(Debug, Clone)]
pub struct SeedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct SeedLocation {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SeedWarehouse {
    pub id: Uuid,
    pub name: String,
    pub shortcode: String,
    pub location_id: Uuid,
    pub kind: WarehouseType,
    pub capacity: i32,
}

#[derive(Debug, Clone)]
pub struct SeedProduct {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub min_stock: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct SeedSubLocation {
    pub id: Uuid,
    pub name: String,
    pub warehouse_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedStock {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub sub_location_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct SeedDataset {
    pub users: Vec<SeedUser>,
    pub locations: Vec<SeedLocation>,
    pub warehouses: Vec<SeedWarehouse>,
    pub products: Vec<SeedProduct>,
    pub sub_locations: Vec<SeedSubLocation>,
    pub stock: Vec<SeedStock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub locations: usize,
    pub warehouses: usize,
    pub products: usize,
    pub sub_locations: usize,
    pub stock_rows: usize,
}

impl SeedDataset {
    pub fn summary(&self) -> SeedSummary {
        SeedSummary {
            users: self.users.len(),
            locations: self.locations.len(),
            warehouses: self.warehouses.len(),
            products: self.products.len(),
            sub_locations: self.sub_locations.len(),
            stock_rows: self.stock.len(),
        }
    }
}

fn random_id<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
}

fn random_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> SeedDataset {
    let mut users = vec![SeedUser {
        id: random_id(rng),
        name: "Admin Manager".to_string(),
        email: MANAGER_EMAIL.to_string(),
        role: UserRole::Manager,
    }];
    for i in 0..STAFF_USERS {
        users.push(SeedUser {
            id: random_id(rng),
            name: Name().fake_with_rng(rng),
            email: format!("staff{}@stockmaster.io", i + 1),
            role: UserRole::Staff,
        });
    }

    let locations: Vec<SeedLocation> = (0..LOCATIONS)
        .map(|_| SeedLocation {
            id: random_id(rng),
            name: CityName().fake_with_rng(rng),
        })
        .collect();

    let warehouses: Vec<SeedWarehouse> = (0..WAREHOUSES)
        .map(|_| {
            let company: String = CompanyName().fake_with_rng(rng);
            SeedWarehouse {
                id: random_id(rng),
                name: format!("{} Warehouse", company),
                shortcode: (0..3).map(|_| char::from(rng.gen_range(b'A'..=b'Z'))).collect(),
                location_id: locations[rng.gen_range(0..locations.len())].id,
                kind: if rng.gen_bool(0.5) {
                    WarehouseType::Main
                } else {
                    WarehouseType::Secondary
                },
                capacity: rng.gen_range(100..=5000),
            }
        })
        .collect();

    let mut skus = HashSet::new();
    let mut products = Vec::with_capacity(PRODUCTS);
    while products.len() < PRODUCTS {
        let sku = random_code(rng, 10);
        if !skus.insert(sku.clone()) {
            continue;
        }
        products.push(SeedProduct {
            id: random_id(rng),
            sku,
            name: format!(
                "{} {} {}",
                pick(rng, &PRODUCT_ADJECTIVES),
                pick(rng, &PRODUCT_MATERIALS),
                pick(rng, &PRODUCT_NOUNS)
            ),
            description: Sentence(6..12).fake_with_rng(rng),
            category: Industry().fake_with_rng(rng),
            min_stock: rng.gen_range(5..=30),
            price: Decimal::new(rng.gen_range(500..=10_000), 2),
        });
    }

    let mut sub_locations = Vec::new();
    for warehouse in &warehouses {
        for _ in 0..rng.gen_range(SUB_LOCATIONS_PER_WAREHOUSE) {
            sub_locations.push(SeedSubLocation {
                id: random_id(rng),
                name: pick(rng, &SUB_LOCATION_NAMES).to_string(),
                warehouse_id: warehouse.id,
            });
        }
    }

    // Upsert on (warehouse, product, sub-location): a repeated key keeps its
    // first position and takes the later quantity.
    let mut stock: Vec<SeedStock> = Vec::new();
    let mut index: HashMap<(Uuid, Uuid, Uuid), usize> = HashMap::new();
    for sub_location in &sub_locations {
        let chosen: Vec<Uuid> = products
            .choose_multiple(rng, PRODUCTS_PER_SUB_LOCATION)
            .map(|p| p.id)
            .collect();
        for product_id in chosen {
            let entry = SeedStock {
                warehouse_id: sub_location.warehouse_id,
                product_id,
                sub_location_id: sub_location.id,
                quantity: rng.gen_range(0..=200),
            };
            let key = (entry.warehouse_id, entry.product_id, entry.sub_location_id);
            match index.get(&key) {
                Some(&i) => stock[i].quantity = entry.quantity,
                None => {
                    index.insert(key, stock.len());
                    stock.push(entry);
                }
            }
        }
    }

    SeedDataset {
        users,
        locations,
        warehouses,
        products,
        sub_locations,
        stock,
    }
}

/// Deletes every row, children before parents.
pub async fn reset(conn: &mut PgConnection) -> Result<(), AppError> {
    for table in [
        "ledger",
        "transaction_items",
        "transactions",
        "stock",
        "sub_locations",
        "warehouses",
        "locations",
        "products",
        "users",
    ] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert(
    conn: &mut PgConnection,
    dataset: &SeedDataset,
    password_hash: &str,
) -> Result<(), AppError> {
    info!("Seeding users...");
    let mut users = QueryBuilder::<Postgres>::new("INSERT INTO users (id, name, email, password_hash, role) ");
    users.push_values(&dataset.users, |mut row, user| {
        row.push_bind(user.id)
            .push_bind(&user.name)
            .push_bind(&user.email)
            .push_bind(password_hash)
            .push_bind(user.role.as_str());
    });
    users.build().execute(&mut *conn).await?;

    info!("Seeding locations...");
    let mut locations = QueryBuilder::<Postgres>::new("INSERT INTO locations (id, name) ");
    locations.push_values(&dataset.locations, |mut row, location| {
        row.push_bind(location.id).push_bind(&location.name);
    });
    locations.build().execute(&mut *conn).await?;

    info!("Seeding warehouses...");
    let mut warehouses = QueryBuilder::<Postgres>::new(
        "INSERT INTO warehouses (id, name, shortcode, location_id, kind, capacity) ",
    );
    warehouses.push_values(&dataset.warehouses, |mut row, warehouse| {
        row.push_bind(warehouse.id)
            .push_bind(&warehouse.name)
            .push_bind(&warehouse.shortcode)
            .push_bind(warehouse.location_id)
            .push_bind(warehouse.kind.as_str())
            .push_bind(warehouse.capacity);
    });
    warehouses.build().execute(&mut *conn).await?;

    info!("Seeding products...");
    let mut products = QueryBuilder::<Postgres>::new(
        "INSERT INTO products (id, sku, name, description, category, min_stock, uom, price, is_active) ",
    );
    products.push_values(&dataset.products, |mut row, product| {
        row.push_bind(product.id)
            .push_bind(&product.sku)
            .push_bind(&product.name)
            .push_bind(&product.description)
            .push_bind(&product.category)
            .push_bind(product.min_stock)
            .push_bind("UNIT")
            .push_bind(product.price)
            .push_bind(true);
    });
    products.build().execute(&mut *conn).await?;

    info!("Creating sub-locations...");
    let mut sub_locations =
        QueryBuilder::<Postgres>::new("INSERT INTO sub_locations (id, name, warehouse_id) ");
    sub_locations.push_values(&dataset.sub_locations, |mut row, sub_location| {
        row.push_bind(sub_location.id)
            .push_bind(&sub_location.name)
            .push_bind(sub_location.warehouse_id);
    });
    sub_locations.build().execute(&mut *conn).await?;

    info!("Seeding stock...");
    let mut stock = QueryBuilder::<Postgres>::new(
        "INSERT INTO stock (warehouse_id, product_id, sub_location_id, quantity) ",
    );
    stock.push_values(&dataset.stock, |mut row, entry| {
        row.push_bind(entry.warehouse_id)
            .push_bind(entry.product_id)
            .push_bind(entry.sub_location_id)
            .push_bind(entry.quantity);
    });
    stock.build().execute(&mut *conn).await?;

    Ok(())
}

pub async fn run<R: Rng + ?Sized>(db: &Database, rng: &mut R) -> Result<SeedSummary, AppError> {
    let dataset = generate(rng);
    let password_hash = hash_password(DEFAULT_PASSWORD)?;

    let mut tx = db.begin().await?;
    info!("Resetting database...");
    reset(&mut *tx).await?;
    insert(&mut *tx, &dataset, &password_hash).await?;
    tx.commit().await?;

    Ok(dataset.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn generates_expected_volumes() {
        let dataset = generate(&mut StdRng::seed_from_u64(7));
        let summary = dataset.summary();

        assert_eq!(summary.users, STAFF_USERS + 1);
        assert_eq!(summary.locations, LOCATIONS);
        assert_eq!(summary.warehouses, WAREHOUSES);
        assert_eq!(summary.products, PRODUCTS);
        assert!(summary.sub_locations >= WAREHOUSES);
        assert!(summary.sub_locations <= WAREHOUSES * 4);
        assert_eq!(summary.stock_rows, summary.sub_locations * PRODUCTS_PER_SUB_LOCATION);

        let managers: Vec<_> = dataset.users.iter().filter(|u| u.role == UserRole::Manager).collect();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].email, MANAGER_EMAIL);
    }

    #[test]
    fn respects_field_ranges() {
        let dataset = generate(&mut StdRng::seed_from_u64(42));

        let skus: HashSet<_> = dataset.products.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus.len(), PRODUCTS);
        for product in &dataset.products {
            assert_eq!(product.sku.len(), 10);
            assert!(product.sku.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            assert!((5..=30).contains(&product.min_stock));
            assert!(product.price >= Decimal::new(5, 0) && product.price <= Decimal::new(100, 0));
        }
        for warehouse in &dataset.warehouses {
            assert_eq!(warehouse.shortcode.len(), 3);
            assert!(warehouse.shortcode.chars().all(|c| c.is_ascii_uppercase()));
            assert!((100..=5000).contains(&warehouse.capacity));
            assert!(warehouse.name.ends_with(" Warehouse"));
        }
        for sub_location in &dataset.sub_locations {
            assert!(SUB_LOCATION_NAMES.contains(&sub_location.name.as_str()));
        }
    }

    #[test]
    fn stock_keys_are_unique_and_consistent() {
        let dataset = generate(&mut StdRng::seed_from_u64(3));
        let owner: HashMap<Uuid, Uuid> = dataset
            .sub_locations
            .iter()
            .map(|s| (s.id, s.warehouse_id))
            .collect();

        let mut keys = HashSet::new();
        for entry in &dataset.stock {
            assert!(keys.insert((entry.warehouse_id, entry.product_id, entry.sub_location_id)));
            assert_eq!(owner[&entry.sub_location_id], entry.warehouse_id);
            assert!((0..=200).contains(&entry.quantity));
        }
    }

    #[test]
    fn same_seed_same_dataset() {
        let a = generate(&mut StdRng::seed_from_u64(11));
        let b = generate(&mut StdRng::seed_from_u64(11));
        assert_eq!(a.stock, b.stock);
        assert_eq!(
            a.products.iter().map(|p| &p.sku).collect::<Vec<_>>(),
            b.products.iter().map(|p| &p.sku).collect::<Vec<_>>()
        );
    }
}
