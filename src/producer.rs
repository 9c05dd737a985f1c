//! Synthetic customer producer.
//!
//! Writes small random batches into the source collection on a fixed
//! cadence. Used to exercise the pipeline locally; a real deployment has
//! actual upstream writers instead.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ProducerConfig;
use crate::store::MemoryStore;
use crate::types::{Address, Customer};

const FIRST_NAMES: &[&str] = &[
    "Olivia", "Noah", "Amelia", "Liam", "Isla", "Ethan", "Freya", "Oscar", "Maya", "Arthur",
    "Sofia", "Henry", "Grace", "Leo", "Chloe", "Felix",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Jones", "Taylor", "Brown", "Williams", "Wilson", "Johnson", "Davies", "Patel",
    "Robinson", "Wright", "Thompson", "Evans", "Walker", "White", "Hughes",
];

const STREETS: &[&str] = &[
    "High Street", "Station Road", "Main Street", "Park Road", "Church Lane", "Victoria Road",
    "Green Lane", "Manor Road", "Kings Road", "Queens Road",
];

const CITIES: &[(&str, &str)] = &[
    ("London", "Greater London"),
    ("Manchester", "Greater Manchester"),
    ("Bristol", "Somerset"),
    ("Leeds", "West Yorkshire"),
    ("Edinburgh", "Lothian"),
    ("Cardiff", "Glamorgan"),
];

/// Build one random customer.
fn random_customer(rng: &mut impl Rng) -> Customer {
    let first_name = *FIRST_NAMES.choose(rng).unwrap_or(&FIRST_NAMES[0]);
    let last_name = *LAST_NAMES.choose(rng).unwrap_or(&LAST_NAMES[0]);
    let (city, state) = *CITIES.choose(rng).unwrap_or(&CITIES[0]);
    let street = *STREETS.choose(rng).unwrap_or(&STREETS[0]);

    Customer {
        id: Uuid::new_v4().to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!(
            "{}.{}{}@example.com",
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            rng.gen_range(1..1000)
        ),
        address: Address {
            line1: format!("{} {}", rng.gen_range(1..200), street),
            line2: format!("Flat {}", rng.gen_range(1..20)),
            postcode: format!(
                "{}{} {}{}{}",
                (b'A' + rng.gen_range(0..26)) as char,
                rng.gen_range(1..10),
                rng.gen_range(1..10),
                (b'A' + rng.gen_range(0..26)) as char,
                (b'A' + rng.gen_range(0..26)) as char,
            ),
            city: city.to_string(),
            state: state.to_string(),
            country: "UK".to_string(),
        },
        created_at: Utc::now(),
    }
}

/// Periodically inserts random customer batches into a source store.
pub struct Producer {
    source: Arc<MemoryStore>,
    config: ProducerConfig,
}

impl Producer {
    pub fn new(source: Arc<MemoryStore>, config: ProducerConfig) -> Self {
        Self { source, config }
    }

    /// Generate batches until shutdown. Returns the total inserted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.config.interval);
        let mut produced = 0u64;
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            min = self.config.min_batch,
            max = self.config.max_batch,
            "producer started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    produced += self.produce_batch().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(produced, "producer stopped");
        produced
    }

    /// Insert one random batch. Returns how many records were written.
    pub async fn produce_batch(&self) -> u64 {
        // ThreadRng is not Send, so the batch is built before any await.
        let batch: Vec<Customer> = {
            let mut rng = rand::thread_rng();
            let size = rng.gen_range(self.config.min_batch..=self.config.max_batch);
            (0..size).map(|_| random_customer(&mut rng)).collect()
        };

        let count = batch.len() as u64;
        for customer in batch {
            self.source.insert(customer.id.clone(), customer.document()).await;
        }
        debug!(records = count, "inserted synthetic batch");
        count
    }
}
