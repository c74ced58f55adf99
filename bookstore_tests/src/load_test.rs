use std::collections::HashSet;
use std::time::UNIX_EPOCH;

use rand::prelude::SliceRandom;
use rand::{thread_rng, Rng};
use serde_json::json;

use bookstore_catalog::api::BookInput;
use bookstore_catalog::client::BookstoreCatalogClient;

use crate::catalog_url;

#[tokio::test]
/// Upserts a large generated catalog in batches,
/// then re-sends it with a random subset of prices changed
/// and checks that only those are reported as updated
async fn generate_lots_of_books_and_reprice_them() {
    const NO_OF_BOOKS_TO_GENERATE: usize = 2000;
    const BATCH_SIZE: usize = 250;
    const NO_OF_PRICE_CHANGES: usize = 300;

    let mut rng = thread_rng();
    let client = BookstoreCatalogClient::new(&catalog_url()).expect("Failed to create client");

    let run_id = std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let mut books = generate_books(&mut rng, run_id, NO_OF_BOOKS_TO_GENERATE);

    let mut inserted = 0;
    for batch in books.chunks(BATCH_SIZE) {
        let response = client.batch_upsert(batch).await.expect("Failed to upsert batch");
        inserted += response.inserted;
        println!("Upserted batch of {} books", response.count);
    }
    assert_eq!(inserted, NO_OF_BOOKS_TO_GENERATE);

    let mut indices: Vec<usize> = (0..books.len()).collect();
    indices.shuffle(&mut rng);
    let repriced: HashSet<usize> = indices.into_iter().take(NO_OF_PRICE_CHANGES).collect();
    for index in &repriced {
        let cents: u32 = rng.gen_range(100..10000);
        // a shifted price range guarantees the value differs
        books[*index].price = json!(format!("{}.{:02}", 100 + cents / 100, cents % 100));
    }

    let (mut updated, mut skipped) = (0, 0);
    for batch in books.chunks(BATCH_SIZE) {
        let response = client.batch_upsert(batch).await.expect("Failed to upsert batch");
        assert_eq!(response.inserted, 0);
        updated += response.updated;
        skipped += response.skipped;
    }
    assert_eq!(updated, NO_OF_PRICE_CHANGES);
    assert_eq!(skipped, NO_OF_BOOKS_TO_GENERATE - NO_OF_PRICE_CHANGES);
}

fn generate_books(rng: &mut impl Rng, run_id: u64, no_of_books_to_generate: usize) -> Vec<BookInput> {
    (0..no_of_books_to_generate)
        .map(|no| BookInput {
            title: format!(
                "The {} {} of number {}",
                ADJECTIVES.choose(rng).unwrap(),
                NOUNS.choose(rng).unwrap(),
                no
            ),
            price: json!(format!("{}.{:02}", rng.gen_range(1..99), rng.gen_range(0..100))),
            rating: json!(rng.gen_range(1..=5)),
            description: "Some long description that is long".to_string(),
            category: CATEGORIES.choose(rng).unwrap().to_string(),
            upc: format!("load-{}-{}", run_id, no),
            num_available_units: json!(rng.gen_range(0..50)),
            image_url: format!("https://books.toscrape.com/media/{}.jpg", no),
            book_url: format!("https://books.toscrape.com/catalogue/book_{}/index.html", no),
        })
        .collect()
}

const ADJECTIVES: [&str; 12] = [
    "Silent", "Crimson", "Forgotten", "Endless", "Hidden", "Broken", "Golden", "Last",
    "Wandering", "Quiet", "Burning", "Distant",
];

const NOUNS: [&str; 12] = [
    "Garden", "River", "Empire", "Letter", "Winter", "Harbor", "Mirror", "Orchard", "Voyage",
    "Lantern", "Kingdom", "Station",
];

const CATEGORIES: [&str; 8] = [
    "Travel",
    "Mystery",
    "Historical Fiction",
    "Poetry",
    "Science",
    "Romance",
    "Fantasy",
    "Philosophy",
];
