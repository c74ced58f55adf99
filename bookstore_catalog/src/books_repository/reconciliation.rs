use std::collections::{HashMap, HashSet};

use crate::api::{BatchOutcome, Book, StoredBook, UpsertAction, Upc};

/// Attribute that differs between the stored and the incoming book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

/// Writes that need to be applied to bring the store in line with a batch
#[derive(Debug, Default)]
pub struct ReconciliationPlan {
    pub inserts: Vec<Book>,
    pub updates: Vec<Book>,
    pub outcome: BatchOutcome,
}

impl ReconciliationPlan {
    pub fn has_writes(&self) -> bool {
        !self.inserts.is_empty() || !self.updates.is_empty()
    }
}

/// Removes repeated upcs from the batch, the last occurrence of a upc wins
/// and takes the position of that last occurrence.
pub fn deduplicate_last_wins(books: Vec<Book>) -> Vec<Book> {
    let total = books.len();
    let mut seen = HashSet::with_capacity(total);
    let mut unique: Vec<Book> = books
        .into_iter()
        .rev()
        .filter(|book| seen.insert(book.upc.clone()))
        .collect();
    unique.reverse();
    if unique.len() != total {
        tracing::warn!(
            "Batch contained {} duplicated upc entries, keeping the last occurrence of each",
            total - unique.len()
        );
    }
    unique
}

/// Collects every attribute (identity and timestamps excluded) in which the books differ.
pub fn changed_fields(existing: &Book, incoming: &Book) -> Vec<FieldChange> {
    let mut changes = vec![];
    push_if_changed(&mut changes, "title", &existing.title, &incoming.title);
    push_if_changed(&mut changes, "price", &existing.price, &incoming.price);
    push_if_changed(&mut changes, "rating", &existing.rating, &incoming.rating);
    push_if_changed(&mut changes, "description", &existing.description, &incoming.description);
    push_if_changed(&mut changes, "category", &existing.category, &incoming.category);
    push_if_changed(
        &mut changes,
        "num_available_units",
        &existing.num_available_units,
        &incoming.num_available_units,
    );
    push_if_changed(&mut changes, "image_url", &existing.image_url, &incoming.image_url);
    push_if_changed(&mut changes, "book_url", &existing.book_url, &incoming.book_url);
    changes
}

fn push_if_changed<T>(changes: &mut Vec<FieldChange>, field: &'static str, old: &T, new: &T)
where
    T: PartialEq + ToString,
{
    if old != new {
        changes.push(FieldChange {
            field,
            old: old.to_string(),
            new: new.to_string(),
        });
    }
}

/// Splits a deduplicated batch into inserts, updates and skips
/// against the current state of the store.
pub fn plan(books: Vec<Book>, existing: &HashMap<Upc, StoredBook>) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    for book in books {
        match existing.get(&book.upc) {
            None => {
                tracing::debug!("Book {} not found, queued for insert", book.upc);
                plan.outcome.record(book.upc.clone(), UpsertAction::Inserted);
                plan.inserts.push(book);
            }
            Some(stored) => {
                let changes = changed_fields(&stored.book, &book);
                if changes.is_empty() {
                    tracing::info!("Book {} is identical to existing book, skipping update", book.upc);
                    plan.outcome.record(book.upc.clone(), UpsertAction::Skipped);
                } else {
                    for change in &changes {
                        tracing::info!(
                            upc = %book.upc,
                            field = change.field,
                            "{}: {} -> {}",
                            change.field,
                            change.old,
                            change.new
                        );
                    }
                    plan.outcome.record(book.upc.clone(), UpsertAction::Updated);
                    plan.updates.push(book);
                }
            }
        }
    }
    plan
}
