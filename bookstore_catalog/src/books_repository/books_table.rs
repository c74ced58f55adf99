use crate::books_repository::ValidationError;

/// Columns of the books table in the order every statement uses them
pub const BOOK_COLUMNS: &str = "upc, title, price, rating, description, category, \
     num_available_units, image_url, book_url, created_at, updated_at";

/// Name of the books table, the only value ever interpolated into statement text.
/// It comes from startup configuration and is validated as a plain identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooksTable {
    name: String,
}

impl BooksTable {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let valid_part = |part: &str| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        // optionally schema qualified
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|part| valid_part(part)) {
            return Err(ValidationError::InvalidTableName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn statement(&self, template: &str) -> String {
        template.replace("{table}", &self.name)
    }

    pub fn create_table(&self) -> String {
        self.statement(
            "
        CREATE TABLE IF NOT EXISTS {table} (
            upc                  TEXT PRIMARY KEY,
            title                TEXT NOT NULL,
            price                NUMERIC(10, 2) NOT NULL,
            rating               SMALLINT NOT NULL,
            description          TEXT NOT NULL,
            category             TEXT NOT NULL,
            num_available_units  INTEGER NOT NULL CHECK (num_available_units >= 0),
            image_url            TEXT NOT NULL,
            book_url             TEXT NOT NULL,
            created_at           TIMESTAMPTZ NOT NULL,
            updated_at           TIMESTAMPTZ NOT NULL
            )
        ",
        )
    }

    /// $1: text[] of upcs
    pub fn select_by_upcs(&self) -> String {
        self.statement(&format!(
            "SELECT {BOOK_COLUMNS} FROM {{table}} WHERE upc = ANY($1)"
        ))
    }

    /// $1..$9: one array per attribute, $10: timestamp used for both created_at and updated_at.
    /// A row committed by a concurrent batch since the read is overwritten, keeping its created_at.
    pub fn bulk_insert(&self) -> String {
        self.statement(&format!(
            "INSERT INTO {{table}} ({BOOK_COLUMNS})
            SELECT t.upc, t.title, t.price, t.rating, t.description, t.category,
                   t.num_available_units, t.image_url, t.book_url, $10::timestamptz, $10::timestamptz
            FROM UNNEST(
                $1::text[], $2::text[], $3::numeric[], $4::smallint[], $5::text[],
                $6::text[], $7::integer[], $8::text[], $9::text[]
            ) AS t(upc, title, price, rating, description, category,
                   num_available_units, image_url, book_url)
            ON CONFLICT (upc) DO UPDATE SET
                title = EXCLUDED.title,
                price = EXCLUDED.price,
                rating = EXCLUDED.rating,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                num_available_units = EXCLUDED.num_available_units,
                image_url = EXCLUDED.image_url,
                book_url = EXCLUDED.book_url,
                updated_at = EXCLUDED.updated_at"
        ))
    }

    /// $1..$9: one array per attribute, $10: new updated_at, created_at is left untouched
    pub fn bulk_update(&self) -> String {
        self.statement(
            "UPDATE {table} AS b SET
                title = t.title,
                price = t.price,
                rating = t.rating,
                description = t.description,
                category = t.category,
                num_available_units = t.num_available_units,
                image_url = t.image_url,
                book_url = t.book_url,
                updated_at = $10
            FROM UNNEST(
                $1::text[], $2::text[], $3::numeric[], $4::smallint[], $5::text[],
                $6::text[], $7::integer[], $8::text[], $9::text[]
            ) AS t(upc, title, price, rating, description, category,
                   num_available_units, image_url, book_url)
            WHERE b.upc = t.upc",
        )
    }
}
