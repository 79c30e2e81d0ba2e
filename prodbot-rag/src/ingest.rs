//! Loading the product review catalogue from CSV.
//!
//! Expected headers: `product_id, product_title, rating, total_reviews,
//! price, top_reviews`. Each row becomes one [`Document`] whose content is
//! the review text and whose metadata holds the catalogue fields.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::store::DocumentStore;

/// Default location of the scraped catalogue.
pub const DEFAULT_CSV_PATH: &str = "data/product_reviews.csv";

#[derive(Debug, Deserialize)]
struct ProductRow {
    #[serde(default)]
    product_id: String,
    product_title: String,
    #[serde(default)]
    rating: String,
    #[serde(default)]
    total_reviews: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    top_reviews: String,
}

impl ProductRow {
    fn into_document(self) -> Document {
        let id = match self.product_id.trim() {
            "" => uuid::Uuid::new_v4().to_string(),
            id => id.to_string(),
        };
        let mut doc = Document::new(id, self.top_reviews);
        for (key, value) in [
            ("product_id", self.product_id),
            ("product_title", self.product_title),
            ("rating", self.rating),
            ("total_reviews", self.total_reviews),
            ("price", self.price),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                doc.metadata.insert(key.to_string(), value.to_string());
            }
        }
        doc
    }
}

/// Parse CSV rows into documents. Rows without review text are skipped.
pub fn read_documents<R: Read>(reader: R) -> Result<Vec<Document>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let mut documents = Vec::new();
    for (line, row) in csv_reader.deserialize::<ProductRow>().enumerate() {
        let row = row.map_err(|e| RagError::Ingestion(format!("row {}: {e}", line + 1)))?;
        if row.top_reviews.trim().is_empty() {
            warn!(row = line + 1, product = %row.product_title, "skipping product without reviews");
            continue;
        }
        documents.push(row.into_document());
    }
    Ok(documents)
}

/// Transforms the product CSV into documents and stores them.
#[derive(Debug, Clone)]
pub struct DataIngestion {
    csv_path: PathBuf,
}

impl DataIngestion {
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self { csv_path: csv_path.into() }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Read the CSV into documents.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] if the file cannot be opened or a row
    /// cannot be parsed.
    pub fn transform_data(&self) -> Result<Vec<Document>> {
        let file = std::fs::File::open(&self.csv_path).map_err(|e| {
            RagError::Ingestion(format!("cannot open {}: {e}", self.csv_path.display()))
        })?;
        let documents = read_documents(file)?;
        info!(
            path = %self.csv_path.display(),
            document_count = documents.len(),
            "loaded product catalogue"
        );
        Ok(documents)
    }

    /// Load the CSV and upsert every document into `store`.
    ///
    /// Returns the number of documents stored.
    pub async fn run(&self, store: &dyn DocumentStore) -> Result<usize> {
        let documents = self.transform_data()?;
        store.upsert(&documents).await?;
        info!(document_count = documents.len(), "ingestion completed");
        Ok(documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
product_id,product_title,rating,total_reviews,price,top_reviews
B01,Laptop X,4.2,120,45000,Great budget laptop with long battery life
B02,Phone Y,,10,,
,Tablet Z,3.9,5,15000,\"Decent screen, slow charger\"
";

    #[test]
    fn rows_become_documents() {
        let docs = read_documents(CSV.as_bytes()).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "B01");
        assert_eq!(docs[0].content, "Great budget laptop with long battery life");
        assert_eq!(docs[0].meta("product_title"), Some("Laptop X"));
        assert_eq!(docs[0].meta("price"), Some("45000"));
        assert_eq!(docs[0].meta("rating"), Some("4.2"));

        assert!(!docs[1].id.is_empty());
        assert_eq!(docs[1].meta("product_id"), None);
        assert_eq!(docs[1].content, "Decent screen, slow charger");
    }

    #[test]
    fn missing_required_column_is_an_ingestion_error() {
        let err = read_documents("product_id,price\nB01,10\n".as_bytes()).unwrap_err();
        assert!(matches!(err, RagError::Ingestion(_)));
    }

    #[test]
    fn missing_file_is_an_ingestion_error() {
        let err = DataIngestion::new("/definitely/not/here.csv").transform_data().unwrap_err();
        assert!(matches!(err, RagError::Ingestion(_)));
    }
}
