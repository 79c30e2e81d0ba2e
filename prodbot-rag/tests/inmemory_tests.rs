//! Property tests for search ordering, relevance filtering and formatting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use prodbot_rag::document::{Candidate, Document, IndexedDocument};
use prodbot_rag::error::Result;
use prodbot_rag::filter::{ContextFilter, Relevance, RelevanceJudge};
use prodbot_rag::format::{NO_DOCUMENTS, format_documents};
use prodbot_rag::inmemory::InMemoryVectorStore;
use prodbot_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

fn arb_document() -> impl Strategy<Value = Document> {
    (
        "[a-z]{3,8}",
        "[a-z ]{5,30}",
        proptest::option::of("[A-Za-z ]{1,20}"),
        proptest::option::of("[0-9]{3,6}"),
        proptest::option::of("[1-5]\\.[0-9]"),
    )
        .prop_map(|(id, content, title, price, rating)| {
            let mut doc = Document::new(id, content);
            if let Some(title) = title {
                doc = doc.with_metadata("product_title", title);
            }
            if let Some(price) = price {
                doc = doc.with_metadata("price", price);
            }
            if let Some(rating) = rating {
                doc = doc.with_metadata("rating", rating);
            }
            doc
        })
}

fn arb_indexed(dim: usize) -> impl Strategy<Value = IndexedDocument> {
    (arb_document(), arb_normalized_embedding(dim))
        .prop_map(|(document, embedding)| IndexedDocument { document, embedding })
}

fn arb_candidates() -> impl Strategy<Value = Vec<Candidate>> {
    proptest::collection::vec((arb_document(), -1.0f32..1.0f32), 0..12)
        .prop_map(Candidate::ranked)
}

/// Judges from a fixed set of document ids; everything else is irrelevant.
struct SetJudge {
    relevant: HashSet<String>,
}

#[async_trait]
impl RelevanceJudge for SetJudge {
    fn name(&self) -> &str {
        "set"
    }

    async fn judge(&self, _query: &str, document: &Document) -> Result<Relevance> {
        Ok(if self.relevant.contains(&document.id) {
            Relevance::Relevant
        } else {
            Relevance::Irrelevant
        })
    }
}

mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            documents in proptest::collection::vec(arb_indexed(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();

                // Deduplicate by id to avoid upsert overwriting
                let mut deduped: HashMap<String, IndexedDocument> = HashMap::new();
                for doc in &documents {
                    deduped.entry(doc.document.id.clone()).or_insert_with(|| doc.clone());
                }
                let unique: Vec<IndexedDocument> = deduped.into_values().collect();
                let count = unique.len();

                store.upsert("test", &unique).await.unwrap();
                let results = store.search("test", &query, top_k).await.unwrap();
                (results, count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
            for (idx, candidate) in results.iter().enumerate() {
                prop_assert_eq!(candidate.rank, idx);
            }
        }
    }
}

mod prop_filter_preserves_order {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn output_is_the_relevant_subsequence(
            candidates in arb_candidates(),
            keep_mask in proptest::collection::vec(any::<bool>(), 12),
            concurrency in 1usize..6,
        ) {
            let relevant: HashSet<String> = candidates
                .iter()
                .zip(&keep_mask)
                .filter(|(_, keep)| **keep)
                .map(|(c, _)| c.document.id.clone())
                .collect();
            let expected: Vec<Candidate> = candidates
                .iter()
                .filter(|c| relevant.contains(&c.document.id))
                .cloned()
                .collect();

            let filter = ContextFilter::new(Arc::new(SetJudge { relevant }))
                .with_concurrency(concurrency);
            let rt = tokio::runtime::Runtime::new().unwrap();
            let kept = rt.block_on(filter.filter("budget laptops", candidates));

            prop_assert_eq!(kept, expected);
        }
    }
}

mod prop_formatting {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn formatting_depends_only_on_documents(candidates in arb_candidates()) {
            let first = format_documents(&candidates);
            let second = format_documents(&candidates);
            prop_assert_eq!(&first, &second);

            // Scores and ranks do not leak into the rendered context.
            let rescored: Vec<Candidate> = candidates
                .iter()
                .cloned()
                .map(|c| Candidate { score: 0.0, rank: 99, ..c })
                .collect();
            prop_assert_eq!(&first, &format_documents(&rescored));

            if candidates.is_empty() {
                prop_assert_eq!(first.as_str(), NO_DOCUMENTS);
            } else {
                prop_assert_eq!(first.matches("Title: ").count(), candidates.len());
            }
        }
    }
}
